use crate::CameraParams;
use cgmath::SquareMatrix;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.5,
    0.0, 0.0, 0.0, 1.0,
);

/// Fixed perspective camera looking at the origin down the -z axis.
pub struct Camera {
  pub eye: cgmath::Point3<f32>,
  pub target: cgmath::Point3<f32>,
  pub up: cgmath::Vector3<f32>,
  pub aspect: f32,
  pub fovy: f32,
  pub znear: f32,
  pub zfar: f32,
}

impl Camera {
  pub fn new(params: &CameraParams, aspect: f32) -> Self {
    Self {
      eye: (0.0, 0.0, params.distance).into(),
      target: (0.0, 0.0, 0.0).into(),
      up: cgmath::Vector3::unit_y(),
      aspect,
      fovy: params.fovy,
      znear: params.znear,
      zfar: params.zfar,
    }
  }

  pub fn set_aspect(&mut self, aspect: f32) {
    if aspect.is_finite() && aspect > 0.0 {
      self.aspect = aspect;
    }
  }

  pub fn build_view_projection_matrix(&self) -> cgmath::Matrix4<f32> {
    let view = cgmath::Matrix4::look_at_rh(self.eye, self.target, self.up);
    let proj = cgmath::perspective(cgmath::Deg(self.fovy), self.aspect, self.znear, self.zfar);
    OPENGL_TO_WGPU_MATRIX * proj * view
  }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
  view_proj: [[f32; 4]; 4],
  sprite_size: f32,
  _padding: [f32; 3],
}

impl CameraUniform {
  pub fn new(sprite_size: f32) -> Self {
    Self {
      view_proj: cgmath::Matrix4::identity().into(),
      sprite_size,
      _padding: [0.0; 3],
    }
  }

  pub fn update_view_proj(&mut self, camera: &Camera) {
    self.view_proj = camera.build_view_projection_matrix().into();
  }
}
