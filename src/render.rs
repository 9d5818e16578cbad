use crate::camera::{Camera, CameraUniform};
use crate::input::{InputChannels, ViewportState};
use crate::simulation::SimulationState;
use crate::{CameraParams, LineSegment, Particle, WebError};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use wgpu::{util::DeviceExt, PipelineCompilationOptions};
use winit::window::Window;

const BACKGROUND: wgpu::Color = wgpu::Color {
  r: 0.01,
  g: 0.01,
  b: 0.03,
  a: 1.0,
};

// two triangles covering the unit square, one quad per particle instance
#[rustfmt::skip]
const SPRITE_CORNERS: [[f32; 2]; 6] = [
  [-1.0, -1.0], [1.0, -1.0], [1.0, 1.0],
  [-1.0, -1.0], [1.0, 1.0], [-1.0, 1.0],
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
  Uninitialized,
  Running,
  Disposed,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Phase::Uninitialized => "uninitialized",
      Phase::Running => "running",
      Phase::Disposed => "disposed",
    };
    f.write_str(name)
  }
}

/// Owns the drawing surface, the camera and the GPU copies of the particle
/// and edge buffers.
///
/// A renderer moves through `Uninitialized -> Running -> Disposed` exactly
/// once. Drawing or resizing outside `Running` returns
/// [`WebError::NotRunning`].
pub struct SceneRenderer {
  phase: Phase,
  scene: Option<GpuScene>,
  camera_params: CameraParams,
}

impl Default for SceneRenderer {
  fn default() -> Self {
    Self::new(CameraParams::default())
  }
}

impl SceneRenderer {
  pub fn new(camera_params: CameraParams) -> Self {
    Self {
      phase: Phase::Uninitialized,
      scene: None,
      camera_params,
    }
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn is_running(&self) -> bool {
    self.phase == Phase::Running
  }

  /// Creates the GPU context for `window` and starts listening on `channels`.
  /// Buffers are sized for the particle count and edge capacity of `state`.
  ///
  /// On failure every resource created so far is released and the renderer
  /// ends up `Disposed`; the host is expected to carry on without a
  /// background rather than retry.
  pub fn initialize(
    &mut self,
    window: Arc<Window>,
    viewport: ViewportState,
    state: &SimulationState,
    channels: &mut InputChannels,
  ) -> Result<(), WebError> {
    if self.phase != Phase::Uninitialized {
      return Err(WebError::AlreadyInitialized(self.phase));
    }

    match pollster::block_on(GpuScene::init(
      window,
      viewport,
      state.particles().len(),
      state.edge_capacity(),
      &self.camera_params,
    )) {
      Ok(scene) => {
        log::info!(
          "scene renderer running: {} particles, {} edge slots, {}x{} px",
          scene.particle_capacity,
          scene.segment_capacity,
          scene.config.width,
          scene.config.height
        );
        self.scene = Some(scene);
        self.phase = Phase::Running;
        channels.attach();
        Ok(())
      }
      Err(err) => {
        self.phase = Phase::Disposed;
        Err(err)
      }
    }
  }

  /// Uploads `state` and draws one frame. Never advances the simulation.
  /// `state` must have as many particles as the one the renderer was
  /// initialized with.
  pub fn render_frame(&mut self, state: &SimulationState) -> Result<(), WebError> {
    self.running_scene()?.draw(state)
  }

  pub fn resize(&mut self, viewport: ViewportState) -> Result<(), WebError> {
    self.running_scene()?.resize(viewport);
    Ok(())
  }

  /// Releases the GPU context and stops listening on `channels`. Safe to
  /// call from any phase; the renderer is `Disposed` afterwards.
  pub fn dispose(&mut self, channels: &mut InputChannels) {
    channels.detach();
    match self.phase {
      Phase::Running => {
        self.scene = None;
        log::info!("scene renderer disposed");
      }
      Phase::Uninitialized => log::debug!("disposing a scene renderer that never started"),
      Phase::Disposed => log::debug!("scene renderer already disposed"),
    }
    self.phase = Phase::Disposed;
  }

  fn running_scene(&mut self) -> Result<&mut GpuScene, WebError> {
    match (self.phase, self.scene.as_mut()) {
      (Phase::Running, Some(scene)) => Ok(scene),
      (phase, _) => Err(WebError::NotRunning(phase)),
    }
  }
}

struct GpuScene {
  surface: wgpu::Surface<'static>,
  config: wgpu::SurfaceConfiguration,
  device: wgpu::Device,
  queue: wgpu::Queue,
  camera: Camera,
  camera_uniform: CameraUniform,
  camera_buffer: wgpu::Buffer,
  camera_bind_group: wgpu::BindGroup,
  particle_pipeline: wgpu::RenderPipeline,
  line_pipeline: wgpu::RenderPipeline,
  particle_buffer: wgpu::Buffer,
  corner_buffer: wgpu::Buffer,
  line_buffer: wgpu::Buffer,
  particle_capacity: usize,
  segment_capacity: usize,
  // segments currently non-zero on the GPU side
  uploaded_segments: usize,
}

impl GpuScene {
  async fn init(
    window: Arc<Window>,
    viewport: ViewportState,
    particle_capacity: usize,
    segment_capacity: usize,
    camera_params: &CameraParams,
  ) -> Result<Self, WebError> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
      #[cfg(not(target_arch = "wasm32"))]
      backends: wgpu::Backends::PRIMARY,
      ..Default::default()
    });
    let surface = instance.create_surface(window)?;

    let adapter = instance
      .request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: Some(&surface),
        force_fallback_adapter: false,
      })
      .await
      .ok_or(WebError::NoAdapter)?;

    let (device, queue) = adapter
      .request_device(
        &wgpu::DeviceDescriptor {
          label: Some("Particle Web Device"),
          required_features: wgpu::Features::empty(),
          required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
          memory_hints: Default::default(),
        },
        None,
      )
      .await?;

    let line_bytes =
      (segment_capacity as u64).saturating_mul(std::mem::size_of::<LineSegment>() as u64);
    let limit = device.limits().max_buffer_size;
    if line_bytes > limit {
      return Err(WebError::EdgeCapacity {
        particles: particle_capacity,
        bytes: line_bytes,
        limit,
      });
    }

    let size = viewport.physical();
    let mut config = surface
      .get_default_config(&adapter, size.width, size.height)
      .ok_or(WebError::SurfaceUnsupported)?;
    let view_format = config.format.add_srgb_suffix();
    config.view_formats.push(view_format);
    surface.configure(&device, &config);

    let camera = Camera::new(camera_params, viewport.aspect());
    let mut camera_uniform = CameraUniform::new(camera_params.sprite_size);
    camera_uniform.update_view_proj(&camera);
    let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("Camera Buffer"),
      contents: bytemuck::cast_slice(&[camera_uniform]),
      usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });
    let camera_bind_group_layout =
      device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
          binding: 0,
          visibility: wgpu::ShaderStages::VERTEX,
          ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
          },
          count: None,
        }],
        label: Some("camera_bind_group_layout"),
      });
    let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      layout: &camera_bind_group_layout,
      entries: &[wgpu::BindGroupEntry {
        binding: 0,
        resource: camera_buffer.as_entire_binding(),
      }],
      label: Some("camera_bind_group"),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
      label: Some("render"),
      bind_group_layouts: &[&camera_bind_group_layout],
      push_constant_ranges: &[],
    });

    let particle_instance = wgpu::VertexBufferLayout {
      array_stride: std::mem::size_of::<Particle>() as wgpu::BufferAddress, // pos3 + vel3 + color3
      step_mode: wgpu::VertexStepMode::Instance,
      attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x3],
    };
    let sprite_corner = wgpu::VertexBufferLayout {
      array_stride: 2 * 4,
      step_mode: wgpu::VertexStepMode::Vertex,
      attributes: &wgpu::vertex_attr_array![3 => Float32x2],
    };
    let line_vertex = wgpu::VertexBufferLayout {
      array_stride: (std::mem::size_of::<LineSegment>() / 2) as wgpu::BufferAddress, // pos3 + rgba
      step_mode: wgpu::VertexStepMode::Vertex,
      attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x4],
    };

    let particle_pipeline = create_pipeline(
      &device,
      "Particle Pipeline",
      include_str!("shaders/particles.wgsl"),
      &pipeline_layout,
      &[particle_instance, sprite_corner],
      wgpu::PrimitiveTopology::TriangleList,
      view_format,
    );
    let line_pipeline = create_pipeline(
      &device,
      "Line Pipeline",
      include_str!("shaders/lines.wgsl"),
      &pipeline_layout,
      &[line_vertex],
      wgpu::PrimitiveTopology::LineList,
      view_format,
    );

    let particle_buffer = device.create_buffer(&wgpu::BufferDescriptor {
      label: Some("Particle Buffer"),
      size: (particle_capacity.max(1) * std::mem::size_of::<Particle>()) as u64,
      usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
      mapped_at_creation: false,
    });
    let corner_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("Sprite Corner Buffer"),
      contents: bytemuck::cast_slice(&SPRITE_CORNERS),
      usage: wgpu::BufferUsages::VERTEX,
    });
    // sized for every pair connected at once, never reallocated
    let line_buffer = device.create_buffer(&wgpu::BufferDescriptor {
      label: Some("Line Buffer"),
      size: line_bytes.max(std::mem::size_of::<LineSegment>() as u64),
      usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
      mapped_at_creation: false,
    });

    Ok(Self {
      surface,
      config,
      device,
      queue,
      camera,
      camera_uniform,
      camera_buffer,
      camera_bind_group,
      particle_pipeline,
      line_pipeline,
      particle_buffer,
      corner_buffer,
      line_buffer,
      particle_capacity,
      segment_capacity,
      uploaded_segments: 0,
    })
  }

  fn resize(&mut self, viewport: ViewportState) {
    let size = viewport.physical();
    if size.width == self.config.width
      && size.height == self.config.height
      && (self.camera.aspect - viewport.aspect()).abs() < f32::EPSILON
    {
      return;
    }
    self.config.width = size.width;
    self.config.height = size.height;
    self.surface.configure(&self.device, &self.config);

    self.camera.set_aspect(viewport.aspect());
    self.camera_uniform.update_view_proj(&self.camera);
    self.queue.write_buffer(
      &self.camera_buffer,
      0,
      bytemuck::cast_slice(&[self.camera_uniform]),
    );
    log::debug!("surface resized to {}x{}", size.width, size.height);
  }

  fn acquire(&self) -> Result<wgpu::SurfaceTexture, WebError> {
    match self.surface.get_current_texture() {
      Ok(frame) => Ok(frame),
      Err(wgpu::SurfaceError::Timeout) => Ok(self.surface.get_current_texture()?),
      Err(_) => {
        self.surface.configure(&self.device, &self.config);
        Ok(self.surface.get_current_texture()?)
      }
    }
  }

  fn draw(&mut self, state: &SimulationState) -> Result<(), WebError> {
    let particles = state.particles();
    if particles.len() != self.particle_capacity || state.edge_capacity() != self.segment_capacity {
      return Err(WebError::CapacityMismatch {
        expected: self.particle_capacity,
        got: particles.len(),
      });
    }
    if !particles.is_empty() {
      self
        .queue
        .write_buffer(&self.particle_buffer, 0, bytemuck::cast_slice(particles));
    }

    // re-upload the slots drawn last frame too, the state has zeroed them
    let segments = state.segments();
    let edges = state.edge_count();
    let upload = edges.max(self.uploaded_segments);
    if upload > 0 {
      self
        .queue
        .write_buffer(&self.line_buffer, 0, bytemuck::cast_slice(&segments[..upload]));
    }
    self.uploaded_segments = edges;

    let frame = self.acquire()?;
    let view = frame.texture.create_view(&wgpu::TextureViewDescriptor {
      format: Some(self.config.view_formats[0]),
      ..wgpu::TextureViewDescriptor::default()
    });

    let mut command_encoder = self
      .device
      .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    {
      let mut rpass = command_encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Particle Web Pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
          view: &view,
          resolve_target: None,
          ops: wgpu::Operations {
            load: wgpu::LoadOp::Clear(BACKGROUND),
            store: wgpu::StoreOp::Store,
          },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
      });
      rpass.set_bind_group(0, &self.camera_bind_group, &[]);

      if edges > 0 {
        rpass.set_pipeline(&self.line_pipeline);
        rpass.set_vertex_buffer(0, self.line_buffer.slice(..));
        rpass.draw(0..(edges * 2) as u32, 0..1);
      }
      if !particles.is_empty() {
        rpass.set_pipeline(&self.particle_pipeline);
        rpass.set_vertex_buffer(0, self.particle_buffer.slice(..));
        rpass.set_vertex_buffer(1, self.corner_buffer.slice(..));
        rpass.draw(0..SPRITE_CORNERS.len() as u32, 0..particles.len() as u32);
      }
    }
    self.queue.submit(Some(command_encoder.finish()));
    frame.present();
    Ok(())
  }
}

fn create_pipeline(
  device: &wgpu::Device,
  label: &str,
  source: &str,
  layout: &wgpu::PipelineLayout,
  buffers: &[wgpu::VertexBufferLayout],
  topology: wgpu::PrimitiveTopology,
  format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
  let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
    label: Some(label),
    source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
  });
  device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
    label: Some(label),
    layout: Some(layout),
    vertex: wgpu::VertexState {
      module: &shader,
      entry_point: "main_vs",
      compilation_options: PipelineCompilationOptions::default(),
      buffers,
    },
    fragment: Some(wgpu::FragmentState {
      module: &shader,
      entry_point: "main_fs",
      compilation_options: PipelineCompilationOptions::default(),
      targets: &[Some(wgpu::ColorTargetState {
        format,
        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
        write_mask: wgpu::ColorWrites::ALL,
      })],
    }),
    primitive: wgpu::PrimitiveState {
      topology,
      ..Default::default()
    },
    depth_stencil: None,
    multisample: wgpu::MultisampleState::default(),
    multiview: None,
    cache: None,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn empty_state() -> SimulationState {
    SimulationState::from_particles(Vec::new()).unwrap()
  }

  #[test]
  fn render_before_initialize_is_refused() {
    let mut renderer = SceneRenderer::default();
    let err = renderer.render_frame(&empty_state()).unwrap_err();
    assert!(matches!(err, WebError::NotRunning(Phase::Uninitialized)));
    assert_eq!(renderer.phase(), Phase::Uninitialized);
  }

  #[test]
  fn resize_before_initialize_is_refused() {
    let mut renderer = SceneRenderer::default();
    let err = renderer
      .resize(ViewportState::new(800.0, 600.0, 1.0))
      .unwrap_err();
    assert!(matches!(err, WebError::NotRunning(Phase::Uninitialized)));
  }

  #[test]
  fn disposed_renderer_stays_disposed() {
    let mut renderer = SceneRenderer::default();
    let mut channels = InputChannels::default();
    channels.attach();

    renderer.dispose(&mut channels);
    assert_eq!(renderer.phase(), Phase::Disposed);
    assert!(!channels.is_attached());

    let err = renderer.render_frame(&empty_state()).unwrap_err();
    assert!(matches!(err, WebError::NotRunning(Phase::Disposed)));
    let err = renderer
      .resize(ViewportState::new(10.0, 10.0, 1.0))
      .unwrap_err();
    assert!(matches!(err, WebError::NotRunning(Phase::Disposed)));

    renderer.dispose(&mut channels);
    assert_eq!(renderer.phase(), Phase::Disposed);
  }

  #[test]
  fn phase_names_read_well_in_errors() {
    let err = WebError::NotRunning(Phase::Disposed);
    assert_eq!(
      err.to_string(),
      "the scene renderer is disposed, but the operation requires it to be running"
    );
  }
}
