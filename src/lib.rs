pub mod camera;
pub mod error;
pub mod initialize;
pub mod input;
pub mod physics;
pub mod render;
pub mod simulation;
pub mod state;

pub use error::WebError;

/// Viewports at or below this logical width skip the particle web entirely.
pub const REDUCED_MODE_BREAKPOINT: f64 = 768.0;

#[derive(Copy, Clone, Debug)]
pub struct WebParams {
  pub num_particles: u32,
  pub bounds: f32,
  pub speed_limit: f32,
  pub repulsion_radius: f32,
  pub repulsion_strength: f32,
  pub min_repulsion_distance: f32,
  pub connection_distance: f32,
  pub pointer_scale: f32,
  pub seed: u64,
  pub palette: Palette,
}

impl Default for WebParams {
  fn default() -> Self {
    Self {
      num_particles: 1000,
      bounds: 100.0,
      speed_limit: 0.2,
      repulsion_radius: 50.0,
      repulsion_strength: 10.0,
      // keeps 10 / distance finite when a particle sits on the pointer
      min_repulsion_distance: 0.01,
      connection_distance: 15.0,
      pointer_scale: 100.0,
      seed: 42,
      palette: Palette::default(),
    }
  }
}

impl WebParams {
  /// Number of segments needed if every pair of particles were connected,
  /// or `None` when that count does not fit in a `usize`.
  #[must_use]
  pub fn edge_capacity(&self) -> Option<usize> {
    pair_count(self.num_particles as usize)
  }
}

/// `n * (n - 1) / 2` without intermediate overflow.
#[must_use]
pub fn pair_count(n: usize) -> Option<usize> {
  if n < 2 {
    return Some(0);
  }
  if n % 2 == 0 {
    (n / 2).checked_mul(n - 1)
  } else {
    n.checked_mul((n - 1) / 2)
  }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Palette {
  pub particle: [f32; 3],
  pub particle_near: [f32; 3],
  pub line: [f32; 3],
  pub line_highlight: [f32; 3],
  pub min_line_opacity: f32,
}

impl Default for Palette {
  fn default() -> Self {
    Self {
      particle: [0.39, 0.40, 0.95],
      particle_near: [0.93, 0.29, 0.60],
      line: [0.30, 0.35, 0.80],
      line_highlight: [0.98, 0.45, 0.70],
      min_line_opacity: 0.2,
    }
  }
}

pub struct CameraParams {
  pub fovy: f32,
  pub znear: f32,
  pub zfar: f32,
  pub distance: f32,
  pub sprite_size: f32,
}

impl Default for CameraParams {
  fn default() -> Self {
    Self {
      fovy: 75.0,
      znear: 0.1,
      zfar: 1000.0,
      distance: 150.0,
      sprite_size: 0.8,
    }
  }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Particle {
  pub pos: [f32; 3],
  pub vel: [f32; 3],
  pub color: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
  pub pos: [f32; 3],
  /// rgb plus opacity
  pub color: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineSegment {
  pub start: LineVertex,
  pub end: LineVertex,
}

/// Component-wise linear blend from `a` to `b`.
#[must_use]
pub fn mix(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
  [
    a[0] + (b[0] - a[0]) * t,
    a[1] + (b[1] - a[1]) * t,
    a[2] + (b[2] - a[2]) * t,
  ]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn edge_capacity_covers_all_pairs() {
    let params = WebParams {
      num_particles: 4,
      ..Default::default()
    };
    assert_eq!(params.edge_capacity(), Some(6));
    assert_eq!(WebParams::default().edge_capacity(), Some(499_500));
  }

  #[test]
  fn edge_capacity_of_empty_web() {
    let params = WebParams {
      num_particles: 0,
      ..Default::default()
    };
    assert_eq!(params.edge_capacity(), Some(0));
  }

  #[test]
  fn pair_count_handles_odd_and_huge_counts() {
    assert_eq!(pair_count(1), Some(0));
    assert_eq!(pair_count(5), Some(10));
    assert_eq!(pair_count(1 << 16), Some((1 << 15) * ((1 << 16) - 1)));
    assert_eq!(pair_count(usize::MAX), None);
  }

  #[test]
  fn mix_endpoints() {
    let a = [0.0, 0.5, 1.0];
    let b = [1.0, 0.5, 0.0];
    assert_eq!(mix(a, b, 0.0), a);
    assert_eq!(mix(a, b, 1.0), b);
    assert_eq!(mix(a, b, 0.5), [0.5, 0.5, 0.5]);
  }

  #[test]
  fn gpu_layouts_are_tightly_packed() {
    assert_eq!(std::mem::size_of::<Particle>(), 9 * 4);
    assert_eq!(std::mem::size_of::<LineVertex>(), 7 * 4);
    assert_eq!(std::mem::size_of::<LineSegment>(), 14 * 4);
  }
}
