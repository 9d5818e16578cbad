//! Pointer and viewport state fed to the simulation by the host.
//!
//! Events arrive between frames and are held in single-slot channels: a newer
//! value replaces an older unread one, and the frame loop drains each slot
//! once at the top of a tick.

use crate::REDUCED_MODE_BREAKPOINT;
use cgmath::Point3;
use winit::dpi::PhysicalSize;

/// Holds only the most recent unread value.
#[derive(Debug)]
pub struct Latest<T> {
  value: Option<T>,
}

impl<T> Default for Latest<T> {
  fn default() -> Self {
    Self { value: None }
  }
}

impl<T> Latest<T> {
  pub fn publish(&mut self, value: T) {
    self.value = Some(value);
  }

  pub fn take(&mut self) -> Option<T> {
    self.value.take()
  }
}

/// Drawable area in logical pixels plus the device pixel ratio.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ViewportState {
  pub width: f64,
  pub height: f64,
  pub pixel_ratio: f64,
}

impl ViewportState {
  pub fn new(width: f64, height: f64, pixel_ratio: f64) -> Self {
    Self {
      width,
      height,
      pixel_ratio,
    }
  }

  /// Viewport of a window whose backing surface is `size` physical pixels.
  pub fn from_physical(size: PhysicalSize<u32>, scale_factor: f64) -> Self {
    let ratio = if scale_factor > 0.0 { scale_factor } else { 1.0 };
    Self {
      width: f64::from(size.width) / ratio,
      height: f64::from(size.height) / ratio,
      pixel_ratio: ratio,
    }
  }

  /// Backing surface size, never smaller than 1x1.
  pub fn physical(&self) -> PhysicalSize<u32> {
    let width = (self.width * self.pixel_ratio).round().max(1.0) as u32;
    let height = (self.height * self.pixel_ratio).round().max(1.0) as u32;
    PhysicalSize::new(width, height)
  }

  pub fn aspect(&self) -> f32 {
    let size = self.physical();
    size.width as f32 / size.height as f32
  }
}

/// Pointer position normalized to `[-1, 1]` on both axes, y pointing up.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PointerState {
  pub x: f32,
  pub y: f32,
}

impl PointerState {
  /// Normalizes physical screen coordinates against `viewport`.
  pub fn from_screen(x: f64, y: f64, viewport: &ViewportState) -> Self {
    let size = viewport.physical();
    let nx = x / f64::from(size.width) * 2.0 - 1.0;
    let ny = -(y / f64::from(size.height) * 2.0 - 1.0);
    Self {
      x: nx.clamp(-1.0, 1.0) as f32,
      y: ny.clamp(-1.0, 1.0) as f32,
    }
  }

  /// Pointer on the z = 0 plane of the simulation.
  pub fn world(&self, scale: f32) -> Point3<f32> {
    Point3::new(self.x * scale, self.y * scale, 0.0)
  }
}

/// Event slots written by the host and drained by the frame loop. Publishing
/// while detached is a no-op, which is how listeners are unregistered.
#[derive(Debug, Default)]
pub struct InputChannels {
  pointer: Latest<(f64, f64)>,
  viewport: Latest<ViewportState>,
  attached: bool,
}

impl InputChannels {
  pub fn attach(&mut self) {
    self.attached = true;
  }

  pub fn detach(&mut self) {
    self.attached = false;
    self.pointer.take();
    self.viewport.take();
  }

  pub fn is_attached(&self) -> bool {
    self.attached
  }

  /// Raw physical pointer coordinates, normalized when the next tick runs.
  pub fn publish_pointer(&mut self, x: f64, y: f64) {
    if self.attached {
      self.pointer.publish((x, y));
    }
  }

  pub fn publish_viewport(&mut self, viewport: ViewportState) {
    if self.attached {
      self.viewport.publish(viewport);
    }
  }

  pub fn take_pointer(&mut self) -> Option<(f64, f64)> {
    self.pointer.take()
  }

  pub fn take_viewport(&mut self) -> Option<ViewportState> {
    self.viewport.take()
  }
}

/// Capability check made once by the host at mount time.
pub fn is_reduced_mode(logical_width: f64) -> bool {
  logical_width <= REDUCED_MODE_BREAKPOINT
}
