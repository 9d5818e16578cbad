use thiserror::Error;

use crate::render::Phase;

/// Everything that can go wrong while mounting, driving, or tearing down the
/// particle web.
#[derive(Error, Debug)]
pub enum WebError {
  #[error("the scene renderer is {0}, but the operation requires it to be running")]
  NotRunning(Phase),

  #[error("the scene renderer is {0} and cannot be initialized again")]
  AlreadyInitialized(Phase),

  #[error("unable to create a drawing surface for the window")]
  CreateSurface(#[from] wgpu::CreateSurfaceError),

  #[error("no graphics adapter is compatible with the drawing surface")]
  NoAdapter,

  #[error("unable to open the graphics device")]
  RequestDevice(#[from] wgpu::RequestDeviceError),

  #[error("the drawing surface is not supported by the selected adapter")]
  SurfaceUnsupported,

  #[error("unable to acquire the next frame from the drawing surface")]
  AcquireFrame(#[from] wgpu::SurfaceError),

  #[error("unable to allocate an edge buffer for {particles} particles")]
  EdgeAllocation { particles: usize },

  #[error("{particles} particles need a {bytes} byte edge buffer, the device allows {limit}")]
  EdgeCapacity {
    particles: usize,
    bytes: u64,
    limit: u64,
  },

  #[error("the frame holds {got} particles but the scene was sized for {expected}")]
  CapacityMismatch { expected: usize, got: usize },

  #[error("the window event loop failed")]
  EventLoop(#[from] winit::error::EventLoopError),

  #[error("unable to create the window")]
  Window(#[from] winit::error::OsError),

  #[error("unable to install the interrupt handler")]
  Interrupt(#[from] ctrlc::Error),
}
