use crate::input::{is_reduced_mode, InputChannels, PointerState, ViewportState};
use crate::physics::PhysicsStepper;
use crate::render::SceneRenderer;
use crate::simulation::SimulationState;
use crate::{CameraParams, WebError, WebParams};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use winit::event::ElementState;
use winit::keyboard::*;
use winit::{
  event::{Event, KeyEvent, StartCause, WindowEvent},
  event_loop::{EventLoop, EventLoopWindowTarget},
  window::{Window, WindowBuilder},
};

const STATS_INTERVAL: u64 = 600;

/// Everything one mounted particle web needs between frames. Pointer and
/// viewport live here rather than in globals, and are only updated from the
/// input channels at the top of a tick.
pub struct Session {
  params: WebParams,
  state: SimulationState,
  stepper: PhysicsStepper,
  renderer: SceneRenderer,
  channels: InputChannels,
  pointer: PointerState,
  viewport: ViewportState,
  frame: u64,
}

impl Session {
  pub fn new(
    params: WebParams,
    camera: CameraParams,
    viewport: ViewportState,
  ) -> Result<Self, WebError> {
    let state = SimulationState::seeded(&params)?;
    Ok(Self::with_state(params, camera, viewport, state))
  }

  /// Wraps an existing `state`. Its particle count overrides
  /// `params.num_particles`, which is what the renderer sizes its buffers by.
  pub fn with_state(
    mut params: WebParams,
    camera: CameraParams,
    viewport: ViewportState,
    state: SimulationState,
  ) -> Self {
    let count = state.particles().len() as u32;
    if params.num_particles != count {
      log::debug!(
        "session holds {} particles, ignoring num_particles = {}",
        count,
        params.num_particles
      );
      params.num_particles = count;
    }
    Self {
      params,
      state,
      stepper: PhysicsStepper::new(params),
      renderer: SceneRenderer::new(camera),
      channels: InputChannels::default(),
      pointer: PointerState::default(),
      viewport,
      frame: 0,
    }
  }

  pub fn params(&self) -> &WebParams {
    &self.params
  }

  pub fn state(&self) -> &SimulationState {
    &self.state
  }

  pub fn renderer(&self) -> &SceneRenderer {
    &self.renderer
  }

  pub fn pointer(&self) -> PointerState {
    self.pointer
  }

  pub fn viewport(&self) -> ViewportState {
    self.viewport
  }

  pub fn frame(&self) -> u64 {
    self.frame
  }

  pub fn is_running(&self) -> bool {
    self.renderer.is_running()
  }

  /// Where the host forwards pointer and resize events.
  pub fn channels_mut(&mut self) -> &mut InputChannels {
    &mut self.channels
  }

  pub fn mount(&mut self, window: Arc<Window>) -> Result<(), WebError> {
    self
      .renderer
      .initialize(window, self.viewport, &self.state, &mut self.channels)
  }

  /// Pairs with a successful [`Session::mount`]; does nothing otherwise.
  pub fn unmount(&mut self) {
    if self.renderer.is_running() {
      self.renderer.dispose(&mut self.channels);
    }
  }

  /// Applies pending input and steps the simulation once, without drawing.
  pub fn advance(&mut self) -> Result<(), WebError> {
    if let Some(viewport) = self.channels.take_viewport() {
      self.viewport = viewport;
      if self.renderer.is_running() {
        self.renderer.resize(viewport)?;
      }
    }
    if let Some((x, y)) = self.channels.take_pointer() {
      self.pointer = PointerState::from_screen(x, y, &self.viewport);
    }

    let pointer = self.pointer.world(self.params.pointer_scale);
    self.stepper.step(&mut self.state, pointer);
    self.frame += 1;

    if self.frame % STATS_INTERVAL == 0 {
      log::debug!(
        "frame {}: {} edges, pointer at ({:.2}, {:.2})",
        self.frame,
        self.state.edge_count(),
        self.pointer.x,
        self.pointer.y
      );
    }
    Ok(())
  }

  /// One scheduled frame: step, then draw.
  pub fn tick(&mut self) -> Result<(), WebError> {
    self.advance()?;
    self.renderer.render_frame(&self.state)
  }
}

pub struct RunOptions {
  /// Forces the reduced-mode decision instead of deriving it from the window.
  pub reduced: Option<bool>,
  pub headless: bool,
  /// Frames to simulate in headless mode.
  pub frames: u64,
}

impl Default for RunOptions {
  fn default() -> Self {
    Self {
      reduced: None,
      headless: false,
      frames: 600,
    }
  }
}

pub fn run(params: WebParams, options: RunOptions) -> Result<(), WebError> {
  if options.headless {
    run_headless(params, options.frames)
  } else {
    run_windowed(params, options.reduced)
  }
}

fn run_windowed(params: WebParams, reduced: Option<bool>) -> Result<(), WebError> {
  let event_loop = EventLoop::new()?;
  let window = Arc::new(
    WindowBuilder::new()
      .with_title("Particle Web")
      .build(&event_loop)?,
  );
  let viewport = ViewportState::from_physical(window.inner_size(), window.scale_factor());
  // made once at mount, later resizes never revisit it
  let reduced = reduced.unwrap_or_else(|| is_reduced_mode(viewport.width));
  let mut session = Session::new(params, CameraParams::default(), viewport)?;

  event_loop.run(move |event, target: &EventLoopWindowTarget<()>| match event {
    Event::NewEvents(StartCause::Init) => {
      if reduced {
        log::info!(
          "reduced mode at {:.0}px wide, particle web skipped",
          viewport.width
        );
      } else if let Err(err) = session.mount(window.clone()) {
        log::warn!("particle web unavailable: {err}");
      }
    }
    Event::WindowEvent { event, window_id } if window_id == window.id() => match event {
      WindowEvent::CloseRequested
      | WindowEvent::KeyboardInput {
        event:
          KeyEvent {
            state: ElementState::Pressed,
            physical_key: PhysicalKey::Code(KeyCode::Escape),
            ..
          },
        ..
      } => {
        session.unmount();
        target.exit();
      }
      WindowEvent::Resized(size) => {
        let viewport = ViewportState::from_physical(size, window.scale_factor());
        session.channels_mut().publish_viewport(viewport);
      }
      WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
        let viewport = ViewportState::from_physical(window.inner_size(), scale_factor);
        session.channels_mut().publish_viewport(viewport);
      }
      WindowEvent::CursorMoved { position, .. } => {
        session.channels_mut().publish_pointer(position.x, position.y);
      }
      WindowEvent::RedrawRequested => {
        if session.is_running() {
          if let Err(err) = session.tick() {
            log::error!("particle web frame failed, stopping: {err}");
            session.unmount();
          }
        }
      }
      _ => {}
    },
    // the loop stops by no longer asking for frames
    Event::AboutToWait => {
      if session.is_running() {
        window.request_redraw();
      }
    }
    Event::LoopExiting => session.unmount(),
    _ => {}
  })?;
  Ok(())
}

fn run_headless(params: WebParams, frames: u64) -> Result<(), WebError> {
  let stop = Arc::new(AtomicBool::new(false));
  {
    let stop = stop.clone();
    ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))?;
  }

  let viewport = ViewportState::new(1280.0, 720.0, 1.0);
  let mut session = Session::new(params, CameraParams::default(), viewport)?;
  session.channels_mut().attach();
  log::info!(
    "headless run: {} particles for {} frames",
    params.num_particles,
    frames
  );

  let started = Instant::now();
  let mut peak_edges = 0;
  while session.frame() < frames && !stop.load(Ordering::SeqCst) {
    let (x, y) = orbit(session.frame(), &viewport);
    session.channels_mut().publish_pointer(x, y);
    session.advance()?;
    peak_edges = peak_edges.max(session.state().edge_count());
  }
  session.channels_mut().detach();

  let elapsed = started.elapsed();
  log::info!(
    "{} frames in {:.2?} ({:.1} fps), {} edges on the last frame, {} at peak",
    session.frame(),
    elapsed,
    session.frame() as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
    session.state().edge_count(),
    peak_edges
  );
  Ok(())
}

/// Synthetic pointer circling the middle of the viewport.
fn orbit(frame: u64, viewport: &ViewportState) -> (f64, f64) {
  let size = viewport.physical();
  let (w, h) = (f64::from(size.width), f64::from(size.height));
  let radius = 0.3 * w.min(h);
  let angle = frame as f64 * 0.01;
  (w / 2.0 + radius * angle.cos(), h / 2.0 + radius * angle.sin())
}
