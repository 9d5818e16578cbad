use cgmath::{InnerSpace, Point3, Vector3};
use particle_web::input::ViewportState;
use particle_web::physics::PhysicsStepper;
use particle_web::simulation::SimulationState;
use particle_web::state::Session;
use particle_web::{CameraParams, LineSegment, Particle, WebParams};

/// Particle at `pos` with velocity `vel`
pub fn particle(pos: [f32; 3], vel: [f32; 3]) -> Particle {
  Particle {
    pos,
    vel,
    color: WebParams::default().palette.particle,
  }
}

/// Default parameters with a smaller particle count
pub fn test_params(num_particles: u32) -> WebParams {
  WebParams {
    num_particles,
    ..Default::default()
  }
}

/// A pointer nowhere near the simulation cube
pub fn far_pointer() -> Point3<f32> {
  Point3::new(1.0e4, 1.0e4, 1.0e4)
}

// ==================================================================================
// Scenario tests
// ==================================================================================

#[test]
fn four_particles_one_edge() {
  // one pair 5 apart, one pair 50 apart, pointer at the origin and > 50 from all
  let mut state = SimulationState::from_particles(vec![
    particle([-90.0, -90.0, 0.0], [0.0; 3]),
    particle([-85.0, -90.0, 0.0], [0.0; 3]),
    particle([90.0, 90.0, 0.0], [0.0; 3]),
    particle([90.0, 40.0, 0.0], [0.0; 3]),
  ])
  .unwrap();
  let params = test_params(4);
  let stepper = PhysicsStepper::new(params);

  stepper.step(&mut state, Point3::new(0.0, 0.0, 0.0));

  assert_eq!(state.edge_count(), 1);
  let edge = state.active_segments()[0];
  assert_eq!(edge.start.pos, [-90.0, -90.0, 0.0]);
  assert_eq!(edge.end.pos, [-85.0, -90.0, 0.0]);
  assert!((edge.start.color[3] - 0.2).abs() < 1e-6);
  assert_eq!(edge.start.color, edge.end.color);
  assert!(state.segments()[1..]
    .iter()
    .all(|s| *s == LineSegment::default()));
  for p in state.particles() {
    assert_eq!(p.color, params.palette.particle);
  }
}

#[test]
fn edge_threshold_is_strict() {
  let mut state = SimulationState::from_particles(vec![
    particle([0.0, 0.0, 0.0], [0.0; 3]),
    particle([14.999, 0.0, 0.0], [0.0; 3]),
    particle([50.0, 0.0, 0.0], [0.0; 3]),
    particle([65.001, 0.0, 0.0], [0.0; 3]),
  ])
  .unwrap();
  PhysicsStepper::new(test_params(4)).step(&mut state, far_pointer());

  assert_eq!(state.edge_count(), 1);
  assert_eq!(state.active_segments()[0].end.pos, [14.999, 0.0, 0.0]);
}

#[test]
fn edge_at_exact_threshold_is_not_emitted() {
  let mut state = SimulationState::from_particles(vec![
    particle([0.0, 0.0, 0.0], [0.0; 3]),
    particle([0.0, 15.0, 0.0], [0.0; 3]),
  ])
  .unwrap();
  PhysicsStepper::new(test_params(2)).step(&mut state, far_pointer());
  assert_eq!(state.edge_count(), 0);
}

#[test]
fn stale_edges_are_cleared() {
  // second particle drifts 3 units per frame: 13 apart, then 16 apart
  let mut state = SimulationState::from_particles(vec![
    particle([0.0, 0.0, 0.0], [0.0; 3]),
    particle([10.0, 0.0, 0.0], [3.0, 0.0, 0.0]),
  ])
  .unwrap();
  let stepper = PhysicsStepper::new(test_params(2));

  stepper.step(&mut state, far_pointer());
  assert_eq!(state.edge_count(), 1);

  stepper.step(&mut state, far_pointer());
  assert_eq!(state.edge_count(), 0);
  assert_eq!(state.segments()[0], LineSegment::default());
}

#[test]
fn edges_near_the_pointer_are_brighter() {
  let mut state = SimulationState::from_particles(vec![
    particle([-2.0, 0.0, 0.0], [0.0; 3]),
    particle([2.0, 0.0, 0.0], [0.0; 3]),
    particle([-2.0, 90.0, 0.0], [0.0; 3]),
    particle([2.0, 90.0, 0.0], [0.0; 3]),
  ])
  .unwrap();
  let params = test_params(4);
  PhysicsStepper::new(params).step(&mut state, Point3::new(0.0, 0.0, 20.0));

  assert_eq!(state.edge_count(), 2);
  let near = state.active_segments()[0];
  let far = state.active_segments()[1];
  // midpoint 20 from the pointer: influence 0.6
  assert!((near.start.color[3] - (0.2 + 0.8 * 0.6)).abs() < 1e-5);
  assert!((far.start.color[3] - 0.2).abs() < 1e-6);
  for segment in state.active_segments() {
    assert!((0.2..=1.0).contains(&segment.start.color[3]));
  }
}

// ==================================================================================
// Physics tests
// ==================================================================================

#[test]
fn particles_stay_in_the_box() {
  let params = test_params(100);
  let mut state = SimulationState::seeded(&params).unwrap();
  let stepper = PhysicsStepper::new(params);
  let limit = params.bounds + params.speed_limit / 2.0 + 1e-3;

  for _ in 0..3000 {
    stepper.step(&mut state, far_pointer());
    for p in state.particles() {
      for axis in 0..3 {
        assert!(
          p.pos[axis].abs() <= limit,
          "{:?} escaped past {limit}",
          p.pos
        );
      }
    }
  }
}

#[test]
fn bounce_flips_only_the_crossing_axis() {
  let mut state =
    SimulationState::from_particles(vec![particle([99.95, 10.0, -5.0], [0.1, 0.05, -0.05])])
      .unwrap();
  PhysicsStepper::new(test_params(1)).step(&mut state, far_pointer());

  let p = state.particles()[0];
  assert!(p.pos[0] > 100.0);
  assert_eq!(p.vel, [-0.1, 0.05, -0.05]);
}

#[test]
fn seeded_runs_are_bit_identical() {
  let params = test_params(150);
  let stepper = PhysicsStepper::new(params);
  let mut a = SimulationState::seeded(&params).unwrap();
  let mut b = SimulationState::seeded(&params).unwrap();

  for frame in 0..120 {
    let t = frame as f32 * 0.05;
    let pointer = Point3::new(t.cos() * 60.0, t.sin() * 60.0, 0.0);
    stepper.step(&mut a, pointer);
    stepper.step(&mut b, pointer);
  }

  let bytes_a: &[u8] = bytemuck::cast_slice(a.particles());
  let bytes_b: &[u8] = bytemuck::cast_slice(b.particles());
  assert_eq!(bytes_a, bytes_b);
  assert_eq!(a.edge_count(), b.edge_count());
  assert_eq!(a.active_segments(), b.active_segments());
}

#[test]
fn repulsion_weakens_with_distance() {
  let stepper = PhysicsStepper::new(WebParams::default());
  let mut previous = f32::INFINITY;
  for d in 1..50 {
    let force = stepper
      .repulsion(Vector3::new(d as f32, 0.0, 0.0))
      .magnitude();
    assert!(force <= previous, "force grew at distance {d}");
    assert!(force > 0.0);
    previous = force;
  }
}

#[test]
fn pointer_pushes_and_recolors_nearby_particles() {
  let params = test_params(1);
  let mut state =
    SimulationState::from_particles(vec![particle([10.0, 0.0, 0.0], [0.0; 3])]).unwrap();
  PhysicsStepper::new(params).step(&mut state, Point3::new(0.0, 0.0, 0.0));

  let p = state.particles()[0];
  // 10 / 10 away from the pointer along +x
  assert!((p.vel[0] - 1.0).abs() < 1e-6);
  assert_eq!(p.vel[1], 0.0);
  let expected = particle_web::mix(params.palette.particle, params.palette.particle_near, 0.8);
  for channel in 0..3 {
    assert!((p.color[channel] - expected[channel]).abs() < 1e-6);
  }
}

#[test]
fn particle_on_the_pointer_stays_finite() {
  let mut state =
    SimulationState::from_particles(vec![particle([0.0, 0.0, 0.0], [0.0; 3])]).unwrap();
  PhysicsStepper::new(test_params(1)).step(&mut state, Point3::new(0.0, 0.0, 0.0));

  let p = state.particles()[0];
  assert!(p.vel.iter().all(|v| v.is_finite()));
  let near = WebParams::default().palette.particle_near;
  for channel in 0..3 {
    assert!((p.color[channel] - near[channel]).abs() < 1e-6);
  }
}

#[test]
fn particles_leaving_the_radius_return_to_base_color() {
  let params = test_params(1);
  let stepper = PhysicsStepper::new(params);
  let mut state =
    SimulationState::from_particles(vec![particle([5.0, 0.0, 0.0], [0.0; 3])]).unwrap();

  stepper.step(&mut state, Point3::new(0.0, 0.0, 0.0));
  assert_ne!(state.particles()[0].color, params.palette.particle);

  stepper.step(&mut state, far_pointer());
  assert_eq!(state.particles()[0].color, params.palette.particle);
}

// ==================================================================================
// Session tests
// ==================================================================================

#[test]
fn session_normalizes_the_latest_pointer() {
  let params = test_params(2);
  let state = SimulationState::from_particles(vec![
    particle([50.0, 50.0, 0.0], [0.0; 3]),
    particle([-50.0, -50.0, 0.0], [0.0; 3]),
  ])
  .unwrap();
  let mut session = Session::with_state(
    params,
    CameraParams::default(),
    ViewportState::new(800.0, 600.0, 1.0),
    state,
  );
  session.channels_mut().attach();

  session.channels_mut().publish_pointer(0.0, 0.0);
  session.channels_mut().publish_pointer(600.0, 150.0);
  session.advance().unwrap();

  let pointer = session.pointer();
  assert!((pointer.x - 0.5).abs() < 1e-6);
  assert!((pointer.y - 0.5).abs() < 1e-6);
  // the particle under the pointer was pushed, the far one was not
  let near = session.state().particles()[0];
  let far = session.state().particles()[1];
  assert_ne!(near.color, params.palette.particle);
  assert_eq!(far.color, params.palette.particle);
}

#[test]
fn session_applies_resizes_before_stepping() {
  let mut session = Session::with_state(
    test_params(0),
    CameraParams::default(),
    ViewportState::new(800.0, 600.0, 1.0),
    SimulationState::from_particles(Vec::new()).unwrap(),
  );
  session.channels_mut().attach();
  session
    .channels_mut()
    .publish_viewport(ViewportState::new(400.0, 400.0, 2.0));
  session.channels_mut().publish_pointer(800.0, 800.0);
  session.advance().unwrap();

  assert_eq!(session.viewport(), ViewportState::new(400.0, 400.0, 2.0));
  assert_eq!(session.pointer().x, 1.0);
  assert_eq!(session.pointer().y, -1.0);
}

#[test]
fn session_without_renderer_refuses_to_draw() {
  let mut session = Session::new(
    test_params(3),
    CameraParams::default(),
    ViewportState::new(800.0, 600.0, 1.0),
  )
  .unwrap();
  let err = session.tick().unwrap_err();
  assert!(matches!(err, particle_web::WebError::NotRunning(_)));
  // the step still happened, drawing is what failed
  assert_eq!(session.frame(), 1);
}

#[test]
fn session_takes_its_particle_count_from_the_state() {
  // declared 2, handed 4 within connection distance of each other
  let state = SimulationState::from_particles(
    (0..4)
      .map(|i| particle([80.0 + i as f32, 80.0, 0.0], [0.0; 3]))
      .collect(),
  )
  .unwrap();
  let mut session = Session::with_state(
    test_params(2),
    CameraParams::default(),
    ViewportState::new(800.0, 600.0, 1.0),
    state,
  );
  assert_eq!(session.params().num_particles, 4);
  assert_eq!(session.params().edge_capacity(), Some(6));
  assert_eq!(session.state().edge_capacity(), 6);

  session.advance().unwrap();
  assert_eq!(session.state().edge_count(), 6);
  assert_eq!(session.state().active_segments().len(), 6);
}

#[test]
fn session_with_an_impossible_particle_count_fails_to_build() {
  let result = Session::new(
    test_params(u32::MAX),
    CameraParams::default(),
    ViewportState::new(800.0, 600.0, 1.0),
  );
  assert!(matches!(
    result,
    Err(particle_web::WebError::EdgeAllocation { particles }) if particles == u32::MAX as usize
  ));
}
