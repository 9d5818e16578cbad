//! Canonical particle storage and the per-frame edge buffer.
//!
//! The particle array and the edge buffer are allocated once and never grow.
//! Only the physics stepper writes to them; everything else sees read-only
//! slices.

use crate::initialize::scatter_particles;
use crate::{pair_count, LineSegment, Particle, WebError, WebParams};
use rand::{rngs::SmallRng, Rng, SeedableRng};

pub struct SimulationState {
  particles: Vec<Particle>,
  segments: Vec<LineSegment>,
  edge_count: usize,
  // highest slot filled since the last rebuild, everything past it is zero
  high_water: usize,
}

impl SimulationState {
  /// Builds a state with randomly scattered particles drawn from `rng`.
  ///
  /// The edge buffer is reserved before any particle is generated, so an
  /// impossible particle count fails without touching `rng`.
  pub fn initialize<R: Rng + ?Sized>(params: &WebParams, rng: &mut R) -> Result<Self, WebError> {
    let segments = allocate_segments(params.num_particles as usize)?;
    Ok(Self::with_segments(scatter_particles(rng, params), segments))
  }

  /// Builds a state whose layout depends only on `params.seed`.
  pub fn seeded(params: &WebParams) -> Result<Self, WebError> {
    let mut rng = SmallRng::seed_from_u64(params.seed);
    Self::initialize(params, &mut rng)
  }

  /// Builds a state around a known set of particles.
  pub fn from_particles(particles: Vec<Particle>) -> Result<Self, WebError> {
    let segments = allocate_segments(particles.len())?;
    Ok(Self::with_segments(particles, segments))
  }

  fn with_segments(particles: Vec<Particle>, segments: Vec<LineSegment>) -> Self {
    Self {
      particles,
      segments,
      edge_count: 0,
      high_water: 0,
    }
  }

  pub fn particles(&self) -> &[Particle] {
    &self.particles
  }

  /// The whole preallocated edge buffer, including zeroed unused slots.
  pub fn segments(&self) -> &[LineSegment] {
    &self.segments
  }

  pub fn active_segments(&self) -> &[LineSegment] {
    &self.segments[..self.edge_count]
  }

  pub fn edge_count(&self) -> usize {
    self.edge_count
  }

  pub fn edge_capacity(&self) -> usize {
    self.segments.len()
  }

  pub(crate) fn particles_mut(&mut self) -> &mut [Particle] {
    &mut self.particles
  }

  /// Splits the state so edges can be written while particles are read.
  pub(crate) fn edge_writer(&mut self) -> (&[Particle], EdgeWriter<'_>) {
    let writer = EdgeWriter {
      segments: &mut self.segments,
      edge_count: &mut self.edge_count,
      high_water: &mut self.high_water,
      written: 0,
    };
    (&self.particles, writer)
  }
}

/// Zeroed edge buffer with a slot for every pair of `particles`.
fn allocate_segments(particles: usize) -> Result<Vec<LineSegment>, WebError> {
  let failed = || WebError::EdgeAllocation { particles };
  let capacity = pair_count(particles).ok_or_else(failed)?;
  capacity
    .checked_mul(std::mem::size_of::<LineSegment>())
    .ok_or_else(failed)?;

  let mut segments = Vec::new();
  segments
    .try_reserve_exact(capacity)
    .map_err(|_| failed())?;
  segments.resize(capacity, LineSegment::default());
  Ok(segments)
}

/// Write cursor for one edge rebuild. Dropping it commits the new edge count
/// and zeroes whatever the previous frame left behind.
pub(crate) struct EdgeWriter<'a> {
  segments: &'a mut [LineSegment],
  edge_count: &'a mut usize,
  high_water: &'a mut usize,
  written: usize,
}

impl EdgeWriter<'_> {
  pub(crate) fn push(&mut self, segment: LineSegment) {
    // capacity covers every pair, so a full buffer means a caller bug
    debug_assert!(self.written < self.segments.len());
    if let Some(slot) = self.segments.get_mut(self.written) {
      *slot = segment;
      self.written += 1;
    }
  }
}

impl Drop for EdgeWriter<'_> {
  fn drop(&mut self) {
    if *self.high_water > self.written {
      self.segments[self.written..*self.high_water].fill(LineSegment::default());
    }
    *self.edge_count = self.written;
    *self.high_water = self.written;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::LineVertex;

  fn still(x: f32) -> Particle {
    Particle {
      pos: [x, 0.0, 0.0],
      vel: [0.0; 3],
      color: [1.0; 3],
    }
  }

  fn segment(tag: f32) -> LineSegment {
    LineSegment {
      start: LineVertex {
        pos: [tag; 3],
        color: [1.0; 4],
      },
      end: LineVertex {
        pos: [-tag; 3],
        color: [1.0; 4],
      },
    }
  }

  #[test]
  fn capacity_is_fixed_at_construction() {
    let state = SimulationState::from_particles(vec![still(0.0); 5]).unwrap();
    assert_eq!(state.edge_capacity(), 10);
    assert_eq!(state.edge_count(), 0);
    assert!(state.segments().iter().all(|s| *s == LineSegment::default()));
  }

  #[test]
  fn shorter_rebuild_zeroes_the_tail() {
    let mut state = SimulationState::from_particles(vec![still(0.0); 4]).unwrap();
    {
      let (_, mut edges) = state.edge_writer();
      edges.push(segment(1.0));
      edges.push(segment(2.0));
      edges.push(segment(3.0));
    }
    assert_eq!(state.edge_count(), 3);

    {
      let (_, mut edges) = state.edge_writer();
      edges.push(segment(4.0));
    }
    assert_eq!(state.edge_count(), 1);
    assert_eq!(state.active_segments(), &[segment(4.0)]);
    assert!(state.segments()[1..]
      .iter()
      .all(|s| *s == LineSegment::default()));
  }

  #[test]
  fn seeded_state_has_requested_size() {
    let params = WebParams {
      num_particles: 30,
      ..Default::default()
    };
    let state = SimulationState::seeded(&params).unwrap();
    assert_eq!(state.particles().len(), 30);
    assert_eq!(Some(state.edge_capacity()), params.edge_capacity());
  }

  #[test]
  fn impossible_particle_count_is_an_error() {
    let params = WebParams {
      num_particles: u32::MAX,
      ..Default::default()
    };
    let err = SimulationState::seeded(&params).err().unwrap();
    assert!(matches!(
      err,
      WebError::EdgeAllocation { particles } if particles == u32::MAX as usize
    ));
  }

  #[test]
  fn oversized_edge_buffer_is_an_error() {
    // pair count fits a usize but its byte size does not
    let particles = 1usize << (usize::BITS / 2);
    assert!(matches!(
      allocate_segments(particles),
      Err(WebError::EdgeAllocation { .. })
    ));
  }
}
