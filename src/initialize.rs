use crate::{Particle, WebParams};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// Scatters `num_particles` particles uniformly through the bounding cube,
/// each with a small random drift and the base particle color.
#[must_use]
pub fn scatter_particles<R: Rng + ?Sized>(rng: &mut R, params: &WebParams) -> Vec<Particle> {
  let bounds = params.bounds.abs();
  let half_speed = params.speed_limit.abs() / 2.0;
  let position = Uniform::new_inclusive(-bounds, bounds);
  let velocity = Uniform::new_inclusive(-half_speed, half_speed);

  let mut particles = Vec::with_capacity(params.num_particles as usize);
  for _ in 0..params.num_particles {
    // position first, then velocity, so layouts stay stable for a given seed
    let pos = [
      position.sample(rng),
      position.sample(rng),
      position.sample(rng),
    ];
    let vel = [
      velocity.sample(rng),
      velocity.sample(rng),
      velocity.sample(rng),
    ];
    particles.push(Particle {
      pos,
      vel,
      color: params.palette.particle,
    });
  }
  particles
}
