use crate::simulation::SimulationState;
use crate::{mix, LineSegment, LineVertex, WebParams};
use cgmath::{EuclideanSpace, InnerSpace, Point3, Vector3, Zero};

/// Advances a [`SimulationState`] by one frame.
pub struct PhysicsStepper {
  params: WebParams,
}

impl PhysicsStepper {
  pub fn new(params: WebParams) -> Self {
    Self { params }
  }

  pub fn params(&self) -> &WebParams {
    &self.params
  }

  /// How strongly the pointer affects something `distance` away, in `[0, 1]`.
  #[must_use]
  pub fn influence(&self, distance: f32) -> f32 {
    let radius = self.params.repulsion_radius;
    if radius <= 0.0 || distance.is_nan() {
      return 0.0;
    }
    (1.0 - (distance / radius).min(1.0)).clamp(0.0, 1.0)
  }

  #[must_use]
  pub fn repulsion_magnitude(&self, distance: f32) -> f32 {
    self.params.repulsion_strength / distance.max(self.params.min_repulsion_distance)
  }

  /// Velocity impulse for a particle at `offset` from the pointer. Zero
  /// outside the repulsion radius, and zero when the offset has no direction.
  #[must_use]
  pub fn repulsion(&self, offset: Vector3<f32>) -> Vector3<f32> {
    let distance = offset.magnitude();
    if distance >= self.params.repulsion_radius || distance == 0.0 {
      return Vector3::zero();
    }
    offset / distance * self.repulsion_magnitude(distance)
  }

  pub fn step(&self, state: &mut SimulationState, pointer: Point3<f32>) {
    let params = &self.params;
    let pointer = pointer.to_vec();

    for particle in state.particles_mut() {
      let mut pos = Vector3::from(particle.pos);
      let mut vel = Vector3::from(particle.vel);

      pos += vel;

      let offset = pos - pointer;
      let distance = offset.magnitude();
      if distance < params.repulsion_radius {
        vel += self.repulsion(offset);
        particle.color = mix(
          params.palette.particle,
          params.palette.particle_near,
          self.influence(distance),
        );
      } else {
        particle.color = params.palette.particle;
      }

      // bounce off the box, position is left where it landed
      for axis in 0..3 {
        if pos[axis].abs() > params.bounds {
          vel[axis] = -vel[axis];
        }
      }

      particle.pos = pos.into();
      particle.vel = vel.into();
    }

    self.connect(state, pointer);
  }

  fn connect(&self, state: &mut SimulationState, pointer: Vector3<f32>) {
    let palette = &self.params.palette;
    let threshold = self.params.connection_distance;
    let (particles, mut edges) = state.edge_writer();

    for (i, first) in particles.iter().enumerate() {
      let pa = Vector3::from(first.pos);
      for second in &particles[i + 1..] {
        let pb = Vector3::from(second.pos);
        if (pb - pa).magnitude() >= threshold {
          continue;
        }

        let midpoint = (pa + pb) * 0.5;
        let influence = self.influence((midpoint - pointer).magnitude());
        let [r, g, b] = mix(palette.line, palette.line_highlight, influence);
        let opacity = palette.min_line_opacity + (1.0 - palette.min_line_opacity) * influence;
        let color = [r, g, b, opacity];

        edges.push(LineSegment {
          start: LineVertex { pos: first.pos, color },
          end: LineVertex { pos: second.pos, color },
        });
      }
    }
  }
}
