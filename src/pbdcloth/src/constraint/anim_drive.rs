use super::Constraint;
use crate::parallel;
use crate::particle::{ParticleRange, SolverParticles};
use crate::weighted_value::WeightedValue;
use crate::Real;

/// Pulls dynamic particles toward their animated position.
#[derive(Clone, Debug)]
pub struct AnimDriveConstraint {
	range: ParticleRange,
	stiffness: WeightedValue,
}

impl AnimDriveConstraint {
	pub fn new(range: ParticleRange, stiffness: WeightedValue) -> Self {
		Self { range, stiffness }
	}

	pub fn is_active(&self) -> bool {
		!self.stiffness.is_zero()
	}

	pub fn set_stiffness(&mut self, low: Real, high: Real) {
		self.stiffness.set_range(low.clamp(0.0, 1.0), high.clamp(0.0, 1.0));
	}
}

impl Constraint for AnimDriveConstraint {
	fn apply(&self, particles: &mut SolverParticles, _dt: Real) {
		let offset = self.range.offset;
		let (particles, animation) = particles.split_mut(self.range);
		parallel::for_each_mut(particles, |local, particle| {
			if particle.is_kinematic() {
				return;
			}
			let target = animation.positions[offset + local];
			particle.p += self.stiffness.value(local) * (target - particle.p);
		});
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::particle::Particle;
	use crate::V3;
	use approx::assert_relative_eq;

	#[test]
	fn test_drive() {
		let mut ps = SolverParticles::default();
		let range = ps.add_range(2);
		ps.particles[0] = Particle::new(V3::new(2., 0., 0.), 1.0);
		ps.particles[1] = Particle::new(V3::new(2., 0., 0.), 0.0);
		ps.animation.reset(range, &[V3::zeros(); 2], &[V3::z(); 2]);
		let c = AnimDriveConstraint::new(range, WeightedValue::constant(0.25));
		assert!(c.is_active());
		c.apply(&mut ps, 0.1);
		assert_relative_eq!(ps.particles[0].p, V3::new(1.5, 0., 0.));
		assert_eq!(ps.particles[1].p, V3::new(2., 0., 0.));
	}

	#[test]
	fn test_set_stiffness() {
		let mut ps = SolverParticles::default();
		let range = ps.add_range(1);
		ps.particles[0] = Particle::new(V3::new(2., 0., 0.), 1.0);
		ps.animation.reset(range, &[V3::zeros()], &[V3::z()]);
		let mut c = AnimDriveConstraint::new(range, WeightedValue::constant(0.0));
		assert!(!c.is_active());
		c.set_stiffness(0.5, 0.5);
		assert!(c.is_active());
		c.apply(&mut ps, 0.1);
		assert_relative_eq!(ps.particles[0].p, V3::new(1., 0., 0.));
	}
}
