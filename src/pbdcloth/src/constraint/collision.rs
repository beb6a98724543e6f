use crate::collider::Collider;
use crate::parallel;
use crate::particle::{ParticleRange, SolverParticles};
use crate::{Real, SMALL_NUMBER};

/// Pushes the particles of one cloth out of the colliders, keeping them
/// `thickness` away from every surface. Friction removes tangential motion
/// in proportion to the penetration depth.
#[derive(Clone, Debug)]
pub struct CollisionConstraint {
	range: ParticleRange,
	thickness: Real,
	friction: Real,
}

impl CollisionConstraint {
	pub fn new(range: ParticleRange, thickness: Real, friction: Real) -> Self {
		Self {
			range,
			thickness: thickness.max(0.0),
			friction: friction.max(0.0),
		}
	}

	pub fn set_thickness(&mut self, thickness: Real) {
		self.thickness = thickness.max(0.0);
	}

	pub fn set_friction(&mut self, friction: Real) {
		self.friction = friction.max(0.0);
	}

	pub fn apply(&self, particles: &mut SolverParticles, colliders: &[&Collider]) {
		if colliders.is_empty() {
			return;
		}
		let (particles, _) = particles.split_mut(self.range);
		parallel::for_each_mut(particles, |_, particle| {
			if particle.is_kinematic() {
				return;
			}
			for collider in colliders {
				let (phi, normal) = collider.phi_with_normal(&particle.p);
				let penetration = self.thickness - phi;
				if penetration <= 0.0 {
					continue;
				}
				particle.p += penetration * normal;
				if self.friction == 0.0 {
					continue;
				}
				let moved = particle.p - particle.x;
				let tangential = moved - moved.dot(&normal) * normal;
				let length = tangential.norm();
				if length > SMALL_NUMBER {
					let cut = (self.friction * penetration).min(length);
					particle.p -= tangential * (cut / length);
				}
			}
		});
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::geometry::{Cuboid, Sphere};
	use crate::particle::Particle;
	use crate::V3;
	use approx::assert_relative_eq;

	#[test]
	fn test_push_out() {
		let mut ps = SolverParticles::default();
		let range = ps.add_range(2);
		ps.particles[0] = Particle::new(V3::new(0., 0., 0.5), 1.0);
		ps.particles[1] = Particle::new(V3::new(0., 0., 0.5), 0.0);
		let collider = Collider::default().with_shape(Sphere::new(V3::zeros(), 1.0));
		CollisionConstraint::new(range, 0.1, 0.0).apply(&mut ps, &[&collider]);
		assert_relative_eq!(ps.particles[0].p, V3::new(0., 0., 1.1), epsilon = 1e-6);
		assert_eq!(ps.particles[1].p, V3::new(0., 0., 0.5));
	}

	#[test]
	fn test_friction() {
		let mut ps = SolverParticles::default();
		let range = ps.add_range(1);
		ps.particles[0] = Particle::new(V3::new(0., 0., 0.1), 1.0);
		// slid sideways and sank into the floor
		ps.particles[0].p = V3::new(1., 0., -0.1);
		let floor = Collider::new(crate::Transform::translation(0., 0., -1.))
			.with_shape(Cuboid::new(V3::new(10., 10., 1.)));
		CollisionConstraint::new(range, 0.0, 1.0).apply(&mut ps, &[&floor]);
		assert_relative_eq!(ps.particles[0].p, V3::new(0.9, 0., 0.), epsilon = 1e-6);
	}
}
