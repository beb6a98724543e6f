//! Per-particle sphere constraints against the animated pose: a maximum
//! distance from the animated position, and a backstop sphere behind the
//! animated surface that the cloth may not enter.

use super::Constraint;
use crate::parallel;
use crate::particle::{ParticleRange, SolverParticles};
use crate::{Real, SMALL_NUMBER};

#[derive(Clone, Debug)]
pub struct SphericalConstraint {
	range: ParticleRange,
	/// Local indexing.
	sphere_radii: Vec<Real>,
	sphere_radii_multiplier: Real,
}

impl SphericalConstraint {
	pub fn new(range: ParticleRange, sphere_radii: Vec<Real>) -> Self {
		debug_assert_eq!(sphere_radii.len(), range.count);
		Self {
			range,
			sphere_radii,
			sphere_radii_multiplier: 1.0,
		}
	}

	pub fn set_sphere_radii_multiplier(&mut self, multiplier: Real) {
		self.sphere_radii_multiplier = multiplier.max(0.0);
	}

	pub fn sphere_radii_multiplier(&self) -> Real {
		self.sphere_radii_multiplier
	}
}

impl Constraint for SphericalConstraint {
	fn apply(&self, particles: &mut SolverParticles, _dt: Real) {
		let offset = self.range.offset;
		let (particles, animation) = particles.split_mut(self.range);
		parallel::for_each_mut(particles, |local, particle| {
			if particle.is_kinematic() {
				return;
			}
			let center = animation.positions[offset + local];
			let radius = self.sphere_radii[local] * self.sphere_radii_multiplier;
			let center_to_particle = particle.p - center;
			let distance_squared = center_to_particle.norm_squared();
			if distance_squared > radius * radius + SMALL_NUMBER {
				particle.p = center + center_to_particle * (radius / distance_squared.sqrt());
			}
		});
	}
}

#[derive(Clone, Debug)]
pub struct SphericalBackstopConstraint {
	range: ParticleRange,
	/// Local indexing.
	sphere_radii: Vec<Real>,
	sphere_offset_distances: Vec<Real>,
	sphere_radii_multiplier: Real,
	use_legacy_backstop: bool,
}

impl SphericalBackstopConstraint {
	pub fn new(
		range: ParticleRange,
		sphere_radii: Vec<Real>,
		sphere_offset_distances: Vec<Real>,
		use_legacy_backstop: bool,
	) -> Self {
		debug_assert_eq!(sphere_radii.len(), range.count);
		debug_assert_eq!(sphere_offset_distances.len(), range.count);
		Self {
			range,
			sphere_radii,
			sphere_offset_distances,
			sphere_radii_multiplier: 1.0,
			use_legacy_backstop,
		}
	}

	pub fn set_sphere_radii_multiplier(&mut self, multiplier: Real) {
		self.sphere_radii_multiplier = multiplier.max(0.0);
	}

	pub fn sphere_radii_multiplier(&self) -> Real {
		self.sphere_radii_multiplier
	}

	pub fn set_use_legacy_backstop(&mut self, use_legacy_backstop: bool) {
		self.use_legacy_backstop = use_legacy_backstop;
	}

	pub fn use_legacy_backstop(&self) -> bool {
		self.use_legacy_backstop
	}

	// The authored distance already includes the sphere radius.
	fn apply_legacy(&self, particles: &mut SolverParticles) {
		let offset = self.range.offset;
		let (particles, animation) = particles.split_mut(self.range);
		parallel::for_each_mut(particles, |local, particle| {
			if particle.is_kinematic() {
				return;
			}
			let index = offset + local;
			let position = animation.positions[index];
			let normal = animation.normals[index];
			let radius = self.sphere_radii[local] * self.sphere_radii_multiplier;
			let distance = self.sphere_offset_distances[local];
			let center = position - distance * normal;
			let center_to_particle = particle.p - center;
			let distance_squared = center_to_particle.norm_squared();
			if distance_squared < SMALL_NUMBER {
				particle.p = position - (distance - radius) * normal;
			} else if distance_squared < radius * radius {
				particle.p = center + center_to_particle * radius / distance_squared.sqrt();
			}
		});
	}

	fn apply_current(&self, particles: &mut SolverParticles) {
		let offset = self.range.offset;
		let (particles, animation) = particles.split_mut(self.range);
		parallel::for_each_mut(particles, |local, particle| {
			if particle.is_kinematic() {
				return;
			}
			let index = offset + local;
			let position = animation.positions[index];
			let normal = animation.normals[index];
			let radius = self.sphere_radii[local] * self.sphere_radii_multiplier;
			let distance = self.sphere_offset_distances[local];
			let center = position - (radius + distance) * normal;
			let center_to_particle = particle.p - center;
			let distance_squared = center_to_particle.norm_squared();
			if distance_squared < SMALL_NUMBER {
				particle.p = position - distance * normal;
			} else if distance_squared < radius * radius {
				particle.p = center + center_to_particle * radius / distance_squared.sqrt();
			}
		});
	}
}

impl Constraint for SphericalBackstopConstraint {
	fn apply(&self, particles: &mut SolverParticles, _dt: Real) {
		if self.use_legacy_backstop {
			self.apply_legacy(particles);
		} else {
			self.apply_current(particles);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::V3;
	use approx::assert_relative_eq;

	fn particles(positions: &[V3], inv_m: Real) -> (SolverParticles, ParticleRange) {
		let mut ps = SolverParticles::default();
		// leading block keeps global and local indices apart
		let _ = ps.add_range(2);
		let range = ps.add_range(positions.len());
		for (local, &pos) in positions.iter().enumerate() {
			ps.particles[range.global(local)] = crate::particle::Particle::new(pos, inv_m);
		}
		let zeros = vec![V3::zeros(); positions.len()];
		let normals = vec![V3::z(); positions.len()];
		ps.animation.reset(range, &zeros, &normals);
		(ps, range)
	}

	#[test]
	fn test_spherical_projects_outside() {
		let (mut ps, range) = particles(&[V3::new(3., 4., 0.), V3::new(0.1, 0., 0.)], 1.0);
		let c = SphericalConstraint::new(range, vec![1.0, 1.0]);
		c.apply(&mut ps, 0.1);
		let p = ps.particles[range.global(0)].p;
		assert_relative_eq!(p.norm(), 1.0, epsilon = 1e-6);
		assert_relative_eq!(p, V3::new(0.6, 0.8, 0.), epsilon = 1e-6);
		// already inside
		assert_eq!(ps.particles[range.global(1)].p, V3::new(0.1, 0., 0.));
	}

	#[test]
	fn test_spherical_multiplier() {
		let (mut ps, range) = particles(&[V3::new(0., 0., 5.)], 1.0);
		let mut c = SphericalConstraint::new(range, vec![1.0]);
		c.set_sphere_radii_multiplier(2.0);
		c.apply(&mut ps, 0.1);
		assert_relative_eq!(ps.particles[range.offset].p, V3::new(0., 0., 2.), epsilon = 1e-6);
		c.set_sphere_radii_multiplier(-1.0);
		assert_eq!(c.sphere_radii_multiplier(), 0.0);
		c.apply(&mut ps, 0.1);
		assert_relative_eq!(ps.particles[range.offset].p, V3::zeros(), epsilon = 1e-6);
	}

	#[test]
	fn test_spherical_kinematic_untouched() {
		let (mut ps, range) = particles(&[V3::new(3., 4., 0.)], 0.0);
		SphericalConstraint::new(range, vec![1.0]).apply(&mut ps, 0.1);
		assert_eq!(ps.particles[range.offset].p, V3::new(3., 4., 0.));
	}

	#[test]
	fn test_backstop_inside_projected() {
		// anim at origin, normal +z, radius 1, offset 2: center at -3z
		let inside = V3::new(0., 0., -2.5);
		let (mut ps, range) = particles(&[inside], 1.0);
		let c = SphericalBackstopConstraint::new(range, vec![1.0], vec![2.0], false);
		c.apply(&mut ps, 0.1);
		let p = ps.particles[range.offset].p;
		assert_relative_eq!((p - V3::new(0., 0., -3.)).norm(), 1.0, epsilon = 1e-6);
		assert_relative_eq!(p, V3::new(0., 0., -2.), epsilon = 1e-6);
	}

	#[test]
	fn test_backstop_outside_untouched() {
		// half a unit behind the animated surface is still in front of the
		// backstop sphere, which starts two units behind it
		let outside = V3::new(0., 0., -0.5);
		let (mut ps, range) = particles(&[outside], 1.0);
		let c = SphericalBackstopConstraint::new(range, vec![1.0], vec![2.0], false);
		c.apply(&mut ps, 0.1);
		assert_eq!(ps.particles[range.offset].p, outside);
	}

	#[test]
	fn test_backstop_idempotent() {
		let start = [V3::new(0.2, 0.1, -2.8), V3::new(0., 0.3, -1.5), V3::new(0., 0., 1.)];
		let (mut ps, range) = particles(&start, 1.0);
		let c = SphericalBackstopConstraint::new(range, vec![1.0; 3], vec![1.0; 3], false);
		c.apply(&mut ps, 0.1);
		let once: Vec<V3> = ps.positions(range).collect();
		c.apply(&mut ps, 0.1);
		let twice: Vec<V3> = ps.positions(range).collect();
		for (a, b) in once.iter().zip(twice.iter()) {
			assert_relative_eq!(a, b, epsilon = 1e-6);
		}
	}

	#[test]
	fn test_backstop_dead_zone() {
		let (mut ps, range) = particles(&[V3::new(0., 0., -3.)], 1.0);
		let c = SphericalBackstopConstraint::new(range, vec![1.0], vec![2.0], false);
		c.apply(&mut ps, 0.1);
		assert_relative_eq!(ps.particles[range.offset].p, V3::new(0., 0., -2.));
	}

	#[test]
	fn test_backstop_legacy() {
		// legacy distance 2 includes the radius: center at -2z
		let (mut ps, range) = particles(&[V3::new(0., 0., -1.5), V3::new(0., 0., -2.)], 1.0);
		let c = SphericalBackstopConstraint::new(range, vec![1.0; 2], vec![2.0; 2], true);
		assert!(c.use_legacy_backstop());
		c.apply(&mut ps, 0.1);
		assert_relative_eq!(ps.particles[range.offset].p, V3::new(0., 0., -1.), epsilon = 1e-6);
		// dead zone snaps to position - (distance - radius) * normal
		assert_relative_eq!(ps.particles[range.offset + 1].p, V3::new(0., 0., -1.));
	}

	#[test]
	fn test_backstop_modes_differ() {
		let start = [V3::new(0., 0., -2.5)];
		let (mut legacy, range) = particles(&start, 1.0);
		let (mut current, _) = particles(&start, 1.0);
		SphericalBackstopConstraint::new(range, vec![1.0], vec![2.0], true).apply(&mut legacy, 0.1);
		SphericalBackstopConstraint::new(range, vec![1.0], vec![2.0], false).apply(&mut current, 0.1);
		// legacy sphere spans [-3, -1]: -2.5 is inside, pushed down to -3
		assert_relative_eq!(legacy.particles[range.offset].p, V3::new(0., 0., -3.), epsilon = 1e-6);
		assert_relative_eq!(current.particles[range.offset].p, V3::new(0., 0., -2.), epsilon = 1e-6);
	}
}
