pub mod anim_drive;
pub mod area;
pub mod collision;
pub mod long_range;
pub mod spherical;
pub mod spring;

use std::fmt::Debug;

use crate::particle::SolverParticles;
use crate::Real;

/// One stage of the per-iteration projection sequence.
///
/// `apply` reads targets and weights and writes predicted positions of the
/// particles in the constraint's range only. It fans out internally and
/// returns once every particle is done, so stages never overlap.
pub trait Constraint: Debug + Send + Sync {
	fn apply(&self, particles: &mut SolverParticles, dt: Real);
}

/// Apply position corrections computed for one conflict-free batch.
/// Kinematic particles are never written.
fn scatter<I>(particles: &mut SolverParticles, corrections: I)
where
	I: IntoIterator<Item = (usize, crate::V3)>,
{
	for (index, dp) in corrections {
		let particle = &mut particles.particles[index];
		if !particle.is_kinematic() {
			particle.p += dp;
		}
	}
}
