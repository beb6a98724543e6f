use super::{scatter, Constraint};
use crate::graph;
use crate::parallel;
use crate::particle::{Particle, ParticleRange, SolverParticles};
use crate::weighted_value::WeightedValue;
use crate::{Real, SMALL_NUMBER, V3};

/// PBD distance springs between particle pairs, used for mesh edges and for
/// bending (opposite vertices of adjacent triangles).
#[derive(Clone, Debug)]
pub struct SpringConstraints {
	/// Global indices.
	constraints: Vec<[usize; 2]>,
	rest_lengths: Vec<Real>,
	stiffness: WeightedValue,
	/// Per constraint average of the stiffness weight map, empty when
	/// nothing is painted.
	weights: Vec<Real>,
	colors: Vec<Vec<usize>>,
}

impl SpringConstraints {
	/// `pairs` use local indices, rest lengths are measured on `positions`
	/// (local as well).
	pub fn new(
		range: ParticleRange,
		pairs: &[[usize; 2]],
		positions: &[V3],
		stiffness: WeightedValue,
	) -> Self {
		let rest_lengths = pairs
			.iter()
			.map(|&[a, b]| (positions[a] - positions[b]).norm())
			.collect();
		let weights = if !stiffness.weights().is_empty() {
			let w = stiffness.weights();
			pairs.iter().map(|&[a, b]| 0.5 * (w[a] + w[b])).collect()
		} else {
			Vec::new()
		};
		let constraints: Vec<[usize; 2]> =
			pairs.iter().map(|p| p.map(|i| range.global(i))).collect();
		let colors = graph::color_constraints(&constraints);
		Self {
			constraints,
			rest_lengths,
			stiffness,
			weights,
			colors,
		}
	}

	pub fn len(&self) -> usize {
		self.constraints.len()
	}

	pub fn is_empty(&self) -> bool {
		self.constraints.is_empty()
	}

	pub fn set_stiffness(&mut self, low: Real, high: Real) {
		self.stiffness.set_range(low.clamp(0.0, 1.0), high.clamp(0.0, 1.0));
	}

	fn stiffness(&self, constraint: usize) -> Real {
		match self.weights.get(constraint) {
			Some(&w) => self.stiffness.lerp(w),
			None => self.stiffness.low(),
		}
	}

	fn delta(&self, particles: &[Particle], constraint: usize) -> Option<[(usize, V3); 2]> {
		let [a, b] = self.constraints[constraint];
		let (pa, pb) = (&particles[a], &particles[b]);
		let combined = pa.inv_m + pb.inv_m;
		if combined == 0.0 {
			return None;
		}
		let direction = pb.p - pa.p;
		let length = direction.norm();
		if length <= SMALL_NUMBER {
			return None;
		}
		let offset = (length - self.rest_lengths[constraint]) / (length * combined);
		let dp = self.stiffness(constraint) * offset * direction;
		Some([(a, pa.inv_m * dp), (b, -pb.inv_m * dp)])
	}
}

impl Constraint for SpringConstraints {
	fn apply(&self, particles: &mut SolverParticles, _dt: Real) {
		for color in &self.colors {
			let current = &particles.particles;
			let corrections = parallel::map(color, |&c| self.delta(current, c));
			scatter(particles, corrections.into_iter().flatten().flatten());
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use approx::assert_relative_eq;

	fn chain(inv_m: &[Real]) -> (SolverParticles, ParticleRange) {
		let mut ps = SolverParticles::default();
		let range = ps.add_range(inv_m.len());
		for (i, &w) in inv_m.iter().enumerate() {
			ps.particles[i] = Particle::new(V3::new(i as f32, 0., 0.), w);
		}
		(ps, range)
	}

	#[test]
	fn test_restores_rest_length() {
		let (mut ps, range) = chain(&[1.0, 1.0, 1.0]);
		let rest: Vec<V3> = ps.positions(range).collect();
		let c = SpringConstraints::new(range, &[[0, 1], [1, 2]], &rest, WeightedValue::constant(1.0));
		assert_eq!(c.colors.len(), 2);
		ps.particles[2].p = V3::new(4., 0., 0.);
		for _ in 0..50 {
			c.apply(&mut ps, 0.1);
		}
		assert_relative_eq!((ps.particles[1].p - ps.particles[0].p).norm(), 1.0, epsilon = 1e-4);
		assert_relative_eq!((ps.particles[2].p - ps.particles[1].p).norm(), 1.0, epsilon = 1e-4);
	}

	#[test]
	fn test_mass_weighting() {
		let (mut ps, range) = chain(&[0.0, 1.0]);
		let rest: Vec<V3> = ps.positions(range).collect();
		let c = SpringConstraints::new(range, &[[0, 1]], &rest, WeightedValue::constant(1.0));
		ps.particles[1].p = V3::new(3., 0., 0.);
		c.apply(&mut ps, 0.1);
		assert_eq!(ps.particles[0].p, V3::zeros());
		assert_relative_eq!(ps.particles[1].p, V3::new(1., 0., 0.), epsilon = 1e-6);
	}

	#[test]
	fn test_half_stiffness() {
		let (mut ps, range) = chain(&[1.0, 1.0]);
		let rest: Vec<V3> = ps.positions(range).collect();
		let c = SpringConstraints::new(
			range,
			&[[0, 1]],
			&rest,
			WeightedValue::new(0.0, 1.0).with_weights(vec![0.5, 0.5]),
		);
		ps.particles[1].p = V3::new(3., 0., 0.);
		c.apply(&mut ps, 0.1);
		// error of 2 split between both ends, halved by the stiffness
		assert_relative_eq!(ps.particles[0].p, V3::new(0.5, 0., 0.), epsilon = 1e-6);
		assert_relative_eq!(ps.particles[1].p, V3::new(2.5, 0., 0.), epsilon = 1e-6);
	}

	#[test]
	fn test_set_stiffness_uses_painted_map() {
		let (mut ps, range) = chain(&[1.0, 1.0]);
		let rest: Vec<V3> = ps.positions(range).collect();
		let mut c = SpringConstraints::new(
			range,
			&[[0, 1]],
			&rest,
			WeightedValue::new(0.0, 0.0).with_weights(vec![0.5, 0.5]),
		);
		ps.particles[1].p = V3::new(3., 0., 0.);
		c.apply(&mut ps, 0.1);
		assert_eq!(ps.particles[1].p, V3::new(3., 0., 0.));
		c.set_stiffness(0.0, 1.0);
		c.apply(&mut ps, 0.1);
		assert_relative_eq!(ps.particles[0].p, V3::new(0.5, 0., 0.), epsilon = 1e-6);
		assert_relative_eq!(ps.particles[1].p, V3::new(2.5, 0., 0.), epsilon = 1e-6);
	}
}
