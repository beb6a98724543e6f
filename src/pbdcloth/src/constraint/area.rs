use super::{scatter, Constraint};
use crate::graph;
use crate::parallel;
use crate::particle::{Particle, ParticleRange, SolverParticles};
use crate::weighted_value::WeightedValue;
use crate::{Real, SMALL_NUMBER, V3};

fn area(p0: V3, p1: V3, p2: V3) -> Real {
	0.5 * (p1 - p0).cross(&(p2 - p0)).norm()
}

/// Keeps each triangle at its rest area.
#[derive(Clone, Debug)]
pub struct AreaConstraints {
	/// Global indices.
	constraints: Vec<[usize; 3]>,
	rest_areas: Vec<Real>,
	stiffness: WeightedValue,
	weights: Vec<Real>,
	colors: Vec<Vec<usize>>,
}

impl AreaConstraints {
	pub fn new(
		range: ParticleRange,
		triangles: &[[usize; 3]],
		positions: &[V3],
		stiffness: WeightedValue,
	) -> Self {
		let rest_areas = triangles
			.iter()
			.map(|&[a, b, c]| area(positions[a], positions[b], positions[c]))
			.collect();
		let weights = if !stiffness.weights().is_empty() {
			let w = stiffness.weights();
			triangles
				.iter()
				.map(|&[a, b, c]| (w[a] + w[b] + w[c]) / 3.0)
				.collect()
		} else {
			Vec::new()
		};
		let constraints: Vec<[usize; 3]> = triangles
			.iter()
			.map(|t| t.map(|i| range.global(i)))
			.collect();
		let colors = graph::color_constraints(&constraints);
		Self {
			constraints,
			rest_areas,
			stiffness,
			weights,
			colors,
		}
	}

	pub fn set_stiffness(&mut self, low: Real, high: Real) {
		self.stiffness.set_range(low.clamp(0.0, 1.0), high.clamp(0.0, 1.0));
	}

	fn delta(&self, particles: &[Particle], constraint: usize) -> Option<[(usize, V3); 3]> {
		let indices = self.constraints[constraint];
		let [p0, p1, p2] = indices.map(|i| &particles[i]);
		let e1 = p1.p - p0.p;
		let e2 = p2.p - p0.p;
		let cross = e1.cross(&e2);
		let double_area = cross.norm();
		if double_area <= SMALL_NUMBER {
			return None;
		}
		let n = cross / double_area;
		let g1 = 0.5 * e2.cross(&n);
		let g2 = 0.5 * n.cross(&e1);
		let g0 = -g1 - g2;
		let denominator = p0.inv_m * g0.norm_squared()
			+ p1.inv_m * g1.norm_squared()
			+ p2.inv_m * g2.norm_squared();
		if denominator <= SMALL_NUMBER {
			return None;
		}
		let stiffness = match self.weights.get(constraint) {
			Some(&w) => self.stiffness.lerp(w),
			None => self.stiffness.low(),
		};
		let lambda = -stiffness * (0.5 * double_area - self.rest_areas[constraint]) / denominator;
		Some([
			(indices[0], lambda * p0.inv_m * g0),
			(indices[1], lambda * p1.inv_m * g1),
			(indices[2], lambda * p2.inv_m * g2),
		])
	}
}

impl Constraint for AreaConstraints {
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

	#[test]
	fn test_area() {
		let a = area(V3::zeros(), V3::new(2., 0., 0.), V3::new(0., 1., 0.));
		assert_relative_eq!(a, 1.0);
	}

	#[test]
	fn test_restores_area() {
		let mut ps = SolverParticles::default();
		let range = ps.add_range(3);
		let rest = [V3::zeros(), V3::new(1., 0., 0.), V3::new(0., 1., 0.)];
		for (i, &p) in rest.iter().enumerate() {
			ps.particles[i] = Particle::new(p, 1.0);
		}
		ps.particles[0].inv_m = 0.0;
		let c = AreaConstraints::new(range, &[[0, 1, 2]], &rest, WeightedValue::constant(1.0));
		ps.particles[1].p = V3::new(2., 0., 0.);
		ps.particles[2].p = V3::new(0., 2., 0.);
		for _ in 0..20 {
			c.apply(&mut ps, 0.1);
		}
		let p: Vec<V3> = ps.positions(range).collect();
		assert_relative_eq!(area(p[0], p[1], p[2]), 0.5, epsilon = 1e-4);
		assert_eq!(p[0], V3::zeros());
	}

	#[test]
	fn test_set_stiffness_uses_painted_map() {
		let mut ps = SolverParticles::default();
		let range = ps.add_range(3);
		let rest = [V3::zeros(), V3::new(1., 0., 0.), V3::new(0., 1., 0.)];
		for (i, &p) in rest.iter().enumerate() {
			ps.particles[i] = Particle::new(p, 1.0);
		}
		let stiffness = WeightedValue::new(0.0, 0.0).with_weights(vec![1.0; 3]);
		let mut c = AreaConstraints::new(range, &[[0, 1, 2]], &rest, stiffness);
		ps.particles[1].p = V3::new(2., 0., 0.);
		c.apply(&mut ps, 0.1);
		assert_eq!(ps.particles[1].p, V3::new(2., 0., 0.));
		c.set_stiffness(0.0, 1.0);
		for _ in 0..20 {
			c.apply(&mut ps, 0.1);
		}
		let p: Vec<V3> = ps.positions(range).collect();
		assert_relative_eq!(area(p[0], p[1], p[2]), 0.5, epsilon = 1e-4);
	}
}
