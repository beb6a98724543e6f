//! Aerodynamic drag and lift on cloth triangles.
//!
//! Forces are computed once per substep into a per-triangle buffer (one
//! writer per triangle) and gathered per particle during integration (one
//! writer per particle).

use crate::mesh::TriangleMesh;
use crate::parallel;
use crate::particle::{Particle, ParticleRange};
use crate::weighted_value::WeightedValue;
use crate::{Real, SMALL_NUMBER, V3};

pub const DEFAULT_FLUID_DENSITY: Real = 1.225;

#[derive(Clone, Debug)]
pub struct VelocityField {
	range: ParticleRange,
	/// Global particle indices.
	elements: Vec<[usize; 3]>,
	point_to_triangles: Vec<Vec<usize>>,
	drag: WeightedValue,
	lift: WeightedValue,
	/// Triangle averages of the drag and lift weight maps.
	drag_weights: Vec<Real>,
	lift_weights: Vec<Real>,
	cd: Vec<Real>,
	cl: Vec<Real>,
	quarter_rho: Real,
	velocity: V3,
	forces: Vec<V3>,
}

// Kept whenever a map is painted, so a later range change still sees it.
fn triangle_weights(value: &WeightedValue, elements: &[[usize; 3]]) -> Vec<Real> {
	if value.weights().is_empty() {
		return Vec::new();
	}
	let w = value.weights();
	elements
		.iter()
		.map(|&[a, b, c]| (w[a] + w[b] + w[c]) / 3.0)
		.collect()
}

impl VelocityField {
	pub fn new(
		range: ParticleRange,
		mesh: &TriangleMesh,
		drag: WeightedValue,
		lift: WeightedValue,
		fluid_density: Real,
	) -> Self {
		debug_assert_eq!(mesh.num_particles(), range.count);
		let drag_weights = triangle_weights(&drag, mesh.triangles());
		let lift_weights = triangle_weights(&lift, mesh.triangles());
		let elements = mesh
			.triangles()
			.iter()
			.map(|t| t.map(|i| range.global(i)))
			.collect::<Vec<_>>();
		let mut result = Self {
			range,
			forces: vec![V3::zeros(); elements.len()],
			elements,
			point_to_triangles: mesh.point_to_triangles().to_vec(),
			drag,
			lift,
			drag_weights,
			lift_weights,
			cd: Vec::new(),
			cl: Vec::new(),
			quarter_rho: 0.0,
			velocity: V3::zeros(),
		};
		result.set_properties(
			(result.drag.low(), result.drag.high()),
			(result.lift.low(), result.lift.high()),
			fluid_density,
		);
		result
	}

	/// Change the coefficient ranges and the fluid density. Weight maps
	/// given at construction are kept.
	pub fn set_properties(
		&mut self,
		drag: (Real, Real),
		lift: (Real, Real),
		fluid_density: Real,
	) {
		self.drag.set_range(drag.0.max(0.0), drag.1.max(0.0));
		self.lift.set_range(lift.0.max(0.0), lift.1.max(0.0));
		self.quarter_rho = fluid_density.max(0.0) * 0.25;
		self.cd = self
			.drag_weights
			.iter()
			.map(|&w| self.drag.lerp(w))
			.collect();
		self.cl = self
			.lift_weights
			.iter()
			.map(|&w| self.lift.lerp(w))
			.collect();
	}

	pub fn is_active(&self) -> bool {
		!self.drag.is_zero() || !self.lift.is_zero()
	}

	pub fn velocity(&self) -> V3 {
		self.velocity
	}

	pub fn forces(&self) -> &[V3] {
		&self.forces
	}

	fn coefficients(&self, element: usize) -> (Real, Real) {
		let cd = self.cd.get(element).copied().unwrap_or(self.drag.low());
		let cl = self.cl.get(element).copied().unwrap_or(self.lift.low());
		(cd, cl)
	}

	/// Recompute every triangle force for the ambient `velocity`.
	pub fn update_field(&mut self, particles: &[Particle], velocity: V3) {
		self.velocity = velocity;
		let mut forces = std::mem::take(&mut self.forces);
		parallel::for_each_mut(&mut forces, |element, force| {
			let (cd, cl) = self.coefficients(element);
			*force = self.element_force(particles, element, cd, cl);
		});
		self.forces = forces;
	}

	fn element_force(
		&self,
		particles: &[Particle],
		element: usize,
		cd: Real,
		cl: Real,
	) -> V3 {
		let [a, b, c] = self.elements[element];
		let (pa, pb, pc) = (&particles[a], &particles[b], &particles[c]);
		let surface_velocity = (pa.v + pb.v + pc.v) / 3.0;
		let v = self.velocity - surface_velocity;
		let cross = (pb.x - pa.x).cross(&(pc.x - pa.x));
		let double_area = cross.norm();
		if double_area <= SMALL_NUMBER {
			return V3::zeros();
		}
		let n = cross / double_area;
		let v_dot_n = v.dot(&n);
		let v_square = v.norm_squared();
		let f = if v_dot_n >= 0.0 {
			(cd - cl) * v_dot_n * v + cl * v_square * n
		} else {
			(cl - cd) * v_dot_n * v - cl * v_square * n
		};
		self.quarter_rho * double_area * f
	}

	/// Add the triangle forces to the particles of this cloth as
	/// accelerations. `particles` is the cloth's slice of the buffer.
	pub fn apply(&self, particles: &mut [Particle]) {
		debug_assert_eq!(particles.len(), self.range.count);
		parallel::for_each_mut(particles, |local, particle| {
			if particle.is_kinematic() {
				return;
			}
			let force: V3 = self.point_to_triangles[local]
				.iter()
				.map(|&t| self.forces[t])
				.sum();
			particle.accel += particle.inv_m * force;
		});
	}
}
