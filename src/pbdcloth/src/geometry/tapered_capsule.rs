use std::f32::consts::PI;

use nalgebra::Matrix3;
use tracing::warn;

use super::{any_perpendicular, golden_spiral_hemisphere, hemisphere_area, ImplicitShape, GOLDEN_ANGLE};
use crate::{Real, Rotation, KINDA_SMALL_NUMBER, SMALL_NUMBER, V3};

/// A capsule whose end spheres differ: a cone frustum from `x1` (radius
/// `radius1`) to `x2` (radius `radius2`) closed by two hemispheres.
#[derive(Clone, Debug, PartialEq)]
pub struct TaperedCapsule {
	origin: V3,
	axis: V3,
	height: Real,
	radius1: Real,
	radius2: Real,
}

impl TaperedCapsule {
	pub fn new(x1: V3, x2: V3, radius1: Real, radius2: Real) -> Self {
		let delta = x2 - x1;
		let height = delta.norm();
		let axis = if height > SMALL_NUMBER {
			delta / height
		} else {
			V3::z()
		};
		if radius1 < 0.0 || radius2 < 0.0 {
			warn!("tapered capsule with negative radius {} {}", radius1, radius2);
		}
		Self {
			origin: x1,
			axis,
			height,
			radius1: radius1.max(0.0),
			radius2: radius2.max(0.0),
		}
	}

	pub fn x1(&self) -> V3 {
		self.origin
	}

	pub fn x2(&self) -> V3 {
		self.origin + self.axis * self.height
	}

	pub fn axis(&self) -> V3 {
		self.axis
	}

	pub fn height(&self) -> Real {
		self.height
	}

	pub fn radius1(&self) -> Real {
		self.radius1
	}

	pub fn radius2(&self) -> Real {
		self.radius2
	}

	pub fn is_degenerate(&self) -> bool {
		self.height <= SMALL_NUMBER
	}

	/// Lateral surface of the frustum, plus both hemispheres when
	/// `include_ends` is set.
	pub fn area_of(height: Real, radius1: Real, radius2: Real, include_ends: bool) -> Real {
		let dr = radius1 - radius2;
		let lateral = PI * (radius1 + radius2) * (dr * dr + height * height).sqrt();
		if include_ends {
			lateral + hemisphere_area(radius1) + hemisphere_area(radius2)
		} else {
			lateral
		}
	}

	pub fn area(&self, include_ends: bool) -> Real {
		Self::area_of(self.height, self.radius1, self.radius2, include_ends)
	}

	fn frustum_volume(&self) -> Real {
		let (r1, r2) = (self.radius1, self.radius2);
		PI / 3.0 * self.height * (r1 * r1 + r1 * r2 + r2 * r2)
	}

	fn hemisphere_volume(radius: Real) -> Real {
		2.0 / 3.0 * PI * radius * radius * radius
	}

	pub fn volume(&self) -> Real {
		self.frustum_volume()
			+ Self::hemisphere_volume(self.radius1)
			+ Self::hemisphere_volume(self.radius2)
	}

	/// Volume centroid, from the frustum and hemisphere centroids.
	pub fn center_of_mass(&self) -> V3 {
		let (r1, r2, h) = (self.radius1, self.radius2, self.height);
		let sum = r1 * r1 + r1 * r2 + r2 * r2;
		let frustum_z = if sum > SMALL_NUMBER {
			h * (r1 * r1 + 2.0 * r1 * r2 + 3.0 * r2 * r2) / (4.0 * sum)
		} else {
			h * 0.5
		};
		let parts = [
			(self.frustum_volume(), frustum_z),
			(Self::hemisphere_volume(r1), -3.0 / 8.0 * r1),
			(Self::hemisphere_volume(r2), h + 3.0 / 8.0 * r2),
		];
		let volume: Real = parts.iter().map(|(v, _)| v).sum();
		let z = if volume > SMALL_NUMBER {
			parts.iter().map(|(v, z)| v * z).sum::<Real>() / volume
		} else {
			h * 0.5
		};
		self.origin + self.axis * z
	}

	/// Inertia in the frame returned by `rotation_of_mass`, the symmetry
	/// axis along Z. Approximated as a cylinder of the larger radius.
	// TODO: add the inertia of the two hemispherical caps.
	pub fn inertia_tensor(&self, mass: Real) -> Matrix3<Real> {
		let r = self.radius1.max(self.radius2);
		let h = self.height;
		let side = mass / 12.0 * (3.0 * r * r + h * h);
		let along = mass * r * r * 0.5;
		Matrix3::from_diagonal(&V3::new(side, side, along))
	}

	/// Rotation taking +Z onto the capsule axis.
	pub fn rotation_of_mass(&self) -> Rotation {
		Rotation::rotation_between(&V3::z(), &self.axis)
			.unwrap_or_else(|| Rotation::from_axis_angle(&V3::x_axis(), PI))
	}

	/// Sample the surface with a density of `points_per_unit_area`, the
	/// count clamped to `[min_points, max_points]`.
	pub fn compute_sample_points(
		&self,
		points_per_unit_area: Real,
		min_points: usize,
		max_points: usize,
	) -> Vec<V3> {
		let wanted = (points_per_unit_area * self.area(true)).ceil().max(0.0) as usize;
		let num_points = wanted.clamp(min_points, max_points.max(min_points));
		self.golden_spiral_points(num_points)
	}

	/// `num_points` golden spiral samples in world space.
	pub fn golden_spiral_points(&self, num_points: usize) -> Vec<V3> {
		let mut points = Vec::with_capacity(num_points);
		golden_spiral_points_unoriented(
			&mut points,
			self.height,
			self.radius1,
			self.radius2,
			num_points,
		);
		let rotation = self.rotation_of_mass();
		let half_height = V3::new(0.0, 0.0, self.height * 0.5);
		for point in points.iter_mut() {
			*point = rotation * (*point + half_height) + self.origin;
		}
		points
	}
}

/// Split of `num_points` between cap 1, lateral band and cap 2.
pub fn partition_points(
	height: Real,
	radius1: Real,
	radius2: Real,
	num_points: usize,
) -> (usize, usize, usize) {
	let cap1 = hemisphere_area(radius1);
	let cap2 = hemisphere_area(radius2);
	let lateral = TaperedCapsule::area_of(height, radius1, radius2, false);
	let total = cap1 + cap2 + lateral;
	if total <= KINDA_SMALL_NUMBER {
		let num_cap1 = num_points / 2;
		return (num_cap1, 0, num_points - num_cap1);
	}
	let n = num_points as Real;
	let num_lateral = ((lateral / total * n).round() as usize).min(num_points);
	let num_cap1 = ((cap1 / total * n).round() as usize).min(num_points - num_lateral);
	(num_cap1, num_lateral, num_points - num_lateral - num_cap1)
}

/// Samples in the canonical frame: axis along Z, centered on the origin,
/// `radius1` at `z = -height / 2`.
///
/// The lateral band spirals with equal angle steps and equal height steps,
/// which is not equal area when the radii differ.
pub fn golden_spiral_points_unoriented(
	points: &mut Vec<V3>,
	height: Real,
	radius1: Real,
	radius2: Real,
	num_points: usize,
) {
	let (num_cap1, num_lateral, num_cap2) =
		partition_points(height, radius1, radius2, num_points);
	let half_height = height * 0.5;

	points.reserve(num_points);
	for i in 0..num_lateral {
		let alpha = (i as Real + 0.5) / num_lateral as Real;
		let radius = radius1 + (radius2 - radius1) * alpha;
		let theta = i as Real * GOLDEN_ANGLE;
		points.push(V3::new(
			radius * theta.cos(),
			radius * theta.sin(),
			-half_height + alpha * height,
		));
	}
	golden_spiral_hemisphere(points, radius1, -half_height, -1.0, num_cap1);
	golden_spiral_hemisphere(points, radius2, half_height, 1.0, num_cap2);
}

impl ImplicitShape for TaperedCapsule {
	fn phi_with_normal(&self, x: &V3) -> (Real, V3) {
		let origin_to_x = x - self.origin;
		let along = origin_to_x.dot(&self.axis).clamp(0.0, self.height);
		let closest = self.origin + self.axis * along;
		let radius = if self.is_degenerate() {
			self.radius1.max(self.radius2)
		} else {
			let alpha = along / self.height;
			self.radius1 * (1.0 - alpha) + self.radius2 * alpha
		};
		let d = x - closest;
		let len = d.norm();
		if len <= SMALL_NUMBER {
			return (-radius, any_perpendicular(&self.axis));
		}
		(len - radius, d / len)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use approx::assert_relative_eq;

	fn capsule() -> TaperedCapsule {
		TaperedCapsule::new(V3::new(1., 2., 3.), V3::new(1., 2., 7.), 1.0, 2.0)
	}

	#[test]
	fn test_phi_along_band() {
		let c = capsule();
		// halfway up the axis the radius is 1.5
		let (phi, n) = c.phi_with_normal(&V3::new(4., 2., 5.));
		assert_relative_eq!(phi, 1.5);
		assert_relative_eq!(n, V3::x());
		let (phi, _) = c.phi_with_normal(&V3::new(1.5, 2., 5.));
		assert_relative_eq!(phi, -1.0);
	}

	#[test]
	fn test_phi_past_ends() {
		let c = capsule();
		let (phi, n) = c.phi_with_normal(&V3::new(1., 2., 10.));
		assert_relative_eq!(phi, 1.0);
		assert_relative_eq!(n, V3::z());
		let (phi, n) = c.phi_with_normal(&V3::new(1., 2., 0.));
		assert_relative_eq!(phi, 2.0);
		assert_relative_eq!(n, -V3::z());
	}

	#[test]
	fn test_degenerate_uses_larger_radius() {
		let c = TaperedCapsule::new(V3::zeros(), V3::zeros(), 1.0, 3.0);
		assert!(c.is_degenerate());
		assert_relative_eq!(c.phi(&V3::new(0., 5., 0.)), 2.0);
	}

	#[test]
	fn test_equal_radii_match_capsule() {
		let c = TaperedCapsule::new(V3::zeros(), V3::new(0., 0., 2.), 0.5, 0.5);
		let h = 2.0;
		let r: Real = 0.5;
		assert_relative_eq!(c.area(true), 2.0 * PI * r * h + 4.0 * PI * r * r, epsilon = 1e-4);
		assert_relative_eq!(
			c.volume(),
			PI * r * r * h + 4.0 / 3.0 * PI * r * r * r,
			epsilon = 1e-5
		);
		assert_relative_eq!(c.center_of_mass(), V3::new(0., 0., 1.), epsilon = 1e-5);
	}

	#[test]
	fn test_center_of_mass_towards_larger_end() {
		let c = capsule();
		let com = c.center_of_mass();
		assert!(com.z > 5.0);
		assert_relative_eq!(com.x, 1.0);
		assert_relative_eq!(com.y, 2.0);
	}

	#[test]
	fn test_inertia() {
		let c = capsule();
		let i = c.inertia_tensor(2.0);
		assert_relative_eq!(i[(0, 0)], 2.0 / 12.0 * (3.0 * 4.0 + 16.0));
		assert_relative_eq!(i[(2, 2)], 4.0);
		assert_eq!(i[(0, 1)], 0.0);
	}

	#[test]
	fn test_partition() {
		assert_eq!(partition_points(0.0, 0.0, 0.0, 7), (3, 0, 4));
		let (a, b, c) = partition_points(4.0, 1.0, 2.0, 100);
		assert_eq!(a + b + c, 100);
		// cap areas are 2pi and 8pi
		assert!(c > a);
		assert!(b > 0);
	}

	#[test]
	fn test_samples_on_surface() {
		let c = TaperedCapsule::new(V3::new(1., 0., 0.), V3::new(1., 3., 0.), 0.5, 1.0);
		let points = c.golden_spiral_points(200);
		assert_eq!(points.len(), 200);
		for p in &points {
			// phi is only approximate on a tapered band
			assert!(c.phi(p).abs() < 0.1, "{:?} {}", p, c.phi(p));
		}
		let near_x2 = points.iter().filter(|p| p.y > 3.0).count();
		let near_x1 = points.iter().filter(|p| p.y < 0.0).count();
		assert!(near_x2 > near_x1);
	}

	#[test]
	fn test_sample_count_clamped() {
		let c = capsule();
		assert_eq!(c.compute_sample_points(0.0, 5, 10).len(), 5);
		assert_eq!(c.compute_sample_points(1000.0, 5, 10).len(), 10);
	}

	#[test]
	fn test_rotation_antiparallel() {
		let c = TaperedCapsule::new(V3::zeros(), V3::new(0., 0., -1.), 1.0, 1.0);
		assert_relative_eq!(c.rotation_of_mass() * V3::z(), -V3::z(), epsilon = 1e-6);
	}
}
