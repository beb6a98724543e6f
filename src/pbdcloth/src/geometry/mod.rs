//! Implicit collision shapes, all expressed in their local frame.

mod tapered_capsule;

pub use tapered_capsule::TaperedCapsule;

use std::f32::consts::PI;
use std::fmt::Debug;

use dyn_clone::DynClone;

use crate::{Real, SMALL_NUMBER, V3};

/// Angle between consecutive golden spiral samples, pi * (3 - sqrt 5).
pub const GOLDEN_ANGLE: Real = 2.399_963_2;

pub trait ImplicitShape: DynClone + Debug + Send + Sync {
	/// Signed distance to the surface (negative inside) and the outward
	/// normal at the closest surface point.
	fn phi_with_normal(&self, x: &V3) -> (Real, V3);

	fn phi(&self, x: &V3) -> Real {
		self.phi_with_normal(x).0
	}
}

dyn_clone::clone_trait_object!(ImplicitShape);

/// Some unit vector orthogonal to `v`.
pub fn any_perpendicular(v: &V3) -> V3 {
	let other = if v.x.abs() < 0.9 { V3::x() } else { V3::y() };
	v.cross(&other)
		.try_normalize(SMALL_NUMBER)
		.unwrap_or_else(V3::z)
}

/// Low discrepancy points on a hemisphere of `radius` whose pole points
/// along `+Z` (`pole = 1`) or `-Z` (`pole = -1`), centered at `(0, 0, z)`.
///
/// Heights are uniform in `(0, radius)`, which is uniform in area on a
/// sphere.
pub fn golden_spiral_hemisphere(
	points: &mut Vec<V3>,
	radius: Real,
	z: Real,
	pole: Real,
	num_points: usize,
) {
	points.reserve(num_points);
	for i in 0..num_points {
		let h = (i as Real + 0.5) / num_points as Real;
		let ring = (1.0 - h * h).max(0.0).sqrt();
		let theta = i as Real * GOLDEN_ANGLE;
		points.push(V3::new(
			radius * ring * theta.cos(),
			radius * ring * theta.sin(),
			z + pole * radius * h,
		));
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sphere {
	pub center: V3,
	pub radius: Real,
}

impl Sphere {
	pub fn new(center: V3, radius: Real) -> Self {
		Self { center, radius }
	}
}

impl ImplicitShape for Sphere {
	fn phi_with_normal(&self, x: &V3) -> (Real, V3) {
		let d = x - self.center;
		let len = d.norm();
		if len <= SMALL_NUMBER {
			return (-self.radius, V3::z());
		}
		(len - self.radius, d / len)
	}
}

/// Axis aligned box centered on the origin.
#[derive(Clone, Debug, PartialEq)]
pub struct Cuboid {
	pub half_extents: V3,
}

impl Cuboid {
	pub fn new(half_extents: V3) -> Self {
		Self { half_extents }
	}
}

impl ImplicitShape for Cuboid {
	fn phi_with_normal(&self, x: &V3) -> (Real, V3) {
		let q = x.abs() - self.half_extents;
		let sign = x.map(|c| if c < 0.0 { -1.0 } else { 1.0 });
		let outside = q.map(|c| c.max(0.0));
		let outside_len = outside.norm();
		if outside_len > 0.0 {
			return (outside_len, sign.component_mul(&outside) / outside_len);
		}
		let axis = q.imax();
		let mut normal = V3::zeros();
		normal[axis] = sign[axis];
		(q[axis], normal)
	}
}

/// Segment `x1`-`x2` swept by a sphere of `radius`.
#[derive(Clone, Debug, PartialEq)]
pub struct Capsule {
	pub x1: V3,
	pub x2: V3,
	pub radius: Real,
}

impl Capsule {
	pub fn new(x1: V3, x2: V3, radius: Real) -> Self {
		Self { x1, x2, radius }
	}
}

impl ImplicitShape for Capsule {
	fn phi_with_normal(&self, x: &V3) -> (Real, V3) {
		let axis = self.x2 - self.x1;
		let len2 = axis.norm_squared();
		let t = if len2 > SMALL_NUMBER {
			((x - self.x1).dot(&axis) / len2).clamp(0.0, 1.0)
		} else {
			0.0
		};
		let closest = self.x1 + t * axis;
		let d = x - closest;
		let len = d.norm();
		if len <= SMALL_NUMBER {
			let normal = if len2 > SMALL_NUMBER {
				any_perpendicular(&axis)
			} else {
				V3::z()
			};
			return (-self.radius, normal);
		}
		(len - self.radius, d / len)
	}
}

/// Convex volume bounded by planes `n . x = d` with outward unit normals.
#[derive(Clone, Debug, PartialEq)]
pub struct Convex {
	planes: Vec<(V3, Real)>,
}

impl Convex {
	pub fn new(planes: Vec<(V3, Real)>) -> Self {
		let planes = planes
			.into_iter()
			.filter_map(|(n, d)| {
				let len = n.norm();
				(len > SMALL_NUMBER).then(|| (n / len, d / len))
			})
			.collect();
		Self { planes }
	}

	pub fn planes(&self) -> &[(V3, Real)] {
		&self.planes
	}
}

impl ImplicitShape for Convex {
	// The largest plane distance, exact inside and near faces, an
	// underestimate of the distance out past edges and corners.
	fn phi_with_normal(&self, x: &V3) -> (Real, V3) {
		self.planes
			.iter()
			.map(|(n, d)| (n.dot(x) - d, *n))
			.max_by(|a, b| a.0.total_cmp(&b.0))
			.unwrap_or((Real::MAX, V3::z()))
	}
}

/// Surface area of a sphere cap worth half a sphere.
pub fn hemisphere_area(radius: Real) -> Real {
	2.0 * PI * radius * radius
}
