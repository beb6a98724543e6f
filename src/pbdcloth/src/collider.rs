use nalgebra::Point3;

use crate::geometry::ImplicitShape;
use crate::{Real, Transform, V3};

#[derive(Clone, Debug)]
pub struct ColliderShape {
	/// Shape frame relative to the collider.
	pub local: Transform,
	pub shape: Box<dyn ImplicitShape>,
}

/// A rigid set of implicit shapes, e.g. the physics bodies of one bone.
///
/// The transform set for a frame is reached at the end of the frame, the
/// substeps in between see an interpolated transform.
#[derive(Clone, Debug)]
pub struct Collider {
	shapes: Vec<ColliderShape>,
	old_transform: Transform,
	new_transform: Transform,
	transform: Transform,
}

impl Default for Collider {
	fn default() -> Self {
		Self::new(Transform::identity())
	}
}

impl Collider {
	pub fn new(transform: Transform) -> Self {
		Self {
			shapes: Vec::new(),
			old_transform: transform,
			new_transform: transform,
			transform,
		}
	}

	pub fn with_shape<S: ImplicitShape + 'static>(self, shape: S) -> Self {
		self.with_local_shape(Transform::identity(), shape)
	}

	pub fn with_local_shape<S: ImplicitShape + 'static>(
		mut self,
		local: Transform,
		shape: S,
	) -> Self {
		self.shapes.push(ColliderShape {
			local,
			shape: Box::new(shape),
		});
		self
	}

	pub fn shapes(&self) -> &[ColliderShape] {
		&self.shapes
	}

	/// Transform at the current substep.
	pub fn transform(&self) -> &Transform {
		&self.transform
	}

	/// Target transform for the end of the next frame.
	pub fn set_transform(&mut self, transform: Transform) {
		self.new_transform = transform;
	}

	/// Jump to `transform` without sweeping through the frame.
	pub fn reset_transform(&mut self, transform: Transform) {
		self.old_transform = transform;
		self.new_transform = transform;
		self.transform = transform;
	}

	pub(crate) fn interpolate(&mut self, alpha: Real) {
		self.transform = self.old_transform.lerp_slerp(&self.new_transform, alpha);
	}

	pub(crate) fn end_frame(&mut self) {
		self.old_transform = self.new_transform;
		self.transform = self.new_transform;
	}

	/// Closest surface over all shapes, in solver space.
	pub fn phi_with_normal(&self, x: &V3) -> (Real, V3) {
		let point = Point3::from(*x);
		self.shapes
			.iter()
			.map(|s| {
				let frame = self.transform * s.local;
				let local = frame.inverse_transform_point(&point);
				let (phi, normal) = s.shape.phi_with_normal(&local.coords);
				(phi, frame.rotation * normal)
			})
			.min_by(|a, b| a.0.total_cmp(&b.0))
			.unwrap_or((Real::MAX, V3::z()))
	}
}
