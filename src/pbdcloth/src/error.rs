//! Errors raised when cloth or collider input is handed to the solver.

use thiserror::Error;

/// Malformed adapter data or a stale handle.
///
/// Constraint math never fails; everything here is caught before a cloth
/// or collider reaches the particle buffer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClothError {
	/// A per-particle array does not have one entry per particle.
	#[error("{name} has {actual} entries, expected {expected}")]
	SizeMismatch {
		name: &'static str,
		expected: usize,
		actual: usize,
	},

	/// A triangle references a vertex outside the LOD.
	#[error("triangle {triangle} references particle {index}, LOD has {count}")]
	IndexOutOfRange {
		triangle: usize,
		index: usize,
		count: usize,
	},

	#[error("cloth has no LOD {lod} ({count} available)")]
	InvalidLod { lod: usize, count: usize },

	#[error("unknown cloth {0}")]
	UnknownCloth(usize),

	#[error("unknown collider {0}")]
	UnknownCollider(usize),

	/// Inverse masses must be finite and non-negative.
	#[error("invalid inverse mass {value} at particle {index}")]
	InvalidInverseMass { index: usize, value: f32 },
}

impl ClothError {
	pub fn check_size(
		name: &'static str,
		expected: usize,
		actual: usize,
	) -> Result<(), Self> {
		if expected != actual {
			return Err(Self::SizeMismatch {
				name,
				expected,
				actual,
			});
		}
		Ok(())
	}
}
