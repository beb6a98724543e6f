use crate::Real;

/// A scalar parameter ranging over `[low, high]`, optionally modulated per
/// particle by a painted weight map (local indexing).
///
/// Without a weight map every particle reads `low`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightedValue {
	low: Real,
	high: Real,
	weights: Vec<Real>,
}

impl WeightedValue {
	pub fn new(low: Real, high: Real) -> Self {
		Self {
			low,
			high,
			weights: Vec::new(),
		}
	}

	pub fn constant(value: Real) -> Self {
		Self::new(value, value)
	}

	pub fn with_weights(mut self, weights: Vec<Real>) -> Self {
		self.weights = weights.into_iter().map(|w| w.clamp(0.0, 1.0)).collect();
		self
	}

	pub fn low(&self) -> Real {
		self.low
	}

	pub fn high(&self) -> Real {
		self.high
	}

	pub fn range(&self) -> Real {
		self.high - self.low
	}

	pub fn set_range(&mut self, low: Real, high: Real) {
		self.low = low;
		self.high = high;
	}

	pub fn weights(&self) -> &[Real] {
		&self.weights
	}

	pub fn has_weight_map(&self) -> bool {
		!self.weights.is_empty() && self.low != self.high
	}

	/// True when the value is zero for every particle.
	pub fn is_zero(&self) -> bool {
		self.low == 0.0 && self.high == 0.0
	}

	pub fn value(&self, local: usize) -> Real {
		if self.has_weight_map() {
			self.low + self.range() * self.weights[local]
		} else {
			self.low
		}
	}

	/// Map an already averaged weight through the range.
	pub fn lerp(&self, weight: Real) -> Real {
		self.low + self.range() * weight
	}
}
