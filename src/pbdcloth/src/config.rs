use crate::velocity_field::DEFAULT_FLUID_DENSITY;
use crate::{Real, V3};

/// How tether anchors are chosen when a cloth is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TetherMode {
	/// Straight line to the closest kinematic particle of each of the
	/// `max_islands` closest kinematic islands.
	Euclidean { max_islands: usize },
	/// Shortest path along mesh edges to any kinematic particle.
	Geodesic,
}

impl Default for TetherMode {
	fn default() -> Self {
		Self::Geodesic
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct SolverConfig {
	pub num_substeps: usize,
	pub num_iterations: usize,
	pub gravity: V3,
	pub wind_velocity: V3,
	/// Frames longer than this are simulated as if they were this long.
	pub max_delta_time: Real,
}

impl Default for SolverConfig {
	fn default() -> Self {
		Self {
			num_substeps: 1,
			num_iterations: 1,
			gravity: V3::new(0., 0., -9.81),
			wind_velocity: V3::zeros(),
			max_delta_time: 1.0 / 30.0,
		}
	}
}

impl SolverConfig {
	pub fn with_num_substeps(mut self, num_substeps: usize) -> Self {
		self.num_substeps = num_substeps.max(1);
		self
	}

	pub fn with_num_iterations(mut self, num_iterations: usize) -> Self {
		self.num_iterations = num_iterations.max(1);
		self
	}

	pub fn with_gravity(mut self, gravity: V3) -> Self {
		self.gravity = gravity;
		self
	}

	pub fn with_wind_velocity(mut self, wind_velocity: V3) -> Self {
		self.wind_velocity = wind_velocity;
		self
	}

	pub fn with_max_delta_time(mut self, max_delta_time: Real) -> Self {
		self.max_delta_time = max_delta_time.max(0.0);
		self
	}
}

/// Material of one cloth. Each `(low, high)` pair is mapped through the
/// matching weight map of the LOD, or used as `low` when there is none.
#[derive(Clone, Debug, PartialEq)]
pub struct ClothConfig {
	pub edge_stiffness: (Real, Real),
	pub bending_stiffness: (Real, Real),
	pub area_stiffness: (Real, Real),
	pub tether_stiffness: (Real, Real),
	pub tether_scale: (Real, Real),
	pub tether_mode: TetherMode,
	pub drag: (Real, Real),
	pub lift: (Real, Real),
	pub fluid_density: Real,
	pub max_distances_multiplier: Real,
	pub backstop_radii_multiplier: Real,
	pub use_legacy_backstop: bool,
	pub anim_drive_stiffness: (Real, Real),
	pub damping: Real,
	pub gravity_scale: Real,
	/// Replaces the solver gravity for this cloth.
	pub gravity_override: Option<V3>,
	pub collision_thickness: Real,
	pub friction: Real,
}

impl Default for ClothConfig {
	fn default() -> Self {
		Self {
			edge_stiffness: (1.0, 1.0),
			bending_stiffness: (1.0, 1.0),
			area_stiffness: (1.0, 1.0),
			tether_stiffness: (1.0, 1.0),
			tether_scale: (1.0, 1.0),
			tether_mode: TetherMode::default(),
			drag: (0.035, 0.035),
			lift: (0.035, 0.035),
			fluid_density: DEFAULT_FLUID_DENSITY,
			max_distances_multiplier: 1.0,
			backstop_radii_multiplier: 1.0,
			use_legacy_backstop: false,
			anim_drive_stiffness: (0.0, 0.0),
			damping: 0.01,
			gravity_scale: 1.0,
			gravity_override: None,
			collision_thickness: 0.01,
			friction: 0.0,
		}
	}
}

fn unit_range(low: Real, high: Real) -> (Real, Real) {
	(low.clamp(0.0, 1.0), high.clamp(0.0, 1.0))
}

impl ClothConfig {
	pub fn with_edge_stiffness(mut self, low: Real, high: Real) -> Self {
		self.edge_stiffness = unit_range(low, high);
		self
	}

	pub fn with_bending_stiffness(mut self, low: Real, high: Real) -> Self {
		self.bending_stiffness = unit_range(low, high);
		self
	}

	pub fn with_area_stiffness(mut self, low: Real, high: Real) -> Self {
		self.area_stiffness = unit_range(low, high);
		self
	}

	pub fn with_tether_stiffness(mut self, low: Real, high: Real) -> Self {
		self.tether_stiffness = unit_range(low, high);
		self
	}

	pub fn with_tether_scale(mut self, low: Real, high: Real) -> Self {
		self.tether_scale = (low.max(0.0), high.max(0.0));
		self
	}

	pub fn with_tether_mode(mut self, tether_mode: TetherMode) -> Self {
		self.tether_mode = tether_mode;
		self
	}

	pub fn with_aerodynamics(
		mut self,
		drag: (Real, Real),
		lift: (Real, Real),
		fluid_density: Real,
	) -> Self {
		self.drag = drag;
		self.lift = lift;
		self.fluid_density = fluid_density;
		self
	}

	pub fn with_legacy_backstop(mut self, use_legacy_backstop: bool) -> Self {
		self.use_legacy_backstop = use_legacy_backstop;
		self
	}

	pub fn with_anim_drive_stiffness(mut self, low: Real, high: Real) -> Self {
		self.anim_drive_stiffness = unit_range(low, high);
		self
	}

	pub fn with_damping(mut self, damping: Real) -> Self {
		self.damping = damping.clamp(0.0, 1.0);
		self
	}

	pub fn with_gravity_scale(mut self, gravity_scale: Real) -> Self {
		self.gravity_scale = gravity_scale;
		self
	}

	pub fn with_gravity_override(mut self, gravity: V3) -> Self {
		self.gravity_override = Some(gravity);
		self
	}

	pub fn with_collision(mut self, thickness: Real, friction: Real) -> Self {
		self.collision_thickness = thickness.max(0.0);
		self.friction = friction.max(0.0);
		self
	}

	/// Gravity felt by this cloth under the solver's `gravity`.
	pub fn gravity(&self, gravity: V3) -> V3 {
		self.gravity_override.unwrap_or(gravity) * self.gravity_scale
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_builders_clamp() {
		let config = ClothConfig::default()
			.with_edge_stiffness(-1.0, 2.0)
			.with_damping(3.0)
			.with_collision(-1.0, 0.5);
		assert_eq!(config.edge_stiffness, (0.0, 1.0));
		assert_eq!(config.damping, 1.0);
		assert_eq!(config.collision_thickness, 0.0);
		let solver = SolverConfig::default().with_num_substeps(0);
		assert_eq!(solver.num_substeps, 1);
	}

	#[test]
	fn test_gravity() {
		let g = V3::new(0., 0., -10.);
		let config = ClothConfig::default().with_gravity_scale(0.5);
		assert_eq!(config.gravity(g), V3::new(0., 0., -5.));
		let config = config.with_gravity_override(V3::new(1., 0., 0.));
		assert_eq!(config.gravity(g), V3::new(0.5, 0., 0.));
	}
}
