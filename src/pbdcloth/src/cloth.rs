use fnv::FnvHashMap;
use tracing::warn;

use crate::config::ClothConfig;
use crate::constraint::anim_drive::AnimDriveConstraint;
use crate::constraint::area::AreaConstraints;
use crate::constraint::collision::CollisionConstraint;
use crate::constraint::long_range::{self, LongRangeConstraints};
use crate::constraint::spherical::{SphericalBackstopConstraint, SphericalConstraint};
use crate::constraint::spring::SpringConstraints;
use crate::constraint::Constraint;
use crate::error::ClothError;
use crate::mesh::TriangleMesh;
use crate::particle::ParticleRange;
use crate::velocity_field::VelocityField;
use crate::weighted_value::WeightedValue;
use crate::{Real, V3};

/// Per-particle maps a LOD can be painted with.
///
/// `MaxDistance`, `BackstopDistance` and `BackstopRadius` hold distances,
/// every other map holds weights in `[0, 1]` blending the matching
/// `(low, high)` range of the `ClothConfig`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WeightMapTarget {
	MaxDistance,
	BackstopDistance,
	BackstopRadius,
	AnimDriveStiffness,
	TetherStiffness,
	TetherScale,
	Drag,
	Lift,
	EdgeStiffness,
	BendingStiffness,
	AreaStiffness,
}

/// Mesh data of one level of detail, in the cloth's reference space.
/// `positions` and `normals` are the rest pose.
#[derive(Clone, Debug, Default)]
pub struct ClothLod {
	pub positions: Vec<V3>,
	/// Left empty to compute them from the rest pose.
	pub normals: Vec<V3>,
	pub inv_masses: Vec<Real>,
	pub triangles: Vec<[usize; 3]>,
	pub weight_maps: FnvHashMap<WeightMapTarget, Vec<Real>>,
}

impl ClothLod {
	/// All particles dynamic with unit mass.
	pub fn new(positions: Vec<V3>, triangles: Vec<[usize; 3]>) -> Self {
		let inv_masses = vec![1.0; positions.len()];
		Self {
			positions,
			normals: Vec::new(),
			inv_masses,
			triangles,
			weight_maps: FnvHashMap::default(),
		}
	}

	/// A `nx` by `ny` sheet hanging in the XZ plane from its top row,
	/// which is kinematic.
	pub fn grid(nx: usize, ny: usize, spacing: Real) -> Self {
		let mut positions = Vec::with_capacity(nx * ny);
		let mut inv_masses = Vec::with_capacity(nx * ny);
		for row in 0..ny {
			for col in 0..nx {
				positions.push(V3::new(spacing * col as Real, 0., -spacing * row as Real));
				inv_masses.push(if row == 0 { 0.0 } else { 1.0 });
			}
		}
		let mut triangles = Vec::new();
		for row in 1..ny {
			for col in 1..nx {
				let a = (row - 1) * nx + col - 1;
				let b = a + 1;
				let c = a + nx;
				let d = c + 1;
				triangles.push([a, c, b]);
				triangles.push([b, c, d]);
			}
		}
		Self::new(positions, triangles).with_inv_masses(inv_masses)
	}

	pub fn with_normals(mut self, normals: Vec<V3>) -> Self {
		self.normals = normals;
		self
	}

	pub fn with_inv_masses(mut self, inv_masses: Vec<Real>) -> Self {
		self.inv_masses = inv_masses;
		self
	}

	pub fn with_weight_map(mut self, target: WeightMapTarget, values: Vec<Real>) -> Self {
		self.weight_maps.insert(target, values);
		self
	}

	pub fn len(&self) -> usize {
		self.positions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.positions.is_empty()
	}

	pub fn weight_map(&self, target: WeightMapTarget) -> Option<&[Real]> {
		self.weight_maps.get(&target).map(|v| v.as_slice())
	}

	pub fn num_kinematic(&self) -> usize {
		self.inv_masses.iter().filter(|&&w| w == 0.0).count()
	}

	fn weighted(&self, range: (Real, Real), target: WeightMapTarget) -> WeightedValue {
		let value = WeightedValue::new(range.0, range.1);
		match self.weight_map(target) {
			Some(weights) => value.with_weights(weights.to_vec()),
			None => value,
		}
	}

	/// Check every per-particle array and build the topology.
	pub fn validate(&self) -> Result<TriangleMesh, ClothError> {
		let count = self.len();
		if !self.normals.is_empty() {
			ClothError::check_size("normals", count, self.normals.len())?;
		}
		ClothError::check_size("inverse masses", count, self.inv_masses.len())?;
		if let Some((index, &value)) = self
			.inv_masses
			.iter()
			.enumerate()
			.find(|(_, w)| !w.is_finite() || **w < 0.0)
		{
			return Err(ClothError::InvalidInverseMass { index, value });
		}
		for values in self.weight_maps.values() {
			ClothError::check_size("weight map", count, values.len())?;
		}
		TriangleMesh::new(self.triangles.clone(), count)
	}
}

/// A cloth asset: material plus one or more LODs.
#[derive(Clone, Debug)]
pub struct Cloth {
	pub config: ClothConfig,
	lods: Vec<ClothLod>,
	meshes: Vec<TriangleMesh>,
}

impl Cloth {
	pub fn new(config: ClothConfig, lods: Vec<ClothLod>) -> Result<Self, ClothError> {
		if lods.is_empty() {
			return Err(ClothError::InvalidLod { lod: 0, count: 0 });
		}
		let mut meshes = Vec::with_capacity(lods.len());
		let mut lods = lods;
		for lod in lods.iter_mut() {
			let mesh = lod.validate()?;
			if lod.normals.is_empty() {
				lod.normals = mesh.point_normals(lod.positions.iter().copied());
			}
			if lod.num_kinematic() == 0 {
				warn!("cloth LOD with {} particles has no kinematic particle", lod.len());
			}
			meshes.push(mesh);
		}
		Ok(Self {
			config,
			lods,
			meshes,
		})
	}

	pub fn num_lods(&self) -> usize {
		self.lods.len()
	}

	pub fn lod(&self, lod: usize) -> Result<&ClothLod, ClothError> {
		self.lods.get(lod).ok_or(ClothError::InvalidLod {
			lod,
			count: self.lods.len(),
		})
	}

	pub fn mesh(&self, lod: usize) -> Result<&TriangleMesh, ClothError> {
		self.meshes.get(lod).ok_or(ClothError::InvalidLod {
			lod,
			count: self.meshes.len(),
		})
	}
}

/// Constraints of the active LOD of a cloth, bound to its particle range.
#[derive(Clone, Debug)]
pub(crate) struct ClothConstraints {
	pub edges: Option<SpringConstraints>,
	pub bending: Option<SpringConstraints>,
	pub area: Option<AreaConstraints>,
	pub long_range: Option<LongRangeConstraints>,
	pub max_distance: Option<SphericalConstraint>,
	pub backstop: Option<SphericalBackstopConstraint>,
	pub anim_drive: Option<AnimDriveConstraint>,
	pub collision: CollisionConstraint,
	pub velocity_field: VelocityField,
}

impl ClothConstraints {
	pub fn new(
		range: ParticleRange,
		lod: &ClothLod,
		mesh: &TriangleMesh,
		config: &ClothConfig,
	) -> Self {
		use WeightMapTarget::*;
		debug_assert_eq!(range.count, lod.len());
		let positions = &lod.positions;

		let springs = |pairs: &[[usize; 2]], stiffness: WeightedValue| {
			(!pairs.is_empty() && !stiffness.is_zero())
				.then(|| SpringConstraints::new(range, pairs, positions, stiffness))
		};
		let edges = springs(mesh.edges(), lod.weighted(config.edge_stiffness, EdgeStiffness));
		let bending = springs(
			mesh.bending_pairs(),
			lod.weighted(config.bending_stiffness, BendingStiffness),
		);

		let area_stiffness = lod.weighted(config.area_stiffness, AreaStiffness);
		let area = (!mesh.triangles().is_empty() && !area_stiffness.is_zero()).then(|| {
			AreaConstraints::new(range, mesh.triangles(), positions, area_stiffness)
		});

		let tether_stiffness = lod.weighted(config.tether_stiffness, TetherStiffness);
		let long_range = if tether_stiffness.is_zero() {
			None
		} else {
			let tethers = long_range::compute_tethers(
				config.tether_mode,
				mesh.adjacency(),
				positions,
				&lod.inv_masses,
			);
			(!tethers.is_empty()).then(|| {
				LongRangeConstraints::new(
					range,
					tethers,
					tether_stiffness,
					lod.weighted(config.tether_scale, TetherScale),
				)
			})
		};

		let max_distance = lod.weight_map(MaxDistance).map(|radii| {
			let mut c = SphericalConstraint::new(range, radii.to_vec());
			c.set_sphere_radii_multiplier(config.max_distances_multiplier);
			c
		});

		let backstop = match (lod.weight_map(BackstopRadius), lod.weight_map(BackstopDistance)) {
			(Some(radii), Some(distances)) => {
				let mut c = SphericalBackstopConstraint::new(
					range,
					radii.to_vec(),
					distances.to_vec(),
					config.use_legacy_backstop,
				);
				c.set_sphere_radii_multiplier(config.backstop_radii_multiplier);
				Some(c)
			}
			(None, None) => None,
			_ => {
				warn!("backstop needs both a radius and a distance map, ignored");
				None
			}
		};

		let anim_drive = AnimDriveConstraint::new(
			range,
			lod.weighted(config.anim_drive_stiffness, AnimDriveStiffness),
		);
		let anim_drive = anim_drive.is_active().then(|| anim_drive);

		let velocity_field = VelocityField::new(
			range,
			mesh,
			lod.weighted(config.drag, Drag),
			lod.weighted(config.lift, Lift),
			config.fluid_density,
		);

		Self {
			edges,
			bending,
			area,
			long_range,
			max_distance,
			backstop,
			anim_drive,
			collision: CollisionConstraint::new(
				range,
				config.collision_thickness,
				config.friction,
			),
			velocity_field,
		}
	}

	/// Projection stages in the order they run each iteration. Collisions
	/// run after these.
	pub fn stages(&self) -> impl Iterator<Item = &dyn Constraint> + '_ {
		let stages: [Option<&dyn Constraint>; 7] = [
			self.edges.as_ref().map(|c| c as &dyn Constraint),
			self.bending.as_ref().map(|c| c as &dyn Constraint),
			self.area.as_ref().map(|c| c as &dyn Constraint),
			self.long_range.as_ref().map(|c| c as &dyn Constraint),
			self.max_distance.as_ref().map(|c| c as &dyn Constraint),
			self.backstop.as_ref().map(|c| c as &dyn Constraint),
			self.anim_drive.as_ref().map(|c| c as &dyn Constraint),
		];
		stages.into_iter().flatten()
	}
}
