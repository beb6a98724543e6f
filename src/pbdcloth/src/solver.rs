use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use nalgebra::Point3;
use tracing::{debug, info};

use crate::cloth::{Cloth, ClothConstraints};
use crate::collider::Collider;
use crate::config::SolverConfig;
use crate::error::ClothError;
use crate::parallel;
use crate::particle::{Particle, ParticleRange, SolverParticles};
use crate::{Real, Transform, V3};
use protocol::simul_data::ClothSimulData;
use protocol::Message;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClothId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColliderId(pub usize);

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolverStats {
	pub num_cloths: usize,
	pub num_colliders: usize,
	pub num_particles: usize,
	pub num_kinematic: usize,
	pub num_dynamic: usize,
	pub num_substeps: usize,
	pub num_iterations: usize,
	/// Simulated time since the solver was created.
	pub simulation_time: Real,
	pub last_update_duration: Duration,
}

#[derive(Clone, Debug)]
struct ClothInstance {
	cloth: Cloth,
	lod: usize,
	range: ParticleRange,
	/// Maps the cloth's reference space into solver space.
	reference_transform: Transform,
	constraints: ClothConstraints,
}

impl ClothInstance {
	/// Allocate the LOD's particles at its rest pose.
	fn new(
		particles: &mut SolverParticles,
		cloth: Cloth,
		lod: usize,
		reference_transform: Transform,
	) -> Result<Self, ClothError> {
		let data = cloth.lod(lod)?;
		let range = particles.add_range(data.len());
		let constraints =
			ClothConstraints::new(range, data, cloth.mesh(lod)?, &cloth.config);
		let instance = Self {
			cloth,
			lod,
			range,
			reference_transform,
			constraints,
		};
		instance.reset_particles(particles)?;
		Ok(instance)
	}

	fn reset_particles(&self, particles: &mut SolverParticles) -> Result<(), ClothError> {
		let data = self.cloth.lod(self.lod)?;
		let positions: Vec<V3> = data
			.positions
			.iter()
			.map(|p| (self.reference_transform * Point3::from(*p)).coords)
			.collect();
		let normals: Vec<V3> = data
			.normals
			.iter()
			.map(|n| self.reference_transform.rotation * n)
			.collect();
		let targets = particles.particles[self.range.range()].iter_mut();
		for ((particle, &pos), &inv_m) in targets.zip(&positions).zip(&data.inv_masses) {
			*particle = Particle::new(pos, inv_m);
		}
		particles.animation.reset(self.range, &positions, &normals);
		Ok(())
	}

	/// Rebuild every stage of the active LOD from the current config,
	/// e.g. when a stage that was off gets a non-zero stiffness.
	fn rebuild_constraints(&mut self) -> Result<(), ClothError> {
		let lod = self.cloth.lod(self.lod)?;
		let mesh = self.cloth.mesh(self.lod)?;
		self.constraints = ClothConstraints::new(self.range, lod, mesh, &self.cloth.config);
		Ok(())
	}

	fn step(
		&mut self,
		particles: &mut SolverParticles,
		colliders: &[&Collider],
		environment: &StepEnvironment,
	) {
		let range = self.range;
		let dt = environment.dt;
		let config = &self.cloth.config;
		let gravity = config.gravity(environment.gravity);
		let damping = config.damping;
		particles.animation.interpolate(range, environment.alpha);

		let field = &mut self.constraints.velocity_field;
		let aerodynamics = field.is_active();
		if aerodynamics {
			field.update_field(&particles.particles, environment.wind_velocity);
		}
		let (cloth_particles, animation) = particles.split_mut(range);
		if aerodynamics {
			field.apply(cloth_particles);
		}
		parallel::for_each_mut(cloth_particles, |local, particle| {
			if particle.is_kinematic() {
				particle.drive(animation.positions[range.global(local)]);
			} else {
				particle.integrate(dt, gravity, damping);
			}
			particle.accel = V3::zeros();
		});

		for _ in 0..environment.num_iterations {
			for stage in self.constraints.stages() {
				stage.apply(particles, dt);
			}
			self.constraints.collision.apply(particles, colliders);
		}

		let (cloth_particles, _) = particles.split_mut(range);
		parallel::for_each_mut(cloth_particles, |_, particle| particle.update_velocity(dt));
	}
}

fn unit_range(low: Real, high: Real) -> (Real, Real) {
	(low.clamp(0.0, 1.0), high.clamp(0.0, 1.0))
}

struct StepEnvironment {
	dt: Real,
	/// Fraction of the frame reached at the end of the substep.
	alpha: Real,
	gravity: V3,
	wind_velocity: V3,
	num_iterations: usize,
}

/// Owns the particle buffer shared by all cloths and advances it.
#[derive(Clone, Debug, Default)]
pub struct Solver {
	config: SolverConfig,
	particles: SolverParticles,
	cloths: BTreeMap<ClothId, ClothInstance>,
	colliders: BTreeMap<ColliderId, Collider>,
	id_alloc: usize,
	stats: SolverStats,
}

impl Solver {
	pub fn new(config: SolverConfig) -> Self {
		let mut solver = Self {
			config,
			..Default::default()
		};
		solver.refresh_stats();
		solver
	}

	pub fn config(&self) -> &SolverConfig {
		&self.config
	}

	pub fn particles(&self) -> &SolverParticles {
		&self.particles
	}

	pub fn stats(&self) -> &SolverStats {
		&self.stats
	}

	pub fn set_gravity(&mut self, gravity: V3) {
		self.config.gravity = gravity;
	}

	pub fn set_wind_velocity(&mut self, wind_velocity: V3) {
		self.config.wind_velocity = wind_velocity;
	}

	pub fn set_num_substeps(&mut self, num_substeps: usize) {
		self.config.num_substeps = num_substeps.max(1);
		self.stats.num_substeps = self.config.num_substeps;
	}

	pub fn set_num_iterations(&mut self, num_iterations: usize) {
		self.config.num_iterations = num_iterations.max(1);
		self.stats.num_iterations = self.config.num_iterations;
	}

	fn next_id(&mut self) -> usize {
		self.id_alloc += 1;
		self.id_alloc - 1
	}

	fn instance(&self, id: ClothId) -> Result<&ClothInstance, ClothError> {
		self.cloths.get(&id).ok_or(ClothError::UnknownCloth(id.0))
	}

	fn instance_mut(&mut self, id: ClothId) -> Result<&mut ClothInstance, ClothError> {
		self.cloths.get_mut(&id).ok_or(ClothError::UnknownCloth(id.0))
	}

	/// Add `cloth` at `lod`, its rest pose placed by `reference_transform`.
	pub fn add_cloth(
		&mut self,
		cloth: Cloth,
		lod: usize,
		reference_transform: Transform,
	) -> Result<ClothId, ClothError> {
		let instance = ClothInstance::new(&mut self.particles, cloth, lod, reference_transform)?;
		let id = ClothId(self.next_id());
		info!(
			"add cloth {}: LOD {}, particles {}..{}",
			id.0,
			lod,
			instance.range.offset,
			instance.range.end()
		);
		self.cloths.insert(id, instance);
		self.refresh_stats();
		Ok(id)
	}

	pub fn remove_cloth(&mut self, id: ClothId) -> Result<Cloth, ClothError> {
		let instance = self.cloths.remove(&id).ok_or(ClothError::UnknownCloth(id.0))?;
		self.particles.remove_range(instance.range);
		info!("remove cloth {}", id.0);
		self.refresh_stats();
		Ok(instance.cloth)
	}

	pub fn cloth(&self, id: ClothId) -> Result<&Cloth, ClothError> {
		Ok(&self.instance(id)?.cloth)
	}

	pub fn cloth_ids(&self) -> impl Iterator<Item = ClothId> + '_ {
		self.cloths.keys().copied()
	}

	pub fn particle_range(&self, id: ClothId) -> Result<ParticleRange, ClothError> {
		Ok(self.instance(id)?.range)
	}

	pub fn lod(&self, id: ClothId) -> Result<usize, ClothError> {
		Ok(self.instance(id)?.lod)
	}

	/// Switch LOD. The old range is released and the new LOD restarts
	/// from its rest pose.
	pub fn set_lod(&mut self, id: ClothId, lod: usize) -> Result<(), ClothError> {
		let current = self.instance(id)?;
		if current.lod == lod {
			return Ok(());
		}
		current.cloth.lod(lod)?;
		let old = self.cloths.remove(&id).ok_or(ClothError::UnknownCloth(id.0))?;
		self.particles.remove_range(old.range);
		let instance =
			ClothInstance::new(&mut self.particles, old.cloth, lod, old.reference_transform)?;
		info!(
			"cloth {} switched LOD {} -> {}, particles {}..{}",
			id.0,
			old.lod,
			lod,
			instance.range.offset,
			instance.range.end()
		);
		self.cloths.insert(id, instance);
		self.refresh_stats();
		Ok(())
	}

	pub fn reference_transform(&self, id: ClothId) -> Result<Transform, ClothError> {
		Ok(self.instance(id)?.reference_transform)
	}

	/// Move the cloth's reference space. Particles are left in place, only
	/// poses set from now on and extracted data see the new transform.
	pub fn set_reference_transform(
		&mut self,
		id: ClothId,
		reference_transform: Transform,
	) -> Result<(), ClothError> {
		self.instance_mut(id)?.reference_transform = reference_transform;
		Ok(())
	}

	/// Put every particle of the cloth back at its rest pose.
	pub fn reset_cloth(&mut self, id: ClothId) -> Result<(), ClothError> {
		let instance = self.cloths.get(&id).ok_or(ClothError::UnknownCloth(id.0))?;
		instance.reset_particles(&mut self.particles)
	}

	/// Animated pose the cloth reaches at the end of the next update, in
	/// reference space. Empty `normals` are computed from `positions`.
	pub fn set_animation_pose(
		&mut self,
		id: ClothId,
		positions: &[V3],
		normals: &[V3],
	) -> Result<(), ClothError> {
		let instance = self.instance(id)?;
		let count = instance.range.count;
		ClothError::check_size("animation positions", count, positions.len())?;
		let computed;
		let normals = if normals.is_empty() {
			computed = instance
				.cloth
				.mesh(instance.lod)?
				.point_normals(positions.iter().copied());
			&computed[..]
		} else {
			ClothError::check_size("animation normals", count, normals.len())?;
			normals
		};
		let transform = instance.reference_transform;
		let positions: Vec<V3> = positions
			.iter()
			.map(|p| (transform * Point3::from(*p)).coords)
			.collect();
		let normals: Vec<V3> = normals.iter().map(|n| transform.rotation * n).collect();
		self.particles
			.animation
			.set_target(instance.range, &positions, &normals);
		Ok(())
	}

	pub fn set_max_distances_multiplier(
		&mut self,
		id: ClothId,
		multiplier: Real,
	) -> Result<(), ClothError> {
		let instance = self.instance_mut(id)?;
		instance.cloth.config.max_distances_multiplier = multiplier.max(0.0);
		if let Some(c) = instance.constraints.max_distance.as_mut() {
			c.set_sphere_radii_multiplier(multiplier);
		}
		Ok(())
	}

	pub fn set_backstop_radii_multiplier(
		&mut self,
		id: ClothId,
		multiplier: Real,
	) -> Result<(), ClothError> {
		let instance = self.instance_mut(id)?;
		instance.cloth.config.backstop_radii_multiplier = multiplier.max(0.0);
		if let Some(c) = instance.constraints.backstop.as_mut() {
			c.set_sphere_radii_multiplier(multiplier);
		}
		Ok(())
	}

	pub fn set_use_legacy_backstop(
		&mut self,
		id: ClothId,
		use_legacy_backstop: bool,
	) -> Result<(), ClothError> {
		let instance = self.instance_mut(id)?;
		instance.cloth.config.use_legacy_backstop = use_legacy_backstop;
		if let Some(c) = instance.constraints.backstop.as_mut() {
			c.set_use_legacy_backstop(use_legacy_backstop);
		}
		Ok(())
	}

	pub fn set_tether_scale(&mut self, id: ClothId, low: Real, high: Real) -> Result<(), ClothError> {
		let instance = self.instance_mut(id)?;
		instance.cloth.config.tether_scale = (low.max(0.0), high.max(0.0));
		if let Some(c) = instance.constraints.long_range.as_mut() {
			c.set_scale(low, high);
		}
		Ok(())
	}

	pub fn set_tether_stiffness(
		&mut self,
		id: ClothId,
		low: Real,
		high: Real,
	) -> Result<(), ClothError> {
		let instance = self.instance_mut(id)?;
		instance.cloth.config.tether_stiffness = unit_range(low, high);
		match instance.constraints.long_range.as_mut() {
			Some(c) => c.set_stiffness(low, high),
			None => instance.rebuild_constraints()?,
		}
		Ok(())
	}

	pub fn set_edge_stiffness(&mut self, id: ClothId, low: Real, high: Real) -> Result<(), ClothError> {
		let instance = self.instance_mut(id)?;
		instance.cloth.config.edge_stiffness = unit_range(low, high);
		match instance.constraints.edges.as_mut() {
			Some(c) => c.set_stiffness(low, high),
			None => instance.rebuild_constraints()?,
		}
		Ok(())
	}

	pub fn set_bending_stiffness(
		&mut self,
		id: ClothId,
		low: Real,
		high: Real,
	) -> Result<(), ClothError> {
		let instance = self.instance_mut(id)?;
		instance.cloth.config.bending_stiffness = unit_range(low, high);
		match instance.constraints.bending.as_mut() {
			Some(c) => c.set_stiffness(low, high),
			None => instance.rebuild_constraints()?,
		}
		Ok(())
	}

	pub fn set_area_stiffness(&mut self, id: ClothId, low: Real, high: Real) -> Result<(), ClothError> {
		let instance = self.instance_mut(id)?;
		instance.cloth.config.area_stiffness = unit_range(low, high);
		match instance.constraints.area.as_mut() {
			Some(c) => c.set_stiffness(low, high),
			None => instance.rebuild_constraints()?,
		}
		Ok(())
	}

	pub fn set_anim_drive_stiffness(
		&mut self,
		id: ClothId,
		low: Real,
		high: Real,
	) -> Result<(), ClothError> {
		let instance = self.instance_mut(id)?;
		instance.cloth.config.anim_drive_stiffness = unit_range(low, high);
		match instance.constraints.anim_drive.as_mut() {
			Some(c) => c.set_stiffness(low, high),
			None => instance.rebuild_constraints()?,
		}
		Ok(())
	}

	/// Distance kept from colliders and the friction applied on contact.
	pub fn set_collision(
		&mut self,
		id: ClothId,
		thickness: Real,
		friction: Real,
	) -> Result<(), ClothError> {
		let instance = self.instance_mut(id)?;
		let collision = &mut instance.constraints.collision;
		collision.set_thickness(thickness);
		collision.set_friction(friction);
		let config = &mut instance.cloth.config;
		config.collision_thickness = thickness.max(0.0);
		config.friction = friction.max(0.0);
		Ok(())
	}

	pub fn set_aerodynamics(
		&mut self,
		id: ClothId,
		drag: (Real, Real),
		lift: (Real, Real),
		fluid_density: Real,
	) -> Result<(), ClothError> {
		let instance = self.instance_mut(id)?;
		instance
			.constraints
			.velocity_field
			.set_properties(drag, lift, fluid_density);
		let config = &mut instance.cloth.config;
		config.drag = drag;
		config.lift = lift;
		config.fluid_density = fluid_density;
		Ok(())
	}

	pub fn add_collider(&mut self, collider: Collider) -> ColliderId {
		let id = ColliderId(self.next_id());
		info!("add collider {} with {} shapes", id.0, collider.shapes().len());
		self.colliders.insert(id, collider);
		self.refresh_stats();
		id
	}

	pub fn remove_collider(&mut self, id: ColliderId) -> Result<Collider, ClothError> {
		let collider = self
			.colliders
			.remove(&id)
			.ok_or(ClothError::UnknownCollider(id.0))?;
		info!("remove collider {}", id.0);
		self.refresh_stats();
		Ok(collider)
	}

	pub fn collider(&self, id: ColliderId) -> Result<&Collider, ClothError> {
		self.colliders.get(&id).ok_or(ClothError::UnknownCollider(id.0))
	}

	/// Transform the collider reaches at the end of the next update.
	pub fn set_collider_transform(
		&mut self,
		id: ColliderId,
		transform: Transform,
	) -> Result<(), ClothError> {
		self.colliders
			.get_mut(&id)
			.ok_or(ClothError::UnknownCollider(id.0))?
			.set_transform(transform);
		Ok(())
	}

	/// Move the collider without sweeping it through the next update.
	pub fn reset_collider_transform(
		&mut self,
		id: ColliderId,
		transform: Transform,
	) -> Result<(), ClothError> {
		self.colliders
			.get_mut(&id)
			.ok_or(ClothError::UnknownCollider(id.0))?
			.reset_transform(transform);
		Ok(())
	}

	/// Advance the simulation by `dt` seconds. A zero, negative or NaN `dt`
	/// does nothing.
	pub fn update(&mut self, dt: Real) {
		if dt.is_nan() || dt <= 0.0 {
			return;
		}
		let start = Instant::now();
		let dt = if self.config.max_delta_time > 0.0 {
			dt.min(self.config.max_delta_time)
		} else {
			dt
		};
		let num_substeps = self.config.num_substeps.max(1);
		let substep_dt = dt / num_substeps as Real;
		for substep in 0..num_substeps {
			let alpha = (substep + 1) as Real / num_substeps as Real;
			for collider in self.colliders.values_mut() {
				collider.interpolate(alpha);
			}
			let colliders: Vec<&Collider> = self.colliders.values().collect();
			let environment = StepEnvironment {
				dt: substep_dt,
				alpha,
				gravity: self.config.gravity,
				wind_velocity: self.config.wind_velocity,
				num_iterations: self.config.num_iterations.max(1),
			};
			for instance in self.cloths.values_mut() {
				instance.step(&mut self.particles, &colliders, &environment);
			}
		}
		for instance in self.cloths.values() {
			self.particles.animation.end_frame(instance.range);
		}
		for collider in self.colliders.values_mut() {
			collider.end_frame();
		}

		self.stats.simulation_time += dt;
		self.stats.last_update_duration = start.elapsed();
		debug!(
			"update {:.4}s in {} substeps x {} iterations took {:?}",
			dt, num_substeps, self.config.num_iterations, self.stats.last_update_duration
		);
	}

	/// Simulated positions in the cloth's reference space.
	pub fn particle_positions(&self, id: ClothId) -> Result<Vec<V3>, ClothError> {
		let instance = self.instance(id)?;
		let transform = instance.reference_transform;
		Ok(self
			.particles
			.positions(instance.range)
			.map(|p| transform.inverse_transform_point(&Point3::from(p)).coords)
			.collect())
	}

	/// Vertex normals of the simulated surface in the cloth's reference
	/// space.
	pub fn particle_normals(&self, id: ClothId) -> Result<Vec<V3>, ClothError> {
		let instance = self.instance(id)?;
		let rotation = instance.reference_transform.rotation;
		let normals = instance
			.cloth
			.mesh(instance.lod)?
			.point_normals(self.particles.positions(instance.range));
		Ok(normals
			.iter()
			.map(|n| rotation.inverse_transform_vector(n))
			.collect())
	}

	pub fn simul_data(&self, id: ClothId) -> Result<ClothSimulData, ClothError> {
		let lod = self.lod(id)?;
		let positions = self.particle_positions(id)?;
		let normals = self.particle_normals(id)?;
		Ok(ClothSimulData {
			cloth_id: id.0,
			lod,
			positions: positions.iter().map(|p| [p.x, p.y, p.z]).collect(),
			normals: normals.iter().map(|n| [n.x, n.y, n.z]).collect(),
		})
	}

	/// Render update for every cloth.
	pub fn simul_message(&self) -> Result<Message, ClothError> {
		let data = self
			.cloth_ids()
			.map(|id| self.simul_data(id))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Message::SimulUpdate(data))
	}

	fn refresh_stats(&mut self) {
		let mut num_particles = 0;
		let mut num_kinematic = 0;
		for instance in self.cloths.values() {
			num_particles += instance.range.count;
			num_kinematic += self.particles.particles[instance.range.range()]
				.iter()
				.filter(|p| p.is_kinematic())
				.count();
		}
		self.stats.num_cloths = self.cloths.len();
		self.stats.num_colliders = self.colliders.len();
		self.stats.num_particles = num_particles;
		self.stats.num_kinematic = num_kinematic;
		self.stats.num_dynamic = num_particles - num_kinematic;
		self.stats.num_substeps = self.config.num_substeps;
		self.stats.num_iterations = self.config.num_iterations;
	}
}
