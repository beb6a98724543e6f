use std::ops::Range;

use crate::{Real, SMALL_NUMBER, V3};

/// A solver particle. Particles are never allocated on their own, they live
/// in `SolverParticles::particles` and are addressed by global index.
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
	/// Position at the start of the substep.
	pub x: V3,
	/// Predicted position, the one constraints project.
	pub p: V3,
	pub v: V3,
	/// Zero for kinematic particles.
	pub inv_m: Real,
	/// External acceleration accumulated for the current substep.
	pub accel: V3,
}

impl Particle {
	pub fn new(pos: V3, inv_m: Real) -> Self {
		Self {
			x: pos,
			p: pos,
			v: V3::zeros(),
			inv_m,
			accel: V3::zeros(),
		}
	}

	pub fn is_kinematic(&self) -> bool {
		self.inv_m == 0.0
	}

	pub fn reset_pos(&mut self, pos: V3) {
		self.x = pos;
		self.p = pos;
		self.v = V3::zeros();
	}

	/// Explicit prediction step for a dynamic particle.
	pub fn integrate(&mut self, dt: Real, gravity: V3, damping: Real) {
		if self.is_kinematic() {
			return;
		}
		self.v += (gravity + self.accel) * dt;
		self.v *= 1.0 - damping;
		self.p = self.x + self.v * dt;
	}

	/// Kinematic particles follow their animation target.
	pub fn drive(&mut self, target: V3) {
		self.p = target;
	}

	pub fn update_velocity(&mut self, dt: Real) {
		self.v = (self.p - self.x) / dt;
		self.x = self.p;
	}
}

/// Contiguous block of the particle buffer owned by one cloth LOD.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParticleRange {
	pub offset: usize,
	pub count: usize,
}

impl ParticleRange {
	pub fn new(offset: usize, count: usize) -> Self {
		Self { offset, count }
	}

	pub fn end(&self) -> usize {
		self.offset + self.count
	}

	pub fn range(&self) -> Range<usize> {
		self.offset..self.end()
	}

	pub fn contains(&self, index: usize) -> bool {
		index >= self.offset && index < self.end()
	}

	pub fn local(&self, index: usize) -> usize {
		debug_assert!(self.contains(index));
		index - self.offset
	}

	pub fn global(&self, local: usize) -> usize {
		debug_assert!(local < self.count);
		self.offset + local
	}
}

/// Animated targets, indexed globally like the particles.
///
/// `positions` and `normals` hold the targets of the current substep,
/// interpolated between the pose at the start of the frame (`old_*`) and
/// the pose the frame ends on (`new_*`).
#[derive(Clone, Debug, Default)]
pub struct AnimationTargets {
	pub positions: Vec<V3>,
	pub normals: Vec<V3>,
	pub old_positions: Vec<V3>,
	pub new_positions: Vec<V3>,
	pub old_normals: Vec<V3>,
	pub new_normals: Vec<V3>,
}

impl AnimationTargets {
	fn resize(&mut self, len: usize) {
		for v in [
			&mut self.positions,
			&mut self.old_positions,
			&mut self.new_positions,
		] {
			v.resize(len, V3::zeros());
		}
		for v in [&mut self.normals, &mut self.old_normals, &mut self.new_normals] {
			v.resize(len, V3::z());
		}
	}

	/// Set the pose of `range` without interpolation from a previous one.
	pub fn reset(&mut self, range: ParticleRange, positions: &[V3], normals: &[V3]) {
		let r = range.range();
		for v in [
			&mut self.positions,
			&mut self.old_positions,
			&mut self.new_positions,
		] {
			v[r.clone()].copy_from_slice(positions);
		}
		for v in [&mut self.normals, &mut self.old_normals, &mut self.new_normals] {
			v[r.clone()].copy_from_slice(normals);
		}
	}

	/// Set the pose `range` reaches at the end of the next frame.
	pub fn set_target(&mut self, range: ParticleRange, positions: &[V3], normals: &[V3]) {
		self.new_positions[range.range()].copy_from_slice(positions);
		self.new_normals[range.range()].copy_from_slice(normals);
	}

	pub fn interpolate(&mut self, range: ParticleRange, alpha: Real) {
		for i in range.range() {
			self.positions[i] = self.old_positions[i].lerp(&self.new_positions[i], alpha);
			let n = self.old_normals[i].lerp(&self.new_normals[i], alpha);
			self.normals[i] = n.try_normalize(SMALL_NUMBER).unwrap_or(self.new_normals[i]);
		}
	}

	/// The frame's end pose becomes the next frame's start pose.
	pub fn end_frame(&mut self, range: ParticleRange) {
		let r = range.range();
		self.old_positions[r.clone()].copy_from_slice(&self.new_positions[r.clone()]);
		self.old_normals[r.clone()].copy_from_slice(&self.new_normals[r]);
	}
}

/// The shared particle arena of a solver.
#[derive(Clone, Debug, Default)]
pub struct SolverParticles {
	pub particles: Vec<Particle>,
	pub animation: AnimationTargets,
	free: Vec<ParticleRange>,
}

impl SolverParticles {
	pub fn len(&self) -> usize {
		self.particles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.particles.is_empty()
	}

	/// Reserve `count` particles, reusing a freed block when one fits.
	pub fn add_range(&mut self, count: usize) -> ParticleRange {
		if let Some(pos) = self.free.iter().position(|r| r.count >= count) {
			let block = self.free[pos];
			let range = ParticleRange::new(block.offset, count);
			if block.count == count {
				self.free.remove(pos);
			} else {
				self.free[pos] =
					ParticleRange::new(block.offset + count, block.count - count);
			}
			return range;
		}
		let offset = self.particles.len();
		let len = offset + count;
		self.particles
			.resize(len, Particle::new(V3::zeros(), 0.0));
		self.animation.resize(len);
		ParticleRange::new(offset, count)
	}

	/// Give a block back. Its particles are made kinematic and parked at
	/// the origin until the block is reused.
	pub fn remove_range(&mut self, range: ParticleRange) {
		if range.count == 0 {
			return;
		}
		for particle in &mut self.particles[range.range()] {
			*particle = Particle::new(V3::zeros(), 0.0);
		}
		self.free.push(range);
		self.free.sort_by_key(|r| r.offset);
		let mut merged: Vec<ParticleRange> = Vec::with_capacity(self.free.len());
		for r in self.free.drain(..) {
			match merged.last_mut() {
				Some(last) if last.end() == r.offset => last.count += r.count,
				_ => merged.push(r),
			}
		}
		// trailing free space is released
		while let Some(last) = merged.last() {
			if last.end() != self.particles.len() {
				break;
			}
			self.particles.truncate(last.offset);
			let len = self.particles.len();
			self.animation.resize(len);
			merged.pop();
		}
		self.free = merged;
	}

	/// Mutable particles of `range` alongside the (global) animation data.
	pub fn split_mut(
		&mut self,
		range: ParticleRange,
	) -> (&mut [Particle], &AnimationTargets) {
		(&mut self.particles[range.range()], &self.animation)
	}

	pub fn positions(&self, range: ParticleRange) -> impl Iterator<Item = V3> + '_ {
		self.particles[range.range()].iter().map(|p| p.p)
	}
}
