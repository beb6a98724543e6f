//! Long range attachments ("tethers"): every dynamic particle is kept within
//! a rest length of its kinematic anchor(s).
//!
//! Tethers are computed once per topology (cloth creation or LOD switch)
//! and grouped into batches in which no two tethers share an end particle.
//! Batches run one after another, the tethers of a batch in parallel.

use std::ops::Range;

use fnv::FnvHashMap;
use tracing::debug;

use super::{scatter, Constraint};
use crate::config::TetherMode;
use crate::graph::{self, Island};
use crate::parallel;
use crate::particle::{Particle, ParticleRange, SolverParticles};
use crate::weighted_value::WeightedValue;
use crate::{Real, SMALL_NUMBER, V3};

/// A rope from a kinematic `start` to a dynamic `end`.
///
/// `start` is kinematic when the tether is built. Nothing re-checks that
/// later: a particle unfrozen afterwards keeps its tethers until the
/// topology is rebuilt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tether {
	pub start: usize,
	pub end: usize,
	pub ref_length: Real,
}

impl Tether {
	pub fn new(start: usize, end: usize, ref_length: Real) -> Self {
		Self {
			start,
			end,
			ref_length: ref_length.max(0.0),
		}
	}

	fn offset(&self, offset: usize) -> Self {
		Self {
			start: self.start + offset,
			end: self.end + offset,
			ref_length: self.ref_length,
		}
	}
}

/// Tethers ordered so that each batch touches every end particle at most
/// once. The k-th tether of a particle lands in batch k.
#[derive(Clone, Debug, Default)]
pub struct TetherBatches {
	tethers: Vec<Tether>,
	batches: Vec<Range<usize>>,
}

impl TetherBatches {
	pub fn new(tethers: Vec<Tether>) -> Self {
		let mut seen: FnvHashMap<usize, usize> = FnvHashMap::default();
		let mut ranked: Vec<(usize, Tether)> = tethers
			.into_iter()
			.map(|tether| {
				let rank = seen.entry(tether.end).or_insert(0);
				*rank += 1;
				(*rank - 1, tether)
			})
			.collect();
		// stable, keeps input order within a batch
		ranked.sort_by_key(|(rank, _)| *rank);

		let mut batches = Vec::new();
		let mut start = 0;
		for i in 1..=ranked.len() {
			if i == ranked.len() || ranked[i].0 != ranked[start].0 {
				batches.push(start..i);
				start = i;
			}
		}
		Self {
			tethers: ranked.into_iter().map(|(_, t)| t).collect(),
			batches,
		}
	}

	pub fn len(&self) -> usize {
		self.tethers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tethers.is_empty()
	}

	pub fn num_batches(&self) -> usize {
		self.batches.len()
	}

	pub fn tethers(&self) -> &[Tether] {
		&self.tethers
	}

	pub fn batches(&self) -> impl Iterator<Item = &[Tether]> + '_ {
		self.batches.iter().map(move |r| &self.tethers[r.clone()])
	}
}

#[derive(Clone, Debug)]
pub struct LongRangeConstraints {
	range: ParticleRange,
	tethers: TetherBatches,
	/// Local indexing by end particle.
	stiffness: WeightedValue,
	scale: WeightedValue,
}

impl LongRangeConstraints {
	/// `tethers` use local indices.
	pub fn new(
		range: ParticleRange,
		tethers: Vec<Tether>,
		stiffness: WeightedValue,
		scale: WeightedValue,
	) -> Self {
		debug_assert!(tethers
			.iter()
			.all(|t| t.start < range.count && t.end < range.count));
		let tethers = tethers.iter().map(|t| t.offset(range.offset)).collect();
		let tethers = TetherBatches::new(tethers);
		debug!(
			"{} tethers in {} batches",
			tethers.len(),
			tethers.num_batches()
		);
		Self {
			range,
			tethers,
			stiffness,
			scale,
		}
	}

	pub fn tethers(&self) -> &TetherBatches {
		&self.tethers
	}

	pub fn set_stiffness(&mut self, low: Real, high: Real) {
		self.stiffness.set_range(low.clamp(0.0, 1.0), high.clamp(0.0, 1.0));
	}

	/// Scale every rest length, e.g. to let the cloth stretch further.
	pub fn set_scale(&mut self, low: Real, high: Real) {
		self.scale.set_range(low.max(0.0), high.max(0.0));
	}

	/// Correction moving `end` back within the (scaled) rest length of
	/// `start`. Zero when the tether is slack.
	fn delta(&self, particles: &[Particle], tether: &Tether) -> V3 {
		let direction = particles[tether.start].p - particles[tether.end].p;
		let length = direction.norm();
		if length <= SMALL_NUMBER {
			return V3::zeros();
		}
		let ref_length = tether.ref_length * self.scale.value(tether.end - self.range.offset);
		let offset = length - ref_length;
		if offset <= 0.0 {
			return V3::zeros();
		}
		direction * (offset / length)
	}

	fn apply_batches<F>(&self, particles: &mut SolverParticles, stiffness: F)
	where
		F: Fn(usize) -> Real + Sync + Send,
	{
		for batch in self.tethers.batches() {
			let current = &particles.particles;
			let corrections = parallel::map(batch, |tether| {
				if current[tether.end].is_kinematic() {
					return (tether.end, V3::zeros());
				}
				(tether.end, stiffness(tether.end) * self.delta(current, tether))
			});
			scatter(particles, corrections);
		}
	}
}

impl Constraint for LongRangeConstraints {
	fn apply(&self, particles: &mut SolverParticles, _dt: Real) {
		if self.stiffness.has_weight_map() {
			let offset = self.range.offset;
			self.apply_batches(particles, |end| self.stiffness.value(end - offset));
		} else {
			let stiffness = self.stiffness.low();
			self.apply_batches(particles, |_| stiffness);
		}
	}
}

/// Anchor islands of a cloth: kinematic particles in ascending order, each
/// with the dynamic particles it reaches first.
pub fn tether_islands(adjacency: &[Vec<usize>], inv_masses: &[Real]) -> Vec<Island> {
	let anchors: Vec<usize> = (0..inv_masses.len())
		.filter(|&i| inv_masses[i] == 0.0)
		.collect();
	graph::islands(adjacency, &anchors)
}

/// Tethers of one LOD, local indexing.
pub fn compute_tethers(
	mode: TetherMode,
	adjacency: &[Vec<usize>],
	positions: &[V3],
	inv_masses: &[Real],
) -> Vec<Tether> {
	match mode {
		TetherMode::Euclidean { max_islands } => {
			compute_euclidean_tethers(adjacency, positions, inv_masses, max_islands)
		}
		TetherMode::Geodesic => compute_geodesic_tethers(adjacency, positions, inv_masses),
	}
}

/// Straight line tethers to the closest kinematic particle of each of the
/// `max_islands` closest kinematic islands (connected groups of kinematic
/// particles).
pub fn compute_euclidean_tethers(
	adjacency: &[Vec<usize>],
	positions: &[V3],
	inv_masses: &[Real],
	max_islands: usize,
) -> Vec<Tether> {
	let islands = graph::connected_components(adjacency, |i| inv_masses[i] == 0.0);
	let dynamic: Vec<usize> = (0..inv_masses.len())
		.filter(|&i| inv_masses[i] != 0.0)
		.collect();
	let per_particle = parallel::map(&dynamic, |&end| {
		let mut anchors: Vec<(Real, usize)> = islands
			.iter()
			.filter_map(|island| {
				island
					.iter()
					.map(|&k| ((positions[k] - positions[end]).norm(), k))
					.min_by(|a, b| a.0.total_cmp(&b.0))
			})
			.collect();
		anchors.sort_by(|a, b| a.0.total_cmp(&b.0));
		anchors.truncate(max_islands);
		anchors
			.into_iter()
			.map(|(length, start)| Tether::new(start, end, length))
			.collect::<Vec<_>>()
	});
	per_particle.into_iter().flatten().collect()
}

/// One tether per reachable dynamic particle, anchored at the kinematic
/// particle with the shortest path along mesh edges.
pub fn compute_geodesic_tethers(
	adjacency: &[Vec<usize>],
	positions: &[V3],
	inv_masses: &[Real],
) -> Vec<Tether> {
	let sources: Vec<usize> = (0..inv_masses.len())
		.filter(|&i| inv_masses[i] == 0.0)
		.collect();
	graph::geodesic_distances(adjacency, positions, &sources)
		.into_iter()
		.enumerate()
		.filter(|&(i, _)| inv_masses[i] != 0.0)
		.filter_map(|(end, reached)| {
			reached.map(|(length, start)| Tether::new(start, end, length))
		})
		.collect()
}

#[cfg(test)]
mod test {
	use super::*;
	use approx::assert_relative_eq;
	use fnv::FnvHashSet;
	use proptest::prelude::*;

	// one kinematic particle at the origin, two dynamic ones
	fn triangle() -> (SolverParticles, ParticleRange) {
		let mut ps = SolverParticles::default();
		let range = ps.add_range(3);
		ps.particles[0] = Particle::new(V3::zeros(), 0.0);
		ps.particles[1] = Particle::new(V3::new(1., 0., 0.), 1.0);
		ps.particles[2] = Particle::new(V3::new(0., 1., 0.), 1.0);
		(ps, range)
	}

	fn tethers_to_origin(range: ParticleRange, stiffness: Real) -> LongRangeConstraints {
		LongRangeConstraints::new(
			range,
			vec![Tether::new(0, 1, 0.5), Tether::new(0, 2, 0.5)],
			WeightedValue::constant(stiffness),
			WeightedValue::constant(1.0),
		)
	}

	#[test]
	fn test_triangle_converges() {
		let (mut ps, range) = triangle();
		let c = tethers_to_origin(range, 1.0);
		for _ in 0..10 {
			c.apply(&mut ps, 0.1);
		}
		for i in 1..3 {
			assert!(ps.particles[i].p.norm() <= 0.5 + 1e-5);
		}
		assert_eq!(ps.particles[0].p, V3::zeros());
	}

	#[test]
	fn test_monotone_convergence() {
		let mut errors = Vec::new();
		for iterations in [1, 10, 100] {
			let (mut ps, range) = triangle();
			let c = tethers_to_origin(range, 0.3);
			let mut last = ps.particles[1].p.norm();
			for _ in 0..iterations {
				c.apply(&mut ps, 0.1);
				let d = ps.particles[1].p.norm();
				// never pulls the rope longer
				assert!(d <= last);
				last = d;
			}
			errors.push(last - 0.5);
		}
		assert!(errors[0] > errors[1]);
		assert!(errors[1] > errors[2]);
		assert!(errors[2] < 1e-5);
	}

	#[test]
	fn test_slack_untouched() {
		let (mut ps, range) = triangle();
		let c = LongRangeConstraints::new(
			range,
			vec![Tether::new(0, 1, 2.0)],
			WeightedValue::constant(1.0),
			WeightedValue::constant(1.0),
		);
		c.apply(&mut ps, 0.1);
		assert_eq!(ps.particles[1].p, V3::new(1., 0., 0.));
	}

	#[test]
	fn test_scale() {
		let (mut ps, range) = triangle();
		let mut c = tethers_to_origin(range, 1.0);
		c.set_scale(0.5, 0.5);
		c.apply(&mut ps, 0.1);
		assert_relative_eq!(ps.particles[1].p, V3::new(0.25, 0., 0.), epsilon = 1e-6);
	}

	#[test]
	fn test_weight_mapped_stiffness() {
		let (mut ps, range) = triangle();
		let c = LongRangeConstraints::new(
			range,
			vec![Tether::new(0, 1, 0.5), Tether::new(0, 2, 0.5)],
			WeightedValue::new(0.0, 1.0).with_weights(vec![0.0, 1.0, 0.5]),
			WeightedValue::constant(1.0),
		);
		c.apply(&mut ps, 0.1);
		assert_relative_eq!(ps.particles[1].p, V3::new(0.5, 0., 0.), epsilon = 1e-6);
		assert_relative_eq!(ps.particles[2].p, V3::new(0., 0.75, 0.), epsilon = 1e-6);
	}

	#[test]
	fn test_kinematic_end_untouched() {
		let (mut ps, range) = triangle();
		ps.particles[1].inv_m = 0.0;
		let c = tethers_to_origin(range, 1.0);
		c.apply(&mut ps, 0.1);
		assert_eq!(ps.particles[1].p, V3::new(1., 0., 0.));
	}

	#[test]
	fn test_batches_rank_per_end() {
		let tethers = vec![
			Tether::new(0, 5, 1.0),
			Tether::new(1, 5, 1.0),
			Tether::new(0, 6, 1.0),
			Tether::new(2, 5, 1.0),
		];
		let batches = TetherBatches::new(tethers);
		let ends: Vec<Vec<usize>> = batches
			.batches()
			.map(|b| b.iter().map(|t| t.end).collect())
			.collect();
		assert_eq!(ends, vec![vec![5, 6], vec![5], vec![5]]);
		assert_eq!(batches.len(), 4);
	}

	#[test]
	fn test_geodesic_tethers() {
		// 0 - 1 - 2 with 0 kinematic, bent at 1
		let adjacency = graph::adjacency(3, &[[0, 1], [1, 2]]);
		let positions = vec![V3::zeros(), V3::new(1., 0., 0.), V3::new(1., 1., 0.)];
		let tethers = compute_geodesic_tethers(&adjacency, &positions, &[0.0, 1.0, 1.0]);
		assert_eq!(tethers, vec![Tether::new(0, 1, 1.0), Tether::new(0, 2, 2.0)]);
	}

	#[test]
	fn test_euclidean_tethers() {
		// kinematic islands {0, 1} and {4}, dynamic 2 and 3
		let adjacency = graph::adjacency(5, &[[0, 1], [1, 2], [2, 3], [3, 4]]);
		let positions: Vec<V3> = (0..5).map(|i| V3::new(i as f32, 0., 0.)).collect();
		let inv_masses = [0.0, 0.0, 1.0, 1.0, 0.0];
		let tethers = compute_euclidean_tethers(&adjacency, &positions, &inv_masses, 1);
		assert_eq!(tethers, vec![Tether::new(1, 2, 1.0), Tether::new(4, 3, 1.0)]);
		let tethers = compute_euclidean_tethers(&adjacency, &positions, &inv_masses, 4);
		assert_eq!(tethers.len(), 4);
		assert_eq!(tethers[1], Tether::new(4, 2, 2.0));
	}

	#[test]
	fn test_tether_islands() {
		let adjacency = graph::adjacency(4, &[[0, 1], [1, 2], [2, 3]]);
		let islands = tether_islands(&adjacency, &[0.0, 1.0, 1.0, 0.0]);
		assert_eq!(islands[0].particles, vec![1, 2]);
		assert!(islands[1].particles.is_empty());
	}

	proptest! {
		#[test]
		fn prop_batches_unique_ends(
			raw in prop::collection::vec((0usize..20, 0usize..20, 0.0f32..2.0), 0..200)
		) {
			let tethers: Vec<Tether> = raw
				.into_iter()
				.map(|(s, e, l)| Tether::new(s, e, l))
				.collect();
			let batches = TetherBatches::new(tethers.clone());
			prop_assert_eq!(batches.len(), tethers.len());
			for batch in batches.batches() {
				let mut ends = FnvHashSet::default();
				for t in batch {
					prop_assert!(ends.insert(t.end));
				}
			}
			// every input tether is scheduled exactly once
			let mut scheduled: Vec<(usize, usize, u32)> = batches
				.tethers()
				.iter()
				.map(|t| (t.start, t.end, t.ref_length.to_bits()))
				.collect();
			let mut input: Vec<(usize, usize, u32)> = tethers
				.iter()
				.map(|t| (t.start, t.end, t.ref_length.to_bits()))
				.collect();
			scheduled.sort_unstable();
			input.sort_unstable();
			prop_assert_eq!(scheduled, input);
		}
	}
}
