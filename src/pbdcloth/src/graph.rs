//! Graph algorithms over the particle adjacency of a cloth: constraint
//! coloring for conflict-free parallel batches, anchor islands and
//! geodesic distances for tether construction.
//!
//! All indices here are local to one cloth.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use fnv::FnvHashSet;

use crate::{Real, V3};

/// Undirected adjacency list, sorted and without duplicates or self loops.
pub fn adjacency(num_particles: usize, edges: &[[usize; 2]]) -> Vec<Vec<usize>> {
	let mut result = vec![Vec::new(); num_particles];
	for &[a, b] in edges {
		if a == b {
			continue;
		}
		result[a].push(b);
		result[b].push(a);
	}
	for neighbors in result.iter_mut() {
		neighbors.sort_unstable();
		neighbors.dedup();
	}
	result
}

/// Greedy coloring of constraints: constraints of one color never share a
/// particle, so a color can be projected in parallel.
///
/// Returns constraint indices per color, in the order colors were opened.
pub fn color_constraints<const N: usize>(
	constraints: &[[usize; N]],
) -> Vec<Vec<usize>> {
	let mut colors: Vec<Vec<usize>> = Vec::new();
	let mut used: Vec<FnvHashSet<usize>> = Vec::new();
	for (index, constraint) in constraints.iter().enumerate() {
		let color = used
			.iter()
			.position(|set| constraint.iter().all(|p| !set.contains(p)));
		let color = match color {
			Some(color) => color,
			None => {
				colors.push(Vec::new());
				used.push(FnvHashSet::default());
				colors.len() - 1
			}
		};
		colors[color].push(index);
		used[color].extend(constraint.iter().copied());
	}
	colors
}

/// Dynamic particles reachable from one kinematic anchor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Island {
	pub anchor: usize,
	pub particles: Vec<usize>,
}

/// Partition dynamic particles into one island per anchor.
///
/// The flood fill never walks through another anchor. A particle reachable
/// from several anchors belongs to the first anchor, in `anchors` order,
/// that reaches it. Particles no anchor reaches are left out.
pub fn islands(adjacency: &[Vec<usize>], anchors: &[usize]) -> Vec<Island> {
	let mut is_anchor = vec![false; adjacency.len()];
	for &a in anchors {
		is_anchor[a] = true;
	}
	let mut assigned = vec![false; adjacency.len()];
	let mut result = Vec::with_capacity(anchors.len());
	let mut queue = VecDeque::new();
	for &anchor in anchors {
		if assigned[anchor] {
			continue;
		}
		assigned[anchor] = true;
		let mut particles = Vec::new();
		queue.push_back(anchor);
		while let Some(current) = queue.pop_front() {
			for &n in &adjacency[current] {
				if assigned[n] || is_anchor[n] {
					continue;
				}
				assigned[n] = true;
				particles.push(n);
				queue.push_back(n);
			}
		}
		result.push(Island { anchor, particles });
	}
	result
}

/// Connected components of the subgraph induced by `keep`, each sorted.
pub fn connected_components<F>(adjacency: &[Vec<usize>], keep: F) -> Vec<Vec<usize>>
where
	F: Fn(usize) -> bool,
{
	let mut visited = vec![false; adjacency.len()];
	let mut result = Vec::new();
	let mut stack = Vec::new();
	for start in 0..adjacency.len() {
		if visited[start] || !keep(start) {
			continue;
		}
		visited[start] = true;
		let mut component = vec![start];
		stack.push(start);
		while let Some(current) = stack.pop() {
			for &n in &adjacency[current] {
				if !visited[n] && keep(n) {
					visited[n] = true;
					component.push(n);
					stack.push(n);
				}
			}
		}
		component.sort_unstable();
		result.push(component);
	}
	result
}

#[derive(Clone, Copy, PartialEq)]
struct HeapEntry {
	distance: Real,
	index: usize,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
	fn cmp(&self, other: &Self) -> Ordering {
		// min-heap on distance, index breaks ties
		other
			.distance
			.total_cmp(&self.distance)
			.then_with(|| other.index.cmp(&self.index))
	}
}

impl PartialOrd for HeapEntry {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

/// Multi-source shortest paths along mesh edges, weighted by the edge
/// lengths in `positions`.
///
/// Returns, per particle, the path length and the source it was reached
/// from (`None` when unreachable). Paths do not pass through other sources.
pub fn geodesic_distances(
	adjacency: &[Vec<usize>],
	positions: &[V3],
	sources: &[usize],
) -> Vec<Option<(Real, usize)>> {
	let mut result: Vec<Option<(Real, usize)>> = vec![None; adjacency.len()];
	let mut is_source = vec![false; adjacency.len()];
	let mut heap = BinaryHeap::new();
	for &s in sources {
		is_source[s] = true;
		result[s] = Some((0.0, s));
		heap.push(HeapEntry {
			distance: 0.0,
			index: s,
		});
	}
	while let Some(HeapEntry { distance, index }) = heap.pop() {
		let (best, source) = match result[index] {
			Some(entry) => entry,
			None => continue,
		};
		if distance > best {
			continue;
		}
		for &n in &adjacency[index] {
			if is_source[n] {
				continue;
			}
			let d = distance + (positions[n] - positions[index]).norm();
			let better = match result[n] {
				Some((current, _)) => d < current,
				None => true,
			};
			if better {
				result[n] = Some((d, source));
				heap.push(HeapEntry { distance: d, index: n });
			}
		}
	}
	result
}

#[cfg(test)]
mod test {
	use super::*;
	use proptest::prelude::*;

	// 0 - 1 - 2 - 3 - 4
	fn line(n: usize) -> Vec<Vec<usize>> {
		let edges: Vec<[usize; 2]> = (1..n).map(|i| [i - 1, i]).collect();
		adjacency(n, &edges)
	}

	#[test]
	fn test_adjacency_dedup() {
		let adj = adjacency(3, &[[0, 1], [1, 0], [1, 2], [2, 2]]);
		assert_eq!(adj, vec![vec![1], vec![0, 2], vec![1]]);
	}

	#[test]
	fn test_islands_first_anchor_wins() {
		let adj = line(5);
		// anchors at both ends, particle 2 is equidistant
		let result = islands(&adj, &[0, 4]);
		assert_eq!(result.len(), 2);
		assert_eq!(result[0].anchor, 0);
		assert_eq!(result[0].particles, vec![1, 2, 3]);
		assert_eq!(result[1].particles, Vec::<usize>::new());
	}

	#[test]
	fn test_islands_do_not_cross_anchor() {
		let adj = line(5);
		let result = islands(&adj, &[2, 0]);
		assert_eq!(result[0].particles, vec![1, 3, 4]);
		assert!(result[1].particles.is_empty());
	}

	#[test]
	fn test_islands_unreachable() {
		let adj = adjacency(4, &[[0, 1], [2, 3]]);
		let result = islands(&adj, &[0]);
		assert_eq!(result, vec![Island { anchor: 0, particles: vec![1] }]);
	}

	#[test]
	fn test_connected_components() {
		let adj = line(6);
		let comps = connected_components(&adj, |i| i != 2);
		assert_eq!(comps, vec![vec![0, 1], vec![3, 4, 5]]);
	}

	#[test]
	fn test_geodesic() {
		let adj = line(4);
		let positions: Vec<V3> =
			(0..4).map(|i| V3::new(i as f32, 0., 0.)).collect();
		let result = geodesic_distances(&adj, &positions, &[0, 3]);
		assert_eq!(result[0], Some((0.0, 0)));
		assert_eq!(result[1], Some((1.0, 0)));
		assert_eq!(result[2], Some((1.0, 3)));
		assert_eq!(result[3], Some((0.0, 3)));
	}

	#[test]
	fn test_geodesic_unreachable() {
		let adj = adjacency(3, &[[0, 1]]);
		let positions = vec![V3::zeros(); 3];
		let result = geodesic_distances(&adj, &positions, &[0]);
		assert!(result[2].is_none());
	}

	proptest! {
		#[test]
		fn prop_coloring_disjoint(
			pairs in prop::collection::vec((0usize..30, 0usize..30), 0..120)
		) {
			let constraints: Vec<[usize; 2]> =
				pairs.into_iter().map(|(a, b)| [a, b]).collect();
			let colors = color_constraints(&constraints);
			let total: usize = colors.iter().map(|c| c.len()).sum();
			prop_assert_eq!(total, constraints.len());
			for color in &colors {
				let mut seen = FnvHashSet::default();
				for &c in color {
					let [a, b] = constraints[c];
					// a self pair touches a single particle
					prop_assert!(seen.insert(a));
					if b != a {
						prop_assert!(seen.insert(b));
					}
				}
			}
		}
	}
}
