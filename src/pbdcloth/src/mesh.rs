use fnv::FnvHashMap;

use crate::error::ClothError;
use crate::graph;
use crate::{SMALL_NUMBER, V3};

/// Triangle topology of one cloth LOD, local particle indexing.
#[derive(Clone, Debug, Default)]
pub struct TriangleMesh {
	num_particles: usize,
	triangles: Vec<[usize; 3]>,
	point_to_triangles: Vec<Vec<usize>>,
	edges: Vec<[usize; 2]>,
	bending_pairs: Vec<[usize; 2]>,
	adjacency: Vec<Vec<usize>>,
}

fn edge_key(a: usize, b: usize) -> [usize; 2] {
	if a < b {
		[a, b]
	} else {
		[b, a]
	}
}

impl TriangleMesh {
	pub fn new(
		triangles: Vec<[usize; 3]>,
		num_particles: usize,
	) -> Result<Self, ClothError> {
		for (triangle, element) in triangles.iter().enumerate() {
			if let Some(&index) = element.iter().find(|&&i| i >= num_particles) {
				return Err(ClothError::IndexOutOfRange {
					triangle,
					index,
					count: num_particles,
				});
			}
		}

		let mut point_to_triangles = vec![Vec::new(); num_particles];
		// edge -> vertices opposite to it, in first-seen order
		let mut edge_ids: FnvHashMap<[usize; 2], usize> = FnvHashMap::default();
		let mut edges = Vec::new();
		let mut opposite: Vec<Vec<usize>> = Vec::new();
		for (t, &[a, b, c]) in triangles.iter().enumerate() {
			for i in [a, b, c] {
				point_to_triangles[i].push(t);
			}
			for (e0, e1, o) in [(a, b, c), (b, c, a), (c, a, b)] {
				let key = edge_key(e0, e1);
				let id = *edge_ids.entry(key).or_insert_with(|| {
					edges.push(key);
					opposite.push(Vec::new());
					edges.len() - 1
				});
				opposite[id].push(o);
			}
		}

		let mut bending_pairs = Vec::new();
		for others in opposite.iter() {
			if let [o0, o1] = others[..] {
				let key = edge_key(o0, o1);
				if o0 != o1 && !edge_ids.contains_key(&key) {
					bending_pairs.push(key);
				}
			}
		}
		bending_pairs.sort_unstable();
		bending_pairs.dedup();

		let adjacency = graph::adjacency(num_particles, &edges);
		Ok(Self {
			num_particles,
			triangles,
			point_to_triangles,
			edges,
			bending_pairs,
			adjacency,
		})
	}

	pub fn num_particles(&self) -> usize {
		self.num_particles
	}

	pub fn triangles(&self) -> &[[usize; 3]] {
		&self.triangles
	}

	pub fn point_to_triangles(&self) -> &[Vec<usize>] {
		&self.point_to_triangles
	}

	pub fn edges(&self) -> &[[usize; 2]] {
		&self.edges
	}

	/// Opposite vertices of triangle pairs sharing an edge.
	pub fn bending_pairs(&self) -> &[[usize; 2]] {
		&self.bending_pairs
	}

	pub fn adjacency(&self) -> &[Vec<usize>] {
		&self.adjacency
	}

	/// Area weighted vertex normals. Vertices with no usable face get +Z.
	pub fn point_normals<I>(&self, positions: I) -> Vec<V3>
	where
		I: IntoIterator<Item = V3>,
	{
		let positions: Vec<V3> = positions.into_iter().collect();
		debug_assert_eq!(positions.len(), self.num_particles);
		let mut normals = vec![V3::zeros(); self.num_particles];
		for &[a, b, c] in &self.triangles {
			let n = (positions[b] - positions[a]).cross(&(positions[c] - positions[a]));
			normals[a] += n;
			normals[b] += n;
			normals[c] += n;
		}
		normals
			.into_iter()
			.map(|n| n.try_normalize(SMALL_NUMBER).unwrap_or_else(V3::z))
			.collect()
	}
}
