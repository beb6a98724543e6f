// simul_data: simulated cloth mesh handed to the renderer

use serde::{Deserialize, Serialize};

/// Final positions and normals of one cloth, in the cloth's reference
/// (bind) space, one entry per vertex of the active LOD.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClothSimulData {
	pub cloth_id: usize,
	pub lod: usize,
	pub positions: Vec<[f32; 3]>,
	pub normals: Vec<[f32; 3]>,
}

impl ClothSimulData {
	pub fn len(&self) -> usize {
		self.positions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.positions.is_empty()
	}
}
