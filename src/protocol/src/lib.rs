pub mod simul_data;
use simul_data::ClothSimulData;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Message {
	SimulUpdate(Vec<ClothSimulData>),
}

impl Message {
	pub fn to_bytes(&self) -> bincode::Result<Vec<u8>> {
		bincode::serialize(&self)
	}

	pub fn from_bytes(bytes: &[u8]) -> bincode::Result<Self> {
		bincode::deserialize(bytes)
	}
}
