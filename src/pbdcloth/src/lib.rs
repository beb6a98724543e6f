pub mod cloth;
pub mod collider;
pub mod config;
pub mod constraint;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod mesh;
mod parallel;
pub mod particle;
pub mod solver;
pub mod velocity_field;
pub mod weighted_value;

pub type Real = f32;
pub type V3 = nalgebra::Vector3<f32>;
pub type Rotation = nalgebra::UnitQuaternion<f32>;
pub type Transform = nalgebra::Isometry3<f32>;

pub const SMALL_NUMBER: Real = 1e-8;
pub const KINDA_SMALL_NUMBER: Real = 1e-4;

pub use cloth::{Cloth, ClothLod};
pub use collider::Collider;
pub use config::{ClothConfig, SolverConfig, TetherMode};
pub use error::ClothError;
pub use particle::{ParticleRange, SolverParticles};
pub use solver::{ClothId, ColliderId, Solver, SolverStats};
