//! Seeds, the changed-block overlay, and procedural terrain.
#![forbid(unsafe_code)]

pub mod changes;
pub mod generator;
pub mod seed;
pub mod worldgen;

pub use changes::ChangedBlocks;
pub use generator::TerrainGenerator;
pub use seed::Seed;
pub use worldgen::{WorldGenConfig, WorldGenParams};
