//! Client-side voxel world streaming: chunk lifecycle around an observer,
//! off-thread generation and meshing, and authority-confirmed block edits.
#![forbid(unsafe_code)]

pub mod chunk_manager;
pub mod config;
pub mod net;
pub mod player;
pub mod scene;
pub mod worker_manager;
pub mod world;

pub use chunk_manager::{ChunkManager, StreamUpdate};
pub use config::{AppConfig, ConfigError, load_config_from_path};
pub use net::{Authority, AuthorityError, BlockEdit, EditClient, LoopbackAuthority};
pub use player::{Observer, Player};
pub use scene::{Scene, SceneGraph};
pub use worker_manager::{ChunkTask, SpawnHeight, TaskContext, TaskKind, WorkerManager};
pub use world::{BlockTarget, Selection, UNSET_Y, World, WorldData, WorldEvent, WorldStats};

pub use strata_blocks::BlockType;
pub use strata_geom::{BlockPos, ChunkCoord, GridDims, Vec3};
