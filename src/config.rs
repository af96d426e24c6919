//! Application configuration loaded from TOML.

use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use strata_geom::GridDims;
use strata_world::{WorldGenConfig, WorldGenParams};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub chunk: ChunkSection,
    #[serde(default)]
    pub block: BlockSection,
    #[serde(default)]
    pub player: PlayerSection,
    #[serde(default)]
    pub workers: WorkerSection,
    #[serde(default)]
    pub edits: EditSection,
    #[serde(default)]
    pub worldgen: WorldGenConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChunkSection {
    #[serde(default = "default_chunk_size")]
    pub size: i32,
    #[serde(default = "default_neighbor_width")]
    pub neighbor_width: i32,
    #[serde(default = "default_load_radius")]
    pub load_radius: i32,
    /// Chunks are dropped past this radius; never below `load_radius`.
    #[serde(default)]
    pub evict_radius: Option<i32>,
}
fn default_chunk_size() -> i32 {
    16
}
fn default_neighbor_width() -> i32 {
    1
}
fn default_load_radius() -> i32 {
    2
}
impl Default for ChunkSection {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            neighbor_width: default_neighbor_width(),
            load_radius: default_load_radius(),
            evict_radius: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct BlockSection {
    #[serde(default = "default_dimension")]
    pub dimension: f32,
}
fn default_dimension() -> f32 {
    40.0
}
impl Default for BlockSection {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlayerSection {
    /// Eye height above the feet, in blocks.
    #[serde(default = "default_eye2toe")]
    pub eye2toe: f32,
}
fn default_eye2toe() -> f32 {
    1.6
}
impl Default for PlayerSection {
    fn default() -> Self {
        Self {
            eye2toe: default_eye2toe(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WorkerSection {
    /// `0` picks from available parallelism.
    #[serde(default)]
    pub count: usize,
    /// Task batches applied per tick; `0` drains the queue.
    #[serde(default)]
    pub tasks_per_tick: usize,
}
#[derive(Clone, Debug, Deserialize)]
pub struct EditSection {
    /// A busy lock older than this is released. `0` keeps locks until the
    /// authority answers.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}
fn default_busy_timeout_ms() -> u64 {
    10_000
}
impl Default for EditSection {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidChunkSize(i32),
    InvalidNeighborWidth { width: i32, chunk_size: i32 },
    InvalidDimension(f32),
    InvalidRadius(i32),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidChunkSize(s) => write!(f, "chunk size must be positive, got {}", s),
            ConfigError::InvalidNeighborWidth { width, chunk_size } => write!(
                f,
                "neighbor width must be in 1..={}, got {}",
                chunk_size, width
            ),
            ConfigError::InvalidDimension(d) => {
                write!(f, "block dimension must be positive, got {}", d)
            }
            ConfigError::InvalidRadius(r) => write!(f, "load radius must be >= 0, got {}", r),
        }
    }
}

impl std::error::Error for ConfigError {}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: AppConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk.size <= 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk.size));
        }
        if self.chunk.neighbor_width < 1 || self.chunk.neighbor_width > self.chunk.size {
            return Err(ConfigError::InvalidNeighborWidth {
                width: self.chunk.neighbor_width,
                chunk_size: self.chunk.size,
            });
        }
        if !(self.block.dimension > 0.0) {
            return Err(ConfigError::InvalidDimension(self.block.dimension));
        }
        if self.chunk.load_radius < 0 {
            return Err(ConfigError::InvalidRadius(self.chunk.load_radius));
        }
        Ok(())
    }

    pub fn dims(&self) -> GridDims {
        GridDims::new(
            self.chunk.size,
            self.chunk.neighbor_width,
            self.block.dimension,
        )
    }

    pub fn evict_radius(&self) -> i32 {
        self.chunk
            .evict_radius
            .unwrap_or(self.chunk.load_radius)
            .max(self.chunk.load_radius)
    }

    pub fn worker_count(&self) -> usize {
        if self.workers.count > 0 {
            return self.workers.count;
        }
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1).max(1))
            .unwrap_or(4)
    }

    pub fn busy_timeout(&self) -> Option<Duration> {
        match self.edits.busy_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn worldgen_params(&self) -> WorldGenParams {
        WorldGenParams::from_config(&self.worldgen)
    }
}

pub fn load_config_from_path(path: &Path) -> Result<AppConfig, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    AppConfig::from_toml_str(&s)
}
