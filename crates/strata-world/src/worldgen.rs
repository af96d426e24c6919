use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WorldGenConfig {
    #[serde(default)]
    pub height: Height,
    #[serde(default)]
    pub surface: Surface,
    #[serde(default)]
    pub water: Water,
    #[serde(default)]
    pub caves: Caves,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Height {
    #[serde(default = "default_height_freq")]
    pub frequency: f32,
    #[serde(default = "default_octaves")]
    pub octaves: i32,
    #[serde(default = "default_persistence")]
    pub persistence: f32,
    #[serde(default = "default_lacunarity")]
    pub lacunarity: f32,
    #[serde(default = "default_min_height")]
    pub min: i32,
    #[serde(default = "default_max_height")]
    pub max: i32,
    #[serde(default = "default_bedrock")]
    pub bedrock: i32,
}
fn default_height_freq() -> f32 {
    0.008
}
fn default_octaves() -> i32 {
    4
}
fn default_persistence() -> f32 {
    0.5
}
fn default_lacunarity() -> f32 {
    2.0
}
fn default_min_height() -> i32 {
    4
}
fn default_max_height() -> i32 {
    48
}
fn default_bedrock() -> i32 {
    0
}
impl Default for Height {
    fn default() -> Self {
        Self {
            frequency: default_height_freq(),
            octaves: default_octaves(),
            persistence: default_persistence(),
            lacunarity: default_lacunarity(),
            min: default_min_height(),
            max: default_max_height(),
            bedrock: default_bedrock(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Surface {
    #[serde(default = "default_topsoil")]
    pub topsoil_thickness: i32,
    #[serde(default = "default_beach")]
    pub beach_band: i32,
}
fn default_topsoil() -> i32 {
    3
}
fn default_beach() -> i32 {
    1
}
impl Default for Surface {
    fn default() -> Self {
        Self {
            topsoil_thickness: default_topsoil(),
            beach_band: default_beach(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Water {
    #[serde(default = "default_water_enable")]
    pub enable: bool,
    #[serde(default = "default_water_level")]
    pub level: i32,
}
fn default_water_enable() -> bool {
    true
}
fn default_water_level() -> i32 {
    14
}
impl Default for Water {
    fn default() -> Self {
        Self {
            enable: default_water_enable(),
            level: default_water_level(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Caves {
    #[serde(default = "default_caves_enable")]
    pub enable: bool,
    #[serde(default = "default_cave_freq")]
    pub frequency: f32,
    #[serde(default = "default_cave_threshold")]
    pub threshold: f32,
    #[serde(default = "default_cave_roof")]
    pub min_roof: i32,
}
fn default_caves_enable() -> bool {
    true
}
fn default_cave_freq() -> f32 {
    0.045
}
fn default_cave_threshold() -> f32 {
    0.62
}
fn default_cave_roof() -> i32 {
    4
}
impl Default for Caves {
    fn default() -> Self {
        Self {
            enable: default_caves_enable(),
            frequency: default_cave_freq(),
            threshold: default_cave_threshold(),
            min_roof: default_cave_roof(),
        }
    }
}

/// Flattened generation parameters handed to workers.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldGenParams {
    pub height_frequency: f32,
    pub octaves: i32,
    pub persistence: f32,
    pub lacunarity: f32,
    pub min_height: i32,
    pub max_height: i32,
    pub bedrock_y: i32,
    pub topsoil_thickness: i32,
    pub beach_band: i32,
    pub water_enable: bool,
    pub water_level: i32,
    pub caves_enable: bool,
    pub cave_frequency: f32,
    pub cave_threshold: f32,
    pub cave_min_roof: i32,
}

impl Default for WorldGenParams {
    fn default() -> Self {
        Self::from_config(&WorldGenConfig::default())
    }
}

impl WorldGenParams {
    pub fn from_config(cfg: &WorldGenConfig) -> Self {
        let min_height = cfg.height.min.min(cfg.height.max);
        let max_height = cfg.height.max.max(cfg.height.min);
        Self {
            height_frequency: cfg.height.frequency,
            octaves: cfg.height.octaves.max(1),
            persistence: cfg.height.persistence,
            lacunarity: cfg.height.lacunarity,
            min_height,
            max_height,
            bedrock_y: cfg.height.bedrock,
            topsoil_thickness: cfg.surface.topsoil_thickness.max(0),
            beach_band: cfg.surface.beach_band.max(0),
            water_enable: cfg.water.enable,
            water_level: cfg.water.level,
            caves_enable: cfg.caves.enable,
            cave_frequency: cfg.caves.frequency,
            cave_threshold: cfg.caves.threshold,
            cave_min_roof: cfg.caves.min_roof.max(0),
        }
    }

    /// Flat, cave-free terrain; handy for deterministic scenarios.
    pub fn flat(height: i32) -> Self {
        Self {
            min_height: height,
            max_height: height,
            water_enable: false,
            caves_enable: false,
            ..Self::default()
        }
    }
}
