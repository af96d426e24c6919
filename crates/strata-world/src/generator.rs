//! Deterministic `(seed, x, y, z) -> block` terrain.

use fastnoise_lite::{FastNoiseLite, NoiseType};
use strata_blocks::BlockType;

use crate::changes::ChangedBlocks;
use crate::seed::Seed;
use crate::worldgen::WorldGenParams;

/// Pure terrain function. Holds only the seed-derived noise state, so one
/// instance can be shared by every worker.
pub struct TerrainGenerator {
    seed: Seed,
    params: WorldGenParams,
    terrain: FastNoiseLite,
    caves: FastNoiseLite,
}

impl TerrainGenerator {
    pub fn new(seed: Seed, params: WorldGenParams) -> Self {
        let mut terrain = FastNoiseLite::with_seed(seed.value());
        terrain.set_noise_type(Some(NoiseType::OpenSimplex2));
        terrain.set_frequency(Some(params.height_frequency));
        let mut caves = FastNoiseLite::with_seed(seed.value() ^ 41_337);
        caves.set_noise_type(Some(NoiseType::OpenSimplex2));
        caves.set_frequency(Some(params.cave_frequency));
        Self {
            seed,
            params,
            terrain,
            caves,
        }
    }

    #[inline]
    pub fn seed(&self) -> Seed {
        self.seed
    }

    #[inline]
    pub fn params(&self) -> &WorldGenParams {
        &self.params
    }

    /// Overlay first, noise second.
    #[inline]
    pub fn generate(&self, changes: &ChangedBlocks, x: i32, y: i32, z: i32) -> BlockType {
        if let Some(ty) = changes.get(x, y, z) {
            return ty;
        }
        self.procedural(x, y, z)
    }

    /// Surface height of the untouched terrain column.
    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        let p = &self.params;
        if p.min_height == p.max_height {
            return p.min_height;
        }
        let mut amp = 1.0_f32;
        let mut freq = 1.0_f32;
        let mut sum = 0.0_f32;
        let mut max_amp = 0.0_f32;
        for _ in 0..p.octaves {
            sum += self.terrain.get_noise_2d(x as f32 * freq, z as f32 * freq) * amp;
            max_amp += amp;
            amp *= p.persistence;
            freq *= p.lacunarity;
        }
        let n = if max_amp > 0.0 { sum / max_amp } else { sum };
        let t = ((n + 1.0) * 0.5).clamp(0.0, 1.0);
        let h = p.min_height + (t * (p.max_height - p.min_height) as f32) as i32;
        h.clamp(p.min_height, p.max_height)
    }

    pub fn procedural(&self, x: i32, y: i32, z: i32) -> BlockType {
        let p = &self.params;
        if y < p.bedrock_y {
            return BlockType::AIR;
        }
        if y == p.bedrock_y {
            return BlockType::BEDROCK;
        }
        let height = self.surface_height(x, z);
        if y > height {
            if p.water_enable && y <= p.water_level {
                return BlockType::WATER;
            }
            return BlockType::AIR;
        }
        if p.caves_enable && height - y >= p.cave_min_roof {
            let n = self.caves.get_noise_3d(x as f32, y as f32, z as f32);
            if n > p.cave_threshold {
                return BlockType::AIR;
            }
        }
        let near_water = p.water_enable && height <= p.water_level + p.beach_band;
        if y == height {
            if near_water {
                BlockType::SAND
            } else {
                BlockType::GRASS
            }
        } else if height - y <= p.topsoil_thickness {
            if near_water {
                BlockType::SAND
            } else {
                BlockType::DIRT
            }
        } else {
            BlockType::STONE
        }
    }

    /// Highest solid block in column `(x, z)`, overlay included. Returns
    /// `bedrock_y - 1` for a column with nothing solid.
    pub fn highest_block(&self, changes: &ChangedBlocks, x: i32, z: i32) -> i32 {
        let top = self.params.max_height + 1;
        let top = changes
            .iter()
            .filter(|(pos, _)| pos.x == x && pos.z == z)
            .map(|(pos, _)| pos.y)
            .fold(top, i32::max);
        let mut y = top;
        while y >= self.params.bedrock_y {
            if self.generate(changes, x, y, z).is_solid() {
                return y;
            }
            y -= 1;
        }
        self.params.bedrock_y - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_world_layers() {
        let g = TerrainGenerator::new(Seed(7), WorldGenParams::flat(10));
        assert_eq!(g.procedural(3, 10, 3), BlockType::GRASS);
        assert_eq!(g.procedural(3, 9, 3), BlockType::DIRT);
        assert_eq!(g.procedural(3, 2, 3), BlockType::STONE);
        assert_eq!(g.procedural(3, 0, 3), BlockType::BEDROCK);
        assert_eq!(g.procedural(3, 11, 3), BlockType::AIR);
        assert_eq!(g.procedural(3, -5, 3), BlockType::AIR);
    }

    #[test]
    fn highest_sees_overlay_towers_and_holes() {
        let g = TerrainGenerator::new(Seed(7), WorldGenParams::flat(10));
        let mut changes = ChangedBlocks::new(16);
        assert_eq!(g.highest_block(&changes, 0, 0), 10);
        changes.register(0, 30, 0, BlockType::STONE);
        assert_eq!(g.highest_block(&changes, 0, 0), 30);
        changes.register(0, 30, 0, BlockType::AIR);
        changes.register(0, 10, 0, BlockType::AIR);
        assert_eq!(g.highest_block(&changes, 0, 0), 9);
    }

    #[test]
    fn water_fills_below_level() {
        let params = WorldGenParams {
            water_enable: true,
            water_level: 12,
            ..WorldGenParams::flat(10)
        };
        let g = TerrainGenerator::new(Seed(1), params);
        assert_eq!(g.procedural(0, 11, 0), BlockType::WATER);
        assert_eq!(g.procedural(0, 12, 0), BlockType::WATER);
        assert_eq!(g.procedural(0, 13, 0), BlockType::AIR);
        assert_eq!(g.procedural(0, 10, 0), BlockType::SAND);
    }
}
