use serde::{Deserialize, Serialize};

use crate::{BlockPos, ChunkCoord, Vec3};

/// Grid constants: chunk edge length, halo width and render units per block.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridDims {
    pub chunk_size: i32,
    pub neighbor_width: i32,
    pub dimension: f32,
}

impl Default for GridDims {
    fn default() -> Self {
        Self {
            chunk_size: 16,
            neighbor_width: 1,
            dimension: 40.0,
        }
    }
}

impl GridDims {
    #[inline]
    pub const fn new(chunk_size: i32, neighbor_width: i32, dimension: f32) -> Self {
        Self {
            chunk_size,
            neighbor_width,
            dimension,
        }
    }

    /// Edge length of a chunk's block array, halo included.
    #[inline]
    pub fn padded_size(&self) -> usize {
        (self.chunk_size + 2 * self.neighbor_width) as usize
    }

    #[inline]
    pub fn world_to_block(&self, p: Vec3) -> BlockPos {
        BlockPos::new(
            (p.x / self.dimension).floor() as i32,
            (p.y / self.dimension).floor() as i32,
            (p.z / self.dimension).floor() as i32,
        )
    }

    /// Minimum corner of a block in world space.
    #[inline]
    pub fn block_to_world(&self, b: BlockPos) -> Vec3 {
        Vec3::new(
            b.x as f32 * self.dimension,
            b.y as f32 * self.dimension,
            b.z as f32 * self.dimension,
        )
    }

    #[inline]
    pub fn block_to_chunk(&self, b: BlockPos) -> ChunkCoord {
        ChunkCoord::new(
            b.x.div_euclid(self.chunk_size),
            b.y.div_euclid(self.chunk_size),
            b.z.div_euclid(self.chunk_size),
        )
    }

    /// Interior-local coordinate of `b` inside its home chunk, each axis in
    /// `0..chunk_size`.
    #[inline]
    pub fn block_to_local(&self, b: BlockPos) -> BlockPos {
        BlockPos::new(
            b.x.rem_euclid(self.chunk_size),
            b.y.rem_euclid(self.chunk_size),
            b.z.rem_euclid(self.chunk_size),
        )
    }

    /// Absolute block for a chunk-local coordinate. Accepts halo coordinates
    /// (negative or `>= chunk_size`), which land in the neighbor's interior.
    #[inline]
    pub fn local_to_block(&self, c: ChunkCoord, local: BlockPos) -> BlockPos {
        BlockPos::new(
            c.cx * self.chunk_size + local.x,
            c.cy * self.chunk_size + local.y,
            c.cz * self.chunk_size + local.z,
        )
    }

    #[inline]
    pub fn world_to_chunk(&self, p: Vec3) -> ChunkCoord {
        self.block_to_chunk(self.world_to_block(p))
    }

    /// Inclusive block-space bounds of a chunk's padded array.
    #[inline]
    pub fn padded_bounds(&self, c: ChunkCoord) -> (BlockPos, BlockPos) {
        let nw = self.neighbor_width;
        let lo = self.local_to_block(c, BlockPos::new(-nw, -nw, -nw));
        let hi_l = self.chunk_size + nw - 1;
        let hi = self.local_to_block(c, BlockPos::new(hi_l, hi_l, hi_l));
        (lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_blocks_resolve_to_negative_chunks() {
        let d = GridDims::new(16, 1, 1.0);
        let b = BlockPos::new(-1, -16, -17);
        assert_eq!(d.block_to_chunk(b), ChunkCoord::new(-1, -1, -2));
        assert_eq!(d.block_to_local(b), BlockPos::new(15, 0, 15));
    }

    #[test]
    fn world_to_block_floors() {
        let d = GridDims::new(16, 1, 40.0);
        assert_eq!(
            d.world_to_block(Vec3::new(39.9, -0.1, 80.0)),
            BlockPos::new(0, -1, 2)
        );
    }

    #[test]
    fn halo_local_maps_into_neighbor() {
        let d = GridDims::new(16, 1, 1.0);
        let c = ChunkCoord::new(1, 0, 0);
        let b = d.local_to_block(c, BlockPos::new(-1, 5, 5));
        assert_eq!(b, BlockPos::new(15, 5, 5));
        assert_eq!(d.block_to_chunk(b), ChunkCoord::new(0, 0, 0));
    }

    #[test]
    fn padded_bounds_include_halo() {
        let d = GridDims::new(16, 2, 1.0);
        let (lo, hi) = d.padded_bounds(ChunkCoord::new(0, 0, 0));
        assert_eq!(lo, BlockPos::new(-2, -2, -2));
        assert_eq!(hi, BlockPos::new(17, 17, 17));
        assert_eq!(d.padded_size(), 20);
    }
}
