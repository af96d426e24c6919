//! Sparse overlay of edited blocks that takes precedence over terrain noise.

use std::collections::HashMap;
use std::sync::Arc;

use strata_blocks::BlockType;
use strata_geom::{BlockPos, ChunkCoord, GridDims};

type Bucket = HashMap<BlockPos, BlockType>;

/// Chunk-bucketed changed-block store.
///
/// Cloning is cheap: buckets are shared behind `Arc` and copied on write, so a
/// snapshot handed to a worker never observes later edits.
#[derive(Clone, Debug)]
pub struct ChangedBlocks {
    chunk_size: i32,
    inner: Arc<HashMap<ChunkCoord, Arc<Bucket>>>,
    count: usize,
}

impl ChangedBlocks {
    pub fn new(chunk_size: i32) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            inner: Arc::new(HashMap::new()),
            count: 0,
        }
    }

    pub fn from_entries(
        chunk_size: i32,
        entries: impl IntoIterator<Item = (BlockPos, BlockType)>,
    ) -> Self {
        let mut store = Self::new(chunk_size);
        for (p, ty) in entries {
            store.register(p.x, p.y, p.z, ty);
        }
        store
    }

    #[inline]
    fn chunk_key(&self, x: i32, y: i32, z: i32) -> ChunkCoord {
        ChunkCoord::new(
            x.div_euclid(self.chunk_size),
            y.div_euclid(self.chunk_size),
            z.div_euclid(self.chunk_size),
        )
    }

    #[inline]
    pub fn chunk_size(&self) -> i32 {
        self.chunk_size
    }

    pub fn get(&self, x: i32, y: i32, z: i32) -> Option<BlockType> {
        let k = self.chunk_key(x, y, z);
        self.inner
            .get(&k)
            .and_then(|m| m.get(&BlockPos::new(x, y, z)).copied())
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        self.get(x, y, z).is_some()
    }

    /// Record `ty` at an absolute block. Returns the previous override.
    pub fn register(&mut self, x: i32, y: i32, z: i32, ty: BlockType) -> Option<BlockType> {
        let k = self.chunk_key(x, y, z);
        let buckets = Arc::make_mut(&mut self.inner);
        let bucket = Arc::make_mut(buckets.entry(k).or_default());
        let prev = bucket.insert(BlockPos::new(x, y, z), ty);
        if prev.is_none() {
            self.count += 1;
        }
        prev
    }

    /// Immutable view for a worker job.
    #[inline]
    pub fn snapshot(&self) -> ChangedBlocks {
        self.clone()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Overrides for a single chunk's interior.
    pub fn entries_for_chunk(&self, c: ChunkCoord) -> Vec<(BlockPos, BlockType)> {
        self.inner
            .get(&c)
            .map(|m| m.iter().map(|(k, v)| (*k, *v)).collect())
            .unwrap_or_default()
    }

    /// Overrides inside a chunk's padded array (interior plus halo).
    pub fn entries_in_chunk_region(
        &self,
        c: ChunkCoord,
        dims: &GridDims,
    ) -> Vec<(BlockPos, BlockType)> {
        let (lo, hi) = dims.padded_bounds(c);
        let mut out = Vec::new();
        for dy in -1..=1 {
            for dz in -1..=1 {
                for dx in -1..=1 {
                    let Some(m) = self.inner.get(&c.offset(dx, dy, dz)) else {
                        continue;
                    };
                    for (p, ty) in m.iter() {
                        if p.x >= lo.x
                            && p.x <= hi.x
                            && p.y >= lo.y
                            && p.y <= hi.y
                            && p.z >= lo.z
                            && p.z <= hi.z
                        {
                            out.push((*p, *ty));
                        }
                    }
                }
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockPos, BlockType)> + '_ {
        self.inner
            .values()
            .flat_map(|m| m.iter().map(|(k, v)| (*k, *v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_does_not_see_later_edits() {
        let mut store = ChangedBlocks::new(16);
        store.register(1, 2, 3, BlockType::STONE);
        let snap = store.snapshot();
        store.register(1, 2, 3, BlockType::AIR);
        store.register(40, 2, 3, BlockType::DIRT);
        assert_eq!(snap.get(1, 2, 3), Some(BlockType::STONE));
        assert_eq!(snap.get(40, 2, 3), None);
        assert_eq!(store.get(1, 2, 3), Some(BlockType::AIR));
        assert_eq!(store.len(), 2);
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn removal_is_an_air_entry() {
        let mut store = ChangedBlocks::new(16);
        store.register(-1, -1, -1, BlockType::AIR);
        assert!(store.contains(-1, -1, -1));
        assert_eq!(store.entries_for_chunk(ChunkCoord::new(-1, -1, -1)).len(), 1);
    }

    #[test]
    fn region_includes_neighbor_boundary_but_not_beyond_halo() {
        let dims = GridDims::new(16, 1, 1.0);
        let mut store = ChangedBlocks::new(16);
        store.register(16, 5, 5, BlockType::STONE); // +x neighbor's first column: in halo
        store.register(17, 5, 5, BlockType::STONE); // one past the halo
        store.register(-1, 0, 0, BlockType::DIRT); // -x halo
        store.register(8, 8, 8, BlockType::SAND); // interior
        let mut got = store.entries_in_chunk_region(ChunkCoord::new(0, 0, 0), &dims);
        got.sort();
        assert_eq!(
            got,
            vec![
                (BlockPos::new(-1, 0, 0), BlockType::DIRT),
                (BlockPos::new(8, 8, 8), BlockType::SAND),
                (BlockPos::new(16, 5, 5), BlockType::STONE),
            ]
        );
    }
}
