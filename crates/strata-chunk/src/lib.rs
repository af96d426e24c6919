//! Chunk entity, halo-padded block arrays, generation and CPU meshing.
#![forbid(unsafe_code)]

pub mod mesh;

use std::sync::Arc;

use strata_blocks::BlockType;
use strata_geom::{BlockPos, ChunkCoord, GridDims};
use strata_world::{ChangedBlocks, TerrainGenerator};

pub use mesh::{ChunkMeshCPU, MeshBuild, build_chunk_mesh};

/// Dense block array for one chunk: interior plus `neighbor_width` halo layers
/// on every face. Addressed in chunk-local signed coordinates, interior
/// `0..chunk_size`, halo `-neighbor_width..0` and `chunk_size..chunk_size+nw`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkBlocks {
    pub chunk_size: i32,
    pub neighbor_width: i32,
    pub blocks: Vec<BlockType>,
}

impl ChunkBlocks {
    pub fn new_air(dims: &GridDims) -> Self {
        let p = dims.padded_size();
        Self {
            chunk_size: dims.chunk_size,
            neighbor_width: dims.neighbor_width,
            blocks: vec![BlockType::AIR; p * p * p],
        }
    }

    #[inline]
    pub fn padded(&self) -> usize {
        (self.chunk_size + 2 * self.neighbor_width) as usize
    }

    /// Local coordinate lies in the padded array.
    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32, z: i32) -> bool {
        let lo = -self.neighbor_width;
        let hi = self.chunk_size + self.neighbor_width;
        (lo..hi).contains(&x) && (lo..hi).contains(&y) && (lo..hi).contains(&z)
    }

    #[inline]
    pub fn idx(&self, x: i32, y: i32, z: i32) -> usize {
        let p = self.padded();
        let nw = self.neighbor_width;
        let (px, py, pz) = ((x + nw) as usize, (y + nw) as usize, (z + nw) as usize);
        (py * p + pz) * p + px
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32, z: i32) -> Option<BlockType> {
        if !self.in_bounds(x, y, z) {
            return None;
        }
        Some(self.blocks[self.idx(x, y, z)])
    }

    /// Returns false when the coordinate is outside the padded array.
    #[inline]
    pub fn set(&mut self, x: i32, y: i32, z: i32, ty: BlockType) -> bool {
        if !self.in_bounds(x, y, z) {
            return false;
        }
        let i = self.idx(x, y, z);
        self.blocks[i] = ty;
        true
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChunkStatus {
    /// Generation job queued, no block data yet.
    Requested,
    /// Block data and mesh installed.
    Loaded,
}

/// Unit of spatial partitioning, owned exclusively by the chunk manager.
#[derive(Debug)]
pub struct Chunk {
    coord: ChunkCoord,
    rep: String,
    // which request of this coord the chunk belongs to; results carrying
    // another load were asked for by an evicted predecessor
    load: u64,
    status: ChunkStatus,
    blocks: Option<ChunkBlocks>,
    // bumped on every local write; results built from an older copy are stale
    rev: u64,
    mesh_rev: u64,
    mesh: Option<Arc<ChunkMeshCPU>>,
}

impl Chunk {
    pub fn new(coord: ChunkCoord, load: u64) -> Self {
        Self {
            coord,
            rep: coord.rep(),
            load,
            status: ChunkStatus::Requested,
            blocks: None,
            rev: 0,
            mesh_rev: 0,
            mesh: None,
        }
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    #[inline]
    pub fn rep(&self) -> &str {
        &self.rep
    }

    #[inline]
    pub fn load(&self) -> u64 {
        self.load
    }

    #[inline]
    pub fn status(&self) -> ChunkStatus {
        self.status
    }

    #[inline]
    pub fn rev(&self) -> u64 {
        self.rev
    }

    #[inline]
    pub fn has_data(&self) -> bool {
        self.blocks.is_some()
    }

    #[inline]
    pub fn data(&self) -> Option<&ChunkBlocks> {
        self.blocks.as_ref()
    }

    #[inline]
    pub fn mesh(&self) -> Option<&Arc<ChunkMeshCPU>> {
        self.mesh.as_ref()
    }

    /// Release the mesh resource, e.g. on unload.
    pub fn take_mesh(&mut self) -> Option<Arc<ChunkMeshCPU>> {
        self.mesh.take()
    }

    /// Install the generated block array. Only the first one is taken.
    pub fn set_generated(&mut self, blocks: ChunkBlocks) -> bool {
        if self.blocks.is_some() {
            return false;
        }
        self.blocks = Some(blocks);
        true
    }

    /// Replace the block array with one built from revision `rev` of the
    /// installed data. Rejected before generation has landed and when a
    /// newer local write has happened since.
    pub fn set_data(&mut self, rev: u64, blocks: ChunkBlocks) -> bool {
        if self.blocks.is_none() || rev != self.rev {
            return false;
        }
        self.blocks = Some(blocks);
        true
    }

    /// Install a mesh built from revision `rev`. Older meshes are dropped.
    pub fn set_mesh(&mut self, rev: u64, mesh: Option<ChunkMeshCPU>) -> bool {
        if self.status == ChunkStatus::Loaded && rev < self.mesh_rev {
            return false;
        }
        self.mesh_rev = rev;
        self.mesh = mesh.map(Arc::new);
        self.status = ChunkStatus::Loaded;
        true
    }

    #[inline]
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Option<BlockType> {
        self.blocks.as_ref().and_then(|b| b.get(x, y, z))
    }

    /// Write a block at a chunk-local coordinate (interior or halo).
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, ty: BlockType) -> bool {
        let Some(blocks) = self.blocks.as_mut() else {
            return false;
        };
        if !blocks.set(x, y, z, ty) {
            return false;
        }
        self.rev += 1;
        true
    }
}

/// Fill the padded array of `coord` from the generator. Halo cells are
/// generated from their absolute coordinates, so they equal the neighbor's
/// interior by construction.
pub fn generate_chunk_blocks(
    generator: &TerrainGenerator,
    changes: &ChangedBlocks,
    coord: ChunkCoord,
    dims: &GridDims,
) -> ChunkBlocks {
    let mut out = ChunkBlocks::new_air(dims);
    let nw = dims.neighbor_width;
    let hi = dims.chunk_size + nw;
    for y in -nw..hi {
        for z in -nw..hi {
            for x in -nw..hi {
                let b = dims.local_to_block(coord, BlockPos::new(x, y, z));
                let ty = generator.generate(changes, b.x, b.y, b.z);
                let i = out.idx(x, y, z);
                out.blocks[i] = ty;
            }
        }
    }
    out
}
