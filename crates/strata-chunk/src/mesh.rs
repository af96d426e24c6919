//! Face-culling CPU mesher. Reads the halo so boundary faces against a loaded
//! neighbor are culled without touching the neighbor chunk.

use std::collections::HashMap;

use strata_blocks::BlockType;
use strata_geom::{ChunkCoord, GridDims, Vec3};

use crate::ChunkBlocks;

#[derive(Default, Clone, Debug, PartialEq)]
pub struct MeshBuild {
    pub pos: Vec<f32>,
    pub norm: Vec<f32>,
    pub uv: Vec<f32>,
    pub idx: Vec<u32>,
}

impl MeshBuild {
    /// Append a quad `a b c d` (counter-clockwise seen from `n`).
    pub fn add_quad(&mut self, a: Vec3, b: Vec3, c: Vec3, d: Vec3, n: Vec3) {
        let base = (self.pos.len() / 3) as u32;
        let vs = [a, b, c, d];
        let uvs = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        for i in 0..4 {
            self.pos.extend_from_slice(&[vs[i].x, vs[i].y, vs[i].z]);
            self.norm.extend_from_slice(&[n.x, n.y, n.z]);
            self.uv.extend_from_slice(&[uvs[i].0, uvs[i].1]);
        }
        self.idx
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    #[inline]
    pub fn quad_count(&self) -> usize {
        self.idx.len() / 6
    }
}

/// Renderable geometry for one chunk, split by block type.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkMeshCPU {
    pub coord: ChunkCoord,
    /// Scene object name; equals the chunk's `rep`.
    pub name: String,
    pub parts: HashMap<BlockType, MeshBuild>,
}

impl ChunkMeshCPU {
    pub fn quad_count(&self) -> usize {
        self.parts.values().map(MeshBuild::quad_count).sum()
    }
}

// (dx, dy, dz) plus the four corners of the unit face on that side
const FACES: [((i32, i32, i32), [(f32, f32, f32); 4]); 6] = [
    ((1, 0, 0), [(1., 0., 0.), (1., 1., 0.), (1., 1., 1.), (1., 0., 1.)]),
    ((-1, 0, 0), [(0., 0., 1.), (0., 1., 1.), (0., 1., 0.), (0., 0., 0.)]),
    ((0, 1, 0), [(0., 1., 0.), (0., 1., 1.), (1., 1., 1.), (1., 1., 0.)]),
    ((0, -1, 0), [(0., 0., 1.), (0., 0., 0.), (1., 0., 0.), (1., 0., 1.)]),
    ((0, 0, 1), [(1., 0., 1.), (1., 1., 1.), (0., 1., 1.), (0., 0., 1.)]),
    ((0, 0, -1), [(0., 0., 0.), (0., 1., 0.), (1., 1., 0.), (1., 0., 0.)]),
];

#[inline]
fn face_visible(this: BlockType, other: BlockType) -> bool {
    other.is_transparent() && other != this
}

/// Mesh the interior of `blocks`. Returns `None` when no face is visible.
pub fn build_chunk_mesh(
    blocks: &ChunkBlocks,
    coord: ChunkCoord,
    dims: &GridDims,
) -> Option<ChunkMeshCPU> {
    let cs = blocks.chunk_size;
    let s = dims.dimension;
    let mut parts: HashMap<BlockType, MeshBuild> = HashMap::new();
    for y in 0..cs {
        for z in 0..cs {
            for x in 0..cs {
                let ty = blocks.blocks[blocks.idx(x, y, z)];
                if ty.is_air() {
                    continue;
                }
                let wx = (coord.cx * cs + x) as f32;
                let wy = (coord.cy * cs + y) as f32;
                let wz = (coord.cz * cs + z) as f32;
                for ((dx, dy, dz), corners) in FACES.iter() {
                    let other = blocks
                        .get(x + dx, y + dy, z + dz)
                        .unwrap_or(BlockType::AIR);
                    if !face_visible(ty, other) {
                        continue;
                    }
                    let v = |c: (f32, f32, f32)| Vec3::new((wx + c.0) * s, (wy + c.1) * s, (wz + c.2) * s);
                    let n = Vec3::new(*dx as f32, *dy as f32, *dz as f32);
                    parts
                        .entry(ty)
                        .or_default()
                        .add_quad(v(corners[0]), v(corners[1]), v(corners[2]), v(corners[3]), n);
                }
            }
        }
    }
    if parts.is_empty() {
        log::trace!(target: "mesh", "chunk {} has no visible faces", coord);
        return None;
    }
    Some(ChunkMeshCPU {
        coord,
        name: coord.rep(),
        parts,
    })
}
