//! Owning-thread chunk table: streaming around the observer, data and mesh
//! installation, halo mirroring of edits, and per-block busy locks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use strata_blocks::BlockType;
use strata_chunk::{Chunk, ChunkBlocks, ChunkMeshCPU, ChunkStatus};
use strata_geom::{BlockPos, ChunkCoord, GridDims};
use strata_runtime::Job;
use strata_world::ChangedBlocks;

/// Result of one streaming pass.
#[derive(Debug, Default)]
pub struct StreamUpdate {
    /// Generation jobs for newly requested chunks, nearest first.
    pub requested: Vec<Job>,
    /// Names of evicted chunks whose scene objects must be detached.
    pub evicted: Vec<String>,
}

/// Lock on a block with an edit in flight. It is released once the
/// authority has confirmed the edit and a re-mesh for the block has been
/// swapped into the scene, in either order.
#[derive(Clone, Copy, Debug)]
struct BusyBlock {
    edit: u64,
    since: Instant,
    confirmed: bool,
    swapped: bool,
}

pub struct ChunkManager {
    dims: GridDims,
    load_radius: i32,
    evict_radius: i32,
    center: Option<ChunkCoord>,
    chunks: HashMap<ChunkCoord, Chunk>,
    // last load id handed to a requested chunk
    next_load: u64,
    changed: ChangedBlocks,
    busy: HashMap<BlockPos, BusyBlock>,
}

impl ChunkManager {
    pub fn new(dims: GridDims, load_radius: i32, evict_radius: i32, changed: ChangedBlocks) -> Self {
        Self {
            dims,
            load_radius: load_radius.max(0),
            evict_radius: evict_radius.max(load_radius).max(0),
            center: None,
            chunks: HashMap::new(),
            next_load: 0,
            changed,
            busy: HashMap::new(),
        }
    }

    #[inline]
    pub fn dims(&self) -> &GridDims {
        &self.dims
    }

    #[inline]
    pub fn changed_blocks(&self) -> &ChangedBlocks {
        &self.changed
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn loaded_count(&self) -> usize {
        self.chunks
            .values()
            .filter(|c| c.status() == ChunkStatus::Loaded)
            .count()
    }

    /// Every tracked chunk has its data and mesh installed.
    pub fn is_ready(&self) -> bool {
        !self.chunks.is_empty() && self.loaded_count() == self.chunks.len()
    }

    #[inline]
    pub fn center(&self) -> Option<ChunkCoord> {
        self.center
    }

    pub fn chunk_from_coords(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    pub fn chunk_from_rep(&self, rep: &str) -> Option<&Chunk> {
        ChunkCoord::from_rep(rep).and_then(|c| self.chunks.get(&c))
    }

    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks.keys().copied()
    }

    /// Request every chunk within `load_radius` of `center` and evict those
    /// past `evict_radius`. A no-op while the center chunk is unchanged.
    pub fn surrounding_chunks_check(&mut self, center: ChunkCoord) -> StreamUpdate {
        let mut out = StreamUpdate::default();
        if self.center == Some(center) {
            return out;
        }
        self.center = Some(center);

        let evict_sq = (self.evict_radius as i64).pow(2);
        let gone: Vec<ChunkCoord> = self
            .chunks
            .keys()
            .copied()
            .filter(|c| c.distance_sq(center) > evict_sq)
            .collect();
        for coord in gone {
            if let Some(mut chunk) = self.chunks.remove(&coord) {
                chunk.take_mesh();
                out.evicted.push(chunk.rep().to_string());
            }
        }

        let r = self.load_radius;
        let load_sq = (r as i64).pow(2);
        let mut wanted = Vec::new();
        for dy in -r..=r {
            for dz in -r..=r {
                for dx in -r..=r {
                    let c = center.offset(dx, dy, dz);
                    if c.distance_sq(center) <= load_sq && !self.chunks.contains_key(&c) {
                        wanted.push(c);
                    }
                }
            }
        }
        wanted.sort_by_key(|c| c.distance_sq(center));

        if !wanted.is_empty() {
            let changes = self.changed.snapshot();
            for coord in wanted {
                self.next_load += 1;
                let load = self.next_load;
                self.chunks.insert(coord, Chunk::new(coord, load));
                out.requested.push(Job::GetChunk {
                    coord,
                    load,
                    changes: changes.clone(),
                });
            }
        }
        if !out.requested.is_empty() || !out.evicted.is_empty() {
            log::info!(
                target: "stream",
                "center {} requested={} evicted={} tracked={}",
                center,
                out.requested.len(),
                out.evicted.len(),
                self.chunks.len()
            );
        }
        out
    }

    /// Install a block array returned by a worker for load `load` of the
    /// chunk. Generation results (`reconcile`) are taken once and first
    /// reconciled with overrides registered after the job was snapshotted; a
    /// re-mesh job is returned when that changed anything. Re-mesh results
    /// need installed data at the same revision.
    pub fn install_blocks(
        &mut self,
        coord: ChunkCoord,
        load: u64,
        rev: u64,
        mut blocks: ChunkBlocks,
        reconcile: bool,
    ) -> Option<Job> {
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            log::debug!(target: "stream", "drop data for untracked chunk {}", coord);
            return None;
        };
        if chunk.load() != load {
            log::debug!(
                target: "stream",
                "drop data for {} from load {} (current {})",
                coord,
                load,
                chunk.load()
            );
            return None;
        }
        if !reconcile {
            if !chunk.set_data(rev, blocks) {
                log::debug!(
                    target: "stream",
                    "stale data for {} (rev {}, current {})",
                    coord,
                    rev,
                    chunk.rev()
                );
            }
            return None;
        }
        if chunk.has_data() {
            log::debug!(target: "stream", "{} already generated", coord);
            return None;
        }

        let mut drifted = false;
        for (pos, ty) in self.changed.entries_in_chunk_region(coord, &self.dims) {
            let l = BlockPos::new(
                pos.x - coord.cx * self.dims.chunk_size,
                pos.y - coord.cy * self.dims.chunk_size,
                pos.z - coord.cz * self.dims.chunk_size,
            );
            if blocks.get(l.x, l.y, l.z) != Some(ty) {
                blocks.set(l.x, l.y, l.z, ty);
                drifted = true;
            }
        }
        chunk.set_generated(blocks);
        if !drifted {
            return None;
        }
        log::debug!(target: "stream", "reconciled late overrides into {}", coord);
        remesh_job(chunk, None)
    }

    /// Install a worker-built mesh. Returns the mesh now held by the chunk
    /// when the install was accepted.
    pub fn install_mesh(
        &mut self,
        coord: ChunkCoord,
        load: u64,
        rev: u64,
        mesh: Option<ChunkMeshCPU>,
    ) -> Option<Option<Arc<ChunkMeshCPU>>> {
        let chunk = self.chunks.get_mut(&coord)?;
        if chunk.load() != load {
            log::debug!(target: "mesh", "drop mesh for {} from load {}", coord, load);
            return None;
        }
        if !chunk.set_mesh(rev, mesh) {
            log::debug!(target: "mesh", "older mesh for {} ignored (rev {})", coord, rev);
            return None;
        }
        Some(chunk.mesh().cloned())
    }

    /// Record an authoritative block change: register it, write it into the
    /// home chunk and into every loaded neighbor whose halo mirrors it, and
    /// return the re-mesh jobs for the home chunk and face neighbors.
    pub fn update_changed(&mut self, x: i32, y: i32, z: i32, ty: BlockType) -> Vec<Job> {
        let pos = BlockPos::new(x, y, z);
        self.changed.register(x, y, z, ty);

        let home = self.dims.block_to_chunk(pos);
        let local = self.dims.block_to_local(pos);
        let mut jobs = Vec::new();

        for dy in -1..=1 {
            for dz in -1..=1 {
                for dx in -1..=1 {
                    if (dx, dy, dz) == (0, 0, 0) {
                        continue;
                    }
                    let (Some(mx), Some(my), Some(mz)) = (
                        self.mirror_axis(local.x, dx),
                        self.mirror_axis(local.y, dy),
                        self.mirror_axis(local.z, dz),
                    ) else {
                        continue;
                    };
                    let neighbor = home.offset(dx, dy, dz);
                    let Some(chunk) = self.chunks.get_mut(&neighbor) else {
                        continue;
                    };
                    if !chunk.set_block(mx, my, mz, ty) {
                        continue;
                    }
                    // edge and corner halo cells never reach the mesher
                    let faces = (dx != 0) as u8 + (dy != 0) as u8 + (dz != 0) as u8;
                    if faces == 1 {
                        jobs.extend(remesh_job(chunk, Some(pos)));
                    }
                }
            }
        }

        if let Some(chunk) = self.chunks.get_mut(&home) {
            if chunk.set_block(local.x, local.y, local.z, ty) {
                jobs.extend(remesh_job(chunk, Some(pos)));
            }
        }

        // nothing to re-mesh, so no swap will follow
        if jobs.is_empty() && self.busy_block_swapped(x, y, z) {
            log::debug!(target: "edit", "released {} (chunk not loaded)", pos.rep());
        }
        log::debug!(
            target: "edit",
            "changed {} -> {} ({} re-mesh jobs)",
            pos.rep(),
            ty,
            jobs.len()
        );
        jobs
    }

    /// Where an interior coordinate lands in the neighbor at `delta` along one
    /// axis, if inside that neighbor's halo. `delta == 0` is the same chunk.
    #[inline]
    fn mirror_axis(&self, local: i32, delta: i32) -> Option<i32> {
        let cs = self.dims.chunk_size;
        let nw = self.dims.neighbor_width;
        match delta {
            0 => Some(local),
            -1 if local < nw => Some(local + cs),
            1 if local >= cs - nw => Some(local - cs),
            _ => None,
        }
    }

    /// Type of the block at an absolute coordinate, when its chunk has data.
    pub fn get_type_at(&self, x: i32, y: i32, z: i32) -> Option<BlockType> {
        let pos = BlockPos::new(x, y, z);
        let local = self.dims.block_to_local(pos);
        self.chunks
            .get(&self.dims.block_to_chunk(pos))
            .and_then(|c| c.get_block(local.x, local.y, local.z))
    }

    #[inline]
    pub fn check_busy_block(&self, x: i32, y: i32, z: i32) -> bool {
        self.busy.contains_key(&BlockPos::new(x, y, z))
    }

    /// Lock a block for edit `edit`. Returns false when it already holds one.
    pub fn tag_busy_block(&mut self, x: i32, y: i32, z: i32, edit: u64) -> bool {
        let pos = BlockPos::new(x, y, z);
        if self.busy.contains_key(&pos) {
            return false;
        }
        self.busy.insert(
            pos,
            BusyBlock {
                edit,
                since: Instant::now(),
                confirmed: false,
                swapped: false,
            },
        );
        true
    }

    /// The authority accepted edit `edit`. Returns true when this released
    /// the lock.
    pub fn confirm_busy_block(&mut self, x: i32, y: i32, z: i32, edit: u64) -> bool {
        let pos = BlockPos::new(x, y, z);
        let Some(entry) = self.busy.get_mut(&pos) else {
            return false;
        };
        if entry.edit != edit {
            return false;
        }
        entry.confirmed = true;
        if entry.swapped {
            self.busy.remove(&pos);
            return true;
        }
        false
    }

    /// A re-mesh carrying the block reached the scene. Returns true when
    /// this released the lock.
    pub fn busy_block_swapped(&mut self, x: i32, y: i32, z: i32) -> bool {
        let pos = BlockPos::new(x, y, z);
        let Some(entry) = self.busy.get_mut(&pos) else {
            return false;
        };
        entry.swapped = true;
        if entry.confirmed {
            self.busy.remove(&pos);
            return true;
        }
        false
    }

    /// Drop the lock regardless of progress, e.g. when the edit failed.
    pub fn untag_busy_block(&mut self, x: i32, y: i32, z: i32) -> bool {
        self.busy.remove(&BlockPos::new(x, y, z)).is_some()
    }

    #[inline]
    pub fn busy_count(&self) -> usize {
        self.busy.len()
    }

    /// Release locks held longer than `timeout`.
    pub fn expire_busy_blocks(&mut self, timeout: Duration, now: Instant) -> Vec<BlockPos> {
        let expired: Vec<BlockPos> = self
            .busy
            .iter()
            .filter(|(_, b)| now.saturating_duration_since(b.since) >= timeout)
            .map(|(p, _)| *p)
            .collect();
        for p in &expired {
            self.busy.remove(p);
        }
        expired
    }
}

fn remesh_job(chunk: &Chunk, block: Option<BlockPos>) -> Option<Job> {
    chunk.data().map(|data| Job::UpdateBlock {
        coord: chunk.coord(),
        load: chunk.load(),
        rev: chunk.rev(),
        blocks: data.clone(),
        block,
    })
}
