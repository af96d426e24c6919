//! Per-world orchestration on the owning thread.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use strata_blocks::BlockType;
use strata_geom::{BlockPos, ChunkCoord, GridDims, Vec3, approx_equals};
use strata_runtime::{Job, PoolStats};
use strata_world::{ChangedBlocks, Seed};

use crate::chunk_manager::ChunkManager;
use crate::config::AppConfig;
use crate::net::{Authority, AuthorityError, BlockEdit, EditClient, EditKind, EditRequest};
use crate::player::Observer;
use crate::scene::Scene;
use crate::worker_manager::{SpawnHeight, TaskContext, WorkerManager};

/// Stored player height meaning "never placed"; the spawn column is probed.
pub const UNSET_Y: f64 = -9_007_199_254_740_991.0;
const UNSET_TOLERANCE: f64 = 5.0;

/// Persisted world record handed over at entry.
#[derive(Clone, Debug)]
pub struct WorldData {
    pub id: String,
    pub name: String,
    pub seed: String,
    pub changed_blocks: Vec<BlockEdit>,
    pub player_y: f64,
}

impl WorldData {
    /// A world nobody has entered yet.
    pub fn fresh(id: &str, seed: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            seed: seed.to_string(),
            changed_blocks: Vec::new(),
            player_y: UNSET_Y,
        }
    }
}

/// A block addressed by its chunk and chunk-local position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockTarget {
    pub chunk: ChunkCoord,
    pub block: BlockPos,
}

impl BlockTarget {
    pub fn absolute(&self, dims: &GridDims) -> BlockPos {
        dims.local_to_block(self.chunk, self.block)
    }
}

/// The block under the crosshair and the empty cell in front of it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub target: Option<BlockTarget>,
    pub potential: Option<BlockTarget>,
}

impl Selection {
    pub fn clear(&mut self) {
        self.target = None;
        self.potential = None;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum WorldEvent {
    Ready,
    /// A confirmed break yielded this block.
    BlockObtained(BlockType),
    BlockPlaced(BlockType),
    EditFailed { pos: BlockPos, error: AuthorityError },
}

#[derive(Clone, Debug)]
pub struct WorldStats {
    pub chunks: usize,
    pub loaded: usize,
    pub changed_blocks: usize,
    pub busy_blocks: usize,
    pub pending_tasks: usize,
    pub pending_edits: usize,
    pub pool: PoolStats,
}

pub struct World<S: Scene, O: Observer> {
    data: WorldData,
    config: AppConfig,
    seed: Seed,
    chunks: ChunkManager,
    workers: WorkerManager,
    scene: S,
    observer: O,
    selection: Selection,
    edits: EditClient,
    feed: Receiver<BlockEdit>,
    ready: bool,
    next_edit_id: u64,
    pending_edits: usize,
    events: Vec<WorldEvent>,
}

impl<S: Scene, O: Observer> World<S, O> {
    pub fn new(
        data: WorldData,
        config: AppConfig,
        authority: Arc<dyn Authority>,
        feed: Receiver<BlockEdit>,
        scene: S,
        observer: O,
    ) -> Self {
        let dims = config.dims();
        let changed = ChangedBlocks::from_entries(
            dims.chunk_size,
            data.changed_blocks.iter().map(|e| (e.pos(), e.ty)),
        );
        let chunks = ChunkManager::new(
            dims,
            config.chunk.load_radius,
            config.evict_radius(),
            changed,
        );
        let workers = WorkerManager::new(config.worker_count(), config.workers.tasks_per_tick);
        let edits = EditClient::spawn(data.id.clone(), authority);
        Self {
            seed: Seed::from_name(&data.seed),
            data,
            config,
            chunks,
            workers,
            scene,
            observer,
            selection: Selection::default(),
            edits,
            feed,
            ready: false,
            next_edit_id: 0,
            pending_edits: 0,
            events: Vec::new(),
        }
    }

    /// Configure the workers and either probe the spawn column or start
    /// streaming right away.
    pub fn init(&mut self) {
        self.workers.broadcast(Job::Configure {
            seed: self.seed,
            params: self.config.worldgen_params(),
            dims: *self.chunks.dims(),
        });
        log::info!(
            target: "stream",
            "world {} ({}) seed {} with {} stored edits",
            self.data.id,
            self.data.name,
            self.seed.value(),
            self.chunks.changed_blocks().len()
        );
        if approx_equals(self.data.player_y, UNSET_Y, UNSET_TOLERANCE) {
            self.workers.queue_specific_chunk(Job::GetHighest {
                x: 0,
                z: 0,
                changes: self.chunks.changed_blocks().snapshot(),
            });
        } else {
            self.set_ready();
        }
    }

    /// One owning-thread tick.
    pub fn update(&mut self) {
        self.tick(None);
    }

    /// A tick that waits up to `timeout` for a worker result when idle.
    pub fn update_blocking(&mut self, timeout: Duration) {
        self.tick(Some(timeout));
    }

    fn tick(&mut self, wait: Option<Duration>) {
        let mut ctx = TaskContext::new(&mut self.chunks, &mut self.scene, &mut self.selection);
        let heights = match wait {
            Some(timeout) => self.workers.update_blocking(timeout, &mut ctx),
            None => self.workers.update(&mut ctx),
        };
        let followups = std::mem::take(&mut ctx.followups);
        for job in followups {
            self.workers.queue_general_chunk(job);
        }
        for h in heights {
            self.place_at_spawn(h);
        }

        for outcome in self.edits.drain() {
            self.pending_edits = self.pending_edits.saturating_sub(1);
            let request = outcome.request;
            match outcome.result {
                Ok(_) => {
                    let pos = request.edit.pos();
                    if self.chunks.confirm_busy_block(pos.x, pos.y, pos.z, request.id) {
                        log::debug!(target: "edit", "released {}", pos.rep());
                    }
                    match request.kind {
                        EditKind::Break if !request.previous.is_air() => {
                            self.events.push(WorldEvent::BlockObtained(request.previous));
                        }
                        EditKind::Break => {}
                        EditKind::Place => {
                            self.events.push(WorldEvent::BlockPlaced(request.edit.ty))
                        }
                    }
                }
                Err(error) => {
                    let pos = request.edit.pos();
                    log::warn!(target: "edit", "edit {} at {} failed: {}", request.id, pos.rep(), error);
                    self.chunks.untag_busy_block(pos.x, pos.y, pos.z);
                    self.events.push(WorldEvent::EditFailed { pos, error });
                }
            }
        }

        let incoming: Vec<BlockEdit> = self.feed.try_iter().collect();
        for edit in incoming {
            self.update_changed(edit);
        }

        if let Some(timeout) = self.config.busy_timeout() {
            for pos in self.chunks.expire_busy_blocks(timeout, Instant::now()) {
                log::warn!(target: "edit", "busy lock on {} expired", pos.rep());
            }
        }

        if self.ready {
            let center = self.chunks.dims().world_to_chunk(self.observer.position());
            let update = self.chunks.surrounding_chunks_check(center);
            for name in &update.evicted {
                self.scene.detach(name);
            }
            for job in update.requested {
                self.workers.queue_general_chunk(job);
            }
        }
    }

    fn place_at_spawn(&mut self, h: SpawnHeight) {
        let dim = self.chunks.dims().dimension;
        let eye2toe = self.config.player.eye2toe;
        let pos = Vec3::new(
            h.x as f32 * dim + dim / 2.0,
            (h.h as f32 + eye2toe + 1.0) * dim,
            h.z as f32 * dim + dim / 2.0,
        );
        log::info!(target: "stream", "spawn column ({}, {}) top {}", h.x, h.z, h.h);
        self.observer.set_position(pos);
        self.data.player_y = pos.y as f64;
        self.set_ready();
    }

    fn set_ready(&mut self) {
        if !self.ready {
            self.ready = true;
            self.events.push(WorldEvent::Ready);
        }
    }

    /// Apply a block change confirmed by the authority feed.
    pub fn update_changed(&mut self, edit: BlockEdit) {
        for job in self.chunks.update_changed(edit.x, edit.y, edit.z, edit.ty) {
            self.workers.queue_general_chunk(job);
        }
    }

    pub fn set_target(&mut self, target: Option<BlockTarget>) {
        self.selection.target = target;
    }

    pub fn set_potential(&mut self, potential: Option<BlockTarget>) {
        self.selection.potential = potential;
    }

    pub fn break_block(&mut self) {
        let Some(target) = self.selection.target else {
            return;
        };
        self.update_block(EditKind::Break, BlockType::AIR, target);
    }

    pub fn place_block(&mut self, ty: BlockType) {
        let Some(potential) = self.selection.potential else {
            return;
        };
        self.update_block(EditKind::Place, ty, potential);
    }

    /// Submit one edit unless the block already has one in flight.
    fn update_block(&mut self, kind: EditKind, ty: BlockType, at: BlockTarget) {
        let pos = at.absolute(self.chunks.dims());
        let id = self.next_edit_id + 1;
        if !self.chunks.tag_busy_block(pos.x, pos.y, pos.z, id) {
            log::debug!(target: "edit", "{} is busy, dropping {:?}", pos.rep(), kind);
            return;
        }
        self.next_edit_id = id;
        let request = EditRequest {
            id,
            kind,
            edit: BlockEdit::new(pos, ty),
            previous: self
                .chunks
                .get_type_at(pos.x, pos.y, pos.z)
                .unwrap_or(BlockType::AIR),
        };
        match self.edits.submit(request) {
            Ok(()) => self.pending_edits += 1,
            Err(request) => {
                let error = AuthorityError::Unreachable("edit client stopped".into());
                log::warn!(target: "edit", "edit {} not sent: {}", request.id, error);
                self.chunks.untag_busy_block(pos.x, pos.y, pos.z);
                self.events.push(WorldEvent::EditFailed { pos, error });
            }
        }
    }

    pub fn get_voxel_by_voxel_coords(&self, x: i32, y: i32, z: i32) -> Option<BlockType> {
        self.chunks.get_type_at(x, y, z)
    }

    pub fn get_voxel_by_world_coords(&self, p: Vec3) -> Option<BlockType> {
        let b = self.chunks.dims().world_to_block(p);
        self.get_voxel_by_voxel_coords(b.x, b.y, b.z)
    }

    /// Whether the block stops movement (`for_passing`) or rays. Unloaded
    /// space blocks nothing for rays and everything for movement.
    pub fn get_solidity_by_voxel_coords(&self, x: i32, y: i32, z: i32, for_passing: bool) -> bool {
        match self.get_voxel_by_voxel_coords(x, y, z) {
            None => for_passing,
            Some(ty) if for_passing => !ty.is_passable(),
            Some(ty) => ty.is_solid(),
        }
    }

    pub fn get_passable_by_voxel_coords(&self, x: i32, y: i32, z: i32) -> bool {
        self.get_solidity_by_voxel_coords(x, y, z, true)
    }

    /// Type under the current target, `AIR` when nothing is targeted.
    pub fn get_target_block_type(&self) -> BlockType {
        self.selection
            .target
            .and_then(|t| {
                let b = t.absolute(self.chunks.dims());
                self.get_voxel_by_voxel_coords(b.x, b.y, b.z)
            })
            .unwrap_or(BlockType::AIR)
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Tick until workers, tasks, edits and the feed are all quiet, or until
    /// `timeout` passes. Returns whether it settled.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.update_blocking(Duration::from_millis(10));
            if self.is_quiet() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            if self.workers.is_idle() && self.pending_edits > 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    }

    fn is_quiet(&self) -> bool {
        self.workers.is_idle()
            && self.pending_edits == 0
            && self.feed.is_empty()
            && (!self.ready || self.chunks.is_ready())
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn id(&self) -> &str {
        &self.data.id
    }

    pub fn data(&self) -> &WorldData {
        &self.data
    }

    pub fn seed(&self) -> Seed {
        self.seed
    }

    pub fn chunk_manager(&self) -> &ChunkManager {
        &self.chunks
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn stats(&self) -> WorldStats {
        WorldStats {
            chunks: self.chunks.len(),
            loaded: self.chunks.loaded_count(),
            changed_blocks: self.chunks.changed_blocks().len(),
            busy_blocks: self.chunks.busy_count(),
            pending_tasks: self.workers.pending_tasks(),
            pending_edits: self.pending_edits,
            pool: self.workers.pool_stats(),
        }
    }
}
