//! Owning-thread side of the worker pool: queues jobs, turns results into
//! ordered task batches, and applies them a budget at a time.

use std::time::Duration;

use strata_chunk::{ChunkBlocks, ChunkMeshCPU};
use strata_geom::{BlockPos, ChunkCoord};
use strata_runtime::{Job, JobOut, PoolStats, TaskQueue, WorkerPool};

use crate::chunk_manager::ChunkManager;
use crate::scene::Scene;
use crate::world::Selection;

/// Deferred owning-thread work derived from a worker result.
#[derive(Debug)]
pub enum ChunkTask {
    InstallBlocks {
        coord: ChunkCoord,
        load: u64,
        rev: u64,
        blocks: ChunkBlocks,
        reconcile: bool,
    },
    /// Store the mesh in the chunk; `attach` also publishes it to the scene.
    InstallMesh {
        coord: ChunkCoord,
        load: u64,
        rev: u64,
        mesh: Option<ChunkMeshCPU>,
        attach: bool,
    },
    /// Replace the chunk's scene object and report the swap to the edited
    /// block's lock.
    SwapScene {
        coord: ChunkCoord,
        block: Option<BlockPos>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    InstallBlocks,
    InstallMesh,
    SwapScene,
}

impl ChunkTask {
    pub fn kind(&self) -> TaskKind {
        match self {
            ChunkTask::InstallBlocks { .. } => TaskKind::InstallBlocks,
            ChunkTask::InstallMesh { .. } => TaskKind::InstallMesh,
            ChunkTask::SwapScene { .. } => TaskKind::SwapScene,
        }
    }
}

/// Surface height reported for a spawn column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnHeight {
    pub x: i32,
    pub z: i32,
    pub h: i32,
}

/// Owning-thread state a task may touch.
pub struct TaskContext<'a> {
    pub chunks: &'a mut ChunkManager,
    pub scene: &'a mut dyn Scene,
    pub selection: &'a mut Selection,
    /// Jobs produced while applying tasks, queued by the caller.
    pub followups: Vec<Job>,
}

impl<'a> TaskContext<'a> {
    pub fn new(
        chunks: &'a mut ChunkManager,
        scene: &'a mut dyn Scene,
        selection: &'a mut Selection,
    ) -> Self {
        Self {
            chunks,
            scene,
            selection,
            followups: Vec::new(),
        }
    }
}

pub struct WorkerManager {
    pool: WorkerPool,
    tasks: TaskQueue<ChunkTask>,
    tasks_per_tick: usize,
}

impl WorkerManager {
    pub fn new(worker_count: usize, tasks_per_tick: usize) -> Self {
        Self::with_pool(WorkerPool::new(worker_count), tasks_per_tick)
    }

    pub fn with_pool(pool: WorkerPool, tasks_per_tick: usize) -> Self {
        Self {
            pool,
            tasks: TaskQueue::new(),
            tasks_per_tick,
        }
    }

    #[inline]
    pub fn queue_specific_chunk(&mut self, job: Job) {
        self.pool.queue_specific_job(job);
    }

    #[inline]
    pub fn queue_general_chunk(&mut self, job: Job) {
        self.pool.queue_general_job(job);
    }

    #[inline]
    pub fn broadcast(&mut self, job: Job) {
        self.pool.broadcast(job);
    }

    /// Drain finished jobs into the task queue, then apply up to
    /// `tasks_per_tick` batches.
    pub fn update(&mut self, ctx: &mut TaskContext<'_>) -> Vec<SpawnHeight> {
        let outs = self.pool.update();
        self.finish(outs, ctx)
    }

    /// Like `update`, but waits up to `timeout` for a result when nothing is
    /// ready yet.
    pub fn update_blocking(
        &mut self,
        timeout: Duration,
        ctx: &mut TaskContext<'_>,
    ) -> Vec<SpawnHeight> {
        let outs = if self.tasks.is_empty() {
            self.pool.update_blocking(timeout)
        } else {
            self.pool.update()
        };
        self.finish(outs, ctx)
    }

    fn finish(&mut self, outs: Vec<JobOut>, ctx: &mut TaskContext<'_>) -> Vec<SpawnHeight> {
        let mut heights = Vec::new();
        for out in outs {
            if let Some(h) = self.stage(out) {
                heights.push(h);
            }
        }
        let ran = self
            .tasks
            .update(self.tasks_per_tick, |task| run_task(task, ctx));
        if ran > 0 {
            log::trace!(target: "tasks", "applied {} tasks, {} pending", ran, self.tasks.len());
        }
        heights
    }

    /// Translate a result into its task batch. Data always precedes the mesh,
    /// and the mesh precedes the scene swap.
    fn stage(&mut self, out: JobOut) -> Option<SpawnHeight> {
        match out {
            JobOut::Highest { x, z, h } => Some(SpawnHeight { x, z, h }),
            JobOut::Chunk {
                coord,
                load,
                blocks,
                mesh,
            } => {
                self.tasks.add_tasks(vec![
                    ChunkTask::InstallBlocks {
                        coord,
                        load,
                        rev: 0,
                        blocks,
                        reconcile: true,
                    },
                    ChunkTask::InstallMesh {
                        coord,
                        load,
                        rev: 0,
                        mesh,
                        attach: true,
                    },
                ]);
                None
            }
            JobOut::BlockUpdated {
                coord,
                load,
                rev,
                blocks,
                mesh,
                block,
            } => {
                self.tasks.add_tasks(vec![
                    ChunkTask::InstallBlocks {
                        coord,
                        load,
                        rev,
                        blocks,
                        reconcile: false,
                    },
                    ChunkTask::InstallMesh {
                        coord,
                        load,
                        rev,
                        mesh,
                        attach: false,
                    },
                    ChunkTask::SwapScene { coord, block },
                ]);
                None
            }
        }
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn pending_task_kinds(&self) -> Vec<TaskKind> {
        self.tasks.iter().map(ChunkTask::kind).collect()
    }

    /// No queued or running jobs and no staged tasks.
    pub fn is_idle(&self) -> bool {
        self.pool.is_idle() && self.tasks.is_empty()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

fn run_task(task: ChunkTask, ctx: &mut TaskContext<'_>) {
    match task {
        ChunkTask::InstallBlocks {
            coord,
            load,
            rev,
            blocks,
            reconcile,
        } => {
            if let Some(job) = ctx.chunks.install_blocks(coord, load, rev, blocks, reconcile) {
                ctx.followups.push(job);
            }
        }
        ChunkTask::InstallMesh {
            coord,
            load,
            rev,
            mesh,
            attach,
        } => {
            let Some(installed) = ctx.chunks.install_mesh(coord, load, rev, mesh) else {
                return;
            };
            if attach {
                let name = coord.rep();
                ctx.scene.detach(&name);
                if let Some(mesh) = installed {
                    ctx.scene.attach(mesh);
                }
            }
        }
        ChunkTask::SwapScene { coord, block } => {
            if let Some(chunk) = ctx.chunks.chunk_from_coords(coord) {
                let mesh = chunk.mesh().cloned();
                ctx.scene.detach(chunk.rep());
                if let Some(mesh) = mesh {
                    ctx.scene.attach(mesh);
                }
            }
            if let Some(b) = block {
                if ctx.chunks.busy_block_swapped(b.x, b.y, b.z) {
                    log::debug!(target: "edit", "released {}", b.rep());
                }
                ctx.selection.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneGraph;
    use strata_geom::GridDims;
    use strata_world::ChangedBlocks;

    fn dims() -> GridDims {
        GridDims::new(4, 1, 1.0)
    }

    fn chunk_out(coord: ChunkCoord) -> JobOut {
        JobOut::Chunk {
            coord,
            load: 1,
            blocks: ChunkBlocks::new_air(&dims()),
            mesh: None,
        }
    }

    #[test]
    fn results_stage_in_install_order() {
        let mut wm = WorkerManager::new(1, 0);
        let c = ChunkCoord::new(0, 0, 0);
        assert!(wm.stage(chunk_out(c)).is_none());
        wm.stage(JobOut::BlockUpdated {
            coord: c,
            load: 1,
            rev: 1,
            blocks: ChunkBlocks::new_air(&dims()),
            mesh: None,
            block: Some(BlockPos::new(1, 1, 1)),
        });
        assert_eq!(
            wm.pending_task_kinds(),
            vec![
                TaskKind::InstallBlocks,
                TaskKind::InstallMesh,
                TaskKind::InstallBlocks,
                TaskKind::InstallMesh,
                TaskKind::SwapScene,
            ]
        );
        assert_eq!(
            wm.stage(JobOut::Highest { x: 0, z: 0, h: 7 }),
            Some(SpawnHeight { x: 0, z: 0, h: 7 })
        );
    }

    #[test]
    fn swap_releases_confirmed_lock_and_clears_selection() {
        let mut wm = WorkerManager::new(1, 1);
        let mut chunks = ChunkManager::new(dims(), 0, 0, ChangedBlocks::new(4));
        let mut scene = SceneGraph::new();
        let mut selection = Selection::default();
        let c = ChunkCoord::new(0, 0, 0);
        chunks.surrounding_chunks_check(c);
        chunks.tag_busy_block(1, 1, 1, 1);
        chunks.tag_busy_block(2, 1, 1, 2);
        assert!(!chunks.confirm_busy_block(1, 1, 1, 1));
        selection.target = Some(crate::world::BlockTarget {
            chunk: c,
            block: BlockPos::new(1, 1, 1),
        });

        let load = chunks.chunk_from_coords(c).map(|ch| ch.load()).unwrap();
        wm.stage(chunk_out(c));
        for x in [1, 2] {
            wm.stage(JobOut::BlockUpdated {
                coord: c,
                load,
                rev: 0,
                blocks: ChunkBlocks::new_air(&dims()),
                mesh: None,
                block: Some(BlockPos::new(x, 1, 1)),
            });
        }

        let mut ctx = TaskContext::new(&mut chunks, &mut scene, &mut selection);
        // one batch per tick
        wm.finish(Vec::new(), &mut ctx);
        assert!(ctx.chunks.is_ready());
        assert!(ctx.chunks.check_busy_block(1, 1, 1));
        wm.finish(Vec::new(), &mut ctx);
        assert!(!ctx.chunks.check_busy_block(1, 1, 1));
        // swapped before the authority answered
        wm.finish(Vec::new(), &mut ctx);
        assert!(ctx.chunks.check_busy_block(2, 1, 1));
        assert!(ctx.chunks.confirm_busy_block(2, 1, 1, 2));
        assert!(ctx.followups.is_empty());
        assert!(selection.target.is_none());
        assert_eq!(wm.pending_tasks(), 0);
    }
}
