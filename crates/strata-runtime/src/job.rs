use std::sync::Arc;

use strata_geom::{BlockPos, ChunkCoord, GridDims};
use strata_chunk::{ChunkBlocks, ChunkMeshCPU, build_chunk_mesh, generate_chunk_blocks};
use strata_world::{ChangedBlocks, Seed, TerrainGenerator, WorldGenParams};

/// Command tag shared by a job and its result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cmd {
    Configure,
    GetHighest,
    GetChunk,
    UpdateBlock,
}

/// Target of a job for specific-queue de-duplication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub cmd: Cmd,
    pub target: Option<(i32, i32, i32)>,
}

/// A worker command. Payloads are owned snapshots; a job never refers back to
/// owning-thread state.
#[derive(Clone, Debug)]
pub enum Job {
    /// Pool-wide configuration, sent with `broadcast`.
    Configure {
        seed: Seed,
        params: WorldGenParams,
        dims: GridDims,
    },
    GetHighest {
        x: i32,
        z: i32,
        changes: ChangedBlocks,
    },
    /// Generate a chunk. `load` names the request so results for an evicted
    /// and re-requested chunk can be told apart.
    GetChunk {
        coord: ChunkCoord,
        load: u64,
        changes: ChangedBlocks,
    },
    /// Re-mesh a chunk whose block array changed. `block` is the edited
    /// block whose busy lock waits on this re-mesh.
    UpdateBlock {
        coord: ChunkCoord,
        load: u64,
        rev: u64,
        blocks: ChunkBlocks,
        block: Option<BlockPos>,
    },
}

impl Job {
    pub fn cmd(&self) -> Cmd {
        match self {
            Job::Configure { .. } => Cmd::Configure,
            Job::GetHighest { .. } => Cmd::GetHighest,
            Job::GetChunk { .. } => Cmd::GetChunk,
            Job::UpdateBlock { .. } => Cmd::UpdateBlock,
        }
    }

    pub fn key(&self) -> JobKey {
        let target = match self {
            Job::Configure { .. } => None,
            Job::GetHighest { x, z, .. } => Some((*x, 0, *z)),
            Job::GetChunk { coord, .. } | Job::UpdateBlock { coord, .. } => Some((*coord).into()),
        };
        JobKey {
            cmd: self.cmd(),
            target,
        }
    }
}

/// A finished job, echoing its command through the variant.
#[derive(Clone, Debug)]
pub enum JobOut {
    Highest {
        x: i32,
        z: i32,
        h: i32,
    },
    Chunk {
        coord: ChunkCoord,
        load: u64,
        blocks: ChunkBlocks,
        mesh: Option<ChunkMeshCPU>,
    },
    BlockUpdated {
        coord: ChunkCoord,
        load: u64,
        rev: u64,
        blocks: ChunkBlocks,
        mesh: Option<ChunkMeshCPU>,
        block: Option<BlockPos>,
    },
}

impl JobOut {
    pub fn cmd(&self) -> Cmd {
        match self {
            JobOut::Highest { .. } => Cmd::GetHighest,
            JobOut::Chunk { .. } => Cmd::GetChunk,
            JobOut::BlockUpdated { .. } => Cmd::UpdateBlock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    NotConfigured(Cmd),
    Panicked { cmd: Cmd, message: String },
    Failed { cmd: Cmd, message: String },
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::NotConfigured(cmd) => {
                write!(f, "{:?} received before the worker was configured", cmd)
            }
            JobError::Panicked { cmd, message } => write!(f, "{:?} panicked: {}", cmd, message),
            JobError::Failed { cmd, message } => write!(f, "{:?} failed: {}", cmd, message),
        }
    }
}

impl std::error::Error for JobError {}

/// Per-worker state. Only `Configure` mutates it.
#[derive(Default)]
pub struct WorkerCtx {
    pub index: usize,
    generator: Option<Arc<TerrainGenerator>>,
    dims: GridDims,
}

impl WorkerCtx {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }
}

/// Default job handler: generation, column height and re-meshing.
pub fn process_job(ctx: &mut WorkerCtx, job: Job) -> Result<Option<JobOut>, JobError> {
    let cmd = job.cmd();
    match job {
        Job::Configure { seed, params, dims } => {
            ctx.generator = Some(Arc::new(TerrainGenerator::new(seed, params)));
            ctx.dims = dims;
            log::debug!(target: "worker", "worker {} configured seed={}", ctx.index, seed);
            Ok(None)
        }
        Job::GetHighest { x, z, changes } => {
            let generator = ctx.generator.as_ref().ok_or(JobError::NotConfigured(cmd))?;
            let h = generator.highest_block(&changes, x, z);
            Ok(Some(JobOut::Highest { x, z, h }))
        }
        Job::GetChunk {
            coord,
            load,
            changes,
        } => {
            let generator = ctx.generator.as_ref().ok_or(JobError::NotConfigured(cmd))?;
            let blocks = generate_chunk_blocks(generator, &changes, coord, &ctx.dims);
            let mesh = build_chunk_mesh(&blocks, coord, &ctx.dims);
            Ok(Some(JobOut::Chunk {
                coord,
                load,
                blocks,
                mesh,
            }))
        }
        Job::UpdateBlock {
            coord,
            load,
            rev,
            blocks,
            block,
        } => {
            if blocks.chunk_size != ctx.dims.chunk_size
                || blocks.neighbor_width != ctx.dims.neighbor_width
            {
                return Err(JobError::Failed {
                    cmd,
                    message: format!(
                        "block array {}+{} does not match worker grid {}+{}",
                        blocks.chunk_size,
                        blocks.neighbor_width,
                        ctx.dims.chunk_size,
                        ctx.dims.neighbor_width
                    ),
                });
            }
            let mesh = build_chunk_mesh(&blocks, coord, &ctx.dims);
            Ok(Some(JobOut::BlockUpdated {
                coord,
                load,
                rev,
                blocks,
                mesh,
                block,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_blocks::BlockType;

    fn configured() -> WorkerCtx {
        let mut ctx = WorkerCtx::new(0);
        process_job(
            &mut ctx,
            Job::Configure {
                seed: Seed::from_name("abc"),
                params: WorldGenParams::flat(10),
                dims: GridDims::new(16, 1, 1.0),
            },
        )
        .unwrap();
        ctx
    }

    #[test]
    fn unconfigured_worker_rejects_generation() {
        let mut ctx = WorkerCtx::new(0);
        let err = process_job(
            &mut ctx,
            Job::GetHighest {
                x: 0,
                z: 0,
                changes: ChangedBlocks::new(16),
            },
        )
        .unwrap_err();
        assert_eq!(err, JobError::NotConfigured(Cmd::GetHighest));
    }

    #[test]
    fn highest_on_flat_world() {
        let mut ctx = configured();
        let out = process_job(
            &mut ctx,
            Job::GetHighest {
                x: 3,
                z: -4,
                changes: ChangedBlocks::new(16),
            },
        )
        .unwrap();
        assert!(matches!(out, Some(JobOut::Highest { x: 3, z: -4, h: 10 })));
    }

    #[test]
    fn update_block_echoes_load_block_and_rev() {
        let mut ctx = configured();
        let mut blocks = ChunkBlocks::new_air(&GridDims::new(16, 1, 1.0));
        blocks.set(1, 1, 1, BlockType::STONE);
        let coord = ChunkCoord::new(2, 0, 0);
        let out = process_job(
            &mut ctx,
            Job::UpdateBlock {
                coord,
                load: 3,
                rev: 7,
                blocks,
                block: Some(BlockPos::new(33, 1, 1)),
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(out.cmd(), Cmd::UpdateBlock);
        match out {
            JobOut::BlockUpdated {
                load,
                rev,
                block,
                mesh,
                ..
            } => {
                assert_eq!((load, rev), (3, 7));
                assert_eq!(block, Some(BlockPos::new(33, 1, 1)));
                assert_eq!(mesh.unwrap().name, "2:0:0");
            }
            other => panic!("unexpected {:?}", other.cmd()),
        }
    }

    #[test]
    fn keys_distinguish_targets() {
        let changes = ChangedBlocks::new(16);
        let a = Job::GetChunk {
            coord: ChunkCoord::new(0, 0, 0),
            load: 1,
            changes: changes.clone(),
        };
        let b = Job::GetChunk {
            coord: ChunkCoord::new(0, 0, 1),
            load: 2,
            changes,
        };
        assert_ne!(a.key(), b.key());
    }
}
