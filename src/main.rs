use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use strata::{
    AppConfig, BlockPos, BlockTarget, BlockType, LoopbackAuthority, Observer, Player, Scene,
    SceneGraph, Vec3, World, WorldData, WorldEvent, load_config_from_path,
};

#[derive(Parser, Debug)]
#[command(name = "strata", about = "Headless voxel world streaming demo")]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// World seed name.
    #[arg(long, default_value = "strata")]
    seed: String,
    /// Ticks to walk the observer along +X after spawning.
    #[arg(long, default_value_t = 120)]
    ticks: u32,
    /// Overrides `[chunk] load_radius`.
    #[arg(long)]
    radius: Option<i32>,
    /// Overrides `[workers] count`.
    #[arg(long)]
    workers: Option<usize>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match load_config_from_path(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::error!("failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => AppConfig::default(),
    };
    if let Some(r) = args.radius {
        config.chunk.load_radius = r;
    }
    if let Some(n) = args.workers {
        config.workers.count = n;
    }
    if let Err(e) = config.validate() {
        log::error!("invalid configuration: {}", e);
        std::process::exit(1);
    }

    let authority = Arc::new(LoopbackAuthority::new());
    let data = WorldData::fresh("demo", &args.seed);
    let feed = authority.subscribe(&data.id);
    let mut world = World::new(
        data,
        config,
        authority.clone(),
        feed,
        SceneGraph::new(),
        Player::default(),
    );

    world.init();
    if !world.settle(Duration::from_secs(30)) {
        log::warn!("initial load did not settle");
    }
    log::info!("spawned at {:?}: {:?}", world.observer().position(), world.stats());

    // dig out the block under the observer's feet, then put glass back
    let dims = *world.chunk_manager().dims();
    let feet = dims.world_to_block(world.observer().position());
    let top = (feet.y - 64..=feet.y).rev().find(|y| {
        world
            .get_voxel_by_voxel_coords(feet.x, *y, feet.z)
            .is_some_and(|t| t.is_solid())
    });
    if let Some(y) = top {
        let b = BlockPos::new(feet.x, y, feet.z);
        let target = BlockTarget {
            chunk: dims.block_to_chunk(b),
            block: dims.block_to_local(b),
        };
        world.set_target(Some(target));
        world.break_block();
        world.settle(Duration::from_secs(5));
        world.set_potential(Some(target));
        world.place_block(BlockType::GLASS);
        world.settle(Duration::from_secs(5));
    }

    let step = Vec3::new(dims.dimension / 4.0, 0.0, 0.0);
    for _ in 0..args.ticks {
        let p = world.observer().position();
        world.observer_mut().set_position(p + step);
        world.update_blocking(Duration::from_millis(4));
    }
    world.settle(Duration::from_secs(30));

    for event in world.drain_events() {
        match event {
            WorldEvent::Ready => log::info!("world ready"),
            WorldEvent::BlockObtained(t) => log::info!("obtained {}", t),
            WorldEvent::BlockPlaced(t) => log::info!("placed {}", t),
            WorldEvent::EditFailed { pos, error } => {
                log::warn!("edit at {} failed: {}", pos.rep(), error)
            }
        }
    }
    let (attaches, detaches) = world.scene().churn();
    log::info!(
        "done: {:?}, scene objects={} quads={} attach={} detach={}, authority edits={}",
        world.stats(),
        world.scene().len(),
        world.scene().quad_count(),
        attaches,
        detaches,
        authority.edits_for(world.id()).len()
    );
}
