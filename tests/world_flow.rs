use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, unbounded};
use strata::net::Authority;
use strata::{
    AppConfig, AuthorityError, BlockEdit, BlockPos, BlockTarget, BlockType, LoopbackAuthority,
    Observer, Player, Scene, SceneGraph, Vec3, World, WorldData, WorldEvent,
};

const SETTLE: Duration = Duration::from_secs(20);

fn flat_config() -> AppConfig {
    AppConfig::from_toml_str(
        r#"
        [chunk]
        load_radius = 1
        [workers]
        count = 2
        [worldgen.height]
        min = 10
        max = 10
        [worldgen.water]
        enable = false
        [worldgen.caves]
        enable = false
        "#,
    )
    .unwrap()
}

fn open(data: WorldData) -> (World<SceneGraph, Player>, Arc<LoopbackAuthority>) {
    let authority = Arc::new(LoopbackAuthority::new());
    let feed = authority.subscribe(&data.id);
    let world = World::new(
        data,
        flat_config(),
        authority.clone(),
        feed,
        SceneGraph::new(),
        Player::new(Vec3::new(20.0, 500.0, 20.0)),
    );
    (world, authority)
}

/// A world whose player was placed before; streaming starts at once.
fn entered(id: &str) -> (World<SceneGraph, Player>, Arc<LoopbackAuthority>) {
    let mut data = WorldData::fresh(id, "abc");
    data.player_y = 500.0;
    let (mut world, authority) = open(data);
    world.init();
    assert!(world.settle(SETTLE));
    (world, authority)
}

fn target(x: i32, y: i32, z: i32) -> BlockTarget {
    let dims = AppConfig::default().dims();
    let b = BlockPos::new(x, y, z);
    BlockTarget {
        chunk: dims.block_to_chunk(b),
        block: dims.block_to_local(b),
    }
}

#[test]
fn fresh_world_spawns_above_highest_block() {
    let (mut world, _authority) = open(WorldData::fresh("spawn", "abc"));
    world.init();
    assert!(!world.is_ready());
    assert!(world.settle(SETTLE));

    assert!(world.is_ready());
    let p = world.observer().position();
    assert!((p.y - (10.0 + 1.6 + 1.0) * 40.0).abs() < 1e-3, "y = {}", p.y);
    assert_eq!((p.x, p.z), (20.0, 20.0));
    assert!(world.drain_events().contains(&WorldEvent::Ready));
    assert_eq!(world.chunk_manager().len(), 7);
    assert!(world.chunk_manager().is_ready());
    assert!(world.scene().get_by_name("0:0:0").is_some());
}

#[test]
fn placed_player_skips_spawn_probe() {
    let mut data = WorldData::fresh("placed", "abc");
    data.player_y = 500.0;
    let (mut world, _authority) = open(data);
    world.init();
    assert!(world.is_ready());
    assert_eq!(world.drain_events(), vec![WorldEvent::Ready]);
    assert_eq!(world.observer().position().y, 500.0);
}

#[test]
fn edge_break_mirrors_into_neighbor_and_releases_lock() {
    let (mut world, authority) = entered("edge");
    assert_eq!(world.get_voxel_by_voxel_coords(15, 10, 5), Some(BlockType::GRASS));

    world.set_target(Some(target(15, 10, 5)));
    world.break_block();
    assert!(world.chunk_manager().check_busy_block(15, 10, 5));
    // second request for the same block is dropped while the first is in flight
    world.break_block();
    assert!(world.settle(SETTLE));

    assert_eq!(authority.submissions(), 1);
    assert_eq!(world.get_voxel_by_voxel_coords(15, 10, 5), Some(BlockType::AIR));
    let neighbor = world
        .chunk_manager()
        .chunk_from_rep("1:0:0")
        .expect("neighbor loaded");
    assert_eq!(neighbor.get_block(-1, 10, 5), Some(BlockType::AIR));
    assert!(!world.chunk_manager().check_busy_block(15, 10, 5));
    assert!(world.selection().target.is_none());
    assert!(world
        .drain_events()
        .contains(&WorldEvent::BlockObtained(BlockType::GRASS)));
    assert_eq!(world.get_target_block_type(), BlockType::AIR);
}

/// Holds every reply until the test lets one through.
struct GatedAuthority {
    inner: Arc<LoopbackAuthority>,
    gate: Receiver<()>,
}

impl Authority for GatedAuthority {
    fn submit_block_edit(
        &self,
        world_id: &str,
        edit: BlockEdit,
    ) -> Result<BlockType, AuthorityError> {
        let _ = self.gate.recv();
        self.inner.submit_block_edit(world_id, edit)
    }
}

#[test]
fn lock_holds_until_own_edit_is_answered() {
    let inner = Arc::new(LoopbackAuthority::new());
    let (release, gate) = unbounded();
    let mut data = WorldData::fresh("gated", "abc");
    data.player_y = 500.0;
    let feed = inner.subscribe(&data.id);
    let authority = Arc::new(GatedAuthority {
        inner: inner.clone(),
        gate,
    });
    let mut world = World::new(
        data,
        flat_config(),
        authority,
        feed,
        SceneGraph::new(),
        Player::new(Vec3::new(20.0, 500.0, 20.0)),
    );
    world.init();
    assert!(world.settle(SETTLE));

    world.set_target(Some(target(4, 10, 4)));
    world.break_block();
    // another client breaks the same block; its echo lands before our reply
    let edit = BlockEdit::new(BlockPos::new(4, 10, 4), BlockType::AIR);
    assert_eq!(inner.submit_block_edit("gated", edit), Ok(BlockType::AIR));

    // the swap for that re-mesh clears the selection
    let deadline = Instant::now() + SETTLE;
    while world.selection().target.is_some() {
        assert!(Instant::now() < deadline, "re-mesh never swapped in");
        world.update_blocking(Duration::from_millis(10));
    }
    assert_eq!(world.get_voxel_by_voxel_coords(4, 10, 4), Some(BlockType::AIR));
    assert!(world.chunk_manager().check_busy_block(4, 10, 4));
    assert_eq!(world.stats().pending_edits, 1);

    world.set_target(Some(target(4, 10, 4)));
    world.break_block();
    assert_eq!(world.stats().pending_edits, 1);

    release.send(()).unwrap();
    assert!(world.settle(SETTLE));
    assert!(!world.chunk_manager().check_busy_block(4, 10, 4));
    assert_eq!(world.stats().pending_edits, 0);
    assert_eq!(inner.submissions(), 2);
    assert!(world
        .drain_events()
        .contains(&WorldEvent::BlockObtained(BlockType::GRASS)));
}

#[test]
fn place_reports_placed_type() {
    let (mut world, authority) = entered("place");
    world.set_potential(Some(target(3, 11, 3)));
    world.place_block(BlockType::WOOD);
    assert!(world.settle(SETTLE));

    assert_eq!(world.get_voxel_by_voxel_coords(3, 11, 3), Some(BlockType::WOOD));
    assert!(world.get_solidity_by_voxel_coords(3, 11, 3, false));
    assert!(world.get_passable_by_voxel_coords(3, 11, 3));
    assert!(world
        .drain_events()
        .contains(&WorldEvent::BlockPlaced(BlockType::WOOD)));
    assert_eq!(
        authority.edits_for("place"),
        vec![BlockEdit::new(BlockPos::new(3, 11, 3), BlockType::WOOD)]
    );
}

#[test]
fn failed_edit_releases_lock_and_keeps_block() {
    let (mut world, authority) = entered("offline");
    authority.set_offline(true);
    world.set_target(Some(target(4, 10, 4)));
    world.break_block();
    assert!(world.settle(SETTLE));

    assert!(!world.chunk_manager().check_busy_block(4, 10, 4));
    assert_eq!(world.get_voxel_by_voxel_coords(4, 10, 4), Some(BlockType::GRASS));
    let failed = world
        .drain_events()
        .into_iter()
        .any(|e| matches!(e, WorldEvent::EditFailed { pos, .. } if pos == BlockPos::new(4, 10, 4)));
    assert!(failed);

    authority.set_offline(false);
    world.break_block();
    assert!(world.settle(SETTLE));
    assert_eq!(authority.submissions(), 2);
    assert_eq!(world.get_voxel_by_voxel_coords(4, 10, 4), Some(BlockType::AIR));
}

#[test]
fn remote_edits_and_stored_overrides_apply() {
    let mut data = WorldData::fresh("shared", "abc");
    data.player_y = 500.0;
    data.changed_blocks
        .push(BlockEdit::new(BlockPos::new(2, 11, 2), BlockType::GLASS));
    let (mut world, authority) = open(data);
    world.init();
    assert!(world.settle(SETTLE));
    assert_eq!(world.get_voxel_by_voxel_coords(2, 11, 2), Some(BlockType::GLASS));

    // another client edits the same world
    let edit = BlockEdit::new(BlockPos::new(-1, 10, 0), BlockType::STONE);
    assert_eq!(authority.submit_block_edit("shared", edit), Ok(BlockType::STONE));
    assert!(world.settle(SETTLE));

    assert_eq!(world.get_voxel_by_voxel_coords(-1, 10, 0), Some(BlockType::STONE));
    let home = world.chunk_manager().chunk_from_rep("0:0:0").unwrap();
    assert_eq!(home.get_block(-1, 10, 0), Some(BlockType::STONE));
    let events = world.drain_events();
    assert!(!events.iter().any(|e| matches!(e, WorldEvent::BlockObtained(_))));
}

#[test]
fn walking_away_streams_new_chunks_and_evicts_old() {
    let (mut world, _authority) = entered("walk");
    assert!(world.scene().get_by_name("0:0:0").is_some());

    let far = Vec3::new(3.0 * 16.0 * 40.0 + 20.0, 500.0, 20.0);
    world.observer_mut().set_position(far);
    assert!(world.settle(SETTLE));

    let chunks = world.chunk_manager();
    assert!(chunks.chunk_from_rep("0:0:0").is_none());
    assert!(chunks.chunk_from_rep("3:0:0").is_some());
    assert_eq!(chunks.len(), 7);
    assert!(world.scene().get_by_name("0:0:0").is_none());
    assert!(world.scene().get_by_name("3:0:0").is_some());
}
