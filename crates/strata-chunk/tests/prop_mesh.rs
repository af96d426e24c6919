use proptest::prelude::*;
use strata_blocks::BlockType;
use strata_chunk::{ChunkBlocks, build_chunk_mesh};
use strata_geom::{ChunkCoord, GridDims};

const CS: i32 = 6;

fn exposed_faces(b: &ChunkBlocks) -> usize {
    let mut n = 0;
    for y in 0..CS {
        for z in 0..CS {
            for x in 0..CS {
                if b.get(x, y, z) != Some(BlockType::STONE) {
                    continue;
                }
                for (dx, dy, dz) in [(1, 0, 0), (-1, 0, 0), (0, 1, 0), (0, -1, 0), (0, 0, 1), (0, 0, -1)] {
                    if b.get(x + dx, y + dy, z + dz) != Some(BlockType::STONE) {
                        n += 1;
                    }
                }
            }
        }
    }
    n
}

proptest! {
    #[test]
    fn quads_equal_exposed_stone_faces(
        cells in prop::collection::vec((-1..CS + 1, -1..CS + 1, -1..CS + 1), 0..80)
    ) {
        let dims = GridDims::new(CS, 1, 1.0);
        let mut b = ChunkBlocks::new_air(&dims);
        for (x, y, z) in cells {
            b.set(x, y, z, BlockType::STONE);
        }
        let expected = exposed_faces(&b);
        let quads = build_chunk_mesh(&b, ChunkCoord::new(0, 0, 0), &dims)
            .map(|m| m.quad_count())
            .unwrap_or(0);
        prop_assert_eq!(quads, expected);
    }
}
