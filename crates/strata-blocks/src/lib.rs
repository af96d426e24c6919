//! Block type codes and their physical properties.
#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// A block type code. `0` is air; codes are stable across the wire and in the
/// changed-block overlay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockType(pub u16);

impl BlockType {
    pub const AIR: BlockType = BlockType(0);
    pub const STONE: BlockType = BlockType(1);
    pub const DIRT: BlockType = BlockType(2);
    pub const GRASS: BlockType = BlockType(3);
    pub const SAND: BlockType = BlockType(4);
    pub const WATER: BlockType = BlockType(5);
    pub const BEDROCK: BlockType = BlockType(6);
    pub const WOOD: BlockType = BlockType(7);
    pub const LEAVES: BlockType = BlockType(8);
    pub const GLASS: BlockType = BlockType(9);

    #[inline]
    pub const fn id(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn is_air(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_liquid(self) -> bool {
        self.0 == Self::WATER.0
    }

    /// Entities can move through this block.
    #[inline]
    pub const fn is_passable(self) -> bool {
        self.is_air() || self.is_liquid()
    }

    /// Occupies its cell for collision and column-height queries.
    #[inline]
    pub const fn is_solid(self) -> bool {
        !self.is_passable()
    }

    /// Neighbor faces stay visible through this block.
    #[inline]
    pub const fn is_transparent(self) -> bool {
        self.is_air() || self.is_liquid() || self.0 == Self::GLASS.0 || self.0 == Self::LEAVES.0
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "air",
            1 => "stone",
            2 => "dirt",
            3 => "grass",
            4 => "sand",
            5 => "water",
            6 => "bedrock",
            7 => "wood",
            8 => "leaves",
            9 => "glass",
            _ => "unknown",
        }
    }

    pub fn by_name(name: &str) -> Option<BlockType> {
        (0u16..=9)
            .map(BlockType)
            .find(|b| b.name() == name)
    }
}

impl From<u16> for BlockType {
    fn from(value: u16) -> Self {
        BlockType(value)
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}
