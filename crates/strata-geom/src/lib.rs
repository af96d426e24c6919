//! Coordinate spaces shared by the engine crates: world, block and chunk.
#![forbid(unsafe_code)]

mod chunk_coord;
mod dims;

use core::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

pub use chunk_coord::ChunkCoord;
pub use dims::GridDims;

/// Canonical `"x:y:z"` key used for chunk names, block keys and scene objects.
#[inline]
pub fn rep(x: i32, y: i32, z: i32) -> String {
    format!("{x}:{y}:{z}")
}

/// Inverse of [`rep`]. Returns `None` for anything that is not three
/// colon-separated integers.
pub fn parse_rep(s: &str) -> Option<(i32, i32, i32)> {
    let mut it = s.split(':');
    let x = it.next()?.parse().ok()?;
    let y = it.next()?.parse().ok()?;
    let z = it.next()?.parse().ok()?;
    if it.next().is_some() {
        return None;
    }
    Some((x, y, z))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    #[inline]
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    #[inline]
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Absolute integer block coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn rep(self) -> String {
        rep(self.x, self.y, self.z)
    }
}

impl From<(i32, i32, i32)> for BlockPos {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

impl From<BlockPos> for (i32, i32, i32) {
    fn from(value: BlockPos) -> Self {
        (value.x, value.y, value.z)
    }
}

/// Loose float comparison used for sentinel checks on stored positions.
#[inline]
pub fn approx_equals(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}
