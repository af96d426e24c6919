use serde::{Deserialize, Serialize};

/// 32-bit world seed folded from a world's string identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Seed(pub i32);

impl Seed {
    /// Rolling `h = h * 31 + unit` over UTF-16 code units, wrapped to `i32`.
    pub fn from_name(name: &str) -> Seed {
        let mut hash: i32 = 0;
        for unit in name.encode_utf16() {
            hash = hash.wrapping_mul(31).wrapping_add(i32::from(unit));
        }
        Seed(hash)
    }

    #[inline]
    pub fn value(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
