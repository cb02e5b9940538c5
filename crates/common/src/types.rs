use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of an entity in the registry.
///
/// Packs a 32-bit slot index (low bits) and a 32-bit generation (high bits).
/// The generation is bumped every time a slot is recycled, so an id held past
/// the destruction of its entity no longer validates.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(u64);

impl Entity {
    /// The null entity. Never valid in any registry.
    pub const NULL: Self = Self(u64::MAX);

    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | index as u64)
    }

    /// Rebuild an entity from its raw encoded form.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw encoded form, as written into archives.
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("null")
        } else {
            write!(f, "{}:{}", self.index(), self.generation())
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({self})")
    }
}
