//! `BlockState` and `Block` (§3): the caller-facing voxel identity and the
//! per-voxel storage cell that tracks light and dirtiness.

use std::fmt;

use indexmap::IndexMap;

/// `(name, properties)` pair identifying a placeable voxel kind, e.g.
/// `("minecraft:oak_stairs", {"facing":"north","half":"bottom"})`. Equality
/// and hashing are by the full pair; `IndexMap`'s equality is order-independent,
/// while still preserving insertion order for NBT round-trip (§9).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockState {
    pub name: String,
    pub props: IndexMap<String, String>,
}

impl BlockState {
    pub fn new(name: impl Into<String>) -> Self {
        BlockState {
            name: name.into(),
            props: IndexMap::new(),
        }
    }

    pub fn with_props(name: impl Into<String>, props: IndexMap<String, String>) -> Self {
        BlockState {
            name: name.into(),
            props,
        }
    }

    pub fn air() -> Self {
        BlockState::new("minecraft:air")
    }

    pub fn is_air(&self) -> bool {
        self.name == "minecraft:air" && self.props.is_empty()
    }
}

impl Default for BlockState {
    fn default() -> Self {
        BlockState::air()
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.props.is_empty() {
            write!(f, "[")?;
            for (i, (k, v)) in self.props.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{k}={v}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// A single voxel's storage cell: its state plus the two 4-bit light nibbles
/// read from (or due to be written to) `BlockLight`/`SkyLight`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub state: BlockState,
    pub block_light: u8,
    pub sky_light: u8,
    pub dirty: bool,
}

impl Block {
    pub fn air() -> Self {
        Block {
            state: BlockState::air(),
            block_light: 0,
            sky_light: 0,
            dirty: true,
        }
    }

    /// Returns a clone of this block's state; mutating the clone never
    /// affects storage (I1).
    pub fn get_state(&self) -> BlockState {
        self.state.clone()
    }

    /// Replaces this block's state and marks it dirty. Upward propagation to
    /// the owning section/chunk/region happens in the caller (`Section`,
    /// `Chunk`), which holds the indices needed to mark its own dirty flag —
    /// see §9 "Cyclic parent references".
    pub fn set_state(&mut self, state: BlockState) {
        self.state = state;
        self.dirty = true;
    }
}

impl Default for Block {
    fn default() -> Self {
        Block::air()
    }
}
