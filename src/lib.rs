//! A storage engine for the Anvil on-disk world format: NBT codec,
//! palette-compressed bit-packed block arrays, and the region-file
//! sector/splice machinery that lets a single edited chunk be written back
//! without disturbing its neighbours.
//!
//! The public surface is `World` (component F), reached by opening a world
//! directory and routing absolute block coordinates down through
//! `Region` → `Chunk` → `ChunkSection` → `Block`.

pub mod bitpack;
pub mod block;
pub mod chunk;
pub mod coord;
pub mod error;
pub mod nbt;
pub mod region;
pub mod section;
pub mod world;

pub use block::{Block, BlockState};
pub use chunk::Chunk;
pub use coord::{BlockPos, ChunkPos, RegionPos};
pub use error::Error;
pub use region::Region;
pub use section::ChunkSection;
pub use world::{IntoBlockState, World};
