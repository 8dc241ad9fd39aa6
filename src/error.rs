use std::path::PathBuf;

/// Every fallible operation in this crate returns one of these.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("world directory not found: {0}")]
    WorldNotFound(PathBuf),

    #[error("region file missing for chunk ({cx}, {cz})")]
    RegionMissing { cx: i32, cz: i32 },

    #[error("chunk slot ({cx}, {cz}) has never been generated")]
    ChunkUnallocated { cx: i32, cz: i32 },

    #[error("chunk slot ({cx}, {cz}) cannot be written: never allocated on disk")]
    ChunkSlotUnallocated { cx: i32, cz: i32 },

    #[error("truncated NBT/region data: expected at least {expected} more bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("unknown NBT tag type id {0}")]
    UnknownTagType(u8),

    #[error("invalid UTF-8 in NBT string: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("unsupported chunk compression scheme byte {0}")]
    UnsupportedCompression(u8),

    #[error("bit-pack entry {value} out of range for width {width}")]
    OutOfRange { value: u64, width: u32 },

    #[error("bit-pack word count {found} is inconsistent with {expected} entries at width {width}")]
    CorruptLength {
        expected: usize,
        found: usize,
        width: u32,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
