//! `Region` (§4.5, component E): one `.mca` file — a 1024-slot
//! sector-allocated container of compressed chunks, with read-through
//! caching and incremental splice-and-shift save.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::chunk::Chunk;
use crate::coord::{ChunkPos, RegionPos};
use crate::error::Error;
use crate::nbt::Nbt;

pub const SECTOR_SIZE: u64 = 4096;
pub const HEADER_LEN: u64 = 8192;
const SLOT_COUNT: usize = 1024;
const ZLIB_SCHEME: u8 = 2;
const GZIP_SCHEME: u8 = 1;

/// One header slot's (byte offset, byte length) pair. Both zero means "never
/// generated" (I3/§4.5 "An entry with offset = 0 and sector_count = 0").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Location {
    offset: u32,
    len: u32,
}

impl Location {
    fn is_empty(self) -> bool {
        self.offset == 0 && self.len == 0
    }
}

pub struct Region {
    path: PathBuf,
    pos: RegionPos,
    file: Option<File>,
    locations: Vec<Location>,
    timestamps: Vec<u32>,
    chunks: BTreeMap<usize, Chunk>,
    dirty: bool,
}

impl Region {
    /// Opens (or lazily prepares to open) the region file at `path` and
    /// reads its 8192-byte header (§4.5 "Read path"). `pos` identifies this
    /// region's own coordinates, used only to report absolute chunk
    /// coordinates in error messages.
    pub fn open(path: impl Into<PathBuf>, pos: RegionPos) -> Result<Self, Error> {
        let path = path.into();
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut header = vec![0u8; HEADER_LEN as usize];
        file.read_exact(&mut header)?;

        let mut locations = Vec::with_capacity(SLOT_COUNT);
        for slot in 0..SLOT_COUNT {
            let base = slot * 4;
            let offset_sectors = u32::from(header[base]) << 16
                | u32::from(header[base + 1]) << 8
                | u32::from(header[base + 2]);
            let sector_count = u32::from(header[base + 3]);
            locations.push(Location {
                offset: offset_sectors * SECTOR_SIZE as u32,
                len: sector_count * SECTOR_SIZE as u32,
            });
        }

        let mut timestamps = Vec::with_capacity(SLOT_COUNT);
        for slot in 0..SLOT_COUNT {
            let base = (4 * 1024) + slot * 4;
            timestamps.push(u32::from_be_bytes(header[base..base + 4].try_into().unwrap()));
        }

        tracing::debug!(path = %path.display(), "opened region file");

        Ok(Region {
            path,
            pos,
            file: Some(file),
            locations,
            timestamps,
            chunks: BTreeMap::new(),
            dirty: false,
        })
    }

    /// Recovers the absolute chunk coordinates of a region-local slot index,
    /// for error reporting.
    fn chunk_coords_of(&self, index: usize) -> (i32, i32) {
        let lx = (index % 32) as i32;
        let lz = (index / 32) as i32;
        (self.pos.rx * 32 + lx, self.pos.rz * 32 + lz)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn file_mut(&mut self) -> Result<&mut File, Error> {
        if self.file.is_none() {
            self.file = Some(OpenOptions::new().read(true).write(true).open(&self.path)?);
        }
        Ok(self.file.as_mut().expect("just ensured open"))
    }

    /// Returns the chunk at this region's local index, reading it from disk
    /// on first access and caching it thereafter (§4.5 "Read path").
    pub fn get_chunk(&mut self, index: usize) -> Result<&mut Chunk, Error> {
        if !self.chunks.contains_key(&index) {
            let chunk = self.load_chunk(index)?;
            self.chunks.insert(index, chunk);
        }
        Ok(self.chunks.get_mut(&index).expect("just inserted"))
    }

    pub fn has_chunk(&self, index: usize) -> bool {
        !self.locations[index].is_empty()
    }

    fn load_chunk(&mut self, index: usize) -> Result<Chunk, Error> {
        if !self.has_chunk(index) {
            let (cx, cz) = self.chunk_coords_of(index);
            return Err(Error::ChunkUnallocated { cx, cz });
        }
        let loc = self.locations[index];

        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(u64::from(loc.offset)))?;
        let data_len = file.read_u32::<BigEndian>()?;
        let scheme = file.read_u8()?;
        let mut compressed = vec![0u8; (data_len - 1) as usize];
        file.read_exact(&mut compressed)?;

        let mut decompressed = Vec::new();
        match scheme {
            ZLIB_SCHEME => {
                flate2::read::ZlibDecoder::new(&compressed[..]).read_to_end(&mut decompressed)?;
            }
            GZIP_SCHEME => {
                return Err(Error::UnsupportedCompression(GZIP_SCHEME));
            }
            other => return Err(Error::UnsupportedCompression(other)),
        }

        let nbt = Nbt::parse(&decompressed)?;
        Chunk::from_nbt(nbt, data_len)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Rewrites every dirty chunk's payload in place, shifting later chunks'
    /// offsets by the size delta, then rewrites the whole file from byte 0
    /// (§4.5 "Write path — incremental rewrite").
    pub fn save(&mut self) -> Result<(), Error> {
        if !self.dirty {
            return Ok(());
        }

        let dirty_indices: Vec<usize> = self
            .chunks
            .iter()
            .filter(|(_, c)| c.is_dirty())
            .map(|(&i, _)| i)
            .collect();

        if dirty_indices.is_empty() {
            self.dirty = false;
            return Ok(());
        }

        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(HEADER_LEN))?;
        let mut body = Vec::new();
        file.read_to_end(&mut body)?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);

        // Build every dirty chunk's slot and the resulting header entries
        // against local copies first. Nothing on `self` is mutated until
        // every chunk has succeeded and the rewritten body/header have
        // actually reached disk, so a mid-loop error (e.g.
        // `ChunkSlotUnallocated`) or a failed `rewrite_file` leaves `self`
        // exactly as it was before this call: a retried `save()` recomputes
        // `dirty_indices` from the same still-dirty chunks and re-reads the
        // untouched on-disk body, instead of working from a header that was
        // already partially shifted in memory but never written out.
        let mut locations = self.locations.clone();
        let mut timestamps = self.timestamps.clone();

        for &index in &dirty_indices {
            let blob = self.chunks[&index].package_and_compress();
            let data_len = blob.len() as u32;
            let sector_len = (((data_len + 5) as u64).div_ceil(SECTOR_SIZE) * SECTOR_SIZE) as u32;

            let mut slot = Vec::with_capacity(sector_len as usize);
            slot.write_u32::<BigEndian>(data_len + 1)?;
            slot.write_u8(ZLIB_SCHEME)?;
            slot.extend_from_slice(&blob);
            slot.resize(sector_len as usize, 0);

            let old = locations[index];
            if old.is_empty() {
                let (cx, cz) = self.chunk_coords_of(index);
                return Err(Error::ChunkSlotUnallocated { cx, cz });
            }

            let delta = sector_len as i64 - old.len as i64;
            let start = (old.offset as u64 - HEADER_LEN) as usize;
            let end = start + old.len as usize;
            body.splice(start..end, slot);

            locations[index].len = sector_len;
            for other in locations.iter_mut() {
                if other.offset > old.offset {
                    other.offset = (other.offset as i64 + delta) as u32;
                }
            }

            timestamps[index] = now;
        }

        self.rewrite_file(&locations, &timestamps, &body)?;

        self.locations = locations;
        self.timestamps = timestamps;
        for index in dirty_indices {
            self.chunks
                .get_mut(&index)
                .expect("dirty index came from this map")
                .dirty = false;
        }
        self.dirty = false;
        Ok(())
    }

    /// Writes `locations`/`timestamps` as the 8192-byte header and `body` as
    /// the sector-aligned payload region, from byte 0. Takes the header
    /// contents as parameters rather than reading `self.locations`/
    /// `self.timestamps` so that [`Region::save`] can build the post-save
    /// header entirely in local variables and commit them to `self` only
    /// after this write actually succeeds.
    fn rewrite_file(&mut self, locations: &[Location], timestamps: &[u32], body: &[u8]) -> Result<(), Error> {
        let mut header = Vec::with_capacity(HEADER_LEN as usize);
        for loc in locations {
            let sectors_offset = loc.offset / SECTOR_SIZE as u32;
            header.push((sectors_offset >> 16) as u8);
            header.push((sectors_offset >> 8) as u8);
            header.push(sectors_offset as u8);
            header.push((loc.len / SECTOR_SIZE as u32) as u8);
        }
        for &ts in timestamps {
            header.write_u32::<BigEndian>(ts)?;
        }

        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header)?;
        file.write_all(body)?;

        let total_len = HEADER_LEN + body.len() as u64;
        let padding = (total_len.div_ceil(SECTOR_SIZE) * SECTOR_SIZE) - total_len;
        file.write_all(&vec![0u8; padding as usize])?;
        file.set_len(HEADER_LEN + body.len() as u64 + padding)?;

        tracing::debug!(path = %self.path.display(), "region saved");
        Ok(())
    }

    pub fn close(&mut self) {
        self.file = None;
    }
}

/// Creates a region file at `path` with an empty 8192-byte header, the
/// fixture most unit tests and `World::get_or_create_region` start from.
pub fn create_empty_region(path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(&vec![0u8; HEADER_LEN as usize])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::empty_level_compound;
    use std::io::Write as _;

    fn region_with_one_chunk(dir: &Path, cx: i32, cz: i32) -> (PathBuf, usize) {
        let path = dir.join("r.0.0.mca");
        create_empty_region(&path).unwrap();

        let chunk = Chunk::from_nbt(empty_level_compound(cx, cz), 0).unwrap();
        let blob = chunk.package_and_compress();
        let data_len = blob.len() as u32;
        let sector_len = (((data_len + 5) as u64).div_ceil(SECTOR_SIZE) * SECTOR_SIZE) as u32;

        let mut slot = Vec::new();
        slot.write_u32::<BigEndian>(data_len + 1).unwrap();
        slot.write_u8(ZLIB_SCHEME).unwrap();
        slot.extend_from_slice(&blob);
        slot.resize(sector_len as usize, 0);

        let index = ChunkPos::new(cx, cz).region_local_index();
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut header = vec![0u8; HEADER_LEN as usize];
        let sectors_offset = 2u32; // right after the header
        let base = index * 4;
        header[base] = (sectors_offset >> 16) as u8;
        header[base + 1] = (sectors_offset >> 8) as u8;
        header[base + 2] = sectors_offset as u8;
        header[base + 3] = (sector_len / SECTOR_SIZE as u32) as u8;
        file.write_all(&header).unwrap();
        file.write_all(&slot).unwrap();

        (path, index)
    }

    #[test]
    fn reads_back_a_chunk_written_by_the_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let (path, index) = region_with_one_chunk(dir.path(), 3, 7);

        let mut region = Region::open(&path, RegionPos::new(0, 0)).unwrap();
        let chunk = region.get_chunk(index).unwrap();
        assert_eq!(chunk.cx, 3);
        assert_eq!(chunk.cz, 7);
    }

    #[test]
    fn missing_slot_is_chunk_unallocated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.0.0.mca");
        create_empty_region(&path).unwrap();

        let mut region = Region::open(&path, RegionPos::new(0, 0)).unwrap();
        let err = region.get_chunk(0).unwrap_err();
        assert!(matches!(err, Error::ChunkUnallocated { .. }));
    }

    /// Scenario 6 (shrink direction, deterministic without depending on
    /// exact zlib output size): slot 0 is artificially over-allocated at 2
    /// sectors; after save(), its real (tiny) payload needs only 1 sector,
    /// so slot 1's offset must shift down by exactly one sector, and slot 1
    /// must still read back correctly afterward.
    #[test]
    fn sector_shrink_shifts_later_chunk_offset_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.0.0.mca");
        create_empty_region(&path).unwrap();

        let chunk_a = Chunk::from_nbt(empty_level_compound(0, 0), 0).unwrap();
        let chunk_b = Chunk::from_nbt(empty_level_compound(1, 0), 0).unwrap();

        let slot0_len = 2 * SECTOR_SIZE as u32;
        let slot1_len = SECTOR_SIZE as u32;
        let body = vec![0u8; (slot0_len + slot1_len) as usize];

        {
            let mut region = Region::open(&path, RegionPos::new(0, 0)).unwrap();
            region.locations[0] = Location {
                offset: HEADER_LEN as u32,
                len: slot0_len,
            };
            region.locations[1] = Location {
                offset: HEADER_LEN as u32 + slot0_len,
                len: slot1_len,
            };
            let locations = region.locations.clone();
            let timestamps = region.timestamps.clone();
            region.rewrite_file(&locations, &timestamps, &body).unwrap();

            region.chunks.insert(0, chunk_a);
            region.chunks.get_mut(&0).unwrap().dirty = true;
            region.chunks.insert(1, chunk_b);
            region.chunks.get_mut(&1).unwrap().dirty = true;
            region.dirty = true;
            region.save().unwrap();

            assert_eq!(region.locations[0].len, SECTOR_SIZE as u32);
            assert_eq!(region.locations[1].offset, HEADER_LEN as u32 + SECTOR_SIZE as u32);
        }

        let mut region = Region::open(&path, RegionPos::new(0, 0)).unwrap();
        assert_eq!(region.locations[1].offset, HEADER_LEN as u32 + SECTOR_SIZE as u32);
        let reread = region.get_chunk(1).unwrap();
        assert_eq!(reread.cx, 1);
    }
}
