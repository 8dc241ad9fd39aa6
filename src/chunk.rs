//! `Chunk` (§4.4, component D): a 16×256×16 column — a sparse map of
//! Y-indexed sections plus the root NBT document they were parsed from.

use indexmap::IndexMap;

use crate::block::{Block, BlockState};
use crate::error::Error;
use crate::nbt::{Compound, CompoundExt, List, Nbt, Tag};
use crate::section::ChunkSection;

pub struct Chunk {
    pub cx: i32,
    pub cz: i32,
    pub sections: IndexMap<i8, ChunkSection>,
    pub raw_nbt: Nbt,
    pub orig_disk_len: u32,
    pub dirty: bool,
}

impl Chunk {
    /// Parses a decompressed chunk payload (§4.4 "Load"): reads
    /// `Level.xPos`/`Level.zPos`, builds one `ChunkSection` per entry of
    /// `Level.Sections`, and retains the full root document.
    pub fn from_nbt(raw_nbt: Nbt, orig_disk_len: u32) -> Result<Self, Error> {
        let level = raw_nbt
            .compound()
            .and_then(|c| c.get_compound("Level"))
            .ok_or(Error::Truncated {
                expected: 1,
                found: 0,
            })?;

        let cx = level.get("xPos").and_then(Tag::as_int).unwrap_or(0);
        let cz = level.get("zPos").and_then(Tag::as_int).unwrap_or(0);

        let mut sections = IndexMap::new();
        if let Some(list) = level.get_list("Sections") {
            for tag in &list.items {
                let Some(compound) = tag.as_compound() else {
                    continue;
                };
                let section = ChunkSection::from_nbt(compound.clone())?;
                sections.insert(section.y_index, section);
            }
        }

        Ok(Chunk {
            cx,
            cz,
            sections,
            raw_nbt,
            orig_disk_len,
            dirty: false,
        })
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the section containing `y`, creating and inserting a fresh
    /// all-air one (and marking this chunk dirty) if that Y layer did not
    /// previously exist (§4.4 `get_section`).
    pub fn get_section(&mut self, y: i32) -> &mut ChunkSection {
        let key = (y >> 4) as i8;
        if !self.sections.contains_key(&key) {
            self.sections.insert(key, ChunkSection::new_empty(key));
            self.dirty = true;
        }
        self.sections.get_mut(&key).expect("just inserted")
    }

    /// Reads the block at local chunk coordinates, routing through
    /// `get_section` exactly as `set_block` does (`pyanvil`'s
    /// `Chunk.get_block` does the same): a Y layer real Anvil data omits
    /// because it is entirely air is lazily materialised as one, rather than
    /// treated as missing.
    pub fn get_block(&mut self, x: i32, y: i32, z: i32) -> &Block {
        let (lx, ly, lz) = (x.rem_euclid(16), y.rem_euclid(16), z.rem_euclid(16));
        self.get_section(y).get(lx, ly, lz)
    }

    /// Sets the block at local chunk coordinates, creating the section on
    /// demand, and propagates dirty up to this chunk (§9).
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, state: BlockState) {
        let (lx, ly, lz) = (x.rem_euclid(16), y.rem_euclid(16), z.rem_euclid(16));
        let section = self.get_section(y);
        section.set_state(lx, ly, lz, state);
        self.dirty = true;
    }

    /// Substring match on state name over every materialised voxel in this
    /// chunk (§6 `chunk.find_like`). Returns absolute `(x, y, z)` alongside a
    /// clone of the matching block.
    pub fn find_like(&self, needle: &str) -> Vec<((i32, i32, i32), Block)> {
        let mut results = Vec::new();
        for (&y_index, section) in &self.sections {
            for ly in 0..16i32 {
                for lz in 0..16i32 {
                    for lx in 0..16i32 {
                        let block = section.get(lx, ly, lz);
                        if block.state.name.contains(needle) {
                            let abs = (
                                lx + self.cx * 16,
                                ly + i32::from(y_index) * 16,
                                lz + self.cz * 16,
                            );
                            results.push((abs, block.clone()));
                        }
                    }
                }
            }
        }
        results
    }

    /// Rebuilds `Level.Sections` from each section's serialized form and
    /// returns a fresh root document (§4.4 "Serialize"); the clone keeps
    /// `raw_nbt` untouched so a failed save never corrupts in-memory state.
    pub fn pack(&self) -> Nbt {
        let mut root = self.raw_nbt.clone();
        let items: Vec<Tag> = self
            .sections
            .values()
            .map(|s| Tag::Compound(s.serialize()))
            .collect();

        if let Some(level) = root.tag.as_compound_mut().and_then(|c| c.get_mut("Level")) {
            if let Some(level) = level.as_compound_mut() {
                level.insert("Sections".into(), Tag::List(List::of(items)));
            }
        }
        root
    }

    /// Serializes and zlib-compresses this chunk's payload (§4.4
    /// "Compress"), the blob written into a region file's sector payload.
    pub fn package_and_compress(&self) -> Vec<u8> {
        use std::io::Write;
        let bytes = self.pack().serialize();
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&bytes).expect("writing to an in-memory buffer cannot fail");
        encoder.finish().expect("writing to an in-memory buffer cannot fail")
    }
}

pub fn empty_level_compound(cx: i32, cz: i32) -> Nbt {
    let mut level = Compound::new();
    level.insert("xPos".into(), Tag::Int(cx));
    level.insert("zPos".into(), Tag::Int(cz));
    level.insert("Sections".into(), Tag::List(List::new(10)));
    let mut root = Compound::new();
    root.insert("Level".into(), Tag::Compound(level));
    Nbt::new("", Tag::Compound(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_with_one_stone_section(cx: i32, cz: i32) -> Chunk {
        let nbt = empty_level_compound(cx, cz);
        let mut chunk = Chunk::from_nbt(nbt, 0).unwrap();
        chunk.set_block(0, 0, 0, BlockState::new("minecraft:stone"));
        chunk
    }

    #[test]
    fn get_section_creates_missing_y_layer_dirty() {
        let nbt = empty_level_compound(0, 0);
        let mut chunk = Chunk::from_nbt(nbt, 0).unwrap();
        assert!(!chunk.is_dirty());
        let _ = chunk.get_section(80);
        assert!(chunk.is_dirty());
        assert!(chunk.sections.contains_key(&5));
    }

    /// Scenario 4: a new section is created at the correct Y, the target
    /// voxel holds the new state, and the other 4095 voxels are air.
    #[test]
    fn new_section_is_otherwise_all_air() {
        let nbt = empty_level_compound(0, 0);
        let mut chunk = Chunk::from_nbt(nbt, 0).unwrap();
        chunk.set_block(5, 80, 5, BlockState::new("minecraft:stone"));

        let section = &chunk.sections[&5];
        let air_count = section
            .blocks
            .iter()
            .filter(|b| b.state.is_air())
            .count();
        assert_eq!(air_count, 4095);
        assert_eq!(chunk.get_block(5, 80, 5).state.name, "minecraft:stone");
    }

    #[test]
    fn find_like_matches_substring_and_recovers_absolute_coord() {
        let mut chunk = chunk_with_one_stone_section(2, 3);
        let hits = chunk.find_like("stone");
        assert_eq!(hits.len(), 1);
        let ((x, y, z), block) = &hits[0];
        assert_eq!(block.state.name, "minecraft:stone");
        let (cx, cz) = (chunk.cx, chunk.cz);
        assert_eq!(chunk.get_block(*x - cx * 16, *y, *z - cz * 16).state.name, "minecraft:stone");
    }

    /// A Y layer real Anvil data omits because it is entirely air reads back
    /// as air rather than failing, mirroring `pyanvil`'s `get_block`.
    #[test]
    fn get_block_auto_vivifies_an_omitted_air_layer() {
        let nbt = empty_level_compound(0, 0);
        let mut chunk = Chunk::from_nbt(nbt, 0).unwrap();
        assert!(!chunk.sections.contains_key(&5));
        assert_eq!(chunk.get_block(0, 80, 0).state.name, "minecraft:air");
        assert!(chunk.sections.contains_key(&5));
    }

    #[test]
    fn pack_round_trips_through_compress_and_parse() {
        let chunk = chunk_with_one_stone_section(0, 0);
        let blob = chunk.package_and_compress();

        use std::io::Read;
        let mut decompressed = Vec::new();
        flate2::read::ZlibDecoder::new(&blob[..])
            .read_to_end(&mut decompressed)
            .unwrap();
        let parsed = Nbt::parse(&decompressed).unwrap();
        let mut reloaded = Chunk::from_nbt(parsed, blob.len() as u32).unwrap();
        assert_eq!(reloaded.get_block(0, 0, 0).state.name, "minecraft:stone");
    }
}
