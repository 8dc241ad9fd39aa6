//! `ChunkSection` (§4.3, component C): one 16×16×16 voxel cube, palette +
//! bit-packed indices + optional light nibble arrays.

use crate::bitpack;
use crate::block::{Block, BlockState};
use crate::error::Error;
use crate::nbt::{compound_to_string_map, Compound, CompoundExt, List, Tag};

pub const SECTION_VOLUME: usize = 16 * 16 * 16;

/// `blocks[x + z*16 + y*256]`.
pub fn block_index(x: i32, y: i32, z: i32) -> usize {
    (x + z * 16 + y * 256) as usize
}

pub struct ChunkSection {
    pub y_index: i8,
    pub blocks: Box<[Block; SECTION_VOLUME]>,
    pub raw_nbt: Compound,
    pub dirty: bool,
}

impl ChunkSection {
    /// A freshly-created section for a Y layer that did not previously
    /// exist: 4096 dirty air blocks and an empty COMPOUND (§4.4
    /// `get_section`).
    pub fn new_empty(y_index: i8) -> Self {
        ChunkSection {
            y_index,
            blocks: Box::new(std::array::from_fn(|_| Block::air())),
            raw_nbt: Compound::new(),
            dirty: true,
        }
    }

    /// Loads a section from its NBT COMPOUND (§4.3 "Load").
    pub fn from_nbt(nbt: Compound) -> Result<Self, Error> {
        let y_index = nbt.get_byte("Y").unwrap_or(0);

        let Some(block_states) = nbt.get_long_array("BlockStates") else {
            return Ok(ChunkSection {
                y_index,
                blocks: Box::new(std::array::from_fn(|_| Block::air())),
                raw_nbt: nbt,
                dirty: false,
            });
        };

        let width = (block_states.len() as u64 * 64 / SECTION_VOLUME as u64) as u32;
        let indices = bitpack::unpack(block_states, width, SECTION_VOLUME)?;

        let palette = load_palette(&nbt)?;
        let block_light = nbt.get_byte_array("BlockLight");
        let sky_light = nbt.get_byte_array("SkyLight");

        let mut blocks: Box<[Block; SECTION_VOLUME]> =
            Box::new(std::array::from_fn(|_| Block::air()));
        for (i, block) in blocks.iter_mut().enumerate() {
            let idx = indices[i] as usize;
            let state = palette
                .get(idx)
                .cloned()
                .unwrap_or_else(BlockState::air);
            block.state = state;
            block.block_light = nibble(block_light, i);
            block.sky_light = nibble(sky_light, i);
            block.dirty = false;
        }

        Ok(ChunkSection {
            y_index,
            blocks,
            raw_nbt: nbt,
            dirty: false,
        })
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn get(&self, x: i32, y: i32, z: i32) -> &Block {
        &self.blocks[block_index(x, y, z)]
    }

    /// Replaces the state at a local position and marks this section (and
    /// through the caller, its chunk and region) dirty.
    pub fn set_state(&mut self, x: i32, y: i32, z: i32, state: BlockState) {
        self.blocks[block_index(x, y, z)].set_state(state);
        self.dirty = true;
    }

    /// Serializes this section back to NBT (§4.3 "Save"). Rebuilds the
    /// palette and packed indices only if dirty; otherwise returns `raw_nbt`
    /// unchanged except for synthesising missing light arrays.
    pub fn serialize(&self) -> Compound {
        if !self.dirty {
            let mut nbt = self.raw_nbt.clone();
            synthesize_missing_light(&mut nbt);
            return nbt;
        }

        let mut palette: Vec<BlockState> = vec![BlockState::air()];
        for block in self.blocks.iter() {
            if !palette.contains(&block.state) {
                palette.push(block.state.clone());
            }
        }
        palette.sort_by(|a, b| a.name.cmp(&b.name));

        let indices: Vec<u32> = self
            .blocks
            .iter()
            .map(|b| palette.iter().position(|s| *s == b.state).unwrap() as u32)
            .collect();

        let width = bitpack::width_for_palette_len(palette.len());
        let packed = bitpack::pack(&indices, width).expect("palette indices fit width by construction");

        let mut nbt = self.raw_nbt.clone();
        nbt.insert("Y".into(), Tag::Byte(self.y_index));
        nbt.insert("Palette".into(), Tag::List(palette_to_list(&palette)));
        nbt.insert("BlockStates".into(), Tag::LongArray(packed));
        synthesize_missing_light(&mut nbt);
        nbt
    }
}

/// `BlockLight`/`SkyLight` byte `i` holds samples for voxels `2i` (low
/// nibble) and `2i+1` (high nibble).
fn nibble(array: Option<&[i8]>, voxel_index: usize) -> u8 {
    let Some(array) = array else { return 0 };
    let byte = array.get(voxel_index / 2).copied().unwrap_or(0) as u8;
    if voxel_index % 2 == 0 {
        byte & 0x0F
    } else {
        (byte >> 4) & 0x0F
    }
}

fn synthesize_missing_light(nbt: &mut Compound) {
    for key in ["BlockLight", "SkyLight"] {
        if !nbt.contains_key(key) {
            nbt.insert(key.into(), Tag::ByteArray(vec![-1i8; 2048]));
        }
    }
}

fn load_palette(nbt: &Compound) -> Result<Vec<BlockState>, Error> {
    let Some(list) = nbt.get_list("Palette") else {
        return Ok(vec![BlockState::air()]);
    };
    list.items
        .iter()
        .map(|tag| {
            let entry = tag.as_compound().ok_or(Error::UnknownTagType(tag.type_id()))?;
            let name = entry.get_str("Name").unwrap_or("minecraft:air").to_string();
            let props = entry
                .get_compound("Properties")
                .map(compound_to_string_map)
                .unwrap_or_default();
            Ok(BlockState::with_props(name, props))
        })
        .collect()
}

fn palette_to_list(palette: &[BlockState]) -> List {
    let items = palette
        .iter()
        .map(|state| {
            let mut entry = Compound::new();
            entry.insert("Name".into(), Tag::String(state.name.clone()));
            if !state.props.is_empty() {
                let mut props = Compound::new();
                for (k, v) in &state.props {
                    props.insert(k.clone(), Tag::String(v.clone()));
                }
                entry.insert("Properties".into(), Tag::Compound(props));
            }
            Tag::Compound(entry)
        })
        .collect();
    List::of(items)
}
