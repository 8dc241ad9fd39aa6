use byteorder::{BigEndian, WriteBytesExt};

use super::{Nbt, Tag};

impl Nbt {
    /// Serializes this named tag to raw (uncompressed) NBT bytes. Re-parsing
    /// the result with [`Nbt::parse`] yields a structurally equal tree,
    /// including COMPOUND child order (§4.1 P2).
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.tag.type_id());
        write_string(&mut out, &self.name);
        write_payload(&mut out, &self.tag);
        out
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.write_u16::<BigEndian>(s.len() as u16).unwrap();
    out.extend_from_slice(s.as_bytes());
}

fn write_payload(out: &mut Vec<u8>, tag: &Tag) {
    match tag {
        Tag::End => {}
        Tag::Byte(v) => out.write_i8(*v).unwrap(),
        Tag::Short(v) => out.write_i16::<BigEndian>(*v).unwrap(),
        Tag::Int(v) => out.write_i32::<BigEndian>(*v).unwrap(),
        Tag::Long(v) => out.write_i64::<BigEndian>(*v).unwrap(),
        Tag::Float(v) => out.write_f32::<BigEndian>(*v).unwrap(),
        Tag::Double(v) => out.write_f64::<BigEndian>(*v).unwrap(),
        Tag::ByteArray(items) => {
            out.write_i32::<BigEndian>(items.len() as i32).unwrap();
            out.extend(items.iter().map(|b| *b as u8));
        }
        Tag::String(s) => write_string(out, s),
        Tag::List(list) => {
            out.push(list.element_type);
            out.write_i32::<BigEndian>(list.items.len() as i32).unwrap();
            for item in &list.items {
                write_payload(out, item);
            }
        }
        Tag::Compound(children) => {
            for (name, child) in children {
                out.push(child.type_id());
                write_string(out, name);
                write_payload(out, child);
            }
            out.push(0);
        }
        Tag::IntArray(items) => {
            out.write_i32::<BigEndian>(items.len() as i32).unwrap();
            for v in items {
                out.write_i32::<BigEndian>(*v).unwrap();
            }
        }
        Tag::LongArray(items) => {
            out.write_i32::<BigEndian>(items.len() as i32).unwrap();
            for v in items {
                out.write_i64::<BigEndian>(*v).unwrap();
            }
        }
    }
}
