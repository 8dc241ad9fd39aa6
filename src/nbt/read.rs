use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::{GzDecoder, ZlibDecoder};

use crate::error::Error;

use super::{Compound, List, Nbt, Tag};

fn read_exact(r: &mut impl Read, buf: &mut [u8]) -> Result<(), Error> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Truncated {
                expected: buf.len(),
                found: 0,
            }
        } else {
            Error::Io(e)
        }
    })
}

fn read_string(r: &mut impl Read) -> Result<String, Error> {
    let len = r.read_u16::<BigEndian>().map_err(eof_to_truncated(2))?;
    let mut buf = vec![0u8; len as usize];
    read_exact(r, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

fn eof_to_truncated(expected: usize) -> impl Fn(std::io::Error) -> Error {
    move |e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Truncated { expected, found: 0 }
        } else {
            Error::Io(e)
        }
    }
}

impl Nbt {
    /// Parses a byte buffer that is already raw (uncompressed) NBT: the
    /// normal entry point once a region's zlib payload has been inflated.
    pub fn parse(bytes: &[u8]) -> Result<Nbt, Error> {
        let mut cursor = bytes;
        Nbt::read_named(&mut cursor)
    }

    /// Convenience entry point for standalone `.nbt` fixtures that may be
    /// gzip- or zlib-wrapped, or already raw. Auto-detects the gzip magic
    /// (`0x1f 0x8b`); otherwise tries zlib and falls back to raw bytes.
    pub fn from_reader(bytes: &[u8]) -> Result<Nbt, Error> {
        if bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b {
            let mut decoded = Vec::new();
            GzDecoder::new(bytes).read_to_end(&mut decoded)?;
            return Nbt::parse(&decoded);
        }
        let mut decoded = Vec::new();
        match ZlibDecoder::new(bytes).read_to_end(&mut decoded) {
            Ok(_) => Nbt::parse(&decoded),
            Err(_) => Nbt::parse(bytes),
        }
    }

    fn read_named(r: &mut impl Read) -> Result<Nbt, Error> {
        let type_id = r.read_u8().map_err(eof_to_truncated(1))?;
        if type_id == 0 {
            return Ok(Nbt::new("", Tag::End));
        }
        let name = read_string(r)?;
        let tag = read_payload(type_id, r)?;
        Ok(Nbt::new(name, tag))
    }
}

fn read_payload(type_id: u8, r: &mut impl Read) -> Result<Tag, Error> {
    match type_id {
        0 => Ok(Tag::End),
        1 => Ok(Tag::Byte(r.read_i8().map_err(eof_to_truncated(1))?)),
        2 => Ok(Tag::Short(
            r.read_i16::<BigEndian>().map_err(eof_to_truncated(2))?,
        )),
        3 => Ok(Tag::Int(
            r.read_i32::<BigEndian>().map_err(eof_to_truncated(4))?,
        )),
        4 => Ok(Tag::Long(
            r.read_i64::<BigEndian>().map_err(eof_to_truncated(8))?,
        )),
        5 => Ok(Tag::Float(
            r.read_f32::<BigEndian>().map_err(eof_to_truncated(4))?,
        )),
        6 => Ok(Tag::Double(
            r.read_f64::<BigEndian>().map_err(eof_to_truncated(8))?,
        )),
        7 => {
            let len = r.read_i32::<BigEndian>().map_err(eof_to_truncated(4))?;
            let mut buf = vec![0u8; len.max(0) as usize];
            read_exact(r, &mut buf)?;
            Ok(Tag::ByteArray(buf.into_iter().map(|b| b as i8).collect()))
        }
        8 => Ok(Tag::String(read_string(r)?)),
        9 => {
            let element_type = r.read_u8().map_err(eof_to_truncated(1))?;
            let len = r.read_i32::<BigEndian>().map_err(eof_to_truncated(4))?;
            let mut items = Vec::with_capacity(len.max(0) as usize);
            for _ in 0..len.max(0) {
                items.push(read_payload(element_type, r)?);
            }
            Ok(Tag::List(List { element_type, items }))
        }
        10 => {
            let mut children = Compound::new();
            loop {
                let child_type = r.read_u8().map_err(eof_to_truncated(1))?;
                if child_type == 0 {
                    break;
                }
                let name = read_string(r)?;
                let tag = read_payload(child_type, r)?;
                children.insert(name, tag);
            }
            Ok(Tag::Compound(children))
        }
        11 => {
            let len = r.read_i32::<BigEndian>().map_err(eof_to_truncated(4))?;
            let mut items = Vec::with_capacity(len.max(0) as usize);
            for _ in 0..len.max(0) {
                items.push(r.read_i32::<BigEndian>().map_err(eof_to_truncated(4))?);
            }
            Ok(Tag::IntArray(items))
        }
        12 => {
            let len = r.read_i32::<BigEndian>().map_err(eof_to_truncated(4))?;
            let mut items = Vec::with_capacity(len.max(0) as usize);
            for _ in 0..len.max(0) {
                items.push(r.read_i64::<BigEndian>().map_err(eof_to_truncated(8))?);
            }
            Ok(Tag::LongArray(items))
        }
        other => Err(Error::UnknownTagType(other)),
    }
}
