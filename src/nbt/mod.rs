//! Named Binary Tag: the recursive, big-endian, self-describing tree format
//! Anvil chunk and region metadata is stored in.
//!
//! A tag is `(type_id, name, payload)`; `name` is only present on a COMPOUND's
//! direct children and on the root tag, never inside a LIST payload.

mod read;
mod write;

use indexmap::IndexMap;
use std::fmt;

/// COMPOUND's children, keyed by name, insertion order preserved.
///
/// Insertion order is load-bearing: §4.1 requires byte-for-byte round-trip of
/// untouched subtrees, which means child order must survive a parse/serialize
/// cycle unchanged.
pub type Compound = IndexMap<String, Tag>;

/// A homogeneously-typed LIST payload. The element type is kept even for an
/// empty list (which may legally carry element-type END) so re-serializing an
/// untouched empty list round-trips exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub element_type: u8,
    pub items: Vec<Tag>,
}

impl List {
    pub fn new(element_type: u8) -> Self {
        List {
            element_type,
            items: Vec::new(),
        }
    }

    pub fn of(items: Vec<Tag>) -> Self {
        let element_type = items.first().map_or(Tag::End.type_id(), Tag::type_id);
        List { element_type, items }
    }

    pub fn push(&mut self, tag: Tag) {
        if self.items.is_empty() {
            self.element_type = tag.type_id();
        }
        self.items.push(tag);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    End,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(List),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn type_id(&self) -> u8 {
        match self {
            Tag::End => 0,
            Tag::Byte(_) => 1,
            Tag::Short(_) => 2,
            Tag::Int(_) => 3,
            Tag::Long(_) => 4,
            Tag::Float(_) => 5,
            Tag::Double(_) => 6,
            Tag::ByteArray(_) => 7,
            Tag::String(_) => 8,
            Tag::List(_) => 9,
            Tag::Compound(_) => 10,
            Tag::IntArray(_) => 11,
            Tag::LongArray(_) => 12,
        }
    }

    pub fn as_byte(&self) -> Option<i8> {
        match self {
            Tag::Byte(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_short(&self) -> Option<i16> {
        match self {
            Tag::Short(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Tag::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Tag::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_byte_array(&self) -> Option<&[i8]> {
        match self {
            Tag::ByteArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_long_array(&self) -> Option<&[i64]> {
        match self {
            Tag::LongArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Tag::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Tag::Compound(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_compound_mut(&mut self) -> Option<&mut Compound> {
        match self {
            Tag::Compound(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_indented(self, f, 0)
    }
}

fn fmt_indented(tag: &Tag, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    match tag {
        Tag::Compound(children) => {
            writeln!(f, "{{")?;
            for (name, child) in children {
                write!(f, "{pad}  {name}: ")?;
                fmt_indented(child, f, depth + 1)?;
                writeln!(f)?;
            }
            write!(f, "{pad}}}")
        }
        Tag::List(list) => {
            writeln!(f, "[")?;
            for item in &list.items {
                write!(f, "{pad}  ")?;
                fmt_indented(item, f, depth + 1)?;
                writeln!(f)?;
            }
            write!(f, "{pad}]")
        }
        other => write!(f, "{other:?}"),
    }
}

/// A top-level named tag, e.g. the root `""`-or-`"Level"`-named COMPOUND of a
/// decompressed chunk payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Nbt {
    pub name: String,
    pub tag: Tag,
}

impl Nbt {
    pub fn new(name: impl Into<String>, tag: Tag) -> Self {
        Nbt {
            name: name.into(),
            tag,
        }
    }

    pub fn compound(&self) -> Option<&Compound> {
        self.tag.as_compound()
    }

    pub fn compound_mut(&mut self) -> Option<&mut Compound> {
        self.tag.as_compound_mut()
    }
}

/// Convenience typed accessors over a COMPOUND's children. `Compound` is a
/// plain `IndexMap`, so `get`/`contains_key`/`insert`/`shift_remove` already
/// cover §4.1's `get`/`has`/`add_child`/`remove`; this trait only adds the
/// typed unwrapping callers otherwise repeat at every call site.
pub trait CompoundExt {
    fn get_byte(&self, name: &str) -> Option<i8>;
    fn get_str(&self, name: &str) -> Option<&str>;
    fn get_long_array(&self, name: &str) -> Option<&[i64]>;
    fn get_byte_array(&self, name: &str) -> Option<&[i8]>;
    fn get_list(&self, name: &str) -> Option<&List>;
    fn get_compound(&self, name: &str) -> Option<&Compound>;
}

impl CompoundExt for Compound {
    fn get_byte(&self, name: &str) -> Option<i8> {
        self.get(name).and_then(Tag::as_byte)
    }
    fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Tag::as_str)
    }
    fn get_long_array(&self, name: &str) -> Option<&[i64]> {
        self.get(name).and_then(Tag::as_long_array)
    }
    fn get_byte_array(&self, name: &str) -> Option<&[i8]> {
        self.get(name).and_then(Tag::as_byte_array)
    }
    fn get_list(&self, name: &str) -> Option<&List> {
        self.get(name).and_then(Tag::as_list)
    }
    fn get_compound(&self, name: &str) -> Option<&Compound> {
        self.get(name).and_then(Tag::as_compound)
    }
}

/// `COMPOUND.to_dict()` per §4.1: stringifies each scalar child, used only for
/// BlockState properties (which are always STRING in source data).
pub fn compound_to_string_map(compound: &Compound) -> IndexMap<String, String> {
    compound
        .iter()
        .filter_map(|(k, v)| match v {
            Tag::String(s) => Some((k.clone(), s.clone())),
            Tag::Byte(n) => Some((k.clone(), n.to_string())),
            Tag::Short(n) => Some((k.clone(), n.to_string())),
            Tag::Int(n) => Some((k.clone(), n.to_string())),
            Tag::Long(n) => Some((k.clone(), n.to_string())),
            _ => None,
        })
        .collect()
}
