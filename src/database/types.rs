use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
    fmt,
};

use num_enum::TryFromPrimitive;
use serde::{ser::SerializeSeq, Serialize, Serializer};

/// Declared type of a record, as stored in its type byte.
///
/// The packed container encodings (`ZipmapHash`, `ZiplistList`, ...) decode
/// into the same [`Value`] variants as their plain counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ValueType {
    String = 0,
    List = 1,
    Set = 2,
    SortedSet = 3,
    Hash = 4,
    ZipmapHash = 9,
    ZiplistList = 10,
    Intset = 11,
    ZiplistSortedSet = 12,
    ZiplistHash = 13,
}

/// A decoded value.
///
/// Strings are kept as raw bytes; integer-encoded strings are rendered to their
/// decimal text before they get here.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A binary-safe string.
    Str(Vec<u8>),
    /// Ordered list elements.
    List(Vec<Vec<u8>>),
    /// Unique members, no defined order.
    Set(HashSet<Vec<u8>>),
    /// `(score, member)` pairs ordered by score ascending. Equal scores keep
    /// the order in which they appeared in the dump.
    SortedSet(Vec<(f64, Vec<u8>)>),
    /// Field to value mapping.
    Hash(HashMap<Vec<u8>, Vec<u8>>),
}

/// One key/value unit read from a dump.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Record key.
    #[serde(serialize_with = "serialize_lossy")]
    pub key: Vec<u8>,
    /// Decoded value; the variant always agrees with `value_type`.
    pub value: Value,
    /// Type byte the value was stored with.
    pub value_type: ValueType,
    /// Expiry as seconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<u64>,
    /// Database selected when the record was read.
    pub db: u64,
}

////////////////////////////////////////////////////////////////////////////////
// ValueType
////////////////////////////////////////////////////////////////////////////////

impl ValueType {
    /// Name of the logical type, independent of the on-disk encoding.
    pub fn logical_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::List | Self::ZiplistList => "list",
            Self::Set | Self::Intset => "set",
            Self::SortedSet | Self::ZiplistSortedSet => "zset",
            Self::Hash | Self::ZipmapHash | Self::ZiplistHash => "hash",
        }
    }

    /// Name of the on-disk encoding.
    pub fn encoding_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::List => "list",
            Self::Set => "set",
            Self::SortedSet => "zset",
            Self::Hash => "hash",
            Self::ZipmapHash => "zipmap",
            Self::ZiplistList | Self::ZiplistHash => "ziplist",
            Self::Intset => "intset",
            Self::ZiplistSortedSet => "ziplist zset",
        }
    }

    /// Whether the decoder can materialize values of this type.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Intset | Self::ZiplistSortedSet)
    }

    /// Checks that `value` is the variant this type decodes into.
    pub fn matches(
        &self,
        value: &Value,
    ) -> bool {
        self.logical_name() == value.type_name()
    }
}

impl fmt::Display for ValueType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.encoding_name())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Value
////////////////////////////////////////////////////////////////////////////////

impl Value {
    /// Logical type name of the value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::SortedSet(_) => "zset",
            Value::Hash(_) => "hash",
        }
    }

    /// Number of elements: 1 for strings, the element count otherwise.
    pub fn len(&self) -> usize {
        match self {
            Value::Str(_) => 1,
            Value::List(items) => items.len(),
            Value::Set(items) => items.len(),
            Value::SortedSet(items) => items.len(),
            Value::Hash(map) => map.len(),
        }
    }

    /// True for empty collections. A string is never empty in this sense.
    pub fn is_empty(&self) -> bool {
        !matches!(self, Value::Str(_)) && self.len() == 0
    }

    pub fn as_str(&self) -> Option<&[u8]> {
        match self {
            Value::Str(b) => Some(b),
            _ => None,
        }
    }
}

// Byte strings are written out as (lossy) UTF-8 text. Sets and hashes are
// sorted so that the output is stable between runs.
impl Serialize for Value {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match self {
            Value::Str(b) => serializer.serialize_str(&String::from_utf8_lossy(b)),
            Value::List(items) => serializer.collect_seq(items.iter().map(|i| lossy(i))),
            Value::Set(items) => {
                let mut members: Vec<_> = items.iter().collect();
                members.sort();
                serializer.collect_seq(members.into_iter().map(|m| lossy(m)))
            }
            Value::SortedSet(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for (score, member) in items {
                    seq.serialize_element(&(lossy(member), score))?;
                }
                seq.end()
            }
            Value::Hash(map) => {
                let mut fields: Vec<_> = map.iter().collect();
                fields.sort();
                serializer.collect_map(fields.into_iter().map(|(k, v)| (lossy(k), lossy(v))))
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Record
////////////////////////////////////////////////////////////////////////////////

impl Record {
    /// Key as text, replacing invalid UTF-8 sequences.
    pub fn key_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.key)
    }

    pub fn has_expiry(&self) -> bool {
        self.expire_at.is_some()
    }
}

fn lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

fn serialize_lossy<S: Serializer>(
    bytes: &[u8],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}
