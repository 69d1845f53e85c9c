//! The three canonical artifact shapes
//!
//! Every artifact is one of:
//!
//! - **Table**: `{"columns": [...], "index": [...], "data": [[...], ...]}`, row-major
//! - **Keyed-scalar**: a JSON object from index label to a single value
//! - **Plain**: a bare JSON string or list of strings
//!
//! The shape is part of the artifact value itself (see [`Artifact`]) rather
//! than inferred from whatever type produced it, so the manifest can check it.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::errors::{ArtifactError, Result};

/// A single serialized cell or keyed value
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Missing or undefined value (also produced by non-finite floats)
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_none(),
            Scalar::Int(v) => serializer.serialize_i64(*v),
            Scalar::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            Scalar::Float(_) => serializer.serialize_none(),
            Scalar::Text(v) => serializer.serialize_str(v),
        }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<usize> for Scalar {
    fn from(value: usize) -> Self {
        Scalar::Int(value as i64)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

/// Row label of a table: an original row position or a name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexLabel {
    Position(u64),
    Name(String),
}

impl From<usize> for IndexLabel {
    fn from(value: usize) -> Self {
        IndexLabel::Position(value as u64)
    }
}

impl From<&str> for IndexLabel {
    fn from(value: &str) -> Self {
        IndexLabel::Name(value.to_string())
    }
}

impl From<String> for IndexLabel {
    fn from(value: String) -> Self {
        IndexLabel::Name(value)
    }
}

/// Row/column structured artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub index: Vec<IndexLabel>,
    pub data: Vec<Vec<Scalar>>,
}

impl Table {
    /// Build a table, checking that every row matches the column count and
    /// that there is one index label per row.
    pub fn new(columns: Vec<String>, index: Vec<IndexLabel>, data: Vec<Vec<Scalar>>) -> Result<Self> {
        if index.len() != data.len() {
            return Err(ArtifactError::InvalidTable(format!(
                "{} index labels for {} rows",
                index.len(),
                data.len()
            )));
        }

        if let Some((row, cells)) = data
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != columns.len())
        {
            return Err(ArtifactError::InvalidTable(format!(
                "row {} has {} cells, expected {}",
                row,
                cells.len(),
                columns.len()
            )));
        }

        Ok(Self {
            columns,
            index,
            data,
        })
    }

    pub fn row_count(&self) -> usize {
        self.data.len()
    }
}

/// Ordered mapping from index label to one value
///
/// Entry order is kept exactly as produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyedScalar {
    pub entries: Vec<(String, Scalar)>,
}

impl KeyedScalar {
    pub fn new(entries: Vec<(String, Scalar)>) -> Self {
        Self { entries }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for KeyedScalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for KeyedScalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = KeyedScalar;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object of scalar values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, Scalar>()? {
                    entries.push((key, value));
                }
                Ok(KeyedScalar { entries })
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Bare string or list with no row/column metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Plain {
    Text(String),
    List(Vec<String>),
}

/// Serialization shape of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Table,
    KeyedScalar,
    Plain,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Table => f.write_str("table"),
            Shape::KeyedScalar => f.write_str("keyed-scalar"),
            Shape::Plain => f.write_str("plain"),
        }
    }
}

/// A computed result tagged with its serialization shape
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Artifact {
    Table(Table),
    KeyedScalar(KeyedScalar),
    Plain(Plain),
}

impl Artifact {
    pub fn shape(&self) -> Shape {
        match self {
            Artifact::Table(_) => Shape::Table,
            Artifact::KeyedScalar(_) => Shape::KeyedScalar,
            Artifact::Plain(_) => Shape::Plain,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Artifact::Plain(Plain::Text(text.into()))
    }

    pub fn list(items: Vec<String>) -> Self {
        Artifact::Plain(Plain::List(items))
    }
}

impl From<Table> for Artifact {
    fn from(table: Table) -> Self {
        Artifact::Table(table)
    }
}

impl From<KeyedScalar> for Artifact {
    fn from(keyed: KeyedScalar) -> Self {
        Artifact::KeyedScalar(keyed)
    }
}

/// Conversion of a computed result into its artifact form
pub trait ToArtifact {
    fn to_artifact(&self) -> Result<Artifact>;
}
