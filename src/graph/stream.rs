//! Stream and side-packet specs.
//!
//! Node connections are written as `TAG:INDEX:NAME`, `TAG:NAME` or `NAME`.
//! TAG is upper-case letters, digits and underscores; NAME is lower-case
//! letters, digits and underscores; INDEX is a non-negative integer and is
//! only allowed together with a tag. Untagged entries are numbered by
//! position.

use crate::graph::error::{GraphError, GraphResult};
use std::fmt;
use std::str::FromStr;

/// One parsed `TAG:INDEX:NAME` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamSpec {
    pub tag: String,
    pub index: u32,
    pub name: String,
}

fn invalid(spec: &str, reason: impl Into<String>) -> GraphError {
    GraphError::InvalidStreamSpec {
        spec: spec.to_string(),
        reason: reason.into(),
    }
}

fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase() || c == '_')
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl StreamSpec {
    pub fn new(tag: impl Into<String>, index: u32, name: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            index,
            name: name.into(),
        }
    }

    /// Parse a single entry. Untagged entries get index 0; [`TagMap::parse`]
    /// renumbers them by position.
    pub fn parse(spec: &str) -> GraphResult<Self> {
        let parts: Vec<&str> = spec.split(':').collect();
        let (tag, index, name) = match parts.as_slice() {
            [name] => ("", 0, *name),
            [tag, name] => (*tag, 0, *name),
            [tag, index, name] => {
                let index = index
                    .parse::<u32>()
                    .map_err(|_| invalid(spec, format!("index '{}' is not a number", index)))?;
                (*tag, index, *name)
            }
            _ => return Err(invalid(spec, "too many ':' separators")),
        };

        if parts.len() > 1 && !is_valid_tag(tag) {
            return Err(invalid(
                spec,
                format!("tag '{}' must match [A-Z_][A-Z0-9_]*", tag),
            ));
        }
        if !is_valid_name(name) {
            return Err(invalid(
                spec,
                format!("name '{}' must match [a-z_][a-z0-9_]*", name),
            ));
        }

        Ok(Self::new(tag, index, name))
    }

    pub fn is_tagged(&self) -> bool {
        !self.tag.is_empty()
    }
}

impl FromStr for StreamSpec {
    type Err = GraphError;

    fn from_str(s: &str) -> GraphResult<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for StreamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}:{}", self.tag, self.index, self.name)
        }
    }
}

/// The ordered set of specs on one side of a node (its input streams, output
/// streams, input side packets or output side packets).
///
/// Port `i` of a node is entry `i` of its map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap {
    entries: Vec<StreamSpec>,
}

impl TagMap {
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> GraphResult<Self> {
        let mut entries: Vec<StreamSpec> = Vec::with_capacity(specs.len());
        let mut untagged = 0u32;

        for raw in specs {
            let raw = raw.as_ref();
            let mut spec = StreamSpec::parse(raw)?;
            if !spec.is_tagged() {
                spec.index = untagged;
                untagged += 1;
            }
            if entries
                .iter()
                .any(|e| e.tag == spec.tag && e.index == spec.index)
            {
                return Err(invalid(
                    raw,
                    format!("tag '{}' index {} used twice", spec.tag, spec.index),
                ));
            }
            entries.push(spec);
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, port: usize) -> Option<&StreamSpec> {
        self.entries.get(port)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamSpec> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Port index of `TAG:index`, if present.
    pub fn port(&self, tag: &str, index: u32) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.tag == tag && e.index == index)
    }

    /// Number of entries carrying `tag`.
    pub fn tag_count(&self, tag: &str) -> usize {
        self.entries.iter().filter(|e| e.tag == tag).count()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.tag.as_str())
    }
}
