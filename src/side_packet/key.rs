//! Side-packet keys and subgraph namespacing.

use std::borrow::Borrow;
use std::fmt;

/// Separator between a subgraph name and the side-packet name inside it.
pub const SUBGRAPH_SEPARATOR: &str = "__";

/// A side-packet name, optionally addressed into a subgraph as
/// `<subgraph>__<name>`.
///
/// Keys are not validated: a misspelled subgraph prefix is accepted here and
/// only fails when the engine resolves side packets at start.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SidePacketKey(String);

impl SidePacketKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build the key that routes `name` into `subgraph`'s namespace.
    pub fn in_subgraph(subgraph: &str, name: &str) -> Self {
        Self(format!("{}{}{}", subgraph, SUBGRAPH_SEPARATOR, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The subgraph this key is addressed to, if any. Only the first
    /// separator splits, so `a__b__c` belongs to subgraph `a`.
    pub fn subgraph(&self) -> Option<&str> {
        self.split().map(|(subgraph, _)| subgraph)
    }

    /// The name inside the addressed namespace.
    pub fn local_name(&self) -> &str {
        match self.split() {
            Some((_, name)) => name,
            None => &self.0,
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.split().is_none()
    }

    fn split(&self) -> Option<(&str, &str)> {
        self.0
            .split_once(SUBGRAPH_SEPARATOR)
            .filter(|(subgraph, name)| !subgraph.is_empty() && !name.is_empty())
    }
}

impl fmt::Debug for SidePacketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SidePacketKey({:?})", self.0)
    }
}

impl fmt::Display for SidePacketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SidePacketKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SidePacketKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for SidePacketKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
