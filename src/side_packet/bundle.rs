//! Side-packet bundle and its builder.

use crate::side_packet::key::SidePacketKey;
use crate::side_packet::value::SidePacketValue;
use std::collections::HashMap;

/// Accumulates side-packet entries before they are handed to a graph.
///
/// Duplicate keys are not an error: the last `put` wins and the overwrite is
/// logged at debug level.
#[derive(Debug, Default)]
pub struct SidePacketBundleBuilder {
    entries: HashMap<SidePacketKey, SidePacketValue>,
}

impl SidePacketBundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry. Returns the value that was replaced.
    pub fn put(
        &mut self,
        key: impl Into<SidePacketKey>,
        value: impl Into<SidePacketValue>,
    ) -> Option<SidePacketValue> {
        let key = key.into();
        let previous = self.entries.insert(key.clone(), value.into());
        if previous.is_some() {
            tracing::debug!("Side packet '{}' overwritten", key);
        }
        previous
    }

    /// Chainable form of [`put`](Self::put).
    #[must_use]
    pub fn with(mut self, key: impl Into<SidePacketKey>, value: impl Into<SidePacketValue>) -> Self {
        self.put(key, value);
        self
    }

    /// Insert every entry of `entries`, later entries overwriting earlier ones.
    pub fn extend<K, V, I>(&mut self, entries: I)
    where
        K: Into<SidePacketKey>,
        V: Into<SidePacketValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.put(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze the entries into an immutable bundle.
    pub fn finalize(self) -> SidePacketBundle {
        SidePacketBundle {
            entries: self.entries,
        }
    }
}

/// Immutable mapping from side-packet key to value, submitted to a graph
/// exactly once before it starts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SidePacketBundle {
    entries: HashMap<SidePacketKey, SidePacketValue>,
}

impl SidePacketBundle {
    pub fn builder() -> SidePacketBundleBuilder {
        SidePacketBundleBuilder::new()
    }

    pub fn get(&self, key: &str) -> Option<&SidePacketValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SidePacketKey> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SidePacketKey, &SidePacketValue)> {
        self.entries.iter()
    }

    /// Entries addressed to `subgraph`, keyed by their name inside it.
    pub fn for_subgraph(&self, subgraph: &str) -> HashMap<String, &SidePacketValue> {
        self.entries
            .iter()
            .filter(|(key, _)| key.subgraph() == Some(subgraph))
            .map(|(key, value)| (key.local_name().to_string(), value))
            .collect()
    }

    /// Entries that are not addressed to any subgraph.
    pub fn top_level(&self) -> impl Iterator<Item = (&SidePacketKey, &SidePacketValue)> {
        self.entries.iter().filter(|(key, _)| key.is_top_level())
    }

    /// Names of the subgraphs this bundle addresses.
    pub fn subgraphs(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().filter_map(|k| k.subgraph()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl IntoIterator for SidePacketBundle {
    type Item = (SidePacketKey, SidePacketValue);
    type IntoIter = std::collections::hash_map::IntoIter<SidePacketKey, SidePacketValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
