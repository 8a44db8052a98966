//! Bandpack Test Utilities
//!
//! Shared fixtures for the bandpack crates: in-memory constant-pool indexes,
//! value-sequence generators and helpers that push bands through a writer
//! and back through a reader.

use ahash::AHashMap;
use bandpack_codec::{CpTag, Index, IndexRef, IndexSource};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

pub mod generators;
pub mod round_trip;

pub use generators::{band_values, generate, ValuePattern};
pub use round_trip::{reader, round_trip_int_bands, writer, BandCase, RoundTrip};

/// Index over a vector of entries, with a hash lookup for `index_of`.
#[derive(Debug, Clone)]
pub struct VecIndex<E: Eq + Hash> {
    entries: Vec<E>,
    positions: AHashMap<E, usize>,
}

impl<E: Clone + Eq + Hash> VecIndex<E> {
    /// Index the entries in order. Later duplicates keep the first position.
    pub fn new(entries: Vec<E>) -> Self {
        let mut positions = AHashMap::with_capacity(entries.len());
        for (i, e) in entries.iter().enumerate() {
            positions.entry(e.clone()).or_insert(i);
        }
        Self { entries, positions }
    }

    /// Shared handle for binding to bands.
    pub fn shared(self) -> IndexRef<E>
    where
        E: fmt::Debug + Send + Sync + 'static,
    {
        Arc::new(self)
    }
}

impl<E: Eq + Hash + fmt::Debug> Index<E> for VecIndex<E> {
    fn size(&self) -> usize {
        self.entries.len()
    }

    fn entry(&self, position: usize) -> Option<&E> {
        self.entries.get(position)
    }

    fn index_of(&self, entry: &E) -> Option<usize> {
        self.positions.get(entry).copied()
    }
}

/// Index of string entries.
pub fn string_index(entries: &[&str]) -> IndexRef<String> {
    VecIndex::new(entries.iter().map(|s| s.to_string()).collect()).shared()
}

/// Index source backed by a tag map, with an optional catch-all index for
/// tags that were not registered.
#[derive(Clone)]
pub struct MockIndexSource<E> {
    by_tag: AHashMap<CpTag, IndexRef<E>>,
    fallback: Option<IndexRef<E>>,
}

impl<E> Default for MockIndexSource<E> {
    fn default() -> Self {
        Self {
            by_tag: AHashMap::new(),
            fallback: None,
        }
    }
}

impl<E> MockIndexSource<E> {
    /// Empty source; every lookup misses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `index` for `tag`.
    pub fn with(mut self, tag: CpTag, index: IndexRef<E>) -> Self {
        self.by_tag.insert(tag, index);
        self
    }

    /// Serve `index` for every tag without its own entry.
    pub fn with_fallback(mut self, index: IndexRef<E>) -> Self {
        self.fallback = Some(index);
        self
    }

    /// Boxed, ready for `resolve_band_indexes`.
    pub fn boxed(self) -> Box<dyn IndexSource<E>>
    where
        E: 'static,
    {
        Box::new(self)
    }
}

impl<E> IndexSource<E> for MockIndexSource<E> {
    fn index_for(&self, tag: CpTag) -> Option<IndexRef<E>> {
        self.by_tag.get(&tag).or(self.fallback.as_ref()).cloned()
    }
}

/// Install a test-writer `tracing` subscriber; repeated calls are no-ops.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_index() {
        let index = VecIndex::new(vec!["a".to_string(), "b".to_string(), "a".to_string()]);
        assert_eq!(index.size(), 3);
        assert_eq!(index.index_of(&"a".to_string()), Some(0));
        assert_eq!(index.index_of(&"b".to_string()), Some(1));
        assert_eq!(index.entry(2).map(String::as_str), Some("a"));
        assert_eq!(index.entry(3), None);
    }

    #[test]
    fn test_mock_source() {
        let classes = string_index(&["java/lang/Object"]);
        let source = MockIndexSource::new().with(CpTag::Class, classes);
        assert_eq!(source.index_for(CpTag::Class).map(|i| i.size()), Some(1));
        assert!(source.index_for(CpTag::Utf8).is_none());
        let source = source.with_fallback(string_index(&[]));
        assert_eq!(source.index_for(CpTag::Utf8).map(|i| i.size()), Some(0));
    }
}
