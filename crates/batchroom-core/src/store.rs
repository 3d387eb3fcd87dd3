//! Ordered image collection, the source of truth for the editing screen.
//!
//! The collection keeps `uri` unique: imports skip records whose `uri` is
//! already present. Every mutation is in memory; nothing here performs I/O.

use std::collections::HashSet;

use crate::ImageRecord;

/// Ordered, `uri`-unique sequence of image records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageCollection {
    records: Vec<ImageRecord>,
}

impl ImageCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records whose `uri` is not already present.
    ///
    /// Existing order is preserved and new records are appended in input
    /// order. Duplicates inside `new_items` are collapsed to their first
    /// occurrence. Returns the number of records appended.
    pub fn import<I>(&mut self, new_items: I) -> usize
    where
        I: IntoIterator<Item = ImageRecord>,
    {
        let mut seen: HashSet<String> = self.records.iter().map(|r| r.uri.clone()).collect();
        let before = self.records.len();

        for item in new_items {
            if seen.insert(item.uri.clone()) {
                self.records.push(item);
            }
        }

        self.records.len() - before
    }

    /// Swap the entire sequence in one step.
    pub fn replace_all(&mut self, new_items: Vec<ImageRecord>) {
        self.records = new_items;
    }

    /// Swap the record whose `uri` matches, leaving all others untouched.
    ///
    /// Returns `false` (and changes nothing) when `uri` is not present.
    pub fn replace_one(&mut self, uri: &str, new_item: ImageRecord) -> bool {
        match self.records.iter_mut().find(|r| r.uri == uri) {
            Some(slot) => {
                *slot = new_item;
                true
            }
            None => false,
        }
    }

    /// Remove the first record whose `uri` matches.
    pub fn remove_one(&mut self, uri: &str) -> Option<ImageRecord> {
        let idx = self.position(uri)?;
        Some(self.records.remove(idx))
    }

    /// Remove every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by `uri`
    pub fn get(&self, uri: &str) -> Option<&ImageRecord> {
        self.records.iter().find(|r| r.uri == uri)
    }

    /// Zero-based position of the record with `uri`
    pub fn position(&self, uri: &str) -> Option<usize> {
        self.records.iter().position(|r| r.uri == uri)
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.position(uri).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageRecord> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[ImageRecord] {
        &self.records
    }

    /// URIs in collection order
    pub fn uris(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.uri.as_str()).collect()
    }

    /// Sum of `size_bytes` across the collection
    pub fn total_size_bytes(&self) -> u64 {
        self.records.iter().map(|r| r.size_bytes).sum()
    }
}

impl<'a> IntoIterator for &'a ImageCollection {
    type Item = &'a ImageRecord;
    type IntoIter = std::slice::Iter<'a, ImageRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl From<Vec<ImageRecord>> for ImageCollection {
    /// Build a collection, keeping the first record for each `uri`.
    fn from(records: Vec<ImageRecord>) -> Self {
        let mut collection = Self::new();
        collection.import(records);
        collection
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy for URI lists drawn from a small alphabet so duplicates occur.
    fn uris_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-e]", 0..12)
    }

    fn records(uris: &[String]) -> Vec<ImageRecord> {
        uris.iter()
            .map(|u| ImageRecord::new(u.clone(), format!("{}.jpg", u), 1, 1, 1))
            .collect()
    }

    proptest! {
        /// Property: URIs stay unique after any sequence of imports.
        #[test]
        fn prop_import_keeps_uris_unique(first in uris_strategy(), second in uris_strategy()) {
            let mut store = ImageCollection::new();
            store.import(records(&first));
            store.import(records(&second));

            let uris = store.uris();
            let unique: HashSet<&str> = uris.iter().copied().collect();
            prop_assert_eq!(unique.len(), uris.len());
        }

        /// Property: Importing never reorders existing records.
        #[test]
        fn prop_import_preserves_existing_prefix(first in uris_strategy(), second in uris_strategy()) {
            let mut store = ImageCollection::new();
            store.import(records(&first));
            let before: Vec<String> = store.uris().iter().map(|u| u.to_string()).collect();

            store.import(records(&second));
            let after: Vec<String> = store.uris().iter().map(|u| u.to_string()).collect();

            prop_assert_eq!(&after[..before.len()], &before[..]);
        }

        /// Property: Import count equals the growth of the collection.
        #[test]
        fn prop_import_count_matches_growth(first in uris_strategy(), second in uris_strategy()) {
            let mut store = ImageCollection::new();
            store.import(records(&first));
            let before = store.len();
            let added = store.import(records(&second));
            prop_assert_eq!(store.len(), before + added);
        }
    }
}
