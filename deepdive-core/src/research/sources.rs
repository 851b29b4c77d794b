//! De-duplicated source list.
//!
//! Sources are keyed by uri. Inserting a uri that is already present keeps
//! its original position and replaces the title, so the list always reflects
//! the most recent citation for each page.

use crate::types::Source;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordered, uri-unique collection of grounding sources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceList {
    by_uri: IndexMap<String, Source>,
}

impl SourceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by uri. Returns `true` if the uri was not present.
    pub fn insert(&mut self, source: Source) -> bool {
        self.by_uri.insert(source.uri.clone(), source).is_none()
    }

    /// Merge a batch of sources in order. Returns how many uris were new.
    pub fn merge<I: IntoIterator<Item = Source>>(&mut self, sources: I) -> usize {
        sources
            .into_iter()
            .map(|s| self.insert(s))
            .filter(|added| *added)
            .count()
    }

    pub fn get(&self, uri: &str) -> Option<&Source> {
        self.by_uri.get(uri)
    }

    pub fn len(&self) -> usize {
        self.by_uri.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uri.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.by_uri.values()
    }

    /// Materialize the sources in first-seen order.
    pub fn to_vec(&self) -> Vec<Source> {
        self.by_uri.values().cloned().collect()
    }
}

impl Serialize for SourceList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.by_uri.values())
    }
}

impl<'de> Deserialize<'de> for SourceList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let sources = Vec::<Source>::deserialize(deserializer)?;
        let mut list = SourceList::new();
        list.merge(sources);
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_new_and_duplicate() {
        let mut list = SourceList::new();
        assert!(list.insert(Source::new("https://a", "A")));
        assert!(list.insert(Source::new("https://b", "B")));
        assert!(!list.insert(Source::new("https://a", "A (updated)")));

        assert_eq!(list.len(), 2);
        assert_eq!(list.get("https://a").unwrap().title, "A (updated)");
    }

    #[test]
    fn test_replacement_keeps_position() {
        let mut list = SourceList::new();
        list.merge(vec![
            Source::new("https://a", "A"),
            Source::new("https://b", "B"),
        ]);
        list.insert(Source::new("https://a", "A2"));
        let uris: Vec<&str> = list.iter().map(|s| s.uri.as_str()).collect();
        assert_eq!(uris, vec!["https://a", "https://b"]);
    }

    #[test]
    fn test_merge_counts_new() {
        let mut list = SourceList::new();
        list.insert(Source::new("https://a", "A"));
        let added = list.merge(vec![
            Source::new("https://a", "A"),
            Source::new("https://c", "C"),
            Source::new("https://c", "C again"),
        ]);
        assert_eq!(added, 1);
        assert_eq!(list.get("https://c").unwrap().title, "C again");
    }

    #[test]
    fn test_serializes_as_sequence() {
        let mut list = SourceList::new();
        list.insert(Source::new("https://a", "A"));
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json, serde_json::json!([{"uri": "https://a", "title": "A"}]));

        let back: SourceList = serde_json::from_value(json).unwrap();
        assert_eq!(back, list);
    }
}
