//! Property-based tests for core components using proptest.

use proptest::prelude::*;

use deepdive_core::research::{EvidenceBuffer, SourceList};
use deepdive_core::types::Source;
use std::collections::{HashMap, HashSet};

fn source_batches() -> impl Strategy<Value = Vec<Vec<(u8, String)>>> {
    // Small uri space so collisions are common.
    prop::collection::vec(
        prop::collection::vec((0u8..8, "[a-zA-Z ]{0,12}"), 0..6),
        0..10,
    )
}

fn to_sources(batch: &[(u8, String)]) -> Vec<Source> {
    batch
        .iter()
        .map(|(id, title)| Source::new(format!("https://site{id}.example/page"), title.clone()))
        .collect()
}

// --- Source de-duplication properties ---

proptest! {
    #[test]
    fn source_list_uris_are_unique(batches in source_batches()) {
        let mut list = SourceList::new();
        for batch in &batches {
            list.merge(to_sources(batch));
        }
        let uris: HashSet<&str> = list.iter().map(|s| s.uri.as_str()).collect();
        prop_assert_eq!(uris.len(), list.len());
    }

    #[test]
    fn source_list_keeps_last_title(batches in source_batches()) {
        let mut list = SourceList::new();
        let mut expected: HashMap<String, String> = HashMap::new();
        for batch in &batches {
            for source in to_sources(batch) {
                expected.insert(source.uri.clone(), source.title.clone());
            }
            list.merge(to_sources(batch));
        }
        prop_assert_eq!(list.len(), expected.len());
        for (uri, title) in &expected {
            prop_assert_eq!(&list.get(uri).unwrap().title, title);
        }
    }

    #[test]
    fn source_list_merge_counts_new_uris(batches in source_batches()) {
        let mut list = SourceList::new();
        let mut total_new = 0;
        for batch in &batches {
            total_new += list.merge(to_sources(batch));
        }
        prop_assert_eq!(total_new, list.len());
    }

    #[test]
    fn source_list_keeps_first_seen_order(batches in source_batches()) {
        let mut list = SourceList::new();
        let mut order: Vec<String> = Vec::new();
        for batch in &batches {
            for source in to_sources(batch) {
                if !order.contains(&source.uri) {
                    order.push(source.uri.clone());
                }
            }
            list.merge(to_sources(batch));
        }
        let uris: Vec<String> = list.iter().map(|s| s.uri.clone()).collect();
        prop_assert_eq!(uris, order);
    }
}

// --- Evidence buffer properties ---

proptest! {
    #[test]
    fn evidence_length_never_decreases(
        results in prop::collection::vec(("[a-z ]{1,20}", ".{0,40}"), 0..20),
    ) {
        let mut evidence = EvidenceBuffer::new();
        let mut last = evidence.len();
        for (query, result) in &results {
            evidence.append(query, result);
            prop_assert!(evidence.len() > last);
            last = evidence.len();
        }
        prop_assert_eq!(evidence.entry_count(), results.len());
    }
}
