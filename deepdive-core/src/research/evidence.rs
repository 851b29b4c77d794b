//! Evidence buffer: the append-only text fed to evaluation and synthesis.

use serde::{Deserialize, Serialize};

/// Accumulated search results for one research run.
///
/// Each result is tagged with the query that produced it. Content is only
/// ever appended, so the length never decreases during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceBuffer {
    text: String,
    entries: usize,
}

impl EvidenceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the result of `query`.
    pub fn append(&mut self, query: &str, result: &str) {
        if !self.text.is_empty() {
            self.text.push_str("\n\n");
        }
        self.text.push_str("### Query: ");
        self.text.push_str(query);
        self.text.push('\n');
        self.text.push_str(result.trim());
        self.entries += 1;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of query results appended so far.
    pub fn entry_count(&self) -> usize {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_tags_query() {
        let mut buf = EvidenceBuffer::new();
        buf.append("what is qkd", "  Quantum key distribution is...  ");
        assert_eq!(
            buf.as_str(),
            "### Query: what is qkd\nQuantum key distribution is..."
        );
        assert_eq!(buf.entry_count(), 1);
    }

    #[test]
    fn test_length_is_monotonic() {
        let mut buf = EvidenceBuffer::new();
        let mut last = buf.len();
        for (q, r) in [("a", "1"), ("b", ""), ("c", "three")] {
            buf.append(q, r);
            assert!(buf.len() > last);
            last = buf.len();
        }
        assert_eq!(buf.entry_count(), 3);
    }
}
