//! Slide addressing.
//!
//! Two native schemes exist in the recordings:
//!
//! ```text
//!   index protocols           document-tree protocol
//!  ┌──────────────────┐      ┌────────────┐   table    ┌──────────────┐
//!  │ (deck guid, idx) │      │ org node id│ ─────────► │ resource id  │
//!  └────────┬─────────┘      └────────────┘            └──────┬───────┘
//!           │                                                 │
//!           ▼                                                 ▼
//!     SlideKey::Indexed                                 SlideKey::Page
//! ```
//!
//! The [`AddressResolver`] owns the organization-node table for one
//! segment. Unknown nodes become synthetic whiteboard pages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Resource prefix used for pages synthesized on demand.
pub const WHITEBOARD_PREFIX: &str = "whiteboard:";

/// Canonical per-slide address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlideKey {
    /// Index-addressed slide of a deck.
    Indexed { deck: Uuid, index: u32 },
    /// Resource-addressed page. `document` is `None` for synthetic pages.
    Page { document: Option<Uuid>, resource: String },
}

impl SlideKey {
    pub fn indexed(deck: Uuid, index: u32) -> Self {
        SlideKey::Indexed { deck, index }
    }

    pub fn page(document: Uuid, resource: impl Into<String>) -> Self {
        SlideKey::Page { document: Some(document), resource: resource.into() }
    }

    /// Deck (or document) this slide belongs to, if any.
    pub fn deck(&self) -> Option<Uuid> {
        match self {
            SlideKey::Indexed { deck, .. } => Some(*deck),
            SlideKey::Page { document, .. } => *document,
        }
    }

    /// Whether this page was created on demand for an unresolvable node.
    pub fn is_synthetic(&self) -> bool {
        matches!(self, SlideKey::Page { document: None, .. })
    }
}

impl fmt::Display for SlideKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlideKey::Indexed { deck, index } => write!(f, "{deck}#{index}"),
            SlideKey::Page { document: Some(doc), resource } => write!(f, "{doc}/{resource}"),
            SlideKey::Page { document: None, resource } => f.write_str(resource),
        }
    }
}

/// One table-of-contents row of a document message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    pub org_node: String,
    pub resource: String,
    pub title: Option<String>,
}

/// Result of resolving an organization node.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Found in the table built from document messages.
    Known(SlideKey),
    /// Table miss; a whiteboard page was synthesized and recorded.
    Synthesized(SlideKey),
}

impl Resolution {
    pub fn key(&self) -> &SlideKey {
        match self {
            Resolution::Known(k) | Resolution::Synthesized(k) => k,
        }
    }

    pub fn into_key(self) -> SlideKey {
        match self {
            Resolution::Known(k) | Resolution::Synthesized(k) => k,
        }
    }
}

/// Table row conflict reported by [`AddressResolver::ingest_document`].
#[derive(Debug, Clone, PartialEq)]
pub struct AddressConflict {
    pub org_node: String,
    pub kept: SlideKey,
    pub rejected: SlideKey,
}

/// Organization-node → resource indirection table for one segment.
///
/// First writer wins: once a node is bound (from a document or
/// synthetically) later bindings are reported as conflicts and ignored.
#[derive(Debug, Default)]
pub struct AddressResolver {
    table: HashMap<String, SlideKey>,
    synthesized: usize,
}

impl AddressResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every TOC row of a document to the table.
    pub fn ingest_document(&mut self, document: Uuid, toc: &[TocEntry]) -> Vec<AddressConflict> {
        let mut conflicts = Vec::new();
        for entry in toc {
            let key = SlideKey::page(document, entry.resource.clone());
            match self.table.get(&entry.org_node) {
                Some(existing) if *existing == key => {}
                Some(existing) => conflicts.push(AddressConflict {
                    org_node: entry.org_node.clone(),
                    kept: existing.clone(),
                    rejected: key,
                }),
                None => {
                    self.table.insert(entry.org_node.clone(), key);
                }
            }
        }
        conflicts
    }

    /// Resolve a node, or synthesize a whiteboard page for it.
    pub fn resolve(&mut self, org_node: &str) -> Resolution {
        if let Some(key) = self.table.get(org_node) {
            return Resolution::Known(key.clone());
        }
        let key = SlideKey::Page {
            document: None,
            resource: format!("{WHITEBOARD_PREFIX}{org_node}"),
        };
        self.table.insert(org_node.to_string(), key.clone());
        self.synthesized += 1;
        log::warn!("Unresolved organization node {org_node}; created whiteboard page");
        Resolution::Synthesized(key)
    }

    /// Lookup without synthesizing.
    pub fn lookup(&self, org_node: &str) -> Option<&SlideKey> {
        self.table.get(org_node)
    }

    /// Number of pages synthesized so far.
    pub fn synthesized_count(&self) -> usize {
        self.synthesized
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toc(rows: &[(&str, &str)]) -> Vec<TocEntry> {
        rows.iter()
            .map(|(n, r)| TocEntry { org_node: n.to_string(), resource: r.to_string(), title: None })
            .collect()
    }

    #[test]
    fn test_resolve_after_document() {
        let doc = Uuid::new_v4();
        let mut resolver = AddressResolver::new();
        let conflicts = resolver.ingest_document(doc, &toc(&[("n1", "r1"), ("n2", "r2")]));
        assert!(conflicts.is_empty());

        let res = resolver.resolve("n2");
        assert_eq!(res, Resolution::Known(SlideKey::page(doc, "r2")));
        assert_eq!(resolver.synthesized_count(), 0);
    }

    #[test]
    fn test_unknown_node_synthesizes_whiteboard() {
        let mut resolver = AddressResolver::new();
        let res = resolver.resolve("wb-7");
        assert!(matches!(res, Resolution::Synthesized(_)));
        assert!(res.key().is_synthetic());
        assert_eq!(res.key().to_string(), "whiteboard:wb-7");

        // Second lookup hits the synthetic row.
        assert!(matches!(resolver.resolve("wb-7"), Resolution::Known(_)));
        assert_eq!(resolver.synthesized_count(), 1);
    }

    #[test]
    fn test_first_writer_wins() {
        let doc = Uuid::new_v4();
        let mut resolver = AddressResolver::new();
        let synthetic = resolver.resolve("n1").into_key();

        let conflicts = resolver.ingest_document(doc, &toc(&[("n1", "r1")]));
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kept, synthetic);
        assert_eq!(resolver.lookup("n1"), Some(&synthetic));
    }

    #[test]
    fn test_reingesting_same_document_is_silent() {
        let doc = Uuid::new_v4();
        let mut resolver = AddressResolver::new();
        resolver.ingest_document(doc, &toc(&[("n1", "r1")]));
        assert!(resolver.ingest_document(doc, &toc(&[("n1", "r1")])).is_empty());
        assert_eq!(resolver.len(), 1);
    }

    #[test]
    fn test_slide_key_deck() {
        let deck = Uuid::new_v4();
        assert_eq!(SlideKey::indexed(deck, 3).deck(), Some(deck));
        assert_eq!(SlideKey::indexed(deck, 3).to_string(), format!("{deck}#3"));
        let wb = SlideKey::Page { document: None, resource: "whiteboard:x".into() };
        assert_eq!(wb.deck(), None);
    }
}
