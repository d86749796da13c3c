//! Addressing catalog of one logical source.
//!
//! ```text
//!  session_start          origin₁            origin₂
//!  ├── Document(n1→p1) ──┼── [segment 1 window] ──┼── [segment 2 window]
//!  └──────── catalog ────┘                        │
//!  └─────────────────── catalog ──────────────────┘
//! ```
//!
//! A segment whose lookback starts after session start still resolves
//! against organization-node tables and graph deck/slide metadata sent
//! before its origin. The job scans each source once and hands every
//! engine the same read-only catalog; the engine primes its demultiplexer
//! with the entries recorded before its own origin.

use std::collections::HashSet;

use uuid::Uuid;

use lectern_core::{Timestamp, TocEntry};

use crate::engine::CancelFlag;
use crate::interleave::Interleaver;
use crate::source::{FrameSource, SourceError};
use crate::wire::{self, DecodedMessage, DocTreeMessage, GraphBody, GraphMessage, WireFormat};

/// Addressing state carried by one recorded object.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogEntry {
    /// Table of contents of a document.
    Document { document: Uuid, toc: Vec<TocEntry> },
    /// First reference to an organization node. Binds a synthetic page
    /// when no document named the node before it.
    NodeReference(String),
    /// Graph object holding deck or slide metadata.
    Graph(GraphMessage),
}

impl CatalogEntry {
    pub fn format(&self) -> WireFormat {
        match self {
            CatalogEntry::Document { .. } | CatalogEntry::NodeReference(_) => WireFormat::DocumentTree,
            CatalogEntry::Graph(_) => WireFormat::GraphProtocol,
        }
    }
}

/// Time-ordered addressing entries of one source.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    entries: Vec<(Timestamp, CatalogEntry)>,
    seen_nodes: HashSet<String>,
}

impl SourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the catalog of `source` over `[from, to)`.
    ///
    /// Undecodable frames are skipped; the engine reports them for its
    /// own window. A cancelled scan returns what it has so far.
    pub fn scan(
        frames: &dyn FrameSource,
        source: &str,
        from: Timestamp,
        to: Timestamp,
        cancel: &CancelFlag,
    ) -> Result<Self, SourceError> {
        let mut catalog = Self::new();
        if to <= from {
            return Ok(catalog);
        }
        for sourced in Interleaver::new(frames.open(source, from, to)?) {
            if cancel.is_cancelled() {
                break;
            }
            if let Ok(msg) = wire::decode(&sourced.frame.payload, None) {
                catalog.observe(sourced.frame.timestamp, &msg);
            }
        }
        log::debug!("Catalog for {source} over [{from}, {to}): {} entries", catalog.len());
        Ok(catalog)
    }

    /// Record whatever addressing state `msg` carries. Timestamps must
    /// not decrease between calls.
    pub fn observe(&mut self, at: Timestamp, msg: &DecodedMessage) {
        match msg {
            DecodedMessage::DocumentTree(DocTreeMessage::Document { document, toc, .. }) => {
                self.entries.push((at, CatalogEntry::Document { document: *document, toc: toc.clone() }));
            }
            DecodedMessage::DocumentTree(doc) => {
                for node in doc.node_refs() {
                    if self.seen_nodes.insert(node.to_string()) {
                        self.entries.push((at, CatalogEntry::NodeReference(node.to_string())));
                    }
                }
            }
            DecodedMessage::Graph(graph)
                if graph.any(|body| matches!(body, GraphBody::Deck { .. } | GraphBody::Slide { .. })) =>
            {
                self.entries.push((at, CatalogEntry::Graph(graph.clone())));
            }
            _ => {}
        }
    }

    /// Entries recorded strictly before `t`, oldest first.
    pub fn before(&self, t: Timestamp) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().take_while(move |(at, _)| *at < t).map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
