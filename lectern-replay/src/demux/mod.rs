//! Protocol demultiplexing: decoded legacy objects → canonical events.
//!
//! ```text
//! DecodedMessage ──► Demultiplexer ──► Vec<CanonicalEvent>
//!                        │
//!                        ├── IndexTranslator    (IndexNav, IndexCapability)
//!                        ├── DocTreeTranslator  (DocumentTree)
//!                        └── GraphTranslator    (GraphProtocol)
//! ```
//!
//! Translators keep whatever protocol state their format needs (last
//! emitted page, organization-node table, graph slide metadata). The
//! deck registry and warnings they produce live in [`DemuxContext`].
//! Addressing state sent before a segment's window is primed from the
//! source's [`SourceCatalog`](crate::catalog::SourceCatalog).

mod doc_tree;
mod graph;
mod index;

use lectern_core::{CanonicalEvent, Deck, DeckRegistry, Registration};

use crate::catalog::CatalogEntry;
use crate::warning::ReplayWarning;
use crate::wire::{DecodedMessage, WireFormat};

pub use doc_tree::DocTreeTranslator;
pub use graph::GraphTranslator;
pub use index::IndexTranslator;

/// Demultiplexer options.
#[derive(Debug, Clone, Copy)]
pub struct DemuxConfig {
    pub filter_heartbeats: bool,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self { filter_heartbeats: true }
    }
}

/// Shared outputs of every translator.
#[derive(Debug, Default)]
pub struct DemuxContext {
    pub decks: DeckRegistry,
    pub warnings: Vec<ReplayWarning>,
    /// Graph messages dropped for lack of an enclosing deck/slide.
    pub unscoped: u64,
}

impl DemuxContext {
    /// Register a deck, recording a warning on conflicting metadata.
    pub fn register_deck(&mut self, deck: Deck) {
        let guid = deck.guid;
        if let Registration::Conflict { kept, rejected } = self.decks.register(deck) {
            log::warn!("Deck {guid} re-registered as {rejected:?}; keeping {kept:?}");
            self.warnings.push(ReplayWarning::DuplicateDeck { guid, kept, rejected });
        }
    }
}

/// Per-format translation of one decoded object.
pub trait Translate {
    fn translate(
        &mut self,
        msg: &DecodedMessage,
        ctx: &mut DemuxContext,
        out: &mut Vec<CanonicalEvent>,
    );

    /// Learn addressing state recorded before the replay window. Emits
    /// nothing; returns whether the entry was used.
    fn prime(&mut self, _entry: &CatalogEntry) -> bool {
        false
    }
}

enum Translator {
    Index(IndexTranslator),
    DocTree(DocTreeTranslator),
    Graph(GraphTranslator),
}

/// Format-bound demultiplexer for one logical source.
pub struct Demultiplexer {
    format: WireFormat,
    translator: Translator,
    ctx: DemuxContext,
    foreign: u64,
}

impl Demultiplexer {
    pub fn new(format: WireFormat, config: DemuxConfig) -> Self {
        let translator = match format {
            WireFormat::IndexNav | WireFormat::IndexCapability => {
                Translator::Index(IndexTranslator::new(config.filter_heartbeats))
            }
            WireFormat::DocumentTree => Translator::DocTree(DocTreeTranslator::new()),
            WireFormat::GraphProtocol => Translator::Graph(GraphTranslator::new()),
        };
        Self { format, translator, ctx: DemuxContext::default(), foreign: 0 }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Translate one object. Objects of another format yield nothing.
    pub fn translate(&mut self, msg: &DecodedMessage) -> Vec<CanonicalEvent> {
        let mut out = Vec::new();
        if msg.format() != self.format {
            self.foreign += 1;
            log::debug!("Ignoring {} object on {} source", msg.format(), self.format);
            return out;
        }
        match &mut self.translator {
            Translator::Index(t) => t.translate(msg, &mut self.ctx, &mut out),
            Translator::DocTree(t) => t.translate(msg, &mut self.ctx, &mut out),
            Translator::Graph(t) => t.translate(msg, &mut self.ctx, &mut out),
        }
        out
    }

    /// Prime from a catalog entry of this source's format.
    pub fn prime(&mut self, entry: &CatalogEntry) -> bool {
        if entry.format() != self.format {
            return false;
        }
        match &mut self.translator {
            Translator::Index(t) => t.prime(entry),
            Translator::DocTree(t) => t.prime(entry),
            Translator::Graph(t) => t.prime(entry),
        }
    }

    pub fn decks(&self) -> &DeckRegistry {
        &self.ctx.decks
    }

    /// Consume the demultiplexer, returning its decks and warnings.
    pub fn finish(mut self) -> (DeckRegistry, Vec<ReplayWarning>) {
        if self.ctx.unscoped > 0 {
            self.ctx.warnings.push(ReplayWarning::UnscopedMessages { count: self.ctx.unscoped });
        }
        if self.foreign > 0 {
            self.ctx.warnings.push(ReplayWarning::ForeignFrames { count: self.foreign });
        }
        (self.ctx.decks, self.ctx.warnings)
    }
}
