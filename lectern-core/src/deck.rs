//! Deck registry.
//!
//! Every deck referenced by a presentation stream is recorded once, by
//! guid, in first-seen order. The registry is handed to an external matcher
//! that fills in `matched_path`; the engine never touches the file system.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

/// A slide deck referenced in the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub guid: Uuid,
    pub display_name: String,
    pub slide_count: Option<u32>,
    pub slide_titles: Option<Vec<String>>,
    /// Local image directory, filled in by the deck matcher.
    pub matched_path: Option<PathBuf>,
}

impl Deck {
    pub fn new(guid: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            guid,
            display_name: display_name.into(),
            slide_count: None,
            slide_titles: None,
            matched_path: None,
        }
    }

    pub fn with_slides(mut self, count: u32, titles: Option<Vec<String>>) -> Self {
        self.slide_count = Some(count);
        self.slide_titles = titles;
        self
    }
}

/// Outcome of [`DeckRegistry::register`].
#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    Added,
    /// Already known with identical metadata.
    Unchanged,
    /// Already known with different metadata; the first record was kept.
    Conflict { kept: String, rejected: String },
}

/// Guid-deduplicated deck list, keep-first-seen.
///
/// Only the manifest form is serialized; [`DeckRegistry::from_manifest`]
/// rebuilds the guid index while loading it.
#[derive(Debug, Clone, Default)]
pub struct DeckRegistry {
    decks: Vec<Deck>,
    by_guid: HashMap<Uuid, usize>,
}

impl DeckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, deck: Deck) -> Registration {
        if let Some(&idx) = self.by_guid.get(&deck.guid) {
            let existing = &mut self.decks[idx];
            // A later record may add detail the first one lacked.
            if existing.slide_count.is_none() && deck.slide_count.is_some() {
                existing.slide_count = deck.slide_count;
                existing.slide_titles = deck.slide_titles;
                return Registration::Unchanged;
            }
            if existing.display_name == deck.display_name
                && (deck.slide_count.is_none() || existing.slide_count == deck.slide_count)
            {
                return Registration::Unchanged;
            }
            return Registration::Conflict {
                kept: existing.display_name.clone(),
                rejected: deck.display_name,
            };
        }
        self.by_guid.insert(deck.guid, self.decks.len());
        self.decks.push(deck);
        Registration::Added
    }

    /// Fold another registry in, reporting conflicting guids.
    pub fn merge(&mut self, other: DeckRegistry) -> Vec<(Uuid, Registration)> {
        let mut conflicts = Vec::new();
        for deck in other.decks {
            let guid = deck.guid;
            let outcome = self.register(deck);
            if matches!(outcome, Registration::Conflict { .. }) {
                conflicts.push((guid, outcome));
            }
        }
        conflicts
    }

    pub fn get(&self, guid: &Uuid) -> Option<&Deck> {
        self.by_guid.get(guid).map(|&i| &self.decks[i])
    }

    pub fn get_mut(&mut self, guid: &Uuid) -> Option<&mut Deck> {
        match self.by_guid.get(guid) {
            Some(&i) => Some(&mut self.decks[i]),
            None => None,
        }
    }

    pub fn contains(&self, guid: &Uuid) -> bool {
        self.by_guid.contains_key(guid)
    }

    /// Decks in first-seen order.
    pub fn decks(&self) -> &[Deck] {
        &self.decks
    }

    pub fn len(&self) -> usize {
        self.decks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decks.is_empty()
    }

    /// JSON manifest for the external deck matcher.
    pub fn to_manifest(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&ManifestRef(&self.decks))
    }

    /// Rebuild from a manifest (e.g. after the matcher filled in paths).
    pub fn from_manifest(json: &str) -> Result<Self, serde_json::Error> {
        let manifest: Manifest = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for deck in manifest.0 {
            registry.register(deck);
        }
        Ok(registry)
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct ManifestRef<'a>(&'a [Deck]);

#[derive(Deserialize)]
#[serde(transparent)]
struct Manifest(Vec<Deck>);
