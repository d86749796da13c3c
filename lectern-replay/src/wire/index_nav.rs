//! Index-navigation protocol objects.
//!
//! The oldest format: every slide-targeting object carries an explicit
//! `(deck guid, slide index)` pair. Objects may be sent bare or inside a
//! sequenced `Wrapped` envelope; the recording client also emits a
//! periodic `PageUpdate` heartbeat repeating the current page.

use std::cell::Cell;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::{ParticipantRole, WireFormat, WireObject};

/// Slide address as written by index-based clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlideRef {
    pub deck: Uuid,
    pub index: u32,
}

impl SlideRef {
    pub fn new(deck: Uuid, index: u32) -> Self {
        Self { deck, index }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeckType {
    Slides,
    Whiteboard,
    Submission,
    Poll,
}

/// Full page description sent on navigation and on every heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavPayload {
    pub slide: SlideRef,
    pub deck_type: DeckType,
    /// `0xAARRGGBB`; `None` keeps the previous background.
    pub background: Option<u32>,
    pub zoom: f32,
    pub scroll_position: f64,
    pub scroll_extent: f64,
    /// Slide that a submission/poll page is layered over.
    pub association: Option<SlideRef>,
}

impl NavPayload {
    pub fn slides(slide: SlideRef) -> Self {
        Self {
            slide,
            deck_type: DeckType::Slides,
            background: None,
            zoom: 1.0,
            scroll_position: 0.0,
            scroll_extent: 1.0,
            association: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndexNavMessage {
    Role(ParticipantRole),
    DeckInfo { deck: Uuid, name: String, slide_count: u32, titles: Vec<String> },
    Navigate(NavPayload),
    /// Periodic heartbeat; sent whether or not the page changed.
    PageUpdate(NavPayload),
    Scroll { slide: SlideRef, position: f64, extent: f64 },
    InkAdded { slide: SlideRef, stroke: Uuid, ink: Vec<u8>, color: u32, highlighter: bool },
    InkDeleted { slide: SlideRef, stroke: Uuid },
    EraseSlide { slide: SlideRef },
    EraseDeck { deck: Uuid },
    Background { slide: SlideRef, argb: u32 },
    TextAdded { slide: SlideRef, id: Uuid, text: String, x: f32, y: f32, size: f32, color: u32 },
    TextDeleted { slide: SlideRef, id: Uuid },
    ImageAdded { slide: SlideRef, id: Uuid, image: Vec<u8>, x: f32, y: f32, width: f32, height: f32 },
    ImageDeleted { slide: SlideRef, id: Uuid },
    Poll { slide: Option<SlideRef>, id: Uuid, choices: Vec<String>, votes: Vec<u32> },
    Wrapped {
        sequence: u64,
        #[serde(deserialize_with = "bounded_inner")]
        inner: Box<IndexNavMessage>,
    },
}

/// Deepest `Wrapped` nesting accepted when decoding.
pub const MAX_WRAP_DEPTH: usize = 32;

thread_local! {
    static WRAP_DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct WrapDepth;

impl WrapDepth {
    fn enter() -> (Self, usize) {
        let depth = WRAP_DEPTH.with(|d| {
            d.set(d.get() + 1);
            d.get()
        });
        (WrapDepth, depth)
    }
}

impl Drop for WrapDepth {
    fn drop(&mut self) {
        WRAP_DEPTH.with(|d| d.set(d.get() - 1));
    }
}

fn bounded_inner<'de, D: Deserializer<'de>>(de: D) -> Result<Box<IndexNavMessage>, D::Error> {
    let (_guard, depth) = WrapDepth::enter();
    if depth > MAX_WRAP_DEPTH {
        return Err(serde::de::Error::custom(format!(
            "more than {MAX_WRAP_DEPTH} nested sequenced envelopes"
        )));
    }
    Box::<IndexNavMessage>::deserialize(de)
}

impl IndexNavMessage {
    /// Strip any number of `Wrapped` layers.
    pub fn unwrap_envelopes(&self) -> &IndexNavMessage {
        let mut msg = self;
        while let IndexNavMessage::Wrapped { inner, .. } = msg {
            msg = inner;
        }
        msg
    }

    pub fn announced_role(&self) -> Option<ParticipantRole> {
        match self.unwrap_envelopes() {
            IndexNavMessage::Role(role) => Some(*role),
            _ => None,
        }
    }
}

impl WireObject for IndexNavMessage {
    const FORMAT: WireFormat = WireFormat::IndexNav;

    fn type_name(&self) -> &'static str {
        match self {
            IndexNavMessage::Role(_) => "RoleMessage",
            IndexNavMessage::DeckInfo { .. } => "DeckInformationMessage",
            IndexNavMessage::Navigate(_) => "NavigationMessage",
            IndexNavMessage::PageUpdate(_) => "PageUpdateMessage",
            IndexNavMessage::Scroll { .. } => "ScrollMessage",
            IndexNavMessage::InkAdded { .. } => "InkAddedMessage",
            IndexNavMessage::InkDeleted { .. } => "InkDeletedMessage",
            IndexNavMessage::EraseSlide { .. } => "EraseSlideMessage",
            IndexNavMessage::EraseDeck { .. } => "EraseDeckMessage",
            IndexNavMessage::Background { .. } => "BackgroundMessage",
            IndexNavMessage::TextAdded { .. } => "TextAnnotationMessage",
            IndexNavMessage::TextDeleted { .. } => "TextAnnotationDeletedMessage",
            IndexNavMessage::ImageAdded { .. } => "ImageAnnotationMessage",
            IndexNavMessage::ImageDeleted { .. } => "ImageAnnotationDeletedMessage",
            IndexNavMessage::Poll { .. } => "QuickPollMessage",
            IndexNavMessage::Wrapped { .. } => "SequencedMessage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_nested_envelopes() {
        let inner = IndexNavMessage::Role(ParticipantRole::Student);
        let msg = IndexNavMessage::Wrapped {
            sequence: 2,
            inner: Box::new(IndexNavMessage::Wrapped { sequence: 1, inner: Box::new(inner.clone()) }),
        };
        assert_eq!(msg.unwrap_envelopes(), &inner);
        assert_eq!(msg.announced_role(), Some(ParticipantRole::Student));
    }

    fn wrapped(depth: usize) -> IndexNavMessage {
        let mut msg = IndexNavMessage::Role(ParticipantRole::Presenter);
        for sequence in 0..depth as u64 {
            msg = IndexNavMessage::Wrapped { sequence, inner: Box::new(msg) };
        }
        msg
    }

    fn decode_body(body: &[u8]) -> Result<IndexNavMessage, bincode::error::DecodeError> {
        bincode::serde::decode_from_slice(body, bincode::config::standard()).map(|(m, _)| m)
    }

    #[test]
    fn test_wrap_depth_limit() {
        let config = bincode::config::standard();
        let ok = bincode::serde::encode_to_vec(wrapped(MAX_WRAP_DEPTH), config).unwrap();
        assert_eq!(decode_body(&ok).unwrap(), wrapped(MAX_WRAP_DEPTH));

        let deep = bincode::serde::encode_to_vec(wrapped(MAX_WRAP_DEPTH + 1), config).unwrap();
        assert!(decode_body(&deep).is_err());
        // The depth counter unwinds after a failure.
        assert_eq!(decode_body(&ok).unwrap(), wrapped(MAX_WRAP_DEPTH));
    }

    #[test]
    fn test_hostile_nesting_fails_fast() {
        // Tag 15 is `Wrapped`, 0 its sequence: 20k nested headers and no leaf.
        let body = [15u8, 0].repeat(20_000);
        assert!(decode_body(&body).is_err());
    }
}
