//! Canonical presentation events.
//!
//! Every legacy wire message maps to zero or more of these. Events are
//! immutable once produced; the state machine and the timeline both take
//! them by reference.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::slide::SlideKey;

/// ARGB color packed as `0xAARRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Argb(pub u32);

impl Argb {
    pub const WHITE: Argb = Argb(0xFFFF_FFFF);
    pub const TRANSPARENT: Argb = Argb(0);

    pub fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }
}

impl Default for Argb {
    fn default() -> Self {
        Argb::WHITE
    }
}

/// What kind of deck a navigation lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeckKind {
    #[default]
    Presentation,
    Whiteboard,
    StudentSubmission,
    QuickPoll,
}

impl DeckKind {
    /// Submission and poll slides are drawn over an associated slide.
    pub fn is_overlay(self) -> bool {
        matches!(self, DeckKind::StudentSubmission | DeckKind::QuickPoll)
    }
}

/// Vertical scroll of a slide taller than the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollParams {
    /// Fraction of the scrollable range, `0.0..=1.0`.
    pub position: f64,
    /// Slide height relative to the viewport; `1.0` means no scrolling.
    pub extent: f64,
}

impl Default for ScrollParams {
    fn default() -> Self {
        Self { position: 0.0, extent: 1.0 }
    }
}

/// Opaque ink data plus the rendering hint needed to layer it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InkPayload {
    /// Serialized stroke (points, pen attributes) as recorded.
    pub data: Vec<u8>,
    pub color: Argb,
    /// Highlighter-style ink, drawn in a separate semi-transparent pass.
    pub translucent: bool,
}

/// The slide a navigation lands on plus everything needed to draw it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationUpdate {
    pub slide: SlideKey,
    pub deck_kind: DeckKind,
    pub background: Option<Argb>,
    pub slide_size: f32,
    pub scroll: ScrollParams,
    /// Slide a submission or poll result is layered over.
    pub association: Option<SlideKey>,
}

impl NavigationUpdate {
    pub fn to(slide: SlideKey) -> Self {
        Self {
            slide,
            deck_kind: DeckKind::Presentation,
            background: None,
            slide_size: 1.0,
            scroll: ScrollParams::default(),
            association: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnnotation {
    pub id: Uuid,
    pub slide: SlideKey,
    pub text: String,
    pub origin: (f32, f32),
    pub font_size: f32,
    pub color: Argb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnnotation {
    pub id: Uuid,
    pub slide: SlideKey,
    /// Encoded image bytes (PNG/JPEG as recorded).
    pub image: Vec<u8>,
    pub origin: (f32, f32),
    pub size: (f32, f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickPoll {
    pub poll_id: Uuid,
    /// Slide the poll was asked on.
    pub slide: Option<SlideKey>,
    pub choices: Vec<String>,
    pub votes: Vec<u32>,
}

/// One semantic action, independent of the wire format that carried it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CanonicalEvent {
    NavigationUpdate(NavigationUpdate),
    StrokeAdd { stroke_id: Uuid, slide: SlideKey, ink: InkPayload },
    StrokeDelete { stroke_id: Uuid, slide: SlideKey },
    EraseLayer { slide: SlideKey },
    EraseAllLayers { deck: Uuid },
    TextAnnotationAdd(TextAnnotation),
    TextAnnotationDelete { id: Uuid, slide: SlideKey },
    ImageAnnotationAdd(ImageAnnotation),
    ImageAnnotationDelete { id: Uuid, slide: SlideKey },
    QuickPollUpdate(QuickPoll),
    ScrollUpdate { slide: SlideKey, scroll: ScrollParams },
}

impl CanonicalEvent {
    /// Variant name, used as the record kind in scripts.
    pub fn kind(&self) -> &'static str {
        match self {
            CanonicalEvent::NavigationUpdate(_) => "NavigationUpdate",
            CanonicalEvent::StrokeAdd { .. } => "StrokeAdd",
            CanonicalEvent::StrokeDelete { .. } => "StrokeDelete",
            CanonicalEvent::EraseLayer { .. } => "EraseLayer",
            CanonicalEvent::EraseAllLayers { .. } => "EraseAllLayers",
            CanonicalEvent::TextAnnotationAdd(_) => "TextAnnotationAdd",
            CanonicalEvent::TextAnnotationDelete { .. } => "TextAnnotationDelete",
            CanonicalEvent::ImageAnnotationAdd(_) => "ImageAnnotationAdd",
            CanonicalEvent::ImageAnnotationDelete { .. } => "ImageAnnotationDelete",
            CanonicalEvent::QuickPollUpdate(_) => "QuickPollUpdate",
            CanonicalEvent::ScrollUpdate { .. } => "ScrollUpdate",
        }
    }

    /// Slide the event targets, if it targets exactly one.
    pub fn slide(&self) -> Option<&SlideKey> {
        match self {
            CanonicalEvent::NavigationUpdate(nav) => Some(&nav.slide),
            CanonicalEvent::StrokeAdd { slide, .. }
            | CanonicalEvent::StrokeDelete { slide, .. }
            | CanonicalEvent::EraseLayer { slide }
            | CanonicalEvent::TextAnnotationDelete { slide, .. }
            | CanonicalEvent::ImageAnnotationDelete { slide, .. }
            | CanonicalEvent::ScrollUpdate { slide, .. } => Some(slide),
            CanonicalEvent::TextAnnotationAdd(a) => Some(&a.slide),
            CanonicalEvent::ImageAnnotationAdd(a) => Some(&a.slide),
            CanonicalEvent::QuickPollUpdate(p) => p.slide.as_ref(),
            CanonicalEvent::EraseAllLayers { .. } => None,
        }
    }

    pub fn is_navigation(&self) -> bool {
        matches!(self, CanonicalEvent::NavigationUpdate(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_slide_accessor() {
        let key = SlideKey::indexed(Uuid::new_v4(), 2);
        let ev = CanonicalEvent::StrokeDelete { stroke_id: Uuid::new_v4(), slide: key.clone() };
        assert_eq!(ev.slide(), Some(&key));
        assert_eq!(ev.kind(), "StrokeDelete");

        let erase_all = CanonicalEvent::EraseAllLayers { deck: Uuid::new_v4() };
        assert_eq!(erase_all.slide(), None);
    }

    #[test]
    fn test_event_bincode_roundtrip() {
        let key = SlideKey::page(Uuid::new_v4(), "res-1");
        let ev = CanonicalEvent::NavigationUpdate(NavigationUpdate {
            association: Some(SlideKey::indexed(Uuid::new_v4(), 0)),
            deck_kind: DeckKind::StudentSubmission,
            ..NavigationUpdate::to(key)
        });
        let bytes = bincode::serde::encode_to_vec(&ev, bincode::config::standard()).unwrap();
        let (back, _): (CanonicalEvent, _) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn test_overlay_kinds() {
        assert!(DeckKind::QuickPoll.is_overlay());
        assert!(DeckKind::StudentSubmission.is_overlay());
        assert!(!DeckKind::Whiteboard.is_overlay());
    }
}
