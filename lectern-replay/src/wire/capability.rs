//! Capability-envelope protocol objects.
//!
//! Same index addressing as the navigation protocol, but every object is
//! carried inside a [`CapabilityMessage`] naming the capability channel,
//! deck types are numeric codes, ink transparency is a byte, and stroke
//! removal is batched.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ParticipantRole, WireFormat, WireObject};

/// `(deck, slide)` address inside a capability message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlideAddress {
    pub deck: Uuid,
    pub slide: u32,
}

/// Numeric deck type codes.
pub mod deck_type {
    pub const SLIDES: u8 = 0;
    pub const WHITEBOARD: u8 = 1;
    pub const SUBMISSION: u8 = 2;
    pub const POLL: u8 = 3;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityMessage {
    /// Capability channel name, e.g. `"presentation"` or `"ink"`.
    pub capability: String,
    pub sequence: u64,
    pub body: CapabilityBody,
}

impl CapabilityMessage {
    pub fn new(capability: impl Into<String>, sequence: u64, body: CapabilityBody) -> Self {
        Self { capability: capability.into(), sequence, body }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnnotationOp {
    Text { id: Uuid, text: String, x: f32, y: f32, size: f32, argb: u32 },
    Image { id: Uuid, bytes: Vec<u8>, x: f32, y: f32, width: f32, height: f32 },
    RemoveText { id: Uuid },
    RemoveImage { id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CapabilityBody {
    Hello { role: ParticipantRole, client_version: String },
    DeckAdvertised { deck: Uuid, title: String, slide_titles: Vec<String> },
    SlideChanged {
        address: SlideAddress,
        deck_type: u8,
        argb: Option<u32>,
        zoom: f32,
        scroll: (f64, f64),
        overlay_of: Option<SlideAddress>,
    },
    /// Heartbeat carrying the same page description as `SlideChanged`.
    SlideStatus {
        address: SlideAddress,
        deck_type: u8,
        argb: Option<u32>,
        zoom: f32,
        scroll: (f64, f64),
        overlay_of: Option<SlideAddress>,
    },
    Scrolled { address: SlideAddress, offset: f64, height: f64 },
    StrokeAdded { address: SlideAddress, stroke_id: Uuid, packet: Vec<u8>, argb: u32, transparency: u8 },
    StrokesRemoved { address: SlideAddress, stroke_ids: Vec<Uuid> },
    SlideCleared { address: SlideAddress },
    DeckCleared { deck: Uuid },
    SlideBackground { address: SlideAddress, argb: u32 },
    Annotation { address: SlideAddress, op: AnnotationOp },
    PollResults { address: Option<SlideAddress>, poll_id: Uuid, choices: Vec<String>, counts: Vec<u32> },
}

impl WireObject for CapabilityMessage {
    const FORMAT: WireFormat = WireFormat::IndexCapability;

    fn type_name(&self) -> &'static str {
        match self.body {
            CapabilityBody::Hello { .. } => "CapabilityHello",
            CapabilityBody::DeckAdvertised { .. } => "CapabilityDeck",
            CapabilityBody::SlideChanged { .. } => "CapabilitySlideChanged",
            CapabilityBody::SlideStatus { .. } => "CapabilitySlideStatus",
            CapabilityBody::Scrolled { .. } => "CapabilityScroll",
            CapabilityBody::StrokeAdded { .. } => "CapabilityStroke",
            CapabilityBody::StrokesRemoved { .. } => "CapabilityStrokesRemoved",
            CapabilityBody::SlideCleared { .. } => "CapabilitySlideCleared",
            CapabilityBody::DeckCleared { .. } => "CapabilityDeckCleared",
            CapabilityBody::SlideBackground { .. } => "CapabilityBackground",
            CapabilityBody::Annotation { .. } => "CapabilityAnnotation",
            CapabilityBody::PollResults { .. } => "CapabilityPoll",
        }
    }
}
