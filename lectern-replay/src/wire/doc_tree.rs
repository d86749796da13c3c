//! Document-tree protocol objects.
//!
//! Pages are never addressed directly. `Document` objects publish a table
//! of contents mapping organization nodes to resources; every other object
//! names an organization node. Backgrounds (documents) and foreground
//! activity (navigation, ink) usually arrive on separate sub-streams.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lectern_core::TocEntry;

use super::{ParticipantRole, WireFormat, WireObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageKind {
    Document,
    Whiteboard,
    Submission,
    Poll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DocTreeMessage {
    Participant { role: ParticipantRole, display_name: String },
    Document { document: Uuid, title: String, toc: Vec<TocEntry> },
    Navigate {
        node: String,
        kind: PageKind,
        background: Option<u32>,
        zoom: f32,
        scroll: (f64, f64),
        /// Organization node of the page a submission/poll is layered over.
        overlay_of: Option<String>,
    },
    InkAdded { node: String, stroke: Uuid, ink: Vec<u8>, color: u32, translucent: bool },
    InkDeleted { node: String, stroke: Uuid },
    ClearPage { node: String },
    ClearDocument { document: Uuid },
    TextAdded { node: String, id: Uuid, text: String, x: f32, y: f32, size: f32, color: u32 },
    TextDeleted { node: String, id: Uuid },
    ImageAdded { node: String, id: Uuid, image: Vec<u8>, x: f32, y: f32, width: f32, height: f32 },
    ImageDeleted { node: String, id: Uuid },
    Scroll { node: String, position: f64, extent: f64 },
    Poll { node: Option<String>, id: Uuid, choices: Vec<String>, votes: Vec<u32> },
}

impl DocTreeMessage {
    /// Plain navigation to a document page.
    pub fn navigate(node: impl Into<String>) -> Self {
        DocTreeMessage::Navigate {
            node: node.into(),
            kind: PageKind::Document,
            background: None,
            zoom: 1.0,
            scroll: (0.0, 1.0),
            overlay_of: None,
        }
    }

    /// Organization nodes this object resolves, in resolution order.
    pub fn node_refs(&self) -> impl Iterator<Item = &str> {
        let (node, overlay) = match self {
            DocTreeMessage::Navigate { node, overlay_of, .. } => (Some(node.as_str()), overlay_of.as_deref()),
            DocTreeMessage::InkAdded { node, .. }
            | DocTreeMessage::InkDeleted { node, .. }
            | DocTreeMessage::ClearPage { node }
            | DocTreeMessage::TextAdded { node, .. }
            | DocTreeMessage::TextDeleted { node, .. }
            | DocTreeMessage::ImageAdded { node, .. }
            | DocTreeMessage::ImageDeleted { node, .. }
            | DocTreeMessage::Scroll { node, .. } => (Some(node.as_str()), None),
            DocTreeMessage::Poll { node, .. } => (node.as_deref(), None),
            DocTreeMessage::Participant { .. }
            | DocTreeMessage::Document { .. }
            | DocTreeMessage::ClearDocument { .. } => (None, None),
        };
        node.into_iter().chain(overlay)
    }
}

impl WireObject for DocTreeMessage {
    const FORMAT: WireFormat = WireFormat::DocumentTree;

    fn type_name(&self) -> &'static str {
        match self {
            DocTreeMessage::Participant { .. } => "ParticipantInfo",
            DocTreeMessage::Document { .. } => "DocumentInfo",
            DocTreeMessage::Navigate { .. } => "NavigateInfo",
            DocTreeMessage::InkAdded { .. } => "InkInfo",
            DocTreeMessage::InkDeleted { .. } => "InkDeleteInfo",
            DocTreeMessage::ClearPage { .. } => "ClearPageInfo",
            DocTreeMessage::ClearDocument { .. } => "ClearDocumentInfo",
            DocTreeMessage::TextAdded { .. } => "TextInfo",
            DocTreeMessage::TextDeleted { .. } => "TextDeleteInfo",
            DocTreeMessage::ImageAdded { .. } => "ImageInfo",
            DocTreeMessage::ImageDeleted { .. } => "ImageDeleteInfo",
            DocTreeMessage::Scroll { .. } => "ScrollInfo",
            DocTreeMessage::Poll { .. } => "PollInfo",
        }
    }
}
