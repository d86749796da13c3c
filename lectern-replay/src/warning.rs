//! Recoverable conditions surfaced to the caller.
//!
//! Nothing in a frame's content aborts a segment. Each degraded case is
//! recorded here instead and reported alongside the partial output.

use uuid::Uuid;

use lectern_core::SlideKey;

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayWarning {
    /// No frames exist for the requested source and window.
    MissingSource { source: String },
    /// Frames dropped because their payload could not be decoded.
    DecodeFailures { count: u64 },
    /// Recorded index jumped on a sub-stream.
    IndexGap { sub_stream: usize, expected: u64, found: u64 },
    /// Navigation or ink named an organization node absent from the table.
    SynthesizedPage { org_node: String },
    /// An organization node was bound twice; the first binding was kept.
    AddressConflict { org_node: String, kept: SlideKey, rejected: SlideKey },
    /// A deck guid was seen with different metadata; the first was kept.
    DuplicateDeck { guid: Uuid, kept: String, rejected: String },
    /// A stroke id was added twice to the same slide; the first was kept.
    DuplicateStroke { stroke: Uuid, slide: SlideKey },
    /// Graph messages that needed an enclosing deck or slide and had none.
    UnscopedMessages { count: u64 },
    /// Frames whose envelope named a different wire format than the source.
    ForeignFrames { count: u64 },
}

impl std::fmt::Display for ReplayWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayWarning::MissingSource { source } => {
                write!(f, "No presentation data found for source {source}")
            }
            ReplayWarning::DecodeFailures { count } => {
                write!(f, "{count} frame(s) could not be decoded and were skipped")
            }
            ReplayWarning::IndexGap { sub_stream, expected, found } => write!(
                f,
                "Data gap on sub-stream {sub_stream}: expected index {expected}, found {found}"
            ),
            ReplayWarning::SynthesizedPage { org_node } => {
                write!(f, "Unresolved page {org_node} treated as a whiteboard page")
            }
            ReplayWarning::AddressConflict { org_node, kept, rejected } => write!(
                f,
                "Page {org_node} already bound to {kept}; ignored binding to {rejected}"
            ),
            ReplayWarning::DuplicateDeck { guid, kept, rejected } => write!(
                f,
                "Deck {guid} seen as \"{rejected}\" after \"{kept}\"; kept the first"
            ),
            ReplayWarning::DuplicateStroke { stroke, slide } => {
                write!(f, "Stroke {stroke} added twice on {slide}; kept the first")
            }
            ReplayWarning::UnscopedMessages { count } => {
                write!(f, "{count} graph message(s) had no enclosing deck or slide")
            }
            ReplayWarning::ForeignFrames { count } => {
                write!(f, "{count} frame(s) belonged to a different wire format")
            }
        }
    }
}
