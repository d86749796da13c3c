//! # lectern-replay — presentation event reconstruction
//!
//! Decodes recorded presentation streams from four legacy wire formats,
//! reconstructs the display state segment by segment, and writes a
//! time-ordered replay script.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  sub-streams  ┌─────────────┐  frames  ┌──────────────┐
//! │ FrameSource │ ────────────► │ Interleaver │ ───────► │ wire::decode │
//! │ (archive)   │               └─────────────┘          └──────┬───────┘
//! └─────────────┘                                               │
//!                                                               ▼
//! ┌─────────────┐  entries   ┌──────────────────────┐  events ┌──────────────┐
//! │ ScriptWriter│ ◄───────── │ ReconstructionEngine │ ◄────── │ Demultiplexer│
//! │ (JSON Lines)│            │ lookback + state     │         └──────────────┘
//! └─────────────┘            └──────────┬───────────┘
//!                                       │ one per (source, segment)
//!                                ┌──────┴──────┐
//!                                │  JobDriver  │
//!                                └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`wire`]: legacy object envelopes, per-format messages, stream classification
//! - [`demux`]: per-format translation into canonical events
//! - [`source`] / [`archive`]: frame sources (in-memory, LZ4 archive file)
//! - [`catalog`]: addressing state a late segment primes its demultiplexer with
//! - [`interleave`]: timestamp merge of sub-streams with gap detection
//! - [`lookback`]: initial-state reduction for segment starts
//! - [`engine`]: one segment of one source
//! - [`timeline`] / [`script`]: ordered output and its serialization
//! - [`live`]: display snapshots for frame rendering
//! - [`job`]: segment stitching and parallel execution
//!
//! ## Performance Targets
//!
//! | Metric | Target |
//! |--------|--------|
//! | Decode + translate one frame | <5μs |
//! | Replay 100k frames (one segment) | <1s |
//! | Archive open + verify 100k frames | <500ms |

pub mod archive;
pub mod catalog;
pub mod config;
pub mod demux;
pub mod engine;
pub mod interleave;
pub mod job;
pub mod live;
pub mod lookback;
pub mod script;
pub mod source;
pub mod timeline;
pub mod warning;
pub mod wire;

// Re-exports for convenience
pub use archive::{ArchiveConfig, ArchiveError, ArchiveRecord, ArchiveSummary, ArchiveWriter, FrameArchive};
pub use catalog::{CatalogEntry, SourceCatalog};
pub use config::{EngineConfig, JobConfig, SegmentSpec, SourceSpec};
pub use demux::{DemuxConfig, Demultiplexer};
pub use engine::{
    CancelFlag, ReconstructionEngine, SegmentOutput, SegmentRequest, SegmentStats, StitchParams,
};
pub use interleave::{Interleaver, SourcedFrame};
pub use job::{JobDriver, JobError, JobOutput, JobWarning, SegmentPlan};
pub use live::{FrameRasterizer, LiveView};
pub use lookback::LookbackBuffer;
pub use script::{ScriptError, ScriptReader, ScriptRecord, ScriptWriter};
pub use source::{Frame, FrameSource, MemoryFrameSource, SourceError, SubStream, VecSubStream};
pub use timeline::{Timeline, TimelineEntry};
pub use warning::ReplayWarning;
pub use wire::{Classification, DecodedMessage, ParticipantRole, StreamClassifier, WireError, WireFormat};
