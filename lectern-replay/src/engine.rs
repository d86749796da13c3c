//! Per-segment reconstruction engine.
//!
//! ```text
//!  FrameSource ──open(origin, end)──► Interleaver ──► decode ──► Demultiplexer
//!                                                                   │
//!                        ts < start ┌──────────────────────────────┤
//!                                   ▼                              ▼ ts ≥ start
//!                            LookbackBuffer ──finish()──► PresentationState ──► Timeline
//!                                              (start+0,1,2… ticks)
//! ```
//!
//! Before the first frame, the demultiplexer is primed with the source's
//! [`SourceCatalog`] entries older than the lookback origin. Live events
//! are never stamped before the tick following the last prefix entry, so
//! replaying the timeline in order always ends on the live state.
//!
//! One engine handles one (logical source, segment) pair. It is
//! single-threaded; parallelism comes from running several engines (see
//! [`JobDriver`](crate::job::JobDriver)).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lectern_core::{
    Applied, CanonicalEvent, DeckRegistry, PresentationState, TickSpan, Timestamp,
};

use crate::catalog::SourceCatalog;
use crate::config::EngineConfig;
use crate::demux::{DemuxConfig, Demultiplexer};
use crate::interleave::Interleaver;
use crate::lookback::LookbackBuffer;
use crate::source::{FrameSource, SourceError};
use crate::timeline::Timeline;
use crate::warning::ReplayWarning;
use crate::wire::{self, WireFormat};

/// Cooperative cancellation flag, polled between frames.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One (logical source, segment) unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRequest {
    pub source: String,
    /// Known wire format; taken from the first decodable frame otherwise.
    pub format: Option<WireFormat>,
    /// Absolute session start, the earliest possible lookback origin.
    pub session_start: Timestamp,
    pub start: Timestamp,
    pub end: Timestamp,
}

/// How this segment's clock maps onto the job's output clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StitchParams {
    pub previous_segment_end: Option<Timestamp>,
    pub job_reference_start: Timestamp,
    /// Sum of the gaps between all earlier segments.
    pub cumulative_prior_offset: TickSpan,
}

impl StitchParams {
    /// Parameters for a segment replayed on its own.
    pub fn standalone(start: Timestamp) -> Self {
        Self {
            previous_segment_end: None,
            job_reference_start: start,
            cumulative_prior_offset: TickSpan::ZERO,
        }
    }

    /// Translate a recording timestamp to job output time.
    pub fn translate(&self, ts: Timestamp) -> Timestamp {
        Timestamp(ts.ticks() - self.job_reference_start.ticks() - self.cumulative_prior_offset.ticks())
    }
}

/// Counters for one segment run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentStats {
    pub frames_read: u64,
    pub decode_failures: u64,
    /// Frames decoded before `start` (lookback only)
    pub lookback_frames: u64,
    /// Events emitted as the initial-state prefix
    pub prefix_events: u64,
    /// Events emitted at their own timestamps
    pub live_events: u64,
    /// Events that changed nothing and were left out
    pub suppressed_events: u64,
    /// Catalog entries recorded before the origin and fed to the demultiplexer
    pub primed_entries: u64,
    pub index_gaps: u64,
}

/// Result of one segment run.
#[derive(Debug)]
pub struct SegmentOutput {
    pub source: String,
    /// Format used for the run; `None` when nothing decoded.
    pub format: Option<WireFormat>,
    pub timeline: Timeline,
    pub decks: DeckRegistry,
    pub warnings: Vec<ReplayWarning>,
    pub stats: SegmentStats,
    pub cancelled: bool,
    /// Display state at the end of the segment.
    pub final_state: PresentationState,
}

pub struct ReconstructionEngine {
    config: EngineConfig,
    cancel: CancelFlag,
    catalog: Option<Arc<SourceCatalog>>,
}

/// Mutable run state shared by the emit paths.
struct Run<'a> {
    stitch: &'a StitchParams,
    state: PresentationState,
    timeline: Timeline,
    warnings: Vec<ReplayWarning>,
    stats: SegmentStats,
    /// Earliest stamp left for live events once a prefix was emitted.
    live_floor: Option<Timestamp>,
}

impl Run<'_> {
    /// Apply to state and append to the timeline if anything changed.
    fn emit(&mut self, at: Timestamp, event: CanonicalEvent) -> bool {
        match self.state.apply(&event) {
            Applied::Changed => {
                self.timeline.push(at, event);
                true
            }
            Applied::NoOp => {
                self.stats.suppressed_events += 1;
                false
            }
            Applied::DuplicateStroke => {
                if let CanonicalEvent::StrokeAdd { stroke_id, slide, .. } = event {
                    log::warn!("Duplicate stroke {stroke_id} on {slide}; keeping first");
                    self.warnings.push(ReplayWarning::DuplicateStroke { stroke: stroke_id, slide });
                }
                false
            }
        }
    }

    fn emit_prefix(&mut self, start: Timestamp, lookback: LookbackBuffer) {
        let origin = self.stitch.translate(start);
        let mut k = 0;
        for event in lookback.finish() {
            if self.emit(origin.offset_ticks(k), event) {
                k += 1;
            }
        }
        self.stats.prefix_events = k as u64;
        if k > 0 {
            self.live_floor = Some(origin.offset_ticks(k));
        }
    }

    fn live_stamp(&self, ts: Timestamp) -> Timestamp {
        let at = self.stitch.translate(ts);
        self.live_floor.map_or(at, |floor| at.max(floor))
    }
}

impl ReconstructionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, cancel: CancelFlag::new(), catalog: None }
    }

    pub fn with_cancel(config: EngineConfig, cancel: CancelFlag) -> Self {
        Self { config, cancel, catalog: None }
    }

    /// Use a catalog scanned elsewhere instead of scanning the source.
    pub fn with_catalog(mut self, catalog: Arc<SourceCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Earliest recording time replayed for `request`.
    pub fn lookback_origin(&self, request: &SegmentRequest, stitch: &StitchParams) -> Timestamp {
        let mut origin = request.session_start;
        if let Some(prev) = stitch.previous_segment_end {
            origin = origin.max(prev);
        }
        if let Some(limit) = self.config.max_lookback {
            origin = origin.max(request.start - limit);
        }
        origin.min(request.start)
    }

    /// Catalog entries the run must prime from. Without a shared catalog
    /// the source is scanned over `[session_start, origin)`.
    fn catalog_for(
        &self,
        frames: &dyn FrameSource,
        request: &SegmentRequest,
        origin: Timestamp,
    ) -> Result<Option<Arc<SourceCatalog>>, SourceError> {
        if origin <= request.session_start {
            return Ok(None);
        }
        if let Some(catalog) = &self.catalog {
            return Ok(Some(Arc::clone(catalog)));
        }
        // Index formats address slides directly.
        if matches!(request.format, Some(WireFormat::IndexNav | WireFormat::IndexCapability)) {
            return Ok(None);
        }
        let catalog = SourceCatalog::scan(frames, &request.source, request.session_start, origin, &self.cancel)?;
        Ok(Some(Arc::new(catalog)))
    }

    pub fn run(
        &mut self,
        frames: &dyn FrameSource,
        request: &SegmentRequest,
        stitch: &StitchParams,
    ) -> Result<SegmentOutput, SourceError> {
        let origin = self.lookback_origin(request, stitch);
        let mut merged = Interleaver::new(frames.open(&request.source, origin, request.end)?);
        log::debug!(
            "Segment {} [{}, {}) for {}: origin {}, {} sub-streams",
            stitch.translate(request.start),
            request.start,
            request.end,
            request.source,
            origin,
            merged.sub_stream_count()
        );

        let catalog = self.catalog_for(frames, request, origin)?;
        let demux_config = DemuxConfig { filter_heartbeats: self.config.filter_heartbeats };
        let mut primed_entries = 0u64;
        let mut new_demux = |format: WireFormat| {
            let mut demux = Demultiplexer::new(format, demux_config);
            if let Some(catalog) = &catalog {
                primed_entries = catalog.before(origin).filter(|entry| demux.prime(entry)).count() as u64;
                log::debug!("Primed {format} demultiplexer for {} with {primed_entries} entries", request.source);
            }
            demux
        };
        let mut demux = request.format.map(&mut new_demux);
        let mut lookback = (origin < request.start).then(LookbackBuffer::new);
        let mut run = Run {
            stitch,
            state: PresentationState::new(),
            timeline: Timeline::new(),
            warnings: Vec::new(),
            stats: SegmentStats::default(),
            live_floor: None,
        };
        let mut cancelled = false;

        while let Some(sourced) = merged.next_frame() {
            if self.cancel.is_cancelled() {
                log::info!("Segment for {} cancelled after {} frames", request.source, run.stats.frames_read);
                cancelled = true;
                break;
            }
            let frame = sourced.frame;
            run.stats.frames_read += 1;

            if frame.timestamp >= request.start {
                if let Some(buffer) = lookback.take() {
                    run.emit_prefix(request.start, buffer);
                }
            }

            let msg = match wire::decode(&frame.payload, None) {
                Ok(msg) => msg,
                Err(e) => {
                    log::debug!("Dropping frame {} of sub-stream {}: {e}", frame.index, sourced.sub_stream);
                    run.stats.decode_failures += 1;
                    continue;
                }
            };
            let demux = demux.get_or_insert_with(|| {
                log::info!("Source {} identified as {}", request.source, msg.format());
                new_demux(msg.format())
            });
            let events = demux.translate(&msg);

            match lookback.as_mut() {
                Some(buffer) => {
                    run.stats.lookback_frames += 1;
                    buffer.extend(events);
                }
                None => {
                    let at = run.live_stamp(frame.timestamp);
                    for event in events {
                        if run.emit(at, event) {
                            run.stats.live_events += 1;
                        }
                    }
                }
            }
        }

        // Stream ended before reaching `start`.
        if let Some(buffer) = lookback.take().filter(|_| !cancelled) {
            run.emit_prefix(request.start, buffer);
        }

        run.stats.index_gaps = merged.gap_count();
        run.stats.primed_entries = primed_entries;
        let mut warnings = Vec::new();
        if run.stats.frames_read == 0 && !cancelled {
            log::warn!("No presentation frames for {} in [{}, {})", request.source, origin, request.end);
            warnings.push(ReplayWarning::MissingSource { source: request.source.clone() });
        }
        if self.config.report_index_gaps {
            warnings.extend(merged.take_gaps());
        }
        if run.stats.decode_failures > 0 {
            warnings.push(ReplayWarning::DecodeFailures { count: run.stats.decode_failures });
        }

        let format = demux.as_ref().map(Demultiplexer::format);
        let decks = match demux {
            Some(d) => {
                let (decks, demux_warnings) = d.finish();
                warnings.extend(demux_warnings);
                decks
            }
            None => DeckRegistry::new(),
        };
        warnings.append(&mut run.warnings);

        log::info!(
            "Segment for {} done: {} frames, {} prefix + {} events, {} warnings{}",
            request.source,
            run.stats.frames_read,
            run.stats.prefix_events,
            run.stats.live_events,
            warnings.len(),
            if cancelled { " (cancelled)" } else { "" }
        );

        Ok(SegmentOutput {
            source: request.source.clone(),
            format,
            timeline: run.timeline,
            decks,
            warnings,
            stats: run.stats,
            cancelled,
            final_state: run.state,
        })
    }
}
