//! Live display view.
//!
//! Answers "what does the display look like at time t" for video
//! rendering. The view owns its own [`PresentationState`] and
//! demultiplexer, fed frame by frame in timestamp order; turning a
//! [`DisplaySnapshot`] into pixels is left to a [`FrameRasterizer`].

use lectern_core::{Applied, DeckRegistry, DisplaySnapshot, PresentationState, Timestamp};

use crate::config::EngineConfig;
use crate::demux::{DemuxConfig, Demultiplexer};
use crate::interleave::Interleaver;
use crate::source::{Frame, FrameSource, SourceError};
use crate::wire::{self, WireFormat};

/// External renderer of display snapshots (slide image, ink, overlays).
pub trait FrameRasterizer {
    type Output;
    type Error;

    fn rasterize(
        &mut self,
        at: Timestamp,
        snapshot: &DisplaySnapshot,
        decks: &DeckRegistry,
    ) -> Result<Self::Output, Self::Error>;
}

pub struct LiveView {
    format: Option<WireFormat>,
    config: DemuxConfig,
    demux: Option<Demultiplexer>,
    state: PresentationState,
    position: Option<Timestamp>,
    decode_failures: u64,
}

impl LiveView {
    pub fn new(format: Option<WireFormat>, config: &EngineConfig) -> Self {
        let config = DemuxConfig { filter_heartbeats: config.filter_heartbeats };
        Self {
            format,
            config,
            demux: format.map(|f| Demultiplexer::new(f, config)),
            state: PresentationState::new(),
            position: None,
            decode_failures: 0,
        }
    }

    /// Apply one frame. Frames must arrive in timestamp order; returns the
    /// number of events that changed the display.
    pub fn feed(&mut self, frame: &Frame) -> usize {
        self.position = Some(frame.timestamp);
        let msg = match wire::decode(&frame.payload, None) {
            Ok(msg) => msg,
            Err(e) => {
                log::debug!("Live view dropping frame {}: {e}", frame.index);
                self.decode_failures += 1;
                return 0;
            }
        };
        let config = self.config;
        let demux = self.demux.get_or_insert_with(|| Demultiplexer::new(msg.format(), config));
        self.format = Some(demux.format());
        demux
            .translate(&msg)
            .iter()
            .filter(|e| self.state.apply(e) == Applied::Changed)
            .count()
    }

    /// Feed every frame up to and including `t`.
    pub fn advance_to(&mut self, frames: &mut Interleaver, t: Timestamp) {
        while frames.peek_timestamp().is_some_and(|ts| ts <= t) {
            let Some(sourced) = frames.next_frame() else { break };
            self.feed(&sourced.frame);
        }
        if self.position.map_or(true, |p| p < t) {
            self.position = Some(t);
        }
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        self.state.snapshot()
    }

    pub fn state(&self) -> &PresentationState {
        &self.state
    }

    pub fn position(&self) -> Option<Timestamp> {
        self.position
    }

    pub fn format(&self) -> Option<WireFormat> {
        self.format
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }

    pub fn decks(&self) -> Option<&DeckRegistry> {
        self.demux.as_ref().map(Demultiplexer::decks)
    }

    /// Snapshots of `source` at each of `times` (ascending), replaying
    /// from `origin`.
    pub fn sample(
        frames: &dyn FrameSource,
        source: &str,
        format: Option<WireFormat>,
        origin: Timestamp,
        times: &[Timestamp],
        config: &EngineConfig,
    ) -> Result<Vec<(Timestamp, DisplaySnapshot)>, SourceError> {
        let Some(last) = times.iter().max().copied() else {
            return Ok(Vec::new());
        };
        let mut merged = Interleaver::new(frames.open(source, origin, last.offset_ticks(1))?);
        let mut view = LiveView::new(format, config);
        let mut out = Vec::with_capacity(times.len());
        for &t in times {
            view.advance_to(&mut merged, t);
            out.push((t, view.snapshot()));
        }
        Ok(out)
    }

    /// Advance to `t` and hand the snapshot to `rasterizer`.
    pub fn render<R: FrameRasterizer>(
        &mut self,
        frames: &mut Interleaver,
        t: Timestamp,
        rasterizer: &mut R,
    ) -> Result<R::Output, R::Error> {
        self.advance_to(frames, t);
        let empty = DeckRegistry::new();
        let decks = self.decks().unwrap_or(&empty);
        rasterizer.rasterize(t, &self.state.snapshot(), decks)
    }
}
