//! Raw frame sources.
//!
//! A logical source opens as a set of sub-streams, each yielding frames
//! in ascending timestamp order. Ordering across sub-streams is left to
//! the [`Interleaver`](crate::interleave::Interleaver).

use std::collections::HashMap;
use std::collections::VecDeque;

use lectern_core::Timestamp;

/// One recorded presentation frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub timestamp: Timestamp,
    /// Per-sub-stream sequence number; expected to increase by one.
    pub index: u64,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(timestamp: Timestamp, index: u64, payload: Vec<u8>) -> Self {
        Self { timestamp, index, payload }
    }
}

/// One ordered stream of frames.
pub trait SubStream {
    fn peek_next_timestamp(&mut self) -> Option<Timestamp>;
    fn next_frame(&mut self) -> Option<Frame>;
}

/// Provider of sub-streams for a logical source and time range.
pub trait FrameSource {
    /// Open every sub-stream of `source` restricted to `[start, end)`.
    ///
    /// An unknown source opens as an empty set of sub-streams.
    fn open(
        &self,
        source: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Box<dyn SubStream + Send>>, SourceError>;
}

/// Frame source errors.
#[derive(Debug)]
pub enum SourceError {
    /// Underlying storage could not be read
    Io(std::io::Error),
    /// A stored record failed verification or decoding
    Corrupt(String),
    /// Sub-stream violates ascending timestamp order
    Unordered { sub_stream: usize, previous: Timestamp, found: Timestamp },
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Io(e) => write!(f, "Frame source I/O error: {e}"),
            SourceError::Corrupt(e) => write!(f, "Corrupt frame record: {e}"),
            SourceError::Unordered { sub_stream, previous, found } => write!(
                f,
                "Sub-stream {sub_stream} out of order: {found} after {previous}"
            ),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        SourceError::Io(e)
    }
}

// ─── In-memory implementation ───────────────────────────────────────────────

/// Sub-stream over an owned frame queue.
#[derive(Debug, Default)]
pub struct VecSubStream {
    frames: VecDeque<Frame>,
}

impl VecSubStream {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames: frames.into() }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl SubStream for VecSubStream {
    fn peek_next_timestamp(&mut self) -> Option<Timestamp> {
        self.frames.front().map(|f| f.timestamp)
    }

    fn next_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }
}

/// Frame source holding every sub-stream in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryFrameSource {
    sources: HashMap<String, Vec<Vec<Frame>>>,
}

impl MemoryFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sub-stream to `source`. Frames must be in ascending
    /// timestamp order.
    pub fn add_sub_stream(&mut self, source: &str, frames: Vec<Frame>) -> Result<(), SourceError> {
        let streams = self.sources.entry(source.to_string()).or_default();
        let sub_stream = streams.len();
        check_ordered(sub_stream, &frames)?;
        streams.push(frames);
        Ok(())
    }

    /// Builder form of [`add_sub_stream`](Self::add_sub_stream); frames
    /// are sorted by timestamp first.
    pub fn with_sub_stream(mut self, source: &str, mut frames: Vec<Frame>) -> Self {
        frames.sort_by_key(|f| f.timestamp);
        self.sources.entry(source.to_string()).or_default().push(frames);
        self
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn sub_streams(&self, source: &str) -> &[Vec<Frame>] {
        self.sources.get(source).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl FrameSource for MemoryFrameSource {
    fn open(
        &self,
        source: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Box<dyn SubStream + Send>>, SourceError> {
        Ok(self
            .sub_streams(source)
            .iter()
            .map(|frames| {
                let window = frames
                    .iter()
                    .filter(|f| f.timestamp >= start && f.timestamp < end)
                    .cloned()
                    .collect();
                Box::new(VecSubStream::new(window)) as Box<dyn SubStream + Send>
            })
            .collect())
    }
}

pub(crate) fn check_ordered(sub_stream: usize, frames: &[Frame]) -> Result<(), SourceError> {
    for pair in frames.windows(2) {
        if pair[1].timestamp < pair[0].timestamp {
            return Err(SourceError::Unordered {
                sub_stream,
                previous: pair[0].timestamp,
                found: pair[1].timestamp,
            });
        }
    }
    Ok(())
}
