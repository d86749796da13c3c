//! K-way merge of sub-streams into one ascending frame sequence.
//!
//! ```text
//!   sub 0: 1 ── 3 ── 5
//!   sub 1: 2 ── 4 ── 6        ──►   1 2 3 4 5 6
//! ```
//!
//! Ties go to the lowest sub-stream index. The number of sub-streams is
//! small (a handful per source), so the selection is a linear scan over
//! peeked heads.

use lectern_core::Timestamp;

use crate::source::{Frame, SubStream};
use crate::warning::ReplayWarning;

/// Frame plus the sub-stream it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedFrame {
    pub sub_stream: usize,
    pub frame: Frame,
}

pub struct Interleaver {
    streams: Vec<Box<dyn SubStream + Send>>,
    last_index: Vec<Option<u64>>,
    gaps: Vec<ReplayWarning>,
    gap_count: u64,
}

impl Interleaver {
    pub fn new(streams: Vec<Box<dyn SubStream + Send>>) -> Self {
        let last_index = vec![None; streams.len()];
        Self { streams, last_index, gaps: Vec::new(), gap_count: 0 }
    }

    pub fn sub_stream_count(&self) -> usize {
        self.streams.len()
    }

    fn select(&mut self) -> Option<(usize, Timestamp)> {
        let mut best: Option<(usize, Timestamp)> = None;
        for (i, stream) in self.streams.iter_mut().enumerate() {
            if let Some(ts) = stream.peek_next_timestamp() {
                if best.map_or(true, |(_, b)| ts < b) {
                    best = Some((i, ts));
                }
            }
        }
        best
    }

    /// Timestamp of the frame [`next_frame`](Self::next_frame) would return.
    pub fn peek_timestamp(&mut self) -> Option<Timestamp> {
        self.select().map(|(_, ts)| ts)
    }

    /// Next frame across all sub-streams, or `None` once all are drained.
    pub fn next_frame(&mut self) -> Option<SourcedFrame> {
        let (sub_stream, _) = self.select()?;
        let frame = self.streams[sub_stream].next_frame()?;
        self.track_index(sub_stream, frame.index);
        Some(SourcedFrame { sub_stream, frame })
    }

    fn track_index(&mut self, sub_stream: usize, index: u64) {
        if let Some(prev) = self.last_index[sub_stream] {
            let expected = prev.wrapping_add(1);
            if index != expected {
                log::warn!(
                    "Frame index gap on sub-stream {sub_stream}: expected {expected}, found {index}"
                );
                self.gap_count += 1;
                self.gaps.push(ReplayWarning::IndexGap { sub_stream, expected, found: index });
            }
        }
        self.last_index[sub_stream] = Some(index);
    }

    /// Index discontinuities seen so far.
    pub fn gap_count(&self) -> u64 {
        self.gap_count
    }

    /// Drain recorded gap warnings.
    pub fn take_gaps(&mut self) -> Vec<ReplayWarning> {
        std::mem::take(&mut self.gaps)
    }
}

impl Iterator for Interleaver {
    type Item = SourcedFrame;

    fn next(&mut self) -> Option<SourcedFrame> {
        self.next_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::VecSubStream;

    fn stream(entries: &[(i64, u64)]) -> Box<dyn SubStream + Send> {
        Box::new(VecSubStream::new(
            entries
                .iter()
                .map(|(t, i)| Frame::new(Timestamp(*t), *i, Vec::new()))
                .collect(),
        ))
    }

    #[test]
    fn test_merges_by_timestamp() {
        let merged: Vec<i64> = Interleaver::new(vec![
            stream(&[(1, 0), (3, 1), (5, 2)]),
            stream(&[(2, 0), (4, 1), (6, 2)]),
        ])
        .map(|f| f.frame.timestamp.ticks())
        .collect();
        assert_eq!(merged, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_ties_prefer_lower_sub_stream() {
        let order: Vec<usize> = Interleaver::new(vec![stream(&[(7, 0)]), stream(&[(7, 0)]), stream(&[(7, 0)])])
            .map(|f| f.sub_stream)
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_index_gap_reported_and_continues() {
        let mut merged = Interleaver::new(vec![stream(&[(1, 10), (2, 11), (3, 14), (4, 15)])]);
        let count = merged.by_ref().count();
        assert_eq!(count, 4);
        assert_eq!(merged.gap_count(), 1);
        assert_eq!(
            merged.take_gaps(),
            vec![ReplayWarning::IndexGap { sub_stream: 0, expected: 12, found: 14 }]
        );
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut merged = Interleaver::new(vec![stream(&[(4, 0)]), stream(&[(2, 0)])]);
        assert_eq!(merged.peek_timestamp(), Some(Timestamp(2)));
        assert_eq!(merged.peek_timestamp(), Some(Timestamp(2)));
        assert_eq!(merged.next_frame().unwrap().sub_stream, 1);
        assert_eq!(merged.peek_timestamp(), Some(Timestamp(4)));
    }

    #[test]
    fn test_empty_input() {
        let mut merged = Interleaver::new(Vec::new());
        assert!(merged.next_frame().is_none());
        assert_eq!(merged.sub_stream_count(), 0);
    }
}
