//! File-backed frame archive.
//!
//! Layout:
//! ```text
//! ┌──────────┬─────────────────────┬─────────────────────┬─────┐
//! │ magic(8) │ len(u32 LE) record  │ len(u32 LE) record  │ ... │
//! └──────────┴─────────────────────┴─────────────────────┴─────┘
//!
//! record = bincode { source, sub_stream, timestamp, index,
//!                    original_size, LZ4(payload), checksum }
//! ```
//!
//! Records are appended in recording order. On open, every record is
//! verified; corrupted records are skipped and counted (or rejected,
//! see [`ArchiveConfig::skip_corrupt`]) and a truncated tail ends the
//! archive, as with write-ahead-log recovery.
//!
//! Performance targets:
//! - Append: <10μs per 1KB frame (buffered, LZ4 block mode)
//! - Open + verify 100k frames: <500ms

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use lectern_core::Timestamp;

use crate::source::{Frame, FrameSource, MemoryFrameSource, SourceError, SubStream};

const MAGIC: &[u8; 8] = b"LECTARC\x01";

/// One stored frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub source: String,
    pub sub_stream: u32,
    pub timestamp: Timestamp,
    pub index: u64,
    /// Uncompressed payload size in bytes
    pub original_size: u32,
    /// LZ4-compressed payload (size-prepended)
    pub compressed: Vec<u8>,
    pub checksum: u32,
}

impl ArchiveRecord {
    pub fn new(source: &str, sub_stream: u32, frame: &Frame) -> Self {
        let compressed = lz4_flex::compress_prepend_size(&frame.payload);
        let checksum = Self::compute_checksum(source, sub_stream, frame.timestamp, frame.index, &compressed);
        Self {
            source: source.to_string(),
            sub_stream,
            timestamp: frame.timestamp,
            index: frame.index,
            original_size: frame.payload.len() as u32,
            compressed,
            checksum,
        }
    }

    pub fn verify(&self) -> bool {
        self.checksum
            == Self::compute_checksum(
                &self.source,
                self.sub_stream,
                self.timestamp,
                self.index,
                &self.compressed,
            )
    }

    /// FNV-1a style fold over every field.
    fn compute_checksum(
        source: &str,
        sub_stream: u32,
        timestamp: Timestamp,
        index: u64,
        compressed: &[u8],
    ) -> u32 {
        const PRIME: u32 = 0x0100_0193;
        let mut hash: u32 = 0x811c_9dc5;
        let mut mix = |word: u32| {
            hash ^= word;
            hash = hash.wrapping_mul(PRIME);
        };
        for byte in source.as_bytes() {
            mix(*byte as u32);
        }
        mix(sub_stream);
        let ticks = timestamp.ticks() as u64;
        mix(ticks as u32);
        mix((ticks >> 32) as u32);
        mix(index as u32);
        mix((index >> 32) as u32);
        for chunk in compressed.chunks(4) {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            mix(u32::from_le_bytes(word));
        }
        hash
    }

    pub fn frame(&self) -> Result<Frame, ArchiveError> {
        let payload = lz4_flex::decompress_size_prepended(&self.compressed)
            .map_err(|e| ArchiveError::Decompress(e.to_string()))?;
        Ok(Frame::new(self.timestamp, self.index, payload))
    }

    pub fn encode(&self) -> Result<Vec<u8>, ArchiveError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ArchiveError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let (record, _): (Self, _) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| ArchiveError::Decode(e.to_string()))?;
        Ok(record)
    }
}

/// Archive configuration.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Write buffer capacity (bytes). Default: 64KB.
    pub write_buffer: usize,
    /// Skip records that fail verification instead of failing the open.
    /// Default: true.
    pub skip_corrupt: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self { write_buffer: 64 * 1024, skip_corrupt: true }
    }
}

impl ArchiveConfig {
    /// Config for testing (small buffer, corruption is an error).
    pub fn for_testing() -> Self {
        Self { write_buffer: 256, skip_corrupt: false }
    }
}

/// Archive errors.
#[derive(Debug)]
pub enum ArchiveError {
    Io(std::io::Error),
    /// File does not start with the archive magic
    BadMagic,
    Encode(String),
    Decode(String),
    Decompress(String),
    /// Record failed checksum verification
    ChecksumMismatch { record: u64 },
    /// Stored sub-stream is not in timestamp order
    Source(SourceError),
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveError::Io(e) => write!(f, "Archive I/O error: {e}"),
            ArchiveError::BadMagic => write!(f, "Not a frame archive"),
            ArchiveError::Encode(e) => write!(f, "Archive encode error: {e}"),
            ArchiveError::Decode(e) => write!(f, "Archive decode error: {e}"),
            ArchiveError::Decompress(e) => write!(f, "Archive decompression failed: {e}"),
            ArchiveError::ChecksumMismatch { record } => {
                write!(f, "Archive checksum mismatch at record {record}")
            }
            ArchiveError::Source(e) => write!(f, "Archive content error: {e}"),
        }
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArchiveError::Io(e) => Some(e),
            ArchiveError::Source(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(e: std::io::Error) -> Self {
        ArchiveError::Io(e)
    }
}

// ─── Writer ─────────────────────────────────────────────────────────────────

/// Totals reported by [`ArchiveWriter::finish`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub records: u64,
    pub payload_bytes: u64,
    pub stored_bytes: u64,
}

impl ArchiveSummary {
    /// Overall compression ratio (original / stored).
    pub fn compression_ratio(&self) -> f64 {
        if self.stored_bytes == 0 {
            return 0.0;
        }
        self.payload_bytes as f64 / self.stored_bytes as f64
    }
}

pub struct ArchiveWriter {
    out: BufWriter<File>,
    path: PathBuf,
    summary: ArchiveSummary,
}

impl ArchiveWriter {
    pub fn create(path: impl AsRef<Path>, config: &ArchiveConfig) -> Result<Self, ArchiveError> {
        let path = path.as_ref().to_path_buf();
        let mut out = BufWriter::with_capacity(config.write_buffer, File::create(&path)?);
        out.write_all(MAGIC)?;
        Ok(Self { out, path, summary: ArchiveSummary::default() })
    }

    /// Append one frame; returns its record number.
    pub fn append(&mut self, source: &str, sub_stream: u32, frame: &Frame) -> Result<u64, ArchiveError> {
        let record = ArchiveRecord::new(source, sub_stream, frame);
        let bytes = record.encode()?;
        self.out.write_all(&(bytes.len() as u32).to_le_bytes())?;
        self.out.write_all(&bytes)?;

        let n = self.summary.records;
        self.summary.records += 1;
        self.summary.payload_bytes += frame.payload.len() as u64;
        self.summary.stored_bytes += record.compressed.len() as u64;
        Ok(n)
    }

    /// Append every frame of a sub-stream.
    pub fn append_all<'a>(
        &mut self,
        source: &str,
        sub_stream: u32,
        frames: impl IntoIterator<Item = &'a Frame>,
    ) -> Result<(), ArchiveError> {
        for frame in frames {
            self.append(source, sub_stream, frame)?;
        }
        Ok(())
    }

    /// Flush and sync to disk.
    pub fn finish(mut self) -> Result<ArchiveSummary, ArchiveError> {
        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        log::info!(
            "Archive {} written: {} records, {:.1}:1 compression",
            self.path.display(),
            self.summary.records,
            self.summary.compression_ratio()
        );
        Ok(self.summary)
    }
}

// ─── Reader ─────────────────────────────────────────────────────────────────

/// Verified, fully loaded archive.
#[derive(Debug)]
pub struct FrameArchive {
    frames: MemoryFrameSource,
    records: u64,
    corrupted: u64,
}

impl FrameArchive {
    pub fn open(path: impl AsRef<Path>, config: &ArchiveConfig) -> Result<Self, ArchiveError> {
        let mut bytes = Vec::new();
        File::open(path.as_ref())?.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes, config)
    }

    pub fn from_bytes(bytes: &[u8], config: &ArchiveConfig) -> Result<Self, ArchiveError> {
        let body = bytes.strip_prefix(MAGIC.as_slice()).ok_or(ArchiveError::BadMagic)?;

        let mut streams: BTreeMap<String, BTreeMap<u32, Vec<Frame>>> = BTreeMap::new();
        let mut records = 0u64;
        let mut corrupted = 0u64;
        let mut rest = body;
        while !rest.is_empty() {
            let Some((record_bytes, tail)) = split_record(rest) else {
                log::warn!("Archive truncated after {records} records");
                break;
            };
            let record_no = records + corrupted;
            rest = tail;
            match Self::load_record(record_bytes, record_no) {
                Ok((record, frame)) => {
                    streams
                        .entry(record.source)
                        .or_default()
                        .entry(record.sub_stream)
                        .or_default()
                        .push(frame);
                    records += 1;
                }
                Err(e) if config.skip_corrupt => {
                    log::warn!("Skipping archive record {record_no}: {e}");
                    corrupted += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let mut frames = MemoryFrameSource::new();
        for (source, subs) in streams {
            for (_, list) in subs {
                frames.add_sub_stream(&source, list).map_err(ArchiveError::Source)?;
            }
        }
        Ok(Self { frames, records, corrupted })
    }

    fn load_record(bytes: &[u8], record_no: u64) -> Result<(ArchiveRecord, Frame), ArchiveError> {
        let record = ArchiveRecord::decode(bytes)?;
        if !record.verify() {
            return Err(ArchiveError::ChecksumMismatch { record: record_no });
        }
        let frame = record.frame()?;
        Ok((record, frame))
    }

    /// Logical sources present, sorted.
    pub fn sources(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.frames.sources().collect();
        names.sort_unstable();
        names
    }

    /// All frames of `source` in timestamp order (merged across sub-streams).
    pub fn payloads(&self, source: &str) -> Vec<&Frame> {
        let mut all: Vec<&Frame> = self.frames.sub_streams(source).iter().flatten().collect();
        all.sort_by_key(|f| f.timestamp);
        all
    }

    /// Earliest and latest frame timestamps over all sources.
    pub fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        let mut range: Option<(Timestamp, Timestamp)> = None;
        for source in self.frames.sources() {
            for frame in self.frames.sub_streams(source).iter().flatten() {
                let t = frame.timestamp;
                range = Some(match range {
                    None => (t, t),
                    Some((lo, hi)) => (lo.min(t), hi.max(t)),
                });
            }
        }
        range
    }

    pub fn record_count(&self) -> u64 {
        self.records
    }

    pub fn corrupted(&self) -> u64 {
        self.corrupted
    }
}

fn split_record(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let (len, rest) = bytes.split_first_chunk::<4>()?;
    let len = u32::from_le_bytes(*len) as usize;
    if rest.len() < len {
        return None;
    }
    Some(rest.split_at(len))
}

impl FrameSource for FrameArchive {
    fn open(
        &self,
        source: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Box<dyn SubStream + Send>>, SourceError> {
        self.frames.open(source, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn frame(t: i64, i: u64, payload: &[u8]) -> Frame {
        Frame::new(Timestamp(t), i, payload.to_vec())
    }

    #[test]
    fn test_record_checksum_integrity() {
        let record = ArchiveRecord::new("inst", 0, &frame(10, 1, b"payload"));
        assert!(record.verify());

        let mut corrupted = record.clone();
        corrupted.index = 2;
        assert!(!corrupted.verify());

        let mut corrupted = record.clone();
        corrupted.compressed[0] ^= 0xFF;
        assert!(!corrupted.verify());
    }

    #[test]
    fn test_write_then_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.lec");
        let config = ArchiveConfig::for_testing();

        let mut writer = ArchiveWriter::create(&path, &config).unwrap();
        writer.append("inst", 0, &frame(1, 0, b"a")).unwrap();
        writer.append("inst", 1, &frame(2, 0, b"b")).unwrap();
        writer.append("display", 0, &frame(3, 0, b"c")).unwrap();
        writer.append("inst", 0, &frame(4, 1, &[7u8; 512])).unwrap();
        let summary = writer.finish().unwrap();
        assert_eq!(summary.records, 4);
        assert!(summary.compression_ratio() > 1.0);

        let archive = FrameArchive::open(&path, &config).unwrap();
        assert_eq!(archive.record_count(), 4);
        assert_eq!(archive.sources(), vec!["display", "inst"]);
        assert_eq!(archive.time_range(), Some((Timestamp(1), Timestamp(4))));

        let streams = archive.open("inst", Timestamp(0), Timestamp(10)).unwrap();
        assert_eq!(streams.len(), 2);
        let payloads: Vec<_> = archive.payloads("inst").iter().map(|f| f.payload.len()).collect();
        assert_eq!(payloads, vec![1, 1, 512]);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let err = FrameArchive::from_bytes(b"NOTANARCHIVE", &ArchiveConfig::default()).unwrap_err();
        assert!(matches!(err, ArchiveError::BadMagic));
    }

    #[test]
    fn test_truncated_tail_ends_archive() {
        let record = ArchiveRecord::new("inst", 0, &frame(1, 0, b"x")).encode().unwrap();
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&(record.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&record);
        bytes.extend_from_slice(&(record.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&record[..record.len() / 2]);

        let archive = FrameArchive::from_bytes(&bytes, &ArchiveConfig::for_testing()).unwrap();
        assert_eq!(archive.record_count(), 1);
    }

    #[test]
    fn test_corrupt_record_skipped_or_rejected() {
        let good = ArchiveRecord::new("inst", 0, &frame(1, 0, b"ok"));
        let mut bad = ArchiveRecord::new("inst", 0, &frame(2, 1, b"bad"));
        bad.checksum ^= 1;
        let mut bytes = MAGIC.to_vec();
        for r in [&good, &bad] {
            let enc = r.encode().unwrap();
            bytes.extend_from_slice(&(enc.len() as u32).to_le_bytes());
            bytes.extend_from_slice(&enc);
        }

        let lenient = FrameArchive::from_bytes(&bytes, &ArchiveConfig::default()).unwrap();
        assert_eq!((lenient.record_count(), lenient.corrupted()), (1, 1));

        let strict = FrameArchive::from_bytes(&bytes, &ArchiveConfig::for_testing()).unwrap_err();
        assert!(matches!(strict, ArchiveError::ChecksumMismatch { record: 1 }));
    }
}
