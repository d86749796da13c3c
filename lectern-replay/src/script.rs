//! Replay script serialization (JSON Lines).
//!
//! One line per timeline entry:
//! ```text
//! {"time":"00:01:02.500","ticks":625000000,"seq":17,"kind":"StrokeAdd",
//!  "slide":"<deck>#3","payload":"<base64 of bincode CanonicalEvent>"}
//! ```
//! `time`, `kind` and `slide` are informational; `ticks`, `seq` and
//! `payload` are authoritative when reading back.

use std::io::{BufRead, Write};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use lectern_core::{CanonicalEvent, Timestamp};

use crate::timeline::{Timeline, TimelineEntry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub time: String,
    pub ticks: i64,
    pub seq: u64,
    pub kind: String,
    pub slide: Option<String>,
    pub payload: String,
}

impl ScriptRecord {
    pub fn from_entry(entry: &TimelineEntry) -> Result<Self, ScriptError> {
        let bytes = bincode::serde::encode_to_vec(&entry.event, bincode::config::standard())
            .map_err(|e| ScriptError::Encode(e.to_string()))?;
        Ok(Self {
            time: entry.timestamp.clock_string(),
            ticks: entry.timestamp.ticks(),
            seq: entry.sequence,
            kind: entry.event.kind().to_string(),
            slide: entry.event.slide().map(|s| s.to_string()),
            payload: BASE64.encode(bytes),
        })
    }

    pub fn to_entry(&self) -> Result<TimelineEntry, ScriptError> {
        let bytes = BASE64
            .decode(&self.payload)
            .map_err(|e| ScriptError::Payload(e.to_string()))?;
        let (event, used): (CanonicalEvent, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| ScriptError::Payload(e.to_string()))?;
        if used != bytes.len() {
            return Err(ScriptError::Payload(format!(
                "{} trailing bytes after event",
                bytes.len() - used
            )));
        }
        Ok(TimelineEntry { timestamp: Timestamp(self.ticks), sequence: self.seq, event })
    }
}

/// Script errors.
#[derive(Debug)]
pub enum ScriptError {
    Io(std::io::Error),
    /// Event could not be encoded
    Encode(String),
    /// Line is not a valid script record
    Json { line: usize, reason: String },
    /// Record payload could not be decoded
    Payload(String),
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptError::Io(e) => write!(f, "Script I/O error: {e}"),
            ScriptError::Encode(e) => write!(f, "Script encode error: {e}"),
            ScriptError::Json { line, reason } => write!(f, "Script line {line}: {reason}"),
            ScriptError::Payload(e) => write!(f, "Script payload error: {e}"),
        }
    }
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScriptError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ScriptError {
    fn from(e: std::io::Error) -> Self {
        ScriptError::Io(e)
    }
}

// ─── Writer ─────────────────────────────────────────────────────────────────

pub struct ScriptWriter<W: Write> {
    out: W,
    written: u64,
}

impl<W: Write> ScriptWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn write_entry(&mut self, entry: &TimelineEntry) -> Result<(), ScriptError> {
        let record = ScriptRecord::from_entry(entry)?;
        serde_json::to_writer(&mut self.out, &record)
            .map_err(|e| ScriptError::Encode(e.to_string()))?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Sort the timeline and write every entry.
    pub fn write_timeline(&mut self, timeline: &mut Timeline) -> Result<(), ScriptError> {
        timeline.sort();
        for entry in timeline.entries() {
            self.write_entry(entry)?;
        }
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn finish(mut self) -> Result<W, ScriptError> {
        self.out.flush()?;
        Ok(self.out)
    }
}

// ─── Reader ─────────────────────────────────────────────────────────────────

/// Iterator over the entries of a script. Blank lines are skipped.
pub struct ScriptReader<R: BufRead> {
    lines: std::io::Lines<R>,
    line: usize,
}

impl<R: BufRead> ScriptReader<R> {
    pub fn new(input: R) -> Self {
        Self { lines: input.lines(), line: 0 }
    }

    /// Read the remaining entries, stopping at the first error.
    pub fn read_all(self) -> Result<Vec<TimelineEntry>, ScriptError> {
        self.collect()
    }
}

impl<R: BufRead> Iterator for ScriptReader<R> {
    type Item = Result<TimelineEntry, ScriptError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;
            if line.trim().is_empty() {
                continue;
            }
            let record: ScriptRecord = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(e) => {
                    return Some(Err(ScriptError::Json { line: self.line, reason: e.to_string() }))
                }
            };
            return Some(record.to_entry());
        }
    }
}
