//! Engine and job configuration.

use serde::{Deserialize, Serialize};

use lectern_core::{TickSpan, Timestamp};

use crate::wire::WireFormat;

/// Per-engine knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Drop page-update heartbeats that repeat the previous page.
    pub filter_heartbeats: bool,
    /// Upper bound on how far before `start` lookback replays (`None` = no
    /// bound beyond the session start / previous segment end).
    pub max_lookback: Option<TickSpan>,
    /// Record a warning for every index discontinuity (always logged).
    pub report_index_gaps: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            filter_heartbeats: true,
            max_lookback: None,
            report_index_gaps: true,
        }
    }
}

impl EngineConfig {
    /// Config for testing (unbounded lookback, all diagnostics on).
    pub fn for_testing() -> Self {
        Self::default()
    }
}

/// One recorded time window of the job, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSpec {
    pub start: Timestamp,
    pub end: Timestamp,
}

/// One presentation feed of the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Logical source identifier (participant/session id).
    pub id: String,
    /// Wire format, if already known; classified from the stream otherwise.
    pub format: Option<WireFormat>,
}

/// Whole-job description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Absolute start of the recorded session (earliest lookback origin).
    pub session_start: Timestamp,
    /// Segments in recording order; they must not overlap.
    pub segments: Vec<SegmentSpec>,
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub engine: EngineConfig,
    /// Maximum engines running at once. Default: 4.
    #[serde(default = "default_workers")]
    pub max_parallel: usize,
}

fn default_workers() -> usize {
    4
}

impl JobConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Config for testing: one source, one segment.
    pub fn for_testing(source: &str, format: WireFormat, start: Timestamp, end: Timestamp) -> Self {
        Self {
            session_start: Timestamp::ZERO,
            segments: vec![SegmentSpec { start, end }],
            sources: vec![SourceSpec { id: source.to_string(), format: Some(format) }],
            engine: EngineConfig::for_testing(),
            max_parallel: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert!(config.filter_heartbeats);
        assert!(config.max_lookback.is_none());
    }

    #[test]
    fn test_job_config_from_json() {
        let json = r#"{
            "session_start": 0,
            "segments": [{"start": 1000, "end": 5000}, {"start": 9000, "end": 12000}],
            "sources": [{"id": "instructor", "format": "DocumentTree"}, {"id": "display", "format": null}]
        }"#;
        let config = JobConfig::from_json(json).unwrap();
        assert_eq!(config.segments.len(), 2);
        assert_eq!(config.segments[1].start, Timestamp(9000));
        assert_eq!(config.sources[0].format, Some(WireFormat::DocumentTree));
        assert_eq!(config.sources[1].format, None);
        assert_eq!(config.max_parallel, 4);
        assert!(config.engine.filter_heartbeats);
    }
}
