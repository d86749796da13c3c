//! Job driver: stitches recorded segments into one output timeline.
//!
//! ```text
//!  recording clock:  [s0 ── e0)     gap₁     [s1 ── e1)   gap₂   [s2 ── e2)
//!  output clock:     [0 ─ e0-s0)[e0-s0 ─ e0-s0+e1-s1)[ ... )
//!
//!  segment i:  reference = s0,  offset = gap₁ + … + gapᵢ,  previous end = eᵢ₋₁
//! ```
//!
//! One engine runs per (logical source, segment) on the blocking pool,
//! at most `max_parallel` at a time. Results are merged in (segment,
//! source) order so the output does not depend on scheduling.
//!
//! Document-tree and graph sources are scanned once for their addressing
//! [`SourceCatalog`]; every engine of that source primes from the same
//! shared copy.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use lectern_core::{DeckRegistry, Registration, TickSpan, Timestamp};

use crate::archive::ArchiveError;
use crate::catalog::SourceCatalog;
use crate::config::{JobConfig, SourceSpec};
use crate::engine::{CancelFlag, ReconstructionEngine, SegmentOutput, SegmentRequest, StitchParams};
use crate::interleave::Interleaver;
use crate::script::ScriptError;
use crate::source::{FrameSource, SourceError};
use crate::timeline::Timeline;
use crate::warning::ReplayWarning;
use crate::wire::{Classification, StreamClassifier, WireFormat};

/// Job errors (outer surfaces only; frame content never fails a job).
#[derive(Debug)]
pub enum JobError {
    /// Segments empty, inverted, or overlapping
    InvalidSegments(String),
    Source { source: String, error: SourceError },
    Archive(ArchiveError),
    Script(ScriptError),
    /// A worker task panicked or was aborted
    Join(String),
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::InvalidSegments(e) => write!(f, "Invalid segments: {e}"),
            JobError::Source { source, error } => write!(f, "Source {source}: {error}"),
            JobError::Archive(e) => write!(f, "{e}"),
            JobError::Script(e) => write!(f, "{e}"),
            JobError::Join(e) => write!(f, "Worker failed: {e}"),
        }
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JobError::Source { error, .. } => Some(error),
            JobError::Archive(e) => Some(e),
            JobError::Script(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArchiveError> for JobError {
    fn from(e: ArchiveError) -> Self {
        JobError::Archive(e)
    }
}

impl From<ScriptError> for JobError {
    fn from(e: ScriptError) -> Self {
        JobError::Script(e)
    }
}

impl From<tokio::task::JoinError> for JobError {
    fn from(e: tokio::task::JoinError) -> Self {
        JobError::Join(e.to_string())
    }
}

/// One scheduled engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    pub segment: usize,
    pub request: SegmentRequest,
    pub stitch: StitchParams,
}

/// Warning tagged with where it arose.
#[derive(Debug, Clone, PartialEq)]
pub struct JobWarning {
    pub source: String,
    /// `None` for job-level warnings (deck merge, classification).
    pub segment: Option<usize>,
    pub warning: ReplayWarning,
}

impl std::fmt::Display for JobWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.segment {
            Some(i) => write!(f, "[{} segment {i}] {}", self.source, self.warning),
            None => write!(f, "[{}] {}", self.source, self.warning),
        }
    }
}

#[derive(Debug, Default)]
pub struct JobOutput {
    pub timeline: Timeline,
    pub decks: DeckRegistry,
    pub warnings: Vec<JobWarning>,
    /// Per-run outputs in (segment, source) order, timelines drained.
    pub segments: Vec<SegmentOutput>,
    pub cancelled: bool,
}

pub struct JobDriver<S> {
    frames: Arc<S>,
    config: JobConfig,
    cancel: CancelFlag,
}

impl<S: FrameSource + Send + Sync + 'static> JobDriver<S> {
    pub fn new(frames: Arc<S>, config: JobConfig) -> Self {
        Self { frames, config, cancel: CancelFlag::new() }
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Stitching parameters for every segment, in order.
    pub fn stitch_params(&self) -> Result<Vec<StitchParams>, JobError> {
        let segments = &self.config.segments;
        let Some(first) = segments.first() else {
            return Err(JobError::InvalidSegments("no segments".into()));
        };
        let mut out = Vec::with_capacity(segments.len());
        let mut offset = TickSpan::ZERO;
        let mut previous_end: Option<Timestamp> = None;
        for (i, seg) in segments.iter().enumerate() {
            if seg.end <= seg.start {
                return Err(JobError::InvalidSegments(format!(
                    "segment {i} ends at {} before it starts at {}",
                    seg.end, seg.start
                )));
            }
            if let Some(prev) = previous_end {
                if seg.start < prev {
                    return Err(JobError::InvalidSegments(format!(
                        "segment {i} starts at {} inside the previous segment",
                        seg.start
                    )));
                }
                offset = offset + seg.start.since(prev);
            }
            out.push(StitchParams {
                previous_segment_end: previous_end,
                job_reference_start: first.start,
                cumulative_prior_offset: offset,
            });
            previous_end = Some(seg.end);
        }
        Ok(out)
    }

    /// Every engine run of the job, segment-major.
    pub fn plan(&self, formats: &[Option<WireFormat>]) -> Result<Vec<SegmentPlan>, JobError> {
        let stitches = self.stitch_params()?;
        let mut plans = Vec::new();
        for (segment, (seg, stitch)) in self.config.segments.iter().zip(stitches).enumerate() {
            for (source, format) in self.config.sources.iter().zip(formats) {
                plans.push(SegmentPlan {
                    segment,
                    request: SegmentRequest {
                        source: source.id.clone(),
                        format: *format,
                        session_start: self.config.session_start,
                        start: seg.start,
                        end: seg.end,
                    },
                    stitch,
                });
            }
        }
        Ok(plans)
    }

    /// Determine the wire format of every source lacking one.
    pub async fn classify_sources(&self) -> Result<Vec<Option<WireFormat>>, JobError> {
        let end = self.config.segments.iter().map(|s| s.end).max().unwrap_or(self.config.session_start);
        let mut formats = Vec::with_capacity(self.config.sources.len());
        for spec in &self.config.sources {
            if spec.format.is_some() {
                formats.push(spec.format);
                continue;
            }
            let frames = Arc::clone(&self.frames);
            let spec = spec.clone();
            let start = self.config.session_start;
            let format = tokio::task::spawn_blocking(move || classify_source(&*frames, &spec, start, end))
                .await??;
            formats.push(format);
        }
        Ok(formats)
    }

    /// Scan the addressing catalog of every source some segment needs
    /// one for, over `[session_start, latest lookback origin)`.
    pub async fn scan_catalogs(
        &self,
        formats: &[Option<WireFormat>],
        plans: &[SegmentPlan],
    ) -> Result<Vec<Option<Arc<SourceCatalog>>>, JobError> {
        let engine = ReconstructionEngine::new(self.config.engine.clone());
        let from = self.config.session_start;
        let mut catalogs = Vec::with_capacity(self.config.sources.len());
        for (spec, format) in self.config.sources.iter().zip(formats) {
            let addressed = matches!(format, Some(WireFormat::DocumentTree | WireFormat::GraphProtocol));
            let horizon = plans
                .iter()
                .filter(|p| p.request.source == spec.id)
                .map(|p| engine.lookback_origin(&p.request, &p.stitch))
                .max();
            let catalog = match horizon {
                Some(to) if addressed && to > from => {
                    let frames = Arc::clone(&self.frames);
                    let source = spec.id.clone();
                    let cancel = self.cancel.clone();
                    let catalog = tokio::task::spawn_blocking(move || {
                        SourceCatalog::scan(&*frames, &source, from, to, &cancel)
                    })
                    .await?
                    .map_err(|error| JobError::Source { source: spec.id.clone(), error })?;
                    log::info!("Source {} catalog: {} entries before {to}", spec.id, catalog.len());
                    Some(Arc::new(catalog))
                }
                _ => None,
            };
            catalogs.push(catalog);
        }
        Ok(catalogs)
    }

    pub async fn run(&self) -> Result<JobOutput, JobError> {
        let formats = self.classify_sources().await?;
        let plans = self.plan(&formats)?;
        let catalogs = self.scan_catalogs(&formats, &plans).await?;
        log::info!(
            "Job: {} segments × {} sources, {} runs, {} workers",
            self.config.segments.len(),
            self.config.sources.len(),
            plans.len(),
            self.config.max_parallel
        );

        let permits = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));
        let mut tasks = JoinSet::new();
        for (slot, plan) in plans.iter().cloned().enumerate() {
            let permits = Arc::clone(&permits);
            let frames = Arc::clone(&self.frames);
            let engine_config = self.config.engine.clone();
            let cancel = self.cancel.clone();
            let catalog = self
                .config
                .sources
                .iter()
                .position(|s| s.id == plan.request.source)
                .and_then(|i| catalogs.get(i).cloned().flatten());
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| JobError::Join(e.to_string()))?;
                let result = tokio::task::spawn_blocking(move || {
                    let mut engine = ReconstructionEngine::with_cancel(engine_config, cancel);
                    if let Some(catalog) = catalog {
                        engine = engine.with_catalog(catalog);
                    }
                    engine.run(&*frames, &plan.request, &plan.stitch)
                })
                .await?;
                Ok::<_, JobError>((slot, result))
            });
        }

        let mut results: Vec<Option<SegmentOutput>> = (0..plans.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (slot, result) = joined??;
            let output = result.map_err(|error| JobError::Source {
                source: plans[slot].request.source.clone(),
                error,
            })?;
            results[slot] = Some(output);
        }

        let mut job = JobOutput::default();
        for (plan, output) in plans.iter().zip(results) {
            let Some(mut output) = output else {
                return Err(JobError::Join(format!("segment {} produced no output", plan.segment)));
            };
            job.cancelled |= output.cancelled;
            for warning in output.warnings.drain(..) {
                job.warnings.push(JobWarning {
                    source: output.source.clone(),
                    segment: Some(plan.segment),
                    warning,
                });
            }
            for (guid, registration) in job.decks.merge(std::mem::take(&mut output.decks)) {
                if let Registration::Conflict { kept, rejected } = registration {
                    log::warn!("Deck {guid} conflicts across segments; keeping {kept:?}");
                    job.warnings.push(JobWarning {
                        source: output.source.clone(),
                        segment: None,
                        warning: ReplayWarning::DuplicateDeck { guid, kept, rejected },
                    });
                }
            }
            job.timeline.extend(std::mem::take(&mut output.timeline));
            job.segments.push(output);
        }
        job.timeline.sort();
        log::info!(
            "Job done: {} entries, {} decks, {} warnings",
            job.timeline.len(),
            job.decks.len(),
            job.warnings.len()
        );
        Ok(job)
    }
}

/// Scan `spec`'s frames until the classifier identifies a format.
fn classify_source<S: FrameSource + ?Sized>(
    frames: &S,
    spec: &SourceSpec,
    start: Timestamp,
    end: Timestamp,
) -> Result<Option<WireFormat>, JobError> {
    let streams = frames
        .open(&spec.id, start, end)
        .map_err(|error| JobError::Source { source: spec.id.clone(), error })?;
    let mut classifier = StreamClassifier::new();
    for sourced in Interleaver::new(streams) {
        if let Classification::Known { format, role } = classifier.observe(&sourced.frame.payload) {
            log::info!("Source {} classified as {format} ({role:?})", spec.id);
            return Ok(Some(format));
        }
    }
    // No role object seen; fall back to whatever envelope format appeared.
    if classifier.format().is_none() {
        log::warn!("Source {} has no decodable frames", spec.id);
    }
    Ok(classifier.format())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, SegmentSpec};
    use crate::source::MemoryFrameSource;

    fn driver(segments: &[(i64, i64)]) -> JobDriver<MemoryFrameSource> {
        let config = JobConfig {
            session_start: Timestamp::ZERO,
            segments: segments
                .iter()
                .map(|(s, e)| SegmentSpec { start: Timestamp(*s), end: Timestamp(*e) })
                .collect(),
            sources: vec![SourceSpec { id: "inst".into(), format: Some(WireFormat::IndexNav) }],
            engine: EngineConfig::for_testing(),
            max_parallel: 2,
        };
        JobDriver::new(Arc::new(MemoryFrameSource::new()), config)
    }

    #[test]
    fn test_stitch_params_accumulate_gaps() {
        let params = driver(&[(100, 200), (500, 600), (700, 800)]).stitch_params().unwrap();
        assert_eq!(params[0].previous_segment_end, None);
        assert_eq!(params[0].cumulative_prior_offset, TickSpan(0));
        assert_eq!(params[1].previous_segment_end, Some(Timestamp(200)));
        assert_eq!(params[1].cumulative_prior_offset, TickSpan(300));
        assert_eq!(params[2].cumulative_prior_offset, TickSpan(400));
        // Segment starts land back to back on the output clock.
        assert_eq!(params[1].translate(Timestamp(500)), Timestamp(100));
        assert_eq!(params[2].translate(Timestamp(700)), Timestamp(200));
    }

    #[test]
    fn test_overlapping_segments_rejected() {
        let err = driver(&[(100, 300), (200, 400)]).stitch_params().unwrap_err();
        assert!(matches!(err, JobError::InvalidSegments(_)));
        assert!(driver(&[]).stitch_params().is_err());
        assert!(driver(&[(5, 5)]).stitch_params().is_err());
    }

    #[test]
    fn test_plan_is_segment_major() {
        let mut d = driver(&[(0, 10), (20, 30)]);
        d.config.sources.push(SourceSpec { id: "display".into(), format: None });
        let plans = d.plan(&[Some(WireFormat::IndexNav), Some(WireFormat::GraphProtocol)]).unwrap();
        let order: Vec<_> = plans.iter().map(|p| (p.segment, p.request.source.as_str())).collect();
        assert_eq!(order, vec![(0, "inst"), (0, "display"), (1, "inst"), (1, "display")]);
        assert_eq!(plans[3].request.format, Some(WireFormat::GraphProtocol));
    }
}
