//! `lectern` — replay recorded presentation archives into event scripts.
//!
//! ```text
//! lectern inspect  lecture.lec
//! lectern classify lecture.lec
//! lectern replay   lecture.lec --job job.json --out script.jsonl --decks decks.json
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use lectern_core::Timestamp;
use lectern_replay::wire::classify::classify;
use lectern_replay::{
    ArchiveConfig, Classification, EngineConfig, FrameArchive, JobConfig, JobDriver, ScriptWriter,
    SegmentSpec, SourceSpec, WireFormat,
};

#[derive(Parser)]
#[command(name = "lectern", version, about = "Presentation event reconstruction")]
struct Cli {
    /// Fail on corrupt archive records instead of skipping them.
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print sources, record counts and time range of an archive.
    Inspect { archive: PathBuf },
    /// Identify the wire format and participant role of every source.
    Classify { archive: PathBuf },
    /// Reconstruct the replay script of an archive.
    Replay {
        archive: PathBuf,
        /// Job description (JSON). Without it, every source is replayed as
        /// one segment spanning the archive.
        #[arg(long)]
        job: Option<PathBuf>,
        /// Replay only this source (ignored with --job).
        #[arg(long)]
        source: Option<String>,
        /// Wire format of the replayed sources (ignored with --job).
        #[arg(long)]
        format: Option<WireFormat>,
        /// Segment start in ticks (ignored with --job).
        #[arg(long)]
        start: Option<i64>,
        /// Segment end in ticks, exclusive (ignored with --job).
        #[arg(long)]
        end: Option<i64>,
        /// Script output; stdout when absent.
        #[arg(long, short)]
        out: Option<PathBuf>,
        /// Write the deck manifest here.
        #[arg(long)]
        decks: Option<PathBuf>,
        /// Engines running at once.
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },
}

fn open_archive(path: &Path, strict: bool) -> Result<FrameArchive> {
    let config = ArchiveConfig { skip_corrupt: !strict, ..ArchiveConfig::default() };
    let archive = FrameArchive::open(path, &config)
        .with_context(|| format!("opening archive {}", path.display()))?;
    if archive.corrupted() > 0 {
        warn!("{}: skipped {} corrupt record(s)", path.display(), archive.corrupted());
    }
    Ok(archive)
}

fn inspect(archive: &FrameArchive) {
    println!("records: {}", archive.record_count());
    if let Some((first, last)) = archive.time_range() {
        println!("range:   {} .. {}", first.clock_string(), last.clock_string());
    }
    for source in archive.sources() {
        println!("{source}: {} frame(s)", archive.payloads(source).len());
    }
}

fn classify_all(archive: &FrameArchive) {
    for source in archive.sources() {
        let frames = archive.payloads(source);
        let (classification, format) = classify(frames.iter().map(|f| f.payload.as_slice()));
        match (classification, format) {
            (Classification::Known { format, role }, _) => println!("{source}: {format} ({role:?})"),
            (Classification::Unknown, Some(format)) => println!("{source}: {format} (role unknown)"),
            (Classification::Unknown, None) => println!("{source}: unrecognized"),
        }
    }
}

/// Single-segment job covering the archive (or the requested window).
fn default_job(
    archive: &FrameArchive,
    source: Option<String>,
    format: Option<WireFormat>,
    start: Option<i64>,
    end: Option<i64>,
    workers: usize,
) -> Result<JobConfig> {
    let Some((first, last)) = archive.time_range() else {
        bail!("archive holds no frames");
    };
    let sources: Vec<SourceSpec> = match source {
        Some(id) => vec![SourceSpec { id, format }],
        None => archive
            .sources()
            .into_iter()
            .map(|id| SourceSpec { id: id.to_string(), format })
            .collect(),
    };
    let start = start.map_or(first, Timestamp);
    let end = end.map_or(last.offset_ticks(1), Timestamp);
    Ok(JobConfig {
        session_start: first.min(start),
        segments: vec![SegmentSpec { start, end }],
        sources,
        engine: EngineConfig::default(),
        max_parallel: workers,
    })
}

fn script_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

async fn replay(archive: FrameArchive, config: JobConfig, out: Option<&Path>, decks: Option<&Path>) -> Result<()> {
    let driver = JobDriver::new(Arc::new(archive), config);

    let cancel = driver.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing with partial output");
            cancel.cancel();
        }
    });

    let mut job = driver.run().await?;
    for warning in &job.warnings {
        warn!("{warning}");
    }

    let mut writer = ScriptWriter::new(script_output(out)?);
    writer.write_timeline(&mut job.timeline)?;
    let written = writer.written();
    writer.finish()?;

    if let Some(path) = decks {
        std::fs::write(path, job.decks.to_manifest()?)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    info!(
        "Wrote {written} entries, {} decks{}",
        job.decks.len(),
        if job.cancelled { " (cancelled)" } else { "" }
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Inspect { archive } => inspect(&open_archive(&archive, cli.strict)?),
        Command::Classify { archive } => classify_all(&open_archive(&archive, cli.strict)?),
        Command::Replay { archive, job, source, format, start, end, out, decks, workers } => {
            let frames = open_archive(&archive, cli.strict)?;
            let config = match job {
                Some(path) => {
                    let json = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    JobConfig::from_json(&json).with_context(|| format!("parsing {}", path.display()))?
                }
                None => default_job(&frames, source, format, start, end, workers)?,
            };
            replay(frames, config, out.as_deref(), decks.as_deref()).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_replay::wire::{encode, IndexNavMessage, NavPayload, SlideRef};
    use lectern_replay::{ArchiveWriter, Frame};
    use uuid::Uuid;

    fn archive_with(sources: &[&str]) -> (tempfile::TempDir, FrameArchive) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.lec");
        let config = ArchiveConfig::for_testing();
        let mut writer = ArchiveWriter::create(&path, &config).unwrap();
        let msg = IndexNavMessage::Navigate(NavPayload::slides(SlideRef::new(Uuid::new_v4(), 0)));
        for (i, source) in sources.iter().enumerate() {
            let frame = Frame::new(Timestamp(100 * (i as i64 + 1)), 0, encode(&msg).unwrap());
            writer.append(source, 0, &frame).unwrap();
        }
        writer.finish().unwrap();
        let archive = FrameArchive::open(&path, &config).unwrap();
        (dir, archive)
    }

    #[test]
    fn test_default_job_spans_archive() {
        let (_dir, archive) = archive_with(&["a", "b"]);
        let job = default_job(&archive, None, None, None, None, 2).unwrap();
        assert_eq!(job.sources.len(), 2);
        assert_eq!(job.segments, vec![SegmentSpec { start: Timestamp(100), end: Timestamp(201) }]);
        assert_eq!(job.session_start, Timestamp(100));
    }

    #[test]
    fn test_default_job_single_source_window() {
        let (_dir, archive) = archive_with(&["a", "b"]);
        let job = default_job(&archive, Some("b".into()), Some(WireFormat::IndexNav), Some(50), Some(150), 1)
            .unwrap();
        assert_eq!(job.sources, vec![SourceSpec { id: "b".into(), format: Some(WireFormat::IndexNav) }]);
        assert_eq!(job.session_start, Timestamp(50));
        assert_eq!(job.segments[0].end, Timestamp(150));
    }

    #[test]
    fn test_cli_parses_replay() {
        let cli = Cli::try_parse_from([
            "lectern", "replay", "a.lec", "--format", "index-nav", "--out", "s.jsonl",
        ])
        .unwrap();
        match cli.command {
            Command::Replay { format, out, workers, .. } => {
                assert_eq!(format, Some(WireFormat::IndexNav));
                assert_eq!(out, Some(PathBuf::from("s.jsonl")));
                assert_eq!(workers, 4);
            }
            _ => panic!("expected replay"),
        }
    }
}
