use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lectern_core::Timestamp;
use lectern_replay::wire::{self, encode, CapabilityBody, CapabilityMessage, SlideAddress};
use lectern_replay::{
    ArchiveConfig, ArchiveWriter, DemuxConfig, Demultiplexer, EngineConfig, Frame, FrameArchive,
    LookbackBuffer, MemoryFrameSource, ReconstructionEngine, SegmentRequest, StitchParams,
    WireFormat,
};
use uuid::Uuid;

fn lecture(frames: usize) -> Vec<Frame> {
    let deck = Uuid::new_v4();
    (0..frames)
        .map(|i| {
            let address = SlideAddress { deck, slide: (i / 50) as u32 };
            let body = if i % 50 == 0 {
                CapabilityBody::SlideChanged {
                    address,
                    deck_type: 0,
                    argb: None,
                    zoom: 1.0,
                    scroll: (0.0, 1.0),
                    overlay_of: None,
                }
            } else {
                CapabilityBody::StrokeAdded {
                    address,
                    stroke_id: Uuid::new_v4(),
                    packet: vec![0u8; 96], // Typical short stroke
                    argb: 0xFF00_0000,
                    transparency: 0,
                }
            };
            let msg = CapabilityMessage::new("presentation", i as u64, body);
            Frame::new(Timestamp(i as i64 * 1000), i as u64, encode(&msg).unwrap())
        })
        .collect()
}

fn bench_decode_translate(c: &mut Criterion) {
    let frames = lecture(100);
    let payload = &frames[1].payload;

    c.bench_function("decode_translate_stroke", |b| {
        let mut demux = Demultiplexer::new(WireFormat::IndexCapability, DemuxConfig::default());
        b.iter(|| {
            let msg = wire::decode(black_box(payload), None).unwrap();
            black_box(demux.translate(&msg));
        })
    });
}

fn bench_segment_replay(c: &mut Criterion) {
    let source = MemoryFrameSource::new().with_sub_stream("inst", lecture(10_000));
    let request = SegmentRequest {
        source: "inst".into(),
        format: Some(WireFormat::IndexCapability),
        session_start: Timestamp::ZERO,
        start: Timestamp(5_000_000),
        end: Timestamp(10_000_000),
    };
    let stitch = StitchParams::standalone(request.start);

    c.bench_function("segment_replay_10k", |b| {
        b.iter(|| {
            let mut engine = ReconstructionEngine::new(EngineConfig::default());
            black_box(engine.run(&source, black_box(&request), &stitch).unwrap());
        })
    });
}

fn bench_lookback_reduce(c: &mut Criterion) {
    let frames = lecture(5_000);
    let mut demux = Demultiplexer::new(WireFormat::IndexCapability, DemuxConfig::default());
    let events: Vec<_> = frames
        .iter()
        .flat_map(|f| demux.translate(&wire::decode(&f.payload, None).unwrap()))
        .collect();

    c.bench_function("lookback_reduce_5k", |b| {
        b.iter(|| {
            let mut buffer = LookbackBuffer::new();
            buffer.extend(events.iter().cloned());
            black_box(buffer.finish());
        })
    });
}

fn bench_archive_open(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.lec");
    let config = ArchiveConfig::default();
    let mut writer = ArchiveWriter::create(&path, &config).unwrap();
    writer.append_all("inst", 0, &lecture(10_000)).unwrap();
    writer.finish().unwrap();

    c.bench_function("archive_open_10k", |b| {
        b.iter(|| {
            black_box(FrameArchive::open(black_box(&path), &config).unwrap());
        })
    });
}

criterion_group!(
    benches,
    bench_decode_translate,
    bench_segment_replay,
    bench_lookback_reduce,
    bench_archive_open,
);
criterion_main!(benches);
