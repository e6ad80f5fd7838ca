//! Integration tests for the frame-to-record pipeline


use crossbeam_channel::unbounded;
use image::{ImageOutputFormat, RgbImage};
use rppg_pulse::{
    config::{ChannelMode, Config, TimingMode},
    pipeline::PulsePipeline,
    sink::{ChannelSink, PulseRecord},
    tracker::FaceId,
};
use std::collections::HashMap;
use std::io::Cursor;
use test_helpers::{frame_time, pulse_frame, pulse_pixel, two_face_frame, FixedDetector, ScriptedDetector, LEFT_FACE};

fn pipeline_with(config: &Config, detector: impl rppg_pulse::face::FaceDetector + 'static) -> (PulsePipeline, crossbeam_channel::Receiver<PulseRecord>) {
    let (tx, rx) = unbounded();
    let pipeline = PulsePipeline::new(config, Box::new(detector), Box::new(ChannelSink::new(tx))).unwrap();
    (pipeline, rx)
}

/// Ten seconds of a 72 BPM face yields one record per trigger
#[test]
fn test_full_pipeline_estimates_72_bpm() {
    let (mut pipeline, rx) = pipeline_with(&Config::default(), FixedDetector::single());

    let mut reported = Vec::new();
    for i in 0..300 {
        let report = pipeline.process_frame(&pulse_frame(i, 1.2)).unwrap();
        assert_eq!(report.faces.len(), 1);
        assert!(report.faces[0].hue.is_some());
        reported.extend(report.records);
    }

    let records: Vec<PulseRecord> = rx.try_iter().collect();
    assert_eq!(records.len(), 31);
    assert_eq!(records, reported);
    for record in &records {
        assert!((record.pulse_rate_bpm - 72.0).abs() < 1.0, "bpm {}", record.pulse_rate_bpm);
        assert_eq!(record.face_id, 0);
        assert_eq!(record.session_started, frame_time(0));
        assert_eq!(record.session_id.as_str(), "2024-05-14 08:00:00#0");
    }

    // The first record comes from the 150th frame, then every fifth
    assert_eq!(records[0].captured_at, frame_time(149));
    assert_eq!(records[1].captured_at, frame_time(154));

    let stats = pipeline.stats().snapshot();
    assert_eq!(stats.frames_processed, 300);
    assert_eq!(stats.samples_appended, 300);
    assert_eq!(stats.cycles_run, 31);
    assert_eq!(stats.records_emitted, 31);
    assert_eq!(stats.failed_cycles, 0);
}

/// Two faces get independent sessions and independent estimates
#[test]
fn test_two_faces_are_estimated_independently() {
    let (mut pipeline, rx) = pipeline_with(&Config::default(), FixedDetector::pair());

    let mut boxes = HashMap::new();
    for i in 0..200 {
        let report = pipeline.process_frame(&two_face_frame(i, 1.2, 1.4)).unwrap();
        for face in report.faces {
            boxes.insert(face.face_id.0, face.bbox);
        }
    }
    assert_eq!(pipeline.tracked_faces(), 2);
    assert_eq!(boxes.len(), 2);

    let records: Vec<PulseRecord> = rx.try_iter().collect();
    assert_eq!(records.len(), 2 * 11);
    for record in records {
        let expected = if boxes[&record.face_id] == LEFT_FACE { 72.0 } else { 84.0 };
        assert!(
            (record.pulse_rate_bpm - expected).abs() < 1.0,
            "face {} bpm {}",
            record.face_id,
            record.pulse_rate_bpm
        );
    }
}

/// A face that leaves ends its session; on return it starts from scratch
#[test]
fn test_returning_face_starts_new_session() {
    let detector = ScriptedDetector::new(|i| !(160..200).contains(&i));
    let (mut pipeline, rx) = pipeline_with(&Config::default(), detector);

    let mut ended = Vec::new();
    for i in 0..360 {
        let report = pipeline.process_frame(&pulse_frame(i, 1.2)).unwrap();
        ended.extend(report.ended_sessions);
    }

    // Gone for 40 frames, more than max_missed_frames
    assert_eq!(ended, vec![FaceId(0)]);
    assert!(pipeline.session(FaceId(0)).is_none());
    let session = pipeline.session(FaceId(1)).unwrap();
    assert_eq!(session.started_at, frame_time(200));
    assert_eq!(session.history().len(), 160);

    let records: Vec<PulseRecord> = rx.try_iter().collect();
    let first: Vec<_> = records.iter().filter(|r| r.face_id == 0).collect();
    let second: Vec<_> = records.iter().filter(|r| r.face_id == 1).collect();
    // Triggers at 150, 155, 160 samples in each session
    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 3);
    assert_ne!(first[0].session_id, second[0].session_id);
}

/// Encoded frames follow the same path as raw ones
#[test]
fn test_encoded_frames() {
    let (mut pipeline, rx) = pipeline_with(&Config::default(), FixedDetector::single());

    for i in 0..150 {
        let image = RgbImage::from_pixel(224, 224, pulse_pixel(i, 1.2));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png).unwrap();
        let report = pipeline.process_encoded(&bytes, frame_time(i)).unwrap();
        assert!(report.is_some());
    }

    let record = rx.try_recv().unwrap();
    assert!((record.pulse_rate_bpm - 72.0).abs() < 1.0);
}

/// Per-region channels with ICA agree with the combined channel on a clean pulse
#[test]
fn test_per_region_mode_end_to_end() {
    let mut config = Config::default();
    config.roi.channel_mode = ChannelMode::PerRegion;
    let (mut pipeline, rx) = pipeline_with(&config, FixedDetector::single());

    for i in 0..160 {
        pipeline.process_frame(&pulse_frame(i, 1.2)).unwrap();
    }

    let records: Vec<PulseRecord> = rx.try_iter().collect();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| (r.pulse_rate_bpm - 72.0).abs() < 1.0));
}

/// Measured timing follows the capture clock instead of the nominal rate
#[test]
fn test_measured_timing_end_to_end() {
    let mut config = Config::default();
    config.signal.timing = TimingMode::Measured;
    let (mut pipeline, rx) = pipeline_with(&config, FixedDetector::single());

    for i in 0..150 {
        pipeline.process_frame(&pulse_frame(i, 1.2)).unwrap();
    }

    let record = rx.try_recv().unwrap();
    assert!((record.pulse_rate_bpm - 72.0).abs() < 1.0, "bpm {}", record.pulse_rate_bpm);
}
