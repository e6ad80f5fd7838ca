//! Per-frame processing: detect → track → sample → aggregate → estimate → sink.

use crate::{
    aggregator::{FaceSession, SampleAggregator, TriggeredWindow},
    config::Config,
    engine::EstimationEngine,
    face::{BoundingBox, FaceDetector, TimedDetector},
    frame::Frame,
    history::Sample,
    roi::{AnchorRegion, RoiSampler},
    sink::{PulseRecord, RecordSink},
    tracker::{FaceId, FaceTracker},
    Error, Result,
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running counters shared between the pipeline and its owner
#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_submitted: AtomicU64,
    frames_dropped: AtomicU64,
    frames_processed: AtomicU64,
    acquisition_failures: AtomicU64,
    detection_failures: AtomicU64,
    samples_appended: AtomicU64,
    cycles_run: AtomicU64,
    degenerate_cycles: AtomicU64,
    out_of_band_cycles: AtomicU64,
    failed_cycles: AtomicU64,
    records_emitted: AtomicU64,
    sink_failures: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Frames offered to the worker
    pub frames_submitted: u64,
    /// Frames discarded because the consumer was busy
    pub frames_dropped: u64,
    /// Frames run through the pipeline
    pub frames_processed: u64,
    /// Frames that could not be decoded
    pub acquisition_failures: u64,
    /// Detector calls that failed or timed out
    pub detection_failures: u64,
    /// Samples appended across all faces
    pub samples_appended: u64,
    /// Estimation cycles triggered
    pub cycles_run: u64,
    /// Cycles skipped on a flat window
    pub degenerate_cycles: u64,
    /// Cycles without an in-band peak
    pub out_of_band_cycles: u64,
    /// Cycles that failed for any other recoverable reason
    pub failed_cycles: u64,
    /// Records handed to the sink
    pub records_emitted: u64,
    /// Records the sink rejected
    pub sink_failures: u64,
}

impl PipelineStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_submitted(&self) {
        Self::bump(&self.frames_submitted);
    }

    pub(crate) fn frame_dropped(&self) {
        Self::bump(&self.frames_dropped);
    }

    /// Copy all counters
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            frames_submitted: load(&self.frames_submitted),
            frames_dropped: load(&self.frames_dropped),
            frames_processed: load(&self.frames_processed),
            acquisition_failures: load(&self.acquisition_failures),
            detection_failures: load(&self.detection_failures),
            samples_appended: load(&self.samples_appended),
            cycles_run: load(&self.cycles_run),
            degenerate_cycles: load(&self.degenerate_cycles),
            out_of_band_cycles: load(&self.out_of_band_cycles),
            failed_cycles: load(&self.failed_cycles),
            records_emitted: load(&self.records_emitted),
            sink_failures: load(&self.sink_failures),
        }
    }
}

/// Overlay data for one face in one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservedFace {
    /// Tracked identity
    pub face_id: FaceId,
    /// Detected box
    pub bbox: BoundingBox,
    /// Sampled regions
    pub regions: [AnchorRegion; 3],
    /// Mean hue, absent when no region overlapped the frame
    pub hue: Option<f64>,
}

/// What one frame produced
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    /// Faces seen in the frame
    pub faces: Vec<ObservedFace>,
    /// Records emitted by cycles this frame triggered
    pub records: Vec<PulseRecord>,
    /// Sessions that ended on this frame
    pub ended_sessions: Vec<FaceId>,
}

/// The estimation pipeline
///
/// Owns every piece of per-face state. Exactly one frame is processed at a
/// time; callers that share a pipeline across threads hand it to a single
/// consumer (see `worker`).
pub struct PulsePipeline {
    detector: Box<dyn FaceDetector>,
    tracker: FaceTracker,
    sampler: RoiSampler,
    aggregator: SampleAggregator,
    engine: EstimationEngine,
    sink: Box<dyn RecordSink>,
    stats: Arc<PipelineStats>,
}

impl PulsePipeline {
    /// Build a pipeline around a detector and a sink
    ///
    /// The detector is called inline; use [`PulsePipeline::with_timeout`]
    /// to bound each call.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid
    pub fn new(config: &Config, detector: Box<dyn FaceDetector>, sink: Box<dyn RecordSink>) -> Result<Self> {
        config.validate()?;
        info!(
            "Pipeline: window {} samples, step {}, band {}..{} Hz, order {}, {} Hz {:?} timing, {:?} channels",
            config.signal.window_len,
            config.signal.trigger_step,
            config.signal.low_cut_hz,
            config.signal.high_cut_hz,
            config.signal.filter_order,
            config.signal.sample_rate_hz,
            config.signal.timing,
            config.roi.channel_mode
        );

        Ok(Self {
            detector,
            tracker: FaceTracker::new(&config.tracking),
            sampler: RoiSampler::new(config.roi.clone()),
            aggregator: SampleAggregator::new(&config.signal),
            engine: EstimationEngine::new(&config.signal, config.roi.channel_mode)?,
            sink,
            stats: Arc::new(PipelineStats::default()),
        })
    }

    /// Build a pipeline whose detector runs on its own thread under the
    /// configured timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the detector
    /// thread cannot be spawned
    pub fn with_timeout<D: FaceDetector + 'static>(config: &Config, detector: D, sink: Box<dyn RecordSink>) -> Result<Self> {
        let timed = TimedDetector::spawn(detector, config.detector.timeout())?;
        Self::new(config, Box::new(timed), sink)
    }

    /// Shared statistics
    #[must_use]
    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Active session of a face
    #[must_use]
    pub fn session(&self, face_id: FaceId) -> Option<&FaceSession> {
        self.aggregator.session(face_id)
    }

    /// Number of faces currently tracked
    #[must_use]
    pub fn tracked_faces(&self) -> usize {
        self.tracker.active()
    }

    /// End every session and forget all faces
    pub fn reset(&mut self) {
        let ended = self.tracker.reset();
        info!("Pipeline reset, ending {} session(s)", ended.len());
        self.aggregator.clear();
    }

    /// Decode and process an encoded frame
    ///
    /// An undecodable frame is logged, counted and skipped without touching
    /// any state.
    ///
    /// # Errors
    ///
    /// Same as [`PulsePipeline::process_frame`]
    pub fn process_encoded(&mut self, bytes: &[u8], captured_at: DateTime<Utc>) -> Result<Option<FrameReport>> {
        match Frame::decode(bytes, captured_at) {
            Ok(frame) => self.process_frame(&frame).map(Some),
            Err(e) => {
                warn!("Skipping frame: {e}");
                PipelineStats::bump(&self.stats.acquisition_failures);
                Ok(None)
            }
        }
    }

    /// Run one frame through the pipeline
    ///
    /// Detection failures count as "no face"; per-cycle signal errors are
    /// logged and counted. Only fatal errors are returned.
    ///
    /// # Errors
    ///
    /// Returns `ResourceExhausted` if window buffers cannot be allocated
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameReport> {
        PipelineStats::bump(&self.stats.frames_processed);
        let captured_at = frame.captured_at();

        let faces = match self.detector.detect(frame) {
            Ok(faces) => faces,
            Err(e) => {
                warn!("Detection failed: {e}");
                PipelineStats::bump(&self.stats.detection_failures);
                Vec::new()
            }
        };

        let boxes: Vec<BoundingBox> = faces.iter().map(|f| f.bbox).collect();
        let update = self.tracker.update(&boxes);

        let mut report = FrameReport::default();
        for face_id in update.expired {
            self.aggregator.end_session(face_id);
            report.ended_sessions.push(face_id);
        }

        for (face, face_id) in faces.iter().zip(update.assigned) {
            let regions = self.sampler.anchor_regions(face, frame.width(), frame.height());
            let sample = RoiSampler::sample(frame.image(), &regions);

            report.faces.push(ObservedFace {
                face_id,
                bbox: face.bbox,
                regions,
                hue: sample.map(|s| s.combined),
            });

            let Some(sample) = sample else {
                debug!("Face {face_id} has no pixels inside the frame");
                continue;
            };

            let t = self.aggregator.begin_session(face_id, captured_at).elapsed_seconds(captured_at);
            let triggered = self.aggregator.append(
                face_id,
                captured_at,
                Sample {
                    t,
                    combined: sample.combined,
                    regions: sample.regions,
                },
            )?;
            PipelineStats::bump(&self.stats.samples_appended);

            if let Some(triggered) = triggered {
                if let Some(record) = self.run_cycle(&triggered, captured_at)? {
                    report.records.push(record);
                }
            }
        }

        Ok(report)
    }

    /// One estimation cycle; `Ok(None)` when no record is produced
    fn run_cycle(&mut self, triggered: &TriggeredWindow, captured_at: DateTime<Utc>) -> Result<Option<PulseRecord>> {
        PipelineStats::bump(&self.stats.cycles_run);

        let estimate = match self.engine.run(&triggered.window) {
            Ok(estimate) => estimate,
            Err(e) if e.is_fatal() => return Err(e),
            Err(Error::DegenerateSignal { std_dev }) => {
                debug!("Face {}: flat window (std {std_dev:e}), skipping", triggered.face_id);
                PipelineStats::bump(&self.stats.degenerate_cycles);
                return Ok(None);
            }
            Err(Error::OutOfBandResult(reason)) => {
                debug!("Face {}: {reason}", triggered.face_id);
                PipelineStats::bump(&self.stats.out_of_band_cycles);
                return Ok(None);
            }
            Err(e) => {
                warn!("Face {}: estimation cycle failed: {e}", triggered.face_id);
                PipelineStats::bump(&self.stats.failed_cycles);
                return Ok(None);
            }
        };

        let record = PulseRecord::new(triggered.face_id, triggered.session_started, captured_at, estimate.bpm);
        info!(
            "Face {}: {:.1} BPM ({:.1} dB) after {} samples",
            triggered.face_id, estimate.bpm, estimate.snr_db, triggered.history_len
        );

        match self.sink.append(&record) {
            Ok(()) => PipelineStats::bump(&self.stats.records_emitted),
            Err(e) => {
                warn!("{} rejected record: {e}", self.sink.name());
                PipelineStats::bump(&self.stats.sink_failures);
            }
        }

        Ok(Some(record))
    }

    /// Flush the sink
    ///
    /// # Errors
    ///
    /// Returns the sink's error if buffered records could not be written
    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()
    }
}
