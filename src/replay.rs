//! Offline replay of a recorded per-frame sample trace.
//!
//! A trace is a CSV file with a `value` column holding one ROI hue per
//! frame and an optional `timestamp` column in seconds. Replay drives the
//! aggregator and the estimation engine for a single face exactly as the
//! live pipeline would.

use crate::{
    aggregator::SampleAggregator,
    config::Config,
    engine::EstimationEngine,
    history::Sample,
    sink::{PulseRecord, RecordSink},
    tracker::FaceId,
    utils::safe_cast::count_to_f64,
    Error, Result,
};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// One row of a trace
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceSample {
    /// Seconds since the start of the recording
    #[serde(default)]
    pub timestamp: Option<f64>,
    /// Sampled hue
    pub value: f64,
}

/// Outcome of a replay
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplaySummary {
    /// Samples fed to the aggregator
    pub samples: usize,
    /// Estimation cycles triggered
    pub cycles: usize,
    /// Pulse rates emitted, in order
    pub estimates: Vec<f64>,
    /// Cycles skipped on a flat window
    pub degenerate: usize,
    /// Cycles without an in-band peak
    pub out_of_band: usize,
    /// Cycles that failed for another reason
    pub failed: usize,
    /// Records the sink rejected
    pub sink_failures: usize,
}

impl ReplaySummary {
    /// Mean of all emitted pulse rates
    #[must_use]
    pub fn mean_bpm(&self) -> Option<f64> {
        if self.estimates.is_empty() {
            return None;
        }
        Some(self.estimates.iter().sum::<f64>() / count_to_f64(self.estimates.len()))
    }
}

/// Read a trace from a CSV file
///
/// # Errors
///
/// Returns an error if the file cannot be read or a row does not parse
pub fn read_trace<P: AsRef<Path>>(path: P) -> Result<Vec<TraceSample>> {
    let file = std::fs::File::open(path)?;
    read_trace_from(file)
}

/// Read a trace from any CSV source
///
/// # Errors
///
/// Returns an error if a row does not parse, holds a non-finite value or
/// a negative timestamp
pub fn read_trace_from<R: Read>(reader: R) -> Result<Vec<TraceSample>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut samples = Vec::new();
    for row in csv_reader.deserialize() {
        let sample: TraceSample = row?;
        let line = samples.len() + 1;
        if !sample.value.is_finite() {
            return Err(Error::InvalidInput(format!("Non-finite trace value at row {line}")));
        }
        if let Some(t) = sample.timestamp {
            if !t.is_finite() || t < 0.0 {
                return Err(Error::InvalidInput(format!("Invalid timestamp {t} at row {line}")));
            }
        }
        samples.push(sample);
    }
    Ok(samples)
}

/// Replay a trace as one face session
///
/// Rows without a timestamp are placed on the nominal frame grid.
///
/// # Errors
///
/// Returns `ConfigError` for an invalid configuration, `InvalidInput` for a
/// timestamp that is negative or past the representable date range, and
/// `ResourceExhausted` if window buffers cannot be allocated
pub fn run(
    samples: &[TraceSample],
    config: &Config,
    sink: &mut dyn RecordSink,
    started_at: DateTime<Utc>,
) -> Result<ReplaySummary> {
    config.validate()?;
    let engine = EstimationEngine::new(&config.signal, config.roi.channel_mode)?;
    let mut aggregator = SampleAggregator::new(&config.signal);
    let face_id = FaceId(0);
    let mut summary = ReplaySummary::default();

    info!("Replaying {} samples", samples.len());

    for (i, row) in samples.iter().enumerate() {
        let t = row
            .timestamp
            .unwrap_or_else(|| count_to_f64(i) / config.signal.sample_rate_hz);
        let captured_at = capture_time(started_at, t)
            .ok_or_else(|| Error::InvalidInput(format!("Sample {i}: timestamp {t} s is out of range")))?;

        aggregator.begin_session(face_id, started_at);
        let triggered = aggregator.append(face_id, captured_at, Sample::scalar(t, row.value))?;
        summary.samples += 1;

        let Some(triggered) = triggered else {
            continue;
        };
        summary.cycles += 1;

        match engine.run(&triggered.window) {
            Ok(estimate) => {
                let record = PulseRecord::new(face_id, triggered.session_started, captured_at, estimate.bpm);
                if let Err(e) = sink.append(&record) {
                    warn!("{} rejected record: {e}", sink.name());
                    summary.sink_failures += 1;
                }
                summary.estimates.push(estimate.bpm);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(Error::DegenerateSignal { .. }) => summary.degenerate += 1,
            Err(Error::OutOfBandResult(reason)) => {
                debug!("Sample {i}: {reason}");
                summary.out_of_band += 1;
            }
            Err(e) => {
                warn!("Sample {i}: estimation cycle failed: {e}");
                summary.failed += 1;
            }
        }
    }

    sink.flush()?;
    Ok(summary)
}

/// Wall-clock time of a sample `t` seconds after `started_at`
#[allow(clippy::cast_possible_truncation)] // Range checked; sub-microsecond precision is not needed
#[allow(clippy::cast_precision_loss)]
fn capture_time(started_at: DateTime<Utc>, t: f64) -> Option<DateTime<Utc>> {
    let micros = (t * 1e6).round();
    if !micros.is_finite() || micros < 0.0 || micros >= i64::MAX as f64 {
        return None;
    }
    started_at.checked_add_signed(Duration::microseconds(micros as i64))
}
