//! Remote photoplethysmography: pulse rate from skin hue in a face video stream.
//!
//! The library turns a stream of timestamped frames into pulse-rate records:
//! - Frames are handed to an external face detector (any [`face::FaceDetector`])
//! - Faces are tracked across frames and each gets its own sample history
//! - Three skin regions per face (forehead and both cheeks) are reduced to a
//!   mean HSV hue per frame
//! - Every few frames the latest window is detrended, normalised, band-pass
//!   filtered and searched for its dominant in-band frequency
//!
//! The estimation pipeline consists of:
//! 1. [`roi`] sampling of the anchor regions
//! 2. [`aggregator`] windowing with the step trigger
//! 3. [`conditioner`] detrend and normalisation
//! 4. Optional [`ica`] source separation across regions
//! 5. [`spectrum`] Butterworth filtering and power spectrum
//! 6. [`estimator`] peak search in the pulse band
//!
//! # Examples
//!
//! ## Estimating one window
//!
//! ```
//! use rppg_pulse::{
//!     config::{ChannelMode, SignalConfig},
//!     engine::EstimationEngine,
//!     history::{Sample, SampleHistory},
//! };
//!
//! # fn main() -> rppg_pulse::Result<()> {
//! let signal = SignalConfig::default();
//! let engine = EstimationEngine::new(&signal, ChannelMode::Combined)?;
//!
//! let mut history = SampleHistory::new();
//! for i in 0..signal.window_len {
//!     let t = i as f64 / signal.sample_rate_hz;
//!     history.push(Sample::scalar(t, 20.0 + (2.0 * std::f64::consts::PI * 1.2 * t).sin()));
//! }
//!
//! let estimate = engine.run(&history.window(signal.window_len)?)?;
//! assert!((estimate.bpm - 72.0).abs() < 1e-6);
//! # Ok(())
//! # }
//! ```
//!
//! ## Live pipeline
//!
//! ```no_run
//! use rppg_pulse::{
//!     config::Config,
//!     face::{BoundingBox, FaceDetector, FaceObservation},
//!     frame::Frame,
//!     pipeline::PulsePipeline,
//!     sink::CsvSink,
//!     worker::{PipelineWorker, SubmitOutcome},
//! };
//!
//! struct CenterDetector;
//!
//! impl FaceDetector for CenterDetector {
//!     fn detect(&mut self, frame: &Frame) -> rppg_pulse::Result<Vec<FaceObservation>> {
//!         let (w, h) = (f64::from(frame.width()), f64::from(frame.height()));
//!         Ok(vec![FaceObservation::from_bbox(BoundingBox::new(w * 0.3, h * 0.2, w * 0.7, h * 0.8))])
//!     }
//! }
//!
//! # fn main() -> rppg_pulse::Result<()> {
//! let config = Config::default();
//! let pipeline = PulsePipeline::with_timeout(&config, CenterDetector, Box::new(CsvSink::create("pulse.csv")?))?;
//! let (events, _received) = crossbeam_channel::unbounded();
//! let worker = PipelineWorker::spawn(pipeline, events)?;
//!
//! # let next_frame = || -> Option<Frame> { None };
//! while let Some(frame) = next_frame() {
//!     if worker.submit(frame) == SubmitOutcome::Dropped {
//!         log::debug!("Consumer busy");
//!     }
//! }
//! worker.shutdown()?;
//! # Ok(())
//! # }
//! ```

/// Per-face sessions and the estimation trigger
pub mod aggregator;

/// Detrending and normalisation of a window
pub mod conditioner;

/// Configuration management
pub mod config;

/// Constants used throughout the library
pub mod constants;

/// One estimation cycle over a window
pub mod engine;

/// Error types and result handling
pub mod error;

/// Spectral peak search
pub mod estimator;

/// Face geometry and the detector seam
pub mod face;

/// Detrend and band-pass filters
pub mod filters;

/// Timestamped frames
pub mod frame;

/// Per-face sample storage and windows
pub mod history;

/// `FastICA` source separation across skin regions
pub mod ica;

/// Frame-to-record pipeline
pub mod pipeline;

/// Offline replay of recorded traces
pub mod replay;

/// Skin region placement and hue sampling
pub mod roi;

/// Pulse records and record sinks
pub mod sink;

/// Band-pass filtering and power spectrum
pub mod spectrum;

/// Face identity across frames
pub mod tracker;

/// Statistics, colour conversion and numeric casts
pub mod utils;

/// Consumer thread with drop-if-busy frame hand-off
pub mod worker;

pub use config::Config;
pub use error::{Error, Result};
pub use estimator::PulseEstimate;
pub use pipeline::PulsePipeline;
pub use sink::{PulseRecord, RecordSink};
pub use worker::PipelineWorker;
