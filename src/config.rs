//! Configuration management for the pulse estimation pipeline

use crate::constants::{
    CHEEK_HALF_HEIGHT, CHEEK_HALF_WIDTH, DEFAULT_DEGENERATE_EPSILON, DEFAULT_DETECTOR_TIMEOUT_MS,
    DEFAULT_DETREND_WINDOW, DEFAULT_FILTER_ORDER, DEFAULT_HIGH_CUT_HZ, DEFAULT_IOU_THRESHOLD,
    DEFAULT_LOW_CUT_HZ, DEFAULT_MAX_MISSED_FRAMES, DEFAULT_MIN_PASSBAND_ENERGY, DEFAULT_SAMPLE_RATE_HZ,
    DEFAULT_TRIGGER_STEP, DEFAULT_WINDOW_LEN, FOREHEAD_HALF_HEIGHT, FOREHEAD_HALF_WIDTH,
    REFERENCE_INPUT_SIZE,
};
use crate::{utils::safe_cast::count_to_f64, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Smallest window the spectral stage accepts
const MIN_WINDOW_LEN: usize = 8;

/// Highest supported Butterworth prototype order
const MAX_FILTER_ORDER: usize = 8;

/// Pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Windowing, filtering and estimation parameters
    pub signal: SignalConfig,

    /// Region-of-interest geometry
    pub roi: RoiConfig,

    /// Face identity tracking
    pub tracking: TrackingConfig,

    /// Detector invocation
    pub detector: DetectorConfig,
}

/// How the slow trend is removed from a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetrendMethod {
    /// Least-squares straight line
    Linear,
    /// Centred moving average
    MovingAverage,
}

impl DetrendMethod {
    /// Filter name understood by `filters::create_filter`
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::MovingAverage => "moving_average",
        }
    }
}

/// Which sample rate the spectral stage assumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingMode {
    /// Fixed `sample_rate_hz` regardless of frame arrival times
    Nominal,
    /// Resample on the measured timestamps of the window
    Measured,
}

/// Whether regions are pooled into one channel or kept apart for ICA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// One mean hue over all three regions
    Combined,
    /// Forehead, left and right cheek as separate channels
    PerRegion,
}

/// Signal processing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Samples per analysis window
    pub window_len: usize,

    /// Samples between estimation cycles
    pub trigger_step: usize,

    /// Band-pass low cutoff (Hz)
    pub low_cut_hz: f64,

    /// Band-pass high cutoff (Hz)
    pub high_cut_hz: f64,

    /// Butterworth prototype order
    pub filter_order: usize,

    /// Assumed frame rate (Hz)
    pub sample_rate_hz: f64,

    /// Detrend method
    pub detrend: DetrendMethod,

    /// Moving-average detrend window (odd)
    pub detrend_window: usize,

    /// Sample timing model
    pub timing: TimingMode,

    /// Standard deviation floor for degenerate windows
    pub degenerate_epsilon: f64,

    /// Share of conditioned energy the band-pass must retain
    pub min_passband_energy: f64,

    /// Retained samples per face, unbounded when absent
    pub history_capacity: Option<usize>,
}

/// ROI geometry, expressed at `reference_size`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiConfig {
    /// Side of the square reference image
    pub reference_size: u32,

    /// Forehead half width
    pub forehead_half_width: f64,

    /// Forehead half height
    pub forehead_half_height: f64,

    /// Cheek half width
    pub cheek_half_width: f64,

    /// Cheek half height
    pub cheek_half_height: f64,

    /// Channel layout fed to the estimator
    pub channel_mode: ChannelMode,
}

/// Face tracking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Minimum box overlap to keep a face identity
    pub iou_threshold: f64,

    /// Processed frames a face may be missing before its session ends
    pub max_missed_frames: u32,
}

/// Detector invocation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Budget for one detector call in milliseconds
    pub timeout_ms: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            window_len: DEFAULT_WINDOW_LEN,
            trigger_step: DEFAULT_TRIGGER_STEP,
            low_cut_hz: DEFAULT_LOW_CUT_HZ,
            high_cut_hz: DEFAULT_HIGH_CUT_HZ,
            filter_order: DEFAULT_FILTER_ORDER,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            detrend: DetrendMethod::Linear,
            detrend_window: DEFAULT_DETREND_WINDOW,
            timing: TimingMode::Nominal,
            degenerate_epsilon: DEFAULT_DEGENERATE_EPSILON,
            min_passband_energy: DEFAULT_MIN_PASSBAND_ENERGY,
            history_capacity: None,
        }
    }
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            reference_size: REFERENCE_INPUT_SIZE,
            forehead_half_width: FOREHEAD_HALF_WIDTH,
            forehead_half_height: FOREHEAD_HALF_HEIGHT,
            cheek_half_width: CHEEK_HALF_WIDTH,
            cheek_half_height: CHEEK_HALF_HEIGHT,
            channel_mode: ChannelMode::Combined,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_missed_frames: DEFAULT_MAX_MISSED_FRAMES,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_DETECTOR_TIMEOUT_MS,
        }
    }
}

impl DetectorConfig {
    /// Detector budget as a `Duration`
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl SignalConfig {
    /// Frequency resolution of one spectrum bin at the nominal rate
    #[must_use]
    pub fn bin_resolution_hz(&self) -> f64 {
        self.sample_rate_hz / count_to_f64(self.window_len)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let signal = &self.signal;

        // Windowing
        if signal.window_len < MIN_WINDOW_LEN {
            return Err(Error::ConfigError(format!(
                "Window length must be at least {MIN_WINDOW_LEN}, got {}",
                signal.window_len
            )));
        }
        if signal.trigger_step == 0 {
            return Err(Error::ConfigError("Trigger step must be greater than 0".to_string()));
        }
        if let Some(capacity) = signal.history_capacity {
            let needed = signal.window_len + signal.trigger_step;
            if capacity < needed {
                return Err(Error::ConfigError(format!(
                    "History capacity must retain at least {needed} samples, got {capacity}"
                )));
            }
        }

        // Band-pass
        if !(signal.sample_rate_hz.is_finite() && signal.sample_rate_hz > 0.0) {
            return Err(Error::ConfigError("Sample rate must be positive".to_string()));
        }
        let nyquist = signal.sample_rate_hz / 2.0;
        if !(signal.low_cut_hz > 0.0 && signal.low_cut_hz < signal.high_cut_hz && signal.high_cut_hz < nyquist) {
            return Err(Error::ConfigError(format!(
                "Cutoffs must satisfy 0 < low < high < {nyquist} Hz, got {}..{}",
                signal.low_cut_hz, signal.high_cut_hz
            )));
        }
        if !(1..=MAX_FILTER_ORDER).contains(&signal.filter_order) {
            return Err(Error::ConfigError(format!(
                "Filter order must be between 1 and {MAX_FILTER_ORDER}, got {}",
                signal.filter_order
            )));
        }

        // Conditioning
        if signal.detrend == DetrendMethod::MovingAverage
            && (signal.detrend_window == 0 || signal.detrend_window % 2 == 0)
        {
            return Err(Error::ConfigError(
                "Detrend window size must be odd and greater than 0".to_string(),
            ));
        }
        if !(signal.degenerate_epsilon >= 0.0) {
            return Err(Error::ConfigError("Degenerate epsilon must be non-negative".to_string()));
        }
        if !(0.0..1.0).contains(&signal.min_passband_energy) {
            return Err(Error::ConfigError(
                "Minimum passband energy must be in [0.0, 1.0)".to_string(),
            ));
        }

        // ROI
        if self.roi.reference_size == 0 {
            return Err(Error::ConfigError("ROI reference size must be greater than 0".to_string()));
        }
        let extents = [
            self.roi.forehead_half_width,
            self.roi.forehead_half_height,
            self.roi.cheek_half_width,
            self.roi.cheek_half_height,
        ];
        if extents.iter().any(|e| !(e.is_finite() && *e > 0.0)) {
            return Err(Error::ConfigError("ROI half extents must be positive".to_string()));
        }

        // Tracking and detector
        if !(0.0..=1.0).contains(&self.tracking.iou_threshold) {
            return Err(Error::ConfigError(
                "IOU threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.detector.timeout_ms == 0 {
            return Err(Error::ConfigError("Detector timeout must be greater than 0".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# rPPG Pulse Estimation Configuration

# Windowing, filtering and estimation
signal:
  window_len: 150
  trigger_step: 5
  low_cut_hz: 0.75
  high_cut_hz: 4.0
  filter_order: 4
  sample_rate_hz: 30.0
  detrend: linear          # linear | moving_average
  detrend_window: 31
  timing: nominal          # nominal | measured
  degenerate_epsilon: 1.0e-8
  min_passband_energy: 0.02
  # history_capacity: 600  # unbounded when absent

# Region-of-interest geometry at reference_size
roi:
  reference_size: 224
  forehead_half_width: 17.0
  forehead_half_height: 11.0
  cheek_half_width: 15.0
  cheek_half_height: 12.0
  channel_mode: combined   # combined | per_region

# Face identity tracking
tracking:
  iou_threshold: 0.3
  max_missed_frames: 30

# Detector invocation
detector:
  timeout_ms: 500
"#;
