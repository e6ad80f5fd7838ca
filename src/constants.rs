//! Constants used throughout the pipeline

/// Number of samples in one analysis window (W)
pub const DEFAULT_WINDOW_LEN: usize = 150;

/// Samples appended between successive estimation cycles once warmed up
pub const DEFAULT_TRIGGER_STEP: usize = 5;

/// Band-pass low cutoff in Hz (45 BPM)
pub const DEFAULT_LOW_CUT_HZ: f64 = 0.75;

/// Band-pass high cutoff in Hz (240 BPM)
pub const DEFAULT_HIGH_CUT_HZ: f64 = 4.0;

/// Butterworth prototype order
pub const DEFAULT_FILTER_ORDER: usize = 4;

/// Assumed camera frame rate
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 30.0;

/// Window of the moving-average detrend (odd)
pub const DEFAULT_DETREND_WINDOW: usize = 31;

/// Standard deviation at or below which a window is treated as constant
pub const DEFAULT_DEGENERATE_EPSILON: f64 = 1e-8;

/// Minimum share of conditioned energy the band-pass must keep
pub const DEFAULT_MIN_PASSBAND_ENERGY: f64 = 0.02;

/// Seconds per minute
pub const SECONDS_PER_MINUTE: f64 = 60.0;

/// Side of the square image the ROI geometry is expressed in
pub const REFERENCE_INPUT_SIZE: u32 = 224;

/// Forehead region half extents at reference size
pub const FOREHEAD_HALF_WIDTH: f64 = 17.0;
pub const FOREHEAD_HALF_HEIGHT: f64 = 11.0;

/// Forehead centre below the top of the face box at reference size
pub const FOREHEAD_OFFSET_Y: f64 = 6.0;

/// Cheek region half extents at reference size
pub const CHEEK_HALF_WIDTH: f64 = 15.0;
pub const CHEEK_HALF_HEIGHT: f64 = 12.0;

/// Cheek centres relative to the face box at reference size
pub const CHEEK_OFFSET_X: f64 = 35.0;
pub const CHEEK_OFFSET_Y: f64 = 72.0;

/// Cheek centres below eye level, as a fraction of face height
pub const CHEEK_BELOW_EYES_FRACTION: f64 = 0.2;

/// dlib 68-point landmark index ranges
pub const NUM_FACIAL_LANDMARKS: usize = 68;
pub const EYEBROW_LANDMARKS: std::ops::RangeInclusive<usize> = 17..=26;
pub const LEFT_EYE_LANDMARKS: std::ops::RangeInclusive<usize> = 36..=41;
pub const RIGHT_EYE_LANDMARKS: std::ops::RangeInclusive<usize> = 42..=47;

/// Face tracking defaults
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.3;
pub const DEFAULT_MAX_MISSED_FRAMES: u32 = 30;

/// Detector call budget
pub const DEFAULT_DETECTOR_TIMEOUT_MS: u64 = 500;

/// FastICA iteration limits
pub const ICA_MAX_ITERATIONS: usize = 200;
pub const ICA_TOLERANCE: f64 = 1e-4;

/// Relative eigenvalue floor for whitening
pub const WHITENING_EPSILON: f64 = 1e-10;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-12;

/// Session id timestamp format (matches record file naming)
pub const SESSION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
