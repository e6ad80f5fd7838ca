//! Error types for the pulse estimation library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Frame could not be decoded or read
    #[error("Acquisition failure: {0}")]
    AcquisitionFailure(String),

    /// Detector call failed, timed out or was still busy
    #[error("Detection failure: {0}")]
    DetectionFailure(String),

    /// Window has (near) zero variance after detrending
    #[error("Degenerate signal: standard deviation {std_dev:e} is below the floor")]
    DegenerateSignal {
        /// Standard deviation of the detrended window
        std_dev: f64,
    },

    /// No usable spectral peak inside the pulse band
    #[error("Out-of-band result: {0}")]
    OutOfBandResult(String),

    /// Window or spectrum buffers could not be allocated
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Record sink rejected a record
    #[error("Record sink error: {0}")]
    SinkError(String),

    /// Pipeline worker thread stopped unexpectedly
    #[error("Worker stopped: {0}")]
    WorkerStopped(String),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// CSV reading or writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// YAML (de)serialization failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether the error must abort the session instead of skipping one cycle
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ResourceExhausted(_))
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(e: std::collections::TryReserveError) -> Self {
        Self::ResourceExhausted(e.to_string())
    }
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
