//! Pulse records and the sinks that receive them.

use crate::{constants::SESSION_TIME_FORMAT, tracker::FaceId, Error, Result};
use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Identifies one face tracking session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Session id from its start time and the tracked face
    #[must_use]
    pub fn new(started_at: DateTime<Utc>, face_id: FaceId) -> Self {
        Self(format!("{}#{}", started_at.format(SESSION_TIME_FORMAT), face_id))
    }

    /// The id as text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One emitted pulse rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseRecord {
    /// Session the record belongs to
    pub session_id: SessionId,
    /// Tracked face
    pub face_id: u64,
    /// Session start time
    pub session_started: DateTime<Utc>,
    /// Capture time of the frame that completed the window
    pub captured_at: DateTime<Utc>,
    /// Estimated pulse rate
    pub pulse_rate_bpm: f64,
}

impl PulseRecord {
    /// Build a record for a face session
    #[must_use]
    pub fn new(
        face_id: FaceId,
        session_started: DateTime<Utc>,
        captured_at: DateTime<Utc>,
        pulse_rate_bpm: f64,
    ) -> Self {
        Self {
            session_id: SessionId::new(session_started, face_id),
            face_id: face_id.0,
            session_started,
            captured_at,
            pulse_rate_bpm,
        }
    }
}

/// Append-only destination for pulse records
pub trait RecordSink: Send {
    /// Append one record
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be stored
    fn append(&mut self, record: &PulseRecord) -> Result<()>;

    /// Flush buffered records
    ///
    /// # Errors
    ///
    /// Returns an error if buffered records could not be written
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Get sink name
    fn name(&self) -> &str {
        "RecordSink"
    }
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn append(&mut self, record: &PulseRecord) -> Result<()> {
        (**self).append(record)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Collects records in memory
impl RecordSink for Vec<PulseRecord> {
    fn append(&mut self, record: &PulseRecord) -> Result<()> {
        self.try_reserve(1)?;
        self.push(record.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "MemorySink"
    }
}

/// Writes records as CSV rows with a header line
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvSink<File> {
    /// Create (or truncate) a CSV file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
        })
    }
}

impl<W: Write> CsvSink<W> {
    /// Write CSV to any writer
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
        }
    }

    /// Flush and return the underlying writer
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if buffered rows could not be written
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| Error::SinkError(format!("Failed to flush CSV: {e}")))
    }
}

impl<W: Write + Send> RecordSink for CsvSink<W> {
    fn append(&mut self, record: &PulseRecord) -> Result<()> {
        self.writer.serialize(record)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "CsvSink"
    }
}

/// Forwards records over a channel
pub struct ChannelSink {
    sender: Sender<PulseRecord>,
}

impl ChannelSink {
    /// Wrap a sender
    #[must_use]
    pub const fn new(sender: Sender<PulseRecord>) -> Self {
        Self { sender }
    }
}

impl RecordSink for ChannelSink {
    fn append(&mut self, record: &PulseRecord) -> Result<()> {
        self.sender
            .send(record.clone())
            .map_err(|_| Error::SinkError("Record receiver disconnected".to_string()))
    }

    fn name(&self) -> &str {
        "ChannelSink"
    }
}
