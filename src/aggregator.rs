//! Sample aggregation and the estimation trigger.
//!
//! Each tracked face owns a [`SampleHistory`] and a trigger counter. Once the
//! history holds `window_len + cutlow` samples a window is released for one
//! estimation cycle and `cutlow` advances by `trigger_step`, so after the
//! warm-up a new estimate is produced every `trigger_step` frames.

use crate::{
    config::SignalConfig,
    history::{Sample, SampleHistory, Window},
    tracker::FaceId,
    Result,
};
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::HashMap;

/// State kept for one face tracking session
#[derive(Debug, Clone)]
pub struct FaceSession {
    /// Identity of the tracked face
    pub face_id: FaceId,
    /// When the first sample was appended
    pub started_at: DateTime<Utc>,
    history: SampleHistory,
    cutlow: usize,
}

impl FaceSession {
    fn new(face_id: FaceId, started_at: DateTime<Utc>, capacity: Option<usize>) -> Self {
        Self {
            face_id,
            started_at,
            history: capacity.map_or_else(SampleHistory::new, SampleHistory::with_capacity),
            cutlow: 0,
        }
    }

    /// The sample history of this session
    #[must_use]
    pub const fn history(&self) -> &SampleHistory {
        &self.history
    }

    /// Samples past the warm-up already consumed by triggers
    #[must_use]
    pub const fn cutlow(&self) -> usize {
        self.cutlow
    }

    /// Seconds from session start to `at`
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Microsecond offsets within a session
    pub fn elapsed_seconds(&self, at: DateTime<Utc>) -> f64 {
        (at - self.started_at).num_microseconds().unwrap_or(0) as f64 / 1e6
    }
}

/// A window released by the trigger
#[derive(Debug, Clone)]
pub struct TriggeredWindow {
    /// Face the window belongs to
    pub face_id: FaceId,
    /// Session start of that face
    pub session_started: DateTime<Utc>,
    /// History length at the time of the trigger
    pub history_len: usize,
    /// The copied window
    pub window: Window,
}

/// Appends samples per face and decides when to estimate
#[derive(Debug)]
pub struct SampleAggregator {
    window_len: usize,
    trigger_step: usize,
    capacity: Option<usize>,
    sessions: HashMap<FaceId, FaceSession>,
}

impl SampleAggregator {
    /// Create an aggregator from the signal configuration
    #[must_use]
    pub fn new(config: &SignalConfig) -> Self {
        Self {
            window_len: config.window_len,
            trigger_step: config.trigger_step.max(1),
            capacity: config.history_capacity,
            sessions: HashMap::new(),
        }
    }

    /// Start a session for `face_id` if none exists
    pub fn begin_session(&mut self, face_id: FaceId, at: DateTime<Utc>) -> &FaceSession {
        let capacity = self.capacity;
        self.sessions.entry(face_id).or_insert_with(|| {
            info!("Session started for face {face_id}");
            FaceSession::new(face_id, at, capacity)
        })
    }

    /// Append one sample and fire the trigger if its condition holds
    ///
    /// The trigger counter advances whenever a window is released, whatever
    /// the outcome of the estimation cycle that consumes it.
    ///
    /// # Errors
    ///
    /// Returns `ResourceExhausted` if the window copy cannot be allocated
    pub fn append(&mut self, face_id: FaceId, at: DateTime<Utc>, sample: Sample) -> Result<Option<TriggeredWindow>> {
        self.begin_session(face_id, at);
        let Some(session) = self.sessions.get_mut(&face_id) else {
            return Ok(None);
        };

        session.history.push(sample);

        let len = session.history.len();
        if len < self.window_len + session.cutlow {
            return Ok(None);
        }

        let window = session.history.window(self.window_len)?;
        session.cutlow += self.trigger_step;
        debug!("Trigger fired for face {face_id} at {len} samples, next at {}", self.window_len + session.cutlow);

        Ok(Some(TriggeredWindow {
            face_id,
            session_started: session.started_at,
            history_len: len,
            window,
        }))
    }

    /// End the session of `face_id`, dropping its history
    pub fn end_session(&mut self, face_id: FaceId) -> Option<FaceSession> {
        let session = self.sessions.remove(&face_id);
        if let Some(s) = &session {
            info!("Session ended for face {} after {} samples", face_id, s.history.len());
        }
        session
    }

    /// End every session
    pub fn clear(&mut self) {
        let ids: Vec<FaceId> = self.sessions.keys().copied().collect();
        for id in ids {
            self.end_session(id);
        }
    }

    /// Session of `face_id`, if active
    #[must_use]
    pub fn session(&self, face_id: FaceId) -> Option<&FaceSession> {
        self.sessions.get(&face_id)
    }

    /// Number of active sessions
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}
