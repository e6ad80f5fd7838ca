//! Face observations and the detector interface.
//!
//! Landmark detection itself is an external collaborator: anything that can
//! turn a frame into face boxes plus landmark points implements
//! [`FaceDetector`]. [`TimedDetector`] runs such a detector on its own thread
//! so that a hung call costs one frame instead of stalling the consumer.

use crate::{frame::Frame, Error, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

/// A point in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Point {
    /// Create a new point
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned face bounding box, edges in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub left: f64,
    /// Top edge
    pub top: f64,
    /// Right edge
    pub right: f64,
    /// Bottom edge
    pub bottom: f64,
}

impl BoundingBox {
    /// Create a box from its edges
    #[must_use]
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self { left, top, right, bottom }
    }

    /// Box width (never negative)
    #[must_use]
    pub fn width(&self) -> f64 {
        (self.right - self.left).max(0.0)
    }

    /// Box height (never negative)
    #[must_use]
    pub fn height(&self) -> f64 {
        (self.bottom - self.top).max(0.0)
    }

    /// Box area
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Horizontal centre
    #[must_use]
    pub fn center_x(&self) -> f64 {
        (self.left + self.right) / 2.0
    }

    /// Intersection over union with another box
    #[must_use]
    pub fn iou(&self, other: &Self) -> f64 {
        let x1 = self.left.max(other.left);
        let y1 = self.top.max(other.top);
        let x2 = self.right.min(other.right);
        let y2 = self.bottom.min(other.bottom);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - inter;

        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// One detected face in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    /// Bounding box of the detected face
    pub bbox: BoundingBox,
    /// Ordered landmark points (dlib 68-point layout when present)
    pub landmarks: Vec<Point>,
}

impl FaceObservation {
    /// Observation with a box and no landmarks
    #[must_use]
    pub const fn from_bbox(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            landmarks: Vec::new(),
        }
    }
}

/// Trait for face detectors
pub trait FaceDetector: Send {
    /// Detect faces in a frame
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceObservation>>;

    /// Get detector name
    fn name(&self) -> &str {
        "FaceDetector"
    }
}

impl<D: FaceDetector + ?Sized> FaceDetector for Box<D> {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceObservation>> {
        (**self).detect(frame)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

type Reply = (u64, Result<Vec<FaceObservation>>);

/// Runs a detector on a dedicated thread and bounds every call
///
/// A call that does not complete within the budget fails with
/// `DetectionFailure`. While the inner detector is still stuck on an
/// earlier frame, further calls fail once the budget runs out waiting for
/// it; its late reply is discarded.
pub struct TimedDetector {
    name: String,
    requests: Sender<(u64, Frame)>,
    replies: Receiver<Reply>,
    timeout: Duration,
    next_seq: u64,
}

impl TimedDetector {
    /// Move `detector` onto its own thread
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned
    pub fn spawn<D: FaceDetector + 'static>(mut detector: D, timeout: Duration) -> Result<Self> {
        let name = detector.name().to_string();
        let (requests, request_rx) = bounded::<(u64, Frame)>(0);
        let (reply_tx, replies) = unbounded::<Reply>();

        thread::Builder::new()
            .name(format!("detector-{name}"))
            .spawn(move || {
                for (seq, frame) in request_rx {
                    let result = detector.detect(&frame);
                    if reply_tx.send((seq, result)).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            name,
            requests,
            replies,
            timeout,
            next_seq: 0,
        })
    }
}

impl FaceDetector for TimedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceObservation>> {
        let seq = self.next_seq;
        self.next_seq += 1;
        let deadline = Instant::now() + self.timeout;

        // Drop replies to calls that already timed out
        while let Ok((stale, _)) = self.replies.try_recv() {
            debug!("Discarding late reply {} from {}", stale, self.name);
        }

        match self.requests.send_timeout((seq, frame.clone()), self.timeout) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                warn!("Detector {} still busy after {:?}", self.name, self.timeout);
                return Err(Error::DetectionFailure(format!("{} is still busy", self.name)));
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                return Err(Error::DetectionFailure(format!("{} thread has stopped", self.name)));
            }
        }

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok((reply_seq, result)) if reply_seq == seq => return result,
                Ok((stale, _)) => debug!("Discarding late reply {} from {}", stale, self.name),
                Err(RecvTimeoutError::Timeout) => {
                    warn!("Detector {} timed out after {:?}", self.name, self.timeout);
                    return Err(Error::DetectionFailure(format!(
                        "{} timed out after {:?}",
                        self.name, self.timeout
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::DetectionFailure(format!("{} thread has stopped", self.name)));
                }
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
