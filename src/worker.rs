//! Producer/consumer runtime around a [`PulsePipeline`].
//!
//! The frame source calls [`PipelineWorker::submit`] from its own thread.
//! Frames are handed over a rendezvous channel: a frame is accepted only if
//! the consumer is idle and waiting, otherwise it is dropped on the spot.
//! The producer never blocks and nothing queues up behind a slow cycle.

use crate::{
    frame::Frame,
    pipeline::{ObservedFace, PipelineStats, PulsePipeline},
    sink::PulseRecord,
    Error, Result,
};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Sender, TrySendError};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Whether a submitted frame was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The consumer took the frame
    Accepted,
    /// The consumer was busy (or stopped); the frame was discarded
    Dropped,
}

/// Messages published by the consumer
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Detection results of one processed frame
    Observed {
        /// Capture time of the frame
        captured_at: DateTime<Utc>,
        /// Faces seen in the frame
        faces: Vec<ObservedFace>,
    },
    /// A new pulse rate
    Pulse(PulseRecord),
    /// A fatal error; the caller should reset or stop the worker
    Fatal(String),
}

enum Command {
    Frame(Frame),
    Reset,
}

/// Runs a pipeline on a dedicated consumer thread
pub struct PipelineWorker {
    commands: Option<Sender<Command>>,
    handle: Option<JoinHandle<PulsePipeline>>,
    stats: Arc<PipelineStats>,
}

impl PipelineWorker {
    /// Move `pipeline` onto a consumer thread publishing to `events`
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned
    pub fn spawn(mut pipeline: PulsePipeline, events: Sender<PipelineEvent>) -> Result<Self> {
        let stats = pipeline.stats();
        let (commands, command_rx) = bounded::<Command>(0);

        let handle = thread::Builder::new().name("pulse-pipeline".to_string()).spawn(move || {
            info!("Pipeline worker started");
            for command in command_rx {
                match command {
                    Command::Frame(frame) => match pipeline.process_frame(&frame) {
                        Ok(report) => {
                            // A gone receiver only means nobody is listening
                            let _ = events.send(PipelineEvent::Observed {
                                captured_at: frame.captured_at(),
                                faces: report.faces,
                            });
                            for record in report.records {
                                let _ = events.send(PipelineEvent::Pulse(record));
                            }
                        }
                        Err(e) => {
                            error!("Fatal pipeline error: {e}");
                            let _ = events.send(PipelineEvent::Fatal(e.to_string()));
                        }
                    },
                    Command::Reset => pipeline.reset(),
                }
            }
            if let Err(e) = pipeline.flush() {
                warn!("Failed to flush record sink: {e}");
            }
            info!("Pipeline worker stopped");
            pipeline
        })?;

        Ok(Self {
            commands: Some(commands),
            handle: Some(handle),
            stats,
        })
    }

    /// Offer a frame without blocking
    pub fn submit(&self, frame: Frame) -> SubmitOutcome {
        self.stats.frame_submitted();
        let Some(commands) = &self.commands else {
            self.stats.frame_dropped();
            return SubmitOutcome::Dropped;
        };

        match commands.try_send(Command::Frame(frame)) {
            Ok(()) => SubmitOutcome::Accepted,
            Err(TrySendError::Full(_)) => {
                debug!("Consumer busy, dropping frame");
                self.stats.frame_dropped();
                SubmitOutcome::Dropped
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("Consumer has stopped, dropping frame");
                self.stats.frame_dropped();
                SubmitOutcome::Dropped
            }
        }
    }

    /// End every session; waits for the current cycle to finish
    ///
    /// # Errors
    ///
    /// Returns `WorkerStopped` if the consumer is gone
    pub fn reset(&self) -> Result<()> {
        self.commands
            .as_ref()
            .ok_or_else(|| Error::WorkerStopped("worker already shut down".to_string()))?
            .send(Command::Reset)
            .map_err(|_| Error::WorkerStopped("consumer thread has exited".to_string()))
    }

    /// Shared statistics
    #[must_use]
    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Stop the consumer after its current cycle and take the pipeline back
    ///
    /// # Errors
    ///
    /// Returns `WorkerStopped` if the consumer thread panicked
    pub fn shutdown(mut self) -> Result<PulsePipeline> {
        self.commands = None;
        self.handle
            .take()
            .ok_or_else(|| Error::WorkerStopped("worker already shut down".to_string()))?
            .join()
            .map_err(|_| Error::WorkerStopped("consumer thread panicked".to_string()))
    }
}

impl Drop for PipelineWorker {
    fn drop(&mut self) {
        self.commands = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Pipeline worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        face::{BoundingBox, FaceDetector, FaceObservation},
        tracker::FaceId,
    };
    use crossbeam_channel::unbounded;
    use image::{Rgb, RgbImage};
    use std::time::Duration;

    struct SlowDetector {
        delay: Duration,
    }

    impl FaceDetector for SlowDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<FaceObservation>> {
            thread::sleep(self.delay);
            Ok(vec![FaceObservation::from_bbox(BoundingBox::new(50.0, 40.0, 170.0, 180.0))])
        }
    }

    fn worker(delay: Duration) -> (PipelineWorker, crossbeam_channel::Receiver<PipelineEvent>) {
        let pipeline = PulsePipeline::new(
            &Config::default(),
            Box::new(SlowDetector { delay }),
            Box::new(Vec::<PulseRecord>::new()),
        )
        .unwrap();
        let (tx, rx) = unbounded();
        (PipelineWorker::spawn(pipeline, tx).unwrap(), rx)
    }

    fn frame(at: DateTime<Utc>) -> Frame {
        Frame::new(RgbImage::from_pixel(224, 224, Rgb([10, 200, 30])), at).unwrap()
    }

    /// Retry until the idle consumer takes the frame
    fn submit_when_idle(worker: &PipelineWorker, frame: &Frame) {
        for _ in 0..1000 {
            if worker.submit(frame.clone()) == SubmitOutcome::Accepted {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("consumer never became idle");
    }

    #[test]
    fn test_busy_consumer_drops_frames() {
        let (worker, rx) = worker(Duration::from_millis(100));
        let start = Utc::now();
        submit_when_idle(&worker, &frame(start));

        // The consumer is now inside the slow detector
        assert_eq!(worker.submit(frame(start)), SubmitOutcome::Dropped);
        assert_eq!(worker.submit(frame(start)), SubmitOutcome::Dropped);

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(event, PipelineEvent::Observed { .. }));

        let stats = worker.stats().snapshot();
        assert!(stats.frames_dropped >= 2);
        worker.shutdown().unwrap();
    }

    #[test]
    fn test_samples_stay_in_arrival_order() {
        let (worker, _rx) = worker(Duration::from_millis(2));
        let start = Utc::now();

        // Bursty producer: many frames offered, only some accepted
        for i in 0..200 {
            let at = start + chrono::Duration::milliseconds(i * 5);
            worker.submit(frame(at));
            if i % 10 == 0 {
                thread::sleep(Duration::from_millis(5));
            }
        }

        let pipeline = worker.shutdown().unwrap();
        let session = pipeline.session(FaceId(0)).unwrap();
        let times: Vec<f64> = session.history().iter().map(|s| s.t).collect();
        assert!(!times.is_empty());
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_reset_through_worker() {
        let (worker, _rx) = worker(Duration::ZERO);
        submit_when_idle(&worker, &frame(Utc::now()));
        worker.reset().unwrap();

        let pipeline = worker.shutdown().unwrap();
        assert!(pipeline.session(FaceId(0)).is_none());
        assert_eq!(pipeline.tracked_faces(), 0);
    }

    #[test]
    fn test_shutdown_returns_pipeline_with_stats() {
        let (worker, _rx) = worker(Duration::ZERO);
        let start = Utc::now();
        for i in 0..5 {
            submit_when_idle(&worker, &frame(start + chrono::Duration::milliseconds(i * 33)));
        }
        let pipeline = worker.shutdown().unwrap();
        assert_eq!(pipeline.stats().snapshot().frames_processed, 5);
    }
}
