//! Face identity across frames.
//!
//! Boxes are matched greedily against the faces of the previous frame by
//! intersection over union. Unmatched detections start a new identity; a
//! known face that stays unmatched for more than `max_missed_frames`
//! processed frames expires.

use crate::{config::TrackingConfig, face::BoundingBox};
use log::debug;
use serde::Serialize;
use std::fmt;

/// Stable identity of a tracked face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FaceId(pub u64);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Track {
    id: FaceId,
    bbox: BoundingBox,
    missed: u32,
}

/// Outcome of one tracking update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackUpdate {
    /// Identity per input box, in input order
    pub assigned: Vec<FaceId>,
    /// Faces seen for the first time
    pub started: Vec<FaceId>,
    /// Faces that expired on this update
    pub expired: Vec<FaceId>,
}

/// Assigns face identities by box overlap
#[derive(Debug)]
pub struct FaceTracker {
    iou_threshold: f64,
    max_missed_frames: u32,
    tracks: Vec<Track>,
    next_id: u64,
}

impl FaceTracker {
    /// Create a tracker with no known faces
    #[must_use]
    pub const fn new(config: &TrackingConfig) -> Self {
        Self {
            iou_threshold: config.iou_threshold,
            max_missed_frames: config.max_missed_frames,
            tracks: Vec::new(),
            next_id: 0,
        }
    }

    /// Match this frame's boxes against known faces
    ///
    /// Candidate pairs are taken in order of decreasing overlap; each track
    /// and each box is used at most once. A frame with no boxes (including a
    /// failed detection) counts as a miss for every known face.
    pub fn update(&mut self, boxes: &[BoundingBox]) -> TrackUpdate {
        let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            for (bi, bbox) in boxes.iter().enumerate() {
                let iou = track.bbox.iou(bbox);
                if iou >= self.iou_threshold && iou > 0.0 {
                    pairs.push((iou, ti, bi));
                }
            }
        }
        pairs.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut track_used = vec![false; self.tracks.len()];
        let mut assigned: Vec<Option<FaceId>> = vec![None; boxes.len()];
        for (_, ti, bi) in pairs {
            if track_used[ti] || assigned[bi].is_some() {
                continue;
            }
            track_used[ti] = true;
            assigned[bi] = Some(self.tracks[ti].id);
            self.tracks[ti].bbox = boxes[bi];
            self.tracks[ti].missed = 0;
        }

        let mut update = TrackUpdate::default();

        for (track, used) in self.tracks.iter_mut().zip(&track_used) {
            if !used {
                track.missed += 1;
            }
        }
        let max_missed = self.max_missed_frames;
        self.tracks.retain(|track| {
            let keep = track.missed <= max_missed;
            if !keep {
                debug!("Face {} expired after {} missed frames", track.id, track.missed);
                update.expired.push(track.id);
            }
            keep
        });

        for (slot, bbox) in assigned.iter_mut().zip(boxes) {
            if slot.is_none() {
                let id = FaceId(self.next_id);
                self.next_id += 1;
                self.tracks.push(Track {
                    id,
                    bbox: *bbox,
                    missed: 0,
                });
                update.started.push(id);
                *slot = Some(id);
            }
        }

        update.assigned = assigned.into_iter().flatten().collect();
        update
    }

    /// Forget every face; returns the identities that were active
    pub fn reset(&mut self) -> Vec<FaceId> {
        self.tracks.drain(..).map(|t| t.id).collect()
    }

    /// Number of faces currently tracked
    #[must_use]
    pub fn active(&self) -> usize {
        self.tracks.len()
    }
}
