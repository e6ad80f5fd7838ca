//! Per-face sample history and window extraction.

use crate::{
    error::Result,
    utils::safe_cast::count_to_f64,
    Error,
};
use std::collections::VecDeque;

/// One processed frame's contribution for one face
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Seconds since the face's session started
    pub t: f64,
    /// Mean hue over all regions
    pub combined: f64,
    /// Mean hue per region (forehead, left cheek, right cheek)
    pub regions: [f64; 3],
}

impl Sample {
    /// A sample with a single channel value
    #[must_use]
    pub const fn scalar(t: f64, value: f64) -> Self {
        Self {
            t,
            combined: value,
            regions: [value; 3],
        }
    }
}

/// Append-only sample sequence for one tracked face
///
/// `len()` counts every sample ever appended and never decreases. With a
/// capacity the oldest samples are released once more than `capacity`
/// are held; append order is preserved either way.
#[derive(Debug, Clone)]
pub struct SampleHistory {
    samples: VecDeque<Sample>,
    capacity: Option<usize>,
    appended: usize,
}

/// A contiguous copy of the most recent samples
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Sample timestamps (seconds since session start)
    pub times: Vec<f64>,
    /// Combined channel
    pub combined: Vec<f64>,
    /// Region channels (forehead, left cheek, right cheek)
    pub regions: [Vec<f64>; 3],
}

impl Window {
    /// Number of samples in the window
    #[must_use]
    pub fn len(&self) -> usize {
        self.combined.len()
    }

    /// Whether the window holds no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.combined.is_empty()
    }

    /// Seconds between the first and last sample
    #[must_use]
    pub fn span(&self) -> f64 {
        match (self.times.first(), self.times.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Resample every channel onto `len()` evenly spaced instants
    ///
    /// Uses linear interpolation between the recorded timestamps. Returns the
    /// resampled window and its effective sample rate, or `None` when the
    /// timestamps do not span a positive interval or are not increasing.
    #[must_use]
    pub fn resample_uniform(&self) -> Option<(Self, f64)> {
        let n = self.len();
        let span = self.span();
        if n < 2 || !(span > 0.0) || self.times.windows(2).any(|w| w[1] <= w[0]) {
            return None;
        }

        let step = span / count_to_f64(n - 1);
        let start = self.times[0];
        let grid: Vec<f64> = (0..n).map(|i| count_to_f64(i).mul_add(step, start)).collect();

        let interpolate = |values: &[f64]| -> Vec<f64> {
            let mut out = Vec::with_capacity(n);
            let mut j = 0;
            for &t in &grid {
                while j + 2 < n && self.times[j + 1] < t {
                    j += 1;
                }
                let (t0, t1) = (self.times[j], self.times[j + 1]);
                let frac = ((t - t0) / (t1 - t0)).clamp(0.0, 1.0);
                out.push(frac.mul_add(values[j + 1] - values[j], values[j]));
            }
            out
        };

        let resampled = Self {
            combined: interpolate(&self.combined),
            regions: [
                interpolate(&self.regions[0]),
                interpolate(&self.regions[1]),
                interpolate(&self.regions[2]),
            ],
            times: grid,
        };

        Some((resampled, count_to_f64(n - 1) / span))
    }
}

impl SampleHistory {
    /// Create an unbounded history
    #[must_use]
    pub fn new() -> Self {
        Self {
            samples: VecDeque::new(),
            capacity: None,
            appended: 0,
        }
    }

    /// Create a history that holds at most `capacity` samples
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: Some(capacity),
            appended: 0,
        }
    }

    /// Append one sample
    pub fn push(&mut self, sample: Sample) {
        if let Some(capacity) = self.capacity {
            while self.samples.len() >= capacity.max(1) {
                self.samples.pop_front();
            }
        }
        self.samples.push_back(sample);
        self.appended += 1;
    }

    /// Total samples appended over the session
    #[must_use]
    pub const fn len(&self) -> usize {
        self.appended
    }

    /// Whether nothing was appended yet
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.appended == 0
    }

    /// Samples currently held
    #[must_use]
    pub fn retained(&self) -> usize {
        self.samples.len()
    }

    /// Iterate over held samples, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    /// Most recent sample
    #[must_use]
    pub fn last(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Copy the last `len` samples, `history[length - len .. length]`
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if fewer than `len` samples are held and
    /// `ResourceExhausted` if the copy cannot be allocated
    pub fn window(&self, len: usize) -> Result<Window> {
        if len == 0 || self.samples.len() < len {
            return Err(Error::InvalidInput(format!(
                "Window of {len} samples requested, {} held",
                self.samples.len()
            )));
        }

        let mut times = Vec::new();
        let mut combined = Vec::new();
        let mut regions = [Vec::new(), Vec::new(), Vec::new()];
        times.try_reserve_exact(len)?;
        combined.try_reserve_exact(len)?;
        for channel in &mut regions {
            channel.try_reserve_exact(len)?;
        }

        for sample in self.samples.range(self.samples.len() - len..) {
            times.push(sample.t);
            combined.push(sample.combined);
            for (channel, value) in regions.iter_mut().zip(sample.regions) {
                channel.push(value);
            }
        }

        Ok(Window {
            times,
            combined,
            regions,
        })
    }
}

impl Default for SampleHistory {
    fn default() -> Self {
        Self::new()
    }
}
