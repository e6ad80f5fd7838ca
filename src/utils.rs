//! Utility functions for color conversion, casting and window statistics.

pub mod color;
pub mod safe_cast;

use safe_cast::count_to_f64;

/// Statistical summary of a data window
#[derive(Debug, Clone, Copy)]
pub struct Statistics {
    /// Mean value of the data
    pub mean: f64,
    /// Population standard deviation of the data
    pub std_dev: f64,
    /// Minimum value in the window
    pub min: f64,
    /// Maximum value in the window
    pub max: f64,
}

impl Statistics {
    /// Range (max - min) of the data
    #[must_use]
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

/// Calculate statistics for a data window
///
/// Returns `None` for an empty window.
#[must_use]
pub fn calculate_stats<'a, I>(data: I) -> Option<Statistics>
where
    I: IntoIterator<Item = &'a f64>,
    I::IntoIter: Clone,
{
    let iter = data.into_iter();
    let n = iter.clone().count();
    if n == 0 {
        return None;
    }
    let n = count_to_f64(n);

    let mean = iter.clone().sum::<f64>() / n;
    let variance = iter.clone().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

    let min = iter.clone().copied().fold(f64::INFINITY, f64::min);
    let max = iter.copied().fold(f64::NEG_INFINITY, f64::max);

    Some(Statistics {
        mean,
        std_dev: variance.sqrt(),
        min,
        max,
    })
}

/// Sum of squares of a series
#[must_use]
pub fn energy(data: &[f64]) -> f64 {
    data.iter().map(|x| x * x).sum()
}
