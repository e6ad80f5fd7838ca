use super::SignalFilter;
use crate::{utils::safe_cast::count_to_f64, Result};

/// Removes the least-squares straight line from a window
pub struct LinearDetrend;

impl SignalFilter for LinearDetrend {
    fn apply(&self, signal: &[f64]) -> Result<Vec<f64>> {
        let mut out = Vec::new();
        out.try_reserve_exact(signal.len())?;

        let n = signal.len();
        if n < 2 {
            out.extend(signal.iter().map(|_| 0.0));
            return Ok(out);
        }

        // Abscissa centred on zero so the slope and intercept decouple
        let nf = count_to_f64(n);
        let x_mean = (nf - 1.0) / 2.0;
        let y_mean = signal.iter().sum::<f64>() / nf;

        let (sxy, sxx) = signal.iter().enumerate().fold((0.0, 0.0), |(sxy, sxx), (i, &y)| {
            let dx = count_to_f64(i) - x_mean;
            (dx.mul_add(y - y_mean, sxy), dx.mul_add(dx, sxx))
        });
        let slope = sxy / sxx;

        out.extend(
            signal
                .iter()
                .enumerate()
                .map(|(i, &y)| y - slope.mul_add(count_to_f64(i) - x_mean, y_mean)),
        );
        Ok(out)
    }

    fn name(&self) -> &str {
        "LinearDetrend"
    }
}
