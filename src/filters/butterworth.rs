use super::SignalFilter;
use crate::{utils::safe_cast::count_to_f64, Error, Result};
use num_complex::Complex64;
use std::f64::consts::PI;

/// One second-order section, `a[0]` normalised to 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    /// Numerator coefficients
    pub b: [f64; 3],
    /// Denominator coefficients
    pub a: [f64; 3],
}

impl Biquad {
    fn from_poles(z1: Complex64, z2: Complex64) -> Self {
        // Band-pass sections carry one zero at z = 1 and one at z = -1
        Self {
            b: [1.0, 0.0, -1.0],
            a: [1.0, -(z1 + z2).re, (z1 * z2).re],
        }
    }

    /// Gain for a constant input
    #[must_use]
    pub fn dc_gain(&self) -> f64 {
        let den: f64 = self.a.iter().sum();
        if den.abs() < f64::EPSILON {
            return 0.0;
        }
        self.b.iter().sum::<f64>() / den
    }

    /// Transposed direct-form II state that holds a constant input `x` steady
    fn steady_state(&self, x: f64) -> (f64, f64) {
        let y = self.dc_gain() * x;
        let s2 = self.b[2].mul_add(x, -self.a[2] * y);
        let s1 = self.b[0].mul_add(-x, y);
        (s1, s2)
    }

    fn response(&self, w: f64) -> Complex64 {
        let e1 = Complex64::from_polar(1.0, -w);
        let e2 = e1 * e1;
        let num = e2 * self.b[2] + e1 * self.b[1] + self.b[0];
        let den = e2 * self.a[2] + e1 * self.a[1] + self.a[0];
        num / den
    }
}

/// Digital Butterworth band-pass
///
/// Designed from the analog prototype through the low-pass to band-pass
/// transform and a pre-warped bilinear transform, so the response is
/// exactly `1/sqrt(2)` at both cutoffs. Applied causally, one window at a
/// time, with the sections started in the steady state of the first sample.
#[derive(Debug, Clone)]
pub struct ButterworthBandpass {
    sections: Vec<Biquad>,
    sample_rate: f64,
    low_hz: f64,
    high_hz: f64,
}

impl ButterworthBandpass {
    /// Design a band-pass with `order` prototype poles (`order` sections)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` unless `order >= 1` and
    /// `0 < low_hz < high_hz < sample_rate / 2`
    pub fn new(order: usize, low_hz: f64, high_hz: f64, sample_rate: f64) -> Result<Self> {
        if order == 0 {
            return Err(Error::ConfigError("Filter order must be at least 1".to_string()));
        }
        let nyquist = sample_rate / 2.0;
        if !(sample_rate.is_finite() && low_hz > 0.0 && low_hz < high_hz && high_hz < nyquist) {
            return Err(Error::ConfigError(format!(
                "Band {low_hz}..{high_hz} Hz is not inside 0..{nyquist} Hz"
            )));
        }

        let fs2 = 2.0 * sample_rate;
        let warp = |f: f64| fs2 * (PI * f / sample_rate).tan();
        let (wl, wh) = (warp(low_hz), warp(high_hz));
        let bw = wh - wl;
        let wo2 = wl * wh;
        let bilinear = |p: Complex64| (fs2 + p) / (fs2 - p);

        let n = count_to_f64(order);
        let mut sections = Vec::with_capacity(order);
        let mut denominator = Complex64::new(1.0, 0.0);

        for k in 0..order {
            // Prototype poles -exp(i*pi*m/(2n)) for m = -n+1, -n+3, ..., n-1.
            // Only the upper half plane (m < 0) and the real pole (m = 0) are
            // visited, their conjugates are folded into the same sections.
            let twice_k = 2 * k;
            if twice_k > order - 1 {
                break;
            }
            let m = count_to_f64(twice_k) - (n - 1.0);
            let prototype = -Complex64::from_polar(1.0, PI * m / (2.0 * n));

            let lowpass = prototype * (bw / 2.0);
            let spread = (lowpass * lowpass - wo2).sqrt();
            let (q1, q2) = (lowpass + spread, lowpass - spread);

            if twice_k == order - 1 {
                sections.push(Biquad::from_poles(bilinear(q1), bilinear(q2)));
                denominator *= (fs2 - q1) * (fs2 - q2);
            } else {
                for q in [q1, q2] {
                    let z = bilinear(q);
                    sections.push(Biquad::from_poles(z, z.conj()));
                    denominator *= (fs2 - q) * (fs2 - q.conj());
                }
            }
        }

        let gain = (bw * fs2).powi(i32::try_from(order).map_err(|_| {
            Error::ConfigError(format!("Filter order {order} is too large"))
        })?) / denominator.re;
        if let Some(first) = sections.first_mut() {
            first.b = first.b.map(|c| c * gain);
        }

        Ok(Self {
            sections,
            sample_rate,
            low_hz,
            high_hz,
        })
    }

    /// Second-order sections in application order
    #[must_use]
    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Design sample rate (Hz)
    #[must_use]
    pub const fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Cutoff frequencies (Hz)
    #[must_use]
    pub const fn band(&self) -> (f64, f64) {
        (self.low_hz, self.high_hz)
    }

    /// Magnitude response at `freq_hz`
    #[must_use]
    pub fn magnitude(&self, freq_hz: f64) -> f64 {
        let w = 2.0 * PI * freq_hz / self.sample_rate;
        self.sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |h, s| h * s.response(w))
            .norm()
    }
}

impl SignalFilter for ButterworthBandpass {
    fn apply(&self, signal: &[f64]) -> Result<Vec<f64>> {
        let mut out = Vec::new();
        out.try_reserve_exact(signal.len())?;
        out.extend_from_slice(signal);

        let Some(&first) = signal.first() else {
            return Ok(out);
        };

        let mut level = first;
        for section in &self.sections {
            let (mut s1, mut s2) = section.steady_state(level);
            level *= section.dc_gain();

            let [b0, b1, b2] = section.b;
            let [_, a1, a2] = section.a;
            for v in &mut out {
                let x = *v;
                let y = b0.mul_add(x, s1);
                s1 = b1.mul_add(x, (-a1).mul_add(y, s2));
                s2 = b2.mul_add(x, -a2 * y);
                *v = y;
            }
        }

        Ok(out)
    }

    fn name(&self) -> &str {
        "ButterworthBandpass"
    }
}
