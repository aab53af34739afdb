//! Second-order-section filtering primitives.
//!
//! IIR filters are represented as cascades of normalized biquads (a0 = 1)
//! and applied either causally ([`Sos::filter`]) or zero-phase
//! ([`Sos::filtfilt`], forward-backward with odd-reflection edge padding).
//! Cascade state never outlives a call: every application starts from rest,
//! which keeps the window pipeline free of cross-window memory.

/// One normalized biquad section.
///
/// Difference equation:
/// `y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    /// Numerator coefficient b0.
    pub b0: f64,
    /// Numerator coefficient b1.
    pub b1: f64,
    /// Numerator coefficient b2.
    pub b2: f64,
    /// Denominator coefficient a1 (a0 is 1).
    pub a1: f64,
    /// Denominator coefficient a2.
    pub a2: f64,
}

impl Biquad {
    /// Identity section that passes the input through unchanged.
    pub const fn passthrough() -> Self {
        Biquad {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Complex frequency response at normalized angular frequency
    /// `omega` (radians/sample).
    pub fn response(&self, omega: f64) -> num_complex::Complex<f64> {
        use num_complex::Complex;
        let z1 = Complex::from_polar(1.0, -omega);
        let z2 = Complex::from_polar(1.0, -2.0 * omega);
        let num = Complex::new(self.b0, 0.0) + z1 * self.b1 + z2 * self.b2;
        let den = Complex::new(1.0, 0.0) + z1 * self.a1 + z2 * self.a2;
        num / den
    }
}

/// A cascade of biquad sections.
#[derive(Debug, Clone, PartialEq)]
pub struct Sos {
    sections: Vec<Biquad>,
}

impl Sos {
    /// Builds a cascade from its sections.
    pub fn new(sections: Vec<Biquad>) -> Self {
        Sos { sections }
    }

    /// The biquad sections, in application order.
    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Magnitude response at frequency `freq` for sampling rate `fs`.
    pub fn magnitude(&self, freq: f64, fs: f64) -> f64 {
        let omega = 2.0 * std::f64::consts::PI * freq / fs;
        self.sections
            .iter()
            .map(|s| s.response(omega).norm())
            .product()
    }

    /// Causal (single-pass) filtering from rest.
    pub fn filter(&self, x: &[f64]) -> Vec<f64> {
        self.filter_inner(x, false)
    }

    fn filter_inner(&self, x: &[f64], steady_start: bool) -> Vec<f64> {
        let mut y = x.to_vec();
        let mut x0 = x.first().copied().unwrap_or(0.0);
        for section in &self.sections {
            // Initial conditions: rest, or the steady state for a
            // constant input equal to the first sample. The latter is
            // what keeps forward-backward passes free of startup steps.
            let (mut z1, mut z2, y0) = if steady_start {
                let den = 1.0 + section.a1 + section.a2;
                let k = if den.abs() > 1e-12 {
                    (section.b0 + section.b1 + section.b2) / den
                } else {
                    0.0
                };
                let y0 = k * x0;
                (y0 - section.b0 * x0, section.b2 * x0 - section.a2 * y0, y0)
            } else {
                (0.0, 0.0, 0.0)
            };

            // Direct Form II transposed per section.
            for value in y.iter_mut() {
                let input = *value;
                let output = section.b0 * input + z1;
                z1 = section.b1 * input - section.a1 * output + z2;
                z2 = section.b2 * input - section.a2 * output;
                *value = output;
            }
            x0 = y0;
        }
        y
    }

    /// Zero-phase filtering over a finite window.
    ///
    /// Applies the cascade forward and backward so the net phase shift is
    /// zero. The input is extended at both ends by odd reflection before
    /// filtering, which confines startup transients to the (discarded)
    /// extensions. Callers should still treat the first and last few
    /// samples statistically rather than point-wise.
    pub fn filtfilt(&self, x: &[f64]) -> Vec<f64> {
        if x.is_empty() {
            return Vec::new();
        }
        let ntaps = 2 * self.sections.len() + 1;
        let padlen = (3 * ntaps).min(x.len() - 1);

        let mut ext = Vec::with_capacity(x.len() + 2 * padlen);
        let first = x[0];
        let last = x[x.len() - 1];
        for i in (1..=padlen).rev() {
            ext.push(2.0 * first - x[i]);
        }
        ext.extend_from_slice(x);
        for i in 1..=padlen {
            ext.push(2.0 * last - x[x.len() - 1 - i]);
        }

        let mut y = self.filter_inner(&ext, true);
        y.reverse();
        let mut y = self.filter_inner(&y, true);
        y.reverse();

        y[padlen..padlen + x.len()].to_vec()
    }
}
