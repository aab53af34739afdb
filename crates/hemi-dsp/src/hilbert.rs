//! Hilbert-transform amplitude envelope.
//!
//! The analytic signal is built in the frequency domain: forward FFT,
//! suppress negative frequencies, double positive ones, inverse FFT. The
//! envelope is its magnitude. Only meaningful for band-limited input, so
//! callers hand in the alpha-band signal, never the raw window.

use rustfft::{num_complex::Complex, FftPlanner};

/// Computes the instantaneous amplitude envelope of `x`.
///
/// Returns a vector the same length as the input; empty input yields an
/// empty envelope.
pub fn envelope(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![x[0].abs()];
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    let mut buffer: Vec<Complex<f64>> = x.iter().map(|&v| Complex::new(v, 0.0)).collect();
    fft.process(&mut buffer);

    // One-sided spectrum: keep DC (and Nyquist for even n), double the
    // positive frequencies, zero the negative ones.
    let half = n / 2;
    for slot in buffer.iter_mut().take(half).skip(1) {
        *slot *= 2.0;
    }
    if n % 2 != 0 {
        buffer[half] *= 2.0;
    }
    for slot in buffer.iter_mut().skip(half + 1) {
        *slot = Complex::new(0.0, 0.0);
    }

    ifft.process(&mut buffer);

    // rustfft leaves the inverse unnormalized.
    let scale = 1.0 / n as f64;
    buffer.iter().map(|z| (z * scale).norm()).collect()
}
