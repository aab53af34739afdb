//! Welch power spectral density estimation and band power integration.
//!
//! Averaged periodograms over Hann-windowed, 50%-overlapping segments,
//! scaled to power density (units²/Hz). Segment means are removed before
//! windowing so DC offsets do not leak across the low bins.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// Estimates the one-sided PSD of `x` with Welch's method.
///
/// `nperseg` is clamped to the signal length. Returns `(freqs, psd)`,
/// both of length `nperseg/2 + 1`; empty vectors if the signal is too
/// short to form a single segment.
pub fn welch_psd(x: &[f64], fs: f64, nperseg: usize) -> (Vec<f64>, Vec<f64>) {
    let nperseg = nperseg.min(x.len());
    if nperseg < 2 || fs <= 0.0 {
        return (Vec::new(), Vec::new());
    }

    let noverlap = nperseg / 2;
    let hop = nperseg - noverlap;
    let num_segments = (x.len() - nperseg) / hop + 1;
    let bins = nperseg / 2 + 1;

    // Periodic Hann window and its power for density normalization.
    let window: Vec<f64> = (0..nperseg)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / nperseg as f64).cos()))
        .collect();
    let window_power: f64 = window.iter().map(|w| w * w).sum();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(nperseg);

    let mut psd = vec![0.0f64; bins];
    let mut buffer = vec![Complex::new(0.0, 0.0); nperseg];

    for seg in 0..num_segments {
        let start = seg * hop;
        let segment = &x[start..start + nperseg];
        let mean = segment.iter().sum::<f64>() / nperseg as f64;

        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = Complex::new((segment[i] - mean) * window[i], 0.0);
        }
        fft.process(&mut buffer);

        for (k, acc) in psd.iter_mut().enumerate() {
            *acc += buffer[k].norm_sqr();
        }
    }

    // Average across segments and scale to units^2/Hz. Interior bins get
    // the one-sided factor of two; DC and Nyquist do not.
    let k = num_segments as f64;
    let density = 1.0 / (fs * window_power);
    for (bin, value) in psd.iter_mut().enumerate() {
        let one_sided = if bin == 0 || (nperseg % 2 == 0 && bin == bins - 1) {
            1.0
        } else {
            2.0
        };
        *value = *value / k * density * one_sided;
    }

    let freq_resolution = fs / nperseg as f64;
    let freqs = (0..bins).map(|k| k as f64 * freq_resolution).collect();

    (freqs, psd)
}

/// Integrates `psd` over `[f_lo, f_hi]` with the trapezoidal rule.
///
/// Returns 0 if fewer than two bins fall inside the band.
pub fn band_power(freqs: &[f64], psd: &[f64], f_lo: f64, f_hi: f64) -> f64 {
    let in_band: Vec<usize> = freqs
        .iter()
        .enumerate()
        .filter(|(_, &f)| f >= f_lo && f <= f_hi)
        .map(|(i, _)| i)
        .collect();

    if in_band.len() < 2 {
        return 0.0;
    }

    let mut power = 0.0;
    for pair in in_band.windows(2) {
        let (i, j) = (pair[0], pair[1]);
        power += 0.5 * (psd[i] + psd[j]) * (freqs[j] - freqs[i]);
    }
    power
}
