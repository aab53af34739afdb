//! The precomputed filter bank.
//!
//! Built once at startup from the signal configuration and shared
//! read-only across windows: notch, wideband (1–40 Hz), alpha (8–12 Hz)
//! and beta (13–30 Hz) cascades, plus the Welch/band-power helpers the
//! feature and quality stages use.

use tracing::warn;

use hemi_core::config::SignalConfig;
use hemi_core::HemiResult;

use crate::design::{butterworth_bandpass, notch};
use crate::sos::Sos;
use crate::spectrum::{band_power, welch_psd};

/// Precomputed filter cascades for one sampling rate.
#[derive(Debug, Clone)]
pub struct FilterBank {
    fs: f64,
    filter_order: usize,
    notch_freq: f64,
    notch: Sos,
    wideband: Sos,
    alpha: Sos,
    beta: Sos,
    nperseg: usize,
}

impl FilterBank {
    /// Designs all cascades from the signal configuration.
    ///
    /// Fails fast on any band the sampling rate cannot support; nothing
    /// is designed lazily inside the realtime loop.
    pub fn new(signal: &SignalConfig) -> HemiResult<Self> {
        let fs = signal.sampling_rate;
        let order = signal.filter_order;

        Ok(FilterBank {
            fs,
            filter_order: order,
            notch_freq: signal.notch_freq,
            notch: notch(signal.notch_freq, signal.notch_q, fs),
            wideband: butterworth_bandpass(order, signal.bandpass.0, signal.bandpass.1, fs)?,
            alpha: butterworth_bandpass(order, signal.alpha_band.0, signal.alpha_band.1, fs)?,
            beta: butterworth_bandpass(order, signal.beta_band.0, signal.beta_band.1, fs)?,
            nperseg: (fs as usize).max(2),
        })
    }

    /// Sampling rate the bank was designed for.
    pub fn sampling_rate(&self) -> f64 {
        self.fs
    }

    /// True if `n` samples cannot support the cascade; `apply` passes
    /// such windows through unmodified.
    pub fn is_undersampled(&self, n: usize) -> bool {
        n < 6 * self.filter_order
    }

    /// Zero-phase application of one cascade to a window.
    fn apply(&self, sos: &Sos, x: &[f64]) -> Vec<f64> {
        if self.is_undersampled(x.len()) {
            warn!(samples = x.len(), "window undersampled, filter bypassed");
            return x.to_vec();
        }
        sos.filtfilt(x)
    }

    /// Full preprocessing: mean removal, notch, wideband bandpass.
    pub fn preprocess(&self, x: &[f64]) -> Vec<f64> {
        if x.is_empty() {
            return Vec::new();
        }
        let mean = x.iter().sum::<f64>() / x.len() as f64;
        let centered: Vec<f64> = x.iter().map(|v| v - mean).collect();
        let notched = self.apply(&self.notch, &centered);
        self.apply(&self.wideband, &notched)
    }

    /// Extracts the alpha band from a preprocessed window.
    pub fn extract_alpha(&self, x: &[f64]) -> Vec<f64> {
        self.apply(&self.alpha, x)
    }

    /// Extracts the beta band from a preprocessed window.
    pub fn extract_beta(&self, x: &[f64]) -> Vec<f64> {
        self.apply(&self.beta, x)
    }

    /// Welch PSD of a window with the bank's default segment length
    /// (min(N, fs)).
    pub fn power_spectrum(&self, x: &[f64]) -> (Vec<f64>, Vec<f64>) {
        welch_psd(x, self.fs, self.nperseg)
    }

    /// Integrated spectral power of `x` over `[f_lo, f_hi]`.
    pub fn band_power_of(&self, x: &[f64], f_lo: f64, f_hi: f64) -> f64 {
        let (freqs, psd) = self.power_spectrum(x);
        band_power(&freqs, &psd, f_lo, f_hi)
    }

    /// Mains-band power (notch frequency ± 1 Hz) of a window.
    ///
    /// Measured on the mean-subtracted input, not the preprocessed
    /// signal: past the notch the contamination is no longer observable.
    pub fn line_noise_power(&self, raw: &[f64]) -> f64 {
        if raw.is_empty() {
            return 0.0;
        }
        let mean = raw.iter().sum::<f64>() / raw.len() as f64;
        let centered: Vec<f64> = raw.iter().map(|v| v - mean).collect();
        self.band_power_of(&centered, self.notch_freq - 1.0, self.notch_freq + 1.0)
    }
}
