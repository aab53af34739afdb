//! Per-window feature extraction.
//!
//! A pure function of one channel's preprocessed window and its
//! alpha/beta derivatives. No state is retained between windows; the
//! extractor only holds the band definitions it was configured with.

use hemi_core::config::SignalConfig;
use hemi_core::{BandPowers, ChannelFeatures};

use crate::bank::FilterBank;
use crate::hilbert::envelope;
use crate::spectrum::band_power;

/// Extracts [`ChannelFeatures`] from filtered window signals.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    alpha_band: (f64, f64),
    beta_band: (f64, f64),
    gamma_high: f64,
}

impl FeatureExtractor {
    /// Creates an extractor for the configured bands.
    pub fn new(signal: &SignalConfig) -> Self {
        FeatureExtractor {
            alpha_band: signal.alpha_band,
            beta_band: signal.beta_band,
            gamma_high: 45.0f64.min(signal.sampling_rate / 2.0),
        }
    }

    /// Computes the feature record for one channel.
    ///
    /// `wide` is the preprocessed window; `alpha_sig`/`beta_sig` are its
    /// band-limited derivatives from the same [`FilterBank`].
    pub fn extract(
        &self,
        bank: &FilterBank,
        wide: &[f64],
        alpha_sig: &[f64],
        beta_sig: &[f64],
    ) -> ChannelFeatures {
        if wide.is_empty() {
            return ChannelFeatures::default();
        }

        let n = wide.len() as f64;
        let mean_square = |x: &[f64]| x.iter().map(|v| v * v).sum::<f64>() / x.len().max(1) as f64;

        let alpha_power = mean_square(alpha_sig);
        let beta_power = mean_square(beta_sig);

        let mean = wide.iter().sum::<f64>() / n;
        let variance = wide.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let rms = mean_square(wide).sqrt();

        let (freqs, psd) = bank.power_spectrum(wide);
        let band_powers = BandPowers {
            delta: band_power(&freqs, &psd, 0.5, 4.0),
            theta: band_power(&freqs, &psd, 4.0, 8.0),
            alpha: band_power(&freqs, &psd, self.alpha_band.0, self.alpha_band.1),
            beta: band_power(&freqs, &psd, self.beta_band.0, self.beta_band.1),
            gamma: band_power(&freqs, &psd, 30.0, self.gamma_high),
        };

        let (spectral_edge_95, median_freq) = spectral_edges(&freqs, &psd);
        let peak_alpha_freq = peak_in_band(&freqs, &psd, self.alpha_band);

        let env = envelope(alpha_sig);
        let envelope_mean = if env.is_empty() {
            0.0
        } else {
            env.iter().sum::<f64>() / env.len() as f64
        };

        ChannelFeatures {
            alpha_power,
            beta_power,
            band_powers,
            rms,
            variance,
            spectral_edge_95,
            median_freq,
            envelope_mean,
            peak_alpha_freq,
        }
    }
}

/// Spectral edge (95% cumulative power) and median (50%) frequencies.
///
/// Returns zeros when the spectrum carries no power.
fn spectral_edges(freqs: &[f64], psd: &[f64]) -> (f64, f64) {
    let total: f64 = psd.iter().sum();
    if total <= 0.0 || freqs.is_empty() {
        return (0.0, 0.0);
    }

    let mut edge_95 = 0.0;
    let mut median = 0.0;
    let mut cumulative = 0.0;
    let mut have_median = false;

    for (i, &p) in psd.iter().enumerate() {
        cumulative += p;
        if !have_median && cumulative >= 0.5 * total {
            median = freqs[i];
            have_median = true;
        }
        if cumulative >= 0.95 * total {
            edge_95 = freqs[i];
            break;
        }
    }

    (edge_95, median)
}

/// Frequency of the PSD maximum inside `band`; 0 when the band is empty.
fn peak_in_band(freqs: &[f64], psd: &[f64], band: (f64, f64)) -> f64 {
    freqs
        .iter()
        .zip(psd)
        .filter(|(&f, _)| f >= band.0 && f <= band.1)
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(&f, _)| f)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn pipeline(freq: f64, amplitude: f64) -> (FilterBank, Vec<f64>, Vec<f64>, Vec<f64>) {
        let config = SignalConfig::default();
        let bank = FilterBank::new(&config).unwrap();
        let raw: Vec<f64> = (0..500)
            .map(|i| 512.0 + amplitude * (2.0 * PI * freq * i as f64 / 250.0).sin())
            .collect();
        let wide = bank.preprocess(&raw);
        let alpha = bank.extract_alpha(&wide);
        let beta = bank.extract_beta(&wide);
        (bank, wide, alpha, beta)
    }

    #[test]
    fn alpha_tone_concentrates_in_alpha_features() {
        let (bank, wide, alpha, beta) = pipeline(10.0, 40.0);
        let extractor = FeatureExtractor::new(&SignalConfig::default());
        let features = extractor.extract(&bank, &wide, &alpha, &beta);

        // A 40-unit 10 Hz tone carries ~800 units^2 of power.
        assert!(
            features.alpha_power > 500.0 && features.alpha_power < 1000.0,
            "alpha power {}",
            features.alpha_power
        );
        assert!(features.beta_power < 0.1 * features.alpha_power);
        assert!(features.band_powers.alpha > 10.0 * features.band_powers.beta.max(1e-9));
        assert!((features.peak_alpha_freq - 10.0).abs() < 1.1);
        assert!((features.median_freq - 10.0).abs() < 1.5);
        assert!(features.spectral_edge_95 >= features.median_freq);
    }

    #[test]
    fn envelope_mean_tracks_tone_amplitude() {
        let (bank, wide, alpha, beta) = pipeline(10.0, 40.0);
        let extractor = FeatureExtractor::new(&SignalConfig::default());
        let features = extractor.extract(&bank, &wide, &alpha, &beta);

        // Envelope of an alpha tone sits near its amplitude; filtering
        // trims a little off the 40-unit input.
        assert!(
            features.envelope_mean > 25.0 && features.envelope_mean < 45.0,
            "envelope mean {}",
            features.envelope_mean
        );
    }

    #[test]
    fn rms_and_variance_agree_for_zero_mean_signal() {
        let (bank, wide, alpha, beta) = pipeline(10.0, 40.0);
        let extractor = FeatureExtractor::new(&SignalConfig::default());
        let features = extractor.extract(&bank, &wide, &alpha, &beta);

        // Preprocessing removes the mean, so variance ~= rms^2.
        assert!((features.variance - features.rms * features.rms).abs() < 1.0);
    }

    #[test]
    fn zero_signal_yields_zero_features() {
        let config = SignalConfig::default();
        let bank = FilterBank::new(&config).unwrap();
        let zeros = vec![0.0; 500];
        let extractor = FeatureExtractor::new(&config);
        let features = extractor.extract(&bank, &zeros, &zeros, &zeros);

        assert_eq!(features.alpha_power, 0.0);
        assert_eq!(features.spectral_edge_95, 0.0);
        assert_eq!(features.median_freq, 0.0);
        assert_eq!(features.band_powers.total(), 0.0);
    }

    #[test]
    fn empty_window_yields_default() {
        let config = SignalConfig::default();
        let bank = FilterBank::new(&config).unwrap();
        let extractor = FeatureExtractor::new(&config);
        let features = extractor.extract(&bank, &[], &[], &[]);
        assert_eq!(features, ChannelFeatures::default());
    }
}
