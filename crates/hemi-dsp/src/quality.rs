//! Per-channel signal quality assessment.
//!
//! Five artifact detectors, an SNR estimate and a composite score per
//! window. The only retained state is the running variance history that
//! anchors the HIGH_VARIANCE detector; everything else is a pure function
//! of the window.

use std::collections::VecDeque;

use tracing::debug;

use hemi_core::config::ArtifactConfig;
use hemi_core::{ArtifactKind, QualityReport};

use crate::bank::FilterBank;

/// Denominator guard for power ratios.
const POWER_EPS: f64 = 1e-12;

/// Windows of variance history required before HIGH_VARIANCE can trip.
const MIN_VARIANCE_HISTORY: usize = 5;

/// Noise reference band for the SNR estimate, Hz.
const NOISE_BAND: (f64, f64) = (30.0, 40.0);

/// SNR ceiling reported when the noise band is empty, dB.
const SNR_CLAMP_DB: f64 = 60.0;

/// Stateful quality assessor for one channel.
pub struct QualityAssessor {
    config: ArtifactConfig,
    adc_max: f64,
    variance_history: VecDeque<f64>,
}

impl QualityAssessor {
    /// Creates an assessor with the given thresholds.
    pub fn new(config: ArtifactConfig, adc_max: u16) -> Self {
        let median_window = config.median_window.max(1);
        QualityAssessor {
            config,
            adc_max: f64::from(adc_max),
            variance_history: VecDeque::with_capacity(median_window),
        }
    }

    /// Assesses one window.
    ///
    /// `raw` is the unfiltered ADC window, `preprocessed` its filtered
    /// counterpart; `alpha_power`/`beta_power` come from the feature
    /// stage so the spectra are not recomputed here.
    pub fn assess(
        &mut self,
        bank: &FilterBank,
        raw: &[f64],
        preprocessed: &[f64],
        alpha_power: f64,
        beta_power: f64,
    ) -> QualityReport {
        if raw.is_empty() {
            return QualityReport {
                snr_db: 0.0,
                artifact: ArtifactKind::LowSignal,
                quality_score: 0.0,
            };
        }

        let n = raw.len() as f64;
        let raw_mean = raw.iter().sum::<f64>() / n;
        let raw_variance = raw.iter().map(|v| (v - raw_mean).powi(2)).sum::<f64>() / n;

        // Any non-finite statistic poisons the whole window.
        if !raw_variance.is_finite() || !alpha_power.is_finite() || !beta_power.is_finite() {
            return QualityReport {
                snr_db: 0.0,
                artifact: ArtifactKind::HighVariance,
                quality_score: 0.0,
            };
        }

        let saturation_fraction = raw
            .iter()
            .filter(|&&v| v <= 0.0 || v >= self.adc_max)
            .count() as f64
            / n;

        let line_power = bank.line_noise_power(raw);
        let line_ratio = line_power / (alpha_power + POWER_EPS);

        let noise_power = bank.band_power_of(preprocessed, NOISE_BAND.0, NOISE_BAND.1);
        let snr_db = if noise_power <= 0.0 {
            SNR_CLAMP_DB
        } else {
            (10.0 * ((alpha_power + POWER_EPS) / noise_power).log10()).min(SNR_CLAMP_DB)
        };

        // Running variance baseline; the median includes this window.
        if self.variance_history.len() == self.config.median_window.max(1) {
            self.variance_history.pop_front();
        }
        self.variance_history.push_back(raw_variance);
        let median_variance = self.median_variance();

        let artifact = self.classify(
            saturation_fraction,
            beta_power,
            line_ratio,
            raw_variance,
            median_variance,
        );
        if artifact.is_artifact() {
            debug!(%artifact, raw_variance, beta_power, line_ratio, "artifact detected");
        }

        let mut score = 100.0;
        score -= saturation_fraction * 40.0;
        if artifact.is_artifact() {
            score -= 25.0;
        }
        if snr_db < 10.0 {
            score -= (10.0 - snr_db) * 3.0;
        }
        score -= line_ratio * 20.0;
        let quality_score = score.clamp(0.0, 100.0);

        QualityReport {
            snr_db,
            artifact,
            quality_score,
        }
    }

    /// Clears the variance baseline.
    pub fn reset(&mut self) {
        self.variance_history.clear();
    }

    fn median_variance(&self) -> Option<f64> {
        if self.variance_history.len() < MIN_VARIANCE_HISTORY {
            return None;
        }
        let mut sorted: Vec<f64> = self.variance_history.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mid = sorted.len() / 2;
        Some(if sorted.len() % 2 == 0 {
            0.5 * (sorted[mid - 1] + sorted[mid])
        } else {
            sorted[mid]
        })
    }

    /// Applies the detectors in priority order; the first hit wins.
    fn classify(
        &self,
        saturation_fraction: f64,
        beta_power: f64,
        line_ratio: f64,
        raw_variance: f64,
        median_variance: Option<f64>,
    ) -> ArtifactKind {
        if saturation_fraction > self.config.saturation_threshold {
            return ArtifactKind::Saturation;
        }
        if beta_power > self.config.muscle_beta_threshold {
            return ArtifactKind::MuscleArtifact;
        }
        if line_ratio > self.config.line_noise_threshold {
            return ArtifactKind::LineNoise;
        }
        if let Some(median) = median_variance {
            if median > 0.0 && raw_variance > self.config.variance_multiplier * median {
                return ArtifactKind::HighVariance;
            }
        }
        if raw_variance < self.config.low_signal_variance_threshold {
            return ArtifactKind::LowSignal;
        }
        ArtifactKind::Clean
    }
}
