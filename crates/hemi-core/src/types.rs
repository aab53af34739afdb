//! Shared data model for the two-channel EEG pipeline.
//!
//! Records flow forward through the pipeline by value: samples into
//! windows, windows into features/quality, those into decisions, and
//! everything into a [`WindowRecord`] handed to the sinks.

use core::fmt;
use serde::{Deserialize, Serialize};

/// One decoded acquisition frame.
///
/// `t_us` is the device's monotonic microsecond clock, not wall time.
/// Channel values are raw ADC codes in `[0, adc_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Device monotonic timestamp in microseconds.
    pub t_us: u64,
    /// Left-hemisphere electrode, raw ADC code.
    pub left: u16,
    /// Right-hemisphere electrode, raw ADC code.
    pub right: u16,
}

/// Instantaneous attention direction classified from the lateralization
/// index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttentionDirection {
    /// Attention directed left (stronger right-hemisphere alpha).
    Left,
    /// Attention directed right (stronger left-hemisphere alpha).
    Right,
    /// Within the neutral band.
    Neutral,
    /// No classification possible (gated or degenerate window).
    Unknown,
}

impl fmt::Display for AttentionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttentionDirection::Left => "LEFT",
            AttentionDirection::Right => "RIGHT",
            AttentionDirection::Neutral => "NEUTRAL",
            AttentionDirection::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Artifact classification for one channel over one window.
///
/// When several detectors trip, the highest-priority tag wins; the
/// variant order here is the priority order (saturation first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// ADC clipping on a significant fraction of samples.
    Saturation,
    /// Broadband high-frequency energy consistent with EMG contamination.
    MuscleArtifact,
    /// Excess power at the mains frequency.
    LineNoise,
    /// Variance far above the running baseline.
    HighVariance,
    /// Near-zero variance, typically a detached electrode.
    LowSignal,
    /// No artifact detected.
    Clean,
}

impl ArtifactKind {
    /// True for any tag other than [`ArtifactKind::Clean`].
    pub fn is_artifact(&self) -> bool {
        !matches!(self, ArtifactKind::Clean)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactKind::Saturation => "SATURATION",
            ArtifactKind::MuscleArtifact => "MUSCLE_ARTIFACT",
            ArtifactKind::LineNoise => "LINE_NOISE",
            ArtifactKind::HighVariance => "HIGH_VARIANCE",
            ArtifactKind::LowSignal => "LOW_SIGNAL",
            ArtifactKind::Clean => "CLEAN",
        };
        f.write_str(s)
    }
}

/// Band power decomposition of the wideband spectrum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandPowers {
    /// Delta band, 0.5–4 Hz.
    pub delta: f64,
    /// Theta band, 4–8 Hz.
    pub theta: f64,
    /// Alpha band, 8–12 Hz.
    pub alpha: f64,
    /// Beta band, 13–30 Hz.
    pub beta: f64,
    /// Gamma band, 30 Hz up to min(45, fs/2).
    pub gamma: f64,
}

impl BandPowers {
    /// Sum over all bands.
    pub fn total(&self) -> f64 {
        self.delta + self.theta + self.alpha + self.beta + self.gamma
    }

    /// Alpha share of total power; 0 when the spectrum is empty.
    pub fn relative_alpha(&self) -> f64 {
        let total = self.total();
        if total > 0.0 {
            self.alpha / total
        } else {
            0.0
        }
    }

    /// Beta share of total power; 0 when the spectrum is empty.
    pub fn relative_beta(&self) -> f64 {
        let total = self.total();
        if total > 0.0 {
            self.beta / total
        } else {
            0.0
        }
    }
}

/// Per-window scalar features for one channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelFeatures {
    /// Mean square of the alpha-band signal.
    pub alpha_power: f64,
    /// Mean square of the beta-band signal.
    pub beta_power: f64,
    /// Welch-integrated band powers of the wideband signal.
    pub band_powers: BandPowers,
    /// Root mean square of the wideband signal.
    pub rms: f64,
    /// Sample variance of the wideband signal.
    pub variance: f64,
    /// Frequency below which 95% of spectral power lies.
    pub spectral_edge_95: f64,
    /// Frequency splitting spectral power in half.
    pub median_freq: f64,
    /// Mean Hilbert envelope of the alpha-band signal.
    pub envelope_mean: f64,
    /// Frequency of the PSD peak inside the alpha band.
    pub peak_alpha_freq: f64,
}

/// Quality assessment for one channel over one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Alpha power over high-band (30–40 Hz) power, in dB, clamped to +60.
    pub snr_db: f64,
    /// Highest-priority artifact tag for the window.
    pub artifact: ArtifactKind,
    /// Composite score in [0, 100]; higher is better.
    pub quality_score: f64,
}

impl Default for QualityReport {
    fn default() -> Self {
        QualityReport {
            snr_db: 0.0,
            artifact: ArtifactKind::Clean,
            quality_score: 0.0,
        }
    }
}

/// Attention decision for one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Lateralization index in [−1, +1].
    pub li: f64,
    /// Raw per-window classification.
    pub direction: AttentionDirection,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Majority-vote smoothed classification.
    pub smoothed_direction: AttentionDirection,
    /// True once adaptive thresholds are in effect.
    pub calibrated: bool,
}

impl Decision {
    /// A gated decision: unknown direction, zero confidence.
    pub fn unknown(calibrated: bool) -> Self {
        Decision {
            li: 0.0,
            direction: AttentionDirection::Unknown,
            confidence: 0.0,
            smoothed_direction: AttentionDirection::Unknown,
            calibrated,
        }
    }
}

/// One emitted row of the realtime pipeline, fanned out to the sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowRecord {
    /// Monotonically increasing window index.
    pub window_index: u64,
    /// Wall-clock timestamp, fractional seconds since the epoch.
    pub timestamp: f64,
    /// Samples consumed from the source so far.
    pub sample_count: u64,
    /// Left-channel alpha power.
    pub left_alpha_power: f64,
    /// Right-channel alpha power.
    pub right_alpha_power: f64,
    /// Lateralization index.
    pub lateralization_index: f64,
    /// Raw attention classification.
    pub attention_direction: AttentionDirection,
    /// Decision confidence.
    pub confidence: f64,
    /// Smoothed attention classification.
    pub smoothed_direction: AttentionDirection,
    /// Worst-of-channels quality score.
    pub quality_score: f64,
    /// Left-channel SNR in dB.
    pub left_snr_db: f64,
    /// Right-channel SNR in dB.
    pub right_snr_db: f64,
    /// Left-channel artifact tag.
    pub left_artifact: ArtifactKind,
    /// Right-channel artifact tag.
    pub right_artifact: ArtifactKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_display_is_uppercase() {
        assert_eq!(AttentionDirection::Left.to_string(), "LEFT");
        assert_eq!(AttentionDirection::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn artifact_display_matches_wire_format() {
        assert_eq!(ArtifactKind::MuscleArtifact.to_string(), "MUSCLE_ARTIFACT");
        assert_eq!(ArtifactKind::Clean.to_string(), "CLEAN");
    }

    #[test]
    fn artifact_priority_order() {
        // Ord follows declaration order: saturation outranks everything,
        // clean ranks last.
        let mut tags = vec![
            ArtifactKind::Clean,
            ArtifactKind::LineNoise,
            ArtifactKind::Saturation,
            ArtifactKind::LowSignal,
        ];
        tags.sort();
        assert_eq!(tags[0], ArtifactKind::Saturation);
        assert_eq!(tags[3], ArtifactKind::Clean);
    }

    #[test]
    fn band_powers_total() {
        let bp = BandPowers {
            delta: 1.0,
            theta: 2.0,
            alpha: 3.0,
            beta: 4.0,
            gamma: 5.0,
        };
        assert!((bp.total() - 15.0).abs() < 1e-12);
        assert!((bp.relative_alpha() - 0.2).abs() < 1e-12);
        assert!((bp.relative_beta() - 4.0 / 15.0).abs() < 1e-12);
        assert_eq!(BandPowers::default().relative_alpha(), 0.0);
    }

    #[test]
    fn unknown_decision_is_zeroed() {
        let d = Decision::unknown(true);
        assert_eq!(d.direction, AttentionDirection::Unknown);
        assert_eq!(d.confidence, 0.0);
        assert!(d.calibrated);
    }
}
