//! Typed system configuration.
//!
//! All tunables live in one immutable [`SystemConfig`] value built through
//! [`SystemConfigBuilder`] and validated before the processing loop starts.
//! Components receive only the sections they need at construction; nothing
//! reads configuration through globals.

use serde::{Deserialize, Serialize};

use crate::error::{HemiError, HemiResult};

/// Samples of support the zero-phase cascade needs per filter order.
const SUPPORT_PER_ORDER: usize = 64;

/// Serial transport configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Endpoint selector; `"auto"` triggers port discovery.
    pub port: String,
    /// Device line rate in baud.
    pub baudrate: u32,
    /// Read timeout in seconds.
    pub timeout_s: f64,
    /// Reconnect attempts before the source goes terminal.
    pub max_reconnect_attempts: u32,
    /// Base delay between reconnect attempts, doubled per attempt.
    pub reconnect_delay_s: f64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: "auto".to_string(),
            baudrate: 115_200,
            timeout_s: 1.0,
            max_reconnect_attempts: 5,
            reconnect_delay_s: 1.0,
        }
    }
}

/// Signal processing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Sampling rate in Hz.
    pub sampling_rate: f64,
    /// Analysis window length in seconds.
    pub window_size_s: f64,
    /// Window overlap fraction in [0, 1).
    pub window_overlap: f64,
    /// Mains frequency for the notch filter, Hz.
    pub notch_freq: f64,
    /// Notch quality factor.
    pub notch_q: f64,
    /// Wideband bandpass edges, Hz.
    pub bandpass: (f64, f64),
    /// Alpha band edges, Hz.
    pub alpha_band: (f64, f64),
    /// Beta band edges, Hz.
    pub beta_band: (f64, f64),
    /// Butterworth order for the bandpass cascades.
    pub filter_order: usize,
    /// Full-scale ADC code.
    pub adc_max: u16,
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig {
            sampling_rate: 250.0,
            window_size_s: 2.0,
            window_overlap: 0.5,
            notch_freq: 50.0,
            notch_q: 30.0,
            bandpass: (1.0, 40.0),
            alpha_band: (8.0, 12.0),
            beta_band: (13.0, 30.0),
            filter_order: 4,
            adc_max: 1023,
        }
    }
}

impl SignalConfig {
    /// Samples per analysis window: round(fs · window_size).
    pub fn window_samples(&self) -> usize {
        (self.sampling_rate * self.window_size_s).round() as usize
    }

    /// New samples per window: max(1, round(N · (1 − overlap))).
    pub fn hop_samples(&self) -> usize {
        let n = self.window_samples() as f64;
        ((n * (1.0 - self.window_overlap)).round() as usize).max(1)
    }

    /// Samples shared between consecutive windows.
    pub fn overlap_samples(&self) -> usize {
        self.window_samples() - self.hop_samples()
    }

    /// Minimum window length supporting the configured cascade.
    pub fn min_window_support(&self) -> usize {
        SUPPORT_PER_ORDER * self.filter_order
    }
}

/// Attention decision configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Static LI threshold below which attention is LEFT.
    pub li_left_threshold: f64,
    /// Static LI threshold above which attention is RIGHT.
    pub li_right_threshold: f64,
    /// LI samples collected before adaptive thresholds take over.
    pub calibration_samples: usize,
    /// Enables adaptive μ ± k·σ thresholds after calibration.
    pub adaptive_threshold: bool,
    /// σ multiplier for the adaptive thresholds.
    pub adaptive_k: f64,
    /// Majority-vote smoothing deque length.
    pub smoothing_window: usize,
    /// Minimum quality score for a classified decision.
    pub quality_gate: f64,
    /// Gate on any non-clean artifact tag as well.
    pub strict_gating: bool,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        DecisionConfig {
            li_left_threshold: -0.15,
            li_right_threshold: 0.15,
            calibration_samples: 100,
            adaptive_threshold: true,
            adaptive_k: 1.0,
            smoothing_window: 5,
            quality_gate: 40.0,
            strict_gating: true,
        }
    }
}

/// Artifact detection thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Fraction of clipped samples that flags SATURATION.
    pub saturation_threshold: f64,
    /// Raw variance below which the channel is LOW_SIGNAL, ADC units².
    pub low_signal_variance_threshold: f64,
    /// Beta power above which the window is MUSCLE_ARTIFACT.
    pub muscle_beta_threshold: f64,
    /// Multiple of the running median variance flagging HIGH_VARIANCE.
    pub variance_multiplier: f64,
    /// Windows of variance history for the running median.
    pub median_window: usize,
    /// Mains power over alpha power ratio flagging LINE_NOISE.
    pub line_noise_threshold: f64,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        ArtifactConfig {
            saturation_threshold: 0.02,
            low_signal_variance_threshold: 1.0,
            muscle_beta_threshold: 100.0,
            variance_multiplier: 3.0,
            median_window: 30,
            line_noise_threshold: 0.5,
        }
    }
}

/// Metrics log configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enables the append-only CSV sink.
    pub enable_csv: bool,
    /// CSV output path.
    pub filename: String,
    /// Records between explicit flushes.
    pub flush_interval_records: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            enable_csv: true,
            filename: "eeg_data_log.csv".to_string(),
            flush_interval_records: 10,
        }
    }
}

/// Master configuration owned by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Serial transport section.
    pub serial: SerialConfig,
    /// Signal processing section.
    pub signal: SignalConfig,
    /// Decision engine section.
    pub decision: DecisionConfig,
    /// Artifact detection section.
    pub artifact: ArtifactConfig,
    /// Metrics logging section.
    pub logging: LoggingConfig,
}

impl SystemConfig {
    /// Starts a builder over the defaults.
    pub fn builder() -> SystemConfigBuilder {
        SystemConfigBuilder::default()
    }

    /// Validates the configuration, failing fast on anything the
    /// pipeline could not be constructed from.
    pub fn validate(&self) -> HemiResult<()> {
        let s = &self.signal;

        if s.sampling_rate <= 0.0 {
            return Err(HemiError::InvalidConfig {
                reason: format!("sampling rate must be positive, got {}", s.sampling_rate),
            });
        }
        if !(0.0..1.0).contains(&s.window_overlap) {
            return Err(HemiError::InvalidConfig {
                reason: format!("window overlap must be in [0, 1), got {}", s.window_overlap),
            });
        }
        if s.window_size_s <= 0.0 {
            return Err(HemiError::InvalidConfig {
                reason: format!("window size must be positive, got {} s", s.window_size_s),
            });
        }
        if s.filter_order == 0 || s.filter_order % 2 != 0 {
            return Err(HemiError::InvalidConfig {
                reason: format!("filter order must be a positive even number, got {}", s.filter_order),
            });
        }

        let nyquist = s.sampling_rate / 2.0;
        for (name, (lo, hi)) in [
            ("bandpass", s.bandpass),
            ("alpha_band", s.alpha_band),
            ("beta_band", s.beta_band),
        ] {
            if lo <= 0.0 || lo >= hi {
                return Err(HemiError::InvalidConfig {
                    reason: format!("{name} edges must satisfy 0 < low < high, got ({lo}, {hi})"),
                });
            }
            if hi >= nyquist {
                return Err(HemiError::InvalidConfig {
                    reason: format!(
                        "{name} upper edge {hi} Hz must be below the Nyquist frequency {nyquist} Hz"
                    ),
                });
            }
        }
        if s.notch_freq >= nyquist || s.notch_freq <= 0.0 {
            return Err(HemiError::InvalidConfig {
                reason: format!("notch frequency {} Hz outside (0, {}) Hz", s.notch_freq, nyquist),
            });
        }
        if s.notch_q <= 0.0 {
            return Err(HemiError::InvalidConfig {
                reason: format!("notch Q must be positive, got {}", s.notch_q),
            });
        }

        let n = s.window_samples();
        let required = s.min_window_support();
        if n < required {
            return Err(HemiError::WindowTooShort {
                samples: n,
                required,
            });
        }

        if self.decision.li_left_threshold >= self.decision.li_right_threshold {
            return Err(HemiError::InvalidConfig {
                reason: format!(
                    "LI thresholds must satisfy left < right, got ({}, {})",
                    self.decision.li_left_threshold, self.decision.li_right_threshold
                ),
            });
        }
        if self.decision.smoothing_window == 0 || self.decision.calibration_samples == 0 {
            return Err(HemiError::InvalidConfig {
                reason: "smoothing window and calibration sample count must be non-zero".to_string(),
            });
        }
        if self.serial.max_reconnect_attempts == 0 {
            return Err(HemiError::InvalidConfig {
                reason: "at least one reconnect attempt is required".to_string(),
            });
        }

        Ok(())
    }

    /// Serializes the configuration to pretty JSON.
    pub fn to_json(&self) -> HemiResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| HemiError::InvalidConfig {
            reason: format!("failed to serialize configuration: {e}"),
        })
    }

    /// Deserializes and validates a configuration from JSON.
    pub fn from_json(json: &str) -> HemiResult<Self> {
        let config: SystemConfig = serde_json::from_str(json).map_err(|e| HemiError::InvalidConfig {
            reason: format!("failed to parse configuration: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration from a JSON file.
    pub fn from_path(path: &std::path::Path) -> HemiResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| HemiError::InvalidConfig {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_json(&text)
    }
}

/// Parses a mains-frequency override value; only 50 and 60 are accepted.
pub fn line_freq_override(value: Option<&str>) -> Option<f64> {
    match value.map(str::trim) {
        Some("50") => Some(50.0),
        Some("60") => Some(60.0),
        _ => None,
    }
}

/// Builder for [`SystemConfig`].
///
/// Each setter replaces one section; [`SystemConfigBuilder::build`]
/// validates the result.
#[derive(Debug, Clone, Default)]
pub struct SystemConfigBuilder {
    config: SystemConfig,
}

impl SystemConfigBuilder {
    /// Replaces the serial section.
    pub fn serial(mut self, serial: SerialConfig) -> Self {
        self.config.serial = serial;
        self
    }

    /// Replaces the signal section.
    pub fn signal(mut self, signal: SignalConfig) -> Self {
        self.config.signal = signal;
        self
    }

    /// Replaces the decision section.
    pub fn decision(mut self, decision: DecisionConfig) -> Self {
        self.config.decision = decision;
        self
    }

    /// Replaces the artifact section.
    pub fn artifact(mut self, artifact: ArtifactConfig) -> Self {
        self.config.artifact = artifact;
        self
    }

    /// Replaces the logging section.
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Overrides the serial endpoint selector.
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.config.serial.port = port.into();
        self
    }

    /// Overrides the notch (mains) frequency.
    pub fn notch_freq(mut self, freq: f64) -> Self {
        self.config.signal.notch_freq = freq;
        self
    }

    /// Validates and returns the finished configuration.
    pub fn build(self) -> HemiResult<SystemConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SystemConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_window_geometry() {
        let signal = SignalConfig::default();
        assert_eq!(signal.window_samples(), 500);
        assert_eq!(signal.hop_samples(), 250);
        assert_eq!(signal.overlap_samples(), 250);
        assert_eq!(signal.min_window_support(), 256);
    }

    #[test]
    fn short_window_fails_fast() {
        let config = SystemConfig::builder()
            .signal(SignalConfig {
                window_size_s: 0.5, // 125 samples at 250 Hz
                ..SignalConfig::default()
            })
            .build();
        assert!(matches!(config, Err(HemiError::WindowTooShort { .. })));
    }

    #[test]
    fn band_above_nyquist_fails() {
        let config = SystemConfig::builder()
            .signal(SignalConfig {
                sampling_rate: 60.0,
                ..SignalConfig::default()
            })
            .build();
        assert!(matches!(config, Err(HemiError::InvalidConfig { .. })));
    }

    #[test]
    fn inverted_band_fails() {
        let config = SystemConfig::builder()
            .signal(SignalConfig {
                alpha_band: (12.0, 8.0),
                ..SignalConfig::default()
            })
            .build();
        assert!(config.is_err());
    }

    #[test]
    fn inverted_thresholds_fail() {
        let config = SystemConfig::builder()
            .decision(DecisionConfig {
                li_left_threshold: 0.2,
                li_right_threshold: -0.2,
                ..DecisionConfig::default()
            })
            .build();
        assert!(config.is_err());
    }

    #[test]
    fn json_round_trip() {
        let config = SystemConfig::default();
        let json = config.to_json().unwrap();
        let restored = SystemConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn line_freq_override_accepts_mains_values_only() {
        assert_eq!(line_freq_override(Some("50")), Some(50.0));
        assert_eq!(line_freq_override(Some(" 60 ")), Some(60.0));
        assert_eq!(line_freq_override(Some("55")), None);
        assert_eq!(line_freq_override(None), None);
    }
}
