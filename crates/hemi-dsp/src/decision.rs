//! Attention direction decision engine.
//!
//! Classifies each window's hemispheric lateralization index against
//! static thresholds, switching to subject-adaptive thresholds once a
//! calibration buffer of gated-clean windows has filled. Raw decisions
//! pass through a majority-vote smoother before they reach the record.

use std::collections::VecDeque;

use tracing::{debug, info};

use hemi_core::config::DecisionConfig;
use hemi_core::{ArtifactKind, AttentionDirection, Decision};

/// Division guard for the lateralization index.
const LI_EPS: f64 = 1e-12;

/// LI values retained for statistics.
const LI_HISTORY_CAPACITY: usize = 200;

/// Smoothing factor for the per-channel alpha EWMAs.
const ALPHA_EWMA: f64 = 0.05;

/// Summary statistics of the engine's history.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecisionStats {
    /// Mean of the retained LI history.
    pub li_mean: f64,
    /// Standard deviation of the retained LI history.
    pub li_std: f64,
    /// Classified LEFT windows since start.
    pub left_count: u64,
    /// Classified RIGHT windows since start.
    pub right_count: u64,
    /// Classified NEUTRAL windows since start.
    pub neutral_count: u64,
    /// Gated (UNKNOWN) windows since start.
    pub unknown_count: u64,
    /// True once adaptive thresholds are active.
    pub calibrated: bool,
    /// LI samples collected toward calibration.
    pub calibration_progress: usize,
    /// Active LEFT threshold.
    pub left_threshold: f64,
    /// Active RIGHT threshold.
    pub right_threshold: f64,
}

/// Stateful lateralization classifier.
pub struct DecisionEngine {
    config: DecisionConfig,
    left_threshold: f64,
    right_threshold: f64,
    calibrated: bool,
    calibration_buf: Vec<f64>,
    smoothing: VecDeque<AttentionDirection>,
    li_history: VecDeque<f64>,
    left_alpha_ewma: Option<f64>,
    right_alpha_ewma: Option<f64>,
    left_count: u64,
    right_count: u64,
    neutral_count: u64,
    unknown_count: u64,
}

impl DecisionEngine {
    /// Creates an engine with static thresholds from the configuration.
    pub fn new(config: DecisionConfig) -> Self {
        let left_threshold = config.li_left_threshold;
        let right_threshold = config.li_right_threshold;
        let smoothing_window = config.smoothing_window.max(1);
        let calibration_samples = config.calibration_samples.max(1);
        DecisionEngine {
            config,
            left_threshold,
            right_threshold,
            calibrated: false,
            calibration_buf: Vec::with_capacity(calibration_samples),
            smoothing: VecDeque::with_capacity(smoothing_window),
            li_history: VecDeque::with_capacity(LI_HISTORY_CAPACITY),
            left_alpha_ewma: None,
            right_alpha_ewma: None,
            left_count: 0,
            right_count: 0,
            neutral_count: 0,
            unknown_count: 0,
        }
    }

    /// Lateralization index of two alpha powers, clamped to [−1, +1].
    pub fn lateralization_index(left_alpha: f64, right_alpha: f64) -> f64 {
        let li = (right_alpha - left_alpha) / (right_alpha + left_alpha + LI_EPS);
        li.clamp(-1.0, 1.0)
    }

    /// Classifies one window.
    ///
    /// Gated windows (low quality, or any artifact under strict gating)
    /// come back UNKNOWN with zero confidence and feed neither the
    /// smoother nor the calibration buffer.
    pub fn decide(
        &mut self,
        left_alpha: f64,
        right_alpha: f64,
        quality_score: f64,
        left_artifact: ArtifactKind,
        right_artifact: ArtifactKind,
    ) -> Decision {
        if !left_alpha.is_finite() || !right_alpha.is_finite() || left_alpha < 0.0 || right_alpha < 0.0
        {
            self.unknown_count += 1;
            return Decision::unknown(self.calibrated);
        }

        let li = Self::lateralization_index(left_alpha, right_alpha);

        let gated = quality_score < self.config.quality_gate
            || (self.config.strict_gating
                && (left_artifact.is_artifact() || right_artifact.is_artifact()));
        if gated {
            debug!(quality_score, %left_artifact, %right_artifact, "window gated");
            self.unknown_count += 1;
            return Decision {
                li,
                ..Decision::unknown(self.calibrated)
            };
        }

        if !self.calibrated {
            self.feed_calibration(li);
        }

        let direction = self.classify(li);
        let confidence = self.confidence(li, direction);

        if self.smoothing.len() == self.config.smoothing_window.max(1) {
            self.smoothing.pop_front();
        }
        self.smoothing.push_back(direction);
        let smoothed_direction = self.majority_vote();

        if self.li_history.len() == LI_HISTORY_CAPACITY {
            self.li_history.pop_front();
        }
        self.li_history.push_back(li);
        self.left_alpha_ewma = Some(ewma(self.left_alpha_ewma, left_alpha));
        self.right_alpha_ewma = Some(ewma(self.right_alpha_ewma, right_alpha));

        match direction {
            AttentionDirection::Left => self.left_count += 1,
            AttentionDirection::Right => self.right_count += 1,
            AttentionDirection::Neutral => self.neutral_count += 1,
            AttentionDirection::Unknown => self.unknown_count += 1,
        }

        Decision {
            li,
            direction,
            confidence,
            smoothed_direction,
            calibrated: self.calibrated,
        }
    }

    /// Discards calibration, smoothing and history state, returning to
    /// the static thresholds.
    pub fn recalibrate(&mut self) {
        self.calibration_buf.clear();
        self.smoothing.clear();
        self.li_history.clear();
        self.left_threshold = self.config.li_left_threshold;
        self.right_threshold = self.config.li_right_threshold;
        self.calibrated = false;
        self.left_alpha_ewma = None;
        self.right_alpha_ewma = None;
        info!("calibration reset to static thresholds");
    }

    /// True once adaptive thresholds are in effect.
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Currently active (left, right) thresholds.
    pub fn thresholds(&self) -> (f64, f64) {
        (self.left_threshold, self.right_threshold)
    }

    /// Running per-channel alpha EWMAs, if any window has been accepted.
    pub fn alpha_baseline(&self) -> Option<(f64, f64)> {
        match (self.left_alpha_ewma, self.right_alpha_ewma) {
            (Some(l), Some(r)) => Some((l, r)),
            _ => None,
        }
    }

    /// Summary statistics over the engine's history.
    pub fn statistics(&self) -> DecisionStats {
        let n = self.li_history.len();
        let (li_mean, li_std) = if n == 0 {
            (0.0, 0.0)
        } else {
            let mean = self.li_history.iter().sum::<f64>() / n as f64;
            let var = self.li_history.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
            (mean, var.sqrt())
        };
        DecisionStats {
            li_mean,
            li_std,
            left_count: self.left_count,
            right_count: self.right_count,
            neutral_count: self.neutral_count,
            unknown_count: self.unknown_count,
            calibrated: self.calibrated,
            calibration_progress: self.calibration_buf.len(),
            left_threshold: self.left_threshold,
            right_threshold: self.right_threshold,
        }
    }

    fn feed_calibration(&mut self, li: f64) {
        self.calibration_buf.push(li);
        if self.calibration_buf.len() < self.config.calibration_samples.max(1) {
            return;
        }

        if self.config.adaptive_threshold {
            let n = self.calibration_buf.len() as f64;
            let mean = self.calibration_buf.iter().sum::<f64>() / n;
            let std =
                (self.calibration_buf.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
            self.left_threshold = mean - self.config.adaptive_k * std;
            self.right_threshold = mean + self.config.adaptive_k * std;
            info!(
                left = self.left_threshold,
                right = self.right_threshold,
                "calibration complete, adaptive thresholds active"
            );
        }
        self.calibrated = true;
        self.calibration_buf.clear();
    }

    fn classify(&self, li: f64) -> AttentionDirection {
        if li < self.left_threshold {
            AttentionDirection::Left
        } else if li > self.right_threshold {
            AttentionDirection::Right
        } else {
            AttentionDirection::Neutral
        }
    }

    /// Confidence: distance from the crossed threshold, normalized by
    /// the remaining dynamic range toward the ±1 rail; for NEUTRAL,
    /// proximity to the neutral band center.
    fn confidence(&self, li: f64, direction: AttentionDirection) -> f64 {
        let conf = match direction {
            AttentionDirection::Left => {
                let range = 1.0 + self.left_threshold;
                if range <= 0.0 {
                    1.0
                } else {
                    2.0 * (self.left_threshold - li) / range
                }
            }
            AttentionDirection::Right => {
                let range = 1.0 - self.right_threshold;
                if range <= 0.0 {
                    1.0
                } else {
                    2.0 * (li - self.right_threshold) / range
                }
            }
            AttentionDirection::Neutral => {
                let half_width = (self.right_threshold - self.left_threshold) / 2.0;
                if half_width <= 0.0 {
                    0.5
                } else {
                    let center = (self.right_threshold + self.left_threshold) / 2.0;
                    1.0 - (li - center).abs() / half_width
                }
            }
            AttentionDirection::Unknown => 0.0,
        };
        conf.clamp(0.0, 1.0)
    }

    fn majority_vote(&self) -> AttentionDirection {
        let mut counts = [(AttentionDirection::Left, 0usize),
            (AttentionDirection::Right, 0),
            (AttentionDirection::Neutral, 0)];
        for dir in &self.smoothing {
            for slot in counts.iter_mut() {
                if slot.0 == *dir {
                    slot.1 += 1;
                }
            }
        }
        let max = counts.iter().map(|(_, c)| *c).max().unwrap_or(0);
        if max == 0 {
            return AttentionDirection::Neutral;
        }
        let winners: Vec<AttentionDirection> = counts
            .iter()
            .filter(|(_, c)| *c == max)
            .map(|(d, _)| *d)
            .collect();
        if winners.len() == 1 {
            winners[0]
        } else {
            AttentionDirection::Neutral
        }
    }
}

fn ewma(previous: Option<f64>, value: f64) -> f64 {
    match previous {
        Some(prev) => ALPHA_EWMA * value + (1.0 - ALPHA_EWMA) * prev,
        None => value,
    }
}
