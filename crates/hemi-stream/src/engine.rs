//! The realtime scheduling loop.
//!
//! Single-threaded and cooperative: the loop alternates non-blocking
//! source reads with conditional window dispatch. A window is emitted
//! once a full window of samples is buffered and at least one hop of new
//! samples has arrived since the previous emission. Windows are numbered
//! contiguously and records reach every sink in emission order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{error, info, warn};

use hemi_core::config::SystemConfig;
use hemi_core::{ChannelFeatures, HemiResult, QualityReport, RingBuffer, WindowRecord};
use hemi_dsp::{DecisionEngine, DecisionStats, FeatureExtractor, FilterBank, QualityAssessor};

use crate::sink::RecordSink;
use crate::source::{ConnectionState, FrameSource, ReadOutcome, SourceStats};

/// Seconds between periodic status lines.
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Per-window processing times retained for the status line.
const TIMING_HISTORY: usize = 100;

/// Consecutive over-budget windows before the backpressure warning.
const BEHIND_THRESHOLD: u32 = 3;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Clean shutdown: duration elapsed or stop requested.
    Completed,
    /// The source failed beyond recovery.
    SourceFailed {
        /// Human-readable failure description.
        reason: String,
    },
}

struct SinkSlot {
    sink: Box<dyn RecordSink>,
    enabled: bool,
}

/// The windowed scheduler binding source, DSP stages and sinks.
pub struct RealtimeEngine {
    config: SystemConfig,
    source: Box<dyn FrameSource>,
    sinks: Vec<SinkSlot>,
    bank: FilterBank,
    extractor: FeatureExtractor,
    quality_left: QualityAssessor,
    quality_right: QualityAssessor,
    decision: DecisionEngine,
    ring_left: RingBuffer,
    ring_right: RingBuffer,
    stop: Arc<AtomicBool>,
    samples_total: u64,
    windows_emitted: u64,
    new_since_window: usize,
    behind_streak: u32,
    processing_times: VecDeque<f64>,
    last_status: Instant,
}

impl RealtimeEngine {
    /// Builds the engine, designing all filters up front.
    ///
    /// Fails fast on invalid configuration; nothing is constructed
    /// lazily inside the loop.
    pub fn new(config: SystemConfig, source: Box<dyn FrameSource>) -> HemiResult<Self> {
        config.validate()?;

        let bank = FilterBank::new(&config.signal)?;
        let extractor = FeatureExtractor::new(&config.signal);
        let quality_left = QualityAssessor::new(config.artifact.clone(), config.signal.adc_max);
        let quality_right = QualityAssessor::new(config.artifact.clone(), config.signal.adc_max);
        let decision = DecisionEngine::new(config.decision.clone());

        let capacity = config.signal.window_samples() * 2;
        Ok(RealtimeEngine {
            bank,
            extractor,
            quality_left,
            quality_right,
            decision,
            ring_left: RingBuffer::new(capacity),
            ring_right: RingBuffer::new(capacity),
            stop: Arc::new(AtomicBool::new(false)),
            samples_total: 0,
            windows_emitted: 0,
            new_since_window: 0,
            behind_streak: 0,
            processing_times: VecDeque::with_capacity(TIMING_HISTORY),
            last_status: Instant::now(),
            config,
            source,
            sinks: Vec::new(),
        })
    }

    /// Registers a record sink. Sinks that fail mid-run are disabled,
    /// never retried.
    pub fn add_sink(&mut self, sink: Box<dyn RecordSink>) {
        self.sinks.push(SinkSlot {
            sink,
            enabled: true,
        });
    }

    /// Flag another thread can set to request a clean stop at the next
    /// loop iteration.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Windows emitted so far.
    pub fn windows_emitted(&self) -> u64 {
        self.windows_emitted
    }

    /// Decision engine statistics.
    pub fn decision_stats(&self) -> DecisionStats {
        self.decision.statistics()
    }

    /// Acquisition counters.
    pub fn source_stats(&self) -> SourceStats {
        self.source.stats()
    }

    /// Clears decision calibration back to static thresholds.
    pub fn recalibrate(&mut self) {
        self.decision.recalibrate();
    }

    /// Runs the processing loop until the duration elapses, the stop
    /// flag is raised, or the source fails terminally.
    pub fn run(&mut self, duration_s: Option<f64>) -> RunOutcome {
        if let Err(e) = self.source.connect() {
            error!(%e, "source connection failed");
            self.finish();
            return RunOutcome::SourceFailed {
                reason: e.to_string(),
            };
        }

        let deadline = duration_s.map(|d| Instant::now() + Duration::from_secs_f64(d));
        let n = self.config.signal.window_samples();
        let hop = self.config.signal.hop_samples();
        info!(
            window = n,
            hop,
            fs = self.config.signal.sampling_rate,
            "realtime loop started"
        );

        let outcome = loop {
            if self.stop.load(Ordering::Relaxed) {
                info!("stop requested");
                break RunOutcome::Completed;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    info!("duration limit reached");
                    break RunOutcome::Completed;
                }
            }

            match self.source.read_sample() {
                ReadOutcome::Sample(sample) => {
                    self.ring_left.push(f64::from(sample.left));
                    self.ring_right.push(f64::from(sample.right));
                    self.samples_total += 1;
                    self.new_since_window += 1;
                }
                ReadOutcome::Empty => {
                    // No window due yet: yield briefly, never under a lock.
                    if self.ring_left.len() < n || self.new_since_window < hop {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                }
                ReadOutcome::Corrupt => {
                    // Counted by the source, invisible to the pipeline.
                }
                ReadOutcome::Disconnected => {
                    if self.source.state() == ConnectionState::Disconnected {
                        let stats = self.source.stats();
                        error!(
                            reconnect_attempts = stats.reconnect_attempts,
                            samples = self.samples_total,
                            windows = self.windows_emitted,
                            "source terminal, ending run"
                        );
                        break RunOutcome::SourceFailed {
                            reason: "source disconnected and reconnects exhausted".to_string(),
                        };
                    }
                    warn!("connection lost, driving reconnect");
                    self.source.reconnect();
                    continue;
                }
            }

            if self.ring_left.len() >= n && self.new_since_window >= hop {
                self.emit_window(n, hop);
            }

            if self.last_status.elapsed() >= STATUS_INTERVAL {
                self.log_status();
                self.last_status = Instant::now();
            }
        };

        self.finish();
        outcome
    }

    fn emit_window(&mut self, n: usize, hop: usize) {
        let started = Instant::now();

        let (left_raw, right_raw) = match (
            self.ring_left.snapshot_last(n),
            self.ring_right.snapshot_last(n),
        ) {
            (Some(l), Some(r)) => (l, r),
            _ => return,
        };
        self.ring_left.advance(hop);
        self.ring_right.advance(hop);
        self.new_since_window -= hop.min(self.new_since_window);

        let (left_features, left_quality) = process_channel(
            &self.bank,
            &self.extractor,
            &mut self.quality_left,
            &left_raw,
        );
        let (right_features, right_quality) = process_channel(
            &self.bank,
            &self.extractor,
            &mut self.quality_right,
            &right_raw,
        );

        let worst_quality = left_quality.quality_score.min(right_quality.quality_score);
        let decision = self.decision.decide(
            left_features.alpha_power,
            right_features.alpha_power,
            worst_quality,
            left_quality.artifact,
            right_quality.artifact,
        );

        let record = WindowRecord {
            window_index: self.windows_emitted,
            timestamp: epoch_seconds(),
            sample_count: self.samples_total,
            left_alpha_power: left_features.alpha_power,
            right_alpha_power: right_features.alpha_power,
            lateralization_index: decision.li,
            attention_direction: decision.direction,
            confidence: decision.confidence,
            smoothed_direction: decision.smoothed_direction,
            quality_score: worst_quality,
            left_snr_db: left_quality.snr_db,
            right_snr_db: right_quality.snr_db,
            left_artifact: left_quality.artifact,
            right_artifact: right_quality.artifact,
        };
        self.windows_emitted += 1;
        self.dispatch(&record);

        let elapsed = started.elapsed().as_secs_f64();
        if self.processing_times.len() == TIMING_HISTORY {
            self.processing_times.pop_front();
        }
        self.processing_times.push_back(elapsed);

        let budget = hop as f64 / self.config.signal.sampling_rate;
        if elapsed >= budget {
            self.behind_streak += 1;
            if self.behind_streak == BEHIND_THRESHOLD {
                warn!(
                    elapsed_ms = elapsed * 1e3,
                    budget_ms = budget * 1e3,
                    "processing_behind"
                );
            }
        } else {
            self.behind_streak = 0;
        }
    }

    fn dispatch(&mut self, record: &WindowRecord) {
        for slot in &mut self.sinks {
            if !slot.enabled {
                continue;
            }
            if let Err(e) = slot.sink.write_record(record) {
                error!(%e, "sink failed, disabling for the rest of the run");
                slot.enabled = false;
            }
        }
    }

    fn log_status(&self) {
        let stats = self.source.stats();
        let total = stats.packets_received + stats.packets_corrupted;
        let corruption_pct = if total > 0 {
            stats.packets_corrupted as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let avg_ms = if self.processing_times.is_empty() {
            0.0
        } else {
            self.processing_times.iter().sum::<f64>() / self.processing_times.len() as f64 * 1e3
        };
        let decision = self.decision.statistics();
        info!(
            samples = self.samples_total,
            windows = self.windows_emitted,
            corruption_pct,
            calibrated = decision.calibrated,
            calibration = decision.calibration_progress,
            avg_processing_ms = avg_ms,
            left = decision.left_count,
            right = decision.right_count,
            neutral = decision.neutral_count,
            "status"
        );
    }

    fn finish(&mut self) {
        for slot in &mut self.sinks {
            if let Err(e) = slot.sink.close() {
                error!(%e, "sink close failed");
            }
        }
        self.source.disconnect();
        info!(
            samples = self.samples_total,
            windows = self.windows_emitted,
            "engine stopped"
        );
    }
}

/// Filters one channel's window and derives its features and quality.
fn process_channel(
    bank: &FilterBank,
    extractor: &FeatureExtractor,
    assessor: &mut QualityAssessor,
    raw: &[f64],
) -> (ChannelFeatures, QualityReport) {
    let wide = bank.preprocess(raw);
    let alpha = bank.extract_alpha(&wide);
    let beta = bank.extract_beta(&wide);

    let features = extractor.extract(bank, &wide, &alpha, &beta);
    let quality = assessor.assess(bank, raw, &wide, features.alpha_power, features.beta_power);

    (features, quality)
}

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
