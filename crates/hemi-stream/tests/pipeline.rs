//! End-to-end scenarios through the full pipeline: synthetic sources in,
//! window records out.

use std::sync::{Arc, Mutex};

use hemi_core::config::{SerialConfig, SystemConfig};
use hemi_core::{ArtifactKind, AttentionDirection, HemiResult, Sample, WindowRecord};
use hemi_stream::engine::{RealtimeEngine, RunOutcome};
use hemi_stream::sim::{SyntheticConfig, SyntheticSource};
use hemi_stream::sink::{CsvSink, RecordSink};
use hemi_stream::source::{ConnectionState, FrameSource, ReadOutcome, SourceStats};

/// Sink that collects records for assertions.
#[derive(Clone, Default)]
struct CollectSink {
    records: Arc<Mutex<Vec<WindowRecord>>>,
}

impl CollectSink {
    fn records(&self) -> Vec<WindowRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl RecordSink for CollectSink {
    fn write_record(&mut self, record: &WindowRecord) -> HemiResult<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> HemiResult<()> {
        Ok(())
    }

    fn close(&mut self) -> HemiResult<()> {
        Ok(())
    }
}

/// Runs a synthetic configuration to source exhaustion and returns the
/// emitted records.
fn run_synthetic(config: SyntheticConfig) -> (Vec<WindowRecord>, RunOutcome) {
    let source = SyntheticSource::new(config);
    let mut engine = RealtimeEngine::new(SystemConfig::default(), Box::new(source)).unwrap();
    let sink = CollectSink::default();
    engine.add_sink(Box::new(sink.clone()));
    let outcome = engine.run(None);
    (sink.records(), outcome)
}

/// Samples for `windows` full windows at the default geometry
/// (N = 500, hop = 250).
fn samples_for_windows(windows: u64) -> u64 {
    500 + (windows - 1) * 250
}

#[test]
fn balanced_alpha_reads_neutral() {
    let (records, _) = run_synthetic(SyntheticConfig {
        left_amplitude: 40.0,
        right_amplitude: 40.0,
        total_samples: Some(samples_for_windows(8)),
        ..SyntheticConfig::default()
    });

    assert_eq!(records.len(), 8);
    for record in &records {
        let ratio = record.left_alpha_power / record.right_alpha_power;
        assert!(
            (ratio - 1.0).abs() <= 0.02,
            "alpha power ratio {ratio} off balance"
        );
        assert!(record.lateralization_index.abs() <= 0.02);
        assert_eq!(record.attention_direction, AttentionDirection::Neutral);
        assert_eq!(record.left_artifact, ArtifactKind::Clean);
        assert_eq!(record.right_artifact, ArtifactKind::Clean);
        assert!(
            record.quality_score >= 80.0,
            "quality {}",
            record.quality_score
        );
    }
}

#[test]
fn right_dominant_alpha_reads_right() {
    let (records, _) = run_synthetic(SyntheticConfig {
        left_amplitude: 20.0,
        right_amplitude: 60.0,
        total_samples: Some(samples_for_windows(6)),
        ..SyntheticConfig::default()
    });

    assert_eq!(records.len(), 6);
    for record in &records {
        assert!(
            record.lateralization_index > 0.6,
            "LI {}",
            record.lateralization_index
        );
        assert_eq!(record.attention_direction, AttentionDirection::Right);
        assert!(record.confidence >= 0.8, "confidence {}", record.confidence);
    }
    // A sustained direction survives smoothing.
    assert_eq!(
        records.last().unwrap().smoothed_direction,
        AttentionDirection::Right
    );
}

#[test]
fn saturated_left_channel_gates_decision() {
    let (records, _) = run_synthetic(SyntheticConfig {
        left_clip_every: Some(20), // 5% of samples at full scale
        total_samples: Some(samples_for_windows(4)),
        ..SyntheticConfig::default()
    });

    assert_eq!(records.len(), 4);
    for record in &records {
        assert_eq!(record.left_artifact, ArtifactKind::Saturation);
        assert_eq!(record.attention_direction, AttentionDirection::Unknown);
        assert_eq!(record.confidence, 0.0);
    }
}

#[test]
fn mains_contamination_flags_line_noise() {
    let (records, _) = run_synthetic(SyntheticConfig {
        mains_amplitude: 80.0,
        total_samples: Some(samples_for_windows(4)),
        ..SyntheticConfig::default()
    });

    assert_eq!(records.len(), 4);
    for record in &records {
        assert_eq!(record.left_artifact, ArtifactKind::LineNoise);
        assert_eq!(record.right_artifact, ArtifactKind::LineNoise);
        assert_eq!(record.attention_direction, AttentionDirection::Unknown);
    }
}

#[test]
fn window_indices_are_contiguous() {
    let (records, _) = run_synthetic(SyntheticConfig {
        noise_std: 5.0,
        total_samples: Some(samples_for_windows(12)),
        ..SyntheticConfig::default()
    });

    assert_eq!(records.len(), 12);
    for (expected, record) in records.iter().enumerate() {
        assert_eq!(record.window_index, expected as u64);
    }
    // Sample counters are monotone as well.
    for pair in records.windows(2) {
        assert!(pair[1].sample_count > pair[0].sample_count);
    }
}

#[test]
fn quality_and_li_invariants_hold_under_noise() {
    let (records, _) = run_synthetic(SyntheticConfig {
        noise_std: 20.0,
        left_amplitude: 30.0,
        right_amplitude: 45.0,
        total_samples: Some(samples_for_windows(10)),
        ..SyntheticConfig::default()
    });

    for record in &records {
        assert!(record.lateralization_index.abs() <= 1.0);
        assert!((0.0..=100.0).contains(&record.quality_score));
        assert!((0.0..=1.0).contains(&record.confidence));
        let gated = record.attention_direction == AttentionDirection::Unknown;
        let should_gate = record.quality_score < 40.0
            || record.left_artifact != ArtifactKind::Clean
            || record.right_artifact != ArtifactKind::Clean;
        assert_eq!(gated, should_gate, "gating invariant violated: {record:?}");
    }
}

#[test]
fn csv_sink_receives_every_window() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.csv");

    let source = SyntheticSource::new(SyntheticConfig {
        total_samples: Some(samples_for_windows(5)),
        ..SyntheticConfig::default()
    });
    let mut engine = RealtimeEngine::new(SystemConfig::default(), Box::new(source)).unwrap();
    engine.add_sink(Box::new(CsvSink::create(&path, 10).unwrap()));
    engine.run(None);

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 6, "header + 5 rows");
    assert!(lines[0].starts_with("timestamp,sample_count,"));
    for row in &lines[1..] {
        assert_eq!(row.split(',').count(), 13);
        assert!(row.contains("NEUTRAL"));
    }
}

/// Source double that streams samples, then fails until its reconnect
/// budget is gone.
struct FailingSource {
    samples: u64,
    emitted: u64,
    state: ConnectionState,
    max_attempts: u32,
    attempts: u32,
}

impl FailingSource {
    fn new(samples: u64, max_attempts: u32) -> Self {
        FailingSource {
            samples,
            emitted: 0,
            state: ConnectionState::Disconnected,
            max_attempts,
            attempts: 0,
        }
    }
}

impl FrameSource for FailingSource {
    fn connect(&mut self) -> HemiResult<()> {
        self.state = ConnectionState::Connected;
        Ok(())
    }

    fn read_sample(&mut self) -> ReadOutcome {
        if self.state != ConnectionState::Connected {
            return ReadOutcome::Disconnected;
        }
        if self.emitted >= self.samples {
            // Stream cut: transport gone mid-run.
            self.state = ConnectionState::Reconnecting;
            return ReadOutcome::Disconnected;
        }
        let t = self.emitted;
        self.emitted += 1;
        let value = 512.0 + 40.0 * (2.0 * std::f64::consts::PI * 10.0 * t as f64 / 250.0).sin();
        ReadOutcome::Sample(Sample {
            t_us: t * 4000,
            left: value.round() as u16,
            right: value.round() as u16,
        })
    }

    fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            packets_received: self.emitted,
            reconnect_attempts: self.attempts,
            ..SourceStats::default()
        }
    }

    fn reconnect(&mut self) -> bool {
        if self.attempts >= self.max_attempts {
            self.state = ConnectionState::Disconnected;
            return false;
        }
        self.attempts += 1;
        // Every attempt fails; the transport never comes back.
        false
    }
}

#[test]
fn exhausted_reconnects_end_the_run_as_source_failure() {
    let config = SystemConfig {
        serial: SerialConfig {
            max_reconnect_attempts: 5,
            ..SerialConfig::default()
        },
        ..SystemConfig::default()
    };

    let source = FailingSource::new(samples_for_windows(10), 5);
    let mut engine = RealtimeEngine::new(config, Box::new(source)).unwrap();
    let sink = CollectSink::default();
    engine.add_sink(Box::new(sink.clone()));

    let outcome = engine.run(None);

    // Ten windows made it out before the cut...
    assert_eq!(sink.records().len(), 10);
    // ...the reconnect budget was spent...
    assert_eq!(engine.source_stats().reconnect_attempts, 5);
    // ...and the run ended as a fatal source failure.
    assert!(matches!(outcome, RunOutcome::SourceFailed { .. }));
}
