//! Record sinks.
//!
//! Every consumer of [`WindowRecord`]s implements [`RecordSink`]; the
//! scheduler fans each record out to all registered sinks and disables a
//! sink for the rest of the run when it fails. The CSV sink appends one
//! row per window; the console sink narrates classified windows through
//! the log.

use std::fs::File;
use std::path::Path;

use tracing::info;

use hemi_core::{AttentionDirection, HemiError, HemiResult, WindowRecord};

/// CSV column order of the metrics log.
const CSV_HEADER: [&str; 13] = [
    "timestamp",
    "sample_count",
    "left_alpha_power",
    "right_alpha_power",
    "lateralization_index",
    "attention_direction",
    "confidence",
    "smoothed_direction",
    "quality_score",
    "left_snr_db",
    "right_snr_db",
    "left_artifact",
    "right_artifact",
];

/// A consumer of window records.
pub trait RecordSink {
    /// Appends one record.
    fn write_record(&mut self, record: &WindowRecord) -> HemiResult<()>;

    /// Forces buffered records out.
    fn flush(&mut self) -> HemiResult<()>;

    /// Flushes and releases the sink.
    fn close(&mut self) -> HemiResult<()>;
}

/// Formats a value with six significant digits.
pub fn format_sig6(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return "0.00000".to_string();
    }
    let exponent = value.abs().log10().floor() as i32;
    let decimals = (5 - exponent).max(0) as usize;
    format!("{value:.decimals$}")
}

/// Append-only CSV metrics log.
pub struct CsvSink {
    writer: csv::Writer<File>,
    flush_interval: usize,
    since_flush: usize,
}

impl CsvSink {
    /// Creates the file, writes the header row and flushes it.
    pub fn create(path: &Path, flush_interval: usize) -> HemiResult<Self> {
        let mut writer = csv::Writer::from_path(path).map_err(|e| HemiError::Sink {
            reason: format!("cannot create {}: {e}", path.display()),
        })?;
        writer.write_record(CSV_HEADER).map_err(|e| HemiError::Sink {
            reason: format!("cannot write header: {e}"),
        })?;
        writer.flush().map_err(|e| HemiError::Sink {
            reason: format!("cannot flush header: {e}"),
        })?;
        info!(path = %path.display(), "CSV metrics log created");

        Ok(CsvSink {
            writer,
            flush_interval: flush_interval.max(1),
            since_flush: 0,
        })
    }
}

impl RecordSink for CsvSink {
    fn write_record(&mut self, record: &WindowRecord) -> HemiResult<()> {
        let row = [
            // Epoch timestamps keep microsecond resolution.
            format!("{:.6}", record.timestamp),
            record.sample_count.to_string(),
            format_sig6(record.left_alpha_power),
            format_sig6(record.right_alpha_power),
            format_sig6(record.lateralization_index),
            record.attention_direction.to_string(),
            format_sig6(record.confidence),
            record.smoothed_direction.to_string(),
            format_sig6(record.quality_score),
            format_sig6(record.left_snr_db),
            format_sig6(record.right_snr_db),
            record.left_artifact.to_string(),
            record.right_artifact.to_string(),
        ];
        self.writer.write_record(&row).map_err(|e| HemiError::Sink {
            reason: format!("row write failed: {e}"),
        })?;

        self.since_flush += 1;
        if self.since_flush >= self.flush_interval {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> HemiResult<()> {
        self.since_flush = 0;
        self.writer.flush().map_err(|e| HemiError::Sink {
            reason: format!("flush failed: {e}"),
        })
    }

    fn close(&mut self) -> HemiResult<()> {
        self.flush()
    }
}

/// Narrates classified windows to the log.
pub struct ConsoleSink;

impl RecordSink for ConsoleSink {
    fn write_record(&mut self, record: &WindowRecord) -> HemiResult<()> {
        if record.smoothed_direction == AttentionDirection::Unknown {
            return Ok(());
        }
        let symbol = match record.smoothed_direction {
            AttentionDirection::Left => "<-",
            AttentionDirection::Right => "->",
            _ => "--",
        };
        info!(
            "attention: {symbol} {} | LI {:+.3} | conf {:.2} | quality {:.1}/100 | L-alpha {:.2} | R-alpha {:.2}",
            record.smoothed_direction,
            record.lateralization_index,
            record.confidence,
            record.quality_score,
            record.left_alpha_power,
            record.right_alpha_power,
        );
        Ok(())
    }

    fn flush(&mut self) -> HemiResult<()> {
        Ok(())
    }

    fn close(&mut self) -> HemiResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hemi_core::ArtifactKind;

    fn record() -> WindowRecord {
        WindowRecord {
            window_index: 0,
            timestamp: 1_700_000_000.123456,
            sample_count: 500,
            left_alpha_power: 763.912345,
            right_alpha_power: 770.0,
            lateralization_index: 0.00397,
            attention_direction: AttentionDirection::Neutral,
            confidence: 0.97,
            smoothed_direction: AttentionDirection::Neutral,
            quality_score: 100.0,
            left_snr_db: 60.0,
            right_snr_db: 60.0,
            left_artifact: ArtifactKind::Clean,
            right_artifact: ArtifactKind::Clean,
        }
    }

    #[test]
    fn six_significant_digits() {
        assert_eq!(format_sig6(763.912345), "763.912");
        assert_eq!(format_sig6(0.00397), "0.00397000");
        assert_eq!(format_sig6(-12.3456789), "-12.3457");
        assert_eq!(format_sig6(0.0), "0.00000");
        assert_eq!(format_sig6(123456.789), "123457");
    }

    #[test]
    fn csv_sink_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut sink = CsvSink::create(&path, 1).unwrap();
        sink.write_record(&record()).unwrap();
        sink.close().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADER.join(","));

        let row = lines.next().unwrap();
        assert!(row.starts_with("1700000000.123456,500,"));
        assert!(row.contains("NEUTRAL"));
        assert!(row.contains("CLEAN"));
        assert_eq!(row.split(',').count(), CSV_HEADER.len());
    }

    #[test]
    fn csv_sink_flushes_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut sink = CsvSink::create(&path, 2).unwrap();

        sink.write_record(&record()).unwrap();
        sink.write_record(&record()).unwrap(); // second write triggers flush

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3); // header + 2 rows
    }

    #[test]
    fn console_sink_never_fails() {
        let mut sink = ConsoleSink;
        assert!(sink.write_record(&record()).is_ok());
        assert!(sink.flush().is_ok());
        assert!(sink.close().is_ok());
    }
}
