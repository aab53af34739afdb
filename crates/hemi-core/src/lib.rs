#![warn(missing_docs, clippy::all)]

//! # Hemi-Core: EEG attention monitor data model
//!
//! Shared foundation for the hemi workspace: the two-channel sample model,
//! window records, error taxonomy, bounded ring buffers and the typed
//! system configuration.
//!
//! The processing pipeline itself lives in `hemi-dsp`; acquisition and the
//! realtime scheduler live in `hemi-stream`. This crate holds everything
//! those layers exchange.

pub mod config;
pub mod error;
pub mod ring;
pub mod types;

// Re-exports for convenience
pub use config::{
    ArtifactConfig, DecisionConfig, LoggingConfig, SerialConfig, SignalConfig, SystemConfig,
    SystemConfigBuilder,
};
pub use error::{HemiError, HemiResult};
pub use ring::RingBuffer;
pub use types::{
    ArtifactKind, AttentionDirection, BandPowers, ChannelFeatures, Decision, QualityReport,
    Sample, WindowRecord,
};

/// Default full-scale ADC code for the 10-bit acquisition front-end.
pub const DEFAULT_ADC_MAX: u16 = 1023;
