#![warn(missing_docs, clippy::all)]

//! # Hemi-Stream: acquisition and realtime scheduling
//!
//! The I/O half of the attention monitor: frame sources (serial hardware
//! and a synthetic generator), record sinks (CSV and console) and the
//! single-threaded cooperative scheduler that windows the sample stream
//! through the DSP pipeline.

pub mod engine;
pub mod sim;
pub mod sink;
pub mod source;

pub use engine::{RealtimeEngine, RunOutcome};
pub use sim::{SyntheticConfig, SyntheticSource};
pub use sink::{ConsoleSink, CsvSink, RecordSink};
pub use source::{ConnectionState, FrameSource, ReadOutcome, SerialFrameSource, SourceStats};
