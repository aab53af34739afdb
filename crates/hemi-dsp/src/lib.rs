#![warn(missing_docs, clippy::all)]

//! # Hemi-DSP: streaming EEG signal processing
//!
//! The per-window processing stages of the attention monitor: Butterworth
//! second-order-section design, zero-phase filtering, Welch spectral
//! estimation, Hilbert envelopes, feature extraction, artifact/quality
//! assessment and the lateralization decision engine.
//!
//! Everything here is a pure function of configuration and one window of
//! samples, except the two explicitly stateful components: the quality
//! assessor's running variance baseline and the decision engine's
//! calibration/smoothing state.

pub mod bank;
pub mod decision;
pub mod design;
pub mod features;
pub mod hilbert;
pub mod quality;
pub mod sos;
pub mod spectrum;

pub use bank::FilterBank;
pub use decision::{DecisionEngine, DecisionStats};
pub use design::{butterworth_bandpass, notch};
pub use features::FeatureExtractor;
pub use hilbert::envelope;
pub use quality::QualityAssessor;
pub use sos::{Biquad, Sos};
pub use spectrum::{band_power, welch_psd};
