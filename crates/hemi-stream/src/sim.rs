//! Synthetic two-channel frame source.
//!
//! Generates per-hemisphere alpha sinusoids around the ADC midpoint with
//! optional Gaussian noise, mains contamination and clipping injection.
//! Used by the integration tests and the CLI's `--simulate` mode; it
//! implements [`FrameSource`] so the scheduler cannot tell it from
//! hardware.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::time::Instant;
use tracing::info;

use hemi_core::{HemiResult, Sample};

use crate::source::{ConnectionState, FrameSource, ReadOutcome, SourceStats};

/// Generator parameters.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Sample rate of the generated stream, Hz.
    pub sampling_rate: f64,
    /// Alpha tone frequency, Hz.
    pub alpha_freq: f64,
    /// Left-channel alpha amplitude, ADC units.
    pub left_amplitude: f64,
    /// Right-channel alpha amplitude, ADC units.
    pub right_amplitude: f64,
    /// Mains tone amplitude added to both channels, ADC units.
    pub mains_amplitude: f64,
    /// Mains tone frequency, Hz.
    pub mains_freq: f64,
    /// Gaussian noise standard deviation, ADC units.
    pub noise_std: f64,
    /// Baseline ADC code both tones oscillate around.
    pub midpoint: f64,
    /// Full-scale ADC code.
    pub adc_max: u16,
    /// Clip every n-th left-channel sample to full scale.
    pub left_clip_every: Option<usize>,
    /// Stop after this many samples; `None` streams forever.
    pub total_samples: Option<u64>,
    /// Pace emission to the configured sample rate (for live runs);
    /// unpaced sources emit as fast as the scheduler pulls.
    pub paced: bool,
    /// Noise generator seed.
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        SyntheticConfig {
            sampling_rate: 250.0,
            alpha_freq: 10.0,
            left_amplitude: 40.0,
            right_amplitude: 40.0,
            mains_amplitude: 0.0,
            mains_freq: 50.0,
            noise_std: 0.0,
            midpoint: 512.0,
            adc_max: 1023,
            left_clip_every: None,
            total_samples: None,
            paced: false,
            seed: 0x5EED,
        }
    }
}

/// Deterministic synthetic acquisition source.
pub struct SyntheticSource {
    config: SyntheticConfig,
    rng: StdRng,
    noise: Option<Normal<f64>>,
    index: u64,
    state: ConnectionState,
    stats: SourceStats,
    started: Option<Instant>,
}

impl SyntheticSource {
    /// Creates a source from generator parameters.
    pub fn new(config: SyntheticConfig) -> Self {
        let noise = (config.noise_std > 0.0)
            .then(|| Normal::new(0.0, config.noise_std))
            .transpose()
            .ok()
            .flatten();
        let rng = StdRng::seed_from_u64(config.seed);
        SyntheticSource {
            config,
            rng,
            noise,
            index: 0,
            state: ConnectionState::Disconnected,
            stats: SourceStats::default(),
            started: None,
        }
    }

    fn channel_value(&mut self, amplitude: f64) -> f64 {
        let t = self.index as f64 / self.config.sampling_rate;
        let two_pi = 2.0 * std::f64::consts::PI;
        let mut value = self.config.midpoint + amplitude * (two_pi * self.config.alpha_freq * t).sin();
        if self.config.mains_amplitude != 0.0 {
            value += self.config.mains_amplitude * (two_pi * self.config.mains_freq * t).sin();
        }
        if let Some(noise) = &self.noise {
            value += noise.sample(&mut self.rng);
        }
        value.clamp(0.0, f64::from(self.config.adc_max))
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> HemiResult<()> {
        self.state = ConnectionState::Connected;
        self.started = Some(Instant::now());
        info!(
            fs = self.config.sampling_rate,
            left = self.config.left_amplitude,
            right = self.config.right_amplitude,
            "synthetic source started"
        );
        Ok(())
    }

    fn read_sample(&mut self) -> ReadOutcome {
        if self.state != ConnectionState::Connected {
            return ReadOutcome::Disconnected;
        }
        if let Some(total) = self.config.total_samples {
            if self.index >= total {
                self.state = ConnectionState::Disconnected;
                return ReadOutcome::Disconnected;
            }
        }
        if self.config.paced {
            if let Some(started) = self.started {
                let due = self.index as f64 / self.config.sampling_rate;
                if started.elapsed().as_secs_f64() < due {
                    return ReadOutcome::Empty;
                }
            }
        }

        let mut left = self.channel_value(self.config.left_amplitude);
        let right = self.channel_value(self.config.right_amplitude);

        if let Some(every) = self.config.left_clip_every {
            if every > 0 && self.index % every as u64 == 0 {
                left = f64::from(self.config.adc_max);
            }
        }

        let t_us = (self.index as f64 / self.config.sampling_rate * 1e6) as u64;
        self.index += 1;
        self.stats.packets_received += 1;

        ReadOutcome::Sample(Sample {
            t_us,
            left: left.round() as u16,
            right: right.round() as u16,
        })
    }

    fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn stats(&self) -> SourceStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_requested_sample_count() {
        let mut source = SyntheticSource::new(SyntheticConfig {
            total_samples: Some(10),
            ..SyntheticConfig::default()
        });
        source.connect().unwrap();

        let mut count = 0;
        loop {
            match source.read_sample() {
                ReadOutcome::Sample(_) => count += 1,
                ReadOutcome::Disconnected => break,
                _ => {}
            }
        }
        assert_eq!(count, 10);
        assert_eq!(source.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn samples_stay_in_adc_range() {
        let mut source = SyntheticSource::new(SyntheticConfig {
            left_amplitude: 600.0, // would clip without the clamp
            noise_std: 50.0,
            total_samples: Some(1000),
            ..SyntheticConfig::default()
        });
        source.connect().unwrap();

        while let ReadOutcome::Sample(s) = source.read_sample() {
            assert!(s.left <= 1023);
            assert!(s.right <= 1023);
        }
    }

    #[test]
    fn clip_injection_hits_left_channel_only() {
        let mut source = SyntheticSource::new(SyntheticConfig {
            left_clip_every: Some(20),
            total_samples: Some(100),
            ..SyntheticConfig::default()
        });
        source.connect().unwrap();

        let mut clipped = 0;
        while let ReadOutcome::Sample(s) = source.read_sample() {
            if s.left == 1023 {
                clipped += 1;
            }
            assert!(s.right < 1023);
        }
        assert_eq!(clipped, 5);
    }

    #[test]
    fn timestamps_advance_at_sample_rate() {
        let mut source = SyntheticSource::new(SyntheticConfig {
            total_samples: Some(3),
            ..SyntheticConfig::default()
        });
        source.connect().unwrap();

        let mut stamps = Vec::new();
        while let ReadOutcome::Sample(s) = source.read_sample() {
            stamps.push(s.t_us);
        }
        assert_eq!(stamps, vec![0, 4000, 8000]);
    }
}
