//! IIR filter design.
//!
//! Butterworth bandpass cascades are designed the classical way: analog
//! lowpass prototype poles, lowpass-to-bandpass transform around the
//! pre-warped band edges, bilinear transform, then pairing into
//! second-order sections with the numerator zeros split as (z−1)(z+1)
//! per section. The notch is a standard RBJ biquad.

use num_complex::Complex;
use std::f64::consts::PI;

use hemi_core::{HemiError, HemiResult};

use crate::sos::{Biquad, Sos};

/// Designs a Butterworth bandpass of the given prototype `order` as a
/// cascade of `order` second-order sections.
///
/// `order` is the analog prototype order (the `N` of
/// `butter(N, [low, high], btype='bandpass')`); the resulting digital
/// filter has `2·order` poles. Only even orders are supported.
pub fn butterworth_bandpass(order: usize, low: f64, high: f64, fs: f64) -> HemiResult<Sos> {
    let nyquist = fs / 2.0;
    if order == 0 || order % 2 != 0 {
        return Err(HemiError::FilterDesign {
            reason: format!("bandpass order must be a positive even number, got {order}"),
            fs,
        });
    }
    if !(low > 0.0 && low < high && high < nyquist) {
        return Err(HemiError::FilterDesign {
            reason: format!("band edges ({low}, {high}) must satisfy 0 < low < high < {nyquist}"),
            fs,
        });
    }

    // Pre-warp the band edges for the bilinear transform.
    let warp = |f: f64| 2.0 * fs * (PI * f / fs).tan();
    let w1 = warp(low);
    let w2 = warp(high);
    let w0_sq = w1 * w2;
    let bw = w2 - w1;

    let two_fs = Complex::new(2.0 * fs, 0.0);
    let mut sections = Vec::with_capacity(order);

    // Upper-half-plane prototype poles; conjugates are implied by the
    // real-coefficient sections.
    for k in 0..order / 2 {
        let theta = PI / 2.0 + PI * (2.0 * k as f64 + 1.0) / (2.0 * order as f64);
        let p = Complex::from_polar(1.0, theta);

        // Lowpass-to-bandpass: each prototype pole maps to the two roots
        // of s^2 - bw*p*s + w0^2 = 0.
        let half = p * (bw / 2.0);
        let sq = (half * half - Complex::new(w0_sq, 0.0)).sqrt();

        for s in [half + sq, half - sq] {
            let z = (two_fs + s) / (two_fs - s);
            let a1 = -2.0 * z.re;
            let a2 = z.norm_sqr();
            if a2 >= 1.0 {
                return Err(HemiError::FilterDesign {
                    reason: format!("unstable pole (|z|^2 = {a2:.6}) for band ({low}, {high})"),
                    fs,
                });
            }
            sections.push(Biquad {
                b0: 1.0,
                b1: 0.0,
                b2: -1.0,
                a1,
                a2,
            });
        }
    }

    // Normalize to unit gain at the geometric band center, distributing
    // the scale evenly across sections for balanced numerics.
    let sos = Sos::new(sections);
    let center = (low * high).sqrt();
    let gain = sos.magnitude(center, fs);
    if !gain.is_finite() || gain <= 0.0 {
        return Err(HemiError::FilterDesign {
            reason: format!("degenerate gain {gain} at band center {center} Hz"),
            fs,
        });
    }
    let scale = (1.0 / gain).powf(1.0 / sos.sections().len() as f64);
    let scaled = sos
        .sections()
        .iter()
        .map(|s| Biquad {
            b0: s.b0 * scale,
            b1: s.b1 * scale,
            b2: s.b2 * scale,
            a1: s.a1,
            a2: s.a2,
        })
        .collect();

    Ok(Sos::new(scaled))
}

/// Designs a single-section IIR notch at `freq` with quality factor `q`.
pub fn notch(freq: f64, q: f64, fs: f64) -> Sos {
    let omega = 2.0 * PI * freq / fs;
    let alpha = omega.sin() / (2.0 * q);
    let cos_omega = omega.cos();

    let a0 = 1.0 + alpha;
    Sos::new(vec![Biquad {
        b0: 1.0 / a0,
        b1: -2.0 * cos_omega / a0,
        b2: 1.0 / a0,
        a1: -2.0 * cos_omega / a0,
        a2: (1.0 - alpha) / a0,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandpass_center_gain_is_unity() {
        let sos = butterworth_bandpass(4, 8.0, 12.0, 250.0).unwrap();
        let center = (8.0f64 * 12.0).sqrt();
        assert!((sos.magnitude(center, 250.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bandpass_rejects_out_of_band() {
        let sos = butterworth_bandpass(4, 8.0, 12.0, 250.0).unwrap();
        assert!(sos.magnitude(2.0, 250.0) < 0.05);
        assert!(sos.magnitude(30.0, 250.0) < 0.05);
        // In-band stays near unity.
        assert!(sos.magnitude(10.0, 250.0) > 0.98);
    }

    #[test]
    fn wideband_is_flat_in_passband() {
        let sos = butterworth_bandpass(4, 1.0, 40.0, 250.0).unwrap();
        for freq in [5.0, 10.0, 20.0] {
            let g = sos.magnitude(freq, 250.0);
            assert!(
                (g - 1.0).abs() < 0.02,
                "gain at {freq} Hz should be ~1, got {g}"
            );
        }
        // The upper passband edge droops a little before rolloff.
        let g = sos.magnitude(30.0, 250.0);
        assert!(g > 0.9 && g <= 1.0, "gain at 30 Hz should stay > 0.9, got {g}");
    }

    #[test]
    fn bandpass_sections_are_stable() {
        let sos = butterworth_bandpass(4, 1.0, 40.0, 250.0).unwrap();
        assert_eq!(sos.sections().len(), 4);
        for s in sos.sections() {
            assert!(s.a2 < 1.0);
            assert!(s.a1.abs() < 1.0 + s.a2);
        }
    }

    #[test]
    fn invalid_band_is_rejected() {
        assert!(butterworth_bandpass(4, 12.0, 8.0, 250.0).is_err());
        assert!(butterworth_bandpass(4, 8.0, 130.0, 250.0).is_err());
        assert!(butterworth_bandpass(3, 8.0, 12.0, 250.0).is_err());
        assert!(butterworth_bandpass(0, 8.0, 12.0, 250.0).is_err());
    }

    #[test]
    fn notch_response_shape() {
        let sos = notch(50.0, 30.0, 250.0);
        assert!(sos.magnitude(50.0, 250.0) < 1e-3);
        assert!(sos.magnitude(10.0, 250.0) > 0.99);
        assert!(sos.magnitude(45.0, 250.0) > 0.9);
    }
}
