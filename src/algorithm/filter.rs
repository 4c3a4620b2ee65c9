//! IIR filter design and application.
//!
//! The designs are 2nd order digital Butterworth filters derived from the
//! analog prototype: place the prototype poles on the unit circle, pre-warp
//! the cutoff for the bilinear transform, scale (lowpass) or
//! duplicate-and-shift (bandpass) the poles, bilinear transform and
//! compensate the gain so the filter is unity at DC respectively at the band
//! center.
//!
//! Coefficient conventions: `b` is the numerator, `a` the denominator
//! without its leading 1, so `y[n] = sum(b[i]*x[n-i]) - sum(a[i]*y[n-1-i])`.

use core::f32::consts::PI;

use num::complex::Complex;

use crate::algorithm::complex_div;

/// Designs a 2nd order digital Butterworth lowpass filter.
///
/// `freq` is the cutoff and `fs` the sampling frequency, `0 < freq < fs / 2`.
/// Returns `(b, a)` with `b` of length 3 and `a` of length 2.
pub fn butter_lowpass(freq: f32, fs: f32) -> ([f32; 3], [f32; 2]) {
    let factor = (2.0 * freq) / fs;

    // Prototype poles mirrored around the real axis so the coefficients come
    // out exactly real
    let mut p = [-Complex::cis(-PI / 4.0), -Complex::cis(PI / 4.0)];

    // Pre-warp the cutoff for the bilinear transform
    let factor = 4.0 * libm::tanf((PI * factor) / 2.0);

    // Scale the poles radially to move the cutoff
    p[0] *= factor;
    p[1] *= factor;

    // Gain change from the frequency scaling
    let mut k = factor * factor;

    let four = Complex::new(4.0f32, 0.0);
    let z_prod = Complex::new(1.0f32, 0.0);
    let p_prod = (four - p[0]) * (four - p[1]);

    k *= complex_div(z_prod, p_prod).re;

    // Bilinear transform
    p[0] = complex_div(four + p[0], four - p[0]);
    p[1] = complex_div(four + p[1], four - p[1]);

    // Zeros from infinity land on the Nyquist frequency
    let z = [-1.0f32, -1.0];

    let a = [-(p[0] + p[1]).re, (p[0] * p[1]).re];
    let b = [k, -k * (z[0] + z[1]), k * (z[0] * z[1])];

    (b, a)
}

/// Designs a 2nd order digital Butterworth bandpass filter with passband
/// `min_freq..max_freq`.
///
/// Returns `(b, a)` with `b` of length 5 and `a` of length 4.
pub fn butter_bandpass(min_freq: f32, max_freq: f32, fs: f32) -> ([f32; 5], [f32; 4]) {
    let min_f = (2.0 * min_freq) / fs;
    let max_f = (2.0 * max_freq) / fs;

    let p = [-Complex::cis(-PI / 4.0), -Complex::cis(PI / 4.0)];
    let k = 1.0f32;

    // Pre-warp both band edges
    let min_f = 4.0 * libm::tanf((PI * min_f) / 2.0);
    let max_f = 4.0 * libm::tanf((PI * max_f) / 2.0);

    // Lowpass prototype to bandpass: scale to the bandwidth, then duplicate
    // the poles and shift them to +-w0
    let bw = max_f - min_f;
    let mut w0 = Complex::new(libm::sqrtf(min_f * max_f), 0.0);

    let scale = Complex::new(bw / 2.0, 0.0);
    let p = [scale * p[0], scale * p[1]];

    w0 *= w0;
    let p_bp = [
        p[0] + ((p[0] * p[0]) - w0).sqrt(),
        p[1] + ((p[1] * p[1]) - w0).sqrt(),
        p[0] - ((p[0] * p[0]) - w0).sqrt(),
        p[1] - ((p[1] * p[1]) - w0).sqrt(),
    ];

    // Gain change from the frequency scaling
    let k_bp = k * bw * bw;

    let four = Complex::new(4.0f32, 0.0);
    let p_z = [
        complex_div(four + p_bp[0], four - p_bp[0]),
        complex_div(four + p_bp[1], four - p_bp[1]),
        complex_div(four + p_bp[2], four - p_bp[2]),
        complex_div(four + p_bp[3], four - p_bp[3]),
    ];

    // Zeros from infinity land on the Nyquist frequency
    let z = [1.0f32, 1.0, -1.0, -1.0];

    let z_prod = Complex::new(16.0f32, 0.0);
    let p_prod = (four - p_bp[0]) * (four - p_bp[1]) * (four - p_bp[2]) * (four - p_bp[3]);
    let k_z = k_bp * complex_div(z_prod, p_prod).re;

    let a = [
        -(p_z[0] + p_z[1] + p_z[2] + p_z[3]).re,
        ((p_z[0] * p_z[1])
            + (p_z[0] * p_z[2])
            + (p_z[0] * p_z[3])
            + (p_z[1] * p_z[2])
            + (p_z[1] * p_z[3])
            + (p_z[2] * p_z[3]))
            .re,
        -((p_z[0] * p_z[1] * p_z[2])
            + (p_z[0] * p_z[1] * p_z[3])
            + (p_z[0] * p_z[2] * p_z[3])
            + (p_z[1] * p_z[2] * p_z[3]))
            .re,
        (p_z[0] * p_z[1] * p_z[2] * p_z[3]).re,
    ];
    let b = [
        k_z,
        -k_z * (z[0] + z[1] + z[2] + z[3]),
        k_z * ((z[0] * z[1])
            + (z[0] * z[2])
            + (z[0] * z[3])
            + (z[1] * z[2])
            + (z[1] * z[3])
            + (z[2] * z[3])),
        -k_z * ((z[0] * z[1] * z[2])
            + (z[0] * z[1] * z[3])
            + (z[0] * z[2] * z[3])
            + (z[1] * z[2] * z[3])),
        k_z * (z[0] * z[1] * z[2] * z[3]),
    ];

    (b, a)
}

/// One transposed direct-form II step. Coefficients beyond the slice lengths
/// are treated as zero so the same state array serves 2nd and 4th order
/// filters.
fn filter_inplace_apply(
    sample_idx: usize,
    b: &[f32],
    a: &[f32],
    state: &mut [f32; 5],
    data: &mut [f32],
) {
    let b_at = |i: usize| b.get(i).copied().unwrap_or(0.0);
    let a_at = |i: usize| a.get(i).copied().unwrap_or(0.0);

    let x = data[sample_idx];
    let y = state[0] + (b_at(0) * x);

    state[0] = state[1] + (b_at(1) * x) - (a_at(0) * y);
    state[1] = state[2] + (b_at(2) * x) - (a_at(1) * y);
    state[2] = state[3] + (b_at(3) * x) - (a_at(2) * y);
    state[3] = (b_at(4) * x) - (a_at(3) * y);

    data[sample_idx] = y;
}

/// Filters `data` in place along its length with zero initial state.
pub fn lfilter(b: &[f32], a: &[f32], data: &mut [f32]) {
    let mut state = [0.0f32; 5];

    for i in 0..data.len() {
        filter_inplace_apply(i, b, a, &mut state, data);
    }
}

/// Applies [`lfilter`] to every row of a row-major matrix.
pub fn lfilter_matrix(b: &[f32], a: &[f32], data: &mut [f32], cols: usize) {
    for row in data.chunks_exact_mut(cols) {
        lfilter(b, a, row);
    }
}

/// Computes one filtered output sample per point from rolling histories.
///
/// `history` holds the last `b.len()` raw values and `filt_history` the last
/// `a.len()` filtered values, both as row-major matrices with one column per
/// point (newest row first). `output[i] = sum(b[r] * history[r][i]) -
/// sum(a[r] * filt_history[r][i])`.
pub fn apply_filter(
    a: &[f32],
    filt_history: &[f32],
    b: &[f32],
    history: &[f32],
    output: &mut [f32],
) {
    let cols = output.len();

    for i in 0..cols {
        let mut acc = 0.0f32;

        for (r, &coeff) in a.iter().enumerate() {
            acc -= coeff * filt_history[i + (r * cols)];
        }

        for (r, &coeff) in b.iter().enumerate() {
            acc += coeff * history[i + (r * cols)];
        }

        output[i] = acc;
    }
}

/// Complex variant of [`apply_filter`]; the coefficients stay real.
pub fn apply_filter_complex(
    a: &[f32],
    filt_history: &[Complex<f32>],
    b: &[f32],
    history: &[Complex<f32>],
    output: &mut [Complex<f32>],
) {
    let cols = output.len();

    for i in 0..cols {
        let mut acc = Complex::new(0.0f32, 0.0);

        for (r, &coeff) in a.iter().enumerate() {
            acc -= filt_history[i + (r * cols)] * coeff;
        }

        for (r, &coeff) in b.iter().enumerate() {
            acc += history[i + (r * cols)] * coeff;
        }

        output[i] = acc;
    }
}
