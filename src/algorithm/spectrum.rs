//! Window functions and Welch power spectral density estimation.

use core::f32::consts::PI;

use num::complex::Complex;

use crate::algorithm::fft;

/// Fills `window` with a Hamming window of its length.
pub fn hamming(window: &mut [f32]) {
    let a = 0.54f32;
    let b = 0.46f32;
    let factor = (2.0 * PI) / (window.len() as f32 - 1.0);

    for (i, w) in window.iter_mut().enumerate() {
        *w = a - (b * libm::cosf(i as f32 * factor));
    }
}

/// Fills `window` with a periodic Hann window of its length.
pub fn hann(window: &mut [f32]) {
    let a = 0.5f32;
    let factor = (2.0 * PI) / window.len() as f32;

    for (i, w) in window.iter_mut().enumerate() {
        *w = a - (a * libm::cosf(i as f32 * factor));
    }
}

/// Welch PSD over a strided signal; `psd` is written with the same stride.
fn welch_strided(
    data: &[Complex<f32>],
    data_length: usize,
    segment_length: usize,
    data_buffer: &mut [Complex<f32>],
    fft_out: &mut [Complex<f32>],
    psd: &mut [f32],
    window: &[f32],
    length_shift: usize,
    fs: f32,
    stride: usize,
) {
    let num_segments = data_length / segment_length;
    let mut scale = 0.0f32;

    for i in 0..segment_length {
        psd[i * stride] = 0.0;
    }

    for seg in 0..num_segments {
        scale = 0.0;

        let mut mean = Complex::new(0.0f32, 0.0);
        for j in 0..segment_length {
            mean += data[(seg * segment_length * stride) + (j * stride)];
        }
        mean /= segment_length as f32;

        for j in 0..segment_length {
            let sample = data[(seg * segment_length * stride) + (j * stride)] - mean;
            data_buffer[j] = sample * window[j];

            scale += window[j] * window[j];
        }

        fft::fft(&data_buffer[..segment_length], length_shift, fft_out);

        for j in 0..segment_length {
            let mag = fft_out[j].norm();
            psd[j * stride] += mag * mag;
        }
    }

    if scale != 0.0 {
        scale = 1.0 / (scale * fs * num_segments as f32);
    }

    for i in 0..segment_length {
        psd[i * stride] *= scale;
    }
}

/// Estimates the power spectral density of `data` with Welch's method.
///
/// The signal is split into non-overlapping segments of `segment_length`
/// samples. Each segment has its mean removed, is windowed, FFT'd (zero
/// padded to `1 << length_shift`), and the squared magnitudes are
/// accumulated. The result is normalized by the window energy, the sampling
/// frequency `fs` and the segment count. Nothing is carried across calls;
/// `psd` is overwritten.
///
/// `data_buffer` and `fft_out` are caller-provided scratch of at least
/// `segment_length` respectively `1 << length_shift` elements.
#[allow(clippy::too_many_arguments)]
pub fn welch(
    data: &[Complex<f32>],
    segment_length: usize,
    data_buffer: &mut [Complex<f32>],
    fft_out: &mut [Complex<f32>],
    psd: &mut [f32],
    window: &[f32],
    length_shift: usize,
    fs: f32,
) {
    welch_strided(
        data,
        data.len(),
        segment_length,
        data_buffer,
        fft_out,
        psd,
        window,
        length_shift,
        fs,
        1,
    );
}

/// Applies [`welch`] to every column of a row-major matrix with `cols`
/// columns; `psds` has one PSD column per input column.
#[allow(clippy::too_many_arguments)]
pub fn welch_matrix(
    data: &[Complex<f32>],
    cols: usize,
    segment_length: usize,
    data_buffer: &mut [Complex<f32>],
    fft_out: &mut [Complex<f32>],
    psds: &mut [f32],
    window: &[f32],
    length_shift: usize,
    fs: f32,
) {
    let rows = data.len() / cols;

    for i in 0..cols {
        welch_strided(
            &data[i..],
            rows,
            segment_length,
            data_buffer,
            fft_out,
            &mut psds[i..],
            window,
            length_shift,
            fs,
            cols,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;
    use approx::assert_relative_eq;

    #[test]
    fn hamming_endpoints_and_symmetry() {
        let mut window = [0.0f32; 16];
        hamming(&mut window);

        assert_relative_eq!(window[0], 0.08, epsilon = 1e-6);
        assert_relative_eq!(window[15], 0.08, epsilon = 1e-6);
        for i in 0..8 {
            assert_relative_eq!(window[i], window[15 - i], epsilon = 1e-6);
        }
    }

    #[test]
    fn hann_starts_at_zero() {
        let mut window = [0.0f32; 8];
        hann(&mut window);

        assert_relative_eq!(window[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(window[4], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn welch_locates_a_tone() {
        // Complex tone at bin 4 of a 16-point segment.
        let fs = 16.0f32;
        let n = 64usize;
        let data: Vec<Complex<f32>> = (0..n)
            .map(|i| Complex::cis(2.0 * PI * 4.0 * i as f32 / 16.0))
            .collect();

        let mut window = [0.0f32; 16];
        hann(&mut window);

        let mut buffer = vec![Complex::new(0.0f32, 0.0); 16];
        let mut fft_out = vec![Complex::new(0.0f32, 0.0); 16];
        let mut psd = vec![0.0f32; 16];

        welch(&data, 16, &mut buffer, &mut fft_out, &mut psd, &window, 4, fs);

        let peak = crate::algorithm::argmax(&psd);
        assert_eq!(peak, 4);
    }

    #[test]
    fn welch_is_stateless_between_calls() {
        let data: Vec<Complex<f32>> = (0..32)
            .map(|i| Complex::new((i as f32 * 0.8).sin(), 0.0))
            .collect();

        let mut window = [0.0f32; 8];
        hann(&mut window);

        let mut buffer = vec![Complex::new(0.0f32, 0.0); 8];
        let mut fft_out = vec![Complex::new(0.0f32, 0.0); 8];
        let mut first = vec![0.0f32; 8];
        let mut second = vec![0.0f32; 8];

        welch(&data, 8, &mut buffer, &mut fft_out, &mut first, &window, 3, 10.0);
        welch(&data, 8, &mut buffer, &mut fft_out, &mut second, &window, 3, 10.0);

        for (a, b) in first.iter().zip(second.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-7);
        }
    }

    #[test]
    fn welch_matrix_matches_scalar_per_column() {
        let col_a: Vec<Complex<f32>> = (0..16)
            .map(|i| Complex::new((i as f32 * 0.5).sin(), (i as f32 * 0.2).cos()))
            .collect();
        let col_b: Vec<Complex<f32>> = (0..16)
            .map(|i| Complex::new((i as f32 * 0.9).cos(), 0.0))
            .collect();

        let mut matrix = vec![Complex::new(0.0f32, 0.0); 32];
        for i in 0..16 {
            matrix[i * 2] = col_a[i];
            matrix[i * 2 + 1] = col_b[i];
        }

        let mut window = [0.0f32; 8];
        hann(&mut window);

        let mut buffer = vec![Complex::new(0.0f32, 0.0); 8];
        let mut fft_out = vec![Complex::new(0.0f32, 0.0); 8];
        let mut psds = vec![0.0f32; 16];
        welch_matrix(&matrix, 2, 8, &mut buffer, &mut fft_out, &mut psds, &window, 3, 10.0);

        let mut expected = vec![0.0f32; 8];
        welch(&col_a, 8, &mut buffer, &mut fft_out, &mut expected, &window, 3, 10.0);

        for i in 0..8 {
            assert_relative_eq!(psds[i * 2], expected[i], epsilon = 1e-6);
        }
    }
}
