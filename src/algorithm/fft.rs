//! Radix-2 FFT and real-input FFT.
//!
//! The transforms operate on power-of-two lengths given as a shift
//! (`full_length = 1 << length_shift`). Inputs shorter than the full length
//! are zero padded. No normalization is applied; the Welch estimator scales
//! the accumulated spectrum instead.
//!
//! The matrix variants run the scalar routine along rows or columns of a
//! row-major buffer through a stride parameter, so both orientations share
//! one implementation.

use num::complex::Complex;

use crate::algorithm::Axis;

/// Reads two consecutive real samples as one complex value, zero padded
/// beyond `data_length`.
fn padded_real_pair(data: &[f32], data_length: usize, index: usize, stride: usize) -> Complex<f32> {
    let mut re = 0.0;
    let mut im = 0.0;
    let i = index * 2;

    if i < data_length {
        re = data[i * stride];
    }

    if i + 1 < data_length {
        im = data[(i + 1) * stride];
    }

    Complex::new(re, im)
}

/// Reads one complex sample, zero padded beyond `data_length`.
fn padded_complex(
    data: &[Complex<f32>],
    data_length: usize,
    index: usize,
    stride: usize,
) -> Complex<f32> {
    if index < data_length {
        data[index * stride]
    } else {
        Complex::new(0.0, 0.0)
    }
}

/// Writes the input into `output` in bit-reversed order, then runs the
/// butterfly stages. `load` abstracts over real-pair and complex loading.
fn bit_reverse_load<F>(full_length: usize, output: &mut [Complex<f32>], stride: usize, load: F)
where
    F: Fn(usize) -> Complex<f32>,
{
    let mut reverse_i = 0usize;

    for i in 0..full_length {
        if i < reverse_i {
            let tmp = load(i);
            output[i * stride] = load(reverse_i);
            output[reverse_i * stride] = tmp;
        } else if i == reverse_i {
            output[i * stride] = load(i);
        }

        let mut bit = full_length >> 1;
        while (bit & reverse_i) != 0 {
            reverse_i &= !bit;
            bit >>= 1;
        }
        reverse_i |= bit;
    }
}

/// Iterative butterfly stages over bit-reversed data, starting from
/// 4-element base transformations.
fn fft_stages(length_shift: usize, output: &mut [Complex<f32>], stride: usize) {
    let full_length = 1usize << length_shift;

    // 4-element base transformations
    let mut i = 0;
    while i < full_length {
        let s0 = output[i * stride] + output[(i + 1) * stride];
        let d0 = output[i * stride] - output[(i + 1) * stride];
        let s1 = output[(i + 2) * stride] + output[(i + 3) * stride];
        let mut d1 = output[(i + 2) * stride] - output[(i + 3) * stride];

        d1 = Complex::new(d1.im, -d1.re); // d1 = -i*d1

        output[i * stride] = s0 + s1;
        output[(i + 2) * stride] = s0 - s1;
        output[(i + 1) * stride] = d0 + d1;
        output[(i + 3) * stride] = d0 - d1;

        i += 4;
    }

    let mut block_length = 4usize;
    let mut phase_incr = Complex::new(0.0f32, -1.0);

    while block_length < full_length {
        // Half the phase angle of the unit vector for the doubled block
        let bisect = phase_incr + Complex::new(1.0, 0.0);
        phase_incr = bisect / bisect.norm();

        let mut phase = Complex::new(1.0f32, 0.0);
        for m in 0..block_length {
            let mut i = m;
            while i < full_length {
                let delta = output[(i + block_length) * stride] * phase;

                output[(i + block_length) * stride] = output[i * stride] - delta;
                output[i * stride] += delta;

                i += block_length << 1;
            }

            // This phase increment is the leading error source for large
            // transforms
            phase *= phase_incr;
        }

        block_length <<= 1;
    }
}

fn fft_strided(
    data: &[Complex<f32>],
    data_length: usize,
    length_shift: usize,
    output: &mut [Complex<f32>],
    stride: usize,
) {
    match length_shift {
        0 => {
            output[0] = padded_complex(data, data_length, 0, stride);
        }
        1 => {
            let a = padded_complex(data, data_length, 0, stride);
            let b = padded_complex(data, data_length, 1, stride);
            output[0] = a + b;
            output[stride] = a - b;
        }
        _ => {
            let full_length = 1usize << length_shift;
            bit_reverse_load(full_length, output, stride, |i| {
                padded_complex(data, data_length, i, stride)
            });
            fft_stages(length_shift, output, stride);
        }
    }
}

/// Half-length complex FFT over real input loaded as (even, odd) pairs.
fn rfft_half_strided(
    data: &[f32],
    data_length: usize,
    length_shift: usize,
    output: &mut [Complex<f32>],
    stride: usize,
) {
    match length_shift {
        0 => {
            output[0] = padded_real_pair(data, data_length, 0, stride);
        }
        1 => {
            let a = padded_real_pair(data, data_length, 0, stride);
            let b = padded_real_pair(data, data_length, 1, stride);
            output[0] = a + b;
            output[stride] = a - b;
        }
        _ => {
            let full_length = 1usize << length_shift;
            bit_reverse_load(full_length, output, stride, |i| {
                padded_real_pair(data, data_length, i, stride)
            });
            fft_stages(length_shift, output, stride);
        }
    }
}

/// Untangles the half-length transform of packed real input into the
/// spectrum of the full-length real sequence, using conjugate symmetry.
fn rfft_symmetry_conversion(output: &mut [Complex<f32>], length_shift: usize, stride: usize) {
    let full_length = 1usize << length_shift;

    output[0] = Complex::new(1.0, 1.0) * output[0].conj();

    if length_shift > 0 {
        let mut phase_incr = Complex::new(0.0f32, 1.0);
        let mut z1_factor = phase_incr * 0.5;

        for _ in 1..length_shift {
            let bisect = phase_incr + Complex::new(1.0, 0.0);
            phase_incr = bisect / bisect.norm();
        }

        let mid = full_length / 2;
        for i in 1..mid {
            let mut z0 = output[i * stride];
            let mut z1 = output[(full_length - i) * stride];

            let t = z0 + z1.conj();
            z1 = z0.conj() - z1;
            z0 = t;

            z0 *= 0.5;
            z1_factor *= phase_incr;
            z1 *= z1_factor;

            let t = z0 + z1.conj();
            z1 = z0.conj() - z1;
            z0 = t;

            output[i * stride] = z0;
            output[(full_length - i) * stride] = z1;
        }

        output[mid * stride] = output[mid * stride].conj();
    }
}

fn rfft_strided(
    data: &[f32],
    data_length: usize,
    length_shift: usize,
    output: &mut [Complex<f32>],
    stride: usize,
) {
    debug_assert!(length_shift >= 1);

    rfft_half_strided(data, data_length, length_shift - 1, output, stride);
    rfft_symmetry_conversion(output, length_shift - 1, stride);

    let mid = 1usize << (length_shift - 1);
    output[mid * stride] = Complex::new(output[0].im, 0.0);
    output[0] = Complex::new(output[0].re, 0.0);
}

/// Computes the FFT of `data`, zero padded to `1 << length_shift` points.
///
/// `output` must hold at least `1 << length_shift` elements.
pub fn fft(data: &[Complex<f32>], length_shift: usize, output: &mut [Complex<f32>]) {
    debug_assert!(data.len() <= 1 << length_shift);
    fft_strided(data, data.len(), length_shift, output, 1);
}

/// Computes the FFT of real `data`, zero padded to `1 << length_shift`
/// points.
///
/// Only the non-redundant half of the spectrum is produced: `output` must
/// hold `(1 << length_shift) / 2 + 1` elements. `length_shift` must be at
/// least 1.
pub fn rfft(data: &[f32], length_shift: usize, output: &mut [Complex<f32>]) {
    debug_assert!(data.len() <= 1 << length_shift);
    rfft_strided(data, data.len(), length_shift, output, 1);
}

/// Applies [`fft`] along `axis` of a row-major matrix with `cols` columns.
///
/// With [`Axis::Row`] the output has `1 << length_shift` columns, with
/// [`Axis::Col`] the full-length transforms are stored column by column.
pub fn fft_matrix(
    data: &[Complex<f32>],
    cols: usize,
    length_shift: usize,
    output: &mut [Complex<f32>],
    axis: Axis,
) {
    let rows = data.len() / cols;
    let full_cols = 1usize << length_shift;

    match axis {
        Axis::Row => {
            for i in 0..rows {
                fft_strided(
                    &data[i * cols..(i + 1) * cols],
                    cols,
                    length_shift,
                    &mut output[i * full_cols..],
                    1,
                );
            }
        }
        Axis::Col => {
            for i in 0..cols {
                fft_strided(&data[i..], rows, length_shift, &mut output[i..], cols);
            }
        }
    }
}

/// Applies [`rfft`] along `axis` of a row-major matrix with `cols` columns.
pub fn rfft_matrix(
    data: &[f32],
    cols: usize,
    length_shift: usize,
    output: &mut [Complex<f32>],
    axis: Axis,
) {
    let rows = data.len() / cols;

    match axis {
        Axis::Row => {
            let output_cols = (1usize << length_shift) / 2 + 1;
            for i in 0..rows {
                rfft_strided(
                    &data[i * cols..(i + 1) * cols],
                    cols,
                    length_shift,
                    &mut output[i * output_cols..],
                    1,
                );
            }
        }
        Axis::Col => {
            for i in 0..cols {
                rfft_strided(&data[i..], rows, length_shift, &mut output[i..], cols);
            }
        }
    }
}

fn fftshift_strided(data: &mut [f32], count: usize, stride: usize) {
    let half = (count + 1) / 2;

    for _ in 0..half {
        let x = data[0];

        for j in 0..count - 1 {
            data[j * stride] = data[(j + 1) * stride];
        }

        data[(count - 1) * stride] = x;
    }
}

/// Shifts the zero-frequency bin to the center of the spectrum.
pub fn fftshift(data: &mut [f32]) {
    let count = data.len();
    fftshift_strided(data, count, 1);
}

/// Applies [`fftshift`] to every column of a row-major matrix.
pub fn fftshift_matrix(data: &mut [f32], cols: usize) {
    let rows = data.len() / cols;

    for i in 0..cols {
        fftshift_strided(&mut data[i..], rows, cols);
    }
}

/// Frequency resolution of an `n`-point transform with sample spacing `d`.
/// Returns NaN for degenerate inputs.
pub fn fftfreq_delta(n: usize, d: f32) -> f32 {
    if n > 0 && d > 0.0 {
        1.0 / (n as f32 * d)
    } else {
        f32::NAN
    }
}

/// Sample frequencies of an `n`-point real FFT. `freqs` must hold
/// `n / 2 + 1` elements.
pub fn rfftfreq(n: usize, d: f32, freqs: &mut [f32]) {
    let n_freqs = n / 2 + 1;
    let df = fftfreq_delta(n, d);

    for (i, freq) in freqs.iter_mut().take(n_freqs).enumerate() {
        *freq = i as f32 * df;
    }
}

/// Sample frequencies of an `n`-point FFT, positive frequencies first and
/// negative frequencies in the upper half. `freqs` must hold `n` elements.
pub fn fftfreq(n: usize, d: f32, freqs: &mut [f32]) {
    let df = fftfreq_delta(n, d);
    let mid = n / 2;

    for (i, freq) in freqs.iter_mut().take(mid).enumerate() {
        *freq = i as f32 * df;
    }

    for i in mid..n {
        freqs[i] = (i as i32 - n as i32) as f32 * df;
    }
}
