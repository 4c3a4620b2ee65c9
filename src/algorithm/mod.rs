//! Signal processing building blocks shared by the radar applications.
//!
//! The kernels in this module tree are pure functions over slices: FFT/RFFT
//! ([`fft`]), IIR filter design and application ([`filter`]), spectral
//! estimation ([`spectrum`]), CFAR thresholding and peak handling ([`peaks`])
//! and raw frame conditioning ([`frame`]). Everything is single-precision
//! and deterministic given the same inputs.

pub mod fft;
pub mod filter;
pub mod frame;
pub mod peaks;
pub mod spectrum;

use core::f32::consts::PI;

use num::complex::Complex;

/// Axis selector for the matrix variants of the kernels.
///
/// Matrices are stored row major. [`Axis::Row`] applies the operation to each
/// row, [`Axis::Col`] to each column (stride = number of columns).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    /// Operate along each row
    Row,
    /// Operate along each column
    Col,
}

/// Rolls the array one element towards the front and pushes `element` last.
pub fn roll_and_push(data: &mut [f32], element: f32) {
    let len = data.len();
    data.copy_within(1.., 0);
    data[len - 1] = element;
}

/// Rolls the rows of a row-major `data` matrix with `cols` columns and pushes
/// `column` as the new first row (`pos_shift == true`, like `np.roll` with
/// shift 1) or last row (`pos_shift == false`, shift -1).
pub fn roll_and_push_matrix(data: &mut [f32], cols: usize, column: &[f32], pos_shift: bool) {
    let rows = data.len() / cols;

    if pos_shift {
        data.copy_within(..(rows - 1) * cols, cols);
        data[..cols].copy_from_slice(column);
    } else {
        data.copy_within(cols.., 0);
        data[(rows - 1) * cols..].copy_from_slice(column);
    }
}

/// Complex variant of [`roll_and_push_matrix`].
pub fn roll_and_push_matrix_complex(
    data: &mut [Complex<f32>],
    cols: usize,
    column: &[Complex<f32>],
    pos_shift: bool,
) {
    let rows = data.len() / cols;

    if pos_shift {
        data.copy_within(..(rows - 1) * cols, cols);
        data[..cols].copy_from_slice(column);
    } else {
        data.copy_within(cols.., 0);
        data[(rows - 1) * cols..].copy_from_slice(column);
    }
}

/// Rolls an i16 IQ matrix row by row, pushing every row of `matrix` in turn.
///
/// Used to feed a whole frame of sweeps into a longer history matrix.
pub fn roll_and_push_rows_i16(
    data: &mut [Complex<i16>],
    cols: usize,
    matrix: &[Complex<i16>],
    pos_shift: bool,
) {
    let rows = data.len() / cols;

    for new_row in matrix.chunks_exact(cols) {
        if pos_shift {
            data.copy_within(..(rows - 1) * cols, cols);
            data[..cols].copy_from_slice(new_row);
        } else {
            data.copy_within(cols.., 0);
            data[(rows - 1) * cols..].copy_from_slice(new_row);
        }
    }
}

/// Unwraps a phase signal in place by bounding the difference between
/// consecutive elements to ±π.
pub fn unwrap_phase(data: &mut [f32]) {
    for i in 1..data.len() {
        let mut diff = data[i] - data[i - 1];

        while diff > PI || diff < -PI {
            if diff > PI {
                data[i] -= 2.0 * PI;
            } else {
                data[i] += 2.0 * PI;
            }

            diff = data[i] - data[i - 1];
        }
    }
}

/// Index of the largest element.
pub fn argmax(data: &[f32]) -> usize {
    let mut idx = 0;
    let mut max = data[0];

    for (i, &value) in data.iter().enumerate().skip(1) {
        if value > max {
            idx = i;
            max = value;
        }
    }

    idx
}

/// Interpolates a peak by fitting a parabola through three points.
///
/// `y` holds the amplitudes and `x` the positions of the samples around the
/// peak. Returns the position of the parabola maximum.
pub fn interpolate_peaks(y: &[f32; 3], x: &[f32; 3]) -> f32 {
    let a = ((x[0] * (y[2] - y[1])) + (x[1] * (y[0] - y[2])) + (x[2] * (y[1] - y[0])))
        / ((x[0] - x[1]) * (x[0] - x[2]) * (x[1] - x[2]));
    let b = ((y[1] - y[0]) / (x[1] - x[0])) - (a * (x[0] + x[1]));

    -b / (2.0 * a)
}

/// Interpolates a peak on an equidistant axis.
///
/// Fits a second degree polynomial to the three amplitudes around
/// `y[peak_idx]`, which is expected to hold the maximum, and returns the
/// x-position of the polynomial maximum. `peak_idx` must not be the first or
/// last element.
pub fn interpolate_peaks_equidistant(y: &[f32], x_start: f32, x_delta: f32, peak_idx: usize) -> f32 {
    let peak_offset = (y[peak_idx - 1] - y[peak_idx + 1])
        / ((2.0 * y[peak_idx - 1]) - (4.0 * y[peak_idx]) + (2.0 * y[peak_idx + 1]));

    x_start + ((peak_idx as f32 + peak_offset) * x_delta)
}

/// Complex division with double-precision intermediates.
///
/// The straightforward single-precision quotient loses enough accuracy in the
/// filter design paths to move pole locations, so the products are formed in
/// f64.
pub fn complex_div(num: Complex<f32>, denom: Complex<f32>) -> Complex<f32> {
    let a = denom.re as f64;
    let b = denom.im as f64;
    let c = num.re as f64;
    let d = num.im as f64;

    let re = (((c * a) + (b * d)) / ((a * a) + (b * b))) as f32;
    let im = (((a * d) - (c * b)) / ((a * a) + (b * b))) as f32;

    Complex::new(re, im)
}

/// Exponential smoothing coefficient for a sampling rate `fs` and time
/// constant `tc`. Returns NaN when either is zero.
pub fn exp_smoothing_coefficient(fs: f32, tc: f32) -> f32 {
    if fs != 0.0 && tc != 0.0 {
        let dt = 1.0 / fs;
        libm::expf(-dt / tc)
    } else {
        f32::NAN
    }
}

/// Dynamic smoothing factor ramping up to `static_sf` over the first updates.
///
/// `update_count` starts at 0 for the first update and increases by one for
/// each update thereafter.
pub fn dynamic_smoothing_factor(static_sf: f32, update_count: u32) -> f32 {
    static_sf.min(1.0 - 1.0 / (1.0 + update_count as f32))
}

/// Converts a point index of a measurement to a distance in meters.
pub fn distance_m(step_length: usize, start_point: usize, base_step_length_m: f32, idx: usize) -> f32 {
    let steps = (idx * step_length) + start_point;

    steps as f32 * base_step_length_m
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn roll_and_push_shifts_left() {
        let mut data = [1.0, 2.0, 3.0, 4.0];
        roll_and_push(&mut data, 5.0);
        assert_eq!(data, [2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn roll_matrix_pos_shift_pushes_first_row() {
        let mut data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        roll_and_push_matrix(&mut data, 2, &[7.0, 8.0], true);
        assert_eq!(data, [7.0, 8.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn roll_matrix_neg_shift_pushes_last_row() {
        let mut data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        roll_and_push_matrix(&mut data, 2, &[7.0, 8.0], false);
        assert_eq!(data, [3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn roll_rows_pushes_whole_frame() {
        let mut data: [Complex<i16>; 6] = [
            Complex::new(1, 0),
            Complex::new(2, 0),
            Complex::new(3, 0),
            Complex::new(4, 0),
            Complex::new(5, 0),
            Complex::new(6, 0),
        ];
        let matrix = [
            Complex::new(7, 0),
            Complex::new(8, 0),
            Complex::new(9, 0),
            Complex::new(10, 0),
        ];
        roll_and_push_rows_i16(&mut data, 2, &matrix, false);
        assert_eq!(data[0], Complex::new(5, 0));
        assert_eq!(data[2], Complex::new(7, 0));
        assert_eq!(data[4], Complex::new(9, 0));
    }

    #[test]
    fn unwrap_removes_jumps() {
        let mut data = [0.0, 0.1, 0.2 - 2.0 * PI, 0.3 - 2.0 * PI];
        unwrap_phase(&mut data);
        assert_relative_eq!(data[2], 0.2, epsilon = 1e-6);
        assert_relative_eq!(data[3], 0.3, epsilon = 1e-6);
    }

    #[test]
    fn argmax_finds_first_max() {
        assert_eq!(argmax(&[1.0, 5.0, 3.0, 5.0]), 1);
    }

    #[test]
    fn equidistant_interpolation_is_exact_on_a_parabola() {
        // y = 4 - (x - 1.25)^2 sampled at x = 0, 1, 2
        let y = [
            4.0 - (0.0f32 - 1.25).powi(2),
            4.0 - (1.0f32 - 1.25).powi(2),
            4.0 - (2.0f32 - 1.25).powi(2),
        ];
        let peak = interpolate_peaks_equidistant(&y, 0.0, 1.0, 1);
        assert_relative_eq!(peak, 1.25, epsilon = 1e-5);
    }

    #[test]
    fn complex_div_matches_reference() {
        let q = complex_div(Complex::new(1.0, 2.0), Complex::new(3.0, -1.0));
        // (1+2i)/(3-i) = (1+7i)/10
        assert_relative_eq!(q.re, 0.1, epsilon = 1e-6);
        assert_relative_eq!(q.im, 0.7, epsilon = 1e-6);
    }

    #[test]
    fn smoothing_coefficient_is_exp_of_ratio() {
        let sf = exp_smoothing_coefficient(10.0, 2.0);
        assert_relative_eq!(sf, (-0.05f32).exp(), epsilon = 1e-6);
        assert!(exp_smoothing_coefficient(0.0, 2.0).is_nan());
    }

    #[test]
    fn dynamic_smoothing_ramps_up() {
        assert_relative_eq!(dynamic_smoothing_factor(0.9, 0), 0.0);
        assert_relative_eq!(dynamic_smoothing_factor(0.9, 1), 0.5);
        assert_relative_eq!(dynamic_smoothing_factor(0.9, 1000), 0.9);
    }

    #[test]
    fn distance_conversion() {
        assert_relative_eq!(distance_m(12, 80, 0.0025, 4), (4 * 12 + 80) as f32 * 0.0025);
    }
}
