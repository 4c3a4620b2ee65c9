//! Raw IQ frame conditioning.
//!
//! A [`Frame`] is one `sweeps_per_frame x num_points` capture of 16-bit IQ
//! samples, read back from the sensor once per measure/read cycle and
//! overwritten by the next one. The helpers here reduce and repair frames
//! before spectral processing.

use alloc::vec;
use alloc::vec::Vec;

use num::complex::Complex;

use crate::algorithm::Axis;

/// Outliers are flagged beyond this multiple of the mean absolute deviation.
const DOUBLE_BUFFERING_MEAN_ABS_DEV_OUTLIER_TH: i64 = 5;

/// Sweep artifact correction needs this many sweeps for a reliable
/// deviation estimate.
const DOUBLE_BUFFERING_MIN_SWEEPS: usize = 32;

/// One radar frame of 16-bit IQ samples, stored row major with one sweep per
/// row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    sweeps_per_frame: usize,
    num_points: usize,
    data: Vec<Complex<i16>>,
}

impl Frame {
    /// Creates a zeroed frame.
    pub fn new(sweeps_per_frame: usize, num_points: usize) -> Self {
        Self {
            sweeps_per_frame,
            num_points,
            data: vec![Complex::new(0, 0); sweeps_per_frame * num_points],
        }
    }

    /// Wraps an existing sample buffer; `data.len()` must be a multiple of
    /// `num_points`.
    pub fn from_data(data: Vec<Complex<i16>>, num_points: usize) -> Self {
        debug_assert!(num_points > 0 && data.len() % num_points == 0);
        Self {
            sweeps_per_frame: data.len() / num_points,
            num_points,
            data,
        }
    }

    /// Number of sweeps in the frame.
    pub fn sweeps_per_frame(&self) -> usize {
        self.sweeps_per_frame
    }

    /// Number of distance points per sweep.
    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Sample at (`sweep`, `point`).
    pub fn get(&self, sweep: usize, point: usize) -> Complex<i16> {
        self.data[(sweep * self.num_points) + point]
    }

    /// Overwrites the sample at (`sweep`, `point`).
    pub fn set(&mut self, sweep: usize, point: usize, sample: Complex<i16>) {
        self.data[(sweep * self.num_points) + point] = sample;
    }

    /// One sweep as a slice of points.
    pub fn sweep(&self, sweep: usize) -> &[Complex<i16>] {
        &self.data[sweep * self.num_points..(sweep + 1) * self.num_points]
    }

    /// All samples, sweep major.
    pub fn as_slice(&self) -> &[Complex<i16>] {
        &self.data
    }

    /// All samples, mutable.
    pub fn as_mut_slice(&mut self) -> &mut [Complex<i16>] {
        &mut self.data
    }
}

/// Averages the sweeps of a frame point by point over
/// `start_point..end_point`, producing one complex value per point in
/// `sweep_out`.
pub fn mean_sweep(
    frame: &Frame,
    start_point: usize,
    end_point: usize,
    sweep_out: &mut [Complex<f32>],
) {
    let num_points = frame.num_points();
    let sweeps_per_frame = frame.sweeps_per_frame();
    let data = frame.as_slice();

    for point in start_point..end_point {
        let mut re = 0.0f32;
        let mut im = 0.0f32;

        for sweep in 0..sweeps_per_frame {
            let sample = data[point + (sweep * num_points)];
            re += sample.re as f32;
            im += sample.im as f32;
        }

        re /= sweeps_per_frame as f32;
        im /= sweeps_per_frame as f32;

        sweep_out[point - start_point] = Complex::new(re, im);
    }
}

fn mean_complex_strided(data: &[Complex<i16>], count: usize, stride: usize) -> Complex<f32> {
    let mut re = 0.0f32;
    let mut im = 0.0f32;

    for i in 0..count {
        re += data[i * stride].re as f32;
        im += data[i * stride].im as f32;
    }

    Complex::new(re / count as f32, im / count as f32)
}

/// Mean of a slice of 16-bit IQ samples, widened to float.
pub fn mean_complex(data: &[Complex<i16>]) -> Complex<f32> {
    mean_complex_strided(data, data.len(), 1)
}

/// Mean along `axis` of a row-major 16-bit IQ matrix with `cols` columns.
///
/// [`Axis::Col`] produces one mean per column, [`Axis::Row`] one per row.
pub fn mean_matrix_complex(
    matrix: &[Complex<i16>],
    cols: usize,
    out: &mut [Complex<f32>],
    axis: Axis,
) {
    let rows = matrix.len() / cols;

    match axis {
        Axis::Row => {
            for i in 0..rows {
                out[i] = mean_complex(&matrix[i * cols..(i + 1) * cols]);
            }
        }
        Axis::Col => {
            for i in 0..cols {
                out[i] = mean_complex_strided(&matrix[i..], rows, cols);
            }
        }
    }
}

/// Conjugates every element in place.
pub fn conj_in_place(data: &mut [Complex<f32>]) {
    for value in data.iter_mut() {
        *value = value.conj();
    }
}

/// Scales every element to unit magnitude in place.
pub fn normalize_in_place(data: &mut [Complex<f32>]) {
    for value in data.iter_mut() {
        *value = *value / value.norm();
    }
}

/// Replaces the sample at (`sweep`, `point`) with the median of the four
/// sweeps starting at `median_start_sweep`: the highest- and
/// lowest-magnitude samples are discarded and the remaining two are summed
/// and halved.
fn double_buffering_median_filter(
    frame: &mut Frame,
    sweep: usize,
    point: usize,
    median_start_sweep: usize,
) {
    let mut point_re = [0i64; 4];
    let mut point_im = [0i64; 4];
    let mut point_abs = [0i64; 4];

    for idx in 0..4 {
        let sample = frame.get(median_start_sweep + idx, point);
        point_re[idx] = sample.re as i64;
        point_im[idx] = sample.im as i64;
        point_abs[idx] = (point_re[idx] * point_re[idx]) + (point_im[idx] * point_im[idx]);
    }

    let mut high_index = 0usize;
    let mut low_index = 0usize;
    let mut high_val = i64::MIN;
    let mut low_val = i64::MAX;

    for idx in 0..4 {
        if point_abs[idx] > high_val {
            high_val = point_abs[idx];
            high_index = idx;
        }

        if point_abs[idx] < low_val {
            low_val = point_abs[idx];
            low_index = idx;
        }
    }

    point_re[high_index] = 0;
    point_im[high_index] = 0;
    point_re[low_index] = 0;
    point_im[low_index] = 0;

    let median_re: i64 = point_re.iter().sum();
    let median_im: i64 = point_im.iter().sum();

    frame.set(
        sweep,
        point,
        Complex::new((median_re / 2) as i16, (median_im / 2) as i16),
    );
}

/// Replaces the sample at (`sweep`, `point`) with 2/3 of the previous sweep
/// plus 1/3 of the sweep two positions ahead (clamped to the last sweep).
fn double_buffering_interpolate(frame: &mut Frame, sweep: usize, point: usize) {
    let prev = frame.get(sweep - 1, point);
    let mut re = prev.re as i32 * 2;
    let mut im = prev.im as i32 * 2;

    let ahead_sweep = (sweep + 2).min(frame.sweeps_per_frame() - 1);
    let ahead = frame.get(ahead_sweep, point);

    re += ahead.re as i32;
    im += ahead.im as i32;

    frame.set(sweep, point, Complex::new((re / 3) as i16, (im / 3) as i16));
}

/// Repairs the one or two anomalous consecutive sweeps that double-buffered
/// acquisition can produce.
///
/// Per point, sweeps whose absolute second-order discrete difference exceeds
/// five times the mean absolute deviation over the frame are flagged. The
/// sweep next to either frame edge is rebuilt with a median of the four
/// nearest sweeps; interior sweeps are interpolated from their neighbors.
/// Frames with fewer than 32 sweeps are left untouched since the deviation
/// statistic is unreliable there.
///
/// `work_buffer` is scratch for the per-sweep deviations and must hold
/// `sweeps_per_frame - 2` elements.
pub fn double_buffering_frame_filter(frame: &mut Frame, work_buffer: &mut [i64]) {
    let sweeps_per_frame = frame.sweeps_per_frame();
    let num_points = frame.num_points();

    if sweeps_per_frame < DOUBLE_BUFFERING_MIN_SWEEPS {
        return;
    }

    for point in 0..num_points {
        let mut abs_mad_sum = 0i64;

        for sweep in 0..sweeps_per_frame - 2 {
            let mut first_diff_re = [0i64; 2];
            let mut first_diff_im = [0i64; 2];

            for idx in 0..2 {
                let next = frame.get(sweep + idx + 1, point);
                let curr = frame.get(sweep + idx, point);
                first_diff_re[idx] = next.re as i64 - curr.re as i64;
                first_diff_im[idx] = next.im as i64 - curr.im as i64;
            }

            let second_diff_re = first_diff_re[1] - first_diff_re[0];
            let second_diff_im = first_diff_im[1] - first_diff_im[0];

            // Magnitude estimated as |re| + |im|
            work_buffer[sweep] = second_diff_re.abs() + second_diff_im.abs();

            abs_mad_sum += work_buffer[sweep];
        }

        let diff_mad = abs_mad_sum / (sweeps_per_frame as i64 - 2);
        let threshold = DOUBLE_BUFFERING_MEAN_ABS_DEV_OUTLIER_TH * diff_mad;

        for sweep in 1..sweeps_per_frame - 1 {
            if work_buffer[sweep - 1] <= threshold {
                continue;
            }

            if sweep == 1 {
                double_buffering_median_filter(frame, 1, point, 0);
            } else if sweep == sweeps_per_frame - 2 {
                double_buffering_median_filter(
                    frame,
                    sweeps_per_frame - 2,
                    point,
                    sweeps_per_frame - 5,
                );
            } else {
                double_buffering_interpolate(frame, sweep, point);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn constant_frame(sweeps: usize, points: usize, value: Complex<i16>) -> Frame {
        Frame::from_data(vec![value; sweeps * points], points)
    }

    #[test]
    fn mean_sweep_averages_per_point() {
        let frame = Frame::from_data(
            vec![
                Complex::new(1, 0),
                Complex::new(2, 0),
                Complex::new(3, 0),
                Complex::new(3, 0),
                Complex::new(4, 0),
                Complex::new(5, 0),
            ],
            3,
        );

        let mut sweep = [Complex::new(0.0f32, 0.0); 3];
        mean_sweep(&frame, 0, 3, &mut sweep);

        assert_relative_eq!(sweep[0].re, 2.0);
        assert_relative_eq!(sweep[1].re, 3.0);
        assert_relative_eq!(sweep[2].re, 4.0);
        assert_relative_eq!(sweep[0].im, 0.0);
    }

    #[test]
    fn mean_sweep_respects_sub_range() {
        let frame = Frame::from_data(
            vec![
                Complex::new(10, 2),
                Complex::new(20, 4),
                Complex::new(30, 6),
                Complex::new(40, 8),
            ],
            2,
        );

        let mut sweep = [Complex::new(0.0f32, 0.0); 1];
        mean_sweep(&frame, 1, 2, &mut sweep);

        assert_relative_eq!(sweep[0].re, 30.0);
        assert_relative_eq!(sweep[0].im, 6.0);
    }

    #[test]
    fn matrix_mean_per_column() {
        let matrix = [
            Complex::new(1i16, 1),
            Complex::new(10, 0),
            Complex::new(3, 3),
            Complex::new(20, 0),
        ];
        let mut out = [Complex::new(0.0f32, 0.0); 2];

        mean_matrix_complex(&matrix, 2, &mut out, Axis::Col);

        assert_relative_eq!(out[0].re, 2.0);
        assert_relative_eq!(out[0].im, 2.0);
        assert_relative_eq!(out[1].re, 15.0);
    }

    #[test]
    fn normalize_produces_unit_magnitude() {
        let mut data = [Complex::new(3.0f32, 4.0), Complex::new(0.0, -2.0)];
        normalize_in_place(&mut data);

        assert_relative_eq!(data[0].norm(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(data[0].re, 0.6, epsilon = 1e-6);
        assert_relative_eq!(data[1].im, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn filter_is_a_no_op_below_32_sweeps() {
        let mut frame = constant_frame(31, 2, Complex::new(5, -3));
        frame.set(4, 0, Complex::new(30000, 0));
        let reference = frame.clone();

        let mut work = [0i64; 29];
        double_buffering_frame_filter(&mut frame, &mut work);

        assert_eq!(frame, reference);
    }

    #[test]
    fn filter_leaves_clean_frames_untouched() {
        let mut frame = constant_frame(32, 3, Complex::new(100, 50));
        let reference = frame.clone();

        let mut work = [0i64; 30];
        double_buffering_frame_filter(&mut frame, &mut work);

        assert_eq!(frame, reference);
    }

    #[test]
    fn interior_outlier_is_interpolated_away() {
        let mut frame = constant_frame(32, 1, Complex::new(100, 0));
        frame.set(5, 0, Complex::new(1000, 0));

        let mut work = [0i64; 30];
        double_buffering_frame_filter(&mut frame, &mut work);

        for sweep in 0..32 {
            assert_eq!(frame.get(sweep, 0), Complex::new(100, 0), "sweep {}", sweep);
        }
    }

    #[test]
    fn second_sweep_outlier_uses_median_of_four() {
        let mut frame = constant_frame(32, 1, Complex::new(100, 0));
        frame.set(1, 0, Complex::new(1000, 0));

        let mut work = [0i64; 30];
        double_buffering_frame_filter(&mut frame, &mut work);

        assert_eq!(frame.get(1, 0), Complex::new(100, 0));
    }

    #[test]
    fn frame_edges_are_never_rewritten() {
        let mut frame = constant_frame(32, 1, Complex::new(100, 0));
        // Outliers at the very first and last sweep influence the deviation
        // statistic but must not be corrected themselves.
        frame.set(0, 0, Complex::new(2000, 0));
        frame.set(31, 0, Complex::new(2000, 0));

        let mut work = [0i64; 30];
        double_buffering_frame_filter(&mut frame, &mut work);

        assert_eq!(frame.get(0, 0), Complex::new(2000, 0));
        assert_eq!(frame.get(31, 0), Complex::new(2000, 0));
    }
}
