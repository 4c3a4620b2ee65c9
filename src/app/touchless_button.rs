//! Touchless button reference application.
//!
//! Detects a hand entering a short range in front of the sensor by
//! comparing each frame against a dynamically maintained background: the
//! phase-aligned amplitude and phase statistics of recent motion-free
//! frames. Frames whose deviation exceeds a sensitivity-derived threshold
//! for enough consecutive frames trigger a detection; the background keeps
//! updating from motion-free frames and is rebuilt outright when it grows
//! stale.

use alloc::vec;
use alloc::vec::Vec;

use num::complex::Complex;

use crate::algorithm::frame::{
    conj_in_place, double_buffering_frame_filter, mean_matrix_complex, normalize_in_place, Frame,
};
use crate::algorithm::peaks::count_points_above_threshold;
use crate::algorithm::{roll_and_push_rows_i16, Axis};
use crate::app::ConfigError;
use crate::config::{RadarConfig, RadarIdleState, RadarProfile};

/// Measured range selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeasurementType {
    /// Roughly 0 cm - 5 cm
    CloseRange,
    /// Roughly 0 cm - 24 cm
    FarRange,
    /// Both ranges with separate detection outputs
    CloseAndFarRange,
}

/// Touchless button application configuration.
#[derive(Debug, Clone)]
pub struct TouchlessButtonConfig {
    /// Sensitivity for close range detection; high sensitivity equals low
    /// detection threshold
    pub sensitivity_close: f32,
    /// Frames in a row above threshold to start a close detection, and
    /// frames below to end one
    pub patience_close: usize,
    /// Sensitivity for far range detection
    pub sensitivity_far: f32,
    /// Patience for far range detection
    pub patience_far: usize,
    /// Background calibration duration in seconds
    pub calibration_duration_s: f32,
    /// Interval between background rebuilds in seconds; should exceed the
    /// longest expected continuous detection
    pub calibration_interval_s: f32,
    /// The measured range(s)
    pub measurement_type: MeasurementType,
    /// Points measured in the close range (the remainder of a sweep
    /// belongs to the far range)
    pub close_num_points: usize,
    /// The sensor configuration
    pub sensor: RadarConfig,
}

/// Default preset measuring the close range.
impl Default for TouchlessButtonConfig {
    fn default() -> Self {
        Self::preset_close()
    }
}

impl TouchlessButtonConfig {
    fn base_sensor() -> RadarConfig {
        let mut sensor = RadarConfig::default();
        sensor.set_sweeps_per_frame(16);
        sensor.set_sweep_rate(320.0);
        sensor.set_continuous_sweep_mode(true);
        sensor.set_double_buffering(true);
        sensor.set_inter_sweep_idle_state(RadarIdleState::Ready);
        sensor.set_inter_frame_idle_state(RadarIdleState::Ready);
        sensor.set_start_point(0);
        sensor
    }

    /// Close range preset.
    pub fn preset_close() -> Self {
        let mut sensor = Self::base_sensor();
        sensor.set_num_points(3);
        sensor.set_profile(RadarProfile::AccProfile1);
        sensor.set_receiver_gain(0);
        sensor.set_hwaas(40);
        sensor.set_step_length(6);

        Self {
            sensitivity_close: 1.9,
            patience_close: 2,
            sensitivity_far: 2.0,
            patience_far: 2,
            calibration_duration_s: 0.6,
            calibration_interval_s: 20.0,
            measurement_type: MeasurementType::CloseRange,
            close_num_points: 3,
            sensor,
        }
    }

    /// Far range preset.
    pub fn preset_far() -> Self {
        let mut sensor = Self::base_sensor();
        sensor.set_num_points(3);
        sensor.set_profile(RadarProfile::AccProfile3);
        sensor.set_receiver_gain(5);
        sensor.set_hwaas(60);
        sensor.set_step_length(24);

        Self {
            measurement_type: MeasurementType::FarRange,
            close_num_points: 0,
            sensor,
            ..Self::preset_close()
        }
    }

    /// Combined close and far range preset.
    pub fn preset_close_and_far() -> Self {
        let mut sensor = Self::base_sensor();
        // Close points first in each sweep, far points after
        sensor.set_num_points(6);
        sensor.set_profile(RadarProfile::AccProfile1);
        sensor.set_hwaas(40);
        sensor.set_step_length(6);

        Self {
            measurement_type: MeasurementType::CloseAndFarRange,
            close_num_points: 3,
            sensor,
            ..Self::preset_close()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor.sweep_rate() == 0.0 {
            return Err(ConfigError::RateNotSet);
        }

        if self.sensitivity_close <= 0.0 || self.sensitivity_far <= 0.0 {
            return Err(ConfigError::InvalidSensitivity);
        }

        if self.measurement_type == MeasurementType::CloseAndFarRange
            && self.close_num_points >= self.sensor.num_points()
        {
            return Err(ConfigError::OutOfBounds("close_num_points"));
        }

        Ok(())
    }
}

/// Detection state of one range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangeResult {
    /// The range is not measured by the current configuration
    NotUsed,
    /// No detection in the range
    NoDetection,
    /// Detection in the range
    Detection,
}

/// One touchless button processing result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchlessButtonResult {
    /// Close range detection state
    pub close_result: RangeResult,
    /// Far range detection state
    pub far_result: RangeResult,
}

/// Touchless button application.
pub struct TouchlessButtonApp {
    double_buffering: bool,
    sweeps_per_frame: usize,
    num_points: usize,
    patience_close: usize,
    patience_far: usize,

    double_buffer_work: Vec<i64>,
    frame_variance: Vec<f32>,
    arg_norm: Vec<Complex<f32>>,
    ampl_mean: Vec<f32>,
    ampl_std: Vec<f32>,
    phase_mean: Vec<f32>,
    phase_std: Vec<f32>,

    cal_interval_frames: usize,
    cal_sweeps: usize,
    dynamic_background: Vec<Complex<i16>>,
    rows_in_dynamic_background: usize,
    dynamic_background_guard: Vec<Complex<i16>>,
    update_background: bool,
    frames_since_last_cal: usize,

    close_threshold: f32,
    far_threshold: f32,
    threshold_check_count: Vec<usize>,

    run_close: bool,
    run_far: bool,
    close_num_points: usize,
    far_num_points: usize,

    close_signal: usize,
    far_signal: usize,
    close_non_signal: usize,
    far_non_signal: usize,
    close_detection: bool,
    far_detection: bool,
}

impl TouchlessButtonApp {
    /// Creates the application.
    pub fn new(config: &TouchlessButtonConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let sweeps_per_frame = config.sensor.sweeps_per_frame();
        let num_points = config.sensor.num_points();
        let sweep_rate = config.sensor.sweep_rate();
        let frame_rate = sweep_rate / sweeps_per_frame as f32;

        let cal_interval_frames =
            (frame_rate * config.calibration_interval_s + 0.5) as usize;
        let cal_sweeps = (sweep_rate * config.calibration_duration_s + 0.5) as usize;

        let run_close = matches!(
            config.measurement_type,
            MeasurementType::CloseRange | MeasurementType::CloseAndFarRange
        );
        let run_far = matches!(
            config.measurement_type,
            MeasurementType::FarRange | MeasurementType::CloseAndFarRange
        );

        let close_num_points = if run_close {
            match config.measurement_type {
                MeasurementType::CloseAndFarRange => config.close_num_points,
                _ => num_points,
            }
        } else {
            0
        };
        let far_num_points = if run_far { num_points - close_num_points } else { 0 };

        let mut app = Self {
            double_buffering: config.sensor.double_buffering(),
            sweeps_per_frame,
            num_points,
            patience_close: config.patience_close,
            patience_far: config.patience_far,

            double_buffer_work: vec![0; sweeps_per_frame.saturating_sub(2)],
            frame_variance: vec![0.0; sweeps_per_frame * num_points],
            arg_norm: vec![Complex::new(0.0, 0.0); num_points],
            ampl_mean: vec![0.0; num_points],
            ampl_std: vec![0.0; num_points],
            phase_mean: vec![0.0; num_points],
            phase_std: vec![0.0; num_points],

            cal_interval_frames,
            cal_sweeps,
            dynamic_background: vec![Complex::new(0, 0); cal_sweeps * num_points],
            rows_in_dynamic_background: 0,
            dynamic_background_guard: vec![Complex::new(0, 0); sweeps_per_frame * num_points],
            update_background: false,
            frames_since_last_cal: 0,

            close_threshold: threshold(config.sensitivity_close),
            far_threshold: threshold(config.sensitivity_far),
            threshold_check_count: vec![0; num_points],

            run_close,
            run_far,
            close_num_points,
            far_num_points,

            close_signal: 0,
            far_signal: 0,
            close_non_signal: config.patience_close + 1,
            far_non_signal: config.patience_far + 1,
            close_detection: false,
            far_detection: false,
        };

        app.reset_background();

        Ok(app)
    }

    fn reset_background(&mut self) {
        self.frames_since_last_cal = 0;
        self.dynamic_background.fill(Complex::new(0, 0));
        self.rows_in_dynamic_background = 0;
        self.dynamic_background_guard.fill(Complex::new(0, 0));
        self.update_background = false;
    }

    /// Folds the guarded motion-free frame into the background history.
    fn absorb_guard_into_background(&mut self) {
        roll_and_push_rows_i16(
            &mut self.dynamic_background,
            self.num_points,
            &self.dynamic_background_guard,
            false,
        );

        self.rows_in_dynamic_background =
            (self.rows_in_dynamic_background + self.sweeps_per_frame).min(self.cal_sweeps);
        self.frames_since_last_cal = 0;
    }

    /// Computes the per-point deviation of `frame` from the background
    /// statistics.
    fn calc_variance(&mut self, frame: &Frame) {
        let num_points = self.num_points;

        mean_matrix_complex(
            &self.dynamic_background,
            num_points,
            &mut self.arg_norm,
            Axis::Col,
        );
        conj_in_place(&mut self.arg_norm);
        normalize_in_place(&mut self.arg_norm);

        for c in 0..num_points {
            let mut abs_mean = 0.0f32;
            let mut abs_sq_term = 0.0f32;
            let mut phase_mean = 0.0f32;
            let mut phase_sq_term = 0.0f32;

            for r in 0..self.cal_sweeps {
                let bg = self.dynamic_background[r * num_points + c];
                let element =
                    Complex::new(bg.re as f32, bg.im as f32) * self.arg_norm[c];

                let delta = element.norm() - abs_mean;
                let div = if r == 0 { 1 } else { r };
                abs_mean += delta / div as f32;
                abs_sq_term += delta * (element.norm() - abs_mean);

                let delta = element.arg() - phase_mean;
                phase_mean += delta / div as f32;
                phase_sq_term += delta * (element.arg() - phase_mean);
            }

            self.ampl_mean[c] = abs_mean;
            self.ampl_std[c] = libm::sqrtf(abs_sq_term / self.cal_sweeps as f32);
            self.phase_mean[c] = phase_mean;
            self.phase_std[c] = libm::sqrtf(phase_sq_term / self.cal_sweeps as f32);
        }

        for r in 0..self.sweeps_per_frame {
            for c in 0..num_points {
                let sample = frame.get(r, c);
                let element =
                    Complex::new(sample.re as f32, sample.im as f32) * self.arg_norm[c];

                let a = (element.norm() - self.ampl_mean[c]) / self.ampl_std[c];
                let b = (element.arg() - self.phase_mean[c]) / self.phase_std[c];

                self.frame_variance[r * num_points + c] = libm::sqrtf(a * a + b * b);
            }
        }
    }

    /// Processes one frame into detection states.
    pub fn process(&mut self, frame: &mut Frame) -> TouchlessButtonResult {
        if self.double_buffering {
            double_buffering_frame_filter(frame, &mut self.double_buffer_work);
        }

        self.frame_variance.fill(0.0);

        if self.frames_since_last_cal > self.cal_interval_frames {
            log::debug!("background stale, rebuilding");
            self.reset_background();
        } else if self.rows_in_dynamic_background == self.cal_sweeps {
            self.calc_variance(frame);
        }

        let mut threshold_check_offset = 0;

        if self.run_close {
            count_points_above_threshold(
                &self.frame_variance,
                self.num_points,
                self.close_threshold,
                &mut self.threshold_check_count,
                threshold_check_offset,
                self.close_num_points,
                Axis::Row,
            );

            threshold_check_offset = self.close_num_points;
        }

        if self.run_far {
            count_points_above_threshold(
                &self.frame_variance,
                self.num_points,
                self.far_threshold,
                &mut self.threshold_check_count,
                threshold_check_offset,
                self.far_num_points,
                Axis::Row,
            );
        }

        if check_count(&self.threshold_check_count, 0, self.num_points) {
            let close_offset = 0;
            let far_offset = self.close_num_points;

            if self.run_close {
                if check_count(&self.threshold_check_count, close_offset, self.close_num_points) {
                    self.close_signal += 1;
                    self.close_non_signal = 0;
                } else {
                    self.close_signal = 0;
                    self.close_non_signal += 1;
                }
            }

            if self.run_far {
                if check_count(&self.threshold_check_count, far_offset, self.far_num_points) {
                    self.far_signal += 1;
                    self.far_non_signal = 0;
                } else {
                    self.far_signal = 0;
                    self.far_non_signal += 1;
                }
            }

            // A frame with motion never enters the background
            self.update_background = false;
            self.dynamic_background_guard.fill(Complex::new(0, 0));
            self.frames_since_last_cal += 1;
        } else {
            self.close_signal = 0;
            self.far_signal = 0;
            self.close_non_signal += 1;
            self.far_non_signal += 1;

            if self.update_background {
                self.absorb_guard_into_background();
            }

            // Hold the frame back one round; it only becomes background if
            // the next frame is also motion-free
            self.dynamic_background_guard.copy_from_slice(frame.as_slice());
            self.update_background = true;
        }

        let mut result = TouchlessButtonResult {
            close_result: RangeResult::NotUsed,
            far_result: RangeResult::NotUsed,
        };

        if self.run_close {
            self.close_detection = get_detection(
                self.close_detection,
                self.close_signal,
                self.close_non_signal,
                self.patience_close,
            );
            result.close_result = if self.close_detection {
                RangeResult::Detection
            } else {
                RangeResult::NoDetection
            };
        }

        if self.run_far {
            self.far_detection = get_detection(
                self.far_detection,
                self.far_signal,
                self.far_non_signal,
                self.patience_far,
            );
            result.far_result = if self.far_detection {
                RangeResult::Detection
            } else {
                RangeResult::NoDetection
            };
        }

        result
    }
}

/// Sensitivity to detection threshold.
fn threshold(sensitivity: f32) -> f32 {
    (1.0 / sensitivity) * 10.0
}

/// Whether any point in the window saw more than one sweep above
/// threshold.
fn check_count(count: &[usize], check_offset: usize, check_length: usize) -> bool {
    count[check_offset..check_offset + check_length]
        .iter()
        .any(|&c| c > 1)
}

/// Detection hysteresis: start after `patience` signal frames, keep until
/// more than `patience` non-signal frames.
fn get_detection(
    current_detection: bool,
    sig_count: usize,
    non_sig_count: usize,
    patience: usize,
) -> bool {
    let new_detection = !current_detection && sig_count >= patience;
    let keep_detection = current_detection && non_sig_count <= patience;

    new_detection || keep_detection
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_hysteresis() {
        // Starts only after `patience` consecutive signal frames.
        assert!(!get_detection(false, 1, 0, 2));
        assert!(get_detection(false, 2, 0, 2));

        // Survives short dropouts, ends beyond patience.
        assert!(get_detection(true, 0, 1, 2));
        assert!(get_detection(true, 0, 2, 2));
        assert!(!get_detection(true, 0, 3, 2));
    }

    #[test]
    fn threshold_is_inverse_to_sensitivity() {
        assert!(threshold(1.0) > threshold(2.0));
        approx::assert_relative_eq!(threshold(2.0), 5.0);
    }

    fn test_config() -> TouchlessButtonConfig {
        let mut config = TouchlessButtonConfig::preset_close();
        // 2 frames of background at 16 sweeps per frame
        config.calibration_duration_s = 0.1;
        config.sensor.set_double_buffering(false);
        config
    }

    /// Background-like frame with deterministic low-level noise.
    fn background_frame(seed: usize) -> Frame {
        let mut frame = Frame::new(16, 3);
        for sweep in 0..16 {
            for point in 0..3 {
                let noise = ((seed * 31 + sweep * 7 + point * 13) % 5) as i16;
                frame.set(sweep, point, Complex::new(1000 + noise, 500 + noise));
            }
        }
        frame
    }

    /// Frame with a strong amplitude change on every point.
    fn hand_frame() -> Frame {
        let mut frame = Frame::new(16, 3);
        for sweep in 0..16 {
            for point in 0..3 {
                frame.set(sweep, point, Complex::new(4000, -1500));
            }
        }
        frame
    }

    #[test]
    fn learns_background_then_detects_hand() {
        let config = test_config();
        let mut app = TouchlessButtonApp::new(&config).unwrap();

        // Build up the dynamic background from motion-free frames. The
        // guard frame delays absorption by one round, so give it a few
        // extra frames beyond the two needed for 32 calibration sweeps.
        for i in 0..5 {
            let result = app.process(&mut background_frame(i));
            assert_eq!(result.close_result, RangeResult::NoDetection);
            assert_eq!(result.far_result, RangeResult::NotUsed);
        }

        // patience_close = 2: the first hand frame is not yet a detection.
        let result = app.process(&mut hand_frame());
        assert_eq!(result.close_result, RangeResult::NoDetection);

        let result = app.process(&mut hand_frame());
        assert_eq!(result.close_result, RangeResult::Detection);
    }

    #[test]
    fn detection_ends_after_patience_motion_free_frames() {
        let config = test_config();
        let mut app = TouchlessButtonApp::new(&config).unwrap();

        for i in 0..5 {
            app.process(&mut background_frame(i));
        }
        app.process(&mut hand_frame());
        app.process(&mut hand_frame());
        assert_eq!(
            app.process(&mut hand_frame()).close_result,
            RangeResult::Detection
        );

        // Hand leaves; the detection must survive `patience` frames and
        // then drop.
        let mut last = RangeResult::Detection;
        for i in 0..3 {
            last = app.process(&mut background_frame(100 + i)).close_result;
        }
        assert_eq!(last, RangeResult::NoDetection);
    }
}
