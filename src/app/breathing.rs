//! Breathing rate reference application.
//!
//! Estimates the breathing rate of a stationary person from the phase of
//! the radar echo. The upstream presence detector gates the estimation: the
//! application waits for steady presence, locks in the breathing distance,
//! then accumulates the band-passed chest motion into a sliding time series
//! whose dominant spectral peak is reported in breaths per minute.

use alloc::vec;
use alloc::vec::Vec;

use num::complex::Complex;

use crate::algorithm;
use crate::algorithm::fft;
use crate::algorithm::filter;
use crate::algorithm::frame::mean_sweep;
use crate::algorithm::spectrum;
use crate::algorithm::Axis;
use crate::app::ConfigError;
use crate::detector::presence::{
    PresenceConfig, PresenceMetadata, PresenceProcessor, PresenceResult, ProcessDataError,
};

const B_STATIC_LENGTH: usize = 3;
const A_STATIC_LENGTH: usize = 2;
const B_ANGLE_LENGTH: usize = 5;
const A_ANGLE_LENGTH: usize = 4;

/// Application state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BreathingAppState {
    /// Before the first presence result
    Init,
    /// No presence detected
    NoPresence,
    /// Fast motion dominates; breathing cannot be estimated
    IntraPresence,
    /// Presence is steady, waiting for the distance to settle
    DetermineDistance,
    /// Estimating the breathing rate at the locked distance
    EstimateBreathingRate,
}

/// Breathing application configuration.
#[derive(Debug, Clone)]
pub struct BreathingConfig {
    /// Length of the analyzed time series, in seconds
    pub time_series_length_s: u16,
    /// Lowest reportable breathing rate, in breaths per minute
    pub lowest_breathing_rate: u16,
    /// Highest reportable breathing rate, in breaths per minute
    pub highest_breathing_rate: u16,
    /// Number of distance points around the locked distance to analyze
    pub num_dists_to_analyze: u16,
    /// Use the presence distance to select the analyzed points; with
    /// `false` the full measured range is analyzed immediately
    pub use_presence_processor: bool,
    /// Time the presence distance must stay steady before it is locked,
    /// in seconds
    pub distance_determination_duration_s: u16,
    /// Configuration of the upstream presence detector
    pub presence: PresenceConfig,
}

impl Default for BreathingConfig {
    fn default() -> Self {
        let mut presence = PresenceConfig::default();

        presence.set_range(0.3..=1.5);
        presence.set_hwaas(32);
        presence.set_frame_rate(10.0);
        presence.set_sweeps_per_frame(16);
        presence.set_auto_profile(false);
        presence.set_profile(crate::config::RadarProfile::AccProfile3);
        presence.set_auto_step_length(false);
        presence.set_step_length(24);
        presence.set_inter_frame_presence_timeout(0);
        presence.set_inter_frame_fast_cutoff(20.0);
        presence.set_intra_detection_threshold(6.0);
        presence.set_intra_output_time_const(0.5);
        presence.set_inter_output_time_const(5.0);

        Self {
            time_series_length_s: 20,
            lowest_breathing_rate: 6,
            highest_breathing_rate: 60,
            num_dists_to_analyze: 3,
            use_presence_processor: true,
            distance_determination_duration_s: 5,
            presence,
        }
    }
}

impl BreathingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.presence.frame_rate() == 0.0 {
            return Err(ConfigError::RateNotSet);
        }

        if self.lowest_breathing_rate >= self.highest_breathing_rate {
            return Err(ConfigError::InvalidRange);
        }

        if self.num_dists_to_analyze < 1 {
            return Err(ConfigError::OutOfBounds("num_dists_to_analyze"));
        }

        Ok(())
    }
}

/// One breathing processing result.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BreathingResult {
    /// Application state after this frame
    pub app_state: BreathingAppState,
    /// Estimated rate in breaths per minute, when a full time series has
    /// been accumulated and the reporting interval elapsed
    pub breathing_rate: Option<f32>,
}

/// Breathing rate application.
pub struct BreathingApp {
    start_m: f32,
    step_length_m: f32,
    num_points: usize,

    start_point: usize,
    end_point: usize,
    num_points_to_analyze_half_width: usize,
    num_points_to_analyze: usize,
    use_presence_processor: bool,
    distance_determination_count: usize,
    time_series_length: usize,
    padded_time_series_length_shift: usize,
    rfft_output_length: usize,
    intra_detection_threshold: f32,

    app_state: BreathingAppState,
    prev_app_state: BreathingAppState,

    presence_sf: f32,
    breathing_sf: f32,

    b_static: [f32; B_STATIC_LENGTH],
    a_static: [f32; A_STATIC_LENGTH],
    b_angle: [f32; B_ANGLE_LENGTH],
    a_angle: [f32; A_ANGLE_LENGTH],

    mean_sweep: Vec<Complex<f32>>,
    filt_sparse_iq: Vec<Complex<f32>>,
    sparse_iq_buffer: Vec<Complex<f32>>,
    filt_sparse_iq_buffer: Vec<Complex<f32>>,
    angle: Vec<f32>,
    prev_angle: Vec<f32>,
    lp_filt_ampl: Vec<f32>,
    unwrapped_angle: Vec<f32>,
    angle_buffer: Vec<f32>,
    filt_angle_buffer: Vec<f32>,
    breathing_motion_buffer: Vec<f32>,
    hamming_window: Vec<f32>,
    windowed_breathing_motion_buffer: Vec<f32>,
    rfft_output: Vec<Complex<f32>>,
    weighted_psd: Vec<f32>,
    freq_delta: f32,

    distance_determination_counter: usize,
    presence_init: bool,
    presence_distance: f32,
    base_presence_dist: bool,
    base_presence_distance: f32,
    presence_distance_threshold: f32,
    first: bool,
    init_count: usize,
    count: usize,
    initialized: bool,
    count_limit: usize,
}

impl BreathingApp {
    /// Creates the application for a presence detector with the given
    /// metadata.
    pub fn new(config: &BreathingConfig, metadata: &PresenceMetadata) -> Result<Self, ConfigError> {
        config.validate()?;

        let frame_rate = config.presence.frame_rate();
        let num_points = metadata.num_points;

        let half_width = (config.num_dists_to_analyze / 2) as usize;
        let num_points_to_analyze = if config.use_presence_processor {
            half_width * 2 + 1
        } else {
            num_points
        };

        let time_series_length = (config.time_series_length_s as f32 * frame_rate) as usize;

        let mut padded_shift = 0usize;
        while (1usize << padded_shift) < time_series_length {
            padded_shift += 1;
        }
        let padded_len = 1usize << padded_shift;
        let rfft_output_length = padded_len / 2 + 1;

        let (b_static, a_static) = filter::butter_lowpass(
            config.lowest_breathing_rate as f32 / 60.0,
            frame_rate,
        );
        let (b_angle, a_angle) = filter::butter_bandpass(
            config.lowest_breathing_rate as f32 / 60.0,
            config.highest_breathing_rate as f32 / 60.0,
            frame_rate,
        );

        let mut hamming_window = vec![0.0f32; time_series_length];
        spectrum::hamming(&mut hamming_window);

        let n = num_points_to_analyze;

        Ok(Self {
            start_m: metadata.start_m,
            step_length_m: metadata.step_length_m,
            num_points,

            start_point: 0,
            end_point: n,
            num_points_to_analyze_half_width: half_width,
            num_points_to_analyze: n,
            use_presence_processor: config.use_presence_processor,
            distance_determination_count: (config.distance_determination_duration_s as f32
                * frame_rate) as usize,
            time_series_length,
            padded_time_series_length_shift: padded_shift,
            rfft_output_length,
            intra_detection_threshold: config.presence.intra_detection_threshold(),

            app_state: BreathingAppState::Init,
            prev_app_state: BreathingAppState::Init,

            presence_sf: algorithm::exp_smoothing_coefficient(
                frame_rate,
                config.distance_determination_duration_s as f32 / 4.0,
            ),
            breathing_sf: algorithm::exp_smoothing_coefficient(
                frame_rate,
                config.time_series_length_s as f32 / 2.0,
            ),

            b_static,
            a_static,
            b_angle,
            a_angle,

            mean_sweep: vec![Complex::new(0.0, 0.0); n],
            filt_sparse_iq: vec![Complex::new(0.0, 0.0); n],
            sparse_iq_buffer: vec![Complex::new(0.0, 0.0); B_STATIC_LENGTH * n],
            filt_sparse_iq_buffer: vec![Complex::new(0.0, 0.0); A_STATIC_LENGTH * n],
            angle: vec![0.0; n],
            prev_angle: vec![0.0; n],
            lp_filt_ampl: vec![0.0; n],
            unwrapped_angle: vec![0.0; n],
            angle_buffer: vec![0.0; B_ANGLE_LENGTH * n],
            filt_angle_buffer: vec![0.0; A_ANGLE_LENGTH * n],
            breathing_motion_buffer: vec![0.0; time_series_length * n],
            hamming_window,
            windowed_breathing_motion_buffer: vec![0.0; time_series_length * n],
            rfft_output: vec![Complex::new(0.0, 0.0); rfft_output_length * n],
            weighted_psd: vec![0.0; rfft_output_length],
            freq_delta: fft::fftfreq_delta(padded_len, 1.0 / frame_rate),

            distance_determination_counter: 0,
            presence_init: false,
            presence_distance: 0.0,
            base_presence_dist: false,
            base_presence_distance: 0.0,
            presence_distance_threshold: config.presence.profile().fwhm_m() * 2.0,
            first: true,
            init_count: 0,
            count: 0,
            initialized: false,
            count_limit: time_series_length / 2,
        })
    }

    /// Current application state.
    pub fn state(&self) -> BreathingAppState {
        self.app_state
    }

    /// Processes one presence result (with its frame) into a breathing
    /// result.
    pub fn process(&mut self, presence: &PresenceResult) -> BreathingResult {
        let mut result = BreathingResult {
            app_state: self.app_state,
            breathing_rate: None,
        };

        if presence.calibration_needed {
            // The locked distance cannot be trusted across a recalibration
            self.base_presence_dist = false;
            self.base_presence_distance = 0.0;
        } else {
            self.determine_state(presence);
            self.update_presence_distance(presence.presence_distance);
            self.perform_action_based_on_state(presence, &mut result);
        }

        result.app_state = self.app_state;
        self.prev_app_state = self.app_state;

        result
    }

    fn determine_state(&mut self, presence: &PresenceResult) {
        if !presence.presence_detected {
            self.app_state = BreathingAppState::NoPresence;
        } else if self.intra_detection_threshold < presence.intra_presence_score {
            self.app_state = BreathingAppState::IntraPresence;
        } else if !self.base_presence_dist && self.use_presence_processor {
            self.app_state = BreathingAppState::DetermineDistance;
        } else if !self.use_presence_processor
            || self.distance_determination_count <= self.distance_determination_counter
        {
            self.app_state = BreathingAppState::EstimateBreathingRate;
        }
    }

    fn update_presence_distance(&mut self, presence_distance: f32) {
        if !self.presence_init {
            self.presence_init = true;
            self.presence_distance = presence_distance;
        }

        self.presence_distance = self.presence_distance * self.presence_sf
            + presence_distance * (1.0 - self.presence_sf);

        let drift = self.base_presence_distance - self.presence_distance;
        let drift = if drift < 0.0 { -drift } else { drift };

        if self.base_presence_dist && self.presence_distance_threshold < drift {
            self.base_presence_dist = false;
            self.base_presence_distance = 0.0;
        }
    }

    /// Resets all rolling state for a freshly selected distance window.
    fn reinit_breathing(&mut self, start_point: usize, end_point: usize) {
        self.start_point = start_point;
        self.end_point = end_point;
        self.num_points_to_analyze = end_point - start_point;

        self.first = true;
        self.init_count = 0;
        self.count = 0;
        self.initialized = false;

        self.sparse_iq_buffer.fill(Complex::new(0.0, 0.0));
        self.filt_sparse_iq_buffer.fill(Complex::new(0.0, 0.0));
        self.prev_angle.fill(0.0);
        self.lp_filt_ampl.fill(0.0);
        self.unwrapped_angle.fill(0.0);
        self.angle_buffer.fill(0.0);
        self.filt_angle_buffer.fill(0.0);
        self.breathing_motion_buffer.fill(0.0);
    }

    fn perform_action_based_on_state(
        &mut self,
        presence: &PresenceResult,
        result: &mut BreathingResult,
    ) {
        match self.app_state {
            BreathingAppState::Init => {}
            // No presence and fast motion invalidate the locked distance
            // the same way
            BreathingAppState::NoPresence | BreathingAppState::IntraPresence => {
                self.base_presence_dist = false;
                self.base_presence_distance = 0.0;
            }
            BreathingAppState::DetermineDistance => {
                if self.app_state != self.prev_app_state {
                    self.distance_determination_counter = 0;
                } else {
                    self.distance_determination_counter += 1;
                    self.base_presence_dist = true;
                    self.base_presence_distance = self.presence_distance;
                }
            }
            BreathingAppState::EstimateBreathingRate => {
                if self.app_state != self.prev_app_state {
                    let (start_point, end_point) = if self.use_presence_processor {
                        let center_idx = ((self.base_presence_distance - self.start_m)
                            / self.step_length_m
                            + 0.5)
                            .max(0.0) as usize;

                        let start_point = center_idx
                            .saturating_sub(self.num_points_to_analyze_half_width);
                        let end_point = (center_idx + self.num_points_to_analyze_half_width + 1)
                            .min(self.num_points);

                        (start_point, end_point)
                    } else {
                        (0, self.num_points)
                    };

                    self.reinit_breathing(start_point, end_point);
                }

                self.process_breathing(presence, result);
            }
        }
    }

    fn process_breathing(&mut self, presence: &PresenceResult, result: &mut BreathingResult) {
        let n = self.num_points_to_analyze;
        let t = self.time_series_length;

        mean_sweep(
            &presence.frame,
            self.start_point,
            self.end_point,
            &mut self.mean_sweep[..n],
        );

        algorithm::roll_and_push_matrix_complex(
            &mut self.sparse_iq_buffer[..B_STATIC_LENGTH * n],
            n,
            &self.mean_sweep[..n],
            true,
        );

        filter::apply_filter_complex(
            &self.a_static,
            &self.filt_sparse_iq_buffer[..A_STATIC_LENGTH * n],
            &self.b_static,
            &self.sparse_iq_buffer[..B_STATIC_LENGTH * n],
            &mut self.filt_sparse_iq[..n],
        );

        algorithm::roll_and_push_matrix_complex(
            &mut self.filt_sparse_iq_buffer[..A_STATIC_LENGTH * n],
            n,
            &self.filt_sparse_iq[..n],
            true,
        );

        // Remove the static component; the remainder is the moving echo
        for i in 0..n {
            self.mean_sweep[i] -= self.filt_sparse_iq[i];
            self.angle[i] = self.mean_sweep[i].arg();
        }

        if self.first {
            for i in 0..n {
                self.prev_angle[i] = self.angle[i];
                self.lp_filt_ampl[i] = self.mean_sweep[i].norm();
            }

            self.first = false;
        }

        for i in 0..n {
            self.lp_filt_ampl[i] = self.breathing_sf * self.lp_filt_ampl[i]
                + (1.0 - self.breathing_sf) * self.mean_sweep[i].norm();
        }

        // Per-point phase unwrap bounded to +-pi
        for i in 0..n {
            let mut angle_diff = self.angle[i] - self.prev_angle[i];
            self.prev_angle[i] = self.angle[i];

            if core::f32::consts::PI < angle_diff {
                angle_diff -= 2.0 * core::f32::consts::PI;
            } else if angle_diff < -core::f32::consts::PI {
                angle_diff += 2.0 * core::f32::consts::PI;
            }

            self.unwrapped_angle[i] += angle_diff;
        }

        algorithm::roll_and_push_matrix(
            &mut self.angle_buffer[..B_ANGLE_LENGTH * n],
            n,
            &self.unwrapped_angle[..n],
            true,
        );

        filter::apply_filter(
            &self.a_angle,
            &self.filt_angle_buffer[..A_ANGLE_LENGTH * n],
            &self.b_angle,
            &self.angle_buffer[..B_ANGLE_LENGTH * n],
            &mut self.angle[..n],
        );

        algorithm::roll_and_push_matrix(
            &mut self.filt_angle_buffer[..A_ANGLE_LENGTH * n],
            n,
            &self.angle[..n],
            true,
        );

        algorithm::roll_and_push_matrix(
            &mut self.breathing_motion_buffer[..t * n],
            n,
            &self.angle[..n],
            false,
        );

        if self.init_count > self.time_series_length {
            self.initialized = true;
        } else {
            self.init_count += 1;
        }

        if self.time_series_length - self.count_limit <= self.count {
            self.count = 0;

            if self.initialized {
                let mut lp_filt_ampl_sum = 0.0f32;

                for r in 0..t {
                    for c in 0..n {
                        self.windowed_breathing_motion_buffer[r * n + c] =
                            self.breathing_motion_buffer[r * n + c] * self.hamming_window[r];
                        lp_filt_ampl_sum += self.lp_filt_ampl[c];
                    }
                }

                fft::rfft_matrix(
                    &self.windowed_breathing_motion_buffer[..t * n],
                    n,
                    self.padded_time_series_length_shift,
                    &mut self.rfft_output[..self.rfft_output_length * n],
                    Axis::Col,
                );

                // Weight each point's spectrum by its low-passed amplitude
                for r in 0..self.rfft_output_length {
                    let mut sum_psd = 0.0f32;

                    for c in 0..n {
                        sum_psd += self.rfft_output[r * n + c].norm() * self.lp_filt_ampl[c];
                    }

                    self.weighted_psd[r] = sum_psd / lp_filt_ampl_sum;
                }

                let peak_loc = algorithm::argmax(&self.weighted_psd[..self.rfft_output_length]);

                if peak_loc > 0 && peak_loc < self.rfft_output_length - 1 {
                    let freq = algorithm::interpolate_peaks_equidistant(
                        &self.weighted_psd,
                        0.0,
                        self.freq_delta,
                        peak_loc,
                    );
                    result.breathing_rate = Some(freq * 60.0);
                }
            }
        } else {
            self.count += 1;
        }
    }
}

/// Drives a [`PresenceProcessor`] into a stream of breathing results.
pub struct BreathingSession<P: PresenceProcessor> {
    processor: P,
    app: BreathingApp,
}

impl<P: PresenceProcessor> BreathingSession<P> {
    /// Creates a session over a prepared presence detector.
    pub fn new(processor: P, config: &BreathingConfig) -> Result<Self, ConfigError> {
        let metadata = processor.metadata();
        let app = BreathingApp::new(config, &metadata)?;

        Ok(Self { processor, app })
    }

    /// Processes the measurement data in `buffer` into a breathing result.
    pub fn next(&mut self, buffer: &mut [u8]) -> Result<BreathingResult, ProcessDataError> {
        let presence = self.processor.process(buffer)?;

        Ok(self.app.process(&presence))
    }

    /// The application state machine.
    pub fn app(&self) -> &BreathingApp {
        &self.app
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::frame::Frame;

    fn metadata() -> PresenceMetadata {
        PresenceMetadata {
            start_m: 0.3,
            step_length_m: 0.06,
            num_points: 3,
            frame_rate: 10.0,
        }
    }

    fn presence_result(
        detected: bool,
        intra_score: f32,
        distance: f32,
        frame: Frame,
    ) -> PresenceResult {
        PresenceResult {
            presence_detected: detected,
            presence_distance: distance,
            intra_presence_score: intra_score,
            inter_presence_score: 1.5,
            depthwise_intra_presence_scores: vec![0.0; 3],
            depthwise_inter_presence_scores: vec![0.0; 3],
            frame,
            temperature: 25,
            calibration_needed: false,
        }
    }

    fn static_frame(num_points: usize) -> Frame {
        let mut frame = Frame::new(16, num_points);
        for sweep in 0..16 {
            for point in 0..num_points {
                frame.set(sweep, point, Complex::new(1000, 500));
            }
        }
        frame
    }

    fn test_config() -> BreathingConfig {
        let mut config = BreathingConfig::default();
        config.time_series_length_s = 5;
        config.distance_determination_duration_s = 1;
        config
    }

    #[test]
    fn no_presence_resets_to_no_presence_state() {
        let config = test_config();
        let mut app = BreathingApp::new(&config, &metadata()).unwrap();

        let result = app.process(&presence_result(false, 0.0, 0.0, static_frame(3)));
        assert_eq!(result.app_state, BreathingAppState::NoPresence);
    }

    #[test]
    fn fast_motion_preempts_presence() {
        let config = test_config();
        let mut app = BreathingApp::new(&config, &metadata()).unwrap();

        // Intra score above the configured threshold (6.0)
        let result = app.process(&presence_result(true, 8.0, 0.9, static_frame(3)));
        assert_eq!(result.app_state, BreathingAppState::IntraPresence);
    }

    #[test]
    fn steady_presence_locks_distance_then_estimates() {
        let config = test_config();
        let mut app = BreathingApp::new(&config, &metadata()).unwrap();

        // distance_determination_duration_s = 1 at 10 Hz needs the state to
        // persist for 10 frames after entry.
        let result = app.process(&presence_result(true, 0.1, 0.9, static_frame(3)));
        assert_eq!(result.app_state, BreathingAppState::DetermineDistance);

        let mut last_state = result.app_state;
        for _ in 0..11 {
            last_state = app
                .process(&presence_result(true, 0.1, 0.9, static_frame(3)))
                .app_state;
        }

        assert_eq!(last_state, BreathingAppState::EstimateBreathingRate);
    }

    #[test]
    fn presence_loss_invalidates_locked_distance() {
        let config = test_config();
        let mut app = BreathingApp::new(&config, &metadata()).unwrap();

        for _ in 0..12 {
            app.process(&presence_result(true, 0.1, 0.9, static_frame(3)));
        }
        assert_eq!(app.state(), BreathingAppState::EstimateBreathingRate);

        app.process(&presence_result(false, 0.0, 0.0, static_frame(3)));
        assert_eq!(app.state(), BreathingAppState::NoPresence);

        // Re-detection starts over with distance determination.
        let result = app.process(&presence_result(true, 0.1, 0.9, static_frame(3)));
        assert_eq!(result.app_state, BreathingAppState::DetermineDistance);
    }

    #[test]
    fn calibration_needed_clears_locked_distance_without_state_change() {
        let config = test_config();
        let mut app = BreathingApp::new(&config, &metadata()).unwrap();

        for _ in 0..12 {
            app.process(&presence_result(true, 0.1, 0.9, static_frame(3)));
        }
        assert_eq!(app.state(), BreathingAppState::EstimateBreathingRate);

        let mut needing = presence_result(true, 0.1, 0.9, static_frame(3));
        needing.calibration_needed = true;
        app.process(&needing);

        // Distance must be re-determined afterwards.
        let result = app.process(&presence_result(true, 0.1, 0.9, static_frame(3)));
        assert_eq!(result.app_state, BreathingAppState::DetermineDistance);
    }

    struct ScriptedProcessor {
        results: alloc::vec::Vec<PresenceResult>,
        next: usize,
    }

    impl PresenceProcessor for ScriptedProcessor {
        fn metadata(&self) -> PresenceMetadata {
            metadata()
        }

        fn process(&mut self, _buffer: &mut [u8]) -> Result<PresenceResult, ProcessDataError> {
            let result = self.results[self.next].clone();
            self.next += 1;
            Ok(result)
        }
    }

    #[test]
    fn session_runs_the_state_machine_over_a_processor() {
        let processor = ScriptedProcessor {
            results: vec![
                presence_result(false, 0.0, 0.0, static_frame(3)),
                presence_result(true, 0.1, 0.9, static_frame(3)),
            ],
            next: 0,
        };

        let mut session = BreathingSession::new(processor, &test_config()).unwrap();
        let mut buffer = [0u8; 4];

        let result = session.next(&mut buffer).unwrap();
        assert_eq!(result.app_state, BreathingAppState::NoPresence);

        let result = session.next(&mut buffer).unwrap();
        assert_eq!(result.app_state, BreathingAppState::DetermineDistance);
        assert_eq!(session.app().state(), BreathingAppState::DetermineDistance);
    }

    #[test]
    fn estimates_breathing_rate_of_synthetic_chest_motion() {
        // 15 breaths/minute phase modulation on a single point, with the
        // distance processor disabled so estimation starts immediately.
        let mut config = test_config();
        config.use_presence_processor = false;

        let meta = PresenceMetadata {
            start_m: 0.3,
            step_length_m: 0.06,
            num_points: 1,
            frame_rate: 10.0,
        };
        let mut app = BreathingApp::new(&config, &meta).unwrap();

        let breathing_hz = 0.25f32;
        let mut rate = None;

        for frame_idx in 0..160 {
            let time_s = frame_idx as f32 / 10.0;
            let phase = 0.8 * (2.0 * core::f32::consts::PI * breathing_hz * time_s).sin();

            let mut frame = Frame::new(16, 1);
            for sweep in 0..16 {
                let sample = Complex::new(
                    (2000.0 * phase.cos()) as i16,
                    (2000.0 * phase.sin()) as i16,
                );
                frame.set(sweep, 0, sample);
            }

            let result = app.process(&presence_result(true, 0.1, 0.5, frame));
            if result.breathing_rate.is_some() {
                rate = result.breathing_rate;
            }
        }

        let rate = rate.expect("no breathing rate produced");
        assert!(
            (rate - 15.0).abs() < 3.0,
            "expected ~15 breaths/min, got {}",
            rate
        );
    }
}
