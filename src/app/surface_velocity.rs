//! Surface velocity application.
//!
//! Estimates the flow velocity of a water surface from the Doppler
//! spectrum of an obliquely mounted radar. Sweeps are accumulated into a
//! time series per distance point, turned into velocity spectra with
//! Welch's method, thresholded with a mirrored CFAR, and the detected
//! spectral peaks are merged and converted to a vertical surface velocity
//! with an angle correction for the mounting geometry.

use alloc::vec;
use alloc::vec::Vec;

use num::complex::Complex;

use crate::algorithm;
use crate::algorithm::fft;
use crate::algorithm::frame::{double_buffering_frame_filter, Frame};
use crate::algorithm::peaks::{self, CapacityExceeded};
use crate::algorithm::spectrum;
use crate::app::ConfigError;
use crate::config::{
    PulseRepetitionFrequency, RadarConfig, RadarIdleState, RadarProfile,
    APPROX_BASE_STEP_LENGTH_M,
};
use crate::processing::ProcessingResult;

/// Peaks closer than this in velocity are merged, in m/s.
const MIN_PEAK_VS: f32 = 0.1;

/// Surface velocity application configuration.
#[derive(Debug, Clone)]
pub struct SurfaceVelocityConfig {
    /// Perpendicular distance from the sensor to the surface, in meters
    pub surface_distance: f32,
    /// Mounting angle between the sensor normal and the vertical, in
    /// degrees; must be within (0, 90)
    pub sensor_angle: f32,
    /// Low-pass coefficient for the velocity spectra
    pub psd_lp_coeff: f32,
    /// CFAR threshold sensitivity, > 0
    pub threshold_sensitivity: f32,
    /// Low-pass coefficient for the reported velocity
    pub velocity_lp_coeff: f32,
    /// Length of the per-point sweep time series
    pub time_series_length: usize,
    /// Half width of the slow zone around zero velocity, in bins
    pub slow_zone_half_length: usize,
    /// CFAR guard length, in bins
    pub cfar_guard: usize,
    /// CFAR window length, in bins
    pub cfar_win: usize,
    /// Longest gap bridged by holding the previous velocity, in seconds
    pub max_peak_interval_s: f32,
    /// The sensor configuration
    pub sensor: RadarConfig,
}

impl Default for SurfaceVelocityConfig {
    fn default() -> Self {
        let mut sensor = RadarConfig::default();
        sensor.set_hwaas(16);
        sensor.set_sweep_rate(3000.0);
        sensor.set_num_points(4);
        sensor.set_step_length(12);
        sensor.set_sweeps_per_frame(128);
        sensor.set_frame_rate(0.0);
        sensor.set_double_buffering(true);
        sensor.set_continuous_sweep_mode(true);
        sensor.set_inter_frame_idle_state(RadarIdleState::Ready);
        sensor.set_inter_sweep_idle_state(RadarIdleState::Ready);

        let mut config = Self {
            surface_distance: 1.0,
            sensor_angle: 45.0,
            psd_lp_coeff: 0.75,
            threshold_sensitivity: 0.15,
            velocity_lp_coeff: 0.98,
            time_series_length: 512,
            slow_zone_half_length: 3,
            cfar_guard: 6,
            cfar_win: 6,
            max_peak_interval_s: 4.0,
            sensor,
        };

        config.select_placement();
        config
    }
}

impl SurfaceVelocityConfig {
    /// Derives start point, profile and PRF from the mounting geometry.
    pub fn select_placement(&mut self) {
        let optimal_distance = self.surface_distance
            / libm::cosf(self.sensor_angle * core::f32::consts::PI / 180.0);
        let optimal_point = libm::ceilf(optimal_distance / APPROX_BASE_STEP_LENGTH_M) as i32;
        let start_point = optimal_point
            - ((self.sensor.num_points() as i32 - 1) / 2) * self.sensor.step_length() as i32;

        self.sensor.set_start_point(start_point);

        let profile = RadarProfile::select(start_point, APPROX_BASE_STEP_LENGTH_M);
        self.sensor.set_profile(profile);

        let end_point = self.sensor.end_point();
        self.sensor.set_prf(PulseRepetitionFrequency::select(
            end_point as i16,
            profile,
            APPROX_BASE_STEP_LENGTH_M,
        ));
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor.sweep_rate() == 0.0 {
            return Err(ConfigError::RateNotSet);
        }

        if self.threshold_sensitivity <= 0.0 {
            return Err(ConfigError::InvalidSensitivity);
        }

        if self.sensor.start_point() as f32 * APPROX_BASE_STEP_LENGTH_M <= self.surface_distance {
            return Err(ConfigError::OutOfBounds("start_point"));
        }

        if self.sensor_angle <= 0.0 || self.sensor_angle >= 90.0 {
            return Err(ConfigError::OutOfBounds("sensor_angle"));
        }

        if self.sensor.continuous_sweep_mode()
            && self.sensor.sweeps_per_frame() > self.time_series_length
        {
            return Err(ConfigError::OutOfBounds("sweeps_per_frame"));
        }

        Ok(())
    }
}

/// One surface velocity result.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SurfaceVelocityResult {
    /// Low-passed vertical surface velocity, in m/s
    pub estimated_v: f32,
    /// Distance of the selected surface echo, in meters
    pub distance_m: f32,
}

/// Surface velocity application.
pub struct SurfaceVelocityApp {
    psd_lp_coeff: f32,
    threshold_sensitivity: f32,
    velocity_lp_coeff: f32,
    slow_zone_half_length: usize,
    cfar_win: usize,
    cfar_guard: usize,
    surface_distance: f32,

    max_peak_interval_n: f32,
    sweep_rate: f32,
    step_length: usize,
    start_point: usize,
    base_step_length_m: f32,
    num_distances: usize,
    sweeps_per_frame: usize,
    time_series_length: usize,
    segment_length: usize,
    padded_segment_length_shift: usize,
    middle_index: usize,

    double_buffer_work: Vec<i64>,
    frame_row: Vec<Complex<f32>>,
    time_series: Vec<Complex<f32>>,
    time_series_buffer: Vec<Complex<f32>>,
    fft_out: Vec<Complex<f32>>,
    psds: Vec<f32>,
    lp_psds: Vec<f32>,
    psd: Vec<f32>,
    window: Vec<f32>,
    threshold_check: Vec<bool>,
    bin_rad_vs: Vec<f32>,
    bin_vertical_vs: Vec<f32>,

    update_index: usize,
    wait_n: usize,
    lp_velocity: f32,
    vertical_v: f32,

    peak_indexes: Vec<usize>,
    merged_velocities: Vec<f32>,
    merged_energies: Vec<f32>,
}

impl SurfaceVelocityApp {
    /// Creates the application.
    pub fn new(config: &SurfaceVelocityConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let num_distances = config.sensor.num_points();
        let sweep_rate = config.sensor.sweep_rate();
        let sweeps_per_frame = config.sensor.sweeps_per_frame();

        let estimated_frame_rate = if config.sensor.frame_rate() == 0.0 {
            sweep_rate / sweeps_per_frame as f32
        } else {
            config.sensor.frame_rate()
        };

        let time_series_length = if config.sensor.continuous_sweep_mode() {
            config.time_series_length
        } else {
            sweeps_per_frame
        };

        let mut segment_length = time_series_length / 4;
        if segment_length % 2 != 0 {
            segment_length += 1;
        }

        let mut padded_segment_length_shift = 0usize;
        while (1usize << padded_segment_length_shift) < segment_length {
            padded_segment_length_shift += 1;
        }
        let padded_segment_length = 1usize << padded_segment_length_shift;

        let middle_index = libm::roundf(segment_length as f32 / 2.0) as usize;

        let mut window = vec![0.0f32; segment_length];
        spectrum::hann(&mut window);

        let mut bin_rad_vs = vec![0.0f32; segment_length];
        fft::fftfreq(segment_length, 1.0 / sweep_rate, &mut bin_rad_vs);
        fft::fftshift(&mut bin_rad_vs);

        let perceived_wavelength = perceived_wavelength();
        for bin in bin_rad_vs.iter_mut() {
            *bin *= perceived_wavelength;
        }

        let merged_peaks_length = segment_length / 2;

        Ok(Self {
            psd_lp_coeff: config.psd_lp_coeff,
            threshold_sensitivity: config.threshold_sensitivity,
            velocity_lp_coeff: config.velocity_lp_coeff,
            slow_zone_half_length: config.slow_zone_half_length,
            cfar_win: config.cfar_win,
            cfar_guard: config.cfar_guard,
            surface_distance: config.surface_distance,

            max_peak_interval_n: config.max_peak_interval_s * estimated_frame_rate,
            sweep_rate,
            step_length: config.sensor.step_length(),
            start_point: config.sensor.start_point().max(0) as usize,
            base_step_length_m: APPROX_BASE_STEP_LENGTH_M,
            num_distances,
            sweeps_per_frame,
            time_series_length,
            segment_length,
            padded_segment_length_shift,
            middle_index,

            double_buffer_work: vec![0; sweeps_per_frame.saturating_sub(2)],
            frame_row: vec![Complex::new(0.0, 0.0); num_distances],
            time_series: vec![Complex::new(0.0, 0.0); time_series_length * num_distances],
            time_series_buffer: vec![Complex::new(0.0, 0.0); segment_length],
            fft_out: vec![Complex::new(0.0, 0.0); padded_segment_length],
            psds: vec![0.0; segment_length * num_distances],
            lp_psds: vec![0.0; segment_length * num_distances],
            psd: vec![0.0; segment_length],
            window,
            threshold_check: vec![false; segment_length],
            bin_rad_vs,
            bin_vertical_vs: vec![0.0; segment_length],

            update_index: 0,
            wait_n: 0,
            lp_velocity: 0.0,
            vertical_v: 0.0,

            peak_indexes: vec![0; merged_peaks_length],
            merged_velocities: vec![0.0; merged_peaks_length],
            merged_energies: vec![0.0; merged_peaks_length],
        })
    }

    /// Cumulated velocity spectra: rolls the frame into the time series,
    /// estimates PSDs, low-passes them and picks the distance column with
    /// the strongest echo outside the slow zone.
    fn calc_power_spectral_density(&mut self, frame: &Frame) -> usize {
        for sweep in 0..self.sweeps_per_frame {
            for point in 0..self.num_distances {
                let sample = frame.get(sweep, point);
                self.frame_row[point] = Complex::new(sample.re as f32, sample.im as f32);
            }

            algorithm::roll_and_push_matrix_complex(
                &mut self.time_series,
                self.num_distances,
                &self.frame_row,
                false,
            );
        }

        spectrum::welch_matrix(
            &self.time_series,
            self.num_distances,
            self.segment_length,
            &mut self.time_series_buffer,
            &mut self.fft_out,
            &mut self.psds,
            &self.window,
            self.padded_segment_length_shift,
            self.sweep_rate,
        );

        fft::fftshift_matrix(&mut self.psds, self.num_distances);

        // Until the time series is filled once, track the raw PSD
        if self.update_index * self.sweeps_per_frame < self.time_series_length {
            self.lp_psds.copy_from_slice(&self.psds);
        }

        for (lp, &raw) in self.lp_psds.iter_mut().zip(self.psds.iter()) {
            *lp = *lp * self.psd_lp_coeff + raw * (1.0 - self.psd_lp_coeff);
        }

        let index = peaks::distance_index(
            &self.lp_psds,
            self.num_distances,
            self.middle_index,
            self.slow_zone_half_length,
        );

        for i in 0..self.segment_length {
            self.psd[i] = self.lp_psds[i * self.num_distances + index];
        }

        index
    }

    fn update_threshold(&mut self) {
        for i in 0..self.segment_length {
            let threshold = peaks::mirrored_cfar_threshold(
                &self.psd,
                self.middle_index,
                self.cfar_win,
                self.cfar_guard,
                self.threshold_sensitivity,
                i,
            );

            self.threshold_check[i] = self.psd[i] > threshold;
        }
    }

    fn get_velocity_estimate(&mut self, num_peaks: usize) -> Result<(), CapacityExceeded> {
        self.merged_velocities.fill(0.0);
        self.merged_energies.fill(0.0);

        let num_merged = peaks::merge_peaks(
            MIN_PEAK_VS,
            &self.bin_vertical_vs,
            &self.psd,
            &self.peak_indexes[..num_peaks],
            &mut self.merged_velocities,
            &mut self.merged_energies,
        )?;

        let limit_idx = self.middle_index + self.slow_zone_half_length;
        self.vertical_v = peaks::peak_velocity(
            &self.merged_velocities[..num_merged],
            &self.merged_energies[..num_merged],
            None,
            self.bin_vertical_vs[limit_idx],
        );

        Ok(())
    }

    /// Processes one frame into a velocity estimate.
    pub fn process(&mut self, frame: &mut Frame) -> Result<SurfaceVelocityResult, CapacityExceeded> {
        double_buffering_frame_filter(frame, &mut self.double_buffer_work);

        let distance_index = self.calc_power_spectral_density(frame);
        let distance = algorithm::distance_m(
            self.step_length,
            self.start_point,
            self.base_step_length_m,
            distance_index,
        );
        let angle_correction = angle_correction(self.surface_distance, distance);

        for i in 0..self.segment_length {
            self.bin_vertical_vs[i] = self.bin_rad_vs[i] * angle_correction;
        }

        self.update_threshold();

        let num_peaks =
            peaks::find_peaks(&self.psd, &self.threshold_check, &mut self.peak_indexes)?;

        if num_peaks > 0 {
            let mut max_abs_bin_vertical_v = f32::NEG_INFINITY;
            for &peak in &self.peak_indexes[..num_peaks] {
                let abs_v = libm::fabsf(self.bin_vertical_vs[peak]);
                max_abs_bin_vertical_v = max_abs_bin_vertical_v.max(abs_v);
            }

            if max_abs_bin_vertical_v > self.bin_vertical_vs[self.slow_zone_half_length] {
                self.get_velocity_estimate(num_peaks)?;
            } else {
                let velocity_index = self.middle_index + self.slow_zone_half_length;

                self.vertical_v = peaks::peak_velocity(
                    &self.bin_vertical_vs,
                    &self.psd,
                    Some(&self.peak_indexes[..num_peaks]),
                    self.bin_vertical_vs[velocity_index],
                );
            }

            // A sudden drop against the low-passed velocity is held back
            // for a bounded number of updates
            if libm::fabsf(self.lp_velocity) > 0.0 && self.vertical_v / self.lp_velocity < 0.8 {
                if (self.wait_n as f32) < self.max_peak_interval_n {
                    self.vertical_v = self.lp_velocity;
                    self.wait_n += 1;
                }
            } else {
                self.wait_n = 0;
            }
        } else if (self.wait_n as f32) < self.max_peak_interval_n {
            self.vertical_v = self.lp_velocity;
            self.wait_n += 1;
        } else {
            self.vertical_v = 0.0;
        }

        let sf = algorithm::dynamic_smoothing_factor(self.velocity_lp_coeff, self.update_index as u32);

        if self.update_index * self.sweeps_per_frame > self.time_series_length {
            self.lp_velocity = sf * self.lp_velocity + (1.0 - sf) * self.vertical_v;
        }

        self.update_index += 1;

        Ok(SurfaceVelocityResult {
            estimated_v: self.lp_velocity,
            distance_m: distance,
        })
    }

    /// Processes a service-level measurement result, logging its advisory
    /// status flags.
    ///
    /// A `calibration_needed` indication in the result is for the caller's
    /// measurement loop to act on; the frame is processed either way.
    pub fn process_result(
        &mut self,
        result: &mut ProcessingResult,
    ) -> Result<SurfaceVelocityResult, CapacityExceeded> {
        result.log_advisories();
        self.process(&mut result.frame)
    }
}

/// Doppler wavelength of the 60.5 GHz carrier, halved for the two-way
/// path.
fn perceived_wavelength() -> f32 {
    let speed_of_light = 299_792_458.0f32;
    let radio_frequency = 60.5e9f32;

    (speed_of_light / radio_frequency) / 2.0
}

/// Projection factor from radial to vertical velocity for an echo at
/// `distance` over a surface at `surface_distance`.
fn angle_correction(surface_distance: f32, distance: f32) -> f32 {
    let insonation_angle = libm::asinf(surface_distance / distance);

    1.0 / libm::cosf(insonation_angle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SurfaceVelocityConfig {
        let mut config = SurfaceVelocityConfig::default();
        // Keep the test fast: short time series, few sweeps, quick
        // velocity tracking.
        config.time_series_length = 128;
        config.sensor.set_sweeps_per_frame(64);
        config.sensor.set_sweep_rate(1000.0);
        config.velocity_lp_coeff = 0.5;
        config.max_peak_interval_s = 0.5;
        config.select_placement();
        config
    }

    /// Frame whose sweep dimension carries a complex tone on every
    /// distance point, i.e. a single radial velocity.
    fn doppler_frame(config: &SurfaceVelocityConfig, frame_idx: usize, tone_hz: f32) -> Frame {
        let spf = config.sensor.sweeps_per_frame();
        let points = config.sensor.num_points();
        let sweep_rate = config.sensor.sweep_rate();

        let mut frame = Frame::new(spf, points);
        for sweep in 0..spf {
            let t = (frame_idx * spf + sweep) as f32 / sweep_rate;
            let phase = 2.0 * core::f32::consts::PI * tone_hz * t;
            let sample = Complex::new(
                (3000.0 * phase.cos()) as i16,
                (3000.0 * phase.sin()) as i16,
            );
            for point in 0..points {
                frame.set(sweep, point, sample);
            }
        }
        frame
    }

    #[test]
    fn config_validation_rejects_bad_geometry() {
        let mut config = SurfaceVelocityConfig::default();
        config.sensor_angle = 95.0;
        assert_eq!(
            SurfaceVelocityApp::new(&config).err(),
            Some(ConfigError::OutOfBounds("sensor_angle"))
        );

        let mut config = SurfaceVelocityConfig::default();
        config.threshold_sensitivity = 0.0;
        assert_eq!(
            SurfaceVelocityApp::new(&config).err(),
            Some(ConfigError::InvalidSensitivity)
        );
    }

    #[test]
    fn placement_puts_start_point_beyond_surface() {
        let config = SurfaceVelocityConfig::default();
        // 1 m surface at 45 degrees: boresight distance ~1.41 m.
        assert!(config.sensor.start_point() as f32 * APPROX_BASE_STEP_LENGTH_M > 1.0);
    }

    #[test]
    fn doppler_tone_produces_a_velocity() {
        let config = test_config();
        let mut app = SurfaceVelocityApp::new(&config).unwrap();

        // 100 Hz Doppler at ~2.48 mm wavelength: radial ~0.248 m/s.
        let mut result = SurfaceVelocityResult {
            estimated_v: 0.0,
            distance_m: 0.0,
        };
        for frame_idx in 0..24 {
            let mut frame = doppler_frame(&config, frame_idx, 100.0);
            result = app.process(&mut frame).unwrap();
        }

        let radial = 100.0 * perceived_wavelength();
        let expected = radial * angle_correction(1.0, result.distance_m);

        assert!(
            (result.estimated_v - expected).abs() < 0.35 * expected,
            "expected ~{} m/s, got {}",
            expected,
            result.estimated_v
        );
    }

    #[test]
    fn silence_decays_velocity_to_zero() {
        let config = test_config();
        let mut app = SurfaceVelocityApp::new(&config).unwrap();

        for frame_idx in 0..8 {
            let mut frame = doppler_frame(&config, frame_idx, 100.0);
            app.process(&mut frame).unwrap();
        }

        // Noise-free empty frames produce no peaks; after the hold-over
        // budget the reported velocity must fall back to zero.
        let mut last = SurfaceVelocityResult {
            estimated_v: 1.0,
            distance_m: 0.0,
        };
        for _ in 0..80 {
            let mut frame = Frame::new(
                config.sensor.sweeps_per_frame(),
                config.sensor.num_points(),
            );
            last = app.process(&mut frame).unwrap();
        }

        assert!(
            last.estimated_v.abs() < 0.05,
            "velocity did not decay: {}",
            last.estimated_v
        );
    }
}
