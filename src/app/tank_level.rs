//! Tank level reference application.
//!
//! Measures the filling level of a tank as the distance from the sensor at
//! the top to the liquid surface. Raw distance results are smoothed with a
//! median filter followed by a mean of medians; an object touching the near
//! edge of the measured range is promoted to an overflow indication when it
//! persists across the majority of a filter window.

use alloc::vec;
use alloc::vec::Vec;

use crate::detector::distance::{
    DistanceConfig, DistanceDetector, DistanceResult, PeakSorting, ReflectorShape,
};

/// Tank geometry presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TankPreset {
    /// Up to roughly half a meter
    Small,
    /// Up to roughly 6 meters
    Medium,
    /// Up to roughly 10 meters
    Large,
}

/// Tank level application configuration.
#[derive(Debug, Clone)]
pub struct TankLevelConfig {
    /// Distance from the sensor to the top of the tank, in meters
    pub tank_range_start_m: f32,
    /// Distance from the sensor to the bottom of the tank, in meters
    pub tank_range_end_m: f32,
    /// Number of raw levels per median
    pub median_filter_length: usize,
    /// Number of medians averaged into one reported level
    pub num_medians_to_average: usize,
    /// Configuration of the underlying distance detector
    pub distance: DistanceConfig,
}

impl TankLevelConfig {
    /// Creates the configuration for a tank preset.
    pub fn preset(preset: TankPreset) -> Self {
        let mut config = match preset {
            TankPreset::Small => Self {
                tank_range_start_m: 0.03,
                tank_range_end_m: 0.5,
                median_filter_length: 5,
                num_medians_to_average: 5,
                distance: DistanceConfig::default(),
            },
            TankPreset::Medium => Self {
                tank_range_start_m: 0.05,
                tank_range_end_m: 6.0,
                median_filter_length: 3,
                num_medians_to_average: 3,
                distance: DistanceConfig::default(),
            },
            TankPreset::Large => Self {
                tank_range_start_m: 0.1,
                tank_range_end_m: 10.0,
                median_filter_length: 3,
                num_medians_to_average: 1,
                distance: DistanceConfig::default(),
            },
        };

        let (max_step_length, max_profile, peak_sorting) = match preset {
            TankPreset::Small => (
                2,
                crate::config::RadarProfile::AccProfile2,
                PeakSorting::Closest,
            ),
            TankPreset::Medium => (
                0,
                crate::config::RadarProfile::AccProfile3,
                PeakSorting::Strongest,
            ),
            TankPreset::Large => (
                0,
                crate::config::RadarProfile::AccProfile5,
                PeakSorting::Strongest,
            ),
        };

        config.distance.set_start_m(config.detector_start_m());
        config.distance.set_end_m(config.detector_end_m());
        config.distance.set_max_step_length(max_step_length);
        config.distance.set_max_profile(max_profile);
        config.distance.set_num_frames_recorded_threshold(50);
        config.distance.set_peak_sorting(peak_sorting);
        config.distance.set_reflector_shape(ReflectorShape::Planar);
        config.distance.set_threshold_sensitivity(0.0);
        config.distance.set_signal_quality(20.0);
        config.distance.set_close_range_leakage_cancellation(true);

        config
    }

    /// Detector range start: 15 mm above the tank top so the full tank is
    /// covered.
    pub fn detector_start_m(&self) -> f32 {
        self.tank_range_start_m - 0.015
    }

    /// Detector range end: 5 % beyond the tank bottom.
    pub fn detector_end_m(&self) -> f32 {
        self.tank_range_end_m * 1.05
    }
}

/// Classification of one reported level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeakStatus {
    /// Level within the configured tank range
    InRange,
    /// No surface echo detected
    NoDetection,
    /// Level above the tank top
    Overflow,
    /// Level below the tank bottom
    OutOfRange,
}

/// One tank level processing result.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TankLevelResult {
    /// A surface echo was detected this frame
    pub peak_detected: bool,
    /// Classification of the filtered level
    pub peak_status: PeakStatus,
    /// Filtered level above the tank bottom, in meters; NaN outside the
    /// valid range
    pub level: f32,
    /// A full mean-of-medians window completed this frame
    pub result_ready: bool,
}

/// Tank level application.
pub struct TankLevelApp {
    tank_range_start_m: f32,
    tank_range_end_m: f32,

    level_history: Vec<f32>,
    median_vector: Vec<f32>,
    median_counter: usize,
    mean_counter: usize,
    median_edge_status_count: usize,
    mean_edge_status_count: usize,
}

impl TankLevelApp {
    /// Creates the application.
    pub fn new(config: &TankLevelConfig) -> Self {
        Self {
            tank_range_start_m: config.tank_range_start_m,
            tank_range_end_m: config.tank_range_end_m,
            level_history: vec![0.0; config.median_filter_length],
            median_vector: vec![0.0; config.num_medians_to_average],
            median_counter: 0,
            mean_counter: 0,
            median_edge_status_count: 0,
            mean_edge_status_count: 0,
        }
    }

    /// Processes one distance detector result.
    pub fn process(&mut self, distance_result: &DistanceResult) -> TankLevelResult {
        let mut result = TankLevelResult {
            peak_detected: false,
            peak_status: PeakStatus::NoDetection,
            level: 0.0,
            result_ready: false,
        };

        let mut level = if let Some(&first) = distance_result.distances.first() {
            result.peak_detected = true;
            self.tank_range_end_m - first
        } else {
            f32::NAN
        };

        if distance_result.near_start_edge_status {
            self.median_edge_status_count += 1;
        }

        self.level_history[self.median_counter] = level;
        self.median_counter += 1;

        if self.median_counter == self.level_history.len() {
            let med = median(&mut self.level_history);

            self.median_vector[self.mean_counter] = med;
            self.mean_counter += 1;

            if self.median_edge_status_count > self.level_history.len() / 2 {
                self.mean_edge_status_count += 1;
            }

            self.median_counter = 0;
            self.median_edge_status_count = 0;
        }

        if self.mean_counter == self.median_vector.len() {
            level = nanmean(&self.median_vector);

            if !level.is_nan() {
                if level < 0.0 {
                    result.peak_status = PeakStatus::OutOfRange;
                } else if level > (self.tank_range_end_m - self.tank_range_start_m) {
                    result.peak_status = PeakStatus::Overflow;
                } else {
                    result.peak_status = PeakStatus::InRange;
                    result.level = level;
                }
            } else if self.mean_edge_status_count > self.median_vector.len() / 2 {
                result.peak_status = PeakStatus::Overflow;
            }

            if result.peak_status == PeakStatus::Overflow
                || result.peak_status == PeakStatus::OutOfRange
            {
                result.level = f32::NAN;
            }

            result.result_ready = true;
            self.mean_counter = 0;
            self.mean_edge_status_count = 0;
        }

        result
    }
}

/// Median of the array; NaN if any element is NaN. Sorts in place.
fn median(array: &mut [f32]) -> f32 {
    if array.iter().any(|x| x.is_nan()) {
        return f32::NAN;
    }

    array.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal));

    let n = array.len() / 2;
    if array.len() % 2 == 0 {
        (array[n - 1] + array[n]) / 2.0
    } else {
        array[n]
    }
}

/// Mean over the non-NaN elements; NaN if none remain.
fn nanmean(array: &[f32]) -> f32 {
    let mut samples = 0usize;
    let mut sum = 0.0f32;

    for &value in array {
        if !value.is_nan() {
            samples += 1;
            sum += value;
        }
    }

    if samples > 0 {
        sum / samples as f32
    } else {
        f32::NAN
    }
}

/// Drives a [`DistanceDetector`] into a stream of tank level results,
/// handling the recalibration signal.
pub struct TankLevelSession<D: DistanceDetector> {
    detector: D,
    app: TankLevelApp,
}

impl<D: DistanceDetector> TankLevelSession<D> {
    /// Creates a session over a calibrated detector.
    pub fn new(detector: D, config: &TankLevelConfig) -> Self {
        Self {
            detector,
            app: TankLevelApp::new(config),
        }
    }

    /// Runs one measurement and processes it.
    ///
    /// A `calibration_needed` indication triggers the cheap detector
    /// recalibration path before the next call; the processed result of
    /// the current frame is still returned.
    pub fn next_level(&mut self) -> Result<TankLevelResult, D::Error> {
        let distance_result = self.detector.measure()?;
        let result = self.app.process(&distance_result);

        if distance_result.calibration_needed {
            log::info!("sensor and detector recalibration needed");
            self.detector.update_calibration()?;
            log::info!("recalibration done");
        }

        Ok(result)
    }

    /// Releases the detector.
    pub fn into_detector(self) -> D {
        self.detector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(distance: f32) -> DistanceResult {
        DistanceResult {
            distances: vec![distance],
            strengths: vec![1000.0],
            near_start_edge_status: false,
            calibration_needed: false,
            temperature: 25,
        }
    }

    fn no_detection() -> DistanceResult {
        DistanceResult::default()
    }

    fn small_tank_app() -> TankLevelApp {
        TankLevelApp::new(&TankLevelConfig::preset(TankPreset::Small))
    }

    #[test]
    fn median_rejects_single_outlier() {
        let mut array = [0.3f32, 0.31, 5.0, 0.29, 0.3];
        approx::assert_relative_eq!(median(&mut array), 0.3);
    }

    #[test]
    fn median_propagates_nan() {
        let mut array = [0.3f32, f32::NAN, 0.29];
        assert!(median(&mut array).is_nan());
    }

    #[test]
    fn nanmean_skips_nan_values() {
        approx::assert_relative_eq!(nanmean(&[1.0, f32::NAN, 3.0]), 2.0);
        assert!(nanmean(&[f32::NAN, f32::NAN]).is_nan());
    }

    #[test]
    fn result_ready_after_full_filter_window() {
        // Small tank: 5 levels per median, 5 medians per mean.
        let mut app = small_tank_app();

        let mut ready_count = 0;
        for i in 0..25 {
            let result = app.process(&detection(0.2));
            if result.result_ready {
                ready_count += 1;
                assert_eq!(result.peak_status, PeakStatus::InRange);
                // Level = tank end - distance = 0.5 - 0.2
                approx::assert_relative_eq!(result.level, 0.3, epsilon = 1e-6);
                assert_eq!(i, 24);
            }
        }

        assert_eq!(ready_count, 1);
    }

    #[test]
    fn missing_detections_produce_nan_level() {
        let mut app = small_tank_app();

        let mut last = None;
        for _ in 0..25 {
            last = Some(app.process(&no_detection()));
        }

        let last = last.unwrap();
        assert!(last.result_ready);
        assert_eq!(last.peak_status, PeakStatus::NoDetection);
    }

    #[test]
    fn persistent_near_edge_echo_promotes_to_overflow() {
        let mut app = small_tank_app();

        let mut result = None;
        for _ in 0..25 {
            let mut r = no_detection();
            r.near_start_edge_status = true;
            result = Some(app.process(&r));
        }

        let result = result.unwrap();
        assert!(result.result_ready);
        assert_eq!(result.peak_status, PeakStatus::Overflow);
        assert!(result.level.is_nan());
    }

    #[test]
    fn level_beyond_tank_top_is_overflow() {
        let mut app = small_tank_app();

        // Distance 0.01 m -> level 0.49 m > 0.5 - 0.03 range.
        let mut result = None;
        for _ in 0..25 {
            result = Some(app.process(&detection(0.01)));
        }

        let result = result.unwrap();
        assert!(result.result_ready);
        assert_eq!(result.peak_status, PeakStatus::Overflow);
    }

    #[test]
    fn level_below_tank_bottom_is_out_of_range() {
        let mut app = small_tank_app();

        // Distance beyond the tank end gives a negative level.
        let mut result = None;
        for _ in 0..25 {
            result = Some(app.process(&detection(0.6)));
        }

        let result = result.unwrap();
        assert!(result.result_ready);
        assert_eq!(result.peak_status, PeakStatus::OutOfRange);
        assert!(result.level.is_nan());
    }

    struct ScriptedDetector {
        results: alloc::vec::Vec<DistanceResult>,
        next: usize,
        full_calibrations: usize,
        updates: usize,
    }

    impl DistanceDetector for ScriptedDetector {
        type Error = ();

        fn calibrate_detector(&mut self) -> Result<(), ()> {
            self.full_calibrations += 1;
            Ok(())
        }

        fn update_calibration(&mut self) -> Result<(), ()> {
            self.updates += 1;
            Ok(())
        }

        fn measure(&mut self) -> Result<DistanceResult, ()> {
            let result = self.results[self.next].clone();
            self.next += 1;
            Ok(result)
        }
    }

    #[test]
    fn session_recalibrates_on_indication() {
        let mut needing = detection(0.2);
        needing.calibration_needed = true;

        let detector = ScriptedDetector {
            results: vec![detection(0.2), needing, detection(0.2)],
            next: 0,
            full_calibrations: 0,
            updates: 0,
        };

        let config = TankLevelConfig::preset(TankPreset::Small);
        let mut session = TankLevelSession::new(detector, &config);

        session.next_level().unwrap();
        session.next_level().unwrap();
        session.next_level().unwrap();

        let detector = session.into_detector();
        assert_eq!(detector.updates, 1);
        assert_eq!(detector.full_calibrations, 0);
    }
}
