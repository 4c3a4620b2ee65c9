//! Distance detector boundary.
//!
//! The distance detector reports the distances and reflective strengths of
//! detected objects. Like the presence detector it runs inside the
//! proprietary radar stack; [`DistanceDetector`] is the seam consumed by
//! the applications.
//!
//! The detector carries two calibration layers on top of the sensor
//! calibration: a static part recorded once, and a dynamic,
//! temperature-dependent part. After a `calibration_needed` indication only
//! the dynamic part has to be refreshed
//! ([`update_calibration`](DistanceDetector::update_calibration)), which is
//! considerably cheaper than a full
//! [`calibrate_detector`](DistanceDetector::calibrate_detector) pass.

use alloc::vec::Vec;

use crate::config::profile::RadarProfile;

/// Ordering of reported distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeakSorting {
    /// Closest peak first
    Closest,
    /// Strongest peak first
    Strongest,
}

/// Expected shape of the reflecting object, affecting strength estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReflectorShape {
    /// Unknown or irregular reflector
    Generic,
    /// Flat reflector such as a liquid surface
    Planar,
}

/// Threshold method used for detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThresholdMethod {
    /// Adaptive threshold from local noise statistics
    Cfar,
    /// Threshold recorded from the empty scene
    Recorded,
    /// Fixed amplitude threshold
    FixedAmplitude,
    /// Fixed strength threshold
    FixedStrength,
}

/// Configuration for the radar distance detection.
#[derive(Debug, Clone)]
pub struct DistanceConfig {
    start_m: f32,
    end_m: f32,
    max_step_length: usize,
    max_profile: RadarProfile,
    num_frames_recorded_threshold: usize,
    peak_sorting: PeakSorting,
    reflector_shape: ReflectorShape,
    threshold_method: ThresholdMethod,
    threshold_sensitivity: f32,
    signal_quality: f32,
    close_range_leakage_cancellation: bool,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            start_m: 0.25,
            end_m: 3.0,
            max_step_length: 0,
            max_profile: RadarProfile::AccProfile5,
            num_frames_recorded_threshold: 100,
            peak_sorting: PeakSorting::Strongest,
            reflector_shape: ReflectorShape::Generic,
            threshold_method: ThresholdMethod::Cfar,
            threshold_sensitivity: 0.5,
            signal_quality: 15.0,
            close_range_leakage_cancellation: false,
        }
    }
}

impl DistanceConfig {
    /// Sets the start of the measured interval in meters.
    pub fn set_start_m(&mut self, start_m: f32) {
        self.start_m = start_m;
    }

    /// Start of the measured interval in meters.
    pub fn start_m(&self) -> f32 {
        self.start_m
    }

    /// Sets the end of the measured interval in meters.
    pub fn set_end_m(&mut self, end_m: f32) {
        self.end_m = end_m;
    }

    /// End of the measured interval in meters.
    pub fn end_m(&self) -> f32 {
        self.end_m
    }

    /// Limits the step length; `0` leaves the choice to the detector.
    pub fn set_max_step_length(&mut self, max_step_length: usize) {
        self.max_step_length = max_step_length;
    }

    /// Maximum step length, `0` when unrestricted.
    pub fn max_step_length(&self) -> usize {
        self.max_step_length
    }

    /// Sets the highest profile the detector may use.
    pub fn set_max_profile(&mut self, max_profile: RadarProfile) {
        self.max_profile = max_profile;
    }

    /// Highest profile the detector may use.
    pub fn max_profile(&self) -> RadarProfile {
        self.max_profile
    }

    /// Sets the number of frames recorded for the recorded-threshold
    /// method.
    pub fn set_num_frames_recorded_threshold(&mut self, frames: usize) {
        self.num_frames_recorded_threshold = frames;
    }

    /// Number of frames recorded for the recorded-threshold method.
    pub fn num_frames_recorded_threshold(&self) -> usize {
        self.num_frames_recorded_threshold
    }

    /// Sets the ordering of reported distances.
    pub fn set_peak_sorting(&mut self, peak_sorting: PeakSorting) {
        self.peak_sorting = peak_sorting;
    }

    /// Ordering of reported distances.
    pub fn peak_sorting(&self) -> PeakSorting {
        self.peak_sorting
    }

    /// Sets the expected reflector shape.
    pub fn set_reflector_shape(&mut self, reflector_shape: ReflectorShape) {
        self.reflector_shape = reflector_shape;
    }

    /// Expected reflector shape.
    pub fn reflector_shape(&self) -> ReflectorShape {
        self.reflector_shape
    }

    /// Sets the threshold method.
    pub fn set_threshold_method(&mut self, threshold_method: ThresholdMethod) {
        self.threshold_method = threshold_method;
    }

    /// The threshold method.
    pub fn threshold_method(&self) -> ThresholdMethod {
        self.threshold_method
    }

    /// Sets the threshold sensitivity. Higher values detect weaker echoes.
    pub fn set_threshold_sensitivity(&mut self, sensitivity: f32) {
        self.threshold_sensitivity = sensitivity;
    }

    /// The threshold sensitivity.
    pub fn threshold_sensitivity(&self) -> f32 {
        self.threshold_sensitivity
    }

    /// Sets the signal quality target.
    pub fn set_signal_quality(&mut self, signal_quality: f32) {
        self.signal_quality = signal_quality;
    }

    /// The signal quality target.
    pub fn signal_quality(&self) -> f32 {
        self.signal_quality
    }

    /// Enables cancellation of direct leakage for measurements starting
    /// close to the sensor.
    pub fn set_close_range_leakage_cancellation(&mut self, enable: bool) {
        self.close_range_leakage_cancellation = enable;
    }

    /// Whether close-range leakage cancellation is enabled.
    pub fn close_range_leakage_cancellation(&self) -> bool {
        self.close_range_leakage_cancellation
    }
}

/// One distance detection result.
#[derive(Debug, Clone, Default)]
pub struct DistanceResult {
    /// Detected distances in meters, ordered by the configured peak sorting
    pub distances: Vec<f32>,
    /// Reflective strength of each detected distance
    pub strengths: Vec<f32>,
    /// An object may extend beyond the near edge of the measured range
    pub near_start_edge_status: bool,
    /// The sensor calibration is no longer valid at the current
    /// temperature; sensor and detector must be recalibrated
    pub calibration_needed: bool,
    /// Sensor temperature during the measurement, in degrees Celsius
    pub temperature: i16,
}

/// One calibrated distance detector instance.
pub trait DistanceDetector {
    /// Detector failure type.
    type Error;

    /// Runs the full detector calibration, static and dynamic parts.
    fn calibrate_detector(&mut self) -> Result<(), Self::Error>;

    /// Refreshes only the dynamic, temperature-dependent calibration part.
    fn update_calibration(&mut self) -> Result<(), Self::Error>;

    /// Runs prepared measure/process cycles until a result is available.
    fn measure(&mut self) -> Result<DistanceResult, Self::Error>;
}
