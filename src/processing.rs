//! Service-level processing results.

use crate::algorithm::frame::Frame;

/// Static properties of the configured measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProcessingMetadata {
    /// Number of IQ samples in a frame
    pub frame_data_length: usize,
    /// Number of IQ samples in a sweep
    pub sweep_data_length: usize,
    /// Distance between two points, in meters
    pub step_length_m: f32,
    /// Distance of the first point, in meters
    pub start_m: f32,
    /// Maximum sweep rate the configuration supports, in Hz
    pub max_sweep_rate: f32,
}

/// One processed measurement: the IQ frame plus the sensor status that came
/// with it.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The acquired frame
    pub frame: Frame,
    /// Sensor temperature during the measurement, in degrees Celsius
    pub temperature: i16,
    /// The temperature has drifted outside the calibration's valid window;
    /// the sensor must be recalibrated before results can be trusted.
    /// This is a recoverable control-flow signal, not an error.
    pub calibration_needed: bool,
    /// Data saturation detected; advisory only
    pub data_saturated: bool,
    /// The frame was delayed; advisory only
    pub frame_delayed: bool,
}

impl ProcessingResult {
    /// Logs the advisory status flags. Neither aborts processing.
    pub fn log_advisories(&self) {
        if self.data_saturated {
            log::warn!("data saturated, lower the receiver gain");
        }

        if self.frame_delayed {
            log::warn!("frame delayed");
        }
    }
}
