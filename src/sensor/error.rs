//! Sensor error types.

use core::fmt;

/// Errors from sensor I/O and the calibration lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// The sensor interrupt did not fire within the configured timeout.
    ///
    /// The pending operation is aborted; the caller decides whether to
    /// restart the pipeline.
    InterruptTimeout,
    /// Sensor calibration failed after the retry
    CalibrationFailed,
    /// Preparing the sensor for measurement failed
    PrepareFailed,
    /// Starting a measurement failed
    MeasurementFailed,
    /// Reading out measurement data failed
    ReadFailed,
    /// Entering or leaving hibernation failed
    HibernateFailed,
    /// A caller-supplied buffer is smaller than the required size
    BufferTooSmall,
    /// Low-level bus or hardware failure
    Io,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::InterruptTimeout => write!(f, "sensor interrupt timeout"),
            SensorError::CalibrationFailed => write!(f, "sensor calibration failed"),
            SensorError::PrepareFailed => write!(f, "sensor prepare failed"),
            SensorError::MeasurementFailed => write!(f, "sensor measure failed"),
            SensorError::ReadFailed => write!(f, "sensor read failed"),
            SensorError::HibernateFailed => write!(f, "sensor hibernate transition failed"),
            SensorError::BufferTooSmall => write!(f, "buffer too small"),
            SensorError::Io => write!(f, "sensor i/o failure"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SensorError {}
