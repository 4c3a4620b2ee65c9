//! Presence detector results.

use alloc::vec::Vec;
use core::fmt;

use crate::algorithm::frame::Frame;

/// Static properties of a configured presence measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PresenceMetadata {
    /// Distance of the first measured point, in meters
    pub start_m: f32,
    /// Distance between two points, in meters
    pub step_length_m: f32,
    /// Number of measured points
    pub num_points: usize,
    /// Actual frame rate, in Hz
    pub frame_rate: f32,
}

/// One presence detection result.
#[derive(Debug, Clone)]
pub struct PresenceResult {
    /// Presence detected by either motion score
    pub presence_detected: bool,
    /// Distance of the detected presence, in meters
    pub presence_distance: f32,
    /// Fast-motion score
    pub intra_presence_score: f32,
    /// Slow-motion score
    pub inter_presence_score: f32,
    /// Fast-motion score per distance point
    pub depthwise_intra_presence_scores: Vec<f32>,
    /// Slow-motion score per distance point
    pub depthwise_inter_presence_scores: Vec<f32>,
    /// The IQ frame the result was computed from
    pub frame: Frame,
    /// Sensor temperature during the measurement, in degrees Celsius
    pub temperature: i16,
    /// The sensor calibration is no longer valid at the current
    /// temperature; recalibrate before trusting further results
    pub calibration_needed: bool,
}

/// Presence data processing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProcessDataError {
    /// The detector failed to process the measurement data
    ProcessingFailed,
}

impl fmt::Display for ProcessDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessDataError::ProcessingFailed => write!(f, "presence processing failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ProcessDataError {}
