//! Sensor calibration and temperature-indexed calibration caching.
//!
//! A calibration is valid within a temperature window around the
//! temperature it was produced at. [`CalibrationCache`] keeps a bounded
//! table of calibrations so a temperature swing back into a previously seen
//! range reuses the stored result instead of re-running the calibration.

use core::fmt;

use crate::sensor::error::SensorError;
use crate::sensor::{RadarSensor, SensorControl};

/// Size of the opaque calibration data, in 32-bit words.
const CAL_RESULT_WORDS: usize = 48;

/// A calibration is valid this far from its creation temperature when the
/// ambient temperature is uncontrolled.
pub const MAX_CAL_TEMP_DIFF: i16 = 16;

/// Valid temperature distance when the temperature is controlled during
/// caching (for example in factory calibration).
pub const MAX_CAL_TEMP_DIFF_CONTROLLED: i16 = 30;

/// Assumed operating span, -40 to 85 degrees Celsius.
pub const MAX_TEMP_VARIATION: i16 = 125;

/// Cache slots needed to cover the operating span with uncontrolled
/// temperature.
pub const MAX_CACHE_COUNT: usize = (MAX_TEMP_VARIATION / MAX_CAL_TEMP_DIFF) as usize + 1;

/// Random disturbances can fail a calibration; it is retried this many
/// times.
const CALIBRATION_RETRIES: usize = 1;

/// Opaque sensor calibration blob.
///
/// Produced by the sensor, never inspected by this crate; only
/// [`RadarSensor::cal_info`] can decode it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationResult {
    data: [u32; CAL_RESULT_WORDS],
}

impl Default for CalibrationResult {
    fn default() -> Self {
        Self {
            data: [0; CAL_RESULT_WORDS],
        }
    }
}

impl CalibrationResult {
    /// Raw calibration words, for the sensor implementation.
    pub fn data(&self) -> &[u32] {
        &self.data
    }

    /// Mutable raw calibration words, for the sensor implementation.
    pub fn data_mut(&mut self) -> &mut [u32] {
        &mut self.data
    }
}

/// Decoded calibration info.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationInfo {
    /// Sensor temperature at calibration time, in degrees Celsius
    pub temperature: i16,
}

/// The calibration cache is full and no stored entry matches the current
/// temperature.
///
/// No eviction is defined; this is fatal for the configuration. Size the
/// cache from the operating span instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CacheFull;

impl fmt::Display for CacheFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "calibration cache full")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CacheFull {}

/// Runs a sensor calibration with the standard retry policy.
///
/// Each attempt (at most two) is preceded by a disable/enable cycle to
/// reset sensor state, and the calibration is stepped through
/// interrupt waits until the sensor reports completion. After a successful
/// calibration the sensor is cycled once more to flush residual state; it
/// must be prepared again before measuring.
pub fn calibrate_with_retry<S, C>(
    sensor: &mut S,
    control: &mut C,
    work: &mut [u8],
    timeout_ms: u32,
) -> Result<CalibrationResult, SensorError>
where
    S: RadarSensor,
    C: SensorControl,
{
    let mut cal_result = CalibrationResult::default();
    let mut outcome = Err(SensorError::CalibrationFailed);

    for attempt in 0..=CALIBRATION_RETRIES {
        if attempt > 0 {
            log::warn!("sensor calibration failed, retrying");
        }

        control.disable();
        control.enable();

        outcome = loop {
            match sensor.calibrate(&mut cal_result, work) {
                Ok(true) => break Ok(()),
                Ok(false) => {
                    if let Err(e) = sensor.wait_for_interrupt(timeout_ms) {
                        break Err(e);
                    }
                }
                Err(e) => break Err(e),
            }
        };

        if outcome.is_ok() {
            break;
        }
    }

    outcome?;

    control.disable();
    control.enable();

    Ok(cal_result)
}

/// Bounded table of calibrations indexed by creation temperature.
///
/// The default size [`MAX_CACHE_COUNT`] covers the full operating span at
/// the uncontrolled temperature window.
pub struct CalibrationCache<const N: usize = MAX_CACHE_COUNT> {
    results: [CalibrationResult; N],
    temps: [i16; N],
    len: usize,
    max_temp_diff: i16,
}

impl<const N: usize> Default for CalibrationCache<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CalibrationCache<N> {
    /// Creates an empty cache for uncontrolled ambient temperature
    /// (entries valid within [`MAX_CAL_TEMP_DIFF`]).
    pub fn new() -> Self {
        Self::with_max_temp_diff(MAX_CAL_TEMP_DIFF)
    }

    /// Creates an empty cache for controlled-temperature caching (entries
    /// valid within [`MAX_CAL_TEMP_DIFF_CONTROLLED`]).
    pub fn new_controlled() -> Self {
        Self::with_max_temp_diff(MAX_CAL_TEMP_DIFF_CONTROLLED)
    }

    /// Creates an empty cache with a custom validity window.
    pub fn with_max_temp_diff(max_temp_diff: i16) -> Self {
        Self {
            results: core::array::from_fn(|_| CalibrationResult::default()),
            temps: [0; N],
            len: 0,
            max_temp_diff,
        }
    }

    /// Number of stored calibrations.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the cache holds no calibration.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Looks up the cached calibration closest to `temp`.
    ///
    /// Among entries within the validity window, the one with the smallest
    /// temperature distance wins, not the first match; overlapping entries
    /// would otherwise return a worse calibration.
    pub fn lookup(&self, temp: i16) -> Option<&CalibrationResult> {
        self.lookup_index(temp).map(|index| &self.results[index])
    }

    fn lookup_index(&self, temp: i16) -> Option<usize> {
        let mut best: Option<usize> = None;
        let mut min_temp_diff = i16::MAX;

        for index in 0..self.len {
            let temp_diff = (self.temps[index] - temp).abs();

            if temp_diff < self.max_temp_diff && temp_diff < min_temp_diff {
                min_temp_diff = temp_diff;
                best = Some(index);
            }
        }

        best
    }

    /// Stores a calibration produced at `temp`.
    ///
    /// Entries are never replaced; with a full cache and no entry valid for
    /// the current temperature the configuration has run out of slots and
    /// [`CacheFull`] is returned.
    pub fn insert(&mut self, cal_result: CalibrationResult, temp: i16) -> Result<(), CacheFull> {
        if self.len == N {
            return Err(CacheFull);
        }

        self.results[self.len] = cal_result;
        self.temps[self.len] = temp;
        self.len += 1;

        log::debug!("calibration cached for {} degC ({}/{} slots)", temp, self.len, N);

        Ok(())
    }

    /// Returns a calibration valid at `temp`, calibrating the sensor and
    /// caching the result when no stored entry qualifies.
    ///
    /// With an unknown temperature (`None`), for example before the first
    /// measurement, a new calibration is always performed.
    pub fn ensure<S, C>(
        &mut self,
        sensor: &mut S,
        control: &mut C,
        temp: Option<i16>,
        work: &mut [u8],
        timeout_ms: u32,
    ) -> Result<&CalibrationResult, EnsureError>
    where
        S: RadarSensor,
        C: SensorControl,
    {
        if let Some(temp) = temp {
            if let Some(index) = self.lookup_index(temp) {
                log::info!("using cached calibration for {} degC", temp);
                return Ok(&self.results[index]);
            }
        }

        if self.is_full() {
            return Err(EnsureError::Cache(CacheFull));
        }

        log::info!("performing new sensor calibration");

        let cal_result = calibrate_with_retry(sensor, control, work, timeout_ms)
            .map_err(EnsureError::Sensor)?;
        let info = sensor.cal_info(&cal_result);

        self.insert(cal_result, info.temperature)
            .map_err(EnsureError::Cache)?;

        Ok(&self.results[self.len - 1])
    }
}

/// Error of [`CalibrationCache::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EnsureError {
    /// Calibration itself failed
    Sensor(SensorError),
    /// No free slot and no valid entry
    Cache(CacheFull),
}

impl fmt::Display for EnsureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnsureError::Sensor(e) => write!(f, "calibration failed: {}", e),
            EnsureError::Cache(e) => e.fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EnsureError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn cal_with_marker(marker: u32) -> CalibrationResult {
        let mut cal = CalibrationResult::default();
        cal.data_mut()[0] = marker;
        cal
    }

    #[test]
    fn lookup_picks_nearest_entry_not_first_match() {
        let mut cache: CalibrationCache<4> = CalibrationCache::new();
        cache.insert(cal_with_marker(10), 10).unwrap();
        cache.insert(cal_with_marker(40), 40).unwrap();

        // 30 degC is within 16 of 40 (diff 10) but not of 10 (diff 20).
        let hit = cache.lookup(30).unwrap();
        assert_eq!(hit.data()[0], 40);

        // 24 degC matches both; 10 is closer than 40.
        let hit = cache.lookup(24).unwrap();
        assert_eq!(hit.data()[0], 10);
    }

    #[test]
    fn lookup_misses_outside_validity_window() {
        let mut cache: CalibrationCache<4> = CalibrationCache::new();
        cache.insert(cal_with_marker(10), 10).unwrap();
        cache.insert(cal_with_marker(40), 40).unwrap();

        assert!(cache.lookup(60).is_none());
        assert!(cache.lookup(-10).is_none());
    }

    #[test]
    fn controlled_cache_has_wider_window() {
        let mut cache: CalibrationCache<4> = CalibrationCache::new_controlled();
        cache.insert(cal_with_marker(25), 25).unwrap();

        assert!(cache.lookup(54).is_some());
        assert!(cache.lookup(55).is_none());
    }

    #[test]
    fn insert_into_full_cache_fails() {
        let mut cache: CalibrationCache<2> = CalibrationCache::new();
        cache.insert(CalibrationResult::default(), 0).unwrap();
        cache.insert(CalibrationResult::default(), 20).unwrap();

        assert!(cache.is_full());
        assert_eq!(cache.insert(CalibrationResult::default(), 40), Err(CacheFull));
    }

    #[test]
    fn cache_size_covers_operating_span() {
        assert_eq!(MAX_CACHE_COUNT, 8);
    }
}
