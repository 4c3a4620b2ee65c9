//! Sensor lifecycle.
//!
//! [`Radar`] owns the sensor and its control pins and walks them through
//! the calibration lifecycle with a typestate: a radar starts [`Enabled`],
//! produces a calibration, and becomes [`Ready`] once the sensor is
//! prepared with one. Measuring is only available on `Radar<Ready>`, so a
//! measurement on an unprepared sensor does not compile.
//!
//! A `calibration_needed` indication in a measurement result is handled by
//! going through [`Radar::recalibrate`] and preparing again, optionally via
//! a [`CalibrationCache`](crate::sensor::calibration::CalibrationCache) to
//! skip calibrations at temperatures seen before.

use core::marker::PhantomData;

use crate::config::RadarConfig;
use crate::sensor::calibration::{calibrate_with_retry, CalibrationInfo, CalibrationResult};
use crate::sensor::error::SensorError;
use crate::sensor::{RadarSensor, SensorControl};

/// Default sensor interrupt timeout.
pub const SENSOR_TIMEOUT_MS: u32 = 1000;

/// Typestate: sensor is powered and enabled but not prepared.
pub struct Enabled;

/// Typestate: sensor is calibrated and prepared for measuring.
pub struct Ready;

/// Lifecycle states of [`Radar`]. Sealed; only [`Enabled`] and [`Ready`]
/// implement it.
pub trait RadarState: sealed::Sealed {}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::Enabled {}
    impl Sealed for super::Ready {}
}

impl RadarState for Enabled {}
impl RadarState for Ready {}

/// Radar sensor in lifecycle state `STATE`.
pub struct Radar<STATE, S, C>
where
    STATE: RadarState,
    S: RadarSensor,
    C: SensorControl,
{
    sensor: S,
    control: C,
    config: RadarConfig,
    timeout_ms: u32,
    _state: PhantomData<STATE>,
}

impl<S, C> Radar<Enabled, S, C>
where
    S: RadarSensor,
    C: SensorControl,
{
    /// Powers and enables the sensor.
    pub fn new(sensor: S, mut control: C, config: RadarConfig) -> Self {
        control.supply_on();
        control.enable();

        Self {
            sensor,
            control,
            config,
            timeout_ms: SENSOR_TIMEOUT_MS,
            _state: PhantomData,
        }
    }

    /// Overrides the sensor interrupt timeout.
    pub fn set_timeout_ms(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
    }

    /// Calibrates the sensor with the standard retry policy.
    ///
    /// `work` is the sensor work buffer, reused for the following prepare.
    pub fn calibrate(&mut self, work: &mut [u8]) -> Result<CalibrationResult, SensorError> {
        calibrate_with_retry(&mut self.sensor, &mut self.control, work, self.timeout_ms)
    }

    /// Prepares the sensor for measuring and moves to [`Ready`].
    pub fn prepare(
        mut self,
        cal_result: &CalibrationResult,
        work: &mut [u8],
    ) -> Result<Radar<Ready, S, C>, SensorError> {
        self.sensor.prepare(&self.config, cal_result, work)?;

        Ok(Radar {
            sensor: self.sensor,
            control: self.control,
            config: self.config,
            timeout_ms: self.timeout_ms,
            _state: PhantomData,
        })
    }

    /// Leaves hibernation after [`Radar::hibernate_enter`].
    pub fn hibernate_exit(&mut self) -> Result<(), SensorError> {
        self.control.enable();
        self.sensor.hibernate_off()
    }

    /// Disables the sensor and releases the hardware.
    pub fn shutdown(mut self) -> (S, C) {
        self.control.disable();
        self.control.supply_off();

        (self.sensor, self.control)
    }
}

impl<S, C> Radar<Ready, S, C>
where
    S: RadarSensor,
    C: SensorControl,
{
    /// Runs one measure/wait/read cycle into `buffer`.
    ///
    /// An interrupt timeout aborts the cycle and surfaces as
    /// [`SensorError::InterruptTimeout`]; the caller decides whether to
    /// restart the pipeline.
    pub fn measure_frame(&mut self, buffer: &mut [u8]) -> Result<(), SensorError> {
        self.sensor.measure()?;
        self.sensor.wait_for_interrupt(self.timeout_ms)?;
        self.sensor.read(buffer)
    }

    /// Recalibrates the sensor after a `calibration_needed` indication.
    ///
    /// The sensor loses its prepared state: the radar drops back to
    /// [`Enabled`] and must be prepared with the new calibration before the
    /// next measurement.
    pub fn recalibrate(
        self,
        work: &mut [u8],
    ) -> Result<(Radar<Enabled, S, C>, CalibrationResult), SensorError> {
        let mut radar = Radar {
            sensor: self.sensor,
            control: self.control,
            config: self.config,
            timeout_ms: self.timeout_ms,
            _state: PhantomData,
        };

        let cal_result = radar.calibrate(work)?;

        Ok((radar, cal_result))
    }

    /// Re-prepares the sensor in place, for example after a detector
    /// updated its calibration with an unchanged sensor calibration.
    pub fn prepare_again(
        &mut self,
        cal_result: &CalibrationResult,
        work: &mut [u8],
    ) -> Result<(), SensorError> {
        self.sensor.prepare(&self.config, cal_result, work)
    }

    /// Decodes the info block of a calibration.
    pub fn cal_info(&self, cal_result: &CalibrationResult) -> CalibrationInfo {
        self.sensor.cal_info(cal_result)
    }

    /// Enters hibernation and disables the sensor. Prepared state is lost.
    pub fn hibernate_enter(mut self) -> Result<Radar<Enabled, S, C>, SensorError> {
        self.sensor.hibernate_on()?;
        self.control.disable();

        Ok(Radar {
            sensor: self.sensor,
            control: self.control,
            config: self.config,
            timeout_ms: self.timeout_ms,
            _state: PhantomData,
        })
    }

    /// The active measurement configuration.
    pub fn config(&self) -> &RadarConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::calibration::CalibrationCache;
    use alloc::vec::Vec;

    /// Scripted sensor: calibration attempts fail `failures` times, each
    /// calibration needs `steps_per_cal` interrupt waits, and every
    /// hardware interaction is recorded.
    struct MockSensor {
        failures: usize,
        steps_per_cal: usize,
        step: usize,
        timeout_on_wait: bool,
        log: Vec<&'static str>,
    }

    impl MockSensor {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                steps_per_cal: 2,
                step: 0,
                timeout_on_wait: false,
                log: Vec::new(),
            }
        }
    }

    impl RadarSensor for MockSensor {
        fn measure(&mut self) -> Result<(), SensorError> {
            self.log.push("measure");
            Ok(())
        }

        fn wait_for_interrupt(&mut self, _timeout_ms: u32) -> Result<(), SensorError> {
            self.log.push("wait");
            if self.timeout_on_wait {
                Err(SensorError::InterruptTimeout)
            } else {
                Ok(())
            }
        }

        fn read(&mut self, _buffer: &mut [u8]) -> Result<(), SensorError> {
            self.log.push("read");
            Ok(())
        }

        fn calibrate(
            &mut self,
            result: &mut CalibrationResult,
            _work: &mut [u8],
        ) -> Result<bool, SensorError> {
            self.log.push("calibrate");

            if self.failures > 0 {
                self.failures -= 1;
                self.step = 0;
                return Err(SensorError::Io);
            }

            self.step += 1;
            if self.step >= self.steps_per_cal {
                result.data_mut()[0] = 0xC0FFEE;
                Ok(true)
            } else {
                Ok(false)
            }
        }

        fn prepare(
            &mut self,
            _config: &RadarConfig,
            _cal_result: &CalibrationResult,
            _work: &mut [u8],
        ) -> Result<(), SensorError> {
            self.log.push("prepare");
            Ok(())
        }

        fn cal_info(&self, _cal_result: &CalibrationResult) -> CalibrationInfo {
            CalibrationInfo { temperature: 25 }
        }

        fn hibernate_on(&mut self) -> Result<(), SensorError> {
            self.log.push("hibernate_on");
            Ok(())
        }

        fn hibernate_off(&mut self) -> Result<(), SensorError> {
            self.log.push("hibernate_off");
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockControl {
        log: Vec<&'static str>,
    }

    impl SensorControl for MockControl {
        fn supply_on(&mut self) {
            self.log.push("supply_on");
        }

        fn supply_off(&mut self) {
            self.log.push("supply_off");
        }

        fn enable(&mut self) {
            self.log.push("enable");
        }

        fn disable(&mut self) {
            self.log.push("disable");
        }
    }

    #[test]
    fn calibration_steps_through_interrupt_waits() {
        let mut sensor = MockSensor::new(0);
        let mut control = MockControl::default();
        let mut work = [0u8; 16];

        let cal = calibrate_with_retry(&mut sensor, &mut control, &mut work, 1000).unwrap();

        assert_eq!(cal.data()[0], 0xC0FFEE);
        // One incomplete step, one interrupt wait, then completion.
        assert_eq!(sensor.log, ["calibrate", "wait", "calibrate"]);
        // Reset cycle before the attempt, flush cycle after success.
        assert_eq!(control.log, ["disable", "enable", "disable", "enable"]);
    }

    #[test]
    fn failed_calibration_is_retried_exactly_once() {
        let mut sensor = MockSensor::new(1);
        let mut control = MockControl::default();
        let mut work = [0u8; 16];

        let cal = calibrate_with_retry(&mut sensor, &mut control, &mut work, 1000).unwrap();

        assert_eq!(cal.data()[0], 0xC0FFEE);
        // First attempt fails immediately, second succeeds.
        assert_eq!(sensor.log, ["calibrate", "calibrate", "wait", "calibrate"]);
        assert_eq!(
            control.log,
            ["disable", "enable", "disable", "enable", "disable", "enable"]
        );
    }

    #[test]
    fn two_failures_exhaust_the_retry_budget() {
        let mut sensor = MockSensor::new(2);
        let mut control = MockControl::default();
        let mut work = [0u8; 16];

        let err = calibrate_with_retry(&mut sensor, &mut control, &mut work, 1000).unwrap_err();

        assert_eq!(err, SensorError::Io);
        assert_eq!(sensor.log, ["calibrate", "calibrate"]);
        // No flush cycle after a failed calibration.
        assert_eq!(control.log, ["disable", "enable", "disable", "enable"]);
    }

    #[test]
    fn interrupt_timeout_during_calibration_fails_the_attempt() {
        let mut sensor = MockSensor::new(0);
        sensor.timeout_on_wait = true;
        let mut control = MockControl::default();
        let mut work = [0u8; 16];

        let err = calibrate_with_retry(&mut sensor, &mut control, &mut work, 1000).unwrap_err();

        assert_eq!(err, SensorError::InterruptTimeout);
    }

    #[test]
    fn cache_miss_calibrates_and_inserts() {
        let mut sensor = MockSensor::new(0);
        let mut control = MockControl::default();
        let mut cache: CalibrationCache<4> = CalibrationCache::new();
        let mut work = [0u8; 16];

        // No entry within the window of 60 degC: a new calibration runs
        // and is cached at the sensor-reported temperature (25 degC).
        let cal = cache
            .ensure(&mut sensor, &mut control, Some(60), &mut work, 1000)
            .unwrap();
        assert_eq!(cal.data()[0], 0xC0FFEE);
        assert_eq!(cache.len(), 1);

        // A nearby temperature hits the cache without touching the sensor.
        let calibrate_calls = sensor.log.iter().filter(|&&s| s == "calibrate").count();
        cache
            .ensure(&mut sensor, &mut control, Some(30), &mut work, 1000)
            .unwrap();
        assert_eq!(
            sensor.log.iter().filter(|&&s| s == "calibrate").count(),
            calibrate_calls
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lifecycle_enables_calibrates_prepares_measures() {
        let sensor = MockSensor::new(0);
        let control = MockControl::default();
        let mut work = [0u8; 16];

        let mut radar = Radar::new(sensor, control, RadarConfig::default());
        let cal = radar.calibrate(&mut work).unwrap();
        let mut radar = radar.prepare(&cal, &mut work).unwrap();

        let mut buffer = [0u8; 16];
        radar.measure_frame(&mut buffer).unwrap();

        let (sensor, control) = {
            let radar = radar.hibernate_enter().unwrap();
            radar.shutdown()
        };

        assert!(sensor.log.ends_with(&["prepare", "measure", "wait", "read", "hibernate_on"]));
        assert_eq!(control.log[0], "supply_on");
        assert!(control.log.ends_with(&["disable", "disable", "supply_off"]));
    }

    #[test]
    fn measurement_timeout_propagates() {
        let mut sensor = MockSensor::new(0);
        // Calibration completes without interrupt waits, so only the
        // measurement path hits the timing-out wait.
        sensor.steps_per_cal = 1;
        sensor.timeout_on_wait = true;
        let control = MockControl::default();
        let mut work = [0u8; 16];

        let mut radar = Radar::new(sensor, control, RadarConfig::default());
        let cal = radar.calibrate(&mut work).unwrap();
        let mut radar = radar.prepare(&cal, &mut work).unwrap();

        let mut buffer = [0u8; 16];
        let err = radar.measure_frame(&mut buffer).unwrap_err();
        assert_eq!(err, SensorError::InterruptTimeout);
    }
}
