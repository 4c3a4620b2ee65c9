//! Sensor I/O seam.
//!
//! The radar front end (RF plumbing, range generation, low-level transport)
//! lives outside this crate. [`RadarSensor`] is the blocking interface the
//! lifecycle and the applications drive it through: issue a measurement,
//! block on the sensor interrupt with a bounded timeout, read the frame
//! back. [`SensorControl`] covers the supply and enable pins used to reset
//! sensor state around calibration.
//!
//! There is one thread of control: a frame is processed completely before
//! the next measurement is issued, so the only aliasing rule is that the
//! scratch buffer of a pending measurement is not also used for processing.

pub mod calibration;
pub mod error;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::RadarConfig;
use crate::sensor::calibration::{CalibrationInfo, CalibrationResult};
use crate::sensor::error::SensorError;

/// Blocking interface to the radar sensor.
///
/// All calls return when the operation completed or failed; waiting happens
/// exclusively in [`wait_for_interrupt`](RadarSensor::wait_for_interrupt)
/// with an explicit timeout. A timeout aborts the pending operation and must
/// surface as [`SensorError::InterruptTimeout`], never as a silent retry.
pub trait RadarSensor {
    /// Starts one measurement. The result is available after the next
    /// sensor interrupt.
    fn measure(&mut self) -> Result<(), SensorError>;

    /// Blocks until the sensor interrupt fires, at most `timeout_ms`
    /// milliseconds.
    fn wait_for_interrupt(&mut self, timeout_ms: u32) -> Result<(), SensorError>;

    /// Reads measurement data into `buffer`.
    fn read(&mut self, buffer: &mut [u8]) -> Result<(), SensorError>;

    /// Runs one calibration step. Returns `Ok(true)` when the calibration
    /// is complete, `Ok(false)` when another step is needed after the next
    /// sensor interrupt.
    fn calibrate(
        &mut self,
        result: &mut CalibrationResult,
        work: &mut [u8],
    ) -> Result<bool, SensorError>;

    /// Prepares the sensor for measuring with `config`, using a previously
    /// produced calibration.
    fn prepare(
        &mut self,
        config: &RadarConfig,
        cal_result: &CalibrationResult,
        work: &mut [u8],
    ) -> Result<(), SensorError>;

    /// Extracts the info block of a calibration, including the temperature
    /// it was produced at.
    fn cal_info(&self, cal_result: &CalibrationResult) -> CalibrationInfo;

    /// Enters hibernation. The sensor must be prepared again before
    /// measuring.
    fn hibernate_on(&mut self) -> Result<(), SensorError>;

    /// Leaves hibernation.
    fn hibernate_off(&mut self) -> Result<(), SensorError>;
}

/// Supply and enable control of the sensor.
///
/// Calibration resets sensor state by cycling the enable pin; the low-power
/// flows additionally gate the supply.
pub trait SensorControl {
    /// Turns the sensor supply on.
    fn supply_on(&mut self);

    /// Turns the sensor supply off.
    fn supply_off(&mut self);

    /// Asserts the enable pin and waits for the sensor to boot.
    fn enable(&mut self);

    /// Deasserts the enable pin.
    fn disable(&mut self);
}

/// Time for the sensor to leave reset after the enable pin is asserted.
const ENABLE_SETTLE_TIME_MS: u32 = 2;

/// [`SensorControl`] implementation over an enable pin and a delay.
///
/// Boards with a switchable sensor supply can wrap this with their own
/// supply handling; `supply_on`/`supply_off` are no-ops here.
pub struct GpioSensorControl<PIN, DLY> {
    enable_pin: PIN,
    delay: DLY,
}

impl<PIN: OutputPin, DLY: DelayNs> GpioSensorControl<PIN, DLY> {
    /// Creates a control over the sensor enable pin.
    pub fn new(enable_pin: PIN, delay: DLY) -> Self {
        Self { enable_pin, delay }
    }

    /// Releases the pin and delay.
    pub fn release(self) -> (PIN, DLY) {
        (self.enable_pin, self.delay)
    }
}

impl<PIN: OutputPin, DLY: DelayNs> SensorControl for GpioSensorControl<PIN, DLY> {
    fn supply_on(&mut self) {}

    fn supply_off(&mut self) {}

    fn enable(&mut self) {
        // Pin errors are infallible on the supported boards
        let _ = self.enable_pin.set_high();
        self.delay.delay_ms(ENABLE_SETTLE_TIME_MS);
    }

    fn disable(&mut self) {
        let _ = self.enable_pin.set_low();
    }
}
