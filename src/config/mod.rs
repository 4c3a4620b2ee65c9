//! Radar sensor configuration.
//!
//! [`RadarConfig`] mirrors the service-level sensor configuration: the
//! measured range (start point, number of points, step length), sweep and
//! frame pacing, profile/PRF selection and the acquisition options (double
//! buffering, continuous sweep mode) that the processing layers depend on.

pub mod prf;
pub mod profile;

pub use prf::PulseRepetitionFrequency;
pub use profile::RadarProfile;

/// Approximate distance between two consecutive sample points, in meters.
pub const APPROX_BASE_STEP_LENGTH_M: f32 = 0.0025;

/// Idle state of the sensor between sweeps or frames.
///
/// Deeper idle states save power at the cost of longer transition times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadarIdleState {
    /// Deepest idle state, longest transition time
    DeepSleep,
    /// Intermediate idle state
    Sleep,
    /// Shallowest idle state, shortest transition time
    Ready,
}

/// Sensor measurement configuration.
#[derive(Debug, Clone)]
pub struct RadarConfig {
    start_point: i32,
    num_points: usize,
    step_length: usize,
    sweeps_per_frame: usize,
    sweep_rate: f32,
    frame_rate: f32,
    hwaas: u16,
    receiver_gain: u8,
    profile: RadarProfile,
    prf: PulseRepetitionFrequency,
    double_buffering: bool,
    continuous_sweep_mode: bool,
    inter_frame_idle_state: RadarIdleState,
    inter_sweep_idle_state: RadarIdleState,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            start_point: 80,
            num_points: 160,
            step_length: 1,
            sweeps_per_frame: 16,
            sweep_rate: 0.0,
            frame_rate: 0.0,
            hwaas: 8,
            receiver_gain: 16,
            profile: RadarProfile::AccProfile3,
            prf: PulseRepetitionFrequency::Prf15_6MHz,
            double_buffering: false,
            continuous_sweep_mode: false,
            inter_frame_idle_state: RadarIdleState::DeepSleep,
            inter_sweep_idle_state: RadarIdleState::Ready,
        }
    }
}

impl RadarConfig {
    /// Sets the first point of the measured range, in units of the base step
    /// length. May be negative to measure through the direct leakage.
    pub fn set_start_point(&mut self, start_point: i32) {
        self.start_point = start_point;
    }

    /// First point of the measured range.
    pub fn start_point(&self) -> i32 {
        self.start_point
    }

    /// Sets the number of measured points per sweep.
    pub fn set_num_points(&mut self, num_points: usize) {
        self.num_points = num_points;
    }

    /// Number of measured points per sweep.
    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Sets the distance between two measured points, in units of the base
    /// step length.
    pub fn set_step_length(&mut self, step_length: usize) {
        self.step_length = step_length;
    }

    /// Distance between two measured points in units of the base step length.
    pub fn step_length(&self) -> usize {
        self.step_length
    }

    /// Sets the number of sweeps captured per frame.
    pub fn set_sweeps_per_frame(&mut self, sweeps: usize) {
        self.sweeps_per_frame = sweeps;
    }

    /// Number of sweeps captured per frame.
    pub fn sweeps_per_frame(&self) -> usize {
        self.sweeps_per_frame
    }

    /// Sets the sweep rate in Hz. `0.0` means max possible rate.
    pub fn set_sweep_rate(&mut self, sweep_rate: f32) {
        self.sweep_rate = sweep_rate;
    }

    /// Sweep rate in Hz, `0.0` when unset.
    pub fn sweep_rate(&self) -> f32 {
        self.sweep_rate
    }

    /// Sets the frame rate in Hz. `0.0` means the rate is driven by the
    /// caller.
    pub fn set_frame_rate(&mut self, frame_rate: f32) {
        self.frame_rate = frame_rate;
    }

    /// Frame rate in Hz, `0.0` when caller driven.
    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    /// Sets the hardware accelerated average samples (HWAAS). More averaging
    /// improves SNR at the cost of power and sweep time.
    pub fn set_hwaas(&mut self, hwaas: u16) {
        self.hwaas = hwaas;
    }

    /// Hardware accelerated average samples.
    pub fn hwaas(&self) -> u16 {
        self.hwaas
    }

    /// Sets the receiver gain.
    pub fn set_receiver_gain(&mut self, gain: u8) {
        self.receiver_gain = gain;
    }

    /// Receiver gain.
    pub fn receiver_gain(&self) -> u8 {
        self.receiver_gain
    }

    /// Sets the radar profile.
    pub fn set_profile(&mut self, profile: RadarProfile) {
        self.profile = profile;
    }

    /// Radar profile.
    pub fn profile(&self) -> RadarProfile {
        self.profile
    }

    /// Sets the pulse repetition frequency.
    pub fn set_prf(&mut self, prf: PulseRepetitionFrequency) {
        self.prf = prf;
    }

    /// Pulse repetition frequency.
    pub fn prf(&self) -> PulseRepetitionFrequency {
        self.prf
    }

    /// Enables or disables double buffering. Double buffering increases the
    /// maximum sweep rate but can introduce short-lived artifacts that the
    /// double-buffering frame filter corrects.
    pub fn set_double_buffering(&mut self, enable: bool) {
        self.double_buffering = enable;
    }

    /// Whether double buffering is enabled.
    pub fn double_buffering(&self) -> bool {
        self.double_buffering
    }

    /// Enables or disables continuous sweep mode, where the time between all
    /// sweeps is identical regardless of frame boundaries.
    pub fn set_continuous_sweep_mode(&mut self, enable: bool) {
        self.continuous_sweep_mode = enable;
    }

    /// Whether continuous sweep mode is enabled.
    pub fn continuous_sweep_mode(&self) -> bool {
        self.continuous_sweep_mode
    }

    /// Sets the idle state between frames.
    pub fn set_inter_frame_idle_state(&mut self, state: RadarIdleState) {
        self.inter_frame_idle_state = state;
    }

    /// Idle state between frames.
    pub fn inter_frame_idle_state(&self) -> RadarIdleState {
        self.inter_frame_idle_state
    }

    /// Sets the idle state between sweeps.
    pub fn set_inter_sweep_idle_state(&mut self, state: RadarIdleState) {
        self.inter_sweep_idle_state = state;
    }

    /// Idle state between sweeps.
    pub fn inter_sweep_idle_state(&self) -> RadarIdleState {
        self.inter_sweep_idle_state
    }

    /// Last point of the measured range, in units of the base step length.
    pub fn end_point(&self) -> i32 {
        self.start_point + ((self.num_points.max(1) - 1) * self.step_length) as i32
    }
}
