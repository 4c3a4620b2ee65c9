//! Presence detector configuration.
//!
//! For a detailed description of the detection algorithm and its parameters,
//! see the Acconeer documentation.

#![warn(missing_docs)]

use core::ops::RangeInclusive;

use crate::config::profile::RadarProfile;
use crate::config::RadarIdleState;

/// Type alias for the signal quality
pub type SignalQuality = f32;

/// Configuration for the radar presence detection.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    start_m: f32,
    end_m: f32,
    step_length: usize,
    auto_step_length: bool,
    profile: RadarProfile,
    auto_profile: bool,
    hwaas: u16,
    sweeps_per_frame: usize,
    frame_rate: f32,
    frame_rate_app_driven: bool,
    reset_filters_on_prepare: bool,
    automatic_subsweeps: bool,
    signal_quality: SignalQuality,
    inter_frame_idle_state: RadarIdleState,
    intra_detection: bool,
    intra_detection_threshold: f32,
    intra_frame_time_const: f32,
    intra_output_time_const: f32,
    inter_detection: bool,
    inter_detection_threshold: f32,
    inter_frame_deviation_time_const: f32,
    inter_frame_fast_cutoff: f32,
    inter_frame_slow_cutoff: f32,
    inter_output_time_const: f32,
    inter_frame_presence_timeout: u16,
    inter_phase_boost: bool,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            start_m: 0.3,
            end_m: 2.5,
            step_length: 24,
            auto_step_length: true,
            profile: RadarProfile::AccProfile3,
            auto_profile: true,
            hwaas: 32,
            sweeps_per_frame: 16,
            frame_rate: 12.0,
            frame_rate_app_driven: false,
            reset_filters_on_prepare: true,
            automatic_subsweeps: false,
            signal_quality: 30.0,
            inter_frame_idle_state: RadarIdleState::DeepSleep,
            intra_detection: true,
            intra_detection_threshold: 1.3,
            intra_frame_time_const: 0.15,
            intra_output_time_const: 0.3,
            inter_detection: true,
            inter_detection_threshold: 1.0,
            inter_frame_deviation_time_const: 0.5,
            inter_frame_fast_cutoff: 6.0,
            inter_frame_slow_cutoff: 0.2,
            inter_output_time_const: 2.0,
            inter_frame_presence_timeout: 3,
            inter_phase_boost: false,
        }
    }
}

impl PresenceConfig {
    /// Sets the measurement range in meters.
    pub fn set_range(&mut self, range: RangeInclusive<f32>) {
        self.start_m = *range.start();
        self.end_m = *range.end();
    }

    /// Start of the measurement range in meters.
    pub fn start_m(&self) -> f32 {
        self.start_m
    }

    /// End of the measurement range in meters.
    pub fn end_m(&self) -> f32 {
        self.end_m
    }

    /// Sets the step length in points.
    pub fn set_step_length(&mut self, step_length: usize) {
        self.step_length = step_length;
    }

    /// Step length in points.
    pub fn step_length(&self) -> usize {
        self.step_length
    }

    /// Set the auto step length
    pub fn set_auto_step_length(&mut self, enable: bool) {
        self.auto_step_length = enable;
    }

    /// Whether the step length is chosen automatically.
    pub fn auto_step_length(&self) -> bool {
        self.auto_step_length
    }

    /// Sets the profile for presence detection.
    pub fn set_profile(&mut self, profile: RadarProfile) {
        self.profile = profile;
    }

    /// The configured profile.
    pub fn profile(&self) -> RadarProfile {
        self.profile
    }

    /// Enables or disables automatic profile selection.
    pub fn set_auto_profile(&mut self, enable: bool) {
        self.auto_profile = enable;
    }

    /// Whether the profile is chosen automatically.
    pub fn auto_profile(&self) -> bool {
        self.auto_profile
    }

    /// Set hwaas
    pub fn set_hwaas(&mut self, hwaas: u16) {
        self.hwaas = hwaas;
    }

    /// Hardware accelerated average samples.
    pub fn hwaas(&self) -> u16 {
        self.hwaas
    }

    /// Sets the number of sweeps per frame.
    pub fn set_sweeps_per_frame(&mut self, sweeps: usize) {
        self.sweeps_per_frame = sweeps;
    }

    /// Number of sweeps per frame.
    pub fn sweeps_per_frame(&self) -> usize {
        self.sweeps_per_frame
    }

    /// Sets the frame rate.
    pub fn set_frame_rate(&mut self, frame_rate: f32) {
        self.frame_rate = frame_rate;
    }

    /// The configured frame rate.
    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    /// Sets whether the frame rate is application-driven.
    pub fn set_frame_rate_app_driven(&mut self, app_driven: bool) {
        self.frame_rate_app_driven = app_driven;
    }

    /// Whether the frame rate is application-driven.
    pub fn frame_rate_app_driven(&self) -> bool {
        self.frame_rate_app_driven
    }

    /// Sets whether to reset filters on prepare.
    pub fn set_reset_filters_on_prepare(&mut self, reset: bool) {
        self.reset_filters_on_prepare = reset;
    }

    /// Whether filters are reset on prepare.
    pub fn reset_filters_on_prepare(&self) -> bool {
        self.reset_filters_on_prepare
    }

    /// Set automatic subsweeps
    pub fn set_automatic_subsweeps(&mut self, enable: bool) {
        self.automatic_subsweeps = enable;
    }

    /// Whether automatic subsweeps are enabled.
    pub fn automatic_subsweeps(&self) -> bool {
        self.automatic_subsweeps
    }

    /// Set signal quality
    pub fn set_signal_quality(&mut self, signal_quality: SignalQuality) {
        self.signal_quality = signal_quality;
    }

    /// The signal quality target.
    pub fn signal_quality(&self) -> SignalQuality {
        self.signal_quality
    }

    /// Sets the inter-frame idle state.
    pub fn set_inter_frame_idle_state(&mut self, idle_state: RadarIdleState) {
        self.inter_frame_idle_state = idle_state;
    }

    /// The inter-frame idle state.
    pub fn inter_frame_idle_state(&self) -> RadarIdleState {
        self.inter_frame_idle_state
    }

    /// Sets whether intra-detection is enabled.
    pub fn set_intra_detection(&mut self, enabled: bool) {
        self.intra_detection = enabled;
    }

    /// Whether intra-detection is enabled.
    pub fn intra_detection(&self) -> bool {
        self.intra_detection
    }

    /// Sets the intra-detection threshold.
    pub fn set_intra_detection_threshold(&mut self, threshold: f32) {
        self.intra_detection_threshold = threshold;
    }

    /// The intra-detection threshold.
    pub fn intra_detection_threshold(&self) -> f32 {
        self.intra_detection_threshold
    }

    /// Sets the intra-frame time constant.
    pub fn set_intra_frame_time_const(&mut self, time_const: f32) {
        self.intra_frame_time_const = time_const;
    }

    /// The intra-frame time constant.
    pub fn intra_frame_time_const(&self) -> f32 {
        self.intra_frame_time_const
    }

    /// Sets the intra-output time constant.
    pub fn set_intra_output_time_const(&mut self, time_const: f32) {
        self.intra_output_time_const = time_const;
    }

    /// The intra-output time constant.
    pub fn intra_output_time_const(&self) -> f32 {
        self.intra_output_time_const
    }

    /// Sets whether inter-detection is enabled.
    pub fn set_inter_detection(&mut self, enabled: bool) {
        self.inter_detection = enabled;
    }

    /// Whether inter-detection is enabled.
    pub fn inter_detection(&self) -> bool {
        self.inter_detection
    }

    /// Sets the inter-detection threshold.
    pub fn set_inter_detection_threshold(&mut self, threshold: f32) {
        self.inter_detection_threshold = threshold;
    }

    /// The inter-detection threshold.
    pub fn inter_detection_threshold(&self) -> f32 {
        self.inter_detection_threshold
    }

    /// Sets the inter-frame deviation time constant.
    pub fn set_inter_frame_deviation_time_const(&mut self, time_const: f32) {
        self.inter_frame_deviation_time_const = time_const;
    }

    /// The inter-frame deviation time constant.
    pub fn inter_frame_deviation_time_const(&self) -> f32 {
        self.inter_frame_deviation_time_const
    }

    /// Sets the inter-frame fast cutoff.
    pub fn set_inter_frame_fast_cutoff(&mut self, cutoff: f32) {
        self.inter_frame_fast_cutoff = cutoff;
    }

    /// The inter-frame fast cutoff.
    pub fn inter_frame_fast_cutoff(&self) -> f32 {
        self.inter_frame_fast_cutoff
    }

    /// Sets the inter-frame slow cutoff.
    pub fn set_inter_frame_slow_cutoff(&mut self, cutoff: f32) {
        self.inter_frame_slow_cutoff = cutoff;
    }

    /// The inter-frame slow cutoff.
    pub fn inter_frame_slow_cutoff(&self) -> f32 {
        self.inter_frame_slow_cutoff
    }

    /// Sets the inter-output time constant.
    pub fn set_inter_output_time_const(&mut self, time_const: f32) {
        self.inter_output_time_const = time_const;
    }

    /// The inter-output time constant.
    pub fn inter_output_time_const(&self) -> f32 {
        self.inter_output_time_const
    }

    /// Sets the inter-frame presence timeout in seconds.
    pub fn set_inter_frame_presence_timeout(&mut self, timeout: u16) {
        self.inter_frame_presence_timeout = timeout;
    }

    /// The inter-frame presence timeout in seconds.
    pub fn inter_frame_presence_timeout(&self) -> u16 {
        self.inter_frame_presence_timeout
    }

    /// Sets whether inter-phase boost is enabled.
    pub fn set_inter_phase_boost(&mut self, enabled: bool) {
        self.inter_phase_boost = enabled;
    }

    /// Whether inter-phase boost is enabled.
    pub fn inter_phase_boost(&self) -> bool {
        self.inter_phase_boost
    }

    // Presets

    /// Short range preset, roughly 6 cm to 1 m.
    pub fn preset_short_range(config: &mut PresenceConfig) {
        config.set_range(0.06..=1.0);
        config.set_automatic_subsweeps(true);
        config.set_signal_quality(30.0);
        config.set_inter_frame_idle_state(RadarIdleState::Ready);
        config.set_sweeps_per_frame(16);

        config.set_frame_rate(10.0);
        config.set_frame_rate_app_driven(false);
        config.set_reset_filters_on_prepare(true);

        config.set_intra_detection(true);
        config.set_intra_detection_threshold(1.4);
        config.set_intra_frame_time_const(0.15);
        config.set_intra_output_time_const(0.3);

        config.set_inter_detection(true);
        config.set_inter_detection_threshold(1.0);
        config.set_inter_frame_deviation_time_const(0.5);
        config.set_inter_frame_fast_cutoff(5.0);
        config.set_inter_frame_slow_cutoff(0.2);
        config.set_inter_output_time_const(2.0);
        config.set_inter_frame_presence_timeout(3);
        config.set_inter_phase_boost(false);
    }

    /// Medium range preset, roughly 0.3 m to 2.5 m.
    pub fn preset_medium_range(config: &mut PresenceConfig) {
        config.set_range(0.3..=2.5);
        config.set_automatic_subsweeps(true);
        config.set_signal_quality(30.0);
        config.set_inter_frame_idle_state(RadarIdleState::Ready);
        config.set_sweeps_per_frame(16);

        config.set_frame_rate(10.0);
        config.set_frame_rate_app_driven(false);
        config.set_reset_filters_on_prepare(true);

        config.set_intra_detection(true);
        config.set_intra_detection_threshold(1.3);
        config.set_intra_frame_time_const(0.15);
        config.set_intra_output_time_const(0.3);

        config.set_inter_detection(true);
        config.set_inter_detection_threshold(1.0);
        config.set_inter_frame_deviation_time_const(0.5);
        config.set_inter_frame_fast_cutoff(6.0);
        config.set_inter_frame_slow_cutoff(0.2);
        config.set_inter_output_time_const(2.0);
        config.set_inter_frame_presence_timeout(3);
        config.set_inter_phase_boost(false);
    }

    /// Long range preset, roughly 5 m to 7.5 m.
    pub fn preset_long_range(config: &mut PresenceConfig) {
        config.set_range(5.0..=7.5);
        config.set_automatic_subsweeps(true);
        config.set_signal_quality(10.0);
        config.set_inter_frame_idle_state(RadarIdleState::Ready);
        config.set_sweeps_per_frame(16);

        config.set_frame_rate(12.0);
        config.set_frame_rate_app_driven(false);
        config.set_reset_filters_on_prepare(true);

        config.set_intra_detection(true);
        config.set_intra_detection_threshold(1.2);
        config.set_intra_frame_time_const(0.15);
        config.set_intra_output_time_const(0.3);

        config.set_inter_detection(true);
        config.set_inter_detection_threshold(0.8);
        config.set_inter_frame_deviation_time_const(0.5);
        config.set_inter_frame_fast_cutoff(6.0);
        config.set_inter_frame_slow_cutoff(0.2);
        config.set_inter_output_time_const(2.0);
        config.set_inter_frame_presence_timeout(3);
        config.set_inter_phase_boost(false);
    }

    /// Preset for a ceiling mounted radar.
    pub fn preset_ceiling(config: &mut PresenceConfig) {
        config.set_range(4.0..=7.0);
        config.set_auto_profile(true);
        config.set_auto_step_length(true);
        config.set_sweeps_per_frame(16);
        config.set_hwaas(32);

        config.set_frame_rate(5.0);
        config.set_inter_frame_idle_state(RadarIdleState::Ready);

        config.set_intra_detection(true);
        config.set_intra_detection_threshold(0.13);
        config.set_intra_frame_time_const(0.15);
        config.set_intra_output_time_const(0.3);

        config.set_inter_detection(true);
        config.set_inter_detection_threshold(1.0);
        config.set_inter_frame_fast_cutoff(6.0);
        config.set_inter_frame_slow_cutoff(0.2);
        config.set_inter_frame_deviation_time_const(0.5);
        config.set_inter_output_time_const(2.0);
        config.set_inter_phase_boost(true);
        config.set_inter_frame_presence_timeout(10);
    }
}
