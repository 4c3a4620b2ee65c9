//! Pulse repetition frequency.

use crate::config::profile::RadarProfile;

/// Pulse repetition frequency (PRF) of the radar.
///
/// The PRF determines the maximum unambiguously measurable distance: echoes
/// from beyond that distance fold back into the measured range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PulseRepetitionFrequency {
    /// 19.5 MHz, profile 1 only
    Prf19_5MHz,
    /// 15.6 MHz
    Prf15_6MHz,
    /// 13.0 MHz
    Prf13_0MHz,
    /// 8.7 MHz
    Prf8_7MHz,
    /// 6.5 MHz
    Prf6_5MHz,
    /// 5.2 MHz
    Prf5_2MHz,
}

impl PulseRepetitionFrequency {
    /// Maximum measurable distance for this PRF, in meters.
    pub fn max_measurable_dist_m(self) -> f32 {
        match self {
            PulseRepetitionFrequency::Prf19_5MHz => 3.1,
            PulseRepetitionFrequency::Prf15_6MHz => 5.1,
            PulseRepetitionFrequency::Prf13_0MHz => 7.0,
            PulseRepetitionFrequency::Prf8_7MHz => 12.7,
            PulseRepetitionFrequency::Prf6_5MHz => 18.5,
            PulseRepetitionFrequency::Prf5_2MHz => 24.2,
        }
    }

    /// Selects the highest PRF that can unambiguously measure up to the range
    /// breakpoint. 19.5 MHz is only usable with profile 1.
    pub fn select(breakpoint: i16, profile: RadarProfile, base_step_length_m: f32) -> Self {
        let breakpoint_m = breakpoint as f32 * base_step_length_m;

        if breakpoint_m < PulseRepetitionFrequency::Prf19_5MHz.max_measurable_dist_m()
            && profile == RadarProfile::AccProfile1
        {
            PulseRepetitionFrequency::Prf19_5MHz
        } else if breakpoint_m < PulseRepetitionFrequency::Prf15_6MHz.max_measurable_dist_m() {
            PulseRepetitionFrequency::Prf15_6MHz
        } else if breakpoint_m < PulseRepetitionFrequency::Prf13_0MHz.max_measurable_dist_m() {
            PulseRepetitionFrequency::Prf13_0MHz
        } else if breakpoint_m < PulseRepetitionFrequency::Prf8_7MHz.max_measurable_dist_m() {
            PulseRepetitionFrequency::Prf8_7MHz
        } else if breakpoint_m < PulseRepetitionFrequency::Prf6_5MHz.max_measurable_dist_m() {
            PulseRepetitionFrequency::Prf6_5MHz
        } else {
            PulseRepetitionFrequency::Prf5_2MHz
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prf_selection_prefers_higher_rates() {
        let step = 0.0025;

        assert_eq!(
            PulseRepetitionFrequency::select(400, RadarProfile::AccProfile1, step),
            PulseRepetitionFrequency::Prf19_5MHz
        );
        // Same breakpoint with a longer pulse cannot use 19.5 MHz.
        assert_eq!(
            PulseRepetitionFrequency::select(400, RadarProfile::AccProfile3, step),
            PulseRepetitionFrequency::Prf15_6MHz
        );
        // 10 m breakpoint needs 8.7 MHz.
        assert_eq!(
            PulseRepetitionFrequency::select(4000, RadarProfile::AccProfile5, step),
            PulseRepetitionFrequency::Prf8_7MHz
        );
    }
}
