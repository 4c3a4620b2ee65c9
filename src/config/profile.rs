//! Radar profiles.
//!
//! A profile is a sensor operating-mode preset trading depth resolution,
//! radar loop gain and power consumption. Lower profiles use shorter pulses
//! for better resolution close to the sensor, higher profiles use longer
//! pulses for more signal further out.

/// Radar operating profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadarProfile {
    /// Shortest pulse, best depth resolution
    AccProfile1 = 1,
    /// Short pulse
    AccProfile2 = 2,
    /// Medium pulse
    AccProfile3 = 3,
    /// Long pulse
    AccProfile4 = 4,
    /// Longest pulse, most radar loop gain
    AccProfile5 = 5,
}

impl RadarProfile {
    /// Full width at half maximum of the reflection envelope, in meters.
    pub fn fwhm_m(self) -> f32 {
        match self {
            RadarProfile::AccProfile1 => 0.04,
            RadarProfile::AccProfile2 => 0.07,
            RadarProfile::AccProfile3 => 0.14,
            RadarProfile::AccProfile4 => 0.19,
            RadarProfile::AccProfile5 => 0.32,
        }
    }

    /// Smallest measurement start distance free from direct leakage, in
    /// meters. Profile 1 has no lower limit.
    fn min_dist_m(self) -> Option<f32> {
        match self {
            RadarProfile::AccProfile1 => None,
            RadarProfile::AccProfile2 => Some(0.07 * 2.0),
            RadarProfile::AccProfile3 => Some(0.14 * 2.0),
            RadarProfile::AccProfile4 => Some(0.19 * 2.0),
            RadarProfile::AccProfile5 => Some(0.32 * 2.0),
        }
    }

    /// Selects the highest profile whose direct leakage does not interfere
    /// with a measurement starting at `start_point`.
    pub fn select(start_point: i32, base_step_length_m: f32) -> RadarProfile {
        let start_m = start_point as f32 * base_step_length_m;
        let mut profile = RadarProfile::AccProfile1;

        for candidate in [
            RadarProfile::AccProfile1,
            RadarProfile::AccProfile2,
            RadarProfile::AccProfile3,
            RadarProfile::AccProfile4,
            RadarProfile::AccProfile5,
        ] {
            match candidate.min_dist_m() {
                None => profile = candidate,
                Some(min_dist) if min_dist <= start_m => profile = candidate,
                Some(_) => {}
            }
        }

        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_selection_by_start_distance() {
        // ~2.5 mm per point
        let step = 0.0025;

        // Close to the sensor only profile 1 avoids direct leakage.
        assert_eq!(RadarProfile::select(0, step), RadarProfile::AccProfile1);
        // 0.64 m and beyond allows the longest pulse.
        assert_eq!(RadarProfile::select(256, step), RadarProfile::AccProfile5);
        // 0.3 m allows profile 3 (0.28 m limit) but not profile 4 (0.38 m).
        assert_eq!(RadarProfile::select(120, step), RadarProfile::AccProfile3);
    }
}
