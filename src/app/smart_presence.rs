//! Smart presence reference application.
//!
//! Splits the measured range into zones and reports per-zone presence from
//! the depthwise motion scores of the presence detector. An optional
//! low-power wakeup mode watches a coarse far zone at a low frame rate and
//! switches to the nominal multi-zone configuration once enough wakeup
//! zones have seen presence; losing presence switches back.
//!
//! Mode switches are requested through
//! [`SmartPresenceResult::mode_switch`]; the caller reconfigures the
//! detector (typically around a hibernation cycle) and confirms with
//! [`SmartPresenceApp::switch_mode`].

use alloc::vec;
use alloc::vec::Vec;

use crate::detector::presence::{PresenceConfig, PresenceMetadata, PresenceResult};

/// Active detector configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SmartPresenceMode {
    /// Low-power wakeup configuration
    Wakeup,
    /// Nominal multi-zone configuration
    Nominal,
}

/// Wakeup mode configuration.
#[derive(Debug, Clone)]
pub struct WakeupConfig {
    /// Number of wakeup zones
    pub num_zones: usize,
    /// Zones with recent presence needed to switch to nominal mode
    pub num_zones_for_wakeup: usize,
    /// Presence detector configuration for wakeup mode
    pub presence: PresenceConfig,
}

/// Nominal mode configuration.
#[derive(Debug, Clone)]
pub struct NominalConfig {
    /// Number of zones
    pub num_zones: usize,
    /// Presence detector configuration for nominal mode
    pub presence: PresenceConfig,
}

/// Smart presence application configuration.
#[derive(Debug, Clone)]
pub struct SmartPresenceConfig {
    /// Start in wakeup mode and switch between the two configurations
    pub use_wakeup_mode: bool,
    /// Report all detected zones rather than only the strongest
    pub show_all_detected_zones: bool,
    /// Wakeup mode configuration
    pub wakeup: WakeupConfig,
    /// Nominal mode configuration
    pub nominal: NominalConfig,
}

impl SmartPresenceConfig {
    /// Short range preset, nominal range up to 1 m.
    pub fn preset_short_range() -> Self {
        let mut wakeup_presence = PresenceConfig::default();
        wakeup_presence.set_range(0.5..=1.0);
        wakeup_presence.set_auto_step_length(true);
        wakeup_presence.set_auto_profile(true);
        wakeup_presence.set_inter_frame_idle_state(crate::config::RadarIdleState::DeepSleep);
        wakeup_presence.set_hwaas(16);
        wakeup_presence.set_sweeps_per_frame(16);
        wakeup_presence.set_frame_rate(2.0);
        wakeup_presence.set_frame_rate_app_driven(false);
        wakeup_presence.set_reset_filters_on_prepare(true);
        wakeup_presence.set_intra_detection(true);
        wakeup_presence.set_intra_detection_threshold(1.5);
        wakeup_presence.set_intra_frame_time_const(0.15);
        wakeup_presence.set_intra_output_time_const(0.3);
        wakeup_presence.set_inter_detection(true);
        wakeup_presence.set_inter_detection_threshold(1.0);
        wakeup_presence.set_inter_frame_deviation_time_const(0.5);
        wakeup_presence.set_inter_frame_fast_cutoff(5.0);
        wakeup_presence.set_inter_frame_slow_cutoff(0.2);
        wakeup_presence.set_inter_output_time_const(2.0);
        wakeup_presence.set_inter_frame_presence_timeout(3);
        wakeup_presence.set_inter_phase_boost(false);

        let mut nominal_presence = wakeup_presence.clone();
        nominal_presence.set_range(0.06..=1.0);
        nominal_presence.set_frame_rate(10.0);
        nominal_presence.set_intra_detection_threshold(1.4);

        Self {
            use_wakeup_mode: true,
            show_all_detected_zones: false,
            wakeup: WakeupConfig {
                num_zones: 1,
                num_zones_for_wakeup: 1,
                presence: wakeup_presence,
            },
            nominal: NominalConfig {
                num_zones: 5,
                presence: nominal_presence,
            },
        }
    }

    /// Medium range preset, nominal range up to 2.5 m.
    pub fn preset_medium_range() -> Self {
        let mut config = Self::preset_short_range();

        config.wakeup.presence.set_range(1.5..=2.5);
        config.wakeup.presence.set_hwaas(32);
        config.wakeup.presence.set_inter_frame_fast_cutoff(6.0);

        config.nominal.presence.set_range(0.3..=2.5);
        config.nominal.presence.set_hwaas(32);
        config.nominal.presence.set_intra_detection_threshold(1.3);
        config.nominal.presence.set_inter_frame_fast_cutoff(6.0);
        config.nominal.num_zones = 7;

        config
    }
}

/// Per-zone detection result.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ZoneResult {
    /// Upper limit of the zone, in meters
    pub zone_limit: f32,
    /// Presence detected in the zone by either motion score
    pub zone_detection: bool,
    /// Slow motion detected in the zone
    pub inter_zone_detection: bool,
    /// Fast motion detected in the zone
    pub intra_zone_detection: bool,
}

/// One smart presence processing result.
#[derive(Debug, Clone)]
pub struct SmartPresenceResult {
    /// Presence detected in any zone
    pub presence_detected: bool,
    /// Zone with the maximum presence score; fast motion wins over slow
    /// motion for its faster reaction time
    pub max_presence_zone: Option<usize>,
    /// Fast-motion score
    pub intra_presence_score: f32,
    /// Slow-motion score
    pub inter_presence_score: f32,
    /// Zone with the maximum slow-motion score
    pub max_inter_zone: Option<usize>,
    /// Zone with the maximum fast-motion score
    pub max_intra_zone: Option<usize>,
    /// The configuration the result was produced with
    pub used_mode: SmartPresenceMode,
    /// Data was collected during the switch delay after a mode change
    pub switch_delay: bool,
    /// Per-zone results, one per zone of the active configuration
    pub zone_results: Vec<ZoneResult>,
    /// The application requests a switch to this mode; reconfigure the
    /// detector and confirm with [`SmartPresenceApp::switch_mode`]
    pub mode_switch: Option<SmartPresenceMode>,
}

/// Smart presence application.
pub struct SmartPresenceApp {
    config: SmartPresenceConfig,
    current_mode: SmartPresenceMode,
    current_num_zones: usize,

    zone_limits: Vec<f32>,
    distances: Vec<f32>,
    num_distances: usize,

    delay_count: u32,
    max_zone_time_n: u32,
    max_switch_delay_n: u32,
    wakeup_detections: Vec<u32>,
    zone_results: Vec<ZoneResult>,

    max_inter_zone: Option<usize>,
    max_intra_zone: Option<usize>,
}

impl SmartPresenceApp {
    /// Creates the application. `wakeup_metadata` may be `None` when
    /// wakeup mode is unused.
    pub fn new(
        config: SmartPresenceConfig,
        wakeup_metadata: Option<&PresenceMetadata>,
        nominal_metadata: &PresenceMetadata,
    ) -> Self {
        let max_num_zones = if config.use_wakeup_mode {
            config.wakeup.num_zones.max(config.nominal.num_zones)
        } else {
            config.nominal.num_zones
        };

        let max_num_points = wakeup_metadata
            .map(|m| m.num_points)
            .unwrap_or(0)
            .max(nominal_metadata.num_points);

        // Recent wakeup detections are remembered for two seconds
        let max_zone_time_n = if config.use_wakeup_mode {
            (2.0 * config.wakeup.presence.frame_rate() + 0.5) as u32
        } else {
            0
        };

        // The switch delay covers the settling time of the slower of the
        // two motion filters
        let inter_settle = config.nominal.presence.inter_frame_deviation_time_const()
            + config.nominal.presence.inter_output_time_const();
        let intra_settle = config.nominal.presence.intra_frame_time_const()
            + config.nominal.presence.intra_output_time_const();
        let max_switch_delay_n =
            (inter_settle.max(intra_settle) * config.nominal.presence.frame_rate()) as u32;

        let (initial_mode, initial_metadata) = if config.use_wakeup_mode {
            (
                SmartPresenceMode::Wakeup,
                wakeup_metadata.unwrap_or(nominal_metadata),
            )
        } else {
            (SmartPresenceMode::Nominal, nominal_metadata)
        };

        let mut app = Self {
            config,
            current_mode: initial_mode,
            current_num_zones: 0,
            zone_limits: vec![0.0; max_num_zones.max(max_num_points)],
            distances: vec![0.0; max_num_points],
            num_distances: 0,
            delay_count: 0,
            max_zone_time_n,
            max_switch_delay_n,
            wakeup_detections: vec![0; max_num_zones],
            zone_results: vec![ZoneResult::default(); max_num_zones],
            max_inter_zone: None,
            max_intra_zone: None,
        };

        app.apply_mode(initial_mode, initial_metadata);
        app
    }

    /// The active mode.
    pub fn mode(&self) -> SmartPresenceMode {
        self.current_mode
    }

    /// Zone limits of the active configuration, in meters.
    pub fn zone_limits(&self) -> &[f32] {
        &self.zone_limits[..self.current_num_zones]
    }

    /// Confirms a requested mode switch once the detector runs the new
    /// configuration.
    pub fn switch_mode(&mut self, mode: SmartPresenceMode, metadata: &PresenceMetadata) {
        log::info!(
            "switching to {} configuration",
            match mode {
                SmartPresenceMode::Wakeup => "wakeup",
                SmartPresenceMode::Nominal => "nominal",
            }
        );

        self.apply_mode(mode, metadata);
    }

    /// Recomputes distances and zone limits for a mode.
    fn apply_mode(&mut self, mode: SmartPresenceMode, metadata: &PresenceMetadata) {
        self.current_mode = mode;
        self.current_num_zones = match mode {
            SmartPresenceMode::Wakeup => self.config.wakeup.num_zones,
            SmartPresenceMode::Nominal => self.config.nominal.num_zones,
        };

        let start_m = metadata.start_m;
        self.num_distances = metadata.num_points;

        for distance in 0..self.num_distances {
            self.distances[distance] = start_m + (distance as f32 * metadata.step_length_m);
            if self.current_num_zones == self.num_distances {
                self.zone_limits[distance] = self.distances[distance];
            }
        }

        if self.current_num_zones < self.num_distances {
            let zone_step_length =
                (self.distances[self.num_distances - 1] - start_m) / self.current_num_zones as f32;

            for zone in 0..self.current_num_zones {
                self.zone_limits[zone] = start_m + ((zone as f32 + 1.0) * zone_step_length);
            }
        }
    }

    fn current_presence_config(&self) -> &PresenceConfig {
        match self.current_mode {
            SmartPresenceMode::Wakeup => &self.config.wakeup.presence,
            SmartPresenceMode::Nominal => &self.config.nominal.presence,
        }
    }

    /// Maps one motion score dimension onto the zones. Returns the zone
    /// with the maximum score, carried over from previous frames when the
    /// depthwise scores do not locate the motion.
    fn process_inter_intra(&mut self, presence: &PresenceResult, inter: bool) -> Option<usize> {
        let config = self.current_presence_config();

        let (detection, threshold) = if inter {
            (config.inter_detection(), config.inter_detection_threshold())
        } else {
            (config.intra_detection(), config.intra_detection_threshold())
        };
        let score = if inter {
            presence.inter_presence_score
        } else {
            presence.intra_presence_score
        };
        let depthwise_scores = if inter {
            &presence.depthwise_inter_presence_scores
        } else {
            &presence.depthwise_intra_presence_scores
        };

        let max_presence_zone = if inter {
            &mut self.max_inter_zone
        } else {
            &mut self.max_intra_zone
        };

        if !detection {
            return *max_presence_zone;
        }

        if score > threshold {
            let mut any_zone_detected = false;
            let mut zone_detected = false;
            let mut limit_idx = 0usize;

            for i in 0..self.num_distances {
                if self.distances[i] > self.zone_limits[limit_idx] {
                    limit_idx += 1;
                    zone_detected = false;
                }

                if limit_idx >= self.current_num_zones {
                    break;
                }

                if !zone_detected {
                    zone_detected = depthwise_scores[i] > threshold;
                    if inter {
                        self.zone_results[limit_idx].inter_zone_detection = zone_detected;
                    } else {
                        self.zone_results[limit_idx].intra_zone_detection = zone_detected;
                    }

                    if zone_detected {
                        any_zone_detected = true;
                    }
                }
            }

            if !any_zone_detected {
                // The depthwise scores did not locate the motion; fall back
                // to the last zone that had a detection
                if let Some(zone) = *max_presence_zone {
                    if inter {
                        self.zone_results[zone].inter_zone_detection = true;
                    } else {
                        self.zone_results[zone].intra_zone_detection = true;
                    }
                }
            } else {
                let mut max_score = 0.0f32;
                let mut max_distance = 0.0f32;
                let mut max_zone = 0usize;

                for i in 0..self.num_distances {
                    if depthwise_scores[i] > max_score {
                        max_score = depthwise_scores[i];
                        max_distance = self.distances[i];
                    }
                }

                while max_zone < self.current_num_zones - 1
                    && max_distance > self.zone_limits[max_zone]
                {
                    max_zone += 1;
                }

                *max_presence_zone = Some(max_zone);
            }
        } else {
            *max_presence_zone = None;
        }

        *max_presence_zone
    }

    fn determine_config_swap(&mut self, presence_detected: bool) -> Option<SmartPresenceMode> {
        let mut new_mode = None;

        if self.delay_count == 0 {
            if self.current_mode == SmartPresenceMode::Wakeup && presence_detected {
                let mut num_detections = 0usize;

                for i in 0..self.config.wakeup.num_zones {
                    if self.zone_results[i].zone_detection {
                        self.wakeup_detections[i] = self.max_zone_time_n;
                    }

                    if self.wakeup_detections[i] > 0 {
                        num_detections += 1;
                        self.wakeup_detections[i] -= 1;
                    }
                }

                if num_detections >= self.config.wakeup.num_zones_for_wakeup {
                    new_mode = Some(SmartPresenceMode::Nominal);
                    self.delay_count += 1;
                }
            } else if self.current_mode == SmartPresenceMode::Nominal && !presence_detected {
                new_mode = Some(SmartPresenceMode::Wakeup);
            }
        } else {
            if self.delay_count == 1 {
                self.wakeup_detections.fill(0);
            }

            self.delay_count += 1;
            if self.delay_count >= self.max_switch_delay_n + 1 || presence_detected {
                self.delay_count = 0;
            }
        }

        new_mode
    }

    /// Processes one presence result into per-zone detections and a
    /// possible mode switch request.
    pub fn process(&mut self, presence: &PresenceResult) -> SmartPresenceResult {
        for zone_result in self.zone_results[..self.current_num_zones].iter_mut() {
            *zone_result = ZoneResult::default();
        }

        let mut max_inter_zone = None;
        let mut max_intra_zone = None;
        let mut max_presence_zone = None;

        if presence.presence_detected {
            max_inter_zone = self.process_inter_intra(presence, true);
            max_intra_zone = self.process_inter_intra(presence, false);

            // Fast motion wins for its faster reaction time
            max_presence_zone = max_intra_zone.or(max_inter_zone);

            for zone_result in self.zone_results[..self.current_num_zones].iter_mut() {
                if zone_result.intra_zone_detection || zone_result.inter_zone_detection {
                    zone_result.zone_detection = true;
                }
            }
        }

        for (zone_result, &limit) in self.zone_results[..self.current_num_zones]
            .iter_mut()
            .zip(self.zone_limits.iter())
        {
            zone_result.zone_limit = limit;
        }

        let mode_switch = if self.config.use_wakeup_mode {
            self.determine_config_swap(presence.presence_detected)
        } else {
            None
        };

        SmartPresenceResult {
            presence_detected: presence.presence_detected,
            max_presence_zone,
            intra_presence_score: presence.intra_presence_score,
            inter_presence_score: presence.inter_presence_score,
            max_inter_zone,
            max_intra_zone,
            used_mode: self.current_mode,
            switch_delay: self.delay_count > 0,
            zone_results: self.zone_results[..self.current_num_zones].to_vec(),
            mode_switch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::frame::Frame;

    fn nominal_metadata() -> PresenceMetadata {
        PresenceMetadata {
            start_m: 0.3,
            step_length_m: 0.2,
            num_points: 6,
            frame_rate: 10.0,
        }
    }

    fn wakeup_metadata() -> PresenceMetadata {
        PresenceMetadata {
            start_m: 1.5,
            step_length_m: 0.1,
            num_points: 5,
            frame_rate: 2.0,
        }
    }

    fn test_config(use_wakeup: bool) -> SmartPresenceConfig {
        let mut config = SmartPresenceConfig::preset_short_range();
        config.use_wakeup_mode = use_wakeup;
        config.nominal.num_zones = 3;
        config.wakeup.presence.set_intra_detection_threshold(1.0);
        config.wakeup.presence.set_inter_detection_threshold(1.0);
        config.nominal.presence.set_intra_detection_threshold(1.0);
        config.nominal.presence.set_inter_detection_threshold(1.0);
        config
    }

    fn presence(
        detected: bool,
        num_points: usize,
        intra_at: Option<(usize, f32)>,
        inter_at: Option<(usize, f32)>,
    ) -> PresenceResult {
        let mut depthwise_intra = vec![0.0; num_points];
        let mut depthwise_inter = vec![0.0; num_points];

        if let Some((idx, score)) = intra_at {
            depthwise_intra[idx] = score;
        }
        if let Some((idx, score)) = inter_at {
            depthwise_inter[idx] = score;
        }

        let intra_score = depthwise_intra.iter().fold(0.0f32, |m, &x| m.max(x));
        let inter_score = depthwise_inter.iter().fold(0.0f32, |m, &x| m.max(x));

        PresenceResult {
            presence_detected: detected,
            presence_distance: 0.0,
            intra_presence_score: intra_score,
            inter_presence_score: inter_score,
            depthwise_intra_presence_scores: depthwise_intra,
            depthwise_inter_presence_scores: depthwise_inter,
            frame: Frame::new(1, num_points),
            temperature: 25,
            calibration_needed: false,
        }
    }

    #[test]
    fn zone_limits_cover_the_range_evenly() {
        let app = SmartPresenceApp::new(test_config(false), None, &nominal_metadata());

        // Points span 0.3..1.3 m over 3 zones.
        let limits = app.zone_limits();
        approx::assert_relative_eq!(limits[0], 0.3 + 1.0 / 3.0, epsilon = 1e-5);
        approx::assert_relative_eq!(limits[1], 0.3 + 2.0 / 3.0, epsilon = 1e-5);
        approx::assert_relative_eq!(limits[2], 1.3, epsilon = 1e-5);
    }

    #[test]
    fn depthwise_score_maps_to_its_zone() {
        let mut app = SmartPresenceApp::new(test_config(false), None, &nominal_metadata());

        // Fast motion at point 4 (1.1 m) belongs to the last zone.
        let result = app.process(&presence(true, 6, Some((4, 5.0)), None));

        assert!(result.presence_detected);
        assert_eq!(result.max_intra_zone, Some(2));
        assert_eq!(result.max_presence_zone, Some(2));
        assert!(result.zone_results[2].intra_zone_detection);
        assert!(result.zone_results[2].zone_detection);
        assert!(!result.zone_results[0].zone_detection);
    }

    #[test]
    fn fast_motion_zone_wins_over_slow_motion_zone() {
        let mut app = SmartPresenceApp::new(test_config(false), None, &nominal_metadata());

        // Slow motion far out, fast motion close in.
        let result = app.process(&presence(true, 6, Some((0, 5.0)), Some((4, 5.0))));

        assert_eq!(result.max_intra_zone, Some(0));
        assert_eq!(result.max_inter_zone, Some(2));
        assert_eq!(result.max_presence_zone, Some(0));
    }

    #[test]
    fn no_presence_reports_no_zones() {
        let mut app = SmartPresenceApp::new(test_config(false), None, &nominal_metadata());

        let result = app.process(&presence(false, 6, None, None));

        assert!(!result.presence_detected);
        assert_eq!(result.max_presence_zone, None);
        assert!(result.zone_results.iter().all(|z| !z.zone_detection));
    }

    #[test]
    fn wakeup_detection_requests_nominal_mode() {
        let mut app = SmartPresenceApp::new(
            test_config(true),
            Some(&wakeup_metadata()),
            &nominal_metadata(),
        );
        assert_eq!(app.mode(), SmartPresenceMode::Wakeup);

        let result = app.process(&presence(true, 5, Some((2, 4.0)), None));

        assert_eq!(result.used_mode, SmartPresenceMode::Wakeup);
        assert_eq!(result.mode_switch, Some(SmartPresenceMode::Nominal));
        assert!(result.switch_delay);
    }

    #[test]
    fn presence_loss_in_nominal_mode_requests_wakeup() {
        let mut app = SmartPresenceApp::new(
            test_config(true),
            Some(&wakeup_metadata()),
            &nominal_metadata(),
        );

        // Wake up and confirm the switch.
        let result = app.process(&presence(true, 5, Some((2, 4.0)), None));
        assert_eq!(result.mode_switch, Some(SmartPresenceMode::Nominal));
        app.switch_mode(SmartPresenceMode::Nominal, &nominal_metadata());

        // Presence during the switch delay clears the delay counter.
        let result = app.process(&presence(true, 6, Some((1, 4.0)), None));
        assert_eq!(result.used_mode, SmartPresenceMode::Nominal);
        assert_eq!(result.mode_switch, None);

        // Losing presence requests the wakeup configuration again.
        let result = app.process(&presence(false, 6, None, None));
        assert_eq!(result.mode_switch, Some(SmartPresenceMode::Wakeup));
    }
}
