//! Reference applications.
//!
//! Each application composes the numeric kernels, frame conditioning and
//! detector results into a domain-specific measurement with its own state
//! machine. The applications own their rolling buffers and are driven one
//! frame (or detector result) at a time by the caller's measurement loop.

pub mod breathing;
pub mod smart_presence;
pub mod surface_velocity;
pub mod tank_level;
pub mod touchless_button;

use core::fmt;

/// Invalid application configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A rate that must be set is zero
    RateNotSet,
    /// A lower bound is not below its upper bound
    InvalidRange,
    /// A sensitivity is zero or negative
    InvalidSensitivity,
    /// A value is outside its valid interval
    OutOfBounds(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::RateNotSet => write!(f, "rate must be set, i.e. > 0.0"),
            ConfigError::InvalidRange => write!(f, "lower bound must be below upper bound"),
            ConfigError::InvalidSensitivity => write!(f, "sensitivity must be > 0.0"),
            ConfigError::OutOfBounds(what) => write!(f, "{} out of bounds", what),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}
