//! Detector boundary.
//!
//! The distance and presence detectors run inside the proprietary radar
//! stack; this crate consumes their results and configurations but not
//! their internals. The traits here are the seam a hardware-backed
//! implementation plugs into, and what the application tests mock.

pub mod distance;
pub mod presence;
