//! Radar signal processing and reference applications for the Acconeer XM125
//! radar module.
//!
//! The XM125 pairs an A121 pulsed-coherent radar sensor with a Cortex-M33
//! running the radar applications. This crate provides the signal processing
//! building blocks those applications are made of (FFT/RFFT, Butterworth
//! filter design, Welch power spectral density, CFAR thresholding, peak
//! finding and merging, frame conditioning) together with the sensor
//! calibration lifecycle and a set of reference applications (breathing rate,
//! tank level, touchless button, surface velocity, smart presence).
//!
//! Raw IQ frames enter through the [`sensor::RadarSensor`] seam, are cleaned
//! up by [`algorithm::frame`], run through the numeric kernels in
//! [`algorithm`], and end up as physical measurements in [`app`]. The
//! proprietary distance and presence detectors stay behind the traits in
//! [`detector`]; this crate only depends on their result types.
//!
//! The crate is `no_std` (enable the `std` feature for hosted targets) and
//! uses `alloc` for the runtime-sized application state.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod algorithm;
pub mod app;
pub mod config;
pub mod detector;
pub mod processing;
pub mod radar;
pub mod sensor;

pub use config::RadarConfig;
pub use processing::ProcessingResult;
pub use radar::Radar;
