//! Two-channel serial voltage logger.
//!
//! Lines from a sensor are parsed, paired into `(time, A, B)` samples,
//! appended to a CSV log and handed to a live plot.
pub mod acquisition;
pub mod config;
pub mod engine;
pub mod gui;
pub mod recorder;
pub mod types;
