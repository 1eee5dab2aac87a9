//! Face detection.
//!
//! [`detector::FaceDetector`] wraps the BlazeFace networks in [`detection`] and reports face boxes
//! in normalized and pixel coordinates.

pub mod detection;
pub mod detector;
