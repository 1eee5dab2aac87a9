//! Hand detection, landmark estimation and tracking.
//!
//! [`detector::HandDetector`] is the entry point for applications: it reports 21 landmarks per hand
//! in normalized coordinates and can draw them onto the frame. The submodules contain the networks
//! and the per-frame tracking logic it is built from.

pub mod detection;
pub mod detector;
pub mod landmark;
pub mod tracking;

/// Selects between the faster and the more accurate set of hand networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelComplexity {
    Lite,
    #[default]
    Full,
}
