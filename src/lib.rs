//! Hand and face tracking on webcam and video input.
//!
//! The [`hand::detector::HandDetector`] and [`face::detector::FaceDetector`] wrappers run
//! pre-trained MediaPipe networks on each frame and draw their landmarks and bounding boxes.
//! Frames come from a [`video::VideoCapture`] and are displayed with [`gui::show_image`].
//!
//! Applications start with [`init_logger!`] and hand their main loop to [`run`], which keeps the
//! window event loop on the main thread.
//!
//! # Coordinates
//!
//! Image coordinates have X pointing right and Y pointing *down*. Network outputs are normalized
//! to `0.0..=1.0` relative to the full frame; the wrappers convert them to pixels by truncation.
//!
//! # Environment Variables
//!
//! * `PERCEPTOR_MODEL_DIR`: directory holding the ONNX models (default: `3rdparty/onnx`).
//! * `PERCEPTOR_WEBCAM_NAME`: forces the device to use for webcams opened without an explicit
//!   index or name.
//! * `PERCEPTOR_JPEG_BACKEND`: `mozjpeg` (default) or `jpeg-decoder`.

use log::LevelFilter;

pub mod config;
pub mod detection;
pub mod face;
pub mod filter;
pub mod gui;
pub mod hand;
pub mod image;
pub mod iter;
pub mod landmark;
pub mod nn;
pub mod num;
pub mod rect;
pub mod termination;
pub mod timer;
pub mod video;

use termination::Termination;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and perceptor log at *debug* level, `wgpu` at *warn* level. `RUST_LOG`
/// overrides both.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}

/// Runs `app` on a background thread while the GUI event loop occupies the main thread.
///
/// Never returns. The process exits with status 0 if `app` succeeds, 1 if it returns an error,
/// and 101 if it panics.
pub fn run<F, R>(app: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: Termination + Send,
{
    gui::run(app)
}
