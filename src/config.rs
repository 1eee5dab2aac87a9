//! Process-wide configuration from environment variables.
//!
//! Every variable is read once, on first use. An invalid value is a fatal configuration error:
//! it is reported on stderr and the process exits.

use std::{
    env::{self, VarError},
    path::{Path, PathBuf},
    process,
    sync::OnceLock,
};

/// Directory containing the ONNX model files.
pub const MODEL_DIR_VAR: &str = "PERCEPTOR_MODEL_DIR";
/// Card name of the V4L2 device to open when no device is selected explicitly.
pub const WEBCAM_NAME_VAR: &str = "PERCEPTOR_WEBCAM_NAME";
/// JPEG decoder used for Motion-JPEG camera frames: `mozjpeg` or `jpeg-decoder`.
pub const JPEG_BACKEND_VAR: &str = "PERCEPTOR_JPEG_BACKEND";

const DEFAULT_MODEL_DIR: &str = "3rdparty/onnx";

/// Reads an environment variable, exiting the process if it is not valid unicode.
pub(crate) fn var(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(v) => Some(v),
        Err(VarError::NotPresent) => None,
        Err(VarError::NotUnicode(s)) => {
            eprintln!(
                "invalid value set for `{name}` variable: {}; exiting",
                s.to_string_lossy()
            );
            process::exit(1);
        }
    }
}

/// Reads an environment variable and parses it with `parse`, falling back to `default` when it
/// is unset. Exits the process if `parse` rejects the value.
pub(crate) fn parsed_var<T>(name: &str, default: T, parse: impl FnOnce(&str) -> Option<T>) -> T {
    match var(name) {
        None => default,
        Some(v) => match parse(&v) {
            Some(value) => value,
            None => {
                eprintln!("invalid value set for `{name}` variable: '{v}'; exiting");
                process::exit(1);
            }
        },
    }
}

/// Returns the directory the detectors load their models from.
pub fn model_dir() -> &'static Path {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = var(MODEL_DIR_VAR).map_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR), PathBuf::from);
        log::debug!("loading models from {}", dir.display());
        dir
    })
}

/// Returns the webcam card name forced by the environment, if any.
pub fn webcam_name() -> Option<&'static str> {
    static NAME: OnceLock<Option<String>> = OnceLock::new();
    NAME.get_or_init(|| var(WEBCAM_NAME_VAR)).as_deref()
}
