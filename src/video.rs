//! Frame sources: V4L2 webcams and video files.

pub mod file;
pub mod webcam;

use std::{fmt, path::PathBuf};

use crate::image::Image;
use crate::timer::Timer;

use self::file::VideoFile;
use self::webcam::{Webcam, WebcamOptions};

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// A V4L2 device, by index (`/dev/video{index}`).
    Camera(u32),
    /// A video file decoded with `ffmpeg`.
    File(PathBuf),
}

impl VideoSource {
    /// Parses a command-line source argument.
    ///
    /// An integer or a `/dev/videoN` path selects a camera; anything else is a file path.
    pub fn parse(arg: &str) -> Self {
        let index = arg
            .parse::<u32>()
            .ok()
            .or_else(|| arg.strip_prefix("/dev/video")?.parse::<u32>().ok());
        match index {
            Some(index) => VideoSource::Camera(index),
            None => VideoSource::File(PathBuf::from(arg)),
        }
    }

    /// Selects the source from the first command-line argument, defaulting to camera 0.
    pub fn from_args() -> Self {
        std::env::args()
            .nth(1)
            .map_or(VideoSource::Camera(0), |arg| Self::parse(&arg))
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSource::Camera(index) => write!(f, "/dev/video{index}"),
            VideoSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// An open [`VideoSource`].
pub enum VideoCapture {
    Camera(Webcam),
    File(VideoFile),
}

impl VideoCapture {
    /// Opens `source`. This can block for a while as cameras initialize.
    pub fn open(source: &VideoSource) -> anyhow::Result<Self> {
        log::debug!("opening video source {}", source);
        Ok(match source {
            VideoSource::Camera(index) => {
                VideoCapture::Camera(Webcam::open(WebcamOptions::default().index(*index))?)
            }
            VideoSource::File(path) => VideoCapture::File(VideoFile::open(path)?),
        })
    }

    /// Reads the next frame, blocking until one is available.
    ///
    /// Returns `Ok(None)` at the end of a video file. Cameras never end.
    pub fn read(&mut self) -> anyhow::Result<Option<Image>> {
        match self {
            VideoCapture::Camera(cam) => cam.read().map(Some),
            VideoCapture::File(file) => file.read(),
        }
    }

    pub fn timers(&self) -> Vec<&Timer> {
        match self {
            VideoCapture::Camera(cam) => cam.timers().collect(),
            VideoCapture::File(file) => file.timers().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_source() {
        assert_eq!(VideoSource::parse("0"), VideoSource::Camera(0));
        assert_eq!(VideoSource::parse("/dev/video2"), VideoSource::Camera(2));
        assert_eq!(
            VideoSource::parse("clips/12.mp4"),
            VideoSource::File(PathBuf::from("clips/12.mp4"))
        );
        assert_eq!(
            VideoSource::parse("/dev/videofoo"),
            VideoSource::File(PathBuf::from("/dev/videofoo"))
        );
        assert_eq!(
            VideoSource::parse("-1"),
            VideoSource::File(PathBuf::from("-1"))
        );
    }

    #[test]
    fn display() {
        assert_eq!(VideoSource::Camera(3).to_string(), "/dev/video3");
        assert_eq!(VideoSource::parse("a.mp4").to_string(), "a.mp4");
    }
}
