//! Video file decoding through an `ffmpeg` child process.

use std::{
    io::{self, Read},
    path::Path,
    process::{Child, ChildStdout, Command, Stdio},
};

use anyhow::{anyhow, bail, Context};

use crate::image::{Image, Resolution};
use crate::timer::Timer;

/// A video file, decoded frame by frame to RGBA.
pub struct VideoFile {
    child: Child,
    stdout: ChildStdout,
    resolution: Resolution,
    buf: Vec<u8>,
    t_read: Timer,
}

impl VideoFile {
    /// Probes the video's dimensions with `ffprobe` and starts decoding it with `ffmpeg`.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::open_impl(path.as_ref())
    }

    fn open_impl(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            bail!("video file {} does not exist", path.display());
        }
        let resolution = probe_resolution(path)?;

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-noautorotate")
            .arg("-i")
            .arg(path)
            .arg("-an")
            .arg("-pix_fmt")
            .arg("rgba")
            .arg("-f")
            .arg("rawvideo")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().context("failed to spawn `ffmpeg`")?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("failed to capture ffmpeg stdout"))?;

        log::info!("opened {} ({})", path.display(), resolution);

        let frame_bytes = resolution.num_pixels() as usize * 4;
        Ok(Self {
            child,
            stdout,
            resolution,
            buf: vec![0; frame_bytes],
            t_read: Timer::new("read"),
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Reads the next frame, returning `Ok(None)` at the end of the stream.
    pub fn read(&mut self) -> anyhow::Result<Option<Image>> {
        let _guard = self.t_read.start();
        match self.stdout.read_exact(&mut self.buf) {
            Ok(()) => Ok(Some(Image::from_rgba8(self.resolution, &self.buf))),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                log::debug!("end of video stream");
                Ok(None)
            }
            Err(e) => Err(e).context("failed to read frame from ffmpeg"),
        }
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_read].into_iter()
    }
}

impl Drop for VideoFile {
    fn drop(&mut self) {
        // The child has exited by itself if the whole stream was read.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn probe_resolution(path: &Path) -> anyhow::Result<Resolution> {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=width,height")
        .arg("-of")
        .arg("csv=s=x:p=0")
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .context("failed to run `ffprobe`")?;
    if !output.status.success() {
        bail!(
            "`ffprobe` failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim(),
        );
    }

    parse_dimensions(&String::from_utf8_lossy(&output.stdout))
        .with_context(|| format!("no video stream found in {}", path.display()))
}

/// Parses `ffprobe`'s `WIDTHxHEIGHT` output.
pub(crate) fn parse_dimensions(s: &str) -> anyhow::Result<Resolution> {
    let line = s.lines().next().unwrap_or("").trim();
    let (w, h) = line
        .split_once('x')
        .ok_or_else(|| anyhow!("invalid dimensions '{line}'"))?;
    let (w, h): (u32, u32) = (w.parse()?, h.trim_end_matches('x').parse()?);
    if w == 0 || h == 0 {
        bail!("invalid dimensions '{line}'");
    }
    Ok(Resolution::new(w, h))
}
