//! Video file and camera frames decoded by an `ffmpeg` subprocess.
//!
//! ffmpeg writes every decoded frame to stdout as a binary PPM image; frames
//! are parsed off the pipe one at a time, so memory use is bounded by what the
//! caller keeps.

use std::io::BufReader;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use camera_motion_common::frame::FrameId;
use image::GrayImage;
use tracing::{debug, info, warn};

use crate::pnm::PnmStream;
use crate::{to_gray, FrameSource, SourceError};

pub struct FfmpegSource {
    name: String,
    child: Option<Child>,
    stream: PnmStream<BufReader<ChildStdout>>,
    resize: Option<(u32, u32)>,
    next_index: usize,
}

impl FfmpegSource {
    pub fn open_video(path: &Path, resize: Option<(u32, u32)>) -> Result<Self, SourceError> {
        if !path.is_file() {
            return Err(SourceError::NotFound(path.display().to_string()));
        }
        let input = path.display().to_string();
        Self::spawn(input.clone(), &["-i", &input], None, resize)
    }

    /// Capture up to `frame_limit` frames from a local camera device.
    pub fn open_camera(
        device: &str,
        frame_limit: Option<usize>,
        resize: Option<(u32, u32)>,
    ) -> Result<Self, SourceError> {
        let (format, input) = camera_input(device);
        Self::spawn(
            format!("camera {device}"),
            &["-f", format, "-i", &input],
            frame_limit,
            resize,
        )
    }

    fn spawn(
        name: String,
        input_args: &[&str],
        frame_limit: Option<usize>,
        resize: Option<(u32, u32)>,
    ) -> Result<Self, SourceError> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"])
            .args(input_args);
        if let Some(limit) = frame_limit {
            let limit = limit.to_string();
            cmd.args(["-frames:v", limit.as_str()]);
        }
        cmd.args(["-f", "image2pipe", "-vcodec", "ppm", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(|e| SourceError::Spawn(e.to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::Spawn("could not get stdout handle".into()))?;

        debug!(source = name, ?frame_limit, ?resize, "ffmpeg decoder started");

        Ok(Self {
            name,
            child: Some(child),
            stream: PnmStream::new(BufReader::new(stdout)),
            resize,
            next_index: 0,
        })
    }

    /// Kill and reap the decoder. Stopping early (frame cap, decode error)
    /// leaves ffmpeg running otherwise.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            match child.wait() {
                Ok(status) => debug!(source = self.name, %status, frames = self.next_index, "decoder stopped"),
                Err(e) => warn!(source = self.name, error = %e, "failed to wait for ffmpeg"),
            }
        }
    }

    /// Reap the decoder once the stream is exhausted.
    fn finish(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        match child.wait() {
            Ok(status) if status.success() => {
                info!(source = self.name, frames = self.next_index, "decoder finished");
            }
            Ok(status) => {
                warn!(source = self.name, %status, frames = self.next_index, "ffmpeg exited with error");
            }
            Err(e) => {
                warn!(source = self.name, error = %e, "failed to wait for ffmpeg");
            }
        }
    }
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> Result<Option<(FrameId, GrayImage)>, SourceError> {
        match self.stream.next_image()? {
            Some(image) => {
                let id = FrameId::Index(self.next_index);
                self.next_index += 1;
                Ok(Some((id, to_gray(image, self.resize))))
            }
            None => {
                self.finish();
                Ok(None)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// ffmpeg demuxer and input name for a camera on this platform.
fn camera_input(device: &str) -> (&'static str, String) {
    if cfg!(target_os = "macos") {
        ("avfoundation", device.to_string())
    } else if cfg!(target_os = "windows") {
        ("dshow", format!("video={device}"))
    } else {
        ("v4l2", device.to_string())
    }
}

/// Check whether ffmpeg is available on PATH. Logs a warning if not found.
pub fn check_ffmpeg_available() -> bool {
    match Command::new("ffmpeg").arg("-version").output() {
        Ok(out) if out.status.success() => {
            debug!("ffmpeg is available");
            true
        }
        Ok(_) => {
            warn!("ffmpeg returned non-zero for -version; video decoding may fail");
            false
        }
        Err(e) => {
            warn!(
                error = %e,
                "ffmpeg not found on PATH; video and camera sources will be empty"
            );
            false
        }
    }
}
