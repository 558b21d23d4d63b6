use std::path::{Path, PathBuf};

use image::{imageops, GrayImage, RgbImage};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::config::FrameLayout;
use crate::shot::Shot;
use crate::{Error, Result};

#[cfg(feature = "ffmpeg")]
mod decoder;
pub(crate) mod wav;

/// A single decoded video frame.
///
/// On disk, a frame is stored as three consecutive color planes (R, G and B), each `width * height`
/// bytes. In memory, the planes are interleaved into a regular RGB pixel grid.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Builds a frame from planar bytes. Returns `None` if `planes` does not match the layout.
    pub fn from_planes(layout: FrameLayout, planes: &[u8]) -> Option<Self> {
        if planes.len() != layout.frame_len() {
            return None;
        }
        let n = layout.plane_len();
        let (r, rest) = planes.split_at(n);
        let (g, b) = rest.split_at(n);
        let mut data = Vec::with_capacity(planes.len());
        for i in 0..n {
            data.extend_from_slice(&[r[i], g[i], b[i]]);
        }
        Self::from_rgb(layout.width, layout.height, data)
    }

    /// Builds a frame from interleaved RGB bytes.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(|image| Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Returns the luminance of this frame scaled to `width` x `height`.
    pub fn luma(&self, width: u32, height: u32) -> GrayImage {
        let gray = imageops::grayscale(&self.image);
        if gray.dimensions() == (width, height) {
            gray
        } else {
            imageops::resize(&gray, width, height, imageops::FilterType::Triangle)
        }
    }
}

/// Interleaved PCM samples for the audio track of a video.
#[derive(Clone, Debug, Default)]
pub struct AudioBuffer {
    samples: Vec<i32>,
    channels: u16,
    sample_rate: u32,
    sample_width: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<i32>, channels: u16, sample_rate: u32, sample_width: u16) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate,
            sample_width,
        }
    }

    /// Reads a PCM WAV file.
    pub fn from_wav(path: impl AsRef<Path>) -> Result<Self> {
        wav::read(path.as_ref())
    }

    /// Decodes the best audio stream of any file FFmpeg understands into 16-bit stereo.
    #[cfg(feature = "ffmpeg")]
    pub fn decode(path: impl AsRef<Path>) -> Result<Self> {
        decoder::decode(path.as_ref())
    }

    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Width of a single sample, in bytes.
    pub fn sample_width(&self) -> u16 {
        self.sample_width
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of audio samples that play during one video frame (per channel).
    pub fn samples_per_frame(&self, fps: u32) -> usize {
        if fps == 0 {
            return 0;
        }
        (self.sample_rate / fps) as usize
    }

    /// Returns the interleaved samples that play during video frames `[start, end)`.
    ///
    /// The range is clamped to the buffer, so frames past the end of the audio yield an empty
    /// slice.
    pub fn frame_slice(&self, start: usize, end: usize, fps: u32) -> &[i32] {
        let stride = self.samples_per_frame(fps) * self.channels as usize;
        let len = self.samples.len();
        let start = start.saturating_mul(stride).min(len);
        let end = end.saturating_mul(stride).min(len).max(start);
        &self.samples[start..end]
    }
}

/// In-memory frames and audio of one video. Shared read-only by every analysis stage.
#[derive(Clone, Debug, Default)]
pub struct FrameStore {
    frames: Vec<Frame>,
    audio: AudioBuffer,
}

impl FrameStore {
    pub fn new(frames: Vec<Frame>, audio: AudioBuffer) -> Self {
        Self { frames, audio }
    }

    /// Loads every raw frame in `frames_dir` and the WAV file at `audio_path`.
    ///
    /// With the `ffmpeg` feature, other audio files are decoded with FFmpeg.
    pub fn load(
        frames_dir: impl AsRef<Path>,
        audio_path: impl AsRef<Path>,
        layout: FrameLayout,
    ) -> Result<Self> {
        let frames = load_frames(frames_dir, layout)?;
        let audio_path = audio_path.as_ref();
        #[cfg(feature = "ffmpeg")]
        let audio = if crate::util::is_valid_audio_file(audio_path) {
            AudioBuffer::from_wav(audio_path)?
        } else {
            AudioBuffer::decode(audio_path)?
        };
        #[cfg(not(feature = "ffmpeg"))]
        let audio = AudioBuffer::from_wav(audio_path)?;
        Ok(Self::new(frames, audio))
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn audio(&self) -> &AudioBuffer {
        &self.audio
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames that belong to the given shot.
    pub fn shot_frames(&self, shot: &Shot) -> &[Frame] {
        let end = shot.end.min(self.frames.len());
        &self.frames[shot.start.min(end)..end]
    }
}

// Extracts the frame number from a file name by concatenating all of its digits.
fn frame_number(name: &str) -> std::result::Result<u64, &'static str> {
    let digits: String = name.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err("file name has no frame number");
    }
    digits
        .parse()
        .map_err(|_| "frame number in file name does not fit in 64 bits")
}

/// Lists the frame files in `dir`, ordered by the frame number embedded in each file name (and by
/// name when two numbers are equal). Hidden files and directories are ignored.
pub fn list_frame_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        let number = frame_number(&name).map_err(|reason| Error::FrameRead {
            path: path.clone(),
            reason: reason.to_owned(),
        })?;
        files.push((number, name, path));
    }
    files.sort();
    Ok(files.into_iter().map(|(_, _, path)| path).collect())
}

fn read_frame(path: &Path, layout: FrameLayout) -> Result<Frame> {
    let bytes = std::fs::read(path).map_err(|e| Error::FrameRead {
        path: path.to_owned(),
        reason: e.to_string(),
    })?;
    Frame::from_planes(layout, &bytes).ok_or_else(|| Error::FrameRead {
        path: path.to_owned(),
        reason: format!(
            "expected {} bytes, found {}",
            layout.frame_len(),
            bytes.len()
        ),
    })
}

/// Reads all raw frames in `dir`. Any unreadable or wrongly sized frame fails the whole load.
pub fn load_frames(dir: impl AsRef<Path>, layout: FrameLayout) -> Result<Vec<Frame>> {
    let span = tracing::span!(tracing::Level::TRACE, "load_frames");
    let _enter = span.enter();

    let paths = list_frame_files(&dir)?;
    tracing::debug!(
        num_frames = paths.len(),
        "reading frames from {}",
        dir.as_ref().display()
    );

    #[cfg(feature = "rayon")]
    let frames = paths
        .par_iter()
        .map(|path| read_frame(path, layout))
        .collect::<Result<Vec<_>>>()?;
    #[cfg(not(feature = "rayon"))]
    let frames = paths
        .iter()
        .map(|path| read_frame(path, layout))
        .collect::<Result<Vec<_>>>()?;

    Ok(frames)
}
