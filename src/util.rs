use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Formats the given [Duration] as "MM:SSs"
pub fn format_time(t: Duration) -> String {
    let minutes = t.as_secs() / 60;
    let seconds = t.as_secs() % 60;
    format!("{:02}:{:02}s", minutes, seconds)
}

/// Converts a frame index at `fps` frames per second into a [Duration].
pub fn frame_to_duration(frame: usize, fps: u32) -> Duration {
    if fps == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(frame as f64 / fps as f64)
}

// Reads up to `buf.len()` bytes from the start of the file. Returns the number of bytes read.
fn read_header(path: &Path, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut f = std::fs::File::open(path)?;
    let mut total = 0;
    while total < buf.len() {
        let n = f.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

/// Checks if the given path points to a WAV file. Only the file header is checked.
pub fn is_valid_audio_file(path: impl AsRef<Path>) -> bool {
    let mut buf = [0u8; 64];
    match read_header(path.as_ref(), &mut buf) {
        Ok(n) => infer::audio::is_wav(&buf[..n]),
        Err(_) => false,
    }
}

/// Hashes the first 8 KiB of a file. Shorter files are hashed whole.
pub(crate) fn compute_header_md5sum(path: impl AsRef<Path>) -> crate::Result<String> {
    let mut buf = [0u8; 8192];
    let n = read_header(path.as_ref(), &mut buf)?;
    let hash = format!("{:x}", md5::compute(&buf[..n]));
    Ok(hash)
}

/// Returns the underlying FFmpeg version string used to decode audio.
#[cfg(feature = "ffmpeg")]
pub fn ffmpeg_version_string() -> String {
    let version_int = ffmpeg_next::util::version();

    // Reference: https://github.com/FFmpeg/FFmpeg/blob/130d19bf2044ac76372d1b97ab87ab283c8b37f8/libavutil/version.h#L64
    format!(
        "{}.{}.{}",
        version_int >> 16,
        (version_int & 0x00FF00) >> 8,
        version_int & 0xFF
    )
}
