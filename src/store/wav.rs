extern crate hound;

use std::io::Read;
use std::path::Path;

use super::AudioBuffer;
use crate::{Error, Result};

/// Full scale used when converting floating point samples to 16-bit integers.
const FLOAT_SCALE: f32 = 32768.0;

pub(super) fn read(path: &Path) -> Result<AudioBuffer> {
    let reader = hound::WavReader::open(path)?;
    let audio = decode(reader)?;
    tracing::debug!(
        samples = audio.samples().len(),
        channels = audio.channels(),
        sample_rate = audio.sample_rate(),
        "read audio from {}",
        path.display()
    );
    Ok(audio)
}

/// Decodes every sample of a WAV stream.
///
/// Integer PCM (8, 16, 24 or 32 bits) is kept as is. 32-bit float PCM is scaled to the 16-bit
/// range. Any other sub-format is rejected by [hound].
pub(crate) fn decode<R: Read>(reader: hound::WavReader<R>) -> Result<AudioBuffer> {
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(Error::InvalidAudio("zero channels".to_owned()));
    }

    let (mut samples, sample_width) = match spec.sample_format {
        hound::SampleFormat::Int => {
            let samples = reader
                .into_samples::<i32>()
                .collect::<std::result::Result<Vec<_>, _>>()?;
            (samples, (spec.bits_per_sample + 7) / 8)
        }
        hound::SampleFormat::Float => {
            let samples = reader
                .into_samples::<f32>()
                .map(|s| s.map(|s| (s * FLOAT_SCALE).round().clamp(-32768.0, 32767.0) as i32))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            (samples, 2)
        }
    };

    // Drop a trailing partial sample frame, if any.
    samples.truncate(samples.len() - samples.len() % spec.channels as usize);

    Ok(AudioBuffer::new(
        samples,
        spec.channels,
        spec.sample_rate,
        sample_width,
    ))
}

#[cfg(test)]
pub(crate) mod test {
    use std::io::Cursor;

    use super::*;

    fn write_wav<S: hound::Sample + Copy>(samples: &[S], spec: hound::WavSpec) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    /// Builds an integer PCM WAV file in memory.
    pub(crate) fn int_wav_bytes(
        samples: &[i32],
        channels: u16,
        sample_rate: u32,
        bits_per_sample: u16,
    ) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        };
        write_wav(samples, spec)
    }

    /// Builds a 16-bit PCM WAV file in memory.
    pub(crate) fn wav_bytes(samples: &[i16], channels: u16, sample_rate: u32) -> Vec<u8> {
        let samples: Vec<i32> = samples.iter().map(|&s| s as i32).collect();
        int_wav_bytes(&samples, channels, sample_rate, 16)
    }

    // Builds a mono WAV file with a WAVE_FORMAT_EXTENSIBLE header by hand, so the sub-format
    // GUID can be anything.
    fn extensible_wav_bytes(sub_format: u16, bits_per_sample: u16, data: &[u8]) -> Vec<u8> {
        let block_align = bits_per_sample / 8;
        let sample_rate = 8000u32;
        let mut fmt = Vec::new();
        fmt.extend_from_slice(&0xFFFEu16.to_le_bytes());
        fmt.extend_from_slice(&1u16.to_le_bytes());
        fmt.extend_from_slice(&sample_rate.to_le_bytes());
        fmt.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        fmt.extend_from_slice(&block_align.to_le_bytes());
        fmt.extend_from_slice(&bits_per_sample.to_le_bytes());
        fmt.extend_from_slice(&22u16.to_le_bytes());
        fmt.extend_from_slice(&bits_per_sample.to_le_bytes());
        // Front center.
        fmt.extend_from_slice(&4u32.to_le_bytes());
        fmt.extend_from_slice(&sub_format.to_le_bytes());
        fmt.extend_from_slice(&[
            0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
        ]);

        let mut buf = Vec::new();
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&((4 + 8 + fmt.len() + 8 + data.len()) as u32).to_le_bytes());
        buf.extend_from_slice(b"WAVE");
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&(fmt.len() as u32).to_le_bytes());
        buf.extend_from_slice(&fmt);
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(data);
        buf
    }

    fn parse(buf: Vec<u8>) -> Result<AudioBuffer> {
        decode(hound::WavReader::new(Cursor::new(buf))?)
    }

    #[test]
    fn test_decode_pcm16() {
        let audio = parse(wav_bytes(&[1, -2, 300, -32768], 2, 48000)).unwrap();
        assert_eq!(audio.samples(), &[1, -2, 300, -32768]);
        assert_eq!(audio.channels(), 2);
        assert_eq!(audio.sample_rate(), 48000);
        assert_eq!(audio.sample_width(), 2);
        assert_eq!(audio.samples_per_frame(30), 1600);
    }

    #[test]
    fn test_decode_pcm8() {
        let audio = parse(int_wav_bytes(&[-128, 0, 5, 127], 1, 8000, 8)).unwrap();
        assert_eq!(audio.samples(), &[-128, 0, 5, 127]);
        assert_eq!(audio.sample_width(), 1);
    }

    #[test]
    fn test_decode_pcm24() {
        let audio = parse(int_wav_bytes(&[-8_388_608, -1, 70_000, 8_388_607], 2, 8000, 24)).unwrap();
        assert_eq!(audio.samples(), &[-8_388_608, -1, 70_000, 8_388_607]);
        assert_eq!(audio.sample_width(), 3);
    }

    #[test]
    fn test_decode_extensible_pcm() {
        let data: Vec<u8> = [7i16, -9].iter().flat_map(|s| s.to_le_bytes()).collect();
        let audio = parse(extensible_wav_bytes(0x0001, 16, &data)).unwrap();
        assert_eq!(audio.samples(), &[7, -9]);
    }

    #[test]
    fn test_decode_extensible_float() {
        let data: Vec<u8> = [0.5f32, -0.25].iter().flat_map(|s| s.to_le_bytes()).collect();
        let audio = parse(extensible_wav_bytes(0x0003, 32, &data)).unwrap();
        assert_eq!(audio.samples(), &[16384, -8192]);
        assert_eq!(audio.sample_width(), 2);
    }

    #[test]
    fn test_decode_rejects_unknown_sub_format() {
        // A-law.
        let result = parse(extensible_wav_bytes(0x0006, 8, &[1, 2, 3]));
        assert!(matches!(result, Err(Error::WavError(_))));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            parse(b"definitely not audio".to_vec()),
            Err(Error::WavError(_))
        ));
    }

    #[test]
    fn test_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        std::fs::write(&path, wav_bytes(&[5, 6, 7], 1, 8000)).unwrap();
        let audio = AudioBuffer::from_wav(&path).unwrap();
        assert_eq!(audio.samples(), &[5, 6, 7]);
    }
}
