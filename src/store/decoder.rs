extern crate ffmpeg_next;

use std::path::Path;

use super::AudioBuffer;
use crate::{Error, Result};

/// Sample rate of decoded audio. At 30 fps, this gives the usual 1600 samples per frame.
pub(crate) const DECODE_SAMPLE_RATE: u32 = 48_000;

const DECODE_CHANNELS: u16 = 2;

/// Thin wrapper around the native `FFmpeg` audio decoder.
struct Decoder {
    decoder: ffmpeg_next::codec::decoder::Audio,
}

impl Decoder {
    fn from_stream(stream: ffmpeg_next::format::stream::Stream) -> Result<Self> {
        let ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = ctx.decoder().audio()?;
        Ok(Self { decoder })
    }

    fn send_packet(&mut self, packet: &ffmpeg_next::packet::Packet) -> Result<()> {
        Ok(self.decoder.send_packet(packet)?)
    }

    fn receive_frame(&mut self, frame: &mut ffmpeg_next::frame::Audio) -> Result<()> {
        Ok(self.decoder.receive_frame(frame)?)
    }
}

fn s16_stereo() -> ffmpeg_next::format::Sample {
    ffmpeg_next::format::Sample::I16(ffmpeg_next::format::sample::Type::Packed)
}

// Appends the valid samples of a resampled (packed S16) frame.
fn push_samples(frame: &ffmpeg_next::frame::Audio, samples: &mut Vec<i32>) {
    // `data` is a fixed-size buffer; only the first `samples * channels` values are real.
    let len = frame.samples() * frame.channels() as usize * 2;
    samples.extend(
        frame.data(0)[..len]
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]) as i32),
    );
}

/// Decodes the best audio stream in `path` into interleaved 16-bit stereo at
/// [DECODE_SAMPLE_RATE].
pub(crate) fn decode(path: &Path) -> Result<AudioBuffer> {
    let span = tracing::span!(tracing::Level::TRACE, "decode_audio");
    let _enter = span.enter();

    ffmpeg_next::init()?;

    let mut ctx = ffmpeg_next::format::input(&path)?;
    let stream = ctx
        .streams()
        .best(ffmpeg_next::media::Type::Audio)
        .ok_or_else(|| Error::InvalidAudio(format!("no audio stream in {}", path.display())))?;
    let stream_idx = stream.index();
    let mut decoder = Decoder::from_stream(stream)?;

    let mut resampler = decoder.decoder.resampler(
        s16_stereo(),
        ffmpeg_next::ChannelLayout::STEREO,
        DECODE_SAMPLE_RATE,
    )?;

    let mut frame = ffmpeg_next::frame::Audio::empty();
    let mut frame_resampled = ffmpeg_next::frame::Audio::empty();
    let mut samples = Vec::new();

    for (s, p) in ctx.packets() {
        if s.index() != stream_idx {
            continue;
        }

        decoder.send_packet(&p)?;
        while decoder.receive_frame(&mut frame).is_ok() {
            let mut delay = match resampler.run(&frame, &mut frame_resampled) {
                Ok(v) => v,
                // The input format changed mid-stream; rebuild the resampler from this frame.
                Err(ffmpeg_next::Error::InputChanged) => {
                    resampler = frame.resampler(
                        s16_stereo(),
                        ffmpeg_next::ChannelLayout::STEREO,
                        DECODE_SAMPLE_RATE,
                    )?;
                    resampler.run(&frame, &mut frame_resampled)?
                }
                Err(e) => return Err(e.into()),
            };

            loop {
                push_samples(&frame_resampled, &mut samples);
                if delay.is_none() {
                    break;
                }
                delay = resampler.flush(&mut frame_resampled)?;
            }
        }
    }

    tracing::debug!(
        samples = samples.len(),
        "decoded audio from {}",
        path.display()
    );

    Ok(AudioBuffer::new(
        samples,
        DECODE_CHANNELS,
        DECODE_SAMPLE_RATE,
        2,
    ))
}
