//! WAV container encoding.
//!
//! Turns decoded planar samples into a 16-bit PCM RIFF/WAVE file held in
//! memory. Encoding is pure: the same buffer always yields the same bytes.

use crate::capture::{AudioSampleBuffer, CaptureError, EncodedAudio};

pub const WAV_CONTENT_TYPE: &str = "audio/wav";
pub const WAV_EXTENSION: &str = "wav";

/// Size of the canonical PCM header.
pub const WAV_HEADER_LEN: usize = 44;

const BYTES_PER_SAMPLE: u32 = 2;

/// Encode a sample buffer as a 16-bit PCM WAV file.
///
/// Samples are interleaved frame by frame. Each value is clamped to
/// `[-1.0, 1.0]`, negatives are scaled by 32768 and the rest by 32767, and the
/// result is truncated toward zero.
///
/// Fails when the data would not fit the 32-bit RIFF size fields.
pub fn encode_wav(buffer: &AudioSampleBuffer) -> Result<EncodedAudio, CaptureError> {
    let frames = buffer.frame_count();
    let (channels, data_size) = riff_layout(buffer.sample_rate(), buffer.channel_count(), frames)?;

    let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + data_size as usize);
    bytes.extend_from_slice(&create_wav_header(
        buffer.sample_rate(),
        channels,
        data_size,
    ));

    for frame in 0..frames {
        for channel in buffer.channels() {
            bytes.extend_from_slice(&sample_to_pcm16(channel[frame]).to_le_bytes());
        }
    }

    Ok(EncodedAudio {
        bytes,
        content_type: WAV_CONTENT_TYPE,
        extension: WAV_EXTENSION,
    })
}

/// Channel count and data chunk size, checked against the header field widths.
fn riff_layout(
    sample_rate: u32,
    channels: usize,
    frames: usize,
) -> Result<(u16, u32), CaptureError> {
    let too_large = || {
        CaptureError::InvalidSamples(format!(
            "{} frames x {} channels at {} Hz exceed the WAV size limit",
            frames, channels, sample_rate
        ))
    };

    let channel_count = u16::try_from(channels).map_err(|_| too_large())?;
    let data_size = frames
        .checked_mul(channels)
        .and_then(|samples| samples.checked_mul(BYTES_PER_SAMPLE as usize))
        .and_then(|bytes| u32::try_from(bytes).ok())
        .filter(|size| size.checked_add(36).is_some())
        .ok_or_else(too_large)?;
    sample_rate
        .checked_mul(u32::from(channel_count) * BYTES_PER_SAMPLE)
        .ok_or_else(too_large)?;

    Ok((channel_count, data_size))
}

/// Quantize one float sample to signed 16-bit.
pub fn sample_to_pcm16(sample: f32) -> i16 {
    let clamped = if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    };
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

/// Create a WAV file header.
fn create_wav_header(sample_rate: u32, channels: u16, data_size: u32) -> Vec<u8> {
    let byte_rate = sample_rate * u32::from(channels) * BYTES_PER_SAMPLE;
    let block_align = channels * BYTES_PER_SAMPLE as u16;
    let file_size = 36 + data_size;

    let mut header = Vec::with_capacity(WAV_HEADER_LEN);

    // RIFF header
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&file_size.to_le_bytes());
    header.extend_from_slice(b"WAVE");

    // fmt chunk
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes()); // Chunk size
    header.extend_from_slice(&1u16.to_le_bytes()); // Audio format (PCM)
    header.extend_from_slice(&channels.to_le_bytes());
    header.extend_from_slice(&sample_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&16u16.to_le_bytes()); // Bits per sample

    // data chunk
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_size.to_le_bytes());

    header
}
