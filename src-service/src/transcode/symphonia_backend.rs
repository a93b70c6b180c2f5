//! In-process decode backend built on Symphonia.
//!
//! Covers the containers and codecs Symphonia ships by default (WAV, FLAC,
//! Ogg/Vorbis, Matroska/WebM demuxing). Hosts with their own decoder can
//! supply it through [`crate::capture::MediaHost::audio_decoder`] instead.

use std::io::{Cursor, ErrorKind};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use crate::capture::{AudioDecoder, AudioSampleBuffer, CaptureError, DecodeContext};

/// Decoder backed by the default Symphonia registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn create_context(&self) -> Result<Box<dyn DecodeContext>, CaptureError> {
        Ok(Box::new(SymphoniaContext { closed: false }))
    }
}

struct SymphoniaContext {
    closed: bool,
}

impl DecodeContext for SymphoniaContext {
    fn decode(&mut self, data: &[u8], mime_type: &str) -> Result<AudioSampleBuffer, CaptureError> {
        if self.closed {
            return Err(CaptureError::Decode("decode context already closed".to_string()));
        }
        decode_bytes(data, mime_type)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Container extension for a MIME type, ignoring codec parameters.
fn extension_for(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.as_str() {
        "audio/webm" | "video/webm" => Some("webm"),
        "audio/ogg" | "video/ogg" | "application/ogg" => Some("ogg"),
        "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => Some("wav"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/mp4" | "video/mp4" => Some("mp4"),
        _ => None,
    }
}

fn decode_bytes(data: &[u8], mime_type: &str) -> Result<AudioSampleBuffer, CaptureError> {
    let mut hint = Hint::new();
    if let Some(extension) = extension_for(mime_type) {
        hint.with_extension(extension);
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());
    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| CaptureError::Decode("no decodable audio track".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let count = spec.channels.count();
                if channels.is_empty() {
                    channels = vec![Vec::new(); count];
                    sample_rate = Some(spec.rate);
                } else if channels.len() != count {
                    return Err(CaptureError::InvalidSamples(format!(
                        "channel count changed from {} to {} mid-stream",
                        channels.len(),
                        count
                    )));
                }
                if decoded.frames() == 0 {
                    continue;
                }

                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                for frame in buf.samples().chunks_exact(count) {
                    for (channel, sample) in channels.iter_mut().zip(frame) {
                        channel.push(*sample);
                    }
                }
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
            }
            Err(err) => return Err(err.into()),
        }
    }

    if channels.is_empty() {
        return Err(CaptureError::Decode("no audio frames decoded".to_string()));
    }
    let sample_rate =
        sample_rate.ok_or_else(|| CaptureError::Decode("unknown sample rate".to_string()))?;
    debug!(
        "Symphonia decoded {} channels at {} Hz",
        channels.len(),
        sample_rate
    );

    AudioSampleBuffer::new(sample_rate, channels)
}
