//! Recorded audio to WAV transcoding.
//!
//! Decoding goes through the host's [`AudioDecoder`]; the decoded samples are
//! then handed to the container encoder. The decode context is always closed,
//! whether decoding succeeds or not.

mod symphonia_backend;

pub use symphonia_backend::SymphoniaDecoder;

use std::sync::Arc;
use tracing::{debug, info};

use crate::capture::{AudioDecoder, AudioSampleBuffer, CaptureError, DecodeContext, EncodedAudio, RecordedAudio};
use crate::encoder::encode_wav;

/// Owns a decode context and closes it exactly once.
struct ContextGuard {
    context: Option<Box<dyn DecodeContext>>,
}

impl ContextGuard {
    fn acquire(decoder: &dyn AudioDecoder) -> Result<Self, CaptureError> {
        Ok(Self {
            context: Some(decoder.create_context()?),
        })
    }

    fn decode(&mut self, data: &[u8], mime_type: &str) -> Result<AudioSampleBuffer, CaptureError> {
        match self.context.as_mut() {
            Some(context) => context.decode(data, mime_type),
            None => Err(CaptureError::DecoderUnavailable),
        }
    }

    fn close(&mut self) {
        if let Some(mut context) = self.context.take() {
            context.close();
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.close();
    }
}

/// Decode a recording into samples, releasing the context afterwards.
pub fn decode_recording(
    decoder: &dyn AudioDecoder,
    recorded: &RecordedAudio,
) -> Result<AudioSampleBuffer, CaptureError> {
    let mut guard = ContextGuard::acquire(decoder)?;
    let result = guard.decode(&recorded.data, &recorded.mime_type);
    guard.close();
    result
}

/// Decode and re-encode a recording as WAV.
///
/// Runs on the blocking pool since both steps are CPU-bound.
pub async fn transcode_to_wav(
    decoder: Arc<dyn AudioDecoder>,
    recorded: RecordedAudio,
) -> Result<EncodedAudio, CaptureError> {
    debug!(
        "Transcoding {} bytes of {}",
        recorded.data.len(),
        recorded.mime_type
    );

    let encoded = tokio::task::spawn_blocking(move || {
        let samples = decode_recording(decoder.as_ref(), &recorded)?;
        info!(
            "Decoded {} frames x {} channels at {} Hz",
            samples.frame_count(),
            samples.channel_count(),
            samples.sample_rate()
        );
        encode_wav(&samples)
    })
    .await
    .map_err(|e| CaptureError::PlatformError(format!("Transcode task failed: {}", e)))??;

    Ok(encoded)
}
