//! Runtime types for capture operations (service-internal).
//!
//! These types carry live media handles and sample data and are not
//! serializable for IPC. For IPC-compatible types, see loopgrab-common.

use std::sync::Arc;
use tokio::sync::mpsc;

use super::error::CaptureError;
use super::MediaTrack;

/// Kind of a track inside a capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Events emitted by a playback element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Duration and dimensions are now known
    LoadedMetadata,
    /// Playback reached the end of the media (non-looping elements only)
    Ended,
}

/// Events emitted by a running recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// A chunk of encoded audio
    Data(Vec<u8>),
    /// The recorder has stopped and flushed its last chunk
    Stopped,
}

/// Receiver for recorder output.
pub type RecorderReceiver = mpsc::UnboundedReceiver<RecorderEvent>;

/// A live capture stream tapped from a playback element.
///
/// Owns its tracks; [`CaptureStream::stop_all`] stops every track once and
/// leaves the stream empty, so repeated calls are no-ops.
pub struct CaptureStream {
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl CaptureStream {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }

    /// All tracks still held by this stream.
    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    /// The audio tracks of this stream.
    pub fn audio_tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks
            .iter()
            .filter(|t| t.kind() == TrackKind::Audio)
            .cloned()
            .collect()
    }

    /// Stop and release every track. Returns how many tracks were stopped.
    pub fn stop_all(&mut self) -> usize {
        let tracks = std::mem::take(&mut self.tracks);
        for track in &tracks {
            track.stop();
        }
        tracks.len()
    }
}

impl std::fmt::Debug for CaptureStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureStream")
            .field("tracks", &self.tracks.len())
            .finish()
    }
}

/// Decoded audio: one sample vector per channel, all of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSampleBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioSampleBuffer {
    /// Build a buffer from planar channel data.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, CaptureError> {
        if channels.is_empty() {
            return Err(CaptureError::InvalidSamples("no channels".to_string()));
        }
        if channels.len() > u16::MAX as usize {
            return Err(CaptureError::InvalidSamples(format!(
                "{} channels exceeds the container limit",
                channels.len()
            )));
        }
        if sample_rate == 0 {
            return Err(CaptureError::InvalidSamples("sample rate is zero".to_string()));
        }
        let frames = channels[0].len();
        if let Some(pos) = channels.iter().position(|c| c.len() != frames) {
            return Err(CaptureError::InvalidSamples(format!(
                "channel {} has {} frames, expected {}",
                pos,
                channels[pos].len(),
                frames
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }
}

/// Concatenated recorder output awaiting transcoding.
#[derive(Debug, Clone)]
pub struct RecordedAudio {
    pub data: Vec<u8>,
    /// MIME type reported by the recorder (e.g. `audio/webm;codecs=opus`)
    pub mime_type: String,
}

impl RecordedAudio {
    /// Join recorder chunks in arrival order.
    pub fn from_chunks(chunks: Vec<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            data: chunks.concat(),
            mime_type: mime_type.into(),
        }
    }
}

/// Finished audio file ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    /// Lowercase file extension matching the container
    pub extension: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTrack {
        kind: TrackKind,
        stops: Arc<AtomicUsize>,
    }

    impl MediaTrack for CountingTrack {
        fn kind(&self) -> TrackKind {
            self.kind
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_stop_all_is_idempotent() {
        let stops = Arc::new(AtomicUsize::new(0));
        let tracks: Vec<Arc<dyn MediaTrack>> = vec![
            Arc::new(CountingTrack {
                kind: TrackKind::Video,
                stops: stops.clone(),
            }),
            Arc::new(CountingTrack {
                kind: TrackKind::Audio,
                stops: stops.clone(),
            }),
        ];
        let mut stream = CaptureStream::new(tracks);
        assert_eq!(stream.audio_tracks().len(), 1);

        assert_eq!(stream.stop_all(), 2);
        assert_eq!(stream.stop_all(), 0);
        assert_eq!(stops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_sample_buffer_rejects_ragged_channels() {
        let err = AudioSampleBuffer::new(44100, vec![vec![0.0; 4], vec![0.0; 3]]).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidSamples(_)));
        assert!(AudioSampleBuffer::new(44100, vec![]).is_err());
        assert!(AudioSampleBuffer::new(0, vec![vec![0.0]]).is_err());
    }

    #[test]
    fn test_recorded_audio_keeps_chunk_order() {
        let recorded = RecordedAudio::from_chunks(vec![vec![1, 2], vec![3]], "audio/webm");
        assert_eq!(recorded.data, vec![1, 2, 3]);
    }
}
