//! Host media capability seam.
//!
//! The page-embedded media runtime (playback elements, stream capture,
//! recording, audio decoding) is provided by the host. This module defines
//! the traits the capture pipeline consumes; hosts implement them and tests
//! substitute scripted implementations.

pub mod boundary;
pub mod error;
#[cfg(test)]
pub(crate) mod fake;
pub mod selector;
pub mod types;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub use error::{CaptureError, ErrorClass};
pub use types::{
    AudioSampleBuffer, CaptureStream, EncodedAudio, PlaybackEvent, RecordedAudio, RecorderEvent,
    RecorderReceiver, TrackKind,
};

/// A playable media element on the page.
///
/// The host owns the element; the pipeline only observes and nudges it.
pub trait PlaybackHandle: Send + Sync {
    /// Current playback position in seconds (may be NaN while loading).
    fn current_time(&self) -> f64;

    /// Total duration in seconds (NaN or infinite when unknown).
    fn duration(&self) -> f64;

    fn is_paused(&self) -> bool;

    fn is_ended(&self) -> bool;

    /// Whether duration and position are known yet.
    fn has_metadata(&self) -> bool;

    /// Rendered (width, height) in CSS pixels.
    fn rendered_size(&self) -> (u32, u32);

    /// Whether this element renders video rather than audio only.
    fn is_video(&self) -> bool {
        true
    }

    /// Move the playback position.
    fn seek(&self, position: f64);

    /// Resume playback.
    fn play(&self) -> Result<(), CaptureError>;

    /// Subscribe to element events.
    fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent>;

    /// Whether the element exposes stream capture at all.
    fn supports_capture_stream(&self) -> bool;

    /// Tap a live stream from the element.
    fn capture_stream(&self) -> Result<CaptureStream, CaptureError>;
}

/// A single track of a capture stream.
pub trait MediaTrack: Send + Sync {
    fn kind(&self) -> TrackKind;

    /// Stop the track and release its source.
    fn stop(&self);
}

/// A running recorder.
pub trait MediaRecorder: Send {
    /// MIME type the recorder actually produces, if it reports one.
    fn mime_type(&self) -> Option<String>;

    /// Request a stop. The recorder flushes its last chunk and then emits
    /// [`RecorderEvent::Stopped`].
    fn stop(&mut self);
}

/// The host's recording primitive.
pub trait RecorderBackend: Send + Sync {
    /// Whether the recorder can produce the given MIME type.
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Start recording the given tracks, emitting a chunk every `timeslice`.
    ///
    /// `mime_type` of `None` lets the recorder choose its default encoding.
    fn start(
        &self,
        tracks: Vec<Arc<dyn MediaTrack>>,
        mime_type: Option<&str>,
        timeslice: Duration,
    ) -> Result<(Box<dyn MediaRecorder>, RecorderReceiver), CaptureError>;
}

/// A decoding context acquired from an [`AudioDecoder`].
pub trait DecodeContext: Send {
    /// Decode a complete recording into planar samples.
    fn decode(&mut self, data: &[u8], mime_type: &str) -> Result<AudioSampleBuffer, CaptureError>;

    /// Release the context. Called exactly once, after success or failure.
    fn close(&mut self);
}

/// The host's audio decoding primitive.
pub trait AudioDecoder: Send + Sync {
    fn create_context(&self) -> Result<Box<dyn DecodeContext>, CaptureError>;
}

/// The page-level host: element query plus optional capabilities.
pub trait MediaHost: Send + Sync {
    /// All media elements on the page, in document order.
    fn playback_elements(&self) -> Vec<Arc<dyn PlaybackHandle>>;

    /// Page title, if the page has one.
    fn page_title(&self) -> Option<String>;

    /// Recording primitive, `None` when the host has none.
    fn recorder_backend(&self) -> Option<Arc<dyn RecorderBackend>>;

    /// Audio decoding primitive, `None` when the host has none.
    fn audio_decoder(&self) -> Option<Arc<dyn AudioDecoder>>;
}

/// Playback position, reading non-finite values as 0.
pub fn position_of(handle: &dyn PlaybackHandle) -> f64 {
    let t = handle.current_time();
    if t.is_finite() {
        t
    } else {
        0.0
    }
}

/// Duration if it is finite and positive.
pub fn known_duration(handle: &dyn PlaybackHandle) -> Option<f64> {
    let d = handle.duration();
    (d.is_finite() && d > 0.0).then_some(d)
}

/// Pick the first MIME type from `candidates` the recorder supports.
pub fn pick_recorder_type(backend: &dyn RecorderBackend, candidates: &[String]) -> Option<String> {
    candidates
        .iter()
        .find(|mime| backend.is_type_supported(mime))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OggOnly;

    impl RecorderBackend for OggOnly {
        fn is_type_supported(&self, mime_type: &str) -> bool {
            mime_type.starts_with("audio/ogg")
        }

        fn start(
            &self,
            _tracks: Vec<Arc<dyn MediaTrack>>,
            _mime_type: Option<&str>,
            _timeslice: Duration,
        ) -> Result<(Box<dyn MediaRecorder>, RecorderReceiver), CaptureError> {
            Err(CaptureError::RecorderUnavailable)
        }
    }

    fn candidates() -> Vec<String> {
        crate::config::default_recorder_mime_types()
    }

    #[test]
    fn test_pick_recorder_type_respects_preference_order() {
        assert_eq!(
            pick_recorder_type(&OggOnly, &candidates()).as_deref(),
            Some("audio/ogg;codecs=opus")
        );
    }

    #[test]
    fn test_pick_recorder_type_falls_back_to_default() {
        let only_wav = vec!["audio/wav".to_string()];
        assert_eq!(pick_recorder_type(&OggOnly, &only_wav), None);
    }
}
