//! Error types for capture operations.

use std::fmt;

/// Broad category of a [`CaptureError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Job contention or no usable source; reported to the caller of start
    Precondition,
    /// The host lacks a capture, recording or decoding capability
    CapabilityMissing,
    /// Alignment, metadata or iteration-end wait exceeded its bound
    Timeout,
    /// The recording produced no usable data
    DataIntegrity,
    /// Anything else raised inside the pipeline
    Unexpected,
}

/// Error type for capture operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// A capture job already occupies the slot
    AlreadyRunning,
    /// The page has no video element worth capturing
    NoSuitableVideo,
    /// Playback element does not expose stream capture
    StreamCaptureUnavailable,
    /// The host has no recording primitive
    RecorderUnavailable,
    /// The host has no audio decoding primitive
    DecoderUnavailable,
    /// The captured stream carries no audio track
    NoAudioTrack,
    /// Element metadata did not load in time
    MetadataTimeout,
    /// No loop boundary was observed before the alignment deadline
    AlignmentTimeout,
    /// The iteration did not finish before the end-detection deadline
    IterationTimeout,
    /// Recorder stopped without delivering any data
    EmptyRecording,
    /// Host reported an error from the playback element or recorder
    PlatformError(String),
    /// Recorded audio could not be decoded
    Decode(String),
    /// Decoded audio is not a valid sample buffer
    InvalidSamples(String),
    /// The finished file could not be delivered
    Delivery(String),
}

impl CaptureError {
    /// Category of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            CaptureError::AlreadyRunning | CaptureError::NoSuitableVideo => {
                ErrorClass::Precondition
            }
            CaptureError::StreamCaptureUnavailable
            | CaptureError::RecorderUnavailable
            | CaptureError::DecoderUnavailable
            | CaptureError::NoAudioTrack => ErrorClass::CapabilityMissing,
            CaptureError::MetadataTimeout
            | CaptureError::AlignmentTimeout
            | CaptureError::IterationTimeout => ErrorClass::Timeout,
            CaptureError::EmptyRecording => ErrorClass::DataIntegrity,
            CaptureError::PlatformError(_)
            | CaptureError::Decode(_)
            | CaptureError::InvalidSamples(_)
            | CaptureError::Delivery(_) => ErrorClass::Unexpected,
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::AlreadyRunning => write!(f, "A capture is already running."),
            CaptureError::NoSuitableVideo => write!(f, "No suitable video found on this page."),
            CaptureError::StreamCaptureUnavailable => write!(
                f,
                "This browser/page does not allow media capture on this content."
            ),
            CaptureError::RecorderUnavailable => {
                write!(f, "Audio recording is not available in this browser.")
            }
            CaptureError::DecoderUnavailable => {
                write!(f, "Audio decoding is not available in this browser.")
            }
            CaptureError::NoAudioTrack => write!(f, "No capturable audio track was found."),
            CaptureError::MetadataTimeout => write!(f, "Timed out waiting for loadedmetadata."),
            CaptureError::AlignmentTimeout => write!(f, "Could not detect next loop start."),
            CaptureError::IterationTimeout => {
                write!(f, "Timed out waiting for a full iteration to complete.")
            }
            CaptureError::EmptyRecording => {
                write!(f, "Capture finished but produced no audio data.")
            }
            CaptureError::PlatformError(msg) => write!(f, "Platform error: {}", msg),
            CaptureError::Decode(msg) => write!(f, "Could not decode recorded audio: {}", msg),
            CaptureError::InvalidSamples(msg) => write!(f, "Invalid decoded audio: {}", msg),
            CaptureError::Delivery(msg) => write!(f, "Could not save the audio file: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<CaptureError> for String {
    fn from(err: CaptureError) -> Self {
        err.to_string()
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Delivery(err.to_string())
    }
}

impl From<symphonia::core::errors::Error> for CaptureError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        CaptureError::Decode(err.to_string())
    }
}
