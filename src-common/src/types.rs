//! Shared status types exchanged between the capture service and its clients.

use serde::{Deserialize, Serialize};

/// Phase of the capture job slot.
///
/// A job walks these phases strictly in order and always returns to
/// [`CapturePhase::Idle`] when it settles, whether it succeeded or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CapturePhase {
    /// No job is active
    #[default]
    Idle,
    /// Choosing the video element to capture
    Selecting,
    /// Waiting for playback to reach a loop boundary
    Aligning,
    /// Tapping the element's media stream
    Acquiring,
    /// Recorder is being started
    Recording,
    /// Recording, waiting for the iteration to finish
    AwaitingEnd,
    /// Recorder stop requested, waiting for the final chunk
    Stopping,
    /// Decoding the recording and encoding the WAV container
    Transcoding,
    /// Handing the finished file to the delivery sink
    Delivering,
}

impl CapturePhase {
    /// Whether a job occupies the slot in this phase.
    pub fn is_active(self) -> bool {
        self != CapturePhase::Idle
    }

    /// Convert to string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            CapturePhase::Idle => "idle",
            CapturePhase::Selecting => "selecting",
            CapturePhase::Aligning => "aligning",
            CapturePhase::Acquiring => "acquiring",
            CapturePhase::Recording => "recording",
            CapturePhase::AwaitingEnd => "awaiting_end",
            CapturePhase::Stopping => "stopping",
            CapturePhase::Transcoding => "transcoding",
            CapturePhase::Delivering => "delivering",
        }
    }
}

/// Point-in-time projection of the capture job slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CaptureStatus {
    /// Whether the page currently offers a capturable video
    pub has_video: bool,
    /// Whether a capture job is in flight
    pub recording: bool,
    /// Milliseconds since the recorder started (0 before recording begins)
    pub elapsed_ms: u64,
    /// Message of the most recent failed job, cleared when a new job starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Current phase of the job slot
    #[serde(default)]
    pub phase: CapturePhase,
}
