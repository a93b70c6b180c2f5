//! IPC request types.

use serde::{Deserialize, Serialize};

/// IPC request from client to service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Capture one full loop iteration of the best video on the page.
    ///
    /// Answered as soon as the job is accepted or rejected; completion is
    /// observed through [`Request::GetStatus`].
    StartCapture,
    /// Get a snapshot of the capture job slot
    GetStatus,
    /// Ping for health check
    Ping,
}
