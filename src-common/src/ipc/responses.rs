//! IPC response types.

use serde::{Deserialize, Serialize};

use crate::types::CaptureStatus;

/// IPC response from service to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Capture job accepted and running in the background
    CaptureStarted { message: String },
    /// Current job slot snapshot
    Status(CaptureStatus),
    /// Pong response to ping
    Pong,
    /// Request rejected or failed
    Error { message: String },
}

impl Response {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    /// Check if this response indicates an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_response_is_flattened() {
        let response = Response::Status(CaptureStatus {
            has_video: true,
            recording: true,
            elapsed_ms: 2000,
            ..Default::default()
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["has_video"], true);
        assert_eq!(json["elapsed_ms"], 2000);
    }

    #[test]
    fn test_error_helper() {
        let response = Response::error("No suitable video found on this page.");
        assert!(response.is_error());
        assert!(!Response::Pong.is_error());
    }
}
