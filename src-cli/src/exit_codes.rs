//! Exit codes for the CLI.
//!
//! These codes enable scripting integration by providing structured
//! feedback about operation results.

/// Exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Operation completed successfully
    Success = 0,
    /// General/unspecified error
    GeneralError = 1,
    /// Invalid command-line arguments
    InvalidArguments = 2,
    /// Failed to connect to the service
    ServiceConnectionFailed = 3,
    /// The service refused to start a capture
    CaptureRejected = 4,
    /// The most recent capture attempt failed
    LastCaptureFailed = 5,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitCode::Success => write!(f, "success"),
            ExitCode::GeneralError => write!(f, "general error"),
            ExitCode::InvalidArguments => write!(f, "invalid arguments"),
            ExitCode::ServiceConnectionFailed => write!(f, "service connection failed"),
            ExitCode::CaptureRejected => write!(f, "capture rejected"),
            ExitCode::LastCaptureFailed => write!(f, "last capture failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::InvalidArguments.as_i32(), 2);
        assert_eq!(ExitCode::ServiceConnectionFailed.as_i32(), 3);
        assert_eq!(ExitCode::CaptureRejected.as_i32(), 4);
        assert_eq!(ExitCode::LastCaptureFailed.as_i32(), 5);
        assert_eq!(ExitCode::CaptureRejected.to_string(), "capture rejected");
    }
}
