//! IPC client for communicating with the LoopGrab service.

use loopgrab_common::ipc::{decode_payload, encode_frame, frame_len, get_socket_path, Request, Response};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::exit_codes::ExitCode;

/// Error type for service client operations.
#[derive(Debug, Clone)]
#[allow(clippy::enum_variant_names)]
pub enum ServiceError {
    /// Service is not running or not connected
    NotConnected,
    /// Connection to service failed
    ConnectionFailed(String),
    /// Failed to send request
    SendFailed(String),
    /// Failed to receive response
    ReceiveFailed(String),
    /// Service returned an error
    RemoteError(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::NotConnected => write!(f, "Not connected to service"),
            ServiceError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            ServiceError::SendFailed(msg) => write!(f, "Send failed: {}", msg),
            ServiceError::ReceiveFailed(msg) => write!(f, "Receive failed: {}", msg),
            ServiceError::RemoteError(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl ServiceError {
    /// Convert to an appropriate exit code.
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            ServiceError::NotConnected
            | ServiceError::ConnectionFailed(_)
            | ServiceError::SendFailed(_)
            | ServiceError::ReceiveFailed(_) => ExitCode::ServiceConnectionFailed,
            ServiceError::RemoteError(_) => ExitCode::GeneralError,
        }
    }
}

/// Connection state for the service client.
enum ConnectionState {
    Disconnected,
    #[cfg(unix)]
    Connected(std::os::unix::net::UnixStream),
}

/// Client for communicating with the LoopGrab service.
pub struct ServiceClient {
    connection: Mutex<ConnectionState>,
    socket_path: PathBuf,
}

impl ServiceClient {
    /// Create a client for the default service socket.
    pub fn new() -> Self {
        Self::with_socket_path(get_socket_path())
    }

    /// Create a client for a specific socket.
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            connection: Mutex::new(ConnectionState::Disconnected),
            socket_path,
        }
    }

    /// Check if the client is connected to the service.
    pub async fn is_connected(&self) -> bool {
        let conn = self.connection.lock().await;
        !matches!(*conn, ConnectionState::Disconnected)
    }

    /// Connect to the service.
    pub async fn connect(&self) -> Result<(), ServiceError> {
        let mut conn = self.connection.lock().await;

        if !matches!(*conn, ConnectionState::Disconnected) {
            return Ok(());
        }

        #[cfg(unix)]
        {
            use std::os::unix::net::UnixStream;

            let stream = UnixStream::connect(&self.socket_path).map_err(|e| {
                ServiceError::ConnectionFailed(format!(
                    "Failed to connect to {}: {}",
                    self.socket_path.display(),
                    e
                ))
            })?;

            stream.set_read_timeout(Some(Duration::from_secs(30))).ok();
            stream.set_write_timeout(Some(Duration::from_secs(10))).ok();

            *conn = ConnectionState::Connected(stream);
            Ok(())
        }

        #[cfg(not(unix))]
        {
            Err(ServiceError::ConnectionFailed(format!(
                "Unix socket {} is not supported on this platform",
                self.socket_path.display()
            )))
        }
    }

    /// Send a request to the service and wait for a response.
    ///
    /// `Response::Error` is surfaced as [`ServiceError::RemoteError`].
    pub async fn request(&self, request: Request) -> Result<Response, ServiceError> {
        if !self.is_connected().await {
            self.connect().await?;
        }

        let mut conn = self.connection.lock().await;

        #[cfg(unix)]
        {
            let stream = match &mut *conn {
                ConnectionState::Connected(s) => s,
                ConnectionState::Disconnected => {
                    return Err(ServiceError::NotConnected);
                }
            };

            let response = exchange(stream, &request)?;
            if let Response::Error { message } = &response {
                return Err(ServiceError::RemoteError(message.clone()));
            }
            Ok(response)
        }

        #[cfg(not(unix))]
        {
            let _ = (&mut *conn, request);
            Err(ServiceError::NotConnected)
        }
    }
}

/// Write one framed request and read one framed response.
fn exchange<S: Read + Write>(stream: &mut S, request: &Request) -> Result<Response, ServiceError> {
    let frame = encode_frame(request)
        .map_err(|e| ServiceError::SendFailed(format!("Failed to encode request: {}", e)))?;
    stream
        .write_all(&frame)
        .map_err(|e| ServiceError::SendFailed(format!("Failed to write request: {}", e)))?;
    stream
        .flush()
        .map_err(|e| ServiceError::SendFailed(format!("Failed to flush: {}", e)))?;

    let mut prefix = [0u8; 4];
    stream.read_exact(&mut prefix).map_err(|e| {
        ServiceError::ReceiveFailed(format!("Failed to read response length: {}", e))
    })?;
    let len = frame_len(prefix).map_err(|e| ServiceError::ReceiveFailed(e.to_string()))?;

    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .map_err(|e| ServiceError::ReceiveFailed(format!("Failed to read response: {}", e)))?;

    decode_payload(&payload)
        .map_err(|e| ServiceError::ReceiveFailed(format!("Failed to decode response: {}", e)))
}
