//! IPC message framing and transport protocol.

use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum IPC message size (64 KB)
pub const MAX_MESSAGE_SIZE: usize = 65536;

/// Error type for IPC operations.
#[derive(Debug)]
pub enum IpcError {
    /// I/O error during read/write
    Io(std::io::Error),
    /// Message exceeds maximum size
    MessageTooLarge { size: usize, max: usize },
    /// JSON parsing failed
    ParseError(String),
    /// Connection closed
    ConnectionClosed,
}

impl std::fmt::Display for IpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpcError::Io(e) => write!(f, "I/O error: {}", e),
            IpcError::MessageTooLarge { size, max } => {
                write!(f, "Message too large: {} bytes (max {})", size, max)
            }
            IpcError::ParseError(e) => write!(f, "Parse error: {}", e),
            IpcError::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for IpcError {}

impl From<std::io::Error> for IpcError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            IpcError::ConnectionClosed
        } else {
            IpcError::Io(e)
        }
    }
}

/// Get the platform-specific socket path for the IPC connection.
pub fn get_socket_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .unwrap_or_else(|_| format!("/run/user/{}", unsafe { libc::getuid() }));
        PathBuf::from(runtime_dir)
            .join("loopgrab")
            .join("service.sock")
    }

    #[cfg(not(target_os = "linux"))]
    {
        std::env::temp_dir().join("loopgrab").join("service.sock")
    }
}

/// Validate a payload length against [`MAX_MESSAGE_SIZE`].
fn check_len(len: usize) -> Result<usize, IpcError> {
    if len > MAX_MESSAGE_SIZE {
        return Err(IpcError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(len)
}

/// Payload length announced by a frame prefix.
///
/// Oversized frames are rejected before anything is allocated for them.
pub fn frame_len(prefix: [u8; 4]) -> Result<usize, IpcError> {
    check_len(u32::from_le_bytes(prefix) as usize)
}

/// Serialize `value` into one complete frame.
///
/// ```text
/// ┌──────────────────┬─────────────────────────────────┐
/// │ Length (4 bytes) │ JSON Payload (variable length)  │
/// │ Little-endian    │ Max 65,536 bytes                │
/// └──────────────────┴─────────────────────────────────┘
/// ```
pub fn encode_frame<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, IpcError> {
    let payload = serde_json::to_vec(value).map_err(|e| IpcError::ParseError(e.to_string()))?;
    let len = check_len(payload.len())? as u32;

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Deserialize a frame payload.
pub fn decode_payload<T: serde::de::DeserializeOwned>(payload: &[u8]) -> Result<T, IpcError> {
    serde_json::from_slice(payload).map_err(|e| IpcError::ParseError(e.to_string()))
}

/// Read one frame and return its payload.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, IpcError> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix).await?;
    let len = frame_len(prefix)?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Write `payload` as one frame.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), IpcError> {
    let len = check_len(payload.len())? as u32;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame and deserialize it.
pub async fn read_json<R: AsyncRead + Unpin, T: serde::de::DeserializeOwned>(
    reader: &mut R,
) -> Result<T, IpcError> {
    decode_payload(&read_message(reader).await?)
}

/// Serialize `value` and write it as one frame.
pub async fn write_json<W: AsyncWrite + Unpin, T: serde::Serialize>(
    writer: &mut W,
    value: &T,
) -> Result<(), IpcError> {
    let frame = encode_frame(value)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
