//! IPC server with owner-only socket setup.

use crate::state::CaptureManager;
use loopgrab_common::ipc::{read_json, write_json, IpcError, Request, Response};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{error, info, warn};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
#[cfg(unix)]
use std::path::Path;
#[cfg(unix)]
use std::sync::atomic::{AtomicBool, Ordering};

use super::handlers::handle_request;

/// Socket file permissions (owner read/write only)
#[cfg(unix)]
const SOCKET_MODE: u32 = 0o600;

/// Socket directory permissions (owner read/write/execute only)
#[cfg(unix)]
const DIRECTORY_MODE: u32 = 0o700;

/// Create socket directory with secure permissions.
#[cfg(unix)]
fn create_secure_socket_dir(socket_path: &Path) -> std::io::Result<()> {
    let socket_dir = socket_path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "socket path has no parent directory",
        )
    })?;

    std::fs::create_dir_all(socket_dir)?;
    std::fs::set_permissions(socket_dir, std::fs::Permissions::from_mode(DIRECTORY_MODE))?;

    // Remove stale socket if exists
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }

    Ok(())
}

/// Set socket file permissions after binding.
#[cfg(unix)]
fn secure_socket_file(socket_path: &Path) -> std::io::Result<()> {
    std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(SOCKET_MODE))?;

    let actual = std::fs::metadata(socket_path)?.permissions().mode() & 0o777;
    if actual != SOCKET_MODE {
        warn!("Socket mode is {:o}, expected {:o}", actual, SOCKET_MODE);
    }

    Ok(())
}

/// Serve requests from one connected client until it disconnects.
pub async fn serve_client<S>(mut stream: S, manager: Arc<CaptureManager>, peer_info: String)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!("Client connected: {}", peer_info);

    loop {
        let request: Request = match read_json(&mut stream).await {
            Ok(req) => req,
            Err(IpcError::ConnectionClosed) => {
                info!("Client disconnected: {}", peer_info);
                break;
            }
            Err(IpcError::ParseError(e)) => {
                warn!("Malformed request from {}: {}", peer_info, e);
                let response = Response::error(format!("Invalid request: {}", e));
                if let Err(e) = write_json(&mut stream, &response).await {
                    error!("Error writing response: {}", e);
                    break;
                }
                continue;
            }
            Err(e) => {
                error!("Error reading request from {}: {}", peer_info, e);
                break;
            }
        };

        let response = handle_request(&manager, request).await;

        if let Err(e) = write_json(&mut stream, &response).await {
            error!("Error writing response to {}: {}", peer_info, e);
            break;
        }
    }
}

/// Run the IPC server on `socket_path` until `shutdown` is raised.
#[cfg(unix)]
pub async fn run_server(
    manager: Arc<CaptureManager>,
    socket_path: &Path,
    shutdown: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tokio::net::UnixListener;

    info!("Starting IPC server at {:?}", socket_path);

    create_secure_socket_dir(socket_path)?;
    let listener = UnixListener::bind(socket_path)?;
    // Permissions are applied after binding
    secure_socket_file(socket_path)?;

    info!("IPC server listening on {:?}", socket_path);

    let mut next_client: u64 = 0;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            info!("Shutdown requested, stopping IPC server");
            break;
        }

        // Wake periodically to re-check the shutdown flag
        let accept_result = tokio::select! {
            result = listener.accept() => Some(result),
            _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => None,
        };

        let (stream, _) = match accept_result {
            Some(Ok(conn)) => conn,
            Some(Err(e)) => {
                error!("Accept error: {}", e);
                continue;
            }
            None => continue,
        };

        next_client += 1;
        let peer_info = match stream.peer_cred() {
            Ok(cred) => format!("client={} uid={}", next_client, cred.uid()),
            Err(_) => format!("client={}", next_client),
        };
        tokio::spawn(serve_client(stream, Arc::clone(&manager), peer_info));
    }

    if let Err(e) = std::fs::remove_file(socket_path) {
        warn!("Could not remove socket {:?}: {}", socket_path, e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{AudioDecoder, CaptureError, EncodedAudio, MediaHost, PlaybackHandle, RecorderBackend};
    use crate::config::AppConfig;
    use crate::delivery::DeliverySink;
    use loopgrab_common::ipc::write_message;
    use std::path::PathBuf;

    struct EmptyPage;

    impl MediaHost for EmptyPage {
        fn playback_elements(&self) -> Vec<Arc<dyn PlaybackHandle>> {
            Vec::new()
        }

        fn page_title(&self) -> Option<String> {
            None
        }

        fn recorder_backend(&self) -> Option<Arc<dyn RecorderBackend>> {
            None
        }

        fn audio_decoder(&self) -> Option<Arc<dyn AudioDecoder>> {
            None
        }
    }

    struct DiscardSink;

    impl DeliverySink for DiscardSink {
        fn deliver(&self, _audio: &EncodedAudio, file_name: &str) -> Result<PathBuf, CaptureError> {
            Ok(PathBuf::from(file_name))
        }
    }

    fn manager() -> Arc<CaptureManager> {
        Arc::new(CaptureManager::new(
            Arc::new(EmptyPage),
            Arc::new(DiscardSink),
            AppConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_serve_client_answers_in_order() {
        let (mut client, server) = tokio::io::duplex(4096);
        let task = tokio::spawn(serve_client(server, manager(), "test".to_string()));

        write_json(&mut client, &Request::Ping).await.unwrap();
        let pong: Response = read_json(&mut client).await.unwrap();
        assert_eq!(pong, Response::Pong);

        write_json(&mut client, &Request::StartCapture).await.unwrap();
        let rejected: Response = read_json(&mut client).await.unwrap();
        assert!(rejected.is_error());

        drop(client);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_request_gets_error_and_connection_survives() {
        let (mut client, server) = tokio::io::duplex(4096);
        tokio::spawn(serve_client(server, manager(), "test".to_string()));

        write_message(&mut client, br#"{"type":"reboot"}"#).await.unwrap();
        let response: Response = read_json(&mut client).await.unwrap();
        assert!(response.is_error());

        write_json(&mut client, &Request::Ping).await.unwrap();
        let pong: Response = read_json(&mut client).await.unwrap();
        assert_eq!(pong, Response::Pong);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_server_socket_roundtrip_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("run").join("service.sock");
        let shutdown = Arc::new(AtomicBool::new(false));

        let server = {
            let path = socket_path.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { run_server(manager(), &path, shutdown).await.unwrap() })
        };

        let mut stream = loop {
            match tokio::net::UnixStream::connect(&socket_path).await {
                Ok(stream) => break stream,
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(10)).await,
            }
        };
        let mode = std::fs::metadata(&socket_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, SOCKET_MODE);

        write_json(&mut stream, &Request::GetStatus).await.unwrap();
        match read_json::<_, Response>(&mut stream).await.unwrap() {
            Response::Status(status) => assert!(!status.has_video),
            other => panic!("unexpected response: {:?}", other),
        }

        shutdown.store(true, Ordering::SeqCst);
        server.await.unwrap();
        assert!(!socket_path.exists());
    }
}
