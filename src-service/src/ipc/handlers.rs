//! IPC request handlers.

use crate::state::CaptureManager;
use loopgrab_common::ipc::{Request, Response};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handle an IPC request and return a response.
pub async fn handle_request(manager: &Arc<CaptureManager>, request: Request) -> Response {
    debug!("Handling request: {:?}", request);

    match request {
        Request::StartCapture => match manager.start_capture().await {
            Ok(message) => {
                info!("StartCapture accepted");
                Response::CaptureStarted { message }
            }
            Err(e) => {
                warn!("StartCapture rejected: {}", e);
                Response::error(e)
            }
        },
        Request::GetStatus => Response::Status(manager.status().await),
        Request::Ping => Response::Pong,
    }
}
