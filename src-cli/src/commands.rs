//! Command implementations for the CLI.

use loopgrab_common::ipc::{Request, Response};
use loopgrab_common::CaptureStatus;
use serde_json::json;
use std::time::Duration;

use crate::client::{ServiceClient, ServiceError};
use crate::colors::{self, Tone};
use crate::exit_codes::ExitCode;

/// How often `status --watch` refreshes.
const WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Which status line applies, in display priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Capturing,
    Failed,
    Ready,
    NoVideo,
}

/// Pick the status line for a snapshot.
pub fn describe_status(status: &CaptureStatus) -> (StatusKind, String) {
    if status.recording {
        let seconds = ((status.elapsed_ms as f64) / 1000.0).round().max(1.0) as u64;
        return (
            StatusKind::Capturing,
            format!(
                "Capturing full audio from 0s ({}s). WAV download starts automatically when complete.",
                seconds
            ),
        );
    }
    match status.last_error.as_deref() {
        Some(err) if !err.is_empty() => (StatusKind::Failed, format!("Last attempt failed: {}", err)),
        _ if status.has_video => (
            StatusKind::Ready,
            "Ready. One click captures full audio from beginning in background.".to_string(),
        ),
        _ => (
            StatusKind::NoVideo,
            "No playable video detected on this page.".to_string(),
        ),
    }
}

fn status_exit_code(kind: StatusKind) -> ExitCode {
    match kind {
        StatusKind::Failed => ExitCode::LastCaptureFailed,
        _ => ExitCode::Success,
    }
}

fn print_status(status: &CaptureStatus, json: bool) -> StatusKind {
    let (kind, line) = describe_status(status);
    if json {
        println!(
            "{}",
            json!({
                "has_video": status.has_video,
                "recording": status.recording,
                "elapsed_ms": status.elapsed_ms,
                "last_error": status.last_error,
                "phase": status.phase.as_str(),
                "message": line,
            })
        );
    } else {
        let tone = match kind {
            StatusKind::Capturing => Tone::Capturing,
            StatusKind::Failed => Tone::Failed,
            StatusKind::Ready => Tone::Ready,
            StatusKind::NoVideo => Tone::Muted,
        };
        println!("{}", colors::paint(&line, tone));
        if status.recording {
            println!(
                "{} {}",
                colors::paint("Phase:", Tone::Label),
                colors::phase(status.phase)
            );
        }
    }
    kind
}

fn report_connection_error(e: &ServiceError, json: bool) -> ExitCode {
    if json {
        println!(
            "{}",
            json!({"status": "service_unavailable", "error": e.to_string()})
        );
    } else {
        eprintln!("{}", colors::error(&e.to_string()));
    }
    e.to_exit_code()
}

/// Start capturing one full iteration.
pub async fn start(json: bool, quiet: bool) -> ExitCode {
    start_with(&ServiceClient::new(), json, quiet).await
}

pub async fn start_with(client: &ServiceClient, json: bool, quiet: bool) -> ExitCode {
    if let Err(e) = client.connect().await {
        return report_connection_error(&e, json);
    }

    match client.request(Request::StartCapture).await {
        Ok(Response::CaptureStarted { message }) => {
            if json {
                println!("{}", json!({"ok": true, "message": message}));
            } else if !quiet {
                println!("{}", colors::paint(&message, Tone::Ready));
            }
            ExitCode::Success
        }
        Err(ServiceError::RemoteError(msg)) => {
            if json {
                println!("{}", json!({"ok": false, "error": msg}));
            } else if !quiet {
                eprintln!("{}", colors::error(&msg));
            }
            ExitCode::CaptureRejected
        }
        Ok(other) => {
            if !quiet {
                eprintln!(
                    "{}",
                    colors::error(&format!("Unexpected response: {:?}", other))
                );
            }
            ExitCode::GeneralError
        }
        Err(e) => report_connection_error(&e, json),
    }
}

async fn fetch_status(client: &ServiceClient) -> Result<CaptureStatus, ServiceError> {
    match client.request(Request::GetStatus).await? {
        Response::Status(status) => Ok(status),
        other => Err(ServiceError::ReceiveFailed(format!(
            "Unexpected response: {:?}",
            other
        ))),
    }
}

/// Show the capture status. With `watch`, refresh until no job is running.
pub async fn status(json: bool, watch: bool) -> ExitCode {
    status_with(&ServiceClient::new(), json, watch).await
}

pub async fn status_with(client: &ServiceClient, json: bool, watch: bool) -> ExitCode {
    if let Err(e) = client.connect().await {
        return report_connection_error(&e, json);
    }

    loop {
        let status = match fetch_status(client).await {
            Ok(status) => status,
            Err(e) => return report_connection_error(&e, json),
        };
        let kind = print_status(&status, json);

        if !watch || kind != StatusKind::Capturing {
            return status_exit_code(kind);
        }

        tokio::select! {
            _ = tokio::time::sleep(WATCH_INTERVAL) => {}
            _ = tokio::signal::ctrl_c() => return ExitCode::Success,
        }
    }
}

/// Check that the service answers.
pub async fn ping(json: bool) -> ExitCode {
    let client = ServiceClient::new();
    match client.request(Request::Ping).await {
        Ok(Response::Pong) => {
            if json {
                println!("{}", json!({"status": "ok"}));
            } else {
                println!("{}", colors::paint("Service is running.", Tone::Ready));
            }
            ExitCode::Success
        }
        Ok(other) => {
            eprintln!(
                "{}",
                colors::error(&format!("Unexpected response: {:?}", other))
            );
            ExitCode::GeneralError
        }
        Err(e) => report_connection_error(&e, json),
    }
}

/// Show version information.
pub fn version(json: bool) {
    let version = env!("CARGO_PKG_VERSION");
    if json {
        println!("{}", json!({"version": version}));
    } else {
        println!("{} {}", colors::paint("loopgrab", Tone::Label), version);
    }
}
