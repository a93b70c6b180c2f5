//! Capture job orchestration for the LoopGrab service.
//!
//! This module owns the single capture job slot and drives a job through:
//! - Alignment to the start of an iteration
//! - Stream acquisition and recorder start
//! - Iteration-end detection and recorder stop
//! - Transcoding to WAV and delivery
//!
//! Failures never escape a running job: they are logged, stored as the last
//! error, and broadcast to subscribers.

use crate::capture::boundary::{align_to_start, iteration_timeout, wait_for_iteration_end};
use crate::capture::selector::choose_best_video;
use crate::capture::{
    known_duration, pick_recorder_type, CaptureError, CaptureStream, MediaHost, MediaRecorder,
    PlaybackHandle, RecordedAudio, RecorderEvent, RecorderReceiver,
};
use crate::config::AppConfig;
use crate::delivery::{build_file_name, DeliverySink};
use crate::transcode::transcode_to_wav;
use chrono::Utc;
use loopgrab_common::{CapturePhase, CaptureStatus};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Message returned when a capture job is accepted.
pub const CAPTURE_STARTED_MESSAGE: &str =
    "Capturing one full iteration from 0s. Download starts when it finishes.";

/// MIME type assumed for the recording when neither the recorder nor the
/// candidate list names one.
const FALLBACK_RECORDING_MIME: &str = "audio/webm";

/// Events broadcast to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// The active job moved to a new phase
    PhaseChanged(CapturePhase),
    /// The job delivered its file
    Completed { path: PathBuf },
    /// The job failed; the message is also stored as the last error
    Failed { message: String },
}

/// Bookkeeping for the job occupying the slot.
#[derive(Debug, Clone)]
struct ActiveJob {
    phase: CapturePhase,
    /// Set when the recorder starts
    recording_started: Option<Instant>,
}

impl ActiveJob {
    fn elapsed_ms(&self) -> u64 {
        self.recording_started
            .map(|start| start.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Media resources held by a running job.
///
/// Released exactly once, either explicitly when the job settles or on drop
/// if the job task goes away early.
#[derive(Default)]
struct JobResources {
    stream: Option<CaptureStream>,
    recorder: Option<Box<dyn MediaRecorder>>,
}

impl JobResources {
    fn release(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            recorder.stop();
        }
        if let Some(mut stream) = self.stream.take() {
            let stopped = stream.stop_all();
            debug!("Stopped {} capture tracks", stopped);
        }
    }
}

impl Drop for JobResources {
    fn drop(&mut self) {
        self.release();
    }
}

/// Owner of the capture job slot.
pub struct CaptureManager {
    host: Arc<dyn MediaHost>,
    sink: Arc<dyn DeliverySink>,
    config: AppConfig,
    job: RwLock<Option<ActiveJob>>,
    last_error: RwLock<Option<String>>,
    /// Broadcast channel for events
    event_tx: broadcast::Sender<CaptureEvent>,
}

impl CaptureManager {
    /// Create a new capture manager.
    pub fn new(host: Arc<dyn MediaHost>, sink: Arc<dyn DeliverySink>, config: AppConfig) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            host,
            sink,
            config,
            job: RwLock::new(None),
            last_error: RwLock::new(None),
            event_tx,
        }
    }

    /// Subscribe to capture events.
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.event_tx.subscribe()
    }

    /// Broadcast an event to all subscribers.
    fn broadcast(&self, event: CaptureEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.event_tx.send(event);
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Phase of the job slot.
    pub async fn phase(&self) -> CapturePhase {
        self.job
            .read()
            .await
            .as_ref()
            .map(|job| job.phase)
            .unwrap_or_default()
    }

    /// Message of the most recent failed job.
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    /// Snapshot for status queries. Re-runs video selection on every call.
    pub async fn status(&self) -> CaptureStatus {
        let has_video = choose_best_video(&self.host.playback_elements()).is_some();
        let (recording, phase, elapsed_ms) = match self.job.read().await.as_ref() {
            Some(job) => (true, job.phase, job.elapsed_ms()),
            None => (false, CapturePhase::Idle, 0),
        };

        CaptureStatus {
            has_video,
            recording,
            elapsed_ms,
            last_error: self.last_error().await,
            phase,
        }
    }

    /// Start capturing one full iteration of the best video on the page.
    ///
    /// Returns as soon as the job is accepted; the capture runs in the
    /// background. Only precondition failures are reported here.
    pub async fn start_capture(self: &Arc<Self>) -> Result<String, CaptureError> {
        let target = {
            let mut job = self.job.write().await;
            if job.is_some() {
                warn!("Capture requested while a job is running");
                return Err(CaptureError::AlreadyRunning);
            }

            let target = match choose_best_video(&self.host.playback_elements()) {
                Some(target) => target,
                None => {
                    info!("Capture requested but no video is available");
                    return Err(CaptureError::NoSuitableVideo);
                }
            };

            *job = Some(ActiveJob {
                phase: CapturePhase::Selecting,
                recording_started: None,
            });
            // cleared before the slot becomes visible to status readers
            *self.last_error.write().await = None;
            target
        };

        self.broadcast(CaptureEvent::PhaseChanged(CapturePhase::Selecting));
        info!("Capture job accepted");

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.run_job(target).await;
        });

        Ok(CAPTURE_STARTED_MESSAGE.to_string())
    }

    /// Move the active job to a new phase and broadcast the change.
    async fn set_phase(&self, phase: CapturePhase) {
        {
            let mut job = self.job.write().await;
            if let Some(job) = job.as_mut() {
                job.phase = phase;
            }
        }
        info!("Capture phase: {}", phase.as_str());
        self.broadcast(CaptureEvent::PhaseChanged(phase));
    }

    async fn mark_recording_started(&self) {
        if let Some(job) = self.job.write().await.as_mut() {
            job.recording_started = Some(Instant::now());
        }
    }

    /// Run a job to completion and settle the slot.
    ///
    /// The pipeline runs in its own task so a panicking host call surfaces
    /// here as a failure and the slot is still cleared.
    async fn run_job(self: Arc<Self>, target: Arc<dyn PlaybackHandle>) {
        let manager = Arc::clone(&self);
        let pipeline = tokio::spawn(async move {
            let mut resources = JobResources::default();
            let outcome = manager.capture_iteration(target, &mut resources).await;
            resources.release();
            outcome
        });
        let outcome = pipeline.await.unwrap_or_else(|e| {
            Err(CaptureError::PlatformError(format!(
                "Capture task failed: {}",
                e
            )))
        });

        match outcome {
            Ok(path) => {
                info!("Capture complete: {:?}", path);
                self.broadcast(CaptureEvent::Completed { path });
            }
            Err(e) => {
                error!("Full capture failed: {} ({:?})", e, e.class());
                let message = e.to_string();
                *self.last_error.write().await = Some(message.clone());
                self.broadcast(CaptureEvent::Failed { message });
            }
        }

        *self.job.write().await = None;
        self.broadcast(CaptureEvent::PhaseChanged(CapturePhase::Idle));
    }

    /// The capture pipeline. Acquired media handles are parked in
    /// `resources` so the caller can release them on every exit path.
    async fn capture_iteration(
        &self,
        target: Arc<dyn PlaybackHandle>,
        resources: &mut JobResources,
    ) -> Result<PathBuf, CaptureError> {
        let detection = &self.config.detection;

        self.set_phase(CapturePhase::Aligning).await;
        let alignment = align_to_start(target.as_ref(), detection).await?;
        debug!("Aligned via {:?}", alignment);

        self.set_phase(CapturePhase::Acquiring).await;
        if !target.supports_capture_stream() {
            return Err(CaptureError::StreamCaptureUnavailable);
        }
        let stream = resources.stream.insert(target.capture_stream()?);
        let audio_tracks = stream.audio_tracks();
        if audio_tracks.is_empty() {
            return Err(CaptureError::NoAudioTrack);
        }
        debug!(
            "Capture stream has {} tracks ({} audio)",
            stream.tracks().len(),
            audio_tracks.len()
        );

        self.set_phase(CapturePhase::Recording).await;
        let backend = self
            .host
            .recorder_backend()
            .ok_or(CaptureError::RecorderUnavailable)?;
        let chosen = pick_recorder_type(backend.as_ref(), &self.config.capture.recorder_mime_types);
        match &chosen {
            Some(mime) => info!("Recording as {}", mime),
            None => info!("No preferred recorder type supported, using recorder default"),
        }
        let (recorder, mut chunks_rx) = backend.start(
            audio_tracks,
            chosen.as_deref(),
            self.config.capture.timeslice(),
        )?;
        let recorder = resources.recorder.insert(recorder);
        self.mark_recording_started().await;

        if target.is_paused() || target.is_ended() {
            target.play()?;
        }

        self.set_phase(CapturePhase::AwaitingEnd).await;
        let timeout = iteration_timeout(known_duration(target.as_ref()), detection);
        wait_for_iteration_end(target.as_ref(), timeout, detection).await?;

        self.set_phase(CapturePhase::Stopping).await;
        let mime_type = recorder
            .mime_type()
            .filter(|m| !m.is_empty())
            .or(chosen)
            .unwrap_or_else(|| FALLBACK_RECORDING_MIME.to_string());
        recorder.stop();
        resources.recorder = None;
        let chunks = drain_with_timeout(&mut chunks_rx, self.config.capture.stop_timeout()).await?;
        if chunks.is_empty() {
            return Err(CaptureError::EmptyRecording);
        }
        let recorded = RecordedAudio::from_chunks(chunks, mime_type);
        info!(
            "Recorded {} bytes of {}",
            recorded.data.len(),
            recorded.mime_type
        );

        self.set_phase(CapturePhase::Transcoding).await;
        let decoder = self
            .host
            .audio_decoder()
            .ok_or(CaptureError::DecoderUnavailable)?;
        let encoded = transcode_to_wav(decoder, recorded).await?;

        self.set_phase(CapturePhase::Delivering).await;
        let file_name = build_file_name(
            self.host.page_title().as_deref(),
            encoded.extension,
            Utc::now(),
        );
        let sink = Arc::clone(&self.sink);
        tokio::task::spawn_blocking(move || sink.deliver(&encoded, &file_name))
            .await
            .map_err(|e| CaptureError::PlatformError(format!("Delivery task failed: {}", e)))?
    }
}

/// [`drain_recorder`] bounded by `timeout`.
async fn drain_with_timeout(
    rx: &mut RecorderReceiver,
    timeout: Duration,
) -> Result<Vec<Vec<u8>>, CaptureError> {
    tokio::time::timeout(timeout, drain_recorder(rx))
        .await
        .map_err(|_| {
            CaptureError::PlatformError(format!(
                "Recorder did not stop within {}ms.",
                timeout.as_millis()
            ))
        })
}

/// Collect recorder output until the recorder confirms it has stopped.
///
/// Zero-length chunks are dropped.
async fn drain_recorder(rx: &mut RecorderReceiver) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    while let Some(event) = rx.recv().await {
        match event {
            RecorderEvent::Data(chunk) if chunk.is_empty() => {}
            RecorderEvent::Data(chunk) => chunks.push(chunk),
            RecorderEvent::Stopped => break,
        }
    }
    chunks
}
