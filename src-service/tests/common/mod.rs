//! Scripted page host for end-to-end capture tests.

#![allow(dead_code)]

use loopgrab_service::capture::{
    AudioDecoder, AudioSampleBuffer, CaptureError, CaptureStream, DecodeContext, EncodedAudio,
    MediaHost, MediaRecorder, MediaTrack, PlaybackEvent, PlaybackHandle, RecorderBackend,
    RecorderEvent, RecorderReceiver, TrackKind,
};
use loopgrab_service::delivery::DeliverySink;
use loopgrab_service::CaptureEvent;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

struct Playback {
    anchor_position: f64,
    anchor_at: Instant,
    paused: bool,
}

/// A looping video element whose clock runs on tokio time.
pub struct LoopingVideo {
    duration: f64,
    playback: Mutex<Playback>,
    size: (u32, u32),
    track_kinds: Option<Vec<TrackKind>>,
    pub track_stops: Arc<AtomicUsize>,
    pub tracks_created: AtomicUsize,
    pub seeks: Mutex<Vec<f64>>,
    pub plays: AtomicUsize,
    events: broadcast::Sender<PlaybackEvent>,
}

impl LoopingVideo {
    /// A playing element `offset` seconds into a `duration`-second loop.
    pub fn playing(duration: f64, offset: f64) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            duration,
            playback: Mutex::new(Playback {
                anchor_position: offset,
                anchor_at: Instant::now(),
                paused: false,
            }),
            size: (1280, 720),
            track_kinds: Some(vec![TrackKind::Video, TrackKind::Audio]),
            track_stops: Arc::new(AtomicUsize::new(0)),
            tracks_created: AtomicUsize::new(0),
            seeks: Mutex::new(Vec::new()),
            plays: AtomicUsize::new(0),
            events,
        }
    }

    pub fn paused_at(duration: f64, position: f64) -> Self {
        let video = Self::playing(duration, position);
        video.playback.lock().unwrap().paused = true;
        video
    }

    /// Tracks the capture stream will carry; `None` disables stream capture.
    pub fn with_tracks(mut self, kinds: Option<Vec<TrackKind>>) -> Self {
        self.track_kinds = kinds;
        self
    }

    pub fn sized(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }
}

impl PlaybackHandle for LoopingVideo {
    fn current_time(&self) -> f64 {
        let playback = self.playback.lock().unwrap();
        if playback.paused {
            return playback.anchor_position;
        }
        let elapsed = playback.anchor_at.elapsed().as_secs_f64();
        (playback.anchor_position + elapsed) % self.duration
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn is_paused(&self) -> bool {
        self.playback.lock().unwrap().paused
    }

    fn is_ended(&self) -> bool {
        false
    }

    fn has_metadata(&self) -> bool {
        true
    }

    fn rendered_size(&self) -> (u32, u32) {
        self.size
    }

    fn seek(&self, position: f64) {
        self.seeks.lock().unwrap().push(position);
        let mut playback = self.playback.lock().unwrap();
        playback.anchor_position = position;
        playback.anchor_at = Instant::now();
    }

    fn play(&self) -> Result<(), CaptureError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        let mut playback = self.playback.lock().unwrap();
        if playback.paused {
            playback.paused = false;
            playback.anchor_at = Instant::now();
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    fn supports_capture_stream(&self) -> bool {
        self.track_kinds.is_some()
    }

    fn capture_stream(&self) -> Result<CaptureStream, CaptureError> {
        let kinds = self
            .track_kinds
            .clone()
            .ok_or(CaptureError::StreamCaptureUnavailable)?;
        let tracks: Vec<Arc<dyn MediaTrack>> = kinds
            .into_iter()
            .map(|kind| {
                Arc::new(CountedTrack {
                    kind,
                    stops: self.track_stops.clone(),
                }) as Arc<dyn MediaTrack>
            })
            .collect();
        self.tracks_created.fetch_add(tracks.len(), Ordering::SeqCst);
        Ok(CaptureStream::new(tracks))
    }
}

struct CountedTrack {
    kind: TrackKind,
    stops: Arc<AtomicUsize>,
}

impl MediaTrack for CountedTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Recorder that emits a fixed-size chunk every timeslice.
pub struct TimesliceRecorderBackend {
    supported: Vec<String>,
    reported_mime: Option<String>,
    chunk_size: usize,
    pub started_with: Mutex<Vec<(usize, Option<String>)>>,
}

impl TimesliceRecorderBackend {
    pub fn new(supported: &[&str]) -> Self {
        Self {
            supported: supported.iter().map(|s| s.to_string()).collect(),
            reported_mime: None,
            chunk_size: 64,
            started_with: Mutex::new(Vec::new()),
        }
    }

    /// MIME type the running recorder will report.
    pub fn reporting(mut self, mime: &str) -> Self {
        self.reported_mime = Some(mime.to_string());
        self
    }

    /// Emit zero-length chunks only.
    pub fn silent(mut self) -> Self {
        self.chunk_size = 0;
        self
    }
}

struct TimesliceRecorder {
    mime_type: Option<String>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl MediaRecorder for TimesliceRecorder {
    fn mime_type(&self) -> Option<String> {
        self.mime_type.clone()
    }

    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl RecorderBackend for TimesliceRecorderBackend {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|s| s == mime_type)
    }

    fn start(
        &self,
        tracks: Vec<Arc<dyn MediaTrack>>,
        mime_type: Option<&str>,
        timeslice: Duration,
    ) -> Result<(Box<dyn MediaRecorder>, RecorderReceiver), CaptureError> {
        self.started_with
            .lock()
            .unwrap()
            .push((tracks.len(), mime_type.map(str::to_string)));

        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let chunk_size = self.chunk_size;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + timeslice, timeslice);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        let _ = tx.send(RecorderEvent::Data(vec![0xAB; chunk_size]));
                        let _ = tx.send(RecorderEvent::Stopped);
                        break;
                    }
                    _ = ticker.tick() => {
                        let _ = tx.send(RecorderEvent::Data(vec![0xAB; chunk_size]));
                    }
                }
            }
        });

        let recorder = TimesliceRecorder {
            mime_type: self
                .reported_mime
                .clone()
                .or_else(|| mime_type.map(str::to_string)),
            stop_tx: Some(stop_tx),
        };
        Ok((Box::new(recorder), rx))
    }
}

/// Decoder that ignores its input and yields a fixed stereo buffer.
pub struct FixedDecoder {
    pub sample_rate: u32,
    pub frames: usize,
    pub seen: Mutex<Vec<(usize, String)>>,
    pub closes: AtomicUsize,
}

impl FixedDecoder {
    pub fn new(sample_rate: u32, frames: usize) -> Arc<Self> {
        Arc::new(Self {
            sample_rate,
            frames,
            seen: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        })
    }
}

struct FixedContext {
    decoder: Arc<FixedDecoder>,
}

impl DecodeContext for FixedContext {
    fn decode(&mut self, data: &[u8], mime_type: &str) -> Result<AudioSampleBuffer, CaptureError> {
        self.decoder
            .seen
            .lock()
            .unwrap()
            .push((data.len(), mime_type.to_string()));
        let frames = self.decoder.frames;
        let left = (0..frames).map(|i| ((i % 100) as f32 / 100.0) - 0.5).collect();
        let right = vec![0.25; frames];
        AudioSampleBuffer::new(self.decoder.sample_rate, vec![left, right])
    }

    fn close(&mut self) {
        self.decoder.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Wrapper so the shared decoder can hand out contexts pointing back at itself.
pub struct SharedDecoder(pub Arc<FixedDecoder>);

impl AudioDecoder for SharedDecoder {
    fn create_context(&self) -> Result<Box<dyn DecodeContext>, CaptureError> {
        Ok(Box::new(FixedContext {
            decoder: self.0.clone(),
        }))
    }
}

/// A page with scripted elements and optional capabilities.
pub struct ScriptedPage {
    pub elements: Vec<Arc<dyn PlaybackHandle>>,
    pub title: Option<String>,
    pub recorder: Option<Arc<dyn RecorderBackend>>,
    pub decoder: Option<Arc<dyn AudioDecoder>>,
}

impl MediaHost for ScriptedPage {
    fn playback_elements(&self) -> Vec<Arc<dyn PlaybackHandle>> {
        self.elements.clone()
    }

    fn page_title(&self) -> Option<String> {
        self.title.clone()
    }

    fn recorder_backend(&self) -> Option<Arc<dyn RecorderBackend>> {
        self.recorder.clone()
    }

    fn audio_decoder(&self) -> Option<Arc<dyn AudioDecoder>> {
        self.decoder.clone()
    }
}

/// A delivered file kept in memory.
#[derive(Debug, Clone)]
pub struct Delivered {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub file_name: String,
}

#[derive(Default)]
pub struct MemorySink {
    pub delivered: Mutex<Vec<Delivered>>,
}

impl DeliverySink for MemorySink {
    fn deliver(&self, audio: &EncodedAudio, file_name: &str) -> Result<PathBuf, CaptureError> {
        self.delivered.lock().unwrap().push(Delivered {
            bytes: audio.bytes.clone(),
            content_type: audio.content_type,
            file_name: file_name.to_string(),
        });
        Ok(PathBuf::from(file_name))
    }
}

/// Wait for the running job to settle and return its terminal event.
pub async fn settle(events: &mut broadcast::Receiver<CaptureEvent>) -> CaptureEvent {
    let mut terminal = None;
    loop {
        match events.recv().await {
            Ok(event @ (CaptureEvent::Completed { .. } | CaptureEvent::Failed { .. })) => {
                terminal = Some(event)
            }
            Ok(CaptureEvent::PhaseChanged(phase)) if !phase.is_active() => {
                if let Some(event) = terminal {
                    return event;
                }
            }
            Ok(_) => {}
            Err(e) => panic!("event stream broke: {}", e),
        }
    }
}
