//! Scripted playback element for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::{CaptureError, CaptureStream, PlaybackEvent, PlaybackHandle};

type PositionFn = Box<dyn Fn(f64) -> f64 + Send + Sync>;

/// A playback element whose position is a function of virtual time.
pub struct FakeHandle {
    origin: Instant,
    position: PositionFn,
    duration: f64,
    paused: AtomicBool,
    ended: AtomicBool,
    metadata: AtomicBool,
    size: (u32, u32),
    video: bool,
    panic_on_capture: bool,
    pub seeks: Mutex<Vec<f64>>,
    pub plays: AtomicUsize,
    pub position_reads: AtomicUsize,
    events: broadcast::Sender<PlaybackEvent>,
}

impl FakeHandle {
    /// Position follows `position(elapsed_secs)`.
    pub fn scripted(duration: f64, position: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            origin: Instant::now(),
            position: Box::new(position),
            duration,
            paused: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            metadata: AtomicBool::new(true),
            size: (640, 360),
            video: true,
            panic_on_capture: false,
            seeks: Mutex::new(Vec::new()),
            plays: AtomicUsize::new(0),
            position_reads: AtomicUsize::new(0),
            events,
        }
    }

    /// A looping element currently `offset` seconds into a `duration` cycle.
    pub fn looping(duration: f64, offset: f64) -> Self {
        Self::scripted(duration, move |t| (t + offset) % duration)
    }

    pub fn paused(self) -> Self {
        self.paused.store(true, Ordering::SeqCst);
        self
    }

    pub fn ended(self) -> Self {
        self.ended.store(true, Ordering::SeqCst);
        self
    }

    pub fn without_metadata(self) -> Self {
        self.metadata.store(false, Ordering::SeqCst);
        self
    }

    pub fn sized(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    pub fn audio_only(mut self) -> Self {
        self.video = false;
        self
    }

    /// Offer stream capture, then panic when it is requested.
    pub fn panics_on_capture(mut self) -> Self {
        self.panic_on_capture = true;
        self
    }

    /// Mark metadata loaded and fire the event.
    pub fn load_metadata(&self) {
        self.metadata.store(true, Ordering::SeqCst);
        let _ = self.events.send(PlaybackEvent::LoadedMetadata);
    }

    /// Fire the natural end event.
    pub fn finish(&self) {
        self.ended.store(true, Ordering::SeqCst);
        let _ = self.events.send(PlaybackEvent::Ended);
    }
}

impl PlaybackHandle for FakeHandle {
    fn current_time(&self) -> f64 {
        self.position_reads.fetch_add(1, Ordering::SeqCst);
        (self.position)(self.origin.elapsed().as_secs_f64())
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    fn has_metadata(&self) -> bool {
        self.metadata.load(Ordering::SeqCst)
    }

    fn rendered_size(&self) -> (u32, u32) {
        self.size
    }

    fn is_video(&self) -> bool {
        self.video
    }

    fn seek(&self, position: f64) {
        self.seeks.lock().unwrap().push(position);
    }

    fn play(&self) -> Result<(), CaptureError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        self.ended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    fn supports_capture_stream(&self) -> bool {
        self.panic_on_capture
    }

    fn capture_stream(&self) -> Result<CaptureStream, CaptureError> {
        if self.panic_on_capture {
            panic!("capture stream backend crashed");
        }
        Err(CaptureError::StreamCaptureUnavailable)
    }
}
