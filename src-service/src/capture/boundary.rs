//! Loop boundary detection.
//!
//! Looping elements never fire an end event, so both waits poll the playback
//! position and look for the backwards jump a loop produces. The sample-level
//! logic lives in [`LoopWrapDetector`] and [`IterationEndDetector`]; the async
//! drivers below feed them from a fixed-cadence ticker and race them against
//! element events and a deadline.

use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{known_duration, position_of, CaptureError, PlaybackEvent, PlaybackHandle};
use crate::config::DetectionConfig;

/// How the element was brought to the start of an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Element was paused or ended and has been rewound to 0
    Rewound,
    /// A loop boundary was observed while playing
    LoopBoundary,
}

/// Why an iteration was considered complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationEnd {
    /// The element fired its natural end event
    Ended,
    /// Position jumped back after real progress
    Wrapped,
    /// Position reached the tail of a known duration
    ReachedTail,
}

/// Detects the wrap that starts a new loop while aligning.
#[derive(Debug, Clone)]
pub struct LoopWrapDetector {
    last: f64,
    near_start: f64,
    wrap_drop: f64,
}

impl LoopWrapDetector {
    pub fn new(initial_position: f64, config: &DetectionConfig) -> Self {
        Self {
            last: initial_position,
            near_start: config.near_start_secs,
            wrap_drop: config.wrap_drop_secs,
        }
    }

    /// Feed one position sample. Returns true when the sample lands near the
    /// start after a drop larger than the wrap threshold.
    pub fn observe(&mut self, current: f64) -> bool {
        let wrapped = current <= self.near_start && self.last > current + self.wrap_drop;
        self.last = current;
        wrapped
    }
}

/// Detects the end of a single iteration from position samples.
#[derive(Debug, Clone)]
pub struct IterationEndDetector {
    last: f64,
    saw_progress: bool,
    progress: f64,
    wrap_drop: f64,
    near_tail: f64,
}

impl IterationEndDetector {
    pub fn new(initial_position: f64, config: &DetectionConfig) -> Self {
        Self {
            last: initial_position,
            saw_progress: false,
            progress: config.progress_secs,
            wrap_drop: config.wrap_drop_secs,
            near_tail: config.near_tail_secs,
        }
    }

    /// Whether the position has exceeded the progress threshold yet.
    pub fn saw_progress(&self) -> bool {
        self.saw_progress
    }

    /// Feed one position sample along with the known duration, if any.
    ///
    /// Wraps before real progress are ignored: they come from the element
    /// settling right after alignment, not from a finished loop.
    pub fn observe(&mut self, current: f64, duration: Option<f64>) -> Option<IterationEnd> {
        if current > self.progress {
            self.saw_progress = true;
        }

        let wrapped = self.saw_progress && current + self.wrap_drop < self.last;
        let reached_tail = duration.is_some_and(|d| current >= d - self.near_tail);
        self.last = current;

        if wrapped {
            Some(IterationEnd::Wrapped)
        } else if reached_tail {
            Some(IterationEnd::ReachedTail)
        } else {
            None
        }
    }
}

fn budget_ms(duration: Option<f64>, config: &DetectionConfig) -> u64 {
    let secs = duration.unwrap_or(config.fallback_duration_secs);
    (secs * config.timeout_ms_per_media_sec).ceil().max(0.0) as u64
}

/// Deadline for the alignment wait.
pub fn alignment_timeout(duration: Option<f64>, config: &DetectionConfig) -> Duration {
    let ms = budget_ms(duration, config)
        .clamp(config.align_timeout_min_ms, config.align_timeout_max_ms);
    Duration::from_millis(ms)
}

/// Deadline for the iteration-end wait.
pub fn iteration_timeout(duration: Option<f64>, config: &DetectionConfig) -> Duration {
    let ms = budget_ms(duration, config)
        .saturating_add(config.iteration_grace_ms)
        .clamp(config.iteration_timeout_min_ms, config.iteration_timeout_max_ms);
    Duration::from_millis(ms)
}

fn poll_ticker(config: &DetectionConfig) -> time::Interval {
    let period = config.poll_interval();
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Outcome of receiving from an element's event channel.
enum Received {
    Event(PlaybackEvent),
    /// Events were dropped; the caller should re-check element state
    Lagged,
}

/// Next element event. Never resolves once the element has gone away.
async fn next_event(events: &mut Option<broadcast::Receiver<PlaybackEvent>>) -> Received {
    loop {
        let Some(rx) = events.as_mut() else {
            return std::future::pending().await;
        };
        match rx.recv().await {
            Ok(event) => return Received::Event(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Missed {} playback events", skipped);
                return Received::Lagged;
            }
            Err(RecvError::Closed) => *events = None,
        }
    }
}

/// Wait until the element has loaded its metadata.
pub async fn wait_for_metadata(
    handle: &dyn PlaybackHandle,
    timeout: Duration,
) -> Result<(), CaptureError> {
    if handle.has_metadata() {
        return Ok(());
    }
    let mut events = Some(handle.subscribe());
    // metadata may have landed between the check and the subscription
    if handle.has_metadata() {
        return Ok(());
    }

    let deadline = time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            _ = &mut deadline => return Err(CaptureError::MetadataTimeout),
            received = next_event(&mut events) => match received {
                Received::Event(PlaybackEvent::LoadedMetadata) => return Ok(()),
                Received::Event(_) => {}
                Received::Lagged => {
                    if handle.has_metadata() {
                        return Ok(());
                    }
                }
            },
        }
    }
}

/// Poll until a loop boundary is observed.
pub async fn wait_for_loop_boundary(
    handle: &dyn PlaybackHandle,
    timeout: Duration,
    config: &DetectionConfig,
) -> Result<(), CaptureError> {
    let mut detector = LoopWrapDetector::new(position_of(handle), config);
    let mut ticker = poll_ticker(config);
    let deadline = time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            _ = &mut deadline => return Err(CaptureError::AlignmentTimeout),
            _ = ticker.tick() => {
                if detector.observe(position_of(handle)) {
                    return Ok(());
                }
            }
        }
    }
}

/// Bring the element to the start of an iteration.
///
/// Paused or ended elements are rewound directly. Playing elements are left
/// alone and watched until they wrap back to the start.
pub async fn align_to_start(
    handle: &dyn PlaybackHandle,
    config: &DetectionConfig,
) -> Result<Alignment, CaptureError> {
    if !handle.has_metadata() {
        debug!("Waiting for element metadata");
        wait_for_metadata(handle, config.metadata_timeout()).await?;
    }

    if handle.is_paused() || handle.is_ended() {
        handle.seek(0.0);
        info!("Element not playing, rewound to 0");
        return Ok(Alignment::Rewound);
    }

    let timeout = alignment_timeout(known_duration(handle), config);
    debug!("Waiting up to {:?} for the next loop start", timeout);
    wait_for_loop_boundary(handle, timeout, config).await?;
    info!("Loop boundary detected");
    Ok(Alignment::LoopBoundary)
}

/// Settlement state of the iteration-end wait.
enum Watch {
    Pending,
    Settled(Result<IterationEnd, CaptureError>),
}

/// Wait for one full iteration to finish.
///
/// Resolves on whichever comes first: the element's end event, a wrap after
/// real progress, or reaching the tail of a known duration. Fails once
/// `timeout` elapses. The first signal settles the wait; later ones are
/// never observed.
pub async fn wait_for_iteration_end(
    handle: &dyn PlaybackHandle,
    timeout: Duration,
    config: &DetectionConfig,
) -> Result<IterationEnd, CaptureError> {
    let mut events = Some(handle.subscribe());
    let mut detector = IterationEndDetector::new(position_of(handle), config);
    let mut ticker = poll_ticker(config);
    let deadline = time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        let watch = tokio::select! {
            biased;
            _ = &mut deadline => Watch::Settled(Err(CaptureError::IterationTimeout)),
            received = next_event(&mut events) => match received {
                Received::Event(PlaybackEvent::Ended) => Watch::Settled(Ok(IterationEnd::Ended)),
                Received::Lagged if handle.is_ended() => Watch::Settled(Ok(IterationEnd::Ended)),
                _ => Watch::Pending,
            },
            _ = ticker.tick() => {
                match detector.observe(position_of(handle), known_duration(handle)) {
                    Some(end) => Watch::Settled(Ok(end)),
                    None => Watch::Pending,
                }
            }
        };

        if let Watch::Settled(outcome) = watch {
            match &outcome {
                Ok(end) => info!("Iteration finished: {:?}", end),
                Err(e) => warn!("Iteration wait failed: {}", e),
            }
            return outcome;
        }
    }
}
