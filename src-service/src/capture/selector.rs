//! Video element selection.

use std::sync::Arc;

use super::PlaybackHandle;

fn is_playing(handle: &Arc<dyn PlaybackHandle>) -> bool {
    !handle.is_paused() && !handle.is_ended()
}

fn rendered_area(handle: &Arc<dyn PlaybackHandle>) -> u64 {
    let (width, height) = handle.rendered_size();
    u64::from(width) * u64::from(height)
}

/// Choose the element to capture.
///
/// Only video elements are considered. Playing elements win over paused or
/// ended ones; within the preferred group the largest rendered area wins and
/// ties go to the element that appears first in document order.
pub fn choose_best_video(elements: &[Arc<dyn PlaybackHandle>]) -> Option<Arc<dyn PlaybackHandle>> {
    let videos: Vec<Arc<dyn PlaybackHandle>> =
        elements.iter().filter(|e| e.is_video()).cloned().collect();

    let playing: Vec<Arc<dyn PlaybackHandle>> =
        videos.iter().filter(|e| is_playing(e)).cloned().collect();
    let candidates = if playing.is_empty() { videos } else { playing };

    let mut best: Option<(Arc<dyn PlaybackHandle>, u64)> = None;
    for candidate in candidates {
        let area = rendered_area(&candidate);
        // strict comparison keeps the earliest element on ties
        if best.as_ref().map_or(true, |(_, best_area)| area > *best_area) {
            best = Some((candidate, area));
        }
    }
    best.map(|(handle, _)| handle)
}
