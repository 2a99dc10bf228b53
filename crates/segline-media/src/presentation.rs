//! Presentation timeline and segment availability window.
//!
//! A [`PresentationTimeline`] is in exactly one of three states:
//!
//! - **VOD**: static, finite duration. Everything up to the last known
//!   segment end is available.
//! - **In progress**: dynamic with a finite duration (a live event that has
//!   a known end). The availability window follows the live edge but is
//!   clamped to the duration.
//! - **Live**: dynamic with an unbounded duration.
//!
//! The live edge is derived from wall-clock time, the presentation start
//! time and the longest observed segment. Wall-clock time comes from an
//! injectable [`Clock`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::reference::SegmentReference;
use crate::timeline::TimeRange;

/// Source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_ms(&self) -> f64;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        chrono::Utc::now().timestamp_millis() as f64
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new(now_ms: f64) -> Self {
        Self {
            now_ms: Arc::new(Mutex::new(now_ms)),
        }
    }

    pub fn set(&self, now_ms: f64) {
        *self.now_ms.lock() = now_ms;
    }

    pub fn advance(&self, by: Duration) {
        *self.now_ms.lock() += by.as_secs_f64() * 1000.0;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        *self.now_ms.lock()
    }
}

/// Tunables for a [`PresentationTimeline`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct TimelineConfig {
    /// Re-anchor the presentation start time on observed segments.
    pub auto_correct_drift: bool,
    /// Distance (seconds) kept between the seek range end and the live edge.
    pub presentation_delay: f64,
    /// Offset (milliseconds) between the server clock and the local clock.
    pub clock_offset_ms: f64,
    /// Extra availability granted ahead of the live edge, in seconds.
    pub availability_time_offset: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            auto_correct_drift: true,
            presentation_delay: 0.0,
            clock_offset_ms: 0.0,
            availability_time_offset: 0.0,
        }
    }
}

/// The three mutually exclusive timeline states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TimelineKind {
    Vod,
    InProgress,
    Live,
}

/// A presentation timeline shared with recurring index updates.
///
/// Index updates lock the index first and the timeline second; never lock
/// an index while holding the timeline.
pub type SharedPresentationTimeline = Arc<Mutex<PresentationTimeline>>;

/// Tracks duration and the window of fetchable segments.
#[derive(Debug, Clone)]
pub struct PresentationTimeline {
    clock: Arc<dyn Clock>,
    presentation_start_time: Option<f64>,
    presentation_delay: f64,
    auto_correct_drift: bool,
    duration: f64,
    segment_availability_duration: f64,
    max_segment_duration: f64,
    min_segment_start_time: Option<f64>,
    max_segment_end_time: Option<f64>,
    clock_offset_ms: f64,
    is_static: bool,
    user_seek_start: f64,
    availability_time_offset: f64,
    start_time_locked: bool,
}

impl PresentationTimeline {
    /// Create a static timeline with unbounded duration.
    ///
    /// `presentation_start_time` is the wall-clock time, in seconds since the
    /// Unix epoch, at which presentation time zero was produced.
    pub fn new(presentation_start_time: Option<f64>, presentation_delay: f64) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            presentation_start_time,
            presentation_delay,
            auto_correct_drift: true,
            duration: f64::INFINITY,
            segment_availability_duration: f64::INFINITY,
            max_segment_duration: 1.0,
            min_segment_start_time: None,
            max_segment_end_time: None,
            clock_offset_ms: 0.0,
            is_static: true,
            user_seek_start: 0.0,
            availability_time_offset: 0.0,
            start_time_locked: false,
        }
    }

    pub fn from_config(presentation_start_time: Option<f64>, config: &TimelineConfig) -> Self {
        let mut timeline = Self::new(presentation_start_time, config.presentation_delay);
        timeline.auto_correct_drift = config.auto_correct_drift;
        timeline.clock_offset_ms = config.clock_offset_ms;
        timeline.availability_time_offset = config.availability_time_offset;
        timeline
    }

    pub fn shared(self) -> SharedPresentationTimeline {
        Arc::new(Mutex::new(self))
    }

    /// Replace the wall-clock source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current wall-clock time in seconds, server-corrected.
    fn now(&self) -> f64 {
        (self.clock.now_ms() + self.clock_offset_ms) / 1000.0
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn set_duration(&mut self, duration: f64) {
        debug_assert!(duration > 0.0, "timeline duration must be positive");
        self.duration = duration;
    }

    pub fn max_segment_duration(&self) -> f64 {
        self.max_segment_duration
    }

    pub fn presentation_start_time(&self) -> Option<f64> {
        self.presentation_start_time
    }

    pub fn set_presentation_start_time(&mut self, presentation_start_time: f64) {
        self.presentation_start_time = Some(presentation_start_time);
    }

    pub fn delay(&self) -> f64 {
        self.presentation_delay
    }

    pub fn set_delay(&mut self, delay: f64) {
        debug_assert!(delay >= 0.0, "presentation delay must not be negative");
        self.presentation_delay = delay;
    }

    pub fn segment_availability_duration(&self) -> f64 {
        self.segment_availability_duration
    }

    /// Seconds of content kept available behind the live edge. Unbounded
    /// means segments never expire.
    pub fn set_segment_availability_duration(&mut self, duration: f64) {
        debug_assert!(duration >= 0.0, "availability duration must not be negative");
        self.segment_availability_duration = duration;
    }

    pub fn set_static(&mut self, is_static: bool) {
        self.is_static = is_static;
    }

    pub fn set_clock_offset(&mut self, offset_ms: f64) {
        self.clock_offset_ms = offset_ms;
    }

    /// Earliest seekable time chosen by the user, for VOD content whose
    /// leading part should be hidden.
    pub fn set_user_seek_start(&mut self, time: f64) {
        self.user_seek_start = time;
    }

    pub fn availability_time_offset(&self) -> f64 {
        self.availability_time_offset
    }

    pub fn set_availability_time_offset(&mut self, offset: f64) {
        self.availability_time_offset = offset;
    }

    /// Widen the observed-segment aggregates with `references`.
    ///
    /// Segments starting after the current presentation time are ignored.
    /// With drift correction enabled and the start time unlocked, the
    /// presentation start time is re-anchored so that the live edge sits at
    /// the latest observed segment end.
    pub fn notify_segments(&mut self, references: &[Arc<SegmentReference>]) {
        self.notify_spans(references.iter().map(|r| (r.start_time(), r.end_time())));
    }

    /// Like [`notify_segments`](Self::notify_segments), for timeline ranges
    /// relative to a period starting at `start_offset`.
    pub fn notify_time_range(&mut self, ranges: &[TimeRange], start_offset: f64) {
        self.notify_spans(
            ranges
                .iter()
                .map(|range| (range.start + start_offset, range.end + start_offset)),
        );
    }

    fn notify_spans(&mut self, spans: impl Iterator<Item = (f64, f64)>) {
        let horizon = self.presentation_now();
        let mut first_start = None;
        let mut last_end = None;

        for (start, end) in spans {
            if horizon.is_some_and(|now| start > now) {
                continue;
            }
            first_start.get_or_insert(start);
            last_end = Some(end);
            self.max_segment_duration = self.max_segment_duration.max(end - start);
        }

        let (Some(first_start), Some(last_end)) = (first_start, last_end) else {
            return;
        };
        self.notify_min_segment_start_time(first_start);
        let max_end = self.max_segment_end_time.map_or(last_end, |end| end.max(last_end));
        self.max_segment_end_time = Some(max_end);

        if self.presentation_start_time.is_some() && self.auto_correct_drift && !self.start_time_locked {
            let corrected = self.now() - max_end - self.max_segment_duration;
            debug!("Re-anchoring presentation start time to {}", corrected);
            self.presentation_start_time = Some(corrected);
        }
    }

    /// Presentation time matching the current wall-clock time, when known.
    fn presentation_now(&self) -> Option<f64> {
        if self.is_static {
            return None;
        }
        self.presentation_start_time.map(|start| self.now() - start)
    }

    /// Stop re-anchoring the presentation start time.
    pub fn lock_start_time(&mut self) {
        self.start_time_locked = true;
    }

    pub fn is_start_time_locked(&self) -> bool {
        self.start_time_locked
    }

    pub fn notify_min_segment_start_time(&mut self, start_time: f64) {
        self.min_segment_start_time = Some(
            self.min_segment_start_time
                .map_or(start_time, |current| current.min(start_time)),
        );
    }

    pub fn notify_max_segment_duration(&mut self, duration: f64) {
        self.max_segment_duration = self.max_segment_duration.max(duration);
    }

    /// Shift the observed-segment aggregates by `offset` seconds.
    pub fn offset(&mut self, offset: f64) {
        if let Some(start) = self.min_segment_start_time.as_mut() {
            *start += offset;
        }
        if let Some(end) = self.max_segment_end_time.as_mut() {
            *end += offset;
        }
    }

    pub fn kind(&self) -> TimelineKind {
        match (self.is_static, self.duration.is_finite()) {
            (true, _) => TimelineKind::Vod,
            (false, true) => TimelineKind::InProgress,
            (false, false) => TimelineKind::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        self.kind() == TimelineKind::Live
    }

    pub fn is_in_progress(&self) -> bool {
        self.kind() == TimelineKind::InProgress
    }

    /// Whether availability depends on the presentation start time.
    pub fn using_presentation_start_time(&self) -> bool {
        self.is_live() && self.segment_availability_duration.is_finite()
    }

    /// Start of the availability window.
    pub fn segment_availability_start(&self) -> f64 {
        if self.segment_availability_duration.is_infinite() {
            return self.user_seek_start;
        }
        let start = self.segment_availability_end() - self.segment_availability_duration;
        start.max(self.user_seek_start)
    }

    /// End of the availability window.
    pub fn segment_availability_end(&self) -> f64 {
        if self.kind() == TimelineKind::Vod {
            return self.max_segment_end_time.unwrap_or(self.duration).min(self.duration);
        }
        (self.live_edge() + self.availability_time_offset).min(self.duration)
    }

    /// `max(0, now - max_segment_duration - presentation_start_time)`.
    pub fn live_edge(&self) -> f64 {
        let Some(start) = self.presentation_start_time else {
            warn!("Live edge requested without a presentation start time");
            return 0.0;
        };
        (self.now() - self.max_segment_duration - start).max(0.0)
    }

    /// Seek range start keeping `offset` seconds of margin from the window
    /// start, never before the earliest known segment.
    pub fn safe_seek_range_start(&self, offset: f64) -> f64 {
        let earliest = self
            .min_segment_start_time
            .unwrap_or(0.0)
            .max(self.user_seek_start);
        if self.segment_availability_duration.is_infinite() {
            return earliest;
        }
        let desired = self.segment_availability_start() + offset;
        earliest.max(desired.min(self.seek_range_end()))
    }

    pub fn seek_range_start(&self) -> f64 {
        self.safe_seek_range_start(0.0)
    }

    pub fn seek_range_end(&self) -> f64 {
        let delay = if self.kind() == TimelineKind::Vod {
            0.0
        } else {
            self.presentation_delay
        };
        (self.segment_availability_end() - delay).max(0.0)
    }

    /// Check the field combination matches the reported kind.
    pub fn assert_is_valid(&self) {
        match self.kind() {
            TimelineKind::Live => {
                debug_assert!(
                    self.presentation_start_time.is_some(),
                    "live timeline without a presentation start time"
                );
            }
            TimelineKind::InProgress => {
                debug_assert!(
                    self.presentation_start_time.is_some(),
                    "in-progress timeline without a presentation start time"
                );
                debug_assert!(self.duration.is_finite());
            }
            TimelineKind::Vod => {
                debug_assert!(
                    self.segment_availability_duration.is_infinite(),
                    "VOD timeline with a finite availability window"
                );
            }
        }
        debug_assert!(self.max_segment_duration > 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uri::StaticUris;

    const EPOCH_MS: f64 = 1_000_000_000.0;

    fn segment(start: f64, end: f64) -> Arc<SegmentReference> {
        Arc::new(SegmentReference::builder(start, end, StaticUris::shared(Vec::new())).build())
    }

    fn live(clock: &ManualClock, availability: f64) -> PresentationTimeline {
        let mut timeline = PresentationTimeline::new(Some(EPOCH_MS / 1000.0), 10.0)
            .with_clock(Arc::new(clock.clone()));
        timeline.set_static(false);
        timeline.set_segment_availability_duration(availability);
        timeline
    }

    #[test]
    fn test_vod_window() {
        let mut timeline = PresentationTimeline::new(None, 5.0);
        timeline.set_duration(60.0);
        timeline.assert_is_valid();
        assert_eq!(timeline.kind(), TimelineKind::Vod);
        assert_eq!(timeline.segment_availability_start(), 0.0);
        assert_eq!(timeline.segment_availability_end(), 60.0);

        timeline.notify_segments(&[segment(0.0, 10.0), segment(10.0, 20.0)]);
        assert_eq!(timeline.segment_availability_end(), 20.0);
        assert_eq!(timeline.max_segment_duration(), 10.0);
        // No delay for VOD.
        assert_eq!(timeline.seek_range_end(), 20.0);
        assert_eq!(timeline.seek_range_start(), 0.0);
    }

    #[test]
    fn test_kinds() {
        let clock = ManualClock::new(EPOCH_MS);
        let mut timeline = live(&clock, 30.0);
        assert!(timeline.is_live());
        assert!(timeline.using_presentation_start_time());
        timeline.set_duration(100.0);
        assert!(timeline.is_in_progress());
        assert!(!timeline.using_presentation_start_time());
        timeline.set_static(true);
        assert_eq!(timeline.kind(), TimelineKind::Vod);
    }

    #[test]
    fn test_live_window_follows_clock() {
        let clock = ManualClock::new(EPOCH_MS + 100_000.0);
        let timeline = live(&clock, 30.0);
        timeline.assert_is_valid();

        // now - max_segment_duration(1) - start
        assert_eq!(timeline.live_edge(), 99.0);
        assert_eq!(timeline.segment_availability_end(), 99.0);
        assert_eq!(timeline.segment_availability_start(), 69.0);
        assert_eq!(timeline.seek_range_end(), 89.0);
        assert_eq!(timeline.safe_seek_range_start(5.0), 74.0);

        clock.advance(Duration::from_secs(10));
        assert_eq!(timeline.segment_availability_end(), 109.0);
    }

    #[test]
    fn test_in_progress_clamped_to_duration() {
        let clock = ManualClock::new(EPOCH_MS + 500_000.0);
        let mut timeline = live(&clock, f64::INFINITY);
        timeline.set_duration(120.0);
        assert_eq!(timeline.segment_availability_end(), 120.0);
        assert_eq!(timeline.seek_range_end(), 110.0);
    }

    #[test]
    fn test_live_edge_not_negative() {
        let clock = ManualClock::new(EPOCH_MS - 10_000.0);
        let timeline = live(&clock, 30.0);
        assert_eq!(timeline.live_edge(), 0.0);
        assert_eq!(timeline.segment_availability_start(), 0.0);
    }

    #[test]
    fn test_auto_correct_reanchors_start_time() {
        let clock = ManualClock::new(EPOCH_MS + 100_000.0);
        let mut timeline = live(&clock, 30.0);
        timeline.notify_segments(&[segment(40.0, 44.0), segment(44.0, 48.0)]);
        assert_eq!(timeline.max_segment_duration(), 4.0);

        // now(1_000_100) - 48 - 4
        let start = timeline.presentation_start_time().unwrap();
        assert!((start - 1_000_048.0).abs() < 1e-6);
        assert!((timeline.live_edge() - 48.0).abs() < 1e-6);
    }

    #[test]
    fn test_locked_start_time_is_kept() {
        let clock = ManualClock::new(EPOCH_MS + 100_000.0);
        let mut timeline = live(&clock, 30.0);
        timeline.lock_start_time();
        assert!(timeline.is_start_time_locked());
        timeline.notify_segments(&[segment(40.0, 44.0)]);
        assert_eq!(timeline.presentation_start_time(), Some(EPOCH_MS / 1000.0));
    }

    #[test]
    fn test_future_segments_ignored() {
        let clock = ManualClock::new(EPOCH_MS + 50_000.0);
        let mut timeline = live(&clock, 30.0);
        timeline.lock_start_time();
        timeline.notify_segments(&[segment(40.0, 45.0), segment(60.0, 90.0)]);
        assert_eq!(timeline.max_segment_duration(), 5.0);
        assert_eq!(timeline.seek_range_start(), 40.0);
    }

    #[test]
    fn test_notify_time_range_applies_offset() {
        let mut timeline = PresentationTimeline::new(None, 0.0);
        timeline.set_duration(500.0);
        let ranges = [
            TimeRange {
                start: 0.0,
                end: 6.0,
                unscaled_start: 0,
                partial_segments: 0,
                segment_position: 1,
            },
            TimeRange {
                start: 6.0,
                end: 12.0,
                unscaled_start: 6,
                partial_segments: 0,
                segment_position: 2,
            },
        ];
        timeline.notify_time_range(&ranges, 100.0);
        assert_eq!(timeline.segment_availability_end(), 112.0);
        assert_eq!(timeline.seek_range_start(), 100.0);

        timeline.offset(-100.0);
        assert_eq!(timeline.segment_availability_end(), 12.0);
    }

    #[test]
    fn test_availability_time_offset() {
        let clock = ManualClock::new(EPOCH_MS + 100_000.0);
        let config = TimelineConfig {
            availability_time_offset: 2.0,
            presentation_delay: 3.0,
            ..TimelineConfig::default()
        };
        let mut timeline = PresentationTimeline::from_config(Some(EPOCH_MS / 1000.0), &config)
            .with_clock(Arc::new(clock));
        timeline.set_static(false);
        assert_eq!(timeline.segment_availability_end(), 101.0);
        assert_eq!(timeline.seek_range_end(), 98.0);
    }

    #[test]
    fn test_availability_end_monotonic() {
        let clock = ManualClock::new(EPOCH_MS + 20_000.0);
        let mut timeline = live(&clock, 30.0);
        timeline.lock_start_time();
        let mut previous = timeline.segment_availability_end();
        for _ in 0..50 {
            clock.advance(Duration::from_millis(700));
            let end = timeline.segment_availability_end();
            assert!(end >= previous);
            previous = end;
        }
    }
}
