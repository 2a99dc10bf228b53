//! Segment timeline expansion.
//!
//! Turns `(start?, duration, repeat?, partials?)` entries into normalized
//! [`TimeRange`]s. Gaps and overlaps between entries are absorbed by moving
//! the previous range's end to the next entry's start, so `$Time$`
//! substitution for later segments stays exact.

use tracing::warn;

use crate::{Error, Result};

/// Gaps or overlaps at least this large (in seconds) are logged.
pub const GAP_OVERLAP_TOLERANCE_SECONDS: f64 = 1.0 / 15.0;

/// One manifest timeline entry, in timescale units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TimelineEntry {
    /// Explicit start; continues from the previous entry when absent.
    pub start: Option<u64>,
    /// Segment duration. Zero is treated as missing.
    pub duration: u64,
    /// Additional repetitions. Negative means "until the next entry or the
    /// end of the period".
    pub repeat: Option<i64>,
    /// Number of partial segments each produced segment is split into.
    pub partial_segments: Option<u32>,
}

impl TimelineEntry {
    pub fn new(start: Option<u64>, duration: u64, repeat: Option<i64>) -> Self {
        Self {
            start,
            duration,
            repeat,
            partial_segments: None,
        }
    }
}

/// A normalized timeline entry.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeRange {
    /// Start in seconds, relative to the period.
    pub start: f64,
    /// End in seconds, relative to the period.
    pub end: f64,
    /// Start in timescale units after subtracting the presentation time offset.
    pub unscaled_start: i64,
    pub partial_segments: u32,
    /// Ordinal used for `$Number$`.
    pub segment_position: u64,
}

/// Parameters for [`expand_timeline`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineParams {
    pub timescale: u32,
    /// Unscaled presentation time offset subtracted from every start.
    pub presentation_time_offset: u64,
    /// Period duration in seconds; `f64::INFINITY` when unbounded.
    pub period_duration: f64,
    pub start_number: u64,
    pub gap_tolerance: f64,
}

impl TimelineParams {
    pub fn new(timescale: u32) -> Self {
        Self {
            timescale,
            presentation_time_offset: 0,
            period_duration: f64::INFINITY,
            start_number: 1,
            gap_tolerance: GAP_OVERLAP_TOLERANCE_SECONDS,
        }
    }

    pub fn presentation_time_offset(mut self, pto: u64) -> Self {
        self.presentation_time_offset = pto;
        self
    }

    pub fn period_duration(mut self, duration: f64) -> Self {
        self.period_duration = duration;
        self
    }

    pub fn start_number(mut self, start_number: u64) -> Self {
        self.start_number = start_number;
        self
    }

    pub fn gap_tolerance(mut self, tolerance: f64) -> Self {
        self.gap_tolerance = tolerance;
        self
    }
}

/// Expand timeline entries into time ranges.
///
/// Malformed trailing entries stop expansion with a warning and everything
/// produced so far is returned. A negative repeat whose next entry does not
/// start after the current one is rejected with [`Error::NegativeRepeat`].
pub fn expand_timeline(entries: &[TimelineEntry], params: &TimelineParams) -> Result<Vec<TimeRange>> {
    let mut timeline: Vec<TimeRange> = Vec::new();
    if params.timescale == 0 {
        warn!("Segment timeline has a zero timescale; ignoring it");
        return Ok(timeline);
    }

    let timescale = params.timescale as f64;
    let pto = params.presentation_time_offset as i64;
    let mut last_end = -pto;

    for (i, entry) in entries.iter().enumerate() {
        if entry.duration == 0 {
            warn!(
                "Timeline entry {} has no duration: ignoring it and all later entries",
                i
            );
            return Ok(timeline);
        }
        let duration = entry.duration as i64;
        let mut start = match entry.start {
            Some(t) => t as i64 - pto,
            None => last_end,
        };

        let mut repeat = entry.repeat.unwrap_or(0);
        if repeat < 0 {
            match entries.get(i + 1) {
                Some(next) => {
                    let Some(next_start) = next.start.map(|t| t as i64 - pto) else {
                        warn!(
                            "Timeline entry {} has a negative repeat but the next entry has no start: ignoring it and all later entries",
                            i
                        );
                        return Ok(timeline);
                    };
                    if start >= next_start {
                        warn!(
                            "Timeline entry {} has a negative repeat but the next entry starts at {} which is not after {}",
                            i, next_start, start
                        );
                        return Err(Error::NegativeRepeat {
                            entry: i,
                            start,
                            next_start,
                        });
                    }
                    repeat = ceil_div(next_start - start, duration) - 1;
                }
                None => {
                    if params.period_duration.is_infinite() {
                        warn!(
                            "Last timeline entry {} has a negative repeat in an unbounded period: ignoring it",
                            i
                        );
                        return Ok(timeline);
                    }
                    if start as f64 / timescale >= params.period_duration {
                        warn!(
                            "Last timeline entry {} has a negative repeat but starts after the period ends: ignoring it",
                            i
                        );
                        return Ok(timeline);
                    }
                    let remaining = params.period_duration * timescale - start as f64;
                    repeat = (remaining / duration as f64).ceil() as i64 - 1;
                }
            }
        }

        if let Some(previous) = timeline.last_mut() {
            if start != last_end {
                let delta = start - last_end;
                if (delta as f64 / timescale).abs() >= params.gap_tolerance {
                    warn!(
                        "Timeline entry {} leaves a {} of {}s; stretching the previous segment",
                        i,
                        if delta > 0 { "gap" } else { "overlap" },
                        delta as f64 / timescale
                    );
                }
                previous.end = start as f64 / timescale;
            }
        }

        for _ in 0..=repeat {
            let end = start + duration;
            timeline.push(TimeRange {
                start: start as f64 / timescale,
                end: end as f64 / timescale,
                unscaled_start: start,
                partial_segments: entry.partial_segments.unwrap_or(0),
                segment_position: timeline.len() as u64 + params.start_number,
            });
            start = end;
            last_end = end;
        }
    }

    Ok(timeline)
}

fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    (numerator + denominator - 1) / denominator
}
