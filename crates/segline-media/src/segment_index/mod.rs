//! Position-stable segment index.
//!
//! A [`SegmentIndex`] holds the references of one representation in
//! presentation order plus the number of references evicted from its front.
//! A position is a permanent logical index: `position - num_evicted` is the
//! storage offset, so positions stay valid while old segments fall out of a
//! live window.
//!
//! References are either held explicitly or generated on demand from a
//! segment timeline (see [`TimelineTemplate`]).

mod iterator;
mod meta;
mod timeline;
mod updater;

pub use iterator::SegmentIterator;
pub use meta::MetaSegmentIndex;
pub use timeline::TimelineTemplate;
pub use updater::update_every;

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::reference::{InitSegmentReference, SegmentReference};
use crate::uri::StaticUris;

use self::timeline::TimelineStore;

/// A segment index shared between a host and its recurring updates.
pub type SharedSegmentIndex = Arc<Mutex<SegmentIndex>>;

/// Read access shared by [`SegmentIndex`] and [`MetaSegmentIndex`].
pub trait SegmentSource {
    /// Position of the reference containing `time`.
    fn find(&self, time: f64) -> Option<u64>;

    /// Reference at a logical position.
    fn get(&self, position: u64) -> Option<Arc<SegmentReference>>;

    /// Iterate from the segment containing `time`.
    ///
    /// When that segment has partial segments the iterator starts at the
    /// partial containing `time`, moved back to the closest independent
    /// partial unless `allow_non_independent` is set.
    fn iter_for_time(
        &self,
        time: f64,
        allow_non_independent: bool,
        reverse: bool,
    ) -> Option<SegmentIterator<'_, Self>>
    where
        Self: Sized,
    {
        SegmentIterator::for_time(self, time, allow_non_independent, reverse)
    }
}

#[derive(Debug)]
enum Storage {
    Explicit(VecDeque<Arc<SegmentReference>>),
    Timeline(TimelineStore),
}

/// Ordered, mutable collection of the segment references of a representation.
#[derive(Debug)]
pub struct SegmentIndex {
    storage: Storage,
    num_evicted: u64,
    immutable: bool,
    timer: Option<AbortHandle>,
}

impl SegmentIndex {
    /// Create an index over references sorted by start, then end.
    pub fn new(references: Vec<Arc<SegmentReference>>) -> Self {
        debug_assert!(is_sorted(references.iter()), "references must be sorted");
        Self::with_storage(Storage::Explicit(references.into()))
    }

    /// Create an index that generates references from a segment timeline.
    ///
    /// With `should_fit`, ranges outside the period are dropped first.
    pub fn from_timeline(
        template: TimelineTemplate,
        period_start: f64,
        period_end: f64,
        should_fit: bool,
    ) -> Self {
        let mut index = Self::with_storage(Storage::Timeline(TimelineStore::new(
            template,
            period_start,
            period_end,
        )));
        if should_fit {
            index.fit(period_start, period_end, true);
        }
        index
    }

    /// An index with a single segment covering the whole resource.
    pub fn for_single_segment(start_time: f64, duration: f64, uris: Vec<String>) -> Self {
        let end_time = start_time + duration;
        let reference = SegmentReference::builder(start_time, end_time, StaticUris::shared(uris))
            .timestamp_offset(start_time)
            .append_window(start_time, end_time)
            .build();
        Self::new(vec![Arc::new(reference)])
    }

    fn with_storage(storage: Storage) -> Self {
        Self {
            storage,
            num_evicted: 0,
            immutable: false,
            timer: None,
        }
    }

    /// Wrap the index for sharing with recurring updates.
    pub fn shared(self) -> SharedSegmentIndex {
        Arc::new(Mutex::new(self))
    }

    /// Position of the reference containing `time`.
    ///
    /// A non-last reference is treated as ending where the next one starts,
    /// which absorbs rounding gaps. A time before the first reference maps
    /// to the first held position.
    pub fn find(&self, time: f64) -> Option<u64> {
        let offset = match &self.storage {
            Storage::Explicit(references) => find_explicit(references, time)?,
            Storage::Timeline(store) => store.find(time)?,
        };
        Some(offset as u64 + self.num_evicted)
    }

    /// Reference at a logical position; `None` when evicted or not yet known.
    pub fn get(&self, position: u64) -> Option<Arc<SegmentReference>> {
        let offset = usize::try_from(position.checked_sub(self.num_evicted)?).ok()?;
        match &self.storage {
            Storage::Explicit(references) => references.get(offset).cloned(),
            Storage::Timeline(store) => store.get(offset),
        }
    }

    /// Number of references evicted from the front so far.
    pub fn num_evicted(&self) -> u64 {
        self.num_evicted
    }

    /// Number of references currently held.
    pub fn num_references(&self) -> usize {
        match &self.storage {
            Storage::Explicit(references) => references.len(),
            Storage::Timeline(store) => store.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_references() == 0
    }

    /// The first held reference.
    pub fn earliest_reference(&self) -> Option<Arc<SegmentReference>> {
        self.get(self.num_evicted)
    }

    /// All held top-level references, in order.
    pub fn references(&self) -> Vec<Arc<SegmentReference>> {
        match &self.storage {
            Storage::Explicit(references) => references.iter().cloned().collect(),
            Storage::Timeline(store) => store.materialize_all(),
        }
    }

    /// The timeline template backing this index, if any.
    pub fn timeline_template(&self) -> Option<&TimelineTemplate> {
        match &self.storage {
            Storage::Timeline(store) => store.template(),
            Storage::Explicit(_) => None,
        }
    }

    /// Replace every held reference starting at or after the first new
    /// reference's start, then append the new references.
    ///
    /// Starts are compared at millisecond precision.
    pub fn merge(&mut self, references: Vec<Arc<SegmentReference>>) {
        if self.immutable || references.is_empty() {
            return;
        }
        debug_assert!(is_sorted(references.iter()), "merged references must be sorted");

        let first_start = round_ms(references[0].start_time());
        self.with_explicit(|held| {
            held.retain(|r| round_ms(r.start_time()) < first_start);
            held.extend(references);
            debug_assert!(is_sorted(held.iter()));
        });
    }

    /// Merge the references still inside the window, then evict everything
    /// ending at or before `window_start`.
    ///
    /// New references that are already out of the window, or that end before
    /// the first held reference starts, are dropped before merging. When that
    /// leaves both the index and the new list empty, the last new reference is
    /// kept so the index never goes empty because of an update.
    pub fn merge_and_evict(&mut self, references: Vec<Arc<SegmentReference>>, window_start: f64) {
        if self.immutable || references.is_empty() {
            return;
        }

        let first_held_start = self.earliest_reference().map(|r| r.start_time());
        let mut references = references;
        let fallback = references.last().cloned();
        references.retain(|r| {
            r.end_time() > window_start && first_held_start.map_or(true, |start| r.end_time() > start)
        });

        if references.is_empty() && self.is_empty() {
            if let Some(last) = fallback {
                debug!("Keeping reference at {} despite window start {}", last.start_time(), window_start);
                self.merge(vec![last]);
            }
            return;
        }

        self.merge(references);
        self.evict(window_start);
    }

    /// Drop leading references ending at or before `time`.
    pub fn evict(&mut self, time: f64) {
        if self.immutable {
            return;
        }
        let count = match &mut self.storage {
            Storage::Explicit(references) => {
                let count = references.iter().take_while(|r| r.end_time() <= time).count();
                references.drain(..count);
                count
            }
            Storage::Timeline(store) => store.evict(time),
        };
        if count > 0 {
            debug!("Evicted {} references ending before {}", count, time);
            self.num_evicted += count as u64;
        }
    }

    /// Trim the index to `[window_start, window_end)`.
    ///
    /// References starting at or after `window_end` are dropped, as are
    /// references ending at or before `window_start`; the latter count as
    /// evicted unless `is_new`. The last remaining reference is replaced by a
    /// copy ending at `window_end` when that is finite.
    pub fn fit(&mut self, window_start: f64, window_end: f64, is_new: bool) {
        if self.immutable {
            return;
        }

        let dropped = match &mut self.storage {
            Storage::Explicit(references) => {
                while references.back().is_some_and(|r| r.start_time() >= window_end) {
                    references.pop_back();
                }
                let mut dropped = 0;
                while references.front().is_some_and(|r| r.end_time() <= window_start) {
                    references.pop_front();
                    dropped += 1;
                }
                if window_end.is_finite() {
                    if let Some(last) = references.back_mut() {
                        *last = Arc::new(last.with_end_time(window_end));
                    }
                }
                dropped
            }
            Storage::Timeline(store) => {
                let dropped = store.fit(window_start, window_end);
                if store.len() == 0 {
                    store.release();
                }
                dropped
            }
        };

        if !is_new {
            self.num_evicted += dropped as u64;
        }
    }

    /// Shift every reference by `offset` seconds.
    pub fn offset(&mut self, offset: f64) {
        if self.immutable {
            return;
        }
        self.with_explicit(|held| {
            for reference in held.iter_mut() {
                *reference = Arc::new(reference.offset_by(offset));
            }
        });
    }

    /// Append timeline ranges from a refreshed manifest.
    ///
    /// Only ranges starting at or after the current last range are added. A
    /// fully evicted timeline is re-seeded without resetting the eviction
    /// counter, so positions keep counting up.
    pub fn append_template_info(
        &mut self,
        info: TimelineTemplate,
        period_start: f64,
        period_end: f64,
        should_fit: bool,
        is_new: bool,
    ) {
        if self.immutable {
            return;
        }

        let held_explicit = match &self.storage {
            Storage::Explicit(references) => Some(references.len()),
            Storage::Timeline(_) => None,
        };

        match held_explicit {
            None => {
                if let Storage::Timeline(store) = &mut self.storage {
                    let init = info.init_segment.clone();
                    store.append(info, period_start, period_end);
                    let current = store.template().and_then(|t| t.init_segment.as_ref());
                    if !init_matches(current, init.as_ref()) {
                        store.set_init_segment(init);
                    }
                }
            }
            Some(0) => {
                self.storage = Storage::Timeline(TimelineStore::new(info, period_start, period_end));
            }
            Some(_) => {
                let generated = TimelineStore::new(info, period_start, period_end).materialize_all();
                self.with_explicit(|held| {
                    let last_end = held.back().map(|r| r.end_time());
                    held.extend(
                        generated
                            .into_iter()
                            .filter(|r| last_end.map_or(true, |end| r.start_time() >= end)),
                    );
                });
            }
        }

        if should_fit {
            self.fit(period_start, period_end, is_new);
        }
    }

    /// Point every reference at a new init segment.
    pub fn update_init_segment(&mut self, init: Arc<InitSegmentReference>) {
        if self.immutable {
            return;
        }
        match &mut self.storage {
            Storage::Explicit(references) => {
                for reference in references.iter_mut() {
                    if !init_matches(reference.init_segment(), Some(&init)) {
                        *reference = Arc::new(reference.with_init_segment(Some(Arc::clone(&init))));
                    }
                }
            }
            Storage::Timeline(store) => store.set_init_segment(Some(init)),
        }
    }

    /// Make every mutator a no-op from now on.
    pub fn mark_immutable(&mut self) {
        self.immutable = true;
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Drop all references and stop recurring updates.
    pub fn release(&mut self) {
        if self.immutable {
            return;
        }
        match &mut self.storage {
            Storage::Explicit(references) => references.clear(),
            Storage::Timeline(store) => store.release(),
        }
        self.stop_updates();
    }

    /// Iterate from the segment containing `time`.
    pub fn iter_for_time(
        &self,
        time: f64,
        allow_non_independent: bool,
        reverse: bool,
    ) -> Option<SegmentIterator<'_, Self>> {
        SegmentIterator::for_time(self, time, allow_non_independent, reverse)
    }

    /// Whether a recurring update is armed.
    pub fn is_updating(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    pub(crate) fn set_timer(&mut self, timer: AbortHandle) {
        self.stop_updates();
        self.timer = Some(timer);
    }

    pub(crate) fn clear_timer(&mut self) {
        self.timer = None;
    }

    fn stop_updates(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Append references produced by a recurring update.
    pub(crate) fn push_references(&mut self, references: Vec<Arc<SegmentReference>>) {
        if references.is_empty() {
            return;
        }
        debug!("Appending {} generated references", references.len());
        self.with_explicit(|held| held.extend(references));
    }

    /// Run `f` on explicit storage, materializing a timeline first.
    fn with_explicit<R>(&mut self, f: impl FnOnce(&mut VecDeque<Arc<SegmentReference>>) -> R) -> R {
        let mut references =
            match std::mem::replace(&mut self.storage, Storage::Explicit(VecDeque::new())) {
                Storage::Explicit(references) => references,
                Storage::Timeline(store) => store.materialize_all().into(),
            };
        let result = f(&mut references);
        self.storage = Storage::Explicit(references);
        result
    }
}

impl SegmentSource for SegmentIndex {
    fn find(&self, time: f64) -> Option<u64> {
        SegmentIndex::find(self, time)
    }

    fn get(&self, position: u64) -> Option<Arc<SegmentReference>> {
        SegmentIndex::get(self, position)
    }
}

impl Drop for SegmentIndex {
    fn drop(&mut self) {
        self.stop_updates();
    }
}

fn find_explicit(references: &VecDeque<Arc<SegmentReference>>, time: f64) -> Option<usize> {
    let first = references.front()?;
    let last = references.len() - 1;

    for i in (0..references.len()).rev() {
        let reference = &references[i];
        let end = if i < last {
            references[i + 1].start_time()
        } else {
            reference.end_time()
        };
        if time >= reference.start_time() && time < end {
            return Some(i);
        }
    }

    if time < first.start_time() {
        Some(0)
    } else {
        None
    }
}

fn init_matches(
    current: Option<&Arc<InitSegmentReference>>,
    next: Option<&Arc<InitSegmentReference>>,
) -> bool {
    match (current, next) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b) || **a == **b,
        (None, None) => true,
        _ => false,
    }
}

fn round_ms(time: f64) -> f64 {
    (time * 1000.0).round() / 1000.0
}

fn is_sorted<'a>(mut references: impl Iterator<Item = &'a Arc<SegmentReference>>) -> bool {
    let Some(mut previous) = references.next() else {
        return true;
    };
    for reference in references {
        let ordered = previous.start_time() < reference.start_time()
            || (previous.start_time() == reference.start_time()
                && previous.end_time() <= reference.end_time());
        if !ordered {
            return false;
        }
        previous = reference;
    }
    true
}
