//! Recurring index updates.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::{SegmentIndex, SharedSegmentIndex};
use crate::reference::SegmentReference;

/// Shortest accepted update interval.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Call `callback` every `interval` and append the references it returns.
///
/// The callback runs with the index locked and may evict or inspect it.
/// Returning `None` disarms the update. The task holds only a weak handle,
/// so dropping the last [`SharedSegmentIndex`] or calling
/// [`SegmentIndex::release`] stops it as well. Ticks are skipped while the
/// index is immutable.
///
/// Must be called from within a tokio runtime; otherwise nothing is armed.
pub fn update_every<F>(index: &SharedSegmentIndex, interval: Duration, mut callback: F)
where
    F: FnMut(&mut SegmentIndex) -> Option<Vec<Arc<SegmentReference>>> + Send + 'static,
{
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!("No tokio runtime available; segment index updates are disabled");
        return;
    };

    let weak = Arc::downgrade(index);
    let interval = interval.max(MIN_INTERVAL);

    let task = runtime.spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(index) = weak.upgrade() else {
                break;
            };
            let mut index = index.lock();
            if index.is_immutable() {
                continue;
            }

            match callback(&mut index) {
                Some(references) => index.push_references(references),
                None => {
                    debug!("Segment index update finished");
                    index.clear_timer();
                    break;
                }
            }
        }
    });

    index.lock().set_timer(task.abort_handle());
}
