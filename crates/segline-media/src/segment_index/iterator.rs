//! Partial-segment aware iteration.

use std::sync::Arc;

use tracing::error;

use super::SegmentSource;
use crate::reference::SegmentReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// The next call yields this slot. `partial: None` means "first partial
    /// when iterating forward, last when iterating backward".
    Pending { position: u64, partial: Option<usize> },
    /// The slot most recently yielded.
    At { position: u64, partial: Option<usize> },
}

/// Lazy iterator over the references of a [`SegmentSource`].
///
/// Parents with partial segments are replaced by their partials. When the
/// iterator runs past the last published partial of a parent that is still
/// being published, it returns `None` without moving, so polling again after
/// the index is updated continues where it stopped.
#[derive(Debug)]
pub struct SegmentIterator<'a, S: SegmentSource + ?Sized> {
    source: &'a S,
    cursor: Cursor,
    reverse: bool,
}

impl<'a, S: SegmentSource + ?Sized> SegmentIterator<'a, S> {
    /// Start at a logical position.
    pub fn new(source: &'a S, position: u64, reverse: bool) -> Self {
        Self {
            source,
            cursor: Cursor::Pending {
                position,
                partial: None,
            },
            reverse,
        }
    }

    pub(crate) fn for_time(
        source: &'a S,
        time: f64,
        allow_non_independent: bool,
        reverse: bool,
    ) -> Option<Self> {
        let position = source.find(time)?;
        let mut partial = None;

        if let Some(reference) = source.get(position) {
            let partials = reference.partial_references();
            let containing = partials
                .iter()
                .rposition(|p| time >= p.start_time() && time < p.end_time());

            if let Some(mut i) = containing {
                if !allow_non_independent {
                    while i > 0 && !partials[i].is_independent() {
                        i -= 1;
                    }
                    if !partials[i].is_independent() {
                        error!("No independent partial segment found at {}", time);
                        return None;
                    }
                }
                partial = Some(i);
            }
        }

        Some(Self {
            source,
            cursor: Cursor::Pending { position, partial },
            reverse,
        })
    }

    /// Change direction; the next call moves from the current slot.
    pub fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
    }

    /// Logical position of the parent reference under the cursor.
    pub fn current_position(&self) -> u64 {
        match self.cursor {
            Cursor::Pending { position, .. } | Cursor::At { position, .. } => position,
        }
    }

    /// The reference most recently yielded.
    pub fn current(&self) -> Option<Arc<SegmentReference>> {
        let Cursor::At { position, partial } = self.cursor else {
            return None;
        };
        let reference = self.source.get(position)?;
        match partial {
            Some(i) => reference.partial_references().get(i).cloned(),
            None => Some(reference),
        }
    }

    fn resolve(&mut self, mut position: u64, mut partial: Option<usize>) -> Option<Arc<SegmentReference>> {
        loop {
            self.cursor = Cursor::Pending { position, partial };
            let reference = self.source.get(position)?;

            if !reference.has_partial_segments() {
                // The parent was replaced by a whole segment after we had
                // already yielded some of its partials.
                if !self.reverse && partial.is_some_and(|i| i > 0) {
                    position += 1;
                    partial = None;
                    continue;
                }
                self.cursor = Cursor::At {
                    position,
                    partial: None,
                };
                return Some(reference);
            }

            let partials = reference.partial_references();
            let index = partial.unwrap_or(if self.reverse { partials.len() - 1 } else { 0 });
            if let Some(found) = partials.get(index) {
                self.cursor = Cursor::At {
                    position,
                    partial: Some(index),
                };
                return Some(Arc::clone(found));
            }

            if self.reverse || !reference.all_partial_segments() {
                return None;
            }
            position += 1;
            partial = None;
        }
    }
}

impl<S: SegmentSource + ?Sized> Iterator for SegmentIterator<'_, S> {
    type Item = Arc<SegmentReference>;

    fn next(&mut self) -> Option<Self::Item> {
        let (position, partial) = match self.cursor {
            Cursor::Pending { position, partial } => (position, partial),
            Cursor::At { position, partial } if !self.reverse => match partial {
                Some(i) => (position, Some(i + 1)),
                None => (position + 1, None),
            },
            Cursor::At { position, partial } => match partial {
                Some(i) if i > 0 => (position, Some(i - 1)),
                _ => (position.checked_sub(1)?, None),
            },
        };
        self.resolve(position, partial)
    }
}
