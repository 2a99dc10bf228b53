//! Read-only concatenation of segment indexes.

use std::sync::Arc;

use super::{SegmentSource, SharedSegmentIndex};
use crate::reference::SegmentReference;
use crate::{Error, Result};

/// Several indexes joined end to end, typically one per period.
///
/// Positions continue across children: a child's positions are offset by
/// the evicted-plus-held count of every child before it. Mutation through
/// the meta-index is rejected; update the children instead.
#[derive(Debug, Default)]
pub struct MetaSegmentIndex {
    indexes: Vec<SharedSegmentIndex>,
}

impl MetaSegmentIndex {
    pub fn new(indexes: Vec<SharedSegmentIndex>) -> Self {
        Self { indexes }
    }

    /// Add an index after the existing ones.
    pub fn append_index(&mut self, index: SharedSegmentIndex) {
        self.indexes.push(index);
    }

    pub fn indexes(&self) -> &[SharedSegmentIndex] {
        &self.indexes
    }

    /// Total number of references held by the children.
    pub fn num_references(&self) -> usize {
        self.indexes.iter().map(|index| index.lock().num_references()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_references() == 0
    }

    /// Release every child and forget them.
    pub fn release(&mut self) {
        for index in self.indexes.drain(..) {
            index.lock().release();
        }
    }

    pub fn merge(&mut self, _references: Vec<Arc<SegmentReference>>) -> Result<()> {
        Err(Error::immutable("merge"))
    }

    pub fn merge_and_evict(
        &mut self,
        _references: Vec<Arc<SegmentReference>>,
        _window_start: f64,
    ) -> Result<()> {
        Err(Error::immutable("merge_and_evict"))
    }

    pub fn evict(&mut self, _time: f64) -> Result<()> {
        Err(Error::immutable("evict"))
    }

    pub fn fit(&mut self, _window_start: f64, _window_end: f64, _is_new: bool) -> Result<()> {
        Err(Error::immutable("fit"))
    }

    pub fn offset(&mut self, _offset: f64) -> Result<()> {
        Err(Error::immutable("offset"))
    }
}

impl SegmentSource for MetaSegmentIndex {
    fn find(&self, time: f64) -> Option<u64> {
        let mut passed = 0u64;
        for index in &self.indexes {
            let index = index.lock();
            if let Some(position) = index.find(time) {
                return Some(position + passed);
            }
            passed += index.num_evicted() + index.num_references() as u64;
        }
        None
    }

    fn get(&self, position: u64) -> Option<Arc<SegmentReference>> {
        let mut passed = 0u64;
        let mut saw_segments = false;
        for index in &self.indexes {
            let index = index.lock();
            debug_assert!(
                !saw_segments || index.num_evicted() == 0,
                "evicted segments after available segments"
            );
            let local = position.checked_sub(passed)?;
            if let Some(reference) = index.get(local) {
                return Some(reference);
            }
            let held = index.num_references();
            passed += index.num_evicted() + held as u64;
            saw_segments |= held != 0;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment_index::tests::references;
    use crate::segment_index::SegmentIndex;

    fn meta() -> MetaSegmentIndex {
        let a = SegmentIndex::new(references(&[(0.0, 10.0), (10.0, 20.0), (20.0, 30.0)])).shared();
        let b = SegmentIndex::new(references(&[(30.0, 40.0), (40.0, 50.0)])).shared();
        let mut meta = MetaSegmentIndex::default();
        meta.append_index(a);
        meta.append_index(b);
        meta
    }

    #[test]
    fn test_positions_span_children() {
        let meta = meta();
        assert_eq!(meta.get(0).unwrap().start_time(), 0.0);
        assert_eq!(meta.get(2).unwrap().start_time(), 20.0);
        assert_eq!(meta.get(3).unwrap().start_time(), 30.0);
        assert_eq!(meta.get(4).unwrap().start_time(), 40.0);
        assert!(meta.get(5).is_none());
        assert_eq!(meta.num_references(), 5);
    }

    #[test]
    fn test_find_offsets_by_earlier_children() {
        let meta = meta();
        assert_eq!(meta.find(15.0), Some(1));
        assert_eq!(meta.find(45.0), Some(4));
        assert_eq!(meta.find(60.0), None);
    }

    #[test]
    fn test_eviction_in_first_child_keeps_positions() {
        let meta = meta();
        meta.indexes()[0].lock().evict(10.0);
        assert!(meta.get(0).is_none());
        assert_eq!(meta.get(1).unwrap().start_time(), 10.0);
        assert_eq!(meta.get(3).unwrap().start_time(), 30.0);
    }

    #[test]
    fn test_iterates_across_children() {
        let meta = meta();
        let starts: Vec<_> = meta
            .iter_for_time(25.0, false, false)
            .unwrap()
            .map(|r| r.start_time())
            .collect();
        assert_eq!(starts, vec![20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_mutation_rejected() {
        let mut meta = meta();
        assert!(matches!(meta.evict(10.0), Err(Error::ImmutableIndex { operation: "evict" })));
        assert!(meta.merge(Vec::new()).is_err());
        assert!(meta.fit(0.0, 1.0, false).is_err());
        assert!(meta.offset(1.0).is_err());
        assert!(meta.merge_and_evict(Vec::new(), 0.0).is_err());
        assert_eq!(meta.num_references(), 5);
    }

    #[test]
    fn test_release_releases_children() {
        let mut meta = meta();
        let first = Arc::clone(&meta.indexes()[0]);
        meta.release();
        assert!(meta.indexes().is_empty());
        assert!(first.lock().is_empty());
    }
}
