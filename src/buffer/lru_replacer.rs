use hashlink::LinkedHashMap;
use parking_lot::Mutex;

use crate::common::FrameId;

/// LRU replacement policy over buffer frames.
///
/// Frames tracked here are eviction candidates; frames not tracked are either
/// free or currently pinned. The victim is always the least-recently-unpinned
/// candidate. The replacer records its capacity but relies on the buffer pool
/// to never unpin more frames than the pool holds.
pub struct LruReplacer {
    capacity: usize,
    /// Insertion-ordered candidate set: front = least recently unpinned
    candidates: Mutex<LinkedHashMap<FrameId, ()>>,
}

impl LruReplacer {
    /// Creates a replacer sized for a pool of `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            candidates: Mutex::new(LinkedHashMap::new()),
        }
    }

    /// Removes and returns the least-recently-unpinned frame.
    /// Returns None if there are no candidates.
    pub fn victim(&self) -> Option<FrameId> {
        self.candidates.lock().pop_front().map(|(frame_id, _)| frame_id)
    }

    /// Removes a frame from the candidate set. No-op if the frame is absent.
    /// Called after a page is pinned, and when a page is deleted.
    pub fn pin(&self, frame_id: FrameId) {
        self.candidates.lock().remove(&frame_id);
    }

    /// Adds a frame as the most-recently-unpinned candidate.
    /// No-op if the frame is already a candidate.
    pub fn unpin(&self, frame_id: FrameId) {
        let mut candidates = self.candidates.lock();
        if candidates.contains_key(&frame_id) {
            return;
        }
        candidates.insert(frame_id, ());
        debug_assert!(candidates.len() <= self.capacity);
    }

    /// Returns the number of eviction candidates.
    pub fn size(&self) -> usize {
        self.candidates.lock().len()
    }
}
