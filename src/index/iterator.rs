use std::sync::Arc;

use crate::buffer::{BufferPoolManager, ReadPageGuard};
use crate::common::{PageId, RecordId, Result, INVALID_PAGE_ID};

use super::key::GenericKey;
use super::node::LeafRef;

/// Forward iterator over leaf entries in key order. It holds a pin and read
/// latch on its current leaf; advancing past the last entry latches the next
/// leaf before the current one is released.
pub struct BPlusTreeIter<const N: usize> {
    bpm: Arc<BufferPoolManager>,
    guard: Option<ReadPageGuard>,
    index: usize,
}

enum Step<const N: usize> {
    Entry((GenericKey<N>, RecordId)),
    Advance(PageId),
}

impl<const N: usize> BPlusTreeIter<N> {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, guard: ReadPageGuard, index: usize) -> Self {
        Self {
            bpm,
            guard: Some(guard),
            index,
        }
    }

    pub(crate) fn end(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            guard: None,
            index: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.guard.is_none()
    }

    /// Returns the next (key, RID) entry, or None past the last leaf.
    pub fn next(&mut self) -> Result<Option<(GenericKey<N>, RecordId)>> {
        loop {
            let step = {
                let guard = match self.guard.as_ref() {
                    Some(guard) => guard,
                    None => return Ok(None),
                };
                let leaf = LeafRef::<N>::new(guard.data());
                if self.index < leaf.size() {
                    Step::Entry(leaf.entry_at(self.index))
                } else {
                    Step::Advance(leaf.next_page_id())
                }
            };

            match step {
                Step::Entry(entry) => {
                    self.index += 1;
                    return Ok(Some(entry));
                }
                Step::Advance(next) if next == INVALID_PAGE_ID => {
                    self.guard = None;
                    return Ok(None);
                }
                Step::Advance(next) => {
                    // Latch the next leaf before dropping the current one
                    let next_guard = self.bpm.fetch_read_page(next)?;
                    self.guard = Some(next_guard);
                    self.index = 0;
                }
            }
        }
    }
}

impl<const N: usize> Iterator for BPlusTreeIter<N> {
    type Item = Result<(GenericKey<N>, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match BPlusTreeIter::next(self) {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
