use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{FrameId, PageId, QuarryError, Result, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{FrameHeader, LruReplacer, ReadPageGuard, WritePageGuard};

/// Frame-table state. A single mutex serializes every mutation of the page
/// table and free list, including the disk I/O those mutations require.
struct PoolState {
    /// Page table: maps resident page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames with no resident page, in hand-out order
    free_list: VecDeque<FrameId>,
}

/// State shared with the release callbacks of outstanding page guards.
struct BufferPoolShared {
    /// The buffer pool frames
    frames: Vec<Arc<FrameHeader>>,
    /// Page table and free list under the pool mutex
    state: Mutex<PoolState>,
    /// LRU replacer for victim selection
    replacer: LruReplacer,
}

impl BufferPoolShared {
    /// Guard release path: mark dirty if the guard wrote, drop one pin, and
    /// hand the frame to the replacer when the last pin goes away.
    fn release(&self, page_id: PageId, is_dirty: bool) {
        let state = self.state.lock();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.as_usize()];
            if is_dirty {
                frame.set_dirty(true);
            }
            if let Some(0) = frame.unpin() {
                self.replacer.unpin(frame_id);
            }
        }
    }
}

/// BufferPoolManager caches disk pages in a fixed set of in-memory frames.
/// Pages are handed out as RAII guards that pin the frame and hold its
/// read/write latch; eviction follows the LRU policy over unpinned frames.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// Shared state
    shared: Arc<BufferPoolShared>,
    /// Disk scheduler for page I/O
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a new BufferPoolManager with the given pool size and disk
    /// manager. Initially every frame is in the free list.
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let shared = Arc::new(BufferPoolShared {
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
            }),
            replacer: LruReplacer::new(pool_size),
        });

        Self {
            pool_size,
            shared,
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Allocates a brand-new page and returns a write guard over its zeroed,
    /// pinned frame. Fails with PoolExhausted when every frame is pinned.
    pub fn new_page(&self) -> Result<WritePageGuard> {
        let page_id;
        {
            let mut state = self.shared.state.lock();
            let frame_id = self.acquire_frame(&mut state)?;

            page_id = match self.disk_scheduler.disk_manager().allocate_page() {
                Ok(pid) => pid,
                Err(e) => {
                    state.free_list.push_back(frame_id);
                    return Err(e);
                }
            };

            let frame = &self.shared.frames[frame_id.as_usize()];
            frame.reset();
            frame.set_page_id(page_id);
            frame.pin();

            state.page_table.insert(page_id, frame_id);
            self.shared.replacer.pin(frame_id);
        }

        // The frame is pinned, so it cannot be evicted before the guard
        // takes its latch here.
        let frame = self.resident_frame(page_id);
        Ok(self.make_write_guard(page_id, frame))
    }

    /// Fetches a page for shared access. The returned guard holds the page's
    /// read latch and a pin.
    pub fn fetch_read_page(&self, page_id: PageId) -> Result<ReadPageGuard> {
        let frame = self.fetch_into_frame(page_id)?;
        let shared = Arc::clone(&self.shared);

        let guard = unsafe {
            ReadPageGuard::new(
                page_id,
                frame,
                Box::new(move |pid, is_dirty| shared.release(pid, is_dirty)),
            )
        };
        Ok(guard)
    }

    /// Fetches a page for exclusive access. The returned guard holds the
    /// page's write latch and a pin.
    pub fn fetch_write_page(&self, page_id: PageId) -> Result<WritePageGuard> {
        let frame = self.fetch_into_frame(page_id)?;
        Ok(self.make_write_guard(page_id, frame))
    }

    /// Writes a page back to disk if it is resident and dirty.
    /// Returns true iff a write-back happened. Never evicts.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Err(QuarryError::InvalidPageId(page_id));
        }

        let frame = {
            let state = self.shared.state.lock();
            match state.page_table.get(&page_id) {
                Some(&frame_id) => Arc::clone(&self.shared.frames[frame_id.as_usize()]),
                None => return Ok(false),
            }
        };
        self.flush_frame(page_id, &frame)
    }

    /// Flushes every dirty resident page to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let resident: Vec<(PageId, Arc<FrameHeader>)> = {
            let state = self.shared.state.lock();
            state
                .page_table
                .iter()
                .map(|(&page_id, &frame_id)| {
                    (page_id, Arc::clone(&self.shared.frames[frame_id.as_usize()]))
                })
                .collect()
        };

        for (page_id, frame) in resident {
            self.flush_frame(page_id, &frame)?;
        }
        Ok(())
    }

    /// Write-back path shared by the flush entry points. The pool mutex is
    /// not held here: waiting for the frame's data latch while holding it
    /// could deadlock against a latch holder fetching another page. Holding
    /// the read latch keeps the frame from being rebound mid-copy, and the
    /// page-id check skips frames evicted before the latch was acquired
    /// (eviction already wrote those back).
    fn flush_frame(&self, page_id: PageId, frame: &FrameHeader) -> Result<bool> {
        let data_guard = frame.data.read();
        if frame.page_id() != page_id || !frame.is_dirty() {
            return Ok(false);
        }

        self.disk_scheduler
            .schedule_write_sync(page_id, &data_guard[..])?;
        frame.set_dirty(false);
        Ok(true)
    }

    /// Removes a page from the pool and deallocates it on disk.
    /// Returns false iff the page is resident and still pinned; the page id
    /// is deallocated in every other case, resident or not.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Err(QuarryError::InvalidPageId(page_id));
        }

        let mut state = self.shared.state.lock();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.shared.frames[frame_id.as_usize()];
            if frame.pin_count() > 0 {
                return Ok(false);
            }

            state.page_table.remove(&page_id);
            frame.reset();
            self.shared.replacer.pin(frame_id);
            state.free_list.push_back(frame_id);
        }

        self.disk_scheduler.disk_manager().deallocate_page(page_id);
        Ok(true)
    }

    /// Returns the pin count for a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.shared.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.shared.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.shared.state.lock().free_list.len()
    }

    pub fn replacer_size(&self) -> usize {
        self.shared.replacer.size()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    /// Makes the page resident (if it is not already) and pins its frame.
    fn fetch_into_frame(&self, page_id: PageId) -> Result<Arc<FrameHeader>> {
        if page_id == INVALID_PAGE_ID {
            return Err(QuarryError::InvalidPageId(page_id));
        }

        let mut state = self.shared.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.shared.frames[frame_id.as_usize()];
            frame.pin();
            self.shared.replacer.pin(frame_id);
            return Ok(Arc::clone(frame));
        }

        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.shared.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        if let Err(e) = self.disk_scheduler.schedule_read_sync(page_id, &mut data) {
            state.free_list.push_back(frame_id);
            return Err(e);
        }

        frame.set_page_id(page_id);
        frame.copy_from(&data);
        frame.set_dirty(false);
        frame.pin();

        state.page_table.insert(page_id, frame_id);
        self.shared.replacer.pin(frame_id);

        Ok(Arc::clone(frame))
    }

    /// Gets an available frame: free list first, then the replacer. A dirty
    /// victim is written back before its frame is repurposed.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        if let Some(frame_id) = self.shared.replacer.victim() {
            let frame = &self.shared.frames[frame_id.as_usize()];
            let old_page_id = frame.page_id();

            if frame.is_dirty() {
                let mut data = [0u8; PAGE_SIZE];
                frame.copy_to(&mut data);
                if let Err(e) = self.disk_scheduler.schedule_write_sync(old_page_id, &data) {
                    // Put the victim back so the pool stays consistent
                    self.shared.replacer.unpin(frame_id);
                    return Err(e);
                }
            }

            state.page_table.remove(&old_page_id);
            frame.reset();

            return Ok(frame_id);
        }

        Err(QuarryError::PoolExhausted)
    }

    fn resident_frame(&self, page_id: PageId) -> Arc<FrameHeader> {
        let state = self.shared.state.lock();
        let frame_id = state.page_table[&page_id];
        Arc::clone(&self.shared.frames[frame_id.as_usize()])
    }

    fn make_write_guard(&self, page_id: PageId, frame: Arc<FrameHeader>) -> WritePageGuard {
        let shared = Arc::clone(&self.shared);

        unsafe {
            WritePageGuard::new(
                page_id,
                frame,
                Box::new(move |pid, is_dirty| shared.release(pid, is_dirty)),
            )
        }
    }
}
