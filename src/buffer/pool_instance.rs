use std::collections::{HashMap, LinkedList};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::common::{BedrockError, FrameId, PageId, Result, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};
use crate::storage::LogManager;

use super::{FrameHeader, LruReplacer, ReadPageGuard, Replacer, WritePageGuard};

/// Bookkeeping protected by the instance latch.
struct PoolState {
    /// Page table: maps resident page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames that currently hold no page; taken from the front,
    /// returned to the back
    free_list: LinkedList<FrameId>,
    /// Next page ID this instance will hand out
    next_page_id: u32,
}

/// State shared between a pool instance and the guards it hands out.
pub(crate) struct PoolShared {
    pool_size: usize,
    /// Width of the enclosing parallel pool (1 when standalone)
    num_instances: u32,
    /// This instance's shard index in `[0, num_instances)`
    instance_index: u32,
    /// The buffer pool frames
    frames: Vec<Arc<FrameHeader>>,
    /// Latch serializing every externally visible operation
    state: Mutex<PoolState>,
    /// Eviction policy; its internal lock is strictly inner to the latch
    replacer: Box<dyn Replacer>,
    /// Disk scheduler for page I/O, performed while the latch is held
    disk_scheduler: DiskScheduler,
    /// Write-ahead log handle, held for later integration
    log_manager: Option<Arc<LogManager>>,
}

impl PoolShared {
    /// Fetches a page, pinning it. On a miss the page is read from disk
    /// into a reused frame.
    fn fetch_page(&self, page_id: PageId) -> Result<Arc<FrameHeader>> {
        if page_id == INVALID_PAGE_ID {
            return Err(BedrockError::InvalidPageId(page_id));
        }
        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.as_usize()];
            assert_eq!(frame.page_id(), page_id);
            // Pinning: out of the replacer, count up.
            self.replacer.remove(frame_id);
            frame.pin();
            return Ok(Arc::clone(frame));
        }

        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        if let Err(e) = self.disk_scheduler.schedule_read_sync(page_id, &mut data) {
            // A failed read leaves the pool as if the fetch never happened.
            state.free_list.push_back(frame_id);
            return Err(e);
        }

        frame.set_page_id(page_id);
        frame.copy_from(&data);
        frame.set_dirty(false);
        frame.pin();
        state.page_table.insert(page_id, frame_id);

        Ok(Arc::clone(frame))
    }

    /// Creates a zeroed page pinned once. The page ID is allocated only
    /// after a frame has been secured, so a refused create consumes no
    /// identifier space.
    fn new_page(&self) -> Result<(PageId, Arc<FrameHeader>)> {
        let mut state = self.state.lock();

        let frame_id = self.acquire_frame(&mut state)?;
        let page_id = self.allocate_page_id(&mut state);

        // The frame arrives reset: zeroed payload, clean, unpinned.
        let frame = &self.frames[frame_id.as_usize()];
        frame.set_page_id(page_id);
        frame.set_dirty(true);
        frame.pin();
        state.page_table.insert(page_id, frame_id);

        Ok((page_id, Arc::clone(frame)))
    }

    /// Releases one pin. Returns `false` only for an unmatched unpin; the
    /// dirty flag is OR-ed in and never cleared here.
    pub(crate) fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return true;
        };
        let frame = &self.frames[frame_id.as_usize()];
        match frame.unpin() {
            None => false,
            Some(remaining) => {
                if is_dirty {
                    frame.set_dirty(true);
                }
                if remaining == 0 {
                    self.replacer.insert(frame_id);
                }
                true
            }
        }
    }

    /// Writes a resident page to disk and clears its dirty flag. Pin and
    /// replacer state are untouched.
    fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Ok(false);
        }
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id.as_usize()];
        assert_eq!(frame.page_id(), page_id);

        let mut data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut data);
        self.disk_scheduler.schedule_write_sync(page_id, &data)?;
        frame.set_dirty(false);
        Ok(true)
    }

    /// Flushes every dirty resident page under one latch acquisition.
    /// Clean frames already match their on-disk image and are skipped.
    fn flush_all_pages(&self) -> Result<()> {
        let state = self.state.lock();
        for (&page_id, &frame_id) in state.page_table.iter() {
            let frame = &self.frames[frame_id.as_usize()];
            if !frame.is_dirty() {
                continue;
            }
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.disk_scheduler.schedule_write_sync(page_id, &data)?;
            frame.set_dirty(false);
        }
        Ok(())
    }

    /// Drops a page from the pool. Returns `false` while the page is
    /// pinned. The payload is never written back: a deleted page has no
    /// disk image worth preserving. Deleted page IDs are not reused.
    fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return true;
        };
        let frame = &self.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return false;
        }

        self.replacer.remove(frame_id);
        state.page_table.remove(&page_id);
        frame.reset();
        state.free_list.push_back(frame_id);
        true
    }

    /// Secures a frame for a new resident: free list first, then the
    /// replacer. The returned frame is reset and belongs to no page.
    /// Fails with `PoolExhausted` exactly when every frame is pinned.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = self.replacer.pick_victim() else {
            return Err(BedrockError::PoolExhausted);
        };

        let frame = &self.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();
        assert_eq!(state.page_table.get(&old_page_id), Some(&frame_id));

        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            debug!(
                "instance {} evicting dirty {} from {}",
                self.instance_index, old_page_id, frame_id
            );
            if let Err(e) = self.disk_scheduler.schedule_write_sync(old_page_id, &data) {
                // Write-back failed: the victim stays resident and dirty.
                self.replacer.insert(frame_id);
                return Err(e);
            }
            frame.set_dirty(false);
        }

        state.page_table.remove(&old_page_id);
        frame.reset();
        Ok(frame_id)
    }

    /// Hands out the next page ID of this shard's stripe.
    fn allocate_page_id(&self, state: &mut PoolState) -> PageId {
        let page_id = PageId::new(state.next_page_id);
        state.next_page_id += self.num_instances;
        assert_eq!(
            page_id.as_u32() % self.num_instances,
            self.instance_index,
            "allocated page id must map back to this instance"
        );
        page_id
    }
}

/// One buffer pool: a fixed array of frames caching disk pages, a page
/// table, a free list, and a replacement policy, serialized by a single
/// latch.
///
/// `fetch_page` and `new_page` return the frame pinned; every pin must be
/// matched by an `unpin_page` (or use the [`ReadPageGuard`] /
/// [`WritePageGuard`] layer, which unpins on drop). While pinned, the
/// frame's payload address is stable and the page cannot be evicted.
pub struct BufferPoolInstance {
    shared: Arc<PoolShared>,
}

impl BufferPoolInstance {
    /// Creates a standalone instance that owns the whole page ID space.
    pub fn new(
        pool_size: usize,
        disk_manager: Arc<DiskManager>,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        Self::new_sharded(pool_size, 1, 0, disk_manager, log_manager)
    }

    /// Creates one shard of a parallel pool. The instance allocates page
    /// IDs congruent to `instance_index` modulo `num_instances` and must
    /// only be routed pages from that stripe.
    pub fn new_sharded(
        pool_size: usize,
        num_instances: u32,
        instance_index: u32,
        disk_manager: Arc<DiskManager>,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        assert!(pool_size > 0, "a pool needs at least one frame");
        assert!(num_instances > 0, "pool width must be positive");
        assert!(instance_index < num_instances);

        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = LinkedList::new();
        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let shared = Arc::new(PoolShared {
            pool_size,
            num_instances,
            instance_index,
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
                next_page_id: instance_index,
            }),
            replacer: Box::new(LruReplacer::new(pool_size)),
            disk_scheduler: DiskScheduler::new(disk_manager),
            log_manager,
        });

        Self { shared }
    }

    /// Fetches `page_id`, pinning its frame. Fails with
    /// [`BedrockError::PoolExhausted`] when the page is not resident and
    /// every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Arc<FrameHeader>> {
        self.shared.fetch_page(page_id)
    }

    /// Allocates a fresh page with a zeroed payload, pinned once and
    /// marked dirty.
    pub fn new_page(&self) -> Result<(PageId, Arc<FrameHeader>)> {
        self.shared.new_page()
    }

    /// Releases one pin on `page_id`, OR-ing in `is_dirty`. Returns `true`
    /// for unknown pages (idempotent) and `false` for an unmatched unpin.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.shared.unpin_page(page_id, is_dirty)
    }

    /// Writes `page_id` to disk if resident. Returns `Ok(false)` for the
    /// invalid sentinel or an unresident page.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        self.shared.flush_page(page_id)
    }

    /// Flushes every dirty resident page.
    pub fn flush_all_pages(&self) -> Result<()> {
        self.shared.flush_all_pages()
    }

    /// Deletes `page_id` from the pool. Returns `false` while pinned.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        self.shared.delete_page(page_id)
    }

    /// Fetches `page_id` for shared read access. The returned guard holds
    /// the pin and the payload read lock until dropped.
    pub fn read_page(&self, page_id: PageId) -> Result<ReadPageGuard> {
        let frame = self.shared.fetch_page(page_id)?;
        // Safety: the guard keeps both the frame and the pool state alive.
        Ok(unsafe { ReadPageGuard::new(page_id, frame, Arc::clone(&self.shared)) })
    }

    /// Fetches `page_id` for exclusive write access. Dropping the guard
    /// unpins the page, dirty if it was written through.
    pub fn write_page(&self, page_id: PageId) -> Result<WritePageGuard> {
        let frame = self.shared.fetch_page(page_id)?;
        // Safety: the guard keeps both the frame and the pool state alive.
        Ok(unsafe { WritePageGuard::new(page_id, frame, Arc::clone(&self.shared)) })
    }

    /// Number of frames owned by this instance.
    pub fn pool_size(&self) -> usize {
        self.shared.pool_size
    }

    /// This instance's shard index.
    pub fn instance_index(&self) -> u32 {
        self.shared.instance_index
    }

    /// Number of frames that hold no page.
    pub fn free_frame_count(&self) -> usize {
        self.shared.state.lock().free_list.len()
    }

    /// Number of resident, unpinned frames.
    pub fn evictable_count(&self) -> usize {
        self.shared.replacer.size()
    }

    /// Number of pages currently resident.
    pub fn resident_count(&self) -> usize {
        self.shared.state.lock().page_table.len()
    }

    /// Pin count of `page_id`, or `None` if not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.shared.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.shared.frames[frame_id.as_usize()].pin_count())
    }

    /// The write-ahead log handle this instance was built with.
    pub fn log_manager(&self) -> Option<&Arc<LogManager>> {
        self.shared.log_manager.as_ref()
    }
}
