use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::pool_instance::PoolShared;
use super::FrameHeader;

/// RAII pin with shared read access to a page.
///
/// Holding the guard keeps the page pinned and its payload read-locked;
/// dropping it releases the payload lock and then the pin. The explicit
/// fetch/unpin pairing remains available on the pool for callers that need
/// to thread a pin through non-lexical lifetimes.
pub struct ReadPageGuard {
    page_id: PageId,
    /// Keeps the frame alive for the transmuted data guard below
    _frame: Arc<FrameHeader>,
    pool: Arc<PoolShared>,
    data_guard: Option<RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl ReadPageGuard {
    /// # Safety
    ///
    /// `frame` must be pinned on behalf of this guard; the guard owns that
    /// pin and releases it exactly once on drop.
    pub(crate) unsafe fn new(page_id: PageId, frame: Arc<FrameHeader>, pool: Arc<PoolShared>) -> Self {
        let data_guard = frame.data.read();
        // The borrow is tied to the Arc'd frame this guard also owns, so
        // extending it to 'static cannot outlive the lock.
        let data_guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> =
            std::mem::transmute(data_guard);

        Self {
            page_id,
            _frame: frame,
            pool,
            data_guard: Some(data_guard),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// The page payload.
    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Release the payload lock before unpinning so a flusher waiting
        // on the payload under the latch can make progress.
        self.data_guard.take();
        self.pool.unpin_page(self.page_id, false);
    }
}

/// RAII pin with exclusive write access to a page.
///
/// The page is unpinned on drop; it is unpinned dirty iff the payload was
/// borrowed mutably through the guard.
pub struct WritePageGuard {
    page_id: PageId,
    _frame: Arc<FrameHeader>,
    pool: Arc<PoolShared>,
    data_guard: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
    is_dirty: bool,
}

impl WritePageGuard {
    /// # Safety
    ///
    /// `frame` must be pinned on behalf of this guard; the guard owns that
    /// pin and releases it exactly once on drop.
    pub(crate) unsafe fn new(page_id: PageId, frame: Arc<FrameHeader>, pool: Arc<PoolShared>) -> Self {
        let data_guard = frame.data.write();
        // Same lifetime extension as the read guard; the frame is owned.
        let data_guard: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> =
            std::mem::transmute(data_guard);

        Self {
            page_id,
            _frame: frame,
            pool,
            data_guard: Some(data_guard),
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }

    /// Mutable payload access; taking it marks the page dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.is_dirty = true;
        &mut self.data_guard.as_mut().unwrap()[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        // Payload lock first, then the pin, for the same reason as the
        // read guard.
        self.data_guard.take();
        self.pool.unpin_page(self.page_id, self.is_dirty);
    }
}
