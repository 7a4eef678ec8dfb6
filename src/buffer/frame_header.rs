use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::common::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// Dirty flag, packed into the top bit of the residency word.
const DIRTY_BIT: u32 = 1 << 31;
/// Pin count occupies the remaining low bits.
const PIN_MASK: u32 = DIRTY_BIT - 1;

/// FrameHeader is one slot of a buffer pool instance: the page payload plus
/// the residency metadata the pool tracks per frame.
///
/// Pin count and dirty flag live in a single packed word. The unpin path
/// has to refuse an unmatched unpin without ever disturbing the dirty bit,
/// and packing both into one atomic lets that underflow check, the
/// decrement, and dirty preservation go through the same compare-exchange.
pub struct FrameHeader {
    /// Index of this frame in the instance's frame array
    frame_id: FrameId,
    /// Raw id of the resident page (`INVALID_PAGE_ID` while free)
    page_id: AtomicU32,
    /// Packed residency word: DIRTY_BIT plus the pin count in PIN_MASK
    state: AtomicU32,
    /// The page payload (pub(crate) for page guard access)
    pub(crate) data: RwLock<Box<[u8; PAGE_SIZE]>>,
}

impl FrameHeader {
    /// Creates a free frame with a zeroed payload.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: AtomicU32::new(INVALID_PAGE_ID.as_u32()),
            state: AtomicU32::new(0),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the page currently resident in this frame.
    pub fn page_id(&self) -> PageId {
        PageId::new(self.page_id.load(Ordering::Acquire))
    }

    pub(crate) fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id.as_u32(), Ordering::Release);
    }

    pub fn pin_count(&self) -> u32 {
        self.state.load(Ordering::Acquire) & PIN_MASK
    }

    /// Increments the pin count and returns the new value. The dirty bit
    /// rides along untouched.
    pub(crate) fn pin(&self) -> u32 {
        let previous = self.state.fetch_add(1, Ordering::AcqRel);
        debug_assert!(previous & PIN_MASK < PIN_MASK);
        (previous & PIN_MASK) + 1
    }

    /// Decrements the pin count and returns the new value, or `None` if the
    /// count was already zero (an unmatched unpin). One compare-exchange
    /// covers the underflow check, the decrement, and the dirty bit, so a
    /// refused unpin provably changes nothing.
    pub(crate) fn unpin(&self) -> Option<u32> {
        loop {
            let word = self.state.load(Ordering::Acquire);
            if word & PIN_MASK == 0 {
                return None;
            }
            if self
                .state
                .compare_exchange(word, word - 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some((word - 1) & PIN_MASK);
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.state.load(Ordering::Acquire) & DIRTY_BIT != 0
    }

    pub(crate) fn set_dirty(&self, dirty: bool) {
        if dirty {
            self.state.fetch_or(DIRTY_BIT, Ordering::AcqRel);
        } else {
            self.state.fetch_and(!DIRTY_BIT, Ordering::AcqRel);
        }
    }

    /// Returns a read guard over the page payload.
    pub fn read_data(&self) -> parking_lot::RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.read()
    }

    /// Returns a write guard over the page payload. Callers holding a frame
    /// pinned may write through this; pair the write with a dirty unpin so
    /// the change survives eviction.
    pub fn write_data(&self) -> parking_lot::RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.write()
    }

    /// Copies `data` into the frame payload.
    pub(crate) fn copy_from(&self, data: &[u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        self.data.write().copy_from_slice(data);
    }

    /// Copies the frame payload into `data`.
    pub(crate) fn copy_to(&self, data: &mut [u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        let payload = self.data.read();
        data.copy_from_slice(&payload[..]);
    }

    /// Returns the frame to its free state: no page, unpinned, clean,
    /// zeroed payload.
    pub(crate) fn reset(&self) {
        self.page_id
            .store(INVALID_PAGE_ID.as_u32(), Ordering::Release);
        self.state.store(0, Ordering::Release);
        self.data.write().fill(0);
    }
}
