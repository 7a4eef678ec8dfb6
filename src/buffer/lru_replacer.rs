use hashlink::LinkedHashSet;
use parking_lot::Mutex;

use crate::common::FrameId;

/// Eviction policy over buffer frames.
///
/// A replacer tracks exactly the frames that are currently evictable:
/// resident with a pin count of zero. The pool inserts a frame when its
/// last pin is released, removes it when the frame is pinned again or
/// deleted, and asks for a victim when it needs to reuse a frame.
///
/// Implementations are internally thread-safe. They are called while the
/// owning instance's latch is held, so they must never call back into the
/// instance or perform I/O.
pub trait Replacer: Send + Sync {
    /// Adds `frame_id` as the most recently released member. No-op if the
    /// frame is already tracked or the replacer is at capacity.
    fn insert(&self, frame_id: FrameId);

    /// Removes `frame_id` from eviction candidates. No-op if absent.
    fn remove(&self, frame_id: FrameId);

    /// Removes and returns the next victim, or `None` if nothing is
    /// evictable.
    fn pick_victim(&self) -> Option<FrameId>;

    /// Number of evictable frames currently tracked.
    fn size(&self) -> usize;
}

/// LRU replacement policy: the victim is the frame whose last unpin is
/// oldest.
///
/// A `LinkedHashSet` keeps insertion order in a doubly-linked list with a
/// hash lookup beside it, so insert, remove, and victim selection are all
/// O(1). The front of the set is the next victim; new members join at the
/// back.
pub struct LruReplacer {
    capacity: usize,
    candidates: Mutex<LinkedHashSet<FrameId>>,
}

impl LruReplacer {
    /// Creates a replacer tracking at most `capacity` frames (the frame
    /// count of the owning instance).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            candidates: Mutex::new(LinkedHashSet::with_capacity(capacity)),
        }
    }
}

impl Replacer for LruReplacer {
    fn insert(&self, frame_id: FrameId) {
        let mut candidates = self.candidates.lock();
        if candidates.contains(&frame_id) || candidates.len() >= self.capacity {
            return;
        }
        candidates.insert(frame_id);
    }

    fn remove(&self, frame_id: FrameId) {
        self.candidates.lock().remove(&frame_id);
    }

    fn pick_victim(&self) -> Option<FrameId> {
        self.candidates.lock().pop_front()
    }

    fn size(&self) -> usize {
        self.candidates.lock().len()
    }
}
