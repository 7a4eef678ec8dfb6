use std::cmp::Ordering;

use log::info;

use crate::common::PAGE_SIZE;

use super::key_comparator::KeyComparator;

/// Number of (key, value) slots that fit in one bucket page for the given
/// slot width, alongside the two per-slot bitmaps. Seeded with the closed
/// form `4 * PAGE_SIZE / (4 * slot + 1)` and shrunk until both bitmaps and
/// the slot array actually fit (the closed form alone can overshoot the
/// page by a byte or two for some widths).
const fn bucket_capacity(slot_size: usize) -> usize {
    let mut slots = 4 * PAGE_SIZE / (4 * slot_size + 1);
    while 2 * ((slots + 7) / 8) + slots * slot_size > PAGE_SIZE {
        slots -= 1;
    }
    slots
}

fn bit_is_set(bitmap: &[u8], idx: usize) -> bool {
    (bitmap[idx / 8] >> (idx % 8)) & 1 == 1
}

fn set_bit(bitmap: &mut [u8], idx: usize) {
    bitmap[idx / 8] |= 1 << (idx % 8);
}

fn clear_bit(bitmap: &mut [u8], idx: usize) {
    bitmap[idx / 8] &= !(1 << (idx % 8));
}

/// Hash bucket page layout:
///
/// +------------------+
/// | occupied bitmap  |  ceil(B/8) bytes
/// +------------------+
/// | readable bitmap  |  ceil(B/8) bytes
/// +------------------+
/// | slot array       |  B slots of KS + VS bytes
/// | [key 0][value 0] |
/// | [key 1][value 1] |
/// | ...              |
/// +------------------+
///
/// `occupied[i]` is set the first time slot i is written and never cleared
/// for the life of the page; it bounds diagnostic scans. `readable[i]` is
/// set exactly while slot i holds a live pair; clearing it deletes the
/// entry and leaves a tombstone. Readable implies occupied.
///
/// The page's persistent identity is exactly these bytes; the trailing
/// remainder of the page stays zero.
pub struct HashBucketPage<'a, const KS: usize, const VS: usize> {
    data: &'a mut [u8],
}

/// Read-only view over a hash bucket page.
pub struct HashBucketPageRef<'a, const KS: usize, const VS: usize> {
    data: &'a [u8],
}

impl<'a, const KS: usize, const VS: usize> HashBucketPageRef<'a, KS, VS> {
    /// Number of slots in a bucket page of this key/value width.
    pub const CAPACITY: usize = bucket_capacity(KS + VS);
    const BITMAP_BYTES: usize = (Self::CAPACITY + 7) / 8;
    const OCCUPIED_OFFSET: usize = 0;
    const READABLE_OFFSET: usize = Self::BITMAP_BYTES;
    const SLOTS_OFFSET: usize = 2 * Self::BITMAP_BYTES;
    const SLOT_SIZE: usize = KS + VS;

    /// Creates a read-only view. The buffer must be exactly one page.
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Whether slot `idx` has ever held a pair.
    pub fn is_occupied(&self, idx: usize) -> bool {
        assert!(idx < Self::CAPACITY);
        bit_is_set(&self.data[Self::OCCUPIED_OFFSET..], idx)
    }

    /// Whether slot `idx` currently holds a live pair.
    pub fn is_readable(&self, idx: usize) -> bool {
        assert!(idx < Self::CAPACITY);
        bit_is_set(&self.data[Self::READABLE_OFFSET..], idx)
    }

    /// The key bytes of slot `idx`. Meaningful only while the slot is
    /// readable.
    pub fn key_at(&self, idx: usize) -> &'a [u8] {
        assert!(idx < Self::CAPACITY);
        let start = Self::SLOTS_OFFSET + idx * Self::SLOT_SIZE;
        &self.data[start..start + KS]
    }

    /// The value bytes of slot `idx`. Meaningful only while the slot is
    /// readable.
    pub fn value_at(&self, idx: usize) -> &'a [u8] {
        assert!(idx < Self::CAPACITY);
        let start = Self::SLOTS_OFFSET + idx * Self::SLOT_SIZE + KS;
        &self.data[start..start + VS]
    }

    /// Appends to `out` every value stored under a key comparing equal to
    /// `key`, in slot order. Returns `true` iff at least one was found.
    pub fn get_value(
        &self,
        key: &[u8],
        cmp: &dyn KeyComparator,
        out: &mut Vec<[u8; VS]>,
    ) -> bool {
        assert_eq!(key.len(), KS);
        let mut found = false;
        for idx in 0..Self::CAPACITY {
            if !self.is_readable(idx) {
                continue;
            }
            if cmp.compare(key, self.key_at(idx)) == Ordering::Equal {
                let mut value = [0u8; VS];
                value.copy_from_slice(self.value_at(idx));
                out.push(value);
                found = true;
            }
        }
        found
    }

    /// Number of live pairs: the population count of the first `CAPACITY`
    /// readable bits.
    pub fn num_readable(&self) -> usize {
        let readable =
            &self.data[Self::READABLE_OFFSET..Self::READABLE_OFFSET + Self::BITMAP_BYTES];
        let mut count = 0usize;
        for (i, byte) in readable.iter().enumerate() {
            let mut bits = *byte;
            if (i + 1) * 8 > Self::CAPACITY {
                // Mask the tail past the last real slot.
                bits &= (1u8 << (Self::CAPACITY - i * 8)) - 1;
            }
            count += bits.count_ones() as usize;
        }
        count
    }

    /// Whether every slot holds a live pair.
    pub fn is_full(&self) -> bool {
        self.num_readable() == Self::CAPACITY
    }

    /// Whether no slot holds a live pair.
    pub fn is_empty(&self) -> bool {
        self.num_readable() == 0
    }

    /// Logs a one-line occupancy summary. The scan stops at the first
    /// never-occupied slot.
    pub fn print_bucket(&self) {
        let mut size = 0;
        let mut taken = 0;
        let mut free = 0;
        for idx in 0..Self::CAPACITY {
            if !self.is_occupied(idx) {
                break;
            }
            size += 1;
            if self.is_readable(idx) {
                taken += 1;
            } else {
                free += 1;
            }
        }
        info!(
            "bucket capacity: {}, size: {}, taken: {}, free: {}",
            Self::CAPACITY,
            size,
            taken,
            free
        );
    }
}

impl<'a, const KS: usize, const VS: usize> HashBucketPage<'a, KS, VS> {
    /// Number of slots in a bucket page of this key/value width.
    pub const CAPACITY: usize = bucket_capacity(KS + VS);
    const BITMAP_BYTES: usize = (Self::CAPACITY + 7) / 8;
    const OCCUPIED_OFFSET: usize = 0;
    const READABLE_OFFSET: usize = Self::BITMAP_BYTES;
    const SLOTS_OFFSET: usize = 2 * Self::BITMAP_BYTES;
    const SLOT_SIZE: usize = KS + VS;

    /// Creates a mutable view. The buffer must be exactly one page.
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Initializes a fresh, empty bucket.
    pub fn init(&mut self) {
        self.data.fill(0);
    }

    fn view(&self) -> HashBucketPageRef<'_, KS, VS> {
        HashBucketPageRef { data: self.data }
    }

    /// Inserts the pair unless the bucket already holds it or is full.
    /// The pair lands in the lowest-indexed non-readable slot, reclaiming
    /// tombstones.
    pub fn insert(&mut self, key: &[u8], value: &[u8], cmp: &dyn KeyComparator) -> bool {
        assert_eq!(key.len(), KS);
        assert_eq!(value.len(), VS);

        let mut insert_idx = None;
        for idx in 0..Self::CAPACITY {
            if !self.view().is_readable(idx) {
                if insert_idx.is_none() {
                    insert_idx = Some(idx);
                }
                continue;
            }
            if cmp.compare(key, self.view().key_at(idx)) == Ordering::Equal
                && value == self.view().value_at(idx)
            {
                // The exact pair is already present.
                return false;
            }
        }

        let Some(idx) = insert_idx else {
            // Bucket full.
            return false;
        };

        let start = Self::SLOTS_OFFSET + idx * Self::SLOT_SIZE;
        self.data[start..start + KS].copy_from_slice(key);
        self.data[start + KS..start + KS + VS].copy_from_slice(value);
        set_bit(&mut self.data[Self::OCCUPIED_OFFSET..], idx);
        set_bit(&mut self.data[Self::READABLE_OFFSET..], idx);
        true
    }

    /// Deletes the first slot holding this exact pair. The slot keeps its
    /// occupied bit as a tombstone.
    pub fn remove(&mut self, key: &[u8], value: &[u8], cmp: &dyn KeyComparator) -> bool {
        assert_eq!(key.len(), KS);
        assert_eq!(value.len(), VS);

        for idx in 0..Self::CAPACITY {
            if !self.view().is_readable(idx) {
                continue;
            }
            if cmp.compare(key, self.view().key_at(idx)) == Ordering::Equal
                && value == self.view().value_at(idx)
            {
                self.remove_at(idx);
                return true;
            }
        }
        false
    }

    /// Clears the readable bit of slot `idx`; the occupied bit stays.
    pub fn remove_at(&mut self, idx: usize) {
        assert!(idx < Self::CAPACITY);
        clear_bit(&mut self.data[Self::READABLE_OFFSET..], idx);
    }

    pub fn is_occupied(&self, idx: usize) -> bool {
        self.view().is_occupied(idx)
    }

    pub fn is_readable(&self, idx: usize) -> bool {
        self.view().is_readable(idx)
    }

    pub fn key_at(&self, idx: usize) -> &[u8] {
        assert!(idx < Self::CAPACITY);
        let start = Self::SLOTS_OFFSET + idx * Self::SLOT_SIZE;
        &self.data[start..start + KS]
    }

    pub fn value_at(&self, idx: usize) -> &[u8] {
        assert!(idx < Self::CAPACITY);
        let start = Self::SLOTS_OFFSET + idx * Self::SLOT_SIZE + KS;
        &self.data[start..start + VS]
    }

    pub fn get_value(
        &self,
        key: &[u8],
        cmp: &dyn KeyComparator,
        out: &mut Vec<[u8; VS]>,
    ) -> bool {
        self.view().get_value(key, cmp, out)
    }

    pub fn num_readable(&self) -> usize {
        self.view().num_readable()
    }

    pub fn is_full(&self) -> bool {
        self.view().is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.view().is_empty()
    }

    pub fn print_bucket(&self) {
        self.view().print_bucket()
    }
}
