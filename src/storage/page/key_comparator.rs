use std::cmp::Ordering;

/// Comparison over serialized keys.
///
/// Bucket pages store keys as fixed-width byte strips whose interpretation
/// the page does not know, so ordering and equality come from the caller.
/// Both operands always have the page's key width.
pub trait KeyComparator: Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Compares keys as little-endian unsigned integers of the page's key
/// width. Works for any width a bucket page is instantiated with; a
/// 4-byte key compares like a `u32`, an 8-byte key like a `u64`.
pub struct IntegerComparator;

impl KeyComparator for IntegerComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        debug_assert_eq!(a.len(), b.len());
        // Little-endian: the most significant byte is the last one, so
        // walk both strips back to front until they disagree.
        for (x, y) in a.iter().rev().zip(b.iter().rev()) {
            match x.cmp(y) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

/// Compares keys as left-to-right byte strings, for keys whose serialized
/// form is already order-preserving (big-endian integers, padded text).
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        debug_assert_eq!(a.len(), b.len());
        a.cmp(b)
    }
}
