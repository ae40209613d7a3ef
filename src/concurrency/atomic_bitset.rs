//! Word-packed atomic bitset used as dense frontier storage.
//!
//! This is a dense alternative to `Vec<AtomicBool>`: one word covers 64
//! vertices, so clearing and scanning a sub-range touches far less memory,
//! and `test_and_set` gives the "first activation wins" semantics the
//! dense-forward traversal needs.

use core::sync::atomic::{AtomicUsize, Ordering};

const WORD_BITS: usize = usize::BITS as usize;

/// A word-packed atomic bitset.
pub struct AtomicBitset {
    bits: usize,
    words: Vec<AtomicUsize>,
}

impl AtomicBitset {
    /// Creates a new bitset with `bits` bits, all cleared.
    pub fn new(bits: usize) -> Self {
        let words_len = bits.div_ceil(WORD_BITS);
        let words = (0..words_len).map(|_| AtomicUsize::new(0)).collect();
        Self { bits, words }
    }

    /// Number of bits.
    pub fn len_bits(&self) -> usize {
        self.bits
    }

    /// Clears all bits.
    pub fn clear_all(&self) {
        for w in &self.words {
            w.store(0, Ordering::Relaxed);
        }
    }

    /// Returns whether `bit` is set.
    ///
    /// # Panics
    /// Panics if `bit >= len_bits()`.
    pub fn is_set(&self, bit: usize) -> bool {
        assert!(bit < self.bits, "bit {bit} out of range {}", self.bits);
        // SAFETY: index checked above.
        unsafe { self.is_set_unchecked(bit) }
    }

    /// Sets `bit` and returns `true` iff this call observed it previously cleared.
    ///
    /// # Panics
    /// Panics if `bit >= len_bits()`.
    pub fn test_and_set(&self, bit: usize, order: Ordering) -> bool {
        assert!(bit < self.bits, "bit {bit} out of range {}", self.bits);
        // SAFETY: index checked above.
        unsafe { self.test_and_set_unchecked(bit, order) }
    }

    /// Clears `bit`.
    ///
    /// # Panics
    /// Panics if `bit >= len_bits()`.
    pub fn clear(&self, bit: usize, order: Ordering) {
        assert!(bit < self.bits, "bit {bit} out of range {}", self.bits);
        let (word, mask) = bit_word_mask(bit);
        // SAFETY: word index derived from bit < self.bits.
        unsafe {
            self.words.get_unchecked(word).fetch_and(!mask, order);
        }
    }

    /// # Safety
    /// Caller must ensure `bit < len_bits()`.
    #[inline(always)]
    pub unsafe fn is_set_unchecked(&self, bit: usize) -> bool {
        let (word, mask) = bit_word_mask(bit);
        // SAFETY: word index derived from bit < self.bits.
        (self.words.get_unchecked(word).load(Ordering::Relaxed) & mask) != 0
    }

    /// # Safety
    /// Caller must ensure `bit < len_bits()`.
    #[inline(always)]
    pub unsafe fn test_and_set_unchecked(&self, bit: usize, order: Ordering) -> bool {
        let (word, mask) = bit_word_mask(bit);
        // SAFETY: word index derived from bit < self.bits.
        let prev = self.words.get_unchecked(word).fetch_or(mask, order);
        (prev & mask) == 0
    }

    /// Clears every bit in `[start, end)`.
    ///
    /// Interior words are cleared with plain stores; the partial words at the
    /// edges use `fetch_and` so bits outside the range owned by concurrent
    /// callers survive. This is how each sub-worker resets its own slice of
    /// the output frontier without a barrier per word.
    ///
    /// # Panics
    /// Panics if `end > len_bits()` or `start > end`.
    pub fn clear_range(&self, start: usize, end: usize) {
        assert!(start <= end && end <= self.bits, "range {start}..{end} out of bounds");
        if start == end {
            return;
        }
        let first_word = start / WORD_BITS;
        let last_word = (end - 1) / WORD_BITS;

        let low_mask = !0usize << (start % WORD_BITS);
        let high_bits = end % WORD_BITS;
        let high_mask = if high_bits == 0 { !0 } else { !(!0usize << high_bits) };

        if first_word == last_word {
            self.words[first_word].fetch_and(!(low_mask & high_mask), Ordering::Relaxed);
            return;
        }
        self.words[first_word].fetch_and(!low_mask, Ordering::Relaxed);
        for w in &self.words[first_word + 1..last_word] {
            w.store(0, Ordering::Relaxed);
        }
        self.words[last_word].fetch_and(!high_mask, Ordering::Relaxed);
    }

    /// Number of set bits in `[start, end)`.
    pub fn count_ones(&self, start: usize, end: usize) -> usize {
        assert!(start <= end && end <= self.bits, "range {start}..{end} out of bounds");
        // Bit-by-bit would be fine for correctness; counting whole words keeps
        // the recount phase cheap on large frontiers.
        let mut count = 0;
        let mut bit = start;
        while bit < end {
            let word = bit / WORD_BITS;
            let lo = bit % WORD_BITS;
            let span = (end - bit).min(WORD_BITS - lo);
            let mut w = self.words[word].load(Ordering::Relaxed) >> lo;
            if span < WORD_BITS {
                w &= (1usize << span).wrapping_sub(1);
            }
            count += w.count_ones() as usize;
            bit += span;
        }
        count
    }

    /// Iterates the indices of set bits in `[start, end)`, ascending.
    pub fn iter_ones(&self, start: usize, end: usize) -> impl Iterator<Item = usize> + '_ {
        assert!(start <= end && end <= self.bits, "range {start}..{end} out of bounds");
        OnesIter {
            set: self,
            bit: start,
            end,
            current: 0,
            loaded_word: usize::MAX,
        }
    }
}

struct OnesIter<'a> {
    set: &'a AtomicBitset,
    bit: usize,
    end: usize,
    current: usize,
    loaded_word: usize,
}

impl Iterator for OnesIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.bit >= self.end {
                return None;
            }
            let word = self.bit / WORD_BITS;
            if word != self.loaded_word {
                self.loaded_word = word;
                self.current = self.set.words[word].load(Ordering::Relaxed) >> (self.bit % WORD_BITS);
            }
            if self.current == 0 {
                // Skip to the next word boundary.
                self.bit = (word + 1) * WORD_BITS;
                continue;
            }
            let skip = self.current.trailing_zeros() as usize;
            self.current >>= skip;
            self.current >>= 1;
            let found = self.bit + skip;
            self.bit = found + 1;
            if found >= self.end {
                return None;
            }
            return Some(found);
        }
    }
}

#[inline(always)]
fn bit_word_mask(bit: usize) -> (usize, usize) {
    // `usize::BITS` is a power of two, so use shifts/masks.
    // This is on the hot path for every frontier write.
    (bit / WORD_BITS, 1usize << (bit % WORD_BITS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_set_and_clear() {
        let b = AtomicBitset::new(130);
        assert_eq!(b.len_bits(), 130);

        assert!(!b.is_set(0));
        assert!(b.test_and_set(0, Ordering::Relaxed));
        assert!(b.is_set(0));
        assert!(!b.test_and_set(0, Ordering::Relaxed));

        assert!(b.test_and_set(129, Ordering::Relaxed));
        assert!(b.is_set(129));

        b.clear(129, Ordering::Relaxed);
        assert!(!b.is_set(129));

        b.clear_all();
        assert!(!b.is_set(0));
    }

    #[test]
    fn clear_range_preserves_outside_bits() {
        let b = AtomicBitset::new(256);
        for i in 0..256 {
            b.test_and_set(i, Ordering::Relaxed);
        }
        b.clear_range(10, 200);
        for i in 0..256 {
            assert_eq!(b.is_set(i), !(10..200).contains(&i), "bit {i}");
        }
    }

    #[test]
    fn clear_range_within_one_word() {
        let b = AtomicBitset::new(64);
        for i in 0..64 {
            b.test_and_set(i, Ordering::Relaxed);
        }
        b.clear_range(3, 9);
        for i in 0..64 {
            assert_eq!(b.is_set(i), !(3..9).contains(&i), "bit {i}");
        }
    }

    #[test]
    fn count_and_iter_agree() {
        let b = AtomicBitset::new(300);
        let set = [0usize, 1, 63, 64, 65, 127, 128, 200, 299];
        for &i in &set {
            b.test_and_set(i, Ordering::Relaxed);
        }
        assert_eq!(b.count_ones(0, 300), set.len());
        let collected: Vec<usize> = b.iter_ones(0, 300).collect();
        assert_eq!(collected, set);

        assert_eq!(b.count_ones(64, 128), 3);
        let mid: Vec<usize> = b.iter_ones(64, 128).collect();
        assert_eq!(mid, vec![64, 65, 127]);
    }

    #[test]
    fn iter_empty_range() {
        let b = AtomicBitset::new(100);
        b.test_and_set(5, Ordering::Relaxed);
        assert_eq!(b.iter_ones(6, 6).count(), 0);
        assert_eq!(b.iter_ones(6, 100).count(), 0);
    }
}
