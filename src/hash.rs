//! Hash index family.
//!
//! Count-Min Sketch rows are addressed with double hashing: a key is reduced
//! to two 32-bit digests `h1` and `h2` once, and row `i` reads column
//! `(h1 + i * h2) mod width`. Kirsch and Mitzenmacher show that two digests
//! are enough to simulate `depth` pairwise independent hash functions.
//! Keys with their own per-row hashing bypass the digests through
//! [`SketchKey::row_hash`].
//!
//! [Less Hashing, Same Performance](https://www.eecs.harvard.edu/~michaelm/postscripts/rsa2008.pdf)
//!
//! HyperLogLog consumes a single 32-bit hash which [`split_hash`] turns into
//! a register index (high bits) and a rank (low bits).

use std::hash::{BuildHasher, BuildHasherDefault, Hash, Hasher};

use wyhash::WyHash;

/// Pair of 32-bit digests identifying a key.
///
/// `Digests` is itself a [`SketchKey`], so callers that already hold
/// digests can feed them straight into a sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Digests {
    h1: u32,
    h2: u32,
}

impl Digests {
    /// Create digests from two hash halves. `h2` is forced odd so that
    /// consecutive rows never land on the same column of a power-of-two width.
    #[inline]
    pub fn new(h1: u32, h2: u32) -> Self {
        Self { h1, h2: h2 | 1 }
    }

    /// Hash of the key for sketch row `row`
    #[inline]
    pub fn row_hash(&self, row: usize) -> u64 {
        u64::from(self.h1).wrapping_add((row as u64).wrapping_mul(u64::from(self.h2)))
    }

}

/// Key which can be placed into a Count-Min Sketch.
///
/// A key yields one hash per sketch row. Every `Hash` type is a `SketchKey`
/// via WyHash double hashing. Types that carry their own hashing can
/// implement the trait directly as long as they are not `Hash`, and may
/// override [`SketchKey::row_hash`] to pick each row's column themselves.
pub trait SketchKey {
    fn digests(&self) -> Digests;

    /// Hash of the key for sketch row `row`
    #[inline]
    fn row_hash(&self, row: usize) -> u64 {
        self.digests().row_hash(row)
    }
}

impl<T: Hash + ?Sized> SketchKey for T {
    #[inline]
    fn digests(&self) -> Digests {
        let h = hash64::<T, WyHash>(self);
        Digests::new(h as u32, (h >> 32) as u32)
    }
}

impl SketchKey for Digests {
    #[inline]
    fn digests(&self) -> Digests {
        *self
    }
}

/// Iterate over the columns `key` selects in each of `depth` rows of given `width`
#[inline]
pub fn positions<K: SketchKey + ?Sized>(
    key: &K,
    depth: usize,
    width: usize,
) -> impl Iterator<Item = usize> + '_ {
    (0..depth).map(move |row| (key.row_hash(row) % width as u64) as usize)
}

/// Hash an item with a default-constructed `H`
#[inline]
pub fn hash64<T: Hash + ?Sized, H: Hasher + Default>(item: &T) -> u64 {
    let mut hasher = BuildHasherDefault::<H>::default().build_hasher();
    item.hash(&mut hasher);
    hasher.finish()
}

/// Hash an item to 32 bits by folding both halves of the 64-bit digest
#[inline]
pub fn hash32<T: Hash + ?Sized, H: Hasher + Default>(item: &T) -> u32 {
    let h = hash64::<T, H>(item);
    (h ^ (h >> 32)) as u32
}

/// Split a 32-bit hash into HyperLogLog register index and rank.
///
/// Rank is the one-indexed position of the lowest set bit among the low
/// `k_comp` bits, capped at `k_comp + 1` when they are all zero. The
/// remaining `32 - k_comp` high bits form the register index.
#[inline]
pub fn split_hash(hash: u32, k_comp: u32) -> (usize, u8) {
    debug_assert!(k_comp > 0 && k_comp < 32);
    let rank = hash.trailing_zeros().min(k_comp) + 1;
    let idx = hash >> k_comp;
    (idx as usize, rank as u8)
}
