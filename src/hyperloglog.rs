//! HyperLogLog estimates the number of distinct elements of a stream from
//! `m = 2^k` registers, each holding the maximum rank observed for its index.
//!
//! [Flajolet et al., HyperLogLog: the analysis of a near-optimal cardinality estimation algorithm](http://algo.inria.fr/flajolet/Publications/FlFuGaMe07.pdf)
//!
//! The estimator is sized from a target standard error: `1.04 / sqrt(m)`.
//! - `std_err = 0.065`  -> `m = 256`,  256 bytes
//! - `std_err = 0.0325` -> `m = 1024`, 1 KiB
//! - `std_err = 0.01`   -> `m = 16384`, 16 KiB
//!
//! Hashes are 32 bits wide: the high `k` bits select a register and the low
//! `32 - k` bits provide the rank (see [`crate::hash::split_hash`]).

use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::mem::{size_of, size_of_val};

use tracing::{debug, warn};
use wyhash::WyHash;

use crate::error::{Error, Result};
use crate::hash::{hash32, split_hash};

/// Largest supported precision: `2^28` registers leave 4 bits of rank.
pub const MAX_PRECISION: u32 = 28;
/// Smallest supported precision
pub const MIN_PRECISION: u32 = 1;

/// Size of the 32-bit hash space
const TWO_POW_32: f64 = 4_294_967_296.0;
/// Estimates above `2^32 / 30` are corrected for hash collisions.
const LARGE_RANGE_THRESHOLD: f64 = TWO_POW_32 / 30.0;

/// HyperLogLog cardinality estimator over 32-bit hashes
#[derive(Clone, PartialEq)]
pub struct HyperLogLog {
    /// Precision: number of hash bits used for register index
    k: u32,
    /// Bias correction constant for `m` registers
    alpha: f64,
    registers: Vec<u8>,
}

impl HyperLogLog {
    /// Creates new estimator with standard error of at most `std_err`.
    ///
    /// Smaller values require more space: `m` is the smallest power of two
    /// with `1.04 / sqrt(m) <= std_err`.
    pub fn new(std_err: f64) -> Result<Self> {
        if !(std_err > 0.0 && std_err < 1.0) {
            return Err(Error::Construction(format!(
                "standard error must be in (0, 1), got {}",
                std_err
            )));
        }

        let m = (1.04 / std_err).powi(2);
        let k = m.log2().ceil();
        if k > f64::from(MAX_PRECISION) {
            return Err(Error::Construction(format!(
                "standard error {} requires 2^{} registers, at most 2^{} are supported",
                std_err, k, MAX_PRECISION
            )));
        }

        Self::with_precision(k as u32)
    }

    /// Creates new estimator with `2^k` registers
    pub fn with_precision(k: u32) -> Result<Self> {
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&k) {
            return Err(Error::Construction(format!(
                "precision must be in [{}..{}] range, got {}",
                MIN_PRECISION, MAX_PRECISION, k
            )));
        }

        let m = 1usize << k;
        let alpha = alpha(m);
        debug!(m, k, alpha, "creating hyperloglog estimator");

        Ok(Self {
            k,
            alpha,
            registers: vec![0; m],
        })
    }

    /// Rebuild estimator from already validated parts
    pub(crate) fn from_parts(k: u32, alpha: f64, registers: Vec<u8>) -> Self {
        debug_assert_eq!(registers.len(), 1 << k);
        Self {
            k,
            alpha,
            registers,
        }
    }

    /// Number of hash bits used for register index
    #[inline]
    pub fn precision(&self) -> u32 {
        self.k
    }

    /// Number of hash bits used for rank, `32 - precision`
    #[inline]
    pub fn k_comp(&self) -> u32 {
        32 - self.k
    }

    /// Number of registers, `m`
    #[inline]
    pub fn num_registers(&self) -> usize {
        self.registers.len()
    }

    /// Bias correction constant
    #[inline]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    #[inline]
    pub fn registers(&self) -> &[u8] {
        &self.registers
    }

    /// Expected relative standard error of estimates
    #[inline]
    pub fn relative_error(&self) -> f64 {
        1.04 / (self.registers.len() as f64).sqrt()
    }

    /// Add an item by its 32-bit hash
    #[inline]
    pub fn add(&mut self, hash: u32) {
        let (idx, rank) = split_hash(hash, self.k_comp());
        let register = &mut self.registers[idx];
        if rank > *register {
            *register = rank;
        }
    }

    /// Hash an item with WyHash and add it
    #[inline]
    pub fn insert<T: Hash + ?Sized>(&mut self, item: &T) {
        self.insert_with::<WyHash, T>(item);
    }

    /// Hash an item with `H` and add it
    #[inline]
    pub fn insert_with<H: Hasher + Default, T: Hash + ?Sized>(&mut self, item: &T) {
        self.add(hash32::<T, H>(item));
    }

    /// Return cardinality estimate
    pub fn count(&self) -> u64 {
        let m = self.registers.len() as f64;
        let sum: f64 = self
            .registers
            .iter()
            .map(|&r| (-f64::from(r)).exp2())
            .sum();
        let mut estimate = self.alpha * m * m / sum;

        if estimate <= 2.5 * m {
            // linear counting while registers are still empty
            let zeros = self.registers.iter().filter(|&&r| r == 0).count();
            if zeros > 0 {
                estimate = m * (m / zeros as f64).ln();
            }
        } else if estimate > LARGE_RANGE_THRESHOLD && estimate < TWO_POW_32 {
            estimate = -TWO_POW_32 * (1.0 - estimate / TWO_POW_32).ln();
        }

        estimate as u64
    }

    /// Merge `rhs` into `self` by taking register-wise maximum
    pub fn merge(&mut self, rhs: &Self) -> Result<()> {
        if self.registers.len() != rhs.registers.len() {
            warn!(
                lhs = self.registers.len(),
                rhs = rhs.registers.len(),
                "refusing to merge hyperloglogs with different register counts"
            );
            return Err(Error::DimensionMismatch {
                expected: format!("{} registers", self.registers.len()),
                found: format!("{} registers", rhs.registers.len()),
            });
        }

        self.registers
            .iter_mut()
            .zip(&rhs.registers)
            .for_each(|(l, &r)| *l = (*l).max(r));

        Ok(())
    }

    /// Reset all registers to zero
    pub fn clear(&mut self) {
        self.registers.fill(0);
    }

    /// Return memory size of the estimator in bytes
    pub fn size_of(&self) -> usize {
        size_of::<Self>() + size_of_val(self.registers.as_slice())
    }
}

impl Debug for HyperLogLog {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ registers: {}, estimate: {}, size: {} }}",
            self.registers.len(),
            self.count(),
            self.size_of()
        )
    }
}

/// Parameter for bias correction
#[inline]
pub(crate) fn alpha(m: usize) -> f64 {
    match m {
        16 => 0.673,
        32 => 0.697,
        64 => 0.709,
        _ => 0.7213 / (1.0 + 1.079 / (m as f64)),
    }
}
