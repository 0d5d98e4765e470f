//! Count-Min Sketch estimates per-key frequencies of a stream with a
//! `depth x width` matrix of saturating counters.
//!
//! [Cormode and Muthukrishnan, An Improved Data Stream Summary](http://dimacs.rutgers.edu/~graham/pubs/papers/cm-full.pdf)
//!
//! # Estimators
//! - [`CountMinSketch::count`]: minimum over the selected counters. Never
//!   underestimates a key that was only added to.
//! - [`CountMinSketch::count_mean_min`]: median of the per-row counters
//!   after subtracting the expected noise of colliding keys, capped by
//!   `count`. Lower variance for infrequent keys, at the risk of
//!   underestimating them.
//!
//! # Updates
//! - [`CountMinSketch::add`] / [`CountMinSketch::delete`]: touch every row.
//! - [`CountMinSketch::conservative_add`]: raises the selected counters only
//!   up to `min + amount` (Estan and Varghese conservative update).
//!
//! # Data storage format
//! Counters are stored row-major in a single `Vec<C>`, followed by one `u64`
//! running total per row. A row total always equals the sum of its counters:
//! adds, deletes, merges and compression move the total by the delta actually
//! applied to the counter after saturation or clamping at zero. Only the
//! `u64` total itself can saturate.

use std::fmt::{Debug, Display, Formatter};
use std::mem::size_of;

use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::hash::{positions, SketchKey};

/// Fixed-width unsigned counter stored in a sketch cell.
///
/// All arithmetic saturates: counters stick at `MAX` and at zero instead of
/// wrapping around, so a count never appears to shrink because of overflow.
pub trait Counter: Copy + Ord + Default + Debug + Send + Sync + 'static {
    const ZERO: Self;
    const ONE: Self;
    const MAX: Self;

    fn saturating_add(self, rhs: Self) -> Self;
    fn saturating_sub(self, rhs: Self) -> Self;
    fn to_u64(self) -> u64;
    /// Convert from `u64`, saturating at `Self::MAX`
    fn from_u64(v: u64) -> Self;
}

macro_rules! impl_counter {
    ($($t:ty),*) => {
        $(
            impl Counter for $t {
                const ZERO: Self = 0;
                const ONE: Self = 1;
                const MAX: Self = <$t>::MAX;

                #[inline]
                fn saturating_add(self, rhs: Self) -> Self {
                    <$t>::saturating_add(self, rhs)
                }

                #[inline]
                fn saturating_sub(self, rhs: Self) -> Self {
                    <$t>::saturating_sub(self, rhs)
                }

                #[inline]
                fn to_u64(self) -> u64 {
                    u64::from(self)
                }

                #[inline]
                fn from_u64(v: u64) -> Self {
                    <$t>::try_from(v).unwrap_or(<$t>::MAX)
                }
            }
        )*
    };
}

impl_counter!(u8, u16, u32, u64);

/// Count-Min Sketch with counters of type `C`
#[derive(Clone, PartialEq, Eq)]
pub struct CountMinSketch<C: Counter = u32> {
    width: usize,
    depth: usize,
    /// Row-major `depth x width` matrix
    counters: Vec<C>,
    row_totals: Vec<u64>,
}

impl<C: Counter> CountMinSketch<C> {
    /// Creates new sketch with `width` columns and `depth` rows
    pub fn new(width: usize, depth: usize) -> Result<Self> {
        if width < 1 || depth < 1 {
            return Err(Error::Construction(format!(
                "sketch dimensions must be positive, got {}x{}",
                width, depth
            )));
        }
        let cells = width.checked_mul(depth).ok_or_else(|| {
            Error::Construction(format!("sketch of {}x{} cells is too large", width, depth))
        })?;

        debug!(width, depth, counter_bytes = size_of::<C>(), "creating count-min sketch");

        Ok(Self {
            width,
            depth,
            counters: vec![C::ZERO; cells],
            row_totals: vec![0; depth],
        })
    }

    /// Number of columns per row
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Sum of deltas applied through each row
    #[inline]
    pub fn row_totals(&self) -> &[u64] {
        &self.row_totals
    }

    /// Add `amount` occurrences of `key` and return its new estimate
    pub fn add<K: SketchKey + ?Sized>(&mut self, key: &K, amount: C) -> C {
        let mut estimate = C::MAX;
        for (row, col) in positions(key, self.depth, self.width).enumerate() {
            let cell = &mut self.counters[row * self.width + col];
            let old = *cell;
            *cell = old.saturating_add(amount);
            self.row_totals[row] = self.row_totals[row].saturating_add(cell.to_u64() - old.to_u64());
            estimate = estimate.min(*cell);
        }
        estimate
    }

    /// Remove `amount` occurrences of `key` and return its new estimate.
    /// Counters are clamped at zero.
    pub fn delete<K: SketchKey + ?Sized>(&mut self, key: &K, amount: C) -> C {
        let mut estimate = C::MAX;
        for (row, col) in positions(key, self.depth, self.width).enumerate() {
            let cell = &mut self.counters[row * self.width + col];
            let old = *cell;
            *cell = old.saturating_sub(amount);
            self.row_totals[row] = self.row_totals[row].saturating_sub(old.to_u64() - cell.to_u64());
            estimate = estimate.min(*cell);
        }
        estimate
    }

    /// Add a single occurrence of `key`
    #[inline]
    pub fn increment<K: SketchKey + ?Sized>(&mut self, key: &K) -> C {
        self.add(key, C::ONE)
    }

    /// Add `amount` occurrences of `key` with conservative update and return
    /// the new estimate.
    ///
    /// Only counters below `count(key) + amount` are raised, and only up to
    /// that target.
    pub fn conservative_add<K: SketchKey + ?Sized>(&mut self, key: &K, amount: C) -> C {
        let target = self.min_count(key).saturating_add(amount);
        for (row, col) in positions(key, self.depth, self.width).enumerate() {
            let cell = &mut self.counters[row * self.width + col];
            if *cell < target {
                self.row_totals[row] =
                    self.row_totals[row].saturating_add(target.to_u64() - cell.to_u64());
                *cell = target;
            }
        }
        target
    }

    /// Add a single occurrence of `key` with conservative update
    #[inline]
    pub fn conservative_increment<K: SketchKey + ?Sized>(&mut self, key: &K) -> C {
        self.conservative_add(key, C::ONE)
    }

    /// Return estimated count of `key`, never below its true count
    #[inline]
    pub fn count<K: SketchKey + ?Sized>(&self, key: &K) -> C {
        self.min_count(key)
    }

    /// Return count-mean-min estimate of `key`.
    ///
    /// Each row's counter is reduced by the average load of the other
    /// columns in that row; the median of these residuals is returned,
    /// capped by [`CountMinSketch::count`].
    pub fn count_mean_min<K: SketchKey + ?Sized>(&self, key: &K) -> C {
        let estimate = self.min_count(key);
        if self.width == 1 {
            // a single column has no neighbours to estimate noise from
            return estimate;
        }

        let other_columns = (self.width - 1) as f64;
        let mut residuals: Vec<f64> = positions(key, self.depth, self.width)
            .enumerate()
            .map(|(row, col)| {
                let counter = self.counters[row * self.width + col].to_u64() as f64;
                let noise = (self.row_totals[row] as f64 - counter) / other_columns;
                (counter - noise).max(0.0)
            })
            .collect();
        residuals.sort_unstable_by(f64::total_cmp);

        let mid = residuals.len() / 2;
        let median = if residuals.len() % 2 == 1 {
            residuals[mid]
        } else {
            (residuals[mid - 1] + residuals[mid]) / 2.0
        };

        C::from_u64(median as u64).min(estimate)
    }

    /// Merge `rhs` into `self` by summing counters elementwise.
    ///
    /// Row totals grow by the amount the counters actually gained.
    pub fn merge(&mut self, rhs: &Self) -> Result<()> {
        if self.width != rhs.width || self.depth != rhs.depth {
            warn!(
                lhs_width = self.width,
                lhs_depth = self.depth,
                rhs_width = rhs.width,
                rhs_depth = rhs.depth,
                "refusing to merge sketches of different dimensions"
            );
            return Err(Error::DimensionMismatch {
                expected: format!("{}x{}", self.width, self.depth),
                found: format!("{}x{}", rhs.width, rhs.depth),
            });
        }

        let rows = self
            .counters
            .chunks_exact_mut(self.width)
            .zip(rhs.counters.chunks_exact(rhs.width));
        for ((lhs_row, rhs_row), total) in rows.zip(&mut self.row_totals) {
            for (l, &r) in lhs_row.iter_mut().zip(rhs_row) {
                let old = *l;
                *l = old.saturating_add(r);
                *total = total.saturating_add(l.to_u64() - old.to_u64());
            }
        }

        Ok(())
    }

    /// Fold the sketch to half of its width.
    ///
    /// Column `j` absorbs column `j + width / 2`. Estimates stay valid
    /// because `(h mod w) mod (w / 2) == h mod (w / 2)` for even `w`, at the
    /// cost of more collisions.
    pub fn compress(&mut self) -> Result<()> {
        if self.width % 2 != 0 {
            return Err(Error::OddWidth(self.width));
        }

        let half = self.width / 2;
        let mut counters = Vec::with_capacity(half * self.depth);
        for (row, total) in self.counters.chunks_exact(self.width).zip(&mut self.row_totals) {
            let (lo, hi) = row.split_at(half);
            for (&a, &b) in lo.iter().zip(hi) {
                let folded = a.saturating_add(b);
                // saturation drops part of `b`
                *total = total.saturating_sub(b.to_u64() - (folded.to_u64() - a.to_u64()));
                counters.push(folded);
            }
        }

        trace!(from = self.width, to = half, "compressed count-min sketch");

        self.counters = counters;
        self.width = half;
        Ok(())
    }

    /// Reset all counters and row totals to zero
    pub fn clear(&mut self) {
        self.counters.fill(C::ZERO);
        self.row_totals.fill(0);
    }

    /// Return memory size of the sketch in bytes
    pub fn size_of(&self) -> usize {
        size_of::<Self>()
            + self.counters.len() * size_of::<C>()
            + self.row_totals.len() * size_of::<u64>()
    }

    /// Minimum over the counters selected by `key`
    #[inline]
    fn min_count<K: SketchKey + ?Sized>(&self, key: &K) -> C {
        positions(key, self.depth, self.width)
            .enumerate()
            .map(|(row, col)| self.counters[row * self.width + col])
            .min()
            .unwrap_or(C::ZERO)
    }
}

impl<C: Counter> Display for CountMinSketch<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{Sketch {}x{}}}", self.width, self.depth)
    }
}

impl<C: Counter> Debug for CountMinSketch<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ width: {}, depth: {}, total: {}, size: {} }}",
            self.width,
            self.depth,
            self.row_totals.first().copied().unwrap_or(0),
            self.size_of()
        )
    }
}
