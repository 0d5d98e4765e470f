//! `streaming-estimators` provides single-pass, fixed-memory estimators for high-volume streams:
//! - [`CountMinSketch`] for approximate per-key frequencies, with conservative update and
//!   the count-mean-min estimator.
//! - [`HyperLogLog`] for approximate distinct counts, with small and large range correction.
//!
//! Estimators are not synchronized internally. Build one estimator per worker and
//! fold the partial results with `merge`, which is commutative and associative:
//!
//! ```
//! use streaming_estimators::{CountMinSketch, HyperLogLog};
//!
//! let mut words = CountMinSketch::<u32>::new(1 << 10, 4).unwrap();
//! let mut distinct = HyperLogLog::new(0.01).unwrap();
//! for word in "the quick brown fox jumps over the lazy dog".split(' ') {
//!     words.increment(word);
//!     distinct.insert(word);
//! }
//! assert!(words.count("the") >= 2);
//! assert!((7..=9).contains(&distinct.count()));
//! ```
pub mod count_min;
pub mod error;
pub mod hash;
pub mod hyperloglog;
pub mod record;
#[cfg(feature = "with_serde")]
mod serde;

pub use count_min::{CountMinSketch, Counter};
pub use error::{Error, Result};
pub use hash::{Digests, SketchKey};
pub use hyperloglog::HyperLogLog;
pub use record::HyperLogLogRecord;
