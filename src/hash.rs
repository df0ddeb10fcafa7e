//! Fixed-seed hasher for the crate's internal sets.
//!
//! The equality oracle keeps a set of pointer pairs while it walks nested
//! arrays. The keys are addresses, never untrusted input, so HashDoS
//! resistance is not needed and a zero-sized foldhash builder avoids
//! per-set random state.

use std::collections::HashSet;
use std::hash::BuildHasher;

pub use foldhash::fast::{FixedState, FoldHasher};

/// Zero-sized, deterministic `BuildHasher` backed by foldhash.
#[derive(Clone, Copy, Debug, Default)]
pub struct FastHashBuilder;

impl BuildHasher for FastHashBuilder {
    type Hasher = FoldHasher<'static>;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        FixedState::with_seed(0x2545f4914f6cdd1d).build_hasher()
    }
}

/// `HashSet` using [`FastHashBuilder`].
pub type FastHashSet<T> = HashSet<T, FastHashBuilder>;
