//! Integer arithmetic shared by all counting stages.
//!
//! The combinatorial algorithms are generic over the width of x: `i64` is
//! enough up to ~9.2e18, `i128` carries the large inputs (up to ~1e31 before
//! the intermediate products in the S2 stage would overflow). Indices into
//! tables and all small arithmetic stay 64-bit regardless of the width of x.

use std::fmt::{Debug, Display};

use num_integer::{Integer, Roots};
use num_traits::{NumCast, PrimInt, Signed};

/// Signed integer wide enough to hold x and every intermediate quotient.
///
/// Implemented for `i64` and `i128`. Division, comparison and decimal
/// formatting all come from the standard operator impls; the only extra
/// requirement is lossless casting from the 64-bit index domain.
pub trait CountInt:
    PrimInt + Integer + Roots + Signed + NumCast + Display + Debug + Send + Sync + 'static
{
}

impl CountInt for i64 {}
impl CountInt for i128 {}

/// Cast a wide value down to `i64`.
///
/// All call sites divide x by something >= x^(1/2) first, so the quotient
/// fits; a violation is a programmer error, not a recoverable condition.
#[inline]
pub fn to_i64<T: CountInt>(x: T) -> i64 {
    x.to_i64().expect("quotient must fit in i64")
}

/// Lossless widening from the 64-bit index domain.
#[inline]
pub fn from_i64<T: CountInt>(x: i64) -> T {
    T::from(x).expect("i64 always fits in a CountInt")
}

/// Floor of the square root.
#[inline]
pub fn isqrt<T: CountInt>(x: T) -> T {
    x.sqrt()
}

/// Floor of the k-th root.
#[inline]
pub fn iroot<const K: u32, T: CountInt>(x: T) -> T {
    x.nth_root(K)
}

/// Ceiling division for non-negative operands.
#[inline]
pub fn ceil_div<T: CountInt>(x: T, y: T) -> T {
    Integer::div_ceil(&x, &y)
}

/// Number of worker threads worth spawning for an input of size x.
///
/// Small inputs run single threaded: below `threshold` the parallel region
/// costs more than it saves. Above it, each thread should get at least
/// `threshold` worth of work.
pub fn ideal_num_threads<T: CountInt>(threads: usize, x: T, threshold: i64) -> usize {
    let threshold = threshold.max(1);
    if x < from_i64(threshold) {
        return 1;
    }
    let max_threads = to_i64(x.min(from_i64(i64::MAX)) / from_i64(threshold)).max(1) as usize;
    threads.clamp(1, max_threads)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isqrt_exact_and_floor() {
        assert_eq!(isqrt(0i64), 0);
        assert_eq!(isqrt(1i64), 1);
        assert_eq!(isqrt(99i64), 9);
        assert_eq!(isqrt(100i64), 10);
        assert_eq!(isqrt(10_000_000_000_000_000_000i128), 3_162_277_660);
    }

    #[test]
    fn iroot_matches_pow() {
        assert_eq!(iroot::<3, i64>(1_000_000), 100);
        assert_eq!(iroot::<3, i64>(999_999), 99);
        assert_eq!(iroot::<4, i64>(1_000_000_000), 177);
        // (177^4 = 981506241) <= 1e9 < (178^4 = 1003875856)
        assert_eq!(iroot::<4, i128>(1_000_000_000_000_000_000_000_000), 1_000_000);
    }

    #[test]
    fn ceil_div_rounds_up() {
        assert_eq!(ceil_div(10i64, 3), 4);
        assert_eq!(ceil_div(9i64, 3), 3);
        assert_eq!(ceil_div(1i64, 100), 1);
    }

    #[test]
    fn thread_count_clamps() {
        assert_eq!(ideal_num_threads(8, 100i64, 1_000_000), 1);
        assert_eq!(ideal_num_threads(8, 10_000_000_000i64, 1_000_000), 8);
        assert_eq!(ideal_num_threads(8, 3_000_000i64, 1_000_000), 3);
        assert_eq!(ideal_num_threads(8, 10i128.pow(20), 1_000_000), 8);
    }
}
