//! Combinatorial prime counting.
//!
//! Computes pi(x), the number of primes <= x, without enumerating the
//! primes: the Legendre, Meissel, Lehmer and Deleglise-Rivat formulas all
//! reduce pi(x) to partial sieve counts phi(x, a) plus correction terms
//! (P2, P3, or the special-leaf sums S1/S2). The expensive stages are
//! parallel; the result is deterministic regardless of the thread count.
//!
//! The Deleglise-Rivat driver is generic over the width of x: `pi` works
//! on `i64`, `pi128` carries inputs past 2^63 on `i128` arithmetic.
//!
//!     use prime_pi::pi;
//!
//!     assert_eq!(pi(1_000_000, 1), 78_498);

mod arith;
mod bit_sieve;
mod counters;
mod factor_table;
mod load_balancer;
mod p2;
mod p3;
mod phi;
mod phi_tiny;
mod primes;
mod s1;
mod s2;
mod sieve;

pub use arith::CountInt;
pub use factor_table::{FactorEntry, FactorTable};
pub use p2::{p2, p2_lehmer};
pub use p3::p3;
pub use phi::{phi, phi_vector, PhiCache};
pub use phi_tiny::{get_c, is_phi_tiny, phi_tiny};
pub use primes::{generate_n_primes, generate_primes, PiTable};
pub use s1::s1;
pub use s2::{s2_easy, s2_sieve, s2_trivial};
pub use sieve::Sieve;

use arith::{from_i64, iroot, isqrt, to_i64};

/// Largest x the 128-bit driver accepts: beyond ~1e31 the 64-bit leaf
/// products of the S2 stage would overflow.
pub const MAX_X_128: i128 = 10i128.pow(31);

/// Inputs below this are answered from a plain sieve table.
const SMALL_X: i64 = 10_000;

fn pi_small(x: i64) -> i64 {
    if x < 2 {
        return 0;
    }
    PiTable::new(x).pi(x)
}

/// pi(x) via Legendre's formula: phi(x, a) + a - 1 with a = pi(sqrt(x)).
pub fn pi_legendre(x: i64, threads: usize) -> i64 {
    if x < 2 {
        return 0;
    }
    let a = pi_legendre(isqrt(x), threads);
    phi(x, a, threads) + a - 1
}

/// pi(x) via Meissel's formula: Legendre with the pair term split off at
/// a = pi(x^(1/3)).
pub fn pi_meissel(x: i64, threads: usize) -> i64 {
    if x < 2 {
        return 0;
    }
    let y = iroot::<3, i64>(x);
    let a = pi_legendre(y, threads);
    phi(x, a, threads) + a - 1 - p2(x, y, threads)
}

/// pi(x) via Lehmer's formula: a = pi(x^(1/4)) and both the pair and
/// triple terms corrected.
pub fn pi_lehmer(x: i64, threads: usize) -> i64 {
    if x < 2 {
        return 0;
    }
    let y = iroot::<4, i64>(x);
    let a = pi_meissel(y, 1);
    phi(x, a, threads) + a - 1 - p2_lehmer(x, a, threads) - p3(x, a, threads)
}

/// y = alpha * x^(1/3) tuning factor: larger alpha moves work from the
/// sieved special leaves to the pi-lookup ones. Polynomial fit in log x,
/// clamped so that y stays within [x^(1/3), sqrt(x)].
fn get_alpha<T: CountInt>(x: T) -> f64 {
    let lx = x.to_f64().unwrap_or(f64::MAX).ln();
    let alpha = 0.00147 * lx.powi(3) - 0.0471 * lx.powi(2) + 0.915 * lx - 1.021;
    alpha.clamp(1.0, (lx / 6.0).exp())
}

/// Crude pi(x) estimate used only to report S2 progress.
fn pi_approx<T: CountInt>(x: T) -> f64 {
    let xf = x.to_f64().unwrap_or(f64::MAX);
    xf / (xf.ln() - 1.0)
}

fn pi_deleglise_rivat_impl<T: CountInt, F: FactorEntry>(x: T, threads: usize) -> T {
    if x < from_i64(SMALL_X) {
        return from_i64(pi_small(to_i64(x)));
    }

    let x13 = to_i64(iroot::<3, T>(x));
    let sqrtx = to_i64(isqrt(x));
    let y = ((get_alpha(x) * x13 as f64) as i64).clamp(x13, sqrtx);
    let z = to_i64(x / from_i64(y));
    let c = get_c(y);

    log::info!(
        "deleglise-rivat: x = {}, y = {}, z = {}, c = {}, threads = {}",
        x,
        y,
        z,
        c,
        threads
    );

    let table_max = y.max(isqrt(z)).max(2);
    let pi = PiTable::new(table_max);
    let primes = generate_primes(table_max);
    let pi_y = pi.pi(y);
    let factors = FactorTable::<F>::new(y);

    let s1 = s1(x, y, c, &primes, threads);
    let p2 = p2(x, y, threads);
    let s2_trivial = s2_trivial(x, y, z, c, &pi, &primes);
    let s2_easy = s2_easy(x, y, z, c, &pi, &primes, threads);

    // pi(x) ~ s1 + s2 + pi(y) - 1 - p2, solved for the remaining s2 part.
    let s2_approx = T::from(pi_approx(x))
        .map(|approx| approx - s1 - s2_trivial - s2_easy - from_i64(pi_y - 1) + p2)
        .filter(|approx| *approx > T::zero())
        .unwrap_or_else(T::zero);

    let s2_sieve = s2_sieve(x, y, z, c, s2_approx, &pi, &primes, &factors, threads);

    log::debug!(
        "s1 = {}, s2_trivial = {}, s2_easy = {}, s2_sieve = {}, p2 = {}",
        s1,
        s2_trivial,
        s2_easy,
        s2_sieve,
        p2
    );

    s1 + s2_trivial + s2_easy + s2_sieve + from_i64(pi_y - 1) - p2
}

/// pi(x) via the Deleglise-Rivat algorithm, the fastest method here.
pub fn pi_deleglise_rivat(x: i64, threads: usize) -> i64 {
    pi_deleglise_rivat_impl::<i64, u16>(x, threads)
}

/// 128-bit Deleglise-Rivat for x past 2^63. The factor table widens to
/// u32 entries along with y.
pub fn pi_deleglise_rivat_128(x: i128, threads: usize) -> i128 {
    assert!(x <= MAX_X_128, "x = {} exceeds the supported range", x);
    if let Ok(x64) = i64::try_from(x) {
        return pi_deleglise_rivat(x64, threads) as i128;
    }
    pi_deleglise_rivat_impl::<i128, u32>(x, threads)
}

/// pi(x) with the default method.
pub fn pi(x: i64, threads: usize) -> i64 {
    pi_deleglise_rivat(x, threads)
}

/// pi(x) for inputs up to [`MAX_X_128`].
pub fn pi128(x: i128, threads: usize) -> i128 {
    pi_deleglise_rivat_128(x, threads)
}
