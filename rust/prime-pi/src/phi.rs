//! The partial sieve function phi(x, a).
//!
//! phi(x, a) counts the integers in [1, x] not divisible by any of the
//! first a primes, via the recurrence
//! phi(x, a) = phi(x, a - 1) - phi(x / prime(a), a - 1).
//! The recursion is cut short four ways: closed form for a <= 7
//! (`phi_tiny`), a pi(x) lookup once x < prime(a + 1)^2, a memo cache for
//! small (x, a), and the observation that every term with i >= pi(sqrt(x))
//! contributes exactly 1, which lifts a whole tail of the loop into one
//! multiplication.
//!
//! The recursion alternates signs. Instead of negating on the way back up,
//! the direction is a compile-time parameter: `phi::<true>` returns
//! +phi(x, a), `phi::<false>` returns -phi(x, a), and each instantiation
//! recurses into the other. (Stable Rust cannot negate a const generic in
//! the recursive call, so the +/-1 pair is spelled as a bool.)

use rayon::prelude::*;

use crate::arith::isqrt;
use crate::phi_tiny::{get_c, is_phi_tiny, phi_tiny};
use crate::primes::PiTable;

/// phi(x, a) results are cached for a < MAX_A and x <= u16::MAX.
const MAX_A: usize = 100;

/// Inputs of at least this size get the parallel phi vector.
const THREAD_THRESHOLD: i64 = 10_000_000_000;

/// Memoized phi(x, a) recursion.
///
/// One instance per thread: the cache is not shared.
pub struct PhiCache<'a> {
    /// cache[a][x] = |phi(x, a)|; 0 means absent (phi is positive for
    /// every admitted input, so no valid entry collides with the marker).
    cache: Vec<Vec<u16>>,
    primes: &'a [i64],
    pi: &'a PiTable,
}

impl<'a> PhiCache<'a> {
    pub fn new(primes: &'a [i64], pi: &'a PiTable) -> PhiCache<'a> {
        PhiCache {
            cache: vec![Vec::new(); MAX_A],
            primes,
            pi,
        }
    }

    /// FORWARD: +phi(x, a); !FORWARD: -phi(x, a).
    pub fn phi<const FORWARD: bool>(&mut self, x: i64, a: i64) -> i64 {
        let sign: i64 = if FORWARD { 1 } else { -1 };

        if x <= self.prime(a) {
            return sign;
        } else if is_phi_tiny(a) {
            return phi_tiny(x, a) * sign;
        } else if self.is_pix(x, a) {
            return (self.pi.pi(x) - a + 1) * sign;
        } else if let Some(cached) = self.lookup(x, a) {
            return cached * sign;
        }

        let sqrtx = isqrt(x);
        let c = get_c(sqrtx);
        let mut pi_sqrtx = a;
        if sqrtx < self.pi.len() && sqrtx < self.prime(a) {
            pi_sqrtx = self.pi.pi(sqrtx);
        }

        // Every term with i >= pi(sqrt(x)) has phi(x / prime(i+1), i) = 1;
        // the whole tail collapses to (pi_sqrtx - a) * sign. phi_tiny seeds
        // the closed-form prefix below c.
        let mut sum = (pi_sqrtx - a) * sign;
        sum += phi_tiny(x, c) * sign;

        for i in c..pi_sqrtx {
            let x2 = x / self.prime(i + 1);
            if self.is_pix(x2, i) {
                sum += (self.pi.pi(x2) - i + 1) * -sign;
            } else if FORWARD {
                sum += self.phi::<false>(x2, i);
            } else {
                sum += self.phi::<true>(x2, i);
            }
        }

        self.update_cache(x, a, sum);
        sum
    }

    #[inline]
    fn prime(&self, i: i64) -> i64 {
        self.primes[i as usize]
    }

    /// phi(x, a) = pi(x) - a + 1 once x < prime(a + 1)^2, provided the
    /// pi table reaches x.
    #[inline]
    fn is_pix(&self, x: i64, a: i64) -> bool {
        let p = self.prime(a + 1);
        x < self.pi.len() && x < p * p
    }

    #[inline]
    fn lookup(&self, x: i64, a: i64) -> Option<i64> {
        let a = a as usize;
        if a < self.cache.len() {
            match self.cache[a].get(x as usize) {
                Some(&v) if v != 0 => return Some(v as i64),
                _ => {}
            }
        }
        None
    }

    fn update_cache(&mut self, x: i64, a: i64, sum: i64) {
        let a = a as usize;
        let x = x as usize;
        if a < self.cache.len() && x <= u16::MAX as usize {
            if x >= self.cache[a].len() {
                self.cache[a].resize(x + 1, 0);
            }
            self.cache[a][x] = sum.unsigned_abs() as u16;
        }
    }
}

/// Returns phi[i] = phi(x, i - 1) for c < i <= a (entries at or below the
/// tiny cutoff c are seeded with phi_tiny(x, c - 1), entries past a stay 1
/// when a gets tightened to pi(x)).
///
/// The middle section phi[i] = -phi(x / prime(i-1), i - 2) parallelizes;
/// the closing prefix-sum pass rebuilds the phi(x, i - 1) values serially.
pub fn phi_vector(
    x: i64,
    a: i64,
    primes: &[i64],
    pi: &PiTable,
    threads: usize,
) -> Vec<i64> {
    let size = (a + 1) as usize;
    debug_assert!(size < primes.len());
    let c = get_c(primes[a as usize]);

    // phi(x, i) = 1 for every i >= pi(x).
    let mut a = a;
    if primes[a as usize] > x {
        a = primes[1..].partition_point(|&p| p <= x) as i64;
    }

    let mut phi = vec![if x > 0 { -1 } else { 0 }; (a + 1) as usize];
    phi.resize(size, (x > 0) as i64);

    if x > 0 && a > c {
        for slot in phi[0..=c as usize].iter_mut() {
            *slot = phi_tiny(x, c - 1);
        }

        let mut limit = a;
        let sqrtx = isqrt(x);
        if sqrtx < pi.len() {
            limit = a.min(pi.pi(sqrtx) + 1);
        }

        let threads = crate::arith::ideal_num_threads(threads, x, THREAD_THRESHOLD);
        if threads == 1 {
            let mut cache = PhiCache::new(primes, pi);
            for i in (c + 1)..=limit {
                phi[i as usize] = cache.phi::<false>(x / primes[(i - 1) as usize], i - 2);
            }
        } else {
            // Term costs vary wildly; small chunks keep the stealing
            // fine-grained. The cache is replicated per worker.
            let indices: Vec<i64> = ((c + 1)..=limit).collect();
            let terms: Vec<(i64, i64)> = indices
                .par_iter()
                .with_max_len(16)
                .map_init(
                    || PhiCache::new(primes, pi),
                    |cache, &i| (i, cache.phi::<false>(x / primes[(i - 1) as usize], i - 2)),
                )
                .collect();
            for (i, term) in terms {
                phi[i as usize] = term;
            }
        }

        // phi(x, i - 1) = phi(x, i - 2) - phi(x / prime(i-1), i - 2):
        // a running sum over the partial results. Serial by construction.
        for i in (c + 1)..=a {
            phi[i as usize] += phi[(i - 1) as usize];
        }
    }

    phi
}

/// phi(x, a): the Legendre sum, parallel for large x.
pub fn phi(x: i64, a: i64, threads: usize) -> i64 {
    if x < 1 {
        return 0;
    }
    if is_phi_tiny(a) {
        return phi_tiny(x, a);
    }

    let primes = crate::primes::generate_n_primes((a + 2) as usize);
    let pi = PiTable::new(isqrt(x).max(2));
    let v = phi_vector(x, a + 1, &primes, &pi, threads);
    v[(a + 1) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primes::generate_n_primes;

    /// Direct sieve: count integers in [1, x] coprime to the first a primes.
    fn phi_reference(x: i64, a: i64, primes: &[i64]) -> i64 {
        (1..=x)
            .filter(|&n| primes[1..=(a as usize)].iter().all(|&p| n % p != 0))
            .count() as i64
    }

    #[test]
    fn cache_matches_direct_sieving() {
        let primes = generate_n_primes(40);
        let pi = PiTable::new(10_000);
        let mut cache = PhiCache::new(&primes, &pi);
        for a in 0..=20 {
            for x in [1i64, 2, 10, 99, 100, 1_000, 4_999, 10_000] {
                let expected = phi_reference(x, a, &primes);
                assert_eq!(cache.phi::<true>(x, a), expected, "phi({}, {})", x, a);
                assert_eq!(cache.phi::<false>(x, a), -expected, "-phi({}, {})", x, a);
            }
        }
    }

    #[test]
    fn cache_replay_is_consistent() {
        // A warm cache must answer exactly like a cold one.
        let primes = generate_n_primes(40);
        let pi = PiTable::new(10_000);
        let inputs = [(10_000i64, 15i64), (9_999, 12), (8_000, 20), (10_000, 15)];

        let mut warm = PhiCache::new(&primes, &pi);
        let first: Vec<i64> = inputs.iter().map(|&(x, a)| warm.phi::<true>(x, a)).collect();
        let replay: Vec<i64> = inputs.iter().map(|&(x, a)| warm.phi::<true>(x, a)).collect();
        let cold: Vec<i64> = inputs
            .iter()
            .map(|&(x, a)| PhiCache::new(&primes, &pi).phi::<true>(x, a))
            .collect();
        assert_eq!(first, replay);
        assert_eq!(first, cold);
    }

    #[test]
    fn phi_vector_prefix_sums() {
        let x = 100_000i64;
        let a = 25i64;
        let primes = generate_n_primes(40);
        let pi = PiTable::new(1_000);
        let v = phi_vector(x, a, &primes, &pi, 1);
        assert_eq!(v.len(), (a + 1) as usize);
        // v[i] = phi(x, i - 1) past the tiny cutoff.
        for i in 8..=a {
            let expected = phi_reference(x, i - 1, &primes);
            assert_eq!(v[i as usize], expected, "phi_vector[{}]", i);
        }
    }

    #[test]
    fn phi_entry_point() {
        assert_eq!(phi(1_000_000, 5, 1), 181_464);
        assert_eq!(phi(100, 0, 1), 100);
        assert_eq!(phi(0, 10, 1), 0);
        let primes = generate_n_primes(30);
        for a in [8, 12, 20] {
            assert_eq!(
                phi(50_000, a, 1),
                phi_reference(50_000, a, &primes),
                "phi(50000, {})",
                a
            );
        }
    }

    #[test]
    fn phi_tightens_when_a_exceeds_pi_x() {
        // phi(x, a) = 1 once every prime <= x is excluded.
        assert_eq!(phi(100, 25, 1), 1);
        assert_eq!(phi(100, 80, 1), 1);
    }
}
