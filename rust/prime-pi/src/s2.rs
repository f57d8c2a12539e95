//! Special leaves of the Deleglise-Rivat decomposition.
//!
//! S2(x, y) = -sum of mu(m) * phi(x / (prime(b) * m), b - 1) over the
//! leaves prime(b) < m <= y with mu(m) != 0, lpf(m) > prime(b), c < b.
//! The leaves split three ways by how phi is recovered:
//!
//! * trivial: phi = 1 outright (`s2_trivial`),
//! * easy:    phi = pi(x/n) - b + 2 via one table lookup (`s2_easy`),
//! * sieve:   phi must be counted in a segmented sieve of [1, z]
//!            (`s2_sieve`), the expensive part.
//!
//! The sieve stage is the parallel workhorse: each thread owns a stretch
//! of segments and counts live elements with a bit sieve plus Fenwick
//! counters. A thread only knows the phi contribution of its own stretch;
//! the missing prefix from earlier stretches is reconstructed after the
//! join in a strictly serial carry-over pass (phi_total), which is what
//! keeps the result independent of the thread count.

use std::time::Instant;

use rayon::prelude::*;

use crate::arith::{ceil_div, from_i64, isqrt, to_i64, CountInt};
use crate::bit_sieve::BitSieve;
use crate::counters::Counters;
use crate::factor_table::{FactorEntry, FactorTable};
use crate::load_balancer::S2LoadBalancer;
use crate::primes::PiTable;

/// Leaves with phi(x / n, b - 1) = 1: m must be a prime in
/// (max(x / prime^2, prime), y], so a pi() difference counts them all.
pub fn s2_trivial<T: CountInt>(x: T, y: i64, z: i64, c: i64, pi: &PiTable, primes: &[i64]) -> T {
    let pi_y = pi.pi(y);
    let sqrtz = isqrt(z);
    let mut s2 = 0i64;

    for b in (pi.pi(sqrtz).max(c) + 1)..=pi_y {
        let prime = primes[b as usize];
        let wide_p = from_i64::<T>(prime);
        let xn = to_i64(x / (wide_p * wide_p));
        let threshold = xn.max(prime);
        if threshold < y {
            s2 += pi_y - pi.pi(threshold);
        }
    }

    from_i64(s2)
}

/// Leaves with prime(b) > sqrt(z) that are not trivial: m is a prime q
/// with x / (prime * q) < y, so phi(x / n, b - 1) = pi(x / n) - b + 2.
pub fn s2_easy<T: CountInt>(
    x: T,
    y: i64,
    z: i64,
    c: i64,
    pi: &PiTable,
    primes: &[i64],
    threads: usize,
) -> T {
    let pi_y = pi.pi(y);
    let sqrtz = isqrt(z);
    let start = pi.pi(sqrtz).max(c) + 1;

    let leaves_for_b = |b: i64| {
        let prime = primes[b as usize];
        let wide_p = from_i64::<T>(prime);
        let min_trivial = to_i64(x / (wide_p * wide_p)).min(y);
        let mut l = pi.pi(min_trivial);
        let mut sum = 0i64;
        while primes[l as usize] > prime {
            let xn = to_i64(x / (wide_p * from_i64(primes[l as usize])));
            sum += pi.pi(xn) - b + 2;
            l -= 1;
        }
        sum
    };

    let indices: Vec<i64> = (start..=pi_y).collect();
    let total: i64 = if threads > 1 {
        indices.par_iter().map(|&b| leaves_for_b(b)).sum()
    } else {
        indices.iter().map(|&b| leaves_for_b(b)).sum()
    };

    from_i64(total)
}

/// For each sieving prime, its first odd multiple >= low.
fn generate_next_multiples(low: i64, size: i64, primes: &[i64]) -> Vec<i64> {
    let mut next = Vec::with_capacity(size as usize);
    next.push(0);
    for b in 1..size {
        let prime = primes[b as usize];
        let mut multiple = ceil_div(low, prime) * prime;
        multiple += prime * (!multiple & 1);
        next.push(multiple);
    }
    next
}

/// Cross off the odd multiples of prime in [low, high). Unsetting a live
/// bit and decrementing its counter are one operation: the counters must
/// never drift from the sieve.
fn cross_off(
    prime: i64,
    low: i64,
    high: i64,
    next_multiple: &mut i64,
    sieve: &mut BitSieve,
    counters: &mut Counters,
) {
    let mut k = *next_multiple;
    while k < high {
        let pos = (k - low) as usize;
        if sieve.get(pos) {
            sieve.unset(pos);
            counters.decrement(pos);
        }
        k += prime * 2;
    }
    *next_multiple = k;
}

/// One thread's share of the sieve stage: segments
/// [low + S*K*t, low + S*K*(t+1)) intersected with [low, limit).
///
/// Returns the thread's S2 contribution computed as if phi were zero at
/// the start of its stretch; `phi` and `mu_sum` let the orchestrator add
/// the missing cross-thread prefix afterwards.
#[allow(clippy::too_many_arguments)]
fn s2_sieve_thread<T: CountInt, F: FactorEntry>(
    x: T,
    y: i64,
    z: i64,
    c: i64,
    segment_size: i64,
    segments_per_thread: i64,
    thread_num: i64,
    low: i64,
    limit: i64,
    factors: &FactorTable<F>,
    pi: &PiTable,
    primes: &[i64],
    mu_sum: &mut Vec<i64>,
    phi: &mut Vec<i64>,
) -> T {
    let mut low = low + segment_size * segments_per_thread * thread_num;
    let limit = (low + segment_size * segments_per_thread).min(limit);
    let pi_sqrty = pi.pi(isqrt(y));
    let max_prime = to_i64(isqrt(x / from_i64::<T>(low))).min(y).min(isqrt(z));
    let pi_max = pi.pi(max_prime);
    let mut s2_thread = T::zero();

    let mut sieve = BitSieve::new(segment_size as usize);
    let mut counters = Counters::new(segment_size as usize);
    let mut next = generate_next_multiples(low, pi_max + 1, primes);
    phi.resize((pi_max + 1) as usize, 0);
    mu_sum.resize((pi_max + 1) as usize, 0);

    while low < limit {
        let high = (low + segment_size).min(limit);
        let mut b = c + 1;

        if c <= pi_max {
            sieve.fill(low);

            // phi(x / n, i) nodes with i <= c never contribute to S2;
            // the multiples of the first c primes are simply removed.
            for i in 2..=c as usize {
                let prime = primes[i];
                let mut k = next[i];
                while k < high {
                    sieve.unset((k - low) as usize);
                    k += prime * 2;
                }
                next[i] = k;
            }

            counters.init(&sieve);
        }

        'segment: {
            // c < b <= pi(sqrt(y)): leaves n = prime(b) * m with
            // mu(m) != 0 and prime(b) < lpf(m), low <= x / n < high.
            let end = pi_sqrty.min(pi_max);
            while b <= end {
                let prime = primes[b as usize];
                let wide_p = from_i64::<T>(prime);
                let min_m = to_i64(x / (wide_p * from_i64(high))).min(y).max(y / prime);
                let max_m = to_i64(x / (wide_p * from_i64(low))).min(y);

                if prime >= max_m {
                    break 'segment;
                }

                let mut min_m = min_m;
                let mut max_m = max_m;
                factors.to_index(&mut min_m);
                factors.to_index(&mut max_m);

                let mut m = max_m;
                while m > min_m {
                    if prime < factors.lpf(m) {
                        let n = prime * factors.get_number(m);
                        let xn = to_i64(x / from_i64::<T>(n));
                        let phi_xn = phi[b as usize] + counters.query((xn - low) as usize);
                        let mu_m = factors.mu(m);
                        s2_thread = s2_thread - from_i64::<T>(mu_m * phi_xn);
                        mu_sum[b as usize] -= mu_m;
                    }
                    m -= 1;
                }

                phi[b as usize] += counters.query((high - 1 - low) as usize);
                cross_off(prime, low, high, &mut next[b as usize], &mut sieve, &mut counters);
                b += 1;
            }

            // pi(sqrt(y)) < b <= pi(max_prime): hard leaves
            // n = prime(b) * prime(l), both factors prime.
            while b <= pi_max {
                let prime = primes[b as usize];
                let wide_p = from_i64::<T>(prime);
                let mut l =
                    pi.pi(to_i64(x / (wide_p * from_i64(low))).min(y).min(z / prime));
                let min_hard = to_i64(x / (wide_p * from_i64(high)))
                    .min(y)
                    .max(y / prime)
                    .max(prime);

                if prime >= primes[l as usize] {
                    break 'segment;
                }

                while primes[l as usize] > min_hard {
                    let n = prime * primes[l as usize];
                    let xn = to_i64(x / from_i64::<T>(n));
                    let phi_xn = phi[b as usize] + counters.query((xn - low) as usize);
                    s2_thread = s2_thread + from_i64::<T>(phi_xn);
                    mu_sum[b as usize] += 1;
                    l -= 1;
                }

                phi[b as usize] += counters.query((high - 1 - low) as usize);
                cross_off(prime, low, high, &mut next[b as usize], &mut sieve, &mut counters);
                b += 1;
            }
        }

        low += segment_size;
    }

    s2_thread
}

/// The sieve stage of S2, parallel with adaptive load balancing.
///
/// `s2_approx` is only used for progress logging.
#[allow(clippy::too_many_arguments)]
pub fn s2_sieve<T: CountInt, F: FactorEntry>(
    x: T,
    y: i64,
    z: i64,
    c: i64,
    s2_approx: T,
    pi: &PiTable,
    primes: &[i64],
    factors: &FactorTable<F>,
    threads: usize,
) -> T {
    let mut s2 = T::zero();
    let mut low = 1i64;
    let limit = z + 1;

    let mut balancer = S2LoadBalancer::new(limit);
    let mut segment_size = balancer.min_segment_size();
    let mut segments_per_thread = 1i64;
    let mut phi_total = vec![0i64; (pi.pi(isqrt(z).min(y)) + 1) as usize];

    while low < limit {
        let segments = ceil_div(limit - low, segment_size);
        let threads_now = (threads as i64).clamp(1, segments) as usize;
        segments_per_thread =
            segments_per_thread.clamp(1, ceil_div(segments, threads_now as i64));

        let worker = |t: i64| {
            let clock = Instant::now();
            let mut phi = Vec::new();
            let mut mu_sum = Vec::new();
            let s2_part = s2_sieve_thread(
                x, y, z, c, segment_size, segments_per_thread, t, low, limit, factors, pi,
                primes, &mut mu_sum, &mut phi,
            );
            (s2_part, phi, mu_sum, clock.elapsed().as_secs_f64())
        };
        let ids: Vec<i64> = (0..threads_now as i64).collect();
        let results: Vec<(T, Vec<i64>, Vec<i64>, f64)> = if threads_now > 1 {
            ids.par_iter().map(|&t| worker(t)).collect()
        } else {
            ids.iter().map(|&t| worker(t)).collect()
        };

        let mut timings = Vec::with_capacity(results.len());
        for (s2_part, _, _, seconds) in &results {
            s2 = s2 + *s2_part;
            timings.push(*seconds);
        }

        // Reconstruct the missing phi prefix of every thread. Thread t
        // needs the phi sums of threads 0..t, so this runs in thread
        // order; it is the only serial section of an iteration.
        for (_, phi, mu_sum, _) in &results {
            for j in 1..phi.len() {
                s2 = s2 + from_i64::<T>(phi_total[j]) * from_i64::<T>(mu_sum[j]);
                phi_total[j] += phi[j];
            }
        }

        low += segments_per_thread * threads_now as i64 * segment_size;
        balancer.update(low, &mut segment_size, &mut segments_per_thread, &timings);

        if s2_approx > T::zero() {
            log::debug!(
                "s2_sieve: {:.1}% of approx",
                (s2.to_f64().unwrap_or(0.0) / s2_approx.to_f64().unwrap_or(1.0)) * 100.0
            );
        }
    }

    s2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phi_tiny::get_c;
    use crate::primes::generate_primes;

    fn reference_mu(mut n: i64) -> i64 {
        let mut factors = 0;
        let mut p = 2;
        while p * p <= n {
            if n % p == 0 {
                n /= p;
                if n % p == 0 {
                    return 0;
                }
                factors += 1;
            }
            p += 1;
        }
        if n > 1 {
            factors += 1;
        }
        if factors % 2 == 0 {
            1
        } else {
            -1
        }
    }

    fn reference_lpf(n: i64) -> i64 {
        if n == 1 {
            return i64::MAX;
        }
        let mut p = 2;
        while p * p <= n {
            if n % p == 0 {
                return p;
            }
            p += 1;
        }
        n
    }

    fn phi_reference(x: i64, a: i64, primes: &[i64]) -> i64 {
        (1..=x)
            .filter(|&n| primes[1..=(a as usize).min(primes.len() - 1)].iter().all(|&p| n % p != 0))
            .count() as i64
    }

    /// Direct S2 over all leaves (every variety), for small x: special
    /// leaves are m <= y < prime * m with mu(m) != 0, lpf(m) > prime.
    fn s2_reference(x: i64, y: i64, c: i64, primes: &[i64]) -> i64 {
        let pi = PiTable::new(y.max(2));
        let pi_y = pi.pi(y);
        let mut sum = 0;
        for b in (c + 1)..=pi_y {
            let prime = primes[b as usize];
            for m in (y / prime + 1)..=y {
                if reference_mu(m) != 0 && reference_lpf(m) > prime {
                    sum -= reference_mu(m) * phi_reference(x / (prime * m), b - 1, primes);
                }
            }
        }
        sum
    }

    /// S2 assembled from the three stages must equal the direct sum.
    fn s2_all(x: i64, y: i64, threads: usize) -> i64 {
        let z = x / y;
        let c = get_c(y);
        let table_max = y.max(isqrt(z)).max(2);
        let pi = PiTable::new(table_max);
        let primes = generate_primes(table_max);
        let factors = FactorTable::<u16>::new(y);
        s2_trivial(x, y, z, c, &pi, &primes)
            + s2_easy(x, y, z, c, &pi, &primes, threads)
            + s2_sieve(x, y, z, c, 0, &pi, &primes, &factors, threads)
    }

    #[test]
    fn stages_sum_to_direct_enumeration() {
        let primes = generate_primes(2_000);
        for (x, y) in [(10_000i64, 30i64), (100_000, 60), (1_000_000, 100), (300_000, 80)] {
            let c = get_c(y);
            let expected = s2_reference(x, y, c, &primes);
            assert_eq!(s2_all(x, y, 1), expected, "s2({}, {})", x, y);
        }
    }

    #[test]
    fn thread_count_invariance() {
        let x = 1_000_000i64;
        let y = 100;
        let single = s2_all(x, y, 1);
        for threads in [2, 4, 8] {
            assert_eq!(s2_all(x, y, threads), single, "threads = {}", threads);
        }
    }

    #[test]
    fn wide_integer_agrees() {
        let (x, y) = (1_000_000i64, 100i64);
        let z = x / y;
        let c = get_c(y);
        let table_max = y.max(isqrt(z)).max(2);
        let pi = PiTable::new(table_max);
        let primes = generate_primes(table_max);
        let narrow = FactorTable::<u16>::new(y);
        let wide = FactorTable::<u32>::new(y);
        let s64 = s2_sieve(x, y, z, c, 0, &pi, &primes, &narrow, 2);
        let s128 = s2_sieve(x as i128, y, z, c, 0, &pi, &primes, &wide, 2);
        assert_eq!(s128, s64 as i128);
    }
}
