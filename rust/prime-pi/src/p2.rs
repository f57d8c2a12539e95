//! P2(x, y): the prime-pair term.
//!
//! Counts the integers <= x with exactly two prime factors, both larger
//! than y: sum over primes y < p <= sqrt(x) of pi(x / p) - pi(p) + 1.
//! The pi(x / p) values reach up to x / y, far past any table we want to
//! keep, so they are recovered from a sweep of the 30-wheel sieve over
//! [boundary, x / p_min]: first a parallel pass counts the primes in each
//! chunk, a prefix sum turns the counts into pi() bases, then a second
//! parallel pass re-sieves just the chunks that contain query points.

use rayon::prelude::*;

use crate::arith::{ceil_div, from_i64, isqrt, to_i64, CountInt};
use crate::primes::{generate_primes, PiTable};
use crate::sieve::Sieve;

/// A pi() query point: resolve pi(threshold) for the term of prime index b.
#[derive(Clone, Copy)]
struct Query {
    threshold: i64,
    b: i64,
}

/// Count the primes in [lo, t] for each query, given that every prime
/// factor of a composite in [lo, hi) is below lo.
fn sieve_chunk(lo: i64, hi: i64, chunk_size: u64, sieving_primes: &[i64]) -> Sieve {
    let mut sieve = Sieve::new(lo as u64, chunk_size, sieving_primes.len() + 8);
    sieve.pre_sieve(4, lo as u64, hi as u64);
    for (i, &p) in sieving_primes.iter().enumerate().skip(5) {
        if p * p >= hi {
            break;
        }
        sieve.cross_off(i as u64, p as u64);
    }
    sieve
}

/// P2(x, y): pairs p * q <= x with y < p <= q, both prime.
pub fn p2<T: CountInt>(x: T, y: i64, threads: usize) -> T {
    let sqrtx = to_i64(isqrt(x));
    if y >= sqrtx || x < from_i64(4) {
        return T::zero();
    }

    let primes = generate_primes(sqrtx);
    let pi_y = primes[1..].partition_point(|&p| p <= y) as i64;

    // pi(t) query points, ascending in t as the prime descends.
    let mut queries: Vec<Query> = Vec::new();
    for b in (pi_y + 1)..primes.len() as i64 {
        let p = primes[b as usize];
        queries.push(Query {
            threshold: to_i64(x / from_i64::<T>(p)),
            b,
        });
    }
    queries.reverse();
    debug_assert!(queries.windows(2).all(|w| w[0].threshold <= w[1].threshold));

    let sweep_end = queries.last().map(|q| q.threshold + 1).unwrap_or(0);
    let z = to_i64(x / from_i64::<T>(y));

    // Everything below the boundary is answered by a plain table; the
    // boundary also covers every sieving prime the sweep needs.
    let boundary = {
        let b = isqrt(z) + 1;
        ceil_div(b, 30) * 30
    };
    let base_pi = PiTable::new(boundary.max(2));

    let mut sum = 0i64;
    let mut remaining: Vec<Query> = Vec::new();
    for q in queries {
        if q.threshold < boundary {
            sum += base_pi.pi(q.threshold) - (q.b - 1);
        } else {
            remaining.push(q);
        }
    }

    if !remaining.is_empty() {
        let chunk_size = Sieve::align_segment_size((isqrt(z) as u64).max(1 << 16));
        let num_chunks = ceil_div(sweep_end - boundary, chunk_size as i64);
        let sieving_primes: Vec<i64> = primes
            .iter()
            .copied()
            .take_while(|&p| p * p < sweep_end)
            .collect();

        let chunk_bounds = |k: i64| {
            let lo = boundary + k * chunk_size as i64;
            let hi = (lo + chunk_size as i64).min(sweep_end);
            (lo, hi)
        };

        // Pass 1: primes per chunk.
        let count_chunk = |k: &i64| {
            let (lo, hi) = chunk_bounds(*k);
            let sieve = sieve_chunk(lo, hi, chunk_size, &sieving_primes);
            sieve.count(0, (hi - lo - 1) as u64) as i64
        };
        let chunk_ids: Vec<i64> = (0..num_chunks).collect();
        let counts: Vec<i64> = if threads > 1 {
            chunk_ids.par_iter().map(count_chunk).collect()
        } else {
            chunk_ids.iter().map(count_chunk).collect()
        };

        // pi() at each chunk start.
        let mut pi_base = Vec::with_capacity(num_chunks as usize);
        let mut running = base_pi.pi(boundary - 1);
        for &count in &counts {
            pi_base.push(running);
            running += count;
        }

        // Pass 2: re-sieve the chunks that contain query points.
        let mut per_chunk: Vec<(i64, Vec<Query>)> = Vec::new();
        for q in remaining {
            let k = (q.threshold - boundary) / chunk_size as i64;
            match per_chunk.last_mut() {
                Some((last, qs)) if *last == k => qs.push(q),
                _ => per_chunk.push((k, vec![q])),
            }
        }

        let resolve = |(k, qs): &(i64, Vec<Query>)| {
            let (lo, hi) = chunk_bounds(*k);
            let sieve = sieve_chunk(lo, hi, chunk_size, &sieving_primes);
            let mut sum = 0i64;
            for q in qs {
                let pi_t = pi_base[*k as usize] + sieve.count(0, (q.threshold - lo) as u64) as i64;
                sum += pi_t - (q.b - 1);
            }
            sum
        };
        sum += if threads > 1 {
            per_chunk.par_iter().map(resolve).sum::<i64>()
        } else {
            per_chunk.iter().map(resolve).sum::<i64>()
        };
    }

    from_i64(sum)
}

/// Lehmer's variant: the pair term taken above prime(a).
pub fn p2_lehmer<T: CountInt>(x: T, a: i64, threads: usize) -> T {
    let primes = crate::primes::generate_n_primes(a as usize + 1);
    p2(x, primes[a as usize], threads)
}
