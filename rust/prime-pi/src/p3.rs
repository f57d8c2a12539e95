//! P3(x, a): the triple-prime-product term of Lehmer's formula.
//!
//! Counts the integers <= x with exactly three prime factors, all larger
//! than prime(a): sum over a < i <= pi(x^(1/3)), i <= j <= pi(sqrt(x/p_i))
//! of pi(x / (p_i * p_j)) - j + 1. With a = pi(x^(1/4)) every pi argument
//! is at most sqrt(x), so one pi table covers the whole sum.

use rayon::prelude::*;

use crate::arith::{from_i64, iroot, isqrt, to_i64, CountInt};
use crate::primes::{generate_primes, PiTable};

pub fn p3<T: CountInt>(x: T, a: i64, threads: usize) -> T {
    if x < from_i64(8) {
        return T::zero();
    }

    let sqrtx = to_i64(isqrt(x));
    let x13 = to_i64(iroot::<3, T>(x));
    let pi = PiTable::new(sqrtx.max(2));
    let primes = generate_primes(sqrtx.max(2));
    let max_i = pi.pi(x13);

    let sum_for_i = |i: i64| {
        let pi_prime = primes[i as usize];
        let xi = x / from_i64::<T>(pi_prime);
        let max_j = pi.pi(to_i64(isqrt(xi)));
        let mut sum = 0i64;
        for j in i..=max_j {
            let xij = to_i64(xi / from_i64::<T>(primes[j as usize]));
            sum += pi.pi(xij) - j + 1;
        }
        sum
    };

    let indices: Vec<i64> = (a + 1..=max_i).collect();
    let total: i64 = if threads > 1 {
        indices.par_iter().map(|&i| sum_for_i(i)).sum()
    } else {
        indices.iter().map(|&i| sum_for_i(i)).sum()
    };

    from_i64(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Brute force: integers n <= x that are products of exactly three
    /// primes (with multiplicity), each > prime(a).
    fn p3_reference(x: i64, a: i64) -> i64 {
        let primes = generate_primes(x / 4 + 1);
        let plist = &primes[(a + 1) as usize..];
        let mut count = 0;
        for (i, &p) in plist.iter().enumerate() {
            if p * p * p > x {
                break;
            }
            for (j, &q) in plist[i..].iter().enumerate() {
                if p * q * q > x {
                    break;
                }
                for &r in &plist[i + j..] {
                    if p * q * r > x {
                        break;
                    }
                    count += 1;
                }
            }
        }
        count
    }

    #[test]
    fn matches_brute_force() {
        // a >= pi(x^(1/4)) keeps every pi argument within the table.
        for (x, a) in [(1_000i64, 3i64), (10_000, 4), (100_000, 7), (30_000, 6)] {
            let expected = p3_reference(x, a);
            assert_eq!(p3(x, a, 1), expected, "p3({}, {})", x, a);
            assert_eq!(p3(x, a, 4), expected, "parallel p3({}, {})", x, a);
        }
    }

    #[test]
    fn empty_below_smallest_product() {
        assert_eq!(p3(7i64, 1, 1), 0);
        assert_eq!(p3(1_000i64, 25, 1), 0);
    }
}
