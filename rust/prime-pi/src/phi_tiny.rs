//! Closed-form phi(x, a) for a <= 7.
//!
//! phi(x, a) is periodic in x with period pp = 2 * 3 * ... * prime(a) (the
//! a-th primorial): phi(x, a) = (x / pp) * totient(pp) + phi(x mod pp, a).
//! For the first 7 primes the residue tables are small enough to precompute
//! once and share, which turns the recursion tail of the Legendre sum into a
//! table lookup.

use std::sync::OnceLock;

use crate::arith::{from_i64, to_i64, CountInt};

/// Largest a handled by the closed form.
pub const MAX_A: i64 = 7;

/// The first MAX_A primes, 1-based.
const TINY_PRIMES: [i64; 8] = [0, 2, 3, 5, 7, 11, 13, 17];

/// Primorials: PRIMORIALS[a] = 2 * 3 * ... * TINY_PRIMES[a].
const PRIMORIALS: [i64; 8] = [1, 2, 6, 30, 210, 2310, 30_030, 510_510];

/// Euler totients of the primorials.
const TOTIENTS: [i64; 8] = [1, 1, 2, 8, 48, 480, 5760, 92_160];

struct PhiTiny {
    /// tables[a][r] = phi(r, a) for 0 <= r < PRIMORIALS[a].
    tables: Vec<Vec<u32>>,
}

impl PhiTiny {
    fn new() -> PhiTiny {
        let mut tables = Vec::with_capacity(MAX_A as usize + 1);
        for a in 0..=MAX_A as usize {
            let pp = PRIMORIALS[a] as usize;
            let mut coprime = vec![true; pp];
            for &p in &TINY_PRIMES[1..=a] {
                let mut k = 0;
                while k < pp {
                    coprime[k] = false;
                    k += p as usize;
                }
            }
            // coprime[0] counts as 0: phi counts integers in [1, x].
            coprime[0] = false;
            let mut table = Vec::with_capacity(pp);
            let mut count = 0u32;
            for &c in coprime.iter() {
                count += c as u32;
                table.push(count);
            }
            tables.push(table);
        }
        PhiTiny { tables }
    }

    #[inline]
    fn phi<T: CountInt>(&self, x: T, a: i64) -> T {
        debug_assert!((0..=MAX_A).contains(&a));
        let pp = from_i64::<T>(PRIMORIALS[a as usize]);
        let totient = from_i64::<T>(TOTIENTS[a as usize]);
        let remainder = to_i64(x % pp) as usize;
        (x / pp) * totient + from_i64(self.tables[a as usize][remainder] as i64)
    }
}

fn instance() -> &'static PhiTiny {
    static INSTANCE: OnceLock<PhiTiny> = OnceLock::new();
    INSTANCE.get_or_init(PhiTiny::new)
}

/// Whether phi(x, a) has a closed form.
#[inline]
pub fn is_phi_tiny(a: i64) -> bool {
    (0..=MAX_A).contains(&a)
}

/// phi(x, a) for a <= 7: the count of integers in [1, x] coprime
/// to the first a primes.
#[inline]
pub fn phi_tiny<T: CountInt>(x: T, a: i64) -> T {
    if x <= T::zero() {
        return T::zero();
    }
    instance().phi(x, a)
}

/// The truncation depth c used by the recursive stages: the number of
/// tiny primes <= y, i.e. the largest a <= MAX_A with prime(a) <= y.
pub fn get_c(y: i64) -> i64 {
    TINY_PRIMES[1..]
        .iter()
        .take_while(|&&p| p <= y)
        .count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Incremental reference: counts integers in [1, x] coprime to the
    /// first a primes, for all a at once.
    fn check_against_direct_count(limit: i64) {
        let mut counts = [0i64; 8];
        for x in 1..=limit {
            for (a, count) in counts.iter_mut().enumerate() {
                if TINY_PRIMES[1..=a].iter().all(|&p| x % p != 0) {
                    *count += 1;
                }
            }
            // Checking every x is wasteful; boundaries and a sample suffice.
            if x % 997 == 0 || x < 600 {
                for (a, &count) in counts.iter().enumerate() {
                    assert_eq!(
                        phi_tiny(x, a as i64),
                        count,
                        "phi_tiny({}, {})",
                        x,
                        a
                    );
                }
            }
        }
    }

    #[test]
    fn agrees_with_direct_sieving() {
        check_against_direct_count(100_000);
    }

    #[test]
    fn known_value_a5() {
        // Integers in [1, 1e6] coprime to 2, 3, 5, 7, 11.
        assert_eq!(phi_tiny(1_000_000i64, 5), 181_464);
    }

    #[test]
    fn small_arguments() {
        assert_eq!(phi_tiny(0i64, 3), 0);
        assert_eq!(phi_tiny(1i64, 7), 1);
        assert_eq!(phi_tiny(10i64, 0), 10);
        assert_eq!(phi_tiny(10i64, 1), 5);
        assert_eq!(phi_tiny(30i64, 3), 8);
    }

    #[test]
    fn wide_arguments() {
        let x = 10i128.pow(24);
        let pp = PRIMORIALS[7] as i128;
        let expected = (x / pp) * TOTIENTS[7] as i128 + phi_tiny(x % pp, 7);
        assert_eq!(phi_tiny(x, 7), expected);
    }

    #[test]
    fn c_depth() {
        assert_eq!(get_c(1), 0);
        assert_eq!(get_c(2), 1);
        assert_eq!(get_c(10), 4);
        assert_eq!(get_c(16), 6);
        assert_eq!(get_c(17), 7);
        assert_eq!(get_c(1_000_000), 7);
    }
}
