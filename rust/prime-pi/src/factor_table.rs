//! Compressed moebius / least-prime-factor table.
//!
//! The S2 stage needs mu(m) and lpf(m) for every m <= y. Storing them only
//! for integers coprime to 2 * 3 * 5 * 7 cuts the table to 48/210 of the
//! naive size, and packing both values into one small integer halves it
//! again. Indices skip the non-wheel residues: `get_number(m)` is the m-th
//! integer coprime to 210 and `to_index` maps an arbitrary n down onto the
//! compressed index space.
//!
//! Entry encoding (width F = u16 for the 64-bit build, u32 for the 128-bit
//! build, mirroring how y grows with x):
//!
//! * 0                      -> mu(n) = 0
//! * top bit                -> mu(n) = +1 (clear -> -1)
//! * remaining bits         -> min(lpf(n), CAP), with lpf(1) = CAP
//!
//! Wheel-coprime n have lpf(n) >= 11, so a live entry is never 0. The cap
//! is unobservable: every consumer compares lpf(m) against a prime <=
//! sqrt(y), and the constructor asserts sqrt(y) < CAP.

use crate::primes::generate_primes;

/// Residues modulo 210 coprime to 2, 3, 5, 7.
const WHEEL_RESIDUES: [i64; 48] = [
    1, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97, 101,
    103, 107, 109, 113, 121, 127, 131, 137, 139, 143, 149, 151, 157, 163, 167, 169, 173, 179, 181,
    187, 191, 193, 197, 199, 209,
];

/// Storage width of one table entry.
pub trait FactorEntry: Copy + Send + Sync + 'static {
    const LPF_BITS: u32;
    fn pack(value: u64) -> Self;
    fn unpack(self) -> u64;
}

impl FactorEntry for u16 {
    const LPF_BITS: u32 = 15;
    #[inline]
    fn pack(value: u64) -> Self {
        value as u16
    }
    #[inline]
    fn unpack(self) -> u64 {
        self as u64
    }
}

impl FactorEntry for u32 {
    const LPF_BITS: u32 = 31;
    #[inline]
    fn pack(value: u64) -> Self {
        value as u32
    }
    #[inline]
    fn unpack(self) -> u64 {
        self as u64
    }
}

/// Compressed (mu, lpf) lookup for the integers in [1, y] coprime to 210.
pub struct FactorTable<F: FactorEntry> {
    entries: Vec<F>,
}

impl<F: FactorEntry> FactorTable<F> {
    const LPF_CAP: u64 = (1 << F::LPF_BITS) - 1;
    const SIGN_BIT: u64 = 1 << F::LPF_BITS;

    pub fn new(y: i64) -> FactorTable<F> {
        assert!(y >= 1);
        let cap = Self::LPF_CAP as i64;
        assert!(
            num_integer::Roots::sqrt(&y) < cap,
            "factor table width too narrow for y = {}",
            y
        );

        let len = (Self::snap_index(y) + 1) as usize;
        let mut sign = vec![1i8; len];
        let mut squareful = vec![false; len];
        let mut lpf = vec![0i64; len];

        // Only primes >= 11 divide a wheel-coprime integer, and the
        // wheel-coprime multiples of p are exactly p * get_number(k).
        let primes = generate_primes(y);
        for &p in primes.iter().skip(1).filter(|&&p| p >= 11) {
            let mut k = 0;
            loop {
                let n = p * Self::get_number_at(k);
                if n > y {
                    break;
                }
                let m = Self::exact_index(n) as usize;
                sign[m] = -sign[m];
                if lpf[m] == 0 {
                    lpf[m] = p;
                }
                k += 1;
            }
            if p <= y / p {
                let pp = p * p;
                let mut k = 0;
                loop {
                    let n = pp * Self::get_number_at(k);
                    if n > y {
                        break;
                    }
                    squareful[Self::exact_index(n) as usize] = true;
                    k += 1;
                }
            }
        }

        let mut entries = Vec::with_capacity(len);
        for m in 0..len {
            let value = if squareful[m] {
                0
            } else {
                // m == 0 is the integer 1: mu = +1, lpf capped at infinity.
                let lpf = if lpf[m] == 0 { Self::LPF_CAP } else { (lpf[m] as u64).min(Self::LPF_CAP) };
                let sign_bit = if sign[m] > 0 { Self::SIGN_BIT } else { 0 };
                sign_bit | lpf
            };
            entries.push(F::pack(value));
        }

        log::debug!(
            "FactorTable: y = {}, {} entries, {} KiB",
            y,
            entries.len(),
            entries.len() * std::mem::size_of::<F>() / 1024
        );

        FactorTable { entries }
    }

    /// The m-th integer coprime to 210 (0-indexed: get_number(0) == 1).
    #[inline]
    pub fn get_number(&self, m: i64) -> i64 {
        Self::get_number_at(m)
    }

    #[inline]
    fn get_number_at(m: i64) -> i64 {
        210 * (m / 48) + WHEEL_RESIDUES[(m % 48) as usize]
    }

    /// Snap n down to the nearest representable integer and write back its
    /// index. Returns the index as well.
    #[inline]
    pub fn to_index(&self, n: &mut i64) -> i64 {
        debug_assert!(*n >= 1);
        *n = Self::snap_index(*n);
        *n
    }

    fn snap_index(n: i64) -> i64 {
        let q = n / 210;
        let r = (n % 210) as usize;
        // Number of wheel residues <= r; 0 means we fall back to the last
        // residue of the previous block.
        let below = WHEEL_RESIDUES.iter().take_while(|&&w| w <= r as i64).count() as i64;
        q * 48 + below - 1
    }

    #[inline]
    fn exact_index(n: i64) -> i64 {
        debug_assert_eq!(
            Self::get_number_at(Self::snap_index(n)),
            n,
            "{} is not wheel-coprime",
            n
        );
        Self::snap_index(n)
    }

    /// mu(get_number(m)), in {-1, 0, +1}.
    #[inline]
    pub fn mu(&self, m: i64) -> i64 {
        let value = self.entries[m as usize].unpack();
        if value == 0 {
            0
        } else if value & Self::SIGN_BIT != 0 {
            1
        } else {
            -1
        }
    }

    /// Least prime factor of get_number(m), capped. Entries with mu = 0
    /// report 0 so that the `prime < lpf(m)` cross-off shortcut skips them;
    /// the integer 1 reports the cap (every comparison passes). Callers
    /// only ever compare the result against primes <= sqrt(y), which the
    /// cap exceeds.
    #[inline]
    pub fn lpf(&self, m: i64) -> i64 {
        let value = self.entries[m as usize].unpack();
        (value & Self::LPF_CAP) as i64
    }

    /// Number of table entries.
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> i64 {
        self.entries.len() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
        let mut p = 2;
        while p * p <= n {
            if n % p == 0 {
                return p;
            }
            p += 1;
        }
        n
    }

    #[test]
    fn number_index_round_trip() {
        let y = 3000;
        let factors = FactorTable::<u16>::new(y);
        let mut expected = Vec::new();
        for n in 1..=y {
            if n % 2 != 0 && n % 3 != 0 && n % 5 != 0 && n % 7 != 0 {
                expected.push(n);
            }
        }
        assert_eq!(factors.len(), expected.len() as i64);
        for (m, &n) in expected.iter().enumerate() {
            assert_eq!(factors.get_number(m as i64), n);
        }
    }

    #[test]
    fn to_index_snaps_down() {
        let factors = FactorTable::<u16>::new(10_000);
        for n in 1..=10_000i64 {
            let mut snapped = n;
            let index = factors.to_index(&mut snapped);
            assert_eq!(index, snapped);
            let back = factors.get_number(index);
            assert!(back <= n);
            // back is the largest representable integer <= n.
            for candidate in (back + 1)..=n {
                assert!(
                    candidate % 2 == 0
                        || candidate % 3 == 0
                        || candidate % 5 == 0
                        || candidate % 7 == 0
                );
            }
        }
    }

    #[test]
    fn mu_and_lpf_match_reference() {
        let y = 10_000;
        let factors = FactorTable::<u16>::new(y);
        for m in 0..factors.len() {
            let n = factors.get_number(m);
            assert_eq!(factors.mu(m), reference_mu(n), "mu({})", n);
            if n == 1 {
                continue;
            }
            if factors.mu(m) != 0 {
                let lpf = reference_lpf(n);
                assert_eq!(factors.lpf(m), lpf.min(0x7FFF), "lpf({})", n);
            }
        }
    }

    #[test]
    fn skip_condition_is_exact_below_sqrt_y() {
        // The S2 loops only evaluate `prime < lpf(m)` for primes <= sqrt(y).
        let y = 10_000;
        let factors = FactorTable::<u16>::new(y);
        let primes = generate_primes(100);
        for m in 0..factors.len() {
            let n = factors.get_number(m);
            for &p in &primes[1..] {
                let reference = match reference_mu(n) {
                    // mu = 0 terms contribute nothing; the shortcut skips them.
                    0 => false,
                    _ if n == 1 => true,
                    _ => p < reference_lpf(n),
                };
                assert_eq!(p < factors.lpf(m), reference, "p = {}, n = {}", p, n);
            }
        }
    }

    #[test]
    fn wide_entries() {
        let factors = FactorTable::<u32>::new(100_000);
        let mut n = 100_000;
        factors.to_index(&mut n);
        assert_eq!(factors.len(), n + 1);
        assert_eq!(factors.mu(0), 1);
        assert_eq!(factors.lpf(1), 11);
    }
}
