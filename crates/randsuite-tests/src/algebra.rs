//! GF(2) linear algebra: matrix rank and linear complexity.

/// Pack a run of `rows * cols` bits (MSB first) into one `u64` per row.
/// `cols` must be at most 64.
pub fn pack_rows(bits: &[u8], rows: usize, cols: usize) -> Vec<u64> {
    bits.chunks(cols)
        .take(rows)
        .map(|row| row.iter().fold(0u64, |acc, &b| (acc << 1) | u64::from(b & 1)))
        .collect()
}

/// GF(2) Gaussian elimination on bit-packed rows. Returns the rank.
///
/// The rows are reduced in place.
pub fn gf2_rank(rows: &mut [u64], cols: usize) -> usize {
    let mut rank = 0;
    for col in (0..cols.min(64)).rev() {
        if rank == rows.len() {
            break;
        }
        let mask = 1u64 << col;
        let Some(pivot) = (rank..rows.len()).find(|&r| rows[r] & mask != 0) else {
            continue;
        };
        rows.swap(rank, pivot);
        let pivot_row = rows[rank];
        for (r, row) in rows.iter_mut().enumerate() {
            if r != rank && *row & mask != 0 {
                *row ^= pivot_row;
            }
        }
        rank += 1;
    }
    rank
}

/// Probability that a uniformly random `m × n` GF(2) matrix has rank `r`:
///
/// `2^{r(m+n−r)−mn} · Π_{i<r} (1−2^{i−m})(1−2^{i−n}) / (1−2^{i−r})`
pub fn rank_probability(m: usize, n: usize, r: usize) -> f64 {
    if r > m.min(n) {
        return 0.0;
    }
    let exponent = (r * (m + n - r)) as f64 - (m * n) as f64;
    let mut product = 1.0;
    for i in 0..r {
        let i = i as f64;
        product *= (1.0 - 2f64.powf(i - m as f64)) * (1.0 - 2f64.powf(i - n as f64))
            / (1.0 - 2f64.powf(i - r as f64));
    }
    2f64.powf(exponent) * product
}

/// Berlekamp-Massey algorithm for binary sequences. Returns the LFSR complexity.
pub fn berlekamp_massey(seq: &[u8]) -> usize {
    linear_complexity_profile(seq).last().copied().unwrap_or(0)
}

/// Linear complexity of every prefix: `profile[k]` is the complexity of
/// `seq[..=k]`. Non-decreasing by construction.
pub fn linear_complexity_profile(seq: &[u8]) -> Vec<usize> {
    let n = seq.len();
    let mut profile = Vec::with_capacity(n);
    if n == 0 {
        return profile;
    }
    // Connection polynomial c, previous polynomial b, both over GF(2).
    let mut c = vec![0u8; n + 1];
    let mut b = vec![0u8; n + 1];
    let mut t = vec![0u8; n + 1];
    c[0] = 1;
    b[0] = 1;
    let mut l: usize = 0;
    let mut m: isize = -1;

    for ni in 0..n {
        let mut d = seq[ni] & 1;
        for i in 1..=l {
            d ^= c[i] & seq[ni - i];
        }
        if d == 1 {
            t.copy_from_slice(&c);
            let shift = (ni as isize - m) as usize;
            for i in shift..=n {
                c[i] ^= b[i - shift];
            }
            if 2 * l <= ni {
                l = ni + 1 - l;
                m = ni as isize;
                std::mem::swap(&mut b, &mut t);
            }
        }
        profile.push(l);
    }
    profile
}

/// Exact mean and variance of the linear complexity of a uniformly random
/// `m`-bit sequence.
///
/// Uses the count of length-`m` sequences with complexity `L`: one for
/// `L = 0`, `2^{2L−1}` for `1 <= L <= m/2`, `2^{2(m−L)}` above.
pub fn linear_complexity_moments(m: usize) -> (f64, f64) {
    let half = m / 2;
    let mut mean = 0.0;
    let mut second = 0.0;
    for l in 0..=m {
        let log2_count = if l == 0 {
            0.0
        } else if l <= half {
            (2 * l - 1) as f64
        } else {
            (2 * (m - l)) as f64
        };
        let p = 2f64.powf(log2_count - m as f64);
        let lf = l as f64;
        mean += p * lf;
        second += p * lf * lf;
    }
    (mean, second - mean * mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lfsr_bits(taps: &[usize], seed: &[u8], n: usize) -> Vec<u8> {
        let mut bits = seed.to_vec();
        while bits.len() < n {
            let k = bits.len();
            let next = taps.iter().fold(0u8, |acc, &t| acc ^ bits[k - t]);
            bits.push(next);
        }
        bits
    }

    #[test]
    fn test_gf2_rank_identity_and_zero() {
        let mut identity: Vec<u64> = (0..32).map(|i| 1u64 << i).collect();
        assert_eq!(gf2_rank(&mut identity, 32), 32);
        let mut zero = vec![0u64; 32];
        assert_eq!(gf2_rank(&mut zero, 32), 0);
    }

    #[test]
    fn test_gf2_rank_dependent_rows() {
        let mut rows = vec![0b1100, 0b0110, 0b1010, 0b0001];
        // row2 = row0 ^ row1
        assert_eq!(gf2_rank(&mut rows, 4), 3);
        let mut rows = vec![0b111, 0b111, 0b111];
        assert_eq!(gf2_rank(&mut rows, 3), 1);
    }

    #[test]
    fn test_gf2_rank_wide_rows() {
        let mut rows = vec![0b1010_1010, 0b0101_0101, 0b1111_1111, 0b0000_0001, 0b1000_0000, 0];
        assert_eq!(gf2_rank(&mut rows, 8), 4);
    }

    #[test]
    fn test_pack_rows_msb_first() {
        let bits = [1, 0, 1, 1, 0, 0, 1, 0, 0];
        assert_eq!(pack_rows(&bits, 3, 3), vec![0b101, 0b100, 0b100]);
    }

    #[test]
    fn test_rank_probability_tables() {
        assert!((rank_probability(32, 32, 32) - 0.288788).abs() < 1e-6);
        assert!((rank_probability(32, 32, 31) - 0.577576).abs() < 1e-6);
        let low: f64 = (0..=30).map(|r| rank_probability(32, 32, r)).sum();
        assert!((low - 0.133636).abs() < 1e-6);

        assert!((rank_probability(6, 8, 6) - 0.773118).abs() < 1e-6);
        assert!((rank_probability(6, 8, 5) - 0.217439).abs() < 1e-6);
        let low: f64 = (0..=4).map(|r| rank_probability(6, 8, r)).sum();
        assert!((low - 0.009443).abs() < 1e-6);
    }

    #[test]
    fn test_rank_probability_sums_to_one() {
        for (m, n) in [(3, 3), (6, 8), (10, 7), (20, 20)] {
            let total: f64 = (0..=m.min(n)).map(|r| rank_probability(m, n, r)).sum();
            assert!((total - 1.0).abs() < 1e-12, "{m}x{n}: {total}");
        }
    }

    #[test]
    fn test_berlekamp_massey_single_one() {
        let mut seq = vec![0u8; 64];
        seq[0] = 1;
        assert_eq!(berlekamp_massey(&seq), 1);
        assert!(linear_complexity_profile(&seq).iter().all(|&l| l == 1));
    }

    #[test]
    fn test_berlekamp_massey_trailing_one() {
        assert_eq!(berlekamp_massey(&[0, 0, 0, 1]), 4);
        assert_eq!(berlekamp_massey(&[0, 0, 0, 0]), 0);
        assert_eq!(berlekamp_massey(&[]), 0);
        assert_eq!(berlekamp_massey(&[1, 1, 1, 1, 1]), 1);
        assert_eq!(berlekamp_massey(&[1, 0, 1, 0, 1, 0]), 2);
    }

    #[test]
    fn test_lfsr_profile_is_monotone_and_saturates() {
        // s[k] = s[k-3] ^ s[k-5]  (x^5 + x^2 + 1 reversed)
        let seq = lfsr_bits(&[3, 5], &[1, 0, 0, 1, 1], 200);
        let profile = linear_complexity_profile(&seq);
        assert!(profile.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*profile.last().unwrap(), 5);
        for len in [10, 31, 100, 200] {
            assert_eq!(berlekamp_massey(&seq[..len]), 5);
        }
    }

    #[test]
    fn test_longer_lfsr() {
        // Degree 17 primitive trinomial x^17 + x^3 + 1.
        let mut seed = vec![0u8; 17];
        seed[16] = 1;
        let seq = lfsr_bits(&[14, 17], &seed, 300);
        assert_eq!(berlekamp_massey(&seq), 17);
    }

    #[test]
    fn test_linear_complexity_moments_small() {
        let (mean, var) = linear_complexity_moments(1);
        assert!((mean - 0.5).abs() < 1e-12);
        assert!((var - 0.25).abs() < 1e-12);

        // Exhaustive check for m = 8.
        let m = 8;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for v in 0u32..(1 << m) {
            let seq: Vec<u8> = (0..m).map(|i| ((v >> i) & 1) as u8).collect();
            let l = berlekamp_massey(&seq) as f64;
            sum += l;
            sum_sq += l * l;
        }
        let total = f64::from(1u32 << m);
        let exact_mean = sum / total;
        let exact_var = sum_sq / total - exact_mean * exact_mean;
        let (mean, var) = linear_complexity_moments(m);
        assert!((mean - exact_mean).abs() < 1e-12);
        assert!((var - exact_var).abs() < 1e-12);
    }

    #[test]
    fn test_linear_complexity_moments_large() {
        let (mean, var) = linear_complexity_moments(500);
        // m/2 + (4 + r)/18 for even m
        assert!((mean - (250.0 + 4.0 / 18.0)).abs() < 1e-9);
        assert!((var - 86.0 / 81.0).abs() < 1e-3);
    }
}
