//! Structural and combinatorial tests: GF(2) rank, linear complexity, pattern
//! frequencies, and symbol-level combinatorics.

use randsuite_core::{CanonicalStream, Params};

use crate::algebra::{
    berlekamp_massey, gf2_rank, linear_complexity_moments, pack_rows, rank_probability,
};
use crate::params::{MAX_BINS, ParamsExt};
use crate::{Evaluation, TestError, chi_square_against, insufficient, stats, z_test};

/// Proportions of full rank, full − 1, and lower for 32×32 matrices.
pub const RANK_32X32_PROPORTIONS: [f64; 3] = [0.288_788, 0.577_576, 0.133_636];
/// Proportions of rank 6, 5, and lower for 6×8 matrices.
pub const RANK_6X8_PROPORTIONS: [f64; 3] = [0.773_118, 0.217_439, 0.009_443];

// ═══════════════════════════════════════════════════════════════════════════════
// 1. RANK TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Ranks of consecutive `rows × cols` matrices cut from the bit stream.
fn matrix_ranks(bits: &[u8], rows: usize, cols: usize, count: usize) -> Vec<usize> {
    bits.chunks_exact(rows * cols)
        .take(count)
        .map(|block| {
            let mut packed = pack_rows(block, rows, cols);
            gf2_rank(&mut packed, cols)
        })
        .collect()
}

fn fixed_binary_rank(
    stream: &CanonicalStream,
    params: &Params,
    rows: usize,
    cols: usize,
    proportions: &[f64; 3],
) -> Result<Evaluation, TestError> {
    let min_matrices = params.usize_at_least("min_matrices", 1)?;
    let max_matrices = params.usize("max_matrices")?;
    let bits = stream.data_bits();
    let available = bits.len() / (rows * cols);
    let count = if max_matrices == 0 {
        available
    } else {
        available.min(max_matrices)
    };
    if count < min_matrices {
        return Err(insufficient(min_matrices * rows * cols, bits.len(), "bits"));
    }

    let full = rows.min(cols);
    let mut counts = [0u64; 3];
    for rank in matrix_ranks(bits, rows, cols, count) {
        let bucket = (full - rank).min(2);
        counts[bucket] += 1;
    }
    let (chi2, df, p) = chi_square_against(&counts, proportions)?;
    Ok(Evaluation::new(
        p,
        chi2,
        format!(
            "N={count}, full={}, full-1={}, lower={}, df={df}",
            counts[0], counts[1], counts[2]
        ),
    ))
}

/// Test 9: Binary rank 32×32 -- GF(2) rank of disjoint 1024-bit blocks.
pub fn binary_rank_32x32(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    fixed_binary_rank(stream, params, 32, 32, &RANK_32X32_PROPORTIONS)
}

/// Test 10: Binary rank 6×8 -- GF(2) rank of disjoint 48-bit blocks.
pub fn binary_rank_6x8(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    fixed_binary_rank(stream, params, 6, 8, &RANK_6X8_PROPORTIONS)
}

/// Test 11: Matrix rank -- square matrices of a configurable size, ranks
/// compared with the exact rank distribution.
///
/// `size = 0` picks `clamp(⌊√bits⌋ / 10, 3, 32)`.
pub fn matrix_rank(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let bits = stream.data_bits();
    let size = match params.usize("size")? {
        0 => (bits.len().isqrt() / 10).clamp(3, 32),
        s if s <= 64 => s,
        s => {
            return Err(TestError::InvalidParameter {
                name: "size".into(),
                reason: format!("at most 64 columns are supported, got {s}"),
            });
        }
    };
    let min_matrices = params.usize_at_least("min_matrices", 1)?;
    let count = bits.len() / (size * size);
    if count < min_matrices {
        return Err(insufficient(min_matrices * size * size, bits.len(), "bits"));
    }

    // Buckets: rank size, size-1, size-2, and everything lower.
    let buckets = 4.min(size + 1);
    let mut counts = vec![0u64; buckets];
    for rank in matrix_ranks(bits, size, size, count) {
        counts[(size - rank).min(buckets - 1)] += 1;
    }
    let mut probabilities: Vec<f64> = (0..buckets - 1)
        .map(|deficit| rank_probability(size, size, size - deficit))
        .collect();
    let tail = 1.0 - probabilities.iter().sum::<f64>();
    probabilities.push(tail.max(0.0));

    let (chi2, df, p) = chi_square_against(&counts, &probabilities)?;
    Ok(Evaluation::new(
        p,
        chi2,
        format!("N={count}, size={size}, counts={counts:?}, df={df}"),
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// 2. COMPLEXITY AND PATTERN TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Test 12: Linear complexity -- Berlekamp-Massey complexity per block.
///
/// Each block's complexity is standardized with the exact mean and variance
/// for its length; the squared scores sum to a chi-square with one degree of
/// freedom per block.
pub fn linear_complexity(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let block_size = params.usize_at_least("block_size", 2)?;
    let min_blocks = params.usize_at_least("min_blocks", 1)?;
    let max_blocks = params.usize("max_blocks")?;
    let bits = stream.data_bits();
    let available = bits.len() / block_size;
    let blocks = if max_blocks == 0 {
        available
    } else {
        available.min(max_blocks)
    };
    if blocks < min_blocks {
        return Err(insufficient(min_blocks * block_size, bits.len(), "bits"));
    }

    let (mean, variance) = linear_complexity_moments(block_size);
    let sd = variance.sqrt();
    let mut chi2 = 0.0;
    let mut total = 0usize;
    for block in bits.chunks_exact(block_size).take(blocks) {
        let l = berlekamp_massey(block);
        total += l;
        let t = (l as f64 - mean) / sd;
        chi2 += t * t;
    }
    let p = stats::chi_square_sf(chi2, blocks as f64);
    Ok(Evaluation::new(
        p,
        chi2,
        format!(
            "N={blocks}, M={block_size}, mean_complexity={:.2}, expected={mean:.2}",
            total as f64 / blocks as f64
        ),
    ))
}

/// Helper: compute psi-squared for the serial test (circular m-bit patterns).
fn psi_sq(bits: &[u8], m: usize) -> f64 {
    if m < 1 {
        return 0.0;
    }
    let n = bits.len();
    let num_patterns = 1usize << m;
    let mut counts = vec![0u64; num_patterns];
    for i in 0..n {
        let mut val = 0usize;
        for j in 0..m {
            val = (val << 1) | bits[(i + j) % n] as usize;
        }
        counts[val] += 1;
    }
    let sum_sq: f64 = counts.iter().map(|&c| (c as f64) * (c as f64)).sum();
    sum_sq * (num_patterns as f64) / (n as f64) - n as f64
}

/// Test 13: Serial -- frequency of overlapping m-bit patterns, ∇ψ².
pub fn serial(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let m = params.usize_at_least("block_size", 1)?;
    if m > 20 {
        return Err(TestError::InvalidParameter {
            name: "block_size".into(),
            reason: format!("at most 20, got {m}"),
        });
    }
    let bits = stream.data_bits();
    let needed = (1 << m) + 10;
    if bits.len() < needed {
        return Err(insufficient(needed, bits.len(), "bits"));
    }

    let delta = psi_sq(bits, m) - psi_sq(bits, m - 1);
    let df = (1u64 << (m - 1)) as f64;
    let p = stats::chi_square_sf(delta, df);
    Ok(Evaluation::new(
        p,
        delta,
        format!("m={m}, n_bits={}", bits.len()),
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// 3. SYMBOL COMBINATORICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Uniforms reduced to symbols `0..alphabet`.
fn symbols(stream: &CanonicalStream, alphabet: usize) -> Vec<usize> {
    stream
        .uniforms()
        .into_iter()
        .map(|u| ((u * alphabet as f64) as usize).min(alphabet - 1))
        .collect()
}

/// Test 14: Simple poker -- number of distinct symbols per hand.
///
/// `P(r distinct) = d(d−1)···(d−r+1) · S(k, r) / d^k`.
pub fn simple_poker(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let k = params.usize_at_least("hand_size", 1)?;
    let d = params.usize_at_least("alphabet", 2)?;
    let min_hands = params.usize_at_least("min_hands", 1)?;
    if k > 64 {
        return Err(TestError::InvalidParameter {
            name: "hand_size".into(),
            reason: format!("at most 64, got {k}"),
        });
    }
    let values = symbols(stream, d);
    let hands = values.len() / k;
    if hands < min_hands {
        return Err(insufficient(min_hands * k, values.len(), "values"));
    }

    let max_distinct = k.min(d);
    let mut counts = vec![0u64; max_distinct + 1];
    let mut hand_values = Vec::with_capacity(k);
    for hand in values.chunks_exact(k) {
        hand_values.clear();
        hand_values.extend_from_slice(hand);
        hand_values.sort_unstable();
        hand_values.dedup();
        counts[hand_values.len()] += 1;
    }

    let ln_stirling = stats::ln_stirling2_table(k);
    let log_dk = k as f64 * (d as f64).ln();
    let probabilities: Vec<f64> = (0..=max_distinct)
        .map(|r| (stats::ln_falling_factorial(d, r) + ln_stirling[k][r] - log_dk).exp())
        .collect();
    // r = 0 never occurs; drop it so pooling starts at r = 1.
    let (chi2, df, p) = chi_square_against(&counts[1..], &probabilities[1..])?;
    Ok(Evaluation::new(
        p,
        chi2,
        format!("hands={hands}, k={k}, d={d}, df={df}"),
    ))
}

/// Test 15: Coupon collector -- segment lengths until every symbol is seen.
///
/// `P(r) = d!/d^r · S(r−1, d−1)` for `d <= r < t`, with the tail
/// `1 − d!/d^{t−1} · S(t−1, d)` lumped into one bin.
pub fn coupon_collector(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let d = params.usize_at_least("alphabet", 2)?;
    let t = params.usize("max_length")?;
    let min_segments = params.usize_at_least("min_segments", 1)?;
    if t <= d || t > 512 {
        return Err(TestError::InvalidParameter {
            name: "max_length".into(),
            reason: format!("must be in ({d}, 512], got {t}"),
        });
    }
    let values = symbols(stream, d);

    // counts[i] is length d + i; the last slot is the tail (length >= t).
    let mut counts = vec![0u64; t - d + 1];
    let mut seen = vec![false; d];
    let mut distinct = 0;
    let mut length = 0usize;
    let mut segments = 0usize;
    for &v in &values {
        length += 1;
        if !seen[v] {
            seen[v] = true;
            distinct += 1;
        }
        if distinct == d {
            counts[(length - d).min(t - d)] += 1;
            segments += 1;
            seen.iter_mut().for_each(|s| *s = false);
            distinct = 0;
            length = 0;
        }
    }
    if segments < min_segments {
        return Err(insufficient(min_segments, segments, "complete segments"));
    }

    let ln_stirling = stats::ln_stirling2_table(t);
    let ln_d_fact = stats::ln_gamma(d as f64 + 1.0);
    let ln_d = (d as f64).ln();
    let mut probabilities: Vec<f64> = (d..t)
        .map(|r| (ln_d_fact - r as f64 * ln_d + ln_stirling[r - 1][d - 1]).exp())
        .collect();
    let covered = (ln_d_fact - (t - 1) as f64 * ln_d + ln_stirling[t - 1][d]).exp();
    probabilities.push((1.0 - covered).max(0.0));

    let (chi2, df, p) = chi_square_against(&counts, &probabilities)?;
    Ok(Evaluation::new(
        p,
        chi2,
        format!("segments={segments}, d={d}, t={t}, df={df}"),
    ))
}

/// Number of `n`-bit strings whose longest run of the tested symbol is at
/// most `k`, as a float.
fn runs_at_most(n: usize, k: usize) -> f64 {
    let mut a = vec![0.0; n + 1];
    for m in 0..=n {
        let count = if m <= k {
            2f64.powi(m as i32)
        } else {
            a[m - 1 - k..m].iter().sum()
        };
        a[m] = count;
    }
    a[n]
}

/// Test 16: Longest run -- longest run of `symbol` per block against its exact
/// distribution.
pub fn longest_run(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let n = params.usize_at_least("block_size", 1)?;
    let symbol = params.usize("symbol")?;
    if symbol > 1 || n > 512 {
        return Err(TestError::InvalidParameter {
            name: "symbol".into(),
            reason: format!("symbol must be 0 or 1 and block_size at most 512, got {symbol} and {n}"),
        });
    }
    let bits = stream.data_bits();
    let blocks = bits.len() / n;
    const MIN_BLOCKS: usize = 20;
    if blocks < MIN_BLOCKS {
        return Err(insufficient(MIN_BLOCKS * n, bits.len(), "bits"));
    }

    let mut counts = vec![0u64; n + 1];
    for block in bits.chunks_exact(n) {
        let mut longest = 0;
        let mut current = 0;
        for &b in block {
            if b as usize == symbol {
                current += 1;
                longest = longest.max(current);
            } else {
                current = 0;
            }
        }
        counts[longest] += 1;
    }

    let total = 2f64.powi(n as i32);
    let mut previous = 0.0;
    let probabilities: Vec<f64> = (0..=n)
        .map(|k| {
            let at_most = runs_at_most(n, k);
            let p = (at_most - previous) / total;
            previous = at_most;
            p
        })
        .collect();

    let (chi2, df, p) = chi_square_against(&counts, &probabilities)?;
    Ok(Evaluation::new(
        p,
        chi2,
        format!("blocks={blocks}, M={n}, df={df}"),
    ))
}

/// Test 17: Gap -- lengths of gaps between visits to `[alpha, beta)`.
///
/// `P(gap = r) = p(1−p)^r` for `r < t`, tail `(1−p)^t`.
pub fn gap(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let alpha = params.f64("alpha")?;
    let beta = params.f64("beta")?;
    let t = params.usize_in("max_gap", 1, MAX_BINS)?;
    let min_gaps = params.usize_at_least("min_gaps", 1)?;
    if !(0.0..1.0).contains(&alpha) || beta <= alpha || beta > 1.0 {
        return Err(TestError::InvalidParameter {
            name: "beta".into(),
            reason: format!("need 0 <= alpha < beta <= 1, got [{alpha}, {beta})"),
        });
    }
    let p = beta - alpha;

    let mut counts = vec![0u64; t + 1];
    let mut gaps = 0usize;
    let mut length = 0usize;
    for u in stream.uniforms() {
        if (alpha..beta).contains(&u) {
            counts[length.min(t)] += 1;
            gaps += 1;
            length = 0;
        } else {
            length += 1;
        }
    }
    if gaps < min_gaps {
        return Err(insufficient(min_gaps, gaps, "gaps"));
    }

    let mut probabilities: Vec<f64> = (0..t).map(|r| p * (1.0 - p).powi(r as i32)).collect();
    probabilities.push((1.0 - p).powi(t as i32));
    let (chi2, df, p_value) = chi_square_against(&counts, &probabilities)?;
    Ok(Evaluation::new(
        p_value,
        chi2,
        format!("gaps={gaps}, interval=[{alpha}, {beta}), t={t}, df={df}"),
    ))
}

/// Test 18: Autocorrelation -- agreement rate between bits `lag` apart.
pub fn autocorrelation(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let lag = params.usize_at_least("lag", 1)?;
    let bits = stream.data_bits();
    const MIN_PAIRS: usize = 100;
    if bits.len() < lag + MIN_PAIRS {
        return Err(insufficient(lag + MIN_PAIRS, bits.len(), "bits"));
    }
    let n = bits.len() - lag;
    let agreements = bits.iter().zip(&bits[lag..]).filter(|(a, b)| a == b).count();
    let nf = n as f64;
    z_test(
        agreements as f64 / nf,
        0.5,
        0.25 / nf,
        format!("lag={lag}, pairs={n}, agreements={agreements}"),
    )
}

fn binomial_probabilities(trials: usize) -> Vec<f64> {
    (0..=trials as u64)
        .map(|k| stats::binomial_pmf(trials as u64, k, 0.5))
        .collect()
}

/// Test 19: Count-the-1s (stream) -- ones per `block_size`-bit block,
/// binomial chi-square.
pub fn count_ones_stream(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let block_size = params.usize_at_least("block_size", 1)?;
    let samples = params.usize_at_least("samples", 1)?;
    let bits = stream.data_bits();
    let blocks = (bits.len() / block_size).min(samples);
    const MIN_BLOCKS: usize = 100;
    if blocks < MIN_BLOCKS {
        return Err(insufficient(MIN_BLOCKS * block_size, bits.len(), "bits"));
    }

    let mut counts = vec![0u64; block_size + 1];
    for block in bits.chunks_exact(block_size).take(blocks) {
        let ones = block.iter().filter(|&&b| b == 1).count();
        counts[ones] += 1;
    }
    let (chi2, df, p) = chi_square_against(&counts, &binomial_probabilities(block_size))?;
    Ok(Evaluation::new(
        p,
        chi2,
        format!("blocks={blocks}, block_size={block_size}, df={df}"),
    ))
}

/// Test 20: Count-the-1s (bytes) -- popcount of each byte, binomial(8, ½).
pub fn count_ones_byte(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let samples = params.usize_at_least("samples", 1)?;
    let bytes = stream.bytes();
    let n = bytes.len().min(samples);
    const MIN_BYTES: usize = 100;
    if n < MIN_BYTES {
        return Err(insufficient(MIN_BYTES, bytes.len(), "bytes"));
    }
    let mut counts = [0u64; 9];
    for &byte in &bytes[..n] {
        counts[byte.count_ones() as usize] += 1;
    }
    let (chi2, df, p) = chi_square_against(&counts, &binomial_probabilities(8))?;
    Ok(Evaluation::new(
        p,
        chi2,
        format!("bytes={n}, df={df}"),
    ))
}
