//! Sequential and stochastic tests: runs, simulated games, permutations of
//! consecutive values, and sliding sums.

use randsuite_core::{CanonicalStream, Params};

use crate::params::{MAX_BINS, ParamsExt};
use crate::spacing::{BITSTREAM, sparse_occupancy};
use crate::{Evaluation, TestError, chi_square_against, insufficient, stats, z_test};

/// Probability that the shooter wins a game of craps.
pub const CRAPS_WIN: f64 = 244.0 / 495.0;

/// Diehard's distribution of squeeze iteration counts, buckets `j <= 6`
/// through `j >= 48`.
pub const SQUEEZE_PROBABILITIES: [f64; 43] = [
    0.00002103, 0.00005779, 0.00017554, 0.00046732, 0.00110783, 0.00236784, 0.00460944,
    0.00824116, 0.01362781, 0.02096849, 0.03017612, 0.04080197, 0.05204203, 0.06283828,
    0.07205637, 0.07869451, 0.08206525, 0.08191892, 0.07844365, 0.07222798, 0.06412585,
    0.05504152, 0.04575655, 0.03690133, 0.02892057, 0.02203929, 0.01634605, 0.01181349,
    0.00832573, 0.00572647, 0.00384630, 0.00252543, 0.00162233, 0.00102041, 0.00062871,
    0.00037966, 0.00022483, 0.00013061, 0.00007447, 0.00004169, 0.00002292, 0.00001238,
    0.00001227,
];

const SQUEEZE_START: f64 = 2_147_483_647.0;
const SQUEEZE_CAP: usize = 48;

// ═══════════════════════════════════════════════════════════════════════════════
// Runs
// ═══════════════════════════════════════════════════════════════════════════════

/// Number of maximal runs of equal bits.
pub fn count_runs(bits: &[u8]) -> usize {
    if bits.is_empty() {
        return 0;
    }
    1 + bits.windows(2).filter(|w| w[0] != w[1]).count()
}

/// Test 21: Runs -- Wald-Wolfowitz runs test on the bit sequence.
pub fn runs(stream: &CanonicalStream, _params: &Params) -> Result<Evaluation, TestError> {
    let bits = stream.data_bits();
    let n = bits.len();
    if n < 2 {
        return Err(insufficient(2, n, "bits"));
    }
    let n1 = bits.iter().filter(|&&b| b == 1).count();
    let n0 = n - n1;
    if n0 == 0 || n1 == 0 {
        return Err(TestError::Structural(
            "data must contain both 0s and 1s".to_string(),
        ));
    }

    let runs = count_runs(bits);
    let nf = n as f64;
    let product = 2.0 * n0 as f64 * n1 as f64;
    let mean = product / nf + 1.0;
    let variance = product * (product - nf) / (nf * nf * (nf - 1.0));
    z_test(
        runs as f64,
        mean,
        variance,
        format!("runs={runs}, expected={mean:.1}, zeros={n0}, ones={n1}"),
    )
}

/// Test 22: Runs up and down -- number of monotone runs among the uniforms.
///
/// Ties between neighbours are skipped. The count is z-scored against mean
/// `(2n−1)/3` and variance `(16n−29)/90`.
pub fn runs_up_down(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let min_values = params.usize_at_least("min_values", 3)?;
    let values = stream.uniforms();
    if values.len() < min_values {
        return Err(insufficient(min_values, values.len(), "values"));
    }

    let directions: Vec<bool> = values
        .windows(2)
        .filter(|w| w[0] != w[1])
        .map(|w| w[1] > w[0])
        .collect();
    if directions.is_empty() {
        return Err(TestError::Structural("all values are equal".to_string()));
    }
    let runs = 1 + directions.windows(2).filter(|w| w[0] != w[1]).count();
    let n = (directions.len() + 1) as f64;
    z_test(
        runs as f64,
        (2.0 * n - 1.0) / 3.0,
        (16.0 * n - 29.0) / 90.0,
        format!("runs={runs}, n={n}"),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Craps
// ═══════════════════════════════════════════════════════════════════════════════

/// Play one game from the dice iterator. `None` when the dice run out.
fn play_craps(dice: &mut impl Iterator<Item = u64>) -> Option<bool> {
    let mut roll = || Some(dice.next()? + dice.next()?);
    let first = roll()?;
    match first {
        7 | 11 => Some(true),
        2 | 3 | 12 => Some(false),
        point => loop {
            match roll()? {
                7 => return Some(false),
                r if r == point => return Some(true),
                _ => {}
            }
        },
    }
}

/// Test 23: Craps -- simulated games, wins against 244/495.
pub fn craps(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let max_games = params.usize("max_games")?;
    let min_games = params.usize_at_least("min_games", 1)?;
    let mut dice = stream.words().iter().map(|&w| w % 6 + 1);

    let mut wins = 0u64;
    let mut losses = 0u64;
    while max_games == 0 || ((wins + losses) as usize) < max_games {
        match play_craps(&mut dice) {
            Some(true) => wins += 1,
            Some(false) => losses += 1,
            None => break,
        }
    }
    let games = (wins + losses) as usize;
    if games < min_games {
        return Err(insufficient(min_games, games, "games"));
    }

    let (chi2, _, p) = chi_square_against(&[wins, losses], &[CRAPS_WIN, 1.0 - CRAPS_WIN])?;
    Ok(Evaluation::new(
        p,
        chi2,
        format!(
            "games={games}, wins={wins}, win_rate={:.4}, expected={CRAPS_WIN:.4}",
            wins as f64 / games as f64
        ),
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPERM5
// ═══════════════════════════════════════════════════════════════════════════════

/// Index in `0..N!` of the ordering of `window`.
///
/// Repeatedly finds the maximum of the unplaced prefix (first on ties),
/// records its position as a mixed-radix digit, and swaps it to the end.
pub fn permutation_index<T: PartialOrd + Copy, const N: usize>(window: &[T; N]) -> usize {
    let mut values = *window;
    let mut index = 0;
    for len in (2..=N).rev() {
        let mut max_pos = 0;
        for i in 1..len {
            if values[i] > values[max_pos] {
                max_pos = i;
            }
        }
        index = index * len + max_pos;
        values.swap(max_pos, len - 1);
    }
    index
}

/// Pearson chi-square of `counts` against equal cell probabilities.
fn equiprobable_chi_square(counts: &[u64], total: usize) -> f64 {
    let expected = total as f64 / counts.len() as f64;
    counts
        .iter()
        .map(|&c| {
            let diff = c as f64 - expected;
            diff * diff / expected
        })
        .sum()
}

/// Ordering counts of every circular `N`-window over `values`.
fn circular_ordering_counts<const N: usize>(values: &[u64], cells: usize) -> Vec<u64> {
    let n = values.len();
    let mut counts = vec![0u64; cells];
    let mut window = [0u64; N];
    for start in 0..n {
        for (offset, slot) in window.iter_mut().enumerate() {
            *slot = values[(start + offset) % n];
        }
        counts[permutation_index(&window)] += 1;
    }
    counts
}

/// Test 24: OPERM5 -- orderings of five consecutive values.
///
/// Disjoint windows give a plain chi-square over the 120 orderings with 119
/// degrees of freedom. Overlapping windows are correlated, so the statistic
/// becomes `ψ²₅ − ψ²₄`: the chi-square of the circular 5-window orderings
/// minus that of the circular 4-window orderings, with `5! − 4! = 96`
/// degrees of freedom.
pub fn operm5(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let overlap = params.flag("overlap")?;
    let samples = params.usize_at_least("samples", 1)?;
    let min_samples = params.usize_at_least("min_samples", 1)?;
    let words = stream.words();
    let available = match (words.len(), overlap) {
        (len, _) if len < 5 => 0,
        (len, true) => len,
        (len, false) => (len - 5) / 5 + 1,
    };
    let n = available.min(samples);
    if n < min_samples {
        return Err(insufficient(min_samples, n, "windows"));
    }

    let (chi2, df) = if overlap {
        let values = &words[..n];
        let psi5 = equiprobable_chi_square(&circular_ordering_counts::<5>(values, 120), n);
        let psi4 = equiprobable_chi_square(&circular_ordering_counts::<4>(values, 24), n);
        (psi5 - psi4, 96.0)
    } else {
        let mut counts = [0u64; 120];
        for chunk in words.chunks_exact(5).take(n) {
            let mut window = [0u64; 5];
            window.copy_from_slice(chunk);
            counts[permutation_index(&window)] += 1;
        }
        (equiprobable_chi_square(&counts, n), 119.0)
    };
    let p = stats::chi_square_sf(chi2, df);
    Ok(Evaluation::new(
        p,
        chi2,
        format!("windows={n}, overlap={overlap}, df={df}"),
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Squeeze and overlapping sums
// ═══════════════════════════════════════════════════════════════════════════════

/// Test 25: Squeeze -- iterations of `k = ⌈k·U⌉` from 2³¹−1 down to 1.
pub fn squeeze(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let max_trials = params.usize_at_least("trials", 1)?;
    let min_trials = params.usize_at_least("min_trials", 1)?;
    let mut uniforms = stream.uniforms().into_iter();

    let mut counts = [0u64; SQUEEZE_PROBABILITIES.len()];
    let mut trials = 0usize;
    'trials: while trials < max_trials {
        let mut k = SQUEEZE_START;
        let mut j = 0usize;
        while k > 1.0 && j < SQUEEZE_CAP {
            let Some(u) = uniforms.next() else {
                break 'trials;
            };
            k = (k * u).ceil();
            j += 1;
        }
        counts[j.max(6) - 6] += 1;
        trials += 1;
    }
    if trials < min_trials {
        return Err(insufficient(min_trials, trials, "trials"));
    }

    let total: f64 = SQUEEZE_PROBABILITIES.iter().sum();
    let probabilities: Vec<f64> = SQUEEZE_PROBABILITIES.iter().map(|p| p / total).collect();
    let (chi2, df, p) = chi_square_against(&counts, &probabilities)?;
    Ok(Evaluation::new(
        p,
        chi2,
        format!("trials={trials}, df={df}"),
    ))
}

/// Test 26: Overlapping sums -- standardized sliding sums of `window`
/// uniforms, mapped through Φ and binned.
pub fn overlapping_sums(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let window = params.usize_at_least("window", 1)?;
    let stride = match params.usize("stride")? {
        0 => window,
        s => s,
    };
    let max_sums = params.usize_at_least("sums", 1)?;
    let min_sums = params.usize_at_least("min_sums", 1)?;
    let bins = params.usize_in("bins", 2, MAX_BINS)?;
    let values = stream.uniforms();
    let available = if values.len() < window {
        0
    } else {
        (values.len() - window) / stride + 1
    };
    let n = available.min(max_sums);
    if n < min_sums {
        return Err(insufficient(min_sums, n, "sums"));
    }

    let mean = window as f64 / 2.0;
    let sd = (window as f64 / 12.0).sqrt();
    let mut counts = vec![0u64; bins];
    let mut running: f64 = values[..window].iter().sum();
    let mut position = 0usize;
    let mut taken = 0usize;
    loop {
        if position % stride == 0 {
            let u = stats::normal_cdf((running - mean) / sd);
            counts[((u * bins as f64) as usize).min(bins - 1)] += 1;
            taken += 1;
            if taken == n {
                break;
            }
        }
        if position + window >= values.len() {
            break;
        }
        running += values[position + window] - values[position];
        position += 1;
    }

    let probabilities = vec![1.0 / bins as f64; bins];
    let (chi2, df, p) = chi_square_against(&counts, &probabilities)?;
    Ok(Evaluation::new(
        p,
        chi2,
        format!("sums={taken}, window={window}, stride={stride}, df={df}"),
    ))
}

/// Test 27: Bitstream -- overlapping 20-bit words, missing-cell count.
pub fn bitstream(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    sparse_occupancy(stream, params, BITSTREAM)
}
