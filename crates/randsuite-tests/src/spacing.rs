//! Spacing and occupancy tests.
//!
//! Samples are mapped into a discrete or continuous space and the test
//! measures clustering: repeated spacings, collisions, empty cells, crashes,
//! or the smallest pairwise distance.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::f64::consts::PI;

use randsuite_core::{CanonicalStream, Params};

use crate::params::{MAX_BINS, ParamsExt};
use crate::{Evaluation, TestError, chi_square_against, insufficient, stats, z_test};

// ═══════════════════════════════════════════════════════════════════════════════
// Birthday spacings and collisions
// ═══════════════════════════════════════════════════════════════════════════════

/// Test 1: Birthday spacings -- repeated spacings between sorted birthdays.
///
/// The first `n` words are reduced modulo `m`, sorted, and the circular
/// spacings tallied. The statistic `(Σ count² − n) / n` is z-scored against
/// mean `n(n−1)/2m` and variance `n(n−1)(2n−1)/6m²`.
///
/// At the catalog defaults (`n = 10`, `m = 1000`) a random source almost
/// always has ten distinct spacings, so the statistic is 0, `z ≈ −2.67` and
/// `p ≈ 0.0077`: good generators are reported Non-Random. Use
/// [`diehard_birthday_spacings`] for a calibrated verdict.
pub fn birthday_spacings(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let n = params.usize_at_least("n", 2)?;
    let m = params.u64("m")?;
    if m < 2 {
        return Err(TestError::InvalidParameter {
            name: "m".into(),
            reason: format!("space size must be at least 2, got {m}"),
        });
    }
    let words = stream.words();
    if words.len() < n {
        return Err(insufficient(n, words.len(), "words"));
    }

    let mut birthdays: Vec<u64> = words[..n].iter().map(|&w| w % m).collect();
    birthdays.sort_unstable();

    let mut multiplicity: BTreeMap<u64, u64> = BTreeMap::new();
    for pair in birthdays.windows(2) {
        *multiplicity.entry(pair[1] - pair[0]).or_default() += 1;
    }
    let wrap = birthdays[0] + m - birthdays[n - 1];
    *multiplicity.entry(wrap).or_default() += 1;

    let sum_sq: f64 = multiplicity.values().map(|&c| (c * c) as f64).sum();
    let nf = n as f64;
    let mf = m as f64;
    let statistic = (sum_sq - nf) / nf;
    let mean = nf * (nf - 1.0) / (2.0 * mf);
    let variance = nf * (nf - 1.0) * (2.0 * nf - 1.0) / (6.0 * mf * mf);

    z_test(
        statistic,
        mean,
        variance,
        format!(
            "n={n}, m={m}, distinct spacings={}, statistic={statistic:.4}",
            multiplicity.len()
        ),
    )
}

/// Test 2: Collision -- values hashed into `space` cells; count collisions.
///
/// Occupied cells are tracked in a set, so memory follows `samples` rather
/// than `space`.
pub fn collision(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let k = params.u64("space")?;
    let n = params.usize_at_least("samples", 2)?;
    if k < 2 {
        return Err(TestError::InvalidParameter {
            name: "space".into(),
            reason: format!("must be at least 2, got {k}"),
        });
    }
    let words = stream.words();
    if words.len() < n {
        return Err(insufficient(n, words.len(), "words"));
    }

    let occupied: HashSet<u64> = words[..n].iter().map(|&w| w % k).collect();
    let collisions = (n - occupied.len()) as u64;

    // n − k(1 − ((k−1)/k)^n), kept accurate when k ≫ n.
    let nf = n as f64;
    let kf = k as f64;
    let filled = -(nf * (-1.0 / kf).ln_1p()).exp_m1();
    let expected = nf - kf * filled;
    let variance = nf * (nf - 1.0) / (2.0 * kf);

    z_test(
        collisions as f64,
        expected,
        variance,
        format!("n={n}, k={k}, collisions={collisions}, expected={expected:.2}"),
    )
}

/// Number of repeated values among the sorted spacings of `birthdays`.
fn repeated_spacings(birthdays: &mut [u64]) -> u64 {
    birthdays.sort_unstable();
    let mut spacings: Vec<u64> = birthdays.windows(2).map(|p| p[1] - p[0]).collect();
    spacings.sort_unstable();
    spacings.windows(2).filter(|p| p[0] == p[1]).count() as u64
}

/// Test 28: Birthday spacings, Diehard form -- repeated spacings per trial
/// against a Poisson law.
///
/// Each trial reduces `n` consecutive words modulo `m`, sorts them, and
/// counts repeated values among the `n − 1` spacings. That count is
/// asymptotically Poisson with mean `n³/4m`. Counts from all trials are
/// binned (tail lumped) and chi-square tested.
pub fn diehard_birthday_spacings(
    stream: &CanonicalStream,
    params: &Params,
) -> Result<Evaluation, TestError> {
    let n = params.usize_at_least("n", 2)?;
    let m = params.u64("m")?;
    if m < 2 {
        return Err(TestError::InvalidParameter {
            name: "m".into(),
            reason: format!("space size must be at least 2, got {m}"),
        });
    }
    let requested = params.usize_at_least("trials", 1)?;
    let min_trials = params.usize_at_least("min_trials", 1)?;
    let words = stream.words();
    let trials = requested.min(words.len() / n);
    if trials < min_trials {
        return Err(insufficient(min_trials.saturating_mul(n), words.len(), "words"));
    }

    let nf = n as f64;
    let lambda = nf * nf * nf / (4.0 * m as f64);
    let tail = (lambda + 4.0 * lambda.sqrt()).ceil() as usize + 4;
    if tail > MAX_BINS {
        return Err(TestError::InvalidParameter {
            name: "n".into(),
            reason: format!("n³/4m = {lambda:.3e} needs more than {MAX_BINS} bins"),
        });
    }
    let mut counts = vec![0u64; tail + 1];
    let mut birthdays = Vec::with_capacity(n);
    let mut total = 0u64;
    for batch in words.chunks_exact(n).take(trials) {
        birthdays.clear();
        birthdays.extend(batch.iter().map(|&w| w % m));
        let repeats = repeated_spacings(&mut birthdays);
        total += repeats;
        counts[(repeats as usize).min(tail)] += 1;
    }

    let mut probabilities: Vec<f64> = (0..tail as u64)
        .map(|k| stats::poisson_pmf(k, lambda))
        .collect();
    let head: f64 = probabilities.iter().sum();
    probabilities.push((1.0 - head).max(0.0));
    let (chi2, df, p) = chi_square_against(&counts, &probabilities)?;
    Ok(Evaluation::new(
        p,
        chi2,
        format!(
            "trials={trials}, n={n}, m={m}, lambda={lambda:.3}, mean_repeats={:.3}, df={df}",
            total as f64 / trials as f64
        ),
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Sparse occupancy
// ═══════════════════════════════════════════════════════════════════════════════

/// Shape of a sparse occupancy test: `word_letters` overlapping letters of
/// `letter_bits` bits each, and the literature sigma of the missing-cell count
/// at `N = 2K` words.
#[derive(Debug, Clone, Copy)]
pub struct OccupancyLayout {
    pub letter_bits: u32,
    pub word_letters: u32,
    pub sigma: f64,
}

pub const OPSO: OccupancyLayout = OccupancyLayout {
    letter_bits: 10,
    word_letters: 2,
    sigma: 290.0,
};
pub const OQSO: OccupancyLayout = OccupancyLayout {
    letter_bits: 5,
    word_letters: 4,
    sigma: 295.0,
};
pub const DNA: OccupancyLayout = OccupancyLayout {
    letter_bits: 2,
    word_letters: 10,
    sigma: 339.0,
};
pub const BITSTREAM: OccupancyLayout = OccupancyLayout {
    letter_bits: 1,
    word_letters: 20,
    sigma: 428.0,
};

/// A bitset over `2^cell_bits` cells tracking which have been hit.
struct OccupancyGrid {
    cells: Vec<u64>,
    occupied: usize,
}

impl OccupancyGrid {
    fn new(cell_bits: u32) -> Self {
        let cells = 1usize << cell_bits;
        Self {
            cells: vec![0; cells.div_ceil(64)],
            occupied: 0,
        }
    }

    fn insert(&mut self, cell: usize) {
        let (slot, bit) = (cell / 64, 1u64 << (cell % 64));
        if self.cells[slot] & bit == 0 {
            self.cells[slot] |= bit;
            self.occupied += 1;
        }
    }
}

/// Variance shape of the classical occupancy count at load `λ = N/K`.
fn occupancy_variance_shape(lambda: f64) -> f64 {
    let e = (-lambda).exp();
    e * (1.0 - (1.0 + lambda) * e)
}

/// Shared body of OPSO, OQSO, DNA, and the bitstream test.
pub(crate) fn sparse_occupancy(
    stream: &CanonicalStream,
    params: &Params,
    layout: OccupancyLayout,
) -> Result<Evaluation, TestError> {
    let requested = params.usize_at_least("words", 1)?;
    let min_words = params.usize_at_least("min_words", 1)?;

    let bits = stream.data_bits();
    let letter_bits = layout.letter_bits as usize;
    let cell_bits = layout.letter_bits * layout.word_letters;
    let letters = bits.len() / letter_bits;
    let available = (letters + 1).saturating_sub(layout.word_letters as usize);
    let n = requested.min(available);
    if n < min_words {
        return Err(insufficient(min_words, n, "words"));
    }

    let mask = (1usize << cell_bits) - 1;
    let mut grid = OccupancyGrid::new(cell_bits);
    let mut cell = 0usize;
    let mut placed = 0usize;
    for (i, letter) in bits.chunks_exact(letter_bits).enumerate() {
        let value = letter.iter().fold(0usize, |acc, &b| (acc << 1) | b as usize);
        cell = ((cell << letter_bits) | value) & mask;
        if i + 1 >= layout.word_letters as usize {
            grid.insert(cell);
            placed += 1;
            if placed == n {
                break;
            }
        }
    }

    let k = (mask + 1) as f64;
    let lambda = n as f64 / k;
    let missing = k - grid.occupied as f64;
    let mean = k * (-lambda).exp();
    let sigma = layout.sigma
        * (occupancy_variance_shape(lambda) / occupancy_variance_shape(2.0)).sqrt();

    z_test(
        missing,
        mean,
        sigma * sigma,
        format!("words={n}, missing={missing}, expected={mean:.1}, sigma={sigma:.2}"),
    )
}

/// Test 3: OPSO -- overlapping pairs of 10-bit letters, missing-cell count.
pub fn opso(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    sparse_occupancy(stream, params, OPSO)
}

/// Test 4: OQSO -- overlapping quadruples of 5-bit letters.
pub fn oqso(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    sparse_occupancy(stream, params, OQSO)
}

/// Test 5: DNA -- overlapping 10-letter words over a 4-letter alphabet.
pub fn dna(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    sparse_occupancy(stream, params, DNA)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Parking lot
// ═══════════════════════════════════════════════════════════════════════════════

/// Largest number of crash-distance grid cells along one side of the lot.
const MAX_GRID_CELLS: f64 = 1e9;

/// Test 6: Parking lot -- park cars at random in a square, count successes.
///
/// A car crashes when it lands within `crash_distance` of a parked car on
/// both axes. Parked cars are bucketed on a grid of that cell size so each
/// attempt only checks the neighbouring cells.
pub fn parking_lot(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let attempts = params.usize_at_least("attempts", 1)?;
    let side = params.f64("side")?;
    let crash = params.f64("crash_distance")?;
    let mean = params.f64("mean")?;
    let sigma = params.f64("sigma")?;
    if side <= 0.0 {
        return Err(TestError::InvalidParameter {
            name: "side".into(),
            reason: format!("must be positive, got {side}"),
        });
    }
    if crash <= 0.0 || side / crash > MAX_GRID_CELLS {
        return Err(TestError::InvalidParameter {
            name: "crash_distance".into(),
            reason: format!("must be at least side / {MAX_GRID_CELLS:e}, got {crash}"),
        });
    }

    let uniforms = stream.uniforms();
    if uniforms.len() < 2 * attempts {
        return Err(insufficient(2 * attempts, uniforms.len(), "values"));
    }

    let cell_of = |v: f64| (v / crash).floor() as i64;
    let mut lot: HashMap<(i64, i64), Vec<(f64, f64)>> = HashMap::new();
    let mut parked = 0usize;
    for pair in uniforms[..2 * attempts].chunks_exact(2) {
        let (x, y) = (pair[0] * side, pair[1] * side);
        let (cx, cy) = (cell_of(x), cell_of(y));
        let crashed = (cx - 1..=cx + 1).any(|gx| {
            (cy - 1..=cy + 1).any(|gy| {
                lot.get(&(gx, gy)).is_some_and(|cars| {
                    cars.iter()
                        .any(|&(px, py)| (px - x).abs() <= crash && (py - y).abs() <= crash)
                })
            })
        });
        if !crashed {
            lot.entry((cx, cy)).or_default().push((x, y));
            parked += 1;
        }
    }

    z_test(
        parked as f64,
        mean,
        sigma * sigma,
        format!("attempts={attempts}, parked={parked}, expected={mean}"),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Minimum distance
// ═══════════════════════════════════════════════════════════════════════════════

/// Smallest squared Euclidean distance between any two points.
///
/// Sorts by the first coordinate and sweeps, stopping each inner scan once
/// the first-axis gap alone exceeds the best distance.
pub fn min_distance_sq<const D: usize>(points: &mut [[f64; D]]) -> f64 {
    points.sort_by(|a, b| a[0].total_cmp(&b[0]));
    let mut best = f64::INFINITY;
    for i in 0..points.len() {
        for j in i + 1..points.len() {
            let dx = points[j][0] - points[i][0];
            if dx * dx >= best {
                break;
            }
            let d: f64 = (0..D)
                .map(|axis| {
                    let delta = points[j][axis] - points[i][axis];
                    delta * delta
                })
                .sum();
            if d < best {
                best = d;
            }
        }
    }
    best
}

/// Per-trial minimum distances for `trials` batches of `points` points in a
/// cube of the given side, drawn from consecutive uniforms.
fn trial_minimum_distances<const D: usize>(
    uniforms: &[f64],
    points: usize,
    side: f64,
    trials: usize,
) -> Vec<f64> {
    uniforms
        .chunks_exact(points * D)
        .take(trials)
        .map(|batch| {
            let mut cloud: Vec<[f64; D]> = batch
                .chunks_exact(D)
                .map(|c| {
                    let mut p = [0.0; D];
                    for (dst, &u) in p.iter_mut().zip(c) {
                        *dst = u * side;
                    }
                    p
                })
                .collect();
            min_distance_sq(&mut cloud).sqrt()
        })
        .collect()
}

fn trial_geometry(
    params: &Params,
    values_per_trial: usize,
    available: usize,
) -> Result<(usize, f64, usize), TestError> {
    let points = params.usize_at_least("points", 2)?;
    let side = params.f64("side")?;
    if side <= 0.0 {
        return Err(TestError::InvalidParameter {
            name: "side".into(),
            reason: format!("must be positive, got {side}"),
        });
    }
    let requested = params.usize_at_least("trials", 1)?;
    let min_trials = params.usize_at_least("min_trials", 1)?;
    let trials = requested.min(available / (points * values_per_trial));
    if trials < min_trials {
        return Err(insufficient(
            min_trials * points * values_per_trial,
            available,
            "values",
        ));
    }
    Ok((points, side, trials))
}

/// Test 7: Minimum distance -- smallest pairwise distance among random points
/// in a square, repeated over trials.
///
/// `d²` is exponential with mean `2A / (π n(n−1))`; the transformed values
/// `1 − exp(−d²/mean)` are binned and compared with the uniform law.
pub fn minimum_distance(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let uniforms = stream.uniforms();
    let (points, side, trials) = trial_geometry(params, 2, uniforms.len())?;
    let bins = params.usize_in("bins", 2, MAX_BINS)?;

    let n = points as f64;
    let mean = 2.0 * side * side / (PI * n * (n - 1.0));
    let mut counts = vec![0u64; bins];
    let distances = trial_minimum_distances::<2>(&uniforms, points, side, trials);
    for &d in &distances {
        let u = 1.0 - (-(d * d) / mean).exp();
        let bin = ((u * bins as f64) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    let probabilities = vec![1.0 / bins as f64; bins];
    let (chi2, df, p) = chi_square_against(&counts, &probabilities)?;

    let mean_d = distances.iter().sum::<f64>() / trials as f64;
    Ok(Evaluation::new(
        p,
        chi2,
        format!("trials={trials}, points={points}, mean_min_distance={mean_d:.4}, df={df}"),
    ))
}

/// Test 8: 3D spheres -- smallest nearest-neighbour distance in a cube.
///
/// `d³` is exponential with mean `3V / (2π n(n−1))`; the transformed values
/// are tested against the uniform law with Kolmogorov-Smirnov.
pub fn sphere_3d(stream: &CanonicalStream, params: &Params) -> Result<Evaluation, TestError> {
    let uniforms = stream.uniforms();
    let (points, side, trials) = trial_geometry(params, 3, uniforms.len())?;

    let n = points as f64;
    let mean = 3.0 * side.powi(3) / (2.0 * PI * n * (n - 1.0));
    let distances = trial_minimum_distances::<3>(&uniforms, points, side, trials);
    let transformed: Vec<f64> = distances
        .iter()
        .map(|&d| 1.0 - (-d.powi(3) / mean).exp())
        .collect();
    let ks = stats::ks_statistic(&transformed);
    let p = stats::ks_p_value(ks, transformed.len());

    let mean_cube = distances.iter().map(|d| d.powi(3)).sum::<f64>() / trials as f64;
    Ok(Evaluation::new(
        p,
        ks,
        format!("trials={trials}, mean r^3={mean_cube:.3}, expected={mean:.3}"),
    ))
}
