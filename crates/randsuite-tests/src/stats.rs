//! Numeric kernels shared by the test families.
//!
//! Normal and chi-square tail probabilities are built on the regularized
//! incomplete gamma function, evaluated by series below `a + 1` and by a
//! Lentz continued fraction above it.

use std::f64::consts::{PI, SQRT_2};

const EPS: f64 = 1e-15;
const FPMIN: f64 = 1e-300;
const MAX_ITER: usize = 100_000;

/// Minimum expected count per bin before a chi-square bin is pooled.
pub const MIN_EXPECTED: f64 = 5.0;

const LANCZOS_G: f64 = 7.0;
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_13,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

// ═══════════════════════════════════════════════════════════════════════════════
// Gamma family
// ═══════════════════════════════════════════════════════════════════════════════

/// Natural log of the gamma function (Lanczos, g = 7).
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection.
        return (PI / (PI * x).sin()).abs().ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut a = LANCZOS[0];
    let t = x + LANCZOS_G + 0.5;
    for (i, &c) in LANCZOS.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// Regularized upper incomplete gamma function Q(a, x).
///
/// Returns NaN for `a <= 0`.
pub fn gamma_q(a: f64, x: f64) -> f64 {
    if a <= 0.0 || x.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 1.0;
    }
    if x < a + 1.0 {
        (1.0 - gamma_p_series(a, x)).max(0.0)
    } else {
        gamma_q_continued_fraction(a, x)
    }
}

/// Regularized lower incomplete gamma function P(a, x).
pub fn gamma_p(a: f64, x: f64) -> f64 {
    if a <= 0.0 || x.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 0.0;
    }
    if x < a + 1.0 {
        gamma_p_series(a, x)
    } else {
        (1.0 - gamma_q_continued_fraction(a, x)).max(0.0)
    }
}

fn gamma_p_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut del = 1.0 / a;
    let mut sum = del;
    for _ in 0..MAX_ITER {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * EPS {
            break;
        }
    }
    (sum * (-x + a * x.ln() - ln_gamma(a)).exp()).min(1.0)
}

fn gamma_q_continued_fraction(a: f64, x: f64) -> f64 {
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..MAX_ITER {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = b + an / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    ((-x + a * x.ln() - ln_gamma(a)).exp() * h).clamp(0.0, 1.0)
}

/// `ln C(n, k)`.
pub fn ln_binomial(n: u64, k: u64) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    ln_gamma(n as f64 + 1.0) - ln_gamma(k as f64 + 1.0) - ln_gamma((n - k) as f64 + 1.0)
}

/// Binomial probability mass `P(X = k)` for `X ~ B(n, p)`.
pub fn binomial_pmf(n: u64, k: u64, p: f64) -> f64 {
    if k > n {
        return 0.0;
    }
    if p <= 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    if p >= 1.0 {
        return if k == n { 1.0 } else { 0.0 };
    }
    (ln_binomial(n, k) + k as f64 * p.ln() + (n - k) as f64 * (1.0 - p).ln()).exp()
}

/// Poisson probability `P(X = k)` for mean `lambda`.
pub fn poisson_pmf(k: u64, lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    (k as f64 * lambda.ln() - lambda - ln_gamma(k as f64 + 1.0)).exp()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Normal distribution
// ═══════════════════════════════════════════════════════════════════════════════

/// Complementary error function.
pub fn erfc(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x >= 0.0 {
        gamma_q(0.5, x * x)
    } else {
        2.0 - gamma_q(0.5, x * x)
    }
}

pub fn erf(x: f64) -> f64 {
    1.0 - erfc(x)
}

/// Standard normal CDF Φ(z).
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

/// Two-sided p-value of a standard normal score: `2·(1 − Φ(|z|))`.
pub fn two_sided_p(z: f64) -> f64 {
    erfc(z.abs() / SQRT_2)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Chi-square
// ═══════════════════════════════════════════════════════════════════════════════

/// Chi-square survival function Q(x; k) = Q(k/2, x/2).
pub fn chi_square_sf(x: f64, df: f64) -> f64 {
    if x <= 0.0 {
        return if df > 0.0 { 1.0 } else { f64::NAN };
    }
    gamma_q(df / 2.0, x / 2.0)
}

/// Σ (o − e)² / e over bins with positive expectation.
pub fn chi_square_statistic(observed: &[f64], expected: &[f64]) -> f64 {
    observed
        .iter()
        .zip(expected)
        .filter(|&(_, &e)| e > 0.0)
        .map(|(&o, &e)| (o - e) * (o - e) / e)
        .sum()
}

/// Pool adjacent bins, left to right, until every bin expects at least
/// `min_expected`. A short tail is folded into the last complete bin.
pub fn merge_sparse_bins(
    observed: &[f64],
    expected: &[f64],
    min_expected: f64,
) -> (Vec<f64>, Vec<f64>) {
    let mut merged_obs = Vec::new();
    let mut merged_exp = Vec::new();
    let mut acc_obs = 0.0;
    let mut acc_exp = 0.0;
    for (&o, &e) in observed.iter().zip(expected) {
        acc_obs += o;
        acc_exp += e;
        if acc_exp >= min_expected {
            merged_obs.push(acc_obs);
            merged_exp.push(acc_exp);
            acc_obs = 0.0;
            acc_exp = 0.0;
        }
    }
    if acc_exp > 0.0 || acc_obs > 0.0 {
        match (merged_obs.last_mut(), merged_exp.last_mut()) {
            (Some(o), Some(e)) => {
                *o += acc_obs;
                *e += acc_exp;
            }
            _ => {
                merged_obs.push(acc_obs);
                merged_exp.push(acc_exp);
            }
        }
    }
    (merged_obs, merged_exp)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Kolmogorov-Smirnov
// ═══════════════════════════════════════════════════════════════════════════════

/// KS distance between the empirical CDF of `samples` and U(0, 1).
pub fn ks_statistic(samples: &[f64]) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    sorted
        .iter()
        .enumerate()
        .map(|(i, &u)| {
            let above = (i as f64 + 1.0) / n - u;
            let below = u - i as f64 / n;
            above.max(below)
        })
        .fold(0.0, f64::max)
}

/// Asymptotic KS p-value with Stephens' small-sample correction.
pub fn ks_p_value(d: f64, n: usize) -> f64 {
    let sqrt_n = (n as f64).sqrt();
    let lambda = (sqrt_n + 0.12 + 0.11 / sqrt_n) * d;
    if lambda < 0.2 {
        return 1.0;
    }
    let mut sum = 0.0;
    for j in 1..=100 {
        let j = j as f64;
        let term = (-2.0 * j * j * lambda * lambda).exp();
        sum += if j as u64 % 2 == 1 { term } else { -term };
        if term < 1e-16 {
            break;
        }
    }
    (2.0 * sum).clamp(0.0, 1.0)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Combinatorics
// ═══════════════════════════════════════════════════════════════════════════════

/// Natural logs of the Stirling numbers of the second kind, `table[n][k] =
/// ln S(n, k)` for `0 <= k <= n <= max_n`, with `−∞` where `S(n, k) = 0`.
///
/// `S(n, k) = k·S(n−1, k) + S(n−1, k−1)` is carried in log space so large
/// `n` stays finite.
pub fn ln_stirling2_table(max_n: usize) -> Vec<Vec<f64>> {
    let mut table = vec![vec![f64::NEG_INFINITY; max_n + 1]; max_n + 1];
    table[0][0] = 0.0;
    for n in 1..=max_n {
        for k in 1..=n {
            table[n][k] = ln_add_exp((k as f64).ln() + table[n - 1][k], table[n - 1][k - 1]);
        }
    }
    table
}

/// `ln(e^a + e^b)` without overflow.
fn ln_add_exp(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    if hi == f64::NEG_INFINITY {
        return hi;
    }
    hi + (lo - hi).exp().ln_1p()
}

/// `ln(d·(d−1)···(d−r+1))`; `−∞` when `r > d`.
pub fn ln_falling_factorial(d: usize, r: usize) -> f64 {
    if r > d {
        return f64::NEG_INFINITY;
    }
    (0..r).map(|i| ((d - i) as f64).ln()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol * b.abs().max(1e-300) || (a - b).abs() < 1e-14
    }

    #[test]
    fn test_ln_gamma_matches_factorials() {
        assert!(ln_gamma(1.0).abs() < 1e-12);
        assert!(ln_gamma(2.0).abs() < 1e-12);
        assert!((ln_gamma(5.0) - 24f64.ln()).abs() < 1e-12);
        assert!((ln_gamma(0.5) - PI.sqrt().ln()).abs() < 1e-12);
        for x in [0.1, 0.7, 3.3, 17.5, 120.0] {
            let expected = statrs::function::gamma::ln_gamma(x);
            assert!(close(ln_gamma(x), expected, 1e-10), "x={x}");
        }
    }

    #[test]
    fn test_erfc_against_statrs() {
        for x in [-3.0, -0.5, 0.0, 0.1, 0.5, 1.0, 2.0, 4.0, 6.0] {
            let expected = statrs::function::erf::erfc(x);
            assert!(close(erfc(x), expected, 1e-9), "x={x}");
        }
        assert!((erf(0.0)).abs() < 1e-15);
    }

    #[test]
    fn test_normal_cdf_against_statrs() {
        let normal = Normal::new(0.0, 1.0).unwrap();
        for z in [-5.0, -1.96, -0.3, 0.0, 0.3, 1.0, 2.575, 6.0] {
            assert!(close(normal_cdf(z), normal.cdf(z), 1e-9), "z={z}");
        }
    }

    #[test]
    fn test_two_sided_p() {
        assert!((two_sided_p(0.0) - 1.0).abs() < 1e-12);
        assert!((two_sided_p(1.959_963_985) - 0.05).abs() < 1e-8);
        assert!((two_sided_p(-2.575_829_304) - 0.01).abs() < 1e-8);
    }

    #[test]
    fn test_chi_square_sf_against_statrs() {
        for df in [1.0, 2.0, 6.0, 9.0, 96.0, 119.0, 1023.0] {
            let dist = ChiSquared::new(df).unwrap();
            for x in [0.1, 1.0, df * 0.5, df, df * 1.5] {
                let expected = dist.sf(x);
                let got = chi_square_sf(x, df);
                assert!(
                    (got - expected).abs() < 1e-10 || close(got, expected, 1e-6),
                    "df={df} x={x}: {got} vs {expected}"
                );
            }
        }
    }

    #[test]
    fn test_chi_square_sf_edges() {
        assert_eq!(chi_square_sf(0.0, 3.0), 1.0);
        assert!(chi_square_sf(1e6, 3.0) < 1e-100);
        assert!(chi_square_sf(1.0, 0.0).is_nan());
    }

    #[test]
    fn test_gamma_p_plus_q_is_one() {
        for (a, x) in [(0.5, 0.2), (3.0, 2.0), (3.0, 7.0), (50.0, 45.0)] {
            assert!((gamma_p(a, x) + gamma_q(a, x) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_chi_square_statistic_skips_empty_bins() {
        let chi2 = chi_square_statistic(&[10.0, 0.0, 30.0], &[20.0, 0.0, 20.0]);
        assert!((chi2 - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_merge_sparse_bins() {
        let (obs, exp) = merge_sparse_bins(
            &[1.0, 2.0, 10.0, 1.0, 1.0],
            &[2.0, 3.0, 10.0, 2.0, 1.0],
            5.0,
        );
        assert_eq!(obs, vec![3.0, 12.0]);
        assert_eq!(exp, vec![5.0, 13.0]);
        let total: f64 = exp.iter().sum();
        assert!((total - 18.0).abs() < 1e-12);
    }

    #[test]
    fn test_merge_sparse_bins_all_small() {
        let (obs, exp) = merge_sparse_bins(&[1.0, 1.0], &[1.0, 1.0], 5.0);
        assert_eq!(obs, vec![2.0]);
        assert_eq!(exp, vec![2.0]);
    }

    #[test]
    fn test_ks_uniform_grid_is_tight() {
        let samples: Vec<f64> = (0..1000).map(|i| (i as f64 + 0.5) / 1000.0).collect();
        let d = ks_statistic(&samples);
        assert!((d - 0.0005).abs() < 1e-12);
        assert!(ks_p_value(d, samples.len()) > 0.99);
    }

    #[test]
    fn test_ks_detects_skew() {
        let samples: Vec<f64> = (0..500).map(|i| (i as f64 / 500.0).powi(3)).collect();
        let d = ks_statistic(&samples);
        assert!(ks_p_value(d, samples.len()) < 1e-6);
    }

    #[test]
    fn test_stirling2_known_values() {
        let s = ln_stirling2_table(10);
        let at = |n: usize, k: usize| s[n][k].exp().round();
        assert_eq!(s[0][0], 0.0);
        assert_eq!(s[5][0], f64::NEG_INFINITY);
        assert_eq!(at(5, 2), 15.0);
        assert_eq!(at(5, 3), 25.0);
        assert_eq!(at(10, 4), 34_105.0);
        let bell5: f64 = (0..=5).map(|k| at(5, k)).sum();
        assert_eq!(bell5, 52.0);
    }

    #[test]
    fn test_ln_stirling2_stays_finite_for_long_rows() {
        // S(n, 1) = 1 and S(n, n−1) = n(n−1)/2 at any size.
        let s = ln_stirling2_table(600);
        assert_eq!(s[600][1], 0.0);
        assert!(close(s[600][599], (600.0f64 * 599.0 / 2.0).ln(), 1e-12));
        // S(511, 7) is about 7^511 / 7!, far beyond f64 range.
        let expected = 511.0 * 7f64.ln() - ln_gamma(8.0);
        assert!(s[511][7].is_finite());
        assert!(close(s[511][7], expected, 1e-9));
    }

    #[test]
    fn test_poisson_pmf_matches_statrs() {
        use statrs::distribution::{Discrete, Poisson};
        let reference = Poisson::new(2.0).unwrap();
        for k in 0..20 {
            assert!(close(poisson_pmf(k, 2.0), reference.pmf(k), 1e-12), "k = {k}");
        }
        assert_eq!(poisson_pmf(0, 0.0), 1.0);
        assert_eq!(poisson_pmf(3, 0.0), 0.0);
    }

    #[test]
    fn test_binomial_pmf_sums_to_one() {
        let total: f64 = (0..=8).map(|k| binomial_pmf(8, k, 0.5)).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((binomial_pmf(8, 4, 0.5) - 70.0 / 256.0).abs() < 1e-12);
        assert!((ln_falling_factorial(8, 3) - 336f64.ln()).abs() < 1e-12);
        assert_eq!(ln_falling_factorial(3, 4), f64::NEG_INFINITY);
    }
}
