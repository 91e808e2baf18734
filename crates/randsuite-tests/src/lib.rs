//! Diehard and TestU01 inspired randomness test battery.
//!
//! Provides 28 statistical tests over a [`CanonicalStream`], grouped in three
//! families:
//!
//! - [`spacing`]: birthday spacings (closed-form and Diehard), collisions, sparse occupancy (OPSO, OQSO,
//!   DNA), parking lot, minimum distance in 2D and 3D.
//! - [`structural`]: binary and square matrix rank, linear complexity, serial,
//!   poker, coupon collector, longest run, gap, autocorrelation, count-the-1s.
//! - [`sequential`]: runs, runs up and down, craps, OPERM5, squeeze,
//!   overlapping sums, bitstream.
//!
//! Each test returns a [`TestOutcome`] with a p-value in `[0, 1]` and a
//! [`Verdict`] at α = 0.01, or the sentinel p-value `-1` with a diagnostic when
//! the test could not be evaluated on the given data.
//!
//! ```no_run
//! use randsuite_core::{RawInput, normalize};
//! use randsuite_tests::Registry;
//!
//! let stream = normalize(&RawInput::ByteBuffer(vec![0x5A; 1 << 20]), 32).unwrap();
//! let registry = Registry::standard();
//! let ids = registry.select(&["all"]).unwrap();
//! let results = registry.run(&stream, &ids, &Default::default()).unwrap();
//! print!("{}", results.to_tsv());
//! ```

pub mod algebra;
pub mod params;
pub mod registry;
pub mod report;
pub mod runner;
pub mod sequential;
pub mod spacing;
pub mod stats;
pub mod structural;

pub use randsuite_core::CanonicalStream;
pub use registry::{Algorithm, Family, Registry, Suite, TestId, TestSpec};
pub use report::{ResultEntry, ResultSet};

use serde::Serialize;
use thiserror::Error;

/// Significance level for the Random / Non-Random verdict.
pub const SIGNIFICANCE_LEVEL: f64 = 0.01;

/// p-value reported for a test that could not be evaluated.
pub const UNTESTABLE_P_VALUE: f64 = -1.0;

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Random,
    #[serde(rename = "Non-Random")]
    NonRandom,
}

impl Verdict {
    /// `Random` iff `p > α`. The sentinel and NaN are never random.
    pub fn from_p(p_value: f64) -> Self {
        if p_value > SIGNIFICANCE_LEVEL {
            Self::Random
        } else {
            Self::NonRandom
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Random => write!(f, "Random"),
            Self::NonRandom => write!(f, "Non-Random"),
        }
    }
}

/// What a test algorithm computes before the verdict is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub p_value: f64,
    pub statistic: f64,
    pub details: String,
}

impl Evaluation {
    pub fn new(p_value: f64, statistic: f64, details: impl Into<String>) -> Self {
        Self {
            p_value,
            statistic,
            details: details.into(),
        }
    }
}

/// Result of a single randomness test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestOutcome {
    /// In `[0, 1]`, or [`UNTESTABLE_P_VALUE`].
    pub p_value: f64,
    pub verdict: Verdict,
    pub statistic: Option<f64>,
    pub details: String,
    /// Why the test could not be evaluated. Set only for the sentinel.
    pub diagnostic: Option<String>,
}

impl TestOutcome {
    pub fn from_evaluation(evaluation: Evaluation) -> Self {
        if !evaluation.p_value.is_finite() {
            return Self::untestable(format!(
                "p-value is not finite (statistic {})",
                evaluation.statistic
            ));
        }
        let p_value = evaluation.p_value.clamp(0.0, 1.0);
        Self {
            p_value,
            verdict: Verdict::from_p(p_value),
            statistic: Some(evaluation.statistic),
            details: evaluation.details,
            diagnostic: None,
        }
    }

    /// The sentinel outcome: p = -1, Non-Random, with a reason.
    pub fn untestable(reason: impl Into<String>) -> Self {
        Self {
            p_value: UNTESTABLE_P_VALUE,
            verdict: Verdict::NonRandom,
            statistic: None,
            details: String::new(),
            diagnostic: Some(reason.into()),
        }
    }

    pub fn is_untestable(&self) -> bool {
        self.diagnostic.is_some()
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Random
    }
}

impl From<Result<Evaluation, TestError>> for TestOutcome {
    fn from(result: Result<Evaluation, TestError>) -> Self {
        match result {
            Ok(evaluation) => Self::from_evaluation(evaluation),
            Err(err) => Self::untestable(err.to_string()),
        }
    }
}

/// Per-test failure, absorbed into a sentinel [`TestOutcome`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TestError {
    #[error("insufficient data: need {needed} {unit}, got {got}")]
    InsufficientData {
        needed: usize,
        got: usize,
        unit: &'static str,
    },

    #[error("degenerate variance: {0}")]
    DegenerateVariance(String),

    #[error("degenerate alphabet: {0}")]
    DegenerateAlphabet(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("{0}")]
    Structural(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Error for a sample that is too small for the requested geometry.
pub(crate) fn insufficient(needed: usize, got: usize, unit: &'static str) -> TestError {
    TestError::InsufficientData { needed, got, unit }
}

/// Standardize `observed` against a normal null and return its two-sided
/// p-value as an evaluation.
pub(crate) fn z_test(
    observed: f64,
    mean: f64,
    variance: f64,
    details: String,
) -> Result<Evaluation, TestError> {
    if !variance.is_finite() || variance <= 0.0 {
        return Err(TestError::DegenerateVariance(format!(
            "null variance is {variance}"
        )));
    }
    let z = (observed - mean) / variance.sqrt();
    Ok(Evaluation::new(stats::two_sided_p(z), z, details))
}

/// Chi-square goodness of fit after pooling bins that expect fewer than
/// [`stats::MIN_EXPECTED`] observations. Returns `(statistic, df, p)`.
pub(crate) fn pooled_chi_square(
    observed: &[f64],
    expected: &[f64],
) -> Result<(f64, usize, f64), TestError> {
    let (obs, exp) = stats::merge_sparse_bins(observed, expected, stats::MIN_EXPECTED);
    if obs.len() < 2 {
        return Err(TestError::DegenerateAlphabet(format!(
            "only {} bin(s) left after pooling sparse bins",
            obs.len()
        )));
    }
    let chi2 = stats::chi_square_statistic(&obs, &exp);
    let df = obs.len() - 1;
    Ok((chi2, df, stats::chi_square_sf(chi2, df as f64)))
}

/// Chi-square against bin probabilities; expectations are `p · total`.
pub(crate) fn chi_square_against(
    counts: &[u64],
    probabilities: &[f64],
) -> Result<(f64, usize, f64), TestError> {
    let total: u64 = counts.iter().sum();
    let observed: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
    let expected: Vec<f64> = probabilities.iter().map(|p| p * total as f64).collect();
    pooled_chi_square(&observed, &expected)
}
