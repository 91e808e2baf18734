//! The test catalog and dispatch.
//!
//! [`Registry::standard`] is a static, ordered, read-only table of every test.
//! Selection and override validation happen here, before anything runs, so
//! that input-tier problems (unknown test, unknown parameter) are reported to
//! the caller instead of being folded into per-test outcomes.

use std::collections::BTreeSet;
use std::time::Instant;

use randsuite_core::{CanonicalStream, Error, Overrides, ParamValue, Params};
use serde::Serialize;
use serde::ser::SerializeStruct;

use crate::report::{ResultEntry, ResultSet};
use crate::runner::{self, Job};
use crate::{Evaluation, TestError, sequential, spacing, structural};

/// Signature every test algorithm implements.
pub type Algorithm = fn(&CanonicalStream, &Params) -> Result<Evaluation, TestError>;

/// Stable numeric test identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TestId(pub u32);

impl std::fmt::Display for TestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Battery a test originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Suite {
    Diehard,
    TestU01,
}

impl Suite {
    pub fn key(self) -> &'static str {
        match self {
            Self::Diehard => "diehard",
            Self::TestU01 => "testu01",
        }
    }
}

impl std::fmt::Display for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Diehard => write!(f, "Diehard"),
            Self::TestU01 => write!(f, "TestU01"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    SpacingOccupancy,
    StructuralCombinatorial,
    SequentialStochastic,
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SpacingOccupancy => write!(f, "Spacing/Occupancy"),
            Self::StructuralCombinatorial => write!(f, "Structural/Combinatorial"),
            Self::SequentialStochastic => write!(f, "Sequential/Stochastic"),
        }
    }
}

/// A registered test: identity, provenance, parameter defaults, algorithm.
#[derive(Debug, Clone)]
pub struct TestSpec {
    pub id: TestId,
    pub key: &'static str,
    pub name: &'static str,
    pub suite: Suite,
    pub family: Family,
    pub defaults: &'static [(&'static str, ParamValue)],
    pub algorithm: Algorithm,
}

impl TestSpec {
    pub fn default_params(&self) -> Params {
        self.defaults
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.defaults.iter().any(|(n, _)| *n == name)
    }
}

impl Serialize for TestSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("TestSpec", 6)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("key", self.key)?;
        s.serialize_field("name", self.name)?;
        s.serialize_field("suite", &self.suite)?;
        s.serialize_field("family", &self.family)?;
        s.serialize_field("defaults", &self.default_params())?;
        s.end()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Catalog
// ═══════════════════════════════════════════════════════════════════════════════

const fn int(v: i64) -> ParamValue {
    ParamValue::Int(v)
}

const fn float(v: f64) -> ParamValue {
    ParamValue::Float(v)
}

const OCCUPANCY_DEFAULTS: &[(&str, ParamValue)] =
    &[("words", int(2_097_152)), ("min_words", int(4096))];

static CATALOG: [TestSpec; 28] = [
    // Spacing / occupancy
    TestSpec {
        id: TestId(1),
        key: "birthday_spacings",
        name: "Birthday Spacings",
        suite: Suite::TestU01,
        family: Family::SpacingOccupancy,
        defaults: &[("n", int(10)), ("m", int(1000))],
        algorithm: spacing::birthday_spacings,
    },
    TestSpec {
        id: TestId(2),
        key: "collision",
        name: "Collision",
        suite: Suite::TestU01,
        family: Family::SpacingOccupancy,
        defaults: &[("space", int(65536)), ("samples", int(4096))],
        algorithm: spacing::collision,
    },
    TestSpec {
        id: TestId(3),
        key: "opso",
        name: "OPSO",
        suite: Suite::Diehard,
        family: Family::SpacingOccupancy,
        defaults: OCCUPANCY_DEFAULTS,
        algorithm: spacing::opso,
    },
    TestSpec {
        id: TestId(4),
        key: "oqso",
        name: "OQSO",
        suite: Suite::Diehard,
        family: Family::SpacingOccupancy,
        defaults: OCCUPANCY_DEFAULTS,
        algorithm: spacing::oqso,
    },
    TestSpec {
        id: TestId(5),
        key: "dna",
        name: "DNA",
        suite: Suite::Diehard,
        family: Family::SpacingOccupancy,
        defaults: OCCUPANCY_DEFAULTS,
        algorithm: spacing::dna,
    },
    TestSpec {
        id: TestId(6),
        key: "parking_lot",
        name: "Parking Lot",
        suite: Suite::Diehard,
        family: Family::SpacingOccupancy,
        defaults: &[
            ("attempts", int(12_000)),
            ("side", float(100.0)),
            ("crash_distance", float(1.0)),
            ("mean", float(3523.0)),
            ("sigma", float(21.9)),
        ],
        algorithm: spacing::parking_lot,
    },
    TestSpec {
        id: TestId(7),
        key: "minimum_distance",
        name: "Minimum Distance",
        suite: Suite::Diehard,
        family: Family::SpacingOccupancy,
        defaults: &[
            ("points", int(8000)),
            ("side", float(10_000.0)),
            ("trials", int(100)),
            ("min_trials", int(10)),
            ("bins", int(10)),
        ],
        algorithm: spacing::minimum_distance,
    },
    TestSpec {
        id: TestId(8),
        key: "sphere_3d",
        name: "3D Spheres",
        suite: Suite::Diehard,
        family: Family::SpacingOccupancy,
        defaults: &[
            ("points", int(4000)),
            ("side", float(1000.0)),
            ("trials", int(20)),
            ("min_trials", int(5)),
        ],
        algorithm: spacing::sphere_3d,
    },
    // Structural / combinatorial
    TestSpec {
        id: TestId(9),
        key: "binary_rank_32x32",
        name: "Binary Rank 32x32",
        suite: Suite::Diehard,
        family: Family::StructuralCombinatorial,
        defaults: &[("min_matrices", int(38)), ("max_matrices", int(0))],
        algorithm: structural::binary_rank_32x32,
    },
    TestSpec {
        id: TestId(10),
        key: "binary_rank_6x8",
        name: "Binary Rank 6x8",
        suite: Suite::Diehard,
        family: Family::StructuralCombinatorial,
        defaults: &[("min_matrices", int(100)), ("max_matrices", int(0))],
        algorithm: structural::binary_rank_6x8,
    },
    TestSpec {
        id: TestId(11),
        key: "matrix_rank",
        name: "Matrix Rank",
        suite: Suite::TestU01,
        family: Family::StructuralCombinatorial,
        defaults: &[("size", int(0)), ("min_matrices", int(20))],
        algorithm: structural::matrix_rank,
    },
    TestSpec {
        id: TestId(12),
        key: "linear_complexity",
        name: "Linear Complexity",
        suite: Suite::TestU01,
        family: Family::StructuralCombinatorial,
        defaults: &[
            ("block_size", int(500)),
            ("min_blocks", int(10)),
            ("max_blocks", int(500)),
        ],
        algorithm: structural::linear_complexity,
    },
    TestSpec {
        id: TestId(13),
        key: "serial",
        name: "Serial",
        suite: Suite::TestU01,
        family: Family::StructuralCombinatorial,
        defaults: &[("block_size", int(3))],
        algorithm: structural::serial,
    },
    TestSpec {
        id: TestId(14),
        key: "simple_poker",
        name: "Simple Poker",
        suite: Suite::TestU01,
        family: Family::StructuralCombinatorial,
        defaults: &[
            ("hand_size", int(5)),
            ("alphabet", int(8)),
            ("min_hands", int(100)),
        ],
        algorithm: structural::simple_poker,
    },
    TestSpec {
        id: TestId(15),
        key: "coupon_collector",
        name: "Coupon Collector",
        suite: Suite::TestU01,
        family: Family::StructuralCombinatorial,
        defaults: &[
            ("alphabet", int(8)),
            ("max_length", int(40)),
            ("min_segments", int(100)),
        ],
        algorithm: structural::coupon_collector,
    },
    TestSpec {
        id: TestId(16),
        key: "longest_run",
        name: "Longest Run",
        suite: Suite::TestU01,
        family: Family::StructuralCombinatorial,
        defaults: &[("block_size", int(10)), ("symbol", int(1))],
        algorithm: structural::longest_run,
    },
    TestSpec {
        id: TestId(17),
        key: "gap",
        name: "Gap",
        suite: Suite::TestU01,
        family: Family::StructuralCombinatorial,
        defaults: &[
            ("alpha", float(0.0)),
            ("beta", float(0.5)),
            ("max_gap", int(10)),
            ("min_gaps", int(50)),
        ],
        algorithm: structural::gap,
    },
    TestSpec {
        id: TestId(18),
        key: "autocorrelation",
        name: "Autocorrelation",
        suite: Suite::TestU01,
        family: Family::StructuralCombinatorial,
        defaults: &[("lag", int(5))],
        algorithm: structural::autocorrelation,
    },
    TestSpec {
        id: TestId(19),
        key: "count_ones_stream",
        name: "Count the 1s (Stream)",
        suite: Suite::Diehard,
        family: Family::StructuralCombinatorial,
        defaults: &[("block_size", int(8)), ("samples", int(1_000_000))],
        algorithm: structural::count_ones_stream,
    },
    TestSpec {
        id: TestId(20),
        key: "count_ones_byte",
        name: "Count the 1s (Byte)",
        suite: Suite::Diehard,
        family: Family::StructuralCombinatorial,
        defaults: &[("samples", int(1_000_000))],
        algorithm: structural::count_ones_byte,
    },
    // Sequential / stochastic
    TestSpec {
        id: TestId(21),
        key: "runs",
        name: "Runs",
        suite: Suite::TestU01,
        family: Family::SequentialStochastic,
        defaults: &[],
        algorithm: sequential::runs,
    },
    TestSpec {
        id: TestId(22),
        key: "runs_up_down",
        name: "Runs Up and Down",
        suite: Suite::Diehard,
        family: Family::SequentialStochastic,
        defaults: &[("min_values", int(20))],
        algorithm: sequential::runs_up_down,
    },
    TestSpec {
        id: TestId(23),
        key: "craps",
        name: "Craps",
        suite: Suite::Diehard,
        family: Family::SequentialStochastic,
        defaults: &[("max_games", int(0)), ("min_games", int(20))],
        algorithm: sequential::craps,
    },
    TestSpec {
        id: TestId(24),
        key: "operm5",
        name: "OPERM5",
        suite: Suite::Diehard,
        family: Family::SequentialStochastic,
        defaults: &[
            ("overlap", ParamValue::Bool(true)),
            ("samples", int(1_000_000)),
            ("min_samples", int(600)),
        ],
        algorithm: sequential::operm5,
    },
    TestSpec {
        id: TestId(25),
        key: "squeeze",
        name: "Squeeze",
        suite: Suite::Diehard,
        family: Family::SequentialStochastic,
        defaults: &[("trials", int(100_000)), ("min_trials", int(100))],
        algorithm: sequential::squeeze,
    },
    TestSpec {
        id: TestId(26),
        key: "overlapping_sums",
        name: "Overlapping Sums",
        suite: Suite::Diehard,
        family: Family::SequentialStochastic,
        defaults: &[
            ("window", int(100)),
            ("stride", int(0)),
            ("sums", int(1000)),
            ("min_sums", int(100)),
            ("bins", int(10)),
        ],
        algorithm: sequential::overlapping_sums,
    },
    TestSpec {
        id: TestId(27),
        key: "bitstream",
        name: "Bitstream",
        suite: Suite::Diehard,
        family: Family::SequentialStochastic,
        defaults: OCCUPANCY_DEFAULTS,
        algorithm: sequential::bitstream,
    },
    // Spacing / occupancy, Diehard form of test 1
    TestSpec {
        id: TestId(28),
        key: "diehard_birthday_spacings",
        name: "Birthday Spacings (Diehard)",
        suite: Suite::Diehard,
        family: Family::SpacingOccupancy,
        defaults: &[
            ("n", int(512)),
            ("m", int(16_777_216)),
            ("trials", int(500)),
            ("min_trials", int(20)),
        ],
        algorithm: spacing::diehard_birthday_spacings,
    },
];

// ═══════════════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only view over the test catalog.
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    tests: &'static [TestSpec],
}

impl Registry {
    /// The full catalog in id order.
    pub fn standard() -> Self {
        Self { tests: &CATALOG }
    }

    pub fn tests(&self) -> &'static [TestSpec] {
        self.tests
    }

    pub fn get(&self, id: TestId) -> Option<&'static TestSpec> {
        self.tests.iter().find(|t| t.id == id)
    }

    pub fn by_key(&self, key: &str) -> Option<&'static TestSpec> {
        self.tests.iter().find(|t| t.key.eq_ignore_ascii_case(key))
    }

    /// Find one test by numeric id or key.
    pub fn lookup(&self, selector: &str) -> Option<&'static TestSpec> {
        let selector = selector.trim();
        match selector.parse::<u32>() {
            Ok(id) => self.get(TestId(id)),
            Err(_) => self.by_key(selector),
        }
    }

    /// Resolve selectors (ids, keys, or `all` / `diehard` / `testu01`) into
    /// test ids. Caller order is kept and duplicates are dropped.
    pub fn select<S: AsRef<str>>(&self, selectors: &[S]) -> randsuite_core::Result<Vec<TestId>> {
        let mut seen = BTreeSet::new();
        let mut ids = Vec::new();
        for selector in selectors {
            let selector = selector.as_ref().trim();
            let matched: Vec<TestId> = match selector.to_ascii_lowercase().as_str() {
                "all" => self.tests.iter().map(|t| t.id).collect(),
                "diehard" => self.suite_ids(Suite::Diehard),
                "testu01" => self.suite_ids(Suite::TestU01),
                _ => vec![
                    self.lookup(selector)
                        .ok_or_else(|| Error::UnknownTest(selector.to_string()))?
                        .id,
                ],
            };
            for id in matched {
                if seen.insert(id) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    fn suite_ids(&self, suite: Suite) -> Vec<TestId> {
        self.tests
            .iter()
            .filter(|t| t.suite == suite)
            .map(|t| t.id)
            .collect()
    }

    /// Check every override against the catalog. Unknown selectors and
    /// undeclared parameter names are input errors.
    pub fn validate_overrides(&self, overrides: &Overrides) -> randsuite_core::Result<()> {
        for (selector, params) in overrides {
            let spec = self
                .lookup(selector)
                .ok_or_else(|| Error::UnknownTest(selector.clone()))?;
            if let Some(name) = params.keys().find(|name| !spec.has_param(name)) {
                return Err(Error::UnknownParameter {
                    test: spec.key.to_string(),
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Defaults for `id` with every matching override merged on top.
    pub fn resolve(&self, id: TestId, overrides: &Overrides) -> randsuite_core::Result<Params> {
        self.validate_overrides(overrides)?;
        let spec = self
            .get(id)
            .ok_or_else(|| Error::UnknownTest(id.to_string()))?;
        Ok(self.merge(spec, overrides))
    }

    fn merge(&self, spec: &TestSpec, overrides: &Overrides) -> Params {
        let mut params = spec.default_params();
        for (selector, values) in overrides {
            if self.lookup(selector).is_some_and(|t| t.id == spec.id) {
                params.extend(values.iter().map(|(k, v)| (k.clone(), *v)));
            }
        }
        params
    }

    /// Run the selected tests with the default worker count.
    pub fn run(
        &self,
        stream: &CanonicalStream,
        ids: &[TestId],
        overrides: &Overrides,
    ) -> randsuite_core::Result<ResultSet> {
        self.run_with(stream, ids, overrides, None)
    }

    /// Run the selected tests on `threads` workers (default: available
    /// parallelism). Fails only on input-tier problems, before any test runs.
    pub fn run_with(
        &self,
        stream: &CanonicalStream,
        ids: &[TestId],
        overrides: &Overrides,
        threads: Option<usize>,
    ) -> randsuite_core::Result<ResultSet> {
        self.validate_overrides(overrides)?;

        let mut jobs = Vec::with_capacity(ids.len());
        for &id in ids {
            let spec = self
                .get(id)
                .ok_or_else(|| Error::UnknownTest(id.to_string()))?;
            jobs.push(Job {
                spec,
                params: self.merge(spec, overrides),
            });
        }

        for selector in overrides.keys() {
            match self.lookup(selector) {
                Some(spec) if !ids.contains(&spec.id) => {
                    log::warn!("override for '{selector}' ignored: {} is not selected", spec.key)
                }
                _ => {}
            }
        }

        let workers = runner::worker_count(threads, jobs.len());
        let t0 = Instant::now();
        let outcomes = runner::run_jobs(stream, &jobs, workers);
        let entries = jobs
            .iter()
            .zip(outcomes)
            .map(|(job, outcome)| ResultEntry::new(job.spec, outcome))
            .collect();
        let results = ResultSet::new(entries);

        log::info!(
            "{} tests on {} bits with {} worker(s) in {:.2}s: {} random, {} untestable",
            results.len(),
            stream.input_bits(),
            workers,
            t0.elapsed().as_secs_f64(),
            results.passed(),
            results.untestable()
        );
        Ok(results)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}
