//! Parallel execution of a batch of tests over one shared stream.
//!
//! Tests are pure functions of `(stream, params)`, so the batch is run on a
//! scoped pool of worker threads pulling jobs from a shared counter. Results
//! are written into per-job slots and returned in job order, never completion
//! order.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use randsuite_core::{CanonicalStream, Params};

use crate::TestOutcome;
use crate::registry::TestSpec;

/// One test invocation: the catalog entry and its fully resolved parameters.
#[derive(Debug, Clone)]
pub struct Job<'a> {
    pub spec: &'a TestSpec,
    pub params: Params,
}

/// Worker count: the request if given, otherwise the available parallelism,
/// never more than the number of jobs.
pub fn worker_count(requested: Option<usize>, jobs: usize) -> usize {
    let available = requested.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });
    available.clamp(1, jobs.max(1))
}

/// Run a single test, converting errors and panics into sentinel outcomes.
pub fn run_one(stream: &CanonicalStream, spec: &TestSpec, params: &Params) -> TestOutcome {
    let t0 = Instant::now();
    log::debug!("{} [{}] started", spec.name, spec.id);
    let outcome = match catch_unwind(AssertUnwindSafe(|| (spec.algorithm)(stream, params))) {
        Ok(result) => TestOutcome::from(result),
        Err(_) => TestOutcome::untestable("Test panicked"),
    };
    let elapsed = t0.elapsed();
    match &outcome.diagnostic {
        Some(reason) => log::warn!("{} [{}] untestable: {reason}", spec.name, spec.id),
        None => log::debug!(
            "{} [{}] finished in {:.1} ms: p={:.6}",
            spec.name,
            spec.id,
            elapsed.as_secs_f64() * 1000.0,
            outcome.p_value
        ),
    }
    outcome
}

/// Run every job on `workers` threads. Output order matches `jobs`.
pub fn run_jobs(stream: &CanonicalStream, jobs: &[Job<'_>], workers: usize) -> Vec<TestOutcome> {
    if workers <= 1 || jobs.len() <= 1 {
        return jobs
            .iter()
            .map(|job| run_one(stream, job.spec, &job.params))
            .collect();
    }

    let next = AtomicUsize::new(0);
    let slots: Vec<Mutex<Option<TestOutcome>>> = jobs.iter().map(|_| Mutex::new(None)).collect();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                s.spawn(|| {
                    loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        let Some(job) = jobs.get(i) else {
                            break;
                        };
                        let outcome = run_one(stream, job.spec, &job.params);
                        if let Ok(mut slot) = slots[i].lock() {
                            *slot = Some(outcome);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            let _ = handle.join();
        }
    });

    slots
        .into_iter()
        .map(|slot| {
            slot.into_inner()
                .ok()
                .flatten()
                .unwrap_or_else(|| TestOutcome::untestable("worker did not report a result"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Family, Suite, TestId};
    use crate::testutil::random_stream;
    use crate::{Evaluation, TestError};

    fn panics(_: &CanonicalStream, _: &Params) -> Result<Evaluation, TestError> {
        panic!("boom")
    }

    fn constant(_: &CanonicalStream, _: &Params) -> Result<Evaluation, TestError> {
        Ok(Evaluation::new(0.5, 1.0, "ok"))
    }

    static PANICS: TestSpec = TestSpec {
        id: TestId(900),
        key: "panics",
        name: "Panics",
        suite: Suite::Diehard,
        family: Family::SequentialStochastic,
        defaults: &[],
        algorithm: panics,
    };

    static CONSTANT: TestSpec = TestSpec {
        id: TestId(901),
        key: "constant",
        name: "Constant",
        suite: Suite::TestU01,
        family: Family::SequentialStochastic,
        defaults: &[],
        algorithm: constant,
    };

    #[test]
    fn test_worker_count() {
        assert_eq!(worker_count(Some(4), 2), 2);
        assert_eq!(worker_count(Some(0), 5), 1);
        assert_eq!(worker_count(Some(3), 10), 3);
        assert!(worker_count(None, 100) >= 1);
    }

    #[test]
    fn test_panic_becomes_sentinel() {
        let stream = random_stream(64);
        let outcome = run_one(&stream, &PANICS, &Params::new());
        assert_eq!(outcome.p_value, -1.0);
        assert_eq!(outcome.diagnostic.as_deref(), Some("Test panicked"));
    }

    #[test]
    fn test_parallel_preserves_job_order() {
        let stream = random_stream(64);
        let jobs: Vec<Job> = (0..12)
            .map(|i| Job {
                spec: if i % 3 == 0 { &PANICS } else { &CONSTANT },
                params: Params::new(),
            })
            .collect();
        let outcomes = run_jobs(&stream, &jobs, 4);
        assert_eq!(outcomes.len(), 12);
        for (i, outcome) in outcomes.iter().enumerate() {
            if i % 3 == 0 {
                assert!(outcome.is_untestable());
            } else {
                assert_eq!(outcome.p_value, 0.5);
            }
        }
        assert_eq!(outcomes, run_jobs(&stream, &jobs, 1));
    }
}
