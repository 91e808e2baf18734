//! End-to-end checks of the battery through the public registry API.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use randsuite_core::{Error, Overrides, ParamValue, RawInput, normalize};
use randsuite_tests::{Registry, ResultSet, TestId, Verdict};

fn seeded_stream(n_bytes: usize, seed: u64) -> randsuite_core::CanonicalStream {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; n_bytes];
    rng.fill_bytes(&mut data);
    normalize(&RawInput::ByteBuffer(data), 32).unwrap()
}

fn run_all(stream: &randsuite_core::CanonicalStream, threads: Option<usize>) -> ResultSet {
    let registry = Registry::standard();
    let ids = registry.select(&["all"]).unwrap();
    registry
        .run_with(stream, &ids, &Overrides::new(), threads)
        .unwrap()
}

fn assert_well_formed(results: &ResultSet) {
    for entry in results {
        let o = &entry.outcome;
        assert!(
            o.p_value == -1.0 || (0.0..=1.0).contains(&o.p_value),
            "{}: p = {}",
            entry.key,
            o.p_value
        );
        assert_eq!(
            o.verdict == Verdict::Random,
            o.p_value > 0.01,
            "{}: verdict {} with p = {}",
            entry.key,
            o.verdict,
            o.p_value
        );
        assert_eq!(o.p_value == -1.0, o.diagnostic.is_some(), "{}", entry.key);
    }
}

#[test]
fn random_input_gives_valid_outcomes_for_every_test() {
    let results = run_all(&seeded_stream(1 << 18, 7), None);
    assert_eq!(results.len(), 28);
    assert_well_formed(&results);
    assert_eq!(results.to_tsv().lines().count(), 28);
}

#[test]
fn tiny_input_never_aborts_the_batch() {
    let stream = normalize(&RawInput::BitString("1011".into()), 32).unwrap();
    let results = run_all(&stream, Some(2));
    assert_eq!(results.len(), 28);
    assert_well_formed(&results);
    assert!(results.untestable() > 20);
}

#[test]
fn run_is_idempotent() {
    let stream = seeded_stream(1 << 16, 11);
    let first = serde_json::to_string(&run_all(&stream, None)).unwrap();
    let second = serde_json::to_string(&run_all(&stream, None)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn worker_count_does_not_change_results() {
    let stream = seeded_stream(1 << 16, 3);
    let serial = serde_json::to_string(&run_all(&stream, Some(1))).unwrap();
    let parallel = serde_json::to_string(&run_all(&stream, Some(8))).unwrap();
    assert_eq!(serial, parallel);
}

#[test]
fn results_follow_selection_order() {
    let registry = Registry::standard();
    let ids = registry.select(&["squeeze", "1", "binary_rank_6x8"]).unwrap();
    let results = registry
        .run(&seeded_stream(1 << 14, 5), &ids, &Overrides::new())
        .unwrap();
    let keys: Vec<&str> = results.iter().map(|e| e.key).collect();
    assert_eq!(keys, ["squeeze", "birthday_spacings", "binary_rank_6x8"]);
}

#[test]
fn unknown_selector_fails_before_running() {
    let err = Registry::standard()
        .select(&["runs", "monobit"])
        .unwrap_err();
    assert!(matches!(err, Error::UnknownTest(ref s) if s == "monobit"));

    let err = Registry::standard()
        .run(&seeded_stream(64, 1), &[TestId(0)], &Overrides::new())
        .unwrap_err();
    assert!(matches!(err, Error::UnknownTest(_)));
}

#[test]
fn override_for_unknown_test_is_rejected() {
    let mut overrides = Overrides::new();
    overrides
        .entry("nope".into())
        .or_default()
        .insert("n".into(), ParamValue::Int(1));
    let err = Registry::standard()
        .run(&seeded_stream(64, 1), &[TestId(21)], &overrides)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownTest(ref s) if s == "nope"));
}

#[test]
fn alternating_bits_reject_runs() {
    let stream = normalize(&RawInput::BitString("01".repeat(600)), 32).unwrap();
    let registry = Registry::standard();
    let results = registry
        .run(&stream, &[TestId(21)], &Overrides::new())
        .unwrap();
    let outcome = &results.entries[0].outcome;
    assert_eq!(outcome.verdict, Verdict::NonRandom);
    assert!(outcome.p_value >= 0.0 && outcome.p_value < 1e-10);
    assert!(outcome.details.starts_with("runs=1200,"));
}

#[test]
fn constant_stream_is_caught_not_fatal() {
    let stream = normalize(&RawInput::ByteBuffer(vec![0; 1 << 16]), 32).unwrap();
    let registry = Registry::standard();
    let ids = registry.select(&["runs", "binary_rank_32x32"]).unwrap();
    let results = registry.run(&stream, &ids, &Overrides::new()).unwrap();

    let runs = &results.entries[0].outcome;
    assert_eq!(runs.p_value, -1.0);
    assert_eq!(
        runs.diagnostic.as_deref(),
        Some("data must contain both 0s and 1s")
    );

    let rank = &results.entries[1].outcome;
    assert!(rank.p_value >= 0.0 && rank.p_value < 1e-6);
    assert_eq!(rank.verdict, Verdict::NonRandom);
}

#[test]
fn overrides_reach_the_algorithm() {
    let stream = seeded_stream(1 << 14, 9);
    let registry = Registry::standard();
    let mut overrides = Overrides::new();
    overrides
        .entry("operm5".into())
        .or_default()
        .insert("overlap".into(), ParamValue::Bool(false));
    let results = registry.run(&stream, &[TestId(24)], &overrides).unwrap();
    assert!(results.entries[0].outcome.details.ends_with("df=119"));
}

#[test]
fn diehard_suite_covers_the_classic_menu() {
    let registry = Registry::standard();
    let ids = registry.select(&["diehard"]).unwrap();
    assert_eq!(ids.len(), 17);
    let keys: Vec<&str> = ids
        .iter()
        .filter_map(|&id| registry.get(id))
        .map(|spec| spec.key)
        .collect();
    assert!(keys.contains(&"diehard_birthday_spacings"));
    assert!(!keys.contains(&"birthday_spacings"));
}

#[test]
fn oversized_parameters_leave_the_batch_intact() {
    let registry = Registry::standard();
    let mut overrides = Overrides::new();
    let mut set = |test: &str, name: &str, value: i64| {
        overrides
            .entry(test.into())
            .or_default()
            .insert(name.into(), ParamValue::Int(value));
    };
    set("collision", "space", 1 << 46);
    set("simple_poker", "alphabet", 1 << 50);
    set("gap", "max_gap", 1 << 40);
    set("minimum_distance", "bins", 1 << 40);
    set("overlapping_sums", "bins", 1 << 40);
    let ids = registry
        .select(&["collision", "simple_poker", "gap", "minimum_distance", "overlapping_sums", "runs"])
        .unwrap();
    let results = registry
        .run(&seeded_stream(1 << 21, 13), &ids, &overrides)
        .unwrap();
    assert_eq!(results.len(), 6);
    assert_well_formed(&results);

    let collision = &results.entries[0].outcome;
    assert!((0.0..=1.0).contains(&collision.p_value));
    for entry in &results.entries[2..5] {
        let diagnostic = entry.outcome.diagnostic.as_deref().unwrap_or_default();
        assert!(diagnostic.contains("must be at most 65536"), "{}: {diagnostic}", entry.key);
    }
    assert!(!results.entries[5].outcome.is_untestable());
}

#[test]
fn operm5_overlapping_default_uses_96_degrees_of_freedom() {
    let results = Registry::standard()
        .run(&seeded_stream(1 << 16, 21), &[TestId(24)], &Overrides::new())
        .unwrap();
    let outcome = &results.entries[0].outcome;
    assert!(outcome.details.starts_with("windows=16384, overlap=true"));
    assert!(outcome.details.ends_with("df=96"));
}
