//! Ordered collection of test outcomes and its export formats.

use serde::Serialize;

use crate::registry::{TestId, TestSpec};
use crate::{TestOutcome, Verdict};

/// One selected test and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEntry {
    pub id: TestId,
    pub key: &'static str,
    pub name: &'static str,
    #[serde(flatten)]
    pub outcome: TestOutcome,
}

impl ResultEntry {
    pub fn new(spec: &TestSpec, outcome: TestOutcome) -> Self {
        Self {
            id: spec.id,
            key: spec.key,
            name: spec.name,
            outcome,
        }
    }

    /// `name\tp\tverdict`, with the sentinel printed as `-1`.
    pub fn tsv_line(&self) -> String {
        format!(
            "{}\t{}\t{}",
            self.name,
            format_p(self.outcome.p_value),
            self.outcome.verdict
        )
    }
}

/// p-value as shown in reports: six decimals, or `-1` for an untestable run.
pub fn format_p(p_value: f64) -> String {
    if p_value < 0.0 {
        "-1".to_string()
    } else {
        format!("{p_value:.6}")
    }
}

/// Outcomes of one batch, in selection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub entries: Vec<ResultEntry>,
}

impl ResultSet {
    pub fn new(entries: Vec<ResultEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultEntry> {
        self.entries.iter()
    }

    /// Number of `Random` verdicts.
    pub fn passed(&self) -> usize {
        self.iter()
            .filter(|e| e.outcome.verdict == Verdict::Random)
            .count()
    }

    /// Number of sentinel outcomes.
    pub fn untestable(&self) -> usize {
        self.iter().filter(|e| e.outcome.is_untestable()).count()
    }

    /// Percentage of `Random` verdicts, 0 for an empty set.
    pub fn quality_score(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        100.0 * self.passed() as f64 / self.len() as f64
    }

    /// One line per test, newline terminated.
    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        for entry in self.iter() {
            out.push_str(&entry.tsv_line());
            out.push('\n');
        }
        out
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ResultEntry;
    type IntoIter = std::slice::Iter<'a, ResultEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::{Evaluation, TestOutcome};

    fn sample() -> ResultSet {
        let registry = Registry::standard();
        ResultSet::new(vec![
            ResultEntry::new(
                registry.by_key("runs").unwrap(),
                TestOutcome::from_evaluation(Evaluation::new(0.5, 0.67, "runs=10")),
            ),
            ResultEntry::new(
                registry.by_key("gap").unwrap(),
                TestOutcome::from_evaluation(Evaluation::new(0.001, 30.0, "")),
            ),
            ResultEntry::new(
                registry.by_key("squeeze").unwrap(),
                TestOutcome::untestable("insufficient data: need 100 trials, got 3"),
            ),
        ])
    }

    #[test]
    fn test_tsv_format() {
        assert_eq!(
            sample().to_tsv(),
            "Runs\t0.500000\tRandom\nGap\t0.001000\tNon-Random\nSqueeze\t-1\tNon-Random\n"
        );
    }

    #[test]
    fn test_counts_and_score() {
        let results = sample();
        assert_eq!(results.len(), 3);
        assert_eq!(results.passed(), 1);
        assert_eq!(results.untestable(), 1);
        assert!((results.quality_score() - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(ResultSet::default().quality_score(), 0.0);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        let first = &json["entries"][0];
        assert_eq!(first["id"], 21);
        assert_eq!(first["key"], "runs");
        assert_eq!(first["verdict"], "Random");
        assert_eq!(json["entries"][2]["p_value"], -1.0);
        assert_eq!(
            json["entries"][2]["diagnostic"],
            "insufficient data: need 100 trials, got 3"
        );
    }
}
