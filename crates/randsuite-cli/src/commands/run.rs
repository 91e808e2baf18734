use std::path::Path;
use std::time::Instant;

use randsuite_core::{CanonicalStream, Result, RunConfig, normalize_with};
use randsuite_tests::{Registry, ResultSet, report::format_p};

use super::InputArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Tsv,
}

pub struct RunCommandConfig<'a> {
    pub input: InputArgs<'a>,
    pub tests: Option<&'a str>,
    pub config_path: Option<&'a str>,
    pub sets: &'a [String],
    pub chunk_width: Option<u32>,
    pub integer_width: Option<u32>,
    pub threads: Option<usize>,
    pub format: OutputFormat,
    pub output_path: Option<&'a str>,
}

pub fn run(cfg: RunCommandConfig<'_>) {
    let run_config = match build_config(&cfg) {
        Ok(c) => c,
        Err(e) => super::fail(&e),
    };

    let t0 = Instant::now();
    let (stream, results) = match execute(&cfg.input, &run_config) {
        Ok(r) => r,
        Err(e) => super::fail(&e),
    };
    let elapsed = t0.elapsed().as_secs_f64();

    match cfg.format {
        OutputFormat::Json => match serde_json::to_string_pretty(&results) {
            Ok(text) => println!("{text}"),
            Err(e) => super::fail(&randsuite_core::Error::from(e)),
        },
        OutputFormat::Tsv => print!("{}", results.to_tsv()),
        OutputFormat::Table => print_table(&stream, &results, elapsed),
    }

    if let Some(path) = cfg.output_path {
        let report = generate_report(&stream, &results);
        if let Err(e) = std::fs::write(path, &report) {
            eprintln!("Failed to write report to {path}: {e}");
        } else if cfg.format == OutputFormat::Table {
            println!("\nReport saved to: {path}");
        }
    }
}

/// Config file, then `--tests`, `--set`, and width/thread flags on top.
pub fn build_config(cfg: &RunCommandConfig<'_>) -> Result<RunConfig> {
    let mut config = match cfg.config_path {
        Some(path) => RunConfig::load(Path::new(path))?,
        None => RunConfig::default(),
    };
    if let Some(tests) = cfg.tests {
        config.tests = tests
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    for assignment in cfg.sets {
        config.set(assignment)?;
    }
    if let Some(w) = cfg.chunk_width {
        config.chunk_width = w;
    }
    if let Some(w) = cfg.integer_width {
        config.integer_width = w;
    }
    if cfg.threads.is_some() {
        config.threads = cfg.threads;
    }
    Ok(config)
}

/// Load, normalize, select, and run. Every error here is input-tier.
pub fn execute(input: &InputArgs<'_>, config: &RunConfig) -> Result<(CanonicalStream, ResultSet)> {
    let raw = input.load()?;
    let stream = normalize_with(&raw, &config.normalize_options())?;
    let registry = Registry::standard();
    let ids = registry.select(&config.tests)?;
    let results = registry.run_with(&stream, &ids, &config.overrides, config.threads)?;
    Ok((stream, results))
}

fn print_table(stream: &CanonicalStream, results: &ResultSet, elapsed: f64) {
    println!(
        "Input: {} bits ({}), padded to {} at width {}\n",
        stream.input_bits(),
        stream.kind(),
        stream.bits().len(),
        stream.chunk_width()
    );
    println!(
        "{:>3}  {:<28} {:>9}  {:<10}  Details",
        "ID", "Test", "p-value", "Verdict"
    );
    println!("{}", "-".repeat(96));
    for entry in results {
        let detail = entry
            .outcome
            .diagnostic
            .as_deref()
            .unwrap_or(&entry.outcome.details);
        println!(
            "{:>3}  {:<28} {:>9}  {:<10}  {}",
            entry.id,
            entry.name,
            format_p(entry.outcome.p_value),
            entry.outcome.verdict.to_string(),
            detail
        );
    }
    println!("{}", "-".repeat(96));
    println!(
        "Score: {:.1}/100 ({}/{} random, {} untestable) [{:.1}s]",
        results.quality_score(),
        results.passed(),
        results.len(),
        results.untestable(),
        elapsed
    );
}

pub fn generate_report(stream: &CanonicalStream, results: &ResultSet) -> String {
    let mut report = String::new();
    report.push_str("# randsuite Randomness Test Report\n\n");
    report.push_str(&format!("Generated: {}\n\n", timestamp()));
    report.push_str(&format!(
        "- Input: {} bits ({})\n- Padded length: {} bits (chunk width {})\n- Score: {:.1}/100\n- Random: {}/{}\n- Untestable: {}\n\n",
        stream.input_bits(),
        stream.kind(),
        stream.bits().len(),
        stream.chunk_width(),
        results.quality_score(),
        results.passed(),
        results.len(),
        results.untestable()
    ));

    report.push_str("| ID | Test | P | Verdict | p-value | Statistic | Details |\n");
    report.push_str("|----|------|---|---------|---------|-----------|---------|\n");
    for entry in results {
        let o = &entry.outcome;
        let ok = if o.passed() { "✓" } else { "✗" };
        let statistic = o
            .statistic
            .map(|s| format!("{s:.4}"))
            .unwrap_or_else(|| "-".to_string());
        let details = o.diagnostic.as_deref().unwrap_or(&o.details);
        report.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            entry.id,
            entry.name,
            ok,
            o.verdict,
            format_p(o.p_value),
            statistic,
            details
        ));
    }

    report
}

fn timestamp() -> String {
    let dur = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("Unix timestamp: {}", dur.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use randsuite_core::ParamValue;
    use std::io::Write;

    fn config<'a>(sets: &'a [String]) -> RunCommandConfig<'a> {
        RunCommandConfig {
            input: InputArgs {
                bits: Some("0110"),
                ..Default::default()
            },
            tests: None,
            config_path: None,
            sets,
            chunk_width: None,
            integer_width: None,
            threads: None,
            format: OutputFormat::Table,
            output_path: None,
        }
    }

    #[test]
    fn test_defaults_without_file() {
        let built = build_config(&config(&[])).unwrap();
        assert_eq!(built.tests, vec!["all"]);
        assert_eq!(built.chunk_width, 32);
        assert!(built.overrides.is_empty());
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"chunk_width": 16, "threads": 2, "tests": ["diehard"],
                "overrides": {{"gap": {{"max_gap": 4}}}}}}"#
        )
        .unwrap();
        let path = file.path().to_string_lossy().into_owned();
        let sets = vec!["gap.max_gap=6".to_string(), "lag.x=1".to_string()];
        let mut cfg = config(&sets);
        cfg.config_path = Some(&path);
        cfg.tests = Some("runs, gap");
        cfg.integer_width = Some(12);

        let built = build_config(&cfg).unwrap();
        assert_eq!(built.chunk_width, 16);
        assert_eq!(built.integer_width, 12);
        assert_eq!(built.threads, Some(2));
        assert_eq!(built.tests, vec!["runs", "gap"]);
        assert_eq!(built.overrides["gap"]["max_gap"], ParamValue::Int(6));
        assert_eq!(built.overrides["lag"]["x"], ParamValue::Int(1));
    }

    #[test]
    fn test_malformed_set_is_error() {
        let sets = vec!["gap=6".to_string()];
        assert!(build_config(&config(&sets)).is_err());
    }

    #[test]
    fn test_execute_and_report() {
        let mut cfg = config(&[]);
        let bits = "01".repeat(600);
        cfg.input.bits = Some(&bits);
        cfg.tests = Some("runs,squeeze");
        let built = build_config(&cfg).unwrap();
        let (stream, results) = execute(&cfg.input, &built).unwrap();
        assert_eq!(results.len(), 2);

        let report = generate_report(&stream, &results);
        assert!(report.contains("- Input: 1200 bits (bits)"));
        assert!(report.contains("| 21 | Runs | ✗ | Non-Random |"));
        assert!(report.contains("| 25 | Squeeze | ✗ | Non-Random | -1 | - | insufficient data"));
    }

    #[test]
    fn test_execute_unknown_override_target() {
        let sets = vec!["monobit.block=8".to_string()];
        let built = build_config(&config(&sets)).unwrap();
        let err = execute(&config(&sets).input, &built).unwrap_err();
        assert_eq!(err.to_string(), "unknown test: monobit");
    }
}
