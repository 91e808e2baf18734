use randsuite_tests::{Registry, TestSpec};

pub fn run(json: bool) {
    let registry = Registry::standard();

    if json {
        match serde_json::to_string_pretty(registry.tests()) {
            Ok(text) => println!("{text}"),
            Err(e) => super::fail(&randsuite_core::Error::from(e)),
        }
        return;
    }

    println!(
        "{:>3}  {:<26} {:<28} {:<8} {:<25} Defaults",
        "ID", "Key", "Name", "Suite", "Family"
    );
    println!("{}", "-".repeat(122));
    for spec in registry.tests() {
        println!(
            "{:>3}  {:<26} {:<28} {:<8} {:<25} {}",
            spec.id,
            spec.key,
            spec.name,
            spec.suite.to_string(),
            spec.family.to_string(),
            format_defaults(spec)
        );
    }
    println!();
    println!(
        "  {} tests. Select with --tests <id|key|all|diehard|testu01>,",
        registry.tests().len()
    );
    println!("  override with --set <key>.<param>=<value>.");
}

fn format_defaults(spec: &TestSpec) -> String {
    if spec.defaults.is_empty() {
        return "-".to_string();
    }
    spec.defaults
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}
