//! CLI for randsuite: Diehard and TestU01 style randomness batteries.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "randsuite")]
#[command(about = "randsuite: statistical randomness batteries for bits, bytes, and integers")]
#[command(version = randsuite_core::VERSION)]
struct Cli {
    /// Enable debug logging (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every test with its id, suite, family, and default parameters
    List {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Normalize an input and run a selection of tests
    Run {
        /// Literal input: a 0/1 string, or any text (expanded as UTF-8 bytes)
        #[arg(long, group = "input")]
        bits: Option<String>,

        /// Text file; lines are trimmed and concatenated, then read like --bits
        #[arg(long, group = "input")]
        text_file: Option<String>,

        /// Binary file, 8 bits per byte
        #[arg(long, group = "input")]
        bytes_file: Option<String>,

        /// Integers separated by commas or whitespace
        #[arg(long, group = "input")]
        integers: Option<String>,

        /// Comma-separated selectors: ids, keys, or all / diehard / testu01
        #[arg(long)]
        tests: Option<String>,

        /// JSON run configuration (widths, threads, tests, overrides)
        #[arg(long)]
        config: Option<String>,

        /// Parameter override, repeatable: --set gap.max_gap=6
        #[arg(long = "set", value_name = "TEST.PARAM=VALUE")]
        sets: Vec<String>,

        /// Padding width in bits (1-64, default: 32)
        #[arg(long)]
        chunk_width: Option<u32>,

        /// Bits per integer for --integers (1-64, default: 8)
        #[arg(long)]
        integer_width: Option<u32>,

        /// Worker threads (default: available parallelism)
        #[arg(long)]
        threads: Option<usize>,

        /// Print the result set as JSON
        #[arg(long, conflicts_with = "tsv")]
        json: bool,

        /// Print one `name<TAB>p<TAB>verdict` line per test
        #[arg(long)]
        tsv: bool,

        /// Write a Markdown report to this path
        #[arg(long)]
        output: Option<String>,
    },

    /// Serve the battery over HTTP
    Serve {
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port
        #[arg(long, default_value = "8042")]
        port: u16,

        /// Worker threads per request (default: available parallelism)
        #[arg(long)]
        threads: Option<usize>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::List { json } => commands::list::run(json),
        Commands::Run {
            bits,
            text_file,
            bytes_file,
            integers,
            tests,
            config,
            sets,
            chunk_width,
            integer_width,
            threads,
            json,
            tsv,
            output,
        } => commands::run::run(commands::run::RunCommandConfig {
            input: commands::InputArgs {
                bits: bits.as_deref(),
                text_file: text_file.as_deref(),
                bytes_file: bytes_file.as_deref(),
                integers: integers.as_deref(),
            },
            tests: tests.as_deref(),
            config_path: config.as_deref(),
            sets: &sets,
            chunk_width,
            integer_width,
            threads,
            format: if json {
                commands::run::OutputFormat::Json
            } else if tsv {
                commands::run::OutputFormat::Tsv
            } else {
                commands::run::OutputFormat::Table
            },
            output_path: output.as_deref(),
        }),
        Commands::Serve {
            host,
            port,
            threads,
        } => commands::serve::run(&host, port, threads),
    }
}
