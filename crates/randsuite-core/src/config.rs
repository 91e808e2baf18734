//! Run configuration and test parameter values.
//!
//! A run is described by a [`RunConfig`], normally loaded from a JSON file and
//! then adjusted by CLI flags or an HTTP request body.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::input::{DEFAULT_CHUNK_WIDTH, DEFAULT_INTEGER_WIDTH, NormalizeOptions};

/// A single test parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl ParamValue {
    /// Parse a textual value: `true`/`false`, an integer, or a float.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        match text {
            "true" => return Ok(Self::Bool(true)),
            "false" => return Ok(Self::Bool(false)),
            _ => {}
        }
        if let Ok(v) = text.parse::<i64>() {
            return Ok(Self::Int(v));
        }
        text.parse::<f64>()
            .map(Self::Float)
            .map_err(|_| Error::invalid_input(format!("not a parameter value: '{text}'")))
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Parameter name → value, ordered by name.
pub type Params = BTreeMap<String, ParamValue>;

/// Per-test overrides keyed by test selector (numeric id or test key).
pub type Overrides = BTreeMap<String, Params>;

/// Everything needed to normalize an input and run a selection of tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_chunk_width")]
    pub chunk_width: u32,

    #[serde(default = "default_integer_width")]
    pub integer_width: u32,

    /// Worker threads; `None` uses the available parallelism.
    #[serde(default)]
    pub threads: Option<usize>,

    /// Test selectors: numeric id, test key, or a suite name.
    #[serde(default = "default_tests")]
    pub tests: Vec<String>,

    #[serde(default)]
    pub overrides: Overrides,
}

fn default_chunk_width() -> u32 {
    DEFAULT_CHUNK_WIDTH
}
fn default_integer_width() -> u32 {
    DEFAULT_INTEGER_WIDTH
}
fn default_tests() -> Vec<String> {
    vec!["all".to_string()]
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            chunk_width: default_chunk_width(),
            integer_width: default_integer_width(),
            threads: None,
            tests: default_tests(),
            overrides: Overrides::new(),
        }
    }
}

impl RunConfig {
    /// Load a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&content)?;
        log::debug!("loaded run config from {}", path.display());
        Ok(config)
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            chunk_width: self.chunk_width,
            integer_width: self.integer_width,
        }
    }

    /// Apply a `test.param=value` assignment on top of the loaded overrides.
    pub fn set(&mut self, assignment: &str) -> Result<()> {
        let (test, name, value) = parse_assignment(assignment)?;
        self.overrides.entry(test).or_default().insert(name, value);
        Ok(())
    }
}

/// Split `test.param=value` into its parts.
pub fn parse_assignment(assignment: &str) -> Result<(String, String, ParamValue)> {
    let malformed =
        || Error::invalid_input(format!("expected test.param=value, got '{assignment}'"));
    let (target, value) = assignment.split_once('=').ok_or_else(malformed)?;
    let (test, name) = target.trim().split_once('.').ok_or_else(malformed)?;
    if test.is_empty() || name.is_empty() {
        return Err(malformed());
    }
    Ok((test.to_string(), name.to_string(), ParamValue::parse(value)?))
}
