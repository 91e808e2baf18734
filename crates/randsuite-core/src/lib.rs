//! # randsuite-core
//!
//! Input handling shared by every randsuite front end.
//!
//! Raw input (a bit string, a byte buffer, an integer list, or a text file) is
//! turned into a [`CanonicalStream`] by a single call to [`normalize`] or
//! [`normalize_with`]. The stream is read-only afterwards and is what every
//! statistical test consumes.
//!
//! ## Quick Start
//!
//! ```
//! use randsuite_core::{RawInput, normalize};
//!
//! let stream = normalize(&RawInput::BitString("1011".into()), 8).unwrap();
//! assert_eq!(stream.bits(), &[1, 0, 1, 1, 0, 0, 0, 0]);
//! assert_eq!(stream.words(), &[0b1011_0000]);
//! ```
//!
//! Run configuration ([`RunConfig`]) and test parameter values
//! ([`ParamValue`], [`Params`]) also live here so the CLI and the HTTP server
//! share one shape.

pub mod config;
pub mod error;
pub mod input;

pub use config::{Overrides, ParamValue, Params, RunConfig, parse_assignment};
pub use error::{Error, Result};
pub use input::{
    CanonicalStream, DEFAULT_CHUNK_WIDTH, DEFAULT_INTEGER_WIDTH, InputKind, MAX_WIDTH,
    NormalizeOptions, RawInput, normalize, normalize_with,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
