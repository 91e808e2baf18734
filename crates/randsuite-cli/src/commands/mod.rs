pub mod list;
pub mod run;
pub mod serve;

use std::path::PathBuf;

use randsuite_core::{Error, RawInput, Result};

/// The four mutually exclusive input flags of `randsuite run`.
#[derive(Debug, Default, Clone, Copy)]
pub struct InputArgs<'a> {
    pub bits: Option<&'a str>,
    pub text_file: Option<&'a str>,
    pub bytes_file: Option<&'a str>,
    pub integers: Option<&'a str>,
}

impl InputArgs<'_> {
    /// Turn whichever flag was given into a [`RawInput`].
    pub fn load(&self) -> Result<RawInput> {
        if let Some(bits) = self.bits {
            return Ok(RawInput::BitString(bits.to_string()));
        }
        if let Some(path) = self.text_file {
            return Ok(RawInput::TextFile(PathBuf::from(path)));
        }
        if let Some(path) = self.bytes_file {
            let data = std::fs::read(path)?;
            log::debug!("read {} bytes from {path}", data.len());
            return Ok(RawInput::ByteBuffer(data));
        }
        if let Some(list) = self.integers {
            return parse_integers(list).map(RawInput::IntegerList);
        }
        Err(Error::invalid_input(
            "no input given: use --bits, --text-file, --bytes-file, or --integers",
        ))
    }
}

/// Parse integers separated by commas and/or whitespace.
pub fn parse_integers(list: &str) -> Result<Vec<u64>> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<u64>()
                .map_err(|_| Error::invalid_input(format!("not an unsigned integer: '{token}'")))
        })
        .collect()
}

/// Report an input-tier failure and exit with status 1.
pub fn fail(err: &Error) -> ! {
    eprintln!("Error: {err}");
    std::process::exit(1);
}
