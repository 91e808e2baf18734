//! Stream normalization.
//!
//! Every raw input goes through [`normalize`] (or [`normalize_with`]) exactly
//! once per run. No test inspects [`RawInput`] directly; they all read one of
//! the views exposed by [`CanonicalStream`].
//!
//! ```text
//! RawInput → normalize → CanonicalStream { bits, words } → tests
//! ```
//!
//! Bits are stored one per byte (`0` or `1`), most significant bit first,
//! right-padded with zeros to a multiple of the chunk width. Padding never
//! precedes data.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default width of the integer view, in bits.
pub const DEFAULT_CHUNK_WIDTH: u32 = 32;
/// Default width each element of an integer list expands to.
pub const DEFAULT_INTEGER_WIDTH: u32 = 8;
/// Largest supported chunk or integer width.
pub const MAX_WIDTH: u32 = 64;

/// Raw input as supplied by a collaborator. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    /// Text of '0'/'1' characters. Any other text is expanded byte by byte.
    BitString(String),
    ByteBuffer(Vec<u8>),
    IntegerList(Vec<u64>),
    /// A text file read as UTF-8; lines are trimmed and concatenated.
    TextFile(PathBuf),
}

/// Which shape of input produced a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Bits,
    Text,
    Bytes,
    Integers,
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bits => write!(f, "bits"),
            Self::Text => write!(f, "text"),
            Self::Bytes => write!(f, "bytes"),
            Self::Integers => write!(f, "integers"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    /// Padding granularity and width of the sliced integer view.
    pub chunk_width: u32,
    /// Bits per element when expanding an integer list.
    pub integer_width: u32,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            chunk_width: DEFAULT_CHUNK_WIDTH,
            integer_width: DEFAULT_INTEGER_WIDTH,
        }
    }
}

impl NormalizeOptions {
    fn validate(&self) -> Result<()> {
        check_width("chunk width", self.chunk_width)?;
        check_width("integer width", self.integer_width)
    }
}

fn check_width(what: &str, width: u32) -> Result<()> {
    if width == 0 || width > MAX_WIDTH {
        return Err(Error::invalid_input(format!(
            "{what} must be between 1 and {MAX_WIDTH}, got {width}"
        )));
    }
    Ok(())
}

/// The normalized bit sequence plus its integer view.
///
/// Read-only after construction; tests that need a different grouping
/// re-derive it with [`CanonicalStream::words_of`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalStream {
    bits: Vec<u8>,
    input_bits: usize,
    chunk_width: u32,
    words: Vec<u64>,
    word_width: u32,
    kind: InputKind,
}

impl CanonicalStream {
    /// Padded bit sequence, one `0`/`1` per element.
    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    /// Number of bits before padding.
    pub fn input_bits(&self) -> usize {
        self.input_bits
    }

    /// The bits that came from the input, without the trailing padding.
    pub fn data_bits(&self) -> &[u8] {
        &self.bits[..self.input_bits]
    }

    pub fn chunk_width(&self) -> u32 {
        self.chunk_width
    }

    /// Integer view: `chunk_width`-bit big-endian words, or the original
    /// values when the input was an integer list.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Bit width of each value in [`words`](Self::words).
    pub fn word_width(&self) -> u32 {
        self.word_width
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }

    /// Regroup the padded bits into `width`-bit big-endian words. A trailing
    /// partial group is zero-padded on the right.
    pub fn words_of(&self, width: u32) -> Vec<u64> {
        pack_words(&self.bits, width.clamp(1, MAX_WIDTH))
    }

    /// The input bits regrouped into bytes; a trailing partial byte is
    /// zero-padded.
    pub fn bytes(&self) -> Vec<u8> {
        self.data_bits()
            .chunks(8)
            .map(|chunk| {
                let value = chunk.iter().fold(0u8, |acc, &b| (acc << 1) | b);
                value << (8 - chunk.len())
            })
            .collect()
    }

    /// The integer view scaled into `[0, 1)`.
    pub fn uniforms(&self) -> Vec<f64> {
        let width = self.word_width;
        if width > 53 {
            let shift = width - 53;
            let scale = 2f64.powi(53);
            self.words
                .iter()
                .map(|&w| (w >> shift) as f64 / scale)
                .collect()
        } else {
            let scale = 2f64.powi(width as i32);
            self.words.iter().map(|&w| w as f64 / scale).collect()
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization entry points
// ---------------------------------------------------------------------------

/// Normalize `raw` with the given chunk width and default integer width.
pub fn normalize(raw: &RawInput, chunk_width: u32) -> Result<CanonicalStream> {
    normalize_with(
        raw,
        &NormalizeOptions {
            chunk_width,
            ..NormalizeOptions::default()
        },
    )
}

/// Normalize `raw` into a [`CanonicalStream`].
///
/// Fails with [`Error::InvalidInput`] when the input is empty, an integer does
/// not fit `integer_width`, or a width is out of range. Reading a
/// [`RawInput::TextFile`] can also fail with [`Error::Io`].
pub fn normalize_with(raw: &RawInput, options: &NormalizeOptions) -> Result<CanonicalStream> {
    options.validate()?;

    let (mut bits, kind, passthrough) = match raw {
        RawInput::BitString(text) => {
            let (bits, kind) = expand_text(text);
            (bits, kind, None)
        }
        RawInput::ByteBuffer(bytes) => (expand_bytes(bytes), InputKind::Bytes, None),
        RawInput::IntegerList(values) => {
            let bits = expand_integers(values, options.integer_width)?;
            (bits, InputKind::Integers, Some(values.clone()))
        }
        RawInput::TextFile(path) => {
            let content = std::fs::read_to_string(path)?;
            let joined: String = content.lines().map(str::trim).collect();
            let (bits, kind) = expand_text(&joined);
            (bits, kind, None)
        }
    };

    if bits.is_empty() {
        return Err(Error::invalid_input("input is empty"));
    }

    let input_bits = bits.len();
    let chunk = options.chunk_width as usize;
    let remainder = input_bits % chunk;
    if remainder != 0 {
        bits.resize(input_bits + chunk - remainder, 0);
    }

    let (words, word_width) = match passthrough {
        Some(values) => (values, options.integer_width),
        None => (pack_words(&bits, options.chunk_width), options.chunk_width),
    };

    log::debug!(
        "normalized {kind} input: {input_bits} bits ({} padded), {} words of {word_width} bits",
        bits.len() - input_bits,
        words.len()
    );

    Ok(CanonicalStream {
        bits,
        input_bits,
        chunk_width: options.chunk_width,
        words,
        word_width,
        kind,
    })
}

// ---------------------------------------------------------------------------
// Expansion helpers
// ---------------------------------------------------------------------------

/// Literal bits when the text (ignoring whitespace) is all '0'/'1', otherwise
/// the UTF-8 bytes of the whole text.
fn expand_text(text: &str) -> (Vec<u8>, InputKind) {
    let compact: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if compact.iter().all(|&b| b == b'0' || b == b'1') {
        (compact.iter().map(|&b| b - b'0').collect(), InputKind::Bits)
    } else {
        (expand_bytes(text.as_bytes()), InputKind::Text)
    }
}

fn expand_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        push_bits(&mut bits, u64::from(byte), 8);
    }
    bits
}

fn expand_integers(values: &[u64], width: u32) -> Result<Vec<u8>> {
    let mut bits = Vec::with_capacity(values.len() * width as usize);
    for (index, &value) in values.iter().enumerate() {
        if width < MAX_WIDTH && value >> width != 0 {
            return Err(Error::invalid_input(format!(
                "integer {value} at position {index} does not fit in {width} bits"
            )));
        }
        push_bits(&mut bits, value, width);
    }
    Ok(bits)
}

fn push_bits(out: &mut Vec<u8>, value: u64, width: u32) {
    for shift in (0..width).rev() {
        out.push(((value >> shift) & 1) as u8);
    }
}

fn pack_words(bits: &[u8], width: u32) -> Vec<u64> {
    let width = width as usize;
    bits.chunks(width)
        .map(|chunk| {
            let value = chunk
                .iter()
                .fold(0u64, |acc, &b| (acc << 1) | u64::from(b));
            if chunk.len() < width {
                value << (width - chunk.len())
            } else {
                value
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits_of(text: &str) -> Vec<u8> {
        text.bytes().map(|b| b - b'0').collect()
    }

    #[test]
    fn test_literal_bit_string() {
        let stream = normalize(&RawInput::BitString("10110".into()), 8).unwrap();
        assert_eq!(stream.kind(), InputKind::Bits);
        assert_eq!(stream.input_bits(), 5);
        assert_eq!(stream.bits(), bits_of("10110000").as_slice());
        assert_eq!(stream.words(), &[0b1011_0000]);
        assert_eq!(stream.word_width(), 8);
    }

    #[test]
    fn test_whitespace_is_ignored() {
        let stream = normalize(&RawInput::BitString("1010 1010\n0101 0101".into()), 16).unwrap();
        assert_eq!(stream.kind(), InputKind::Bits);
        assert_eq!(stream.input_bits(), 16);
        assert_eq!(stream.words(), &[0b1010_1010_0101_0101]);
    }

    #[test]
    fn test_non_binary_text_expands_bytes() {
        let stream = normalize(&RawInput::BitString("A2".into()), 8).unwrap();
        assert_eq!(stream.kind(), InputKind::Text);
        assert_eq!(stream.bits(), bits_of("0100000100110010").as_slice());
        assert_eq!(stream.words(), &[0x41, 0x32]);
    }

    #[test]
    fn test_byte_buffer_msb_first() {
        let stream = normalize(&RawInput::ByteBuffer(vec![0b1011_0001]), 8).unwrap();
        assert_eq!(stream.bits(), &[1, 0, 1, 1, 0, 0, 0, 1]);
    }

    #[test]
    fn test_integers_pass_through() {
        let options = NormalizeOptions {
            chunk_width: 32,
            integer_width: 4,
        };
        let stream = normalize_with(&RawInput::IntegerList(vec![3, 15, 0]), &options).unwrap();
        assert_eq!(stream.input_bits(), 12);
        assert_eq!(stream.bits().len(), 32);
        assert_eq!(&stream.bits()[..12], bits_of("001111110000").as_slice());
        assert_eq!(stream.words(), &[3, 15, 0]);
        assert_eq!(stream.word_width(), 4);
    }

    #[test]
    fn test_integer_too_wide() {
        let options = NormalizeOptions {
            chunk_width: 8,
            integer_width: 4,
        };
        let err = normalize_with(&RawInput::IntegerList(vec![1, 16]), &options).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("position 1"));
    }

    #[test]
    fn test_empty_inputs_rejected() {
        for raw in [
            RawInput::BitString(String::new()),
            RawInput::BitString(" \n\t".into()),
            RawInput::ByteBuffer(Vec::new()),
            RawInput::IntegerList(Vec::new()),
        ] {
            let err = normalize(&raw, 32).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{raw:?}");
        }
    }

    #[test]
    fn test_width_out_of_range() {
        assert!(normalize(&RawInput::ByteBuffer(vec![1]), 0).is_err());
        assert!(normalize(&RawInput::ByteBuffer(vec![1]), 65).is_err());
        assert!(normalize(&RawInput::ByteBuffer(vec![1]), 64).is_ok());
    }

    #[test]
    fn test_words_of_regroups() {
        let stream = normalize(&RawInput::ByteBuffer(vec![0xAB, 0xCD]), 16).unwrap();
        assert_eq!(stream.words_of(4), vec![0xA, 0xB, 0xC, 0xD]);
        assert_eq!(stream.words_of(12), vec![0xABC, 0xD00]);
        assert_eq!(stream.bytes(), vec![0xAB, 0xCD]);
    }

    #[test]
    fn test_data_bits_exclude_padding() {
        let stream = normalize(&RawInput::BitString("111".into()), 8).unwrap();
        assert_eq!(stream.data_bits(), &[1, 1, 1]);
        assert_eq!(stream.bits().len(), 8);
        assert_eq!(stream.bytes(), vec![0b1110_0000]);

        let stream = normalize(&RawInput::ByteBuffer(vec![0xAB]), 32).unwrap();
        assert_eq!(stream.bits().len(), 32);
        assert_eq!(stream.bytes(), vec![0xAB]);
    }

    #[test]
    fn test_uniforms_in_unit_interval() {
        let stream = normalize(&RawInput::ByteBuffer(vec![0xFF; 16]), 64).unwrap();
        for u in stream.uniforms() {
            assert!((0.0..1.0).contains(&u));
        }
        let stream = normalize(&RawInput::ByteBuffer(vec![0x80, 0x00]), 16).unwrap();
        assert_eq!(stream.uniforms(), vec![0.5]);
    }

    #[test]
    fn test_text_file_lines_joined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bits.txt");
        std::fs::write(&path, "0101\n  1100  \n\n0011\n").unwrap();
        let stream = normalize(&RawInput::TextFile(path), 4).unwrap();
        assert_eq!(stream.kind(), InputKind::Bits);
        assert_eq!(stream.words(), &[0b0101, 0b1100, 0b0011]);
    }

    #[test]
    fn test_missing_text_file_is_io_error() {
        let err = normalize(&RawInput::TextFile("/nonexistent/randsuite.txt".into()), 8)
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
