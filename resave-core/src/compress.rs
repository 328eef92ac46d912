//! zlib helpers for compressed change-form bodies and plugin records.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::FormatError;

/// Inflates `data`, which must expand to exactly `expected` bytes.
/// `offset` is the file position of `data`, for error reporting.
pub fn inflate(data: &[u8], expected: usize, offset: usize) -> Result<Vec<u8>, FormatError> {
    let mut out = Vec::with_capacity(expected);
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| FormatError::Compression { offset, message: e.to_string() })?;
    if out.len() != expected {
        return Err(FormatError::SizeMismatch {
            what: "inflated data",
            declared: expected,
            actual: out.len(),
            offset,
        });
    }
    Ok(out)
}

pub fn deflate(data: &[u8]) -> Result<Vec<u8>, FormatError> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| FormatError::Compression { offset: 0, message: e.to_string() })?;
    encoder.finish().map_err(|e| FormatError::Compression { offset: 0, message: e.to_string() })
}
