//! Text decoding for strings whose character set the file does not record.

use encoding_rs::{Encoding as RsEncoding, SHIFT_JIS, UTF_8, WINDOWS_1250, WINDOWS_1251, WINDOWS_1252};
use std::borrow::Cow;

mod detect;

pub use detect::{detect, DetectedText};

pub trait TextDecoder {
    fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str>;

    /// Decode C-style string: stop at the first NUL (0x00).
    fn decode_cstr<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.decode(&bytes[..end])
    }
}

/// Character sets seen in game data and mod files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Utf8,
    /// Western European codepage; the historical default for plugin strings.
    Windows1252,
    /// Central European.
    Windows1250,
    /// Cyrillic.
    Windows1251,
    ShiftJis,
}

impl Encoding {
    #[inline]
    pub fn as_encoding_rs(self) -> &'static RsEncoding {
        match self {
            Encoding::Utf8 => UTF_8,
            Encoding::Windows1252 => WINDOWS_1252,
            Encoding::Windows1250 => WINDOWS_1250,
            Encoding::Windows1251 => WINDOWS_1251,
            Encoding::ShiftJis => SHIFT_JIS,
        }
    }

    pub fn name(self) -> &'static str {
        self.as_encoding_rs().name()
    }
}

/// Decodes with whatever [`detect`] picks for each input. Use this for blobs whose
/// encoding is not recorded anywhere in the file.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoDecoder;

impl TextDecoder for AutoDecoder {
    fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        detect(bytes).text
    }
}
