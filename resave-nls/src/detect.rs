//! Best-effort charset detection for strings whose encoding the file does not record.
//!
//! Plugin strings are nominally Windows-1252, but translated mods routinely ship
//! UTF-8, Cyrillic or Japanese text in the same fields. Valid UTF-8 always wins;
//! otherwise each legacy candidate is decoded and scored.

use std::borrow::Cow;

use crate::Encoding;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedText<'a> {
    pub encoding: Encoding,
    pub text: Cow<'a, str>,
    /// `false` when the bytes decoded with replacement characters under every candidate.
    pub confident: bool,
}

const LEGACY_CANDIDATES: [Encoding; 4] = [
    Encoding::Windows1252,
    Encoding::Windows1251,
    Encoding::Windows1250,
    Encoding::ShiftJis,
];

pub fn detect(bytes: &[u8]) -> DetectedText<'_> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return DetectedText { encoding: Encoding::Utf8, text: Cow::Borrowed(s), confident: true };
    }

    let mut best: Option<(i64, Encoding, Cow<'_, str>)> = None;
    for enc in LEGACY_CANDIDATES {
        let Some(text) = enc.as_encoding_rs().decode_without_bom_handling_and_without_replacement(bytes) else {
            continue;
        };
        let score = score(enc, bytes, &text);
        if best.as_ref().map_or(true, |(s, _, _)| score > *s) {
            best = Some((score, enc, text));
        }
    }

    match best {
        Some((_, encoding, text)) => {
            tracing::trace!(encoding = encoding.name(), "detected legacy text encoding");
            DetectedText { encoding, text, confident: true }
        }
        None => {
            let (text, _) = Encoding::Windows1252.as_encoding_rs().decode_without_bom_handling(bytes);
            DetectedText { encoding: Encoding::Windows1252, text, confident: false }
        }
    }
}

fn score(enc: Encoding, bytes: &[u8], text: &str) -> i64 {
    let mut letters = 0i64;
    let mut odd = 0i64;
    let mut cjk = 0i64;
    for c in text.chars() {
        if c.is_ascii() {
            if c.is_ascii_control() && c != '\n' && c != '\r' && c != '\t' {
                odd += 1;
            }
            continue;
        }
        if is_cjk(c) {
            cjk += 1;
        } else if c.is_alphabetic() {
            letters += 1;
        } else {
            odd += 1;
        }
    }

    // Cyrillic text arrives as runs of high bytes; Latin text has isolated ones.
    let high = bytes.iter().filter(|b| **b >= 0x80).count() as i64;
    let runs = high_byte_runs(bytes) as i64;
    let run_bonus = if high > 0 && runs * 2 < high { 1 } else { 0 };

    match enc {
        Encoding::ShiftJis => cjk * 4 - odd * 2 - letters,
        Encoding::Windows1251 => letters * 2 + run_bonus * high - odd * 2,
        Encoding::Windows1252 => letters * 2 + (1 - run_bonus) * high - odd * 2,
        Encoding::Windows1250 => letters * 2 - odd * 2 - 1,
        Encoding::Utf8 => 0,
    }
}

fn high_byte_runs(bytes: &[u8]) -> usize {
    let mut runs = 0;
    let mut in_run = false;
    for b in bytes {
        let high = *b >= 0x80;
        if high && !in_run {
            runs += 1;
        }
        in_run = high;
    }
    runs
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32, 0x3040..=0x30FF | 0x4E00..=0x9FFF | 0xFF66..=0xFF9F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_is_preferred() {
        let d = detect("Whiterun".as_bytes());
        assert_eq!(d.encoding, Encoding::Utf8);
        assert_eq!(d.text, "Whiterun");
    }

    #[test]
    fn isolated_accent_is_western() {
        let d = detect(&[0x43, 0x61, 0x66, 0xE9, 0x20, 0x4E, 0x6F, 0x69, 0x72]);
        assert_eq!(d.encoding, Encoding::Windows1252);
        assert_eq!(d.text, "Café Noir");
    }

    #[test]
    fn cyrillic_run_is_cp1251() {
        // "Привет" in Windows-1251
        let d = detect(&[0xCF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2]);
        assert_eq!(d.encoding, Encoding::Windows1251);
        assert_eq!(d.text, "Привет");
    }

    #[test]
    fn shift_jis_kana() {
        // "テスト" in Shift-JIS
        let d = detect(&[0x83, 0x65, 0x83, 0x58, 0x83, 0x67]);
        assert_eq!(d.encoding, Encoding::ShiftJis);
        assert_eq!(d.text, "テスト");
    }
}
