//! Raw game strings and the session-scoped interning table.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use resave_nls::{AutoDecoder, TextDecoder};

use crate::config::{Layout, StringIndexWidth};
use crate::error::{FormatError, ParseResultExt, Result};
use crate::io::{read_list, Element, SaveReader, SaveWriter};

/// A string as stored in the file: raw bytes with a `u16` length prefix.
///
/// The bytes are kept verbatim so writing never re-encodes; text access goes
/// through charset detection.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WString(Vec<u8>);

impl WString {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_str(&self) -> Cow<'_, str> {
        AutoDecoder.decode(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.to_str().to_lowercase() == other.to_lowercase()
    }

    pub fn read(r: &mut SaveReader<'_>) -> std::result::Result<Self, FormatError> {
        Ok(Self(r.read_wstring()?.to_vec()))
    }
}

impl From<&str> for WString {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl Element for WString {
    fn write(&self, w: &mut SaveWriter) {
        w.write_wstring(&self.0);
    }

    fn calculate_size(&self, _layout: &Layout) -> usize {
        2 + self.0.len()
    }
}

impl fmt::Display for WString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str())
    }
}

impl fmt::Debug for WString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_str())
    }
}

/// An interned string: the table index plus a shared copy of the value.
///
/// Equality and hashing ignore case, matching how the VM compares names.
#[derive(Clone)]
pub struct TString {
    index: u32,
    value: Arc<str>,
}

impl TString {
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.value.to_lowercase() == other.to_lowercase()
    }

    pub fn starts_with_ignore_case(&self, prefix: &str) -> bool {
        self.value.len() >= prefix.len()
            && self.value.is_char_boundary(prefix.len())
            && self.value[..prefix.len()].eq_ignore_ascii_case(prefix)
    }

    /// Reads an index and binds it to the table. Out-of-range indices are a format error.
    pub fn read(r: &mut SaveReader<'_>, table: &StringTable) -> std::result::Result<Self, FormatError> {
        let offset = r.position();
        let index = match r.layout().string_index {
            StringIndexWidth::Short => r.read_u16()? as u32,
            StringIndexWidth::Long => r.read_u32()?,
        };
        table.get(index).ok_or(FormatError::UnknownString { index, size: table.len(), offset })
    }
}

impl Element for TString {
    fn write(&self, w: &mut SaveWriter) {
        match w.layout().string_index {
            StringIndexWidth::Short => w.write_u16(self.index as u16),
            StringIndexWidth::Long => w.write_u32(self.index),
        }
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        layout.string_index_bytes()
    }
}

impl PartialEq for TString {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index || self.value.to_lowercase() == other.value.to_lowercase()
    }
}

impl Eq for TString {}

impl Hash for TString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.to_lowercase().hash(state);
    }
}

impl fmt::Display for TString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl fmt::Debug for TString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", &*self.value, self.index)
    }
}

/// Session-scoped string table. Each distinct (case-insensitive) value has one index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StringTable {
    raw: Vec<WString>,
    values: Vec<Arc<str>>,
    lookup: HashMap<String, u32>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<TString> {
        let value = self.values.get(index as usize)?;
        Some(TString { index, value: value.clone() })
    }

    pub fn find(&self, value: &str) -> Option<TString> {
        let index = *self.lookup.get(&value.to_lowercase())?;
        self.get(index)
    }

    /// Returns the existing entry for `value`, adding it when absent.
    pub fn intern(&mut self, value: &str) -> TString {
        if let Some(t) = self.find(value) {
            return t;
        }
        self.push(WString::from(value))
    }

    fn push(&mut self, raw: WString) -> TString {
        let index = self.raw.len() as u32;
        let value: Arc<str> = Arc::from(raw.to_str().as_ref());
        // Files may carry duplicates; the first occurrence stays the lookup target.
        self.lookup.entry(value.to_lowercase()).or_insert(index);
        self.values.push(value.clone());
        self.raw.push(raw);
        TString { index, value }
    }

    pub fn iter(&self) -> impl Iterator<Item = TString> + '_ {
        (0..self.raw.len() as u32).filter_map(|i| self.get(i))
    }

    pub fn read(r: &mut SaveReader<'_>) -> Result<Self> {
        let count = match r.layout().string_index {
            StringIndexWidth::Short => r.read_u16()? as usize,
            StringIndexWidth::Long => r.read_count_u32("string count", 2)?,
        };
        let raw = read_list(r, count, "string", |r| Ok(WString::read(r)?)).element("StringTable")?;
        let mut table = StringTable::new();
        for s in raw {
            table.push(s);
        }
        Ok(table)
    }
}

impl Element for StringTable {
    fn write(&self, w: &mut SaveWriter) {
        match w.layout().string_index {
            StringIndexWidth::Short => w.write_count_u16("string count", self.raw.len()),
            StringIndexWidth::Long => w.write_u32(self.raw.len() as u32),
        }
        for s in &self.raw {
            s.write(w);
        }
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        layout.string_index_bytes() + self.raw.calculate_size(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::to_bytes;
    use pretty_assertions::assert_eq;

    #[test]
    fn intern_is_case_insensitive() {
        let mut table = StringTable::new();
        let a = table.intern("OnInit");
        let b = table.intern("oninit");
        let c = table.intern("OnUpdate");
        assert_eq!(a.index(), b.index());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn table_roundtrip_both_widths() {
        for width in [StringIndexWidth::Short, StringIndexWidth::Long] {
            let layout = Layout::new(crate::config::Game::SkyrimSe, width);
            let mut table = StringTable::new();
            table.intern("Actor");
            table.intern("::temp0");
            let bytes = to_bytes(&table, layout).unwrap();
            assert_eq!(bytes.len(), table.calculate_size(&layout));

            let mut r = SaveReader::new(&bytes, layout);
            let back = StringTable::read(&mut r).unwrap();
            assert!(r.is_empty());
            assert_eq!(to_bytes(&back, layout).unwrap(), bytes);

            let t = back.find("ACTOR").unwrap();
            let idx = to_bytes(&t, layout).unwrap();
            assert_eq!(idx.len(), width.bytes());
            let again = TString::read(&mut SaveReader::new(&idx, layout), &back).unwrap();
            assert_eq!(again.as_str(), "Actor");
        }
    }

    #[test]
    fn unknown_index_is_an_error() {
        let table = StringTable::new();
        let layout = Layout::new(crate::config::Game::SkyrimSe, StringIndexWidth::Short);
        let err = TString::read(&mut SaveReader::new(&[5, 0], layout), &table).unwrap_err();
        assert_eq!(err, FormatError::UnknownString { index: 5, size: 0, offset: 0 });
    }
}
