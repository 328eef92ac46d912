//! Error taxonomy shared by every decoder.
//!
//! [`FormatError`] is the leaf: the bytes themselves are wrong. [`ParseError`] wraps
//! it with the chain of structures that were being built when it happened, so a
//! failure deep inside a stack frame reads as
//! `Papyrus > thread data[2/5] > ActiveThread > frame[0/3] > StackFrame: ...`.

use std::borrow::Cow;
use std::fmt::Write;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("unexpected end of data at 0x{offset:X}: need {need} bytes, {remaining} left")]
    UnexpectedEof { offset: usize, need: usize, remaining: usize },

    #[error("unknown {what} tag {tag} at 0x{offset:X}")]
    UnknownTag { what: &'static str, tag: u32, offset: usize },

    #[error("{what} {value} outside {min}..={max} at 0x{offset:X}")]
    OutOfRange { what: &'static str, value: i64, min: i64, max: i64, offset: usize },

    #[error("expected {expected}, found {found} at 0x{offset:X}")]
    BadCode { expected: String, found: String, offset: usize },

    #[error("{what} declares {declared} bytes but {actual} were found at 0x{offset:X}")]
    SizeMismatch { what: &'static str, declared: usize, actual: usize, offset: usize },

    #[error("value 0x{value:X} exceeds the VSVal maximum 0x{max:X}")]
    VsValOverflow { value: u32, max: u32 },

    #[error("corrupt zlib stream at 0x{offset:X}: {message}")]
    Compression { offset: usize, message: String },

    #[error("string index {index} is outside the string table (size {size}) at 0x{offset:X}")]
    UnknownString { index: u32, size: usize, offset: usize },

    #[error("{what} {handle} at 0x{offset:X} has no matching header entry")]
    UnknownHandle { what: &'static str, handle: String, offset: usize },

    #[error("instruction pointer {ptr} is past the end of {len} opcodes")]
    InstructionPointer { ptr: u32, len: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error(transparent)]
    Format(#[from] FormatError),

    /// A structure could not be built because one of its children failed.
    #[error("failed to read {element}")]
    Element {
        element: Cow<'static, str>,
        #[source]
        source: Box<ParseError>,
    },

    /// One item of a homogeneous sequence failed.
    #[error("failed to read item {index} of {count}")]
    List {
        index: usize,
        count: usize,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// The innermost format error.
    pub fn root(&self) -> &FormatError {
        match self {
            ParseError::Format(e) => e,
            ParseError::Element { source, .. } | ParseError::List { source, .. } => source.root(),
        }
    }

    /// Renders the structure chain outermost-first, ending with the root cause.
    pub fn path(&self) -> String {
        let mut out = String::new();
        let mut cur = self;
        loop {
            match cur {
                ParseError::Format(e) => {
                    let _ = write!(out, "{e}");
                    return out;
                }
                ParseError::Element { element, source } => {
                    let _ = write!(out, "{element} > ");
                    cur = source;
                }
                ParseError::List { index, count, source } => {
                    let _ = write!(out, "[{index}/{count}] > ");
                    cur = source;
                }
            }
        }
    }
}

pub type Result<T, E = ParseError> = std::result::Result<T, E>;

/// Attaches positional context to a failed read, in the manner of `anyhow::Context`.
pub trait ParseResultExt<T> {
    fn element(self, element: &'static str) -> Result<T>;

    fn with_element<F: FnOnce() -> String>(self, f: F) -> Result<T>;

    fn list_item(self, index: usize, count: usize) -> Result<T>;
}

impl<T, E: Into<ParseError>> ParseResultExt<T> for std::result::Result<T, E> {
    fn element(self, element: &'static str) -> Result<T> {
        self.map_err(|e| ParseError::Element { element: Cow::Borrowed(element), source: Box::new(e.into()) })
    }

    fn with_element<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| ParseError::Element { element: Cow::Owned(f()), source: Box::new(e.into()) })
    }

    fn list_item(self, index: usize, count: usize) -> Result<T> {
        self.map_err(|e| ParseError::List { index, count, source: Box::new(e.into()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eof() -> std::result::Result<(), FormatError> {
        Err(FormatError::UnexpectedEof { offset: 0x10, need: 4, remaining: 1 })
    }

    #[test]
    fn path_lists_every_layer() {
        let err = eof().element("StackFrame").list_item(2, 5).element("ActiveThread").unwrap_err();
        assert_eq!(
            err.path(),
            "ActiveThread > [2/5] > StackFrame > unexpected end of data at 0x10: need 4 bytes, 1 left"
        );
        assert!(matches!(err.root(), FormatError::UnexpectedEof { offset: 0x10, .. }));
    }
}
