//! This crate implements the save-side codecs of resave
//!
//! This mostly includes the identifier encodings, the interned string table, the
//! scripting VM snapshot, change forms, and resolution over a decoded save.

#![allow(clippy::uninlined_format_args)]

pub mod changeform;
pub mod compress;
pub mod config;
pub mod context;
pub mod error;
pub mod formid_table;
pub mod ids;
pub mod io;
pub mod papyrus;
pub mod plugin;
pub mod strings;
pub mod variable;

pub use context::{LiveObject, Resolver};
pub use error::{FormatError, ParseError, ParseResultExt, Result};
pub use io::{Element, SaveReader, SaveWriter};
