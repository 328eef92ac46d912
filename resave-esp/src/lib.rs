//! Plugin (mod description) file codec.
//!
//! Records and groups, their fields with `XXXX` size chaining, compressed
//! records, script attachments with their fragments, and a catalog of what the
//! decoded plugins define.

#![allow(clippy::uninlined_format_args)]

pub mod catalog;
pub mod code;
pub mod context;
pub mod field;
pub mod header;
pub mod plugin_file;
pub mod record;
pub mod vmad;

pub use catalog::{CatalogEntry, PluginCatalog};
pub use code::RecordCode;
pub use context::EspContext;
pub use field::{Field, FullName};
pub use header::{RecordFlags, RecordHeader};
pub use plugin_file::{read_plugin, read_plugin_path, PluginFile};
pub use record::{Entry, Group, Packed, Record};
pub use vmad::Vmad;
