use std::path::Path;

use anyhow::Context;
use resave_core::config::Layout;
use resave_core::error::{FormatError, ParseResultExt, Result};
use resave_core::io::{Element, SaveReader, SaveWriter};
use resave_core::plugin::PluginInfo;
use resave_nls::{AutoDecoder, TextDecoder};

use crate::code::RecordCode;
use crate::context::EspContext;
use crate::field::Field;
use crate::header::RecordFlags;
use crate::record::{read_record, Entry, Record};

/// A decoded plugin: its `TES4` header record and every top-level record or group.
#[derive(Clone, Debug, PartialEq)]
pub struct PluginFile {
    pub name: String,
    pub header: Record,
    pub masters: Vec<String>,
    pub entries: Vec<Entry>,
}

impl PluginFile {
    pub fn is_localized(&self) -> bool {
        self.header.header.flags.contains(RecordFlags::LOCALIZED)
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.entries.iter().flat_map(Entry::records)
    }
}

fn master_names(header: &Record) -> Vec<String> {
    header
        .fields()
        .iter()
        .filter_map(|f| match f {
            Field::Opaque { code: RecordCode::MAST, data } => Some(AutoDecoder.decode_cstr(data).into_owned()),
            _ => None,
        })
        .collect()
}

/// Decodes a whole plugin. Form ids are remapped from the plugin's own master
/// list onto `plugins`, the load order of the save being edited.
pub fn read_plugin(bytes: &[u8], name: &str, plugins: &PluginInfo) -> Result<PluginFile> {
    let mut r = SaveReader::new(bytes, Layout::default());

    let code = RecordCode::read(&mut r)?;
    if code != RecordCode::TES4 {
        return Err(FormatError::BadCode { expected: "TES4".into(), found: code.to_string(), offset: 0 }.into());
    }
    let size = r.read_u32()? as usize;
    let header = read_record(&mut r, code, size, &EspContext::bootstrap(name)).element("TES4 record")?;
    let masters = master_names(&header);
    let localized = header.header.flags.contains(RecordFlags::LOCALIZED);
    let ctx = EspContext::new(name, masters.as_slice(), plugins, localized);

    let mut entries = Vec::new();
    while !r.is_empty() {
        entries.push(Entry::read(&mut r, &ctx)?);
    }
    tracing::debug!(plugin = name, masters = masters.len(), entries = entries.len(), localized, "read plugin");

    Ok(PluginFile { name: name.to_string(), header, masters, entries })
}

pub fn read_plugin_path<P: AsRef<Path>>(path: P, plugins: &PluginInfo) -> anyhow::Result<PluginFile> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("plugin path has no file name: {}", path.display()))?;
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let plugin = read_plugin(&bytes, name, plugins).with_context(|| format!("decode {}", path.display()))?;
    Ok(plugin)
}

impl Element for PluginFile {
    fn write(&self, w: &mut SaveWriter) {
        self.header.write(w);
        self.entries.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        self.header.calculate_size(layout) + self.entries.calculate_size(layout)
    }
}
