//! The load order: full plugins (byte-indexed) and lightweight plugins (short-indexed).

use std::cmp::Ordering;
use std::fmt;

use crate::config::Layout;
use crate::error::{FormatError, ParseResultExt, Result};
use crate::ids::FormId;
use crate::io::{read_list, Element, SaveReader, SaveWriter};
use crate::strings::WString;

#[derive(Clone, Debug)]
pub struct Plugin {
    name: WString,
    index: u16,
    lite: bool,
}

impl Plugin {
    pub fn new(name: impl Into<WString>, index: u16, lite: bool) -> Self {
        Self { name: name.into(), index, lite }
    }

    pub fn name(&self) -> String {
        self.name.to_str().into_owned()
    }

    pub fn raw_name(&self) -> &WString {
        &self.name
    }

    /// Position in its own table (full or lightweight).
    #[inline]
    pub fn index(&self) -> u16 {
        self.index
    }

    #[inline]
    pub fn is_lite(&self) -> bool {
        self.lite
    }

    /// `[07]` for full plugins, `[FE:012]` for lightweight ones.
    pub fn index_label(&self) -> String {
        if self.lite {
            format!("FE:{:03X}", self.index)
        } else {
            format!("{:02X}", self.index)
        }
    }

    fn lower_name(&self) -> String {
        self.name.to_str().to_lowercase()
    }
}

impl PartialEq for Plugin {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Plugin {}

impl PartialOrd for Plugin {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Plugins order by name, ignoring case.
impl Ord for Plugin {
    fn cmp(&self, other: &Self) -> Ordering {
        self.lower_name().cmp(&other.lower_name())
    }
}

impl fmt::Display for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.index_label(), self.name)
    }
}

/// The save's plugin table.
///
/// Wire form: `u32` byte length of the rest, `u8` count of full plugins and their
/// names, then (when the layout allows it) a `u16` count of lightweight plugins.
#[derive(Clone, Debug, Default)]
pub struct PluginInfo {
    full: Vec<Plugin>,
    lite: Option<Vec<Plugin>>,
}

impl PluginInfo {
    pub const MAX_FULL: usize = 256;
    pub const MAX_LITE: usize = 4096;

    pub fn new(full: Vec<Plugin>, lite: Option<Vec<Plugin>>) -> Self {
        Self { full, lite }
    }

    /// Builds a load order from plain names, in order.
    pub fn from_names(full: &[&str], lite: &[&str]) -> Self {
        let full = full.iter().enumerate().map(|(i, n)| Plugin::new(*n, i as u16, false)).collect();
        let lite = lite.iter().enumerate().map(|(i, n)| Plugin::new(*n, i as u16, true)).collect();
        Self { full, lite: Some(lite) }
    }

    pub fn full(&self) -> &[Plugin] {
        &self.full
    }

    pub fn lite(&self) -> &[Plugin] {
        self.lite.as_deref().unwrap_or(&[])
    }

    pub fn all(&self) -> impl Iterator<Item = &Plugin> {
        self.full.iter().chain(self.lite())
    }

    pub fn len(&self) -> usize {
        self.full.len() + self.lite().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, name: &str) -> Option<&Plugin> {
        let lower = name.to_lowercase();
        self.all().find(|p| p.lower_name() == lower)
    }

    /// The plugin whose prefix `id` carries, if it is in this load order.
    pub fn owner_of(&self, id: FormId) -> Option<&Plugin> {
        if id.is_created() {
            None
        } else if id.is_lite() {
            self.lite().get(id.lite_index() as usize)
        } else {
            self.full.get(id.plugin_index() as usize)
        }
    }

    fn body_size(&self, layout: &Layout) -> usize {
        let mut size = 1 + names_size(&self.full, layout);
        if let Some(lite) = &self.lite {
            size += 2 + names_size(lite, layout);
        }
        size
    }

    pub fn read(r: &mut SaveReader<'_>) -> Result<Self> {
        Self::read_inner(r).element("PluginInfo")
    }

    fn read_inner(r: &mut SaveReader<'_>) -> Result<Self> {
        let declared = r.read_u32()? as usize;
        let start = r.position();

        let full_count = r.read_u8()? as usize;
        let full = read_list(r, full_count, "plugin", |r| Ok(WString::read(r)?))?
            .into_iter()
            .enumerate()
            .map(|(i, name)| Plugin { name, index: i as u16, lite: false })
            .collect();

        let lite = if r.layout().lite_plugins {
            let offset = r.position();
            let count = r.read_u16()? as usize;
            if count > Self::MAX_LITE {
                return Err(FormatError::OutOfRange {
                    what: "lightweight plugin count",
                    value: count as i64,
                    min: 0,
                    max: Self::MAX_LITE as i64,
                    offset,
                }
                .into());
            }
            let lite = read_list(r, count, "lite plugin", |r| Ok(WString::read(r)?))?
                .into_iter()
                .enumerate()
                .map(|(i, name)| Plugin { name, index: i as u16, lite: true })
                .collect();
            Some(lite)
        } else {
            None
        };

        let info = PluginInfo { full, lite };
        let consumed = r.position() - start;
        let recomputed = info.body_size(r.layout());
        if consumed != declared || recomputed != declared {
            return Err(FormatError::SizeMismatch {
                what: "plugin table",
                declared,
                actual: consumed,
                offset: start,
            }
            .into());
        }
        Ok(info)
    }
}

fn names_size(plugins: &[Plugin], layout: &Layout) -> usize {
    plugins.iter().map(|p| p.name.calculate_size(layout)).sum()
}

impl Element for PluginInfo {
    fn write(&self, w: &mut SaveWriter) {
        let layout = *w.layout();
        w.write_u32(self.body_size(&layout) as u32);
        w.write_count_u8("full plugin count", self.full.len());
        for p in &self.full {
            p.name.write(w);
        }
        if let Some(lite) = &self.lite {
            w.write_count_u16("lightweight plugin count", lite.len());
            for p in lite {
                p.name.write(w);
            }
        }
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        4 + self.body_size(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Game, StringIndexWidth};
    use crate::io::to_bytes;

    fn se() -> Layout {
        Layout::new(Game::SkyrimSe, StringIndexWidth::Long)
    }

    #[test]
    fn roundtrip_with_lite_block() {
        let info = PluginInfo::from_names(&["Skyrim.esm", "Update.esm"], &["a.esl"]);
        let bytes = to_bytes(&info, se()).unwrap();
        assert_eq!(bytes.len(), info.calculate_size(&se()));
        assert_eq!(&bytes[..4], &(bytes.len() as u32 - 4).to_le_bytes());

        let back = PluginInfo::read(&mut SaveReader::new(&bytes, se())).unwrap();
        assert_eq!(back.full().len(), 2);
        assert_eq!(back.lite()[0].name(), "a.esl");
        assert!(back.lite()[0].is_lite());
        assert_eq!(to_bytes(&back, se()).unwrap(), bytes);
    }

    #[test]
    fn declared_length_is_checked() {
        let info = PluginInfo::from_names(&["Skyrim.esm"], &[]);
        let mut bytes = to_bytes(&info, se()).unwrap();
        bytes[0] += 1;
        bytes.push(0);
        let err = PluginInfo::read(&mut SaveReader::new(&bytes, se())).unwrap_err();
        assert!(matches!(err.root(), FormatError::SizeMismatch { what: "plugin table", .. }));
    }

    #[test]
    fn full_plugin_count_past_a_byte_is_rejected() {
        let names: Vec<String> = (0..256).map(|i| format!("Mod{i:03}.esp")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let err = to_bytes(&PluginInfo::from_names(&refs, &[]), se()).unwrap_err();
        assert_eq!(
            err,
            FormatError::OutOfRange { what: "full plugin count", value: 256, min: 0, max: 255, offset: 4 }
        );

        let fits = PluginInfo::from_names(&refs[..255], &[]);
        let bytes = to_bytes(&fits, se()).unwrap();
        assert_eq!(bytes[4], 255);
        let back = PluginInfo::read(&mut SaveReader::new(&bytes, se())).unwrap();
        assert_eq!(back.full().len(), 255);
    }

    #[test]
    fn ownership_and_ordering() {
        let info = PluginInfo::from_names(&["Skyrim.esm", "mymod.esp"], &["x.esl", "y.esl"]);
        assert_eq!(info.owner_of(FormId(0x0100_0D62)).unwrap().name(), "mymod.esp");
        assert_eq!(info.owner_of(FormId(0xFE00_1800)).unwrap().name(), "y.esl");
        assert!(info.owner_of(FormId(0xFF00_0001)).is_none());
        assert!(info.owner_of(FormId(0x0500_0001)).is_none());
        assert_eq!(info.find("MYMOD.ESP").map(|p| p.index()), Some(1));

        let a = Plugin::new("alpha.esp", 3, false);
        let b = Plugin::new("Beta.esp", 1, false);
        assert!(a < b);
        assert_eq!(Plugin::new("ALPHA.esp", 0, true), a);
    }
}
