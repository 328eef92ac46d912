//! The script-attachment (`VMAD`) field: scripts bound to a record, their
//! property values, and for some record kinds a trailing fragment block.

mod fragment;
mod property;

pub use fragment::{
    AliasScripts, FlaggedFragments, FragmentCall, Fragments, PerkFragment, PhaseFragment, StageFragment,
};
pub use property::{ObjFormat, ObjectRef, Property, PropertyReader, PropertyValue};

use resave_core::config::Layout;
use resave_core::error::{ParseResultExt, Result};
use resave_core::io::{read_list, Element, SaveReader, SaveWriter};
use resave_core::strings::WString;

use crate::code::RecordCode;
use crate::context::EspContext;

#[derive(Clone, Debug, PartialEq)]
pub struct VmadScript {
    pub name: WString,
    /// Present from attachment version 4 on.
    pub status: Option<u8>,
    pub properties: Vec<Property>,
}

impl VmadScript {
    pub fn read(r: &mut SaveReader<'_>, p: &PropertyReader<'_, '_>) -> Result<Self> {
        let name = WString::read(r)?;
        let status = if p.version >= 4 { Some(r.read_u8()?) } else { None };
        let count = r.read_u16()? as usize;
        let properties = read_list(r, count, "property", |r| Property::read(r, p))
            .with_element(|| format!("script {name}"))?;
        Ok(Self { name, status, properties })
    }
}

impl Element for VmadScript {
    fn write(&self, w: &mut SaveWriter) {
        self.name.write(w);
        if let Some(s) = self.status {
            w.write_u8(s);
        }
        w.write_u16(self.properties.len() as u16);
        self.properties.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        self.name.calculate_size(layout) + self.status.map_or(0, |_| 1) + 2 + self.properties.calculate_size(layout)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Vmad {
    pub version: i16,
    pub format: ObjFormat,
    pub scripts: Vec<VmadScript>,
    pub fragments: Option<Fragments>,
}

impl Vmad {
    /// Reads the whole field payload. `parent` selects the fragment layout.
    pub fn read(r: &mut SaveReader<'_>, parent: RecordCode, ctx: &EspContext<'_>) -> Result<Self> {
        let version = r.read_i16()?;
        let offset = r.position();
        let format = ObjFormat::from_raw(r.read_i16()?, offset)?;
        let p = PropertyReader { version, format, ctx };

        let count = r.read_u16()? as usize;
        let scripts = read_list(r, count, "script", |r| VmadScript::read(r, &p))?;

        let fragments = if r.is_empty() {
            None
        } else {
            match parent {
                RecordCode::INFO => Some(Fragments::read_info(r)?),
                RecordCode::PACK => Some(Fragments::read_package(r)?),
                RecordCode::PERK => Some(Fragments::read_perk(r)?),
                RecordCode::QUST => Some(Fragments::read_quest(r, &p)?),
                RecordCode::SCEN => Some(Fragments::read_scene(r)?),
                _ => None,
            }
        };
        r.expect_end("VMAD")?;
        Ok(Self { version, format, scripts, fragments })
    }

    /// Names of every script this field attaches, fragments and alias scripts included.
    pub fn script_names(&self) -> impl Iterator<Item = &WString> {
        let fragment_names = self.fragments.as_ref().map(Fragments::script_names).unwrap_or_default();
        self.scripts.iter().map(|s| &s.name).chain(fragment_names)
    }

    pub fn objects(&self) -> Vec<&ObjectRef> {
        self.scripts
            .iter()
            .flat_map(|s| &s.properties)
            .flat_map(|p| p.value.objects())
            .collect()
    }
}

impl Element for Vmad {
    fn write(&self, w: &mut SaveWriter) {
        w.write_i16(self.version);
        w.write_i16(self.format.raw());
        w.write_u16(self.scripts.len() as u16);
        self.scripts.write(w);
        self.fragments.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        6 + self.scripts.calculate_size(layout) + self.fragments.calculate_size(layout)
    }
}
