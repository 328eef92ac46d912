use crate::config::Layout;
use crate::error::{ParseResultExt, Result};
use crate::io::{read_list, Element, SaveReader, SaveWriter};
use crate::strings::{StringTable, TString};

use super::frame::MemberDesc;

/// Engine-provided scripts that never carry a parent but are still defined.
pub const IMPLICIT_SCRIPTS: &[&str] = &[
    "ActiveMagicEffect",
    "Alias",
    "CommonArrayFunctions",
    "Debug",
    "F4SE",
    "Form",
    "Game",
    "Input",
    "InputEnableLayer",
    "Math",
    "ModEvent",
    "SKSE",
    "ScriptObject",
    "String",
    "StringUtil",
    "UI",
    "Utility",
];

pub fn is_implicit(name: &str) -> bool {
    IMPLICIT_SCRIPTS.iter().any(|s| s.eq_ignore_ascii_case(name))
}

fn read_members(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Vec<MemberDesc>> {
    let count = r.read_count_i32("member count", 0, i32::MAX)?;
    read_list(r, count, "member", |r| Ok(MemberDesc::read(r, strings)?))
}

/// A script definition: its name, parent and member layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Script {
    pub name: TString,
    pub supertype: TString,
    pub members: Vec<MemberDesc>,
}

impl Script {
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Self> {
        let name = TString::read(r, strings)?;
        let supertype = TString::read(r, strings)?;
        let members = read_members(r, strings).with_element(|| format!("script {name}"))?;
        Ok(Self { name, supertype, members })
    }

    /// A parentless script that the engine does not define itself.
    pub fn is_undefined(&self) -> bool {
        self.supertype.is_empty() && !is_implicit(self.name.as_str())
    }
}

impl Element for Script {
    fn write(&self, w: &mut SaveWriter) {
        self.name.write(w);
        self.supertype.write(w);
        w.write_i32(self.members.len() as i32);
        self.members.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        2 * layout.string_index_bytes() + 4 + self.members.calculate_size(layout)
    }
}

/// A struct type definition (Fallout 4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructDef {
    pub name: TString,
    pub members: Vec<MemberDesc>,
}

impl StructDef {
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Self> {
        let name = TString::read(r, strings)?;
        let members = read_members(r, strings).with_element(|| format!("struct {name}"))?;
        Ok(Self { name, members })
    }
}

impl Element for StructDef {
    fn write(&self, w: &mut SaveWriter) {
        self.name.write(w);
        w.write_i32(self.members.len() as i32);
        self.members.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        layout.string_index_bytes() + 4 + self.members.calculate_size(layout)
    }
}
