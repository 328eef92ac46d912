//! Script instances, references and struct instances, with their data blocks.

use crate::config::Layout;
use crate::error::{ParseResultExt, Result};
use crate::ids::{Handle, RefId};
use crate::io::{read_list, Element, SaveReader, SaveWriter};
use crate::strings::{StringTable, TString};
use crate::variable::Variable;

const DATA_HAS_SECOND_UNKNOWN: u8 = 0x04;

/// Header entry of a live script instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptInstance {
    pub handle: Handle,
    pub script: TString,
    pub unknown_bits: u16,
    pub unknown_short: i16,
    /// The game object the script is attached to.
    pub ref_id: RefId,
    pub unknown_byte: u8,
    /// Fallout 4 only, present when both low bits of `unknown_bits` are set.
    pub extra: Option<u8>,
}

impl ScriptInstance {
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Self> {
        let handle = Handle::read(r)?;
        let script = TString::read(r, strings)?;
        let unknown_bits = r.read_u16()?;
        let unknown_short = r.read_i16()?;
        let ref_id = RefId::read(r)?;
        let unknown_byte = r.read_u8()?;
        let extra = if r.layout().game.supports_structs() && unknown_bits & 0x3 == 0x3 {
            Some(r.read_u8()?)
        } else {
            None
        };
        Ok(Self { handle, script, unknown_bits, unknown_short, ref_id, unknown_byte, extra })
    }
}

impl Element for ScriptInstance {
    fn write(&self, w: &mut SaveWriter) {
        self.handle.write(w);
        self.script.write(w);
        w.write_u16(self.unknown_bits);
        w.write_i16(self.unknown_short);
        self.ref_id.write(w);
        w.write_u8(self.unknown_byte);
        if let Some(b) = self.extra {
            w.write_u8(b);
        }
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        layout.handle_bytes() + layout.string_index_bytes() + 2 + 2 + 3 + 1 + self.extra.map_or(0, |_| 1)
    }
}

/// Header entry of a reference object (a bare typed handle).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    pub handle: Handle,
    pub ty: TString,
}

impl Reference {
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Self> {
        let handle = Handle::read(r)?;
        let ty = TString::read(r, strings)?;
        Ok(Self { handle, ty })
    }
}

impl Element for Reference {
    fn write(&self, w: &mut SaveWriter) {
        self.handle.write(w);
        self.ty.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        layout.handle_bytes() + layout.string_index_bytes()
    }
}

/// Header entry of a struct instance (Fallout 4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructInstance {
    pub handle: Handle,
    pub name: TString,
}

impl StructInstance {
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Self> {
        let handle = Handle::read(r)?;
        let name = TString::read(r, strings)?;
        Ok(Self { handle, name })
    }
}

impl Element for StructInstance {
    fn write(&self, w: &mut SaveWriter) {
        self.handle.write(w);
        self.name.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        layout.handle_bytes() + layout.string_index_bytes()
    }
}

/// Member values of a script instance or reference.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectData {
    pub handle: Handle,
    pub flag: u8,
    pub ty: TString,
    pub unknown1: i32,
    pub unknown2: Option<i32>,
    pub members: Vec<Variable>,
}

impl ObjectData {
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Self> {
        let handle = Handle::read(r)?;
        let flag = r.read_u8()?;
        let ty = TString::read(r, strings)?;
        let unknown1 = r.read_i32()?;
        let unknown2 = if flag & DATA_HAS_SECOND_UNKNOWN != 0 { Some(r.read_i32()?) } else { None };
        let count = r.read_count_i32("member count", 0, i32::MAX)?;
        let members = read_list(r, count, "member", |r| Variable::read(r, strings))
            .with_element(|| format!("data of {handle}"))?;
        Ok(Self { handle, flag, ty, unknown1, unknown2, members })
    }
}

impl Element for ObjectData {
    fn write(&self, w: &mut SaveWriter) {
        self.handle.write(w);
        w.write_u8(self.flag);
        self.ty.write(w);
        w.write_i32(self.unknown1);
        if let Some(v) = self.unknown2 {
            w.write_i32(v);
        }
        w.write_i32(self.members.len() as i32);
        self.members.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        layout.handle_bytes()
            + 1
            + layout.string_index_bytes()
            + 4
            + self.unknown2.map_or(0, |_| 4)
            + 4
            + self.members.calculate_size(layout)
    }
}

/// Member values of a struct instance (Fallout 4).
#[derive(Clone, Debug, PartialEq)]
pub struct StructData {
    pub handle: Handle,
    pub flag: u8,
    pub members: Vec<Variable>,
}

impl StructData {
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Self> {
        let handle = Handle::read(r)?;
        let flag = r.read_u8()?;
        let count = r.read_count_i32("member count", 0, i32::MAX)?;
        let members = read_list(r, count, "member", |r| Variable::read(r, strings))
            .with_element(|| format!("struct data of {handle}"))?;
        Ok(Self { handle, flag, members })
    }
}

impl Element for StructData {
    fn write(&self, w: &mut SaveWriter) {
        self.handle.write(w);
        w.write_u8(self.flag);
        w.write_i32(self.members.len() as i32);
        self.members.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        layout.handle_bytes() + 1 + 4 + self.members.calculate_size(layout)
    }
}
