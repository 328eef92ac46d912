//! Script fragments: the extra block that follows the script list for dialogue,
//! package, perk, quest and scene records.

use resave_core::config::Layout;
use resave_core::error::{ParseResultExt, Result};
use resave_core::io::{read_list, Element, SaveReader, SaveWriter};
use resave_core::strings::WString;

use super::property::{ObjFormat, ObjectRef, PropertyReader};
use super::VmadScript;

/// A fragment function bound to one slot (begin, end, a stage, a phase...).
#[derive(Clone, Debug, PartialEq)]
pub struct FragmentCall {
    pub unknown: i8,
    pub script: WString,
    pub function: WString,
}

impl FragmentCall {
    fn read(r: &mut SaveReader<'_>) -> Result<Self> {
        let unknown = r.read_u8()? as i8;
        let script = WString::read(r)?;
        let function = WString::read(r)?;
        Ok(Self { unknown, script, function })
    }
}

impl Element for FragmentCall {
    fn write(&self, w: &mut SaveWriter) {
        w.write_u8(self.unknown as u8);
        self.script.write(w);
        self.function.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        1 + self.script.calculate_size(layout) + self.function.calculate_size(layout)
    }
}

/// One [`FragmentCall`] per set bit of `flags`, lowest bit first.
fn read_flagged(r: &mut SaveReader<'_>, flags: u8, bits: u32) -> Result<Vec<FragmentCall>> {
    let count = (flags as u32 & ((1 << bits) - 1)).count_ones() as usize;
    read_list(r, count, "fragment", FragmentCall::read)
}

/// Dialogue topic info, package and scene fragments share this start.
#[derive(Clone, Debug, PartialEq)]
pub struct FlaggedFragments {
    pub unknown: i8,
    pub flags: u8,
    pub file_name: WString,
    pub calls: Vec<FragmentCall>,
}

impl FlaggedFragments {
    fn read(r: &mut SaveReader<'_>, bits: u32) -> Result<Self> {
        let unknown = r.read_u8()? as i8;
        let flags = r.read_u8()?;
        let file_name = WString::read(r)?;
        let calls = read_flagged(r, flags, bits)?;
        Ok(Self { unknown, flags, file_name, calls })
    }
}

impl Element for FlaggedFragments {
    fn write(&self, w: &mut SaveWriter) {
        w.write_u8(self.unknown as u8);
        w.write_u8(self.flags);
        self.file_name.write(w);
        self.calls.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        2 + self.file_name.calculate_size(layout) + self.calls.calculate_size(layout)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PerkFragment {
    pub index: u16,
    pub unknown1: i16,
    pub call: FragmentCall,
}

impl Element for PerkFragment {
    fn write(&self, w: &mut SaveWriter) {
        w.write_u16(self.index);
        w.write_i16(self.unknown1);
        self.call.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        4 + self.call.calculate_size(layout)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StageFragment {
    pub stage: u16,
    pub unknown1: i16,
    pub log_entry: i32,
    pub call: FragmentCall,
}

impl Element for StageFragment {
    fn write(&self, w: &mut SaveWriter) {
        w.write_u16(self.stage);
        w.write_i16(self.unknown1);
        w.write_i32(self.log_entry);
        self.call.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        8 + self.call.calculate_size(layout)
    }
}

/// Scripts attached to one quest alias.
#[derive(Clone, Debug, PartialEq)]
pub struct AliasScripts {
    pub object: ObjectRef,
    pub version: i16,
    pub format: ObjFormat,
    pub scripts: Vec<VmadScript>,
}

impl Element for AliasScripts {
    fn write(&self, w: &mut SaveWriter) {
        self.object.write(w);
        w.write_i16(self.version);
        w.write_i16(self.format.raw());
        w.write_u16(self.scripts.len() as u16);
        self.scripts.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        8 + 2 + 2 + 2 + self.scripts.calculate_size(layout)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PhaseFragment {
    pub unknown1: i8,
    pub phase: u32,
    pub call: FragmentCall,
}

impl Element for PhaseFragment {
    fn write(&self, w: &mut SaveWriter) {
        w.write_u8(self.unknown1 as u8);
        w.write_u32(self.phase);
        self.call.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        5 + self.call.calculate_size(layout)
    }
}

/// The fragment block; its shape is chosen by the code of the owning record.
#[derive(Clone, Debug, PartialEq)]
pub enum Fragments {
    /// INFO: begin and end.
    Info(FlaggedFragments),
    /// PACK: begin, end and change.
    Package(FlaggedFragments),
    Perk {
        unknown: i8,
        file_name: WString,
        fragments: Vec<PerkFragment>,
    },
    Quest {
        unknown: i8,
        file_name: WString,
        stages: Vec<StageFragment>,
        aliases: Vec<AliasScripts>,
    },
    Scene {
        head: FlaggedFragments,
        phases: Vec<PhaseFragment>,
    },
}

impl Fragments {
    pub(crate) fn read_info(r: &mut SaveReader<'_>) -> Result<Self> {
        Ok(Fragments::Info(FlaggedFragments::read(r, 2).element("INFO fragments")?))
    }

    pub(crate) fn read_package(r: &mut SaveReader<'_>) -> Result<Self> {
        Ok(Fragments::Package(FlaggedFragments::read(r, 3).element("PACK fragments")?))
    }

    pub(crate) fn read_perk(r: &mut SaveReader<'_>) -> Result<Self> {
        perk_fragments(r).element("PERK fragments")
    }

    pub(crate) fn read_quest(r: &mut SaveReader<'_>, p: &PropertyReader<'_, '_>) -> Result<Self> {
        quest_fragments(r, p).element("QUST fragments")
    }

    pub(crate) fn read_scene(r: &mut SaveReader<'_>) -> Result<Self> {
        scene_fragments(r).element("SCEN fragments")
    }

    /// Script names referenced by fragment calls and alias scripts.
    pub fn script_names(&self) -> Vec<&WString> {
        match self {
            Fragments::Info(f) | Fragments::Package(f) => f.calls.iter().map(|c| &c.script).collect(),
            Fragments::Perk { fragments, .. } => fragments.iter().map(|f| &f.call.script).collect(),
            Fragments::Quest { stages, aliases, .. } => stages
                .iter()
                .map(|s| &s.call.script)
                .chain(aliases.iter().flat_map(|a| a.scripts.iter().map(|s| &s.name)))
                .collect(),
            Fragments::Scene { head, phases } => {
                head.calls.iter().map(|c| &c.script).chain(phases.iter().map(|p| &p.call.script)).collect()
            }
        }
    }
}

fn perk_fragments(r: &mut SaveReader<'_>) -> Result<Fragments> {
    let unknown = r.read_u8()? as i8;
    let file_name = WString::read(r)?;
    let count = r.read_u16()? as usize;
    let fragments = read_list(r, count, "perk fragment", |r| {
        let index = r.read_u16()?;
        let unknown1 = r.read_i16()?;
        let call = FragmentCall::read(r)?;
        Ok(PerkFragment { index, unknown1, call })
    })?;
    Ok(Fragments::Perk { unknown, file_name, fragments })
}

fn quest_fragments(r: &mut SaveReader<'_>, p: &PropertyReader<'_, '_>) -> Result<Fragments> {
    let unknown = r.read_u8()? as i8;
    let count = r.read_u16()? as usize;
    let file_name = WString::read(r)?;
    let stages = read_list(r, count, "stage fragment", |r| {
        let stage = r.read_u16()?;
        let unknown1 = r.read_i16()?;
        let log_entry = r.read_i32()?;
        let call = FragmentCall::read(r)?;
        Ok(StageFragment { stage, unknown1, log_entry, call })
    })?;
    let count = r.read_u16()? as usize;
    let aliases = read_list(r, count, "alias", |r| {
        let object = ObjectRef::read(r, p.format, p.ctx)?;
        let version = r.read_i16()?;
        let offset = r.position();
        let format = ObjFormat::from_raw(r.read_i16()?, offset)?;
        let inner = PropertyReader { version, format, ctx: p.ctx };
        let count = r.read_u16()? as usize;
        let scripts = read_list(r, count, "script", |r| VmadScript::read(r, &inner))?;
        Ok(AliasScripts { object, version, format, scripts })
    })?;
    Ok(Fragments::Quest { unknown, file_name, stages, aliases })
}

fn scene_fragments(r: &mut SaveReader<'_>) -> Result<Fragments> {
    let head = FlaggedFragments::read(r, 2)?;
    let count = r.read_u16()? as usize;
    let phases = read_list(r, count, "phase fragment", |r| {
        let unknown1 = r.read_u8()? as i8;
        let phase = r.read_u32()?;
        let call = FragmentCall::read(r)?;
        Ok(PhaseFragment { unknown1, phase, call })
    })?;
    Ok(Fragments::Scene { head, phases })
}

impl Element for Fragments {
    fn write(&self, w: &mut SaveWriter) {
        match self {
            Fragments::Info(f) | Fragments::Package(f) => f.write(w),
            Fragments::Perk { unknown, file_name, fragments } => {
                w.write_u8(*unknown as u8);
                file_name.write(w);
                w.write_u16(fragments.len() as u16);
                fragments.write(w);
            }
            Fragments::Quest { unknown, file_name, stages, aliases } => {
                w.write_u8(*unknown as u8);
                w.write_u16(stages.len() as u16);
                file_name.write(w);
                stages.write(w);
                w.write_u16(aliases.len() as u16);
                aliases.write(w);
            }
            Fragments::Scene { head, phases } => {
                head.write(w);
                w.write_u16(phases.len() as u16);
                phases.write(w);
            }
        }
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        match self {
            Fragments::Info(f) | Fragments::Package(f) => f.calculate_size(layout),
            Fragments::Perk { file_name, fragments, .. } => {
                1 + file_name.calculate_size(layout) + 2 + fragments.calculate_size(layout)
            }
            Fragments::Quest { file_name, stages, aliases, .. } => {
                1 + 2 + file_name.calculate_size(layout) + stages.calculate_size(layout) + 2 + aliases.calculate_size(layout)
            }
            Fragments::Scene { head, phases } => head.calculate_size(layout) + 2 + phases.calculate_size(layout),
        }
    }
}
