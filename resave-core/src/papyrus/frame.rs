use std::collections::HashMap;

use crate::config::Layout;
use crate::error::{FormatError, ParseResultExt, Result};
use crate::io::{read_list, Element, SaveReader, SaveWriter};
use crate::strings::{StringTable, TString};
use crate::variable::{VarType, Variable};

use super::opcode::{read_code, Instruction};
use super::terms::{self, Line};

pub const MAX_VARIABLES: i32 = 50_000;
pub const MAX_PARAMS: u16 = 2047;

const FLAG_NO_STATUS: u8 = 0x01;
const FN_STATIC: u8 = 0x01;
const FN_NATIVE: u8 = 0x02;

/// A named, typed slot: function parameter or local.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberDesc {
    pub name: TString,
    pub ty: TString,
}

impl MemberDesc {
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> std::result::Result<Self, FormatError> {
        let name = TString::read(r, strings)?;
        let ty = TString::read(r, strings)?;
        Ok(Self { name, ty })
    }
}

impl Element for MemberDesc {
    fn write(&self, w: &mut SaveWriter) {
        self.name.write(w);
        self.ty.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        2 * layout.string_index_bytes()
    }
}

/// A function activation inside an active thread.
#[derive(Clone, Debug, PartialEq)]
pub struct StackFrame {
    pub flag: u8,
    pub fn_type: VarType,
    pub script_name: TString,
    pub base_name: TString,
    pub event: TString,
    pub status: Option<TString>,
    pub opcode_major: u8,
    pub opcode_minor: u8,
    pub return_type: TString,
    pub docstring: TString,
    pub user_flags: u32,
    pub fn_flags: u8,
    pub params: Vec<MemberDesc>,
    pub locals: Vec<MemberDesc>,
    pub code: Vec<Instruction>,
    pub ptr: u32,
    pub owner: Variable,
    pub variables: Vec<Variable>,
}

impl StackFrame {
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Self> {
        let variable_count = r.read_count_i32("frame variable count", 0, MAX_VARIABLES)?;
        let flag = r.read_u8()?;
        let fn_type = VarType::read(r)?;
        let script_name = TString::read(r, strings)?;
        let base_name = TString::read(r, strings)?;
        let event = TString::read(r, strings)?;
        let status = if flag & FLAG_NO_STATUS == 0 && fn_type == VarType::Null {
            Some(TString::read(r, strings)?)
        } else {
            None
        };
        let opcode_major = r.read_u8()?;
        let opcode_minor = r.read_u8()?;
        let return_type = TString::read(r, strings)?;
        let docstring = TString::read(r, strings)?;
        let user_flags = r.read_u32()?;
        let fn_flags = r.read_u8()?;

        let count = r.read_count_u16("parameter count", MAX_PARAMS)?;
        let params = read_list(r, count, "parameter", |r| Ok(MemberDesc::read(r, strings)?))?;
        let count = r.read_count_u16("local count", MAX_PARAMS)?;
        let locals = read_list(r, count, "local", |r| Ok(MemberDesc::read(r, strings)?))?;
        let code = read_code(r, strings)?;

        let offset = r.position();
        let ptr = r.read_i32()?;
        let ptr = u32::try_from(ptr).map_err(|_| FormatError::OutOfRange {
            what: "instruction pointer",
            value: ptr as i64,
            min: 0,
            max: i32::MAX as i64,
            offset,
        })?;
        let owner = Variable::read(r, strings).element("owner")?;
        let variables = read_list(r, variable_count, "variable", |r| Variable::read(r, strings))?;

        Ok(Self {
            flag,
            fn_type,
            script_name,
            base_name,
            event,
            status,
            opcode_major,
            opcode_minor,
            return_type,
            docstring,
            user_flags,
            fn_flags,
            params,
            locals,
            code,
            ptr,
            owner,
            variables,
        })
    }

    pub fn is_native(&self) -> bool {
        self.fn_flags & FN_NATIVE != 0
    }

    pub fn is_static(&self) -> bool {
        self.fn_flags & FN_STATIC != 0
    }

    /// Replaces the code with one `nop` per byte it occupied, so the frame keeps its
    /// size and has nothing left to execute. The pointer moves to the first `nop`
    /// standing in for the instruction it pointed at.
    ///
    /// Fails, leaving the frame untouched, when the code is too long for the `nop`s to
    /// fit the 16-bit instruction count.
    pub fn zero_instructions(&mut self, layout: &Layout) -> std::result::Result<(), FormatError> {
        let widths: Vec<usize> = self.code.iter().map(|i| i.calculate_size(layout)).collect();
        let total: usize = widths.iter().sum();
        if total > u16::MAX as usize {
            return Err(FormatError::OutOfRange {
                what: "zeroed instruction count",
                value: total as i64,
                min: 0,
                max: u16::MAX as i64,
                offset: 0,
            });
        }

        let ptr = self.ptr as usize;
        let before: usize = widths[..ptr.min(widths.len())].iter().sum();
        let past_end = ptr.saturating_sub(widths.len());
        self.ptr = (before as u32).saturating_add(past_end as u32);
        self.code = vec![Instruction::nop(); total];
        Ok(())
    }

    pub fn is_zeroed(&self) -> bool {
        self.code.iter().all(|i| *i == Instruction::nop())
    }

    /// Parameter then local names, in the order of the leading entries of `variables`.
    pub fn param_and_local_names(&self) -> impl Iterator<Item = &TString> + '_ {
        self.params.iter().chain(&self.locals).map(|m| &m.name)
    }

    /// The variable bound to `name`, matched against parameters and locals.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        let i = self.param_and_local_names().position(|n| n.eq_ignore_case(name))?;
        self.variables.get(i)
    }

    /// Reconstructed source lines. Fails when the instruction pointer lies outside the code.
    pub fn disassemble(&self) -> std::result::Result<Disassembly, FormatError> {
        let len = self.code.len();
        let in_range = (self.ptr as usize) < len || (len == 0 && self.ptr == 0);
        if !in_range {
            return Err(FormatError::InstructionPointer { ptr: self.ptr, len });
        }
        let types: HashMap<String, String> = self
            .params
            .iter()
            .chain(&self.locals)
            .map(|m| (m.name.as_str().to_lowercase(), m.ty.as_str().to_string()))
            .collect();
        let lines = terms::reconstruct(&self.code, &types);
        let ptr = self.ptr as usize;
        let current = lines.iter().position(|l| l.index >= ptr).filter(|_| len > 0);
        Ok(Disassembly { lines, current })
    }
}

impl Element for StackFrame {
    fn write(&self, w: &mut SaveWriter) {
        w.write_i32(self.variables.len() as i32);
        w.write_u8(self.flag);
        w.write_u8(self.fn_type.tag());
        self.script_name.write(w);
        self.base_name.write(w);
        self.event.write(w);
        self.status.write(w);
        w.write_u8(self.opcode_major);
        w.write_u8(self.opcode_minor);
        self.return_type.write(w);
        self.docstring.write(w);
        w.write_u32(self.user_flags);
        w.write_u8(self.fn_flags);
        w.write_count_u16("parameter count", self.params.len());
        self.params.write(w);
        w.write_count_u16("local count", self.locals.len());
        self.locals.write(w);
        w.write_count_u16("instruction count", self.code.len());
        self.code.write(w);
        w.write_i32(self.ptr as i32);
        self.owner.write(w);
        self.variables.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        let s = layout.string_index_bytes();
        4 + 1
            + 1
            + 3 * s
            + self.status.calculate_size(layout)
            + 2
            + 2 * s
            + 4
            + 1
            + 2
            + self.params.calculate_size(layout)
            + 2
            + self.locals.calculate_size(layout)
            + 2
            + self.code.calculate_size(layout)
            + 4
            + self.owner.calculate_size(layout)
            + self.variables.calculate_size(layout)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Disassembly {
    pub lines: Vec<Line>,
    /// Line containing the instruction pointer.
    pub current: Option<usize>,
}

impl std::fmt::Display for Disassembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            let marker = if Some(i) == self.current { "==>" } else { "   " };
            writeln!(f, "{marker} {:>4}: {}", line.index, line.text)?;
        }
        Ok(())
    }
}
