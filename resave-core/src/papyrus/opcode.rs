use std::fmt;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::config::Layout;
use crate::error::{FormatError, ParseResultExt, Result};
use crate::io::{read_list, Element, SaveReader, SaveWriter};
use crate::strings::{StringTable, TString};

#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Hash)]
pub enum Opcode {
    Nop = 0x00,
    IAdd = 0x01,
    FAdd = 0x02,
    ISub = 0x03,
    FSub = 0x04,
    IMul = 0x05,
    FMul = 0x06,
    IDiv = 0x07,
    FDiv = 0x08,
    IMod = 0x09,
    Not = 0x0A,
    INeg = 0x0B,
    FNeg = 0x0C,
    Assign = 0x0D,
    Cast = 0x0E,
    CmpEq = 0x0F,
    CmpLt = 0x10,
    CmpLe = 0x11,
    CmpGt = 0x12,
    CmpGe = 0x13,
    Jmp = 0x14,
    JmpT = 0x15,
    JmpF = 0x16,
    CallMethod = 0x17,
    CallParent = 0x18,
    CallStatic = 0x19,
    Return = 0x1A,
    StrCat = 0x1B,
    PropGet = 0x1C,
    PropSet = 0x1D,
    ArrayCreate = 0x1E,
    ArrayLength = 0x1F,
    ArrayGetElement = 0x20,
    ArraySetElement = 0x21,
    ArrayFindElement = 0x22,
    ArrayRFindElement = 0x23,
    // Fallout 4 additions
    Is = 0x24,
    StructCreate = 0x25,
    StructGet = 0x26,
    StructSet = 0x27,
    ArrayFindStruct = 0x28,
    ArrayRFindStruct = 0x29,
    ArrayAdd = 0x2A,
    ArrayInsert = 0x2B,
    ArrayRemoveLast = 0x2C,
    ArrayRemove = 0x2D,
    ArrayClear = 0x2E,
    ArrayGetAllMatchingStructs = 0x2F,
    LockGuards = 0x30,
    UnlockGuards = 0x31,
}

impl Opcode {
    /// Number of parameters that always follow the opcode byte.
    pub fn fixed_args(self) -> usize {
        use Opcode::*;
        match self {
            Nop | LockGuards | UnlockGuards => 0,
            Jmp | Return | StructCreate | ArrayRemoveLast | ArrayClear => 1,
            Not | INeg | FNeg | Assign | Cast | JmpT | JmpF | CallParent | ArrayCreate | ArrayLength => 2,
            IAdd | FAdd | ISub | FSub | IMul | FMul | IDiv | FDiv | IMod | CmpEq | CmpLt | CmpLe | CmpGt
            | CmpGe | CallMethod | CallStatic | StrCat | PropGet | PropSet | ArrayGetElement
            | ArraySetElement | Is | StructGet | StructSet | ArrayAdd | ArrayInsert | ArrayRemove => 3,
            ArrayFindElement | ArrayRFindElement => 4,
            ArrayFindStruct | ArrayRFindStruct => 5,
            ArrayGetAllMatchingStructs => 6,
        }
    }

    /// Variadic opcodes follow their fixed parameters with an integer count and that many extra parameters.
    pub fn is_variadic(self) -> bool {
        matches!(
            self,
            Opcode::CallMethod | Opcode::CallParent | Opcode::CallStatic | Opcode::LockGuards | Opcode::UnlockGuards
        )
    }

    fn needs_fallout4(self) -> bool {
        self >= Opcode::Is
    }

    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Nop => "nop",
            IAdd => "iadd",
            FAdd => "fadd",
            ISub => "isub",
            FSub => "fsub",
            IMul => "imul",
            FMul => "fmul",
            IDiv => "idiv",
            FDiv => "fdiv",
            IMod => "imod",
            Not => "not",
            INeg => "ineg",
            FNeg => "fneg",
            Assign => "assign",
            Cast => "cast",
            CmpEq => "cmp_eq",
            CmpLt => "cmp_lt",
            CmpLe => "cmp_le",
            CmpGt => "cmp_gt",
            CmpGe => "cmp_ge",
            Jmp => "jmp",
            JmpT => "jmpt",
            JmpF => "jmpf",
            CallMethod => "callmethod",
            CallParent => "callparent",
            CallStatic => "callstatic",
            Return => "return",
            StrCat => "strcat",
            PropGet => "propget",
            PropSet => "propset",
            ArrayCreate => "array_create",
            ArrayLength => "array_length",
            ArrayGetElement => "array_getelement",
            ArraySetElement => "array_setelement",
            ArrayFindElement => "array_findelement",
            ArrayRFindElement => "array_rfindelement",
            Is => "is",
            StructCreate => "struct_create",
            StructGet => "struct_get",
            StructSet => "struct_set",
            ArrayFindStruct => "array_findstruct",
            ArrayRFindStruct => "array_rfindstruct",
            ArrayAdd => "array_add",
            ArrayInsert => "array_insert",
            ArrayRemoveLast => "array_removelast",
            ArrayRemove => "array_remove",
            ArrayClear => "array_clear",
            ArrayGetAllMatchingStructs => "array_getallmatchingstructs",
            LockGuards => "lock_guards",
            UnlockGuards => "unlock_guards",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// One operand of an instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Parameter {
    Null,
    Ident(TString),
    Str(TString),
    Int(i32),
    Float(f32),
    /// Kept as the raw byte; the compiler only writes 0 or 1.
    Bool(u8),
}

impl Parameter {
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> std::result::Result<Self, FormatError> {
        let offset = r.position();
        let p = match r.read_u8()? {
            0 => Parameter::Null,
            1 => Parameter::Ident(TString::read(r, strings)?),
            2 => Parameter::Str(TString::read(r, strings)?),
            3 => Parameter::Int(r.read_i32()?),
            4 => Parameter::Float(r.read_f32()?),
            5 => Parameter::Bool(r.read_u8()?),
            tag => return Err(FormatError::UnknownTag { what: "parameter", tag: tag as u32, offset }),
        };
        Ok(p)
    }

    fn tag(&self) -> u8 {
        match self {
            Parameter::Null => 0,
            Parameter::Ident(_) => 1,
            Parameter::Str(_) => 2,
            Parameter::Int(_) => 3,
            Parameter::Float(_) => 4,
            Parameter::Bool(_) => 5,
        }
    }

    pub fn ident(&self) -> Option<&TString> {
        match self {
            Parameter::Ident(s) => Some(s),
            _ => None,
        }
    }

    /// Compiler-generated temporaries (`::temp12`).
    pub fn is_temp(&self) -> bool {
        self.ident().is_some_and(|s| s.starts_with_ignore_case("::temp"))
    }

    /// The placeholder destination for discarded call results.
    pub fn is_none_var(&self) -> bool {
        self.ident().is_some_and(|s| s.eq_ignore_case("::nonevar"))
    }

    /// Source-level spelling of the operand, without temporary substitution.
    pub fn source_text(&self) -> String {
        match self {
            Parameter::Null => "None".to_string(),
            Parameter::Ident(s) => {
                let name = s.as_str();
                match name.strip_prefix("::").and_then(|n| n.strip_suffix("_var")) {
                    Some(auto) => auto.to_string(),
                    None => name.to_string(),
                }
            }
            Parameter::Str(s) => format!("{:?}", s.as_str()),
            Parameter::Int(v) => v.to_string(),
            Parameter::Float(v) => format!("{v:?}"),
            Parameter::Bool(v) => (*v != 0).to_string(),
        }
    }
}

impl Element for Parameter {
    fn write(&self, w: &mut SaveWriter) {
        w.write_u8(self.tag());
        match self {
            Parameter::Null => {}
            Parameter::Ident(s) | Parameter::Str(s) => s.write(w),
            Parameter::Int(v) => w.write_i32(*v),
            Parameter::Float(v) => w.write_f32(*v),
            Parameter::Bool(v) => w.write_u8(*v),
        }
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        1 + match self {
            Parameter::Null => 0,
            Parameter::Ident(_) | Parameter::Str(_) => layout.string_index_bytes(),
            Parameter::Int(_) | Parameter::Float(_) => 4,
            Parameter::Bool(_) => 1,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source_text())
    }
}

/// An opcode with its operands. For variadic opcodes the count operand is stored
/// in `params` right after the fixed ones.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub params: Vec<Parameter>,
}

impl Instruction {
    pub fn nop() -> Self {
        Self { opcode: Opcode::Nop, params: Vec::new() }
    }

    pub fn new(opcode: Opcode, params: Vec<Parameter>) -> Self {
        Self { opcode, params }
    }

    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Self> {
        let offset = r.position();
        let code = r.read_u8()?;
        let opcode = Opcode::from_u8(code)
            .filter(|op| !op.needs_fallout4() || r.layout().game.supports_structs())
            .ok_or(FormatError::UnknownTag { what: "opcode", tag: code as u32, offset })?;

        let mut params = Vec::with_capacity(opcode.fixed_args() + opcode.is_variadic() as usize);
        for _ in 0..opcode.fixed_args() {
            params.push(Parameter::read(r, strings)?);
        }
        if opcode.is_variadic() {
            let offset = r.position();
            let count = match Parameter::read(r, strings)? {
                Parameter::Int(n) if n >= 0 => n,
                Parameter::Int(n) => {
                    return Err(FormatError::OutOfRange {
                        what: "variadic argument count",
                        value: n as i64,
                        min: 0,
                        max: i32::MAX as i64,
                        offset,
                    }
                    .into())
                }
                other => {
                    return Err(FormatError::BadCode {
                        expected: "integer argument count".to_string(),
                        found: format!("{other:?}"),
                        offset,
                    }
                    .into())
                }
            };
            params.push(Parameter::Int(count));
            let extra = read_list(r, count as usize, "argument", |r| Ok(Parameter::read(r, strings)?))?;
            params.extend(extra);
        }
        Ok(Self { opcode, params })
    }

    /// Operands after the variadic count, empty for fixed-arity opcodes.
    pub fn variadic_args(&self) -> &[Parameter] {
        if self.opcode.is_variadic() {
            self.params.get(self.opcode.fixed_args() + 1..).unwrap_or(&[])
        } else {
            &[]
        }
    }
}

impl Element for Instruction {
    fn write(&self, w: &mut SaveWriter) {
        w.write_u8(self.opcode as u8);
        self.params.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        1 + self.params.calculate_size(layout)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.mnemonic())?;
        for (i, p) in self.params.iter().enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            write!(f, "{p}")?;
        }
        Ok(())
    }
}

pub(crate) fn read_code(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Vec<Instruction>> {
    let count = r.read_u16()? as usize;
    read_list(r, count, "instruction", |r| Instruction::read(r, strings)).element("code")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Game, StringIndexWidth};
    use crate::io::to_bytes;
    use pretty_assertions::assert_eq;

    #[test]
    fn variadic_call_roundtrip() {
        let layout = Layout::new(Game::SkyrimSe, StringIndexWidth::Long);
        let mut strings = StringTable::new();
        let inst = Instruction::new(
            Opcode::CallMethod,
            vec![
                Parameter::Ident(strings.intern("MoveTo")),
                Parameter::Ident(strings.intern("self")),
                Parameter::Ident(strings.intern("::nonevar")),
                Parameter::Int(2),
                Parameter::Float(0.5),
                Parameter::Bool(1),
            ],
        );
        let bytes = to_bytes(&inst, layout).unwrap();
        assert_eq!(bytes.len(), inst.calculate_size(&layout));
        let back = Instruction::read(&mut SaveReader::new(&bytes, layout), &strings).unwrap();
        assert_eq!(back, inst);
        assert_eq!(back.variadic_args().len(), 2);
        assert_eq!(inst.to_string(), "callmethod MoveTo, self, ::nonevar, 2, 0.5, true");
    }

    #[test]
    fn fallout_opcodes_rejected_for_skyrim() {
        let strings = StringTable::new();
        let layout = Layout::new(Game::SkyrimSe, StringIndexWidth::Long);
        let err = Instruction::read(&mut SaveReader::new(&[0x2E, 0], layout), &strings).unwrap_err();
        assert_eq!(err.root(), &FormatError::UnknownTag { what: "opcode", tag: 0x2E, offset: 0 });

        let fo4 = Layout::new(Game::Fallout4, StringIndexWidth::Long);
        let inst = Instruction::read(&mut SaveReader::new(&[0x2E, 0], fo4), &strings).unwrap();
        assert_eq!(inst, Instruction::new(Opcode::ArrayClear, vec![Parameter::Null]));
    }

    #[test]
    fn unknown_parameter_tag() {
        let strings = StringTable::new();
        let err = Instruction::read(&mut SaveReader::new(&[0x14, 9], Layout::default()), &strings).unwrap_err();
        assert_eq!(err.root(), &FormatError::UnknownTag { what: "parameter", tag: 9, offset: 1 });
    }

    #[test]
    fn auto_var_spelling() {
        let mut strings = StringTable::new();
        assert_eq!(Parameter::Ident(strings.intern("::Health_var")).source_text(), "Health");
        assert_eq!(Parameter::Str(strings.intern("hi")).source_text(), "\"hi\"");
        assert!(Parameter::Ident(strings.intern("::temp3")).is_temp());
    }
}
