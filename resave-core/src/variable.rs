//! The VM's tagged-union value type.

use std::fmt;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::config::Layout;
use crate::error::{FormatError, ParseResultExt, Result};
use crate::ids::Handle;
use crate::io::{Element, SaveReader, SaveWriter};
use crate::strings::{StringTable, TString};

/// Wire tag of a [`Variable`].
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    Null = 0,
    Ref = 1,
    Str = 2,
    Int = 3,
    Float = 4,
    Bool = 5,
    Variant = 6,
    Struct = 7,
    RefArray = 11,
    StrArray = 12,
    IntArray = 13,
    FloatArray = 14,
    BoolArray = 15,
    VariantArray = 16,
    StructArray = 17,
}

impl VarType {
    pub fn read(r: &mut SaveReader<'_>) -> std::result::Result<Self, FormatError> {
        let offset = r.position();
        let tag = r.read_u8()?;
        let ty = VarType::from_u8(tag).ok_or(FormatError::UnknownTag { what: "variable", tag: tag as u32, offset })?;
        if ty.needs_structs() && !r.layout().game.supports_structs() {
            return Err(FormatError::UnknownTag { what: "variable", tag: tag as u32, offset });
        }
        Ok(ty)
    }

    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn is_array(self) -> bool {
        self as u8 >= 11
    }

    /// Kinds whose values carry a type name (script or struct name).
    pub fn is_reference_kind(self) -> bool {
        matches!(self, VarType::Ref | VarType::Struct | VarType::RefArray | VarType::StructArray)
    }

    fn needs_structs(self) -> bool {
        matches!(self, VarType::Struct | VarType::StructArray)
    }

    /// Element type of an array type.
    pub fn element(self) -> Option<VarType> {
        if self.is_array() {
            VarType::from_u8(self as u8 - 10)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VarType::Null => "null",
            VarType::Ref => "ref",
            VarType::Str => "string",
            VarType::Int => "int",
            VarType::Float => "float",
            VarType::Bool => "bool",
            VarType::Variant => "var",
            VarType::Struct => "struct",
            VarType::RefArray => "ref[]",
            VarType::StrArray => "string[]",
            VarType::IntArray => "int[]",
            VarType::FloatArray => "float[]",
            VarType::BoolArray => "bool[]",
            VarType::VariantArray => "var[]",
            VarType::StructArray => "struct[]",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A VM value. The leading tag byte fully determines the shape that follows.
#[derive(Clone, Debug, PartialEq)]
pub enum Variable {
    /// Four reserved bytes, kept verbatim.
    Null(u32),
    /// A script instance.
    Ref { ty: TString, handle: Handle },
    Str(TString),
    Int(i32),
    Float(f32),
    Bool(bool),
    /// A boxed value of any other type.
    Variant(Box<Variable>),
    Struct { ty: TString, handle: Handle },
    /// A VM array; `ty` is present only for ref and struct arrays.
    Array { ty_tag: VarType, ty: Option<TString>, handle: Handle },
}

impl Variable {
    pub fn var_type(&self) -> VarType {
        match self {
            Variable::Null(_) => VarType::Null,
            Variable::Ref { .. } => VarType::Ref,
            Variable::Str(_) => VarType::Str,
            Variable::Int(_) => VarType::Int,
            Variable::Float(_) => VarType::Float,
            Variable::Bool(_) => VarType::Bool,
            Variable::Variant(_) => VarType::Variant,
            Variable::Struct { .. } => VarType::Struct,
            Variable::Array { ty_tag, .. } => *ty_tag,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Variable::Null(_))
    }

    /// The VM object this value points at, if any.
    pub fn handle(&self) -> Option<Handle> {
        match self {
            Variable::Ref { handle, .. } | Variable::Struct { handle, .. } | Variable::Array { handle, .. } => {
                Some(*handle)
            }
            Variable::Variant(inner) => inner.handle(),
            _ => None,
        }
    }

    /// Script, struct or element type name carried by reference kinds.
    pub fn type_name(&self) -> Option<&TString> {
        match self {
            Variable::Ref { ty, .. } | Variable::Struct { ty, .. } => Some(ty),
            Variable::Array { ty, .. } => ty.as_ref(),
            Variable::Variant(inner) => inner.type_name(),
            _ => None,
        }
    }

    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Self> {
        let ty = VarType::read(r)?;
        Self::read_payload(ty, r, strings).with_element(|| format!("{ty} variable"))
    }

    fn read_payload(ty: VarType, r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Self> {
        let v = match ty {
            VarType::Null => Variable::Null(r.read_u32()?),
            VarType::Ref => {
                let ty = TString::read(r, strings)?;
                Variable::Ref { ty, handle: Handle::read(r)? }
            }
            VarType::Str => Variable::Str(TString::read(r, strings)?),
            VarType::Int => Variable::Int(r.read_i32()?),
            VarType::Float => Variable::Float(r.read_f32()?),
            VarType::Bool => {
                let offset = r.position();
                match r.read_u8()? {
                    0 => Variable::Bool(false),
                    1 => Variable::Bool(true),
                    other => {
                        return Err(FormatError::OutOfRange {
                            what: "bool",
                            value: other as i64,
                            min: 0,
                            max: 1,
                            offset,
                        }
                        .into())
                    }
                }
            }
            VarType::Variant => Variable::Variant(Box::new(Variable::read(r, strings)?)),
            VarType::Struct => {
                let ty = TString::read(r, strings)?;
                Variable::Struct { ty, handle: Handle::read(r)? }
            }
            array => {
                let ty = if array.is_reference_kind() { Some(TString::read(r, strings)?) } else { None };
                Variable::Array { ty_tag: array, ty, handle: Handle::read(r)? }
            }
        };
        Ok(v)
    }
}

impl Element for Variable {
    fn write(&self, w: &mut SaveWriter) {
        w.write_u8(self.var_type().tag());
        match self {
            Variable::Null(reserved) => w.write_u32(*reserved),
            Variable::Ref { ty, handle } | Variable::Struct { ty, handle } => {
                ty.write(w);
                handle.write(w);
            }
            Variable::Str(s) => s.write(w),
            Variable::Int(v) => w.write_i32(*v),
            Variable::Float(v) => w.write_f32(*v),
            Variable::Bool(v) => w.write_u8(*v as u8),
            Variable::Variant(inner) => inner.write(w),
            Variable::Array { ty, handle, .. } => {
                ty.write(w);
                handle.write(w);
            }
        }
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        1 + match self {
            Variable::Null(_) | Variable::Int(_) | Variable::Float(_) => 4,
            Variable::Bool(_) => 1,
            Variable::Str(_) => layout.string_index_bytes(),
            Variable::Ref { .. } | Variable::Struct { .. } => layout.string_index_bytes() + layout.handle_bytes(),
            Variable::Variant(inner) => inner.calculate_size(layout),
            Variable::Array { ty, .. } => ty.calculate_size(layout) + layout.handle_bytes(),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Null(_) => f.write_str("None"),
            Variable::Ref { ty, handle } => write!(f, "{ty} ({handle})"),
            Variable::Str(s) => write!(f, "{:?}", s.as_str()),
            Variable::Int(v) => write!(f, "{v}"),
            Variable::Float(v) => write!(f, "{v:?}"),
            Variable::Bool(v) => write!(f, "{v}"),
            Variable::Variant(inner) => write!(f, "var({inner})"),
            Variable::Struct { ty, handle } => write!(f, "struct {ty} ({handle})"),
            Variable::Array { ty: Some(ty), handle, .. } => write!(f, "{ty}[] ({handle})"),
            Variable::Array { ty_tag, ty: None, handle } => write!(f, "{ty_tag} ({handle})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Game, StringIndexWidth};
    use crate::io::to_bytes;
    use pretty_assertions::assert_eq;

    fn fixtures(strings: &mut StringTable, layout: &Layout) -> Vec<Variable> {
        let h = Handle::new(0xDEAD_BEEF, layout.handle_width());
        let mut out = vec![
            Variable::Null(0),
            Variable::Ref { ty: strings.intern("Actor"), handle: h },
            Variable::Str(strings.intern("hello")),
            Variable::Int(-7),
            Variable::Float(1.5),
            Variable::Bool(true),
            Variable::Variant(Box::new(Variable::Int(3))),
            Variable::Variant(Box::new(Variable::Variant(Box::new(Variable::Bool(false))))),
            Variable::Array { ty_tag: VarType::IntArray, ty: None, handle: h },
            Variable::Array { ty_tag: VarType::RefArray, ty: Some(strings.intern("ObjectReference")), handle: h },
        ];
        if layout.game.supports_structs() {
            out.push(Variable::Struct { ty: strings.intern("Point"), handle: h });
            out.push(Variable::Array { ty_tag: VarType::StructArray, ty: Some(strings.intern("Point")), handle: h });
        }
        out
    }

    #[test]
    fn every_shape_roundtrips_with_matching_size() {
        for layout in [
            Layout::new(Game::SkyrimLe, StringIndexWidth::Short),
            Layout::new(Game::SkyrimSe, StringIndexWidth::Long),
            Layout::new(Game::Fallout4, StringIndexWidth::Long),
        ] {
            let mut strings = StringTable::new();
            for var in fixtures(&mut strings, &layout) {
                let bytes = to_bytes(&var, layout).unwrap();
                assert_eq!(bytes.len(), var.calculate_size(&layout), "{var:?}");
                let mut r = SaveReader::new(&bytes, layout);
                let back = Variable::read(&mut r, &strings).unwrap();
                assert!(r.is_empty());
                assert_eq!(back, var);
            }
        }
    }

    #[test]
    fn unknown_tag_is_fatal() {
        let strings = StringTable::new();
        let err = Variable::read(&mut SaveReader::new(&[9, 0, 0, 0, 0], Layout::default()), &strings).unwrap_err();
        assert_eq!(err.root(), &FormatError::UnknownTag { what: "variable", tag: 9, offset: 0 });
    }

    #[test]
    fn structs_need_a_struct_capable_edition() {
        let strings = StringTable::new();
        let layout = Layout::new(Game::SkyrimSe, StringIndexWidth::Long);
        let err = Variable::read(&mut SaveReader::new(&[7, 0, 0, 0, 0], layout), &strings).unwrap_err();
        assert!(matches!(err.root(), FormatError::UnknownTag { tag: 7, .. }));
    }

    #[test]
    fn nested_variant_error_has_context() {
        let strings = StringTable::new();
        let err = Variable::read(&mut SaveReader::new(&[6, 3, 1], Layout::default()), &strings).unwrap_err();
        assert_eq!(
            err.path(),
            "var variable > int variable > unexpected end of data at 0x2: need 4 bytes, 1 left"
        );
    }

    #[test]
    fn display() {
        let mut strings = StringTable::new();
        let h = Handle::new(0x10, crate::config::HandleWidth::U32);
        let arr = Variable::Array { ty_tag: VarType::RefArray, ty: Some(strings.intern("Actor")), handle: h };
        assert_eq!(arr.to_string(), "Actor[] (00000010)");
        assert_eq!(Variable::Str(strings.intern("x")).to_string(), "\"x\"");
    }
}
