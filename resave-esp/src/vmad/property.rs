//! Script properties: a name, a type tag and a typed value.
//!
//! Struct and struct-array values nest further properties, so reading is
//! mutually recursive between [`Property`] and [`PropertyValue`].

use resave_core::config::Layout;
use resave_core::error::{FormatError, ParseResultExt, Result};
use resave_core::ids::FormId;
use resave_core::io::{read_list, Element, SaveReader, SaveWriter};
use resave_core::strings::WString;

use crate::context::EspContext;

/// Byte order of the 8-byte object reference, chosen per script-attachment field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjFormat {
    /// form id, alias, unused
    IdFirst,
    /// unused, alias, form id
    IdLast,
}

impl ObjFormat {
    pub fn from_raw(raw: i16, offset: usize) -> std::result::Result<Self, FormatError> {
        match raw {
            1 => Ok(ObjFormat::IdFirst),
            2 => Ok(ObjFormat::IdLast),
            other => Err(FormatError::OutOfRange { what: "object format", value: other as i64, min: 1, max: 2, offset }),
        }
    }

    pub fn raw(self) -> i16 {
        match self {
            ObjFormat::IdFirst => 1,
            ObjFormat::IdLast => 2,
        }
    }
}

/// A form (optionally through a quest alias) referenced from a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectRef {
    pub format: ObjFormat,
    pub raw_id: u32,
    pub form_id: FormId,
    pub alias: i16,
    pub unused: u16,
}

impl ObjectRef {
    pub fn read(r: &mut SaveReader<'_>, format: ObjFormat, ctx: &EspContext<'_>) -> std::result::Result<Self, FormatError> {
        let (raw_id, alias, unused) = match format {
            ObjFormat::IdFirst => {
                let id = r.read_u32()?;
                let alias = r.read_i16()?;
                (id, alias, r.read_u16()?)
            }
            ObjFormat::IdLast => {
                let unused = r.read_u16()?;
                let alias = r.read_i16()?;
                (r.read_u32()?, alias, unused)
            }
        };
        Ok(Self { format, raw_id, form_id: ctx.remap(raw_id), alias, unused })
    }
}

impl Element for ObjectRef {
    fn write(&self, w: &mut SaveWriter) {
        match self.format {
            ObjFormat::IdFirst => {
                w.write_u32(self.raw_id);
                w.write_i16(self.alias);
                w.write_u16(self.unused);
            }
            ObjFormat::IdLast => {
                w.write_u16(self.unused);
                w.write_i16(self.alias);
                w.write_u32(self.raw_id);
            }
        }
    }

    fn calculate_size(&self, _layout: &Layout) -> usize {
        8
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Null,
    Object(ObjectRef),
    Str(WString),
    Int(i32),
    Float(f32),
    Bool(u8),
    /// Opaque four bytes.
    Var(u32),
    Struct(Vec<Property>),
    ObjectArray(Vec<ObjectRef>),
    StrArray(Vec<WString>),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    BoolArray(Vec<u8>),
    VarArray(Vec<u32>),
    StructArray(Vec<Vec<Property>>),
}

/// Reading state shared by every property of one script-attachment field.
#[derive(Clone, Copy)]
pub struct PropertyReader<'c, 'p> {
    pub version: i16,
    pub format: ObjFormat,
    pub ctx: &'c EspContext<'p>,
}

impl PropertyReader<'_, '_> {
    fn has_status(&self) -> bool {
        self.version >= 4
    }

    fn members(&self, r: &mut SaveReader<'_>) -> Result<Vec<Property>> {
        let count = r.read_count_u32("struct member count", 4)?;
        read_list(r, count, "member", |r| Property::read(r, self))
    }

    fn value(&self, tag: u8, r: &mut SaveReader<'_>, offset: usize) -> Result<PropertyValue> {
        let v = match tag {
            0 => PropertyValue::Null,
            1 => PropertyValue::Object(ObjectRef::read(r, self.format, self.ctx)?),
            2 => PropertyValue::Str(WString::read(r)?),
            3 => PropertyValue::Int(r.read_i32()?),
            4 => PropertyValue::Float(r.read_f32()?),
            5 => PropertyValue::Bool(r.read_u8()?),
            6 => PropertyValue::Var(r.read_u32()?),
            7 => PropertyValue::Struct(self.members(r)?),
            11..=17 => {
                let count = r.read_count_u32("array length", 1)?;
                match tag {
                    11 => PropertyValue::ObjectArray(read_list(r, count, "object", |r| {
                        Ok(ObjectRef::read(r, self.format, self.ctx)?)
                    })?),
                    12 => PropertyValue::StrArray(read_list(r, count, "string", |r| Ok(WString::read(r)?))?),
                    13 => PropertyValue::IntArray(read_list(r, count, "int", |r| Ok(r.read_i32()?))?),
                    14 => PropertyValue::FloatArray(read_list(r, count, "float", |r| Ok(r.read_f32()?))?),
                    15 => PropertyValue::BoolArray(read_list(r, count, "bool", |r| Ok(r.read_u8()?))?),
                    16 => PropertyValue::VarArray(read_list(r, count, "var", |r| Ok(r.read_u32()?))?),
                    _ => PropertyValue::StructArray(read_list(r, count, "struct", |r| self.members(r))?),
                }
            }
            _ => return Err(FormatError::UnknownTag { what: "property type", tag: tag as u32, offset }.into()),
        };
        Ok(v)
    }
}

impl PropertyValue {
    pub fn tag(&self) -> u8 {
        match self {
            PropertyValue::Null => 0,
            PropertyValue::Object(_) => 1,
            PropertyValue::Str(_) => 2,
            PropertyValue::Int(_) => 3,
            PropertyValue::Float(_) => 4,
            PropertyValue::Bool(_) => 5,
            PropertyValue::Var(_) => 6,
            PropertyValue::Struct(_) => 7,
            PropertyValue::ObjectArray(_) => 11,
            PropertyValue::StrArray(_) => 12,
            PropertyValue::IntArray(_) => 13,
            PropertyValue::FloatArray(_) => 14,
            PropertyValue::BoolArray(_) => 15,
            PropertyValue::VarArray(_) => 16,
            PropertyValue::StructArray(_) => 17,
        }
    }

    /// Every form referenced by this value, including inside structs and arrays.
    pub fn objects(&self) -> Vec<&ObjectRef> {
        match self {
            PropertyValue::Object(o) => vec![o],
            PropertyValue::ObjectArray(v) => v.iter().collect(),
            PropertyValue::Struct(members) => members.iter().flat_map(|p| p.value.objects()).collect(),
            PropertyValue::StructArray(structs) => {
                structs.iter().flatten().flat_map(|p| p.value.objects()).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn write_members(members: &[Property], w: &mut SaveWriter) {
    w.write_u32(members.len() as u32);
    for m in members {
        m.write(w);
    }
}

fn members_size(members: &[Property], layout: &Layout) -> usize {
    4 + members.iter().map(|m| m.calculate_size(layout)).sum::<usize>()
}

impl Element for PropertyValue {
    fn write(&self, w: &mut SaveWriter) {
        match self {
            PropertyValue::Null => {}
            PropertyValue::Object(o) => o.write(w),
            PropertyValue::Str(s) => s.write(w),
            PropertyValue::Int(v) => w.write_i32(*v),
            PropertyValue::Float(v) => w.write_f32(*v),
            PropertyValue::Bool(v) => w.write_u8(*v),
            PropertyValue::Var(v) => w.write_u32(*v),
            PropertyValue::Struct(members) => write_members(members, w),
            PropertyValue::ObjectArray(v) => {
                w.write_u32(v.len() as u32);
                v.write(w);
            }
            PropertyValue::StrArray(v) => {
                w.write_u32(v.len() as u32);
                v.write(w);
            }
            PropertyValue::IntArray(v) => {
                w.write_u32(v.len() as u32);
                v.iter().for_each(|x| w.write_i32(*x));
            }
            PropertyValue::FloatArray(v) => {
                w.write_u32(v.len() as u32);
                v.iter().for_each(|x| w.write_f32(*x));
            }
            PropertyValue::BoolArray(v) => {
                w.write_u32(v.len() as u32);
                w.write_bytes(v);
            }
            PropertyValue::VarArray(v) => {
                w.write_u32(v.len() as u32);
                v.iter().for_each(|x| w.write_u32(*x));
            }
            PropertyValue::StructArray(v) => {
                w.write_u32(v.len() as u32);
                v.iter().for_each(|members| write_members(members, w));
            }
        }
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        match self {
            PropertyValue::Null => 0,
            PropertyValue::Object(_) => 8,
            PropertyValue::Str(s) => s.calculate_size(layout),
            PropertyValue::Int(_) | PropertyValue::Float(_) | PropertyValue::Var(_) => 4,
            PropertyValue::Bool(_) => 1,
            PropertyValue::Struct(members) => members_size(members, layout),
            PropertyValue::ObjectArray(v) => 4 + 8 * v.len(),
            PropertyValue::StrArray(v) => 4 + v.calculate_size(layout),
            PropertyValue::IntArray(v) => 4 + 4 * v.len(),
            PropertyValue::FloatArray(v) => 4 + 4 * v.len(),
            PropertyValue::BoolArray(v) => 4 + v.len(),
            PropertyValue::VarArray(v) => 4 + 4 * v.len(),
            PropertyValue::StructArray(v) => 4 + v.iter().map(|m| members_size(m, layout)).sum::<usize>(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub name: WString,
    /// Present from attachment version 4 on.
    pub status: Option<u8>,
    pub value: PropertyValue,
}

impl Property {
    pub fn read(r: &mut SaveReader<'_>, p: &PropertyReader<'_, '_>) -> Result<Self> {
        let name = WString::read(r)?;
        let offset = r.position();
        let tag = r.read_u8()?;
        let status = if p.has_status() { Some(r.read_u8()?) } else { None };
        let value = p.value(tag, r, offset).with_element(|| format!("property {name}"))?;
        Ok(Self { name, status, value })
    }
}

impl Element for Property {
    fn write(&self, w: &mut SaveWriter) {
        self.name.write(w);
        w.write_u8(self.value.tag());
        if let Some(s) = self.status {
            w.write_u8(s);
        }
        self.value.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        self.name.calculate_size(layout) + 1 + self.status.map_or(0, |_| 1) + self.value.calculate_size(layout)
    }
}
