//! Change forms: per-object deltas against the plugin-defined baseline.
//!
//! The header is always decoded. The body stays as stored (possibly zlib
//! compressed) until [`ChangeForm::parse_body`] is asked for it.

mod body;

use std::fmt;

use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

pub use body::{ChangeFormData, FormFlags, FormListBody, Move, ReferenceBody};

use crate::compress::{deflate, inflate};
use crate::config::Layout;
use crate::error::{FormatError, ParseResultExt, Result};
use crate::ids::RefId;
use crate::io::{read_list, Element, SaveReader, SaveWriter};

bitflags! {
    /// Which optional blocks a change form body carries. Bits above the
    /// common ones mean different things per [`ChangeFormKind`].
    #[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
    pub struct ChangeFlags: u32 {
        const FORM_FLAGS = 1 << 0;
        const MOVE = 1 << 1;
        const HAVOK_MOVE = 1 << 2;
        const SCALE = 1 << 4;
        const BASE_OBJECT = 1 << 7;
        const ADDED_FORM = 1 << 31;
    }
}

#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeFormKind {
    Refr = 0,
    Achr = 1,
    Pmis = 2,
    Pgre = 3,
    Pbea = 4,
    Pfla = 5,
    Cell = 6,
    Info = 7,
    Qust = 8,
    Npc = 9,
    Acti = 10,
    Tact = 11,
    Armo = 12,
    Book = 13,
    Cont = 14,
    Door = 15,
    Ingr = 16,
    Ligh = 17,
    Misc = 18,
    Appa = 19,
    Stat = 20,
    Mstt = 21,
    Furn = 22,
    Weap = 23,
    Ammo = 24,
    Keym = 25,
    Alch = 26,
    Idlm = 27,
    Note = 28,
    Eczn = 29,
    Clas = 30,
    Fact = 31,
    Pack = 32,
    Navm = 33,
    Woop = 34,
    Mgef = 35,
    Smqn = 36,
    Scen = 37,
    Lctn = 38,
    Rela = 39,
    Phzd = 40,
    Pbar = 41,
    Pcon = 42,
    Flst = 43,
    Lvln = 44,
    Lvli = 45,
    Lvsp = 46,
    Parw = 47,
    Ench = 48,
}

impl ChangeFormKind {
    /// Placed references, whose bodies share the move/scale/base-object layout.
    pub fn is_reference(self) -> bool {
        (self as u8) <= ChangeFormKind::Pfla as u8
    }
}

/// Width of the two length fields, from the top bits of the type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthWidth {
    U8,
    U16,
    U32,
}

impl LengthWidth {
    fn bits(self) -> u8 {
        match self {
            LengthWidth::U8 => 0,
            LengthWidth::U16 => 1,
            LengthWidth::U32 => 2,
        }
    }

    fn bytes(self) -> usize {
        match self {
            LengthWidth::U8 => 1,
            LengthWidth::U16 => 2,
            LengthWidth::U32 => 4,
        }
    }

    /// Narrowest width holding both values.
    fn fitting(a: usize, b: usize) -> Self {
        match a.max(b) {
            n if n <= u8::MAX as usize => LengthWidth::U8,
            n if n <= u16::MAX as usize => LengthWidth::U16,
            _ => LengthWidth::U32,
        }
    }

    fn read(self, r: &mut SaveReader<'_>) -> std::result::Result<u32, FormatError> {
        Ok(match self {
            LengthWidth::U8 => r.read_u8()? as u32,
            LengthWidth::U16 => r.read_u16()? as u32,
            LengthWidth::U32 => r.read_u32()?,
        })
    }

    fn write(self, w: &mut SaveWriter, v: u32) {
        match self {
            LengthWidth::U8 => w.write_u8(v as u8),
            LengthWidth::U16 => w.write_u16(v as u16),
            LengthWidth::U32 => w.write_u32(v),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChangeForm {
    pub ref_id: RefId,
    pub flags: ChangeFlags,
    pub kind: ChangeFormKind,
    pub width: LengthWidth,
    pub version: u8,
    /// Inflated length; zero when `data` is stored uncompressed.
    pub uncompressed_len: u32,
    /// The body exactly as stored.
    pub data: Vec<u8>,
}

impl ChangeForm {
    pub fn read(r: &mut SaveReader<'_>) -> Result<Self> {
        let ref_id = RefId::read(r)?;
        Self::read_rest(r, ref_id).with_element(|| format!("ChangeForm {ref_id}"))
    }

    fn read_rest(r: &mut SaveReader<'_>, ref_id: RefId) -> Result<Self> {
        let flags = ChangeFlags::from_bits_retain(r.read_u32()?);
        let offset = r.position();
        let type_byte = r.read_u8()?;
        let kind = ChangeFormKind::from_u8(type_byte & 0x3F).ok_or(FormatError::UnknownTag {
            what: "change form kind",
            tag: (type_byte & 0x3F) as u32,
            offset,
        })?;
        let width = match type_byte >> 6 {
            0 => LengthWidth::U8,
            1 => LengthWidth::U16,
            2 => LengthWidth::U32,
            tag => return Err(FormatError::UnknownTag { what: "change form length width", tag: tag as u32, offset }.into()),
        };
        let version = r.read_u8()?;
        let length1 = width.read(r)?;
        let uncompressed_len = width.read(r)?;
        let data = r.read_bytes(length1 as usize)?.to_vec();
        Ok(Self { ref_id, flags, kind, width, version, uncompressed_len, data })
    }

    /// `u32` count followed by that many change forms.
    pub fn read_all(r: &mut SaveReader<'_>) -> Result<Vec<Self>> {
        let count = r.read_count_u32("change form count", 9)?;
        read_list(r, count, "ChangeForm", ChangeForm::read)
    }

    pub fn is_compressed(&self) -> bool {
        self.uncompressed_len > 0
    }

    /// The body bytes, inflated when necessary.
    pub fn body_bytes(&self) -> std::result::Result<Vec<u8>, FormatError> {
        if self.is_compressed() {
            inflate(&self.data, self.uncompressed_len as usize, 0)
        } else {
            Ok(self.data.clone())
        }
    }

    /// Decodes the body according to the kind and the change flags.
    pub fn parse_body(&self, layout: Layout) -> Result<ChangeFormData> {
        let bytes = self.body_bytes()?;
        let mut r = SaveReader::new(&bytes, layout);
        ChangeFormData::read(&mut r, self.kind, self.flags).with_element(|| format!("{:?} body of {}", self.kind, self.ref_id))
    }

    /// A copy carrying `body` instead, recompressed when this form was compressed.
    pub fn with_data(&self, body: &ChangeFormData, layout: Layout) -> std::result::Result<Self, FormatError> {
        let plain = crate::io::to_bytes(body, layout)?;
        let (data, uncompressed_len) = if self.is_compressed() {
            let packed = deflate(&plain)?;
            let len = plain.len() as u32;
            (packed, len)
        } else {
            (plain, 0)
        };
        let width = LengthWidth::fitting(data.len(), uncompressed_len as usize);
        Ok(Self { data, uncompressed_len, width, ..self.clone() })
    }
}

impl Element for ChangeForm {
    fn write(&self, w: &mut SaveWriter) {
        self.ref_id.write(w);
        w.write_u32(self.flags.bits());
        w.write_u8(self.width.bits() << 6 | self.kind as u8);
        w.write_u8(self.version);
        self.width.write(w, self.data.len() as u32);
        self.width.write(w, self.uncompressed_len);
        w.write_bytes(&self.data);
    }

    fn calculate_size(&self, _layout: &Layout) -> usize {
        3 + 4 + 1 + 1 + 2 * self.width.bytes() + self.data.len()
    }
}

impl fmt::Display for ChangeForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {} ({} bytes)", self.kind, self.ref_id, self.data.len())
    }
}
