use std::fmt;

use crate::config::Layout;
use crate::error::FormatError;
use crate::formid_table::FormIdTable;
use crate::ids::FormId;
use crate::io::{Element, SaveReader, SaveWriter};

/// The discriminator held in bits 22-23 of a [`RefId`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefIdKind {
    /// Index (1-based) into the save's form-id table.
    FormIndex,
    /// Object defined by plugin #0.
    Default,
    /// Object created during play; no owning plugin.
    Created,
    Invalid,
}

impl RefIdKind {
    fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            0 => RefIdKind::FormIndex,
            1 => RefIdKind::Default,
            2 => RefIdKind::Created,
            _ => RefIdKind::Invalid,
        }
    }

    fn bits(self) -> u32 {
        match self {
            RefIdKind::FormIndex => 0,
            RefIdKind::Default => 1,
            RefIdKind::Created => 2,
            RefIdKind::Invalid => 3,
        }
    }
}

/// Packed 3-byte reference to a game object.
///
/// Stored most-significant byte first. The top two bits are the [`RefIdKind`],
/// the low 22 bits the value; a zero value never refers to anything.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefId(u32);

impl RefId {
    pub const VALUE_MASK: u32 = 0x3F_FFFF;

    /// The canonical "no reference".
    pub const NONE: RefId = RefId(1 << 22);

    pub fn new(kind: RefIdKind, value: u32) -> Result<Self, FormatError> {
        if value > Self::VALUE_MASK {
            return Err(FormatError::OutOfRange {
                what: "RefId value",
                value: value as i64,
                min: 0,
                max: Self::VALUE_MASK as i64,
                offset: 0,
            });
        }
        Ok(Self(kind.bits() << 22 | value))
    }

    pub fn from_raw(raw: u32) -> Self {
        Self(raw & 0xFF_FFFF)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn kind(self) -> RefIdKind {
        RefIdKind::from_bits(self.0 >> 22)
    }

    #[inline]
    pub fn value(self) -> u32 {
        self.0 & Self::VALUE_MASK
    }

    /// True when this refers to nothing.
    pub fn is_zero(self) -> bool {
        self.value() == 0 && self.kind() != RefIdKind::Invalid
    }

    /// The reference a save would store for `id`, given its form-id table.
    pub fn from_form_id(id: FormId, table: &FormIdTable) -> Option<Self> {
        table.ref_id_for(id)
    }

    pub fn read(r: &mut SaveReader<'_>) -> Result<Self, FormatError> {
        let [b0, b1, b2] = r.read_array::<3>()?;
        Ok(Self((b0 as u32) << 16 | (b1 as u32) << 8 | b2 as u32))
    }
}

impl Element for RefId {
    fn write(&self, w: &mut SaveWriter) {
        w.write_bytes(&[(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]);
    }

    fn calculate_size(&self, _layout: &Layout) -> usize {
        3
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            RefIdKind::FormIndex => write!(f, "#{}", self.value()),
            RefIdKind::Default => write!(f, "{:08X}", self.value()),
            RefIdKind::Created => write!(f, "FF{:06X}", self.value()),
            RefIdKind::Invalid => write!(f, "invalid:{:06X}", self.value()),
        }
    }
}

impl fmt::Debug for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefId({:?}, {:#X})", self.kind(), self.value())
    }
}
