use std::fmt;

use crate::config::Layout;
use crate::error::FormatError;
use crate::io::{Element, SaveReader, SaveWriter};

/// Variable-size unsigned integer.
///
/// The low two bits of the first byte give the width (0, 1, 2 for 1, 2, 3 bytes);
/// the value is the little-endian assembly of the consumed bytes shifted right by two.
///
/// Three bytes leave 22 value bits, so nothing above [`VsVal::MAX`] has an encoding.
/// Limits quoted as 0x3FFF_FFFF or 0x4000_0000 would need a fourth byte, which the
/// width tag cannot select; they are rejected here rather than written truncated.
/// The width steps follow from the same layout: 1 byte below 0x40, 2 below 0x4000.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct VsVal(u32);

impl VsVal {
    /// Largest value three bytes can carry after the two width bits.
    pub const MAX: u32 = 0x3F_FFFF;

    pub fn new(value: u32) -> Result<Self, FormatError> {
        if value > Self::MAX {
            return Err(FormatError::VsValOverflow { value, max: Self::MAX });
        }
        Ok(Self(value))
    }

    #[inline]
    pub fn value(self) -> u32 {
        self.0
    }

    /// Encoded width in bytes.
    pub fn width(self) -> usize {
        if self.0 < 0x40 {
            1
        } else if self.0 < 0x4000 {
            2
        } else {
            3
        }
    }

    pub fn read(r: &mut SaveReader<'_>) -> Result<Self, FormatError> {
        let offset = r.position();
        let b0 = r.read_u8()? as u32;
        let raw = match b0 & 0x3 {
            0 => b0,
            1 => b0 | (r.read_u8()? as u32) << 8,
            2 => {
                let hi = r.read_u16()? as u32;
                b0 | hi << 8
            }
            tag => return Err(FormatError::UnknownTag { what: "VSVal width", tag, offset }),
        };
        Ok(Self(raw >> 2))
    }
}

impl Element for VsVal {
    fn write(&self, w: &mut SaveWriter) {
        let width = self.width();
        let raw = (self.0 << 2) | (width as u32 - 1);
        w.write_bytes(&raw.to_le_bytes()[..width]);
    }

    fn calculate_size(&self, _layout: &Layout) -> usize {
        self.width()
    }
}

impl TryFrom<usize> for VsVal {
    type Error = FormatError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        let v = u32::try_from(value).unwrap_or(u32::MAX);
        VsVal::new(v)
    }
}

impl fmt::Display for VsVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
