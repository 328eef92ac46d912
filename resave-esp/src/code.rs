use std::fmt;

use resave_core::error::FormatError;
use resave_core::io::SaveReader;

/// A four-character record or field code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordCode(pub [u8; 4]);

impl RecordCode {
    pub const GRUP: RecordCode = RecordCode(*b"GRUP");
    pub const TES4: RecordCode = RecordCode(*b"TES4");
    pub const XXXX: RecordCode = RecordCode(*b"XXXX");

    pub const EDID: RecordCode = RecordCode(*b"EDID");
    pub const FULL: RecordCode = RecordCode(*b"FULL");
    pub const NAME: RecordCode = RecordCode(*b"NAME");
    pub const VMAD: RecordCode = RecordCode(*b"VMAD");
    pub const MAST: RecordCode = RecordCode(*b"MAST");
    pub const DATA: RecordCode = RecordCode(*b"DATA");
    pub const HEDR: RecordCode = RecordCode(*b"HEDR");

    pub const REFR: RecordCode = RecordCode(*b"REFR");
    pub const ACHR: RecordCode = RecordCode(*b"ACHR");
    pub const INFO: RecordCode = RecordCode(*b"INFO");
    pub const PACK: RecordCode = RecordCode(*b"PACK");
    pub const PERK: RecordCode = RecordCode(*b"PERK");
    pub const QUST: RecordCode = RecordCode(*b"QUST");
    pub const SCEN: RecordCode = RecordCode(*b"SCEN");

    pub fn read(r: &mut SaveReader<'_>) -> Result<Self, FormatError> {
        Ok(Self(r.read_array()?))
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for RecordCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02X}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for RecordCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordCode({self})")
    }
}
