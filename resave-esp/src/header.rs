use bitflags::bitflags;

use resave_core::config::Layout;
use resave_core::error::FormatError;
use resave_core::ids::FormId;
use resave_core::io::{Element, SaveReader, SaveWriter};

use crate::context::EspContext;

bitflags! {
    #[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
    pub struct RecordFlags: u32 {
        const MASTER = 0x0000_0001;
        /// Header record only: display names are string-table ids.
        const LOCALIZED = 0x0000_0080;
        const LIGHT = 0x0000_0200;
        const COMPRESSED = 0x0004_0000;
    }
}

/// The 16 bytes that follow a record's code and size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    pub flags: RecordFlags,
    /// The id as stored, relative to the plugin's own master list.
    pub raw_id: u32,
    /// `raw_id` rebuilt for the current load order.
    pub form_id: FormId,
    pub revision: u32,
    pub version: u16,
    pub unknown: u16,
}

impl RecordHeader {
    pub const SIZE: usize = 16;

    pub fn read(r: &mut SaveReader<'_>, ctx: &EspContext<'_>) -> Result<Self, FormatError> {
        let flags = RecordFlags::from_bits_retain(r.read_u32()?);
        let raw_id = r.read_u32()?;
        let revision = r.read_u32()?;
        let version = r.read_u16()?;
        let unknown = r.read_u16()?;
        Ok(Self { flags, raw_id, form_id: ctx.remap(raw_id), revision, version, unknown })
    }

    pub fn is_compressed(&self) -> bool {
        self.flags.contains(RecordFlags::COMPRESSED)
    }
}

impl Element for RecordHeader {
    fn write(&self, w: &mut SaveWriter) {
        w.write_u32(self.flags.bits());
        w.write_u32(self.raw_id);
        w.write_u32(self.revision);
        w.write_u16(self.version);
        w.write_u16(self.unknown);
    }

    fn calculate_size(&self, _layout: &Layout) -> usize {
        Self::SIZE
    }
}
