use crate::config::Layout;
use crate::error::{FormatError, ParseResultExt, Result};
use crate::ids::{Handle, RefId};
use crate::io::{read_list, Element, SaveReader, SaveWriter};
use crate::strings::{StringTable, TString};
use crate::variable::Variable;

use super::frame::StackFrame;

pub const MAX_FRAMES: i32 = 2047;

const FLAG_HAS_UNKNOWN: u8 = 0x01;

/// Header entry of an active thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadHeader {
    pub handle: Handle,
    pub kind: u8,
}

impl ThreadHeader {
    pub fn read(r: &mut SaveReader<'_>) -> Result<Self> {
        let handle = Handle::read(r)?;
        let kind = r.read_u8()?;
        Ok(Self { handle, kind })
    }
}

impl Element for ThreadHeader {
    fn write(&self, w: &mut SaveWriter) {
        self.handle.write(w);
        w.write_u8(self.kind);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        layout.handle_bytes() + 1
    }
}

/// What the thread was started on behalf of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attachment {
    None,
    Object(RefId),
    Named { name: TString, value: i32 },
    Handle(Handle),
}

impl Attachment {
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> std::result::Result<Self, FormatError> {
        let offset = r.position();
        let a = match r.read_u8()? {
            0 => Attachment::None,
            1 => Attachment::Object(RefId::read(r)?),
            2 => {
                let name = TString::read(r, strings)?;
                Attachment::Named { name, value: r.read_i32()? }
            }
            3 => Attachment::Handle(Handle::read(r)?),
            tag => return Err(FormatError::UnknownTag { what: "thread attachment", tag: tag as u32, offset }),
        };
        Ok(a)
    }

    fn tag(&self) -> u8 {
        match self {
            Attachment::None => 0,
            Attachment::Object(_) => 1,
            Attachment::Named { .. } => 2,
            Attachment::Handle(_) => 3,
        }
    }
}

impl Element for Attachment {
    fn write(&self, w: &mut SaveWriter) {
        w.write_u8(self.tag());
        match self {
            Attachment::None => {}
            Attachment::Object(id) => id.write(w),
            Attachment::Named { name, value } => {
                name.write(w);
                w.write_i32(*value);
            }
            Attachment::Handle(h) => h.write(w),
        }
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        1 + match self {
            Attachment::None => 0,
            Attachment::Object(_) => 3,
            Attachment::Named { .. } => layout.string_index_bytes() + 4,
            Attachment::Handle(_) => layout.handle_bytes(),
        }
    }
}

/// A running (or suspended) thread: its call stack, innermost frame last.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveThread {
    pub handle: Handle,
    pub major: u8,
    pub minor: u8,
    pub attached: Variable,
    pub flag: u8,
    pub unknown_byte: u8,
    pub unknown: Option<u32>,
    pub attachment: Attachment,
    pub frames: Vec<StackFrame>,
}

impl ActiveThread {
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Self> {
        let handle = Handle::read(r)?;
        Self::read_body(r, strings, handle).with_element(|| format!("thread {handle}"))
    }

    fn read_body(r: &mut SaveReader<'_>, strings: &StringTable, handle: Handle) -> Result<Self> {
        let major = r.read_u8()?;
        let minor = r.read_u8()?;
        let attached = Variable::read(r, strings)?;
        let flag = r.read_u8()?;
        let unknown_byte = r.read_u8()?;
        let unknown = if flag & FLAG_HAS_UNKNOWN != 0 { Some(r.read_u32()?) } else { None };
        let attachment = Attachment::read(r, strings)?;
        let count = r.read_count_i32("frame count", 0, MAX_FRAMES)?;
        let frames = read_list(r, count, "StackFrame", |r| StackFrame::read(r, strings))?;
        Ok(Self { handle, major, minor, attached, flag, unknown_byte, unknown, attachment, frames })
    }

    /// A thread with no frames is parked; its stack lives in the suspended lists.
    pub fn is_suspended(&self) -> bool {
        self.frames.is_empty()
    }

    /// Every frame has been zeroed.
    pub fn is_terminated(&self) -> bool {
        !self.frames.is_empty() && self.frames.iter().all(StackFrame::is_zeroed)
    }

    /// Zeroes every frame, or none of them when one cannot be zeroed.
    pub fn zero_instructions(&mut self, layout: &Layout) -> std::result::Result<(), FormatError> {
        let mut frames = self.frames.clone();
        for frame in &mut frames {
            frame.zero_instructions(layout)?;
        }
        self.frames = frames;
        Ok(())
    }

    /// The outermost frame's owner, the object the thread runs on.
    pub fn owner_variable(&self) -> Option<&Variable> {
        self.frames.first().map(|f| &f.owner)
    }
}

impl Element for ActiveThread {
    fn write(&self, w: &mut SaveWriter) {
        self.handle.write(w);
        w.write_u8(self.major);
        w.write_u8(self.minor);
        self.attached.write(w);
        w.write_u8(self.flag);
        w.write_u8(self.unknown_byte);
        if let Some(v) = self.unknown {
            w.write_u32(v);
        }
        self.attachment.write(w);
        w.write_i32(self.frames.len() as i32);
        self.frames.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        layout.handle_bytes()
            + 2
            + self.attached.calculate_size(layout)
            + 2
            + self.unknown.map_or(0, |_| 4)
            + self.attachment.calculate_size(layout)
            + 4
            + self.frames.calculate_size(layout)
    }
}
