use crate::config::Layout;
use crate::error::{ParseResultExt, Result};
use crate::ids::Handle;
use crate::io::{read_list, Element, SaveReader, SaveWriter};
use crate::strings::{StringTable, TString};
use crate::variable::Variable;

/// A queued call: target script, event and arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageData {
    pub unknown: u8,
    pub script: TString,
    pub event: TString,
    pub receiver: Variable,
    pub args: Vec<Variable>,
}

impl MessageData {
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Self> {
        let unknown = r.read_u8()?;
        let script = TString::read(r, strings)?;
        let event = TString::read(r, strings)?;
        let receiver = Variable::read(r, strings).element("receiver")?;
        let count = r.read_count_i32("argument count", 0, i32::MAX)?;
        let args = read_list(r, count, "argument", |r| Variable::read(r, strings))?;
        Ok(Self { unknown, script, event, receiver, args })
    }
}

impl Element for MessageData {
    fn write(&self, w: &mut SaveWriter) {
        w.write_u8(self.unknown);
        self.script.write(w);
        self.event.write(w);
        self.receiver.write(w);
        w.write_i32(self.args.len() as i32);
        self.args.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        1 + 2 * layout.string_index_bytes() + self.receiver.calculate_size(layout) + 4 + self.args.calculate_size(layout)
    }
}

/// A pending function message. Carries a thread handle only for the low message kinds.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionMessage {
    pub kind: u8,
    pub handle: Option<Handle>,
    /// Non-zero when `data` follows.
    pub flag: u8,
    pub data: Option<MessageData>,
}

impl FunctionMessage {
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Self> {
        let kind = r.read_u8()?;
        let handle = if kind <= 2 { Some(Handle::read(r)?) } else { None };
        let flag = r.read_u8()?;
        let data = if flag != 0 { Some(MessageData::read(r, strings).element("message")?) } else { None };
        Ok(Self { kind, handle, flag, data })
    }
}

impl Element for FunctionMessage {
    fn write(&self, w: &mut SaveWriter) {
        w.write_u8(self.kind);
        self.handle.write(w);
        w.write_u8(self.flag);
        self.data.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        1 + self.handle.calculate_size(layout) + 1 + self.data.calculate_size(layout)
    }
}

/// A stack waiting to be resumed, keyed by the thread handle.
#[derive(Clone, Debug, PartialEq)]
pub struct SuspendedStack {
    pub handle: Handle,
    pub flag: u8,
    pub data: Option<MessageData>,
}

impl SuspendedStack {
    pub fn read(r: &mut SaveReader<'_>, strings: &StringTable) -> Result<Self> {
        let handle = Handle::read(r)?;
        let flag = r.read_u8()?;
        let data = if flag != 0 { Some(MessageData::read(r, strings).element("message")?) } else { None };
        Ok(Self { handle, flag, data })
    }
}

impl Element for SuspendedStack {
    fn write(&self, w: &mut SaveWriter) {
        self.handle.write(w);
        w.write_u8(self.flag);
        self.data.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        layout.handle_bytes() + 1 + self.data.calculate_size(layout)
    }
}
