//! The scripting-VM snapshot: definitions, live objects, threads and queued calls.
//!
//! Headers for every object kind come first; the data blocks follow in the same
//! order, each prefixed with the handle of the header entry it belongs to.

mod array;
mod frame;
mod instance;
mod opcode;
mod script;
mod suspended;
pub mod terms;
mod thread;

use std::collections::{HashMap, HashSet};

pub use array::{ArrayData, ArrayInfo};
pub use frame::{Disassembly, MemberDesc, StackFrame, MAX_PARAMS, MAX_VARIABLES};
pub use instance::{ObjectData, Reference, ScriptInstance, StructData, StructInstance};
pub use opcode::{Instruction, Opcode, Parameter};
pub use script::{is_implicit, Script, StructDef, IMPLICIT_SCRIPTS};
pub use suspended::{FunctionMessage, MessageData, SuspendedStack};
pub use thread::{ActiveThread, Attachment, ThreadHeader, MAX_FRAMES};

use crate::config::Layout;
use crate::error::{FormatError, ParseResultExt, Result};
use crate::ids::Handle;
use crate::io::{read_list, Element, SaveReader, SaveWriter};
use crate::strings::StringTable;

#[derive(Clone, Debug, PartialEq)]
pub struct Papyrus {
    pub version: u16,
    pub reserved: u16,
    pub strings: StringTable,
    pub scripts: Vec<Script>,
    /// Always empty unless the edition knows structs.
    pub struct_defs: Vec<StructDef>,
    pub instances: Vec<ScriptInstance>,
    pub references: Vec<Reference>,
    pub structs: Vec<StructInstance>,
    pub arrays: Vec<ArrayInfo>,
    pub runtime: u32,
    pub thread_headers: Vec<ThreadHeader>,
    pub instance_data: Vec<ObjectData>,
    pub reference_data: Vec<ObjectData>,
    pub struct_data: Vec<StructData>,
    pub array_data: Vec<ArrayData>,
    pub threads: Vec<ActiveThread>,
    pub messages: Vec<FunctionMessage>,
    pub suspended: Vec<SuspendedStack>,
    pub suspended_later: Vec<SuspendedStack>,
    /// Whatever follows the suspended stacks, kept verbatim.
    pub trailing: Vec<u8>,
}

/// Handles seen in the header tables of the pass in progress. Lives only as long
/// as one call to [`Papyrus::read`], so a failed decode leaves nothing behind.
#[derive(Default)]
struct Registry {
    instances: HashSet<Handle>,
    references: HashSet<Handle>,
    structs: HashSet<Handle>,
    arrays: HashMap<Handle, u32>,
    threads: HashSet<Handle>,
}

fn known(set: &HashSet<Handle>, what: &'static str, handle: Handle, offset: usize) -> std::result::Result<(), FormatError> {
    if set.contains(&handle) {
        Ok(())
    } else {
        Err(FormatError::UnknownHandle { what, handle: handle.to_string(), offset })
    }
}

fn read_table<'a, T>(
    r: &mut SaveReader<'a>,
    what: &'static str,
    min_item: usize,
    f: impl FnMut(&mut SaveReader<'a>) -> Result<T>,
) -> Result<Vec<T>> {
    let count = r.read_count_u32(what, min_item)?;
    read_list(r, count, what, f)
}

fn write_table<T: Element>(w: &mut SaveWriter, items: &[T]) {
    w.write_u32(items.len() as u32);
    for item in items {
        item.write(w);
    }
}

fn table_size<T: Element>(items: &[T], layout: &Layout) -> usize {
    4 + items.iter().map(|i| i.calculate_size(layout)).sum::<usize>()
}

impl Papyrus {
    pub fn read(r: &mut SaveReader<'_>) -> Result<Self> {
        Self::read_inner(r).element("Papyrus")
    }

    fn read_inner(r: &mut SaveReader<'_>) -> Result<Self> {
        let structs_enabled = r.layout().game.supports_structs();
        let version = r.read_u16()?;
        let reserved = r.read_u16()?;
        let strings = StringTable::read(r)?;
        let s = &strings;
        let mut reg = Registry::default();

        let scripts = read_table(r, "script", 8, |r| Script::read(r, s))?;
        let struct_defs = if structs_enabled {
            read_table(r, "struct definition", 6, |r| StructDef::read(r, s))?
        } else {
            Vec::new()
        };
        let instances = read_table(r, "script instance", 8, |r| ScriptInstance::read(r, s))?;
        let references = read_table(r, "reference", 6, |r| Reference::read(r, s))?;
        let structs = if structs_enabled {
            read_table(r, "struct instance", 6, |r| StructInstance::read(r, s))?
        } else {
            Vec::new()
        };
        let arrays = read_table(r, "array", 8, |r| ArrayInfo::read(r, s))?;
        let runtime = r.read_u32()?;
        let thread_headers = read_table(r, "thread", 5, ThreadHeader::read)?;

        reg.instances.extend(instances.iter().map(|i| i.handle));
        reg.references.extend(references.iter().map(|i| i.handle));
        reg.structs.extend(structs.iter().map(|i| i.handle));
        reg.arrays.extend(arrays.iter().map(|a| (a.handle, a.length)));
        reg.threads.extend(thread_headers.iter().map(|t| t.handle));

        let instance_data = read_list(r, instances.len(), "instance data", |r| {
            let offset = r.position();
            let data = ObjectData::read(r, s)?;
            known(&reg.instances, "instance data", data.handle, offset)?;
            Ok(data)
        })?;
        let reference_data = read_list(r, references.len(), "reference data", |r| {
            let offset = r.position();
            let data = ObjectData::read(r, s)?;
            known(&reg.references, "reference data", data.handle, offset)?;
            Ok(data)
        })?;
        let struct_data = read_list(r, structs.len(), "struct data", |r| {
            let offset = r.position();
            let data = StructData::read(r, s)?;
            known(&reg.structs, "struct data", data.handle, offset)?;
            Ok(data)
        })?;
        let array_data = read_list(r, arrays.len(), "array data", |r| {
            let offset = r.position();
            let handle = Handle::read(r)?;
            let length = *reg.arrays.get(&handle).ok_or_else(|| FormatError::UnknownHandle {
                what: "array data",
                handle: handle.to_string(),
                offset,
            })?;
            ArrayData::read(r, s, handle, length as usize)
        })?;
        let threads = read_list(r, thread_headers.len(), "thread data", |r| {
            let offset = r.position();
            let thread = ActiveThread::read(r, s)?;
            known(&reg.threads, "thread data", thread.handle, offset)?;
            Ok(thread)
        })?;
        let messages = read_table(r, "function message", 2, |r| FunctionMessage::read(r, s))?;
        let suspended = read_table(r, "suspended stack", 5, |r| SuspendedStack::read(r, s))?;
        let suspended_later = read_table(r, "suspended stack", 5, |r| SuspendedStack::read(r, s))?;
        let trailing = r.rest().to_vec();

        tracing::debug!(
            strings = strings.len(),
            scripts = scripts.len(),
            instances = instances.len(),
            arrays = arrays.len(),
            threads = threads.len(),
            "decoded papyrus section"
        );

        Ok(Self {
            version,
            reserved,
            strings,
            scripts,
            struct_defs,
            instances,
            references,
            structs,
            arrays,
            runtime,
            thread_headers,
            instance_data,
            reference_data,
            struct_data,
            array_data,
            threads,
            messages,
            suspended,
            suspended_later,
            trailing,
        })
    }

    pub fn parse(data: &[u8], layout: Layout) -> Result<Self> {
        Self::read(&mut SaveReader::new(data, layout))
    }

    pub fn thread(&self, handle: Handle) -> Option<&ActiveThread> {
        self.threads.iter().find(|t| t.handle == handle)
    }

    pub fn thread_mut(&mut self, handle: Handle) -> Option<&mut ActiveThread> {
        self.threads.iter_mut().find(|t| t.handle == handle)
    }

    /// Zeroes every frame of one thread. Returns false when no such thread exists.
    pub fn terminate_thread(&mut self, handle: Handle, layout: &Layout) -> std::result::Result<bool, FormatError> {
        match self.thread_mut(handle) {
            Some(t) => {
                t.zero_instructions(layout)?;
                tracing::info!(%handle, frames = t.frames.len(), "terminated thread");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Element for Papyrus {
    fn write(&self, w: &mut SaveWriter) {
        let structs_enabled = w.layout().game.supports_structs();
        w.write_u16(self.version);
        w.write_u16(self.reserved);
        self.strings.write(w);
        write_table(w, &self.scripts);
        if structs_enabled {
            write_table(w, &self.struct_defs);
        }
        write_table(w, &self.instances);
        write_table(w, &self.references);
        if structs_enabled {
            write_table(w, &self.structs);
        }
        write_table(w, &self.arrays);
        w.write_u32(self.runtime);
        write_table(w, &self.thread_headers);
        self.instance_data.write(w);
        self.reference_data.write(w);
        if structs_enabled {
            self.struct_data.write(w);
        }
        self.array_data.write(w);
        self.threads.write(w);
        write_table(w, &self.messages);
        write_table(w, &self.suspended);
        write_table(w, &self.suspended_later);
        w.write_bytes(&self.trailing);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        let structs_enabled = layout.game.supports_structs();
        let mut size = 4 + self.strings.calculate_size(layout);
        size += table_size(&self.scripts, layout);
        if structs_enabled {
            size += table_size(&self.struct_defs, layout) + table_size(&self.structs, layout);
            size += self.struct_data.calculate_size(layout);
        }
        size += table_size(&self.instances, layout);
        size += table_size(&self.references, layout);
        size += table_size(&self.arrays, layout);
        size += 4;
        size += table_size(&self.thread_headers, layout);
        size += self.instance_data.calculate_size(layout);
        size += self.reference_data.calculate_size(layout);
        size += self.array_data.calculate_size(layout);
        size += self.threads.calculate_size(layout);
        size += table_size(&self.messages, layout);
        size += table_size(&self.suspended, layout);
        size += table_size(&self.suspended_later, layout);
        size + self.trailing.len()
    }
}
