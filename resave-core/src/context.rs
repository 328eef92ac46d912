//! Post-decode resolution: answers "what does this id point at" over a decoded,
//! immutable save.
//!
//! Nothing here is built while decoding. A [`Resolver`] indexes the finished
//! tree once and borrows from it; lookups never mutate the model.

use std::collections::HashMap;

use crate::changeform::ChangeForm;
use crate::formid_table::FormIdTable;
use crate::ids::{FormId, Handle, MasterList, RefId};
use crate::papyrus::{
    is_implicit, ActiveThread, ArrayData, ArrayInfo, ObjectData, Papyrus, Reference, Script, ScriptInstance,
    StackFrame, StructData, StructInstance, ThreadHeader,
};
use crate::plugin::{Plugin, PluginInfo};

/// Anything an identifier can resolve to.
#[derive(Clone, Copy, Debug)]
pub enum LiveObject<'a> {
    Instance { header: &'a ScriptInstance, data: Option<&'a ObjectData> },
    Reference { header: &'a Reference, data: Option<&'a ObjectData> },
    Struct { header: &'a StructInstance, data: Option<&'a StructData> },
    Array { header: &'a ArrayInfo, data: Option<&'a ArrayData> },
    Thread { header: Option<&'a ThreadHeader>, data: &'a ActiveThread },
    ChangeForm(&'a ChangeForm),
    Plugin(&'a Plugin),
}

impl LiveObject<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            LiveObject::Instance { .. } => "script instance",
            LiveObject::Reference { .. } => "reference",
            LiveObject::Struct { .. } => "struct",
            LiveObject::Array { .. } => "array",
            LiveObject::Thread { .. } => "thread",
            LiveObject::ChangeForm(_) => "change form",
            LiveObject::Plugin(_) => "plugin",
        }
    }
}

/// Handles of elements whose script cannot be found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UndefinedReport {
    pub scripts: Vec<String>,
    pub instances: Vec<Handle>,
    pub threads: Vec<Handle>,
}

impl UndefinedReport {
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty() && self.instances.is_empty() && self.threads.is_empty()
    }
}

pub struct Resolver<'a> {
    papyrus: &'a Papyrus,
    plugins: &'a PluginInfo,
    form_ids: &'a FormIdTable,
    objects: HashMap<Handle, LiveObject<'a>>,
    scripts: HashMap<String, &'a Script>,
    change_forms: HashMap<RefId, &'a ChangeForm>,
}

impl<'a> Resolver<'a> {
    pub fn new(papyrus: &'a Papyrus, plugins: &'a PluginInfo, form_ids: &'a FormIdTable) -> Self {
        let mut objects = HashMap::new();

        let instance_data: HashMap<_, _> = papyrus.instance_data.iter().map(|d| (d.handle, d)).collect();
        for header in &papyrus.instances {
            let data = instance_data.get(&header.handle).copied();
            objects.insert(header.handle, LiveObject::Instance { header, data });
        }
        let reference_data: HashMap<_, _> = papyrus.reference_data.iter().map(|d| (d.handle, d)).collect();
        for header in &papyrus.references {
            let data = reference_data.get(&header.handle).copied();
            objects.insert(header.handle, LiveObject::Reference { header, data });
        }
        let struct_data: HashMap<_, _> = papyrus.struct_data.iter().map(|d| (d.handle, d)).collect();
        for header in &papyrus.structs {
            let data = struct_data.get(&header.handle).copied();
            objects.insert(header.handle, LiveObject::Struct { header, data });
        }
        let array_data: HashMap<_, _> = papyrus.array_data.iter().map(|d| (d.handle, d)).collect();
        for header in &papyrus.arrays {
            let data = array_data.get(&header.handle).copied();
            objects.insert(header.handle, LiveObject::Array { header, data });
        }
        let thread_headers: HashMap<_, _> = papyrus.thread_headers.iter().map(|h| (h.handle, h)).collect();
        for data in &papyrus.threads {
            let header = thread_headers.get(&data.handle).copied();
            objects.insert(data.handle, LiveObject::Thread { header, data });
        }

        let scripts = papyrus.scripts.iter().map(|s| (s.name.as_str().to_lowercase(), s)).collect();

        Self { papyrus, plugins, form_ids, objects, scripts, change_forms: HashMap::new() }
    }

    /// Makes change forms reachable through [`resolve_reference`](Self::resolve_reference).
    pub fn with_change_forms(mut self, forms: &'a [ChangeForm]) -> Self {
        self.change_forms = forms.iter().map(|f| (f.ref_id, f)).collect();
        self
    }

    pub fn papyrus(&self) -> &'a Papyrus {
        self.papyrus
    }

    pub fn find_by_id(&self, handle: Handle) -> Option<LiveObject<'a>> {
        self.objects.get(&handle).copied()
    }

    pub fn find_script(&self, name: &str) -> Option<&'a Script> {
        self.scripts.get(&name.to_lowercase()).copied()
    }

    pub fn form_id_of(&self, refid: RefId) -> Option<FormId> {
        self.form_ids.form_id_of(refid)
    }

    pub fn owner_plugin(&self, refid: RefId) -> Option<&'a Plugin> {
        self.plugins.owner_of(self.form_id_of(refid)?)
    }

    /// Change form for `refid`, else the plugin that defines it. Misses are logged, not raised.
    pub fn resolve_reference(&self, refid: RefId) -> Option<LiveObject<'a>> {
        if refid.is_zero() {
            return None;
        }
        if let Some(form) = self.change_forms.get(&refid) {
            return Some(LiveObject::ChangeForm(form));
        }
        let found = self.owner_plugin(refid).map(LiveObject::Plugin);
        if found.is_none() {
            tracing::warn!(%refid, "reference does not resolve to anything in this save");
        }
        found
    }

    /// Rebuilds a plugin-relative id for this save's load order.
    pub fn remap_form_id(&self, raw: u32, masters: &MasterList<'_>) -> FormId {
        masters.remap(raw)
    }

    /// The script instance (or other object) frame 0 runs on.
    pub fn thread_owner(&self, thread: &ActiveThread) -> Option<LiveObject<'a>> {
        let handle = thread.owner_variable()?.handle()?;
        self.find_by_id(handle)
    }

    pub fn instance_script(&self, instance: &ScriptInstance) -> Option<&'a Script> {
        self.find_script(instance.script.as_str())
    }

    /// Whether a script name refers to something the VM cannot run: a parentless
    /// user script, or a name with no definition that the engine does not provide.
    pub fn is_script_undefined(&self, name: &str) -> bool {
        match self.find_script(name) {
            Some(script) => script.is_undefined(),
            None => !is_implicit(name),
        }
    }

    pub fn is_frame_undefined(&self, frame: &StackFrame) -> bool {
        !frame.is_native() && self.is_script_undefined(frame.script_name.as_str())
    }

    pub fn undefined_elements(&self) -> UndefinedReport {
        let p = self.papyrus;
        UndefinedReport {
            scripts: p.scripts.iter().filter(|s| s.is_undefined()).map(|s| s.name.to_string()).collect(),
            instances: p
                .instances
                .iter()
                .filter(|i| self.is_script_undefined(i.script.as_str()))
                .map(|i| i.handle)
                .collect(),
            threads: p
                .threads
                .iter()
                .filter(|t| t.frames.iter().any(|f| self.is_frame_undefined(f)))
                .map(|t| t.handle)
                .collect(),
        }
    }
}
