//! Facts gathered from decoded plugins: editor ids, display names and the
//! scripts each form carries, plus which plugin a script most likely came from.

use std::collections::HashMap;

use resave_core::ids::FormId;

use crate::field::{Field, FullName};
use crate::plugin_file::PluginFile;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CatalogEntry {
    pub editor_id: Option<String>,
    pub name: Option<FullName>,
    pub scripts: Vec<String>,
}

#[derive(Debug, Default)]
pub struct PluginCatalog {
    forms: HashMap<FormId, CatalogEntry>,
    /// Lowercase script name to the plugins attaching it, in the order they were added.
    script_plugins: HashMap<String, Vec<String>>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every record of `plugin`. Plugins added later override earlier ones,
    /// so add them in load order.
    pub fn add(&mut self, plugin: &PluginFile) {
        for record in plugin.records() {
            let mut entry = CatalogEntry::default();
            for field in record.fields() {
                match field {
                    Field::EditorId(_) => entry.editor_id = field.editor_id().map(|s| s.into_owned()),
                    Field::FullName(name) => entry.name = Some(name.clone()),
                    Field::Scripts(vmad) => {
                        entry.scripts.extend(vmad.script_names().map(|n| n.to_str().into_owned()));
                    }
                    _ => {}
                }
            }

            for script in &entry.scripts {
                let plugins = self.script_plugins.entry(script.to_lowercase()).or_default();
                if !plugins.iter().any(|p| p.eq_ignore_ascii_case(&plugin.name)) {
                    plugins.push(plugin.name.clone());
                }
            }
            if entry != CatalogEntry::default() {
                self.forms.insert(record.header.form_id, entry);
            }
        }
    }

    pub fn get(&self, id: FormId) -> Option<&CatalogEntry> {
        self.forms.get(&id)
    }

    pub fn editor_id(&self, id: FormId) -> Option<&str> {
        self.forms.get(&id)?.editor_id.as_deref()
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    /// The last-loaded plugin that attaches `script` to any record.
    pub fn probable_origin(&self, script: &str) -> Option<&str> {
        let found = self.script_plugins.get(&script.to_lowercase()).and_then(|p| p.last());
        if found.is_none() {
            tracing::debug!(script, "no plugin attaches this script");
        }
        found.map(String::as_str)
    }
}
