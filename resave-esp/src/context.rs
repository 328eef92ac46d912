use resave_core::ids::{FormId, MasterList};
use resave_core::plugin::PluginInfo;

/// What the record decoder needs to know about the plugin being read.
#[derive(Clone, Debug)]
pub struct EspContext<'a> {
    plugin_name: String,
    masters: MasterList<'a>,
    localized: bool,
}

impl<'a> EspContext<'a> {
    pub fn new<S: AsRef<str>>(plugin_name: &str, master_names: &[S], plugins: &'a PluginInfo, localized: bool) -> Self {
        Self {
            plugin_name: plugin_name.to_string(),
            masters: MasterList::resolve(master_names, plugin_name, plugins),
            localized,
        }
    }

    /// Context used while reading the header record, before the master list is known.
    pub fn bootstrap(plugin_name: &str) -> Self {
        Self {
            plugin_name: plugin_name.to_string(),
            masters: MasterList::from_plugins(Vec::new(), None),
            localized: false,
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn masters(&self) -> &MasterList<'a> {
        &self.masters
    }

    pub fn is_localized(&self) -> bool {
        self.localized
    }

    pub fn remap(&self, raw: u32) -> FormId {
        self.masters.remap(raw)
    }
}
