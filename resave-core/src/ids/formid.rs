use std::fmt;

use crate::plugin::{Plugin, PluginInfo};

/// A load-order-qualified object id: plugin index in the top bits, payload below.
///
/// Full plugins own `II______` (8-bit index, 24-bit payload). Lightweight plugins
/// share the `FE` prefix: `FEIII___` (12-bit index, 12-bit payload).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FormId(pub u32);

impl FormId {
    pub const LITE_PREFIX: u8 = 0xFE;
    /// Also the prefix of objects with no owning plugin.
    pub const CREATED_PREFIX: u8 = 0xFF;

    pub fn full(index: u8, payload: u32) -> Self {
        Self((index as u32) << 24 | (payload & 0xFF_FFFF))
    }

    pub fn lite(index: u16, payload: u32) -> Self {
        Self((Self::LITE_PREFIX as u32) << 24 | ((index as u32) & 0xFFF) << 12 | (payload & 0xFFF))
    }

    /// An id whose owner is unknown in the current context.
    pub fn unowned(payload: u32) -> Self {
        Self((Self::CREATED_PREFIX as u32) << 24 | (payload & 0xFF_FFFF))
    }

    /// Combines a plugin's load-order position with a payload.
    pub fn for_plugin(plugin: &Plugin, payload: u32) -> Self {
        if plugin.is_lite() {
            Self::lite(plugin.index(), payload)
        } else {
            Self::full(plugin.index() as u8, payload)
        }
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn plugin_index(self) -> u8 {
        (self.0 >> 24) as u8
    }

    #[inline]
    pub fn is_lite(self) -> bool {
        self.plugin_index() == Self::LITE_PREFIX
    }

    #[inline]
    pub fn is_created(self) -> bool {
        self.plugin_index() == Self::CREATED_PREFIX
    }

    #[inline]
    pub fn lite_index(self) -> u16 {
        ((self.0 >> 12) & 0xFFF) as u16
    }

    /// The payload without its plugin prefix.
    pub fn object_id(self) -> u32 {
        if self.is_lite() {
            self.0 & 0xFFF
        } else {
            self.0 & 0xFF_FFFF
        }
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl fmt::Debug for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FormId({:08X})", self.0)
    }
}

/// A plugin's master list resolved against one load order.
///
/// Plugin files store ids relative to their own masters: the top byte indexes the
/// master list, and one past the end means the plugin itself.
#[derive(Clone, Debug)]
pub struct MasterList<'a> {
    masters: Vec<Option<&'a Plugin>>,
    current: Option<&'a Plugin>,
}

impl<'a> MasterList<'a> {
    pub fn resolve<S: AsRef<str>>(master_names: &[S], current_name: &str, plugins: &'a PluginInfo) -> Self {
        let masters = master_names
            .iter()
            .map(|name| {
                let found = plugins.find(name.as_ref());
                if found.is_none() {
                    tracing::debug!(master = name.as_ref(), "master is not in the load order");
                }
                found
            })
            .collect();
        Self { masters, current: plugins.find(current_name) }
    }

    pub fn from_plugins(masters: Vec<Option<&'a Plugin>>, current: Option<&'a Plugin>) -> Self {
        Self { masters, current }
    }

    pub fn len(&self) -> usize {
        self.masters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masters.is_empty()
    }

    pub fn current(&self) -> Option<&'a Plugin> {
        self.current
    }

    /// Rebuilds a plugin-relative id for this load order.
    ///
    /// Below the master count the owning master decides the prefix; exactly the
    /// master count means the plugin itself; anything above, or an owner missing
    /// from the load order, yields the unowned `FF` prefix.
    pub fn remap(&self, raw: u32) -> FormId {
        let index = (raw >> 24) as usize;
        let payload = raw & 0xFF_FFFF;
        let owner = match index.cmp(&self.masters.len()) {
            std::cmp::Ordering::Less => self.masters[index],
            std::cmp::Ordering::Equal => self.current,
            std::cmp::Ordering::Greater => None,
        };
        match owner {
            Some(plugin) => FormId::for_plugin(plugin, payload),
            None => FormId::unowned(payload),
        }
    }
}
