use crate::config::Layout;
use crate::error::{ParseResultExt, Result};
use crate::ids::{FormId, RefId, RefIdKind};
use crate::io::{Element, SaveReader, SaveWriter};

/// The per-save table that `form-index` [`RefId`]s point into.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormIdTable {
    ids: Vec<FormId>,
}

impl FormIdTable {
    pub fn new(ids: Vec<FormId>) -> Self {
        Self { ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[FormId] {
        &self.ids
    }

    /// Entry for a 1-based index; 0 and out-of-range indices yield `None`.
    pub fn get(&self, index: u32) -> Option<FormId> {
        let i = (index as usize).checked_sub(1)?;
        self.ids.get(i).copied()
    }

    /// Position of `id` as a 1-based index, for building `form-index` refs.
    pub fn index_of(&self, id: FormId) -> Option<u32> {
        self.ids.iter().position(|f| *f == id).map(|i| i as u32 + 1)
    }

    /// Maps a reference to its form id. `None` for zero, invalid or out-of-range references.
    pub fn form_id_of(&self, refid: RefId) -> Option<FormId> {
        if refid.is_zero() {
            return None;
        }
        match refid.kind() {
            RefIdKind::FormIndex => {
                let found = self.get(refid.value());
                if found.is_none() {
                    tracing::warn!(%refid, table_len = self.ids.len(), "form index out of range");
                }
                found
            }
            RefIdKind::Default => Some(FormId::full(0, refid.value())),
            RefIdKind::Created => Some(FormId::unowned(refid.value())),
            RefIdKind::Invalid => None,
        }
    }

    /// Inverse of [`form_id_of`](Self::form_id_of): prefers the compact kinds and
    /// falls back to an index into this table.
    pub fn ref_id_for(&self, id: FormId) -> Option<RefId> {
        let plugin = id.plugin_index();
        if plugin == 0 && id.raw() <= RefId::VALUE_MASK {
            return RefId::new(RefIdKind::Default, id.raw()).ok();
        }
        if id.is_created() && id.object_id() <= RefId::VALUE_MASK {
            return RefId::new(RefIdKind::Created, id.object_id()).ok();
        }
        let index = self.index_of(id)?;
        RefId::new(RefIdKind::FormIndex, index).ok()
    }

    pub fn read(r: &mut SaveReader<'_>) -> Result<Self> {
        let read = |r: &mut SaveReader<'_>| -> Result<Self> {
            let count = r.read_count_u32("form id count", 4)?;
            let mut ids = Vec::with_capacity(count);
            for _ in 0..count {
                ids.push(FormId(r.read_u32()?));
            }
            Ok(Self { ids })
        };
        read(r).element("FormIdTable")
    }
}

impl Element for FormIdTable {
    fn write(&self, w: &mut SaveWriter) {
        w.write_u32(self.ids.len() as u32);
        for id in &self.ids {
            w.write_u32(id.raw());
        }
    }

    fn calculate_size(&self, _layout: &Layout) -> usize {
        4 + 4 * self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::to_bytes;

    #[test]
    fn resolves_each_kind() {
        let table = FormIdTable::new(vec![FormId(0x0200_0D62), FormId(0xFE00_1801)]);
        let idx = RefId::new(RefIdKind::FormIndex, 2).unwrap();
        assert_eq!(table.form_id_of(idx), Some(FormId(0xFE00_1801)));
        let oob = RefId::new(RefIdKind::FormIndex, 3).unwrap();
        assert_eq!(table.form_id_of(oob), None);
        let def = RefId::new(RefIdKind::Default, 0x14).unwrap();
        assert_eq!(table.form_id_of(def), Some(FormId(0x14)));
        let created = RefId::new(RefIdKind::Created, 0x9A).unwrap();
        assert_eq!(table.form_id_of(created), Some(FormId(0xFF00_009A)));
        assert_eq!(table.form_id_of(RefId::NONE), None);
    }

    #[test]
    fn inverse_mapping() {
        let table = FormIdTable::new(vec![FormId(0x0200_0D62)]);
        for id in [FormId(0x0200_0D62), FormId(0x14), FormId(0xFF00_0003)] {
            let refid = table.ref_id_for(id).unwrap();
            assert_eq!(table.form_id_of(refid), Some(id));
        }
        assert!(table.ref_id_for(FormId(0x0300_0001)).is_none());
    }

    #[test]
    fn roundtrip() {
        let table = FormIdTable::new(vec![FormId(1), FormId(0x0100_0002)]);
        let bytes = to_bytes(&table, Layout::default()).unwrap();
        assert_eq!(bytes.len(), table.calculate_size(&Layout::default()));
        let back = FormIdTable::read(&mut SaveReader::new(&bytes, Layout::default())).unwrap();
        assert_eq!(back, table);
    }
}
