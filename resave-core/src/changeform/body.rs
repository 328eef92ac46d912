use crate::config::Layout;
use crate::error::{ParseResultExt, Result};
use crate::ids::{RefId, VsVal};
use crate::io::{read_list, Element, SaveReader, SaveWriter};

use super::{ChangeFlags, ChangeFormKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormFlags {
    pub flags: u32,
    pub unknown: u16,
}

impl FormFlags {
    fn read(r: &mut SaveReader<'_>) -> Result<Self> {
        let flags = r.read_u32()?;
        let unknown = r.read_u16()?;
        Ok(Self { flags, unknown })
    }
}

impl Element for FormFlags {
    fn write(&self, w: &mut SaveWriter) {
        w.write_u32(self.flags);
        w.write_u16(self.unknown);
    }

    fn calculate_size(&self, _layout: &Layout) -> usize {
        6
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Move {
    pub cell: RefId,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
}

impl Move {
    fn read(r: &mut SaveReader<'_>) -> Result<Self> {
        let cell = RefId::read(r)?;
        let mut position = [0f32; 3];
        for v in &mut position {
            *v = r.read_f32()?;
        }
        let mut rotation = [0f32; 3];
        for v in &mut rotation {
            *v = r.read_f32()?;
        }
        Ok(Self { cell, position, rotation })
    }
}

impl Element for Move {
    fn write(&self, w: &mut SaveWriter) {
        self.cell.write(w);
        for v in self.position.iter().chain(&self.rotation) {
            w.write_f32(*v);
        }
    }

    fn calculate_size(&self, _layout: &Layout) -> usize {
        3 + 6 * 4
    }
}

/// Body of a placed reference. Blocks appear in field order, each only when its flag is set.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceBody {
    pub form_flags: Option<FormFlags>,
    pub base_object: Option<RefId>,
    pub moved: Option<Move>,
    pub havok: Option<Vec<u8>>,
    pub scale: Option<f32>,
    /// Blocks this model does not break down, kept verbatim.
    pub rest: Vec<u8>,
}

impl ReferenceBody {
    fn read(r: &mut SaveReader<'_>, flags: ChangeFlags) -> Result<Self> {
        let form_flags = if flags.contains(ChangeFlags::FORM_FLAGS) {
            Some(FormFlags::read(r).element("form flags")?)
        } else {
            None
        };
        let base_object = if flags.contains(ChangeFlags::BASE_OBJECT) {
            Some(RefId::read(r).element("base object")?)
        } else {
            None
        };
        let moved = if flags.contains(ChangeFlags::MOVE) { Some(Move::read(r).element("move")?) } else { None };
        let havok = if flags.contains(ChangeFlags::HAVOK_MOVE) {
            let len = VsVal::read(r)?.value() as usize;
            Some(r.read_bytes(len).element("havok data")?.to_vec())
        } else {
            None
        };
        let scale = if flags.contains(ChangeFlags::SCALE) { Some(r.read_f32()?) } else { None };
        let rest = r.rest().to_vec();
        Ok(Self { form_flags, base_object, moved, havok, scale, rest })
    }

    /// The change flags that describe exactly the blocks present.
    pub fn required_flags(&self) -> ChangeFlags {
        let mut f = ChangeFlags::empty();
        f.set(ChangeFlags::FORM_FLAGS, self.form_flags.is_some());
        f.set(ChangeFlags::BASE_OBJECT, self.base_object.is_some());
        f.set(ChangeFlags::MOVE, self.moved.is_some());
        f.set(ChangeFlags::HAVOK_MOVE, self.havok.is_some());
        f.set(ChangeFlags::SCALE, self.scale.is_some());
        f
    }
}

/// Writes a block length as a `VsVal`, rejecting lengths it cannot encode.
fn write_vsval_len(w: &mut SaveWriter, n: usize) {
    match VsVal::try_from(n) {
        Ok(len) => len.write(w),
        Err(err) => w.reject(err),
    }
}

/// Encoded size of a block length; a rejected length counts as the widest prefix.
fn vsval_len_size(n: usize) -> usize {
    VsVal::try_from(n).map_or(3, VsVal::width)
}

impl Element for ReferenceBody {
    fn write(&self, w: &mut SaveWriter) {
        self.form_flags.write(w);
        self.base_object.write(w);
        self.moved.write(w);
        if let Some(havok) = &self.havok {
            write_vsval_len(w, havok.len());
            w.write_bytes(havok);
        }
        if let Some(scale) = self.scale {
            w.write_f32(scale);
        }
        w.write_bytes(&self.rest);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        self.form_flags.calculate_size(layout)
            + self.base_object.calculate_size(layout)
            + self.moved.calculate_size(layout)
            + self.havok.as_ref().map_or(0, |h| vsval_len_size(h.len()) + h.len())
            + self.scale.map_or(0, |_| 4)
            + self.rest.len()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormListBody {
    pub form_flags: Option<FormFlags>,
    pub added: Option<Vec<RefId>>,
    pub rest: Vec<u8>,
}

impl FormListBody {
    fn read(r: &mut SaveReader<'_>, flags: ChangeFlags) -> Result<Self> {
        let form_flags = if flags.contains(ChangeFlags::FORM_FLAGS) {
            Some(FormFlags::read(r).element("form flags")?)
        } else {
            None
        };
        let added = if flags.contains(ChangeFlags::ADDED_FORM) {
            let count = VsVal::read(r)?.value() as usize;
            Some(read_list(r, count, "added form", |r| Ok(RefId::read(r)?))?)
        } else {
            None
        };
        let rest = r.rest().to_vec();
        Ok(Self { form_flags, added, rest })
    }
}

impl Element for FormListBody {
    fn write(&self, w: &mut SaveWriter) {
        self.form_flags.write(w);
        if let Some(added) = &self.added {
            write_vsval_len(w, added.len());
            added.write(w);
        }
        w.write_bytes(&self.rest);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        self.form_flags.calculate_size(layout)
            + self.added.as_ref().map_or(0, |a| vsval_len_size(a.len()) + 3 * a.len())
            + self.rest.len()
    }
}

/// A decoded change form body.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeFormData {
    Reference(ReferenceBody),
    FormList(FormListBody),
    /// Kinds without a dedicated layout.
    Opaque(Vec<u8>),
}

impl ChangeFormData {
    pub fn read(r: &mut SaveReader<'_>, kind: ChangeFormKind, flags: ChangeFlags) -> Result<Self> {
        Ok(if kind.is_reference() {
            ChangeFormData::Reference(ReferenceBody::read(r, flags)?)
        } else if kind == ChangeFormKind::Flst {
            ChangeFormData::FormList(FormListBody::read(r, flags)?)
        } else {
            ChangeFormData::Opaque(r.rest().to_vec())
        })
    }
}

impl Element for ChangeFormData {
    fn write(&self, w: &mut SaveWriter) {
        match self {
            ChangeFormData::Reference(b) => b.write(w),
            ChangeFormData::FormList(b) => b.write(w),
            ChangeFormData::Opaque(bytes) => w.write_bytes(bytes),
        }
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        match self {
            ChangeFormData::Reference(b) => b.calculate_size(layout),
            ChangeFormData::FormList(b) => b.calculate_size(layout),
            ChangeFormData::Opaque(bytes) => bytes.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormatError;
    use crate::ids::RefIdKind;
    use crate::io::to_bytes;
    use pretty_assertions::assert_eq;

    fn rid(v: u32) -> RefId {
        RefId::new(RefIdKind::FormIndex, v).unwrap()
    }

    #[test]
    fn every_reference_flag_permutation() {
        let layout = Layout::default();
        let all = [
            ChangeFlags::FORM_FLAGS,
            ChangeFlags::BASE_OBJECT,
            ChangeFlags::MOVE,
            ChangeFlags::HAVOK_MOVE,
            ChangeFlags::SCALE,
        ];
        for mask in 0u32..(1 << all.len()) {
            let flags = all
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .fold(ChangeFlags::empty(), |acc, (_, f)| acc | *f);
            let body = ReferenceBody {
                form_flags: flags.contains(ChangeFlags::FORM_FLAGS).then_some(FormFlags { flags: 0x400, unknown: 0 }),
                base_object: flags.contains(ChangeFlags::BASE_OBJECT).then(|| rid(7)),
                moved: flags.contains(ChangeFlags::MOVE).then(|| Move {
                    cell: rid(2),
                    position: [1.0, -2.5, 300.0],
                    rotation: [0.0, 0.0, 1.5],
                }),
                havok: flags.contains(ChangeFlags::HAVOK_MOVE).then(|| vec![0x5A; 70]),
                scale: flags.contains(ChangeFlags::SCALE).then_some(1.25),
                rest: vec![9, 9, 9],
            };
            assert_eq!(body.required_flags(), flags);
            let data = ChangeFormData::Reference(body);
            let bytes = to_bytes(&data, layout).unwrap();
            assert_eq!(bytes.len(), data.calculate_size(&layout), "flags {flags:?}");
            let back = ChangeFormData::read(&mut SaveReader::new(&bytes, layout), ChangeFormKind::Achr, flags).unwrap();
            assert_eq!(back, data);
        }
    }

    #[test]
    fn form_list_added_forms() {
        let layout = Layout::default();
        let flags = ChangeFlags::FORM_FLAGS | ChangeFlags::ADDED_FORM;
        let data = ChangeFormData::FormList(FormListBody {
            form_flags: Some(FormFlags { flags: 0, unknown: 1 }),
            added: Some((1..=20).map(rid).collect()),
            rest: Vec::new(),
        });
        let bytes = to_bytes(&data, layout).unwrap();
        assert_eq!(bytes.len(), 6 + 1 + 60);
        let back = ChangeFormData::read(&mut SaveReader::new(&bytes, layout), ChangeFormKind::Flst, flags).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn havok_block_past_the_vsval_range_is_rejected() {
        let layout = Layout::default();
        let body = |len: usize| {
            ChangeFormData::Reference(ReferenceBody {
                form_flags: None,
                base_object: None,
                moved: None,
                havok: Some(vec![0; len]),
                scale: None,
                rest: Vec::new(),
            })
        };

        let err = to_bytes(&body(VsVal::MAX as usize + 1), layout).unwrap_err();
        assert_eq!(err, FormatError::VsValOverflow { value: VsVal::MAX + 1, max: VsVal::MAX });

        let longest = body(VsVal::MAX as usize);
        let bytes = to_bytes(&longest, layout).unwrap();
        assert_eq!(bytes.len(), 3 + VsVal::MAX as usize);
        assert_eq!(bytes.len(), longest.calculate_size(&layout));
    }

    #[test]
    fn truncated_move_block_names_the_block() {
        let layout = Layout::default();
        let err = ChangeFormData::read(&mut SaveReader::new(&[0, 0, 1, 0], layout), ChangeFormKind::Refr, ChangeFlags::MOVE)
            .unwrap_err();
        assert!(err.path().starts_with("move > "), "{}", err.path());
    }
}
