//! Records and groups.
//!
//! A compressed record keeps the bytes it was read with, so an untouched
//! record is written back bit for bit; [`Record::set_fields`] recompresses.

use std::borrow::Cow;

use resave_core::compress;
use resave_core::config::Layout;
use resave_core::error::{FormatError, ParseResultExt, Result};
use resave_core::io::{Element, SaveReader, SaveWriter};

use crate::code::RecordCode;
use crate::context::EspContext;
use crate::field::{fields_size, fields_to_bytes, read_fields, write_fields, Field};
use crate::header::{RecordFlags, RecordHeader};
use crate::vmad::Vmad;

/// The zlib stream of a compressed record and its declared inflated size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packed {
    pub size: u32,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub code: RecordCode,
    pub header: RecordHeader,
    fields: Vec<Field>,
    packed: Option<Packed>,
}

impl Record {
    /// An uncompressed record.
    pub fn new(code: RecordCode, mut header: RecordHeader, fields: Vec<Field>) -> Self {
        header.flags.remove(RecordFlags::COMPRESSED);
        Self { code, header, fields, packed: None }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn packed(&self) -> Option<&Packed> {
        self.packed.as_ref()
    }

    /// Replaces the field list, recompressing when the header says the record is
    /// compressed and dropping any old compressed body when it does not.
    pub fn set_fields(&mut self, fields: Vec<Field>, layout: Layout) -> std::result::Result<(), FormatError> {
        self.packed = if self.header.is_compressed() {
            let raw = fields_to_bytes(&fields, layout)?;
            Some(Packed { size: raw.len() as u32, data: compress::deflate(&raw)? })
        } else {
            None
        };
        self.fields = fields;
        Ok(())
    }

    pub fn field(&self, code: RecordCode) -> Option<&Field> {
        self.fields.iter().find(|f| f.code() == code)
    }

    pub fn editor_id(&self) -> Option<Cow<'_, str>> {
        self.fields.iter().find_map(Field::editor_id)
    }

    pub fn scripts(&self) -> Option<&Vmad> {
        self.fields.iter().find_map(|f| match f {
            Field::Scripts(v) => Some(v),
            _ => None,
        })
    }

    fn data_size(&self, layout: &Layout) -> usize {
        match &self.packed {
            Some(p) => 4 + p.data.len(),
            None => fields_size(&self.fields, layout),
        }
    }
}

impl Element for Record {
    fn write(&self, w: &mut SaveWriter) {
        let size = self.data_size(w.layout());
        w.write_bytes(self.code.as_bytes());
        w.write_u32(size as u32);
        self.header.write(w);
        match &self.packed {
            Some(p) => {
                w.write_u32(p.size);
                w.write_bytes(&p.data);
            }
            None => write_fields(&self.fields, w),
        }
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        8 + RecordHeader::SIZE + self.data_size(layout)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub label: [u8; 4],
    pub group_type: i32,
    pub stamp: u16,
    pub unknown1: u16,
    pub version: u16,
    pub unknown2: u16,
    pub entries: Vec<Entry>,
}

impl Group {
    /// Code, size and the rest of the group header.
    pub const HEADER_SIZE: usize = 24;

    /// Every record in this group and its subgroups, depth first.
    pub fn records(&self) -> Box<dyn Iterator<Item = &Record> + '_> {
        Box::new(self.entries.iter().flat_map(Entry::records))
    }
}

impl Element for Group {
    fn write(&self, w: &mut SaveWriter) {
        let size = self.calculate_size(w.layout());
        w.write_bytes(RecordCode::GRUP.as_bytes());
        w.write_u32(size as u32);
        w.write_bytes(&self.label);
        w.write_i32(self.group_type);
        w.write_u16(self.stamp);
        w.write_u16(self.unknown1);
        w.write_u16(self.version);
        w.write_u16(self.unknown2);
        self.entries.write(w);
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        Self::HEADER_SIZE + self.entries.calculate_size(layout)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Entry {
    Record(Record),
    Group(Group),
}

impl Entry {
    pub fn read(r: &mut SaveReader<'_>, ctx: &EspContext<'_>) -> Result<Self> {
        let offset = r.position();
        let code = RecordCode::read(r)?;
        let size = r.read_u32()? as usize;
        if code == RecordCode::GRUP {
            read_group(r, size, offset, ctx).map(Entry::Group).element("GRUP")
        } else {
            read_record(r, code, size, ctx).map(Entry::Record).with_element(|| format!("{code} record at {offset:#x}"))
        }
    }

    pub fn records(&self) -> Box<dyn Iterator<Item = &Record> + '_> {
        match self {
            Entry::Record(rec) => Box::new(std::iter::once(rec)),
            Entry::Group(g) => g.records(),
        }
    }
}

impl Element for Entry {
    fn write(&self, w: &mut SaveWriter) {
        match self {
            Entry::Record(r) => r.write(w),
            Entry::Group(g) => g.write(w),
        }
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        match self {
            Entry::Record(r) => r.calculate_size(layout),
            Entry::Group(g) => g.calculate_size(layout),
        }
    }
}

fn read_group(r: &mut SaveReader<'_>, size: usize, offset: usize, ctx: &EspContext<'_>) -> Result<Group> {
    let Some(inner) = size.checked_sub(Group::HEADER_SIZE) else {
        return Err(FormatError::OutOfRange {
            what: "group size",
            value: size as i64,
            min: Group::HEADER_SIZE as i64,
            max: u32::MAX as i64,
            offset,
        }
        .into());
    };
    let label = r.read_array()?;
    let group_type = r.read_i32()?;
    let stamp = r.read_u16()?;
    let unknown1 = r.read_u16()?;
    let version = r.read_u16()?;
    let unknown2 = r.read_u16()?;

    let mut body = r.take(inner)?;
    let mut entries = Vec::new();
    while !body.is_empty() {
        let index = entries.len();
        entries.push(Entry::read(&mut body, ctx).with_element(|| format!("entry {index}"))?);
    }
    Ok(Group { label, group_type, stamp, unknown1, version, unknown2, entries })
}

/// Reads the header and fields of a non-group record whose code and size are already consumed.
pub(crate) fn read_record(r: &mut SaveReader<'_>, code: RecordCode, size: usize, ctx: &EspContext<'_>) -> Result<Record> {
    let header = RecordHeader::read(r, ctx)?;
    let mut body = r.take(size)?;
    if !header.is_compressed() {
        let fields = read_fields(code, &mut body, ctx)?;
        return Ok(Record { code, header, fields, packed: None });
    }

    let declared = body.read_u32()?;
    let at = body.position();
    let data = body.rest().to_vec();
    let inflated = compress::inflate(&data, declared as usize, at)?;
    let mut inner = body.detached(&inflated);
    let fields = read_fields(code, &mut inner, ctx).element("inflated fields")?;
    Ok(Record { code, header, fields, packed: Some(Packed { size: declared, data }) })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use resave_core::ids::FormId;
    use resave_core::io::to_bytes;
    use resave_core::plugin::PluginInfo;

    use super::*;

    fn header(flags: RecordFlags, raw_id: u32) -> RecordHeader {
        RecordHeader { flags, raw_id, form_id: FormId::unowned(raw_id), revision: 0, version: 44, unknown: 0 }
    }

    fn reread(bytes: &[u8]) -> Entry {
        let plugins = PluginInfo::from_names(&["Mod.esp"], &[]);
        let ctx = EspContext::new("Mod.esp", &[] as &[&str], &plugins, false);
        let mut r = SaveReader::new(bytes, Layout::default());
        let entry = Entry::read(&mut r, &ctx).unwrap();
        assert!(r.is_empty());
        entry
    }

    #[test]
    fn group_size_counts_its_header() {
        let rec = Record::new(RecordCode::QUST, header(RecordFlags::empty(), 0x801), vec![Field::EditorId(b"Q".to_vec())]);
        let group = Group {
            label: *b"QUST",
            group_type: 0,
            stamp: 0,
            unknown1: 0,
            version: 0,
            unknown2: 0,
            entries: vec![Entry::Record(rec)],
        };
        let bytes = to_bytes(&group, Layout::default()).unwrap();
        // 24 + 24 + 8
        assert_eq!(bytes.len(), 56);
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 56);

        let Entry::Group(back) = reread(&bytes) else { panic!("expected a group") };
        assert_eq!(back.records().count(), 1);
        assert_eq!(back.records().next().unwrap().editor_id().as_deref(), Some("Q"));
        assert_eq!(to_bytes(&back, Layout::default()).unwrap(), bytes);
    }

    #[test]
    fn set_fields_recompresses() {
        let mut rec = Record::new(RecordCode::QUST, header(RecordFlags::empty(), 0x802), Vec::new());
        rec.header.flags.insert(RecordFlags::COMPRESSED);
        rec.set_fields(vec![Field::EditorId(b"Packed".to_vec())], Layout::default()).unwrap();
        assert_eq!(rec.packed().unwrap().size, 13);

        let bytes = to_bytes(&rec, Layout::default()).unwrap();
        assert_eq!(bytes.len(), rec.calculate_size(&Layout::default()));
        let Entry::Record(back) = reread(&bytes) else { panic!("expected a record") };
        assert_eq!(back.editor_id().as_deref(), Some("Packed"));
        assert_eq!(back.fields(), rec.fields());
        assert_eq!(back.packed(), rec.packed());
    }

    #[test]
    fn clearing_the_compressed_flag_writes_plain_fields() {
        let mut rec = Record::new(RecordCode::QUST, header(RecordFlags::empty(), 0x803), Vec::new());
        rec.header.flags.insert(RecordFlags::COMPRESSED);
        rec.set_fields(vec![Field::EditorId(b"First".to_vec())], Layout::default()).unwrap();
        assert!(rec.packed().is_some());

        rec.header.flags.remove(RecordFlags::COMPRESSED);
        let fields = vec![Field::EditorId(b"Second".to_vec()), Field::Opaque { code: RecordCode::DATA, data: vec![1, 2] }];
        rec.set_fields(fields.clone(), Layout::default()).unwrap();
        assert!(rec.packed().is_none());

        let bytes = to_bytes(&rec, Layout::default()).unwrap();
        assert_eq!(bytes.len(), rec.calculate_size(&Layout::default()));
        let Entry::Record(back) = reread(&bytes) else { panic!("expected a record") };
        assert!(!back.header.is_compressed());
        assert_eq!(back.fields(), &fields[..]);
        assert_eq!(back.editor_id().as_deref(), Some("Second"));
    }

    #[test]
    fn short_group_is_rejected() {
        let mut b = b"GRUP".to_vec();
        b.extend_from_slice(&8u32.to_le_bytes());
        b.extend_from_slice(&[0; 16]);
        let plugins = PluginInfo::from_names(&["Mod.esp"], &[]);
        let ctx = EspContext::new("Mod.esp", &[] as &[&str], &plugins, false);
        let err = Entry::read(&mut SaveReader::new(&b, Layout::default()), &ctx).unwrap_err();
        assert!(matches!(err.root(), FormatError::OutOfRange { what: "group size", value: 8, .. }));
    }
}
