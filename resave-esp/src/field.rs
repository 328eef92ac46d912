//! Record fields: a four-character code, a 16-bit size and a payload.
//!
//! A payload longer than `u16::MAX` is announced by an `XXXX` field whose
//! 4-byte payload is the true size of the field right after it. The marker is
//! kept in the field list as [`Field::Big`] and its size is recomputed on write.

use std::borrow::Cow;

use resave_core::config::Layout;
use resave_core::error::{FormatError, ParseResultExt, Result};
use resave_core::ids::FormId;
use resave_core::io::{Element, SaveReader, SaveWriter};
use resave_nls::{AutoDecoder, TextDecoder};

use crate::code::RecordCode;
use crate::context::EspContext;
use crate::vmad::Vmad;

/// Display name payload: inline text, or a string-table id in localized plugins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FullName {
    Text(Vec<u8>),
    Localized(u32),
}

impl FullName {
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self {
            FullName::Text(bytes) => Some(AutoDecoder.decode_cstr(bytes)),
            FullName::Localized(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Field {
    /// `XXXX`: `size` is the payload length of the following field as read;
    /// `shadow_size` is the 16-bit size that field carried on disk.
    Big { size: u32, shadow_size: u16 },
    /// `EDID`, without its terminator.
    EditorId(Vec<u8>),
    FullName(FullName),
    /// `NAME` of a placed reference or actor: the base form.
    BaseObject { raw_id: u32, form_id: FormId },
    Scripts(Vmad),
    Opaque { code: RecordCode, data: Vec<u8> },
}

impl Field {
    pub fn code(&self) -> RecordCode {
        match self {
            Field::Big { .. } => RecordCode::XXXX,
            Field::EditorId(_) => RecordCode::EDID,
            Field::FullName(_) => RecordCode::FULL,
            Field::BaseObject { .. } => RecordCode::NAME,
            Field::Scripts(_) => RecordCode::VMAD,
            Field::Opaque { code, .. } => *code,
        }
    }

    pub fn editor_id(&self) -> Option<Cow<'_, str>> {
        match self {
            Field::EditorId(bytes) => Some(AutoDecoder.decode(bytes)),
            _ => None,
        }
    }

    fn payload_size(&self, layout: &Layout) -> usize {
        match self {
            Field::Big { .. } => 4,
            Field::EditorId(bytes) => bytes.len() + 1,
            Field::FullName(FullName::Text(bytes)) => bytes.len(),
            Field::FullName(FullName::Localized(_)) => 4,
            Field::BaseObject { .. } => 4,
            Field::Scripts(vmad) => vmad.calculate_size(layout),
            Field::Opaque { data, .. } => data.len(),
        }
    }

    fn write_payload(&self, w: &mut SaveWriter) {
        match self {
            Field::Big { .. } => {}
            Field::EditorId(bytes) => w.write_zstring(bytes),
            Field::FullName(FullName::Text(bytes)) => w.write_bytes(bytes),
            Field::FullName(FullName::Localized(id)) => w.write_u32(*id),
            Field::BaseObject { raw_id, .. } => w.write_u32(*raw_id),
            Field::Scripts(vmad) => vmad.write(w),
            Field::Opaque { data, .. } => w.write_bytes(data),
        }
    }
}

fn decode_payload(parent: RecordCode, code: RecordCode, r: &mut SaveReader<'_>, ctx: &EspContext<'_>) -> Result<Field> {
    let field = match code {
        RecordCode::EDID => {
            let bytes = r.read_zstring()?.to_vec();
            r.expect_end("EDID")?;
            Field::EditorId(bytes)
        }
        RecordCode::FULL if ctx.is_localized() => {
            let id = r.read_u32()?;
            r.expect_end("FULL")?;
            Field::FullName(FullName::Localized(id))
        }
        RecordCode::FULL => Field::FullName(FullName::Text(r.rest().to_vec())),
        RecordCode::NAME if parent == RecordCode::REFR || parent == RecordCode::ACHR => {
            let raw_id = r.read_u32()?;
            r.expect_end("NAME")?;
            Field::BaseObject { raw_id, form_id: ctx.remap(raw_id) }
        }
        RecordCode::VMAD => Field::Scripts(Vmad::read(r, parent, ctx)?),
        _ => Field::Opaque { code, data: r.rest().to_vec() },
    };
    Ok(field)
}

/// Reads one field, or an `XXXX` marker together with the field it sizes.
pub fn read_field(parent: RecordCode, r: &mut SaveReader<'_>, ctx: &EspContext<'_>) -> Result<Vec<Field>> {
    let offset = r.position();
    let code = RecordCode::read(r)?;
    let size = r.read_u16()?;

    if code != RecordCode::XXXX {
        let mut body = r.take(size as usize)?;
        let field = decode_payload(parent, code, &mut body, ctx).with_element(|| format!("{code} field"))?;
        return Ok(vec![field]);
    }

    if size != 4 {
        return Err(FormatError::SizeMismatch { what: "XXXX field", declared: 4, actual: size as usize, offset }.into());
    }
    let big = r.read_u32()?;
    let next = RecordCode::read(r)?;
    let shadow_size = r.read_u16()?;
    let mut body = r.take(big as usize)?;
    let field = decode_payload(parent, next, &mut body, ctx).with_element(|| format!("{next} field"))?;
    Ok(vec![Field::Big { size: big, shadow_size }, field])
}

/// Reads fields until `r` is exhausted.
pub fn read_fields(parent: RecordCode, r: &mut SaveReader<'_>, ctx: &EspContext<'_>) -> Result<Vec<Field>> {
    let mut fields = Vec::new();
    while !r.is_empty() {
        fields.extend(read_field(parent, r, ctx)?);
    }
    Ok(fields)
}

fn needs_big(len: usize) -> bool {
    len > u16::MAX as usize
}

pub fn write_fields(fields: &[Field], w: &mut SaveWriter) {
    let layout = *w.layout();
    let mut shadow: Option<u16> = None;
    for (i, field) in fields.iter().enumerate() {
        if let Field::Big { shadow_size, .. } = field {
            let next = fields.get(i + 1).map_or(0, |f| f.payload_size(&layout));
            w.write_bytes(RecordCode::XXXX.as_bytes());
            w.write_u16(4);
            w.write_u32(next as u32);
            shadow = Some(*shadow_size);
            continue;
        }

        let len = field.payload_size(&layout);
        let size = match shadow.take() {
            Some(s) => s,
            None if needs_big(len) => {
                w.write_bytes(RecordCode::XXXX.as_bytes());
                w.write_u16(4);
                w.write_u32(len as u32);
                0
            }
            None => len as u16,
        };
        w.write_bytes(field.code().as_bytes());
        w.write_u16(size);
        field.write_payload(w);
    }
}

pub fn fields_size(fields: &[Field], layout: &Layout) -> usize {
    let mut total = 0;
    let mut after_big = false;
    for field in fields {
        total += 6 + field.payload_size(layout);
        if matches!(field, Field::Big { .. }) {
            after_big = true;
            continue;
        }
        if !after_big && needs_big(field.payload_size(layout)) {
            total += 10;
        }
        after_big = false;
    }
    total
}

/// Serializes a field list on its own, as stored inside a compressed record.
pub fn fields_to_bytes(fields: &[Field], layout: Layout) -> std::result::Result<Vec<u8>, FormatError> {
    let mut w = SaveWriter::with_capacity(layout, fields_size(fields, &layout));
    write_fields(fields, &mut w);
    w.finish()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use resave_core::plugin::PluginInfo;

    use super::*;

    fn field(code: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut b = code.to_vec();
        b.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        b.extend_from_slice(payload);
        b
    }

    fn read_all(parent: RecordCode, bytes: &[u8], localized: bool) -> Vec<Field> {
        let plugins = PluginInfo::from_names(&["Skyrim.esm", "Mod.esp"], &[]);
        let ctx = EspContext::new("Mod.esp", &["Skyrim.esm"], &plugins, localized);
        let mut r = SaveReader::new(bytes, Layout::default());
        read_fields(parent, &mut r, &ctx).unwrap()
    }

    #[test]
    fn specialized_decoders() {
        let mut b = field(b"EDID", b"MyChest\0");
        b.extend(field(b"FULL", b"Chest"));
        b.extend(field(b"NAME", &0x0000_0014u32.to_le_bytes()));
        b.extend(field(b"DATA", &[1, 2, 3]));

        let fields = read_all(RecordCode::REFR, &b, false);
        assert_eq!(fields[0].editor_id().as_deref(), Some("MyChest"));
        assert_eq!(fields[1], Field::FullName(FullName::Text(b"Chest".to_vec())));
        let Field::BaseObject { raw_id, form_id } = fields[2] else {
            panic!("expected a base object, got {:?}", fields[2]);
        };
        assert_eq!(raw_id, 0x14);
        assert_eq!(form_id.raw(), 0x14);
        assert_eq!(fields[3], Field::Opaque { code: RecordCode::DATA, data: vec![1, 2, 3] });

        assert_eq!(fields_size(&fields, &Layout::default()), b.len());
        assert_eq!(fields_to_bytes(&fields, Layout::default()).unwrap(), b);
    }

    #[test]
    fn name_is_opaque_outside_references() {
        let b = field(b"NAME", &[1, 2, 3, 4]);
        let fields = read_all(RecordCode::QUST, &b, false);
        assert_eq!(fields[0].code(), RecordCode::NAME);
        assert!(matches!(fields[0], Field::Opaque { .. }));
    }

    #[test]
    fn localized_display_name_is_an_id() {
        let b = field(b"FULL", &0x0000_1234u32.to_le_bytes());
        let fields = read_all(RecordCode::QUST, &b, true);
        assert_eq!(fields, vec![Field::FullName(FullName::Localized(0x1234))]);
    }

    #[test]
    fn editor_id_must_be_one_terminated_string() {
        let plugins = PluginInfo::from_names(&["Mod.esp"], &[]);
        let ctx = EspContext::new("Mod.esp", &[] as &[&str], &plugins, false);
        let b = field(b"EDID", b"A\0B\0");
        let err = read_fields(RecordCode::QUST, &mut SaveReader::new(&b, Layout::default()), &ctx).unwrap_err();
        assert!(matches!(err.root(), FormatError::SizeMismatch { what: "EDID", .. }), "{err}");
    }

    #[test]
    fn long_payload_gets_an_overflow_marker() {
        let fields = vec![Field::Opaque { code: RecordCode::DATA, data: vec![7; 70_000] }];
        let bytes = fields_to_bytes(&fields, Layout::default()).unwrap();
        assert_eq!(bytes.len(), fields_size(&fields, &Layout::default()));
        assert_eq!(&bytes[..4], b"XXXX");
        assert_eq!(u32::from_le_bytes(bytes[6..10].try_into().unwrap()), 70_000);
        assert_eq!(&bytes[10..14], b"DATA");
        assert_eq!(&bytes[14..16], &[0, 0]);

        let back = read_all(RecordCode::QUST, &bytes, false);
        assert_eq!(back[0], Field::Big { size: 70_000, shadow_size: 0 });
        assert_eq!(back[1], fields[0]);
        assert_eq!(fields_to_bytes(&back, Layout::default()).unwrap(), bytes);
    }
}
