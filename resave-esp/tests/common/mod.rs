//! Byte builders for plugin fixtures.

#![allow(dead_code)]

pub fn field(code: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut b = code.to_vec();
    b.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    b.extend_from_slice(payload);
    b
}

/// An `XXXX` marker announcing `payload`, then the field itself with `shadow` as its own size.
pub fn big_field(code: &[u8; 4], shadow: u16, payload: &[u8]) -> Vec<u8> {
    let mut b = b"XXXX".to_vec();
    b.extend_from_slice(&4u16.to_le_bytes());
    b.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    b.extend_from_slice(code);
    b.extend_from_slice(&shadow.to_le_bytes());
    b.extend_from_slice(payload);
    b
}

pub fn record(code: &[u8; 4], flags: u32, id: u32, data: &[u8]) -> Vec<u8> {
    let mut b = code.to_vec();
    b.extend_from_slice(&(data.len() as u32).to_le_bytes());
    b.extend_from_slice(&flags.to_le_bytes());
    b.extend_from_slice(&id.to_le_bytes());
    b.extend_from_slice(&0u32.to_le_bytes());
    b.extend_from_slice(&44u16.to_le_bytes());
    b.extend_from_slice(&0u16.to_le_bytes());
    b.extend_from_slice(data);
    b
}

pub fn group(label: &[u8; 4], entries: &[u8]) -> Vec<u8> {
    let mut b = b"GRUP".to_vec();
    b.extend_from_slice(&(24 + entries.len() as u32).to_le_bytes());
    b.extend_from_slice(label);
    b.extend_from_slice(&0i32.to_le_bytes());
    b.extend_from_slice(&[0; 8]);
    b.extend_from_slice(entries);
    b
}

pub fn wstring(s: &str) -> Vec<u8> {
    let mut b = (s.len() as u16).to_le_bytes().to_vec();
    b.extend_from_slice(s.as_bytes());
    b
}

/// Version 5 attachment with one script holding one object property (id-last layout).
pub fn vmad(script: &str, object_id: u32) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&5i16.to_le_bytes());
    b.extend_from_slice(&2i16.to_le_bytes());
    b.extend_from_slice(&1u16.to_le_bytes());
    b.extend(wstring(script));
    b.push(0);
    b.extend_from_slice(&1u16.to_le_bytes());
    b.extend(wstring("Target"));
    b.extend_from_slice(&[1, 1]);
    b.extend_from_slice(&0u16.to_le_bytes());
    b.extend_from_slice(&(-1i16).to_le_bytes());
    b.extend_from_slice(&object_id.to_le_bytes());
    b
}

pub fn tes4(flags: u32, masters: &[&str]) -> Vec<u8> {
    let hedr = hex::decode("9a99d93f0300000000080000").unwrap();
    let mut data = field(b"HEDR", &hedr);
    for m in masters {
        let mut name = m.as_bytes().to_vec();
        name.push(0);
        data.extend(field(b"MAST", &name));
        data.extend(field(b"DATA", &0u64.to_le_bytes()));
    }
    record(b"TES4", flags, 0, &data)
}
