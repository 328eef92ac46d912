mod common;

use anyhow::Result;
use pretty_assertions::assert_eq;

use common::Fixture;
use resave_core::config::{Game, Layout, StringIndexWidth};
use resave_core::formid_table::FormIdTable;
use resave_core::ids::FormId;
use resave_core::io::to_bytes;
use resave_core::papyrus::{Instruction, Papyrus, StackFrame};
use resave_core::plugin::PluginInfo;
use resave_core::{Element, FormatError, LiveObject, Resolver, SaveReader};

fn roundtrip(p: &Papyrus, layout: Layout) -> Result<Papyrus> {
    let bytes = to_bytes(p, layout)?;
    assert_eq!(bytes.len(), p.calculate_size(&layout));
    let back = Papyrus::parse(&bytes, layout)?;
    assert_eq!(to_bytes(&back, layout)?, bytes);
    Ok(back)
}

#[test]
fn snapshot_roundtrips_for_every_edition() -> Result<()> {
    for game in [Game::SkyrimLe, Game::SkyrimSe, Game::Fallout4] {
        let mut fx = Fixture::new(game);
        let p = fx.papyrus();
        let back = roundtrip(&p, fx.layout)?;
        assert_eq!(back, p);
    }
    Ok(())
}

#[test]
fn short_string_indices() -> Result<()> {
    let mut fx = Fixture::new(Game::SkyrimLe);
    fx.layout = Layout::new(Game::SkyrimLe, StringIndexWidth::Short);
    let p = fx.papyrus();
    assert_eq!(roundtrip(&p, fx.layout)?, p);
    Ok(())
}

#[test]
fn frame_size_matches_write() {
    let mut fx = Fixture::new(Game::SkyrimSe);
    let owner = fx.h(1);
    let mut frame = fx.frame("CounterScript", owner);
    for status in [true, false] {
        if !status {
            frame.flag = 0x01;
            frame.status = None;
        }
        let bytes = to_bytes(&frame, fx.layout).unwrap();
        assert_eq!(bytes.len(), frame.calculate_size(&fx.layout));
        let back = StackFrame::read(&mut SaveReader::new(&bytes, fx.layout), &fx.strings).unwrap();
        assert_eq!(back, frame);
    }
}

#[test]
fn zeroing_keeps_the_frame_size_and_stays_readable() -> Result<()> {
    let mut fx = Fixture::new(Game::SkyrimSe);
    let owner = fx.h(1);
    let mut frame = fx.frame("CounterScript", owner);
    let original_size = frame.calculate_size(&fx.layout);
    let first_width = frame.code[0].calculate_size(&fx.layout);
    let code_bytes: usize = frame.code.iter().map(|i| i.calculate_size(&fx.layout)).sum();

    frame.zero_instructions(&fx.layout)?;
    assert_eq!(frame.calculate_size(&fx.layout), original_size);
    assert_eq!(frame.code.len(), code_bytes);
    assert!(frame.code.iter().all(|i| *i == Instruction::nop()));
    // pointer was on the second instruction
    assert_eq!(frame.ptr as usize, first_width);

    let once = frame.clone();
    frame.zero_instructions(&fx.layout)?;
    assert_eq!(frame, once);

    let bytes = to_bytes(&frame, fx.layout)?;
    assert_eq!(bytes.len(), original_size);
    let back = StackFrame::read(&mut SaveReader::new(&bytes, fx.layout), &fx.strings)?;
    assert!(back.is_zeroed());
    assert_eq!(back, frame);
    Ok(())
}

#[test]
fn zeroing_with_short_string_indices_keeps_the_size() -> Result<()> {
    let mut fx = Fixture::new(Game::SkyrimLe);
    fx.layout = Layout::new(Game::SkyrimLe, StringIndexWidth::Short);
    let owner = fx.h(1);
    let mut frame = fx.frame("CounterScript", owner);
    let original_size = frame.calculate_size(&fx.layout);
    frame.zero_instructions(&fx.layout)?;
    assert_eq!(frame.calculate_size(&fx.layout), original_size);
    assert_eq!(to_bytes(&frame, fx.layout)?.len(), original_size);
    Ok(())
}

#[test]
fn zeroing_code_too_long_for_the_count_is_refused() {
    let mut fx = Fixture::new(Game::SkyrimSe);
    let owner = fx.h(1);
    let mut frame = fx.frame("CounterScript", owner);
    let call = frame.code[2].clone();
    frame.code = vec![call; 3000];
    let before = frame.clone();

    let err = frame.zero_instructions(&fx.layout).unwrap_err();
    assert!(matches!(err, FormatError::OutOfRange { what: "zeroed instruction count", .. }));
    assert_eq!(frame, before);
}

#[test]
fn terminate_thread_zeroes_every_frame() -> Result<()> {
    let mut fx = Fixture::new(Game::SkyrimSe);
    let mut p = fx.papyrus();
    let thread = p.thread_headers[0].handle;
    assert!(!p.thread(thread).unwrap().is_terminated());
    let size = p.calculate_size(&fx.layout);
    assert!(p.terminate_thread(thread, &fx.layout)?);
    assert!(p.thread(thread).unwrap().is_terminated());
    assert_eq!(p.calculate_size(&fx.layout), size);
    assert!(!p.terminate_thread(fx.h(0xDEAD), &fx.layout)?);
    roundtrip(&p, fx.layout)?;
    Ok(())
}

#[test]
fn disassembly_folds_temporaries_and_marks_the_pointer() {
    let mut fx = Fixture::new(Game::SkyrimSe);
    let owner = fx.h(1);
    let frame = fx.frame("CounterScript", owner);
    let d = frame.disassemble().unwrap();
    let text: Vec<_> = d.lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(text, vec!["count = count + 1", "self.Notify(count)", "return None"]);
    assert_eq!(d.current, Some(0));
    assert!(d.to_string().starts_with("==>    1: count = count + 1"));
}

#[test]
fn instruction_pointer_past_the_code_fails_closed() {
    let mut fx = Fixture::new(Game::SkyrimSe);
    let owner = fx.h(1);
    let mut frame = fx.frame("CounterScript", owner);
    frame.ptr = 4;
    assert_eq!(frame.disassemble().unwrap_err(), FormatError::InstructionPointer { ptr: 4, len: 4 });
}

#[test]
fn negative_instruction_pointer_is_rejected() {
    let mut fx = Fixture::new(Game::SkyrimSe);
    let owner = fx.h(1);
    let frame = fx.frame("CounterScript", owner);
    let mut bytes = to_bytes(&frame, fx.layout).unwrap();
    // The pointer sits right after the code, before the owner variable and the three locals.
    let tail = frame.owner.calculate_size(&fx.layout) + frame.variables.calculate_size(&fx.layout);
    let at = bytes.len() - tail - 4;
    bytes[at..at + 4].copy_from_slice(&(-1i32).to_le_bytes());
    let err = StackFrame::read(&mut SaveReader::new(&bytes, fx.layout), &fx.strings).unwrap_err();
    assert!(matches!(err.root(), FormatError::OutOfRange { what: "instruction pointer", value: -1, .. }));
}

#[test]
fn data_block_for_unknown_handle_is_an_error() {
    let mut fx = Fixture::new(Game::SkyrimSe);
    let mut p = fx.papyrus();
    p.array_data[0].handle = fx.h(0x9999);
    let bytes = to_bytes(&p, fx.layout).unwrap();
    let err = Papyrus::parse(&bytes, fx.layout).unwrap_err();
    assert!(matches!(err.root(), FormatError::UnknownHandle { what: "array data", .. }), "{}", err.path());
    assert!(err.path().starts_with("Papyrus > [0/1] > array data > "), "{}", err.path());
}

#[test]
fn resolver_links_threads_instances_and_plugins() {
    let mut fx = Fixture::new(Game::SkyrimSe);
    let p = fx.papyrus();
    let plugins = PluginInfo::from_names(&["Skyrim.esm", "Update.esm"], &[]);
    let form_ids = FormIdTable::new(vec![FormId(0x0100_0D62)]);
    let resolver = Resolver::new(&p, &plugins, &form_ids);

    let thread = &p.threads[0];
    match resolver.thread_owner(thread) {
        Some(LiveObject::Instance { header, data }) => {
            assert_eq!(header.script.as_str(), "CounterScript");
            assert_eq!(data.map(|d| d.unknown2), Some(Some(7)));
        }
        other => panic!("unexpected owner {other:?}"),
    }

    match resolver.find_by_id(p.arrays[0].handle) {
        Some(LiveObject::Array { data: Some(data), .. }) => assert_eq!(data.elements.len(), 2),
        other => panic!("unexpected array {other:?}"),
    }

    match resolver.resolve_reference(p.instances[0].ref_id) {
        Some(LiveObject::Plugin(plugin)) => assert_eq!(plugin.name(), "Skyrim.esm"),
        other => panic!("unexpected reference {other:?}"),
    }
    let indexed = resaved_ref(1);
    assert_eq!(resolver.form_id_of(indexed), Some(FormId(0x0100_0D62)));
    assert!(matches!(resolver.resolve_reference(indexed), Some(LiveObject::Plugin(pl)) if pl.name() == "Update.esm"));
    assert!(resolver.resolve_reference(resaved_ref(2)).is_none());

    assert!(!resolver.is_frame_undefined(&thread.frames[0]));
    let report = resolver.undefined_elements();
    assert_eq!(report.scripts, vec!["OrphanScript".to_string()]);
    assert!(report.instances.is_empty());
    assert!(report.threads.is_empty());
}

fn resaved_ref(index: u32) -> resave_core::ids::RefId {
    resave_core::ids::RefId::new(resave_core::ids::RefIdKind::FormIndex, index).unwrap()
}

#[test]
fn frames_of_unknown_scripts_are_undefined() {
    let mut fx = Fixture::new(Game::SkyrimSe);
    let mut p = fx.papyrus();
    let missing = fx.s("GoneScript");
    p.threads[0].frames[0].script_name = missing;
    p.strings = fx.strings.clone();
    let plugins = PluginInfo::default();
    let form_ids = FormIdTable::default();
    let resolver = Resolver::new(&p, &plugins, &form_ids);
    assert!(resolver.is_frame_undefined(&p.threads[0].frames[0]));
    assert_eq!(resolver.undefined_elements().threads, vec![p.threads[0].handle]);
}
