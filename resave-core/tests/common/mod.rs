//! Builds small but complete VM snapshots in memory.

#![allow(dead_code)]

use resave_core::config::{Game, Layout, StringIndexWidth};
use resave_core::ids::{Handle, RefId, RefIdKind};
use resave_core::papyrus::*;
use resave_core::strings::{StringTable, TString};
use resave_core::variable::{VarType, Variable};

pub struct Fixture {
    pub layout: Layout,
    pub strings: StringTable,
}

impl Fixture {
    pub fn new(game: Game) -> Self {
        Self { layout: Layout::new(game, StringIndexWidth::Long), strings: StringTable::new() }
    }

    pub fn s(&mut self, value: &str) -> TString {
        self.strings.intern(value)
    }

    pub fn h(&self, raw: u64) -> Handle {
        Handle::new(raw, self.layout.handle_width())
    }

    pub fn ident(&mut self, name: &str) -> Parameter {
        Parameter::Ident(self.s(name))
    }

    pub fn member(&mut self, name: &str, ty: &str) -> MemberDesc {
        MemberDesc { name: self.s(name), ty: self.s(ty) }
    }

    /// A non-native frame of `script` running `count = count + 1` then returning.
    pub fn frame(&mut self, script: &str, owner: Handle) -> StackFrame {
        let code = vec![
            Instruction::new(Opcode::IAdd, vec![self.ident("::temp0"), self.ident("count"), Parameter::Int(1)]),
            Instruction::new(Opcode::Assign, vec![self.ident("count"), self.ident("::temp0")]),
            Instruction::new(
                Opcode::CallMethod,
                vec![
                    self.ident("Notify"),
                    self.ident("self"),
                    self.ident("::nonevar"),
                    Parameter::Int(1),
                    self.ident("count"),
                ],
            ),
            Instruction::new(Opcode::Return, vec![Parameter::Null]),
        ];
        StackFrame {
            flag: 0,
            fn_type: VarType::Null,
            script_name: self.s(script),
            base_name: self.s(script),
            event: self.s("OnUpdate"),
            status: Some(self.s("")),
            opcode_major: 3,
            opcode_minor: 2,
            return_type: self.s("None"),
            docstring: self.s(""),
            user_flags: 0,
            fn_flags: 0,
            params: vec![self.member("akCaster", "Actor")],
            locals: vec![self.member("count", "Int"), self.member("::temp0", "Int")],
            code,
            ptr: 1,
            owner: Variable::Ref { ty: self.s(script), handle: owner },
            variables: vec![Variable::Null(0), Variable::Int(41), Variable::Int(0)],
        }
    }

    /// One script, one instance with data, one array, one running thread.
    pub fn papyrus(&mut self) -> Papyrus {
        let instance = self.h(0x1000);
        let array = self.h(0x2000);
        let thread = self.h(0x3000);

        let scripts = vec![
            Script { name: self.s("CounterScript"), supertype: self.s("Form"), members: vec![self.member("::count_var", "Int")] },
            Script { name: self.s("OrphanScript"), supertype: self.s(""), members: Vec::new() },
        ];
        let instances = vec![ScriptInstance {
            handle: instance,
            script: self.s("CounterScript"),
            unknown_bits: 0,
            unknown_short: -1,
            ref_id: RefId::new(RefIdKind::Default, 0x14).unwrap(),
            unknown_byte: 0,
            extra: None,
        }];
        let arrays = vec![ArrayInfo { handle: array, elem: VarType::IntArray, ty: None, length: 2 }];
        let frame = self.frame("CounterScript", instance);

        Papyrus {
            version: 4,
            reserved: 0,
            scripts,
            struct_defs: Vec::new(),
            instances,
            references: Vec::new(),
            structs: Vec::new(),
            arrays,
            runtime: 123_456,
            thread_headers: vec![ThreadHeader { handle: thread, kind: 0 }],
            instance_data: vec![ObjectData {
                handle: instance,
                flag: 0x04,
                ty: self.s("CounterScript"),
                unknown1: 0,
                unknown2: Some(7),
                members: vec![Variable::Array { ty_tag: VarType::IntArray, ty: None, handle: array }],
            }],
            reference_data: Vec::new(),
            struct_data: Vec::new(),
            array_data: vec![ArrayData { handle: array, elements: vec![Variable::Int(1), Variable::Int(2)] }],
            threads: vec![ActiveThread {
                handle: thread,
                major: 3,
                minor: 2,
                attached: Variable::Null(0),
                flag: 0x01,
                unknown_byte: 0,
                unknown: Some(0xABCD),
                attachment: Attachment::Object(RefId::new(RefIdKind::Default, 0x14).unwrap()),
                frames: vec![frame],
            }],
            messages: vec![FunctionMessage { kind: 1, handle: Some(thread), flag: 0, data: None }],
            suspended: vec![SuspendedStack {
                handle: self.h(0x3001),
                flag: 1,
                data: Some(MessageData {
                    unknown: 0,
                    script: self.s("CounterScript"),
                    event: self.s("OnUpdate"),
                    receiver: Variable::Ref { ty: self.s("CounterScript"), handle: instance },
                    args: vec![Variable::Float(0.25)],
                }),
            }],
            suspended_later: Vec::new(),
            trailing: vec![0xEE, 0xFF],
            strings: self.strings.clone(),
        }
    }
}
