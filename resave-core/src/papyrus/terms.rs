//! Readable reconstruction of a frame's code.
//!
//! Operations whose destination is a compiler temporary are folded into the
//! operand that later consumes the temporary, so `iadd ::temp0, a, 1` followed by
//! `assign x, ::temp0` reads as `x = a + 1`. The binary form is never affected.

use std::collections::HashMap;

use itertools::Itertools;

use super::opcode::{Instruction, Opcode, Parameter};

/// One line of reconstructed output, tagged with the index of the instruction that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub index: usize,
    pub text: String,
}

/// `types` maps lowercased variable names to their declared types.
pub fn reconstruct(code: &[Instruction], types: &HashMap<String, String>) -> Vec<Line> {
    let mut terms: HashMap<String, String> = HashMap::new();
    let mut out = Vec::new();

    for (index, inst) in code.iter().enumerate() {
        let mut operand = |p: &Parameter| -> String {
            match p.ident() {
                Some(name) if p.is_temp() => terms
                    .remove(&name.as_str().to_lowercase())
                    .unwrap_or_else(|| p.source_text()),
                _ => p.source_text(),
            }
        };

        let Some((dest, expr)) = fold(inst, &mut operand, types) else {
            let args = inst.params.iter().map(&mut operand).join(", ");
            let text = if args.is_empty() {
                inst.opcode.mnemonic().to_string()
            } else {
                format!("{} {}", inst.opcode.mnemonic(), args)
            };
            out.push(Line { index, text });
            continue;
        };

        match dest {
            Some(d) if d.is_temp() => {
                if let Some(name) = d.ident() {
                    terms.insert(name.as_str().to_lowercase(), expr);
                }
            }
            Some(d) if d.is_none_var() => out.push(Line { index, text: strip_parens(expr) }),
            Some(d) => out.push(Line { index, text: format!("{} = {}", d.source_text(), strip_parens(expr)) }),
            None => out.push(Line { index, text: strip_parens(expr) }),
        }
    }
    out
}

fn strip_parens(expr: String) -> String {
    match expr.strip_prefix('(').and_then(|e| e.strip_suffix(')')) {
        Some(inner) if balanced(inner) => inner.to_string(),
        _ => expr,
    }
}

fn balanced(s: &str) -> bool {
    let mut depth = 0i32;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Returns the destination operand and the folded expression, or `None` for
/// instructions that are always printed literally (jumps, stores, returns).
fn fold<'a>(
    inst: &'a Instruction,
    operand: &mut impl FnMut(&Parameter) -> String,
    types: &HashMap<String, String>,
) -> Option<(Option<&'a Parameter>, String)> {
    use Opcode::*;
    let p = &inst.params;
    let arg = |i: usize| p.get(i);
    let mut text = |i: usize| arg(i).map(&mut *operand).unwrap_or_default();
    let call_args = |operand: &mut dyn FnMut(&Parameter) -> String| inst.variadic_args().iter().map(operand).join(", ");

    let binary = |op: &str, text: &mut dyn FnMut(usize) -> String| {
        let lhs = text(1);
        let rhs = text(2);
        format!("({lhs} {op} {rhs})")
    };

    let folded = match inst.opcode {
        IAdd | FAdd | StrCat => (arg(0), binary("+", &mut text)),
        ISub | FSub => (arg(0), binary("-", &mut text)),
        IMul | FMul => (arg(0), binary("*", &mut text)),
        IDiv | FDiv => (arg(0), binary("/", &mut text)),
        IMod => (arg(0), binary("%", &mut text)),
        CmpEq => (arg(0), binary("==", &mut text)),
        CmpLt => (arg(0), binary("<", &mut text)),
        CmpLe => (arg(0), binary("<=", &mut text)),
        CmpGt => (arg(0), binary(">", &mut text)),
        CmpGe => (arg(0), binary(">=", &mut text)),
        Not => (arg(0), format!("!{}", text(1))),
        INeg | FNeg => (arg(0), format!("-{}", text(1))),
        Assign => (arg(0), text(1)),
        Cast => {
            let target = arg(0).and_then(|d| type_of(d, types)).unwrap_or("?");
            (arg(0), format!("({} as {target})", text(1)))
        }
        CallMethod => {
            let name = text(0);
            let receiver = text(1);
            let args = call_args(operand);
            (arg(2), format!("{receiver}.{name}({args})"))
        }
        CallParent => {
            let name = text(0);
            let args = call_args(operand);
            (arg(1), format!("parent.{name}({args})"))
        }
        CallStatic => {
            let class = text(0);
            let name = text(1);
            let args = call_args(operand);
            (arg(2), format!("{class}.{name}({args})"))
        }
        PropGet => {
            let prop = text(0);
            (arg(2), format!("{}.{prop}", text(1)))
        }
        ArrayCreate => {
            let elem = arg(0)
                .and_then(|d| type_of(d, types))
                .map(|t| t.trim_end_matches("[]").to_string())
                .unwrap_or_else(|| "?".to_string());
            (arg(0), format!("new {elem}[{}]", text(1)))
        }
        ArrayLength => (arg(0), format!("{}.length", text(1))),
        ArrayGetElement => {
            let array = text(1);
            (arg(0), format!("{array}[{}]", text(2)))
        }
        ArrayFindElement | ArrayRFindElement => {
            let array = text(0);
            let value = text(2);
            let start = text(3);
            let method = if inst.opcode == ArrayFindElement { "find" } else { "rfind" };
            (arg(1), format!("{array}.{method}({value}, {start})"))
        }
        Is => {
            let object = text(1);
            (arg(0), format!("({object} is {})", text(2)))
        }
        StructCreate => {
            let ty = arg(0).and_then(|d| type_of(d, types)).unwrap_or("?");
            (arg(0), format!("new {ty}"))
        }
        StructGet => {
            let object = text(1);
            (arg(0), format!("{object}.{}", text(2)))
        }
        _ => return None,
    };
    Some(folded)
}

fn type_of<'t>(p: &Parameter, types: &'t HashMap<String, String>) -> Option<&'t str> {
    let name = p.ident()?;
    types.get(&name.as_str().to_lowercase()).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strings::StringTable;
    use pretty_assertions::assert_eq;

    #[test]
    fn temporaries_fold_into_their_consumer() {
        let mut s = StringTable::new();
        let mut id = |n: &str| Parameter::Ident(s.intern(n));
        let code = vec![
            Instruction::new(Opcode::IAdd, vec![id("::temp0"), id("count"), Parameter::Int(1)]),
            Instruction::new(Opcode::IMul, vec![id("::temp1"), id("::temp0"), Parameter::Int(2)]),
            Instruction::new(Opcode::Assign, vec![id("::total_var"), id("::temp1")]),
            Instruction::new(
                Opcode::CallMethod,
                vec![id("Notify"), id("self"), id("::nonevar"), Parameter::Int(1), id("::total_var")],
            ),
            Instruction::new(Opcode::Return, vec![Parameter::Null]),
        ];
        let lines = reconstruct(&code, &HashMap::new());
        assert_eq!(
            lines,
            vec![
                Line { index: 2, text: "total = (count + 1) * 2".to_string() },
                Line { index: 3, text: "self.Notify(total)".to_string() },
                Line { index: 4, text: "return None".to_string() },
            ]
        );
    }

    #[test]
    fn casts_and_arrays_use_declared_types() {
        let mut s = StringTable::new();
        let mut id = |n: &str| Parameter::Ident(s.intern(n));
        let code = vec![
            Instruction::new(Opcode::Cast, vec![id("::temp0"), id("n")]),
            Instruction::new(Opcode::ArrayCreate, vec![id("items"), Parameter::Int(4)]),
            Instruction::new(Opcode::ArraySetElement, vec![id("items"), Parameter::Int(0), id("::temp0")]),
            Instruction::new(Opcode::JmpF, vec![id("done"), Parameter::Int(-3)]),
        ];
        let types = HashMap::from([
            ("::temp0".to_string(), "Float".to_string()),
            ("items".to_string(), "Float[]".to_string()),
        ]);
        let text: Vec<_> = reconstruct(&code, &types).into_iter().map(|l| l.text).collect();
        assert_eq!(
            text,
            vec!["items = new Float[4]", "array_setelement items, 0, (n as Float)", "jmpf done, -3"]
        );
    }
}
