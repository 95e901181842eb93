//! Bytecode listing in the style of `luac -l`.

use crate::opcode::{rk_index, rk_is_constant, Instruction, InstructionFormat, OpCode};
use crate::proto::{Constant, Proto};
use lunara_core::string::StringInterner;
use std::fmt::Write;

/// Render a prototype and all nested prototypes.
pub fn disassemble(proto: &Proto, strings: &StringInterner) -> String {
    let mut out = String::new();
    disasm_proto(&mut out, proto, strings, true);
    out
}

fn disasm_proto(out: &mut String, proto: &Proto, strings: &StringInterner, is_main: bool) {
    let source = proto
        .source
        .map(|id| String::from_utf8_lossy(strings.get_bytes(id)).into_owned())
        .unwrap_or_else(|| "?".to_string());
    let kind = if is_main { "main" } else { "function" };
    let vararg = if proto.is_vararg { "+" } else { "" };
    writeln!(
        out,
        "{kind} <{source}:{},{}> ({} instructions)",
        proto.line_defined,
        proto.last_line_defined,
        proto.code.len()
    )
    .unwrap();
    writeln!(
        out,
        "{}{vararg} params, {} slots, {} upvalues, {} locals, {} constants, {} functions",
        proto.num_params,
        proto.max_stack_size,
        proto.upvalues.len(),
        proto.local_vars.len(),
        proto.constants.len(),
        proto.protos.len()
    )
    .unwrap();

    for (pc, inst) in proto.code.iter().enumerate() {
        let line = proto.line_at(pc);
        write!(out, "\t{}\t[{}]\t{:<12}", pc + 1, line, inst.opcode().name()).unwrap();
        disasm_operands(out, *inst, proto, strings);
        writeln!(out).unwrap();
    }

    for child in &proto.protos {
        writeln!(out).unwrap();
        disasm_proto(out, child, strings, false);
    }
}

fn disasm_operands(out: &mut String, inst: Instruction, proto: &Proto, strings: &StringInterner) {
    let op = inst.opcode();
    match op.format() {
        InstructionFormat::IABC => {
            write!(out, "{}", inst.a()).unwrap();
            write!(out, " {}", signed_operand(inst.b())).unwrap();
            write!(out, " {}", signed_operand(inst.c())).unwrap();
            // Annotate RK constants for the operand positions that use them.
            let mut notes = Vec::new();
            if uses_rk_b(op) && rk_is_constant(inst.b()) {
                notes.push(constant_text(proto, strings, rk_index(inst.b())));
            }
            if uses_rk_c(op) && rk_is_constant(inst.c()) {
                notes.push(constant_text(proto, strings, rk_index(inst.c())));
            }
            if !notes.is_empty() {
                write!(out, "\t; {}", notes.join(" ")).unwrap();
            }
        }
        InstructionFormat::IABx => {
            write!(out, "{} {}", inst.a(), inst.bx()).unwrap();
            if op == OpCode::LoadK {
                write!(
                    out,
                    "\t; {}",
                    constant_text(proto, strings, inst.bx() as usize)
                )
                .unwrap();
            }
        }
        InstructionFormat::IAsBx => {
            write!(out, "{} {}", inst.a(), inst.sbx()).unwrap();
        }
        InstructionFormat::IAx => {
            write!(out, "{}", inst.ax_field()).unwrap();
        }
    }
}

/// RK operands print constants as negative indices, like luac.
fn signed_operand(x: u32) -> i64 {
    if rk_is_constant(x) {
        -1 - rk_index(x) as i64
    } else {
        x as i64
    }
}

fn uses_rk_b(op: OpCode) -> bool {
    use OpCode::*;
    matches!(
        op,
        SetTabUp | SetTable | Add | Sub | Mul | Mod | Pow | Div | IDiv | BAnd | BOr | BXor | Shl
            | Shr | Eq | Lt | Le
    )
}

fn uses_rk_c(op: OpCode) -> bool {
    use OpCode::*;
    matches!(
        op,
        GetTabUp | GetTable | SetTabUp | SetTable | Self_ | Add | Sub | Mul | Mod | Pow | Div
            | IDiv | BAnd | BOr | BXor | Shl | Shr | Eq | Lt | Le
    )
}

fn constant_text(proto: &Proto, strings: &StringInterner, idx: usize) -> String {
    match proto.constants.get(idx) {
        Some(Constant::Nil) => "nil".to_string(),
        Some(Constant::Boolean(b)) => b.to_string(),
        Some(Constant::Integer(i)) => i.to_string(),
        Some(Constant::Float(f)) => f.to_string(),
        Some(Constant::Str(id)) => {
            format!("\"{}\"", String::from_utf8_lossy(strings.get_bytes(*id)))
        }
        None => "?".to_string(),
    }
}
