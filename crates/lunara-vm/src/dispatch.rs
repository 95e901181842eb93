//! The bytecode interpreter loop and the calling convention.

use crate::arith::{self, ArithOp, ArithResult};
use crate::coerce;
use crate::compare;
use crate::error::LuaError;
use crate::metamethod::get_metamethod;
use crate::vm::Vm;
use lunara_compiler::opcode::{self, fb_to_int, OpCode, FIELDS_PER_FLUSH};
use lunara_compiler::proto::Constant;
use lunara_core::object::type_name;
use lunara_core::string::StringId;
use lunara_core::value::TValue;

/// Longest `__index`/`__newindex` chain followed before giving up.
const MAX_META_CHAIN: usize = 100;

/// What `do_call` did with the callee.
pub(crate) enum CallAction {
    /// A Lua frame was pushed; the dispatch loop continues inside it.
    Frame,
    /// A native ran to completion and its results are already placed.
    Done,
}

/// Runtime error annotated with the current chunk name and line.
fn rt(vm: &Vm, ci_idx: usize, msg: String) -> LuaError {
    let ci = &vm.call_stack[ci_idx];
    if !ci.is_lua {
        return LuaError::Runtime(msg);
    }
    let proto = &vm.protos[ci.proto];
    let line = proto.line_at(ci.pc.saturating_sub(1));
    let src = proto
        .source
        .map(|id| String::from_utf8_lossy(vm.strings.get_bytes(id)).into_owned())
        .unwrap_or_else(|| "?".to_string());
    LuaError::Runtime(format!("{src}:{line}: {msg}"))
}

/// Does the message already carry a `chunk:line:` prefix from a deeper frame?
fn has_position(msg: &str) -> bool {
    let mut rest = msg;
    while let Some(colon) = rest.find(':') {
        let after = &rest[colon + 1..];
        if let Some(second) = after.find(':') {
            let digits = &after[..second];
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                return true;
            }
        }
        rest = after;
    }
    false
}

/// Annotate an error raised by this instruction, leaving already-positioned
/// messages and error() values alone.
fn annotate(vm: &Vm, ci_idx: usize, e: LuaError) -> LuaError {
    match e {
        LuaError::Runtime(msg) if !has_position(&msg) => rt(vm, ci_idx, msg),
        other => other,
    }
}

fn constant_value(k: &Constant) -> TValue {
    match k {
        Constant::Nil => TValue::Nil,
        Constant::Boolean(b) => TValue::Boolean(*b),
        Constant::Integer(i) => TValue::Integer(*i),
        Constant::Float(f) => TValue::Float(*f),
        Constant::Str(id) => TValue::Str(*id),
    }
}

/// Decode an RK operand against the current frame.
fn rk_value(vm: &Vm, ci_idx: usize, base: usize, x: u32) -> TValue {
    if opcode::rk_is_constant(x) {
        let proto = vm.call_stack[ci_idx].proto;
        constant_value(&vm.protos[proto].constants[opcode::rk_index(x)])
    } else {
        vm.stack[base + x as usize]
    }
}

fn k_value(vm: &Vm, ci_idx: usize, idx: usize) -> TValue {
    let proto = vm.call_stack[ci_idx].proto;
    constant_value(&vm.protos[proto].constants[idx])
}

/// Run frames until the one at depth `floor` returns; its results are the
/// return value. Errors propagate with frames above `floor` still in place;
/// the caller unwinds.
pub(crate) fn execute(vm: &mut Vm, floor: usize) -> Result<Vec<TValue>, LuaError> {
    debug_assert!(vm.call_stack.len() >= floor && floor >= 1);
    loop {
        let ci_idx = vm.call_stack.len() - 1;
        let base = vm.call_stack[ci_idx].base;
        let pc = vm.call_stack[ci_idx].pc;

        let proto_idx = vm.call_stack[ci_idx].proto;
        if pc >= vm.protos[proto_idx].code.len() {
            // Ran off the end of the code: behave like `return`.
            vm.close_upvalues(base);
            if vm.call_stack.len() == floor {
                let ci = vm.call_stack.pop().unwrap();
                vm.stack_top = ci.func_slot;
                return Ok(Vec::new());
            }
            return_from_call(vm, &[]);
            continue;
        }
        let inst = vm.protos[proto_idx].code[pc];
        vm.call_stack[ci_idx].pc += 1;

        let op = inst.opcode();
        let a = inst.a() as usize;

        match op {
            OpCode::Move => {
                let b = inst.b() as usize;
                vm.stack[base + a] = vm.stack[base + b];
            }

            OpCode::LoadK => {
                vm.stack[base + a] = k_value(vm, ci_idx, inst.bx() as usize);
            }

            OpCode::LoadKX => {
                let next = vm.protos[proto_idx].code[vm.call_stack[ci_idx].pc];
                vm.call_stack[ci_idx].pc += 1;
                vm.stack[base + a] = k_value(vm, ci_idx, next.ax_field() as usize);
            }

            OpCode::LoadBool => {
                vm.stack[base + a] = TValue::Boolean(inst.b() != 0);
                if inst.c() != 0 {
                    vm.call_stack[ci_idx].pc += 1;
                }
            }

            OpCode::LoadNil => {
                let b = inst.b() as usize;
                for i in a..=a + b {
                    vm.stack[base + i] = TValue::Nil;
                }
            }

            OpCode::GetUpval => {
                let b = inst.b() as usize;
                let closure = vm.call_stack[ci_idx].closure.expect("lua frame");
                let uv = vm.heap.get_closure(closure).upvalues[b];
                vm.stack[base + a] = vm.get_upval_value(uv);
            }

            OpCode::SetUpval => {
                let b = inst.b() as usize;
                let closure = vm.call_stack[ci_idx].closure.expect("lua frame");
                let uv = vm.heap.get_closure(closure).upvalues[b];
                let val = vm.stack[base + a];
                vm.set_upval_value(uv, val);
            }

            OpCode::GetTabUp => {
                let b = inst.b() as usize;
                let closure = vm.call_stack[ci_idx].closure.expect("lua frame");
                let uv = vm.heap.get_closure(closure).upvalues[b];
                let t = vm.get_upval_value(uv);
                let key = rk_value(vm, ci_idx, base, inst.c());
                let v = table_get(vm, t, key).map_err(|e| annotate(vm, ci_idx, e))?;
                vm.stack[base + a] = v;
            }

            OpCode::SetTabUp => {
                let closure = vm.call_stack[ci_idx].closure.expect("lua frame");
                let uv = vm.heap.get_closure(closure).upvalues[a];
                let t = vm.get_upval_value(uv);
                let key = rk_value(vm, ci_idx, base, inst.b());
                let val = rk_value(vm, ci_idx, base, inst.c());
                table_set(vm, t, key, val).map_err(|e| annotate(vm, ci_idx, e))?;
            }

            OpCode::GetTable => {
                let b = inst.b() as usize;
                let t = vm.stack[base + b];
                let key = rk_value(vm, ci_idx, base, inst.c());
                let v = table_get(vm, t, key).map_err(|e| annotate(vm, ci_idx, e))?;
                vm.stack[base + a] = v;
            }

            OpCode::SetTable => {
                let t = vm.stack[base + a];
                let key = rk_value(vm, ci_idx, base, inst.b());
                let val = rk_value(vm, ci_idx, base, inst.c());
                table_set(vm, t, key, val).map_err(|e| annotate(vm, ci_idx, e))?;
            }

            OpCode::NewTable => {
                let narr = fb_to_int(inst.b()) as usize;
                let nrec = fb_to_int(inst.c()) as usize;
                let t = vm.heap.alloc_table(narr, nrec);
                vm.stack[base + a] = TValue::Table(t);
            }

            OpCode::Self_ => {
                let b = inst.b() as usize;
                let obj = vm.stack[base + b];
                let key = rk_value(vm, ci_idx, base, inst.c());
                let method = table_get(vm, obj, key).map_err(|e| annotate(vm, ci_idx, e))?;
                vm.stack[base + a + 1] = obj;
                vm.stack[base + a] = method;
            }

            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Mod
            | OpCode::Pow
            | OpCode::Div
            | OpCode::IDiv
            | OpCode::BAnd
            | OpCode::BOr
            | OpCode::BXor
            | OpCode::Shl
            | OpCode::Shr => {
                let vb = rk_value(vm, ci_idx, base, inst.b());
                let vc = rk_value(vm, ci_idx, base, inst.c());
                let aop = arith_op_of(op);
                let result = match arith::arith(aop, vb, vc, &vm.strings) {
                    ArithResult::Ok(v) => v,
                    ArithResult::Error(e) => return Err(annotate(vm, ci_idx, e)),
                    ArithResult::NeedMetamethod => {
                        arith_metamethod(vm, ci_idx, aop, vb, vc)?
                    }
                };
                vm.stack[base + a] = result;
            }

            OpCode::Unm => {
                let vb = vm.stack[base + inst.b() as usize];
                let result = match arith::negate(vb, &vm.strings) {
                    ArithResult::Ok(v) => v,
                    ArithResult::Error(e) => return Err(annotate(vm, ci_idx, e)),
                    ArithResult::NeedMetamethod => {
                        let name = vm.mm.unm;
                        unary_metamethod(vm, ci_idx, name, vb, "perform arithmetic on")?
                    }
                };
                vm.stack[base + a] = result;
            }

            OpCode::BNot => {
                let vb = vm.stack[base + inst.b() as usize];
                let result = match arith::complement(vb, &vm.strings) {
                    ArithResult::Ok(v) => v,
                    ArithResult::Error(e) => return Err(annotate(vm, ci_idx, e)),
                    ArithResult::NeedMetamethod => {
                        let name = vm.mm.bnot;
                        unary_metamethod(vm, ci_idx, name, vb, "perform bitwise operation on")?
                    }
                };
                vm.stack[base + a] = result;
            }

            OpCode::Not => {
                let vb = vm.stack[base + inst.b() as usize];
                vm.stack[base + a] = TValue::Boolean(vb.is_falsy());
            }

            OpCode::Len => {
                let vb = vm.stack[base + inst.b() as usize];
                let result = match vb {
                    TValue::Str(id) => TValue::Integer(vm.strings.get_bytes(id).len() as i64),
                    TValue::Table(idx) => match get_metamethod(vb, vm.mm.len, &vm.heap) {
                        Some(mm) => call_meta(vm, mm, &[vb])?,
                        None => TValue::Integer(vm.heap.get_table(idx).border()),
                    },
                    other => match get_metamethod(other, vm.mm.len, &vm.heap) {
                        Some(mm) => call_meta(vm, mm, &[other])?,
                        None => {
                            return Err(rt(
                                vm,
                                ci_idx,
                                format!("attempt to get length of a {} value", type_name(other)),
                            ))
                        }
                    },
                };
                vm.stack[base + a] = result;
            }

            OpCode::Concat => {
                let b = inst.b() as usize;
                let c = inst.c() as usize;
                // Right-associative fold over R(B..C).
                let mut acc = vm.stack[base + c];
                let mut i = c;
                while i > b {
                    i -= 1;
                    let left = vm.stack[base + i];
                    acc = concat_pair(vm, ci_idx, left, acc)?;
                }
                vm.stack[base + a] = acc;
            }

            OpCode::Jmp => {
                let sbx = inst.sbx();
                if a != 0 {
                    vm.close_upvalues(base + a - 1);
                }
                let ci = &mut vm.call_stack[ci_idx];
                ci.pc = (ci.pc as i64 + sbx as i64) as usize;
            }

            OpCode::Eq => {
                let vb = rk_value(vm, ci_idx, base, inst.b());
                let vc = rk_value(vm, ci_idx, base, inst.c());
                let mut eq = compare::raw_eq(vb, vc, &vm.strings);
                if !eq && vb.is_table() && vc.is_table() {
                    let mm = get_metamethod(vb, vm.mm.eq, &vm.heap)
                        .or_else(|| get_metamethod(vc, vm.mm.eq, &vm.heap));
                    if let Some(mm) = mm {
                        eq = call_meta(vm, mm, &[vb, vc])?.is_truthy();
                    }
                }
                if eq != (inst.a() != 0) {
                    vm.call_stack[ci_idx].pc += 1;
                }
            }

            OpCode::Lt => {
                let vb = rk_value(vm, ci_idx, base, inst.b());
                let vc = rk_value(vm, ci_idx, base, inst.c());
                let lt = order_compare(vm, ci_idx, vb, vc, true)?;
                if lt != (inst.a() != 0) {
                    vm.call_stack[ci_idx].pc += 1;
                }
            }

            OpCode::Le => {
                let vb = rk_value(vm, ci_idx, base, inst.b());
                let vc = rk_value(vm, ci_idx, base, inst.c());
                let le = order_compare(vm, ci_idx, vb, vc, false)?;
                if le != (inst.a() != 0) {
                    vm.call_stack[ci_idx].pc += 1;
                }
            }

            OpCode::Test => {
                let c = inst.c();
                let falsy = vm.stack[base + a].is_falsy();
                if u32::from(falsy) != c {
                    vm.call_stack[ci_idx].pc += 1;
                }
            }

            OpCode::TestSet => {
                let b = inst.b() as usize;
                let c = inst.c();
                let vb = vm.stack[base + b];
                if u32::from(vb.is_falsy()) != c {
                    vm.call_stack[ci_idx].pc += 1;
                } else {
                    vm.stack[base + a] = vb;
                }
            }

            OpCode::Call => {
                let b = inst.b() as usize;
                let c = inst.c() as usize;
                let func_pos = base + a;
                let nargs = if b == 0 {
                    vm.stack_top - (func_pos + 1)
                } else {
                    b - 1
                };
                let nresults = if c == 0 { -1 } else { c as i32 - 1 };
                do_call(vm, func_pos, nargs, nresults).map_err(|e| annotate(vm, ci_idx, e))?;
            }

            OpCode::TailCall => {
                let b = inst.b() as usize;
                let func_pos = base + a;
                let nargs = if b == 0 {
                    vm.stack_top - (func_pos + 1)
                } else {
                    b - 1
                };
                let finished = tail_call(vm, ci_idx, func_pos, nargs)
                    .map_err(|e| annotate(vm, ci_idx, e))?;
                // A native tail target finishes this frame immediately.
                if let Some(results) = finished {
                    vm.close_upvalues(base);
                    if vm.call_stack.len() == floor {
                        let ci = vm.call_stack.pop().unwrap();
                        vm.stack_top = ci.func_slot;
                        return Ok(results);
                    }
                    return_from_call(vm, &results);
                }
            }

            OpCode::Return => {
                let b = inst.b() as usize;
                let start = base + a;
                let results: Vec<TValue> = if b == 0 {
                    vm.stack[start..vm.stack_top].to_vec()
                } else {
                    vm.stack[start..start + b - 1].to_vec()
                };
                vm.close_upvalues(base);
                if vm.call_stack.len() == floor {
                    let ci = vm.call_stack.pop().unwrap();
                    vm.stack_top = ci.func_slot;
                    return Ok(results);
                }
                return_from_call(vm, &results);
            }

            OpCode::ForPrep => {
                for_prep(vm, ci_idx, base, a, inst.sbx())?;
            }

            OpCode::ForLoop => {
                for_loop(vm, ci_idx, base, a, inst.sbx());
            }

            OpCode::TForCall => {
                let c = inst.c() as usize;
                let func_pos = base + a + 3;
                vm.ensure_stack(func_pos, 3);
                vm.stack[func_pos] = vm.stack[base + a];
                vm.stack[func_pos + 1] = vm.stack[base + a + 1];
                vm.stack[func_pos + 2] = vm.stack[base + a + 2];
                vm.stack_top = func_pos + 3;
                do_call(vm, func_pos, 2, c as i32).map_err(|e| annotate(vm, ci_idx, e))?;
            }

            OpCode::TForLoop => {
                let control = vm.stack[base + a + 1];
                if !control.is_nil() {
                    vm.stack[base + a] = control;
                    let sbx = inst.sbx();
                    let ci = &mut vm.call_stack[ci_idx];
                    ci.pc = (ci.pc as i64 + sbx as i64) as usize;
                }
            }

            OpCode::SetList => {
                let b = inst.b() as usize;
                let mut c = inst.c() as usize;
                if c == 0 {
                    let next = vm.protos[proto_idx].code[vm.call_stack[ci_idx].pc];
                    vm.call_stack[ci_idx].pc += 1;
                    c = next.ax_field() as usize;
                }
                let t = vm.stack[base + a];
                let table_idx = t
                    .as_table_idx()
                    .ok_or_else(|| rt(vm, ci_idx, "SETLIST on a non-table".to_string()))?;
                let count = if b == 0 {
                    vm.stack_top - (base + a + 1)
                } else {
                    b
                };
                let offset = (c - 1) * FIELDS_PER_FLUSH as usize;
                for i in 1..=count {
                    let val = vm.stack[base + a + i];
                    vm.heap
                        .get_table_mut(table_idx)
                        .seti((offset + i) as i64, val);
                }
            }

            OpCode::Closure => {
                let bx = inst.bx() as usize;
                let child = vm.proto_children[proto_idx][bx];
                let descs = vm.protos[child].upvalues.clone();
                let parent_closure = vm.call_stack[ci_idx].closure;
                let mut upvals = Vec::with_capacity(descs.len());
                for desc in &descs {
                    if desc.in_stack {
                        let slot = base + desc.index as usize;
                        upvals.push(vm.find_or_create_open_upval(slot));
                    } else {
                        let parent = parent_closure.expect("nested closure has a parent");
                        upvals.push(vm.heap.get_closure(parent).upvalues[desc.index as usize]);
                    }
                }
                let closure = vm.heap.alloc_closure(child, upvals);
                vm.stack[base + a] = TValue::Closure(closure);
            }

            OpCode::Vararg => {
                let b = inst.b() as usize;
                let ci = &vm.call_stack[ci_idx];
                let num_params = vm.protos[proto_idx].num_params as usize;
                let (vararg_start, count) = match ci.vararg_base {
                    Some(vb) => {
                        let start = vb + num_params;
                        (start, ci.base.saturating_sub(start))
                    }
                    None => (0, 0),
                };
                let wanted = if b == 0 { count } else { b - 1 };
                vm.ensure_stack(base + a, wanted.max(1));
                for i in 0..wanted {
                    vm.stack[base + a + i] = if i < count {
                        vm.stack[vararg_start + i]
                    } else {
                        TValue::Nil
                    };
                }
                if b == 0 {
                    vm.stack_top = base + a + wanted;
                }
            }

            OpCode::ExtraArg => {
                // Only reached when the preceding instruction did not consume
                // it; nothing to do.
            }
        }
    }
}

fn arith_op_of(op: OpCode) -> ArithOp {
    match op {
        OpCode::Add => ArithOp::Add,
        OpCode::Sub => ArithOp::Sub,
        OpCode::Mul => ArithOp::Mul,
        OpCode::Mod => ArithOp::Mod,
        OpCode::Pow => ArithOp::Pow,
        OpCode::Div => ArithOp::Div,
        OpCode::IDiv => ArithOp::IDiv,
        OpCode::BAnd => ArithOp::BAnd,
        OpCode::BOr => ArithOp::BOr,
        OpCode::BXor => ArithOp::BXor,
        OpCode::Shl => ArithOp::Shl,
        OpCode::Shr => ArithOp::Shr,
        _ => unreachable!("not an arithmetic opcode"),
    }
}

fn arith_mm_name(vm: &Vm, op: ArithOp) -> StringId {
    match op {
        ArithOp::Add => vm.mm.add,
        ArithOp::Sub => vm.mm.sub,
        ArithOp::Mul => vm.mm.mul,
        ArithOp::Div => vm.mm.div,
        ArithOp::Mod => vm.mm.mod_,
        ArithOp::Pow => vm.mm.pow,
        ArithOp::IDiv => vm.mm.idiv,
        ArithOp::BAnd => vm.mm.band,
        ArithOp::BOr => vm.mm.bor,
        ArithOp::BXor => vm.mm.bxor,
        ArithOp::Shl => vm.mm.shl,
        ArithOp::Shr => vm.mm.shr,
    }
}

/// Binary arithmetic fallback: `a`'s handler first, then `b`'s.
fn arith_metamethod(
    vm: &mut Vm,
    ci_idx: usize,
    op: ArithOp,
    a: TValue,
    b: TValue,
) -> Result<TValue, LuaError> {
    let name = arith_mm_name(vm, op);
    let mm = get_metamethod(a, name, &vm.heap).or_else(|| get_metamethod(b, name, &vm.heap));
    match mm {
        Some(mm) => call_meta(vm, mm, &[a, b]),
        None => {
            let bad = if a.is_number() || (a.is_string() && coerce::to_number(a, &vm.strings).is_some()) {
                b
            } else {
                a
            };
            Err(rt(
                vm,
                ci_idx,
                format!("attempt to perform arithmetic on a {} value", type_name(bad)),
            ))
        }
    }
}

fn unary_metamethod(
    vm: &mut Vm,
    ci_idx: usize,
    name: StringId,
    v: TValue,
    what: &str,
) -> Result<TValue, LuaError> {
    match get_metamethod(v, name, &vm.heap) {
        Some(mm) => call_meta(vm, mm, &[v, v]),
        None => Err(rt(
            vm,
            ci_idx,
            format!("attempt to {what} a {} value", type_name(v)),
        )),
    }
}

fn order_compare(
    vm: &mut Vm,
    ci_idx: usize,
    a: TValue,
    b: TValue,
    strict: bool,
) -> Result<bool, LuaError> {
    let raw = if strict {
        compare::try_lt(a, b, &vm.strings)
    } else {
        compare::try_le(a, b, &vm.strings)
    };
    if let Some(r) = raw {
        return Ok(r);
    }
    let name = if strict { vm.mm.lt } else { vm.mm.le };
    let mm = get_metamethod(a, name, &vm.heap).or_else(|| get_metamethod(b, name, &vm.heap));
    match mm {
        Some(mm) => Ok(call_meta(vm, mm, &[a, b])?.is_truthy()),
        None => Err(rt(
            vm,
            ci_idx,
            format!(
                "attempt to compare {} with {}",
                type_name(a),
                type_name(b)
            ),
        )),
    }
}

fn concat_pair(
    vm: &mut Vm,
    ci_idx: usize,
    left: TValue,
    right: TValue,
) -> Result<TValue, LuaError> {
    let concatable = |v: TValue| v.is_string() || v.is_number();
    if concatable(left) && concatable(right) {
        let mut bytes = Vec::new();
        let lid = coerce::to_string_for_concat(left, &mut vm.strings).unwrap();
        bytes.extend_from_slice(vm.strings.get_bytes(lid));
        let rid = coerce::to_string_for_concat(right, &mut vm.strings).unwrap();
        bytes.extend_from_slice(vm.strings.get_bytes(rid));
        return Ok(TValue::Str(vm.strings.intern_or_create(&bytes)));
    }
    let mm = get_metamethod(left, vm.mm.concat, &vm.heap)
        .or_else(|| get_metamethod(right, vm.mm.concat, &vm.heap));
    match mm {
        Some(mm) => call_meta(vm, mm, &[left, right]),
        None => {
            let bad = if concatable(left) { right } else { left };
            Err(rt(
                vm,
                ci_idx,
                format!("attempt to concatenate a {} value", type_name(bad)),
            ))
        }
    }
}

/// Indexed read with the `__index` chain.
pub fn table_get(vm: &mut Vm, mut t: TValue, key: TValue) -> Result<TValue, LuaError> {
    for _ in 0..MAX_META_CHAIN {
        if let TValue::Table(idx) = t {
            let raw = vm.heap.get_table(idx).get(key);
            if !raw.is_nil() {
                return Ok(raw);
            }
            match get_metamethod(t, vm.mm.index, &vm.heap) {
                None => return Ok(TValue::Nil),
                Some(mm) if mm.is_function() => return call_meta(vm, mm, &[t, key]),
                Some(next) => t = next,
            }
        } else {
            match get_metamethod(t, vm.mm.index, &vm.heap) {
                Some(mm) if mm.is_function() => return call_meta(vm, mm, &[t, key]),
                Some(next) => t = next,
                None => {
                    return Err(LuaError::Runtime(format!(
                        "attempt to index a {} value",
                        type_name(t)
                    )))
                }
            }
        }
    }
    Err(LuaError::Runtime("'__index' chain too long; possible loop".to_string()))
}

/// Indexed write with the `__newindex` chain.
pub fn table_set(vm: &mut Vm, mut t: TValue, key: TValue, val: TValue) -> Result<(), LuaError> {
    for _ in 0..MAX_META_CHAIN {
        if let TValue::Table(idx) = t {
            let existing = vm.heap.get_table(idx).get(key);
            if !existing.is_nil() {
                vm.heap
                    .get_table_mut(idx)
                    .set(key, val)
                    .map_err(|e| LuaError::Runtime(e.to_string()))?;
                return Ok(());
            }
            match get_metamethod(t, vm.mm.newindex, &vm.heap) {
                None => {
                    vm.heap
                        .get_table_mut(idx)
                        .set(key, val)
                        .map_err(|e| LuaError::Runtime(e.to_string()))?;
                    return Ok(());
                }
                Some(mm) if mm.is_function() => {
                    vm.call_value(mm, &[t, key, val])?;
                    return Ok(());
                }
                Some(next) => t = next,
            }
        } else {
            match get_metamethod(t, vm.mm.newindex, &vm.heap) {
                Some(mm) if mm.is_function() => {
                    vm.call_value(mm, &[t, key, val])?;
                    return Ok(());
                }
                Some(next) => t = next,
                None => {
                    return Err(LuaError::Runtime(format!(
                        "attempt to index a {} value",
                        type_name(t)
                    )))
                }
            }
        }
    }
    Err(LuaError::Runtime(
        "'__newindex' chain too long; possible loop".to_string(),
    ))
}

/// Call a metamethod and keep its first result.
fn call_meta(vm: &mut Vm, f: TValue, args: &[TValue]) -> Result<TValue, LuaError> {
    let results = vm.call_value(f, args)?;
    Ok(results.first().copied().unwrap_or(TValue::Nil))
}

/// Begin a call: push a Lua frame, or run a native to completion and place
/// its results at the function slot. The function value sits at `func_pos`
/// with `nargs` arguments above it.
pub(crate) fn do_call(
    vm: &mut Vm,
    func_pos: usize,
    nargs: usize,
    nresults: i32,
) -> Result<CallAction, LuaError> {
    if vm.call_stack.len() >= vm.max_call_depth {
        return Err(LuaError::StackOverflow);
    }
    let func = vm.stack[func_pos];
    match func {
        TValue::Closure(cidx) => {
            let proto_idx = vm.heap.get_closure(cidx).proto;
            let (num_params, is_vararg, max_stack) = {
                let p = &vm.protos[proto_idx];
                (p.num_params as usize, p.is_vararg, p.max_stack_size as usize)
            };
            let arg_base = func_pos + 1;

            let new_base = if is_vararg {
                // Fixed parameters shift past the captured varargs.
                let actual_base = arg_base + nargs;
                vm.ensure_stack(actual_base, max_stack);
                for i in 0..num_params.min(nargs) {
                    vm.stack[actual_base + i] = vm.stack[arg_base + i];
                }
                for i in nargs..num_params {
                    vm.stack[actual_base + i] = TValue::Nil;
                }
                actual_base
            } else {
                vm.ensure_stack(arg_base, max_stack);
                for i in nargs..num_params {
                    vm.stack[arg_base + i] = TValue::Nil;
                }
                arg_base
            };

            vm.stack_top = new_base + max_stack;
            let mut ci = crate::callinfo::CallInfo::lua(new_base, proto_idx, cidx, func_pos);
            ci.num_results = nresults;
            if is_vararg {
                ci.vararg_base = Some(arg_base);
            }
            vm.call_stack.push(ci);
            Ok(CallAction::Frame)
        }

        TValue::Native(nid) => {
            let f = vm.natives[nid.0 as usize].func;
            let base = func_pos + 1;
            vm.stack_top = base + nargs;
            let mut ci = crate::callinfo::CallInfo::native(base, func_pos);
            ci.num_results = nresults;
            vm.call_stack.push(ci);
            let outcome = f(vm);
            vm.call_stack.pop();
            let n = outcome? as usize;

            let res_start = vm.stack_top - n;
            if nresults < 0 {
                for i in 0..n {
                    vm.stack[func_pos + i] = vm.stack[res_start + i];
                }
                vm.stack_top = func_pos + n;
            } else {
                let want = nresults as usize;
                vm.ensure_stack(func_pos, want.max(1));
                for i in 0..want {
                    vm.stack[func_pos + i] = if i < n {
                        vm.stack[res_start + i]
                    } else {
                        TValue::Nil
                    };
                }
                vm.stack_top = func_pos + want;
            }
            Ok(CallAction::Done)
        }

        other => {
            // `__call` makes the value callable; the value itself becomes
            // the first argument.
            if let Some(mm) = get_metamethod(other, vm.mm.call, &vm.heap) {
                if mm.is_function() {
                    vm.ensure_stack(func_pos, nargs + 2);
                    for i in (0..=nargs).rev() {
                        vm.stack[func_pos + 1 + i] = vm.stack[func_pos + i];
                    }
                    vm.stack[func_pos] = mm;
                    vm.stack_top = func_pos + 2 + nargs;
                    return do_call(vm, func_pos, nargs + 1, nresults);
                }
            }
            Err(LuaError::Runtime(format!(
                "attempt to call a {} value",
                type_name(other)
            )))
        }
    }
}

/// TAILCALL: reuse the current frame for a closure target. A native target
/// instead runs to completion; its results come back so the caller can
/// finish the frame.
fn tail_call(
    vm: &mut Vm,
    ci_idx: usize,
    func_pos: usize,
    nargs: usize,
) -> Result<Option<Vec<TValue>>, LuaError> {
    let func = vm.stack[func_pos];
    let own_func_slot = vm.call_stack[ci_idx].func_slot;
    let own_base = vm.call_stack[ci_idx].base;

    match func {
        TValue::Closure(cidx) => {
            vm.close_upvalues(own_base);

            let proto_idx = vm.heap.get_closure(cidx).proto;
            let (num_params, is_vararg, max_stack) = {
                let p = &vm.protos[proto_idx];
                (p.num_params as usize, p.is_vararg, p.max_stack_size as usize)
            };

            // Slide the function and arguments down over the dying frame.
            vm.stack[own_func_slot] = func;
            let arg_base = own_func_slot + 1;
            for i in 0..nargs {
                vm.stack[arg_base + i] = vm.stack[func_pos + 1 + i];
            }

            let new_base = if is_vararg {
                let actual_base = arg_base + nargs;
                vm.ensure_stack(actual_base, max_stack);
                for i in 0..num_params.min(nargs) {
                    vm.stack[actual_base + i] = vm.stack[arg_base + i];
                }
                for i in nargs..num_params {
                    vm.stack[actual_base + i] = TValue::Nil;
                }
                actual_base
            } else {
                vm.ensure_stack(arg_base, max_stack);
                for i in nargs..num_params {
                    vm.stack[arg_base + i] = TValue::Nil;
                }
                arg_base
            };

            vm.stack_top = new_base + max_stack;
            let ci = &mut vm.call_stack[ci_idx];
            ci.base = new_base;
            ci.pc = 0;
            ci.proto = proto_idx;
            ci.closure = Some(cidx);
            ci.vararg_base = if is_vararg { Some(arg_base) } else { None };
            Ok(None)
        }
        _ => {
            // Natives (and __call values) run as ordinary calls; the results
            // become this frame's return values.
            let results = vm.run_call(func_pos, nargs)?;
            Ok(Some(results))
        }
    }
}

/// Pop the finished frame and adjust its results into the caller's window.
fn return_from_call(vm: &mut Vm, results: &[TValue]) {
    let ci = vm.call_stack.pop().expect("frame to return from");
    let dst = ci.func_slot;
    if ci.num_results < 0 {
        vm.ensure_stack(dst, results.len().max(1));
        for (i, &v) in results.iter().enumerate() {
            vm.stack[dst + i] = v;
        }
        vm.stack_top = dst + results.len();
    } else {
        let want = ci.num_results as usize;
        vm.ensure_stack(dst, want.max(1));
        for i in 0..want {
            vm.stack[dst + i] = results.get(i).copied().unwrap_or(TValue::Nil);
        }
    }
}

/// FORPREP: normalize the control values, back the counter up one step, and
/// jump to the FORLOOP.
fn for_prep(
    vm: &mut Vm,
    ci_idx: usize,
    base: usize,
    a: usize,
    sbx: i32,
) -> Result<(), LuaError> {
    let init = vm.stack[base + a];
    let limit = vm.stack[base + a + 1];
    let step = vm.stack[base + a + 2];

    let all_int = matches!(
        (init, limit, step),
        (TValue::Integer(_), TValue::Integer(_), TValue::Integer(_))
    );

    if all_int {
        let (i, l, s) = match (init, limit, step) {
            (TValue::Integer(i), TValue::Integer(l), TValue::Integer(s)) => (i, l, s),
            _ => unreachable!(),
        };
        if s == 0 {
            return Err(rt(vm, ci_idx, "'for' step is zero".to_string()));
        }
        vm.stack[base + a] = TValue::Integer(i.wrapping_sub(s));
        vm.stack[base + a + 1] = TValue::Integer(l);
        vm.stack[base + a + 2] = TValue::Integer(s);
    } else {
        let fi = coerce::to_number(init, &vm.strings)
            .ok_or_else(|| rt(vm, ci_idx, "'for' initial value must be a number".to_string()))?;
        let fl = coerce::to_number(limit, &vm.strings)
            .ok_or_else(|| rt(vm, ci_idx, "'for' limit must be a number".to_string()))?;
        let fs = coerce::to_number(step, &vm.strings)
            .ok_or_else(|| rt(vm, ci_idx, "'for' step must be a number".to_string()))?;
        if fs == 0.0 {
            return Err(rt(vm, ci_idx, "'for' step is zero".to_string()));
        }
        vm.stack[base + a] = TValue::Float(fi - fs);
        vm.stack[base + a + 1] = TValue::Float(fl);
        vm.stack[base + a + 2] = TValue::Float(fs);
    }

    let ci = &mut vm.call_stack[ci_idx];
    ci.pc = (ci.pc as i64 + sbx as i64) as usize;
    Ok(())
}

/// FORLOOP: advance the counter; while within the limit, publish the loop
/// variable and jump back into the body.
fn for_loop(vm: &mut Vm, ci_idx: usize, base: usize, a: usize, sbx: i32) {
    match (vm.stack[base + a], vm.stack[base + a + 1], vm.stack[base + a + 2]) {
        (TValue::Integer(i), TValue::Integer(l), TValue::Integer(s)) => {
            // checked_add stops the loop instead of wrapping at the edges.
            let next = match i.checked_add(s) {
                Some(n) => n,
                None => return,
            };
            let keep_going = if s > 0 { next <= l } else { next >= l };
            if keep_going {
                vm.stack[base + a] = TValue::Integer(next);
                vm.stack[base + a + 3] = TValue::Integer(next);
                let ci = &mut vm.call_stack[ci_idx];
                ci.pc = (ci.pc as i64 + sbx as i64) as usize;
            }
        }
        (TValue::Float(f), TValue::Float(l), TValue::Float(s)) => {
            let next = f + s;
            let keep_going = if s > 0.0 { next <= l } else { next >= l };
            if keep_going {
                vm.stack[base + a] = TValue::Float(next);
                vm.stack[base + a + 3] = TValue::Float(next);
                let ci = &mut vm.call_stack[ci_idx];
                ci.pc = (ci.pc as i64 + sbx as i64) as usize;
            }
        }
        _ => {
            // FORPREP normalized these; anything else means the chunk was
            // corrupted, and the loop simply ends.
        }
    }
}
