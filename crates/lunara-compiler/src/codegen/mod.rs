//! Tree-walking code generator: AST to `Proto`.
//!
//! Each function being compiled has a `FuncState`: its prototype under
//! construction, a stack-discipline register file with scoped locals, and
//! the upvalue table. Expressions lower to `ExprDesc` values that are
//! discharged into registers or RK operands on demand; forward jumps are
//! emitted with placeholder offsets and patched from pc lists.

pub mod expr;
pub mod scope;

use crate::ast::*;
use crate::error::{CompileError, ErrorKind};
use crate::opcode::{
    self, Instruction, OpCode, FIELDS_PER_FLUSH, MAX_BX, MAX_C, MAX_INDEX_RK,
};
use crate::proto::{Constant, Proto, UpvalDesc};
use expr::ExprDesc;
use lunara_core::string::{StringId, StringInterner};
use scope::ScopeManager;

/// Highest usable register index (255 is unreachable through RK operands).
const MAX_REG: u32 = 254;

/// Upvalue record while a function is being compiled.
#[derive(Clone, Debug)]
struct UpvalInfo {
    name: StringId,
    in_stack: bool,
    index: u8,
}

/// State for one function being compiled.
struct FuncState {
    proto: Proto,
    scope: ScopeManager,
    upvalues: Vec<UpvalInfo>,
    /// Every register ever captured by an inner closure; never pruned, used
    /// to close-annotate break jumps.
    captured_history: Vec<u32>,
}

impl FuncState {
    fn new() -> Self {
        FuncState {
            proto: Proto::new(),
            scope: ScopeManager::new(),
            upvalues: Vec::new(),
            captured_history: Vec::new(),
        }
    }
}

/// The code generator: a stack of function states plus the string table.
pub struct CodeGen<'s> {
    strings: &'s mut StringInterner,
    func_stack: Vec<FuncState>,
}

/// Compile a parsed chunk into its main prototype.
///
/// Main chunks are vararg and carry the single upvalue `_ENV`.
pub fn gen_chunk(
    block: &Block,
    chunk_name: &str,
    strings: &mut StringInterner,
) -> Result<Proto, CompileError> {
    let source = strings.intern_or_create(chunk_name.as_bytes());
    let env = strings.intern(b"_ENV");

    let mut cg = CodeGen {
        strings,
        func_stack: Vec::new(),
    };

    let mut main = FuncState::new();
    main.proto.source = Some(source);
    main.proto.is_vararg = true;
    main.upvalues.push(UpvalInfo {
        name: env,
        in_stack: true,
        index: 0,
    });
    main.scope.enter_block(false);
    cg.func_stack.push(main);

    cg.gen_block(block)?;
    let last_line = block.ret.as_ref().map(|r| r.line).unwrap_or(0);
    cg.emit(Instruction::abc(OpCode::Return, 0, 1, 0), last_line);

    Ok(cg.finish_function(0))
}

impl<'s> CodeGen<'s> {
    fn fs(&self) -> &FuncState {
        self.func_stack.last().unwrap()
    }

    fn fs_mut(&mut self) -> &mut FuncState {
        self.func_stack.last_mut().unwrap()
    }

    fn semantic_err(&self, line: u32, msg: impl Into<String>) -> CompileError {
        CompileError {
            message: msg.into(),
            line,
            kind: ErrorKind::Semantic,
        }
    }

    // ---- Emission and patching ----

    fn emit(&mut self, inst: Instruction, line: u32) -> usize {
        self.fs_mut().proto.emit(inst, line)
    }

    fn current_pc(&self) -> usize {
        self.fs().proto.code_len()
    }

    fn emit_jump(&mut self, line: u32) -> usize {
        self.emit(Instruction::asbx(OpCode::Jmp, 0, 0), line)
    }

    fn patch_jump_to(&mut self, jump_pc: usize, target: usize) {
        let offset = target as i32 - jump_pc as i32 - 1;
        self.fs_mut().proto.get_mut(jump_pc).set_sbx(offset);
    }

    fn patch_jump_here(&mut self, jump_pc: usize) {
        let target = self.current_pc();
        self.patch_jump_to(jump_pc, target);
    }

    fn patch_jumps_here(&mut self, jumps: &[usize]) {
        for &pc in jumps {
            self.patch_jump_here(pc);
        }
    }

    // ---- Registers and constants ----

    fn alloc_reg(&mut self, line: u32) -> Result<u32, CompileError> {
        let reg = self.fs_mut().scope.alloc_reg();
        if reg > MAX_REG {
            return Err(self.semantic_err(line, "function or expression needs too many registers"));
        }
        Ok(reg)
    }

    fn free_to(&mut self, level: u32) {
        self.fs_mut().scope.free_to(level);
    }

    fn free_reg(&self) -> u32 {
        self.fs().scope.free_reg
    }

    fn add_constant(&mut self, k: Constant) -> u32 {
        self.fs_mut().proto.add_constant(k) as u32
    }

    fn string_constant(&mut self, id: StringId) -> u32 {
        self.add_constant(Constant::Str(id))
    }

    fn emit_load_constant(&mut self, reg: u32, k: u32, line: u32) {
        if k <= MAX_BX {
            self.emit(Instruction::abx(OpCode::LoadK, reg, k), line);
        } else {
            self.emit(Instruction::abx(OpCode::LoadKX, reg, 0), line);
            self.emit(Instruction::ax(OpCode::ExtraArg, k), line);
        }
    }

    /// Materialize an expression as an RK operand: an inline constant when
    /// the pool index fits, a register otherwise.
    fn to_rk(&mut self, desc: ExprDesc, line: u32) -> Result<u32, CompileError> {
        let k = match desc {
            ExprDesc::Nil => Some(self.add_constant(Constant::Nil)),
            ExprDesc::True => Some(self.add_constant(Constant::Boolean(true))),
            ExprDesc::False => Some(self.add_constant(Constant::Boolean(false))),
            ExprDesc::Integer(i) => Some(self.add_constant(Constant::Integer(i))),
            ExprDesc::Float(f) => Some(self.add_constant(Constant::Float(f))),
            ExprDesc::Str(id) => Some(self.add_constant(Constant::Str(id))),
            _ => None,
        };
        match k {
            Some(k) if k <= MAX_INDEX_RK => Ok(opcode::rk_constant(k)),
            Some(k) => {
                let reg = self.alloc_reg(line)?;
                self.emit_load_constant(reg, k, line);
                Ok(reg)
            }
            None => self.discharge_to_any_reg(desc, line),
        }
    }

    /// Put an expression's value into a specific register.
    fn discharge_to_reg(
        &mut self,
        desc: ExprDesc,
        reg: u32,
        line: u32,
    ) -> Result<(), CompileError> {
        match desc {
            ExprDesc::Nil => {
                self.emit(Instruction::abc(OpCode::LoadNil, reg, 0, 0), line);
            }
            ExprDesc::True => {
                self.emit(Instruction::abc(OpCode::LoadBool, reg, 1, 0), line);
            }
            ExprDesc::False => {
                self.emit(Instruction::abc(OpCode::LoadBool, reg, 0, 0), line);
            }
            ExprDesc::Integer(i) => {
                let k = self.add_constant(Constant::Integer(i));
                self.emit_load_constant(reg, k, line);
            }
            ExprDesc::Float(f) => {
                let k = self.add_constant(Constant::Float(f));
                self.emit_load_constant(reg, k, line);
            }
            ExprDesc::Str(id) => {
                let k = self.add_constant(Constant::Str(id));
                self.emit_load_constant(reg, k, line);
            }
            ExprDesc::Register(src) => {
                if src != reg {
                    self.emit(Instruction::abc(OpCode::Move, reg, src, 0), line);
                }
            }
            ExprDesc::Upvalue(idx) => {
                self.emit(Instruction::abc(OpCode::GetUpval, reg, idx, 0), line);
            }
            ExprDesc::Global { env, name_k } => {
                let key = self.constant_operand(name_k, line)?;
                self.emit(Instruction::abc(OpCode::GetTabUp, reg, env, key), line);
            }
            ExprDesc::Indexed { obj, key } => {
                self.emit(Instruction::abc(OpCode::GetTable, reg, obj, key), line);
            }
            ExprDesc::Call(pc) => {
                // The call already requests one result at its base register.
                let a = self.fs().proto.code[pc].a();
                if a != reg {
                    self.emit(Instruction::abc(OpCode::Move, reg, a, 0), line);
                }
            }
            ExprDesc::Vararg(pc) => {
                let inst = self.fs_mut().proto.get_mut(pc);
                inst.set_a(reg);
                inst.set_b(2);
            }
            ExprDesc::Jump(pc) => {
                // Materialize a comparison as a boolean via a LOADBOOL pair.
                // Fall-through means the condition was false.
                self.emit(Instruction::abc(OpCode::LoadBool, reg, 0, 1), line);
                let true_target = self.current_pc();
                self.emit(Instruction::abc(OpCode::LoadBool, reg, 1, 0), line);
                self.patch_jump_to(pc, true_target);
            }
        }
        Ok(())
    }

    /// Put an expression's value into some register, reusing the one it is
    /// already in when possible.
    fn discharge_to_any_reg(&mut self, desc: ExprDesc, line: u32) -> Result<u32, CompileError> {
        match desc {
            ExprDesc::Register(r) => Ok(r),
            ExprDesc::Call(pc) => Ok(self.fs().proto.code[pc].a()),
            _ => {
                let reg = self.alloc_reg(line)?;
                self.discharge_to_reg(desc, reg, line)?;
                Ok(reg)
            }
        }
    }

    /// RK-encode a constant index, spilling to a register when it is too
    /// large for the inline form.
    fn constant_operand(&mut self, k: u32, line: u32) -> Result<u32, CompileError> {
        if k <= MAX_INDEX_RK {
            Ok(opcode::rk_constant(k))
        } else {
            let reg = self.alloc_reg(line)?;
            self.emit_load_constant(reg, k, line);
            Ok(reg)
        }
    }

    // ---- Name resolution ----

    fn resolve_name(&mut self, name: StringId, line: u32) -> Result<ExprDesc, CompileError> {
        if let Some(reg) = self.fs().scope.resolve(name) {
            return Ok(ExprDesc::Register(reg));
        }
        let top = self.func_stack.len() - 1;
        if let Some(idx) = self.resolve_upvalue(top, name, line)? {
            return Ok(ExprDesc::Upvalue(idx));
        }
        // Global: _ENV[name]
        let env_name = self.strings.intern(b"_ENV");
        let env = self
            .resolve_upvalue(top, env_name, line)?
            .expect("_ENV is always reachable");
        let name_k = self.string_constant(name);
        Ok(ExprDesc::Global { env, name_k })
    }

    /// Walk outward through enclosing functions looking for `name`.
    fn resolve_upvalue(
        &mut self,
        fs_idx: usize,
        name: StringId,
        line: u32,
    ) -> Result<Option<u32>, CompileError> {
        // Already captured at this level?
        if let Some(i) = self.func_stack[fs_idx]
            .upvalues
            .iter()
            .position(|u| u.name == name)
        {
            return Ok(Some(i as u32));
        }
        if fs_idx == 0 {
            return Ok(None);
        }
        let parent = fs_idx - 1;
        if let Some(reg) = self.func_stack[parent].scope.resolve(name) {
            self.func_stack[parent].scope.mark_captured(reg);
            self.func_stack[parent].captured_history.push(reg);
            return Ok(Some(self.add_upvalue(fs_idx, name, true, reg, line)?));
        }
        if let Some(outer) = self.resolve_upvalue(parent, name, line)? {
            return Ok(Some(self.add_upvalue(fs_idx, name, false, outer, line)?));
        }
        Ok(None)
    }

    fn add_upvalue(
        &mut self,
        fs_idx: usize,
        name: StringId,
        in_stack: bool,
        index: u32,
        line: u32,
    ) -> Result<u32, CompileError> {
        let fs = &mut self.func_stack[fs_idx];
        for (i, u) in fs.upvalues.iter().enumerate() {
            if u.in_stack == in_stack && u.index as u32 == index {
                return Ok(i as u32);
            }
        }
        if fs.upvalues.len() >= 255 {
            return Err(self.semantic_err(line, "too many upvalues"));
        }
        let idx = self.func_stack[fs_idx].upvalues.len() as u32;
        self.func_stack[fs_idx].upvalues.push(UpvalInfo {
            name,
            in_stack,
            index: index as u8,
        });
        Ok(idx)
    }

    // ---- Blocks and statements ----

    fn gen_block(&mut self, block: &Block) -> Result<(), CompileError> {
        for stat in &block.stats {
            self.gen_stat(stat)?;
        }
        if let Some(ret) = &block.ret {
            self.gen_return(ret)?;
        }
        Ok(())
    }

    /// Leave the innermost scope block, emitting the close jump when a local
    /// of the block escaped into a closure.
    fn leave_block_emit_close(&mut self, line: u32) -> scope::BlockScope {
        let end_pc = self.current_pc() as u32;
        let (block, close) = self.fs_mut().scope.leave_block(end_pc);
        if let Some(level) = close {
            // JMP with A > 0 closes upvalues at or above register A-1.
            self.emit(Instruction::asbx(OpCode::Jmp, level + 1, 0), line);
        }
        block
    }

    /// Close level for jumps that leave the innermost loop (break, loop
    /// back-edges): the lowest register captured at or above the loop's base.
    fn loop_close_level(&self, loop_base: u32) -> Option<u32> {
        self.fs()
            .captured_history
            .iter()
            .copied()
            .filter(|&r| r >= loop_base)
            .min()
    }

    fn patch_loop_exits(&mut self, block: &scope::BlockScope, target: usize) {
        let close = self.loop_close_level(block.free_on_entry);
        for &pc in &block.break_jumps {
            let offset = target as i32 - pc as i32 - 1;
            let inst = self.fs_mut().proto.get_mut(pc);
            inst.set_sbx(offset);
            if let Some(level) = close {
                inst.set_a(level + 1);
            }
        }
    }

    fn gen_stat(&mut self, stat: &Stat) -> Result<(), CompileError> {
        match stat {
            Stat::Empty => Ok(()),
            Stat::Break { line } => self.gen_break(*line),
            Stat::Do { body } => {
                self.fs_mut().scope.enter_block(false);
                self.gen_block(body)?;
                self.leave_block_emit_close(0);
                Ok(())
            }
            Stat::While { cond, body, line } => self.gen_while(cond, body, *line),
            Stat::Repeat { body, cond, line } => self.gen_repeat(body, cond, *line),
            Stat::If {
                arms,
                else_body,
                line,
            } => self.gen_if(arms, else_body.as_ref(), *line),
            Stat::NumericFor {
                var,
                init,
                limit,
                step,
                body,
                line,
            } => self.gen_numeric_for(*var, init, limit, step.as_ref(), body, *line),
            Stat::GenericFor {
                names,
                exprs,
                body,
                line,
            } => self.gen_generic_for(names, exprs, body, *line),
            Stat::Local { names, exprs, line } => self.gen_local(names, exprs, *line),
            Stat::LocalFunction { name, body, line } => {
                self.gen_local_function(*name, body, *line)
            }
            Stat::Assign {
                targets,
                values,
                line,
            } => self.gen_assign(targets, values, *line),
            Stat::Call { expr, line } => {
                let save = self.free_reg();
                let desc = self.gen_expr(expr)?;
                match desc {
                    ExprDesc::Call(pc) => {
                        // Statement position: discard all results.
                        self.fs_mut().proto.get_mut(pc).set_c(1);
                    }
                    _ => {
                        return Err(self.semantic_err(*line, "syntax error near call statement"))
                    }
                }
                self.free_to(save);
                Ok(())
            }
        }
    }

    fn gen_break(&mut self, line: u32) -> Result<(), CompileError> {
        let pc = self.emit_jump(line);
        match self.fs_mut().scope.innermost_loop_mut() {
            Some(block) => {
                block.break_jumps.push(pc);
                Ok(())
            }
            None => Err(self.semantic_err(line, "break outside a loop")),
        }
    }

    fn gen_while(&mut self, cond: &Expr, body: &Block, line: u32) -> Result<(), CompileError> {
        let top = self.current_pc();
        let exit_jumps = self.gen_cond_false_jumps(cond, line)?;

        self.fs_mut().scope.enter_block(true);
        self.gen_block(body)?;
        let loop_block = self.leave_block_emit_close(line);
        let back = self.emit_jump(line);
        self.patch_jump_to(back, top);

        let exit = self.current_pc();
        self.patch_jumps_here(&exit_jumps);
        self.patch_loop_exits(&loop_block, exit);
        Ok(())
    }

    fn gen_repeat(&mut self, body: &Block, cond: &Expr, line: u32) -> Result<(), CompileError> {
        let top = self.current_pc();
        self.fs_mut().scope.enter_block(true);
        self.gen_block(body)?;
        // The condition sees the body's locals.
        let back_jumps = self.gen_cond_false_jumps(cond, line)?;
        let loop_block = self.leave_block_emit_close(line);
        let close = self.loop_close_level(loop_block.free_on_entry);
        for &pc in &back_jumps {
            let offset = top as i32 - pc as i32 - 1;
            let inst = self.fs_mut().proto.get_mut(pc);
            inst.set_sbx(offset);
            if let Some(level) = close {
                inst.set_a(level + 1);
            }
        }
        let exit = self.current_pc();
        self.patch_loop_exits(&loop_block, exit);
        Ok(())
    }

    fn gen_if(
        &mut self,
        arms: &[(Expr, Block)],
        else_body: Option<&Block>,
        line: u32,
    ) -> Result<(), CompileError> {
        let mut escapes: Vec<usize> = Vec::new();
        let mut pending_false: Vec<usize> = Vec::new();

        for (i, (cond, body)) in arms.iter().enumerate() {
            self.patch_jumps_here(&pending_false);
            pending_false = self.gen_cond_false_jumps(cond, line)?;

            self.fs_mut().scope.enter_block(false);
            self.gen_block(body)?;
            self.leave_block_emit_close(line);

            let more = i + 1 < arms.len() || else_body.is_some();
            if more {
                escapes.push(self.emit_jump(line));
            }
        }

        self.patch_jumps_here(&pending_false);
        if let Some(body) = else_body {
            self.fs_mut().scope.enter_block(false);
            self.gen_block(body)?;
            self.leave_block_emit_close(line);
        }
        self.patch_jumps_here(&escapes);
        Ok(())
    }

    fn gen_numeric_for(
        &mut self,
        var: StringId,
        init: &Expr,
        limit: &Expr,
        step: Option<&Expr>,
        body: &Block,
        line: u32,
    ) -> Result<(), CompileError> {
        let base = self.free_reg();

        // Three control registers: initial value, limit, step.
        let init_desc = self.gen_expr(init)?;
        self.free_to(base);
        let r = self.alloc_reg(line)?;
        self.discharge_to_reg(init_desc, r, line)?;

        let limit_desc = self.gen_expr(limit)?;
        self.free_to(base + 1);
        let r = self.alloc_reg(line)?;
        self.discharge_to_reg(limit_desc, r, line)?;

        match step {
            Some(step) => {
                let step_desc = self.gen_expr(step)?;
                self.free_to(base + 2);
                let r = self.alloc_reg(line)?;
                self.discharge_to_reg(step_desc, r, line)?;
            }
            None => {
                let r = self.alloc_reg(line)?;
                self.discharge_to_reg(ExprDesc::Integer(1), r, line)?;
            }
        }
        self.free_to(base + 3);

        let prep = self.emit(Instruction::asbx(OpCode::ForPrep, base, 0), line);

        self.fs_mut().scope.enter_block(true);
        let pc = self.current_pc() as u32;
        self.fs_mut().scope.add_local(var, pc); // the loop variable, base+3
        self.gen_block(body)?;
        let loop_block = self.leave_block_emit_close(line);

        let loop_pc = self.emit(Instruction::asbx(OpCode::ForLoop, base, 0), line);
        // FORPREP jumps to the FORLOOP; FORLOOP jumps back to the body.
        self.patch_jump_to(prep, loop_pc);
        let body_start = prep + 1;
        let offset = body_start as i32 - loop_pc as i32 - 1;
        self.fs_mut().proto.get_mut(loop_pc).set_sbx(offset);

        let exit = self.current_pc();
        self.patch_loop_exits(&loop_block, exit);
        self.free_to(base);
        Ok(())
    }

    fn gen_generic_for(
        &mut self,
        names: &[StringId],
        exprs: &[Expr],
        body: &Block,
        line: u32,
    ) -> Result<(), CompileError> {
        let base = self.free_reg();

        // Three hidden control slots: iterator, state, control value.
        self.gen_exprlist_adjusted(exprs, base, 3, line)?;

        let prep = self.emit_jump(line);

        self.fs_mut().scope.enter_block(true);
        let pc = self.current_pc() as u32;
        for name in names {
            self.fs_mut().scope.add_local(*name, pc);
        }
        let body_start = self.current_pc();
        self.gen_block(body)?;
        let loop_block = self.leave_block_emit_close(line);

        let call_pc = self.current_pc();
        self.emit(
            Instruction::abc(OpCode::TForCall, base, 0, names.len() as u32),
            line,
        );
        let loop_pc = self.emit(Instruction::asbx(OpCode::TForLoop, base + 2, 0), line);
        self.patch_jump_to(prep, call_pc);
        let offset = body_start as i32 - loop_pc as i32 - 1;
        self.fs_mut().proto.get_mut(loop_pc).set_sbx(offset);

        let exit = self.current_pc();
        self.patch_loop_exits(&loop_block, exit);
        self.free_to(base);
        Ok(())
    }

    fn gen_local(
        &mut self,
        names: &[StringId],
        exprs: &[Expr],
        line: u32,
    ) -> Result<(), CompileError> {
        let base = self.free_reg();
        self.gen_exprlist_adjusted(exprs, base, names.len() as u32, line)?;
        // Rewind and re-allocate the same registers as named locals.
        self.free_to(base);
        let pc = self.current_pc() as u32;
        for name in names {
            self.fs_mut().scope.add_local(*name, pc);
        }
        Ok(())
    }

    fn gen_local_function(
        &mut self,
        name: StringId,
        body: &FuncBody,
        line: u32,
    ) -> Result<(), CompileError> {
        // The name is in scope inside the body (recursion).
        let pc = self.current_pc() as u32;
        let reg = self.fs_mut().scope.add_local(name, pc);
        let proto_idx = self.gen_func_proto(body)?;
        self.emit(
            Instruction::abx(OpCode::Closure, reg, proto_idx as u32),
            line,
        );
        Ok(())
    }

    fn gen_assign(
        &mut self,
        targets: &[Expr],
        values: &[Expr],
        line: u32,
    ) -> Result<(), CompileError> {
        let save = self.free_reg();

        // Lower target prefixes first, left to right.
        enum StoreTarget {
            Local(u32),
            Upval(u32),
            Global { env: u32, key: u32 },
            Index { obj: u32, key: u32 },
        }
        let mut lowered = Vec::with_capacity(targets.len());
        for target in targets {
            match target {
                Expr::Name { id, line } => match self.resolve_name(*id, *line)? {
                    ExprDesc::Register(r) => lowered.push(StoreTarget::Local(r)),
                    ExprDesc::Upvalue(i) => lowered.push(StoreTarget::Upval(i)),
                    ExprDesc::Global { env, name_k } => {
                        let key = self.constant_operand(name_k, *line)?;
                        lowered.push(StoreTarget::Global { env, key });
                    }
                    _ => unreachable!("name resolves to register, upvalue, or global"),
                },
                Expr::Index { obj, key, line } => {
                    let odesc = self.gen_expr(obj)?;
                    let obj_reg = self.discharge_to_any_reg(odesc, *line)?;
                    let kdesc = self.gen_expr(key)?;
                    let key_rk = self.to_rk(kdesc, *line)?;
                    lowered.push(StoreTarget::Index {
                        obj: obj_reg,
                        key: key_rk,
                    });
                }
                other => {
                    return Err(
                        self.semantic_err(other.line(), "cannot assign to this expression")
                    )
                }
            }
        }

        // All right-hand values materialize before any store happens.
        let vbase = self.free_reg();
        self.gen_exprlist_adjusted(values, vbase, targets.len() as u32, line)?;

        for (i, target) in lowered.iter().enumerate() {
            let v = vbase + i as u32;
            match *target {
                StoreTarget::Local(r) => {
                    if r != v {
                        self.emit(Instruction::abc(OpCode::Move, r, v, 0), line);
                    }
                }
                StoreTarget::Upval(idx) => {
                    self.emit(Instruction::abc(OpCode::SetUpval, v, idx, 0), line);
                }
                StoreTarget::Global { env, key } => {
                    self.emit(Instruction::abc(OpCode::SetTabUp, env, key, v), line);
                }
                StoreTarget::Index { obj, key } => {
                    self.emit(Instruction::abc(OpCode::SetTable, obj, key, v), line);
                }
            }
        }

        self.free_to(save);
        Ok(())
    }

    fn gen_return(&mut self, ret: &RetStat) -> Result<(), CompileError> {
        let line = ret.line;
        if ret.exprs.is_empty() {
            self.emit(Instruction::abc(OpCode::Return, 0, 1, 0), line);
            return Ok(());
        }

        // `return f(...)` becomes a tail call.
        if ret.exprs.len() == 1 {
            match &ret.exprs[0] {
                e @ (Expr::Call { .. } | Expr::MethodCall { .. }) => {
                    let save = self.free_reg();
                    let desc = self.gen_expr(e)?;
                    if let ExprDesc::Call(pc) = desc {
                        let inst = self.fs().proto.code[pc];
                        let a = inst.a();
                        let b = inst.b();
                        *self.fs_mut().proto.get_mut(pc) =
                            Instruction::abc(OpCode::TailCall, a, b, 0);
                        self.emit(Instruction::abc(OpCode::Return, a, 0, 0), line);
                    }
                    self.free_to(save);
                    return Ok(());
                }
                Expr::Vararg { line: vline } => {
                    self.check_vararg(*vline)?;
                    let base = self.free_reg();
                    self.emit(Instruction::abc(OpCode::Vararg, base, 0, 0), line);
                    self.emit(Instruction::abc(OpCode::Return, base, 0, 0), line);
                    return Ok(());
                }
                _ => {}
            }
        }

        let base = self.free_reg();
        match self.gen_exprlist_multi(&ret.exprs, base, line)? {
            Some(count) => {
                self.emit(Instruction::abc(OpCode::Return, base, count + 1, 0), line);
            }
            None => {
                self.emit(Instruction::abc(OpCode::Return, base, 0, 0), line);
            }
        }
        self.free_to(base);
        Ok(())
    }

    // ---- Expression lists ----

    /// Evaluate `exprs` so that exactly `wanted` values land in consecutive
    /// registers starting at `base`. Pads with nil, discards extras, and
    /// expands a trailing call/vararg to fill the gap.
    fn gen_exprlist_adjusted(
        &mut self,
        exprs: &[Expr],
        base: u32,
        wanted: u32,
        line: u32,
    ) -> Result<(), CompileError> {
        let n = exprs.len() as u32;
        if n == 0 {
            if wanted > 0 {
                self.fs_mut().scope.reserve_to(base + wanted);
                self.emit(
                    Instruction::abc(OpCode::LoadNil, base, wanted - 1, 0),
                    line,
                );
            }
            return Ok(());
        }

        for (i, e) in exprs.iter().enumerate() {
            let i = i as u32;
            let target = base + i;
            let last = i + 1 == n;

            if last && wanted > n && e.is_multi() {
                let missing = wanted - n + 1;
                let desc = self.gen_expr(e)?;
                match desc {
                    ExprDesc::Call(pc) => {
                        self.fs_mut().proto.get_mut(pc).set_c(missing + 1);
                    }
                    ExprDesc::Vararg(pc) => {
                        let inst = self.fs_mut().proto.get_mut(pc);
                        inst.set_a(target);
                        inst.set_b(missing + 1);
                    }
                    _ => unreachable!("is_multi covers calls and vararg"),
                }
                self.fs_mut().scope.reserve_to(base + wanted);
                return Ok(());
            }

            let desc = self.gen_expr(e)?;
            self.free_to(target);
            let r = self.alloc_reg(e.line())?;
            debug_assert_eq!(r, target);
            self.discharge_to_reg(desc, target, e.line())?;
        }

        if n < wanted {
            self.fs_mut().scope.reserve_to(base + wanted);
            self.emit(
                Instruction::abc(OpCode::LoadNil, base + n, wanted - n - 1, 0),
                line,
            );
        } else if n > wanted {
            // Extra values were evaluated for their effects and dropped.
            self.free_to(base + wanted);
        }
        Ok(())
    }

    /// Evaluate `exprs` into consecutive registers at `base` for a
    /// multi-value consumer (call arguments, return). Returns `Some(count)`
    /// for a fixed count, or `None` when a trailing call/vararg was left
    /// open (the consumer reads up to the stack top).
    fn gen_exprlist_multi(
        &mut self,
        exprs: &[Expr],
        base: u32,
        _line: u32,
    ) -> Result<Option<u32>, CompileError> {
        let n = exprs.len() as u32;
        if n == 0 {
            return Ok(Some(0));
        }
        for (i, e) in exprs.iter().enumerate() {
            let i = i as u32;
            let target = base + i;
            let last = i + 1 == n;

            if last && e.is_multi() {
                let desc = self.gen_expr(e)?;
                match desc {
                    ExprDesc::Call(pc) => {
                        self.fs_mut().proto.get_mut(pc).set_c(0);
                    }
                    ExprDesc::Vararg(pc) => {
                        let inst = self.fs_mut().proto.get_mut(pc);
                        inst.set_a(target);
                        inst.set_b(0);
                        self.fs_mut().scope.reserve_to(target + 1);
                    }
                    _ => unreachable!(),
                }
                return Ok(None);
            }

            let desc = self.gen_expr(e)?;
            self.free_to(target);
            let r = self.alloc_reg(e.line())?;
            debug_assert_eq!(r, target);
            self.discharge_to_reg(desc, target, e.line())?;
        }
        Ok(Some(n))
    }

    // ---- Expressions ----

    fn check_vararg(&self, line: u32) -> Result<(), CompileError> {
        if !self.fs().proto.is_vararg {
            return Err(self.semantic_err(line, "cannot use '...' outside a vararg function"));
        }
        Ok(())
    }

    fn gen_expr(&mut self, e: &Expr) -> Result<ExprDesc, CompileError> {
        match e {
            Expr::Nil { .. } => Ok(ExprDesc::Nil),
            Expr::True { .. } => Ok(ExprDesc::True),
            Expr::False { .. } => Ok(ExprDesc::False),
            Expr::Integer { value, .. } => Ok(ExprDesc::Integer(*value)),
            Expr::Float { value, .. } => Ok(ExprDesc::Float(*value)),
            Expr::Str { id, .. } => Ok(ExprDesc::Str(*id)),
            Expr::Vararg { line } => {
                self.check_vararg(*line)?;
                let pc = self.emit(Instruction::abc(OpCode::Vararg, 0, 0, 0), *line);
                Ok(ExprDesc::Vararg(pc))
            }
            Expr::Name { id, line } => self.resolve_name(*id, *line),
            Expr::Paren { inner } => {
                let desc = self.gen_expr(inner)?;
                match desc {
                    // Parentheses truncate multi-value expressions to one.
                    ExprDesc::Call(_) | ExprDesc::Vararg(_) => {
                        let reg = self.discharge_to_any_reg(desc, inner.line())?;
                        Ok(ExprDesc::Register(reg))
                    }
                    other => Ok(other),
                }
            }
            Expr::Index { obj, key, line } => {
                let odesc = self.gen_expr(obj)?;
                let obj_reg = self.discharge_to_any_reg(odesc, *line)?;
                let kdesc = self.gen_expr(key)?;
                let key_rk = self.to_rk(kdesc, *line)?;
                Ok(ExprDesc::Indexed {
                    obj: obj_reg,
                    key: key_rk,
                })
            }
            Expr::Call { func, args, line } => self.gen_call(func, args, *line),
            Expr::MethodCall {
                obj,
                name,
                args,
                line,
            } => self.gen_method_call(obj, *name, args, *line),
            Expr::Function { body } => {
                let proto_idx = self.gen_func_proto(body)?;
                let dest = self.alloc_reg(body.line)?;
                self.emit(
                    Instruction::abx(OpCode::Closure, dest, proto_idx as u32),
                    body.line,
                );
                Ok(ExprDesc::Register(dest))
            }
            Expr::Table { fields, line } => self.gen_table(fields, *line),
            Expr::UnOp { op, operand, line } => self.gen_unop(*op, operand, *line),
            Expr::BinOp { op, lhs, rhs, line } => self.gen_binop(*op, lhs, rhs, *line),
        }
    }

    fn gen_call(
        &mut self,
        func: &Expr,
        args: &[Expr],
        line: u32,
    ) -> Result<ExprDesc, CompileError> {
        let base = self.free_reg();
        let fdesc = self.gen_expr(func)?;
        self.free_to(base);
        let func_reg = self.alloc_reg(line)?;
        debug_assert_eq!(func_reg, base);
        self.discharge_to_reg(fdesc, func_reg, line)?;

        let b = match self.gen_exprlist_multi(args, base + 1, line)? {
            Some(count) => count + 1,
            None => 0,
        };
        // C defaults to 2 (one result); consumers patch it.
        let pc = self.emit(Instruction::abc(OpCode::Call, base, b, 2), line);
        self.free_to(base + 1);
        Ok(ExprDesc::Call(pc))
    }

    fn gen_method_call(
        &mut self,
        obj: &Expr,
        name: StringId,
        args: &[Expr],
        line: u32,
    ) -> Result<ExprDesc, CompileError> {
        let base = self.free_reg();
        let odesc = self.gen_expr(obj)?;
        let obj_reg = self.discharge_to_any_reg(odesc, line)?;
        self.free_to(base);

        let func_reg = self.alloc_reg(line)?;
        debug_assert_eq!(func_reg, base);
        let _self_slot = self.alloc_reg(line)?;
        let name_k = self.string_constant(name);
        let key = self.constant_operand(name_k, line)?;
        self.emit(Instruction::abc(OpCode::Self_, base, obj_reg, key), line);
        self.free_to(base + 2);

        let b = match self.gen_exprlist_multi(args, base + 2, line)? {
            Some(count) => count + 2, // the receiver is the first argument
            None => 0,
        };
        let pc = self.emit(Instruction::abc(OpCode::Call, base, b, 2), line);
        self.free_to(base + 1);
        Ok(ExprDesc::Call(pc))
    }

    fn gen_func_proto(&mut self, body: &FuncBody) -> Result<usize, CompileError> {
        let mut fs = FuncState::new();
        fs.proto.source = self.fs().proto.source;
        fs.proto.line_defined = body.line;
        fs.proto.last_line_defined = body.end_line;
        fs.proto.is_vararg = body.is_vararg;
        fs.scope.enter_block(false);
        self.func_stack.push(fs);

        if body.is_method {
            let self_name = self.strings.intern(b"self");
            self.fs_mut().scope.add_local(self_name, 0);
        }
        for p in &body.params {
            self.fs_mut().scope.add_local(*p, 0);
        }
        let num_params = body.params.len() + usize::from(body.is_method);
        if num_params > 200 {
            return Err(self.semantic_err(body.line, "too many parameters"));
        }
        self.fs_mut().proto.num_params = num_params as u8;

        self.gen_block(&body.block)?;
        self.emit(Instruction::abc(OpCode::Return, 0, 1, 0), body.end_line);

        let child_idx = self.func_stack.len() - 1;
        let child = self.finish_function(child_idx);
        let parent = self.fs_mut();
        let idx = parent.proto.protos.len();
        parent.proto.protos.push(child);
        if idx > MAX_BX as usize {
            return Err(self.semantic_err(body.line, "too many nested functions"));
        }
        Ok(idx)
    }

    /// Seal the function at `idx` on the stack: close its scope, move debug
    /// records and upvalue descriptors into the prototype, pop it.
    fn finish_function(&mut self, idx: usize) -> Proto {
        debug_assert_eq!(idx, self.func_stack.len() - 1);
        let mut fs = self.func_stack.pop().unwrap();
        let end_pc = fs.proto.code_len() as u32;
        fs.scope.leave_block(end_pc);
        fs.proto.max_stack_size = fs.scope.max_regs.max(2) as u8;
        fs.proto.local_vars = fs.scope.debug_vars.clone();
        fs.proto.upvalues = fs
            .upvalues
            .iter()
            .map(|u| UpvalDesc {
                name: Some(u.name),
                in_stack: u.in_stack,
                index: u.index,
            })
            .collect();
        fs.proto
    }

    fn gen_table(&mut self, fields: &[Field], line: u32) -> Result<ExprDesc, CompileError> {
        let dest = self.alloc_reg(line)?;
        let newtable_pc = self.emit(Instruction::abc(OpCode::NewTable, dest, 0, 0), line);

        let mut total_items: u32 = 0;
        let mut pending: u32 = 0;
        let mut hash_count: u32 = 0;
        let mut open_ended = false;

        for (i, field) in fields.iter().enumerate() {
            let last = i + 1 == fields.len();
            match field {
                Field::Named { name, value } => {
                    let save = self.free_reg();
                    let name_k = self.string_constant(*name);
                    let key = self.constant_operand(name_k, line)?;
                    let vdesc = self.gen_expr(value)?;
                    let vrk = self.to_rk(vdesc, value.line())?;
                    self.emit(Instruction::abc(OpCode::SetTable, dest, key, vrk), line);
                    self.free_to(save);
                    hash_count += 1;
                }
                Field::Keyed { key, value } => {
                    let save = self.free_reg();
                    let kdesc = self.gen_expr(key)?;
                    let krk = self.to_rk(kdesc, key.line())?;
                    let vdesc = self.gen_expr(value)?;
                    let vrk = self.to_rk(vdesc, value.line())?;
                    self.emit(Instruction::abc(OpCode::SetTable, dest, krk, vrk), line);
                    self.free_to(save);
                    hash_count += 1;
                }
                Field::Item(e) => {
                    if last && e.is_multi() {
                        let desc = self.gen_expr(e)?;
                        match desc {
                            ExprDesc::Call(pc) => {
                                self.fs_mut().proto.get_mut(pc).set_c(0);
                            }
                            ExprDesc::Vararg(pc) => {
                                let target = self.free_reg();
                                let inst = self.fs_mut().proto.get_mut(pc);
                                inst.set_a(target);
                                inst.set_b(0);
                            }
                            _ => unreachable!(),
                        }
                        // Offset past the batches already flushed; pending
                        // items are still on the stack below the expansion.
                        let batch = (total_items - pending) / FIELDS_PER_FLUSH + 1;
                        self.emit_setlist(dest, 0, batch, e.line());
                        self.free_to(dest + 1);
                        pending = 0;
                        open_ended = true;
                    } else {
                        let desc = self.gen_expr(e)?;
                        let target = dest + 1 + pending;
                        self.free_to(target);
                        let r = self.alloc_reg(e.line())?;
                        debug_assert_eq!(r, target);
                        self.discharge_to_reg(desc, target, e.line())?;
                        pending += 1;
                        total_items += 1;
                        if pending == FIELDS_PER_FLUSH {
                            let batch = (total_items - 1) / FIELDS_PER_FLUSH + 1;
                            self.emit_setlist(dest, pending, batch, e.line());
                            self.free_to(dest + 1);
                            pending = 0;
                        }
                    }
                }
            }
        }

        if pending > 0 {
            let batch = (total_items - 1) / FIELDS_PER_FLUSH + 1;
            self.emit_setlist(dest, pending, batch, line);
            self.free_to(dest + 1);
        }

        // Retrofit the size hints now that the counts are known.
        let arr_hint = opcode::int_to_fb(total_items + u32::from(open_ended));
        let hash_hint = opcode::int_to_fb(hash_count);
        let inst = self.fs_mut().proto.get_mut(newtable_pc);
        inst.set_b(arr_hint);
        inst.set_c(hash_hint);

        self.free_to(dest + 1);
        Ok(ExprDesc::Register(dest))
    }

    fn emit_setlist(&mut self, table: u32, count: u32, batch: u32, line: u32) {
        if batch <= MAX_C {
            self.emit(Instruction::abc(OpCode::SetList, table, count, batch), line);
        } else {
            // Batch index does not fit in C: spill it to an EXTRAARG.
            self.emit(Instruction::abc(OpCode::SetList, table, count, 0), line);
            self.emit(Instruction::ax(OpCode::ExtraArg, batch), line);
        }
    }

    fn gen_unop(&mut self, op: UnOp, operand: &Expr, line: u32) -> Result<ExprDesc, CompileError> {
        // Constant folding on literals.
        match (op, operand) {
            (UnOp::Neg, Expr::Integer { value, .. }) => {
                return Ok(ExprDesc::Integer(value.wrapping_neg()))
            }
            (UnOp::Neg, Expr::Float { value, .. }) => return Ok(ExprDesc::Float(-value)),
            (UnOp::BNot, Expr::Integer { value, .. }) => return Ok(ExprDesc::Integer(!value)),
            (UnOp::Not, Expr::Nil { .. } | Expr::False { .. }) => return Ok(ExprDesc::True),
            (
                UnOp::Not,
                Expr::True { .. } | Expr::Integer { .. } | Expr::Float { .. } | Expr::Str { .. },
            ) => return Ok(ExprDesc::False),
            _ => {}
        }

        let save = self.free_reg();
        let desc = self.gen_expr(operand)?;
        let src = self.discharge_to_any_reg(desc, line)?;
        self.free_to(save);
        let dest = self.alloc_reg(line)?;
        let opcode = match op {
            UnOp::Neg => OpCode::Unm,
            UnOp::Not => OpCode::Not,
            UnOp::Len => OpCode::Len,
            UnOp::BNot => OpCode::BNot,
        };
        self.emit(Instruction::abc(opcode, dest, src, 0), line);
        Ok(ExprDesc::Register(dest))
    }

    fn gen_binop(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        line: u32,
    ) -> Result<ExprDesc, CompileError> {
        match op {
            BinOp::And | BinOp::Or => self.gen_short_circuit(op, lhs, rhs, line),
            BinOp::Concat => self.gen_concat(lhs, rhs, line),
            _ if op.is_comparison() => {
                let pc = self.gen_comparison(op, lhs, rhs, true, line)?;
                Ok(ExprDesc::Jump(pc))
            }
            _ => {
                let save = self.free_reg();
                let ldesc = self.gen_expr(lhs)?;
                let lrk = self.to_rk(ldesc, line)?;
                let rdesc = self.gen_expr(rhs)?;
                let rrk = self.to_rk(rdesc, line)?;
                self.free_to(save);
                let dest = self.alloc_reg(line)?;
                let opcode = match op {
                    BinOp::Add => OpCode::Add,
                    BinOp::Sub => OpCode::Sub,
                    BinOp::Mul => OpCode::Mul,
                    BinOp::Div => OpCode::Div,
                    BinOp::IDiv => OpCode::IDiv,
                    BinOp::Mod => OpCode::Mod,
                    BinOp::Pow => OpCode::Pow,
                    BinOp::BAnd => OpCode::BAnd,
                    BinOp::BOr => OpCode::BOr,
                    BinOp::BXor => OpCode::BXor,
                    BinOp::Shl => OpCode::Shl,
                    BinOp::Shr => OpCode::Shr,
                    _ => unreachable!(),
                };
                self.emit(Instruction::abc(opcode, dest, lrk, rrk), line);
                Ok(ExprDesc::Register(dest))
            }
        }
    }

    /// Emit a comparison followed by a placeholder JMP; returns the JMP's pc.
    /// With `when_true`, the jump is taken when the comparison holds;
    /// otherwise when it fails.
    fn gen_comparison(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        when_true: bool,
        line: u32,
    ) -> Result<usize, CompileError> {
        let save = self.free_reg();
        let ldesc = self.gen_expr(lhs)?;
        let lrk = self.to_rk(ldesc, line)?;
        let rdesc = self.gen_expr(rhs)?;
        let rrk = self.to_rk(rdesc, line)?;
        self.free_to(save);

        // EQ/LT/LE skip the following JMP when the result differs from A.
        // Gt/GtEq swap operands (a > b is b < a); negating A instead would
        // get NaN comparisons wrong.
        let (opcode, a, b, c) = match op {
            BinOp::Eq => (OpCode::Eq, u32::from(when_true), lrk, rrk),
            BinOp::NotEq => (OpCode::Eq, u32::from(!when_true), lrk, rrk),
            BinOp::Lt => (OpCode::Lt, u32::from(when_true), lrk, rrk),
            BinOp::Gt => (OpCode::Lt, u32::from(when_true), rrk, lrk),
            BinOp::LtEq => (OpCode::Le, u32::from(when_true), lrk, rrk),
            BinOp::GtEq => (OpCode::Le, u32::from(when_true), rrk, lrk),
            _ => unreachable!(),
        };
        self.emit(Instruction::abc(opcode, a, b, c), line);
        Ok(self.emit_jump(line))
    }

    fn gen_short_circuit(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        line: u32,
    ) -> Result<ExprDesc, CompileError> {
        let save = self.free_reg();
        let ldesc = self.gen_expr(lhs)?;
        self.free_to(save);
        let dest = self.alloc_reg(line)?;
        self.discharge_to_reg(ldesc, dest, line)?;

        // TESTSET keeps the left value and jumps over the right side when it
        // already decides the result (truthy for `or`, falsy for `and`).
        let c = u32::from(op == BinOp::And);
        self.emit(Instruction::abc(OpCode::TestSet, dest, dest, c), line);
        let skip = self.emit_jump(line);

        let rdesc = self.gen_expr(rhs)?;
        self.free_to(dest + 1);
        self.discharge_to_reg(rdesc, dest, line)?;
        self.patch_jump_here(skip);
        Ok(ExprDesc::Register(dest))
    }

    fn gen_concat(&mut self, lhs: &Expr, rhs: &Expr, line: u32) -> Result<ExprDesc, CompileError> {
        // Flatten the right-leaning chain into consecutive registers, then
        // fold with one CONCAT.
        let mut operands: Vec<&Expr> = vec![lhs];
        let mut tail = rhs;
        while let Expr::BinOp {
            op: BinOp::Concat,
            lhs,
            rhs,
            ..
        } = tail
        {
            operands.push(lhs.as_ref());
            tail = rhs.as_ref();
        }
        operands.push(tail);

        let base = self.free_reg();
        for (i, e) in operands.iter().enumerate() {
            let target = base + i as u32;
            let desc = self.gen_expr(e)?;
            self.free_to(target);
            let r = self.alloc_reg(e.line())?;
            debug_assert_eq!(r, target);
            self.discharge_to_reg(desc, target, e.line())?;
        }
        let last = base + operands.len() as u32 - 1;
        self.free_to(base);
        let dest = self.alloc_reg(line)?;
        debug_assert_eq!(dest, base);
        self.emit(Instruction::abc(OpCode::Concat, dest, base, last), line);
        Ok(ExprDesc::Register(dest))
    }

    // ---- Conditions as jumps ----

    /// Lower a condition, returning the jumps taken when it is FALSE.
    /// Falling through means the condition held.
    fn gen_cond_false_jumps(&mut self, cond: &Expr, line: u32) -> Result<Vec<usize>, CompileError> {
        match cond {
            // Side-effect-free truthy literals never jump.
            Expr::True { .. } | Expr::Integer { .. } | Expr::Float { .. } | Expr::Str { .. } => {
                Ok(vec![])
            }
            Expr::Nil { .. } | Expr::False { .. } => Ok(vec![self.emit_jump(line)]),
            Expr::Paren { inner } => self.gen_cond_false_jumps(inner, line),
            Expr::UnOp {
                op: UnOp::Not,
                operand,
                ..
            } => self.gen_cond_true_jumps(operand, line),
            Expr::BinOp {
                op: BinOp::And,
                lhs,
                rhs,
                ..
            } => {
                let mut jumps = self.gen_cond_false_jumps(lhs, line)?;
                jumps.extend(self.gen_cond_false_jumps(rhs, line)?);
                Ok(jumps)
            }
            Expr::BinOp {
                op: BinOp::Or,
                lhs,
                rhs,
                ..
            } => {
                let true_jumps = self.gen_cond_true_jumps(lhs, line)?;
                let false_jumps = self.gen_cond_false_jumps(rhs, line)?;
                // The left side deciding true lands right here, at the body.
                self.patch_jumps_here(&true_jumps);
                Ok(false_jumps)
            }
            Expr::BinOp { op, lhs, rhs, line } if op.is_comparison() => {
                Ok(vec![self.gen_comparison(*op, lhs, rhs, false, *line)?])
            }
            _ => {
                let save = self.free_reg();
                let desc = self.gen_expr(cond)?;
                let reg = self.discharge_to_any_reg(desc, line)?;
                self.free_to(save);
                // TEST with C=1 skips the jump when the register is truthy.
                self.emit(Instruction::abc(OpCode::Test, reg, 0, 1), line);
                Ok(vec![self.emit_jump(line)])
            }
        }
    }

    /// Lower a condition, returning the jumps taken when it is TRUE.
    fn gen_cond_true_jumps(&mut self, cond: &Expr, line: u32) -> Result<Vec<usize>, CompileError> {
        match cond {
            Expr::True { .. } | Expr::Integer { .. } | Expr::Float { .. } | Expr::Str { .. } => {
                Ok(vec![self.emit_jump(line)])
            }
            Expr::Nil { .. } | Expr::False { .. } => Ok(vec![]),
            Expr::Paren { inner } => self.gen_cond_true_jumps(inner, line),
            Expr::UnOp {
                op: UnOp::Not,
                operand,
                ..
            } => self.gen_cond_false_jumps(operand, line),
            Expr::BinOp {
                op: BinOp::Or,
                lhs,
                rhs,
                ..
            } => {
                let mut jumps = self.gen_cond_true_jumps(lhs, line)?;
                jumps.extend(self.gen_cond_true_jumps(rhs, line)?);
                Ok(jumps)
            }
            Expr::BinOp {
                op: BinOp::And,
                lhs,
                rhs,
                ..
            } => {
                let false_jumps = self.gen_cond_false_jumps(lhs, line)?;
                let true_jumps = self.gen_cond_true_jumps(rhs, line)?;
                self.patch_jumps_here(&false_jumps);
                Ok(true_jumps)
            }
            Expr::BinOp { op, lhs, rhs, line } if op.is_comparison() => {
                Ok(vec![self.gen_comparison(*op, lhs, rhs, true, *line)?])
            }
            _ => {
                let save = self.free_reg();
                let desc = self.gen_expr(cond)?;
                let reg = self.discharge_to_any_reg(desc, line)?;
                self.free_to(save);
                // TEST with C=0 skips the jump when the register is falsy.
                self.emit(Instruction::abc(OpCode::Test, reg, 0, 0), line);
                Ok(vec![self.emit_jump(line)])
            }
        }
    }
}
