//! Register allocation and lexical scope tracking for one function.

use crate::proto::LocalVar;
use lunara_core::string::StringId;

/// An active local variable.
#[derive(Clone, Debug)]
pub struct LocalSlot {
    pub name: StringId,
    pub reg: u32,
    /// Index of this variable's debug record.
    pub debug_idx: usize,
}

/// One lexical block.
#[derive(Clone, Debug)]
pub struct BlockScope {
    pub locals_on_entry: usize,
    pub free_on_entry: u32,
    pub is_loop: bool,
    /// Forward JMPs from `break`, patched at loop end.
    pub break_jumps: Vec<usize>,
}

/// Stack-discipline register file plus block scoping.
///
/// Locals are registers with names; temporaries sit above the locals and are
/// released promptly with `free_to`. `max_regs` is the high-water mark that
/// becomes the prototype's max stack size.
pub struct ScopeManager {
    pub locals: Vec<LocalSlot>,
    pub blocks: Vec<BlockScope>,
    pub free_reg: u32,
    pub max_regs: u32,
    /// Registers captured as upvalues by nested functions; drives the
    /// close-on-block-exit jumps.
    captured: Vec<u32>,
    /// Debug records for every local ever declared in this function.
    pub debug_vars: Vec<LocalVar>,
}

impl ScopeManager {
    pub fn new() -> Self {
        ScopeManager {
            locals: Vec::new(),
            blocks: Vec::new(),
            free_reg: 0,
            max_regs: 0,
            captured: Vec::new(),
            debug_vars: Vec::new(),
        }
    }

    pub fn enter_block(&mut self, is_loop: bool) {
        self.blocks.push(BlockScope {
            locals_on_entry: self.locals.len(),
            free_on_entry: self.free_reg,
            is_loop,
            break_jumps: Vec::new(),
        });
    }

    /// Leave the innermost block, retiring its locals. Returns the block and,
    /// when a local of the block was captured, the lowest captured register
    /// (the caller emits the closing jump).
    pub fn leave_block(&mut self, end_pc: u32) -> (BlockScope, Option<u32>) {
        let block = self.blocks.pop().expect("unbalanced block scopes");
        for slot in self.locals.drain(block.locals_on_entry..) {
            self.debug_vars[slot.debug_idx].end_pc = end_pc;
        }
        self.free_reg = block.free_on_entry;

        let close_level = self
            .captured
            .iter()
            .copied()
            .filter(|&r| r >= block.free_on_entry)
            .min();
        self.captured.retain(|&r| r < block.free_on_entry);
        (block, close_level)
    }

    /// Declare a local in the next free register.
    pub fn add_local(&mut self, name: StringId, start_pc: u32) -> u32 {
        let reg = self.alloc_reg();
        let debug_idx = self.debug_vars.len();
        self.debug_vars.push(LocalVar {
            name,
            start_pc,
            end_pc: 0,
        });
        self.locals.push(LocalSlot {
            name,
            reg,
            debug_idx,
        });
        reg
    }

    /// Allocate one temporary register.
    pub fn alloc_reg(&mut self) -> u32 {
        let reg = self.free_reg;
        self.free_reg += 1;
        if self.free_reg > self.max_regs {
            self.max_regs = self.free_reg;
        }
        reg
    }

    /// Release registers down to `level`.
    pub fn free_to(&mut self, level: u32) {
        debug_assert!(level <= self.free_reg);
        self.free_reg = level;
    }

    /// Bump the free pointer to at least `level` (after discharging values
    /// into specific registers).
    pub fn reserve_to(&mut self, level: u32) {
        if level > self.free_reg {
            self.free_reg = level;
        }
        if self.free_reg > self.max_regs {
            self.max_regs = self.free_reg;
        }
    }

    /// Innermost local with this name.
    pub fn resolve(&self, name: StringId) -> Option<u32> {
        self.locals.iter().rev().find(|s| s.name == name).map(|s| s.reg)
    }

    /// Record that a nested closure captured this register.
    pub fn mark_captured(&mut self, reg: u32) {
        if !self.captured.contains(&reg) {
            self.captured.push(reg);
        }
    }

    pub fn innermost_loop_mut(&mut self) -> Option<&mut BlockScope> {
        self.blocks.iter_mut().rev().find(|b| b.is_loop)
    }
}

impl Default for ScopeManager {
    fn default() -> Self {
        Self::new()
    }
}
