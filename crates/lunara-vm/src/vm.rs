//! The interpreter state: value stack, frame chain, heap, prototypes,
//! open upvalues, and the global table.

use crate::callinfo::CallInfo;
use crate::dispatch::{self, CallAction};
use crate::error::LuaError;
use crate::metamethod::MetamethodNames;
use lunara_compiler::error::CompileError;
use lunara_compiler::proto::Proto;
use lunara_core::heap::{GcIdx, Heap, UpVal, UpValLocation};
use lunara_core::string::StringInterner;
use lunara_core::table::Table;
use lunara_core::value::{NativeId, TValue};
use std::time::Instant;

/// A host function. It runs in its own frame whose register 1 is the first
/// argument, and returns how many results it left on top of the stack.
pub type NativeFn = fn(&mut Vm) -> Result<u32, LuaError>;

pub struct NativeFunction {
    pub func: NativeFn,
    pub name: &'static str,
}

/// One Lua state.
pub struct Vm {
    /// The shared value stack; frames carve register windows out of it.
    pub stack: Vec<TValue>,
    /// First free slot above the live values.
    pub stack_top: usize,
    /// Frame chain, innermost last.
    pub call_stack: Vec<CallInfo>,
    pub heap: Heap,
    pub strings: StringInterner,
    /// Registered host functions, addressed by `NativeId`.
    pub natives: Vec<NativeFunction>,
    /// Flattened prototype store.
    pub protos: Vec<Proto>,
    /// Flat indices of each prototype's children, parallel to `protos`.
    pub proto_children: Vec<Vec<usize>>,
    /// Open upvalues keyed by stack slot.
    pub open_upvals: Vec<(usize, GcIdx<UpVal>)>,
    /// The global environment, reached through `_ENV`.
    pub globals: GcIdx<Table>,
    pub mm: MetamethodNames,
    pub max_call_depth: usize,
    pub start_time: Instant,
}

impl Vm {
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let mut strings = StringInterner::new();
        let mm = MetamethodNames::init(&mut strings);
        let globals = heap.alloc_table(0, 32);
        Vm {
            stack: vec![TValue::Nil; 256],
            stack_top: 0,
            call_stack: Vec::new(),
            heap,
            strings,
            natives: Vec::new(),
            protos: Vec::new(),
            proto_children: Vec::new(),
            open_upvals: Vec::new(),
            globals,
            mm,
            max_call_depth: 200,
            start_time: Instant::now(),
        }
    }

    /// Make sure `base + size` slots exist. New slots come up nil; all frame
    /// access is base-relative, so growth never invalidates anything.
    pub fn ensure_stack(&mut self, base: usize, size: usize) {
        let needed = base + size;
        if needed > self.stack.len() {
            self.stack.resize(needed.next_power_of_two(), TValue::Nil);
        }
    }

    // ---- Prototypes and closures ----

    /// Flatten a prototype tree into the store; returns the root's index.
    pub fn register_proto_tree(&mut self, proto: &Proto) -> usize {
        let idx = self.protos.len();
        self.protos.push(Proto::new());
        self.proto_children.push(Vec::new());
        let children: Vec<usize> = proto
            .protos
            .iter()
            .map(|child| self.register_proto_tree(child))
            .collect();
        let mut flat = proto.clone();
        flat.protos = Vec::new();
        self.protos[idx] = flat;
        self.proto_children[idx] = children;
        idx
    }

    /// Turn a compiled main prototype into a callable closure whose `_ENV`
    /// is this state's global table.
    pub fn instantiate(&mut self, proto: &Proto) -> TValue {
        let root = self.register_proto_tree(proto);
        let env = self
            .heap
            .alloc_upval(UpValLocation::Closed(TValue::Table(self.globals)));
        TValue::Closure(self.heap.alloc_closure(root, vec![env]))
    }

    /// Compile a source chunk against this state's string table and wrap it
    /// as a closure.
    pub fn load_source(&mut self, source: &[u8], name: &str) -> Result<TValue, CompileError> {
        let table = std::mem::take(&mut self.strings);
        let mut strings = table;
        let result = lunara_compiler::compile(source, name, &mut strings);
        self.strings = strings;
        let proto = result?;
        Ok(self.instantiate(&proto))
    }

    // ---- Natives ----

    pub fn alloc_native(&mut self, func: NativeFn, name: &'static str) -> NativeId {
        let id = NativeId(self.natives.len() as u32);
        self.natives.push(NativeFunction { func, name });
        id
    }

    /// Value for a host function, reusing an existing registration of the
    /// same function pointer.
    pub fn native_value(&mut self, func: NativeFn, name: &'static str) -> TValue {
        for (i, n) in self.natives.iter().enumerate() {
            if n.func as *const () == func as *const () {
                return TValue::Native(NativeId(i as u32));
            }
        }
        TValue::Native(self.alloc_native(func, name))
    }

    /// Register a host function under a global name.
    pub fn register(&mut self, name: &str, func: NativeFn, static_name: &'static str) {
        let v = self.native_value(func, static_name);
        let key = self.strings.intern_or_create(name.as_bytes());
        self.heap.get_table_mut(self.globals).set_str(key, v);
    }

    // ---- Upvalues ----

    pub fn get_upval_value(&self, uv: GcIdx<UpVal>) -> TValue {
        match self.heap.get_upval(uv).location {
            UpValLocation::Open(slot) => self.stack[slot],
            UpValLocation::Closed(v) => v,
        }
    }

    pub fn set_upval_value(&mut self, uv: GcIdx<UpVal>, val: TValue) {
        match self.heap.get_upval(uv).location {
            UpValLocation::Open(slot) => self.stack[slot] = val,
            UpValLocation::Closed(_) => {
                self.heap.get_upval_mut(uv).location = UpValLocation::Closed(val);
            }
        }
    }

    /// Share the open upvalue for a stack slot, creating it on first capture.
    pub fn find_or_create_open_upval(&mut self, slot: usize) -> GcIdx<UpVal> {
        for &(s, uv) in &self.open_upvals {
            if s == slot {
                return uv;
            }
        }
        let uv = self.heap.alloc_upval(UpValLocation::Open(slot));
        self.open_upvals.push((slot, uv));
        uv
    }

    /// Close every open upvalue at or above `level`: the value moves out of
    /// the stack slot into the cell.
    pub fn close_upvalues(&mut self, level: usize) {
        let mut i = 0;
        while i < self.open_upvals.len() {
            let (slot, uv) = self.open_upvals[i];
            if slot >= level {
                let val = self.stack[slot];
                self.heap.get_upval_mut(uv).location = UpValLocation::Closed(val);
                self.open_upvals.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }

    // ---- Calling ----

    /// First stack slot safely above every live register of the current
    /// frame; scratch calls (metamethods, host calls) start here.
    pub fn scratch_top(&self) -> usize {
        match self.call_stack.last() {
            Some(ci) if ci.is_lua => {
                let ceiling = ci.base + self.protos[ci.proto].max_stack_size as usize;
                self.stack_top.max(ceiling)
            }
            _ => self.stack_top,
        }
    }

    /// Call any callable with the given arguments, running nested dispatch
    /// to completion. Errors unwind the frames this call created, closing
    /// their upvalues.
    pub fn call_value(&mut self, func: TValue, args: &[TValue]) -> Result<Vec<TValue>, LuaError> {
        let pos = self.scratch_top();
        self.ensure_stack(pos, args.len() + 1);
        self.stack[pos] = func;
        for (i, &a) in args.iter().enumerate() {
            self.stack[pos + 1 + i] = a;
        }
        self.run_call(pos, args.len())
    }

    /// Call the function value at `func_pos` with `nargs` arguments sitting
    /// right above it. Returns all results.
    pub(crate) fn run_call(
        &mut self,
        func_pos: usize,
        nargs: usize,
    ) -> Result<Vec<TValue>, LuaError> {
        let floor = self.call_stack.len();
        self.stack_top = func_pos + 1 + nargs;
        let action = match dispatch::do_call(self, func_pos, nargs, -1) {
            Ok(action) => action,
            Err(e) => {
                self.unwind_to(floor, func_pos);
                return Err(e);
            }
        };
        match action {
            CallAction::Done => {
                let results = self.stack[func_pos..self.stack_top].to_vec();
                self.stack_top = func_pos;
                Ok(results)
            }
            CallAction::Frame => match dispatch::execute(self, floor + 1) {
                Ok(results) => {
                    self.stack_top = func_pos;
                    Ok(results)
                }
                Err(e) => {
                    self.unwind_to(floor, func_pos);
                    Err(e)
                }
            },
        }
    }

    /// Drop frames above `floor`, closing upvalues anchored in them.
    pub(crate) fn unwind_to(&mut self, floor: usize, restore_top: usize) {
        while self.call_stack.len() > floor {
            let ci = self.call_stack.pop().unwrap();
            self.close_upvalues(ci.func_slot.min(ci.base));
        }
        self.stack_top = restore_top;
    }

    /// Compile and run a source chunk with no arguments.
    pub fn run_source(&mut self, source: &[u8], name: &str) -> Result<Vec<TValue>, RunError> {
        let closure = self.load_source(source, name).map_err(RunError::Compile)?;
        self.call_value(closure, &[]).map_err(RunError::Runtime)
    }

    /// `chunk:line: ` prefix for the Lua frame at `level` (1 = innermost).
    pub fn position(&self, level: usize) -> Option<String> {
        let mut remaining = level;
        for ci in self.call_stack.iter().rev() {
            if !ci.is_lua {
                continue;
            }
            remaining -= 1;
            if remaining == 0 {
                let proto = &self.protos[ci.proto];
                let line = proto.line_at(ci.pc.saturating_sub(1));
                let src = proto
                    .source
                    .map(|id| String::from_utf8_lossy(self.strings.get_bytes(id)).into_owned())
                    .unwrap_or_else(|| "?".to_string());
                return Some(format!("{src}:{line}: "));
            }
        }
        None
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

/// Failure of `run_source`: the chunk never loaded, or it loaded and died.
#[derive(Debug)]
pub enum RunError {
    Compile(CompileError),
    Runtime(LuaError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Compile(e) => write!(f, "{e}"),
            RunError::Runtime(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RunError {}
