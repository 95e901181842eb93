//! Call frames.

use lunara_core::heap::{GcIdx, LuaClosure};

/// One activation record on the frame chain.
#[derive(Clone, Debug)]
pub struct CallInfo {
    /// Stack offset of this frame's register 0.
    pub base: usize,
    /// Next instruction to execute (Lua frames).
    pub pc: usize,
    /// Results the caller expects; -1 means all.
    pub num_results: i32,
    /// Flat prototype index (Lua frames).
    pub proto: usize,
    /// The closure being run, when this is a Lua frame.
    pub closure: Option<GcIdx<LuaClosure>>,
    /// Stack slot holding the function value; results land here.
    pub func_slot: usize,
    /// Where the incoming arguments start, for vararg functions.
    pub vararg_base: Option<usize>,
    pub is_lua: bool,
}

impl CallInfo {
    pub fn lua(base: usize, proto: usize, closure: GcIdx<LuaClosure>, func_slot: usize) -> Self {
        CallInfo {
            base,
            pc: 0,
            num_results: -1,
            proto,
            closure: Some(closure),
            func_slot,
            vararg_base: None,
            is_lua: true,
        }
    }

    pub fn native(base: usize, func_slot: usize) -> Self {
        CallInfo {
            base,
            pc: 0,
            num_results: -1,
            proto: usize::MAX,
            closure: None,
            func_slot,
            vararg_base: None,
            is_lua: false,
        }
    }
}
