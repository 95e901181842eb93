//! Expression descriptors: where a lowered expression's value lives.

use lunara_core::string::StringId;

/// The result of lowering an expression, before it is committed to a
/// register or an RK operand.
#[derive(Clone, Copy, Debug)]
pub enum ExprDesc {
    Nil,
    True,
    False,
    Integer(i64),
    Float(f64),
    Str(StringId),
    /// Value already in a register (a local or a temporary).
    Register(u32),
    /// Upvalue at the given index of the current function.
    Upvalue(u32),
    /// Global access: `_ENV` upvalue index plus the name's constant index.
    Global { env: u32, name_k: u32 },
    /// `obj[key]`: object register and RK-encoded key.
    Indexed { obj: u32, key: u32 },
    /// A CALL/TAILCALL emitted at this pc; result count not yet fixed.
    Call(usize),
    /// A VARARG emitted at this pc; destination and count not yet fixed.
    Vararg(usize),
    /// A comparison: the JMP at this pc is taken when the condition is true.
    Jump(usize),
}

impl ExprDesc {
    /// A compile-time constant that needs no register.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            ExprDesc::Nil
                | ExprDesc::True
                | ExprDesc::False
                | ExprDesc::Integer(_)
                | ExprDesc::Float(_)
                | ExprDesc::Str(_)
        )
    }
}
