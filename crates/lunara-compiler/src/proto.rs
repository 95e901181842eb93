//! Function prototypes: bytecode, constants, upvalue descriptors, debug info.

use crate::opcode::Instruction;
use lunara_core::string::StringId;

/// A constant pool entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Str(StringId),
}

/// Static description of an upvalue.
#[derive(Clone, Debug, PartialEq)]
pub struct UpvalDesc {
    /// Debug name, when known.
    pub name: Option<StringId>,
    /// Captured from the enclosing function's stack (true) or from its
    /// upvalue list (false).
    pub in_stack: bool,
    /// Stack slot or parent upvalue index, per `in_stack`.
    pub index: u8,
}

/// Debug record for a local variable.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalVar {
    pub name: StringId,
    /// First pc where the variable is live.
    pub start_pc: u32,
    /// First pc where the variable is dead.
    pub end_pc: u32,
}

/// A compiled function body.
#[derive(Clone, Debug, Default)]
pub struct Proto {
    /// Chunk name, for messages and debug info.
    pub source: Option<StringId>,
    pub line_defined: u32,
    pub last_line_defined: u32,
    pub num_params: u8,
    pub is_vararg: bool,
    pub max_stack_size: u8,
    pub code: Vec<Instruction>,
    pub constants: Vec<Constant>,
    pub upvalues: Vec<UpvalDesc>,
    pub protos: Vec<Proto>,
    /// Source line of each instruction, parallel to `code`.
    pub line_info: Vec<u32>,
    pub local_vars: Vec<LocalVar>,
}

impl Proto {
    pub fn new() -> Self {
        Proto {
            max_stack_size: 2, // the VM always has at least two registers
            ..Default::default()
        }
    }

    /// Append an instruction, recording its source line. Returns its pc.
    pub fn emit(&mut self, inst: Instruction, line: u32) -> usize {
        let pc = self.code.len();
        self.code.push(inst);
        self.line_info.push(line);
        pc
    }

    /// Intern a constant, deduplicating. Float dedup is by bit pattern, so
    /// 0.0 and -0.0 stay distinct pool entries.
    pub fn add_constant(&mut self, k: Constant) -> usize {
        for (i, existing) in self.constants.iter().enumerate() {
            if constants_identical(existing, &k) {
                return i;
            }
        }
        let idx = self.constants.len();
        self.constants.push(k);
        idx
    }

    /// Source line of the instruction at `pc` (0 when unknown).
    pub fn line_at(&self, pc: usize) -> u32 {
        self.line_info.get(pc).copied().unwrap_or(0)
    }

    pub fn code_len(&self) -> usize {
        self.code.len()
    }

    pub fn get_mut(&mut self, pc: usize) -> &mut Instruction {
        &mut self.code[pc]
    }
}

fn constants_identical(a: &Constant, b: &Constant) -> bool {
    match (a, b) {
        (Constant::Nil, Constant::Nil) => true,
        (Constant::Boolean(x), Constant::Boolean(y)) => x == y,
        (Constant::Integer(x), Constant::Integer(y)) => x == y,
        (Constant::Float(x), Constant::Float(y)) => x.to_bits() == y.to_bits(),
        (Constant::Str(x), Constant::Str(y)) => x == y,
        _ => false,
    }
}
