//! Precompiled chunk serialization (dump) and deserialization (undump),
//! following the Lua 5.3 binary format bit-exactly.

use lunara_compiler::opcode::Instruction;
use lunara_compiler::proto::{Constant, LocalVar, Proto, UpvalDesc};
use lunara_core::string::{StringId, StringInterner};
use std::fmt;

const SIGNATURE: &[u8; 4] = b"\x1bLua";
const VERSION: u8 = 0x53;
const FORMAT: u8 = 0;
/// Conversion-damage detector: "\x19\x93\r\n\x1a\n".
const TAIL: &[u8; 6] = b"\x19\x93\r\n\x1a\n";
const CINT_SIZE: u8 = 4;
const CSIZET_SIZE: u8 = 8;
const INSTRUCTION_SIZE: u8 = 4;
const LUA_INTEGER_SIZE: u8 = 8;
const LUA_NUMBER_SIZE: u8 = 8;
const CHECK_INT: i64 = 0x5678;
const CHECK_NUM: f64 = 370.5;

// Constant tags.
const TAG_NIL: u8 = 0x00;
const TAG_BOOLEAN: u8 = 0x01;
const TAG_NUMBER: u8 = 0x03;
const TAG_INTEGER: u8 = 0x13;
const TAG_SHORT_STR: u8 = 0x04;
const TAG_LONG_STR: u8 = 0x14;

/// Longest string stored with a one-byte length.
const SHORT_LEN_MAX: usize = 0xFD;

/// A malformed or truncated chunk.
#[derive(Debug)]
pub struct UndumpError {
    pub message: String,
}

impl UndumpError {
    fn new(message: impl Into<String>) -> Self {
        UndumpError {
            message: message.into(),
        }
    }
}

impl fmt::Display for UndumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UndumpError {}

// ---- Dump ----

/// Serialize a prototype tree.
pub fn dump(proto: &Proto, strings: &StringInterner) -> Vec<u8> {
    let mut out = Vec::new();
    write_header(&mut out);
    out.push(proto.upvalues.len() as u8);
    write_function(&mut out, proto, strings);
    out
}

fn write_header(out: &mut Vec<u8>) {
    out.extend_from_slice(SIGNATURE);
    out.push(VERSION);
    out.push(FORMAT);
    out.extend_from_slice(TAIL);
    out.push(CINT_SIZE);
    out.push(CSIZET_SIZE);
    out.push(INSTRUCTION_SIZE);
    out.push(LUA_INTEGER_SIZE);
    out.push(LUA_NUMBER_SIZE);
    out.extend_from_slice(&CHECK_INT.to_le_bytes());
    out.extend_from_slice(&CHECK_NUM.to_le_bytes());
}

fn write_u32(out: &mut Vec<u8>, n: u32) {
    out.extend_from_slice(&n.to_le_bytes());
}

/// Strings store length+1; 0x00 is the absent/empty string, 0xFF escapes to
/// a 64-bit length.
fn write_string(out: &mut Vec<u8>, bytes: Option<&[u8]>) {
    match bytes {
        None => out.push(0),
        Some(b) if b.is_empty() => out.push(0),
        Some(b) => {
            let size = b.len() + 1;
            if b.len() <= SHORT_LEN_MAX {
                out.push(size as u8);
            } else {
                out.push(0xFF);
                out.extend_from_slice(&(size as u64).to_le_bytes());
            }
            out.extend_from_slice(b);
        }
    }
}

fn write_function(out: &mut Vec<u8>, proto: &Proto, strings: &StringInterner) {
    write_string(out, proto.source.map(|id| strings.get_bytes(id)));
    write_u32(out, proto.line_defined);
    write_u32(out, proto.last_line_defined);
    out.push(proto.num_params);
    out.push(u8::from(proto.is_vararg));
    out.push(proto.max_stack_size);

    write_u32(out, proto.code.len() as u32);
    for inst in &proto.code {
        out.extend_from_slice(&inst.0.to_le_bytes());
    }

    write_u32(out, proto.constants.len() as u32);
    for k in &proto.constants {
        match k {
            Constant::Nil => out.push(TAG_NIL),
            Constant::Boolean(b) => {
                out.push(TAG_BOOLEAN);
                out.push(u8::from(*b));
            }
            Constant::Float(f) => {
                out.push(TAG_NUMBER);
                out.extend_from_slice(&f.to_le_bytes());
            }
            Constant::Integer(i) => {
                out.push(TAG_INTEGER);
                out.extend_from_slice(&i.to_le_bytes());
            }
            Constant::Str(id) => {
                let bytes = strings.get_bytes(*id);
                if bytes.len() <= SHORT_LEN_MAX {
                    out.push(TAG_SHORT_STR);
                } else {
                    out.push(TAG_LONG_STR);
                }
                write_string(out, Some(bytes));
            }
        }
    }

    write_u32(out, proto.upvalues.len() as u32);
    for uv in &proto.upvalues {
        out.push(u8::from(uv.in_stack));
        out.push(uv.index);
    }

    write_u32(out, proto.protos.len() as u32);
    for child in &proto.protos {
        write_function(out, child, strings);
    }

    // Debug sections: line info, local variables, upvalue names.
    write_u32(out, proto.line_info.len() as u32);
    for &line in &proto.line_info {
        write_u32(out, line);
    }

    write_u32(out, proto.local_vars.len() as u32);
    for lv in &proto.local_vars {
        write_string(out, Some(strings.get_bytes(lv.name)));
        write_u32(out, lv.start_pc);
        write_u32(out, lv.end_pc);
    }

    write_u32(out, proto.upvalues.len() as u32);
    for uv in &proto.upvalues {
        write_string(out, uv.name.map(|id| strings.get_bytes(id)));
    }
}

// ---- Undump ----

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn read_byte(&mut self) -> Result<u8, UndumpError> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| UndumpError::new("truncated chunk"))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], UndumpError> {
        if self.pos + n > self.data.len() {
            return Err(UndumpError::new("truncated chunk"));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, UndumpError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, UndumpError> {
        let b = self.read_bytes(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_i64(&mut self) -> Result<i64, UndumpError> {
        self.read_u64().map(|v| v as i64)
    }

    fn read_f64(&mut self) -> Result<f64, UndumpError> {
        self.read_u64().map(f64::from_bits)
    }

    fn read_string(
        &mut self,
        strings: &mut StringInterner,
    ) -> Result<Option<StringId>, UndumpError> {
        let first = self.read_byte()?;
        let size = match first {
            0 => return Ok(None),
            0xFF => {
                let n = self.read_u64()? as usize;
                if n == 0 {
                    return Err(UndumpError::new("corrupted string length"));
                }
                n
            }
            n => n as usize,
        };
        let len = size - 1;
        let bytes = self.read_bytes(len)?;
        Ok(Some(strings.intern_or_create(bytes)))
    }
}

/// Deserialize a chunk produced by [`dump`] (or by luac 5.3).
pub fn undump(
    data: &[u8],
    name: &str,
    strings: &mut StringInterner,
) -> Result<Proto, UndumpError> {
    let mut r = Reader::new(data);
    check_header(&mut r, name)?;
    let _main_upvalues = r.read_byte()?;
    read_function(&mut r, strings)
}

fn check_header(r: &mut Reader, name: &str) -> Result<(), UndumpError> {
    if r.read_bytes(4)? != SIGNATURE {
        return Err(UndumpError::new(format!("{name}: not a precompiled chunk")));
    }
    if r.read_byte()? != VERSION {
        return Err(UndumpError::new(format!("{name}: version mismatch")));
    }
    if r.read_byte()? != FORMAT {
        return Err(UndumpError::new(format!("{name}: format mismatch")));
    }
    if r.read_bytes(6)? != TAIL {
        return Err(UndumpError::new(format!("{name}: corrupted chunk")));
    }
    for (expected, what) in [
        (CINT_SIZE, "int"),
        (CSIZET_SIZE, "size_t"),
        (INSTRUCTION_SIZE, "instruction"),
        (LUA_INTEGER_SIZE, "integer"),
        (LUA_NUMBER_SIZE, "float"),
    ] {
        if r.read_byte()? != expected {
            return Err(UndumpError::new(format!("{name}: {what} size mismatch")));
        }
    }
    if r.read_i64()? != CHECK_INT {
        return Err(UndumpError::new(format!("{name}: endianness mismatch")));
    }
    if r.read_f64()? != CHECK_NUM {
        return Err(UndumpError::new(format!("{name}: float format mismatch")));
    }
    Ok(())
}

fn read_function(r: &mut Reader, strings: &mut StringInterner) -> Result<Proto, UndumpError> {
    let mut proto = Proto::new();

    proto.source = r.read_string(strings)?;
    proto.line_defined = r.read_u32()?;
    proto.last_line_defined = r.read_u32()?;
    proto.num_params = r.read_byte()?;
    proto.is_vararg = r.read_byte()? != 0;
    proto.max_stack_size = r.read_byte()?;

    let code_len = r.read_u32()? as usize;
    proto.code = Vec::with_capacity(code_len);
    for _ in 0..code_len {
        proto.code.push(Instruction(r.read_u32()?));
    }

    let const_len = r.read_u32()? as usize;
    proto.constants = Vec::with_capacity(const_len);
    for _ in 0..const_len {
        let tag = r.read_byte()?;
        let k = match tag {
            TAG_NIL => Constant::Nil,
            TAG_BOOLEAN => Constant::Boolean(r.read_byte()? != 0),
            TAG_NUMBER => Constant::Float(r.read_f64()?),
            TAG_INTEGER => Constant::Integer(r.read_i64()?),
            TAG_SHORT_STR | TAG_LONG_STR => {
                let id = r
                    .read_string(strings)?
                    .unwrap_or_else(|| strings.intern(b""));
                Constant::Str(id)
            }
            other => return Err(UndumpError::new(format!("unknown constant tag {other:#x}"))),
        };
        proto.constants.push(k);
    }

    let upval_len = r.read_u32()? as usize;
    proto.upvalues = Vec::with_capacity(upval_len);
    for _ in 0..upval_len {
        let in_stack = r.read_byte()? != 0;
        let index = r.read_byte()?;
        proto.upvalues.push(UpvalDesc {
            name: None, // filled from the debug section below
            in_stack,
            index,
        });
    }

    let proto_len = r.read_u32()? as usize;
    proto.protos = Vec::with_capacity(proto_len);
    for _ in 0..proto_len {
        proto.protos.push(read_function(r, strings)?);
    }

    let line_len = r.read_u32()? as usize;
    proto.line_info = Vec::with_capacity(line_len);
    for _ in 0..line_len {
        proto.line_info.push(r.read_u32()?);
    }

    let local_len = r.read_u32()? as usize;
    proto.local_vars = Vec::with_capacity(local_len);
    for _ in 0..local_len {
        let name = r
            .read_string(strings)?
            .unwrap_or_else(|| strings.intern(b""));
        let start_pc = r.read_u32()?;
        let end_pc = r.read_u32()?;
        proto.local_vars.push(LocalVar {
            name,
            start_pc,
            end_pc,
        });
    }

    let upval_name_len = r.read_u32()? as usize;
    for i in 0..upval_name_len {
        let name = r.read_string(strings)?;
        if i < proto.upvalues.len() {
            proto.upvalues[i].name = name;
        }
    }

    Ok(proto)
}
