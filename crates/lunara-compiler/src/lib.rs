//! Lunara compiler: lexer, recursive-descent parser, and bytecode generator
//! targeting the Lua 5.3 instruction set.

pub mod ast;
pub mod codegen;
pub mod disasm;
pub mod error;
pub mod lexer;
pub mod opcode;
pub mod parser;
pub mod proto;
pub mod token;

use error::CompileError;
use lunara_core::string::StringInterner;
use parser::Parser;
use proto::Proto;

/// Compile a source chunk into its main prototype, interning strings into
/// the caller's table (so compiled chunks can be loaded into a live state).
pub fn compile(
    source: &[u8],
    chunk_name: &str,
    strings: &mut StringInterner,
) -> Result<Proto, CompileError> {
    let table = std::mem::take(strings);
    let mut parser = Parser::with_strings(source, table);
    let parsed = parser.parse_chunk();
    *strings = parser.into_strings();
    let block = parsed?;
    codegen::gen_chunk(&block, chunk_name, strings)
}

/// Compile a chunk with a fresh string table.
pub fn compile_standalone(
    source: &[u8],
    chunk_name: &str,
) -> Result<(Proto, StringInterner), CompileError> {
    let mut strings = StringInterner::new();
    let proto = compile(source, chunk_name, &mut strings)?;
    Ok((proto, strings))
}
