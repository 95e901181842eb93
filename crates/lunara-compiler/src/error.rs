//! Compile-time error type shared by the lexer front end, parser, and codegen.

use crate::lexer::LexError;
use std::fmt;

/// Which stage rejected the chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntactic,
    Semantic,
}

/// A compile-time failure. No partial prototype is ever produced.
#[derive(Clone, Debug)]
pub struct CompileError {
    pub message: String,
    pub line: u32,
    pub kind: ErrorKind,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.line, self.message)
    }
}

impl std::error::Error for CompileError {}

impl From<LexError> for CompileError {
    fn from(e: LexError) -> Self {
        CompileError {
            message: e.message,
            line: e.line,
            kind: ErrorKind::Lexical,
        }
    }
}
