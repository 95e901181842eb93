//! Lunara virtual machine: register-based dispatch over compiled
//! prototypes, the binary chunk codec, the host stack API, and the base
//! library natives.

pub mod api;
pub mod arith;
pub mod binary_chunk;
pub mod callinfo;
pub mod coerce;
pub mod compare;
pub mod dispatch;
pub mod error;
pub mod metamethod;
pub mod stdlib;
pub mod vm;

pub use error::LuaError;
pub use vm::{RunError, Vm};
