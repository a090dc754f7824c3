//! JetSQL code generation support - type bridge and JIT engine wrapper
//!
//! Maps the logical type system onto Cranelift's value representation and
//! owns the JIT symbol table consumed at module-load time. Resolution
//! decisions made by the UDF library are only meaningful together with the
//! bidirectional type correspondence defined here.

mod bridge;
mod jit;

pub use bridge::*;
pub use jit::*;

use jetsql_ir::LogicalType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("unsupported type for native codegen: {0}")]
    UnsupportedType(LogicalType),

    #[error("native symbol not bound: {0}")]
    SymbolNotBound(String),

    #[error("JIT engine already finalized; symbols must be defined first")]
    EngineFinalized,

    #[error("JIT engine not finalized yet")]
    EngineNotFinalized,

    #[error("module error: {0}")]
    Module(#[from] cranelift_module::ModuleError),

    #[error("codegen failed: {0}")]
    Codegen(String),
}
