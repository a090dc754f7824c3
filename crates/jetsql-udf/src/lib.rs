//! JetSQL UDF library - function registration and resolution
//!
//! The process-wide catalog of callable functions: name -> overload set,
//! alias handling, aggregate tracking, list/variadic argument semantics.
//! Both the expression rewriter and the code generator resolve calls through
//! [`UdfLibrary`]; external native symbols registered here are later bound
//! into the JIT engine for linking.
//!
//! The contract is single-writer-then-frozen: registration happens once at
//! startup on one thread, after which the library is shared read-only.

mod decl;
mod library;
mod registry;
mod signature;

pub use decl::{EntryDecl, UdfDecl, UdfFile};
pub use library::{
    CodeGenTemplateSpec, ExprTemplateSpec, ExternalTemplateSpec, LibraryEntry, UdafTemplateSpec,
    UdfLibrary,
};
pub use registry::*;
pub use signature::{Signature, SignatureTable};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UdfError {
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("alias {alias} points to unregistered function {target}")]
    UnknownAlias { alias: String, target: String },

    #[error("no matching signature for {name}({actual}); registered: {registered}")]
    NoMatchingSignature { name: String, actual: String, registered: String },

    #[error("multiple matching signatures for {name}({actual}): {candidates}")]
    AmbiguousSignature { name: String, actual: String, candidates: String },

    #[error("duplicate signature registered for {name}: {signature}")]
    DuplicateSignature { name: String, signature: String },

    #[error("alias {alias} collides with {existing}")]
    AliasCollision { alias: String, existing: String },

    #[error("invalid registration for {name}: {reason}")]
    InvalidRegistration { name: String, reason: String },

    #[error(transparent)]
    Codegen(#[from] jetsql_codegen::CodegenError),

    #[error("failed to read UDF definition file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse UDF definition file: {0}")]
    Parse(#[from] serde_yaml::Error),
}
