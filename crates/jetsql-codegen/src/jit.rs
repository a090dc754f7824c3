//! JIT execution engine wrapper.
//!
//! Symbol binding happens in two phases: external addresses are defined on
//! the builder, then `finalize` creates the module. Compiled code referencing
//! an external symbol must not run before its address was defined, so
//! defining symbols after finalization is an error rather than a no-op.

use std::collections::HashMap;

use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::default_libcall_names;
use tracing::debug;

use crate::CodegenError;

pub struct JitEngine {
    builder: Option<JITBuilder>,
    module: Option<JITModule>,
    // Shadow table for introspection; addresses stored as usize so the
    // engine stays Send.
    symbols: HashMap<String, usize>,
}

impl JitEngine {
    pub fn new() -> Result<Self, CodegenError> {
        let builder = JITBuilder::new(default_libcall_names())?;
        Ok(Self { builder: Some(builder), module: None, symbols: HashMap::new() })
    }

    /// Bind a native symbol name to an address. Must happen before
    /// [`JitEngine::finalize`].
    pub fn define_symbol(&mut self, name: &str, addr: usize) -> Result<(), CodegenError> {
        let builder = self.builder.as_mut().ok_or(CodegenError::EngineFinalized)?;
        builder.symbol(name, addr as *const u8);
        self.symbols.insert(name.to_string(), addr);
        debug!(symbol = name, addr, "bound JIT symbol");
        Ok(())
    }

    /// Create the JIT module. Consumes the symbol-definition phase; no
    /// further symbols can be defined afterwards.
    pub fn finalize(&mut self) -> Result<(), CodegenError> {
        let builder = self.builder.take().ok_or(CodegenError::EngineFinalized)?;
        self.module = Some(JITModule::new(builder));
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.module.is_some()
    }

    pub fn module_mut(&mut self) -> Result<&mut JITModule, CodegenError> {
        self.module.as_mut().ok_or(CodegenError::EngineNotFinalized)
    }

    /// Address a symbol was bound to, for diagnostics and linking checks.
    pub fn symbol_address(&self, name: &str) -> Result<usize, CodegenError> {
        self.symbols
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::SymbolNotBound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn stub(x: i64) -> i64 {
        x + 1
    }

    #[test]
    fn test_define_then_finalize() {
        let mut jit = JitEngine::new().unwrap();
        jit.define_symbol("stub", stub as usize).unwrap();
        assert!(!jit.is_finalized());
        jit.finalize().unwrap();
        assert!(jit.is_finalized());
        assert_eq!(jit.symbol_address("stub").unwrap(), stub as usize);
    }

    #[test]
    fn test_define_after_finalize_fails() {
        let mut jit = JitEngine::new().unwrap();
        jit.finalize().unwrap();
        let err = jit.define_symbol("late", 0x1000).unwrap_err();
        assert!(matches!(err, CodegenError::EngineFinalized));
    }

    #[test]
    fn test_unbound_symbol() {
        let jit = JitEngine::new().unwrap();
        let err = jit.symbol_address("missing").unwrap_err();
        assert!(matches!(err, CodegenError::SymbolNotBound(name) if name == "missing"));
    }
}
