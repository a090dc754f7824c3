//! Registry entries and the typed registration builders.
//!
//! Each builder is bound to one implementation strategy; all four funnel
//! into [`UdfLibrary::insert_entry`](crate::UdfLibrary::insert_entry).

use std::fmt;
use std::sync::Arc;

use cranelift::codegen::ir::Value as NativeValue;
use cranelift::frontend::FunctionBuilder;
use jetsql_codegen::CodegenError;
use jetsql_ir::{Expr, Literal, LogicalType, TypedExpr};

use crate::library::UdfLibrary;
use crate::signature::Signature;
use crate::UdfError;

/// Expression-rewrite payload: builds a replacement subtree from the bound
/// argument expressions. No native code is generated.
pub type ExprUdfGen = Arc<dyn Fn(&[TypedExpr]) -> Result<Expr, UdfError> + Send + Sync>;

/// Inline-codegen payload: invoked during code generation with the native
/// argument values already materialized; emits instructions and returns the
/// result value.
pub type CodeGenUdfGen = Arc<
    dyn for<'a> Fn(&mut FunctionBuilder<'a>, &[NativeValue]) -> Result<NativeValue, CodegenError>
        + Send
        + Sync,
>;

/// Aggregate sub-function triple: accumulator init value, fold step, final
/// output extraction (identity when absent).
#[derive(Debug, Clone)]
pub struct UdafDef {
    pub init: Literal,
    pub update: Arc<RegistryEntry>,
    pub output: Option<Arc<RegistryEntry>>,
}

/// Implementation strategy, matched exhaustively by the rewriter and the
/// code generator.
#[derive(Clone)]
pub enum UdfKind {
    ExprRewrite(ExprUdfGen),
    CodeGenInline(CodeGenUdfGen),
    External { symbol: String },
    Udaf(UdafDef),
}

impl fmt::Debug for UdfKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UdfKind::ExprRewrite(_) => write!(f, "ExprRewrite"),
            UdfKind::CodeGenInline(_) => write!(f, "CodeGenInline"),
            UdfKind::External { symbol } => write!(f, "External({symbol})"),
            UdfKind::Udaf(def) => write!(f, "Udaf(update={})", def.update.name),
        }
    }
}

/// One concrete, selectable implementation. Created at registration time,
/// immutable afterwards.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub name: String,
    pub signature: Signature,
    pub return_type: LogicalType,
    pub return_nullable: bool,
    pub kind: UdfKind,
}

impl RegistryEntry {
    pub fn returns_list(&self) -> bool {
        self.return_type.is_list()
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.kind, UdfKind::Udaf(_))
    }

    /// Native symbol name for external entries.
    pub fn symbol(&self) -> Option<&str> {
        match &self.kind {
            UdfKind::External { symbol } => Some(symbol),
            _ => None,
        }
    }
}

/// Builder for expression-rewrite functions.
pub struct ExprUdfBuilder<'a> {
    pub(crate) lib: &'a mut UdfLibrary,
    pub(crate) name: String,
}

impl ExprUdfBuilder<'_> {
    pub fn args<F>(self, arg_types: &[LogicalType], returns: LogicalType, gen: F) -> Result<Self, UdfError>
    where
        F: Fn(&[TypedExpr]) -> Result<Expr, UdfError> + Send + Sync + 'static,
    {
        self.insert(Signature::new(arg_types.to_vec()), returns, Arc::new(gen))
    }

    pub fn variadic_args<F>(
        self,
        arg_types: &[LogicalType],
        returns: LogicalType,
        gen: F,
    ) -> Result<Self, UdfError>
    where
        F: Fn(&[TypedExpr]) -> Result<Expr, UdfError> + Send + Sync + 'static,
    {
        self.insert(Signature::variadic(arg_types.to_vec()), returns, Arc::new(gen))
    }

    fn insert(self, signature: Signature, returns: LogicalType, gen: ExprUdfGen) -> Result<Self, UdfError> {
        let entry = RegistryEntry {
            name: self.name.clone(),
            signature,
            return_type: returns,
            return_nullable: false,
            kind: UdfKind::ExprRewrite(gen),
        };
        self.lib.insert_entry(entry)?;
        Ok(self)
    }
}

/// Builder for inline-codegen functions.
pub struct CodeGenUdfBuilder<'a> {
    pub(crate) lib: &'a mut UdfLibrary,
    pub(crate) name: String,
    pub(crate) return_nullable: bool,
}

impl CodeGenUdfBuilder<'_> {
    pub fn return_nullable(mut self) -> Self {
        self.return_nullable = true;
        self
    }

    pub fn args<F>(self, arg_types: &[LogicalType], returns: LogicalType, gen: F) -> Result<Self, UdfError>
    where
        F: for<'b> Fn(&mut FunctionBuilder<'b>, &[NativeValue]) -> Result<NativeValue, CodegenError>
            + Send
            + Sync
            + 'static,
    {
        let entry = RegistryEntry {
            name: self.name.clone(),
            signature: Signature::new(arg_types.to_vec()),
            return_type: returns,
            return_nullable: self.return_nullable,
            kind: UdfKind::CodeGenInline(Arc::new(gen)),
        };
        self.lib.insert_entry(entry)?;
        Ok(self)
    }
}

/// Builder for external native functions. Registering records the symbol
/// name in the library's symbol table; the address may be attached here or
/// later via [`UdfLibrary::add_external_function`](crate::UdfLibrary::add_external_function).
pub struct ExternalUdfBuilder<'a> {
    pub(crate) lib: &'a mut UdfLibrary,
    pub(crate) name: String,
    pub(crate) return_nullable: bool,
}

impl ExternalUdfBuilder<'_> {
    pub fn return_nullable(mut self) -> Self {
        self.return_nullable = true;
        self
    }

    pub fn args(
        self,
        arg_types: &[LogicalType],
        returns: LogicalType,
        symbol: &str,
    ) -> Result<Self, UdfError> {
        self.insert(Signature::new(arg_types.to_vec()), returns, symbol, None)
    }

    pub fn args_with_addr(
        self,
        arg_types: &[LogicalType],
        returns: LogicalType,
        symbol: &str,
        addr: usize,
    ) -> Result<Self, UdfError> {
        self.insert(Signature::new(arg_types.to_vec()), returns, symbol, Some(addr))
    }

    pub fn variadic_args(
        self,
        arg_types: &[LogicalType],
        returns: LogicalType,
        symbol: &str,
    ) -> Result<Self, UdfError> {
        self.insert(Signature::variadic(arg_types.to_vec()), returns, symbol, None)
    }

    fn insert(
        self,
        signature: Signature,
        returns: LogicalType,
        symbol: &str,
        addr: Option<usize>,
    ) -> Result<Self, UdfError> {
        let entry = RegistryEntry {
            name: self.name.clone(),
            signature,
            return_type: returns,
            return_nullable: self.return_nullable,
            kind: UdfKind::External { symbol: symbol.to_string() },
        };
        self.lib.insert_entry(entry)?;
        self.lib.record_symbol(symbol, addr);
        Ok(self)
    }
}

/// Builder for aggregate functions. The update/output sub-functions are
/// resolved against the library at registration time, so they must already
/// be registered.
pub struct UdafBuilder<'a> {
    pub(crate) lib: &'a mut UdfLibrary,
    pub(crate) name: String,
    pub(crate) init: Option<Literal>,
    pub(crate) update: Option<Arc<RegistryEntry>>,
    pub(crate) output: Option<Arc<RegistryEntry>>,
}

impl UdafBuilder<'_> {
    pub fn init(mut self, value: Literal) -> Self {
        self.init = Some(value);
        self
    }

    /// Fold step `(accumulator, input) -> accumulator`, named by an already
    /// registered function.
    pub fn update(mut self, func: &str, arg_types: &[LogicalType]) -> Result<Self, UdfError> {
        self.update = Some(self.lib.resolve_function(func, arg_types)?);
        Ok(self)
    }

    /// Final output extraction `accumulator -> result`. Identity when not
    /// set.
    pub fn output(mut self, func: &str, arg_types: &[LogicalType]) -> Result<Self, UdfError> {
        self.output = Some(self.lib.resolve_function(func, arg_types)?);
        Ok(self)
    }

    /// Register the aggregate over the given input types. Scalar inputs are
    /// wrapped to list semantics and every input position is flagged
    /// always-list; the name is marked as a UDAF at this arity.
    pub fn register(self, input_types: &[LogicalType], returns: LogicalType) -> Result<(), UdfError> {
        let init = self.init.ok_or_else(|| UdfError::InvalidRegistration {
            name: self.name.clone(),
            reason: "aggregate requires an init value".to_string(),
        })?;
        let update = self.update.ok_or_else(|| UdfError::InvalidRegistration {
            name: self.name.clone(),
            reason: "aggregate requires an update function".to_string(),
        })?;

        let wrapped: Vec<LogicalType> = input_types
            .iter()
            .map(|t| {
                if t.is_list() || t.is_iterator() {
                    t.clone()
                } else {
                    LogicalType::list_of(t.clone())
                }
            })
            .collect();
        let mut signature = Signature::new(wrapped);
        for idx in 0..input_types.len() {
            signature = signature.with_always_list(idx);
        }

        let entry = RegistryEntry {
            name: self.name.clone(),
            signature,
            return_type: returns,
            return_nullable: false,
            kind: UdfKind::Udaf(UdafDef { init, update, output: self.output }),
        };
        self.lib.insert_entry(entry)
    }
}
