//! The process-wide UDF catalog.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use jetsql_codegen::{CodegenError, JitEngine};
use jetsql_ir::{arg_types, Expr, Literal, LogicalType, TypedExpr};
use tracing::{debug, info};

use crate::registry::{
    CodeGenUdfBuilder, CodeGenUdfGen, ExprUdfBuilder, ExprUdfGen, ExternalUdfBuilder,
    RegistryEntry, UdafBuilder, UdfKind,
};
use crate::signature::{Signature, SignatureTable};
use crate::UdfError;

/// Per-function-name record: the overload table plus name-level markers the
/// planner and code generator consult.
#[derive(Debug, Clone)]
pub struct LibraryEntry {
    signatures: SignatureTable<Arc<RegistryEntry>>,
    udaf_arities: HashSet<usize>,
    always_list_args: BTreeSet<usize>,
    always_return_list: bool,
}

impl Default for LibraryEntry {
    fn default() -> Self {
        Self {
            signatures: SignatureTable::new(),
            udaf_arities: HashSet::new(),
            always_list_args: BTreeSet::new(),
            always_return_list: false,
        }
    }
}

impl LibraryEntry {
    pub fn signatures(&self) -> &SignatureTable<Arc<RegistryEntry>> {
        &self.signatures
    }
}

/// Name -> overload catalog with alias handling and the native symbol table
/// for JIT linking.
///
/// Registration is single-threaded and happens before any resolution; once
/// built the library is immutable and freely shareable (`&self` only on the
/// resolution paths, no interior mutability).
#[derive(Debug, Default)]
pub struct UdfLibrary {
    functions: HashMap<String, LibraryEntry>,
    aliases: HashMap<String, String>,
    // Symbol name -> address; the address may be attached after the
    // name-only registration.
    external_symbols: HashMap<String, Option<usize>>,
    case_sensitive: bool,
}

impl UdfLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_case_sensitivity(case_sensitive: bool) -> Self {
        Self { case_sensitive, ..Self::default() }
    }

    fn fold(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    /// Case folding plus alias resolution.
    fn canonical_name(&self, name: &str) -> Result<String, UdfError> {
        let folded = self.fold(name);
        match self.aliases.get(&folded) {
            Some(target) if self.functions.contains_key(target) => Ok(target.clone()),
            Some(target) => Err(UdfError::UnknownAlias {
                alias: folded,
                target: target.clone(),
            }),
            None => Ok(folded),
        }
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.canonical_name(name)
            .map(|n| self.functions.contains_key(&n))
            .unwrap_or(false)
    }

    /// Resolve a call to a concrete registry entry.
    pub fn resolve_function(
        &self,
        name: &str,
        actual: &[LogicalType],
    ) -> Result<Arc<RegistryEntry>, UdfError> {
        let canonical = self.canonical_name(name)?;
        let entry = self
            .functions
            .get(&canonical)
            .ok_or_else(|| UdfError::UnknownFunction(canonical.clone()))?;
        entry.signatures.lookup(&canonical, actual).cloned()
    }

    /// Resolve and rewrite: expr-rewrite entries instantiate their template
    /// over the bound arguments; every other strategy is wrapped in a call
    /// node carrying the canonical name.
    pub fn transform(&self, name: &str, args: &[TypedExpr]) -> Result<Expr, UdfError> {
        let entry = self.resolve_function(name, &arg_types(args))?;
        match &entry.kind {
            UdfKind::ExprRewrite(gen) => gen(args),
            _ => Ok(Expr::call(
                entry.name.clone(),
                args.iter().map(|a| a.expr.clone()).collect(),
            )),
        }
    }

    /// Aggregate-ness is tracked per name and arity: the same name may be
    /// overloaded as both a scalar and an aggregate function.
    pub fn is_udaf(&self, name: &str, arity: usize) -> bool {
        self.canonical_name(name)
            .ok()
            .and_then(|n| self.functions.get(&n))
            .map(|e| e.udaf_arities.contains(&arity))
            .unwrap_or(false)
    }

    /// Flag writes resolve through the alias map like the read paths, so the
    /// marker always lands on the canonical entry. A name that is neither an
    /// alias nor registered yet gets its canonical entry created.
    pub fn set_is_udaf(&mut self, name: &str, arity: usize) {
        let folded = self.fold(name);
        let target = self.aliases.get(&folded).cloned().unwrap_or(folded);
        self.functions.entry(target).or_default().udaf_arities.insert(arity);
    }

    /// Whether the argument at `index` must be pre-materialized as a list
    /// value.
    pub fn require_list_at(&self, name: &str, index: usize) -> bool {
        self.canonical_name(name)
            .ok()
            .and_then(|n| self.functions.get(&n))
            .map(|e| e.always_list_args.contains(&index))
            .unwrap_or(false)
    }

    /// Whether call sites must allocate list-shaped storage for the result.
    pub fn is_list_return(&self, name: &str) -> bool {
        self.canonical_name(name)
            .ok()
            .and_then(|n| self.functions.get(&n))
            .map(|e| e.always_return_list)
            .unwrap_or(false)
    }

    /// Introspection: all overloads registered under a name.
    pub fn find_all(&self, name: &str) -> Option<&SignatureTable<Arc<RegistryEntry>>> {
        let canonical = self.canonical_name(name).ok()?;
        self.functions.get(&canonical).map(|e| &e.signatures)
    }

    /// Register `alias` for `name`. The alias and canonical namespaces are
    /// disjoint; re-registering the same alias to the same target is
    /// allowed.
    pub fn register_alias(&mut self, alias: &str, name: &str) -> Result<(), UdfError> {
        let alias = self.fold(alias);
        // flatten alias-to-alias registration onto the canonical name
        let target = self.canonical_name(name)?;
        if !self.functions.contains_key(&target) {
            return Err(UdfError::UnknownFunction(target));
        }
        if self.functions.contains_key(&alias) {
            return Err(UdfError::AliasCollision {
                alias: alias.clone(),
                existing: format!("registered function {alias}"),
            });
        }
        match self.aliases.get(&alias) {
            Some(existing) if *existing != target => Err(UdfError::AliasCollision {
                alias,
                existing: existing.clone(),
            }),
            _ => {
                debug!(alias = %alias, target = %target, "registered function alias");
                self.aliases.insert(alias, target);
                Ok(())
            }
        }
    }

    /// Low-level insertion every registration helper funnels into.
    pub fn insert_entry(&mut self, mut entry: RegistryEntry) -> Result<(), UdfError> {
        let canonical = self.fold(&entry.name);
        if self.aliases.contains_key(&canonical) {
            return Err(UdfError::AliasCollision {
                alias: canonical.clone(),
                existing: self.aliases[&canonical].clone(),
            });
        }
        entry.name = canonical.clone();

        let is_udaf = entry.is_aggregate();
        let arity = entry.signature.arity();
        let always_list: Vec<usize> = entry.signature.always_list().iter().copied().collect();
        let returns_list = entry.returns_list();
        let signature = entry.signature.clone();

        debug!(
            name = %canonical,
            signature = %signature,
            kind = ?entry.kind,
            "registering udf"
        );

        let lib_entry = self.functions.entry(canonical.clone()).or_default();
        lib_entry
            .signatures
            .insert(&canonical, signature, Arc::new(entry))?;
        lib_entry.always_list_args.extend(always_list);
        lib_entry.always_return_list |= returns_list;
        if is_udaf {
            lib_entry.udaf_arities.insert(arity);
        }
        Ok(())
    }

    pub(crate) fn record_symbol(&mut self, symbol: &str, addr: Option<usize>) {
        let slot = self.external_symbols.entry(symbol.to_string()).or_insert(None);
        if addr.is_some() {
            *slot = addr;
        }
    }

    /// Attach the native address for a previously name-only external
    /// registration.
    pub fn add_external_function(&mut self, symbol: &str, addr: usize) {
        self.external_symbols.insert(symbol.to_string(), Some(addr));
    }

    /// Bind every recorded external symbol into the JIT engine. Must run to
    /// completion, once per engine instance, before that engine's compiled
    /// code is invoked; a symbol with no attached address is a registration
    /// bug and fails hard.
    pub fn init_jit_symbols(&self, jit: &mut JitEngine) -> Result<(), UdfError> {
        for (symbol, addr) in &self.external_symbols {
            match addr {
                Some(addr) => jit.define_symbol(symbol, *addr)?,
                None => return Err(CodegenError::SymbolNotBound(symbol.clone()).into()),
            }
        }
        info!(count = self.external_symbols.len(), "bound external UDF symbols into JIT");
        Ok(())
    }

    // Registration entry points, one per implementation strategy.

    pub fn register_expr_udf(&mut self, name: &str) -> ExprUdfBuilder<'_> {
        let name = name.to_string();
        ExprUdfBuilder { lib: self, name }
    }

    pub fn register_codegen_udf(&mut self, name: &str) -> CodeGenUdfBuilder<'_> {
        let name = name.to_string();
        CodeGenUdfBuilder { lib: self, name, return_nullable: false }
    }

    pub fn register_external(&mut self, name: &str) -> ExternalUdfBuilder<'_> {
        let name = name.to_string();
        ExternalUdfBuilder { lib: self, name, return_nullable: false }
    }

    pub fn register_udaf(&mut self, name: &str) -> UdafBuilder<'_> {
        let name = name.to_string();
        UdafBuilder { lib: self, name, init: None, update: None, output: None }
    }

    // Template registration: one declaration site expanding into one entry
    // per listed primitive kind, sharing the same logical behavior.
    // Duplicate rejection still applies across the expansion.

    pub fn register_external_template<F>(
        &mut self,
        name: &str,
        kinds: &[LogicalType],
        spec: F,
    ) -> Result<(), UdfError>
    where
        F: Fn(&LogicalType) -> ExternalTemplateSpec,
    {
        for kind in kinds {
            let s = spec(kind);
            let mut builder = self.register_external(name);
            if s.return_nullable {
                builder = builder.return_nullable();
            }
            builder.args(&s.arg_types, s.returns, &s.symbol)?;
        }
        Ok(())
    }

    pub fn register_codegen_udf_template<F>(
        &mut self,
        name: &str,
        kinds: &[LogicalType],
        spec: F,
    ) -> Result<(), UdfError>
    where
        F: Fn(&LogicalType) -> CodeGenTemplateSpec,
    {
        for kind in kinds {
            let s = spec(kind);
            let entry = RegistryEntry {
                name: name.to_string(),
                signature: Signature::new(s.arg_types),
                return_type: s.returns,
                return_nullable: false,
                kind: UdfKind::CodeGenInline(s.gen),
            };
            self.insert_entry(entry)?;
        }
        Ok(())
    }

    pub fn register_expr_udf_template<F>(
        &mut self,
        name: &str,
        kinds: &[LogicalType],
        spec: F,
    ) -> Result<(), UdfError>
    where
        F: Fn(&LogicalType) -> ExprTemplateSpec,
    {
        for kind in kinds {
            let s = spec(kind);
            let entry = RegistryEntry {
                name: name.to_string(),
                signature: Signature::new(s.arg_types),
                return_type: s.returns,
                return_nullable: false,
                kind: UdfKind::ExprRewrite(s.gen),
            };
            self.insert_entry(entry)?;
        }
        Ok(())
    }

    pub fn register_udaf_template<F>(
        &mut self,
        name: &str,
        kinds: &[LogicalType],
        spec: F,
    ) -> Result<(), UdfError>
    where
        F: Fn(&LogicalType) -> UdafTemplateSpec,
    {
        for kind in kinds {
            let s = spec(kind);
            let mut builder = self.register_udaf(name).init(s.init);
            builder = builder.update(&s.update.0, &s.update.1)?;
            if let Some((func, args)) = s.output {
                builder = builder.output(&func, &args)?;
            }
            builder.register(&s.input_types, s.returns)?;
        }
        Ok(())
    }
}

/// Per-type expansion of an external registration.
pub struct ExternalTemplateSpec {
    pub arg_types: Vec<LogicalType>,
    pub returns: LogicalType,
    pub symbol: String,
    pub return_nullable: bool,
}

/// Per-type expansion of an inline-codegen registration.
pub struct CodeGenTemplateSpec {
    pub arg_types: Vec<LogicalType>,
    pub returns: LogicalType,
    pub gen: CodeGenUdfGen,
}

/// Per-type expansion of an expr-rewrite registration.
pub struct ExprTemplateSpec {
    pub arg_types: Vec<LogicalType>,
    pub returns: LogicalType,
    pub gen: ExprUdfGen,
}

/// Per-type expansion of an aggregate registration.
pub struct UdafTemplateSpec {
    pub init: Literal,
    pub update: (String, Vec<LogicalType>),
    pub output: Option<(String, Vec<LogicalType>)>,
    pub input_types: Vec<LogicalType>,
    pub returns: LogicalType,
}
