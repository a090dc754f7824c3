//! Registration surfaces: template expansion, declarative files and JIT
//! symbol binding.

use jetsql_codegen::{CodegenError, JitEngine};
use jetsql_ir::{Literal, LogicalType};
use jetsql_udf::{ExternalTemplateSpec, UdafTemplateSpec, UdfError, UdfLibrary};
use LogicalType::*;

fn ok<T>(res: Result<T, UdfError>) -> T {
    match res {
        Ok(v) => v,
        Err(e) => panic!("registration failed: {e}"),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

extern "C" fn abs_i32(v: i32) -> i32 {
    v.abs()
}

extern "C" fn abs_i64(v: i64) -> i64 {
    v.abs()
}

#[test]
fn test_external_template_expands_per_type() {
    init_tracing();
    let mut lib = UdfLibrary::new();
    let kinds = [Int32, Int64, Float, Double];
    lib.register_external_template("abs", &kinds, |ty| ExternalTemplateSpec {
        arg_types: vec![ty.clone()],
        returns: ty.clone(),
        symbol: format!("udf_abs_{}", ty.suffix()),
        return_nullable: false,
    })
    .unwrap();

    // one declaration site, one entry per kind
    assert_eq!(lib.find_all("abs").unwrap().len(), kinds.len());
    for ty in &kinds {
        let entry = lib.resolve_function("abs", &[ty.clone()]).unwrap();
        assert_eq!(entry.symbol(), Some(format!("udf_abs_{}", ty.suffix()).as_str()));
    }
}

#[test]
fn test_template_expansion_preserves_duplicate_rejection() {
    let mut lib = UdfLibrary::new();
    let err = lib
        .register_external_template("abs", &[Int32, Int32], |ty| ExternalTemplateSpec {
            arg_types: vec![ty.clone()],
            returns: ty.clone(),
            symbol: format!("udf_abs_{}", ty.suffix()),
            return_nullable: false,
        })
        .unwrap_err();
    assert!(matches!(err, UdfError::DuplicateSignature { .. }));
}

#[test]
fn test_udaf_template() {
    let mut lib = UdfLibrary::new();
    for ty in [Int64, Double] {
        ok(lib
            .register_external(&format!("add_{}", ty.suffix()))
            .args(&[ty.clone(), ty.clone()], ty.clone(), &format!("udf_add_{}", ty.suffix())));
    }

    lib.register_udaf_template("sum", &[Int64, Double], |ty| UdafTemplateSpec {
        init: match ty {
            Int64 => Literal::Int64(0),
            _ => Literal::Double(0.0),
        },
        update: (format!("add_{}", ty.suffix()), vec![ty.clone(), ty.clone()]),
        output: None,
        input_types: vec![ty.clone()],
        returns: ty.clone(),
    })
    .unwrap();

    assert!(lib.is_udaf("sum", 1));
    assert!(lib
        .resolve_function("sum", &[LogicalType::list_of(Int64)])
        .unwrap()
        .is_aggregate());
    assert!(lib
        .resolve_function("sum", &[LogicalType::list_of(Double)])
        .unwrap()
        .is_aggregate());
}

#[test]
fn test_register_from_file() {
    init_tracing();
    let yaml = r#"
functions:
  - name: substr
    aliases: [substring]
    entries:
      - args: [string, int32]
        returns: string
        symbol: udf_substr_pos
      - args: [string, int32, int32]
        returns: string
        symbol: udf_substr_pos_len
  - name: concat_ws
    entries:
      - args: [string, string]
        returns: string
        symbol: udf_concat_ws
        variadic: true
"#;
    let path = std::env::temp_dir().join(format!("jetsql-udfs-{}.yaml", std::process::id()));
    std::fs::write(&path, yaml).unwrap();

    let mut lib = UdfLibrary::new();
    lib.register_from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(lib.find_all("substr").unwrap().len(), 2);
    let direct = lib.resolve_function("substr", &[Str, Int32]).unwrap();
    let via_alias = lib.resolve_function("substring", &[Str, Int32]).unwrap();
    assert_eq!(direct.symbol(), via_alias.symbol());
    assert!(lib.resolve_function("concat_ws", &[Str, Str, Str]).is_ok());
}

#[test]
fn test_register_from_file_missing_path() {
    let mut lib = UdfLibrary::new();
    let err = lib.register_from_file("/nonexistent/udfs.yaml").unwrap_err();
    assert!(matches!(err, UdfError::Io(_)));
}

#[test]
fn test_init_jit_symbols_binds_recorded_addresses() {
    let mut lib = UdfLibrary::new();
    ok(lib
        .register_external("abs")
        .args_with_addr(&[Int32], Int32, "udf_abs_i32", abs_i32 as usize));
    ok(lib.register_external("abs").args(&[Int64], Int64, "udf_abs_i64"));
    // second symbol gets its address attached later
    lib.add_external_function("udf_abs_i64", abs_i64 as usize);

    let mut jit = JitEngine::new().unwrap();
    lib.init_jit_symbols(&mut jit).unwrap();
    jit.finalize().unwrap();

    assert_eq!(jit.symbol_address("udf_abs_i32").unwrap(), abs_i32 as usize);
    assert_eq!(jit.symbol_address("udf_abs_i64").unwrap(), abs_i64 as usize);
}

#[test]
fn test_init_jit_symbols_fails_on_unbound_symbol() {
    let mut lib = UdfLibrary::new();
    ok(lib.register_external("abs").args(&[Int32], Int32, "udf_abs_i32"));

    let mut jit = JitEngine::new().unwrap();
    let err = lib.init_jit_symbols(&mut jit).unwrap_err();
    assert!(matches!(
        err,
        UdfError::Codegen(CodegenError::SymbolNotBound(sym)) if sym == "udf_abs_i32"
    ));
}
