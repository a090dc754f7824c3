//! Bidirectional bridge between logical types and Cranelift's representation.
//!
//! Conventions (consistent across the whole generator):
//! - strings are length-prefixed structs `{ len: i32, data: ptr }`, never a
//!   bare byte pointer;
//! - lists/iterators are structs `{ data: ptr, size: i64, pos: i64 }` passed
//!   by pointer;
//! - nullable values are a value plus a sibling `i8` flag;
//! - "large" returns (strings, lists, nullable composites) go out through a
//!   struct-return pointer argument. This is an ABI rule, not an
//!   optimization.

use cranelift::codegen::ir::{types, AbiParam, ArgumentPurpose, InstBuilder, MemFlags, Signature, Type, Value};
use cranelift::codegen::isa::{CallConv, TargetIsa};
use cranelift::frontend::FunctionBuilder;
use cranelift_module::{DataDescription, Module};
use jetsql_ir::LogicalType;

use crate::CodegenError;

/// Native-side type descriptor.
///
/// Cranelift only has scalar value types; aggregate shapes (string refs,
/// list refs, nullable wrappers) are memory conventions, so the bridge keeps
/// its own closed descriptor that both sides can be recovered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeType {
    Bool,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    Date,
    Timestamp,
    /// `{ len: i32, data: ptr }`
    StringRef,
    /// `{ data: ptr, size: i64, pos: i64 }`
    ListRef(Box<NativeType>),
    /// Same layout as `ListRef`, `pos` is the cursor.
    IterRef(Box<NativeType>),
    /// Value plus sibling `i8` null flag.
    Nullable(Box<NativeType>),
}

impl NativeType {
    /// The Cranelift value type a value of this native type occupies when
    /// held in a register. Reference shapes are carried as pointers.
    pub fn value_type(&self, ptr_type: Type) -> Type {
        match self {
            NativeType::Bool => types::I8,
            NativeType::Int16 => types::I16,
            NativeType::Int32 => types::I32,
            NativeType::Int64 => types::I64,
            NativeType::Float => types::F32,
            NativeType::Double => types::F64,
            NativeType::Date => types::I32,
            NativeType::Timestamp => types::I64,
            NativeType::StringRef
            | NativeType::ListRef(_)
            | NativeType::IterRef(_)
            | NativeType::Nullable(_) => ptr_type,
        }
    }

    /// True when values of this type cannot be returned by value across all
    /// supported backends and must go through a struct-return argument.
    pub fn is_large(&self) -> bool {
        matches!(
            self,
            NativeType::StringRef
                | NativeType::ListRef(_)
                | NativeType::IterRef(_)
                | NativeType::Nullable(_)
        )
    }
}

/// Map a logical type to its native descriptor.
pub fn to_native_type(ty: &LogicalType) -> Result<NativeType, CodegenError> {
    Ok(match ty {
        LogicalType::Bool => NativeType::Bool,
        LogicalType::Int16 => NativeType::Int16,
        LogicalType::Int32 => NativeType::Int32,
        LogicalType::Int64 => NativeType::Int64,
        LogicalType::Float => NativeType::Float,
        LogicalType::Double => NativeType::Double,
        LogicalType::Date => NativeType::Date,
        LogicalType::Timestamp => NativeType::Timestamp,
        LogicalType::Str => NativeType::StringRef,
        LogicalType::List(elem) => NativeType::ListRef(Box::new(to_native_type(elem)?)),
        LogicalType::Iterator(elem) => NativeType::IterRef(Box::new(to_native_type(elem)?)),
    })
}

/// Inverse direction, used to recover a logical type from a pre-existing
/// native value. `Nullable` unwraps to its inner type; nullability is
/// tracked outside the logical type.
pub fn from_native_type(ty: &NativeType) -> Result<LogicalType, CodegenError> {
    Ok(match ty {
        NativeType::Bool => LogicalType::Bool,
        NativeType::Int16 => LogicalType::Int16,
        NativeType::Int32 => LogicalType::Int32,
        NativeType::Int64 => LogicalType::Int64,
        NativeType::Float => LogicalType::Float,
        NativeType::Double => LogicalType::Double,
        NativeType::Date => LogicalType::Date,
        NativeType::Timestamp => LogicalType::Timestamp,
        NativeType::StringRef => LogicalType::Str,
        NativeType::ListRef(elem) => LogicalType::list_of(from_native_type(elem)?),
        NativeType::IterRef(elem) => LogicalType::iterator_of(from_native_type(elem)?),
        NativeType::Nullable(inner) => from_native_type(inner)?,
    })
}

/// Best-effort inference from a raw Cranelift value type, for codegen
/// intermediates. Integer widths collapse to the int kinds.
pub fn from_value_type(ty: Type) -> Option<LogicalType> {
    match ty {
        types::I8 => Some(LogicalType::Bool),
        types::I16 => Some(LogicalType::Int16),
        types::I32 => Some(LogicalType::Int32),
        types::I64 => Some(LogicalType::Int64),
        types::F32 => Some(LogicalType::Float),
        types::F64 => Some(LogicalType::Double),
        _ => None,
    }
}

/// Offsets within the list/iterator struct.
pub const LIST_DATA_OFFSET: i32 = 0;
pub const LIST_SIZE_OFFSET: i32 = 8;
pub const LIST_POS_OFFSET: i32 = 16;

/// Native function signature produced by the bridge, together with the
/// calling-convention decision for the return value.
#[derive(Debug, Clone)]
pub struct BridgedSignature {
    pub signature: Signature,
    /// The return value is written through a leading struct-return pointer
    /// instead of being returned by value.
    pub return_by_arg: bool,
}

/// Builds native signatures and constants for one target configuration.
#[derive(Debug, Clone, Copy)]
pub struct TypeBridge {
    ptr_type: Type,
    call_conv: CallConv,
}

impl TypeBridge {
    pub fn new(ptr_type: Type, call_conv: CallConv) -> Self {
        Self { ptr_type, call_conv }
    }

    pub fn for_module(module: &impl Module) -> Self {
        let isa = module.isa();
        Self::new(isa.pointer_type(), isa.default_call_conv())
    }

    pub fn ptr_type(&self) -> Type {
        self.ptr_type
    }

    /// Offset of the data pointer inside the string struct. The length is at
    /// offset 0; the pointer follows at pointer alignment.
    pub fn string_data_offset(&self) -> i32 {
        self.ptr_type.bytes().max(4) as i32
    }

    /// Cranelift value type for a logical type.
    pub fn value_type(&self, ty: &LogicalType) -> Result<Type, CodegenError> {
        Ok(to_native_type(ty)?.value_type(self.ptr_type))
    }

    /// Build the native signature for a function.
    ///
    /// Nullable arguments become a value param plus an `i8` flag param.
    /// Large or nullable returns switch to return-via-out-parameter. A
    /// variadic tail lowers to a `{ data: ptr, count: i64 }` pair, since
    /// native signatures have a fixed arity.
    pub fn function_signature(
        &self,
        arg_types: &[LogicalType],
        arg_nullable: &[bool],
        return_type: &LogicalType,
        return_nullable: bool,
        variadic: bool,
    ) -> Result<BridgedSignature, CodegenError> {
        if return_type.is_iterator() {
            // Iterators are input cursors only.
            return Err(CodegenError::UnsupportedType(return_type.clone()));
        }

        let mut sig = Signature::new(self.call_conv);

        for (i, ty) in arg_types.iter().enumerate() {
            sig.params.push(AbiParam::new(self.value_type(ty)?));
            if arg_nullable.get(i).copied().unwrap_or(false) {
                sig.params.push(AbiParam::new(types::I8));
            }
        }
        if variadic {
            sig.params.push(AbiParam::new(self.ptr_type));
            sig.params.push(AbiParam::new(types::I64));
        }

        let native_ret = to_native_type(return_type)?;
        let return_by_arg = native_ret.is_large() || return_nullable;
        if return_by_arg {
            sig.params.insert(
                0,
                AbiParam::special(self.ptr_type, ArgumentPurpose::StructReturn),
            );
        } else {
            sig.returns.push(AbiParam::new(native_ret.value_type(self.ptr_type)));
        }

        Ok(BridgedSignature { signature: sig, return_by_arg })
    }

    /// Materialize a string constant as a length-prefixed struct in module
    /// data, returning its address. Two data objects are emitted: the raw
    /// bytes, and the `{ len, data }` struct with a relocation to them.
    pub fn const_string<M: Module>(
        &self,
        module: &mut M,
        builder: &mut FunctionBuilder,
        value: &str,
    ) -> Result<Value, CodegenError> {
        let bytes_id = module.declare_anonymous_data(false, false)?;
        let mut bytes_desc = DataDescription::new();
        bytes_desc.define(value.as_bytes().to_vec().into_boxed_slice());
        module.define_data(bytes_id, &bytes_desc)?;

        let data_offset = self.string_data_offset();
        let struct_size = data_offset as usize + self.ptr_type.bytes() as usize;
        let mut struct_desc = DataDescription::new();
        let mut buf = vec![0u8; struct_size];
        buf[0..4].copy_from_slice(&(value.len() as i32).to_le_bytes());
        struct_desc.define(buf.into_boxed_slice());
        let bytes_gv = module.declare_data_in_data(bytes_id, &mut struct_desc);
        struct_desc.write_data_addr(data_offset as u32, bytes_gv, 0);

        let struct_id = module.declare_anonymous_data(false, false)?;
        module.define_data(struct_id, &struct_desc)?;

        let gv = module.declare_data_in_func(struct_id, builder.func);
        Ok(builder.ins().symbol_value(self.ptr_type, gv))
    }
}

/// `f32` constant.
pub fn const_float(builder: &mut FunctionBuilder, value: f32) -> Value {
    builder.ins().f32const(value)
}

/// `f64` constant.
pub fn const_double(builder: &mut FunctionBuilder, value: f64) -> Value {
    builder.ins().f64const(value)
}

/// Load a field at a fixed offset from a struct pointer.
pub fn load_offset(builder: &mut FunctionBuilder, ty: Type, ptr: Value, offset: i32) -> Value {
    builder.ins().load(ty, MemFlags::trusted(), ptr, offset)
}

/// Store a field at a fixed offset behind a struct pointer.
pub fn store_offset(builder: &mut FunctionBuilder, value: Value, ptr: Value, offset: i32) {
    builder.ins().store(MemFlags::trusted(), value, ptr, offset);
}
