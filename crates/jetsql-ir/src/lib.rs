//! JetSQL IR - logical type system and expression nodes
//!
//! The types here are the currency between the planner, the UDF library and
//! the code generator. They are deliberately small: type inference and the
//! full plan representation live elsewhere.

mod expr;
mod types;

pub use expr::*;
pub use types::*;
