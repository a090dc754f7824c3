//! Declarative bulk registration from a definition file.
//!
//! The file is a YAML catalog of external native functions; loading it has
//! the same end effect as the equivalent sequence of `register_external`
//! and `register_alias` calls.

use std::path::Path;

use jetsql_ir::LogicalType;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{UdfError, UdfLibrary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdfFile {
    pub functions: Vec<UdfDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdfDecl {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub entries: Vec<EntryDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDecl {
    pub args: Vec<LogicalType>,
    pub returns: LogicalType,
    pub symbol: String,
    #[serde(default)]
    pub variadic: bool,
    #[serde(default)]
    pub return_nullable: bool,
}

impl UdfLibrary {
    pub fn register_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), UdfError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let file: UdfFile = serde_yaml::from_str(&text)?;
        debug!(path = %path.display(), functions = file.functions.len(), "loading UDF definition file");
        self.register_decls(&file)
    }

    pub fn register_decls(&mut self, file: &UdfFile) -> Result<(), UdfError> {
        for decl in &file.functions {
            for entry in &decl.entries {
                let mut builder = self.register_external(&decl.name);
                if entry.return_nullable {
                    builder = builder.return_nullable();
                }
                if entry.variadic {
                    builder.variadic_args(&entry.args, entry.returns.clone(), &entry.symbol)?;
                } else {
                    builder.args(&entry.args, entry.returns.clone(), &entry.symbol)?;
                }
            }
            for alias in &decl.aliases {
                self.register_alias(alias, &decl.name)?;
            }
        }
        Ok(())
    }
}
