//! Per-file output of the front-end parser

use serde::{Deserialize, Serialize};

use super::alias::Alias;
use super::decl::Declaration;
use super::member::Method;

/// Everything the parser extracted from one compilation unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    /// File identifier, used in diagnostics
    pub file: String,
    /// Owning module, `None` for single-module input
    #[serde(default)]
    pub module: Option<String>,
    /// Modules imported by the file
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
    /// Top-level aliases
    #[serde(default)]
    pub aliases: Vec<Alias>,
    /// Free functions
    #[serde(default)]
    pub functions: Vec<Method>,
}

impl ParseResult {
    pub fn new(file: impl Into<String>, module: Option<&str>) -> Self {
        Self {
            file: file.into(),
            module: module.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn with_import(mut self, module: impl Into<String>) -> Self {
        self.imports.push(module.into());
        self
    }

    pub fn with_declaration(mut self, declaration: Declaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    pub fn with_alias(mut self, alias: Alias) -> Self {
        self.aliases.push(alias);
        self
    }

    pub fn with_function(mut self, function: Method) -> Self {
        self.functions.push(function);
        self
    }

    /// Parse a JSON array of parse results
    pub fn from_json_array(json: &str) -> crate::error::Result<Vec<ParseResult>> {
        Ok(serde_json::from_str(json)?)
    }
}
