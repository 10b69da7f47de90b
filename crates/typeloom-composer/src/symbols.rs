//! Symbol table of canonical declarations
//!
//! Maps global names to declarations, plus a per-module index from
//! parent-qualified name to declaration used for module inference.

use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::arena::{DeclArena, DeclId};
use crate::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    by_global: HashMap<String, DeclId>,
    modules: BTreeMap<String, HashMap<String, DeclId>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every non-extension declaration of the arena
    pub fn build(arena: &DeclArena, diagnostics: &mut Diagnostics) -> Self {
        let mut table = Self::new();
        for node in arena.iter() {
            if node.is_extension() {
                continue;
            }
            if let Some(previous) = table.register(arena, node.id) {
                diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticKind::DuplicateDeclaration,
                        format!(
                            "Duplicate declaration of {}, the one in {} replaces the one in {}",
                            arena.global_name(node.id),
                            node.file,
                            arena[previous].file
                        ),
                    )
                    .in_file(Some(&node.file)),
                );
            }
        }
        debug!(
            "Symbol table: {} global names in {} modules",
            table.by_global.len(),
            table.modules.len()
        );
        table
    }

    /// Register under the global name and the module index.
    /// Returns the declaration previously registered under the global name.
    pub fn register(&mut self, arena: &DeclArena, id: DeclId) -> Option<DeclId> {
        let node = &arena[id];
        if let Some(module) = &node.module {
            self.modules
                .entry(module.clone())
                .or_default()
                .insert(arena.name(id), id);
        }
        self.by_global
            .insert(arena.global_name(id), id)
            .filter(|previous| *previous != id)
    }

    /// Register `id` under an explicit global name only
    pub fn insert(&mut self, global_name: String, id: DeclId) {
        self.by_global.insert(global_name, id);
    }

    pub fn get(&self, global_name: &str) -> Option<DeclId> {
        self.by_global.get(global_name).copied()
    }

    pub fn contains(&self, global_name: &str) -> bool {
        self.by_global.contains_key(global_name)
    }

    /// Declaration named `name` (parent-qualified) inside `module`
    pub fn in_module(&self, module: &str, name: &str) -> Option<DeclId> {
        self.modules.get(module)?.get(name).copied()
    }

    pub fn has_module(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    /// Module names in sorted order
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_global.is_empty()
    }

    /// All registered declarations, in no particular order
    pub fn values(&self) -> impl Iterator<Item = DeclId> + '_ {
        self.by_global.values().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Declaration, ParseResult};
    use crate::lower::lower;

    #[test]
    fn test_registers_non_extensions() {
        let lowered = lower(vec![ParseResult::new("a.swift", Some("App"))
            .with_declaration(Declaration::structure("Outer").with_child(Declaration::class("Inner")))
            .with_declaration(Declaration::extension("Outer"))]);
        let mut diagnostics = Diagnostics::new();
        let table = SymbolTable::build(&lowered.arena, &mut diagnostics);

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("App.Outer"), Some(DeclId(0)));
        assert_eq!(table.get("App.Outer.Inner"), Some(DeclId(1)));
        assert_eq!(table.in_module("App", "Outer.Inner"), Some(DeclId(1)));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_moduleless_declarations_skip_module_index() {
        let lowered = lower(vec![
            ParseResult::new("a.swift", None).with_declaration(Declaration::class("Foo"))
        ]);
        let table = SymbolTable::build(&lowered.arena, &mut Diagnostics::new());
        assert_eq!(table.get("Foo"), Some(DeclId(0)));
        assert_eq!(table.module_names().count(), 0);
    }

    #[test]
    fn test_duplicate_declaration_reports_and_replaces() {
        let lowered = lower(vec![
            ParseResult::new("a.swift", Some("App")).with_declaration(Declaration::class("Foo")),
            ParseResult::new("b.swift", Some("App")).with_declaration(Declaration::class("Foo")),
        ]);
        let mut diagnostics = Diagnostics::new();
        let table = SymbolTable::build(&lowered.arena, &mut diagnostics);

        assert_eq!(table.get("App.Foo"), Some(DeclId(1)));
        let items = diagnostics.into_vec(true);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, DiagnosticKind::DuplicateDeclaration);
        assert_eq!(items[0].file.as_deref(), Some("b.swift"));
    }
}
