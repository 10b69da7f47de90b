//! Alias resolution
//!
//! Collects module-level and nested aliases under their full names and
//! flattens alias-to-alias chains so every name maps straight to the alias
//! that finally names a concrete type.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::arena::{DeclArena, DeclId};
use crate::ast::Alias;
use crate::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::ComposeError;
use crate::lookup::{LookupSite, NameLookup};
use crate::symbols::SymbolTable;

/// An alias with the context it was declared in
#[derive(Debug, Clone, Serialize)]
pub struct AliasEntry {
    pub alias: Alias,
    pub module: Option<String>,
    /// Declaration the alias is nested in
    pub parent: Option<DeclId>,
    pub file: String,
    pub imports: Vec<String>,
}

impl AliasEntry {
    /// `module.parentName.aliasName`, absent parts omitted
    pub fn full_name(&self, arena: &DeclArena) -> String {
        let mut name = String::new();
        if let Some(module) = &self.module {
            name.push_str(module);
            name.push('.');
        }
        if let Some(parent) = self.parent {
            arena.write_name(parent, &mut name);
            name.push('.');
        }
        name.push_str(&self.alias.name);
        name
    }

    pub fn site(&self) -> LookupSite<'_> {
        LookupSite {
            scope: self.parent,
            module: self.module.as_deref(),
            imports: &self.imports,
        }
    }
}

/// Aliases keyed by full name, before and after chain flattening
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: Vec<AliasEntry>,
    full_names: Vec<String>,
    /// Full name -> declaring entry
    unresolved: BTreeMap<String, usize>,
    /// Full name -> terminal entry of its chain
    resolved: BTreeMap<String, usize>,
    /// Global name bound to each entry's target, once known
    bound: Vec<Option<String>>,
}

impl AliasTable {
    /// Collect `entries` and flatten their chains
    pub fn build(entries: Vec<AliasEntry>, arena: &DeclArena, diagnostics: &mut Diagnostics) -> Self {
        let full_names: Vec<String> = entries.iter().map(|e| e.full_name(arena)).collect();
        let unresolved: BTreeMap<String, usize> = full_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let bound = vec![None; entries.len()];
        let mut table = Self {
            entries,
            full_names,
            unresolved,
            resolved: BTreeMap::new(),
            bound,
        };
        table.resolved = table.flatten(diagnostics);
        debug!(
            "Aliases: {} declared, {} resolved",
            table.unresolved.len(),
            table.resolved.len()
        );
        table
    }

    /// Path-compressed map computed from the unresolved one
    pub fn flatten(&self, diagnostics: &mut Diagnostics) -> BTreeMap<String, usize> {
        let mut resolved = BTreeMap::new();
        let mut reported: HashSet<Vec<String>> = HashSet::new();
        let mut poisoned: HashSet<usize> = HashSet::new();

        for (name, &start) in &self.unresolved {
            if resolved.contains_key(name) || poisoned.contains(&start) {
                continue;
            }
            match self.follow(start, &resolved) {
                Ok((chain, terminal)) => {
                    for index in chain {
                        resolved.insert(self.full_names[index].clone(), terminal);
                    }
                }
                Err((chain, err)) => {
                    poisoned.extend(chain);
                    if let ComposeError::CyclicAlias(names) = &err {
                        let mut key = names.clone();
                        key.sort();
                        key.dedup();
                        if reported.insert(key) {
                            diagnostics.push(
                                Diagnostic::warning(DiagnosticKind::CyclicAlias, err.to_string())
                                    .in_file(Some(&self.entries[start].file)),
                            );
                        }
                    }
                }
            }
        }
        resolved
    }

    /// Follow the chain from `start`; returns the visited entries and the terminal
    #[allow(clippy::type_complexity)]
    fn follow(
        &self,
        start: usize,
        resolved: &BTreeMap<String, usize>,
    ) -> std::result::Result<(Vec<usize>, usize), (Vec<usize>, ComposeError)> {
        let mut chain = vec![start];
        let mut visited = HashSet::from([start]);
        let mut current = start;

        while let Some(next) = self.next_in_chain(current) {
            if let Some(&terminal) = resolved.get(&self.full_names[next]) {
                return Ok((chain, terminal));
            }
            if !visited.insert(next) {
                let from = chain.iter().position(|i| *i == next).unwrap_or(0);
                let mut names: Vec<String> = chain[from..]
                    .iter()
                    .map(|i| self.full_names[*i].clone())
                    .collect();
                names.push(self.full_names[next].clone());
                return Err((chain, ComposeError::cyclic_alias(names)));
            }
            chain.push(next);
            current = next;
        }
        Ok((chain, current))
    }

    /// Alias named by the target of `index`, searched from the alias's own scope outwards
    fn next_in_chain(&self, index: usize) -> Option<usize> {
        let entry = &self.entries[index];
        let target = entry.alias.target.name.as_str();
        let module_prefix = entry.module.as_deref();

        let mut candidates = Vec::with_capacity(entry.imports.len() + 3);
        if let Some(parent_name) = self.parent_prefix(index) {
            candidates.push(format!("{}.{}", parent_name, target));
        }
        if let Some(module) = module_prefix {
            candidates.push(format!("{}.{}", module, target));
        }
        for import in &entry.imports {
            candidates.push(format!("{}.{}", import, target));
        }
        candidates.push(target.to_string());

        candidates
            .iter()
            .filter_map(|name| self.unresolved.get(name).copied())
            .find(|next| *next != index)
    }

    /// Full name of the alias without its own last component, when nested
    fn parent_prefix(&self, index: usize) -> Option<&str> {
        self.entries[index].parent?;
        let full = &self.full_names[index];
        full.rsplit_once('.').map(|(prefix, _)| prefix)
    }

    /// Bind each terminal alias target to a global name through the lookup policy.
    /// A target may name another terminal's alias, so binding repeats until no
    /// bound name changes.
    pub fn bind_targets(
        &mut self,
        arena: &DeclArena,
        symbols: &SymbolTable,
        diagnostics: &mut Diagnostics,
    ) {
        let mut terminals: Vec<usize> = self.resolved.values().copied().collect();
        terminals.sort_unstable();
        terminals.dedup();
        // composite targets keep their spelling; the resolver rebuilds them
        terminals.retain(|index| !self.entries[*index].alias.target.is_composite());

        let mut pass_diagnostics = Diagnostics::new();
        for _ in 0..=terminals.len() {
            pass_diagnostics = Diagnostics::new();
            let bound: Vec<(usize, Option<String>)> = {
                let lookup = NameLookup::new(arena, symbols, self);
                terminals
                    .iter()
                    .map(|&index| {
                        let entry = &self.entries[index];
                        let name = lookup
                            .resolve_global_name(
                                &entry.alias.target.name,
                                entry.site(),
                                &mut pass_diagnostics,
                            )
                            .map(|found| found.name);
                        (index, name)
                    })
                    .collect()
            };
            let mut changed = false;
            for (index, name) in bound {
                if self.bound[index] != name {
                    self.bound[index] = name;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        diagnostics.extend(pass_diagnostics);
    }

    /// Terminal alias for `name`, trying the name, then `module.name`, then `import.name`
    pub fn lookup(&self, name: &str, module: Option<&str>, imports: &[String]) -> Option<usize> {
        if let Some(index) = self.resolved.get(name) {
            return Some(*index);
        }
        if let Some(module) = module {
            if let Some(index) = self.resolved.get(&format!("{}.{}", module, name)) {
                return Some(*index);
            }
        }
        imports
            .iter()
            .find_map(|import| self.resolved.get(&format!("{}.{}", import, name)).copied())
    }

    /// Name a reference to the alias at `index` denotes
    pub fn target_name(&self, index: usize) -> &str {
        self.bound[index]
            .as_deref()
            .unwrap_or(&self.entries[index].alias.target.name)
    }

    pub fn entry(&self, index: usize) -> &AliasEntry {
        &self.entries[index]
    }

    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    pub fn full_name(&self, index: usize) -> &str {
        &self.full_names[index]
    }

    /// Terminal alias of the alias declared under `full_name`
    pub fn terminal_of(&self, full_name: &str) -> Option<usize> {
        self.resolved.get(full_name).copied()
    }

    /// Full name -> terminal entry, sorted by name
    pub fn resolved(&self) -> &BTreeMap<String, usize> {
        &self.resolved
    }

    /// Full name -> declaring entry, sorted by name
    pub fn unresolved(&self) -> &BTreeMap<String, usize> {
        &self.unresolved
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Declaration, ParseResult, TypeRef};
    use crate::lower::lower;

    fn table(result: ParseResult) -> (AliasTable, Diagnostics) {
        let lowered = lower(vec![result]);
        let mut diagnostics = Diagnostics::new();
        let table = AliasTable::build(lowered.aliases, &lowered.arena, &mut diagnostics);
        (table, diagnostics)
    }

    #[test]
    fn test_full_names() {
        let (table, _) = table(
            ParseResult::new("a.swift", Some("App"))
                .with_alias(Alias::new("ID", TypeRef::named("String")))
                .with_declaration(
                    Declaration::structure("Outer")
                        .with_alias(Alias::new("Key", TypeRef::named("Int"))),
                ),
        );
        let names: Vec<&str> = table.unresolved().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["App.ID", "App.Outer.Key"]);
    }

    #[test]
    fn test_chain_is_flattened() {
        let (table, diagnostics) = table(
            ParseResult::new("a.swift", None)
                .with_alias(Alias::new("A", TypeRef::named("B")))
                .with_alias(Alias::new("B", TypeRef::named("C")))
                .with_alias(Alias::new("C", TypeRef::named("Int"))),
        );
        assert!(diagnostics.is_empty());
        let c = table.terminal_of("C").unwrap();
        assert_eq!(table.terminal_of("A"), Some(c));
        assert_eq!(table.terminal_of("B"), Some(c));
        assert_eq!(table.target_name(c), "Int");
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let (table, _) = table(
            ParseResult::new("a.swift", Some("App"))
                .with_alias(Alias::new("A", TypeRef::named("B")))
                .with_alias(Alias::new("B", TypeRef::named("Int"))),
        );
        let again = table.flatten(&mut Diagnostics::new());
        assert_eq!(&again, table.resolved());
    }

    #[test]
    fn test_cycle_is_reported_and_dropped() {
        let (table, diagnostics) = table(
            ParseResult::new("a.swift", None)
                .with_alias(Alias::new("A", TypeRef::named("B")))
                .with_alias(Alias::new("B", TypeRef::named("A")))
                .with_alias(Alias::new("Fine", TypeRef::named("Int"))),
        );
        assert_eq!(table.terminal_of("A"), None);
        assert_eq!(table.terminal_of("B"), None);
        assert!(table.terminal_of("Fine").is_some());

        let items = diagnostics.into_vec(true);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, DiagnosticKind::CyclicAlias);
        assert!(items[0].message.contains("A -> B -> A"));
    }

    #[test]
    fn test_chain_continues_through_import() {
        let lowered = lower(vec![
            ParseResult::new("kit.swift", Some("Kit"))
                .with_declaration(Declaration::structure("Foo"))
                .with_alias(Alias::new("Y", TypeRef::named("Foo"))),
            ParseResult::new("app.swift", Some("App"))
                .with_import("Kit")
                .with_alias(Alias::new("X", TypeRef::named("Y"))),
        ]);
        let mut diagnostics = Diagnostics::new();
        let symbols = SymbolTable::build(&lowered.arena, &mut diagnostics);
        let mut table = AliasTable::build(lowered.aliases, &lowered.arena, &mut diagnostics);
        table.bind_targets(&lowered.arena, &symbols, &mut diagnostics);

        let y = table.terminal_of("Kit.Y").unwrap();
        assert_eq!(table.terminal_of("App.X"), Some(y));
        assert_eq!(table.target_name(y), "Kit.Foo");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_binding_follows_other_terminals() {
        // `Outer.Key` is reached through the scope walk, not the chain
        let lowered = lower(vec![ParseResult::new("a.swift", Some("App"))
            .with_declaration(Declaration::structure("Foo"))
            .with_declaration(
                Declaration::structure("Outer")
                    .with_alias(Alias::new("Key", TypeRef::named("Foo")))
                    .with_child(
                        Declaration::structure("Inner")
                            .with_alias(Alias::new("Local", TypeRef::named("Key"))),
                    ),
            )]);
        let mut diagnostics = Diagnostics::new();
        let symbols = SymbolTable::build(&lowered.arena, &mut diagnostics);
        let mut table = AliasTable::build(lowered.aliases, &lowered.arena, &mut diagnostics);
        table.bind_targets(&lowered.arena, &symbols, &mut diagnostics);

        let local = table.terminal_of("App.Outer.Inner.Local").unwrap();
        assert_eq!(table.target_name(local), "App.Foo");
    }

    #[test]
    fn test_self_referencing_alias_terminates() {
        let (table, diagnostics) = table(
            ParseResult::new("a.swift", None).with_alias(Alias::new("A", TypeRef::named("A"))),
        );
        // an alias naming itself is its own terminal
        assert_eq!(table.terminal_of("A"), Some(0));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_lookup_falls_back_to_module_and_imports() {
        let lowered = lower(vec![
            ParseResult::new("a.swift", Some("Core"))
                .with_alias(Alias::new("ID", TypeRef::named("String"))),
        ]);
        let table = AliasTable::build(lowered.aliases, &lowered.arena, &mut Diagnostics::new());
        assert!(table.lookup("ID", Some("Core"), &[]).is_some());
        assert!(table.lookup("ID", Some("App"), &["Core".to_string()]).is_some());
        assert!(table.lookup("ID", Some("App"), &[]).is_none());
    }
}
