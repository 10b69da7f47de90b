//! Extension unification
//!
//! Folds every extension into the canonical declaration it extends, so that
//! exactly one declaration remains per global name. Extensions of types that
//! were never declared become synthetic "unknown extension" declarations.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::aliases::AliasTable;
use crate::arena::{DeclArena, DeclId};
use crate::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::{ComposeError, Result};
use crate::lookup::{LookupSite, NameLookup};
use crate::symbols::SymbolTable;

pub struct Unifier<'a> {
    arena: &'a mut DeclArena,
    symbols: &'a mut SymbolTable,
    aliases: &'a AliasTable,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Unifier<'a> {
    pub fn new(
        arena: &'a mut DeclArena,
        symbols: &'a mut SymbolTable,
        aliases: &'a AliasTable,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            arena,
            symbols,
            aliases,
            diagnostics,
        }
    }

    /// Run unification; returns the canonical declarations sorted by global name
    pub fn unify(mut self) -> Result<Vec<DeclId>> {
        let ids: Vec<DeclId> = self.arena.ids().collect();

        for &id in &ids {
            if self.arena[id].is_extension() {
                self.rename_extension(id);
            }
        }

        let mut merged = 0usize;
        for &id in &ids {
            self.resolve_inherited_names(id);
            if self.extend_canonical(id)? {
                merged += 1;
            }
        }

        let canonical = self.canonical_set();
        info!(
            "Unified {} declarations into {} canonical ({} extensions merged)",
            ids.len(),
            canonical.len(),
            merged
        );
        Ok(canonical)
    }

    /// Give an extension the name of the declaration it really extends
    fn rename_extension(&mut self, id: DeclId) {
        let old_global = self.arena.global_name(id);

        let node = &self.arena[id];
        if node.parent.is_none() && node.local_name.contains('.') {
            if let Some(base) = self.extension_of_nested_type(id) {
                let (local_name, module, parent) = {
                    let base = &self.arena[base];
                    (base.local_name.clone(), base.module.clone(), base.parent)
                };
                let node = &mut self.arena[id];
                node.local_name = local_name;
                node.module = module;
                node.parent = parent;
            }
        }

        let site = LookupSite::header_of(self.arena, id);
        let resolved = {
            let lookup = NameLookup::new(self.arena, self.symbols, self.aliases);
            lookup.resolve_global_name(&old_global, site, self.diagnostics)
        };
        if let Some(resolved) = resolved {
            let local_name = self.local_name_from_global(id, &resolved.name);
            self.arena[id].local_name = local_name;
        }

        let new_global = self.arena.global_name(id);
        if new_global == old_global {
            return;
        }
        debug!("Extension {} resolved to {}", old_global, new_global);

        // contained types are now known under new global names
        let mut stack = self.arena[id].children.clone();
        while let Some(child) = stack.pop() {
            if !self.arena[child].is_extension() {
                self.symbols.register(self.arena, child);
            }
            stack.extend(self.arena[child].children.iter().copied());
        }
    }

    /// Target of `extension Outer.Inner` written at file level
    fn extension_of_nested_type(&self, id: DeclId) -> Option<DeclId> {
        let node = &self.arena[id];
        let local_name = node.local_name.as_str();
        let (root, rest) = local_name.split_once('.')?;

        if self.symbols.has_module(root) {
            if let Some(found) = self
                .symbols
                .in_module(root, rest)
                .or_else(|| self.symbols.in_module(root, local_name))
            {
                return Some(found);
            }
        }

        node.module
            .iter()
            .chain(node.imports.iter())
            .find_map(|module| {
                self.symbols
                    .in_module(module, local_name)
                    .or_else(|| self.symbols.in_module(module, &format!("{}.{}", module, local_name)))
            })
    }

    /// Local name that makes `id` carry the global name `resolved`
    fn local_name_from_global(&self, id: DeclId, resolved: &str) -> String {
        let node = &self.arena[id];
        if let Some(parent) = node.parent {
            let mut prefix = self.arena.global_name(parent);
            prefix.push('.');
            if let Some(rest) = resolved.strip_prefix(&prefix) {
                return rest.to_string();
            }
            return resolved.rsplit('.').next().unwrap_or(resolved).to_string();
        }
        if let Some(module) = &node.module {
            if let Some(rest) = resolved
                .strip_prefix(module.as_str())
                .and_then(|r| r.strip_prefix('.'))
            {
                return rest.to_string();
            }
        }
        match resolved.split_once('.') {
            Some((module, rest)) if self.symbols.has_module(module) => rest.to_string(),
            _ => resolved.to_string(),
        }
    }

    /// Rewrite inherited names to global names, keeping names that do not resolve
    fn resolve_inherited_names(&mut self, id: DeclId) {
        if self.arena[id].inherited_types.is_empty() {
            return;
        }
        let site = LookupSite::header_of(self.arena, id);
        let names: Vec<String> = {
            let lookup = NameLookup::new(self.arena, self.symbols, self.aliases);
            self.arena[id]
                .inherited_types
                .iter()
                .map(|name| {
                    lookup
                        .resolve_global_name(name, site, self.diagnostics)
                        .map(|found| found.name)
                        .unwrap_or_else(|| name.clone())
                })
                .collect()
        };
        self.arena[id].set_inherited_types(names);
    }

    /// Canonical declaration for `id`: by global name, composed name, then module inference
    fn find_canonical(&mut self, id: DeclId) -> Option<DeclId> {
        let global = self.arena.global_name(id);
        if let Some(found) = self.symbols.get(&global) {
            return Some(found);
        }
        let lookup = NameLookup::new(self.arena, self.symbols, self.aliases);
        if let Some(found) = lookup.from_composed_name(&self.arena.name(id)) {
            return Some(found);
        }
        let site = LookupSite::header_of(self.arena, id);
        lookup
            .infer_from_modules(&self.arena[id].local_name, site, self.diagnostics)
            .and_then(|name| self.symbols.get(&name))
    }

    /// Merge `id` into its canonical declaration; returns whether a merge happened
    fn extend_canonical(&mut self, id: DeclId) -> Result<bool> {
        let is_extension = self.arena[id].is_extension();
        match self.find_canonical(id) {
            Some(canonical) if canonical == id => Ok(false),
            // a shadowed duplicate keeps its members; the replacement wins
            Some(_) if !is_extension => Ok(false),
            Some(canonical) => {
                self.arena.merge(canonical, id);
                Ok(true)
            }
            None if !is_extension => {
                Err(ComposeError::missing_canonical(self.arena.global_name(id)))
            }
            None => {
                self.register_unknown_extension(id);
                Ok(false)
            }
        }
    }

    fn register_unknown_extension(&mut self, id: DeclId) {
        self.arena[id].is_unknown_extension = true;
        let global = self.arena.global_name(id);

        let node = &self.arena[id];
        let inheritance = if node.inherited_types.is_empty() {
            String::new()
        } else {
            format!(": {}", node.inherited_types.join(", "))
        };
        let diagnostic = Diagnostic::warning(
            DiagnosticKind::UnknownExtensionBase,
            format!(
                "Found \"extension {}{}\" of type for which there is no original type declaration information.",
                self.arena.name(id),
                inheritance
            ),
        )
        .in_file(Some(&node.file));
        self.diagnostics.push(diagnostic);

        match self.symbols.get(&global) {
            Some(existing) if existing != id => self.arena.merge(existing, id),
            _ => self.symbols.insert(global, id),
        }
    }

    /// Registered declarations, deduplicated by handle and then by global name
    fn canonical_set(&self) -> Vec<DeclId> {
        let mut seen = HashSet::new();
        let mut canonical: Vec<(String, DeclId)> = self
            .symbols
            .values()
            .filter(|id| seen.insert(*id))
            .filter(|id| self.arena[*id].merged_into.is_none())
            .map(|id| (self.arena.global_name(id), id))
            .collect();
        canonical.sort();
        canonical.dedup_by(|a, b| a.0 == b.0);
        canonical.into_iter().map(|(_, id)| id).collect()
    }
}

/// Unify `arena` in place; see [`Unifier`]
pub fn unify(
    arena: &mut DeclArena,
    symbols: &mut SymbolTable,
    aliases: &AliasTable,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<DeclId>> {
    Unifier::new(arena, symbols, aliases, diagnostics).unify()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Alias, Declaration, Method, ParseResult, TypeRef, Variable};
    use crate::lower::lower;

    fn run(results: Vec<ParseResult>) -> (DeclArena, Vec<DeclId>, Diagnostics) {
        let mut lowered = lower(results);
        let mut diagnostics = Diagnostics::new();
        let mut symbols = SymbolTable::build(&lowered.arena, &mut diagnostics);
        let entries = std::mem::take(&mut lowered.aliases);
        let mut aliases = AliasTable::build(entries, &lowered.arena, &mut diagnostics);
        aliases.bind_targets(&lowered.arena, &symbols, &mut diagnostics);
        let canonical = unify(&mut lowered.arena, &mut symbols, &aliases, &mut diagnostics).unwrap();
        (lowered.arena, canonical, diagnostics)
    }

    fn names(arena: &DeclArena, ids: &[DeclId]) -> Vec<String> {
        ids.iter().map(|id| arena.global_name(*id)).collect()
    }

    #[test]
    fn test_extension_merges_into_declaration() {
        let (arena, canonical, diagnostics) = run(vec![
            ParseResult::new("a.swift", Some("App"))
                .with_declaration(Declaration::class("Foo").inheriting("Bar"))
                .with_declaration(Declaration::protocol("Bar")),
            ParseResult::new("b.swift", Some("App")).with_declaration(
                Declaration::extension("Foo")
                    .inheriting("Baz")
                    .with_method(Method::new("extra()")),
            ),
        ]);
        assert_eq!(names(&arena, &canonical), vec!["App.Bar", "App.Foo"]);
        let foo = &arena[canonical[1]];
        assert!(foo.method("extra()").is_some());
        assert_eq!(foo.inherited_types, vec!["App.Bar", "Baz"]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_unknown_extensions_merge_by_name() {
        let (arena, canonical, diagnostics) = run(vec![
            ParseResult::new("a.swift", Some("App"))
                .with_declaration(Declaration::extension("String").with_method(Method::new("a()"))),
            ParseResult::new("b.swift", Some("App"))
                .with_declaration(Declaration::extension("String").with_method(Method::new("b()"))),
        ]);
        assert_eq!(names(&arena, &canonical), vec!["String"]);
        let string = &arena[canonical[0]];
        assert!(string.is_unknown_extension);
        assert_eq!(string.methods.len(), 2);
        let kinds: Vec<_> = diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::UnknownExtensionBase,
                DiagnosticKind::UnknownExtensionBase
            ]
        );
    }

    #[test]
    fn test_extension_through_alias() {
        let (arena, canonical, _) = run(vec![ParseResult::new("a.swift", Some("App"))
            .with_alias(Alias::new("Model", TypeRef::named("User")))
            .with_declaration(Declaration::structure("User"))
            .with_declaration(Declaration::extension("Model").with_method(Method::new("save()")))]);
        assert_eq!(names(&arena, &canonical), vec!["App.User"]);
        assert!(arena[canonical[0]].method("save()").is_some());
    }

    #[test]
    fn test_extension_of_nested_type() {
        let (arena, canonical, _) = run(vec![
            ParseResult::new("a.swift", Some("Kit")).with_declaration(
                Declaration::structure("Outer").with_child(Declaration::structure("Inner")),
            ),
            ParseResult::new("b.swift", Some("App"))
                .with_import("Kit")
                .with_declaration(
                    Declaration::extension("Outer.Inner").with_method(Method::new("nested()")),
                ),
        ]);
        assert_eq!(names(&arena, &canonical), vec!["Kit.Outer", "Kit.Outer.Inner"]);
        assert!(arena[canonical[1]].method("nested()").is_some());
    }

    #[test]
    fn test_contained_types_move_with_extension() {
        let (arena, canonical, _) = run(vec![ParseResult::new("a.swift", Some("App"))
            .with_declaration(Declaration::structure("Foo"))
            .with_declaration(Declaration::extension("Foo").with_child(Declaration::class("Nested")))]);
        assert_eq!(names(&arena, &canonical), vec!["App.Foo", "App.Foo.Nested"]);
        assert_eq!(arena[canonical[0]].children, vec![canonical[1]]);
    }

    #[test]
    fn test_protocol_extension_drops_requirements() {
        let (arena, canonical, _) = run(vec![
            ParseResult::new("a.swift", Some("App")).with_declaration(
                Declaration::protocol("Runner")
                    .with_variable(Variable::new("speed", TypeRef::named("Int")))
                    .with_method(Method::new("run()")),
            ),
            ParseResult::new("b.swift", Some("App")).with_declaration(
                Declaration::extension("Runner")
                    .with_variable(Variable::new("speed", TypeRef::named("Int")))
                    .with_method(Method::new("run()"))
                    .with_method(Method::new("stop()")),
            ),
        ]);
        let runner = &arena[canonical[0]];
        let methods: Vec<&str> = runner.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["run()", "stop()"]);
        assert_eq!(runner.variables.len(), 1);
    }

    #[test]
    fn test_struct_extension_keeps_all_members() {
        let (arena, canonical, _) = run(vec![ParseResult::new("a.swift", Some("App"))
            .with_declaration(Declaration::structure("Point").with_method(Method::new("norm()")))
            .with_declaration(Declaration::extension("Point").with_method(Method::new("norm()")))]);
        assert_eq!(arena[canonical[0]].methods.len(), 2);
    }

    #[test]
    fn test_ambiguous_extension_is_not_merged() {
        let (arena, canonical, diagnostics) = run(vec![
            ParseResult::new("a.swift", Some("A")).with_declaration(Declaration::class("Foo")),
            ParseResult::new("b.swift", Some("B")).with_declaration(Declaration::class("Foo")),
            ParseResult::new("c.swift", Some("C"))
                .with_declaration(Declaration::extension("Foo").with_method(Method::new("extra()"))),
        ]);
        assert_eq!(names(&arena, &canonical), vec!["A.Foo", "B.Foo", "Foo"]);
        assert!(arena[canonical[0]].methods.is_empty());
        assert!(arena[canonical[1]].methods.is_empty());

        let unknown = &arena[canonical[2]];
        assert!(unknown.is_unknown_extension);
        assert!(unknown.method("extra()").is_some());

        let kinds: Vec<_> = diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::AmbiguousSymbol,
                DiagnosticKind::UnknownExtensionBase
            ]
        );
    }
}
