//! Relationship graph
//!
//! Expands every canonical declaration's supertype names into the
//! transitive `inherits` / `implements` / `based_types` sets, records the
//! direct edges in a [`TypeGraph`] and reports inheritance cycles.

use std::collections::{HashMap, HashSet};

use crate::arena::{DeclArena, DeclId};
use crate::ast::{AssociatedType, DeclKind};
use crate::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::graph::{RelationKind, TypeGraph};
use crate::resolve::{RefOwner, ResolutionCache};

pub struct RelationBuilder<'a> {
    arena: &'a mut DeclArena,
    cache: &'a mut ResolutionCache,
    by_global: HashMap<String, DeclId>,
    processed: HashSet<String>,
    graph: TypeGraph,
}

impl<'a> RelationBuilder<'a> {
    pub fn new(arena: &'a mut DeclArena, cache: &'a mut ResolutionCache, canonical: &[DeclId]) -> Self {
        let by_global = canonical
            .iter()
            .map(|id| (arena.global_name(*id), *id))
            .collect();
        Self {
            arena,
            cache,
            by_global,
            processed: HashSet::new(),
            graph: TypeGraph::new(),
        }
    }

    /// Expand relationships of `canonical` (sorted by global name) and return the direct-edge graph
    pub fn build(mut self, canonical: &[DeclId], diagnostics: &mut Diagnostics) -> TypeGraph {
        for &id in canonical {
            self.graph.add_declaration(id);
            self.assign_supertype(id);
            self.processed.insert(self.arena.global_name(id));
            self.update(id);
        }

        for cycle in self.graph.cycles() {
            let names: Vec<String> = cycle.iter().map(|id| self.arena.global_name(*id)).collect();
            let file = cycle.first().map(|id| self.arena[*id].file.as_str());
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::InheritanceCycle,
                    format!("Inheritance cycle between {}", names.join(", ")),
                )
                .in_file(file),
            );
        }

        tracing::info!(
            "Relationship graph: {} declarations, {} direct edges",
            self.graph.node_count(),
            self.graph.edge_count()
        );
        self.graph
    }

    fn assign_supertype(&mut self, id: DeclId) {
        let node = &self.arena[id];
        if !node.kind.is_class() {
            return;
        }
        let supertype = node
            .inherited_types
            .first()
            .and_then(|name| self.by_global.get(name))
            .copied()
            .filter(|base| self.arena[*base].kind.is_class());
        self.arena[id].supertype = supertype;
    }

    /// Base declaration named `name` as seen from `id`
    fn find_base(&self, id: DeclId, name: &str) -> Option<DeclId> {
        let name = match name.split_once('<') {
            Some((base, _)) if name.contains('>') => base,
            _ => name,
        };
        if let Some(found) = self.by_global.get(name) {
            return Some(*found);
        }
        let node = &self.arena[id];
        node.module
            .iter()
            .chain(node.imports.iter())
            .find_map(|module| self.by_global.get(&format!("{}.{}", module, name)))
            .copied()
    }

    fn update(&mut self, id: DeclId) {
        let names: Vec<String> = self.arena[id].relations.based.keys().cloned().collect();
        for name in names {
            let Some(base) = self.find_base(id, &name) else {
                continue;
            };
            let base_global = self.arena.global_name(base);
            if self.processed.insert(base_global.clone()) {
                self.update(base);
            }

            let inherited = self.arena[base].relations.clone();
            self.arena[id].relations.absorb(&inherited);

            let (kind, associated) = match &self.arena[base].kind {
                DeclKind::Class => (RelationKind::Inherits, None),
                DeclKind::Protocol(body) => {
                    (RelationKind::Implements, Some(body.associated_types.clone()))
                }
                DeclKind::ProtocolComposition(_) => (RelationKind::Implements, None),
                DeclKind::Struct | DeclKind::Actor | DeclKind::Enum(_) | DeclKind::Extension => {
                    (RelationKind::Based, None)
                }
            };

            let relations = &mut self.arena[id].relations;
            match kind {
                RelationKind::Inherits => {
                    relations.inherits.insert(base_global.clone(), base);
                }
                RelationKind::Implements => {
                    relations.implements.insert(base_global.clone(), base);
                }
                RelationKind::Based => {}
            }
            relations.based_types.insert(base_global, base);

            if let Some(associated) = associated {
                self.adopt_associated_types(id, base, associated);
            }
            self.graph.add_relation(id, base, kind);
        }
    }

    /// Copy the base protocol's associated types that `id` does not declare, with their resolutions
    fn adopt_associated_types(&mut self, id: DeclId, base: DeclId, associated: Vec<AssociatedType>) {
        let DeclKind::Protocol(body) = &mut self.arena[id].kind else {
            return;
        };
        let mut adopted = Vec::new();
        for associated_type in associated {
            if body.associated_type(&associated_type.name).is_none() {
                adopted.extend(associated_type.type_ref.clone());
                body.associated_types.push(associated_type);
            }
        }

        for ty in adopted {
            ty.walk(&mut |t| {
                if let Some(resolution) = self.cache.get(RefOwner::Declaration(base), t.site).cloned() {
                    self.cache.insert(RefOwner::Declaration(id), t.site, resolution);
                }
            });
        }
    }
}

/// Build relationships for `canonical` in place; see [`RelationBuilder`]
pub fn build_relations(
    arena: &mut DeclArena,
    cache: &mut ResolutionCache,
    canonical: &[DeclId],
    diagnostics: &mut Diagnostics,
) -> TypeGraph {
    RelationBuilder::new(arena, cache, canonical).build(canonical, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aliases::AliasTable;
    use crate::ast::{Declaration, ParseResult, ProtocolBody, TypeRef};
    use crate::lower::lower;
    use crate::symbols::SymbolTable;
    use crate::unify::unify;

    fn run(results: Vec<ParseResult>) -> (DeclArena, Vec<DeclId>, TypeGraph, Diagnostics) {
        let mut lowered = lower(results);
        let mut diagnostics = Diagnostics::new();
        let mut symbols = SymbolTable::build(&lowered.arena, &mut diagnostics);
        let entries = std::mem::take(&mut lowered.aliases);
        let aliases = AliasTable::build(entries, &lowered.arena, &mut diagnostics);
        let canonical =
            unify(&mut lowered.arena, &mut symbols, &aliases, &mut diagnostics).unwrap();
        let mut cache = ResolutionCache::new();
        let graph = build_relations(&mut lowered.arena, &mut cache, &canonical, &mut diagnostics);
        (lowered.arena, canonical, graph, diagnostics)
    }

    fn id_of(arena: &DeclArena, canonical: &[DeclId], name: &str) -> DeclId {
        *canonical
            .iter()
            .find(|id| arena.global_name(**id) == name)
            .unwrap()
    }

    #[test]
    fn test_transitive_ancestry() {
        let (arena, canonical, graph, diagnostics) = run(vec![ParseResult::new("a.swift", Some("App"))
            .with_declaration(Declaration::class("Leaf").inheriting("Middle"))
            .with_declaration(Declaration::class("Middle").inheriting("Root").inheriting("Named"))
            .with_declaration(Declaration::class("Root"))
            .with_declaration(Declaration::protocol("Named"))]);

        let leaf = id_of(&arena, &canonical, "App.Leaf");
        let middle = id_of(&arena, &canonical, "App.Middle");
        let root = id_of(&arena, &canonical, "App.Root");
        let named = id_of(&arena, &canonical, "App.Named");

        let relations = &arena[leaf].relations;
        assert_eq!(relations.inherits.get("App.Middle"), Some(&middle));
        assert_eq!(relations.inherits.get("App.Root"), Some(&root));
        assert_eq!(relations.implements.get("App.Named"), Some(&named));
        assert_eq!(relations.based_types.len(), 3);
        assert_eq!(arena[leaf].supertype, Some(middle));
        assert_eq!(arena[middle].supertype, Some(root));

        assert_eq!(graph.supertypes(leaf), vec![(middle, RelationKind::Inherits)]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_generic_base_is_stripped() {
        let (arena, canonical, _, _) = run(vec![ParseResult::new("a.swift", None)
            .with_declaration(Declaration::class("Base"))
            .with_declaration(Declaration::class("Derived").inheriting("Base<Int>"))]);
        let derived = id_of(&arena, &canonical, "Derived");
        assert!(arena[derived].relations.inherits.contains_key("Base"));
    }

    #[test]
    fn test_protocol_inherits_associated_types() {
        let mut container = Declaration::protocol("Container");
        container.kind = DeclKind::Protocol(ProtocolBody {
            associated_types: vec![AssociatedType {
                name: "Item".to_string(),
                type_ref: Some(TypeRef::named("Int")),
            }],
            generic_requirements: Vec::new(),
        });
        let (arena, canonical, _, _) = run(vec![ParseResult::new("a.swift", None)
            .with_declaration(container)
            .with_declaration(Declaration::protocol("Stack").inheriting("Container"))]);
        let stack = id_of(&arena, &canonical, "Stack");
        match &arena[stack].kind {
            DeclKind::Protocol(body) => assert!(body.associated_type("Item").is_some()),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_inheritance_cycle_is_reported() {
        let (_, _, graph, diagnostics) = run(vec![ParseResult::new("a.swift", None)
            .with_declaration(Declaration::class("A").inheriting("B"))
            .with_declaration(Declaration::class("B").inheriting("A"))]);
        assert!(graph.has_cycle());
        let items = diagnostics.into_vec(true);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, DiagnosticKind::InheritanceCycle);
        assert_eq!(items[0].message, "Inheritance cycle between A, B");
    }
}
