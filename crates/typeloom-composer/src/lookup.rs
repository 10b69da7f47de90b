//! Global name lookup
//!
//! One policy shared by the unifier and the reference resolver: turn a name
//! as written at some site into the global name of the declaration it
//! denotes, or report that it cannot be decided.

use crate::aliases::AliasTable;
use crate::arena::{DeclArena, DeclId};
use crate::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::symbols::SymbolTable;

/// Where a name is looked up from
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupSite<'a> {
    /// Innermost enclosing declaration
    pub scope: Option<DeclId>,
    pub module: Option<&'a str>,
    pub imports: &'a [String],
}

impl<'a> LookupSite<'a> {
    /// Site with no scope, module or imports
    pub fn detached() -> Self {
        Self::default()
    }

    /// Site of names written inside the body of `id`
    pub fn inside(arena: &'a DeclArena, id: DeclId) -> Self {
        let node = &arena[id];
        Self {
            scope: Some(id),
            module: node.module.as_deref(),
            imports: &node.imports,
        }
    }

    /// Site of names written in the header of `id` (its inheritance clause)
    pub fn header_of(arena: &'a DeclArena, id: DeclId) -> Self {
        let node = &arena[id];
        Self {
            scope: node.parent,
            module: node.module.as_deref(),
            imports: &node.imports,
        }
    }
}

/// Result of a successful lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalName {
    pub name: String,
    /// Terminal alias the name went through
    pub alias: Option<usize>,
}

impl GlobalName {
    fn plain(name: String) -> Self {
        Self { name, alias: None }
    }
}

pub struct NameLookup<'a> {
    arena: &'a DeclArena,
    symbols: &'a SymbolTable,
    aliases: &'a AliasTable,
}

impl<'a> NameLookup<'a> {
    pub fn new(arena: &'a DeclArena, symbols: &'a SymbolTable, aliases: &'a AliasTable) -> Self {
        Self {
            arena,
            symbols,
            aliases,
        }
    }

    pub fn arena(&self) -> &'a DeclArena {
        self.arena
    }

    pub fn symbols(&self) -> &'a SymbolTable {
        self.symbols
    }

    pub fn aliases(&self) -> &'a AliasTable {
        self.aliases
    }

    /// Non-extension declaration registered under `global_name`
    pub fn declaration(&self, global_name: &str) -> Option<DeclId> {
        self.symbols
            .get(global_name)
            .filter(|id| !self.arena[*id].is_extension())
    }

    /// Global name of `name` as seen from `site`
    pub fn resolve_global_name(
        &self,
        name: &str,
        site: LookupSite<'_>,
        diagnostics: &mut Diagnostics,
    ) -> Option<GlobalName> {
        if let Some(id) = self.declaration(name) {
            return Some(GlobalName::plain(self.arena.global_name(id)));
        }

        if let Some(index) = self.aliases.lookup(name, site.module, site.imports) {
            return Some(GlobalName {
                name: self.aliases.target_name(index).to_string(),
                alias: Some(index),
            });
        }

        if let Some(scope) = site.scope {
            if name == "Self" {
                return Some(GlobalName::plain(self.arena.global_name(scope)));
            }

            let mut buffer = String::new();
            for ancestor in self.arena.ancestors(scope) {
                buffer.clear();
                self.arena.write_global_name(ancestor, &mut buffer);
                buffer.push('.');
                buffer.push_str(name);
                if let Some(found) =
                    self.resolve_global_name(&buffer, LookupSite::detached(), diagnostics)
                {
                    return Some(found);
                }
            }
        }

        if let Some(inferred) = self.infer_from_modules(name, site, diagnostics) {
            return Some(GlobalName::plain(inferred));
        }

        self.from_composed_name(name)
            .map(|id| GlobalName::plain(self.arena.global_name(id)))
    }

    /// Find `name` among modules: the site's own module and imports first,
    /// then every other module; more than one match at a level is ambiguous.
    pub fn infer_from_modules(
        &self,
        name: &str,
        site: LookupSite<'_>,
        diagnostics: &mut Diagnostics,
    ) -> Option<String> {
        let mut explicit: Vec<&str> = Vec::with_capacity(site.imports.len() + 1);
        explicit.extend(site.module);
        for import in site.imports {
            if !explicit.contains(&import.as_str()) {
                explicit.push(import);
            }
        }
        let remaining: Vec<&str> = self
            .symbols
            .module_names()
            .filter(|m| !explicit.contains(m))
            .collect();

        for modules in [&explicit, &remaining] {
            let candidates: Vec<DeclId> = modules
                .iter()
                .filter_map(|m| self.symbols.in_module(m, name))
                .collect();
            match candidates.as_slice() {
                [] => continue,
                [only] => return Some(self.arena.global_name(*only)),
                many => {
                    let found = many
                        .iter()
                        .map(|id| self.arena.global_name(*id))
                        .collect::<Vec<_>>()
                        .join(", ");
                    diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::AmbiguousSymbol,
                        format!(
                            "Ambiguous type {}, found {}. Specify module name at declaration site to disambiguate.",
                            name, found
                        ),
                    ));
                    return None;
                }
            }
        }

        let module = site.module?;
        self.symbols
            .get(&format!("{}.{}", module, name))
            .map(|id| self.arena.global_name(id))
    }

    /// `Module.Type.Nested` looked up in the module index
    pub fn from_composed_name(&self, name: &str) -> Option<DeclId> {
        let (module, rest) = name.split_once('.')?;
        self.symbols.in_module(module, rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Alias, Declaration, ParseResult, TypeRef};
    use crate::lower::{lower, Lowered};

    struct Fixture {
        lowered: Lowered,
        symbols: SymbolTable,
        aliases: AliasTable,
    }

    fn fixture(results: Vec<ParseResult>) -> Fixture {
        let mut lowered = lower(results);
        let mut diagnostics = Diagnostics::new();
        let symbols = SymbolTable::build(&lowered.arena, &mut diagnostics);
        let entries = std::mem::take(&mut lowered.aliases);
        let aliases = AliasTable::build(entries, &lowered.arena, &mut diagnostics);
        Fixture {
            lowered,
            symbols,
            aliases,
        }
    }

    impl Fixture {
        fn lookup(&self) -> NameLookup<'_> {
            NameLookup::new(&self.lowered.arena, &self.symbols, &self.aliases)
        }
    }

    #[test]
    fn test_direct_hit() {
        let f = fixture(vec![
            ParseResult::new("a.swift", None).with_declaration(Declaration::class("Foo"))
        ]);
        let found = f
            .lookup()
            .resolve_global_name("Foo", LookupSite::detached(), &mut Diagnostics::new());
        assert_eq!(found.map(|g| g.name).as_deref(), Some("Foo"));
    }

    #[test]
    fn test_alias_hit_reports_alias() {
        let f = fixture(vec![ParseResult::new("a.swift", Some("App"))
            .with_alias(Alias::new("ID", TypeRef::named("String")))]);
        let site = LookupSite {
            module: Some("App"),
            ..LookupSite::detached()
        };
        let found = f
            .lookup()
            .resolve_global_name("ID", site, &mut Diagnostics::new())
            .unwrap();
        assert_eq!(found.name, "String");
        assert!(found.alias.is_some());
    }

    #[test]
    fn test_self_and_nested_scope() {
        let f = fixture(vec![ParseResult::new("a.swift", Some("App")).with_declaration(
            Declaration::structure("Outer")
                .with_child(Declaration::structure("Inner").with_child(Declaration::class("Leaf"))),
        )]);
        let lookup = f.lookup();
        let leaf = DeclId(2);
        let mut diags = Diagnostics::new();

        let site = LookupSite::inside(&f.lowered.arena, leaf);
        assert_eq!(
            lookup.resolve_global_name("Self", site, &mut diags).unwrap().name,
            "App.Outer.Inner.Leaf"
        );
        // sibling of an ancestor, found by walking the scope chain
        assert_eq!(
            lookup.resolve_global_name("Inner", site, &mut diags).unwrap().name,
            "App.Outer.Inner"
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn test_inference_prefers_explicit_modules() {
        let f = fixture(vec![
            ParseResult::new("a.swift", Some("A")).with_declaration(Declaration::class("Foo")),
            ParseResult::new("b.swift", Some("B")).with_declaration(Declaration::class("Foo")),
        ]);
        let imports = vec!["B".to_string()];
        let site = LookupSite {
            scope: None,
            module: Some("C"),
            imports: &imports,
        };
        let mut diags = Diagnostics::new();
        let found = f.lookup().resolve_global_name("Foo", site, &mut diags);
        assert_eq!(found.map(|g| g.name).as_deref(), Some("B.Foo"));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_ambiguity_is_never_guessed() {
        let f = fixture(vec![
            ParseResult::new("a.swift", Some("A")).with_declaration(Declaration::class("Foo")),
            ParseResult::new("b.swift", Some("B")).with_declaration(Declaration::class("Foo")),
        ]);
        let mut diags = Diagnostics::new();
        let site = LookupSite {
            module: Some("C"),
            ..LookupSite::detached()
        };
        assert!(f.lookup().resolve_global_name("Foo", site, &mut diags).is_none());
        let items = diags.into_vec(true);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, DiagnosticKind::AmbiguousSymbol);
        assert!(items[0].message.contains("A.Foo, B.Foo"));
    }

    #[test]
    fn test_composed_name() {
        let f = fixture(vec![ParseResult::new("a.swift", Some("Kit"))
            .with_declaration(Declaration::structure("Outer").with_child(Declaration::class("Inner")))]);
        let lookup = f.lookup();
        assert_eq!(lookup.from_composed_name("Kit.Outer.Inner"), Some(DeclId(1)));
        assert_eq!(lookup.from_composed_name("Inner"), None);
    }
}
