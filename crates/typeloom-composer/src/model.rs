//! The composed model handed to consumers

use serde::Serialize;
use std::collections::HashMap;

use crate::aliases::AliasTable;
use crate::arena::{DeclArena, DeclId, DeclNode};
use crate::ast::{AccessLevel, TypeRef};
use crate::diagnostic::Diagnostic;
use crate::graph::TypeGraph;
use crate::lower::FunctionEntry;
use crate::resolve::{RefOwner, Resolution, ResolutionCache};

/// An alias flattened to its terminal target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAlias {
    /// Full name (`module.parentName.alias`)
    pub name: String,
    /// Name as declared
    pub local_name: String,
    pub module: Option<String>,
    pub parent: Option<DeclId>,
    pub access: AccessLevel,
    /// Full name of the last alias in the chain
    pub terminal: String,
    /// Canonical spelling of the terminal target
    pub target: TypeRef,
    /// Declaration the target denotes; `None` is an unknown type
    pub declaration: Option<DeclId>,
}

impl ResolvedAlias {
    /// Every declared alias; one without a terminal (on a cycle) is its own terminal and unresolved
    fn collect(aliases: &AliasTable, cache: &ResolutionCache) -> Vec<ResolvedAlias> {
        aliases
            .unresolved()
            .iter()
            .map(|(name, &declaring)| {
                let entry = aliases.entry(declaring);
                let (terminal, resolution) = match aliases.terminal_of(name) {
                    Some(terminal) => {
                        let site = aliases.entry(terminal).alias.target.site;
                        (terminal, cache.get(RefOwner::Alias(terminal), site))
                    }
                    None => (declaring, None),
                };
                let written = &aliases.entry(terminal).alias.target;
                ResolvedAlias {
                    name: name.clone(),
                    local_name: entry.alias.name.clone(),
                    module: entry.module.clone(),
                    parent: entry.parent,
                    access: entry.alias.access,
                    terminal: aliases.full_name(terminal).to_string(),
                    target: resolution
                        .and_then(|r| r.actual.clone())
                        .unwrap_or_else(|| written.clone()),
                    declaration: resolution.and_then(|r| r.target),
                }
            })
            .collect()
    }
}

/// Immutable result of one composition run
#[derive(Debug, Clone, Serialize)]
pub struct ComposedModel {
    arena: DeclArena,
    /// Canonical declarations, sorted by global name
    declarations: Vec<DeclId>,
    /// Free functions, sorted by name
    functions: Vec<FunctionEntry>,
    /// Aliases, sorted by full name
    aliases: Vec<ResolvedAlias>,
    resolutions: ResolutionCache,
    type_graph: TypeGraph,
    diagnostics: Vec<Diagnostic>,

    #[serde(skip)]
    by_name: HashMap<String, DeclId>,
}

impl ComposedModel {
    pub(crate) fn new(
        arena: DeclArena,
        declarations: Vec<DeclId>,
        functions: Vec<FunctionEntry>,
        aliases: &AliasTable,
        resolutions: ResolutionCache,
        type_graph: TypeGraph,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        let by_name = declarations
            .iter()
            .map(|id| (arena.global_name(*id), *id))
            .collect();
        let aliases = ResolvedAlias::collect(aliases, &resolutions);
        Self {
            arena,
            declarations,
            functions,
            aliases,
            resolutions,
            type_graph,
            diagnostics,
            by_name,
        }
    }

    /// Canonical declarations in global-name order
    pub fn declarations(&self) -> impl Iterator<Item = &DeclNode> + '_ {
        self.declarations.iter().map(move |id| &self.arena[*id])
    }

    pub fn declaration_ids(&self) -> &[DeclId] {
        &self.declarations
    }

    /// Any arena node, including extensions that were merged away
    pub fn declaration(&self, id: DeclId) -> Option<&DeclNode> {
        self.arena.get(id)
    }

    /// Canonical declaration with the given global name
    pub fn find(&self, global_name: &str) -> Option<&DeclNode> {
        self.by_name.get(global_name).map(|id| &self.arena[*id])
    }

    pub fn global_name(&self, id: DeclId) -> String {
        self.arena.global_name(id)
    }

    pub fn arena(&self) -> &DeclArena {
        &self.arena
    }

    pub fn functions(&self) -> &[FunctionEntry] {
        &self.functions
    }

    pub fn aliases(&self) -> &[ResolvedAlias] {
        &self.aliases
    }

    pub fn alias(&self, name: &str) -> Option<&ResolvedAlias> {
        self.aliases
            .binary_search_by(|a| a.name.as_str().cmp(name))
            .ok()
            .map(|index| &self.aliases[index])
    }

    /// Resolution of the reference `ty` as seen by `owner`
    pub fn resolution(&self, owner: RefOwner, ty: &TypeRef) -> Option<&Resolution> {
        self.resolutions.get(owner, ty.site)
    }

    /// Canonical name of `ty` as seen by `owner`
    pub fn resolved_name<'a>(&'a self, owner: RefOwner, ty: &'a TypeRef) -> &'a str {
        match self.resolutions.get(owner, ty.site) {
            Some(resolution) => resolution.name(ty),
            None => &ty.name,
        }
    }

    pub fn resolutions(&self) -> &ResolutionCache {
        &self.resolutions
    }

    pub fn type_graph(&self) -> &TypeGraph {
        &self.type_graph
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
