//! Type reference resolution
//!
//! Every reference site reachable from a canonical declaration, a free
//! function or an alias is resolved to its canonical spelling and to the
//! declaration it denotes. Work is split into one job per owner; jobs run on
//! a rayon pool and only read shared state. Their results are merged into
//! the [`ResolutionCache`] once the parallel section is over.

use rayon::prelude::*;
use serde::ser::{Serialize, Serializer};
use std::collections::HashMap;

use crate::aliases::AliasTable;
use crate::arena::{DeclArena, DeclId, RawType};
use crate::ast::{spell, Composite, DeclKind, Method, Optionality, SiteId, TupleElement, TypeRef};
use crate::config::ComposerOptions;
use crate::diagnostic::Diagnostics;
use crate::error::Result;
use crate::lookup::{GlobalName, LookupSite, NameLookup};
use crate::lower::FunctionEntry;
use crate::symbols::SymbolTable;

/// Owner of a reference site
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RefOwner {
    Declaration(DeclId),
    /// Index into the model's free functions, which are sorted by name
    Function(usize),
    /// Index into the alias table
    Alias(usize),
}

/// Outcome of resolving one reference
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Resolution {
    /// Canonical spelling, when it differs from the written one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<TypeRef>,
    /// Declaration the reference denotes; `None` is an unknown type
    pub target: Option<DeclId>,
}

impl Resolution {
    /// Name to use for the reference `written`
    pub fn name<'a>(&'a self, written: &'a TypeRef) -> &'a str {
        self.actual.as_ref().map(|t| t.name.as_str()).unwrap_or(&written.name)
    }

    pub fn is_unknown(&self) -> bool {
        self.target.is_none()
    }
}

/// Resolutions keyed by `(owner, site)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionCache {
    entries: HashMap<(RefOwner, SiteId), Resolution>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner: RefOwner, site: SiteId) -> Option<&Resolution> {
        self.entries.get(&(owner, site))
    }

    pub fn insert(&mut self, owner: RefOwner, site: SiteId, resolution: Resolution) {
        self.entries.insert((owner, site), resolution);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(RefOwner, SiteId), &Resolution)> {
        self.entries.iter()
    }

    /// Entries sorted by owner and site
    pub fn sorted(&self) -> Vec<(RefOwner, SiteId, &Resolution)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|((owner, site), resolution)| (*owner, *site, resolution))
            .collect();
        entries.sort_by_key(|(owner, site, _)| (*owner, *site));
        entries
    }
}

#[derive(serde::Serialize)]
struct CacheEntry<'a> {
    owner: RefOwner,
    site: SiteId,
    #[serde(flatten)]
    resolution: &'a Resolution,
}

impl Serialize for ResolutionCache {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.sorted().into_iter().map(|(owner, site, resolution)| {
            CacheEntry {
                owner,
                site,
                resolution,
            }
        }))
    }
}

/// What one job found
#[derive(Debug, Default)]
struct JobOutput {
    owner: Option<RefOwner>,
    entries: Vec<(SiteId, Resolution)>,
    raw_type: Option<RawType>,
    composed: Vec<DeclId>,
    diagnostics: Diagnostics,
}

/// Output of the resolution stage
#[derive(Debug, Default)]
pub struct ResolvedRefs {
    pub cache: ResolutionCache,
    pub diagnostics: Diagnostics,
}

/// Resolves the references of a single owner, memoized by site
struct RefResolver<'a> {
    lookup: &'a NameLookup<'a>,
    site: LookupSite<'a>,
    memo: HashMap<SiteId, Resolution>,
    diagnostics: Diagnostics,
}

impl<'a> RefResolver<'a> {
    fn new(lookup: &'a NameLookup<'a>, site: LookupSite<'a>) -> Self {
        Self {
            lookup,
            site,
            memo: HashMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    fn resolve(&mut self, ty: &TypeRef) -> Resolution {
        if let Some(found) = self.memo.get(&ty.site) {
            return found.clone();
        }
        // placeholder for self-referential alias targets, e.g. `Tree = Node<Tree>`
        self.memo.insert(ty.site, Resolution::default());
        let resolution = self.compute(ty);
        self.memo.insert(ty.site, resolution.clone());
        resolution
    }

    /// Record a resolution computed elsewhere, unless the site already has one
    fn record(&mut self, site: SiteId, resolution: Resolution) {
        self.memo.entry(site).or_insert(resolution);
    }

    fn compute(&mut self, ty: &TypeRef) -> Resolution {
        let actual = self.actual_type(ty);
        let effective = actual.as_ref().unwrap_or(ty);
        let target = match &effective.composite {
            Some(Composite::Tuple { .. }) | Some(Composite::Closure(_)) => None,
            _ => self.lookup.symbols().get(effective.lookup_identifier()),
        };
        Resolution { actual, target }
    }

    /// Canonical spelling of `ty`, or `None` when it is already canonical
    fn actual_type(&mut self, ty: &TypeRef) -> Option<TypeRef> {
        let retrieved =
            self.lookup
                .resolve_global_name(ty.base_identifier(), self.site, &mut self.diagnostics);

        let candidate = match retrieved {
            Some(GlobalName {
                alias: Some(index),
                name,
            }) => {
                let target = &self.lookup.aliases().entry(index).alias.target;
                let optionality = merge_optionality(ty.optionality, target.optionality);
                match (&target.composite, &ty.composite) {
                    (Some(composite), _) => {
                        let (composite, _) = self.rebuild(composite, None);
                        with_composite(composite, optionality, ty.site)
                    }
                    (None, Some(composite)) => {
                        let (composite, _) = self.rebuild(composite, Some(name.as_str()));
                        with_composite(composite, optionality, ty.site)
                    }
                    (None, None) => TypeRef {
                        name,
                        optionality,
                        composite: None,
                        site: ty.site,
                    },
                }
            }
            Some(GlobalName { name, alias: None }) => match &ty.composite {
                Some(composite) => {
                    let (composite, _) = self.rebuild(composite, Some(name.as_str()));
                    with_composite(composite, ty.optionality, ty.site)
                }
                None => TypeRef {
                    name,
                    optionality: ty.optionality,
                    composite: None,
                    site: ty.site,
                },
            },
            None => match &ty.composite {
                Some(composite) => {
                    let (composite, changed) = self.rebuild(composite, None);
                    if !changed {
                        return None;
                    }
                    with_composite(composite, ty.optionality, ty.site)
                }
                None => return None,
            },
        };

        if candidate.name == ty.name && candidate.optionality == ty.optionality {
            None
        } else {
            Some(candidate)
        }
    }

    /// Resolve nested references and rebuild the composite; `rename` replaces a generic's base name
    fn rebuild(&mut self, composite: &Composite, rename: Option<&str>) -> (Composite, bool) {
        let mut changed = false;
        let mut nested = |this: &mut Self, ty: &TypeRef| -> TypeRef {
            match this.resolve(ty).actual {
                Some(actual) => {
                    changed = true;
                    actual
                }
                None => ty.clone(),
            }
        };

        let rebuilt = match composite {
            Composite::Tuple { elements } => Composite::Tuple {
                elements: elements
                    .iter()
                    .map(|e| TupleElement {
                        label: e.label.clone(),
                        ty: nested(self, &e.ty),
                    })
                    .collect(),
            },
            Composite::Array { element } => Composite::Array {
                element: Box::new(nested(self, element)),
            },
            Composite::Dictionary { key, value } => Composite::Dictionary {
                key: Box::new(nested(self, key)),
                value: Box::new(nested(self, value)),
            },
            Composite::Closure(sig) => {
                let mut sig = sig.clone();
                sig.parameters = sig.parameters.iter().map(|p| nested(self, p)).collect();
                sig.return_type = Box::new(nested(self, &sig.return_type));
                Composite::Closure(sig)
            }
            Composite::Generic { name, arguments } => Composite::Generic {
                name: rename.unwrap_or(name).to_string(),
                arguments: arguments.iter().map(|a| nested(self, a)).collect(),
            },
        };
        let renamed = matches!(
            (composite, &rebuilt),
            (Composite::Generic { name: a, .. }, Composite::Generic { name: b, .. }) if a != b
        );
        (rebuilt, changed || renamed)
    }

    fn resolve_method(&mut self, method: &Method, owner: Option<(DeclId, String)>) {
        for parameter in &method.parameters {
            self.resolve(&parameter.type_ref);
        }
        let Some(ret) = &method.return_type else {
            return;
        };
        match owner {
            Some((id, global_name)) if method.is_any_initializer() => {
                let optionality = if method.is_failable_initializer {
                    Optionality::Optional
                } else {
                    Optionality::Required
                };
                let actual = TypeRef {
                    name: global_name,
                    optionality,
                    composite: None,
                    site: ret.site,
                };
                self.record(
                    ret.site,
                    Resolution {
                        actual: Some(actual),
                        target: Some(id),
                    },
                );
            }
            _ if ret.is_void() => {}
            _ => {
                self.resolve(ret);
            }
        }
    }

    fn finish(self, owner: RefOwner) -> JobOutput {
        let mut entries: Vec<(SiteId, Resolution)> = self.memo.into_iter().collect();
        entries.sort_by_key(|(site, _)| *site);
        JobOutput {
            owner: Some(owner),
            entries,
            raw_type: None,
            composed: Vec::new(),
            diagnostics: self.diagnostics,
        }
    }
}

fn merge_optionality(written: Optionality, target: Optionality) -> Optionality {
    if written.is_optional() {
        written
    } else {
        target
    }
}

fn with_composite(composite: Composite, optionality: Optionality, site: SiteId) -> TypeRef {
    TypeRef {
        name: spell(&composite),
        optionality,
        composite: Some(composite),
        site,
    }
}

fn resolve_declaration(lookup: &NameLookup<'_>, id: DeclId) -> JobOutput {
    let arena = lookup.arena();
    let node = &arena[id];
    let mut resolver = RefResolver::new(lookup, LookupSite::inside(arena, id));
    let global_name = arena.global_name(id);

    for variable in &node.variables {
        resolver.resolve(&variable.type_ref);
    }
    for method in &node.methods {
        resolver.resolve_method(method, Some((id, global_name.clone())));
    }
    for subscript in &node.subscripts {
        for parameter in &subscript.parameters {
            resolver.resolve(&parameter.type_ref);
        }
        resolver.resolve(&subscript.return_type);
    }

    let mut raw_type = None;
    let mut composed = Vec::new();
    match &node.kind {
        DeclKind::Enum(body) => {
            for case in &body.cases {
                for value in &case.associated_values {
                    resolver.resolve(&value.type_ref);
                }
            }
            if body.has_raw_type {
                raw_type = enum_raw_type(&mut resolver, arena, id);
            }
        }
        DeclKind::Protocol(body) => {
            for associated in &body.associated_types {
                if let Some(ty) = &associated.type_ref {
                    resolver.resolve(ty);
                }
            }
            for requirement in &body.generic_requirements {
                resolver.resolve(&requirement.right);
            }
        }
        DeclKind::ProtocolComposition(body) => {
            composed = body
                .composed
                .iter()
                .filter_map(|ty| resolver.resolve(ty).target)
                .collect();
        }
        DeclKind::Class | DeclKind::Struct | DeclKind::Actor | DeclKind::Extension => {}
    }

    let mut output = resolver.finish(RefOwner::Declaration(id));
    output.raw_type = raw_type;
    output.composed = composed;
    output
}

/// Raw type of an enum: its `rawValue` property, else its first inherited name
fn enum_raw_type(resolver: &mut RefResolver<'_>, arena: &DeclArena, id: DeclId) -> Option<RawType> {
    let node = &arena[id];
    let DeclKind::Enum(body) = &node.kind else {
        return None;
    };

    if let Some(raw_value) = node
        .variables
        .iter()
        .find(|v| v.name == "rawValue" && !v.is_static)
    {
        let resolution = resolver.resolve(&raw_value.type_ref);
        return Some(RawType {
            type_ref: resolution
                .actual
                .unwrap_or_else(|| raw_value.type_ref.clone()),
            target: resolution.target,
        });
    }

    let first = node.inherited_types.first()?;
    // enums without cases or with associated values have no raw type
    if body.cases.is_empty() || body.has_associated_values() {
        return None;
    }
    match resolver.lookup.symbols().get(first) {
        Some(candidate) if arena[candidate].kind.is_protocol_like() => None,
        candidate => Some(RawType {
            type_ref: TypeRef::named(first.clone()),
            target: candidate,
        }),
    }
}

fn resolve_function(lookup: &NameLookup<'_>, index: usize, function: &FunctionEntry) -> JobOutput {
    let site = LookupSite {
        scope: None,
        module: function.module.as_deref(),
        imports: &function.imports,
    };
    let mut resolver = RefResolver::new(lookup, site);
    resolver.resolve_method(&function.method, None);
    resolver.finish(RefOwner::Function(index))
}

fn resolve_alias(lookup: &NameLookup<'_>, index: usize) -> JobOutput {
    let entry = lookup.aliases().entry(index);
    let mut resolver = RefResolver::new(lookup, entry.site());
    resolver.resolve(&entry.alias.target);
    resolver.finish(RefOwner::Alias(index))
}

fn run_job(lookup: &NameLookup<'_>, functions: &[FunctionEntry], owner: RefOwner) -> JobOutput {
    match owner {
        RefOwner::Declaration(id) => resolve_declaration(lookup, id),
        RefOwner::Function(index) => resolve_function(lookup, index, &functions[index]),
        RefOwner::Alias(index) => resolve_alias(lookup, index),
    }
}

/// Resolve every reference of `canonical`, `functions` and all aliases
pub fn resolve_references(
    arena: &mut DeclArena,
    symbols: &SymbolTable,
    aliases: &AliasTable,
    canonical: &[DeclId],
    functions: &[FunctionEntry],
    options: &ComposerOptions,
) -> Result<ResolvedRefs> {
    let jobs: Vec<RefOwner> = canonical
        .iter()
        .map(|id| RefOwner::Declaration(*id))
        .chain((0..functions.len()).map(RefOwner::Function))
        .chain((0..aliases.len()).map(RefOwner::Alias))
        .collect();

    let outputs: Vec<JobOutput> = {
        let lookup = NameLookup::new(arena, symbols, aliases);
        if options.serial {
            tracing::debug!("Resolving {} reference owners serially", jobs.len());
            jobs.iter()
                .map(|owner| run_job(&lookup, functions, *owner))
                .collect()
        } else {
            let workers = options.worker_count();
            tracing::debug!(
                "Resolving {} reference owners on {} workers",
                jobs.len(),
                workers
            );
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()?;
            pool.install(|| {
                jobs.par_iter()
                    .map(|owner| run_job(&lookup, functions, *owner))
                    .collect()
            })
        }
    };

    let mut resolved = ResolvedRefs::default();
    for output in outputs {
        let Some(owner) = output.owner else {
            continue;
        };
        for (site, resolution) in output.entries {
            resolved.cache.insert(owner, site, resolution);
        }
        if let RefOwner::Declaration(id) = owner {
            let node = &mut arena[id];
            node.raw_type = output.raw_type;
            node.composed_types = output.composed;
        }
        resolved.diagnostics.extend(output.diagnostics);
    }

    tracing::info!(
        "Resolved {} reference sites for {} owners",
        resolved.cache.len(),
        jobs.len()
    );
    Ok(resolved)
}
