//! Typeloom composer: links parsed declarations into one resolved model
//!
//! Takes the per-file output of the front-end parser and produces a
//! [`ComposedModel`] in which extensions are merged into their canonical
//! declarations, alias chains are flattened, type references are resolved
//! and inheritance is expanded to its transitive closure.

pub mod aliases;
pub mod arena;
pub mod ast;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod graph;
pub mod lookup;
pub mod lower;
pub mod model;
pub mod relations;
pub mod resolve;
pub mod symbols;
pub mod unify;

pub use arena::{DeclArena, DeclId, DeclNode, Relations};
pub use ast::{Declaration, ParseResult, TypeRef};
pub use config::{ComposerConfig, ComposerOptions};
pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticSeverity};
pub use error::{ComposeError, Result};
pub use graph::{RelationKind, TypeGraph};
pub use model::{ComposedModel, ResolvedAlias};
pub use resolve::{RefOwner, Resolution};

use tracing::{debug, info};

use aliases::AliasTable;
use diagnostic::Diagnostics;
use symbols::SymbolTable;

/// Runs the composition pipeline with fixed options
#[derive(Debug, Clone, Default)]
pub struct Composer {
    options: ComposerOptions,
}

impl Composer {
    pub fn new(options: ComposerOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &ComposerConfig) -> Self {
        Self::new(config.composer.clone())
    }

    pub fn options(&self) -> &ComposerOptions {
        &self.options
    }

    /// Compose parse results into a single model
    pub fn compose(&self, results: Vec<ParseResult>) -> Result<ComposedModel> {
        info!("Composing {} parse results", results.len());
        let mut diagnostics = Diagnostics::new();

        let lower::Lowered {
            mut arena,
            aliases,
            mut functions,
        } = lower::lower(results);
        functions.sort_by(|a, b| {
            (&a.method.name, &a.module).cmp(&(&b.method.name, &b.module))
        });
        let functions = dedup_functions(functions);
        debug!(
            "Lowered {} declarations, {} aliases, {} functions",
            arena.len(),
            aliases.len(),
            functions.len()
        );

        let mut symbols = SymbolTable::build(&arena, &mut diagnostics);
        debug!("Symbol table: {} global names", symbols.len());

        let mut alias_table = AliasTable::build(aliases, &arena, &mut diagnostics);
        alias_table.bind_targets(&arena, &symbols, &mut diagnostics);
        debug!(
            "Alias table: {} aliases, {} resolved",
            alias_table.len(),
            alias_table.resolved().len()
        );

        let canonical = unify::unify(&mut arena, &mut symbols, &alias_table, &mut diagnostics)?;

        let resolved = resolve::resolve_references(
            &mut arena,
            &symbols,
            &alias_table,
            &canonical,
            &functions,
            &self.options,
        )?;
        let mut cache = resolved.cache;
        diagnostics.extend(resolved.diagnostics);

        let type_graph =
            relations::build_relations(&mut arena, &mut cache, &canonical, &mut diagnostics);

        let diagnostics = diagnostics.into_vec(self.options.deduplicate_diagnostics);
        info!(
            "Composed {} declarations with {} diagnostics",
            canonical.len(),
            diagnostics.len()
        );

        Ok(ComposedModel::new(
            arena,
            canonical,
            functions,
            &alias_table,
            cache,
            type_graph,
            diagnostics,
        ))
    }
}

/// Drop repeated declarations of a function; `functions` is sorted by name
fn dedup_functions(functions: Vec<lower::FunctionEntry>) -> Vec<lower::FunctionEntry> {
    let mut unique: Vec<lower::FunctionEntry> = Vec::with_capacity(functions.len());
    for function in functions {
        let repeated = unique
            .iter()
            .rev()
            .take_while(|kept| kept.method.name == function.method.name)
            .any(|kept| kept.module == function.module && kept.method.same_signature(&function.method));
        if !repeated {
            unique.push(function);
        }
    }
    unique
}

/// Compose with default options
pub fn compose(results: Vec<ParseResult>) -> Result<ComposedModel> {
    Composer::default().compose(results)
}
