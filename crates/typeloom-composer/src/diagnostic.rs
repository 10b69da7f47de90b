//! Composition diagnostics
//!
//! Every recoverable condition found while composing is recorded here and
//! logged; none of them stops the pipeline.

use serde::{Deserialize, Serialize};

/// Diagnostic severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagnosticSeverity {
    Error = 1,
    Warning = 2,
    Information = 3,
}

impl DiagnosticSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
            DiagnosticSeverity::Information => "info",
        }
    }
}

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Name matched more than one candidate in the same lookup scope
    AmbiguousSymbol,
    /// Extension of a type that was never declared
    UnknownExtensionBase,
    /// Alias chain loops back on itself
    CyclicAlias,
    /// Two declarations share a global name
    DuplicateDeclaration,
    /// Supertype edges form a cycle
    InheritanceCycle,
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::AmbiguousSymbol => "TL001",
            DiagnosticKind::UnknownExtensionBase => "TL002",
            DiagnosticKind::CyclicAlias => "TL003",
            DiagnosticKind::DuplicateDeclaration => "TL004",
            DiagnosticKind::InheritanceCycle => "TL005",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::AmbiguousSymbol => "ambiguous-symbol",
            DiagnosticKind::UnknownExtensionBase => "unknown-extension-base",
            DiagnosticKind::CyclicAlias => "cyclic-alias",
            DiagnosticKind::DuplicateDeclaration => "duplicate-declaration",
            DiagnosticKind::InheritanceCycle => "inheritance-cycle",
        }
    }
}

/// A composition diagnostic
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub kind: DiagnosticKind,
    pub message: String,
    /// File of the declaration that triggered it, when known
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file: Option<String>,
}

impl Diagnostic {
    pub fn new(
        severity: DiagnosticSeverity,
        kind: DiagnosticKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            file: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Warning, kind, message)
    }

    pub fn in_file(mut self, file: Option<&str>) -> Self {
        self.file = file.map(str::to_string);
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Emit through `tracing` at a level matching the severity
    pub fn log(&self) {
        let file = self.file.as_deref().unwrap_or("-");
        match self.severity {
            DiagnosticSeverity::Error => {
                tracing::error!("[{}] {} ({})", self.code(), self.message, file)
            }
            DiagnosticSeverity::Warning => {
                tracing::warn!("[{}] {} ({})", self.code(), self.message, file)
            }
            DiagnosticSeverity::Information => {
                tracing::info!("[{}] {} ({})", self.code(), self.message, file)
            }
        }
    }
}

/// Diagnostics collected by one stage or one resolver job
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Final list; identical diagnostics collapse when `dedupe` is set
    pub fn into_vec(self, dedupe: bool) -> Vec<Diagnostic> {
        let mut items = self.items;
        if dedupe {
            let mut seen = std::collections::HashSet::new();
            items.retain(|d| seen.insert(d.clone()));
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let kinds = [
            DiagnosticKind::AmbiguousSymbol,
            DiagnosticKind::UnknownExtensionBase,
            DiagnosticKind::CyclicAlias,
            DiagnosticKind::DuplicateDeclaration,
            DiagnosticKind::InheritanceCycle,
        ];
        let codes: std::collections::HashSet<_> = kinds.iter().map(|k| k.code()).collect();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning(DiagnosticKind::AmbiguousSymbol, "Ambiguous type Foo"));
        diags.push(Diagnostic::warning(DiagnosticKind::CyclicAlias, "cycle"));
        diags.push(Diagnostic::warning(DiagnosticKind::AmbiguousSymbol, "Ambiguous type Foo"));

        assert_eq!(diags.len(), 3);
        let items = diags.into_vec(true);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, DiagnosticKind::AmbiguousSymbol);
        assert_eq!(items[1].code(), "TL003");
    }
}
