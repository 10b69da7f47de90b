//! Declaration arena
//!
//! All declarations live in one `Vec` and refer to each other through
//! `DeclId` handles: parents, contained types, merged extensions and
//! relationship edges are index lists, never owning references.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

use crate::ast::{AccessLevel, DeclKind, Method, Subscript, TypeRef, Variable};
use crate::error::{ComposeError, Result};

/// Handle of a declaration in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeclId(pub usize);

/// Supertype sets of a declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Relations {
    /// Supertype names as written (rewritten to global names when known)
    pub based: BTreeMap<String, String>,
    /// Resolved supertypes, keyed by global name
    pub based_types: BTreeMap<String, DeclId>,
    /// Transitive class ancestry
    pub inherits: BTreeMap<String, DeclId>,
    /// Transitive protocol conformance
    pub implements: BTreeMap<String, DeclId>,
}

impl Relations {
    /// Union `other` into `self`; existing entries are overwritten, never removed
    pub fn absorb(&mut self, other: &Relations) {
        for name in other.based.keys() {
            self.based.insert(name.clone(), name.clone());
        }
        self.based_types
            .extend(other.based_types.iter().map(|(k, v)| (k.clone(), *v)));
        self.inherits
            .extend(other.inherits.iter().map(|(k, v)| (k.clone(), *v)));
        self.implements
            .extend(other.implements.iter().map(|(k, v)| (k.clone(), *v)));
    }
}

/// Raw type of an enum, after resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawType {
    pub type_ref: TypeRef,
    pub target: Option<DeclId>,
}

/// A declaration in the arena
#[derive(Debug, Clone, Serialize)]
pub struct DeclNode {
    pub id: DeclId,
    pub kind: DeclKind,
    pub local_name: String,
    pub module: Option<String>,
    pub file: String,
    pub imports: Vec<String>,
    pub access: AccessLevel,
    pub parent: Option<DeclId>,
    pub children: Vec<DeclId>,
    pub inherited_types: Vec<String>,
    pub variables: Vec<Variable>,
    pub methods: Vec<Method>,
    pub subscripts: Vec<Subscript>,
    pub generic_parameters: Vec<String>,
    pub attributes: Vec<String>,
    /// Extension whose extended type was never declared
    pub is_unknown_extension: bool,
    /// Canonical declaration this extension was folded into
    pub merged_into: Option<DeclId>,
    pub relations: Relations,
    /// First inherited name, when it is a class
    pub supertype: Option<DeclId>,
    pub raw_type: Option<RawType>,
    /// Resolved members of a protocol composition
    pub composed_types: Vec<DeclId>,
}

impl DeclNode {
    pub fn is_extension(&self) -> bool {
        matches!(self.kind, DeclKind::Extension)
    }

    /// Replace inherited names and rebuild `based` from them
    pub fn set_inherited_types(&mut self, names: Vec<String>) {
        self.relations.based = names.iter().map(|n| (n.clone(), n.clone())).collect();
        self.inherited_types = names;
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeclArena {
    nodes: Vec<DeclNode>,
}

impl DeclArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, mut node: DeclNode) -> DeclId {
        let id = DeclId(self.nodes.len());
        node.id = id;
        self.nodes.push(node);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: DeclId) -> Option<&DeclNode> {
        self.nodes.get(id.0)
    }

    pub fn try_get(&self, id: DeclId) -> Result<&DeclNode> {
        self.nodes.get(id.0).ok_or(ComposeError::InvalidHandle(id.0))
    }

    pub fn ids(&self) -> impl Iterator<Item = DeclId> {
        (0..self.nodes.len()).map(DeclId)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeclNode> {
        self.nodes.iter()
    }

    /// The declaration followed by its enclosing declarations, innermost first
    pub fn ancestors(&self, id: DeclId) -> Ancestors<'_> {
        Ancestors {
            arena: self,
            next: Some(id),
            steps: 0,
        }
    }

    pub fn scope_chain(&self, id: DeclId) -> Vec<DeclId> {
        self.ancestors(id).collect()
    }

    /// Append the parent-qualified name to `buf`
    pub fn write_name(&self, id: DeclId, buf: &mut String) {
        let chain = self.scope_chain(id);
        for (i, decl) in chain.iter().rev().enumerate() {
            if i > 0 {
                buf.push('.');
            }
            buf.push_str(&self[*decl].local_name);
        }
    }

    /// Append the global name to `buf`
    pub fn write_global_name(&self, id: DeclId, buf: &mut String) {
        let node = &self[id];
        if let Some(module) = &node.module {
            if !node.is_unknown_extension {
                buf.push_str(module);
                buf.push('.');
            }
        }
        self.write_name(id, buf);
    }

    /// Parent-qualified name, e.g. `Outer.Inner`
    pub fn name(&self, id: DeclId) -> String {
        let mut buf = String::new();
        self.write_name(id, &mut buf);
        buf
    }

    /// Module-qualified name; unknown extensions keep their bare name
    pub fn global_name(&self, id: DeclId) -> String {
        let mut buf = String::new();
        self.write_global_name(id, &mut buf);
        buf
    }

    /// Fold `source` (an extension) into `target`
    pub(crate) fn merge(&mut self, target: DeclId, source: DeclId) {
        if target == source {
            return;
        }
        let src = &mut self.nodes[source.0];
        let inherited = std::mem::take(&mut src.inherited_types);
        let children = std::mem::take(&mut src.children);
        let mut variables = std::mem::take(&mut src.variables);
        let mut methods = std::mem::take(&mut src.methods);

        // protocol extensions provide default implementations of requirements
        let dst = &self.nodes[target.0];
        if matches!(dst.kind, DeclKind::Protocol(_)) {
            variables.retain(|v| {
                !dst.variables
                    .iter()
                    .any(|existing| existing.name == v.name && existing.is_static == v.is_static)
            });
            methods.retain(|m| !dst.methods.iter().any(|existing| existing.same_signature(m)));
        }

        let src = &mut self.nodes[source.0];
        let subscripts = std::mem::take(&mut src.subscripts);
        let attributes = std::mem::take(&mut src.attributes);
        let relations = std::mem::take(&mut src.relations);
        src.merged_into = Some(target);

        for child in &children {
            self.nodes[child.0].parent = Some(target);
        }

        let dst = &mut self.nodes[target.0];
        let mut names = std::mem::take(&mut dst.inherited_types);
        names.extend(inherited);
        dst.set_inherited_types(names);
        dst.children.extend(children);
        dst.variables.extend(variables);
        dst.methods.extend(methods);
        dst.subscripts.extend(subscripts);
        for attribute in attributes {
            if !dst.attributes.contains(&attribute) {
                dst.attributes.push(attribute);
            }
        }
        dst.relations.inherits.extend(relations.inherits);
        dst.relations.implements.extend(relations.implements);
    }
}

/// Iterator over a declaration and its parents
pub struct Ancestors<'a> {
    arena: &'a DeclArena,
    next: Option<DeclId>,
    steps: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = DeclId;

    fn next(&mut self) -> Option<DeclId> {
        let current = self.next?;
        // parent links never loop in well-formed input; stop if they do
        if self.steps > self.arena.len() {
            return None;
        }
        self.steps += 1;
        self.next = self.arena[current].parent;
        Some(current)
    }
}

impl Index<DeclId> for DeclArena {
    type Output = DeclNode;

    fn index(&self, id: DeclId) -> &DeclNode {
        &self.nodes[id.0]
    }
}

impl IndexMut<DeclId> for DeclArena {
    fn index_mut(&mut self, id: DeclId) -> &mut DeclNode {
        &mut self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn node(kind: DeclKind, name: &str, module: Option<&str>) -> DeclNode {
        DeclNode {
            id: DeclId(0),
            kind,
            local_name: name.to_string(),
            module: module.map(str::to_string),
            file: "test.swift".to_string(),
            imports: Vec::new(),
            access: AccessLevel::Internal,
            parent: None,
            children: Vec::new(),
            inherited_types: Vec::new(),
            variables: Vec::new(),
            methods: Vec::new(),
            subscripts: Vec::new(),
            generic_parameters: Vec::new(),
            attributes: Vec::new(),
            is_unknown_extension: false,
            merged_into: None,
            relations: Relations::default(),
            supertype: None,
            raw_type: None,
            composed_types: Vec::new(),
        }
    }

    #[test]
    fn test_names_follow_parent_chain() {
        let mut arena = DeclArena::new();
        let outer = arena.push(node(DeclKind::Struct, "Outer", Some("App")));
        let inner = arena.push(node(DeclKind::Class, "Inner", Some("App")));
        arena[inner].parent = Some(outer);
        arena[outer].children.push(inner);

        assert_eq!(arena.name(inner), "Outer.Inner");
        assert_eq!(arena.global_name(inner), "App.Outer.Inner");
        assert_eq!(arena.scope_chain(inner), vec![inner, outer]);
    }

    #[test]
    fn test_unknown_extension_drops_module() {
        let mut arena = DeclArena::new();
        let ext = arena.push(node(DeclKind::Extension, "Missing", Some("App")));
        assert_eq!(arena.global_name(ext), "App.Missing");
        arena[ext].is_unknown_extension = true;
        assert_eq!(arena.global_name(ext), "Missing");
    }

    #[test]
    fn test_merge_moves_members_and_children() {
        let mut arena = DeclArena::new();
        let base = arena.push(node(DeclKind::Struct, "Foo", None));
        let ext = arena.push(node(DeclKind::Extension, "Foo", None));
        let nested = arena.push(node(DeclKind::Struct, "Nested", None));
        arena[nested].parent = Some(ext);
        arena[ext].children.push(nested);
        arena[ext].methods.push(Method::new("extra()"));
        arena[ext].set_inherited_types(vec!["Equatable".to_string()]);

        arena.merge(base, ext);

        assert_eq!(arena[base].methods.len(), 1);
        assert_eq!(arena[base].inherited_types, vec!["Equatable"]);
        assert!(arena[base].relations.based.contains_key("Equatable"));
        assert_eq!(arena[nested].parent, Some(base));
        assert_eq!(arena.name(nested), "Foo.Nested");
        assert_eq!(arena[ext].merged_into, Some(base));
        assert!(arena[ext].methods.is_empty());
    }

    #[test]
    fn test_try_get_rejects_foreign_handle() {
        let arena = DeclArena::new();
        assert!(matches!(
            arena.try_get(DeclId(3)),
            Err(ComposeError::InvalidHandle(3))
        ));
    }
}
