//! Raw declarations as produced by the front-end parser

use serde::{Deserialize, Serialize};

use super::alias::Alias;
use super::member::{Method, Subscript, Variable};
use super::type_ref::TypeRef;

/// Access level of a declaration or member
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Private,
    Fileprivate,
    #[default]
    Internal,
    Package,
    Public,
    Open,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Private => "private",
            AccessLevel::Fileprivate => "fileprivate",
            AccessLevel::Internal => "internal",
            AccessLevel::Package => "package",
            AccessLevel::Public => "public",
            AccessLevel::Open => "open",
        }
    }
}

/// Associated value of an enum case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociatedValue {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumCase {
    pub name: String,
    #[serde(default)]
    pub associated_values: Vec<AssociatedValue>,
    #[serde(default)]
    pub raw_value: Option<String>,
}

impl EnumCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            associated_values: Vec::new(),
            raw_value: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumBody {
    #[serde(default)]
    pub cases: Vec<EnumCase>,
    /// Parser hint that the first inherited name may be a raw type
    #[serde(default)]
    pub has_raw_type: bool,
}

impl EnumBody {
    pub fn has_associated_values(&self) -> bool {
        self.cases.iter().any(|c| !c.associated_values.is_empty())
    }
}

/// Associated type requirement of a protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociatedType {
    pub name: String,
    /// Default or constraint type, if written
    #[serde(default, rename = "type")]
    pub type_ref: Option<TypeRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementRelation {
    Equals,
    ConformsTo,
}

/// `where Left == Right` / `where Left: Right`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericRequirement {
    pub left: String,
    pub right: TypeRef,
    pub relation: RequirementRelation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolBody {
    #[serde(default)]
    pub associated_types: Vec<AssociatedType>,
    #[serde(default)]
    pub generic_requirements: Vec<GenericRequirement>,
}

impl ProtocolBody {
    pub fn associated_type(&self, name: &str) -> Option<&AssociatedType> {
        self.associated_types.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositionBody {
    /// Members of `A & B`
    #[serde(default)]
    pub composed: Vec<TypeRef>,
}

/// Kind of declaration, with the kind-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclKind {
    Class,
    Struct,
    Actor,
    Enum(EnumBody),
    Protocol(ProtocolBody),
    ProtocolComposition(CompositionBody),
    Extension,
}

impl DeclKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            DeclKind::Class => "class",
            DeclKind::Struct => "struct",
            DeclKind::Actor => "actor",
            DeclKind::Enum(_) => "enum",
            DeclKind::Protocol(_) => "protocol",
            DeclKind::ProtocolComposition(_) => "protocolComposition",
            DeclKind::Extension => "extension",
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(self, DeclKind::Class)
    }

    pub fn is_protocol_like(&self) -> bool {
        matches!(self, DeclKind::Protocol(_) | DeclKind::ProtocolComposition(_))
    }
}

/// A declaration tree as written in one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    #[serde(flatten)]
    pub kind: DeclKind,
    /// Local name; extensions of nested types may use a dotted name
    pub name: String,
    /// Overrides the file's module when present
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub access: AccessLevel,
    #[serde(default)]
    pub inherited_types: Vec<String>,
    #[serde(default)]
    pub children: Vec<Declaration>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub methods: Vec<Method>,
    #[serde(default)]
    pub subscripts: Vec<Subscript>,
    #[serde(default)]
    pub aliases: Vec<Alias>,
    #[serde(default)]
    pub generic_parameters: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl Declaration {
    pub fn new(kind: DeclKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            module: None,
            access: AccessLevel::default(),
            inherited_types: Vec::new(),
            children: Vec::new(),
            variables: Vec::new(),
            methods: Vec::new(),
            subscripts: Vec::new(),
            aliases: Vec::new(),
            generic_parameters: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(DeclKind::Class, name)
    }

    pub fn structure(name: impl Into<String>) -> Self {
        Self::new(DeclKind::Struct, name)
    }

    pub fn protocol(name: impl Into<String>) -> Self {
        Self::new(DeclKind::Protocol(ProtocolBody::default()), name)
    }

    pub fn enumeration(name: impl Into<String>, cases: Vec<EnumCase>) -> Self {
        Self::new(
            DeclKind::Enum(EnumBody {
                cases,
                has_raw_type: false,
            }),
            name,
        )
    }

    pub fn extension(name: impl Into<String>) -> Self {
        Self::new(DeclKind::Extension, name)
    }

    pub fn is_extension(&self) -> bool {
        matches!(self.kind, DeclKind::Extension)
    }

    pub fn inheriting(mut self, name: impl Into<String>) -> Self {
        self.inherited_types.push(name.into());
        self
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_child(mut self, child: Declaration) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_alias(mut self, alias: Alias) -> Self {
        self.aliases.push(alias);
        self
    }

    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }
}
