//! Members of declarations: variables, methods, subscripts

use serde::{Deserialize, Serialize};

use super::decl::AccessLevel;
use super::type_ref::TypeRef;
use crate::arena::DeclId;

/// Stored or computed property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub access: AccessLevel,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_computed: bool,
    #[serde(default)]
    pub attributes: Vec<String>,
    /// Declaration (type or extension) that wrote this member
    #[serde(default, skip_deserializing)]
    pub defined_in: Option<DeclId>,
}

impl Variable {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            access: AccessLevel::default(),
            is_static: false,
            is_computed: false,
            attributes: Vec::new(),
            defined_in: None,
        }
    }
}

/// Method or function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodParameter {
    /// External argument label, `None` for `_`
    #[serde(default)]
    pub label: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
}

impl MethodParameter {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        let name = name.into();
        Self {
            label: Some(name.clone()),
            name,
            type_ref,
        }
    }
}

/// Method, initializer or free function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    /// Selector-like name, e.g. `extra()` or `add(_:to:)`
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<MethodParameter>,
    /// `None` means `Void`
    #[serde(default)]
    pub return_type: Option<TypeRef>,
    #[serde(default)]
    pub access: AccessLevel,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_initializer: bool,
    #[serde(default)]
    pub is_failable_initializer: bool,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub throws: bool,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default, skip_deserializing)]
    pub defined_in: Option<DeclId>,
}

impl Method {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: None,
            access: AccessLevel::default(),
            is_static: false,
            is_initializer: false,
            is_failable_initializer: false,
            is_async: false,
            throws: false,
            attributes: Vec::new(),
            defined_in: None,
        }
    }

    pub fn with_parameter(mut self, parameter: MethodParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn returning(mut self, type_ref: TypeRef) -> Self {
        self.return_type = Some(type_ref);
        self
    }

    pub fn initializer(mut self, failable: bool) -> Self {
        self.is_initializer = !failable;
        self.is_failable_initializer = failable;
        self
    }

    pub fn is_any_initializer(&self) -> bool {
        self.is_initializer || self.is_failable_initializer
    }

    /// Whether the method produces no value
    pub fn returns_void(&self) -> bool {
        self.return_type.as_ref().map(|t| t.is_void()).unwrap_or(true)
    }

    /// Same declaration as written, ignoring reference sites and the defining declaration
    pub fn same_signature(&self, other: &Method) -> bool {
        let same_return = match (&self.return_type, &other.return_type) {
            _ if self.returns_void() && other.returns_void() => true,
            (Some(a), Some(b)) => a.as_source() == b.as_source(),
            _ => false,
        };
        self.name == other.name
            && self.is_static == other.is_static
            && self.is_initializer == other.is_initializer
            && self.is_failable_initializer == other.is_failable_initializer
            && self.is_async == other.is_async
            && self.throws == other.throws
            && same_return
            && self.parameters.len() == other.parameters.len()
            && self.parameters.iter().zip(&other.parameters).all(|(a, b)| {
                a.label == b.label && a.name == b.name && a.type_ref.as_source() == b.type_ref.as_source()
            })
    }
}

/// Subscript member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscript {
    #[serde(default)]
    pub parameters: Vec<MethodParameter>,
    pub return_type: TypeRef,
    #[serde(default)]
    pub access: AccessLevel,
    #[serde(default, skip_deserializing)]
    pub defined_in: Option<DeclId>,
}
