//! Type aliases as written

use serde::{Deserialize, Serialize};

use super::decl::AccessLevel;
use super::type_ref::TypeRef;

/// `typealias Name = Target`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    /// Alias name in its own scope
    pub name: String,
    pub target: TypeRef,
    #[serde(default)]
    pub access: AccessLevel,
}

impl Alias {
    pub fn new(name: impl Into<String>, target: TypeRef) -> Self {
        Self {
            name: name.into(),
            target,
            access: AccessLevel::default(),
        }
    }
}
