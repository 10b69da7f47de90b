//! Type references as written at a declaration site
//!
//! A `TypeRef` is immutable once lowered: resolution results live in the
//! composer's resolution cache, keyed by the reference's `SiteId`.

use serde::{Deserialize, Serialize};

/// Identifier of a reference site, unique across one composition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SiteId(pub u32);

/// Optionality marker of a reference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optionality {
    #[default]
    Required,
    /// `T?`
    Optional,
    /// `T!`
    ImplicitlyUnwrapped,
}

impl Optionality {
    pub fn suffix(&self) -> &'static str {
        match self {
            Optionality::Required => "",
            Optionality::Optional => "?",
            Optionality::ImplicitlyUnwrapped => "!",
        }
    }

    pub fn is_optional(&self) -> bool {
        !matches!(self, Optionality::Required)
    }
}

/// Labeled element of a tuple type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleElement {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

/// Closure signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureSig {
    #[serde(default)]
    pub parameters: Vec<TypeRef>,
    pub return_type: Box<TypeRef>,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub throws: bool,
}

/// Structured payload of a composite reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Composite {
    Tuple {
        elements: Vec<TupleElement>,
    },
    Array {
        element: Box<TypeRef>,
    },
    Dictionary {
        key: Box<TypeRef>,
        value: Box<TypeRef>,
    },
    Closure(ClosureSig),
    Generic {
        name: String,
        #[serde(default)]
        arguments: Vec<TypeRef>,
    },
}

/// A reference to a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    /// Spelling without optionality marker
    pub name: String,
    #[serde(default)]
    pub optionality: Optionality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<Composite>,
    /// Assigned during lowering
    #[serde(default)]
    pub site: SiteId,
}

impl TypeRef {
    /// Plain named reference
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optionality: Optionality::Required,
            composite: None,
            site: SiteId::default(),
        }
    }

    pub fn with_composite(composite: Composite) -> Self {
        let mut ty = Self::named(String::new());
        ty.name = spell(&composite);
        ty.composite = Some(composite);
        ty
    }

    pub fn array(element: TypeRef) -> Self {
        Self::with_composite(Composite::Array {
            element: Box::new(element),
        })
    }

    pub fn dictionary(key: TypeRef, value: TypeRef) -> Self {
        Self::with_composite(Composite::Dictionary {
            key: Box::new(key),
            value: Box::new(value),
        })
    }

    pub fn tuple(elements: Vec<TupleElement>) -> Self {
        Self::with_composite(Composite::Tuple { elements })
    }

    pub fn closure(parameters: Vec<TypeRef>, return_type: TypeRef) -> Self {
        Self::with_composite(Composite::Closure(ClosureSig {
            parameters,
            return_type: Box::new(return_type),
            is_async: false,
            throws: false,
        }))
    }

    pub fn generic(name: impl Into<String>, arguments: Vec<TypeRef>) -> Self {
        Self::with_composite(Composite::Generic {
            name: name.into(),
            arguments,
        })
    }

    pub fn optional(mut self) -> Self {
        self.optionality = Optionality::Optional;
        self
    }

    pub fn implicitly_unwrapped(mut self) -> Self {
        self.optionality = Optionality::ImplicitlyUnwrapped;
        self
    }

    /// Spelling including the optionality marker
    pub fn as_source(&self) -> String {
        format!("{}{}", self.name, self.optionality.suffix())
    }

    /// `Void` and `()` denote the empty return
    pub fn is_void(&self) -> bool {
        self.name == "Void" || self.name == "()"
    }

    pub fn is_composite(&self) -> bool {
        self.composite.is_some()
    }

    /// Identifier used for the final symbol-table lookup
    pub fn lookup_identifier(&self) -> &str {
        match &self.composite {
            Some(Composite::Generic { name, .. }) => name,
            Some(Composite::Array { .. }) => "Array",
            Some(Composite::Dictionary { .. }) => "Dictionary",
            _ => &self.name,
        }
    }

    /// Identifier used when looking the written name up by scope
    pub fn base_identifier(&self) -> &str {
        match &self.composite {
            Some(Composite::Generic { name, .. }) => name,
            _ => &self.name,
        }
    }

    /// Visit this reference and every nested one, outermost first
    pub fn walk(&self, f: &mut impl FnMut(&TypeRef)) {
        f(self);
        match &self.composite {
            Some(Composite::Tuple { elements }) => {
                for element in elements {
                    element.ty.walk(f);
                }
            }
            Some(Composite::Array { element }) => element.walk(f),
            Some(Composite::Dictionary { key, value }) => {
                key.walk(f);
                value.walk(f);
            }
            Some(Composite::Closure(sig)) => {
                for param in &sig.parameters {
                    param.walk(f);
                }
                sig.return_type.walk(f);
            }
            Some(Composite::Generic { arguments, .. }) => {
                for arg in arguments {
                    arg.walk(f);
                }
            }
            None => {}
        }
    }

    /// Mutable counterpart of [`TypeRef::walk`]
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut TypeRef)) {
        f(self);
        match &mut self.composite {
            Some(Composite::Tuple { elements }) => {
                for element in elements {
                    element.ty.walk_mut(f);
                }
            }
            Some(Composite::Array { element }) => element.walk_mut(f),
            Some(Composite::Dictionary { key, value }) => {
                key.walk_mut(f);
                value.walk_mut(f);
            }
            Some(Composite::Closure(sig)) => {
                for param in &mut sig.parameters {
                    param.walk_mut(f);
                }
                sig.return_type.walk_mut(f);
            }
            Some(Composite::Generic { arguments, .. }) => {
                for arg in arguments {
                    arg.walk_mut(f);
                }
            }
            None => {}
        }
    }
}

/// Canonical source spelling of a composite payload
pub fn spell(composite: &Composite) -> String {
    match composite {
        Composite::Tuple { elements } => {
            let inner = elements
                .iter()
                .map(|e| match &e.label {
                    Some(label) => format!("{}: {}", label, e.ty.as_source()),
                    None => e.ty.as_source(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("({})", inner)
        }
        Composite::Array { element } => format!("[{}]", element.as_source()),
        Composite::Dictionary { key, value } => {
            format!("[{}: {}]", key.as_source(), value.as_source())
        }
        Composite::Closure(sig) => {
            let params = sig
                .parameters
                .iter()
                .map(|p| p.as_source())
                .collect::<Vec<_>>()
                .join(", ");
            let mut effects = String::new();
            if sig.is_async {
                effects.push_str(" async");
            }
            if sig.throws {
                effects.push_str(" throws");
            }
            format!("({}){} -> {}", params, effects, sig.return_type.as_source())
        }
        Composite::Generic { name, arguments } => {
            let args = arguments
                .iter()
                .map(|a| a.as_source())
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}<{}>", name, args)
        }
    }
}
