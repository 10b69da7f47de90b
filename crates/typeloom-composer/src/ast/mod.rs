//! Input contract shared with the front-end parser
//!
//! Declarations arrive as per-file trees; the composer lowers them into its
//! arena before any resolution happens.

mod alias;
mod decl;
mod member;
mod parse_result;
mod type_ref;

pub use alias::Alias;
pub use decl::{
    AccessLevel, AssociatedType, AssociatedValue, CompositionBody, DeclKind, Declaration, EnumBody,
    EnumCase, GenericRequirement, ProtocolBody, RequirementRelation,
};
pub use member::{Method, MethodParameter, Subscript, Variable};
pub use parse_result::ParseResult;
pub use type_ref::{spell, ClosureSig, Composite, Optionality, SiteId, TupleElement, TypeRef};
