//! ormeta Type Model
//!
//! Describes the shape of host-runtime types as the metadata engine sees them:
//! - **Type expressions** (`TypeRef`): primitives, named types with type arguments,
//!   arrays and type parameters
//! - **Introspected shapes** (`TypeInfo`): fields, accessor pairs, modifiers,
//!   superclass and type parameters of one type
//! - **Introspection** (`TypeIntrospector`): the narrow interface the engine
//!   consumes, implemented once per target platform
//! - **Static catalogs** (`StaticIntrospector`): an in-memory implementation
//!   built programmatically or loaded from JSON

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod catalog;
pub mod error;
pub mod info;
pub mod introspect;
pub mod ty;

pub use catalog::StaticIntrospector;
pub use error::CatalogError;
pub use info::{FieldInfo, Modifiers, PropertyInfo, TypeInfo, TypeKind, TypeParam};
pub use introspect::{MemberShape, TypeIntrospector};
pub use ty::{PrimitiveType, TypeRef, ANY_TYPE};
