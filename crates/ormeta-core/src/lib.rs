//! ormeta Metadata Engine
//!
//! Resolves object/relational mapping metadata for host-runtime types:
//! - **Descriptors** (`ClassDescriptor`, `MemberDescriptor`): declared
//!   persistence metadata, completed with inferred defaults at populate
//! - **Numbering**: relative and absolute member numbers across persistent
//!   inheritance hierarchies, fixed at initialise
//! - **Relations** (`RelationResolver`): lazily classified relation types and
//!   counterparts between persistent members
//! - **Manager** (`MetadataManager`): thread-safe lazy loading over a
//!   `MetadataModel` arena
//!
//! Every node moves through CREATED → POPULATED → INITIALISED → USED and is
//! frozen once initialised.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod class;
pub mod config;
pub mod container;
pub mod context;
pub mod embedded;
pub mod error;
pub mod file;
pub mod generics;
pub mod identity;
pub mod ids;
pub mod loader;
pub mod manager;
pub mod member;
pub mod model;
pub mod node;
pub mod relation;

pub use class::{ClassDescriptor, ClassPersistence, DescriptorKind, PositionSets};
pub use config::{ApiProfile, CascadeDefaults, ConfigError, MetadataConfig};
pub use container::{ContainerDescriptor, ContainerKind, ContainerRole};
pub use context::ResolutionContext;
pub use embedded::EmbeddedDescriptor;
pub use error::{ErrorCategory, MetadataError, Result};
pub use file::{FileDeclaration, FileDescriptor, PackageDeclaration, PackageDescriptor};
pub use generics::TypeParameterResolver;
pub use identity::{IdentityDescriptor, IdentityScheme, ObjectIdKind, ValueStrategy};
pub use ids::{ClassId, FileId, MemberRef, PackageId};
pub use loader::MetadataLoader;
pub use manager::{MetadataListener, MetadataManager};
pub use member::{
    AccessFlags, CascadeFlags, ColumnDescriptor, ColumnType, JoinDescriptor, MemberDescriptor,
    MemberKind, MemberOrigin, PersistenceModifier,
};
pub use model::{ClassSummary, MemberSummary, MetadataModel, ModelSummary};
pub use node::{ExtensionBag, Lifecycle, MetadataNode, ParentRef};
pub use relation::{RelationKind, RelationResolver, ResolvedRelation};

pub use ormeta_types as types;
