//! Member descriptors
//!
//! A `MemberDescriptor` describes one field or accessor pair of a persistent
//! type. The descriptor source fills in what it declares; `populate` infers
//! every remaining attribute from the host type and the configuration.

mod flags;
mod populate;

pub use flags::AccessFlags;
pub use populate::PERSIST_FINAL_EXTENSION;
pub(crate) use populate::{synthesize_missing, MemberOwner};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;

use ormeta_types::{Modifiers, TypeRef};

use crate::container::ContainerDescriptor;
use crate::embedded::EmbeddedDescriptor;
use crate::error::Result;
use crate::identity::ValueStrategy;
use crate::ids::MemberRef;
use crate::node::{BusyFlag, Lifecycle, MetadataNode, NodeHeader, ParentRef, Transition};
use crate::relation::ResolvedRelation;

/// Whether a member is field-shaped or accessor-shaped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MemberKind {
    /// Field
    Field,
    /// Accessor pair
    Property,
}

/// How a member takes part in persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistenceModifier {
    /// Stored in the datastore
    Persistent,
    /// Managed in transactions but never stored
    Transactional,
    /// Not managed
    None,
}

impl fmt::Display for PersistenceModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PersistenceModifier::Persistent => "persistent",
            PersistenceModifier::Transactional => "transactional",
            PersistenceModifier::None => "none",
        };
        f.write_str(name)
    }
}

/// Where a member descriptor came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MemberOrigin {
    /// Supplied by the descriptor source
    Declared,
    /// Created for an introspected member with no declaration
    Synthesized,
    /// Override created to pin an inherited generic member to a concrete type
    TypeParameter,
}

/// Cascade flags; `None` until defaulted from the API profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeFlags {
    /// Cascade persist
    pub persist: Option<bool>,
    /// Cascade update
    pub update: Option<bool>,
    /// Cascade delete
    pub delete: Option<bool>,
    /// Cascade attach
    pub attach: Option<bool>,
    /// Cascade detach
    pub detach: Option<bool>,
    /// Cascade refresh
    pub refresh: Option<bool>,
}

impl CascadeFlags {
    fn merge_missing(&mut self, other: &CascadeFlags) {
        self.persist = self.persist.or(other.persist);
        self.update = self.update.or(other.update);
        self.delete = self.delete.or(other.delete);
        self.attach = self.attach.or(other.attach);
        self.detach = self.detach.or(other.detach);
        self.refresh = self.refresh.or(other.refresh);
    }
}

/// Column type hint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// Character large object
    LargeCharacter,
    /// Named datastore type
    Named(String),
}

/// Column mapping of a member
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: Option<String>,
    /// Whether the column accepts null
    pub allows_null: Option<bool>,
    /// Column type hint
    pub column_type: Option<ColumnType>,
    /// Length or precision
    pub length: Option<u32>,
}

impl ColumnDescriptor {
    /// Unnamed column
    pub fn new() -> Self {
        Self::default()
    }

    /// Named column
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set nullability
    pub fn allows_null(mut self, allows_null: bool) -> Self {
        self.allows_null = Some(allows_null);
        self
    }

    /// Set the column type hint
    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = Some(column_type);
        self
    }

    /// Set the length
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }
}

/// Join indicator: the member is mapped through a join table or join column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinDescriptor {
    /// Join table
    pub table: Option<String>,
    /// Join columns
    pub columns: Vec<ColumnDescriptor>,
}

impl JoinDescriptor {
    /// Join with no table named
    pub fn new() -> Self {
        Self::default()
    }

    /// Join through a named table
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            columns: Vec::new(),
        }
    }
}

/// One persistent field or property
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    header: NodeHeader,
    pub(crate) kind: MemberKind,
    pub(crate) name: String,
    /// Declaring ancestor, set only for overrides
    pub(crate) class_name: Option<String>,
    /// Declared type; may mention type parameters
    pub(crate) ty: Option<TypeRef>,
    /// Declared type with parameters erased
    pub(crate) resolved_type: Option<TypeRef>,
    pub(crate) modifiers: Modifiers,
    pub(crate) persistence_modifier: Option<PersistenceModifier>,
    pub(crate) primary_key: Option<bool>,
    pub(crate) embedded: Option<bool>,
    pub(crate) serialized: Option<bool>,
    pub(crate) dependent: Option<bool>,
    pub(crate) default_fetch_group: Option<bool>,
    pub(crate) large_object: bool,
    pub(crate) cascade: CascadeFlags,
    pub(crate) mapped_by: Option<String>,
    pub(crate) implementation_types: Vec<String>,
    pub(crate) value_strategy: Option<ValueStrategy>,
    pub(crate) columns: Vec<ColumnDescriptor>,
    pub(crate) join: Option<JoinDescriptor>,
    pub(crate) container: Option<ContainerDescriptor>,
    pub(crate) embedded_descriptor: Option<Box<EmbeddedDescriptor>>,
    pub(crate) access_flags: AccessFlags,
    pub(crate) origin: MemberOrigin,
    /// Scalar type has a persistent or reference other side
    pub(crate) relation_candidate: bool,
    pub(crate) relative_number: Option<usize>,
    pub(crate) absolute_number: Option<usize>,
    pub(crate) self_ref: Option<MemberRef>,
    pub(crate) relation: OnceCell<ResolvedRelation>,
    pub(crate) resolving: BusyFlag,
}

impl MemberDescriptor {
    fn new(kind: MemberKind, name: impl Into<String>) -> Self {
        Self {
            header: NodeHeader::new(),
            kind,
            name: name.into(),
            class_name: None,
            ty: None,
            resolved_type: None,
            modifiers: Modifiers::default(),
            persistence_modifier: None,
            primary_key: None,
            embedded: None,
            serialized: None,
            dependent: None,
            default_fetch_group: None,
            large_object: false,
            cascade: CascadeFlags::default(),
            mapped_by: None,
            implementation_types: Vec::new(),
            value_strategy: None,
            columns: Vec::new(),
            join: None,
            container: None,
            embedded_descriptor: None,
            access_flags: AccessFlags::default(),
            origin: MemberOrigin::Declared,
            relation_candidate: false,
            relative_number: None,
            absolute_number: None,
            self_ref: None,
            relation: OnceCell::new(),
            resolving: BusyFlag::default(),
        }
    }

    /// Declare a field-shaped member
    pub fn field(name: impl Into<String>) -> Self {
        Self::new(MemberKind::Field, name)
    }

    /// Declare an accessor-shaped member
    pub fn property(name: impl Into<String>) -> Self {
        Self::new(MemberKind::Property, name)
    }

    pub(crate) fn synthesized(kind: MemberKind, name: &str) -> Self {
        let mut member = Self::new(kind, name);
        member.origin = MemberOrigin::Synthesized;
        member
    }

    // ========================================================================
    // Declaration builders
    // ========================================================================

    /// Declare this member as an override of one inherited from `owner`
    pub fn override_of(mut self, owner: impl Into<String>) -> Self {
        self.class_name = Some(owner.into());
        self
    }

    /// Declare the member type explicitly
    pub fn with_type(mut self, ty: TypeRef) -> Self {
        self.ty = Some(ty);
        self
    }

    /// Set the persistence modifier
    pub fn with_persistence_modifier(mut self, modifier: PersistenceModifier) -> Self {
        self.persistence_modifier = Some(modifier);
        self
    }

    /// Shorthand for `PersistenceModifier::Persistent`
    pub fn persistent(self) -> Self {
        self.with_persistence_modifier(PersistenceModifier::Persistent)
    }

    /// Shorthand for `PersistenceModifier::Transactional`
    pub fn transactional(self) -> Self {
        self.with_persistence_modifier(PersistenceModifier::Transactional)
    }

    /// Shorthand for `PersistenceModifier::None`
    pub fn not_persistent(self) -> Self {
        self.with_persistence_modifier(PersistenceModifier::None)
    }

    /// Mark as part of the primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = Some(true);
        self
    }

    /// Set the embedded flag
    pub fn embedded(mut self, embedded: bool) -> Self {
        self.embedded = Some(embedded);
        self
    }

    /// Set the serialized flag
    pub fn serialized(mut self, serialized: bool) -> Self {
        self.serialized = Some(serialized);
        self
    }

    /// Set the dependent flag
    pub fn dependent(mut self, dependent: bool) -> Self {
        self.dependent = Some(dependent);
        self
    }

    /// Set default-fetch-group membership
    pub fn default_fetch_group(mut self, dfg: bool) -> Self {
        self.default_fetch_group = Some(dfg);
        self
    }

    /// Mark as a large object
    pub fn large_object(mut self) -> Self {
        self.large_object = true;
        self
    }

    /// Set cascade-persist
    pub fn cascade_persist(mut self, cascade: bool) -> Self {
        self.cascade.persist = Some(cascade);
        self
    }

    /// Set cascade-delete
    pub fn cascade_delete(mut self, cascade: bool) -> Self {
        self.cascade.delete = Some(cascade);
        self
    }

    /// Name the member on the other side that maps this relation
    pub fn mapped_by(mut self, counterpart: impl Into<String>) -> Self {
        self.mapped_by = Some(counterpart.into());
        self
    }

    /// Add a candidate implementation type for a reference-typed member
    pub fn implementation(mut self, type_name: impl Into<String>) -> Self {
        self.implementation_types.push(type_name.into());
        self
    }

    /// Set the value-generation strategy
    pub fn value_strategy(mut self, strategy: ValueStrategy) -> Self {
        self.value_strategy = Some(strategy);
        self
    }

    /// Add a column
    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Set the join indicator
    pub fn join(mut self, join: JoinDescriptor) -> Self {
        self.join = Some(join);
        self
    }

    /// Declare the container descriptor
    pub fn container(mut self, container: ContainerDescriptor) -> Self {
        self.container = Some(container);
        self
    }

    /// Add a vendor extension to the declaration
    pub fn extension(mut self, key: &str, value: &str) -> Self {
        self.header.extensions_mut().insert(key, value);
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Member name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field or property
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Whether the member is accessor-shaped
    pub fn is_property(&self) -> bool {
        self.kind == MemberKind::Property
    }

    /// Declaring ancestor of an override
    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    /// Whether this member overrides one declared by an ancestor
    pub fn is_override(&self) -> bool {
        self.class_name.is_some()
    }

    /// Declared type
    pub fn declared_type(&self) -> Option<&TypeRef> {
        self.ty.as_ref()
    }

    /// Type with generic parameters resolved, falling back to the declared type
    pub fn resolved_type(&self) -> Option<&TypeRef> {
        self.resolved_type.as_ref().or(self.ty.as_ref())
    }

    /// Host modifiers
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Persistence modifier (`None` until populated and not declared)
    pub fn persistence_modifier(&self) -> PersistenceModifier {
        self.persistence_modifier.unwrap_or(PersistenceModifier::None)
    }

    /// Whether the member is stored or transactional
    pub fn is_managed(&self) -> bool {
        self.persistence_modifier() != PersistenceModifier::None
    }

    /// Whether the member is stored
    pub fn is_persistent(&self) -> bool {
        self.persistence_modifier() == PersistenceModifier::Persistent
    }

    /// Part of the primary key
    pub fn is_primary_key(&self) -> bool {
        self.primary_key.unwrap_or(false)
    }

    /// Stored inline
    pub fn is_embedded(&self) -> bool {
        self.embedded.unwrap_or(false)
    }

    /// Stored serialized
    pub fn is_serialized(&self) -> bool {
        self.serialized.unwrap_or(false)
    }

    /// Deleted together with the owner
    pub fn is_dependent(&self) -> bool {
        self.dependent.unwrap_or(false)
    }

    /// Loaded with the default fetch group
    pub fn is_default_fetch_group(&self) -> bool {
        self.default_fetch_group.unwrap_or(false)
    }

    /// Declared as a large object
    pub fn is_large_object(&self) -> bool {
        self.large_object
    }

    /// Cascade flags
    pub fn cascade(&self) -> CascadeFlags {
        self.cascade
    }

    /// Name of the member on the other side that maps this relation
    pub fn mapped_by_name(&self) -> Option<&str> {
        self.mapped_by.as_deref()
    }

    /// Declared implementation types
    pub fn implementation_types(&self) -> &[String] {
        &self.implementation_types
    }

    /// Value-generation strategy
    pub fn value_strategy_kind(&self) -> Option<ValueStrategy> {
        self.value_strategy
    }

    /// Columns
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Join indicator
    pub fn join_descriptor(&self) -> Option<&JoinDescriptor> {
        self.join.as_ref()
    }

    /// Container descriptor
    pub fn container_descriptor(&self) -> Option<&ContainerDescriptor> {
        self.container.as_ref()
    }

    /// Whether the member holds more than one related object
    pub fn is_multi_valued(&self) -> bool {
        self.container
            .as_ref()
            .is_some_and(|c| !c.is_single_element())
    }

    /// Nested descriptor of an embedded persistent member
    pub fn embedded_descriptor(&self) -> Option<&EmbeddedDescriptor> {
        self.embedded_descriptor.as_deref()
    }

    /// Access-flag byte
    pub fn access_flags(&self) -> AccessFlags {
        self.access_flags
    }

    /// Where this descriptor came from
    pub fn origin(&self) -> MemberOrigin {
        self.origin
    }

    /// Number within the owning class's managed members
    pub fn relative_number(&self) -> Option<usize> {
        self.relative_number
    }

    /// Number across the whole hierarchy
    pub fn absolute_number(&self) -> Option<usize> {
        self.absolute_number
    }

    /// Address of this member in the model, once populated
    pub fn member_ref(&self) -> Option<MemberRef> {
        self.self_ref
    }

    /// Cached relation, if already resolved
    pub fn cached_relation(&self) -> Option<&ResolvedRelation> {
        self.relation.get()
    }

    /// Whether the type could make this member a relation: a persistent or
    /// reference other side, or a container that may hold persistent objects
    pub fn may_be_relation(&self) -> bool {
        if !self.is_persistent() || self.is_serialized() {
            return false;
        }
        match &self.container {
            Some(container) => container.may_hold_persistent(),
            None => self.relation_candidate,
        }
    }

    // ========================================================================
    // Lifecycle plumbing
    // ========================================================================

    pub(crate) fn attach(&mut self, parent: ParentRef, self_ref: Option<MemberRef>) {
        self.header.set_parent(parent);
        self.self_ref = self_ref;
        if let Some(reference) = self_ref {
            if let Some(container) = &mut self.container {
                container.attach(reference);
            }
            if let Some(embedded) = &mut self.embedded_descriptor {
                embedded.attach(reference);
            }
        }
    }

    /// Fill attributes the primary declaration left unset from a fragment
    pub(crate) fn merge_from(&mut self, other: &MemberDescriptor) {
        self.ty = self.ty.take().or_else(|| other.ty.clone());
        self.persistence_modifier = self.persistence_modifier.or(other.persistence_modifier);
        self.primary_key = self.primary_key.or(other.primary_key);
        self.embedded = self.embedded.or(other.embedded);
        self.serialized = self.serialized.or(other.serialized);
        self.dependent = self.dependent.or(other.dependent);
        self.default_fetch_group = self.default_fetch_group.or(other.default_fetch_group);
        self.large_object |= other.large_object;
        self.cascade.merge_missing(&other.cascade);
        if self.mapped_by.is_none() {
            self.mapped_by = other.mapped_by.clone();
        }
        if self.implementation_types.is_empty() {
            self.implementation_types = other.implementation_types.clone();
        }
        self.value_strategy = self.value_strategy.or(other.value_strategy);
        if self.columns.is_empty() {
            self.columns = other.columns.clone();
        }
        if self.join.is_none() {
            self.join = other.join.clone();
        }
        if self.container.is_none() {
            self.container = other.container.clone();
        }
        self.header.extensions_mut().merge_missing(other.header.extensions());
    }

    pub(crate) fn initialise(&mut self) -> Result<()> {
        let description = self.describe();
        let _guard = match self.header.begin_initialise(|| description)? {
            Transition::Begin(guard) => guard,
            Transition::AlreadyDone | Transition::InProgress => return Ok(()),
        };
        if let Some(container) = &mut self.container {
            container.initialise()?;
        }
        if let Some(embedded) = &mut self.embedded_descriptor {
            embedded.initialise()?;
        }
        self.header.advance(Lifecycle::Initialised);
        Ok(())
    }

    pub(crate) fn mark_used(&mut self) {
        self.header.advance(Lifecycle::Used);
    }
}

impl MetadataNode for MemberDescriptor {
    fn header(&self) -> &NodeHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        &mut self.header
    }

    fn describe(&self) -> String {
        match &self.class_name {
            Some(owner) => format!("member {} (override of {})", self.name, owner),
            None => format!("member {}", self.name),
        }
    }
}

impl PartialEq for MemberDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header
            && self.kind == other.kind
            && self.name == other.name
            && self.class_name == other.class_name
            && self.ty == other.ty
            && self.resolved_type == other.resolved_type
            && self.modifiers == other.modifiers
            && self.persistence_modifier == other.persistence_modifier
            && self.primary_key == other.primary_key
            && self.embedded == other.embedded
            && self.serialized == other.serialized
            && self.dependent == other.dependent
            && self.default_fetch_group == other.default_fetch_group
            && self.large_object == other.large_object
            && self.cascade == other.cascade
            && self.mapped_by == other.mapped_by
            && self.implementation_types == other.implementation_types
            && self.value_strategy == other.value_strategy
            && self.columns == other.columns
            && self.join == other.join
            && self.container == other.container
            && self.embedded_descriptor == other.embedded_descriptor
            && self.access_flags == other.access_flags
            && self.origin == other.origin
            && self.relation_candidate == other.relation_candidate
            && self.relative_number == other.relative_number
            && self.absolute_number == other.absolute_number
            && self.self_ref == other.self_ref
    }
}
