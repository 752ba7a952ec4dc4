//! Class and interface descriptors
//!
//! A `ClassDescriptor` owns the members of one persistent type, tracks its
//! persistent superclass and identity scheme, and after initialisation holds
//! the frozen member numbering of the hierarchy.

mod initialise;
mod populate;

use serde::Serialize;
use std::fmt;

use crate::identity::{IdentityDescriptor, IdentityScheme, ObjectIdKind};
use crate::ids::{ClassId, MemberRef};
use crate::member::MemberDescriptor;
use crate::node::{MetadataNode, NodeHeader};

/// Whether a descriptor describes a class or an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DescriptorKind {
    /// Concrete or abstract class
    Class,
    /// Persistent interface; members are accessor pairs
    Interface,
}

/// How a class takes part in persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum ClassPersistence {
    /// Instances are stored; members are numbered
    #[default]
    PersistenceCapable,
    /// Accesses persistent members of other classes but is not stored
    PersistenceAware,
    /// Registered but not persistent
    NonPersistent,
}

impl fmt::Display for ClassPersistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClassPersistence::PersistenceCapable => "persistence-capable",
            ClassPersistence::PersistenceAware => "persistence-aware",
            ClassPersistence::NonPersistent => "non-persistent",
        };
        f.write_str(name)
    }
}

/// Member positions cached at initialise, as absolute numbers across the
/// whole hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PositionSets {
    /// Every managed position
    pub all: Vec<usize>,
    /// Primary-key positions
    pub primary_key: Vec<usize>,
    /// Non-primary-key positions
    pub non_primary_key: Vec<usize>,
    /// Default-fetch-group positions
    pub default_fetch_group: Vec<usize>,
    /// Positions whose type may make them a relation
    pub relation: Vec<usize>,
    /// Positions holding mutable second-class containers (collections, maps)
    pub second_class_mutable: Vec<usize>,
}

/// Descriptor of one persistent class or interface
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    header: NodeHeader,
    kind: DescriptorKind,
    name: String,
    full_name: String,
    persistence: Option<ClassPersistence>,
    identity: Option<IdentityScheme>,
    identity_descriptor: Option<IdentityDescriptor>,
    objectid_class: Option<String>,
    objectid: Option<ObjectIdKind>,
    declared_superclass: Option<String>,
    superclass: Option<ClassId>,
    superclass_name: Option<String>,
    embedded_only: bool,
    property_access: bool,
    members: Vec<MemberDescriptor>,
    fragments: Vec<ClassDescriptor>,
    managed: Vec<usize>,
    overridden: Vec<usize>,
    inherited_managed_count: usize,
    positions: PositionSets,
}

impl ClassDescriptor {
    fn new(kind: DescriptorKind, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            header: NodeHeader::new(),
            kind,
            full_name: name.clone(),
            name,
            persistence: None,
            identity: None,
            identity_descriptor: None,
            objectid_class: None,
            objectid: None,
            declared_superclass: None,
            superclass: None,
            superclass_name: None,
            embedded_only: false,
            property_access: false,
            members: Vec::new(),
            fragments: Vec::new(),
            managed: Vec::new(),
            overridden: Vec::new(),
            inherited_managed_count: 0,
            positions: PositionSets::default(),
        }
    }

    /// Declare a class
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(DescriptorKind::Class, name)
    }

    /// Declare a persistent interface
    pub fn interface(name: impl Into<String>) -> Self {
        let mut descriptor = Self::new(DescriptorKind::Interface, name);
        descriptor.property_access = true;
        descriptor
    }

    // ========================================================================
    // Declaration builders
    // ========================================================================

    /// Set the persistence modifier
    pub fn with_persistence(mut self, persistence: ClassPersistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Set the identity scheme
    pub fn identity(mut self, identity: IdentityScheme) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Declare the datastore identity settings
    pub fn identity_descriptor(mut self, descriptor: IdentityDescriptor) -> Self {
        self.identity_descriptor = Some(descriptor);
        self
    }

    /// Declare the objectid class of an application-identity class
    pub fn objectid_class(mut self, name: impl Into<String>) -> Self {
        self.objectid_class = Some(name.into());
        self
    }

    /// Declare the persistent superclass
    pub fn superclass(mut self, name: impl Into<String>) -> Self {
        self.declared_superclass = Some(name.into());
        self
    }

    /// Only ever stored embedded in other classes
    pub fn embedded_only(mut self) -> Self {
        self.embedded_only = true;
        self
    }

    /// Synthesize accessor-pair members instead of field members
    pub fn property_access(mut self) -> Self {
        self.property_access = true;
        self
    }

    /// Add a member declaration
    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
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

    /// Name as declared
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully-qualified name
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Class or interface
    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    /// Whether this describes an interface
    pub fn is_interface(&self) -> bool {
        self.kind == DescriptorKind::Interface
    }

    /// Persistence modifier
    pub fn persistence(&self) -> ClassPersistence {
        self.persistence.unwrap_or_default()
    }

    /// Whether instances are stored
    pub fn is_persistent(&self) -> bool {
        self.persistence() == ClassPersistence::PersistenceCapable
    }

    /// Identity scheme (`None` until populated and not declared)
    pub fn identity_scheme(&self) -> IdentityScheme {
        self.identity.unwrap_or(IdentityScheme::None)
    }

    /// Datastore identity settings
    pub fn datastore_identity(&self) -> Option<&IdentityDescriptor> {
        self.identity_descriptor.as_ref()
    }

    /// Declared objectid class
    pub fn declared_objectid_class(&self) -> Option<&str> {
        self.objectid_class.as_deref()
    }

    /// Resolved objectid of an application-identity class
    pub fn objectid(&self) -> Option<&ObjectIdKind> {
        self.objectid.as_ref()
    }

    /// Resolved persistent superclass
    pub fn superclass_id(&self) -> Option<ClassId> {
        self.superclass
    }

    /// Name of the resolved persistent superclass
    pub fn superclass_name(&self) -> Option<&str> {
        self.superclass_name.as_deref()
    }

    /// Only ever stored embedded
    pub fn is_embedded_only(&self) -> bool {
        self.embedded_only
    }

    /// Whether undeclared members are synthesized as accessor pairs
    pub fn uses_property_access(&self) -> bool {
        self.property_access
    }

    /// Member descriptors, sorted by name once populated
    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    pub(crate) fn declared_members(&self) -> impl Iterator<Item = &MemberDescriptor> {
        self.members.iter()
    }

    /// Number of supplementary fragments waiting to be merged
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Own member by name, preferring a non-override declaration
    pub fn find_member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.member_index(name).map(|i| &self.members[i])
    }

    /// Index of an own member, preferring a non-override declaration
    pub fn member_index(&self, name: &str) -> Option<usize> {
        let mut fallback = None;
        for (i, member) in self.members.iter().enumerate() {
            if member.name() == name {
                if !member.is_override() {
                    return Some(i);
                }
                fallback.get_or_insert(i);
            }
        }
        fallback
    }

    /// Override of `name`, if this class declares one
    pub fn override_of(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members
            .iter()
            .find(|m| m.is_override() && m.name() == name)
    }

    /// Members owned by this class, in relative-number order
    pub fn managed_members(&self) -> Vec<&MemberDescriptor> {
        self.managed.iter().map(|&i| &self.members[i]).collect()
    }

    /// Overrides of ancestor members
    pub fn overridden_members(&self) -> Vec<&MemberDescriptor> {
        self.overridden.iter().map(|&i| &self.members[i]).collect()
    }

    /// Number of members owned by this class
    pub fn managed_count(&self) -> usize {
        self.managed.len()
    }

    /// Managed members of all proper ancestors
    pub fn inherited_managed_count(&self) -> usize {
        self.inherited_managed_count
    }

    /// Managed members of the whole hierarchy up to this class
    pub fn member_count(&self) -> usize {
        self.inherited_managed_count + self.managed.len()
    }

    /// Owned member by relative number
    pub fn member_at_relative(&self, relative: usize) -> Option<&MemberDescriptor> {
        self.managed.get(relative).map(|&i| &self.members[i])
    }

    /// Relative number of an owned member
    pub fn relative_position(&self, name: &str) -> Option<usize> {
        self.managed_members()
            .iter()
            .position(|m| m.name() == name)
    }

    /// Cached position sets
    pub fn positions(&self) -> &PositionSets {
        &self.positions
    }

    /// Every managed position of the hierarchy
    pub fn all_member_positions(&self) -> &[usize] {
        &self.positions.all
    }

    /// Primary-key positions
    pub fn pk_member_positions(&self) -> &[usize] {
        &self.positions.primary_key
    }

    /// Non-primary-key positions
    pub fn non_pk_member_positions(&self) -> &[usize] {
        &self.positions.non_primary_key
    }

    /// Default-fetch-group positions
    pub fn dfg_member_positions(&self) -> &[usize] {
        &self.positions.default_fetch_group
    }

    /// Positions that may be relations
    pub fn relation_member_positions(&self) -> &[usize] {
        &self.positions.relation
    }

    /// Positions holding mutable second-class containers
    pub fn sco_mutable_member_positions(&self) -> &[usize] {
        &self.positions.second_class_mutable
    }

    /// Reference to an own member by index
    pub fn member_ref(&self, id: ClassId, name: &str) -> Option<MemberRef> {
        self.member_index(name).map(|i| MemberRef::new(id, i as u32))
    }

    // ========================================================================
    // Registration plumbing
    // ========================================================================

    pub(crate) fn set_full_name(&mut self, full_name: String) {
        self.full_name = full_name;
    }

    pub(crate) fn push_fragment(&mut self, fragment: ClassDescriptor) {
        self.fragments.push(fragment);
    }

    pub(crate) fn mark_used(&mut self) {
        self.header.advance(crate::node::Lifecycle::Used);
        for member in &mut self.members {
            member.mark_used();
        }
    }
}

impl MetadataNode for ClassDescriptor {
    fn header(&self) -> &NodeHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        &mut self.header
    }

    fn describe(&self) -> String {
        match self.kind {
            DescriptorKind::Class => format!("class {}", self.full_name),
            DescriptorKind::Interface => format!("interface {}", self.full_name),
        }
    }
}

impl PartialEq for ClassDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header
            && self.kind == other.kind
            && self.full_name == other.full_name
            && self.persistence == other.persistence
            && self.identity == other.identity
            && self.identity_descriptor == other.identity_descriptor
            && self.objectid_class == other.objectid_class
            && self.objectid == other.objectid
            && self.superclass == other.superclass
            && self.embedded_only == other.embedded_only
            && self.members == other.members
            && self.managed == other.managed
            && self.overridden == other.overridden
            && self.inherited_managed_count == other.inherited_managed_count
            && self.positions == other.positions
    }
}
