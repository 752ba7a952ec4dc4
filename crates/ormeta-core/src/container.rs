//! Container descriptors
//!
//! Array, collection and map members carry a `ContainerDescriptor` describing
//! each role (element, key, value): the role type, how it is stored, and the
//! descriptor of the role type when that type is persistent.

use ormeta_types::{TypeKind, TypeRef};
use tracing::debug;

use crate::context::ResolutionContext;
use crate::error::{MetadataError, Result};
use crate::ids::{ClassId, MemberRef};
use crate::node::{Lifecycle, MetadataNode, NodeHeader, ParentRef};

/// One role of a container: the element of an array or collection, or the
/// key or value of a map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerRole {
    /// Role type, filled from the member type at populate
    pub ty: Option<TypeRef>,
    /// Stored inline rather than by reference
    pub embedded: Option<bool>,
    /// Stored serialized
    pub serialized: Option<bool>,
    /// Deleted together with the owner
    pub dependent: Option<bool>,
    /// Declared as possibly holding persistent objects (reference/interface roles)
    pub possibly_persistent: bool,
    /// Descriptor of the role type, when persistent
    pub class: Option<ClassId>,
    /// Reference role type (interface or `Object`) with a persistent
    /// implementation, declared or registered
    pub implemented: bool,
}

impl ContainerRole {
    /// Type name of the role (`Object` until populated)
    pub fn type_name(&self) -> String {
        self.ty
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| ormeta_types::ANY_TYPE.to_string())
    }

    /// Whether the role type resolved to a persistent descriptor
    pub fn is_persistent(&self) -> bool {
        self.class.is_some()
    }

    /// Whether the role may hold persistent objects
    pub fn may_hold_persistent(&self) -> bool {
        self.is_persistent() || self.possibly_persistent || self.implemented
    }

    /// Whether the role is stored inline
    pub fn is_embedded(&self) -> bool {
        self.embedded.unwrap_or(false)
    }

    /// Whether the role is stored serialized
    pub fn is_serialized(&self) -> bool {
        self.serialized.unwrap_or(false)
    }

    /// Whether the role is dependent
    pub fn is_dependent(&self) -> bool {
        self.dependent.unwrap_or(false)
    }

    fn populate(&mut self, ty: TypeRef, implementations: &[String], ctx: &ResolutionContext<'_>) {
        let persistent = ty.erasure_name().and_then(|name| ctx.persistent_descriptor(name));
        self.implemented = persistent.is_none()
            && ty
                .erasure_name()
                .is_some_and(|name| has_implementation(name, implementations, ctx));
        if self.embedded.is_none() {
            let inline = ctx.is_value_type(&ty)
                || ty.erasure_name().is_some_and(|name| ctx.is_embedded_only(name));
            self.embedded = Some(inline);
        }
        self.serialized.get_or_insert(false);
        self.dependent.get_or_insert(false);
        self.class = persistent;
        self.ty = Some(ty);
    }
}

/// Whether a reference type resolves to a persistent implementation, the
/// same way relation resolution picks one
fn has_implementation(name: &str, declared: &[String], ctx: &ResolutionContext<'_>) -> bool {
    let is_interface = ctx.introspector.kind_of(name) == Some(TypeKind::Interface);
    if !is_interface && name != ormeta_types::ANY_TYPE {
        return false;
    }
    declared.iter().any(|implementation| ctx.is_class_persistent(implementation))
        || (is_interface && !ctx.implementations_of(name).is_empty())
}

/// Array container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayContainer {
    /// Component role
    pub element: ContainerRole,
}

/// Collection or single-element (optional) container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionContainer {
    /// Element role
    pub element: ContainerRole,
    /// Holds at most one element
    pub single_element: bool,
}

/// Map container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapContainer {
    /// Key role
    pub key: ContainerRole,
    /// Value role
    pub value: ContainerRole,
}

/// Shape of a container member
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerKind {
    /// Array
    Array(ArrayContainer),
    /// Collection or optional
    Collection(CollectionContainer),
    /// Map
    Map(MapContainer),
}

/// Container descriptor attached to an array, collection or map member
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDescriptor {
    header: NodeHeader,
    kind: ContainerKind,
}

impl ContainerDescriptor {
    /// Array container
    pub fn array() -> Self {
        Self::with_kind(ContainerKind::Array(ArrayContainer::default()))
    }

    /// Collection container
    pub fn collection() -> Self {
        Self::with_kind(ContainerKind::Collection(CollectionContainer::default()))
    }

    /// Map container
    pub fn map() -> Self {
        Self::with_kind(ContainerKind::Map(MapContainer::default()))
    }

    fn with_kind(kind: ContainerKind) -> Self {
        Self {
            header: NodeHeader::new(),
            kind,
        }
    }

    /// Mark the element (or map value) role as possibly persistent
    pub fn element_possibly_persistent(mut self) -> Self {
        self.primary_role_mut().possibly_persistent = true;
        self
    }

    /// Mark the element (or map value) role as embedded
    pub fn element_embedded(mut self, embedded: bool) -> Self {
        self.primary_role_mut().embedded = Some(embedded);
        self
    }

    /// Mark the element (or map value) role as serialized
    pub fn element_serialized(mut self, serialized: bool) -> Self {
        self.primary_role_mut().serialized = Some(serialized);
        self
    }

    /// Mark the element (or map value) role as dependent
    pub fn element_dependent(mut self, dependent: bool) -> Self {
        self.primary_role_mut().dependent = Some(dependent);
        self
    }

    /// Mark the map key role as embedded; ignored for other shapes
    pub fn key_embedded(mut self, embedded: bool) -> Self {
        if let ContainerKind::Map(map) = &mut self.kind {
            map.key.embedded = Some(embedded);
        }
        self
    }

    /// Container shape
    pub fn kind(&self) -> &ContainerKind {
        &self.kind
    }

    /// Whether this is an array container
    pub fn is_array(&self) -> bool {
        matches!(self.kind, ContainerKind::Array(_))
    }

    /// Whether this is a map container
    pub fn is_map(&self) -> bool {
        matches!(self.kind, ContainerKind::Map(_))
    }

    /// Whether the container holds at most one element
    pub fn is_single_element(&self) -> bool {
        matches!(&self.kind, ContainerKind::Collection(c) if c.single_element)
    }

    /// Element role of arrays and collections; value role of maps
    pub fn primary_role(&self) -> &ContainerRole {
        match &self.kind {
            ContainerKind::Array(a) => &a.element,
            ContainerKind::Collection(c) => &c.element,
            ContainerKind::Map(m) => &m.value,
        }
    }

    fn primary_role_mut(&mut self) -> &mut ContainerRole {
        match &mut self.kind {
            ContainerKind::Array(a) => &mut a.element,
            ContainerKind::Collection(c) => &mut c.element,
            ContainerKind::Map(m) => &mut m.value,
        }
    }

    /// Key role of a map
    pub fn key_role(&self) -> Option<&ContainerRole> {
        match &self.kind {
            ContainerKind::Map(m) => Some(&m.key),
            _ => None,
        }
    }

    /// The role whose type is the "other side" of a relation: the element,
    /// or for maps the value when it may be persistent, else the key
    pub fn relation_role(&self) -> &ContainerRole {
        match &self.kind {
            ContainerKind::Map(m)
                if !m.value.may_hold_persistent() && m.key.may_hold_persistent() =>
            {
                &m.key
            }
            _ => self.primary_role(),
        }
    }

    /// Whether any role may hold persistent objects
    pub fn may_hold_persistent(&self) -> bool {
        match &self.kind {
            ContainerKind::Map(m) => m.key.may_hold_persistent() || m.value.may_hold_persistent(),
            _ => self.primary_role().may_hold_persistent(),
        }
    }

    /// Expected container shape for a member type, if any
    ///
    /// `char[]`/`byte[]` still count as arrays here.
    pub(crate) fn shape_for(
        ty: &TypeRef,
        ctx: &ResolutionContext<'_>,
    ) -> Option<ContainerDescriptor> {
        if ty.is_array() {
            return Some(Self::array());
        }
        match ty.name().and_then(|name| ctx.introspector.kind_of(name))? {
            TypeKind::Collection => Some(Self::collection()),
            TypeKind::Optional => {
                let mut container = Self::collection();
                if let ContainerKind::Collection(c) = &mut container.kind {
                    c.single_element = true;
                }
                Some(container)
            }
            TypeKind::Map => Some(Self::map()),
            _ => None,
        }
    }

    /// Fill role types and defaults from the member type
    pub(crate) fn populate(
        &mut self,
        ty: &TypeRef,
        owner: &str,
        member: &str,
        implementations: &[String],
        ctx: &ResolutionContext<'_>,
    ) -> Result<()> {
        if self.header.is_populated() {
            return Ok(());
        }
        let expected = Self::shape_for(ty, ctx).ok_or_else(|| {
            MetadataError::invalid_member(
                owner,
                member,
                format!(
                    "container declared but type {} is not array, collection or map shaped",
                    ty
                ),
            )
        })?;
        match (&mut self.kind, expected.kind) {
            (ContainerKind::Array(array), ContainerKind::Array(_)) => {
                let component = ty.component().cloned().unwrap_or_else(TypeRef::any);
                array.element.populate(component, implementations, ctx);
            }
            (ContainerKind::Collection(collection), ContainerKind::Collection(shape)) => {
                let element = ctx.introspector.element_type(ty).unwrap_or_else(TypeRef::any);
                collection.single_element = shape.single_element;
                collection.element.populate(element, implementations, ctx);
            }
            (ContainerKind::Map(map), ContainerKind::Map(_)) => {
                let (key, value) = ctx
                    .introspector
                    .map_types(ty)
                    .unwrap_or_else(|| (TypeRef::any(), TypeRef::any()));
                map.key.populate(key, implementations, ctx);
                map.value.populate(value, implementations, ctx);
            }
            _ => {
                return Err(MetadataError::invalid_member(
                    owner,
                    member,
                    format!("declared container shape does not match type {}", ty),
                ));
            }
        }
        debug!(
            class = owner,
            member = member,
            role = %self.primary_role().type_name(),
            persistent = self.may_hold_persistent(),
            "populated container"
        );
        self.header.advance(Lifecycle::Populated);
        Ok(())
    }

    pub(crate) fn attach(&mut self, parent: MemberRef) {
        self.header.set_parent(ParentRef::Member(parent));
    }

    pub(crate) fn initialise(&mut self) -> Result<()> {
        let description = self.describe();
        match self.header.begin_initialise(|| description)? {
            crate::node::Transition::Begin(_guard) => {
                self.header.advance(Lifecycle::Initialised);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl MetadataNode for ContainerDescriptor {
    fn header(&self) -> &NodeHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        &mut self.header
    }

    fn describe(&self) -> String {
        let shape = match &self.kind {
            ContainerKind::Array(_) => "array",
            ContainerKind::Collection(c) if c.single_element => "optional",
            ContainerKind::Collection(_) => "collection",
            ContainerKind::Map(_) => "map",
        };
        format!("{} of {}", shape, self.primary_role().type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_may_hold_persistent() {
        let mut role = ContainerRole::default();
        assert!(!role.may_hold_persistent());
        role.possibly_persistent = true;
        assert!(role.may_hold_persistent());

        let role = ContainerRole {
            class: Some(ClassId::new(3)),
            ..ContainerRole::default()
        };
        assert!(role.may_hold_persistent());
    }

    #[test]
    fn test_builder_targets_value_role_of_maps() {
        let map = ContainerDescriptor::map().element_possibly_persistent();
        assert!(map.primary_role().possibly_persistent);
        assert!(!map.key_role().unwrap().possibly_persistent);
        assert!(map.may_hold_persistent());
    }

    #[test]
    fn test_relation_role_falls_back_to_key() {
        let mut map = ContainerDescriptor::map();
        if let ContainerKind::Map(m) = &mut map.kind {
            m.key.class = Some(ClassId::new(1));
        }
        assert!(map.relation_role().is_persistent());
    }
}
