//! Relation resolution
//!
//! Relations are resolved lazily, once per member, after the classes on both
//! sides are populated. The result is cached in the member descriptor.
//!
//! Resolution order:
//! 1. Find the other side: the container's element (or map key/value) type,
//!    else the member type. Interfaces and `Object` go through the declared
//!    implementation list, interfaces also through registered implementers.
//! 2. A declared counterpart name (`mapped_by`) is looked up on the other side.
//! 3. Otherwise every member of the other side naming this member as its
//!    counterpart is collected.
//! 4. Without counterparts the relation is unidirectional.

use serde::Serialize;
use std::fmt;
use tracing::{debug, trace, warn};

use ormeta_types::{TypeIntrospector, TypeKind, TypeRef, ANY_TYPE};

use crate::error::{MetadataError, Result};
use crate::ids::{ClassId, MemberRef};
use crate::member::{MemberDescriptor, PersistenceModifier};
use crate::model::MetadataModel;
use crate::node::{Lifecycle, MetadataNode};

/// Relation type of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    /// Not a relation
    None,
    /// Scalar to scalar, one side only
    OneToOneUni,
    /// Scalar to scalar, both sides
    OneToOneBi,
    /// Container of related objects, one side only
    OneToManyUni,
    /// Container whose elements point back with a scalar
    OneToManyBi,
    /// Scalar with a join, one side only
    ManyToOneUni,
    /// Scalar pointed back at by a container
    ManyToOneBi,
    /// Containers on both sides
    ManyToManyBi,
}

impl RelationKind {
    /// Whether both sides know about the relation
    pub fn is_bidirectional(self) -> bool {
        matches!(
            self,
            RelationKind::OneToOneBi
                | RelationKind::OneToManyBi
                | RelationKind::ManyToOneBi
                | RelationKind::ManyToManyBi
        )
    }

    /// Whether this side holds at most one related object
    pub fn is_single_valued(self) -> bool {
        matches!(
            self,
            RelationKind::OneToOneUni
                | RelationKind::OneToOneBi
                | RelationKind::ManyToOneUni
                | RelationKind::ManyToOneBi
        )
    }

    /// Whether this side holds many related objects
    pub fn is_multi_valued(self) -> bool {
        matches!(
            self,
            RelationKind::OneToManyUni | RelationKind::OneToManyBi | RelationKind::ManyToManyBi
        )
    }

    fn bidirectional(this_multi: bool, other_multi: bool) -> Self {
        match (this_multi, other_multi) {
            (true, true) => RelationKind::ManyToManyBi,
            (true, false) => RelationKind::OneToManyBi,
            (false, true) => RelationKind::ManyToOneBi,
            (false, false) => RelationKind::OneToOneBi,
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelationKind::None => "NONE",
            RelationKind::OneToOneUni => "ONE_TO_ONE_UNI",
            RelationKind::OneToOneBi => "ONE_TO_ONE_BI",
            RelationKind::OneToManyUni => "ONE_TO_MANY_UNI",
            RelationKind::OneToManyBi => "ONE_TO_MANY_BI",
            RelationKind::ManyToOneUni => "MANY_TO_ONE_UNI",
            RelationKind::ManyToOneBi => "MANY_TO_ONE_BI",
            RelationKind::ManyToManyBi => "MANY_TO_MANY_BI",
        };
        f.write_str(name)
    }
}

/// Resolved relation of one member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRelation {
    /// Relation type
    pub kind: RelationKind,
    /// Members on the other side; empty for unidirectional relations
    pub counterparts: Vec<MemberRef>,
}

impl ResolvedRelation {
    /// Not a relation
    pub fn none() -> Self {
        Self::unidirectional(RelationKind::None)
    }

    fn unidirectional(kind: RelationKind) -> Self {
        Self {
            kind,
            counterparts: Vec::new(),
        }
    }
}

/// Where the other side of a member points
enum OtherSide {
    Persistent(ClassId),
    PossiblyPersistentArray,
    Nothing,
}

/// Resolves and caches relations over a populated model
#[derive(Clone, Copy)]
pub struct RelationResolver<'a> {
    model: &'a MetadataModel,
    introspector: &'a dyn TypeIntrospector,
}

impl<'a> RelationResolver<'a> {
    /// Create a resolver
    pub fn new(model: &'a MetadataModel, introspector: &'a dyn TypeIntrospector) -> Self {
        Self {
            model,
            introspector,
        }
    }

    /// Relation type of a member
    pub fn relation_type(&self, member: MemberRef) -> Result<RelationKind> {
        Ok(self.resolve(member)?.kind)
    }

    /// Counterpart members of a bidirectional relation
    pub fn counterparts(&self, member: MemberRef) -> Result<Vec<MemberRef>> {
        Ok(self.resolve(member)?.counterparts)
    }

    /// Counterpart whose owning class is compatible with `type_name`; the
    /// first counterpart when none is more specific
    pub fn related_member_for_type(
        &self,
        member: MemberRef,
        type_name: &str,
    ) -> Result<Option<MemberRef>> {
        let counterparts = self.counterparts(member)?;
        let matching = counterparts.iter().copied().find(|candidate| {
            self.model
                .class(candidate.class)
                .is_ok_and(|owner| self.introspector.is_assignable(type_name, owner.full_name()))
        });
        Ok(matching.or_else(|| counterparts.first().copied()))
    }

    /// Type names whose descriptors must be populated before `member` can be
    /// resolved: the other side type and its implementation candidates
    pub fn other_side_candidates(&self, member: MemberRef) -> Result<Vec<String>> {
        let descriptor = self.model.member(member)?;
        let Some(target) = target_type(descriptor) else {
            return Ok(Vec::new());
        };
        let Some(name) = target.erasure_name() else {
            return Ok(Vec::new());
        };
        let mut names = vec![name.to_string()];
        names.extend(descriptor.implementation_types().iter().cloned());
        if self.introspector.kind_of(name) == Some(TypeKind::Interface) {
            names.extend(
                self.model
                    .implementations_of(self.introspector, name)
                    .into_iter()
                    .filter_map(|id| self.model.class(id).ok())
                    .map(|class| class.full_name().to_string()),
            );
        }
        names.sort_unstable();
        names.dedup();
        Ok(names)
    }

    /// Resolve (or fetch the cached) relation of a member
    pub fn resolve(&self, member: MemberRef) -> Result<ResolvedRelation> {
        let descriptor = self.model.member(member)?;
        if let Some(cached) = descriptor.cached_relation() {
            return Ok(cached.clone());
        }
        let Some(_busy) = descriptor.resolving.try_enter() else {
            trace!(member = %member, "relation resolution re-entered");
            return Ok(ResolvedRelation::none());
        };

        let resolved = self.compute(member, descriptor)?;
        debug!(
            member = %member,
            name = descriptor.name(),
            kind = %resolved.kind,
            counterparts = resolved.counterparts.len(),
            "resolved relation"
        );
        Ok(descriptor.relation.get_or_init(|| resolved).clone())
    }

    fn compute(
        &self,
        member: MemberRef,
        descriptor: &MemberDescriptor,
    ) -> Result<ResolvedRelation> {
        if descriptor.persistence_modifier() == PersistenceModifier::None
            || descriptor.is_serialized()
        {
            return Ok(ResolvedRelation::none());
        }
        let owner = self.model.class(member.class)?;
        let other = match self.other_side(owner.full_name(), descriptor)? {
            OtherSide::Persistent(other) => other,
            OtherSide::PossiblyPersistentArray => {
                return Ok(ResolvedRelation::unidirectional(RelationKind::OneToManyUni))
            }
            OtherSide::Nothing => return Ok(ResolvedRelation::none()),
        };
        let other_class = self.model.class(other)?;
        if other_class.state() < Lifecycle::Populated {
            return Err(MetadataError::NotPopulated {
                node: other_class.describe(),
                state: other_class.state(),
            });
        }

        let this_multi = descriptor.is_multi_valued();
        if let Some(counterpart_name) = descriptor.mapped_by_name() {
            let Some(counterpart) = self.model.member_by_name(other, counterpart_name) else {
                return Err(MetadataError::InvalidCounterpart {
                    class: owner.full_name().to_string(),
                    member: descriptor.name().to_string(),
                    counterpart: counterpart_name.to_string(),
                    other: other_class.full_name().to_string(),
                });
            };
            let counterpart_descriptor = self.model.member(counterpart)?;
            if !self.points_back(counterpart_descriptor, owner.full_name()) {
                warn!(
                    class = owner.full_name(),
                    member = descriptor.name(),
                    counterpart = counterpart_name,
                    "counterpart type does not match the owning class"
                );
            }
            return Ok(ResolvedRelation {
                kind: RelationKind::bidirectional(
                    this_multi,
                    counterpart_descriptor.is_multi_valued(),
                ),
                counterparts: vec![counterpart],
            });
        }

        let mut counterparts = Vec::new();
        for candidate in self.model.visible_members(other) {
            let candidate_descriptor = self.model.member(candidate)?;
            if candidate_descriptor.mapped_by_name() != Some(descriptor.name()) {
                continue;
            }
            if self.points_back(candidate_descriptor, owner.full_name()) {
                counterparts.push(candidate);
            }
        }
        if let Some(&first) = counterparts.first() {
            if counterparts.len() > 1 {
                warn!(
                    class = owner.full_name(),
                    member = descriptor.name(),
                    count = counterparts.len(),
                    "multiple counterparts name this member"
                );
            }
            let other_multi = self.model.member(first)?.is_multi_valued();
            return Ok(ResolvedRelation {
                kind: RelationKind::bidirectional(this_multi, other_multi),
                counterparts,
            });
        }

        let kind = match descriptor.container_descriptor() {
            Some(container) if container.is_single_element() => RelationKind::OneToOneUni,
            Some(_) => RelationKind::OneToManyUni,
            None if descriptor.join_descriptor().is_some() => RelationKind::ManyToOneUni,
            None => RelationKind::OneToOneUni,
        };
        Ok(ResolvedRelation::unidirectional(kind))
    }

    /// Locate the persistent other side of a member
    fn other_side(&self, owner: &str, descriptor: &MemberDescriptor) -> Result<OtherSide> {
        let container = descriptor.container_descriptor();
        let possibly_persistent_array = container
            .is_some_and(|c| c.is_array() && c.primary_role().possibly_persistent);
        let nothing = if possibly_persistent_array {
            OtherSide::PossiblyPersistentArray
        } else {
            OtherSide::Nothing
        };

        let Some(target) = target_type(descriptor) else {
            return Ok(nothing);
        };
        let Some(name) = target.erasure_name() else {
            return Ok(nothing);
        };
        if let Some(id) = self.persistent_class(name) {
            return Ok(OtherSide::Persistent(id));
        }

        let is_interface = self.introspector.kind_of(name) == Some(TypeKind::Interface);
        if !is_interface && name != ANY_TYPE {
            return Ok(nothing);
        }
        let declared = descriptor
            .implementation_types()
            .iter()
            .find_map(|implementation| self.persistent_class(implementation));
        let registered = || {
            if is_interface {
                self.model
                    .implementations_of(self.introspector, name)
                    .into_iter()
                    .next()
            } else {
                None
            }
        };
        match declared.or_else(registered) {
            Some(id) => {
                debug!(
                    class = owner,
                    member = descriptor.name(),
                    reference = name,
                    implementation = %id,
                    "resolved reference type to implementation"
                );
                Ok(OtherSide::Persistent(id))
            }
            None if is_interface && container.is_none() => {
                Err(MetadataError::UnresolvableImplementation {
                    class: owner.to_string(),
                    member: descriptor.name().to_string(),
                    type_name: name.to_string(),
                })
            }
            None => Ok(nothing),
        }
    }

    fn persistent_class(&self, name: &str) -> Option<ClassId> {
        let id = self.model.class_id(name)?;
        self.model
            .class(id)
            .ok()
            .filter(|class| class.is_persistent())
            .map(|_| id)
    }

    /// Whether a candidate counterpart's type is compatible with the owning
    /// class, in either direction
    fn points_back(&self, candidate: &MemberDescriptor, owner: &str) -> bool {
        let Some(name) = target_type(candidate).and_then(TypeRef::erasure_name) else {
            return false;
        };
        name == owner
            || self.introspector.is_assignable(owner, name)
            || self.introspector.is_assignable(name, owner)
    }
}

/// Type on the other side of a member: the relation role of a container,
/// else the member type
fn target_type(member: &MemberDescriptor) -> Option<&TypeRef> {
    match member.container_descriptor() {
        Some(container) => container.relation_role().ty.as_ref(),
        None => member.resolved_type(),
    }
}
