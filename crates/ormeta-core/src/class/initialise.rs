//! Class initialisation: numbering, override reconciliation and identity checks

use tracing::debug;

use super::{ClassDescriptor, PositionSets};
use crate::context::ResolutionContext;
use crate::error::{MetadataError, Result};
use crate::identity::{IdentityDescriptor, IdentityScheme, ObjectIdKind};
use crate::ids::ClassId;
use crate::member::{AccessFlags, MemberDescriptor};
use crate::node::{Lifecycle, MetadataNode};
use ormeta_types::TypeRef;

impl ClassDescriptor {
    /// Initialise this descriptor; the superclass must already be initialised
    pub(crate) fn initialise(&mut self, ctx: &ResolutionContext<'_>) -> Result<()> {
        if self.header.is_initialised() {
            return Ok(());
        }
        if !self.is_persistent() {
            self.header.advance(Lifecycle::Initialised);
            return Ok(());
        }

        let superclass = match self.superclass {
            Some(sup) => {
                let descriptor = ctx.model.class(sup)?;
                if !descriptor.header.is_initialised() {
                    return Err(MetadataError::NotPopulated {
                        node: descriptor.describe(),
                        state: descriptor.header.state(),
                    });
                }
                Some(descriptor)
            }
            None => None,
        };

        self.inherited_managed_count = superclass.map_or(0, |s| s.member_count());
        self.number_members();
        if let Some(sup) = self.superclass {
            self.reconcile_overrides(sup, ctx)?;
        }
        for member in &mut self.members {
            member.initialise()?;
        }

        self.positions = self.compute_positions(superclass);
        self.resolve_identity_descriptor(superclass, ctx);
        self.resolve_objectid(superclass, ctx)?;
        self.verify_numbering()?;

        debug!(
            class = %self.full_name,
            inherited = self.inherited_managed_count,
            managed = self.managed.len(),
            overridden = self.overridden.len(),
            "initialised class"
        );
        self.header.advance(Lifecycle::Initialised);
        Ok(())
    }

    /// Partition into managed and overridden members and number the managed
    /// ones in (alphabetical) member order
    fn number_members(&mut self) {
        self.managed.clear();
        self.overridden.clear();
        for (index, member) in self.members.iter().enumerate() {
            if member.is_override() {
                self.overridden.push(index);
            } else if member.is_managed() {
                self.managed.push(index);
            }
        }
        for (relative, &index) in self.managed.iter().enumerate() {
            let member = &mut self.members[index];
            member.relative_number = Some(relative);
            member.absolute_number = Some(relative + self.inherited_managed_count);
        }
    }

    /// Point each override at the ancestor member it overrides
    fn reconcile_overrides(
        &mut self,
        superclass: ClassId,
        ctx: &ResolutionContext<'_>,
    ) -> Result<()> {
        for &index in &self.overridden {
            let member = &mut self.members[index];
            let owner = member.class_name.clone().unwrap_or_default();
            let Some(inherited) = ctx.model.managed_in_hierarchy(superclass, &member.name) else {
                return Err(MetadataError::OrphanedOverride {
                    class: self.full_name.clone(),
                    member: member.name.clone(),
                    owner,
                });
            };
            member.absolute_number = inherited.absolute_number();
            let primary_key = member.is_primary_key() || inherited.is_primary_key();
            if primary_key && !member.is_primary_key() {
                debug!(
                    class = %self.full_name,
                    member = %member.name,
                    "override inherits primary-key flag"
                );
            }
            member.primary_key = Some(primary_key);
            member.access_flags = AccessFlags::compute(
                member.persistence_modifier(),
                member.modifiers.is_transient,
                primary_key,
                member.is_default_fetch_group(),
            );
        }
        Ok(())
    }

    /// Position sets over the hierarchy: the superclass's sets, adjusted by
    /// this class's overrides, plus the positions it manages itself
    fn compute_positions(&self, superclass: Option<&ClassDescriptor>) -> PositionSets {
        let mut sets = superclass.map(|s| s.positions.clone()).unwrap_or_default();
        for &index in &self.overridden {
            let member = &self.members[index];
            if let Some(position) = member.absolute_number() {
                place(&mut sets, position, member);
            }
        }
        for &index in &self.managed {
            let member = &self.members[index];
            if let Some(position) = member.absolute_number() {
                sets.all.push(position);
                place(&mut sets, position, member);
            }
        }
        for set in [
            &mut sets.all,
            &mut sets.primary_key,
            &mut sets.non_primary_key,
            &mut sets.default_fetch_group,
            &mut sets.relation,
            &mut sets.second_class_mutable,
        ] {
            set.sort_unstable();
            set.dedup();
        }
        sets
    }

    /// Synthesize a datastore identity descriptor when none was declared
    fn resolve_identity_descriptor(
        &mut self,
        superclass: Option<&ClassDescriptor>,
        ctx: &ResolutionContext<'_>,
    ) {
        if self.identity_scheme() != IdentityScheme::Datastore
            || self.identity_descriptor.is_some()
        {
            return;
        }
        let descriptor = superclass
            .and_then(|s| s.identity_descriptor.clone())
            .unwrap_or_else(|| IdentityDescriptor::new(ctx.config.default_identity_strategy));
        debug!(
            class = %self.full_name,
            strategy = %descriptor.strategy,
            "synthesized datastore identity"
        );
        self.identity_descriptor = Some(descriptor);
    }

    /// Validate the objectid of an application-identity class
    fn resolve_objectid(
        &mut self,
        superclass: Option<&ClassDescriptor>,
        ctx: &ResolutionContext<'_>,
    ) -> Result<()> {
        if self.identity_scheme() != IdentityScheme::Application {
            return Ok(());
        }
        let key_positions = self.positions.primary_key.clone();
        if key_positions.is_empty() {
            return Err(MetadataError::invalid_identity(
                &self.full_name,
                "application identity requires at least one primary-key member",
            ));
        }
        let inherited = superclass.and_then(|s| s.objectid.clone());

        if let Some(declared) = &self.objectid_class {
            if !ctx.introspector.is_known(declared) {
                return Err(MetadataError::invalid_identity(
                    &self.full_name,
                    format!("objectid class {} is not a known type", declared),
                ));
            }
            if let Some(parent) = &inherited {
                if parent.type_name() != *declared {
                    return Err(MetadataError::invalid_identity(
                        &self.full_name,
                        format!(
                            "objectid class {} differs from the superclass objectid {}",
                            declared,
                            parent.type_name()
                        ),
                    ));
                }
            }
            self.objectid = Some(ObjectIdKind::Class(declared.clone()));
            return Ok(());
        }

        if let Some(parent) = inherited {
            self.objectid = Some(parent);
            return Ok(());
        }

        if key_positions.len() > 1 {
            return Err(MetadataError::invalid_identity(
                &self.full_name,
                format!(
                    "{} primary-key members require an objectid class",
                    key_positions.len()
                ),
            ));
        }
        let position = key_positions[0];
        let key = self
            .member_at_position(position, ctx)
            .ok_or_else(|| MetadataError::BrokenNumbering {
                class: self.full_name.clone(),
                reason: format!("no member at primary-key position {}", position),
            })?;
        let ty = key
            .resolved_type()
            .cloned()
            .unwrap_or_else(TypeRef::any);
        debug!(class = %self.full_name, member = %key.name, ty = %ty, "single-field identity");
        self.objectid = Some(ObjectIdKind::SingleField {
            member: key.name.clone(),
            ty,
        });
        Ok(())
    }

    /// Member at an absolute position from this (not yet swapped in) class's view
    fn member_at_position<'s>(
        &'s self,
        position: usize,
        ctx: &ResolutionContext<'s>,
    ) -> Option<&'s MemberDescriptor> {
        let own = self
            .members
            .iter()
            .find(|m| m.absolute_number() == Some(position));
        if own.is_some() {
            return own;
        }
        let superclass = self.superclass?;
        let found = ctx.model.member_at_absolute(superclass, position)?;
        ctx.model.member(found).ok()
    }

    /// Managed numbers must be contiguous after the inherited ones, and
    /// overrides must point below them
    fn verify_numbering(&self) -> Result<()> {
        let broken = |reason: String| MetadataError::BrokenNumbering {
            class: self.full_name.clone(),
            reason,
        };
        for (relative, &index) in self.managed.iter().enumerate() {
            let member = &self.members[index];
            let expected = self.inherited_managed_count + relative;
            if member.relative_number() != Some(relative)
                || member.absolute_number() != Some(expected)
            {
                return Err(broken(format!(
                    "{} numbered {:?}/{:?}, expected {}/{}",
                    member.name,
                    member.relative_number(),
                    member.absolute_number(),
                    relative,
                    expected
                )));
            }
        }
        for &index in &self.overridden {
            let member = &self.members[index];
            match member.absolute_number() {
                Some(n) if n < self.inherited_managed_count => {}
                other => {
                    return Err(broken(format!(
                        "override {} has position {:?} outside the inherited range",
                        member.name, other
                    )))
                }
            }
        }
        let expected: Vec<usize> = (0..self.member_count()).collect();
        if self.positions.all != expected {
            return Err(broken(format!(
                "positions {:?} are not 0..{}",
                self.positions.all,
                self.member_count()
            )));
        }
        Ok(())
    }
}

/// Record `position` in every set `member` belongs to, replacing whatever an
/// ancestor recorded there
fn place(sets: &mut PositionSets, position: usize, member: &MemberDescriptor) {
    for set in [
        &mut sets.primary_key,
        &mut sets.non_primary_key,
        &mut sets.default_fetch_group,
        &mut sets.relation,
        &mut sets.second_class_mutable,
    ] {
        set.retain(|&p| p != position);
    }
    if member.is_primary_key() {
        sets.primary_key.push(position);
    } else {
        sets.non_primary_key.push(position);
    }
    if member.is_default_fetch_group() {
        sets.default_fetch_group.push(position);
    }
    if member.may_be_relation() {
        sets.relation.push(position);
    }
    if member
        .container_descriptor()
        .is_some_and(|c| !c.is_array())
    {
        sets.second_class_mutable.push(position);
    }
}
