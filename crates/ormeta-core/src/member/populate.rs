//! Member population: inferring every attribute the declaration left unset

use ormeta_types::{MemberShape, TypeKind, TypeRef};
use tracing::{debug, warn};

use super::{
    AccessFlags, ColumnDescriptor, ColumnType, MemberDescriptor, MemberKind, PersistenceModifier,
};
use crate::container::ContainerDescriptor;
use crate::context::ResolutionContext;
use crate::embedded::EmbeddedDescriptor;
use crate::error::{MetadataError, Result};
use crate::node::{Lifecycle, MetadataNode, Transition};

/// Extension key letting one final member default to persistent
pub const PERSIST_FINAL_EXTENSION: &str = "persist-final";

/// The type a member is being populated for
#[derive(Debug, Clone, Copy)]
pub(crate) struct MemberOwner<'a> {
    /// Fully-qualified name of the host type
    pub class_name: &'a str,
    /// Types already being embedded around this one, outermost first
    pub embedding_chain: &'a [String],
}

impl<'a> MemberOwner<'a> {
    pub(crate) fn class(class_name: &'a str) -> Self {
        Self {
            class_name,
            embedding_chain: &[],
        }
    }
}

impl MemberDescriptor {
    /// Fill every unset attribute, in dependency order
    pub(crate) fn populate(
        &mut self,
        ctx: &ResolutionContext<'_>,
        owner: &MemberOwner<'_>,
    ) -> Result<()> {
        let _guard = match self.header.begin_populate() {
            Transition::Begin(guard) => guard,
            Transition::AlreadyDone | Transition::InProgress => return Ok(()),
        };
        let class = owner.class_name;

        let (declaring_type, shape) = self.resolve_shape(ctx, class)?;
        let declared = match self.ty.take() {
            Some(ty) => ty,
            None => shape.ty().clone(),
        };
        let resolved = ctx.erase_params(&declared, &declaring_type);
        self.modifiers = shape.modifiers();
        self.ty = Some(declared);
        self.resolved_type = Some(resolved.clone());

        self.default_cascade(ctx);
        self.primary_key.get_or_insert(false);
        self.default_embedded(ctx, &resolved);
        self.default_persistence_modifier(ctx, class, &resolved)?;
        self.populate_container(ctx, class, &resolved)?;
        self.check_implementation_types(ctx, class, &resolved)?;
        self.relation_candidate =
            self.container.is_none() && is_reference_target(ctx, &resolved, self);
        self.default_fetch_group_membership(ctx, class, &resolved);
        self.apply_large_object(ctx, &resolved);
        self.serialized.get_or_insert(false);
        self.dependent.get_or_insert(false);
        self.default_not_null_column(ctx);
        self.populate_embedded_descriptor(ctx, owner, &resolved)?;
        self.access_flags = AccessFlags::compute(
            self.persistence_modifier(),
            self.modifiers.is_transient,
            self.is_primary_key(),
            self.is_default_fetch_group(),
        );

        self.header.advance(Lifecycle::Populated);
        Ok(())
    }

    /// Find the introspected shape, validating overrides against their owner
    ///
    /// Returns the type that declares the member together with its shape.
    fn resolve_shape<'c>(
        &self,
        ctx: &ResolutionContext<'c>,
        class: &str,
    ) -> Result<(String, MemberShape<'c>)> {
        let introspector = ctx.introspector;
        let want_property = self.is_property();
        let lookup_type = match &self.class_name {
            None => class.to_string(),
            Some(owner) => {
                if !introspector.superclass_chain(class).iter().any(|a| a == owner) {
                    return Err(MetadataError::invalid_override(
                        class,
                        &self.name,
                        format!("{} is not a superclass of {}", owner, class),
                    ));
                }
                introspector
                    .declaring_type_of(owner, &self.name, want_property)
                    .ok_or_else(|| {
                        MetadataError::invalid_override(
                            class,
                            &self.name,
                            format!("{} neither declares nor inherits {}", owner, self.name),
                        )
                    })?
            }
        };

        let shape = introspector
            .member_shape(&lookup_type, &self.name, want_property)
            .ok_or_else(|| {
                let what = if want_property { "accessor pair" } else { "field" };
                MetadataError::missing_member(
                    class,
                    &self.name,
                    format!("no {} on {}", what, lookup_type),
                )
            })?;
        if let MemberShape::Property(property) = shape {
            if !property.is_complete() {
                let missing = if property.getter.is_none() { "getter" } else { "setter" };
                return Err(MetadataError::missing_member(
                    class,
                    &self.name,
                    format!("accessor pair has no {}", missing),
                ));
            }
        }
        Ok((lookup_type, shape))
    }

    fn default_cascade(&mut self, ctx: &ResolutionContext<'_>) {
        let defaults = ctx.config.cascade_defaults();
        let cascade = &mut self.cascade;
        cascade.persist.get_or_insert(defaults.persist);
        cascade.update.get_or_insert(defaults.update);
        cascade.delete.get_or_insert(defaults.delete);
        cascade.attach.get_or_insert(defaults.attach);
        cascade.detach.get_or_insert(defaults.detach);
        cascade.refresh.get_or_insert(defaults.refresh);
    }

    fn default_embedded(&mut self, ctx: &ResolutionContext<'_>, ty: &TypeRef) {
        if self.embedded.is_some() {
            return;
        }
        let target = ty.component().unwrap_or(ty);
        let inline = ctx.is_value_type(target)
            || target.name().is_some_and(|name| ctx.is_embedded_only(name));
        self.embedded = Some(inline);
    }

    fn default_persistence_modifier(
        &mut self,
        ctx: &ResolutionContext<'_>,
        class: &str,
        ty: &TypeRef,
    ) -> Result<()> {
        let modifiers = self.modifiers;
        let persist_final = ctx.config.persist_final
            || self.extensions().get_bool(PERSIST_FINAL_EXTENSION) == Some(true);
        let final_blocks = modifiers.is_final && !persist_final;

        match self.persistence_modifier {
            Some(PersistenceModifier::Persistent) if modifiers.is_static => {
                return Err(MetadataError::invalid_member(
                    class,
                    &self.name,
                    "static member cannot be persistent",
                ));
            }
            Some(PersistenceModifier::Persistent) if final_blocks => {
                return Err(MetadataError::invalid_member(
                    class,
                    &self.name,
                    "final member cannot be persistent",
                ));
            }
            Some(PersistenceModifier::Transactional) if modifiers.is_static => {
                return Err(MetadataError::invalid_member(
                    class,
                    &self.name,
                    "static member cannot be transactional",
                ));
            }
            Some(_) => {}
            None => {
                let implied_none = modifiers.is_static
                    || final_blocks
                    || (modifiers.is_transient && !ctx.config.persist_transient);
                let modifier = if implied_none {
                    PersistenceModifier::None
                } else if ctx.is_persistable(ty)
                    || !self.implementation_types.is_empty()
                    || self.declares_possibly_persistent_elements()
                {
                    PersistenceModifier::Persistent
                } else {
                    PersistenceModifier::None
                };
                debug!(
                    class = class,
                    member = %self.name,
                    ty = %ty,
                    modifier = %modifier,
                    "defaulted persistence modifier"
                );
                self.persistence_modifier = Some(modifier);
            }
        }

        if self.is_primary_key() && !self.is_persistent() {
            return Err(MetadataError::invalid_member(
                class,
                &self.name,
                format!("primary-key member is {}", self.persistence_modifier()),
            ));
        }
        Ok(())
    }

    /// Element roles of a declared container marked as possibly persistent
    fn declares_possibly_persistent_elements(&self) -> bool {
        self.container
            .as_ref()
            .is_some_and(|container| container.primary_role().possibly_persistent)
    }

    /// Every declared implementation must be a persistent class assignable to
    /// the member's reference type
    fn check_implementation_types(
        &self,
        ctx: &ResolutionContext<'_>,
        class: &str,
        ty: &TypeRef,
    ) -> Result<()> {
        if self.implementation_types.is_empty() || !self.is_managed() {
            return Ok(());
        }
        let target = match &self.container {
            Some(container) => container.relation_role().ty.as_ref(),
            None => Some(ty),
        };
        let reference = target.and_then(TypeRef::erasure_name);
        for implementation in &self.implementation_types {
            let known = ctx.introspector.type_info(implementation).is_some();
            let assignable = reference
                .map_or(true, |to| ctx.introspector.is_assignable(implementation, to));
            if !known || !assignable || !ctx.is_class_persistent(implementation) {
                return Err(MetadataError::UnresolvableImplementation {
                    class: class.to_string(),
                    member: self.name.clone(),
                    type_name: implementation.clone(),
                });
            }
        }
        Ok(())
    }

    fn populate_container(
        &mut self,
        ctx: &ResolutionContext<'_>,
        class: &str,
        ty: &TypeRef,
    ) -> Result<()> {
        if self.container.is_none() && self.is_managed() {
            self.container = ContainerDescriptor::shape_for(ty, ctx);
        }
        if let Some(container) = &mut self.container {
            container.populate(ty, class, &self.name, &self.implementation_types, ctx)?;
        }
        Ok(())
    }

    fn default_fetch_group_membership(
        &mut self,
        ctx: &ResolutionContext<'_>,
        class: &str,
        ty: &TypeRef,
    ) {
        if self.default_fetch_group.is_some() {
            return;
        }
        let dfg = self.is_persistent()
            && !self.large_object
            && (self.is_primary_key() || ctx.is_value_or_value_array(ty));
        debug!(class = class, member = %self.name, dfg = dfg, "defaulted fetch group");
        self.default_fetch_group = Some(dfg);
    }

    fn apply_large_object(&mut self, ctx: &ResolutionContext<'_>, ty: &TypeRef) {
        if !self.large_object {
            return;
        }
        let character_data = ty.is_char_or_byte_array() || ty.name() == Some("String");
        if character_data {
            match self.columns.first_mut() {
                Some(column) => {
                    column.column_type.get_or_insert(ColumnType::LargeCharacter);
                }
                None => self
                    .columns
                    .push(ColumnDescriptor::new().with_type(ColumnType::LargeCharacter)),
            }
        } else if ctx.config.lob_serialize && self.serialized.is_none() {
            self.serialized = Some(true);
        }
    }

    fn default_not_null_column(&mut self, ctx: &ResolutionContext<'_>) {
        if !ctx.config.default_nullable && self.is_persistent() && self.columns.is_empty() {
            self.columns.push(ColumnDescriptor::new().allows_null(false));
        }
    }

    fn populate_embedded_descriptor(
        &mut self,
        ctx: &ResolutionContext<'_>,
        owner: &MemberOwner<'_>,
        ty: &TypeRef,
    ) -> Result<()> {
        if !self.is_embedded()
            || !self.is_persistent()
            || self.container.is_some()
            || self.embedded_descriptor.is_some()
        {
            return Ok(());
        }
        let Some(type_name) = ty.name() else {
            return Ok(());
        };
        if !ctx.is_class_persistent(type_name) {
            return Ok(());
        }
        if type_name == owner.class_name || owner.embedding_chain.iter().any(|t| t == type_name) {
            warn!(
                class = owner.class_name,
                member = %self.name,
                embedded_type = type_name,
                "skipping recursive embedding"
            );
            return Ok(());
        }

        let mut chain = owner.embedding_chain.to_vec();
        chain.push(owner.class_name.to_string());
        let mut descriptor = EmbeddedDescriptor::new(type_name);
        descriptor.populate(ctx, &chain)?;
        self.embedded_descriptor = Some(Box::new(descriptor));
        Ok(())
    }
}

/// Append synthesized descriptors for introspected members of `type_name`
/// that have no non-override declaration; returns how many were added
///
/// Introspected members are visited in name order so the result does not
/// depend on the platform's declaration order.
pub(crate) fn synthesize_missing(
    members: &mut Vec<MemberDescriptor>,
    ctx: &ResolutionContext<'_>,
    type_name: &str,
    use_properties: bool,
) -> usize {
    let declared = |name: &str, members: &[MemberDescriptor]| {
        members.iter().any(|m| !m.is_override() && m.name == name)
    };
    let mut added = 0;
    if use_properties {
        for property in ctx.introspector.declared_properties(type_name) {
            if !declared(&property.name, &members[..]) {
                members.push(MemberDescriptor::synthesized(MemberKind::Property, &property.name));
                added += 1;
            }
        }
    } else {
        for field in ctx.introspector.declared_fields(type_name) {
            if !declared(&field.name, &members[..]) {
                members.push(MemberDescriptor::synthesized(MemberKind::Field, &field.name));
                added += 1;
            }
        }
    }
    if added > 0 {
        debug!(class = type_name, count = added, "synthesized undeclared members");
    }
    added
}

/// Whether a scalar type points at something a relation could target
fn is_reference_target(
    ctx: &ResolutionContext<'_>,
    ty: &TypeRef,
    member: &MemberDescriptor,
) -> bool {
    let Some(name) = ty.name() else {
        return false;
    };
    if ctx.is_class_persistent(name) {
        return true;
    }
    match ctx.introspector.kind_of(name) {
        Some(TypeKind::Interface) => true,
        Some(TypeKind::Any) => !member.implementation_types.is_empty(),
        _ => false,
    }
}
