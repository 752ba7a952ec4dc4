//! Class population
//!
//! Runs on a working copy of the descriptor while the model still holds the
//! pre-populate version; `MetadataModel::populate_class` swaps the result in.

use ormeta_types::TypeKind;
use tracing::debug;

use super::{ClassDescriptor, DescriptorKind};
use crate::context::ResolutionContext;
use crate::error::{MetadataError, Result};
use crate::generics::TypeParameterResolver;
use crate::identity::IdentityScheme;
use crate::ids::{ClassId, MemberRef};
use crate::member::{synthesize_missing, MemberDescriptor, MemberOwner};
use crate::node::{Lifecycle, ParentRef};

impl ClassDescriptor {
    /// Populate this descriptor; ancestors must already be populated
    pub(crate) fn populate(&mut self, id: ClassId, ctx: &ResolutionContext<'_>) -> Result<()> {
        if self.header.is_populated() {
            return Ok(());
        }
        self.merge_fragments();

        if !self.is_persistent() {
            debug!(
                class = %self.full_name,
                persistence = %self.persistence(),
                "not persistence-capable"
            );
            self.header.advance(Lifecycle::Populated);
            return Ok(());
        }

        self.check_host_type(ctx)?;
        self.resolve_superclass(ctx)?;
        self.resolve_identity(ctx)?;

        let class_name = self.full_name.clone();
        let mut members = std::mem::take(&mut self.members);
        self.defer_inherited_declarations(&mut members, ctx);
        synthesize_missing(&mut members, ctx, &class_name, self.property_access);
        TypeParameterResolver::new(*ctx).resolve(&class_name, &mut members)?;
        members.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then(a.is_override().cmp(&b.is_override()))
                .then(a.class_name.cmp(&b.class_name))
        });

        let owner = MemberOwner::class(&class_name);
        for member in members.iter_mut().filter(|m| m.primary_key == Some(true)) {
            member.populate(ctx, &owner)?;
        }
        for member in members.iter_mut() {
            member.populate(ctx, &owner)?;
        }
        for (index, member) in members.iter_mut().enumerate() {
            member.attach(ParentRef::Class(id), Some(MemberRef::new(id, index as u32)));
        }
        self.members = members;

        debug!(
            class = %self.full_name,
            members = self.members.len(),
            superclass = ?self.superclass_name,
            identity = %self.identity_scheme(),
            "populated class"
        );
        self.header.advance(Lifecycle::Populated);
        Ok(())
    }

    /// Fold supplementary fragments into the primary declaration
    fn merge_fragments(&mut self) {
        for fragment in std::mem::take(&mut self.fragments) {
            self.persistence = self.persistence.or(fragment.persistence);
            self.identity = self.identity.or(fragment.identity);
            if self.identity_descriptor.is_none() {
                self.identity_descriptor = fragment.identity_descriptor.clone();
            }
            if self.objectid_class.is_none() {
                self.objectid_class = fragment.objectid_class.clone();
            }
            if self.declared_superclass.is_none() {
                self.declared_superclass = fragment.declared_superclass.clone();
            }
            self.embedded_only |= fragment.embedded_only;
            self.property_access |= fragment.property_access;
            self.header
                .extensions_mut()
                .merge_missing(fragment.header.extensions());

            for member in fragment.members {
                let existing = self
                    .members
                    .iter_mut()
                    .find(|m| m.name == member.name && m.class_name == member.class_name);
                match existing {
                    Some(primary) => primary.merge_from(&member),
                    None => self.members.push(member),
                }
            }
            debug!(class = %self.full_name, "merged descriptor fragment");
        }
    }

    fn check_host_type(&self, ctx: &ResolutionContext<'_>) -> Result<()> {
        let kind = ctx.introspector.kind_of(&self.full_name).ok_or_else(|| {
            MetadataError::UnknownType {
                class: self.full_name.clone(),
                type_name: self.full_name.clone(),
            }
        })?;
        let matches = match self.kind {
            DescriptorKind::Class => kind == TypeKind::Class,
            DescriptorKind::Interface => kind == TypeKind::Interface,
        };
        if !matches {
            return Err(MetadataError::DescriptorMismatch {
                class: self.full_name.clone(),
                reason: format!("declared as {:?} but the host type is {:?}", self.kind, kind),
            });
        }
        Ok(())
    }

    /// Nearest persistence-capable class in the host superclass chain
    fn resolve_superclass(&mut self, ctx: &ResolutionContext<'_>) -> Result<()> {
        if self.is_interface() {
            return Ok(());
        }
        let chain = ctx.introspector.superclass_chain(&self.full_name);
        let nearest = chain
            .iter()
            .find_map(|name| ctx.persistent_descriptor(name).map(|id| (id, name.clone())));

        if let Some(declared) = &self.declared_superclass {
            let invalid = |reason: String| MetadataError::InvalidSuperclass {
                class: self.full_name.clone(),
                reason,
            };
            if !chain.iter().any(|name| name == declared) {
                return Err(invalid(format!("{} is not a superclass", declared)));
            }
            if !ctx.is_class_persistent(declared) {
                return Err(invalid(format!("{} is not persistence-capable", declared)));
            }
            if let Some((_, name)) = &nearest {
                if name != declared {
                    return Err(invalid(format!(
                        "{} is declared but the nearest persistent superclass is {}",
                        declared, name
                    )));
                }
            }
        }

        if let Some((id, name)) = nearest {
            self.superclass = Some(id);
            self.superclass_name = Some(name);
        }
        Ok(())
    }

    /// Inherit the identity scheme, or derive it from the declaration
    fn resolve_identity(&mut self, ctx: &ResolutionContext<'_>) -> Result<()> {
        if let Some(superclass) = self.superclass {
            let inherited = ctx.model.class(superclass)?.identity_scheme();
            if let Some(declared) = self.identity {
                if declared != inherited {
                    return Err(MetadataError::invalid_identity(
                        &self.full_name,
                        format!(
                            "declares {} identity but its superclass uses {}",
                            declared, inherited
                        ),
                    ));
                }
            }
            self.identity = Some(inherited);
            return Ok(());
        }
        if self.identity.is_some() {
            return Ok(());
        }
        let declares_key = self.members.iter().any(|m| m.primary_key == Some(true));
        let scheme = if declares_key {
            IdentityScheme::Application
        } else if self.embedded_only {
            IdentityScheme::None
        } else {
            ctx.config.default_identity
        };
        debug!(class = %self.full_name, identity = %scheme, "defaulted identity scheme");
        self.identity = Some(scheme);
        Ok(())
    }

    /// Declarations of members the host type only inherits become overrides
    /// of the ancestor that declares them
    fn defer_inherited_declarations(
        &self,
        members: &mut [MemberDescriptor],
        ctx: &ResolutionContext<'_>,
    ) {
        let introspector = ctx.introspector;
        for member in members.iter_mut().filter(|m| !m.is_override()) {
            let property = member.is_property();
            if introspector
                .member_shape(&self.full_name, &member.name, property)
                .is_some()
            {
                continue;
            }
            if let Some(owner) =
                introspector.declaring_type_of(&self.full_name, &member.name, property)
            {
                debug!(
                    class = %self.full_name,
                    member = %member.name,
                    owner = %owner,
                    "declaration resolved as override of inherited member"
                );
                member.class_name = Some(owner);
            }
        }
    }
}
