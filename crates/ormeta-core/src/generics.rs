//! Type-parameter resolution through inheritance
//!
//! A persistent ancestor may declare a member whose type mentions one of its
//! own type parameters (`A<T> { value: T }`). A subclass fixing that parameter
//! (`C extends B<Item>`, `B<X> extends A<X>`) gets an override pinning the
//! member to the concrete type, so that relation and column decisions see
//! `Item` rather than the parameter's erasure.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use ormeta_types::TypeRef;

use crate::context::ResolutionContext;
use crate::error::Result;
use crate::member::{MemberDescriptor, MemberOrigin};

/// Bindings of one ancestor's type parameters as seen from a subclass
#[derive(Debug, Clone, PartialEq)]
pub struct AncestorBindings {
    /// Ancestor type name
    pub ancestor: String,
    /// Parameter name to the argument supplied below it
    pub bindings: FxHashMap<String, TypeRef>,
}

/// Substitutes concrete types for inherited generic members
#[derive(Clone, Copy)]
pub struct TypeParameterResolver<'a> {
    ctx: ResolutionContext<'a>,
}

impl<'a> TypeParameterResolver<'a> {
    /// Create a resolver
    pub fn new(ctx: ResolutionContext<'a>) -> Self {
        Self { ctx }
    }

    /// Thread type arguments up the host superclass chain, nearest ancestor first
    pub fn ancestor_bindings(&self, class_name: &str) -> Vec<AncestorBindings> {
        let introspector = self.ctx.introspector;
        let mut result = Vec::new();
        let mut seen = FxHashSet::default();
        let mut current = class_name.to_string();
        let mut bindings: FxHashMap<String, TypeRef> = FxHashMap::default();

        while let Some(superclass) = introspector.superclass_of(&current) {
            let Some(name) = superclass.name() else {
                break;
            };
            if !seen.insert(name.to_string()) {
                break;
            }
            let args: Vec<TypeRef> = superclass
                .type_args()
                .iter()
                .map(|arg| arg.substitute(&bindings))
                .collect();
            let mut next = FxHashMap::default();
            if let Some(info) = introspector.type_info(name) {
                for (param, arg) in info.type_params.iter().zip(args) {
                    next.insert(param.name.clone(), arg);
                }
            }
            result.push(AncestorBindings {
                ancestor: name.to_string(),
                bindings: next.clone(),
            });
            bindings = next;
            current = name.to_string();
        }
        result
    }

    /// Concrete type of an ancestor member type as seen from `class_name`
    pub fn concrete_type(
        &self,
        ty: &TypeRef,
        ancestor: &AncestorBindings,
        class_name: &str,
    ) -> TypeRef {
        let bound = ty.substitute(&ancestor.bindings);
        let bounded = bound.substitute(&self.bounds_of(&ancestor.ancestor));
        self.ctx.erase_params(&bounded, class_name)
    }

    fn bounds_of(&self, type_name: &str) -> FxHashMap<String, TypeRef> {
        let mut bounds = FxHashMap::default();
        if let Some(info) = self.ctx.introspector.type_info(type_name) {
            for param in &info.type_params {
                bounds.insert(
                    param.name.clone(),
                    param.bound.clone().unwrap_or_else(TypeRef::any),
                );
            }
        }
        bounds
    }

    /// Patch or create overrides in `members` for every generic member of a
    /// persistent ancestor whose concrete type differs from its erasure
    pub fn resolve(&self, class_name: &str, members: &mut Vec<MemberDescriptor>) -> Result<()> {
        for ancestor in self.ancestor_bindings(class_name) {
            let Some(id) = self.ctx.persistent_descriptor(&ancestor.ancestor) else {
                continue;
            };
            let descriptor = self.ctx.model.class(id)?;
            for inherited in descriptor.members() {
                if inherited.is_override() || !inherited.is_managed() {
                    continue;
                }
                let Some(declared) = inherited.declared_type() else {
                    continue;
                };
                if !declared.contains_param() {
                    continue;
                }
                let concrete = self.concrete_type(declared, &ancestor, class_name);
                if inherited.resolved_type() == Some(&concrete) {
                    continue;
                }

                let existing = members
                    .iter_mut()
                    .find(|m| m.is_override() && m.name == inherited.name);
                match existing {
                    Some(user_override) => {
                        debug!(
                            class = class_name,
                            member = %inherited.name,
                            ty = %concrete,
                            "patched override type from type argument"
                        );
                        user_override.ty = Some(concrete);
                        user_override.resolved_type = None;
                    }
                    None => {
                        debug!(
                            class = class_name,
                            member = %inherited.name,
                            owner = %ancestor.ancestor,
                            ty = %concrete,
                            "synthesized override for type argument"
                        );
                        members.push(synthetic_override(inherited, &ancestor.ancestor, concrete));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Override pinning `inherited` to `concrete`, carrying its declared attributes
fn synthetic_override(
    inherited: &MemberDescriptor,
    owner: &str,
    concrete: TypeRef,
) -> MemberDescriptor {
    let mut member = MemberDescriptor::synthesized(inherited.kind, &inherited.name);
    member.origin = MemberOrigin::TypeParameter;
    member.class_name = Some(owner.to_string());
    member.ty = Some(concrete);
    member.primary_key = inherited.primary_key;
    member.embedded = inherited.embedded;
    member.serialized = inherited.serialized;
    member.persistence_modifier = inherited.persistence_modifier;
    member.value_strategy = inherited.value_strategy;
    member
}
