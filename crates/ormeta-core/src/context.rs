//! Read-only view handed to populate/initialise steps
//!
//! Bundles the model as it stood before the current transition, the type
//! introspector and the configuration, plus the type-classification queries
//! that defaulting rules share.

use rustc_hash::FxHashMap;

use ormeta_types::{TypeIntrospector, TypeKind, TypeRef};

use crate::class::{ClassDescriptor, ClassPersistence};
use crate::config::MetadataConfig;
use crate::ids::ClassId;
use crate::model::MetadataModel;

/// Shared inputs of a populate or initialise step
#[derive(Clone, Copy)]
pub struct ResolutionContext<'a> {
    /// Model before the current transition
    pub model: &'a MetadataModel,
    /// Host type introspection
    pub introspector: &'a dyn TypeIntrospector,
    /// Engine configuration
    pub config: &'a MetadataConfig,
}

impl<'a> ResolutionContext<'a> {
    /// Create a context
    pub fn new(
        model: &'a MetadataModel,
        introspector: &'a dyn TypeIntrospector,
        config: &'a MetadataConfig,
    ) -> Self {
        Self {
            model,
            introspector,
            config,
        }
    }

    /// Registered descriptor for a type name
    pub fn descriptor_for(&self, name: &str) -> Option<(ClassId, &'a ClassDescriptor)> {
        let id = self.model.class_id(name)?;
        self.model.class(id).ok().map(|class| (id, class))
    }

    /// Id of a registered persistence-capable descriptor
    pub fn persistent_descriptor(&self, name: &str) -> Option<ClassId> {
        self.descriptor_for(name)
            .filter(|(_, class)| class.persistence() == ClassPersistence::PersistenceCapable)
            .map(|(id, _)| id)
    }

    /// Nearest persistence-capable ancestor in the host superclass chain
    pub fn nearest_persistent_ancestor(&self, name: &str) -> Option<ClassId> {
        self.introspector
            .superclass_chain(name)
            .iter()
            .find_map(|ancestor| self.persistent_descriptor(ancestor))
    }

    /// Whether a type name has a persistence-capable descriptor
    pub fn is_class_persistent(&self, name: &str) -> bool {
        self.persistent_descriptor(name).is_some()
    }

    /// Whether a type name is a persistent class only ever stored embedded
    pub fn is_embedded_only(&self, name: &str) -> bool {
        self.descriptor_for(name)
            .is_some_and(|(_, class)| class.is_embedded_only())
    }

    /// Persistent classes implementing an interface, sorted by name
    pub fn implementations_of(&self, interface: &str) -> Vec<ClassId> {
        self.model.implementations_of(self.introspector, interface)
    }

    /// Whether a type is stored inline as a value: primitives, value and enum
    /// kinds, and configured extra value types
    pub fn is_value_type(&self, ty: &TypeRef) -> bool {
        match ty {
            TypeRef::Primitive(_) => true,
            TypeRef::Named { name, .. } => {
                self.config.is_extra_value_type(name)
                    || self
                        .introspector
                        .kind_of(name)
                        .is_some_and(TypeKind::is_value_like)
            }
            _ => false,
        }
    }

    /// Whether a type is a value type, or an array whose component is one
    pub fn is_value_or_value_array(&self, ty: &TypeRef) -> bool {
        match ty.component() {
            Some(component) => self.is_value_type(component),
            None => self.is_value_type(ty),
        }
    }

    /// Whether members of this type default to persistent
    ///
    /// Arrays qualify through their component type.
    pub fn is_persistable(&self, ty: &TypeRef) -> bool {
        match ty {
            TypeRef::Primitive(_) | TypeRef::Param(_) => true,
            TypeRef::Array(component) => self.is_persistable(component),
            TypeRef::Named { name, .. } => {
                if self.is_class_persistent(name) || self.config.is_extra_value_type(name) {
                    return true;
                }
                match self.introspector.kind_of(name) {
                    Some(kind) => {
                        kind.is_value_like() || kind.is_container() || kind == TypeKind::Interface
                    }
                    None => false,
                }
            }
        }
    }

    /// Replace type parameters of `declaring_type` by their bounds (`Object`
    /// when unbounded)
    pub fn erase_params(&self, ty: &TypeRef, declaring_type: &str) -> TypeRef {
        if !ty.contains_param() {
            return ty.clone();
        }
        let mut bindings = FxHashMap::default();
        if let Some(info) = self.introspector.type_info(declaring_type) {
            for param in &info.type_params {
                let bound = param.bound.clone().unwrap_or_else(TypeRef::any);
                bindings.insert(param.name.clone(), bound);
            }
        }
        let erased = ty.substitute(&bindings);
        erase_remaining(&erased)
    }
}

/// Replace any parameter left after substitution by `Object`
fn erase_remaining(ty: &TypeRef) -> TypeRef {
    match ty {
        TypeRef::Param(_) => TypeRef::any(),
        TypeRef::Array(component) => TypeRef::array(erase_remaining(component)),
        TypeRef::Named { name, args } => {
            TypeRef::generic(name.clone(), args.iter().map(erase_remaining).collect())
        }
        TypeRef::Primitive(_) => ty.clone(),
    }
}
