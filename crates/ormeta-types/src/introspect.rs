//! The type-introspection interface consumed by the metadata engine
//!
//! Platforms implement only [`TypeIntrospector::type_info`]; every other query
//! is derived from it. Member listings are returned sorted by name so that
//! nothing downstream depends on the platform's declaration order.

use rustc_hash::FxHashSet;

use crate::info::{FieldInfo, Modifiers, PropertyInfo, TypeInfo, TypeKind};
use crate::ty::{TypeRef, ANY_TYPE};

/// The introspected shape of one member: a field or an accessor pair
#[derive(Debug, Clone, Copy)]
pub enum MemberShape<'a> {
    /// Field-shaped member
    Field(&'a FieldInfo),
    /// Accessor-shaped member
    Property(&'a PropertyInfo),
}

impl<'a> MemberShape<'a> {
    /// Member name
    pub fn name(&self) -> &'a str {
        match self {
            MemberShape::Field(f) => &f.name,
            MemberShape::Property(p) => &p.name,
        }
    }

    /// Declared type
    pub fn ty(&self) -> &'a TypeRef {
        match self {
            MemberShape::Field(f) => &f.ty,
            MemberShape::Property(p) => &p.ty,
        }
    }

    /// Modifiers
    pub fn modifiers(&self) -> Modifiers {
        match self {
            MemberShape::Field(f) => f.modifiers,
            MemberShape::Property(p) => p.modifiers,
        }
    }

    /// Whether this is an accessor pair
    pub fn is_property(&self) -> bool {
        matches!(self, MemberShape::Property(_))
    }
}

/// Read-only access to the shape of host-runtime types
pub trait TypeIntrospector: Send + Sync {
    /// Describe a named type, or `None` if the runtime does not know it
    fn type_info(&self, name: &str) -> Option<&TypeInfo>;

    /// Whether the type is known
    fn is_known(&self, name: &str) -> bool {
        self.type_info(name).is_some()
    }

    /// Kind of a named type
    fn kind_of(&self, name: &str) -> Option<TypeKind> {
        self.type_info(name).map(|info| info.kind)
    }

    /// Direct superclass of a named type
    fn superclass_of(&self, name: &str) -> Option<&TypeRef> {
        self.type_info(name).and_then(|info| info.superclass.as_ref())
    }

    /// Names of all proper superclasses, nearest first
    ///
    /// Stops at the first unknown type or when a cycle would repeat a name.
    fn superclass_chain(&self, name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen = FxHashSet::default();
        seen.insert(name.to_string());
        let mut current = name.to_string();
        while let Some(next) = self.superclass_of(&current).and_then(|s| s.name()) {
            if !seen.insert(next.to_string()) {
                break;
            }
            chain.push(next.to_string());
            current = next.to_string();
        }
        chain
    }

    /// Declared fields of a type, sorted by name
    fn declared_fields(&self, name: &str) -> Vec<&FieldInfo> {
        let mut fields: Vec<&FieldInfo> = self
            .type_info(name)
            .map(|info| info.fields.iter().collect())
            .unwrap_or_default();
        fields.sort_by(|a, b| a.name.cmp(&b.name));
        fields
    }

    /// Declared accessor pairs of a type, sorted by name
    fn declared_properties(&self, name: &str) -> Vec<&PropertyInfo> {
        let mut props: Vec<&PropertyInfo> = self
            .type_info(name)
            .map(|info| info.properties.iter().collect())
            .unwrap_or_default();
        props.sort_by(|a, b| a.name.cmp(&b.name));
        props
    }

    /// Shape of a member declared directly on `type_name`
    ///
    /// `want_property` selects accessor pairs over fields.
    fn member_shape(
        &self,
        type_name: &str,
        member: &str,
        want_property: bool,
    ) -> Option<MemberShape<'_>> {
        let info = self.type_info(type_name)?;
        if want_property {
            info.find_property(member).map(MemberShape::Property)
        } else {
            info.find_field(member).map(MemberShape::Field)
        }
    }

    /// First type in `type_name`'s superclass chain (itself included) that
    /// declares `member`
    fn declaring_type_of(
        &self,
        type_name: &str,
        member: &str,
        want_property: bool,
    ) -> Option<String> {
        if self.member_shape(type_name, member, want_property).is_some() {
            return Some(type_name.to_string());
        }
        self.superclass_chain(type_name)
            .into_iter()
            .find(|ancestor| self.member_shape(ancestor, member, want_property).is_some())
    }

    /// Whether a value of type `from` can be stored in a slot of type `to`
    fn is_assignable(&self, from: &str, to: &str) -> bool {
        if from == to || to == ANY_TYPE {
            return true;
        }
        let mut pending = vec![from.to_string()];
        let mut seen = FxHashSet::default();
        while let Some(current) = pending.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let Some(info) = self.type_info(&current) else {
                continue;
            };
            for sup in info.superclass.iter().chain(info.interfaces.iter()) {
                if let Some(name) = sup.name() {
                    if name == to {
                        return true;
                    }
                    pending.push(name.to_string());
                }
            }
        }
        false
    }

    /// Element type of a collection or optional type; `Object` for raw containers
    fn element_type(&self, ty: &TypeRef) -> Option<TypeRef> {
        let name = ty.name()?;
        match self.kind_of(name)? {
            TypeKind::Collection | TypeKind::Optional => {
                Some(ty.type_args().first().cloned().unwrap_or_else(TypeRef::any))
            }
            _ => None,
        }
    }

    /// Key and value types of a map type; `Object` for raw maps
    fn map_types(&self, ty: &TypeRef) -> Option<(TypeRef, TypeRef)> {
        let name = ty.name()?;
        if self.kind_of(name)? != TypeKind::Map {
            return None;
        }
        let args = ty.type_args();
        Some((
            args.first().cloned().unwrap_or_else(TypeRef::any),
            args.get(1).cloned().unwrap_or_else(TypeRef::any),
        ))
    }
}

impl<T: TypeIntrospector + ?Sized> TypeIntrospector for &T {
    fn type_info(&self, name: &str) -> Option<&TypeInfo> {
        (**self).type_info(name)
    }
}

impl<T: TypeIntrospector + ?Sized> TypeIntrospector for std::sync::Arc<T> {
    fn type_info(&self, name: &str) -> Option<&TypeInfo> {
        (**self).type_info(name)
    }
}
