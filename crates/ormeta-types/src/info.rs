//! Introspected type shapes
//!
//! A `TypeInfo` is what the host runtime reports about one type: its kind,
//! its declared (not inherited) fields and accessor pairs, its direct
//! superclass with type arguments, and its own type parameters.

use serde::{Deserialize, Serialize};

use crate::ty::TypeRef;

/// Broad category of a named host type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Ordinary class
    Class,
    /// Interface (reference type with implementations)
    Interface,
    /// Second-class value type stored inline (strings, numbers, dates)
    Value,
    /// Enumeration
    Enum,
    /// Multi-element collection (`List<E>`, `Set<E>`)
    Collection,
    /// Single-element container (`Optional<E>`)
    Optional,
    /// Key/value map (`Map<K, V>`)
    Map,
    /// The root "any object" type
    Any,
}

impl TypeKind {
    /// Whether values of this kind are always stored inline
    pub fn is_value_like(self) -> bool {
        matches!(self, TypeKind::Value | TypeKind::Enum)
    }

    /// Whether this kind holds other values (collection, optional or map)
    pub fn is_container(self) -> bool {
        matches!(self, TypeKind::Collection | TypeKind::Optional | TypeKind::Map)
    }

    /// Whether a value of this kind is a reference that may point at several classes
    pub fn is_reference(self) -> bool {
        matches!(self, TypeKind::Interface | TypeKind::Any)
    }
}

/// Member modifiers relevant to persistence defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    /// Class-level (static) member
    #[serde(default)]
    pub is_static: bool,
    /// Immutable (final) member
    #[serde(default)]
    pub is_final: bool,
    /// Transient member (excluded from default serialization)
    #[serde(default)]
    pub is_transient: bool,
}

impl Modifiers {
    /// Whether any modifier implies "not persistent" by default
    pub fn implies_non_persistent(&self) -> bool {
        self.is_static || self.is_final || self.is_transient
    }
}

/// A field declared directly on a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: TypeRef,
    /// Modifiers
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl FieldInfo {
    /// Create a field with no modifiers
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            modifiers: Modifiers::default(),
        }
    }

    /// Mark the field static
    pub fn as_static(mut self) -> Self {
        self.modifiers.is_static = true;
        self
    }

    /// Mark the field final
    pub fn as_final(mut self) -> Self {
        self.modifiers.is_final = true;
        self
    }

    /// Mark the field transient
    pub fn as_transient(mut self) -> Self {
        self.modifiers.is_transient = true;
        self
    }
}

/// An accessor pair (getter/setter) declared directly on a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyInfo {
    /// Property name
    pub name: String,
    /// Property type
    pub ty: TypeRef,
    /// Getter method name, if declared
    #[serde(default)]
    pub getter: Option<String>,
    /// Setter method name, if declared
    #[serde(default)]
    pub setter: Option<String>,
    /// Modifiers of the accessors
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl PropertyInfo {
    /// Create a property with conventional `getX`/`setX` accessors
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        let name = name.into();
        let capitalised = capitalise(&name);
        Self {
            getter: Some(format!("get{}", capitalised)),
            setter: Some(format!("set{}", capitalised)),
            name,
            ty,
            modifiers: Modifiers::default(),
        }
    }

    /// Create a read-only property (getter, no setter)
    pub fn read_only(name: impl Into<String>, ty: TypeRef) -> Self {
        let mut prop = Self::new(name, ty);
        prop.setter = None;
        prop
    }

    /// Whether both accessors are present
    pub fn is_complete(&self) -> bool {
        self.getter.is_some() && self.setter.is_some()
    }
}

fn capitalise(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A type parameter declared by a generic type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParam {
    /// Parameter name (`T`)
    pub name: String,
    /// Declared upper bound (`T extends Bound`), if any
    #[serde(default)]
    pub bound: Option<TypeRef>,
}

/// Everything the host runtime reports about one named type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    /// Fully-qualified name
    pub name: String,
    /// Kind of type
    pub kind: TypeKind,
    /// Whether the type is abstract
    #[serde(default)]
    pub is_abstract: bool,
    /// Direct superclass with its type arguments
    #[serde(default)]
    pub superclass: Option<TypeRef>,
    /// Directly implemented (or extended, for interfaces) interfaces
    #[serde(default)]
    pub interfaces: Vec<TypeRef>,
    /// Own type parameters in declaration order
    #[serde(default)]
    pub type_params: Vec<TypeParam>,
    /// Declared fields (not inherited)
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
    /// Declared accessor pairs (not inherited)
    #[serde(default)]
    pub properties: Vec<PropertyInfo>,
}

impl TypeInfo {
    /// Create an empty type of the given kind
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            is_abstract: false,
            superclass: None,
            interfaces: Vec::new(),
            type_params: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Create an empty class
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    /// Create an empty interface
    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    /// Create a value type
    pub fn value(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Value)
    }

    /// Create an enumeration
    pub fn enumeration(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Enum)
    }

    /// Mark the type abstract
    pub fn as_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Set the direct superclass
    pub fn extends(mut self, superclass: TypeRef) -> Self {
        self.superclass = Some(superclass);
        self
    }

    /// Add an implemented interface
    pub fn implements(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Add a type parameter
    pub fn type_param(mut self, name: impl Into<String>, bound: Option<TypeRef>) -> Self {
        self.type_params.push(TypeParam {
            name: name.into(),
            bound,
        });
        self
    }

    /// Add a plain field
    pub fn field(self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.field_with(FieldInfo::new(name, ty))
    }

    /// Add a field with modifiers
    pub fn field_with(mut self, field: FieldInfo) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a property with both accessors
    pub fn property(self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.property_with(PropertyInfo::new(name, ty))
    }

    /// Add a property as given
    pub fn property_with(mut self, property: PropertyInfo) -> Self {
        self.properties.push(property);
        self
    }

    /// Look up a declared field
    pub fn find_field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a declared property
    pub fn find_property(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Look up a type parameter by name
    pub fn find_type_param(&self, name: &str) -> Option<&TypeParam> {
        self.type_params.iter().find(|p| p.name == name)
    }
}
