//! Type expressions as declared on host-runtime members

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the root "any object" type every class is assignable to
pub const ANY_TYPE: &str = "Object";

/// Primitive (unboxed) host types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `char`
    Char,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
}

impl PrimitiveType {
    /// Whether arrays of this primitive are stored as character/byte large objects
    pub fn is_char_or_byte(self) -> bool {
        matches!(self, PrimitiveType::Char | PrimitiveType::Byte)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Char => "char",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
        };
        f.write_str(name)
    }
}

/// A type expression: the declared type of a field, property or type argument
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    /// Primitive type
    Primitive(PrimitiveType),
    /// Named type, optionally with type arguments (`List<Item>`)
    Named {
        /// Fully-qualified type name
        name: String,
        /// Type arguments in declaration order
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<TypeRef>,
    },
    /// Array of a component type
    Array(Box<TypeRef>),
    /// Unsubstituted type parameter (`T`)
    Param(String),
}

impl TypeRef {
    /// Create a primitive type reference
    pub fn primitive(p: PrimitiveType) -> Self {
        TypeRef::Primitive(p)
    }

    /// Create a reference to a named type without type arguments
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Create a reference to a generic type instantiation
    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        TypeRef::Named {
            name: name.into(),
            args,
        }
    }

    /// Create an array type
    pub fn array(component: TypeRef) -> Self {
        TypeRef::Array(Box::new(component))
    }

    /// Create a type parameter reference
    pub fn param(name: impl Into<String>) -> Self {
        TypeRef::Param(name.into())
    }

    /// The root "any object" type
    pub fn any() -> Self {
        TypeRef::named(ANY_TYPE)
    }

    /// Name of a named type
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeRef::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Type arguments of a named type (empty for everything else)
    pub fn type_args(&self) -> &[TypeRef] {
        match self {
            TypeRef::Named { args, .. } => args,
            _ => &[],
        }
    }

    /// Component type of an array
    pub fn component(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Array(component) => Some(component),
            _ => None,
        }
    }

    /// Whether this is an array type
    pub fn is_array(&self) -> bool {
        matches!(self, TypeRef::Array(_))
    }

    /// Whether this is a primitive type
    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeRef::Primitive(_))
    }

    /// Whether this is an array of `char` or `byte`
    pub fn is_char_or_byte_array(&self) -> bool {
        match self {
            TypeRef::Array(component) => {
                matches!(**component, TypeRef::Primitive(p) if p.is_char_or_byte())
            }
            _ => false,
        }
    }

    /// Whether the expression mentions any type parameter
    pub fn contains_param(&self) -> bool {
        match self {
            TypeRef::Param(_) => true,
            TypeRef::Array(component) => component.contains_param(),
            TypeRef::Named { args, .. } => args.iter().any(TypeRef::contains_param),
            TypeRef::Primitive(_) => false,
        }
    }

    /// Replace type parameters using `bindings`; unbound parameters are kept
    pub fn substitute(&self, bindings: &FxHashMap<String, TypeRef>) -> TypeRef {
        match self {
            TypeRef::Param(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            TypeRef::Array(component) => TypeRef::array(component.substitute(bindings)),
            TypeRef::Named { name, args } => TypeRef::Named {
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
            TypeRef::Primitive(_) => self.clone(),
        }
    }

    /// Name used to look the "class" of this expression up: the named type, the
    /// innermost array component name, or `None` for primitives and parameters
    pub fn erasure_name(&self) -> Option<&str> {
        match self {
            TypeRef::Named { name, .. } => Some(name),
            TypeRef::Array(component) => component.erasure_name(),
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(p) => write!(f, "{}", p),
            TypeRef::Named { name, args } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeRef::Array(component) => write!(f, "{}[]", component),
            TypeRef::Param(name) => write!(f, "{}", name),
        }
    }
}
