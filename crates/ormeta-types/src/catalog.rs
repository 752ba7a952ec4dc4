//! In-memory type catalog
//!
//! `StaticIntrospector` is the platform implementation used when type shapes
//! are known ahead of time: built programmatically or loaded from a JSON
//! document listing `TypeInfo` entries. It comes pre-seeded with the root
//! object type, common value types and the standard container types.

use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;

use crate::error::CatalogError;
use crate::info::{TypeInfo, TypeKind};
use crate::introspect::TypeIntrospector;
use crate::ty::{TypeRef, ANY_TYPE};

/// Value types known to every catalog
const BUILTIN_VALUE_TYPES: &[&str] = &[
    "String",
    "Boolean",
    "Byte",
    "Character",
    "Short",
    "Integer",
    "Long",
    "Float",
    "Double",
    "BigDecimal",
    "BigInteger",
    "Date",
    "LocalDate",
    "LocalDateTime",
    "Instant",
    "UUID",
    "Currency",
];

/// In-memory `TypeIntrospector`
#[derive(Debug, Clone)]
pub struct StaticIntrospector {
    types: FxHashMap<String, TypeInfo>,
}

impl StaticIntrospector {
    /// Create a catalog holding only the builtin types
    pub fn new() -> Self {
        let mut catalog = Self {
            types: FxHashMap::default(),
        };
        catalog.insert_builtins();
        catalog
    }

    fn insert_builtins(&mut self) {
        self.types
            .insert(ANY_TYPE.to_string(), TypeInfo::new(ANY_TYPE, TypeKind::Any));
        for name in BUILTIN_VALUE_TYPES {
            self.types.insert(name.to_string(), TypeInfo::value(*name));
        }

        let collection = TypeInfo::new("Collection", TypeKind::Collection).type_param("E", None);
        self.types.insert(collection.name.clone(), collection);
        for name in ["List", "Set", "Queue"] {
            let info = TypeInfo::new(name, TypeKind::Collection)
                .type_param("E", None)
                .implements(TypeRef::generic("Collection", vec![TypeRef::param("E")]));
            self.types.insert(name.to_string(), info);
        }
        let sorted_set = TypeInfo::new("SortedSet", TypeKind::Collection)
            .type_param("E", None)
            .implements(TypeRef::generic("Set", vec![TypeRef::param("E")]));
        self.types.insert(sorted_set.name.clone(), sorted_set);

        let optional = TypeInfo::new("Optional", TypeKind::Optional).type_param("E", None);
        self.types.insert(optional.name.clone(), optional);

        let map = TypeInfo::new("Map", TypeKind::Map)
            .type_param("K", None)
            .type_param("V", None);
        self.types.insert(map.name.clone(), map);
        let sorted_map = TypeInfo::new("SortedMap", TypeKind::Map)
            .type_param("K", None)
            .type_param("V", None)
            .implements(TypeRef::generic(
                "Map",
                vec![TypeRef::param("K"), TypeRef::param("V")],
            ));
        self.types.insert(sorted_map.name.clone(), sorted_map);
    }

    /// Add (or replace) a type, builder style
    pub fn with_type(mut self, info: TypeInfo) -> Self {
        self.register(info);
        self
    }

    /// Add (or replace) a type
    pub fn register(&mut self, info: TypeInfo) {
        self.types.insert(info.name.clone(), info);
    }

    /// Number of known types, builtins included
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the catalog is empty (never true: builtins are always present)
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Load a catalog from a JSON array of `TypeInfo` entries
    pub fn from_json_str(content: &str) -> Result<Self, CatalogError> {
        let entries: Vec<TypeInfo> = serde_json::from_str(content)?;
        let mut catalog = Self::new();
        let mut declared = FxHashSet::default();
        for entry in entries {
            if !declared.insert(entry.name.clone()) {
                return Err(CatalogError::DuplicateType(entry.name));
            }
            catalog.register(entry);
        }
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Check that every supertype reference resolves and no class is its own ancestor
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut names: Vec<&String> = self.types.keys().collect();
        names.sort();
        for name in names {
            let info = &self.types[name];
            for sup in info.superclass.iter().chain(info.interfaces.iter()) {
                let Some(sup_name) = sup.name() else {
                    continue;
                };
                if !self.types.contains_key(sup_name) {
                    return Err(CatalogError::UnknownSupertype {
                        type_name: name.clone(),
                        supertype: sup_name.to_string(),
                    });
                }
            }
            if self.superclass_chain(name).len() != self.raw_chain_len(name) {
                return Err(CatalogError::InheritanceCycle(name.clone()));
            }
        }
        Ok(())
    }

    /// Length of the superclass chain without cycle protection, capped at the catalog size
    fn raw_chain_len(&self, name: &str) -> usize {
        let mut len = 0;
        let mut current = name;
        while let Some(next) = self
            .types
            .get(current)
            .and_then(|info| info.superclass.as_ref())
            .and_then(|s| s.name())
        {
            len += 1;
            if len > self.types.len() {
                break;
            }
            current = next;
        }
        len
    }
}

impl Default for StaticIntrospector {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeIntrospector for StaticIntrospector {
    fn type_info(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_present() {
        let catalog = StaticIntrospector::new();
        assert_eq!(catalog.kind_of("String"), Some(TypeKind::Value));
        assert_eq!(catalog.kind_of("List"), Some(TypeKind::Collection));
        assert_eq!(catalog.kind_of("Optional"), Some(TypeKind::Optional));
        assert_eq!(catalog.kind_of("Map"), Some(TypeKind::Map));
        assert_eq!(catalog.kind_of(ANY_TYPE), Some(TypeKind::Any));
        assert!(catalog.is_assignable("List", "Collection"));
        assert!(catalog.is_assignable("SortedSet", "Collection"));
    }

    #[test]
    fn test_cycle_detected() {
        let catalog = StaticIntrospector::new()
            .with_type(TypeInfo::class("A").extends(TypeRef::named("B")))
            .with_type(TypeInfo::class("B").extends(TypeRef::named("A")));
        assert!(matches!(catalog.validate(), Err(CatalogError::InheritanceCycle(_))));
    }

    #[test]
    fn test_unknown_supertype() {
        let catalog =
            StaticIntrospector::new().with_type(TypeInfo::class("A").extends(TypeRef::named("Z")));
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::UnknownSupertype { .. })
        ));
    }
}
