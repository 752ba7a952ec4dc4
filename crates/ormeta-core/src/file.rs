//! File and package containment
//!
//! The descriptor source hands over `FileDeclaration`s; registering one with
//! the model turns it into arena nodes linked file → package → class.

use crate::class::ClassDescriptor;
use crate::ids::{ClassId, PackageId};
use crate::node::{ExtensionBag, MetadataNode, NodeHeader};

/// A declared descriptor file, before registration
#[derive(Debug, Clone, Default)]
pub struct FileDeclaration {
    /// Source name (path or resource)
    pub name: String,
    /// Declared packages
    pub packages: Vec<PackageDeclaration>,
    /// File-level extensions
    pub extensions: ExtensionBag,
}

impl FileDeclaration {
    /// Create an empty declaration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a package
    pub fn package(mut self, package: PackageDeclaration) -> Self {
        self.packages.push(package);
        self
    }

    /// Add a file-level extension
    pub fn extension(mut self, key: &str, value: &str) -> Self {
        self.extensions.insert(key, value);
        self
    }
}

/// A declared package, before registration
#[derive(Debug, Clone, Default)]
pub struct PackageDeclaration {
    /// Package name; empty for the default package
    pub name: String,
    /// Declared classes and interfaces
    pub classes: Vec<ClassDescriptor>,
    /// Package-level extensions
    pub extensions: ExtensionBag,
}

impl PackageDeclaration {
    /// Create an empty declaration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a class or interface
    pub fn class(mut self, class: ClassDescriptor) -> Self {
        self.classes.push(class);
        self
    }
}

/// Qualify a class name with its package unless it is already qualified
pub fn qualify(package: &str, name: &str) -> String {
    if package.is_empty() || name.contains('.') {
        name.to_string()
    } else {
        format!("{}.{}", package, name)
    }
}

/// Registered descriptor file; root of the containment tree
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    header: NodeHeader,
    name: String,
    pub(crate) packages: Vec<PackageId>,
}

impl FileDescriptor {
    pub(crate) fn new(name: String, extensions: ExtensionBag) -> Self {
        let mut header = NodeHeader::new();
        header.extensions_mut().merge_missing(&extensions);
        Self {
            header,
            name,
            packages: Vec::new(),
        }
    }

    /// Source name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Packages of this file
    pub fn packages(&self) -> &[PackageId] {
        &self.packages
    }
}

impl MetadataNode for FileDescriptor {
    fn header(&self) -> &NodeHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        &mut self.header
    }

    fn describe(&self) -> String {
        format!("file {}", self.name)
    }
}

/// Registered package
#[derive(Debug, Clone)]
pub struct PackageDescriptor {
    header: NodeHeader,
    name: String,
    pub(crate) classes: Vec<ClassId>,
}

impl PackageDescriptor {
    pub(crate) fn new(name: String, extensions: ExtensionBag) -> Self {
        let mut header = NodeHeader::new();
        header.extensions_mut().merge_missing(&extensions);
        Self {
            header,
            name,
            classes: Vec::new(),
        }
    }

    /// Package name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Classes registered under this package (primary declarations only)
    pub fn classes(&self) -> &[ClassId] {
        &self.classes
    }
}

impl MetadataNode for PackageDescriptor {
    fn header(&self) -> &NodeHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        &mut self.header
    }

    fn describe(&self) -> String {
        format!("package {}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("shop", "Order"), "shop.Order");
        assert_eq!(qualify("", "Order"), "Order");
        assert_eq!(qualify("shop", "billing.Invoice"), "billing.Invoice");
    }
}
