//! Arena identifiers
//!
//! Files, packages and classes live in arenas owned by `MetadataModel`;
//! members are owned by their class and addressed by `MemberRef`.

use serde::Serialize;
use std::fmt;

/// File descriptor identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileId(pub u32);

impl FileId {
    /// Create a new id
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Arena index
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file{}", self.0)
    }
}

/// Package descriptor identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PackageId(pub u32);

impl PackageId {
    /// Create a new id
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Arena index
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "package{}", self.0)
    }
}

/// Class (or interface) descriptor identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClassId(pub u32);

impl ClassId {
    /// Create a new id
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Arena index
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class{}", self.0)
    }
}

/// A member of a registered class: the class id plus the member's index in
/// the class's (alphabetically sorted) member list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MemberRef {
    /// Owning class
    pub class: ClassId,
    /// Index into the class's member list
    pub index: u32,
}

impl MemberRef {
    /// Create a member reference
    pub fn new(class: ClassId, index: u32) -> Self {
        Self { class, index }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.member{}", self.class, self.index)
    }
}
