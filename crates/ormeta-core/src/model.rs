//! The metadata arena
//!
//! `MetadataModel` owns every file, package and class descriptor and hands out
//! typed ids. Populate and initialise run on a working copy of one class while
//! the arena still holds the previous version, so a transition only ever sees
//! other classes through shared references.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::debug;

use ormeta_types::TypeIntrospector;

use crate::class::ClassDescriptor;
use crate::config::MetadataConfig;
use crate::context::ResolutionContext;
use crate::error::{MetadataError, Result};
use crate::file::{qualify, FileDeclaration, FileDescriptor, PackageDescriptor};
use crate::identity::IdentityScheme;
use crate::ids::{ClassId, FileId, MemberRef, PackageId};
use crate::member::{MemberDescriptor, PersistenceModifier};
use crate::node::{ExtensionBag, Lifecycle, MetadataNode, ParentRef, Transition};

/// Name of the file that holds descriptors registered one at a time
pub const RUNTIME_FILE: &str = "<runtime>";

/// Arena of registered descriptors
#[derive(Debug, Clone, Default)]
pub struct MetadataModel {
    files: Vec<FileDescriptor>,
    packages: Vec<PackageDescriptor>,
    classes: Vec<ClassDescriptor>,
    by_name: FxHashMap<String, ClassId>,
}

impl MetadataModel {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a declared file; returns the new file id
    ///
    /// A class already registered by an earlier file becomes a supplementary
    /// fragment of that class, merged when it is populated.
    pub fn register_file(&mut self, declaration: FileDeclaration) -> Result<FileId> {
        let file_id = FileId::new(self.files.len() as u32);
        self.files
            .push(FileDescriptor::new(declaration.name, declaration.extensions));

        for package in declaration.packages {
            let package_id = self.add_package(file_id, package.name, package.extensions);
            for class in package.classes {
                self.register_class(package_id, class)?;
            }
        }
        Ok(file_id)
    }

    /// Register one class under `package`, outside any declared file
    pub fn register_descriptor(
        &mut self,
        package: &str,
        class: ClassDescriptor,
    ) -> Result<ClassId> {
        let package_id = self.runtime_package(package);
        self.register_class(package_id, class)
    }

    fn runtime_package(&mut self, package: &str) -> PackageId {
        let file_id = match self.files.iter().position(|f| f.name() == RUNTIME_FILE) {
            Some(index) => FileId::new(index as u32),
            None => {
                let id = FileId::new(self.files.len() as u32);
                self.files
                    .push(FileDescriptor::new(RUNTIME_FILE.to_string(), ExtensionBag::new()));
                id
            }
        };
        let existing = self.files[file_id.index()]
            .packages
            .iter()
            .copied()
            .find(|p| self.packages[p.index()].name() == package);
        match existing {
            Some(id) => id,
            None => self.add_package(file_id, package.to_string(), ExtensionBag::new()),
        }
    }

    fn add_package(&mut self, file: FileId, name: String, extensions: ExtensionBag) -> PackageId {
        let id = PackageId::new(self.packages.len() as u32);
        let mut package = PackageDescriptor::new(name, extensions);
        package.header_mut().set_parent(ParentRef::File(file));
        self.packages.push(package);
        self.files[file.index()].packages.push(id);
        id
    }

    fn register_class(
        &mut self,
        package: PackageId,
        mut class: ClassDescriptor,
    ) -> Result<ClassId> {
        let full_name = qualify(self.packages[package.index()].name(), class.name());
        class.set_full_name(full_name.clone());

        if let Some(&existing) = self.by_name.get(&full_name) {
            let primary = &mut self.classes[existing.index()];
            if primary.header().is_populated() {
                return Err(MetadataError::Frozen {
                    node: primary.describe(),
                    state: primary.state(),
                    operation: "merging a descriptor fragment".to_string(),
                });
            }
            debug!(class = %full_name, "registered supplementary fragment");
            primary.push_fragment(class);
            return Ok(existing);
        }

        let id = ClassId::new(self.classes.len() as u32);
        class.header_mut().set_parent(ParentRef::Package(package));
        self.classes.push(class);
        self.by_name.insert(full_name, id);
        self.packages[package.index()].classes.push(id);
        Ok(id)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Class descriptor by id
    pub fn class(&self, id: ClassId) -> Result<&ClassDescriptor> {
        self.classes
            .get(id.index())
            .ok_or_else(|| MetadataError::UnknownDescriptor(id.to_string()))
    }

    pub(crate) fn class_mut(&mut self, id: ClassId) -> Result<&mut ClassDescriptor> {
        self.classes
            .get_mut(id.index())
            .ok_or_else(|| MetadataError::UnknownDescriptor(id.to_string()))
    }

    /// Id of a class by fully-qualified name
    pub fn class_id(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// Class descriptor by fully-qualified name
    pub fn class_by_name(&self, name: &str) -> Option<&ClassDescriptor> {
        self.class_id(name).and_then(|id| self.classes.get(id.index()))
    }

    /// All classes with their ids, in registration order
    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &ClassDescriptor)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, c)| (ClassId::new(i as u32), c))
    }

    /// Number of registered classes
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// File by id
    pub fn file(&self, id: FileId) -> Option<&FileDescriptor> {
        self.files.get(id.index())
    }

    /// Package by id
    pub fn package(&self, id: PackageId) -> Option<&PackageDescriptor> {
        self.packages.get(id.index())
    }

    /// All files
    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }

    /// Member by reference
    pub fn member(&self, member: MemberRef) -> Result<&MemberDescriptor> {
        self.class(member.class)?
            .members()
            .get(member.index as usize)
            .ok_or_else(|| MetadataError::UnknownDescriptor(member.to_string()))
    }

    /// Persistent classes implementing `interface`, sorted by name
    pub fn implementations_of(
        &self,
        introspector: &dyn TypeIntrospector,
        interface: &str,
    ) -> Vec<ClassId> {
        let mut found: Vec<(&str, ClassId)> = self
            .classes()
            .filter(|(_, c)| c.is_persistent() && !c.is_interface() && c.full_name() != interface)
            .filter(|(_, c)| introspector.is_assignable(c.full_name(), interface))
            .map(|(id, c)| (c.full_name(), id))
            .collect();
        found.sort();
        found.into_iter().map(|(_, id)| id).collect()
    }

    // ========================================================================
    // Hierarchy queries
    // ========================================================================

    /// Resolved persistent ancestors of a class, nearest first
    pub fn ancestors(&self, id: ClassId) -> Vec<ClassId> {
        let mut chain = Vec::new();
        let mut current = self.classes.get(id.index()).and_then(|c| c.superclass_id());
        while let Some(ancestor) = current {
            if ancestor == id || chain.contains(&ancestor) {
                break;
            }
            chain.push(ancestor);
            current = self
                .classes
                .get(ancestor.index())
                .and_then(|c| c.superclass_id());
        }
        chain
    }

    /// Member visible on a class by name: its own declaration (or override),
    /// else the nearest ancestor's
    pub fn member_by_name(&self, id: ClassId, name: &str) -> Option<MemberRef> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|class| self.classes.get(class.index())?.member_ref(class, name))
    }

    /// Every member visible on a class, nearest declaration winning per name
    pub fn visible_members(&self, id: ClassId) -> Vec<MemberRef> {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut result = Vec::new();
        for class_id in std::iter::once(id).chain(self.ancestors(id)) {
            let Some(class) = self.classes.get(class_id.index()) else {
                continue;
            };
            for (index, member) in class.members().iter().enumerate() {
                if seen.insert(member.name()) {
                    result.push(MemberRef::new(class_id, index as u32));
                }
            }
        }
        result
    }

    /// Nearest managed (own, numbered) member named `name` at or above `start`
    pub(crate) fn managed_in_hierarchy(
        &self,
        start: ClassId,
        name: &str,
    ) -> Option<&MemberDescriptor> {
        std::iter::once(start)
            .chain(self.ancestors(start))
            .filter_map(|id| self.classes.get(id.index()))
            .flat_map(|class| class.managed_members())
            .find(|member| member.name() == name)
    }

    /// Member at an absolute position, as seen from `id`: an override in the
    /// nearest class wins over the ancestor's managed member
    pub fn member_at_absolute(&self, id: ClassId, position: usize) -> Option<MemberRef> {
        for class_id in std::iter::once(id).chain(self.ancestors(id)) {
            let class = self.classes.get(class_id.index())?;
            let found = class
                .members()
                .iter()
                .position(|m| m.absolute_number() == Some(position));
            if let Some(index) = found {
                return Some(MemberRef::new(class_id, index as u32));
            }
        }
        None
    }

    /// Absolute position of a member visible on a class
    pub fn absolute_position(&self, id: ClassId, name: &str) -> Option<usize> {
        let member = self.member_by_name(id, name)?;
        self.member(member).ok()?.absolute_number()
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Populate a class, populating its persistent superclass first
    pub fn populate_class(
        &mut self,
        id: ClassId,
        introspector: &dyn TypeIntrospector,
        config: &MetadataConfig,
    ) -> Result<()> {
        let class = self.class(id)?;
        let _guard = match class.header().begin_populate() {
            Transition::AlreadyDone => return Ok(()),
            Transition::InProgress => {
                return Err(MetadataError::CyclicInheritance {
                    class: class.full_name().to_string(),
                })
            }
            Transition::Begin(guard) => guard,
        };

        if let Some(parent) = self.persistent_parent(id, introspector, config) {
            self.populate_class(parent, introspector, config)?;
        }

        let mut working = self.class(id)?.clone();
        {
            let ctx = ResolutionContext::new(self, introspector, config);
            working.populate(id, &ctx)?;
        }
        *self.class_mut(id)? = working;
        Ok(())
    }

    /// Persistent superclass a class will resolve to at populate
    pub(crate) fn persistent_parent(
        &self,
        id: ClassId,
        introspector: &dyn TypeIntrospector,
        config: &MetadataConfig,
    ) -> Option<ClassId> {
        let class = self.classes.get(id.index())?;
        if !class.is_persistent() || class.is_interface() {
            return None;
        }
        ResolutionContext::new(self, introspector, config)
            .nearest_persistent_ancestor(class.full_name())
    }

    /// Initialise a populated class, initialising its superclass first
    pub fn initialise_class(
        &mut self,
        id: ClassId,
        introspector: &dyn TypeIntrospector,
        config: &MetadataConfig,
    ) -> Result<()> {
        let class = self.class(id)?;
        let description = class.describe();
        let _guard = match class.header().begin_initialise(|| description)? {
            Transition::AlreadyDone => return Ok(()),
            Transition::InProgress => {
                return Err(MetadataError::CyclicInheritance {
                    class: class.full_name().to_string(),
                })
            }
            Transition::Begin(guard) => guard,
        };

        if let Some(superclass) = class.superclass_id() {
            self.initialise_class(superclass, introspector, config)?;
        }

        let mut working = self.class(id)?.clone();
        {
            let ctx = ResolutionContext::new(self, introspector, config);
            working.initialise(&ctx)?;
        }
        *self.class_mut(id)? = working;
        Ok(())
    }

    /// Mark a class (and its members) as handed to a consumer
    pub(crate) fn mark_used(&mut self, id: ClassId) -> Result<()> {
        self.class_mut(id)?.mark_used();
        Ok(())
    }

    /// Advance packages and files to the least advanced state of their children
    pub(crate) fn refresh_containment_states(&mut self) {
        for index in 0..self.packages.len() {
            let least = self.packages[index]
                .classes
                .iter()
                .filter_map(|id| self.classes.get(id.index()))
                .map(|c| c.state().min(Lifecycle::Initialised))
                .min();
            if let Some(state) = least {
                self.packages[index].header_mut().advance(state);
            }
        }
        for index in 0..self.files.len() {
            let least = self.files[index]
                .packages
                .iter()
                .filter_map(|id| self.packages.get(id.index()))
                .map(|p| p.state())
                .min();
            if let Some(state) = least {
                self.files[index].header_mut().advance(state);
            }
        }
    }

    // ========================================================================
    // Summary
    // ========================================================================

    /// Serializable snapshot of every class, sorted by name
    pub fn summary(&self) -> ModelSummary {
        let mut classes: Vec<ClassSummary> = self
            .classes
            .iter()
            .map(|class| ClassSummary {
                name: class.full_name().to_string(),
                state: class.state(),
                superclass: class.superclass_name().map(str::to_string),
                identity: class.identity_scheme(),
                objectid: class.objectid().map(|o| o.type_name()),
                inherited_managed_count: class.inherited_managed_count(),
                members: class
                    .members()
                    .iter()
                    .map(|member| MemberSummary {
                        name: member.name().to_string(),
                        override_of: member.class_name().map(str::to_string),
                        ty: member.resolved_type().map(|t| t.to_string()),
                        modifier: member.persistence_modifier(),
                        primary_key: member.is_primary_key(),
                        default_fetch_group: member.is_default_fetch_group(),
                        relative: member.relative_number(),
                        absolute: member.absolute_number(),
                        access_flags: member.access_flags().bits(),
                    })
                    .collect(),
            })
            .collect();
        classes.sort_by(|a, b| a.name.cmp(&b.name));
        ModelSummary { classes }
    }
}

/// Snapshot of a resolved model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    /// Classes sorted by name
    pub classes: Vec<ClassSummary>,
}

impl ModelSummary {
    /// Pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Summary of one class
    pub fn class(&self, name: &str) -> Option<&ClassSummary> {
        self.classes.iter().find(|c| c.name == name)
    }
}

/// Snapshot of one class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSummary {
    /// Fully-qualified name
    pub name: String,
    /// Lifecycle state
    pub state: Lifecycle,
    /// Persistent superclass
    pub superclass: Option<String>,
    /// Identity scheme
    pub identity: IdentityScheme,
    /// Objectid type
    pub objectid: Option<String>,
    /// Managed members of proper ancestors
    pub inherited_managed_count: usize,
    /// Members in descriptor order
    pub members: Vec<MemberSummary>,
}

/// Snapshot of one member
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberSummary {
    /// Name
    pub name: String,
    /// Declaring ancestor of an override
    pub override_of: Option<String>,
    /// Resolved type
    pub ty: Option<String>,
    /// Persistence modifier
    pub modifier: PersistenceModifier,
    /// Part of the primary key
    pub primary_key: bool,
    /// In the default fetch group
    pub default_fetch_group: bool,
    /// Relative number
    pub relative: Option<usize>,
    /// Absolute number
    pub absolute: Option<usize>,
    /// Access-flag byte
    pub access_flags: u8,
}
