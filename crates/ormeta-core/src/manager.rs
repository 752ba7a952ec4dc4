//! Metadata manager
//!
//! Entry point for consumers. Owns the model behind a lock, loads classes on
//! first request and caches the resolved name lookups.
//!
//! # Example
//!
//! ```ignore
//! let manager = MetadataManager::new(Arc::new(catalog));
//! manager.register_file(declaration)?;
//! let order = manager.get_descriptor_for("shop.Order")?;
//! let kind = manager.relation_type("shop.Order", "items")?;
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockUpgradableReadGuard};
use tracing::debug;

use ormeta_types::TypeIntrospector;

use crate::class::ClassDescriptor;
use crate::config::MetadataConfig;
use crate::error::{MetadataError, Result};
use crate::file::FileDeclaration;
use crate::ids::{ClassId, FileId, MemberRef};
use crate::loader::MetadataLoader;
use crate::model::{MetadataModel, ModelSummary};
use crate::relation::{RelationKind, RelationResolver, ResolvedRelation};

/// Notified when classes finish initialising
///
/// Callbacks run while the model is read-locked; they must not call back
/// into the manager's loading operations.
pub trait MetadataListener: Send + Sync {
    /// `class` reached INITIALISED
    fn class_initialised(&self, class: &ClassDescriptor);
}

/// Thread-safe owner of a metadata model
pub struct MetadataManager {
    introspector: Arc<dyn TypeIntrospector>,
    config: MetadataConfig,
    model: RwLock<MetadataModel>,
    /// Names already handed out, resolved to their ids
    resolved: DashMap<String, ClassId>,
    listeners: RwLock<Vec<Arc<dyn MetadataListener>>>,
    /// Held while a relation is resolved; member re-entry flags only guard
    /// against recursion on one thread
    resolving: Mutex<()>,
}

impl MetadataManager {
    /// Create a manager with the default configuration
    pub fn new(introspector: Arc<dyn TypeIntrospector>) -> Self {
        Self::with_config(introspector, MetadataConfig::default())
    }

    /// Create a manager with an explicit configuration
    pub fn with_config(introspector: Arc<dyn TypeIntrospector>, config: MetadataConfig) -> Self {
        Self {
            introspector,
            config,
            model: RwLock::new(MetadataModel::new()),
            resolved: DashMap::new(),
            listeners: RwLock::new(Vec::new()),
            resolving: Mutex::new(()),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    /// Read access to the model
    pub fn model(&self) -> RwLockReadGuard<'_, MetadataModel> {
        self.model.read()
    }

    /// Register a listener for initialisation events
    pub fn add_listener(&self, listener: Arc<dyn MetadataListener>) {
        self.listeners.write().push(listener);
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a declared descriptor file
    pub fn register_file(&self, declaration: FileDeclaration) -> Result<FileId> {
        let name = declaration.name.clone();
        let id = self.model.write().register_file(declaration)?;
        debug!(file = %name, id = %id, "registered descriptor file");
        Ok(id)
    }

    /// Register one class outside any file
    pub fn register_descriptor(&self, package: &str, class: ClassDescriptor) -> Result<ClassId> {
        self.model.write().register_descriptor(package, class)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Descriptor id for a fully-qualified name, loading the class (and its
    /// ancestors) on first request; `None` if no descriptor is registered
    pub fn get_descriptor_for(&self, name: &str) -> Result<Option<ClassId>> {
        if let Some(id) = self.resolved.get(name) {
            return Ok(Some(*id));
        }

        let model = self.model.upgradable_read();
        let Some(id) = model.class_id(name) else {
            return Ok(None);
        };
        let mut model = RwLockUpgradableReadGuard::upgrade(model);
        let loader = MetadataLoader::new(&*self.introspector, &self.config);
        let loaded = loader.load(&mut model, &[id])?;
        model.mark_used(id)?;
        let model = parking_lot::RwLockWriteGuard::downgrade(model);

        self.notify(&model, &loaded);
        self.resolved.insert(name.to_string(), id);
        Ok(Some(id))
    }

    /// Run `f` on the loaded descriptor of `name`
    pub fn with_descriptor<R>(
        &self,
        name: &str,
        f: impl FnOnce(&ClassDescriptor) -> R,
    ) -> Result<Option<R>> {
        let Some(id) = self.get_descriptor_for(name)? else {
            return Ok(None);
        };
        let model = self.model.read();
        Ok(Some(f(model.class(id)?)))
    }

    /// Whether `name` has a persistence-capable descriptor
    pub fn is_class_persistent(&self, name: &str) -> Result<bool> {
        Ok(self
            .with_descriptor(name, |class| class.is_persistent())?
            .unwrap_or(false))
    }

    /// Loaded persistent classes implementing `interface`, sorted by name
    pub fn get_implementations_of(&self, interface: &str) -> Result<Vec<ClassId>> {
        let names: Vec<String> = {
            let model = self.model.read();
            model
                .implementations_of(&*self.introspector, interface)
                .into_iter()
                .filter_map(|id| model.class(id).ok().map(|c| c.full_name().to_string()))
                .collect()
        };
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            ids.extend(self.get_descriptor_for(&name)?);
        }
        Ok(ids)
    }

    /// Load every registered class; returns the ones initialised by this call
    pub fn initialise_all(&self) -> Result<Vec<ClassId>> {
        let mut model = self.model.write();
        let loader = MetadataLoader::new(&*self.introspector, &self.config);
        let loaded = loader.load_all(&mut model)?;
        let model = parking_lot::RwLockWriteGuard::downgrade(model);
        self.notify(&model, &loaded);
        Ok(loaded)
    }

    fn notify(&self, model: &MetadataModel, loaded: &[ClassId]) {
        let listeners = self.listeners.read();
        if listeners.is_empty() {
            return;
        }
        for &id in loaded {
            if let Ok(class) = model.class(id) {
                for listener in listeners.iter() {
                    listener.class_initialised(class);
                }
            }
        }
    }

    // ========================================================================
    // Relations
    // ========================================================================

    /// Member reference of `member` as seen from class `class`
    pub fn member_ref(&self, class: &str, member: &str) -> Result<MemberRef> {
        let id = self
            .get_descriptor_for(class)?
            .ok_or_else(|| MetadataError::UnknownDescriptor(class.to_string()))?;
        self.model
            .read()
            .member_by_name(id, member)
            .ok_or_else(|| MetadataError::UnknownDescriptor(format!("{}.{}", class, member)))
    }

    /// Resolved relation of `class.member`, loading the other side first
    pub fn relation(&self, class: &str, member: &str) -> Result<ResolvedRelation> {
        let member = self.member_ref(class, member)?;
        let candidates = {
            let model = self.model.read();
            RelationResolver::new(&model, &*self.introspector).other_side_candidates(member)?
        };
        for name in candidates {
            self.get_descriptor_for(&name)?;
        }
        let _serial = self.resolving.lock();
        let model = self.model.read();
        RelationResolver::new(&model, &*self.introspector).resolve(member)
    }

    /// Relation type of `class.member`
    pub fn relation_type(&self, class: &str, member: &str) -> Result<RelationKind> {
        Ok(self.relation(class, member)?.kind)
    }

    /// Counterparts of `class.member`
    pub fn counterparts(&self, class: &str, member: &str) -> Result<Vec<MemberRef>> {
        Ok(self.relation(class, member)?.counterparts)
    }

    /// Snapshot of the model
    pub fn summary(&self) -> ModelSummary {
        self.model.read().summary()
    }
}
