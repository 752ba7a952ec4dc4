//! Two-pass loading
//!
//! Loading a class pulls in its persistent ancestors, orders the set
//! superclass-first and then runs every populate before any initialise. The
//! ordering makes the recursion inside `populate_class`/`initialise_class`
//! a no-op in the common case; it still catches inheritance cycles.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info_span};

use ormeta_types::TypeIntrospector;

use crate::config::MetadataConfig;
use crate::error::Result;
use crate::ids::ClassId;
use crate::model::MetadataModel;
use crate::node::{Lifecycle, MetadataNode};

/// Drives populate and initialise over a worklist of classes
pub struct MetadataLoader<'a> {
    introspector: &'a dyn TypeIntrospector,
    config: &'a MetadataConfig,
}

impl<'a> MetadataLoader<'a> {
    /// Create a loader
    pub fn new(introspector: &'a dyn TypeIntrospector, config: &'a MetadataConfig) -> Self {
        Self {
            introspector,
            config,
        }
    }

    /// `roots` plus their persistent ancestors, superclasses before subclasses
    ///
    /// Ties are broken by class name. Classes caught in an inheritance cycle
    /// are appended last so that populating them reports the cycle.
    pub fn load_order(&self, model: &MetadataModel, roots: &[ClassId]) -> Vec<ClassId> {
        let mut parents: FxHashMap<ClassId, Option<ClassId>> = FxHashMap::default();
        let mut pending: Vec<ClassId> = roots.to_vec();
        while let Some(id) = pending.pop() {
            if parents.contains_key(&id) {
                continue;
            }
            let parent = model.persistent_parent(id, self.introspector, self.config);
            parents.insert(id, parent);
            pending.extend(parent);
        }

        let name_of = |id: &ClassId| {
            model
                .class(*id)
                .map(|c| c.full_name().to_string())
                .unwrap_or_default()
        };
        let mut children: FxHashMap<ClassId, Vec<ClassId>> = FxHashMap::default();
        let mut ready: Vec<ClassId> = Vec::new();
        for (&id, &parent) in &parents {
            match parent {
                Some(parent) => children.entry(parent).or_default().push(id),
                None => ready.push(id),
            }
        }
        ready.sort_by_key(|id| name_of(id));

        let mut order = Vec::with_capacity(parents.len());
        let mut emitted = FxHashSet::default();
        let mut queue: VecDeque<ClassId> = ready.into();
        while let Some(id) = queue.pop_front() {
            if !emitted.insert(id) {
                continue;
            }
            order.push(id);
            if let Some(kids) = children.get_mut(&id) {
                kids.sort_by_key(|kid| name_of(kid));
                queue.extend(kids.iter().copied());
            }
        }

        let mut cyclic: Vec<ClassId> = parents
            .keys()
            .copied()
            .filter(|id| !emitted.contains(id))
            .collect();
        cyclic.sort_by_key(|id| name_of(id));
        order.extend(cyclic);
        order
    }

    /// Populate then initialise `roots` and their ancestors; returns the
    /// classes that became initialised during this call, in load order
    pub fn load(&self, model: &mut MetadataModel, roots: &[ClassId]) -> Result<Vec<ClassId>> {
        let order = self.load_order(model, roots);
        let span = info_span!("load", classes = order.len());
        let _enter = span.enter();

        let already: FxHashSet<ClassId> = order
            .iter()
            .copied()
            .filter(|&id| model.class(id).is_ok_and(|c| c.state() >= Lifecycle::Initialised))
            .collect();

        for &id in &order {
            model.populate_class(id, self.introspector, self.config)?;
        }
        for &id in &order {
            model.initialise_class(id, self.introspector, self.config)?;
        }
        model.refresh_containment_states();

        let loaded: Vec<ClassId> = order
            .into_iter()
            .filter(|id| !already.contains(id))
            .collect();
        debug!(loaded = loaded.len(), "loaded classes");
        Ok(loaded)
    }

    /// Load every registered class
    pub fn load_all(&self, model: &mut MetadataModel) -> Result<Vec<ClassId>> {
        let roots: Vec<ClassId> = model.classes().map(|(id, _)| id).collect();
        self.load(model, &roots)
    }
}
