//! Node plumbing shared by every descriptor
//!
//! Each descriptor embeds a [`NodeHeader`]: its lifecycle state, a non-owning
//! back-reference to its parent, its vendor extension bag and the reentrancy
//! flags held while a transition runs.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{MetadataError, Result};
use crate::ids::{ClassId, FileId, MemberRef, PackageId};

/// Lifecycle of a metadata node; strictly increasing, never reversed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Lifecycle {
    /// Built from declarations; nothing inferred yet
    Created,
    /// Every unset attribute has been defaulted
    Populated,
    /// Numbering and cross-checks are done; immutable from here on
    Initialised,
    /// Handed to a consumer
    Used,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Created => "CREATED",
            Lifecycle::Populated => "POPULATED",
            Lifecycle::Initialised => "INITIALISED",
            Lifecycle::Used => "USED",
        };
        f.write_str(name)
    }
}

/// Non-owning reference to a node's parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParentRef {
    /// Parent is a file
    File(FileId),
    /// Parent is a package
    Package(PackageId),
    /// Parent is a class or interface
    Class(ClassId),
    /// Parent is a class member (containers, columns, embedded descriptors)
    Member(MemberRef),
}

// ============================================================================
// Extension bag
// ============================================================================

/// Vendor-specific key/value overlay carried by every node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtensionBag {
    entries: BTreeMap<String, String>,
}

impl ExtensionBag {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, returning the previous one
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Get a value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Interpret a value as a boolean (`true`/`false`, case-insensitive)
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        let value = self.get(key)?;
        if value.eq_ignore_ascii_case("true") {
            Some(true)
        } else if value.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }

    /// Whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove a value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy entries from `other` whose keys are absent here
    pub fn merge_missing(&mut self, other: &ExtensionBag) {
        for (k, v) in &other.entries {
            self.entries.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
}

// ============================================================================
// Reentrancy flags
// ============================================================================

/// Reentrancy flag held for the duration of one transition
///
/// Cloning a flag yields a fresh, unheld flag: a copied node is never
/// mid-transition.
#[derive(Debug, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    /// Try to enter; `None` if the flag is already held
    pub fn try_enter(&self) -> Option<BusyGuard> {
        if self.0.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(BusyGuard(Arc::clone(&self.0)))
        }
    }

    /// Whether a transition currently holds the flag
    pub fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Clone for BusyFlag {
    fn clone(&self) -> Self {
        Self::default()
    }
}

/// Releases its [`BusyFlag`] when dropped
#[derive(Debug)]
pub struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Outcome of asking to start a transition
#[derive(Debug)]
pub(crate) enum Transition {
    /// Node is already at or past the target state
    AlreadyDone,
    /// The same transition is running further up the stack
    InProgress,
    /// Caller owns the transition until the guard drops
    Begin(BusyGuard),
}

// ============================================================================
// Node header
// ============================================================================

/// State shared by every metadata node
#[derive(Debug, Clone)]
pub struct NodeHeader {
    state: Lifecycle,
    parent: Option<ParentRef>,
    extensions: ExtensionBag,
    populating: BusyFlag,
    initialising: BusyFlag,
}

impl Default for NodeHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for NodeHeader {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
            && self.parent == other.parent
            && self.extensions == other.extensions
    }
}

impl NodeHeader {
    /// A fresh header in the `Created` state
    pub fn new() -> Self {
        Self {
            state: Lifecycle::Created,
            parent: None,
            extensions: ExtensionBag::new(),
            populating: BusyFlag::default(),
            initialising: BusyFlag::default(),
        }
    }

    /// Current state
    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// Parent back-reference
    pub fn parent(&self) -> Option<ParentRef> {
        self.parent
    }

    /// Extension bag
    pub fn extensions(&self) -> &ExtensionBag {
        &self.extensions
    }

    pub(crate) fn extensions_mut(&mut self) -> &mut ExtensionBag {
        &mut self.extensions
    }

    pub(crate) fn set_parent(&mut self, parent: ParentRef) {
        self.parent = Some(parent);
    }

    /// Whether populate has completed
    pub fn is_populated(&self) -> bool {
        self.state >= Lifecycle::Populated
    }

    /// Whether initialise has completed
    pub fn is_initialised(&self) -> bool {
        self.state >= Lifecycle::Initialised
    }

    /// Whether a populate transition is running
    pub fn is_populating(&self) -> bool {
        self.populating.is_held()
    }

    /// Whether an initialise transition is running
    pub fn is_initialising(&self) -> bool {
        self.initialising.is_held()
    }

    /// Leading guard of `populate`
    pub(crate) fn begin_populate(&self) -> Transition {
        if self.state >= Lifecycle::Populated {
            return Transition::AlreadyDone;
        }
        match self.populating.try_enter() {
            Some(guard) => Transition::Begin(guard),
            None => Transition::InProgress,
        }
    }

    /// Leading guard of `initialise`; fails if populate has not completed
    pub(crate) fn begin_initialise(&self, node: impl FnOnce() -> String) -> Result<Transition> {
        if self.state >= Lifecycle::Initialised {
            return Ok(Transition::AlreadyDone);
        }
        if self.state < Lifecycle::Populated {
            return Err(MetadataError::NotPopulated {
                node: node(),
                state: self.state,
            });
        }
        Ok(match self.initialising.try_enter() {
            Some(guard) => Transition::Begin(guard),
            None => Transition::InProgress,
        })
    }

    /// Advance the state; requests to move backwards are ignored
    pub(crate) fn advance(&mut self, next: Lifecycle) {
        if next > self.state {
            self.state = next;
        }
    }

    /// Fail with `Frozen` once the node is initialised
    pub(crate) fn ensure_mutable(
        &self,
        node: impl FnOnce() -> String, operation: &str,
    ) -> Result<()> {
        if self.state >= Lifecycle::Initialised {
            return Err(MetadataError::Frozen {
                node: node(),
                state: self.state,
                operation: operation.to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// MetadataNode
// ============================================================================

/// Common view over every descriptor: lifecycle, parent and extensions
pub trait MetadataNode {
    /// Node header
    fn header(&self) -> &NodeHeader;

    /// Mutable node header
    fn header_mut(&mut self) -> &mut NodeHeader;

    /// Human-readable description used in diagnostics
    fn describe(&self) -> String;

    /// Current lifecycle state
    fn state(&self) -> Lifecycle {
        self.header().state()
    }

    /// Parent back-reference
    fn parent(&self) -> Option<ParentRef> {
        self.header().parent()
    }

    /// Vendor extensions
    fn extensions(&self) -> &ExtensionBag {
        self.header().extensions()
    }

    /// Look up one vendor extension
    fn extension(&self, key: &str) -> Option<&str> {
        self.header().extensions().get(key)
    }

    /// Add a vendor extension; refused once the node is initialised
    fn add_extension(&mut self, key: &str, value: &str) -> Result<()> {
        let description = self.describe();
        self.header()
            .ensure_mutable(|| description, "adding an extension")?;
        self.header_mut().extensions_mut().insert(key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_ordering() {
        assert!(Lifecycle::Created < Lifecycle::Populated);
        assert!(Lifecycle::Populated < Lifecycle::Initialised);
        assert!(Lifecycle::Initialised < Lifecycle::Used);
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut header = NodeHeader::new();
        header.advance(Lifecycle::Initialised);
        header.advance(Lifecycle::Populated);
        assert_eq!(header.state(), Lifecycle::Initialised);
    }

    #[test]
    fn test_populate_guard() {
        let mut header = NodeHeader::new();
        let guard = match header.begin_populate() {
            Transition::Begin(guard) => guard,
            other => panic!("expected Begin, got {:?}", other),
        };
        assert!(header.is_populating());
        assert!(matches!(header.begin_populate(), Transition::InProgress));
        drop(guard);
        assert!(!header.is_populating());

        header.advance(Lifecycle::Populated);
        assert!(matches!(header.begin_populate(), Transition::AlreadyDone));
    }

    #[test]
    fn test_initialise_before_populate_fails() {
        let header = NodeHeader::new();
        let err = header.begin_initialise(|| "node".to_string()).unwrap_err();
        assert!(matches!(err, MetadataError::NotPopulated { .. }));
    }

    #[test]
    fn test_initialise_after_used_is_noop() {
        let mut header = NodeHeader::new();
        header.advance(Lifecycle::Used);
        assert!(matches!(
            header.begin_initialise(|| "node".to_string()).unwrap(),
            Transition::AlreadyDone
        ));
        assert!(matches!(header.begin_populate(), Transition::AlreadyDone));
    }

    #[test]
    fn test_frozen_header_refuses_mutation() {
        let mut header = NodeHeader::new();
        assert!(header.ensure_mutable(|| "node".to_string(), "edit").is_ok());
        header.advance(Lifecycle::Initialised);
        let err = header.ensure_mutable(|| "node".to_string(), "edit").unwrap_err();
        assert!(matches!(err, MetadataError::Frozen { .. }));
    }

    #[test]
    fn test_cloned_flag_is_free() {
        let flag = BusyFlag::default();
        let _guard = flag.try_enter().unwrap();
        let copy = flag.clone();
        assert!(flag.is_held());
        assert!(!copy.is_held());
    }

    #[test]
    fn test_extension_bag() {
        let mut bag = ExtensionBag::new();
        bag.insert("persist-final", "TRUE");
        bag.insert("comment", "x");
        assert_eq!(bag.get_bool("persist-final"), Some(true));
        assert_eq!(bag.get_bool("comment"), None);
        assert_eq!(bag.len(), 2);

        let mut other = ExtensionBag::new();
        other.insert("comment", "y");
        other.insert("index", "true");
        bag.merge_missing(&other);
        assert_eq!(bag.get("comment"), Some("x"));
        assert_eq!(bag.get("index"), Some("true"));
    }
}
