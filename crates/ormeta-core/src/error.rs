//! Metadata resolution errors
//!
//! Every failure aborts the populate/initialise/resolve call chain that raised
//! it. Variants fall into three categories (see [`ErrorCategory`]): user
//! configuration mistakes, caller misuse of the lifecycle, and broken internal
//! invariants.

use thiserror::Error;

use crate::node::Lifecycle;

/// Result type used throughout the engine
pub type Result<T> = std::result::Result<T, MetadataError>;

/// Broad classification of a [`MetadataError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Descriptor and introspected type disagree, or a declared name is invalid
    UserConfiguration,
    /// The lifecycle API was driven in the wrong order
    ProgrammerMisuse,
    /// An internal model invariant does not hold
    Integrity,
}

/// Errors raised while populating, initialising or resolving metadata
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MetadataError {
    // ------------------------------------------------------------------
    // User configuration
    // ------------------------------------------------------------------
    /// Declared member has no field or accessor pair on the host type
    #[error("Member {class}.{member} not found: {reason}")]
    MissingMember {
        /// Owning type
        class: String,
        /// Member name
        member: String,
        /// What was missing
        reason: String,
    },

    /// Override names an owner that does not declare the member
    #[error("Invalid override of {class}.{member}: {reason}")]
    InvalidOverride {
        /// Overriding type
        class: String,
        /// Member name
        member: String,
        /// Why the override was rejected
        reason: String,
    },

    /// Explicit member attributes contradict each other or the host type
    #[error("Invalid member {class}.{member}: {reason}")]
    InvalidMember {
        /// Owning type
        class: String,
        /// Member name
        member: String,
        /// Why the member was rejected
        reason: String,
    },

    /// Reference-typed member has no persistent implementation
    #[error("Cannot resolve a persistent implementation of {type_name} for {class}.{member}")]
    UnresolvableImplementation {
        /// Owning type
        class: String,
        /// Member name
        member: String,
        /// Reference or declared implementation type that did not resolve
        type_name: String,
    },

    /// Declared counterpart name does not exist on the other side
    #[error("Counterpart {counterpart} of {class}.{member} not found on {other}")]
    InvalidCounterpart {
        /// Owning type
        class: String,
        /// Member name
        member: String,
        /// Declared counterpart name
        counterpart: String,
        /// Type searched for the counterpart
        other: String,
    },

    /// Descriptor names a type the introspector does not know
    #[error("Type {type_name} of {class} is not known to the type introspector")]
    UnknownType {
        /// Descriptor name
        class: String,
        /// Unknown type name
        type_name: String,
    },

    /// Descriptor kind disagrees with the introspected type
    #[error("Descriptor {class} does not match its host type: {reason}")]
    DescriptorMismatch {
        /// Descriptor name
        class: String,
        /// Mismatch description
        reason: String,
    },

    /// Declared superclass is not a persistent ancestor
    #[error("Invalid superclass for {class}: {reason}")]
    InvalidSuperclass {
        /// Descriptor name
        class: String,
        /// Why the superclass was rejected
        reason: String,
    },

    /// Identity scheme or objectid declaration is inconsistent
    #[error("Invalid identity for {class}: {reason}")]
    InvalidIdentity {
        /// Descriptor name
        class: String,
        /// Why the identity was rejected
        reason: String,
    },

    // ------------------------------------------------------------------
    // Programmer misuse
    // ------------------------------------------------------------------
    /// `initialise` called before `populate` completed
    #[error("{node} cannot be initialised before it is populated (state {state})")]
    NotPopulated {
        /// Node description
        node: String,
        /// Current state
        state: Lifecycle,
    },

    /// Mutation attempted on a frozen node
    #[error("{node} is {state}; {operation} is not allowed")]
    Frozen {
        /// Node description
        node: String,
        /// Current state
        state: Lifecycle,
        /// Attempted operation
        operation: String,
    },

    /// Id does not address a node of this model
    #[error("Unknown descriptor: {0}")]
    UnknownDescriptor(String),

    // ------------------------------------------------------------------
    // Integrity
    // ------------------------------------------------------------------
    /// Member numbers are not contiguous or collide
    #[error("Broken member numbering in {class}: {reason}")]
    BrokenNumbering {
        /// Descriptor name
        class: String,
        /// What is broken
        reason: String,
    },

    /// Override has no managed member to override
    #[error("Override {class}.{member} has no managed counterpart in {owner}")]
    OrphanedOverride {
        /// Overriding type
        class: String,
        /// Member name
        member: String,
        /// Declared owner
        owner: String,
    },

    /// Inheritance loops back on itself
    #[error("Cyclic inheritance detected at {class}")]
    CyclicInheritance {
        /// Descriptor name
        class: String,
    },
}

impl MetadataError {
    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            MetadataError::MissingMember { .. }
            | MetadataError::InvalidOverride { .. }
            | MetadataError::InvalidMember { .. }
            | MetadataError::UnresolvableImplementation { .. }
            | MetadataError::InvalidCounterpart { .. }
            | MetadataError::UnknownType { .. }
            | MetadataError::DescriptorMismatch { .. }
            | MetadataError::InvalidSuperclass { .. }
            | MetadataError::InvalidIdentity { .. } => ErrorCategory::UserConfiguration,
            MetadataError::NotPopulated { .. }
            | MetadataError::Frozen { .. }
            | MetadataError::UnknownDescriptor(_) => ErrorCategory::ProgrammerMisuse,
            MetadataError::BrokenNumbering { .. }
            | MetadataError::OrphanedOverride { .. }
            | MetadataError::CyclicInheritance { .. } => ErrorCategory::Integrity,
        }
    }

    pub(crate) fn invalid_member(class: &str, member: &str, reason: impl Into<String>) -> Self {
        MetadataError::InvalidMember {
            class: class.to_string(),
            member: member.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing_member(class: &str, member: &str, reason: impl Into<String>) -> Self {
        MetadataError::MissingMember {
            class: class.to_string(),
            member: member.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_override(class: &str, member: &str, reason: impl Into<String>) -> Self {
        MetadataError::InvalidOverride {
            class: class.to_string(),
            member: member.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_identity(class: &str, reason: impl Into<String>) -> Self {
        MetadataError::InvalidIdentity {
            class: class.to_string(),
            reason: reason.into(),
        }
    }
}
