//! Identity schemes and value generation

use serde::{Deserialize, Serialize};
use std::fmt;

use ormeta_types::TypeRef;

use crate::node::{MetadataNode, NodeHeader};

/// How instances of a class are identified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityScheme {
    /// Not independently identifiable (embedded-only classes)
    None,
    /// Identity generated by the datastore
    Datastore,
    /// Identity defined by primary-key members
    Application,
}

impl fmt::Display for IdentityScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IdentityScheme::None => "none",
            IdentityScheme::Datastore => "datastore",
            IdentityScheme::Application => "application",
        };
        f.write_str(name)
    }
}

/// Strategy used to generate identity values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueStrategy {
    /// Whatever the datastore prefers
    Native,
    /// Named datastore sequence
    Sequence,
    /// Auto-increment column
    Identity,
    /// Table-maintained counter
    Increment,
    /// Random UUID string
    Uuid,
}

impl fmt::Display for ValueStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueStrategy::Native => "native",
            ValueStrategy::Sequence => "sequence",
            ValueStrategy::Identity => "identity",
            ValueStrategy::Increment => "increment",
            ValueStrategy::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

/// Datastore identity settings of a class
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityDescriptor {
    header: NodeHeader,
    /// Generation strategy
    pub strategy: ValueStrategy,
    /// Identity column name
    pub column: Option<String>,
    /// Sequence name, for `ValueStrategy::Sequence`
    pub sequence: Option<String>,
}

impl IdentityDescriptor {
    /// Create an identity descriptor with the given strategy
    pub fn new(strategy: ValueStrategy) -> Self {
        Self {
            header: NodeHeader::new(),
            strategy,
            column: None,
            sequence: None,
        }
    }

    /// Set the identity column
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Set the sequence name
    pub fn with_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.sequence = Some(sequence.into());
        self
    }
}

impl MetadataNode for IdentityDescriptor {
    fn header(&self) -> &NodeHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        &mut self.header
    }

    fn describe(&self) -> String {
        format!("datastore identity ({})", self.strategy)
    }
}

/// Resolved object-id of an application-identity class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ObjectIdKind {
    /// One primary-key member serves as the id
    SingleField {
        /// Primary-key member name
        member: String,
        /// Its resolved type
        ty: TypeRef,
    },
    /// A declared objectid class
    Class(String),
}

impl ObjectIdKind {
    /// Name of the objectid type
    pub fn type_name(&self) -> String {
        match self {
            ObjectIdKind::SingleField { ty, .. } => ty.to_string(),
            ObjectIdKind::Class(name) => name.clone(),
        }
    }
}
