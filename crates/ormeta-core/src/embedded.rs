//! Nested descriptors for embedded persistent members

use tracing::debug;

use crate::context::ResolutionContext;
use crate::error::Result;
use crate::ids::MemberRef;
use crate::member::{synthesize_missing, MemberDescriptor, MemberOwner};
use crate::node::{Lifecycle, MetadataNode, NodeHeader, ParentRef, Transition};

/// Members of a persistent type stored inline in its owner
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedDescriptor {
    header: NodeHeader,
    owner_type: String,
    members: Vec<MemberDescriptor>,
}

impl EmbeddedDescriptor {
    pub(crate) fn new(owner_type: impl Into<String>) -> Self {
        Self {
            header: NodeHeader::new(),
            owner_type: owner_type.into(),
            members: Vec::new(),
        }
    }

    /// The embedded type
    pub fn owner_type(&self) -> &str {
        &self.owner_type
    }

    /// Embedded members, sorted by name
    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    /// Embedded member by name
    pub fn find_member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name() == name)
    }

    /// Build and populate the nested members
    ///
    /// `chain` lists the types already embedding this one, outermost first.
    pub(crate) fn populate(&mut self, ctx: &ResolutionContext<'_>, chain: &[String]) -> Result<()> {
        let _guard = match self.header.begin_populate() {
            Transition::Begin(guard) => guard,
            Transition::AlreadyDone | Transition::InProgress => return Ok(()),
        };

        let mut members: Vec<MemberDescriptor> = Vec::new();
        let mut use_properties = false;
        if let Some((_, class)) = ctx.descriptor_for(&self.owner_type) {
            use_properties = class.uses_property_access();
            members.extend(
                class
                    .declared_members()
                    .filter(|m| !m.is_override())
                    .cloned(),
            );
        }
        synthesize_missing(&mut members, ctx, &self.owner_type, use_properties);
        members.sort_by(|a, b| a.name().cmp(b.name()));

        let owner = MemberOwner {
            class_name: &self.owner_type,
            embedding_chain: chain,
        };
        for member in &mut members {
            member.populate(ctx, &owner)?;
            member.self_ref = None;
        }
        debug!(
            embedded_type = %self.owner_type,
            members = members.len(),
            depth = chain.len(),
            "populated embedded descriptor"
        );
        self.members = members;
        self.header.advance(Lifecycle::Populated);
        Ok(())
    }

    pub(crate) fn attach(&mut self, parent: MemberRef) {
        self.header.set_parent(ParentRef::Member(parent));
        for member in &mut self.members {
            member.attach(ParentRef::Member(parent), None);
        }
    }

    pub(crate) fn initialise(&mut self) -> Result<()> {
        let description = self.describe();
        let _guard = match self.header.begin_initialise(|| description)? {
            Transition::Begin(guard) => guard,
            Transition::AlreadyDone | Transition::InProgress => return Ok(()),
        };
        for member in &mut self.members {
            member.initialise()?;
        }
        self.header.advance(Lifecycle::Initialised);
        Ok(())
    }
}

impl MetadataNode for EmbeddedDescriptor {
    fn header(&self) -> &NodeHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        &mut self.header
    }

    fn describe(&self) -> String {
        format!("embedded {}", self.owner_type)
    }
}
