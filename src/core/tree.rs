use serde::{Deserialize, Serialize};

use super::usesite::UseSite;
use crate::parsers::{AccessFlags, MemberFacts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiNodeKind {
    Class,
    /// Placeholder for an API type whose class file was never found.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMember {
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
    pub accessible: bool,
}

impl From<&MemberFacts> for ApiMember {
    fn from(member: &MemberFacts) -> Self {
        Self {
            name: member.name.clone(),
            descriptor: member.descriptor.clone(),
            access: member.access,
            accessible: member.is_accessible(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiNode {
    pub kind: ApiNodeKind,
    pub binary_name: String,
    pub canonical_name: String,
    pub archive: Option<String>,
    pub accessible: bool,
    pub api_type: bool,
    pub api_through_use: bool,
    pub primary_api: bool,
    pub fields: Vec<ApiMember>,
    pub methods: Vec<ApiMember>,
    /// Every place this type is used from, sorted.
    pub use_sites: Vec<UseSite>,
    pub owner: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl ApiNode {
    pub fn is_missing(&self) -> bool {
        self.kind == ApiNodeKind::Missing
    }
}

/// The public API of a set of archives: top-level types as roots, member
/// types below their owners.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiTree {
    nodes: Vec<ApiNode>,
    roots: Vec<NodeId>,
}

impl ApiTree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &ApiNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ApiNode> {
        self.nodes.iter()
    }

    pub fn root_ids(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn roots(&self) -> impl Iterator<Item = &ApiNode> {
        self.roots.iter().map(|id| &self.nodes[id.0])
    }

    pub fn children<'a>(&'a self, node: &'a ApiNode) -> impl Iterator<Item = &'a ApiNode> + 'a {
        node.children.iter().map(|id| &self.nodes[id.0])
    }

    pub fn find(&self, binary_name: &str) -> Option<&ApiNode> {
        self.nodes.iter().find(|node| node.binary_name == binary_name)
    }

    pub fn is_root(&self, binary_name: &str) -> bool {
        self.roots().any(|node| node.binary_name == binary_name)
    }

    /// Parent of the node with the given name, if it is not a root.
    pub fn parent_of(&self, binary_name: &str) -> Option<&ApiNode> {
        self.find(binary_name)
            .and_then(|node| node.owner)
            .map(|id| &self.nodes[id.0])
    }

    /// Binary names of all nodes, depth first from the roots.
    pub fn binary_names(&self) -> Vec<&str> {
        let mut names = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            names.push(node.binary_name.as_str());
            stack.extend(node.children.iter().rev().copied());
        }
        names
    }

    pub(crate) fn attach(&mut self, mut node: ApiNode, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.owner = parent;
        self.nodes.push(node);
        match parent {
            Some(parent) => self.nodes[parent.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }
}
