use std::collections::HashMap;
use tracing::{info, trace, warn};

use super::analyzer::AnalysisError;
use super::graph::{TypeGraph, TypeId, TypeRecord, TypeState};
use super::tree::{ApiMember, ApiNode, ApiNodeKind, ApiTree, NodeId};
use crate::config::{AnalysisConfig, MissingClassPolicy, OwnerExclusionPolicy};

/// Turns a finished [`TypeGraph`] into an [`ApiTree`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeAssembler {
    missing_classes: MissingClassPolicy,
    owner_exclusion: OwnerExclusionPolicy,
}

impl TreeAssembler {
    pub fn new(missing_classes: MissingClassPolicy, owner_exclusion: OwnerExclusionPolicy) -> Self {
        Self {
            missing_classes,
            owner_exclusion,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.missing_classes, config.owner_exclusion)
    }

    pub fn assemble(&self, graph: &TypeGraph) -> Result<ApiTree, AnalysisError> {
        let missing = graph.unresolved();
        if !missing.is_empty() {
            match self.missing_classes {
                MissingClassPolicy::Error => {
                    return Err(AnalysisError::MissingTypes { names: missing });
                }
                MissingClassPolicy::Ignore => {
                    warn!(
                        count = missing.len(),
                        classes = ?missing,
                        "classes contributing to the public API could not be located, ignoring them"
                    );
                }
                MissingClassPolicy::Report => {}
            }
        }

        // Owners always sort before the types they contain.
        let mut order: Vec<TypeId> = graph.ids().collect();
        order.sort_by(|a, b| {
            let (a, b) = (graph.record(*a), graph.record(*b));
            a.nesting_depth()
                .cmp(&b.nesting_depth())
                .then_with(|| a.binary_name().cmp(b.binary_name()))
        });

        let mut tree = ApiTree::default();
        let mut placed: HashMap<TypeId, NodeId> = HashMap::new();

        for id in order {
            let record = graph.record(id);
            if !record.is_api_type() || record.is_explicitly_excluded() {
                continue;
            }

            let committed = match record.state() {
                TypeState::Resolved(committed) => committed,
                TypeState::Unresolved => {
                    if self.missing_classes == MissingClassPolicy::Report {
                        tree.attach(missing_node(graph, id), None);
                    }
                    continue;
                }
            };

            let parent = match record.owner() {
                None => None,
                Some(owner) => match placed.get(&owner) {
                    Some(&parent) => Some(parent),
                    None if record.is_api_through_use() && !self.blocked_by_owner(graph, record) => {
                        trace!(class = record.binary_name(), "owner not in the API, promoting to root");
                        None
                    }
                    None => {
                        trace!(class = record.binary_name(), "owner not in the API, dropping");
                        continue;
                    }
                },
            };

            let node = ApiNode {
                kind: ApiNodeKind::Class,
                binary_name: record.binary_name().to_string(),
                canonical_name: record.canonical_name().to_string(),
                archive: Some(committed.archive.clone()),
                accessible: committed.accessible,
                api_type: record.is_api_type(),
                api_through_use: record.is_api_through_use(),
                primary_api: record.is_primary_api(),
                fields: committed.fields.iter().map(ApiMember::from).collect(),
                methods: committed.methods.iter().map(ApiMember::from).collect(),
                use_sites: graph.use_sites(id),
                owner: None,
                children: Vec::new(),
            };
            placed.insert(id, tree.attach(node, parent));
        }

        info!(
            types = tree.len(),
            roots = tree.root_ids().len(),
            "assembled API tree"
        );
        Ok(tree)
    }

    fn blocked_by_owner(&self, graph: &TypeGraph, record: &TypeRecord) -> bool {
        if self.owner_exclusion != OwnerExclusionPolicy::ExcludeWithOwner {
            return false;
        }
        let mut owner = record.owner();
        while let Some(id) = owner {
            let owner_record = graph.record(id);
            if owner_record.is_explicitly_excluded() {
                return true;
            }
            owner = owner_record.owner();
        }
        false
    }
}

fn missing_node(graph: &TypeGraph, id: TypeId) -> ApiNode {
    let record = graph.record(id);
    ApiNode {
        kind: ApiNodeKind::Missing,
        binary_name: record.binary_name().to_string(),
        canonical_name: record.canonical_name().to_string(),
        archive: None,
        accessible: false,
        api_type: true,
        api_through_use: record.is_api_through_use(),
        primary_api: false,
        fields: Vec::new(),
        methods: Vec::new(),
        use_sites: graph.use_sites(id),
        owner: None,
        children: Vec::new(),
    }
}
