use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tracing::trace;

use super::usesite::{UseKind, UseSite};
use crate::parsers::descriptor::internal_to_binary;
use crate::parsers::{AccessFlags, ClassFacts, MemberFacts};

pub type TypeId = NodeIndex;

/// What is known about a type once its own class file has been visited.
#[derive(Debug, Clone)]
pub struct CommittedType {
    pub archive: String,
    pub access: AccessFlags,
    pub accessible: bool,
    pub fields: Vec<MemberFacts>,
    pub methods: Vec<MemberFacts>,
}

#[derive(Debug, Clone)]
pub enum TypeState {
    Unresolved,
    Resolved(Box<CommittedType>),
}

/// A type seen anywhere during the scan, keyed by binary name.
///
/// API flags only ever go from false to true.
#[derive(Debug, Clone)]
pub struct TypeRecord {
    binary_name: String,
    canonical_name: String,
    api_type: bool,
    api_through_use: bool,
    primary_api: bool,
    explicitly_included: bool,
    explicitly_excluded: bool,
    owner: Option<TypeId>,
    nesting_depth: usize,
    state: TypeState,
}

impl TypeRecord {
    fn placeholder(binary_name: &str) -> Self {
        Self {
            binary_name: binary_name.to_string(),
            canonical_name: binary_name.to_string(),
            api_type: false,
            api_through_use: false,
            primary_api: false,
            explicitly_included: false,
            explicitly_excluded: false,
            owner: None,
            nesting_depth: 0,
            state: TypeState::Unresolved,
        }
    }

    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    pub fn is_api_type(&self) -> bool {
        self.api_type
    }

    pub fn is_api_through_use(&self) -> bool {
        self.api_through_use
    }

    pub fn is_primary_api(&self) -> bool {
        self.primary_api
    }

    pub fn is_explicitly_included(&self) -> bool {
        self.explicitly_included
    }

    pub fn is_explicitly_excluded(&self) -> bool {
        self.explicitly_excluded
    }

    pub fn owner(&self) -> Option<TypeId> {
        self.owner
    }

    pub fn nesting_depth(&self) -> usize {
        self.nesting_depth
    }

    pub fn state(&self) -> &TypeState {
        &self.state
    }

    pub fn committed(&self) -> Option<&CommittedType> {
        match &self.state {
            TypeState::Resolved(committed) => Some(committed),
            TypeState::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, TypeState::Resolved(_))
    }

    fn is_accessible(&self) -> bool {
        self.committed().is_some_and(|committed| committed.accessible)
    }
}

/// Every type referenced during a scan and the use edges between them.
/// Edges point from the using type to the used type.
pub struct TypeGraph {
    graph: DiGraph<TypeRecord, UseSite>,
    index: HashMap<String, TypeId>,
}

impl Default for TypeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn get_or_insert(&mut self, binary_name: &str) -> TypeId {
        if let Some(&id) = self.index.get(binary_name) {
            return id;
        }
        let id = self.graph.add_node(TypeRecord::placeholder(binary_name));
        self.index.insert(binary_name.to_string(), id);
        id
    }

    pub fn id_of(&self, binary_name: &str) -> Option<TypeId> {
        self.index.get(binary_name).copied()
    }

    pub fn record(&self, id: TypeId) -> &TypeRecord {
        &self.graph[id]
    }

    pub fn find(&self, binary_name: &str) -> Option<&TypeRecord> {
        self.id_of(binary_name).map(|id| &self.graph[id])
    }

    pub fn ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.graph.node_indices()
    }

    pub fn records(&self) -> impl Iterator<Item = &TypeRecord> {
        self.graph.node_weights()
    }

    pub fn is_resolved(&self, binary_name: &str) -> bool {
        self.find(binary_name).is_some_and(TypeRecord::is_resolved)
    }

    /// Records the verdict of the inclusion filter for a type.
    pub fn set_inclusion(&mut self, id: TypeId, included: bool, excluded: bool) {
        let record = &mut self.graph[id];
        record.explicitly_included |= included;
        record.explicitly_excluded |= excluded;
    }

    /// Marks a type as directly part of the API and closes over everything it uses.
    pub fn mark_api(&mut self, id: TypeId) {
        self.propagate(id, false);
    }

    /// Adds a use edge from `user` to `used`. Returns false if the same edge already existed.
    pub fn record_use(&mut self, user: &str, used: &str, site: UseSite) -> bool {
        let user_id = self.get_or_insert(user);
        let used_id = self.get_or_insert(used);

        if self
            .graph
            .edges_connecting(user_id, used_id)
            .any(|edge| *edge.weight() == site)
        {
            return false;
        }

        let moves_to_api = site.use_kind.moves_to_api();
        trace!(user, used, site = %site, "recording use");
        self.graph.add_edge(user_id, used_id, site);

        if moves_to_api && self.graph[user_id].api_type {
            self.propagate(used_id, true);
        }
        true
    }

    /// Merges a parsed class into its record. A class that was already
    /// committed keeps its first facts.
    pub fn commit_class(
        &mut self,
        facts: &ClassFacts,
        archive: &str,
        primary: bool,
        seed: bool,
    ) -> TypeId {
        let id = self.get_or_insert(&facts.binary_name);
        if self.graph[id].is_resolved() {
            trace!(class = %facts.binary_name, archive, "class already committed, keeping first");
            return id;
        }

        self.attach_owner_chain(id, facts);

        let access = facts.effective_access();
        let record = &mut self.graph[id];
        record.primary_api = primary;
        record.state = TypeState::Resolved(Box::new(CommittedType {
            archive: archive.to_string(),
            access,
            accessible: access.is_accessible(),
            fields: facts.fields.clone(),
            methods: facts.methods.clone(),
        }));

        if seed {
            self.propagate(id, false);
        } else if self.graph[id].api_type {
            // New outbound edges may have been added since it became API.
            let through_use = self.graph[id].api_through_use;
            self.propagate(id, through_use);
        }

        if let Some(owner) = self.graph[id].owner {
            let owner_record = &self.graph[owner];
            if owner_record.api_type && owner_record.primary_api && self.graph[id].is_accessible() {
                self.propagate(id, false);
            }
        }

        id
    }

    fn attach_owner_chain(&mut self, id: TypeId, facts: &ClassFacts) {
        let hierarchy = facts.hierarchy();
        let chain = hierarchy.resolve();

        match hierarchy.root_owner() {
            Some(root) if !chain.is_empty() => {
                let mut owner = self.get_or_insert(&root);
                for link in &chain {
                    let link_id = self.get_or_insert(&link.binary_name);
                    let record = &mut self.graph[link_id];
                    if !record.is_resolved() || link_id == id {
                        record.canonical_name = link.canonical_name.clone();
                    }
                    if record.owner.is_none() {
                        self.set_owner(link_id, owner);
                    }
                    owner = link_id;
                }
            }
            _ if facts.is_inner() => {
                // Anonymous or local, or nested inside one of those.
                let declared_owner = facts
                    .self_entry()
                    .and_then(|entry| entry.outer_class.as_deref())
                    .map(internal_to_binary)
                    .or_else(|| facts.enclosing_class.clone());
                if let Some(owner_name) = declared_owner {
                    let owner = self.get_or_insert(&owner_name);
                    if self.graph[id].owner.is_none() && owner != id {
                        self.set_owner(id, owner);
                    }
                }
            }
            _ => {}
        }
    }

    fn set_owner(&mut self, child: TypeId, owner: TypeId) {
        self.graph[child].owner = Some(owner);
        let child_name = self.graph[child].binary_name.clone();
        let owner_name = self.graph[owner].binary_name.clone();
        self.record_use(&child_name, &owner_name, UseSite::containment(&child_name));
        self.refresh_depths(child);
    }

    /// Re-derives nesting depth for `start` and everything it transitively contains.
    fn refresh_depths(&mut self, start: TypeId) {
        let mut queue = VecDeque::from([start]);
        let mut visited = HashSet::new();
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let depth = match self.graph[id].owner {
                Some(owner) => self.graph[owner].nesting_depth + 1,
                None => 0,
            };
            self.graph[id].nesting_depth = depth;
            queue.extend(self.contained(id));
        }
    }

    /// Types whose owner is `id`.
    pub fn contained(&self, id: TypeId) -> Vec<TypeId> {
        let mut children: Vec<TypeId> = self
            .graph
            .edges_directed(id, Direction::Incoming)
            .filter(|edge| edge.weight().use_kind == UseKind::Contains)
            .map(|edge| edge.source())
            .filter(|child| self.graph[*child].owner == Some(id))
            .collect();
        children.sort();
        children.dedup();
        children
    }

    fn flag_api(&mut self, id: TypeId, through_use: bool) -> bool {
        let record = &mut self.graph[id];
        let newly = !record.api_type;
        record.api_type = true;
        record.api_through_use |= through_use;
        if newly {
            trace!(class = %record.binary_name, through_use, "type joins the API");
        }
        newly
    }

    /// Worklist closure from `start`. Types that were already API had their
    /// own closure computed when they joined, so the walk stops there.
    fn propagate(&mut self, start: TypeId, through_use: bool) {
        self.flag_api(start, through_use);

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            for (next, via_use) in self.api_successors(id) {
                let newly = self.flag_api(next, via_use);
                if newly && visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }

    fn api_successors(&self, id: TypeId) -> Vec<(TypeId, bool)> {
        let mut successors: Vec<(TypeId, bool)> = self
            .graph
            .edges_directed(id, Direction::Outgoing)
            .filter(|edge| edge.weight().use_kind.moves_to_api())
            .map(|edge| (edge.target(), true))
            .collect();

        if self.graph[id].primary_api {
            successors.extend(
                self.contained(id)
                    .into_iter()
                    .filter(|child| self.graph[*child].is_accessible())
                    .map(|child| (child, false)),
            );
        }
        successors
    }

    /// True while any referenced type has not been seen in an archive.
    pub fn has_unresolved(&self) -> bool {
        self.records().any(|record| !record.is_resolved())
    }

    /// Number of referenced types still waiting for their class file.
    pub fn pending_count(&self) -> usize {
        self.records().filter(|record| !record.is_resolved()).count()
    }

    /// Binary names of API types whose class file has not been seen, sorted.
    pub fn unresolved(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .graph
            .node_weights()
            .filter(|record| record.api_type && !record.is_resolved())
            .map(|record| record.binary_name.clone())
            .collect();
        names.sort();
        names
    }

    /// Every recorded use of `id`, sorted.
    pub fn use_sites(&self, id: TypeId) -> Vec<UseSite> {
        let mut sites: Vec<UseSite> = self
            .graph
            .edges_directed(id, Direction::Incoming)
            .map(|edge| edge.weight().clone())
            .collect();
        sites.sort();
        sites
    }

    /// Types used by `id`, grouped by how they are used.
    pub fn used_types(&self, id: TypeId) -> BTreeMap<UseKind, Vec<&str>> {
        let mut grouped: BTreeMap<UseKind, Vec<&str>> = BTreeMap::new();
        for edge in self.graph.edges_directed(id, Direction::Outgoing) {
            grouped
                .entry(edge.weight().use_kind)
                .or_default()
                .push(self.graph[edge.target()].binary_name.as_str());
        }
        for names in grouped.values_mut() {
            names.sort_unstable();
            names.dedup();
        }
        grouped
    }
}
