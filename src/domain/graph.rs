//! Dependency graph for components
//!
//! Built once from raw dependency edges. Uses petgraph for storage; an edge
//! runs from a dependency to its dependent, so "A depends on B" is stored
//! as `B -> A` and a component's in-degree is its outstanding dependency
//! count.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use super::component::{Component, Edge};
use super::id::ComponentId;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Component not found: {0}")]
    ComponentNotFound(ComponentId),

    #[error("Self-dependency not allowed: {0}")]
    SelfDependency(ComponentId),
}

/// A data problem found while building the graph
///
/// The offending edge is skipped and the build carries on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildWarning {
    /// Edge row without a component ID
    MissingComponentId { row: usize, name: String },
    /// Edge row without a referenced component ID
    MissingReferenceId { row: usize, id: ComponentId, ref_name: String },
}

impl std::fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildWarning::MissingComponentId { row, name } => {
                write!(f, "edge #{} has no component id (name: \"{}\")", row, name)
            }
            BuildWarning::MissingReferenceId { row, id, ref_name } => write!(
                f,
                "edge #{} from {} has no referenced component id (ref name: \"{}\")",
                row, id, ref_name
            ),
        }
    }
}

/// A broken direct cycle: `component` no longer depends on `dependency`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenCycle {
    pub component: ComponentId,
    pub dependency: ComponentId,
}

/// A dependency graph for components
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// The underlying directed graph
    graph: DiGraph<Component, ()>,

    /// Map from ComponentId to node index
    node_map: HashMap<ComponentId, NodeIndex>,

    /// Problems found in the edge list
    warnings: Vec<BuildWarning>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Builds a graph from raw dependency edges
    ///
    /// Components are registered the first time either side of an edge
    /// mentions them. Self-references are dropped silently, duplicate edges
    /// count once, and edges missing an ID are skipped with a warning.
    pub fn build<'a>(edges: impl IntoIterator<Item = &'a Edge>) -> Self {
        let mut graph = Self::new();

        for (row, edge) in edges.into_iter().enumerate() {
            let Some(id) = edge.id.clone() else {
                graph.warn(BuildWarning::MissingComponentId {
                    row,
                    name: edge.name.clone(),
                });
                continue;
            };
            let Some(ref_id) = edge.ref_id.clone() else {
                graph.warn(BuildWarning::MissingReferenceId {
                    row,
                    id,
                    ref_name: edge.ref_name.clone(),
                });
                continue;
            };

            graph.add_component(Component::new(id.clone(), &edge.name, &edge.component_type));
            graph.add_component(Component::new(ref_id.clone(), &edge.ref_name, &edge.ref_type));

            if id != ref_id {
                // Both endpoints were just registered, so this cannot fail
                let _ = graph.add_dependency(&id, &ref_id);
            }
        }

        log::debug!(
            "built dependency graph: {} components, {} edges, {} warnings",
            graph.len(),
            graph.edge_count(),
            graph.warnings.len()
        );

        graph
    }

    fn warn(&mut self, warning: BuildWarning) {
        log::warn!("skipping {}", warning);
        self.warnings.push(warning);
    }

    /// Adds a component if it is not already known
    ///
    /// The first registration wins; later sightings of the same ID keep the
    /// original name and type.
    pub fn add_component(&mut self, component: Component) -> NodeIndex {
        if let Some(idx) = self.node_map.get(&component.id) {
            return *idx;
        }
        let id = component.id.clone();
        let idx = self.graph.add_node(component);
        self.node_map.insert(id, idx);
        idx
    }

    /// Adds a dependency: `component` depends on `depends_on`
    ///
    /// Returns false if the dependency was already present.
    pub fn add_dependency(
        &mut self,
        component: &ComponentId,
        depends_on: &ComponentId,
    ) -> Result<bool, GraphError> {
        if component == depends_on {
            return Err(GraphError::SelfDependency(component.clone()));
        }

        let component_idx = self.require(component)?;
        let dep_idx = self.require(depends_on)?;

        if self.graph.find_edge(dep_idx, component_idx).is_some() {
            return Ok(false);
        }
        self.graph.add_edge(dep_idx, component_idx, ());
        Ok(true)
    }

    /// Removes a dependency edge
    pub fn remove_dependency(&mut self, component: &ComponentId, depends_on: &ComponentId) -> bool {
        let (Some(&component_idx), Some(&dep_idx)) =
            (self.node_map.get(component), self.node_map.get(depends_on))
        else {
            return false;
        };

        match self.graph.find_edge(dep_idx, component_idx) {
            Some(edge) => {
                self.graph.remove_edge(edge);
                true
            }
            None => false,
        }
    }

    fn require(&self, id: &ComponentId) -> Result<NodeIndex, GraphError> {
        self.node_map
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::ComponentNotFound(id.clone()))
    }

    /// Breaks every direct mutual dependency (A needs B, B needs A)
    ///
    /// Components are visited in registration order; the component visited
    /// first drops its dependency on the other, so the pair ends up ordered
    /// with the first-seen component deployed earlier. Longer cycles are
    /// left untouched.
    pub fn remove_direct_cycles(&mut self) -> Vec<BrokenCycle> {
        let mut broken = Vec::new();

        for idx in self.graph.node_indices().collect::<Vec<_>>() {
            let mutual: Vec<NodeIndex> = self
                .dependencies_at(idx)
                .into_iter()
                .filter(|&dep| self.graph.find_edge(idx, dep).is_some())
                .collect();

            for dep in mutual {
                if let Some(edge) = self.graph.find_edge(dep, idx) {
                    self.graph.remove_edge(edge);
                    broken.push(BrokenCycle {
                        component: self.graph[idx].id.clone(),
                        dependency: self.graph[dep].id.clone(),
                    });
                }
            }
        }

        if !broken.is_empty() {
            log::debug!("broke {} direct dependency cycles", broken.len());
        }
        broken
    }

    /// Returns the number of unresolved dependencies of a component
    pub fn in_degree(&self, id: &ComponentId) -> usize {
        self.node_map
            .get(id)
            .map(|&idx| self.in_degree_at(idx))
            .unwrap_or(0)
    }

    pub(crate) fn in_degree_at(&self, idx: NodeIndex) -> usize {
        self.graph.neighbors_directed(idx, Direction::Incoming).count()
    }

    /// Returns the direct dependencies of a component, in registration order
    pub fn dependencies(&self, id: &ComponentId) -> Vec<ComponentId> {
        self.node_map
            .get(id)
            .map(|&idx| self.ids(self.dependencies_at(idx)))
            .unwrap_or_default()
    }

    /// Returns the components that depend directly on a component
    pub fn dependents(&self, id: &ComponentId) -> Vec<ComponentId> {
        self.node_map
            .get(id)
            .map(|&idx| self.ids(self.dependents_at(idx)))
            .unwrap_or_default()
    }

    pub(crate) fn dependencies_at(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_neighbors(idx, Direction::Incoming)
    }

    pub(crate) fn dependents_at(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_neighbors(idx, Direction::Outgoing)
    }

    // petgraph yields neighbors newest-first; registration order is stable
    // and easier to read in diagnostics
    fn sorted_neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut out: Vec<_> = self.graph.neighbors_directed(idx, direction).collect();
        out.sort();
        out
    }

    fn ids(&self, indices: Vec<NodeIndex>) -> Vec<ComponentId> {
        indices.into_iter().map(|idx| self.graph[idx].id.clone()).collect()
    }

    pub(crate) fn node(&self, idx: NodeIndex) -> &Component {
        &self.graph[idx]
    }

    pub(crate) fn node_indices(&self) -> impl Iterator<Item = NodeIndex> {
        self.graph.node_indices()
    }

    pub(crate) fn index_of(&self, id: &ComponentId) -> Option<NodeIndex> {
        self.node_map.get(id).copied()
    }

    /// Returns a component by ID
    pub fn component(&self, id: &ComponentId) -> Option<&Component> {
        self.node_map.get(id).map(|&idx| &self.graph[idx])
    }

    /// Returns all components in registration order
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.graph.node_weights()
    }

    /// Returns warnings collected while building
    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    /// Returns true if the graph contains the component
    pub fn contains(&self, id: &ComponentId) -> bool {
        self.node_map.contains_key(id)
    }

    /// Returns the number of components in the graph
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    /// Returns the number of retained dependency edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
