//! Deployment staging
//!
//! Layers the dependency graph into deployment groups with a
//! level-synchronized Kahn's algorithm: every component in group `n` only
//! depends on components in groups `0..n`. Tests are pulled into their
//! subject's group, and anything caught in a cycle that direct-cycle
//! removal could not break is reported rather than placed.

use petgraph::graph::NodeIndex;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::affinity::PairingTable;
use super::component::{name_order, Component, TestNaming};
use super::graph::DependencyGraph;
use super::id::ComponentId;

#[derive(Debug, Error, PartialEq)]
pub enum StageError {
    #[error("{count} components are caught in dependency cycles: {}", .ids.join(", "))]
    UnresolvedCycles { count: usize, ids: Vec<String> },

    #[error("Invalid residual policy '{0}': expected report, fail or force")]
    InvalidPolicy(String),
}

/// What to do with components left over after staging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualPolicy {
    /// Report them and carry on
    #[default]
    Report,
    /// Treat them as a fatal error
    Fail,
    /// Place them all in one final catch-all group
    Force,
}

impl fmt::Display for ResidualPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResidualPolicy::Report => write!(f, "report"),
            ResidualPolicy::Fail => write!(f, "fail"),
            ResidualPolicy::Force => write!(f, "force"),
        }
    }
}

impl FromStr for ResidualPolicy {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "report" => Ok(ResidualPolicy::Report),
            "fail" => Ok(ResidualPolicy::Fail),
            "force" => Ok(ResidualPolicy::Force),
            _ => Err(StageError::InvalidPolicy(s.to_string())),
        }
    }
}

/// A dependency a residual component is still waiting on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmetDependency {
    pub id: ComponentId,
    pub name: String,
}

/// A component that could not be placed in any group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResidualComponent {
    pub id: ComponentId,
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: String,
    /// Number of dependencies still unplaced
    pub remaining_in_degree: usize,
    pub unmet: Vec<UnmetDependency>,
    /// Set for a test held back for a subject that was never placed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awaiting_subject: Option<ComponentId>,
}

/// Result of staging: ordered deployment groups plus diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StagePlan {
    pub groups: Vec<Vec<Component>>,
    /// Subjects that had no matched test when placed
    pub untested: Vec<ComponentId>,
    /// Components caught in cycles longer than two
    pub residual: Vec<ResidualComponent>,
    /// Index of the catch-all group added under [`ResidualPolicy::Force`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced_group: Option<usize>,
}

impl StagePlan {
    /// Applies a residual policy to the plan
    pub fn apply_policy(mut self, policy: ResidualPolicy) -> Result<Self, StageError> {
        if self.residual.is_empty() {
            return Ok(self);
        }

        match policy {
            ResidualPolicy::Report => Ok(self),
            ResidualPolicy::Fail => Err(StageError::UnresolvedCycles {
                count: self.residual.len(),
                ids: self.residual.iter().map(|r| r.id.to_string()).collect(),
            }),
            ResidualPolicy::Force => {
                if self.forced_group.is_none() {
                    let mut group: Vec<Component> = self
                        .residual
                        .iter()
                        .map(|r| Component::new(r.id.clone(), &r.name, &r.component_type))
                        .collect();
                    sort_group(&mut group);
                    log::warn!("forcing {} cyclic components into a final group", group.len());
                    self.groups.push(group);
                    self.forced_group = Some(self.groups.len() - 1);
                }
                Ok(self)
            }
        }
    }

    /// Returns the group index a component was placed in
    pub fn stage_of(&self, id: &ComponentId) -> Option<usize> {
        self.groups
            .iter()
            .position(|group| group.iter().any(|c| &c.id == id))
    }

    /// Returns the group index of every placed component
    pub fn assignments(&self) -> HashMap<ComponentId, usize> {
        self.groups
            .iter()
            .enumerate()
            .flat_map(|(stage, group)| group.iter().map(move |c| (c.id.clone(), stage)))
            .collect()
    }

    pub fn is_untested(&self, id: &ComponentId) -> bool {
        self.untested.contains(id)
    }

    /// Returns the number of components placed in groups
    pub fn placed_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    pub fn has_residual(&self) -> bool {
        !self.residual.is_empty()
    }
}

fn sort_group(group: &mut [Component]) {
    group.sort_by(|a, b| {
        name_order(&a.component_type, &b.component_type)
            .then_with(|| name_order(&a.name, &b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Assigns every component of a graph to a deployment group
pub struct DeploymentStager<'a> {
    graph: &'a DependencyGraph,
    pairings: &'a PairingTable,
    naming: &'a TestNaming,
}

/// Mutable bookkeeping for one staging run
struct StageState {
    in_degree: HashMap<NodeIndex, usize>,
    placed: HashSet<NodeIndex>,
    /// subject -> paired test not yet placed
    pending_tests: HashMap<NodeIndex, NodeIndex>,
    /// tests held back until their subject is placed
    held: HashMap<NodeIndex, NodeIndex>,
    queue: VecDeque<NodeIndex>,
}

impl<'a> DeploymentStager<'a> {
    pub fn new(graph: &'a DependencyGraph, pairings: &'a PairingTable, naming: &'a TestNaming) -> Self {
        Self {
            graph,
            pairings,
            naming,
        }
    }

    fn initial_state(&self) -> StageState {
        let mut state = StageState {
            in_degree: HashMap::new(),
            placed: HashSet::new(),
            pending_tests: HashMap::new(),
            held: HashMap::new(),
            queue: VecDeque::new(),
        };

        for idx in self.graph.node_indices() {
            let degree = self.graph.in_degree_at(idx);
            state.in_degree.insert(idx, degree);
            if degree == 0 {
                state.queue.push_back(idx);
            }

            let component = self.graph.node(idx);
            if let Some(test_id) = self.pairings.test_of(&component.id) {
                if let Some(test_idx) = self.graph.index_of(test_id) {
                    state.pending_tests.insert(idx, test_idx);
                    state.held.insert(test_idx, idx);
                }
            }
        }

        state
    }

    /// Runs the staging
    pub fn stage(&self) -> StagePlan {
        let mut state = self.initial_state();
        let mut plan = StagePlan::default();

        while !state.queue.is_empty() {
            // Only nodes queued before this level started belong to it
            let level_size = state.queue.len();
            let mut level: Vec<NodeIndex> = Vec::new();

            for _ in 0..level_size {
                let Some(idx) = state.queue.pop_front() else {
                    break;
                };
                if state.placed.contains(&idx) || state.held.contains_key(&idx) {
                    continue;
                }

                let mut placed_now = vec![idx];
                let component = self.graph.node(idx);

                if self.naming.is_subject_component(component) {
                    match state.pending_tests.remove(&idx) {
                        Some(test_idx) => {
                            state.held.remove(&test_idx);
                            if !state.placed.contains(&test_idx) {
                                placed_now.push(test_idx);
                            }
                        }
                        None => plan.untested.push(component.id.clone()),
                    }
                }

                for &node in &placed_now {
                    state.placed.insert(node);
                    state.in_degree.insert(node, 0);
                }
                for &node in &placed_now {
                    self.release_dependents(&mut state, node);
                }
                level.extend(placed_now);
            }

            if level.is_empty() {
                continue;
            }
            let mut group: Vec<Component> =
                level.into_iter().map(|idx| self.graph.node(idx).clone()).collect();
            sort_group(&mut group);
            plan.groups.push(group);
        }

        plan.residual = self.residual(&state);
        if !plan.residual.is_empty() {
            log::warn!(
                "{} components could not be staged due to dependency cycles",
                plan.residual.len()
            );
        }
        log::debug!(
            "staged {} components into {} groups ({} untested)",
            plan.placed_count(),
            plan.groups.len(),
            plan.untested.len()
        );

        plan
    }

    /// Decrements unplaced dependents of a freshly placed node
    fn release_dependents(&self, state: &mut StageState, node: NodeIndex) {
        for dependent in self.graph.dependents_at(node) {
            if state.placed.contains(&dependent) {
                continue;
            }
            if let Some(degree) = state.in_degree.get_mut(&dependent) {
                if *degree > 0 {
                    *degree -= 1;
                    if *degree == 0 {
                        state.queue.push_back(dependent);
                    }
                }
            }
        }
    }

    fn residual(&self, state: &StageState) -> Vec<ResidualComponent> {
        self.graph
            .node_indices()
            .filter(|idx| !state.placed.contains(idx))
            .map(|idx| {
                let component = self.graph.node(idx);
                let unmet: Vec<UnmetDependency> = self
                    .graph
                    .dependencies_at(idx)
                    .into_iter()
                    .filter(|dep| !state.placed.contains(dep))
                    .map(|dep| {
                        let dep = self.graph.node(dep);
                        UnmetDependency {
                            id: dep.id.clone(),
                            name: dep.name.clone(),
                        }
                    })
                    .collect();

                ResidualComponent {
                    id: component.id.clone(),
                    name: component.name.clone(),
                    component_type: component.component_type.clone(),
                    remaining_in_degree: state.in_degree.get(&idx).copied().unwrap_or(0),
                    unmet,
                    awaiting_subject: state
                        .held
                        .get(&idx)
                        .map(|&subject| self.graph.node(subject).id.clone()),
                }
            })
            .collect()
    }
}
