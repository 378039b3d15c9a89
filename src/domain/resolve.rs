//! End-to-end resolution run
//!
//! Chains the pipeline: build the graph, break direct cycles, pair tests,
//! stage. Each run owns the graph it builds; nothing is shared between runs.

use super::affinity::{PairingTable, TestAffinityMatcher};
use super::component::{Edge, TestNaming};
use super::graph::{BrokenCycle, DependencyGraph};
use super::stage::{DeploymentStager, StagePlan};

/// Everything produced by one resolution run
#[derive(Debug)]
pub struct Resolution {
    pub graph: DependencyGraph,
    pub broken_cycles: Vec<BrokenCycle>,
    pub pairings: PairingTable,
    pub plan: StagePlan,
}

/// Runs the resolution pipeline over an edge snapshot
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    matcher: TestAffinityMatcher,
}

impl Resolver {
    pub fn new(matcher: TestAffinityMatcher) -> Self {
        Self { matcher }
    }

    pub fn naming(&self) -> &TestNaming {
        self.matcher.naming()
    }

    pub fn resolve<'a>(&self, edges: impl IntoIterator<Item = &'a Edge>) -> Resolution {
        let mut graph = DependencyGraph::build(edges);
        let broken_cycles = graph.remove_direct_cycles();
        let pairings = self.matcher.pair(&graph);
        let plan = DeploymentStager::new(&graph, &pairings, self.matcher.naming()).stage();

        Resolution {
            graph,
            broken_cycles,
            pairings,
            plan,
        }
    }
}
