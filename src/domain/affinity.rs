//! Test affinity matching
//!
//! Pairs each test component with the production component it most likely
//! validates, so the two can ship in the same deployment stage. Pairing is
//! purely by name: the test affix is stripped from the test's name and the
//! result is scored against every same-typed subject.

use serde::Serialize;
use std::collections::HashMap;

use super::component::TestNaming;
use super::graph::DependencyGraph;
use super::id::ComponentId;
use super::similarity::similarity;

/// Default minimum similarity; a match must score strictly above it
pub const DEFAULT_SIMILARITY_THRESHOLD: u8 = 50;

/// Matching outcome for a single component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Affinity {
    /// Not a test, or never looked at
    Unevaluated,
    /// A test with no subject above the threshold
    Unmatched,
    /// A test paired with this subject
    Matched(ComponentId),
}

/// A test/subject pairing with its similarity score
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestPairing {
    pub test: ComponentId,
    pub subject: ComponentId,
    pub score: u8,
}

/// Bidirectional test/subject pairings
///
/// `subject_of(test_of(s)) == s` holds for every paired subject `s`.
#[derive(Debug, Clone, Default)]
pub struct PairingTable {
    /// subject -> test
    test_of: HashMap<ComponentId, ComponentId>,
    /// test -> subject
    subject_of: HashMap<ComponentId, ComponentId>,
    /// subject -> score of its current pairing
    scores: HashMap<ComponentId, u8>,
    /// Every test that went through matching, in evaluation order
    evaluated: Vec<ComponentId>,
}

impl PairingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pairing, replacing any weaker pairing of the same subject
    ///
    /// Returns false (and records nothing) if the subject already has a test
    /// scoring at least as high.
    pub fn pair(&mut self, test: ComponentId, subject: ComponentId, score: u8) -> bool {
        if let Some(&existing) = self.scores.get(&subject) {
            if existing >= score {
                return false;
            }
        }

        if let Some(displaced) = self.test_of.insert(subject.clone(), test.clone()) {
            log::debug!("test {} displaced from subject {} by {}", displaced, subject, test);
            self.subject_of.remove(&displaced);
        }
        if let Some(previous) = self.subject_of.insert(test.clone(), subject.clone()) {
            self.test_of.remove(&previous);
            self.scores.remove(&previous);
        }
        self.scores.insert(subject, score);
        true
    }

    fn mark_evaluated(&mut self, test: ComponentId) {
        if !self.evaluated.contains(&test) {
            self.evaluated.push(test);
        }
    }

    /// Returns the matching outcome for a component
    pub fn affinity(&self, id: &ComponentId) -> Affinity {
        match self.subject_of.get(id) {
            Some(subject) => Affinity::Matched(subject.clone()),
            None if self.evaluated.contains(id) => Affinity::Unmatched,
            None => Affinity::Unevaluated,
        }
    }

    /// Returns the test paired with a subject
    pub fn test_of(&self, subject: &ComponentId) -> Option<&ComponentId> {
        self.test_of.get(subject)
    }

    /// Returns the subject paired with a test
    pub fn subject_of(&self, test: &ComponentId) -> Option<&ComponentId> {
        self.subject_of.get(test)
    }

    /// Returns all pairings, in test evaluation order
    pub fn pairings(&self) -> Vec<TestPairing> {
        self.evaluated
            .iter()
            .filter_map(|test| {
                let subject = self.subject_of.get(test)?;
                Some(TestPairing {
                    test: test.clone(),
                    subject: subject.clone(),
                    score: self.scores.get(subject).copied().unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Returns tests that found no subject, in evaluation order
    pub fn unmatched_tests(&self) -> Vec<ComponentId> {
        self.evaluated
            .iter()
            .filter(|test| !self.subject_of.contains_key(*test))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.subject_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subject_of.is_empty()
    }
}

/// Pairs test components with their subjects by name similarity
#[derive(Debug, Clone)]
pub struct TestAffinityMatcher {
    naming: TestNaming,
    threshold: u8,
}

impl TestAffinityMatcher {
    pub fn new(naming: TestNaming, threshold: u8) -> Self {
        Self { naming, threshold }
    }

    pub fn naming(&self) -> &TestNaming {
        &self.naming
    }

    /// Builds the pairing table for every test component in the graph
    ///
    /// Each test takes its highest-scoring subject; on equal scores the
    /// subject registered first wins. When two tests pick the same subject
    /// the better score keeps it (first test on a tie) and the other test
    /// stays unmatched.
    pub fn pair(&self, graph: &DependencyGraph) -> PairingTable {
        let subjects: Vec<_> = graph
            .components()
            .filter(|c| self.naming.is_subject_component(c))
            .collect();

        let mut table = PairingTable::new();

        for test in graph.components().filter(|c| self.naming.is_test_component(c)) {
            table.mark_evaluated(test.id.clone());
            let candidate = self.naming.subject_name(&test.name);

            let mut best: Option<(&ComponentId, u8)> = None;
            for subject in subjects
                .iter()
                .filter(|s| s.component_type == test.component_type)
            {
                let score = similarity(&candidate, &subject.name);
                if score <= self.threshold {
                    continue;
                }
                if best.map_or(true, |(_, top)| score > top) {
                    best = Some((&subject.id, score));
                }
            }

            match best {
                Some((subject, score)) => {
                    if !table.pair(test.id.clone(), subject.clone(), score) {
                        log::debug!(
                            "test {} lost subject {} to a better-scoring test",
                            test.name,
                            subject
                        );
                    }
                }
                None => log::debug!("no subject found for test {}", test.name),
            }
        }

        log::debug!(
            "paired {} tests, {} unmatched",
            table.len(),
            table.unmatched_tests().len()
        );
        table
    }
}

impl Default for TestAffinityMatcher {
    fn default() -> Self {
        Self::new(TestNaming::default(), DEFAULT_SIMILARITY_THRESHOLD)
    }
}
