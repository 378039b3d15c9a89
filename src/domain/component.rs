//! Component and edge models
//!
//! A component is a named, typed artifact taking part in dependency edges.
//! Edges are the raw "X depends on Y" facts reported by the dependency
//! source; the graph is built from them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::id::ComponentId;

/// Orders names case-insensitively, falling back to ordinal order so that
/// names differing only in case still sort reproducibly
pub fn name_order(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    folded.then_with(|| a.cmp(b))
}

/// Default type whose members may be tests or subjects
pub const DEFAULT_TEST_BEARING_TYPE: &str = "ApexClass";

/// Default pattern identifying a test component by name
pub const DEFAULT_TEST_NAME_PATTERN: &str = "(?i)test$";

/// Default pattern stripped from a test name to guess its subject's name
pub const DEFAULT_TEST_AFFIX_PATTERN: &str = "(?i)_?(unit)?test$";

/// A uniquely identified component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: String,
}

impl Component {
    pub fn new(id: ComponentId, name: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            component_type: component_type.into(),
        }
    }
}

/// A dependency fact: `id` depends on `ref_id`
///
/// IDs are optional because the dependency source occasionally reports
/// rows without one; such edges are skipped while building the graph.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Edge {
    pub id: Option<ComponentId>,
    pub name: String,
    pub component_type: String,
    pub ref_id: Option<ComponentId>,
    pub ref_name: String,
    pub ref_type: String,
}

impl Edge {
    /// Convenience constructor for a well-formed edge
    pub fn new(
        id: ComponentId,
        name: impl Into<String>,
        component_type: impl Into<String>,
        ref_id: ComponentId,
        ref_name: impl Into<String>,
        ref_type: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            component_type: component_type.into(),
            ref_id: Some(ref_id),
            ref_name: ref_name.into(),
            ref_type: ref_type.into(),
        }
    }

    /// Returns true if the edge points back at its own component
    pub fn is_self_reference(&self) -> bool {
        matches!((&self.id, &self.ref_id), (Some(a), Some(b)) if a == b)
    }
}

/// Rules deciding which components are tests and which are subjects
#[derive(Debug, Clone)]
pub struct TestNaming {
    test_bearing_types: Vec<String>,
    test_name: Regex,
    test_affix: Regex,
}

impl TestNaming {
    pub fn new(
        test_bearing_types: Vec<String>,
        test_name_pattern: &str,
        test_affix_pattern: &str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            test_bearing_types,
            test_name: Regex::new(test_name_pattern)?,
            test_affix: Regex::new(test_affix_pattern)?,
        })
    }

    /// Returns true if members of `component_type` can be tests or subjects
    pub fn is_test_bearing(&self, component_type: &str) -> bool {
        self.test_bearing_types.iter().any(|t| t == component_type)
    }

    /// Returns true if a component of this type and name is a test artifact
    pub fn is_test(&self, component_type: &str, name: &str) -> bool {
        self.is_test_bearing(component_type) && self.test_name.is_match(name)
    }

    /// Returns true if a component of this type and name can be validated by a test
    pub fn is_subject(&self, component_type: &str, name: &str) -> bool {
        self.is_test_bearing(component_type) && !self.test_name.is_match(name)
    }

    pub fn is_test_component(&self, component: &Component) -> bool {
        self.is_test(&component.component_type, &component.name)
    }

    pub fn is_subject_component(&self, component: &Component) -> bool {
        self.is_subject(&component.component_type, &component.name)
    }

    /// Strips the test affix from a test name to get the likely subject name
    pub fn subject_name<'a>(&self, test_name: &'a str) -> std::borrow::Cow<'a, str> {
        self.test_affix.replace(test_name, "")
    }
}

impl Default for TestNaming {
    fn default() -> Self {
        Self {
            test_bearing_types: vec![DEFAULT_TEST_BEARING_TYPE.to_string()],
            test_name: Regex::new(DEFAULT_TEST_NAME_PATTERN).expect("default test name pattern"),
            test_affix: Regex::new(DEFAULT_TEST_AFFIX_PATTERN).expect("default test affix pattern"),
        }
    }
}
