//! Domain models for metastage
//!
//! Contains the resolution pipeline without any I/O concerns:
//! edges -> graph -> direct-cycle removal -> test pairing -> staging ->
//! manifests.

mod id;
mod component;
mod similarity;
mod graph;
mod affinity;
mod stage;
mod catalog;
mod manifest;
mod resolve;

pub use id::{ComponentId, IdError};
pub use component::{
    name_order, Component, Edge, TestNaming, DEFAULT_TEST_AFFIX_PATTERN,
    DEFAULT_TEST_BEARING_TYPE, DEFAULT_TEST_NAME_PATTERN,
};
pub use similarity::{similarity, MAX_SCORE};
pub use graph::{BrokenCycle, BuildWarning, DependencyGraph, GraphError};
pub use affinity::{
    Affinity, PairingTable, TestAffinityMatcher, TestPairing, DEFAULT_SIMILARITY_THRESHOLD,
};
pub use stage::{
    DeploymentStager, ResidualComponent, ResidualPolicy, StageError, StagePlan, UnmetDependency,
};
pub use catalog::{Catalog, CatalogError, CatalogMember, ComponentType};
pub use manifest::{
    Manifest, ManifestBuilder, ManifestNode, ManifestOptions, ManifestScope, ManifestWarning,
    DEFAULT_NAMESPACE, WILDCARD,
};
pub use resolve::{Resolution, Resolver};
