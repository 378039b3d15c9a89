//! metastage - deployment staging for platform metadata
//!
//! Takes raw "depends-on" facts between metadata components, orders them
//! into deployment groups (breaking direct cycles and keeping tests with the
//! classes they cover) and writes a package manifest per group.

pub mod domain;
pub mod storage;
pub mod cli;

pub use domain::{
    Catalog, Component, ComponentId, DependencyGraph, Edge, ManifestBuilder, ManifestScope,
    Resolution, Resolver, StagePlan,
};
