//! Loading pipeline inputs
//!
//! Edge lists and catalogs arrive as JSON dumps from the metadata service.
//! This module maps their field names onto the typed domain records; the
//! domain never sees the raw shapes.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::{Catalog, CatalogMember, ComponentId, ComponentType, Edge};

/// One row of the dependency query result
///
/// Accepts the service's field names and snake_case equivalents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdgeRecord {
    #[serde(rename = "MetadataComponentId", alias = "component_id", default)]
    pub component_id: Option<String>,

    #[serde(rename = "MetadataComponentName", alias = "component_name", default)]
    pub component_name: Option<String>,

    #[serde(rename = "MetadataComponentType", alias = "component_type", default)]
    pub component_type: Option<String>,

    #[serde(rename = "RefMetadataComponentId", alias = "ref_component_id", default)]
    pub ref_component_id: Option<String>,

    #[serde(rename = "RefMetadataComponentName", alias = "ref_component_name", default)]
    pub ref_component_name: Option<String>,

    #[serde(rename = "RefMetadataComponentType", alias = "ref_component_type", default)]
    pub ref_component_type: Option<String>,
}

impl From<EdgeRecord> for Edge {
    fn from(record: EdgeRecord) -> Self {
        // Blank IDs are treated as missing
        let id = |raw: Option<String>| raw.and_then(|s| ComponentId::new(s).ok());

        Edge {
            id: id(record.component_id),
            name: record.component_name.unwrap_or_default(),
            component_type: record.component_type.unwrap_or_default(),
            ref_id: id(record.ref_component_id),
            ref_name: record.ref_component_name.unwrap_or_default(),
            ref_type: record.ref_component_type.unwrap_or_default(),
        }
    }
}

/// Parses an edge list from JSON text
pub fn parse_edges(json: &str) -> Result<Vec<Edge>> {
    let records: Vec<EdgeRecord> =
        serde_json::from_str(json).context("Failed to parse dependency edges")?;
    Ok(records.into_iter().map(Edge::from).collect())
}

/// Reads an edge list from a JSON file
pub fn load_edges(path: &Path) -> Result<Vec<Edge>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read edges: {}", path.display()))?;
    parse_edges(&content).with_context(|| format!("Invalid edges file: {}", path.display()))
}

/// Catalog file as written by the metadata-retrieval side
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFile {
    pub version: String,
    #[serde(default)]
    pub types: Vec<ComponentType>,
    #[serde(default)]
    pub members: Vec<CatalogMember>,
}

impl CatalogFile {
    /// Builds a catalog, skipping members of undeclared types
    ///
    /// Returns the catalog and a message per skipped member.
    pub fn into_catalog(self) -> (Catalog, Vec<String>) {
        let mut catalog = Catalog::new(self.version);
        let mut skipped = Vec::new();

        for component_type in self.types {
            catalog.declare_type(component_type);
        }

        for member in self.members {
            if let Err(e) = catalog.add_member(member) {
                log::warn!("skipping catalog member: {}", e);
                skipped.push(e.to_string());
            }
        }

        (catalog, skipped)
    }
}

/// Parses a catalog from JSON text
pub fn parse_catalog(json: &str) -> Result<(Catalog, Vec<String>)> {
    let file: CatalogFile = serde_json::from_str(json).context("Failed to parse catalog")?;
    Ok(file.into_catalog())
}

/// Reads a catalog from a JSON file
pub fn load_catalog(path: &Path) -> Result<(Catalog, Vec<String>)> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
    parse_catalog(&content).with_context(|| format!("Invalid catalog file: {}", path.display()))
}
