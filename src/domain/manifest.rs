//! Package manifest building
//!
//! Turns the catalog plus a deployment plan into package manifests: one
//! listing every component, and one per deployment group listing only that
//! group's members. A manifest is a small element tree rendered as text:
//!
//! ```text
//! <Package xmlns="http://soap.sforce.com/2006/04/metadata">
//!     <types>
//!         <members>OrderService</members>
//!         <name>ApexClass</name>
//!     </types>
//!     <version>60.0</version>
//! </Package>
//! ```

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use super::catalog::{Catalog, CatalogMember, ComponentType};
use super::component::{name_order, TestNaming};
use super::id::ComponentId;

/// Namespace of the package manifest schema
pub const DEFAULT_NAMESPACE: &str = "http://soap.sforce.com/2006/04/metadata";

/// Member name meaning "every component of this type"
pub const WILDCARD: &str = "*";

/// An element of a manifest document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ManifestNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<ManifestNode>,
    pub value: Option<String>,
}

impl ManifestNode {
    /// Creates an element with no content
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Creates an element holding a text value
    pub fn text(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn push(&mut self, child: ManifestNode) {
        self.children.push(child);
    }

    /// Renders the node and its children, one element per line
    pub fn render(&self, indent_unit: &str) -> String {
        let mut lines = Vec::new();
        self.render_into(&mut lines, "", indent_unit);
        lines.join("\n")
    }

    fn render_into(&self, lines: &mut Vec<String>, indent: &str, indent_unit: &str) {
        let mut open = format!("<{}", self.tag);
        for (key, value) in &self.attributes {
            open.push_str(&format!(" {}=\"{}\"", key, escape(value)));
        }
        open.push('>');
        let close = format!("</{}>", self.tag);

        if self.children.is_empty() {
            let value = self.value.as_deref().map(escape).unwrap_or_default();
            lines.push(format!("{}{}{}{}", indent, open, value, close));
            return;
        }

        lines.push(format!("{}{}", indent, open));
        let nested = format!("{}{}", indent, indent_unit);
        for child in &self.children {
            child.render_into(lines, &nested, indent_unit);
        }
        lines.push(format!("{}{}", indent, close));
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Which components a manifest covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "scope", content = "stage", rename_all = "snake_case")]
pub enum ManifestScope {
    /// Every catalog member; empty types become wildcards
    All,
    /// Members that were not placed in any group
    Unassigned,
    /// Members placed in the given group
    Stage(usize),
}

impl ManifestScope {
    /// Maps a raw group index to a scope; negative means unassigned
    pub fn from_group_index(index: i64) -> Self {
        usize::try_from(index)
            .map(ManifestScope::Stage)
            .unwrap_or(ManifestScope::Unassigned)
    }

    /// Returns the group index, `-1` for unassigned, `None` for all
    pub fn group_index(&self) -> Option<i64> {
        match self {
            ManifestScope::All => None,
            ManifestScope::Unassigned => Some(-1),
            ManifestScope::Stage(stage) => Some(*stage as i64),
        }
    }

    /// File name for this scope: `{prefix}-all.xml` or `{prefix}-group-{n}.xml`
    ///
    /// Groups are numbered from 1; the unassigned manifest is group 0.
    pub fn file_name(&self, prefix: &str) -> String {
        match self {
            ManifestScope::All => format!("{}-all.xml", prefix),
            ManifestScope::Unassigned => format!("{}-group-0.xml", prefix),
            ManifestScope::Stage(stage) => format!("{}-group-{}.xml", prefix, stage + 1),
        }
    }

    fn includes(&self, stage: Option<usize>) -> bool {
        match self {
            ManifestScope::All => true,
            ManifestScope::Unassigned => stage.is_none(),
            ManifestScope::Stage(wanted) => stage == Some(*wanted),
        }
    }
}

impl fmt::Display for ManifestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestScope::All => write!(f, "all"),
            ManifestScope::Unassigned => write!(f, "unassigned"),
            ManifestScope::Stage(stage) => write!(f, "group {}", stage + 1),
        }
    }
}

/// A catalog problem met while building a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManifestWarning {
    /// A type lists a member key the catalog has no member for
    MissingMember { type_name: String, key: String },
    /// A type lists a member key that belongs to another type
    ForeignMember {
        type_name: String,
        key: String,
        member_type: String,
    },
}

impl fmt::Display for ManifestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestWarning::MissingMember { type_name, key } => {
                write!(f, "type {} lists unknown member key {}", type_name, key)
            }
            ManifestWarning::ForeignMember {
                type_name,
                key,
                member_type,
            } => write!(
                f,
                "type {} lists member key {} which belongs to {}",
                type_name, key, member_type
            ),
        }
    }
}

/// A rendered manifest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    pub scope: ManifestScope,
    /// Number of explicit members listed (wildcards excluded)
    pub member_count: usize,
    /// Distinct test names among the listed members
    pub test_names: Vec<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ManifestWarning>,
}

impl Manifest {
    /// blake3 digest of the rendered text, hex encoded
    pub fn digest(&self) -> String {
        blake3::hash(self.text.as_bytes()).to_hex().to_string()
    }
}

/// Rendering options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestOptions {
    pub namespace: String,
    pub indent: usize,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            indent: 4,
        }
    }
}

/// Builds manifests from a catalog and a stage assignment
pub struct ManifestBuilder<'a> {
    catalog: &'a Catalog,
    assignments: &'a HashMap<ComponentId, usize>,
    naming: &'a TestNaming,
    options: ManifestOptions,
}

impl<'a> ManifestBuilder<'a> {
    pub fn new(
        catalog: &'a Catalog,
        assignments: &'a HashMap<ComponentId, usize>,
        naming: &'a TestNaming,
    ) -> Self {
        Self {
            catalog,
            assignments,
            naming,
            options: ManifestOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ManifestOptions) -> Self {
        self.options = options;
        self
    }

    fn stage_of(&self, member: &CatalogMember) -> Option<usize> {
        member
            .id
            .as_ref()
            .and_then(|id| self.assignments.get(id).copied())
    }

    /// Collects a type's members within scope, sorted by name
    fn members_of(
        &self,
        component_type: &'a ComponentType,
        scope: ManifestScope,
        warnings: &mut Vec<ManifestWarning>,
    ) -> Vec<&'a CatalogMember> {
        let catalog: &'a Catalog = self.catalog;
        let mut members: Vec<&'a CatalogMember> = Vec::new();

        for key in &component_type.member_keys {
            let Some(member) = catalog.member(key) else {
                log::warn!("type {} lists unknown member key {}", component_type.name, key);
                warnings.push(ManifestWarning::MissingMember {
                    type_name: component_type.name.clone(),
                    key: key.clone(),
                });
                continue;
            };
            if member.type_name != component_type.name {
                log::warn!(
                    "type {} lists member key {} which belongs to {}",
                    component_type.name,
                    key,
                    member.type_name
                );
                warnings.push(ManifestWarning::ForeignMember {
                    type_name: component_type.name.clone(),
                    key: key.clone(),
                    member_type: member.type_name.clone(),
                });
                continue;
            }
            if scope.includes(self.stage_of(member)) {
                members.push(member);
            }
        }

        members.sort_by(|a, b| name_order(&a.name, &b.name));
        members
    }

    /// Builds and renders the manifest for one scope
    pub fn build(&self, scope: ManifestScope) -> Manifest {
        let mut root = ManifestNode::element("Package").with_attribute("xmlns", &self.options.namespace);
        let mut warnings = Vec::new();
        let mut test_names: Vec<String> = Vec::new();
        let mut member_count = 0;

        let catalog: &'a Catalog = self.catalog;
        let mut types: Vec<&'a ComponentType> = catalog.types().collect();
        types.sort_by(|a, b| name_order(&a.name, &b.name));

        for component_type in types {
            let members = self.members_of(component_type, scope, &mut warnings);

            if members.is_empty() {
                // Grouped manifests must never pull in a whole type
                if scope == ManifestScope::All {
                    let mut node = ManifestNode::element("types");
                    node.push(ManifestNode::text("members", WILDCARD));
                    node.push(ManifestNode::text("name", &component_type.name));
                    root.push(node);
                }
                continue;
            }

            let mut node = ManifestNode::element("types");
            for member in &members {
                if self.naming.is_test(&member.type_name, &member.name)
                    && !test_names.contains(&member.name)
                {
                    test_names.push(member.name.clone());
                }
                node.push(ManifestNode::text("members", &member.name));
            }
            node.push(ManifestNode::text("name", &component_type.name));
            member_count += members.len();
            root.push(node);
        }

        root.push(ManifestNode::text("version", self.catalog.version()));

        let indent_unit = " ".repeat(self.options.indent);
        let mut text = root.render(&indent_unit);
        text.push('\n');

        log::debug!("built {} manifest: {} members", scope, member_count);

        Manifest {
            scope,
            member_count,
            test_names,
            text,
            warnings,
        }
    }

    /// Builds the full manifest, the unassigned manifest and one per group
    pub fn build_all(&self, group_count: usize) -> Vec<Manifest> {
        let mut scopes = vec![ManifestScope::All, ManifestScope::Unassigned];
        scopes.extend((0..group_count).map(ManifestScope::Stage));
        scopes.into_iter().map(|scope| self.build(scope)).collect()
    }
}
