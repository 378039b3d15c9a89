//! Component type catalog
//!
//! The catalog is the registry of metadata types known to the target org,
//! together with the members discovered for each type. It is supplied by
//! the metadata-retrieval side and read by the manifest builder.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use super::id::ComponentId;

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("Unknown component type '{type_name}' for member '{member}'")]
    UnknownType { type_name: String, member: String },

    #[error("Member key '{key}' of '{member}' ({type_name}) is already held by a {existing_type} member")]
    DuplicateKey {
        key: String,
        member: String,
        type_name: String,
        existing_type: String,
    },
}

/// A metadata type and its structural details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ComponentType {
    pub name: String,
    pub parent_type: Option<String>,
    pub suffix: Option<String>,
    pub directory_name: Option<String>,
    pub in_folder: bool,
    pub has_meta_file: bool,
    pub child_type_names: Vec<String>,
    /// Keys of the members discovered for this type
    pub member_keys: Vec<String>,
}

impl ComponentType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A child type implied by its parent's child type list
    fn implied_child(name: &str, parent: &str) -> Self {
        Self {
            name: name.to_string(),
            parent_type: Some(parent.to_string()),
            ..Self::default()
        }
    }

    /// Returns true if this entry was only implied by a parent
    pub fn is_child(&self) -> bool {
        self.parent_type.is_some()
    }
}

/// A discovered member of a catalog type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMember {
    /// Unique key of the member within the catalog
    pub key: String,
    /// ID used to look the member up in the deployment plan
    #[serde(default)]
    pub id: Option<ComponentId>,
    /// Full member name as written into the manifest
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub folder: Option<String>,
}

/// Registry of component types and their members
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    version: String,
    types: BTreeMap<String, ComponentType>,
    members: HashMap<String, CatalogMember>,
}

impl Catalog {
    /// Creates an empty catalog for an API version
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            types: BTreeMap::new(),
            members: HashMap::new(),
        }
    }

    /// Returns the API version the catalog describes
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Declares a type, along with entries for each of its child types
    ///
    /// An explicit declaration replaces an entry previously implied by a
    /// parent; implied child entries never replace explicit ones. Member
    /// keys already recorded for the type are kept.
    pub fn declare_type(&mut self, mut component_type: ComponentType) {
        for child in &component_type.child_type_names {
            if !self.types.contains_key(child) {
                self.types.insert(
                    child.clone(),
                    ComponentType::implied_child(child, &component_type.name),
                );
            }
        }

        if let Some(existing) = self.types.remove(&component_type.name) {
            for key in existing.member_keys {
                if !component_type.member_keys.contains(&key) {
                    component_type.member_keys.push(key);
                }
            }
        }
        self.types.insert(component_type.name.clone(), component_type);
    }

    /// Registers a member under its type
    ///
    /// Keys are unique across the catalog. Returns false if the key was
    /// already registered for the same type; a key held by another type is
    /// an error. A key the type already lists (from `memberKeys`) is stored
    /// without being listed twice.
    pub fn add_member(&mut self, member: CatalogMember) -> Result<bool, CatalogError> {
        let Some(component_type) = self.types.get_mut(&member.type_name) else {
            return Err(CatalogError::UnknownType {
                type_name: member.type_name,
                member: member.name,
            });
        };

        if let Some(existing) = self.members.get(&member.key) {
            if existing.type_name == member.type_name {
                return Ok(false);
            }
            return Err(CatalogError::DuplicateKey {
                key: member.key,
                member: member.name,
                type_name: member.type_name,
                existing_type: existing.type_name.clone(),
            });
        }

        if !component_type.member_keys.contains(&member.key) {
            component_type.member_keys.push(member.key.clone());
        }
        self.members.insert(member.key.clone(), member);
        Ok(true)
    }

    pub fn component_type(&self, name: &str) -> Option<&ComponentType> {
        self.types.get(name)
    }

    /// Returns all types, ordered by name
    pub fn types(&self) -> impl Iterator<Item = &ComponentType> {
        self.types.values()
    }

    pub fn member(&self, key: &str) -> Option<&CatalogMember> {
        self.members.get(key)
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(key: &str, name: &str, type_name: &str) -> CatalogMember {
        CatalogMember {
            key: key.to_string(),
            id: None,
            name: name.to_string(),
            type_name: type_name.to_string(),
            folder: None,
        }
    }

    #[test]
    fn declare_type_adds_children() {
        let mut catalog = Catalog::new("60.0");
        catalog.declare_type(ComponentType {
            name: "CustomObject".to_string(),
            child_type_names: vec!["CustomField".to_string(), "ListView".to_string()],
            suffix: Some("object".to_string()),
            ..ComponentType::default()
        });

        assert_eq!(catalog.type_count(), 3);
        let field = catalog.component_type("CustomField").unwrap();
        assert_eq!(field.parent_type.as_deref(), Some("CustomObject"));
        assert!(field.is_child());
        assert_eq!(field.suffix, None);
        assert!(!catalog.component_type("CustomObject").unwrap().is_child());
    }

    #[test]
    fn explicit_declaration_beats_implied_child() {
        let mut catalog = Catalog::new("60.0");
        catalog.declare_type(ComponentType {
            name: "Workflow".to_string(),
            child_type_names: vec!["WorkflowRule".to_string()],
            ..ComponentType::default()
        });
        catalog.declare_type(ComponentType {
            name: "WorkflowRule".to_string(),
            suffix: Some("rule".to_string()),
            ..ComponentType::default()
        });
        // Re-declaring the parent must not clobber the explicit entry
        catalog.declare_type(ComponentType {
            name: "Workflow".to_string(),
            child_type_names: vec!["WorkflowRule".to_string()],
            ..ComponentType::default()
        });

        let rule = catalog.component_type("WorkflowRule").unwrap();
        assert_eq!(rule.suffix.as_deref(), Some("rule"));
        assert_eq!(rule.parent_type, None);
    }

    #[test]
    fn add_member_records_key_once() {
        let mut catalog = Catalog::new("60.0");
        catalog.declare_type(ComponentType::new("ApexClass"));

        assert_eq!(catalog.add_member(member("k1", "OrderService", "ApexClass")), Ok(true));
        assert_eq!(catalog.add_member(member("k1", "OrderService", "ApexClass")), Ok(false));

        assert_eq!(catalog.component_type("ApexClass").unwrap().member_keys, vec!["k1"]);
        assert_eq!(catalog.member("k1").unwrap().name, "OrderService");
    }

    #[test]
    fn add_member_stores_keys_listed_by_the_type() {
        let mut catalog = Catalog::new("60.0");
        let mut ty = ComponentType::new("ApexClass");
        ty.member_keys = vec!["k1".to_string()];
        catalog.declare_type(ty);

        assert_eq!(catalog.add_member(member("k1", "OrderService", "ApexClass")), Ok(true));

        assert_eq!(catalog.component_type("ApexClass").unwrap().member_keys, vec!["k1"]);
        assert_eq!(catalog.member("k1").unwrap().name, "OrderService");
        assert_eq!(catalog.member_count(), 1);
    }

    #[test]
    fn add_member_rejects_key_held_by_another_type() {
        let mut catalog = Catalog::new("60.0");
        catalog.declare_type(ComponentType::new("ApexClass"));
        catalog.declare_type(ComponentType::new("ApexPage"));

        catalog.add_member(member("k1", "OrderService", "ApexClass")).unwrap();
        let result = catalog.add_member(member("k1", "OrderPage", "ApexPage"));

        assert!(matches!(
            result,
            Err(CatalogError::DuplicateKey { ref existing_type, .. }) if existing_type == "ApexClass"
        ));
        assert_eq!(catalog.member("k1").unwrap().name, "OrderService");
        assert!(catalog.component_type("ApexPage").unwrap().member_keys.is_empty());
    }

    #[test]
    fn add_member_rejects_unknown_type() {
        let mut catalog = Catalog::new("60.0");
        let result = catalog.add_member(member("k1", "Thing", "Unheard"));
        assert_eq!(
            result,
            Err(CatalogError::UnknownType {
                type_name: "Unheard".to_string(),
                member: "Thing".to_string()
            })
        );
        assert_eq!(catalog.member_count(), 0);
    }

    #[test]
    fn redeclaring_keeps_members() {
        let mut catalog = Catalog::new("60.0");
        catalog.declare_type(ComponentType::new("ApexClass"));
        catalog.add_member(member("k1", "A", "ApexClass")).unwrap();
        catalog.declare_type(ComponentType::new("ApexClass"));

        assert_eq!(catalog.component_type("ApexClass").unwrap().member_keys, vec!["k1"]);
    }

    #[test]
    fn deserialize_type_with_defaults() {
        let json = r#"{"name": "ApexClass", "suffix": "cls", "hasMetaFile": true}"#;
        let ty: ComponentType = serde_json::from_str(json).unwrap();
        assert_eq!(ty.name, "ApexClass");
        assert_eq!(ty.suffix.as_deref(), Some("cls"));
        assert!(ty.has_meta_file);
        assert!(!ty.in_folder);
        assert!(ty.child_type_names.is_empty());
    }
}
