//! Configuration handling for metastage
//!
//! Configuration is stored in `metastage.toml` (project, found by walking up
//! from the current directory) and `~/.config/metastage/config.toml`
//! (global).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    ManifestOptions, ResidualPolicy, TestAffinityMatcher, TestNaming, DEFAULT_NAMESPACE,
    DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_TEST_AFFIX_PATTERN, DEFAULT_TEST_BEARING_TYPE,
    DEFAULT_TEST_NAME_PATTERN, MAX_SCORE,
};

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "metastage.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Settings for graph resolution and test pairing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Types whose members can be tests or subjects
    pub test_bearing_types: Vec<String>,

    /// Regex identifying test components by name
    pub test_name_pattern: String,

    /// Regex stripped from a test name to guess its subject's name
    pub test_affix_pattern: String,

    /// A pairing must score strictly above this (0-100)
    pub similarity_threshold: u8,

    /// What to do with components caught in longer cycles
    pub residual_policy: ResidualPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            test_bearing_types: vec![DEFAULT_TEST_BEARING_TYPE.to_string()],
            test_name_pattern: DEFAULT_TEST_NAME_PATTERN.to_string(),
            test_affix_pattern: DEFAULT_TEST_AFFIX_PATTERN.to_string(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            residual_policy: ResidualPolicy::Report,
        }
    }
}

impl ResolverConfig {
    /// Compiles the test naming rules
    pub fn naming(&self) -> Result<TestNaming, ConfigError> {
        TestNaming::new(
            self.test_bearing_types.clone(),
            &self.test_name_pattern,
            &self.test_affix_pattern,
        )
        .map_err(|e| ConfigError::Invalid(format!("test pattern: {}", e)))
    }

    /// Builds the test matcher, validating the threshold
    pub fn matcher(&self) -> Result<TestAffinityMatcher, ConfigError> {
        if self.similarity_threshold > MAX_SCORE {
            return Err(ConfigError::Invalid(format!(
                "similarity_threshold must be at most {}, got {}",
                MAX_SCORE, self.similarity_threshold
            )));
        }
        Ok(TestAffinityMatcher::new(self.naming()?, self.similarity_threshold))
    }
}

/// Settings for manifest rendering and output files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ManifestConfig {
    /// Namespace attribute on the root element
    pub namespace: String,

    /// Spaces per nesting level
    pub indent: usize,

    /// Output file prefix (`{prefix}-all.xml`, `{prefix}-group-{n}.xml`)
    pub file_prefix: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            indent: 4,
            file_prefix: "package".to_string(),
        }
    }
}

impl ManifestConfig {
    pub fn options(&self) -> ManifestOptions {
        ManifestOptions {
            namespace: self.namespace.clone(),
            indent: self.indent,
        }
    }
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectConfig {
    pub resolver: ResolverConfig,
    pub manifest: ManifestConfig,
}

impl ProjectConfig {
    /// Checks settings that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolver.matcher()?;
        if self.manifest.file_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("manifest.file_prefix must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    /// File the project configuration came from, if any
    pub source: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from an explicit file or the default locations
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let global = Self::load_global()?;

        let source = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::current_dir()
                .ok()
                .and_then(|dir| Self::find_config_file(&dir)),
        };

        let project = match &source {
            Some(path) => Self::load_project_config(path)?,
            None => ProjectConfig::default(),
        };

        Ok(Self {
            project,
            global,
            source,
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "metastage", "metastage")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads and validates project configuration from a file
    pub fn load_project_config(path: &Path) -> Result<ProjectConfig> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read project config: {}", path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse project config: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid project config: {}", path.display()))?;
        Ok(config)
    }

    /// Finds `metastage.toml` in `start` or its nearest ancestor
    pub fn find_config_file(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }

            if !current.pop() {
                return None;
            }
        }
    }
}
