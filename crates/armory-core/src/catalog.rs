//! Catalog file parsing and validation
//!
//! The catalog (armory.yaml) is the ordered list of tools to provision plus
//! the baseline system packages installed up front. It is supplied by the
//! operator and validated structurally before a run starts; validation
//! failure is the only fatal input error.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::ToolSpec;

/// Default catalog filename looked up in the working directory
pub const DEFAULT_CATALOG_FILE: &str = "armory.yaml";

/// Parsed tool catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// Baseline system packages installed concurrently before the tool loop
    #[serde(default)]
    pub baseline_packages: Vec<String>,

    /// Ordered tool specs; processed sequentially in file order
    pub tools: Vec<ToolSpec>,
}

impl Catalog {
    /// Load and validate a catalog from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::catalog_not_found(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let catalog: Catalog = serde_yaml_ng::from_str(&raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Structural validation of every entry
    ///
    /// Duplicate names would violate the one-outcome-per-tool ledger
    /// invariant, so they are rejected here rather than papered over later.
    pub fn validate(&self) -> Result<()> {
        if self.tools.is_empty() {
            return Err(Error::invalid_catalog("catalog contains no tools"));
        }

        let mut seen = HashSet::new();
        for spec in &self.tools {
            if spec.name.trim().is_empty() {
                return Err(Error::invalid_catalog("tool with empty name"));
            }
            if spec.name.contains('/') || spec.name.contains("..") {
                return Err(Error::invalid_catalog(format!(
                    "tool name contains path separators: {}",
                    spec.name
                )));
            }
            if spec.source.locator().trim().is_empty() {
                return Err(Error::invalid_catalog(format!(
                    "tool {} has an empty {} source",
                    spec.name,
                    spec.source.kind()
                )));
            }
            if !seen.insert(spec.name.clone()) {
                return Err(Error::invalid_catalog(format!(
                    "duplicate tool name: {}",
                    spec.name
                )));
            }
        }

        for pkg in &self.baseline_packages {
            if pkg.trim().is_empty() {
                return Err(Error::invalid_catalog("empty baseline package name"));
            }
        }

        Ok(())
    }

    /// Find a tool spec by name
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }
}
