//! Shared type definitions
//!
//! This module defines the catalog-facing types (tool specs and acquisition
//! sources) and the runtime retry policy configuration used by the engine.

use serde::{Deserialize, Serialize};

/// Static description of one tool to provision
///
/// Catalog entries are immutable during a run. A structurally invalid entry
/// fails catalog validation and aborts the whole run before any tool is
/// processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name; also the acquisition subdirectory and wrapper name
    pub name: String,

    /// Where the tool comes from
    #[serde(flatten)]
    pub source: AcquisitionSource,

    /// System packages that must be removed before a system-level install
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,

    /// Pin the strategy resolver to a single kind (plus the documentation
    /// fallback), bypassing the README heuristic for this tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,

    /// Tool cannot be provisioned automatically; recorded as MANUAL
    #[serde(default)]
    pub manual: bool,
}

/// Acquisition source for a tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionSource {
    /// System package-manager identifier (installed in place, no tree)
    Package(String),
    /// Version-control URL, cloned into the tool's acquisition directory
    Git(String),
    /// Direct-download URL, fetched into the tool's acquisition directory
    Download(String),
}

impl AcquisitionSource {
    /// Human-readable label for logs and reasons
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Package(_) => "package",
            Self::Git(_) => "git",
            Self::Download(_) => "download",
        }
    }

    /// The identifier or URL carried by this source
    pub fn locator(&self) -> &str {
        match self {
            Self::Package(p) => p,
            Self::Git(u) => u,
            Self::Download(u) => u,
        }
    }
}

/// A recognized installation method
///
/// Ordering of the variants matches resolver priority: entry-point scripts
/// beat packaging manifests, manifests beat dependency lists, and the
/// documentation fallback is always last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// A shallow entry-point script exists; wrap it directly, no build
    DirectScriptRun,
    /// A packaging manifest exists; build in an isolated per-tool environment
    PackagedInstall,
    /// A dependency list without a packaging manifest; install deps first
    RequirementsOnly,
    /// A build-module manifest exists; compile to a named binary
    ModuleBuild,
    /// A JS-ecosystem package manifest exists; install dependencies only
    NodeDependencies,
    /// A build-recipe file exists; build then scan produced executables
    MakeBuild,
    /// No manifest recognized; scan for any executable and publish it
    ExecutableDiscovery,
    /// Terminal strategy: publish a pager over the README, outcome PARTIAL
    DocumentationFallback,
}

impl StrategyKind {
    /// Short identifier used in log lines and ledger reasons
    pub fn label(&self) -> &'static str {
        match self {
            Self::DirectScriptRun => "direct-script",
            Self::PackagedInstall => "packaged-install",
            Self::RequirementsOnly => "requirements-only",
            Self::ModuleBuild => "module-build",
            Self::NodeDependencies => "node-dependencies",
            Self::MakeBuild => "make-build",
            Self::ExecutableDiscovery => "executable-discovery",
            Self::DocumentationFallback => "documentation-fallback",
        }
    }

    /// Whether the strategy is the non-functional terminal fallback
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::DocumentationFallback)
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Maximum number of attempts
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retry strategy
    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Backoff multiplier for exponential strategies
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: RetryStrategy::default(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff profile used for install/build steps
    pub fn install() -> Self {
        Self {
            max_attempts: 3,
            strategy: RetryStrategy::LinearBackoff,
            backoff_multiplier: 1.0,
            initial_delay_ms: 2_000,
            max_delay_ms: 10_000,
        }
    }

    /// Exponential backoff profile used for clones and downloads
    pub fn download() -> Self {
        Self {
            max_attempts: 4,
            strategy: RetryStrategy::ExponentialBackoff,
            backoff_multiplier: 2.0,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_initial_delay() -> u64 {
    1_000
}
fn default_max_delay() -> u64 {
    30_000
}

/// Retry backoff strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// No delay between retries
    None,

    /// Fixed delay between retries
    FixedDelay,

    /// Exponential backoff (default)
    #[default]
    ExponentialBackoff,

    /// Linear backoff
    LinearBackoff,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_labels() {
        let src = AcquisitionSource::Git("https://example.com/a.git".into());
        assert_eq!(src.kind(), "git");
        assert_eq!(src.locator(), "https://example.com/a.git");

        let pkg = AcquisitionSource::Package("nmap".into());
        assert_eq!(pkg.kind(), "package");
    }

    #[test]
    fn test_tool_spec_yaml_round_trip() {
        let yaml = r#"
name: alpha
git: https://example.com/alpha.git
conflicts: [alpha-legacy]
strategy: packaged_install
"#;
        let spec: ToolSpec = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(spec.name, "alpha");
        assert_eq!(
            spec.source,
            AcquisitionSource::Git("https://example.com/alpha.git".into())
        );
        assert_eq!(spec.conflicts, vec!["alpha-legacy".to_string()]);
        assert_eq!(spec.strategy, Some(StrategyKind::PackagedInstall));
        assert!(!spec.manual);
    }

    #[test]
    fn test_strategy_kind_labels_are_unique() {
        use std::collections::HashSet;
        let kinds = [
            StrategyKind::DirectScriptRun,
            StrategyKind::PackagedInstall,
            StrategyKind::RequirementsOnly,
            StrategyKind::ModuleBuild,
            StrategyKind::NodeDependencies,
            StrategyKind::MakeBuild,
            StrategyKind::ExecutableDiscovery,
            StrategyKind::DocumentationFallback,
        ];
        let labels: HashSet<_> = kinds.iter().map(|k| k.label()).collect();
        assert_eq!(labels.len(), kinds.len());
    }

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.strategy, RetryStrategy::ExponentialBackoff);
    }

    #[test]
    fn test_retry_profiles() {
        assert_eq!(RetryPolicy::install().strategy, RetryStrategy::LinearBackoff);
        assert_eq!(
            RetryPolicy::download().strategy,
            RetryStrategy::ExponentialBackoff
        );
    }
}
