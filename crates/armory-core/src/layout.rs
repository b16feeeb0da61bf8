//! Filesystem layout for a provisioning run
//!
//! Everything Armory touches lives under one root (default `~/.armory`):
//! one acquisition subdirectory per tool, one isolated environment per tool
//! that needs it, one log file per tool per attempt, a command-publish
//! directory, an application-shortcut directory, and report artifacts.
//! Acquisition trees are never deleted automatically; the remediation pass
//! depends on them still being present.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::utils::get_home_dir;

/// Directory layout rooted at the Armory home
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Layout under the default root (`~/.armory`)
    pub fn default_root() -> Result<Self> {
        Ok(Self::new(get_home_dir()?.join(".armory")))
    }

    /// Layout under a custom root (tests, sandboxed runs)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create every directory the run will write into
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            self.tools_dir(),
            self.envs_dir(),
            self.logs_dir(),
            self.bin_dir(),
            self.applications_dir(),
            self.reports_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root of all acquisition trees
    pub fn tools_dir(&self) -> PathBuf {
        self.root.join("tools")
    }

    /// Acquisition tree for one tool
    pub fn tool_dir(&self, tool: &str) -> PathBuf {
        self.tools_dir().join(tool)
    }

    /// Root of all isolated environments
    pub fn envs_dir(&self) -> PathBuf {
        self.root.join("envs")
    }

    /// Isolated environment for one tool
    pub fn env_dir(&self, tool: &str) -> PathBuf {
        self.envs_dir().join(tool)
    }

    /// Root of all log files
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Log sink for one attempt of one tool; never shared across
    /// concurrent invocations
    pub fn log_path(&self, tool: &str, attempt: u32) -> PathBuf {
        self.logs_dir().join(format!("{tool}-{attempt}.log"))
    }

    /// Command-publish directory (wrappers land here)
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    /// Published wrapper path for a tool
    pub fn wrapper_path(&self, tool: &str) -> PathBuf {
        self.bin_dir().join(tool)
    }

    /// Application-shortcut directory (.desktop launchers)
    pub fn applications_dir(&self) -> PathBuf {
        self.root.join("applications")
    }

    /// Report artifact directory
    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }
}
