//! Package conflict resolution
//!
//! Some tools cannot coexist with an already-installed system package. The
//! resolver removes every blocking package before the target install runs;
//! the first removal that fails aborts the whole operation with the blocking
//! package's name, leaving the remaining conflicts untouched and the target
//! uninstalled. Removal is never retried.

use std::time::Duration;

use armory_core::error::{Error, Result};
use armory_core::layout::Layout;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::exec::{CommandSpec, ExecutionStatus, TimeoutExecutor};

/// Seam over the system package manager
///
/// The engine depends on package operations only through this trait so the
/// conflict and install paths can be exercised with fakes in tests.
#[async_trait]
pub trait PackageBackend: Send + Sync {
    /// Whether the package is currently installed
    async fn is_installed(&self, package: &str) -> Result<bool>;

    /// Remove an installed package
    async fn remove(&self, package: &str) -> Result<()>;

    /// Install a package
    async fn install(&self, package: &str) -> Result<()>;
}

/// apt/dpkg-backed implementation
pub struct AptBackend {
    executor: TimeoutExecutor,
    layout: Layout,
    timeout: Duration,
}

impl AptBackend {
    pub fn new(executor: TimeoutExecutor, layout: Layout, timeout: Duration) -> Self {
        Self {
            executor,
            layout,
            timeout,
        }
    }

    async fn run(&self, spec: &CommandSpec, package: &str, verb: &str) -> Result<ExecutionStatus> {
        let log = self.layout.log_path(&format!("apt-{package}"), 1);
        let result = self.executor.execute(spec, self.timeout, &log, 1).await?;
        debug!(package, verb, status = ?result.status, "apt operation finished");
        Ok(result.status)
    }
}

fn needs_sudo() -> bool {
    unsafe { libc::geteuid() != 0 }
}

/// Non-interactive apt-get invocation, sudo-prefixed for unprivileged users
pub(crate) fn apt_command(subcommand: &str, package: &str) -> CommandSpec {
    let spec = if needs_sudo() {
        CommandSpec::new("sudo")
            .arg("/usr/bin/env")
            .arg("DEBIAN_FRONTEND=noninteractive")
            .arg("apt-get")
    } else {
        CommandSpec::new("apt-get").env("DEBIAN_FRONTEND", "noninteractive")
    };
    spec.arg(subcommand).arg("-y").arg("-qq").arg(package)
}

#[async_trait]
impl PackageBackend for AptBackend {
    async fn is_installed(&self, package: &str) -> Result<bool> {
        let spec = CommandSpec::new("dpkg").arg("-s").arg(package);
        let log = self.layout.log_path(&format!("dpkg-{package}"), 1);
        let result = self.executor.execute(&spec, self.timeout, &log, 1).await?;
        Ok(result.succeeded())
    }

    async fn remove(&self, package: &str) -> Result<()> {
        let spec = apt_command("remove", package);
        match self.run(&spec, package, "remove").await? {
            ExecutionStatus::Completed(0) => Ok(()),
            _ => Err(Error::conflict(package)),
        }
    }

    async fn install(&self, package: &str) -> Result<()> {
        let spec = apt_command("install", package);
        match self.run(&spec, package, "install").await? {
            ExecutionStatus::Completed(0) => Ok(()),
            ExecutionStatus::TimedOut => Err(Error::timeout(
                format!("apt-get install {package}"),
                self.timeout.as_secs(),
            )),
            status => Err(Error::strategy(
                package,
                "system-package",
                format!("apt-get install ended with {status:?}"),
            )),
        }
    }
}

/// Removes blocking packages ahead of a system-level install
pub struct ConflictResolver<'a> {
    backend: &'a dyn PackageBackend,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(backend: &'a dyn PackageBackend) -> Self {
        Self { backend }
    }

    /// All-or-nothing removal of every installed blocking package
    ///
    /// Returns `Error::Conflict` naming the first package that could not be
    /// removed; the caller must not install the target in that case.
    pub async fn resolve(&self, target: &str, conflicts: &[String]) -> Result<()> {
        for package in conflicts {
            if !self.backend.is_installed(package).await? {
                debug!(target, package, "conflicting package not installed, skipping");
                continue;
            }

            info!(target, package, "removing conflicting package");
            self.backend
                .remove(package)
                .await
                .map_err(|_| Error::conflict(package))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Fake backend scripting which packages exist and which removals fail
    struct FakeBackend {
        installed: Vec<String>,
        unremovable: Vec<String>,
        removed: Mutex<Vec<String>>,
        installs: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn new(installed: &[&str], unremovable: &[&str]) -> Self {
            Self {
                installed: installed.iter().map(|s| s.to_string()).collect(),
                unremovable: unremovable.iter().map(|s| s.to_string()).collect(),
                removed: Mutex::new(Vec::new()),
                installs: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PackageBackend for FakeBackend {
        async fn is_installed(&self, package: &str) -> Result<bool> {
            Ok(self.installed.iter().any(|p| p == package))
        }

        async fn remove(&self, package: &str) -> Result<()> {
            if self.unremovable.iter().any(|p| p == package) {
                return Err(Error::conflict(package));
            }
            self.removed.lock().unwrap().push(package.to_string());
            Ok(())
        }

        async fn install(&self, package: &str) -> Result<()> {
            self.installs.lock().unwrap().push(package.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_all_conflicts_removed() {
        let backend = FakeBackend::new(&["old-scanner", "legacy-cli"], &[]);
        let resolver = ConflictResolver::new(&backend);

        resolver
            .resolve(
                "scanner",
                &["old-scanner".into(), "legacy-cli".into(), "absent".into()],
            )
            .await
            .unwrap();

        let removed = backend.removed.lock().unwrap();
        assert_eq!(*removed, vec!["old-scanner", "legacy-cli"]);
    }

    #[tokio::test]
    async fn test_first_failure_aborts_and_cites_blocker() {
        let backend = FakeBackend::new(&["held-pkg", "other-pkg"], &["held-pkg"]);
        let resolver = ConflictResolver::new(&backend);

        let err = resolver
            .resolve("scanner", &["held-pkg".into(), "other-pkg".into()])
            .await
            .unwrap_err();

        match err {
            Error::Conflict { blocking } => assert_eq!(blocking, "held-pkg"),
            other => panic!("expected Conflict, got {other:?}"),
        }

        // Nothing after the blocker was touched and no install happened
        assert!(backend.removed.lock().unwrap().is_empty());
        assert!(backend.installs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_absent_conflicts_are_noops() {
        let backend = FakeBackend::new(&[], &[]);
        let resolver = ConflictResolver::new(&backend);

        resolver
            .resolve("scanner", &["ghost-a".into(), "ghost-b".into()])
            .await
            .unwrap();

        assert!(backend.removed.lock().unwrap().is_empty());
    }
}
