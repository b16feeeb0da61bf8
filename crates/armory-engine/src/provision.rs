//! Provisioning driver
//!
//! Orchestrates one full run: baseline packages concurrently, then every
//! catalog tool sequentially, then one remediation sweep over the outcomes
//! that published a placeholder, then the report artifact. A tool failing at
//! any stage is recorded and never stops the run; only catalog loading can
//! abort before the first tool is attempted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use armory_core::catalog::Catalog;
use armory_core::error::{Error, Result};
use armory_core::layout::Layout;
use armory_core::retry::{ClosurePredicate, RetryExecutorBuilder, TracingObserver};
use armory_core::types::{AcquisitionSource, RetryPolicy, StrategyKind, ToolSpec};
use tracing::{debug, info, warn};

use crate::acquire::Acquirer;
use crate::batch::{BatchTask, ParallelGroupRunner};
use crate::conflict::{apt_command, AptBackend, ConflictResolver, PackageBackend};
use crate::exec::{run_with_retry, TimeoutExecutor};
use crate::ledger::{OutcomeLedger, OutcomeStatus};
use crate::source::SourceTree;
use crate::strategy::{StrategyCandidate, StrategyResolver};
use crate::wrapper::{PublishedWrapper, WrapperSynthesizer};

/// Default wall-clock bound for any single external command
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Recorded when a tree was acquired but nothing runnable came out of it;
/// the remediation sweep matches on this text
const CLONED_ONLY_REASON: &str = "cloned only, no runnable artifact found";

/// Knobs for one provisioning run
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// Install the catalog's baseline packages before the tool loop
    pub run_baseline: bool,
    /// Reuse acquired trees only; never clone or download
    pub skip_acquisition: bool,
    /// Wall-clock bound applied to every external command
    pub timeout: Duration,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            run_baseline: true,
            skip_acquisition: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// What a finished run hands back to the caller
pub struct RunSummary {
    pub ledger: OutcomeLedger,
    pub report_path: PathBuf,
}

/// Drives a full provisioning run over a catalog
pub struct Provisioner {
    layout: Layout,
    executor: TimeoutExecutor,
    backend: Arc<dyn PackageBackend>,
    acquirer: Acquirer,
    resolver: StrategyResolver,
    synthesizer: WrapperSynthesizer,
    options: ProvisionOptions,
}

impl Provisioner {
    pub fn new(layout: Layout, options: ProvisionOptions) -> Self {
        let executor = TimeoutExecutor::new();
        let backend = Arc::new(AptBackend::new(
            executor.clone(),
            layout.clone(),
            options.timeout,
        ));
        Self::with_backend(layout, options, backend)
    }

    /// Construct with an explicit package backend (tests use a fake)
    pub fn with_backend(
        layout: Layout,
        options: ProvisionOptions,
        backend: Arc<dyn PackageBackend>,
    ) -> Self {
        let executor = TimeoutExecutor::new();
        Self {
            acquirer: Acquirer::new(executor.clone(), layout.clone(), options.timeout),
            resolver: StrategyResolver::new(layout.clone()),
            synthesizer: WrapperSynthesizer::new(layout.clone()),
            layout,
            executor,
            backend,
            options,
        }
    }

    /// Run the catalog end to end and write the report artifact
    pub async fn run(&self, catalog: &Catalog) -> Result<RunSummary> {
        self.layout.ensure()?;

        if self.options.run_baseline && !catalog.baseline_packages.is_empty() {
            self.install_baseline(&catalog.baseline_packages).await;
        }

        let mut ledger = OutcomeLedger::new();
        for spec in &catalog.tools {
            if spec.manual {
                ledger.record(
                    &spec.name,
                    OutcomeStatus::Manual,
                    "requires manual installation",
                );
                continue;
            }

            match self
                .provision_tool(spec, self.options.skip_acquisition)
                .await
            {
                Ok((status, reason)) => ledger.record(&spec.name, status, reason),
                Err(err) => {
                    ledger.record(&spec.name, OutcomeStatus::Failed, failure_reason(&err))
                }
            }
        }

        self.remediate(catalog, &mut ledger).await;

        let report_path = ledger.write_report(&self.layout)?;
        info!(report = %report_path.display(), "run complete");
        Ok(RunSummary {
            ledger,
            report_path,
        })
    }

    /// Baseline packages are independent of each other and of the tool loop,
    /// so they install concurrently; failures are logged, not recorded
    async fn install_baseline(&self, packages: &[String]) {
        let runner = ParallelGroupRunner::new(
            self.executor.clone(),
            self.layout.clone(),
            self.options.timeout,
        );
        let tasks: Vec<BatchTask> = packages
            .iter()
            .map(|pkg| BatchTask::new(format!("baseline-{pkg}"), apt_command("install", pkg)))
            .collect();

        for (name, result) in runner.run_batch(&tasks).await {
            match result {
                Ok(r) if r.succeeded() => {}
                Ok(r) => warn!(task = %name, status = ?r.status, "baseline install failed"),
                Err(err) => warn!(task = %name, %err, "baseline install failed"),
            }
        }
    }

    /// Take one tool to a terminal status, or an error for the ledger
    async fn provision_tool(
        &self,
        spec: &ToolSpec,
        skip_acquisition: bool,
    ) -> Result<(OutcomeStatus, String)> {
        if let AcquisitionSource::Package(package) = &spec.source {
            return self.install_system_package(spec, package).await;
        }

        let root = match self.acquirer.acquire(spec, skip_acquisition).await? {
            Some(root) => root,
            None => return Err(Error::indeterminate(&spec.name)),
        };
        let tree = SourceTree::scan(&root)?;

        let candidates = self.resolver.classify(spec, &tree);
        let top = match candidates.first() {
            Some(top) => top,
            None => return Err(Error::indeterminate(&spec.name)),
        };
        debug!(tool = %spec.name, strategy = %top.kind, "executing top candidate");

        self.execute_candidate(spec, top).await?;
        self.publish(spec, top, &tree)
    }

    /// Conflict removal, then the package-manager install under retry
    ///
    /// A timeout is not retried: the installer may have finished the work
    /// before losing the race with the clock, so the backend is probed and a
    /// confirmed install is escalated to success.
    async fn install_system_package(
        &self,
        spec: &ToolSpec,
        package: &str,
    ) -> Result<(OutcomeStatus, String)> {
        ConflictResolver::new(self.backend.as_ref())
            .resolve(&spec.name, &spec.conflicts)
            .await?;

        let operation = format!("install {package}");
        let outcome = RetryExecutorBuilder::new()
            .with_policy(RetryPolicy::install())
            .with_predicate(ClosurePredicate::new(|err: &Error| {
                !matches!(err, Error::Timeout { .. })
            }))
            .with_observer(TracingObserver::new(&operation))
            .build()
            .execute(|| self.backend.install(package))
            .await;

        match outcome {
            Ok(()) => Ok((
                OutcomeStatus::Success,
                "installed via system package manager".to_string(),
            )),
            Err(err) => {
                let attempts = err.attempts();
                match err.into_source() {
                    Some(Error::Timeout { operation, seconds }) => {
                        if self.backend.is_installed(package).await? {
                            info!(tool = %spec.name, package, "install verified after timeout");
                            return Ok((
                                OutcomeStatus::Success,
                                "verified installed after timeout".to_string(),
                            ));
                        }
                        Err(Error::Timeout { operation, seconds })
                    }
                    Some(source) => Err(source),
                    None => Err(Error::strategy(
                        &spec.name,
                        "system-package",
                        format!("install cancelled after {attempts} attempts"),
                    )),
                }
            }
        }
    }

    /// Run the candidate's recipe steps in order, each under retry
    async fn execute_candidate(&self, spec: &ToolSpec, candidate: &StrategyCandidate) -> Result<()> {
        let policy = RetryPolicy::install();

        for (index, step) in candidate.steps.iter().enumerate() {
            let log_name = format!("{}-s{}", spec.name, index + 1);
            let operation = format!("{} {} step {}", spec.name, candidate.kind, index + 1);

            let outcome = run_with_retry(
                &self.executor,
                &policy,
                &step.command,
                self.options.timeout,
                |attempt| self.layout.log_path(&log_name, attempt),
                &operation,
            )
            .await;

            match outcome {
                Ok(_) => {}
                Err(err) if step.optional => {
                    warn!(
                        tool = %spec.name,
                        step = %step.command.display_line(),
                        %err,
                        "optional step failed, continuing"
                    );
                }
                Err(err) => {
                    return Err(Error::strategy(
                        &spec.name,
                        candidate.kind.label(),
                        err.to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Publish the wrapper the candidate calls for and settle the status
    fn publish(
        &self,
        spec: &ToolSpec,
        candidate: &StrategyCandidate,
        tree: &SourceTree,
    ) -> Result<(OutcomeStatus, String)> {
        match candidate.kind {
            StrategyKind::DirectScriptRun => {
                let script = tree
                    .entry_script
                    .as_deref()
                    .ok_or_else(|| Error::indeterminate(&spec.name))?;
                self.synthesizer.publish_script(&spec.name, script)?;
                Ok((OutcomeStatus::Success, candidate.success_reason.clone()))
            }
            StrategyKind::DocumentationFallback => match &tree.readme {
                Some(readme) => {
                    self.synthesizer.publish_pager(&spec.name, readme)?;
                    Ok((OutcomeStatus::Partial, candidate.success_reason.clone()))
                }
                None => Ok((OutcomeStatus::Partial, CLONED_ONLY_REASON.to_string())),
            },
            _ => {
                let roots = vec![self.layout.env_dir(&spec.name), tree.root.clone()];
                match self
                    .synthesizer
                    .publish(&spec.name, &roots, tree.readme.as_deref())
                {
                    Ok(PublishedWrapper::Command { .. }) => {
                        Ok((OutcomeStatus::Success, candidate.success_reason.clone()))
                    }
                    Ok(PublishedWrapper::Pager { .. }) => Ok((
                        OutcomeStatus::Partial,
                        "documentation only, pager wrapper published".to_string(),
                    )),
                    Err(Error::Indeterminate { .. }) => {
                        Ok((OutcomeStatus::Partial, CLONED_ONLY_REASON.to_string()))
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }

    /// One sweep over placeholder outcomes, reusing the acquired trees
    ///
    /// Upgrades are monotonic: a remediation attempt that fails or lands on
    /// another placeholder leaves the original outcome untouched, so the
    /// sweep is idempotent.
    async fn remediate(&self, catalog: &Catalog, ledger: &mut OutcomeLedger) {
        let targets: Vec<String> = ledger
            .iter()
            .filter(|o| {
                o.status == OutcomeStatus::Partial
                    && (o.reason.contains("documentation only")
                        || o.reason.contains("cloned only"))
            })
            .map(|o| o.tool.clone())
            .collect();

        for name in targets {
            let Some(spec) = catalog.get(&name) else {
                continue;
            };
            debug!(tool = %name, "remediation attempt");
            if let Ok((OutcomeStatus::Success, reason)) = self.provision_tool(spec, true).await {
                ledger.record(&name, OutcomeStatus::Success, reason);
            }
        }
    }
}

/// Ledger reason for a tool that ended in an error
fn failure_reason(err: &Error) -> String {
    match err {
        Error::Conflict { blocking } => format!("blocked by {blocking}, removal failed"),
        other => other.to_string(),
    }
}
