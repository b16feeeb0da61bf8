//! Provision command - run the whole catalog and render the outcome ledger

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use armory_core::catalog::{Catalog, DEFAULT_CATALOG_FILE};
use armory_core::layout::Layout;
use armory_engine::{OutcomeStatus, ProvisionOptions, Provisioner};

use crate::cli::ProvisionArgs;
use crate::output;

pub async fn run(args: ProvisionArgs, catalog_path: Option<&Path>) -> Result<()> {
    let path = catalog_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_FILE));
    let catalog = Catalog::load(&path)
        .with_context(|| format!("loading catalog {}", path.display()))?;

    let layout = match &args.root {
        Some(root) => Layout::new(root.clone()),
        None => Layout::default_root()?,
    };

    if !args.auto && !catalog.baseline_packages.is_empty() {
        output::info(&format!(
            "skipping {} baseline package(s); pass --auto to install them",
            catalog.baseline_packages.len()
        ));
    }

    let options = ProvisionOptions {
        run_baseline: args.auto,
        skip_acquisition: args.skip_acquisition,
        timeout: Duration::from_secs(args.timeout),
    };

    output::header(&format!(
        "Provisioning {} tool(s) from {}",
        catalog.tools.len(),
        path.display()
    ));

    let spinner = output::spinner("provisioning...");
    let provisioner = Provisioner::new(layout, options);
    let summary = provisioner.run(&catalog).await?;
    spinner.finish_and_clear();

    for outcome in summary.ledger.iter() {
        let line = format!(
            "[{}] {}: {}",
            outcome.status.tag(),
            outcome.tool,
            outcome.reason
        );
        match outcome.status {
            OutcomeStatus::Success => output::success(&line),
            OutcomeStatus::Partial | OutcomeStatus::Manual => output::warning(&line),
            OutcomeStatus::Failed => output::error(&line),
        }
    }

    let counts = summary.ledger.counts();
    output::header("Totals");
    output::kv("success", &counts.success.to_string());
    output::kv("partial", &counts.partial.to_string());
    output::kv("failed", &counts.failed.to_string());
    output::kv("manual", &counts.manual.to_string());
    output::kv("report", &summary.report_path.display().to_string());

    if summary.ledger.has_failures() {
        bail!(
            "{} tool(s) failed; see {}",
            counts.failed,
            summary.report_path.display()
        );
    }
    Ok(())
}
