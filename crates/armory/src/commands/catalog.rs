//! Catalog commands - validate and list

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use armory_core::catalog::{Catalog, DEFAULT_CATALOG_FILE};

use crate::cli::{CatalogCommands, CatalogListArgs, CatalogValidateArgs};
use crate::output;

pub fn run(cmd: CatalogCommands, global_path: Option<&Path>) -> Result<()> {
    match cmd {
        CatalogCommands::Validate(args) => validate(args, global_path),
        CatalogCommands::List(args) => list(args, global_path),
    }
}

fn resolve_path(file: Option<&Path>, global: Option<&Path>) -> PathBuf {
    file.or(global)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_FILE))
}

fn validate(args: CatalogValidateArgs, global_path: Option<&Path>) -> Result<()> {
    let path = resolve_path(args.file.as_deref(), global_path);
    let catalog = Catalog::load(&path)
        .with_context(|| format!("validating catalog {}", path.display()))?;

    output::success(&format!(
        "{} is valid: {} tool(s), {} baseline package(s)",
        path.display(),
        catalog.tools.len(),
        catalog.baseline_packages.len()
    ));
    Ok(())
}

fn list(args: CatalogListArgs, global_path: Option<&Path>) -> Result<()> {
    let path = resolve_path(None, global_path);
    let catalog = Catalog::load(&path)
        .with_context(|| format!("loading catalog {}", path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    if !catalog.baseline_packages.is_empty() {
        output::header("Baseline packages");
        println!("  {}", catalog.baseline_packages.join(", "));
    }

    output::header(&format!("Tools ({})", catalog.tools.len()));
    for tool in &catalog.tools {
        let mut notes = Vec::new();
        if tool.manual {
            notes.push("manual".to_string());
        }
        if let Some(strategy) = tool.strategy {
            notes.push(format!("strategy: {strategy}"));
        }
        if !tool.conflicts.is_empty() {
            notes.push(format!("conflicts: {}", tool.conflicts.join(", ")));
        }

        let suffix = if notes.is_empty() {
            String::new()
        } else {
            format!("  [{}]", notes.join("; "))
        };
        println!(
            "  {:<20} {:<10} {}{}",
            tool.name,
            tool.source.kind(),
            tool.source.locator(),
            suffix
        );
    }

    Ok(())
}
