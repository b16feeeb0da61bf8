//! Preflight command - check the host for the commands provisioning uses
//!
//! Required commands gate acquisition and the package-manager path; the
//! optional ones are only needed when the catalog exercises the matching
//! strategy, so their absence is reported but never fatal.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::cli::PreflightArgs;
use crate::output;

/// One host command the strategies may invoke
struct CommandCheck {
    command: &'static str,
    purpose: &'static str,
    required: bool,
}

const CHECKS: &[CommandCheck] = &[
    CommandCheck {
        command: "git",
        purpose: "source acquisition (clone)",
        required: true,
    },
    CommandCheck {
        command: "curl",
        purpose: "source acquisition (download)",
        required: true,
    },
    CommandCheck {
        command: "apt-get",
        purpose: "system package installs and conflict removal",
        required: true,
    },
    CommandCheck {
        command: "python3",
        purpose: "isolated environments and script wrappers",
        required: true,
    },
    CommandCheck {
        command: "pip3",
        purpose: "package installs outside an isolated environment",
        required: false,
    },
    CommandCheck {
        command: "go",
        purpose: "module builds",
        required: false,
    },
    CommandCheck {
        command: "npm",
        purpose: "node dependency installs",
        required: false,
    },
    CommandCheck {
        command: "make",
        purpose: "makefile builds",
        required: false,
    },
    CommandCheck {
        command: "less",
        purpose: "documentation pager wrappers",
        required: false,
    },
];

#[derive(Debug, Serialize)]
struct CheckResult {
    command: &'static str,
    purpose: &'static str,
    required: bool,
    path: Option<String>,
}

pub fn run(args: PreflightArgs) -> Result<()> {
    let results: Vec<CheckResult> = CHECKS
        .iter()
        .map(|check| CheckResult {
            command: check.command,
            purpose: check.purpose,
            required: check.required,
            path: which::which(check.command)
                .ok()
                .map(|p| p.display().to_string()),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        output::header("Preflight checks");
        for result in &results {
            match (&result.path, result.required) {
                (Some(path), _) => {
                    output::success(&format!("{:<10} {}", result.command, path))
                }
                (None, true) => {
                    output::error(&format!("{:<10} missing ({})", result.command, result.purpose))
                }
                (None, false) => output::warning(&format!(
                    "{:<10} missing, optional ({})",
                    result.command, result.purpose
                )),
            }
        }
    }

    let missing: Vec<&str> = results
        .iter()
        .filter(|r| r.required && r.path.is_none())
        .map(|r| r.command)
        .collect();
    if !missing.is_empty() {
        bail!("missing required command(s): {}", missing.join(", "));
    }
    Ok(())
}
