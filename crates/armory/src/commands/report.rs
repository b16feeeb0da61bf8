//! Report command - print the latest provisioning report

use anyhow::Result;
use armory_core::layout::Layout;
use armory_engine::ledger::latest_report;

use crate::cli::ReportArgs;
use crate::output;

pub fn run(args: ReportArgs) -> Result<()> {
    let layout = match args.root {
        Some(root) => Layout::new(root),
        None => Layout::default_root()?,
    };

    match latest_report(&layout)? {
        Some(path) => {
            output::info(&format!("latest report: {}", path.display()));
            print!("{}", std::fs::read_to_string(&path)?);
        }
        None => {
            output::warning(&format!(
                "no reports found under {}",
                layout.reports_dir().display()
            ));
        }
    }
    Ok(())
}
