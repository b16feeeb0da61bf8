//! Source acquisition
//!
//! Brings a tool's source tree onto disk: shallow clone for version-control
//! sources, curl fetch for direct downloads, with recognized archives
//! unpacked in place after the fetch. Fetches run under the timeout executor
//! with the exponential download retry profile, and only network-shaped
//! failures are retried; a bad URL fails on the first attempt. An existing
//! tree is always reused rather than re-fetched; acquisition never deletes
//! anything.

use std::path::{Path, PathBuf};
use std::time::Duration;

use armory_core::error::{Error, Result};
use armory_core::layout::Layout;
use armory_core::retry::MessagePredicate;
use armory_core::types::{AcquisitionSource, RetryPolicy, ToolSpec};
use tracing::{debug, info};

use crate::exec::{run_with_retry_if, CommandSpec, TimeoutExecutor};

/// Fetches source trees into the per-tool acquisition directories
pub struct Acquirer {
    executor: TimeoutExecutor,
    layout: Layout,
    policy: RetryPolicy,
    timeout: Duration,
}

impl Acquirer {
    pub fn new(executor: TimeoutExecutor, layout: Layout, timeout: Duration) -> Self {
        Self {
            executor,
            layout,
            policy: RetryPolicy::download(),
            timeout,
        }
    }

    /// Acquire the tool's source, returning its tree root
    ///
    /// Package-manager sources have no tree and yield `None`. An existing
    /// non-empty tree is reused, which is also how `--skip-acquisition`
    /// behaves once the flag has suppressed the fetch.
    pub async fn acquire(&self, spec: &ToolSpec, skip_acquisition: bool) -> Result<Option<PathBuf>> {
        let url = match &spec.source {
            AcquisitionSource::Package(_) => return Ok(None),
            AcquisitionSource::Git(url) | AcquisitionSource::Download(url) => url.clone(),
        };

        let dest = self.layout.tool_dir(&spec.name);
        if tree_present(&dest) {
            debug!(tool = %spec.name, tree = %dest.display(), "reusing existing tree");
            return Ok(Some(dest));
        }
        if skip_acquisition {
            return Err(Error::acquisition(
                &spec.name,
                "no previously acquired tree to reuse",
            ));
        }

        let is_clone = matches!(spec.source, AcquisitionSource::Git(_));
        let archive = dest.join(filename_from_url(&url));
        let command = if is_clone {
            info!(tool = %spec.name, %url, "cloning");
            CommandSpec::new("git")
                .arg("clone")
                .arg("--depth")
                .arg("1")
                .arg(&url)
                .arg(dest.display().to_string())
        } else {
            info!(tool = %spec.name, %url, "downloading");
            std::fs::create_dir_all(&dest)?;
            CommandSpec::new("curl")
                .arg("-fsSL")
                .arg("-o")
                .arg(archive.display().to_string())
                .arg(&url)
        };

        let operation = format!("acquire {}", spec.name);
        run_with_retry_if(
            &self.executor,
            &self.policy,
            MessagePredicate::network_errors(),
            &command,
            self.timeout,
            |attempt| self.layout.log_path(&format!("{}-acquire", spec.name), attempt),
            &operation,
        )
        .await
        .map_err(|err| Error::acquisition(&spec.name, err.to_string()))?;

        if !is_clone {
            self.unpack(&spec.name, &dest, &archive).await?;
        }
        Ok(Some(dest))
    }

    /// Unpack a downloaded archive into the tree; plain files are left alone
    async fn unpack(&self, tool: &str, dest: &Path, archive: &Path) -> Result<()> {
        let Some(command) = unpack_command(dest, archive) else {
            return Ok(());
        };

        info!(tool, archive = %archive.display(), "unpacking");
        let log = self.layout.log_path(&format!("{tool}-unpack"), 1);
        let result = self.executor.execute(&command, self.timeout, &log, 1).await?;
        if !result.succeeded() {
            return Err(Error::acquisition(
                tool,
                format!(
                    "could not unpack {} (log: {})",
                    archive.display(),
                    log.display()
                ),
            ));
        }
        Ok(())
    }
}

/// Extraction command for recognized archive suffixes
fn unpack_command(dest: &Path, archive: &Path) -> Option<CommandSpec> {
    let name = archive.file_name()?.to_str()?.to_lowercase();
    let archive_arg = archive.display().to_string();
    let dest_arg = dest.display().to_string();

    let tar_flags = if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        "-xzf"
    } else if name.ends_with(".tar.bz2") {
        "-xjf"
    } else if name.ends_with(".tar.xz") {
        "-xJf"
    } else if name.ends_with(".tar") {
        "-xf"
    } else if name.ends_with(".zip") {
        return Some(
            CommandSpec::new("unzip")
                .arg("-oq")
                .arg(archive_arg)
                .arg("-d")
                .arg(dest_arg),
        );
    } else {
        return None;
    };

    Some(
        CommandSpec::new("tar")
            .arg(tar_flags)
            .arg(archive_arg)
            .arg("-C")
            .arg(dest_arg),
    )
}

fn tree_present(dest: &std::path::Path) -> bool {
    std::fs::read_dir(dest)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Last path segment of the URL, query string stripped
fn filename_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or("download")
        .to_string()
}
