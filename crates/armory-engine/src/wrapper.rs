//! Wrapper synthesis
//!
//! For trees that produced an artifact without native packaging, this module
//! elects the most plausible executable and publishes two things: a shell
//! wrapper in the command-publish directory and a `.desktop` launcher in the
//! application-shortcut directory. Re-publishing an existing command name
//! silently overwrites it; the publish directory is not a uniqueness-checked
//! registry.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use armory_core::error::{Error, Result};
use armory_core::layout::Layout;
use tracing::{debug, info};
use walkdir::WalkDir;

/// What got published for a tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishedWrapper {
    /// Functional command wrapping an elected executable or script
    Command { wrapper: PathBuf, target: PathBuf },
    /// Read-only pager over the README; the tool is not functional
    Pager { wrapper: PathBuf, readme: PathBuf },
}

/// Publishes runnable entry points for unpackaged artifacts
pub struct WrapperSynthesizer {
    layout: Layout,
}

impl WrapperSynthesizer {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Elect an executable under `search_roots` and publish it
    ///
    /// Falls back to a pager wrapper over the README when no executable is
    /// found; errors only when there is neither.
    pub fn publish(
        &self,
        tool: &str,
        search_roots: &[PathBuf],
        readme: Option<&Path>,
    ) -> Result<PublishedWrapper> {
        if let Some(target) = elect_executable(tool, search_roots) {
            info!(tool, target = %target.display(), "publishing command wrapper");
            let wrapper = self.write_wrapper(tool, &exec_line(&target))?;
            self.write_desktop_entry(tool, &wrapper)?;
            return Ok(PublishedWrapper::Command { wrapper, target });
        }

        match readme {
            Some(readme) => self.publish_pager(tool, readme),
            None => Err(Error::indeterminate(tool)),
        }
    }

    /// Publish a known entry script directly, no election
    pub fn publish_script(&self, tool: &str, script: &Path) -> Result<PublishedWrapper> {
        info!(tool, script = %script.display(), "publishing entry-script wrapper");
        let wrapper = self.write_wrapper(tool, &exec_line(script))?;
        self.write_desktop_entry(tool, &wrapper)?;
        Ok(PublishedWrapper::Command {
            wrapper,
            target: script.to_path_buf(),
        })
    }

    /// Publish a read-only pager over the README
    pub fn publish_pager(&self, tool: &str, readme: &Path) -> Result<PublishedWrapper> {
        info!(tool, readme = %readme.display(), "publishing pager wrapper");
        let wrapper = self.write_wrapper(tool, &format!("exec less \"{}\"", readme.display()))?;
        Ok(PublishedWrapper::Pager {
            wrapper,
            readme: readme.to_path_buf(),
        })
    }

    fn write_wrapper(&self, tool: &str, exec_line: &str) -> Result<PathBuf> {
        let bin_dir = self.layout.bin_dir();
        std::fs::create_dir_all(&bin_dir)?;

        let wrapper = self.layout.wrapper_path(tool);
        std::fs::write(&wrapper, format!("#!/bin/sh\n{exec_line} \"$@\"\n"))?;
        std::fs::set_permissions(&wrapper, std::fs::Permissions::from_mode(0o755))?;
        Ok(wrapper)
    }

    fn write_desktop_entry(&self, tool: &str, wrapper: &Path) -> Result<()> {
        let dir = self.layout.applications_dir();
        std::fs::create_dir_all(&dir)?;

        let entry = format!(
            "[Desktop Entry]\nType=Application\nName={tool}\nExec={}\nTerminal=true\nCategories=Utility;\n",
            wrapper.display()
        );
        std::fs::write(dir.join(format!("{tool}.desktop")), entry)?;
        Ok(())
    }
}

/// Wrapper body for a target, routing scripts through their interpreter
fn exec_line(target: &Path) -> String {
    match target.extension().and_then(|e| e.to_str()) {
        Some("py") => format!("exec python3 \"{}\"", target.display()),
        Some("sh") => format!("exec sh \"{}\"", target.display()),
        _ => format!("exec \"{}\"", target.display()),
    }
}

/// Pick the most plausible executable under the given roots
///
/// Ranking: path or name containing the tool name, then residence in a
/// `bin` directory, then first found. Interpreter shims never qualify.
fn elect_executable(tool: &str, search_roots: &[PathBuf]) -> Option<PathBuf> {
    let tool_lower = tool.to_lowercase();
    let mut best: Option<(u8, usize, PathBuf)> = None;
    let mut index = 0usize;

    for root in search_roots {
        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() || !is_executable(entry.path()) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if is_interpreter_shim(&name) {
                continue;
            }

            let path_lower = entry.path().to_string_lossy().to_lowercase();
            let rank = if name.contains(&tool_lower) || path_lower.contains(&tool_lower) {
                0
            } else if entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n == "bin")
                .unwrap_or(false)
            {
                1
            } else {
                2
            };

            let candidate = (rank, index, entry.into_path());
            index += 1;
            match &best {
                Some((best_rank, best_index, _)) if (*best_rank, *best_index) <= (candidate.0, candidate.1) => {}
                _ => best = Some(candidate),
            }
        }
    }

    debug!(tool, elected = ?best.as_ref().map(|(_, _, p)| p.display().to_string()), "executable election");
    best.map(|(_, _, path)| path)
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Runtime and package-manager entry points that must never be published
fn is_interpreter_shim(name: &str) -> bool {
    const SHIM_PREFIXES: [&str; 6] = ["python", "pip", "node", "npm", "npx", "easy_install"];
    SHIM_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
        || name == "activate"
        || name.starts_with("activate.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_executable(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn synth(tmp: &TempDir) -> WrapperSynthesizer {
        WrapperSynthesizer::new(Layout::new(tmp.path().join("armory")))
    }

    #[test]
    fn test_name_match_beats_bin_directory() {
        let tmp = TempDir::new().unwrap();
        let tree = tmp.path().join("tree");
        let bin = tree.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        make_executable(&bin, "helper");
        let named = make_executable(&tree, "scanner-cli");

        let elected = elect_executable("scanner", &[tree]).unwrap();
        assert_eq!(elected, named);
    }

    #[test]
    fn test_bin_directory_beats_first_found() {
        let tmp = TempDir::new().unwrap();
        let tree = tmp.path().join("tree");
        let bin = tree.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        // "aaa" sorts before bin/ but loses on rank
        make_executable(&tree, "aaa");
        let in_bin = make_executable(&bin, "helper");

        let elected = elect_executable("scanner", &[tree]).unwrap();
        assert_eq!(elected, in_bin);
    }

    #[test]
    fn test_interpreter_shims_excluded() {
        let tmp = TempDir::new().unwrap();
        let env_bin = tmp.path().join("env/bin");
        std::fs::create_dir_all(&env_bin).unwrap();
        make_executable(&env_bin, "python3");
        make_executable(&env_bin, "pip");
        make_executable(&env_bin, "activate");
        let real = make_executable(&env_bin, "scanner");

        let elected = elect_executable("scanner", &[tmp.path().to_path_buf()]).unwrap();
        assert_eq!(elected, real);
    }

    #[test]
    fn test_publish_writes_wrapper_and_desktop_entry() {
        let tmp = TempDir::new().unwrap();
        let tree = tmp.path().join("tree");
        std::fs::create_dir_all(&tree).unwrap();
        let target = make_executable(&tree, "scanner");

        let synth = synth(&tmp);
        let published = synth.publish("scanner", &[tree], None).unwrap();

        match published {
            PublishedWrapper::Command { wrapper, target: t } => {
                assert_eq!(t, target);
                let body = std::fs::read_to_string(&wrapper).unwrap();
                assert!(body.starts_with("#!/bin/sh"));
                assert!(body.contains("scanner"));
                let mode = std::fs::metadata(&wrapper).unwrap().permissions().mode();
                assert_ne!(mode & 0o111, 0);
            }
            other => panic!("expected Command, got {other:?}"),
        }

        assert!(synth
            .layout
            .applications_dir()
            .join("scanner.desktop")
            .exists());
    }

    #[test]
    fn test_readme_only_tree_gets_pager() {
        let tmp = TempDir::new().unwrap();
        let tree = tmp.path().join("tree");
        std::fs::create_dir_all(&tree).unwrap();
        let readme = tree.join("README.md");
        std::fs::write(&readme, "# docs\n").unwrap();

        let synth = synth(&tmp);
        let published = synth
            .publish("scanner", &[tree], Some(&readme))
            .unwrap();

        match published {
            PublishedWrapper::Pager { wrapper, .. } => {
                let body = std::fs::read_to_string(wrapper).unwrap();
                assert!(body.contains("less"));
                assert!(body.contains("README.md"));
            }
            other => panic!("expected Pager, got {other:?}"),
        }
    }

    #[test]
    fn test_nothing_publishable_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let tree = tmp.path().join("tree");
        std::fs::create_dir_all(&tree).unwrap();

        let err = synth(&tmp).publish("scanner", &[tree], None).unwrap_err();
        assert!(matches!(err, Error::Indeterminate { .. }));
    }

    #[test]
    fn test_republish_overwrites_silently() {
        let tmp = TempDir::new().unwrap();
        let tree = tmp.path().join("tree");
        std::fs::create_dir_all(&tree).unwrap();
        let first = make_executable(&tree, "scanner-old");
        let synth = synth(&tmp);
        synth.publish("scanner", &[tree.clone()], None).unwrap();

        std::fs::remove_file(first).unwrap();
        let second = make_executable(&tree, "scanner-new");
        let published = synth.publish("scanner", &[tree], None).unwrap();

        match published {
            PublishedWrapper::Command { wrapper, target } => {
                assert_eq!(target, second);
                let body = std::fs::read_to_string(wrapper).unwrap();
                assert!(body.contains("scanner-new"));
            }
            other => panic!("expected Command, got {other:?}"),
        }
    }

    #[test]
    fn test_script_wrapper_uses_interpreter() {
        let tmp = TempDir::new().unwrap();
        let script = tmp.path().join("main.py");
        std::fs::write(&script, "print('hi')\n").unwrap();

        let synth = synth(&tmp);
        let published = synth.publish_script("scanner", &script).unwrap();

        match published {
            PublishedWrapper::Command { wrapper, .. } => {
                let body = std::fs::read_to_string(wrapper).unwrap();
                assert!(body.contains("python3"));
            }
            other => panic!("expected Command, got {other:?}"),
        }
    }
}
