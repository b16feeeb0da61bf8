//! Source tree scanning
//!
//! After acquisition a tool's tree is inspected exactly once: marker files
//! that identify a packaging ecosystem, a plausible entry-point script, and
//! the README. Strategy resolution works from this snapshot only; it never
//! re-reads the filesystem while ranking candidates.

use std::path::{Path, PathBuf};

use armory_core::error::Result;
use walkdir::WalkDir;

/// Depth limit for entry-script and README discovery
const SHALLOW_DEPTH: usize = 2;

/// Marker files detected at the tree root
#[derive(Debug, Clone, Default)]
pub struct Markers {
    /// Packaging manifest (`setup.py`, `pyproject.toml`)
    pub packaging_manifest: Option<PathBuf>,
    /// Dependency list without packaging semantics (`requirements.txt`)
    pub requirements: Option<PathBuf>,
    /// Build-module manifest compiled to a named binary (`go.mod`)
    pub module_manifest: Option<PathBuf>,
    /// JS-ecosystem package manifest (`package.json`)
    pub node_manifest: Option<PathBuf>,
    /// Build recipe (`Makefile` and variants)
    pub make_recipe: Option<PathBuf>,
}

impl Markers {
    /// Whether any ecosystem manifest was recognized
    pub fn any_manifest(&self) -> bool {
        self.packaging_manifest.is_some()
            || self.requirements.is_some()
            || self.module_manifest.is_some()
            || self.node_manifest.is_some()
            || self.make_recipe.is_some()
    }
}

/// Snapshot of an acquired tree, taken at classification time
#[derive(Debug, Clone)]
pub struct SourceTree {
    pub root: PathBuf,
    pub markers: Markers,
    /// Shallow script plausibly named as an entry point
    pub entry_script: Option<PathBuf>,
    pub readme: Option<PathBuf>,
}

impl SourceTree {
    /// Scan `root` for markers, an entry script, and a README
    pub fn scan(root: &Path) -> Result<Self> {
        let mut markers = Markers::default();

        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            match name.as_str() {
                "setup.py" | "pyproject.toml" => {
                    markers.packaging_manifest.get_or_insert(path);
                }
                "requirements.txt" => markers.requirements = Some(path),
                "go.mod" => markers.module_manifest = Some(path),
                "package.json" => markers.node_manifest = Some(path),
                "Makefile" | "makefile" | "GNUmakefile" => {
                    markers.make_recipe.get_or_insert(path);
                }
                _ => {}
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            entry_script: find_entry_script(root),
            readme: find_readme(root),
            markers,
        })
    }

    /// Read the README contents, if one was found
    pub fn readme_text(&self) -> Option<String> {
        self.readme
            .as_deref()
            .and_then(|path| std::fs::read_to_string(path).ok())
    }
}

/// A shallow script whose stem suggests it is the program entry point
fn find_entry_script(root: &Path) -> Option<PathBuf> {
    const ENTRY_WORDS: [&str; 3] = ["main", "run", "start"];

    let mut candidates: Vec<PathBuf> = WalkDir::new(root)
        .max_depth(SHALLOW_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let path = entry.path();
            let is_script = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("py") | Some("sh")
            );
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            is_script && ENTRY_WORDS.iter().any(|word| stem.contains(word))
        })
        .map(|entry| entry.into_path())
        .collect();

    // Prefer the shallowest match
    candidates.sort_by_key(|path| path.components().count());
    candidates.into_iter().next()
}

fn find_readme(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .max_depth(SHALLOW_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .starts_with("readme")
        })
        .map(|entry| entry.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "").unwrap();
    }

    #[test]
    fn test_scan_detects_root_markers() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "setup.py");
        touch(tmp.path(), "requirements.txt");
        touch(tmp.path(), "Makefile");
        touch(tmp.path(), "README.md");

        let tree = SourceTree::scan(tmp.path()).unwrap();
        assert!(tree.markers.packaging_manifest.is_some());
        assert!(tree.markers.requirements.is_some());
        assert!(tree.markers.make_recipe.is_some());
        assert!(tree.markers.module_manifest.is_none());
        assert!(tree.readme.is_some());
        assert!(tree.markers.any_manifest());
    }

    #[test]
    fn test_markers_ignore_nested_manifests() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("vendor")).unwrap();
        touch(&tmp.path().join("vendor"), "setup.py");

        let tree = SourceTree::scan(tmp.path()).unwrap();
        assert!(tree.markers.packaging_manifest.is_none());
    }

    #[test]
    fn test_entry_script_naming_heuristic() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "helpers.py");
        touch(tmp.path(), "run_scanner.py");

        let tree = SourceTree::scan(tmp.path()).unwrap();
        let script = tree.entry_script.unwrap();
        assert!(script.ends_with("run_scanner.py"));
    }

    #[test]
    fn test_entry_script_ignores_deep_files() {
        let tmp = TempDir::new().unwrap();
        let deep = tmp.path().join("a/b/c");
        std::fs::create_dir_all(&deep).unwrap();
        touch(&deep, "main.py");

        let tree = SourceTree::scan(tmp.path()).unwrap();
        assert!(tree.entry_script.is_none());
    }

    #[test]
    fn test_readme_case_insensitive() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "ReadMe.rst");

        let tree = SourceTree::scan(tmp.path()).unwrap();
        assert!(tree.readme.is_some());
    }

    #[test]
    fn test_empty_tree_has_no_markers() {
        let tmp = TempDir::new().unwrap();
        let tree = SourceTree::scan(tmp.path()).unwrap();
        assert!(!tree.markers.any_manifest());
        assert!(tree.entry_script.is_none());
        assert!(tree.readme.is_none());
    }
}
