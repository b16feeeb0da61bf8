//! Strategy resolution
//!
//! Turns a scanned [`SourceTree`] into an ordered list of installation
//! candidates. File markers are the strong signal and fix the priority
//! order; README hints are consulted only when no manifest matched; the
//! documentation fallback terminates every list so classification itself
//! can never fail.

use std::path::Path;

use armory_core::layout::Layout;
use armory_core::types::{StrategyKind, ToolSpec};

use crate::exec::CommandSpec;
use crate::hints::{InstallHint, ReadmeClassifier};
use crate::source::SourceTree;

/// One step of a strategy recipe
#[derive(Debug, Clone)]
pub struct Step {
    pub command: CommandSpec,
    /// An optional step may fail without failing the candidate
    pub optional: bool,
}

impl Step {
    fn required(command: CommandSpec) -> Self {
        Self {
            command,
            optional: false,
        }
    }

    fn optional(command: CommandSpec) -> Self {
        Self {
            command,
            optional: true,
        }
    }
}

/// A recognized installation method with its recipe
#[derive(Debug, Clone)]
pub struct StrategyCandidate {
    pub kind: StrategyKind,
    pub steps: Vec<Step>,
    /// Ledger reason recorded when this candidate succeeds
    pub success_reason: String,
}

/// Produces ordered strategy candidates for an acquired tree
pub struct StrategyResolver {
    classifier: ReadmeClassifier,
    layout: Layout,
}

impl StrategyResolver {
    pub fn new(layout: Layout) -> Self {
        Self {
            classifier: ReadmeClassifier::new(),
            layout,
        }
    }

    /// Ordered candidates, strongest first, fallback always last
    ///
    /// A strategy override in the spec pins the list to that single kind
    /// (plus the fallback), bypassing both markers and README hints.
    pub fn classify(&self, spec: &ToolSpec, tree: &SourceTree) -> Vec<StrategyCandidate> {
        if let Some(kind) = spec.strategy {
            let mut candidates = vec![self.candidate(kind, spec, tree)];
            if kind != StrategyKind::DocumentationFallback {
                candidates.push(self.candidate(StrategyKind::DocumentationFallback, spec, tree));
            }
            return candidates;
        }

        // README hints apply only when no manifest disambiguates
        let hint = if tree.markers.any_manifest() {
            None
        } else {
            tree.readme_text()
                .and_then(|text| self.classifier.classify(&text))
        };

        let mut candidates = Vec::new();
        let mut push = |resolver: &Self, kind: StrategyKind| {
            candidates.push(resolver.candidate(kind, spec, tree));
        };

        if tree.entry_script.is_some() {
            push(self, StrategyKind::DirectScriptRun);
        }
        if tree.markers.packaging_manifest.is_some() || hint == Some(InstallHint::PackagedInstall) {
            push(self, StrategyKind::PackagedInstall);
        }
        if (tree.markers.requirements.is_some() && tree.markers.packaging_manifest.is_none())
            || hint == Some(InstallHint::RequirementsInstall)
        {
            push(self, StrategyKind::RequirementsOnly);
        }
        if tree.markers.module_manifest.is_some() || hint == Some(InstallHint::ModuleBuild) {
            push(self, StrategyKind::ModuleBuild);
        }
        if tree.markers.node_manifest.is_some() || hint == Some(InstallHint::NodeInstall) {
            push(self, StrategyKind::NodeDependencies);
        }
        if tree.markers.make_recipe.is_some() || hint == Some(InstallHint::MakeInstall) {
            push(self, StrategyKind::MakeBuild);
        }

        if candidates.is_empty() {
            candidates.push(self.candidate(StrategyKind::ExecutableDiscovery, spec, tree));
        }
        candidates.push(self.candidate(StrategyKind::DocumentationFallback, spec, tree));

        candidates
    }

    fn candidate(&self, kind: StrategyKind, spec: &ToolSpec, tree: &SourceTree) -> StrategyCandidate {
        let env_dir = self.layout.env_dir(&spec.name);
        let pip = env_dir.join("bin/pip");
        let root = tree.root.as_path();

        let (steps, success_reason) = match kind {
            StrategyKind::DirectScriptRun => (
                Vec::new(),
                "entry script published as command".to_string(),
            ),
            StrategyKind::PackagedInstall => (
                vec![
                    Step::required(venv_step(&env_dir)),
                    Step::required(
                        CommandSpec::new(pip.display().to_string())
                            .arg("install")
                            .arg(root.display().to_string()),
                    ),
                ],
                format!("installed in isolated environment {}", env_dir.display()),
            ),
            StrategyKind::RequirementsOnly => {
                let requirements = tree
                    .markers
                    .requirements
                    .clone()
                    .unwrap_or_else(|| root.join("requirements.txt"));
                (
                    vec![
                        Step::required(venv_step(&env_dir)),
                        Step::required(
                            CommandSpec::new(pip.display().to_string())
                                .arg("install")
                                .arg("-r")
                                .arg(requirements.display().to_string()),
                        ),
                        // Packaged install is attempted but not required
                        Step::optional(
                            CommandSpec::new(pip.display().to_string())
                                .arg("install")
                                .arg(root.display().to_string()),
                        ),
                    ],
                    format!(
                        "dependencies installed in isolated environment {}",
                        env_dir.display()
                    ),
                )
            }
            StrategyKind::ModuleBuild => (
                vec![Step::required(
                    CommandSpec::new("go")
                        .arg("build")
                        .arg("-o")
                        .arg(root.join(&spec.name).display().to_string())
                        .arg(".")
                        .current_dir(root),
                )],
                "compiled module to named binary".to_string(),
            ),
            StrategyKind::NodeDependencies => (
                vec![Step::required(
                    CommandSpec::new("npm").arg("install").current_dir(root),
                )],
                "node dependencies installed".to_string(),
            ),
            StrategyKind::MakeBuild => (
                vec![Step::required(CommandSpec::new("make").current_dir(root))],
                "built via make".to_string(),
            ),
            StrategyKind::ExecutableDiscovery => (
                Vec::new(),
                "existing executable published as command".to_string(),
            ),
            StrategyKind::DocumentationFallback => (
                Vec::new(),
                "documentation only, pager wrapper published".to_string(),
            ),
        };

        StrategyCandidate {
            kind,
            steps,
            success_reason,
        }
    }
}

fn venv_step(env_dir: &Path) -> CommandSpec {
    CommandSpec::new("python3")
        .arg("-m")
        .arg("venv")
        .arg(env_dir.display().to_string())
}
