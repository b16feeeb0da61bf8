//! README install-hint classification
//!
//! Some trees carry no recognizable manifest but their README shows the
//! install command. This classifier turns that text into a weak signal:
//! ordered rules, first match wins. It is consulted only when marker files
//! leave the strategy choice ambiguous and it never overrides a recognized
//! manifest. Substring-level text scanning is inherently brittle; keeping it
//! behind this one type means a per-tool strategy override in the catalog
//! can bypass it entirely.

use regex::Regex;

/// Install method suggested by README text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallHint {
    /// `pip install -r requirements.txt`
    RequirementsInstall,
    /// `pip install .` or `python setup.py install`
    PackagedInstall,
    /// `go build` / `go install`
    ModuleBuild,
    /// `npm install`
    NodeInstall,
    /// `make` / `make install`
    MakeInstall,
}

/// Ordered rule-based README scanner
pub struct ReadmeClassifier {
    rules: Vec<(Regex, InstallHint)>,
}

impl Default for ReadmeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadmeClassifier {
    /// Rule order is significant: `pip install -r` must be checked before
    /// the bare `pip install` form
    pub fn new() -> Self {
        let rules = [
            (r"pip3?\s+install\s+-r\b", InstallHint::RequirementsInstall),
            (r"pip3?\s+install\b", InstallHint::PackagedInstall),
            (r"python3?\s+setup\.py\b", InstallHint::PackagedInstall),
            (r"\bgo\s+(build|install)\b", InstallHint::ModuleBuild),
            (r"\bnpm\s+install\b", InstallHint::NodeInstall),
            (r"\bmake(\s+install)?\b", InstallHint::MakeInstall),
        ];

        Self {
            rules: rules
                .into_iter()
                .filter_map(|(pattern, hint)| Regex::new(pattern).ok().map(|re| (re, hint)))
                .collect(),
        }
    }

    /// First matching rule over the lowercased README text
    pub fn classify(&self, readme_text: &str) -> Option<InstallHint> {
        let text = readme_text.to_lowercase();
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(&text))
            .map(|(_, hint)| *hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirements_beats_bare_pip() {
        let classifier = ReadmeClassifier::new();
        let text = "Install with:\n\n    pip install -r requirements.txt\n";
        assert_eq!(
            classifier.classify(text),
            Some(InstallHint::RequirementsInstall)
        );
    }

    #[test]
    fn test_bare_pip_install() {
        let classifier = ReadmeClassifier::new();
        assert_eq!(
            classifier.classify("Run `pip install .` from the repo root."),
            Some(InstallHint::PackagedInstall)
        );
    }

    #[test]
    fn test_setup_py_maps_to_packaged() {
        let classifier = ReadmeClassifier::new();
        assert_eq!(
            classifier.classify("sudo python setup.py install"),
            Some(InstallHint::PackagedInstall)
        );
    }

    #[test]
    fn test_case_insensitive() {
        let classifier = ReadmeClassifier::new();
        assert_eq!(
            classifier.classify("PIP INSTALL mytool"),
            Some(InstallHint::PackagedInstall)
        );
    }

    #[test]
    fn test_no_hint_in_plain_prose() {
        let classifier = ReadmeClassifier::new();
        assert_eq!(
            classifier.classify("A scanner for things. See the wiki for docs."),
            None
        );
    }

    #[test]
    fn test_go_and_npm_hints() {
        let classifier = ReadmeClassifier::new();
        assert_eq!(
            classifier.classify("go install ./..."),
            Some(InstallHint::ModuleBuild)
        );
        assert_eq!(
            classifier.classify("npm install && npm start"),
            Some(InstallHint::NodeInstall)
        );
    }
}
