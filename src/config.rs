use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What to do with API types whose class file was never found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingClassPolicy {
    #[default]
    Error,
    Ignore,
    Report,
}

/// Whether a type used by the API survives when its owner was explicitly excluded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OwnerExclusionPolicy {
    #[default]
    PromoteUsedInner,
    ExcludeWithOwner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AnalysisConfig {
    pub missing_classes: MissingClassPolicy,
    /// Annotation types are not part of the API and never reported missing.
    pub ignore_missing_annotations: bool,
    pub owner_exclusion: OwnerExclusionPolicy,
    pub bootstrap_classpath: Vec<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub use_cache: bool,
    pub parallel_parsing: bool,
    /// Regular expressions over canonical class names.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Regular expressions over package names.
    pub include_packages: Vec<String>,
    pub exclude_packages: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            missing_classes: MissingClassPolicy::default(),
            ignore_missing_annotations: false,
            owner_exclusion: OwnerExclusionPolicy::default(),
            bootstrap_classpath: Vec::new(),
            cache_dir: None,
            use_cache: false,
            parallel_parsing: true,
            include: Vec::new(),
            exclude: Vec::new(),
            include_packages: Vec::new(),
            exclude_packages: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    pub fn with_missing_classes(mut self, policy: MissingClassPolicy) -> Self {
        self.missing_classes = policy;
        self
    }

    pub fn with_ignore_missing_annotations(mut self, ignore: bool) -> Self {
        self.ignore_missing_annotations = ignore;
        self
    }

    pub fn with_owner_exclusion(mut self, policy: OwnerExclusionPolicy) -> Self {
        self.owner_exclusion = policy;
        self
    }

    pub fn with_bootstrap_classpath(mut self, archives: Vec<PathBuf>) -> Self {
        self.bootstrap_classpath = archives;
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.use_cache = true;
        self.cache_dir = cache_dir;
        self
    }

    pub fn with_include(mut self, patterns: Vec<String>) -> Self {
        self.include = patterns;
        self
    }

    pub fn with_exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude = patterns;
        self
    }

    pub fn with_packages(mut self, include: Vec<String>, exclude: Vec<String>) -> Self {
        self.include_packages = include;
        self.exclude_packages = exclude;
        self
    }

    pub fn has_patterns(&self) -> bool {
        !(self.include.is_empty()
            && self.exclude.is_empty()
            && self.include_packages.is_empty()
            && self.exclude_packages.is_empty())
    }
}
