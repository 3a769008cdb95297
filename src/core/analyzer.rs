use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use super::archive::{Archive, BootstrapClasspath};
use super::assembler::TreeAssembler;
use super::filter::{AcceptAll, InclusionFilter, PatternFilter};
use super::scanner::{ArchiveScanDriver, ScanError, ScanOutcome};
use super::tree::ApiTree;
use crate::config::AnalysisConfig;
use crate::parsers::cache::FactsCache;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(
        "the following classes that contribute to the public API could not be located: {}",
        .names.join(", ")
    )]
    MissingTypes { names: Vec<String> },
    #[error("invalid class name pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// The archives making up one version of a library.
#[derive(Default)]
pub struct ApiArchives {
    pub primary: Vec<Box<dyn Archive>>,
    pub supplementary: Vec<Box<dyn Archive>>,
}

impl ApiArchives {
    pub fn new(primary: Vec<Box<dyn Archive>>) -> Self {
        Self {
            primary,
            supplementary: Vec::new(),
        }
    }

    pub fn with_supplementary(mut self, supplementary: Vec<Box<dyn Archive>>) -> Self {
        self.supplementary = supplementary;
        self
    }
}

/// Scans archives and assembles their API tree.
pub struct ApiAnalyzer {
    config: AnalysisConfig,
    filter: Box<dyn InclusionFilter>,
    bootstrap: BootstrapClasspath,
    facts_cache: Option<FactsCache>,
}

impl ApiAnalyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        let filter: Box<dyn InclusionFilter> = if config.has_patterns() {
            Box::new(
                PatternFilter::new(&config.include, &config.exclude)?
                    .with_packages(&config.include_packages, &config.exclude_packages)?,
            )
        } else {
            Box::new(AcceptAll)
        };
        let facts_cache = config
            .use_cache
            .then(|| FactsCache::new(config.cache_dir.clone()));

        Ok(Self {
            bootstrap: BootstrapClasspath::new(config.bootstrap_classpath.clone()),
            config,
            filter,
            facts_cache,
        })
    }

    pub fn with_filter(mut self, filter: Box<dyn InclusionFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_facts_cache(mut self, cache: FactsCache) -> Self {
        self.facts_cache = Some(cache);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Runs the scan alone, leaving the type graph for inspection.
    pub fn scan(&self, archives: &ApiArchives) -> Result<ScanOutcome, ScanError> {
        let mut driver = ArchiveScanDriver::new(self.filter.as_ref(), &self.bootstrap)
            .with_parallel_parsing(self.config.parallel_parsing)
            .with_ignore_missing_annotations(self.config.ignore_missing_annotations);
        if let Some(cache) = &self.facts_cache {
            driver = driver.with_cache(cache);
        }
        driver.run(&archives.primary, &archives.supplementary)
    }

    pub fn analyze(&self, archives: &ApiArchives) -> Result<ApiTree, AnalysisError> {
        let start = Instant::now();
        let outcome = self.scan(archives)?;
        debug!(
            archives = outcome.archives_scanned,
            classes = outcome.classes_scanned,
            "scan complete, assembling tree"
        );

        let tree = TreeAssembler::from_config(&self.config).assemble(&outcome.graph)?;
        info!(
            types = tree.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "API analysis finished"
        );
        Ok(tree)
    }

    /// Analyses two versions concurrently, each on its own graph.
    pub fn analyze_pair(
        &self,
        old: &ApiArchives,
        new: &ApiArchives,
    ) -> Result<(ApiTree, ApiTree), AnalysisError> {
        let (old_tree, new_tree) = rayon::join(|| self.analyze(old), || self.analyze(new));
        Ok((old_tree?, new_tree?))
    }
}
