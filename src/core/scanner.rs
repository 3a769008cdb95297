use rayon::prelude::*;
use std::io;
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use zip::result::ZipError;

use super::archive::{read_class_entries, Archive, BootstrapClasspath, ClassEntry};
use super::filter::InclusionFilter;
use super::graph::TypeGraph;
use super::usesite::UseKind;
use crate::parsers::cache::FactsCache;
use crate::parsers::{parse_class, ClassFacts, ClassParseError};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("IO error while reading {archive}: {source}")]
    Io {
        archive: String,
        #[source]
        source: io::Error,
    },
    #[error("ZIP error while reading {archive}: {source}")]
    Zip {
        archive: String,
        #[source]
        source: ZipError,
    },
    #[error("class parse error in {archive}!{entry}: {source}")]
    ClassFile {
        archive: String,
        entry: String,
        #[source]
        source: ClassParseError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    ScanningPrimary,
    ScanningSupplementary,
    Done,
}

/// The graph built by a scan plus what it could not resolve.
pub struct ScanOutcome {
    pub graph: TypeGraph,
    /// API types that no archive defined.
    pub unresolved: Vec<String>,
    /// Phases the driver went through, in order, ending with `Done`.
    pub phases: Vec<ScanPhase>,
    pub archives_scanned: usize,
    pub classes_scanned: usize,
}

/// Feeds archives into a [`TypeGraph`]: all primary archives first, then
/// supplementary ones until every referenced type has been found.
pub struct ArchiveScanDriver<'a> {
    filter: &'a dyn InclusionFilter,
    bootstrap: &'a BootstrapClasspath,
    cache: Option<&'a FactsCache>,
    parallel: bool,
    ignore_missing_annotations: bool,
    graph: TypeGraph,
    phase: ScanPhase,
    phases: Vec<ScanPhase>,
    archives_scanned: usize,
    classes_scanned: usize,
}

impl<'a> ArchiveScanDriver<'a> {
    pub fn new(filter: &'a dyn InclusionFilter, bootstrap: &'a BootstrapClasspath) -> Self {
        Self {
            filter,
            bootstrap,
            cache: None,
            parallel: true,
            ignore_missing_annotations: false,
            graph: TypeGraph::new(),
            phase: ScanPhase::ScanningPrimary,
            phases: Vec::new(),
            archives_scanned: 0,
            classes_scanned: 0,
        }
    }

    pub fn with_cache(mut self, cache: &'a FactsCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_parallel_parsing(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Drops annotation uses so that annotation types are never looked for.
    pub fn with_ignore_missing_annotations(mut self, ignore: bool) -> Self {
        self.ignore_missing_annotations = ignore;
        self
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn graph(&self) -> &TypeGraph {
        &self.graph
    }

    pub fn run(
        mut self,
        primary: &[Box<dyn Archive>],
        supplementary: &[Box<dyn Archive>],
    ) -> Result<ScanOutcome, ScanError> {
        self.enter(ScanPhase::ScanningPrimary);
        for archive in primary {
            self.scan_archive(archive.as_ref(), true)?;
        }

        if self.graph.has_unresolved() && !supplementary.is_empty() {
            self.enter(ScanPhase::ScanningSupplementary);
            let mut pending = self.graph.pending_count();
            debug!(pending, "looking for referenced types in supplementary archives");

            for archive in supplementary {
                self.scan_archive(archive.as_ref(), false)?;

                let remaining = self.graph.pending_count();
                if remaining == pending {
                    debug!(archive = archive.name(), "archive resolved no referenced types");
                } else {
                    debug!(
                        archive = archive.name(),
                        resolved = pending.saturating_sub(remaining),
                        remaining,
                        "archive resolved referenced types"
                    );
                }
                pending = remaining;

                if !self.graph.has_unresolved() {
                    break;
                }
            }
        }
        self.enter(ScanPhase::Done);

        let unresolved = self.graph.unresolved();
        info!(
            archives = self.archives_scanned,
            classes = self.classes_scanned,
            types = self.graph.len(),
            pending = self.graph.pending_count(),
            unresolved = unresolved.len(),
            "scan finished"
        );

        Ok(ScanOutcome {
            graph: self.graph,
            unresolved,
            phases: self.phases,
            archives_scanned: self.archives_scanned,
            classes_scanned: self.classes_scanned,
        })
    }

    fn enter(&mut self, phase: ScanPhase) {
        trace!(?phase, "entering scan phase");
        self.phase = phase;
        self.phases.push(phase);
    }

    fn scan_archive(&mut self, archive: &dyn Archive, primary: bool) -> Result<(), ScanError> {
        let classes = self.load_facts(archive)?;
        self.archives_scanned += 1;
        self.classes_scanned += classes.len();

        for facts in &classes {
            self.ingest(facts, archive.name(), primary);
        }
        Ok(())
    }

    fn load_facts(&self, archive: &dyn Archive) -> Result<Vec<ClassFacts>, ScanError> {
        let fingerprint = self.cache.and_then(|_| archive.fingerprint());
        if let (Some(cache), Some(fingerprint)) = (self.cache, &fingerprint) {
            if let Some(classes) = cache.get(fingerprint) {
                debug!(archive = archive.name(), classes = classes.len(), "using cached facts");
                return Ok(classes);
            }
        }

        let entries = read_class_entries(archive)?;
        let classes = self.parse_entries(archive.name(), &entries)?;

        if let (Some(cache), Some(fingerprint)) = (self.cache, &fingerprint) {
            if let Err(err) = cache.store(fingerprint, &classes) {
                warn!(archive = archive.name(), error = %err, "failed to cache parsed facts");
            }
        }
        Ok(classes)
    }

    fn parse_entries(
        &self,
        archive: &str,
        entries: &[ClassEntry],
    ) -> Result<Vec<ClassFacts>, ScanError> {
        let parse = |entry: &ClassEntry| {
            parse_class(&entry.bytes).map_err(|source| ScanError::ClassFile {
                archive: archive.to_string(),
                entry: entry.name.clone(),
                source,
            })
        };

        if self.parallel {
            entries.par_iter().map(parse).collect()
        } else {
            entries.iter().map(parse).collect()
        }
    }

    fn ingest(&mut self, facts: &ClassFacts, archive: &str, primary: bool) {
        if self.graph.is_resolved(&facts.binary_name) {
            trace!(class = %facts.binary_name, archive, "duplicate class, keeping first");
            return;
        }

        let id = self.graph.get_or_insert(&facts.binary_name);
        let mut seed = false;
        if primary && !facts.is_inner() {
            let binary = facts.binary_name.as_str();
            let included = self.filter.accepts(binary, binary);
            let excluded = self.filter.rejects(binary, binary);
            self.graph.set_inclusion(id, included, excluded);

            let ignored = excluded || !(included || self.filter.default_inclusion_case());
            seed = facts.is_accessible() && !ignored;
            trace!(class = binary, included, excluded, seed, "filtered top-level class");
        }

        for reported in facts.reported_uses() {
            if self.ignore_missing_annotations && reported.site.use_kind == UseKind::Annotates {
                continue;
            }
            if self.bootstrap.contains(&reported.used_type) {
                continue;
            }
            self.graph
                .record_use(&facts.binary_name, &reported.used_type, reported.site);
        }

        self.graph.commit_class(facts, archive, primary, seed);
    }
}
