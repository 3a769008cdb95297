use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use apisurface::config::{AnalysisConfig, MissingClassPolicy, OwnerExclusionPolicy};
use apisurface::core::{ApiAnalyzer, ApiArchives, ApiTree, Archive, FileArchive};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "apisurface",
    version = "0.1.0",
    author = "apisurface developers",
    about = "Extracts the public API surface of JVM archives"
)]
struct Cli {
    /// Jar or class file defining the API (repeatable; directories are searched)
    #[arg(short, long = "archive", value_name = "PATH", required = true)]
    archives: Vec<PathBuf>,

    /// Runtime dependency consulted for types the API exposes
    #[arg(short, long = "supplementary", value_name = "PATH")]
    supplementary: Vec<PathBuf>,

    /// Archive of a second version to analyse alongside the first
    #[arg(long = "new-archive", value_name = "PATH")]
    new_archives: Vec<PathBuf>,

    /// Runtime dependency of the second version
    #[arg(long = "new-supplementary", value_name = "PATH")]
    new_supplementary: Vec<PathBuf>,

    /// Archives whose classes are always present at runtime
    #[arg(long, value_name = "PATH")]
    bootstrap: Vec<PathBuf>,

    /// What to do with API types whose class file cannot be found
    #[arg(long, value_name = "POLICY", value_enum, default_value_t = MissingClasses::Error)]
    missing_classes: MissingClasses,

    /// Do not look for annotation types used by the API
    #[arg(long)]
    ignore_missing_annotations: bool,

    /// Whether a used member type survives the exclusion of its owner
    #[arg(long, value_name = "POLICY", value_enum, default_value_t = OwnerExclusion::PromoteUsedInner)]
    owner_exclusion: OwnerExclusion,

    /// Comma-separated regular expressions of class names to include
    #[arg(long, value_name = "REGEX", value_delimiter = ',')]
    include: Vec<String>,

    /// Comma-separated regular expressions of class names to exclude
    #[arg(long, value_name = "REGEX", value_delimiter = ',')]
    exclude: Vec<String>,

    /// Comma-separated regular expressions of package names to include
    #[arg(long, value_name = "REGEX", value_delimiter = ',')]
    include_packages: Vec<String>,

    /// Comma-separated regular expressions of package names to exclude
    #[arg(long, value_name = "REGEX", value_delimiter = ',')]
    exclude_packages: Vec<String>,

    /// Cache parsed archives in this directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Disable the parsed-facts cache
    #[arg(long)]
    no_cache: bool,

    /// Output file for the JSON tree (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
#[value(rename_all = "kebab-case")]
enum MissingClasses {
    Error,
    Ignore,
    Report,
}

impl From<MissingClasses> for MissingClassPolicy {
    fn from(value: MissingClasses) -> Self {
        match value {
            MissingClasses::Error => MissingClassPolicy::Error,
            MissingClasses::Ignore => MissingClassPolicy::Ignore,
            MissingClasses::Report => MissingClassPolicy::Report,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
#[value(rename_all = "kebab-case")]
enum OwnerExclusion {
    PromoteUsedInner,
    ExcludeWithOwner,
}

impl From<OwnerExclusion> for OwnerExclusionPolicy {
    fn from(value: OwnerExclusion) -> Self {
        match value {
            OwnerExclusion::PromoteUsedInner => OwnerExclusionPolicy::PromoteUsedInner,
            OwnerExclusion::ExcludeWithOwner => OwnerExclusionPolicy::ExcludeWithOwner,
        }
    }
}

#[derive(Serialize)]
struct PairReport<'a> {
    old: &'a ApiTree,
    new: &'a ApiTree,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let start_time = Instant::now();

    let mut config = AnalysisConfig::default()
        .with_missing_classes(cli.missing_classes.into())
        .with_ignore_missing_annotations(cli.ignore_missing_annotations)
        .with_owner_exclusion(cli.owner_exclusion.into())
        .with_bootstrap_classpath(cli.bootstrap)
        .with_include(cli.include)
        .with_exclude(cli.exclude)
        .with_packages(cli.include_packages, cli.exclude_packages);
    if !cli.no_cache {
        config = config.with_cache_dir(cli.cache_dir);
    }

    let analyzer = ApiAnalyzer::new(config).context("invalid analysis configuration")?;
    let old = ApiArchives::new(expand(&cli.archives)).with_supplementary(expand(&cli.supplementary));

    let mut writer: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    if cli.new_archives.is_empty() {
        let tree = analyzer.analyze(&old)?;
        info!(types = tree.len(), roots = tree.root_ids().len(), "API extracted");
        serde_json::to_writer_pretty(&mut writer, &tree)?;
    } else {
        let new = ApiArchives::new(expand(&cli.new_archives))
            .with_supplementary(expand(&cli.new_supplementary));
        let (old_tree, new_tree) = analyzer.analyze_pair(&old, &new)?;
        info!(
            old_types = old_tree.len(),
            new_types = new_tree.len(),
            "API extracted for both versions"
        );
        serde_json::to_writer_pretty(
            &mut writer,
            &PairReport {
                old: &old_tree,
                new: &new_tree,
            },
        )?;
    }
    writeln!(writer)?;
    writer.flush()?;

    info!(
        elapsed_s = start_time.elapsed().as_secs_f64(),
        "done"
    );
    Ok(())
}

/// Files are taken as given; directories contribute every archive below them.
fn expand(paths: &[PathBuf]) -> Vec<Box<dyn Archive>> {
    paths
        .iter()
        .flat_map(|path| archives_at(path))
        .collect()
}

fn archives_at(path: &Path) -> Vec<Box<dyn Archive>> {
    if path.is_dir() {
        FileArchive::discover(path)
            .into_iter()
            .map(|archive| Box::new(archive) as Box<dyn Archive>)
            .collect()
    } else {
        vec![Box::new(FileArchive::new(path))]
    }
}
