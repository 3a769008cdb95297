use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use super::scanner::ScanError;

/// A named container of class files: a jar or a single `.class` file.
pub trait Archive: Send + Sync {
    fn name(&self) -> &str;

    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>>;

    /// Identity of the archive contents for caching. Archives without a stable
    /// backing file return `None` and are always parsed.
    fn fingerprint(&self) -> Option<ArchiveFingerprint> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchiveFingerprint {
    pub path: PathBuf,
    pub modified: u64,
    pub size: u64,
}

impl ArchiveFingerprint {
    pub fn of(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let modified = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Ok(Self {
            path: path.to_path_buf(),
            modified,
            size: metadata.len(),
        })
    }
}

/// An archive on disk.
#[derive(Debug, Clone)]
pub struct FileArchive {
    path: PathBuf,
    name: String,
}

impl FileArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All jars and class files below `root`, in path order.
    pub fn discover(root: &Path) -> Vec<FileArchive> {
        let mut paths: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.path().is_file() && is_archive_name(&entry.path().to_string_lossy()))
            .map(|entry| entry.into_path())
            .collect();
        paths.sort();
        paths.into_iter().map(FileArchive::new).collect()
    }
}

impl Archive for FileArchive {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(BufReader::new(File::open(&self.path)?)))
    }

    fn fingerprint(&self) -> Option<ArchiveFingerprint> {
        ArchiveFingerprint::of(&self.path).ok()
    }
}

/// An archive held in memory, named like a file so its kind can be told apart.
#[derive(Debug, Clone)]
pub struct MemoryArchive {
    name: String,
    bytes: Vec<u8>,
}

impl MemoryArchive {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

impl Archive for MemoryArchive {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(Cursor::new(self.bytes.as_slice())))
    }
}

/// Raw bytes of one class file inside an archive.
#[derive(Debug, Clone)]
pub struct ClassEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Reads every class file of an archive, in entry order. The archive stream
/// is fully consumed and dropped before the entries are returned.
pub fn read_class_entries(archive: &dyn Archive) -> Result<Vec<ClassEntry>, ScanError> {
    let name = archive.name();
    let io_error = |source| ScanError::Io {
        archive: name.to_string(),
        source,
    };

    let bytes = {
        let mut stream = archive.open().map_err(io_error)?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).map_err(io_error)?;
        bytes
    };

    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".class") {
        let entry_name = Path::new(name)
            .file_name()
            .map(|file| file.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        return Ok(vec![ClassEntry {
            name: entry_name,
            bytes,
        }]);
    }
    if !is_archive_name(&lower) {
        debug!(archive = name, "not a jar or class file, skipping");
        return Ok(Vec::new());
    }

    let zip_error = |source| ScanError::Zip {
        archive: name.to_string(),
        source,
    };
    let mut zip = ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;
    let mut entries = Vec::new();
    for idx in 0..zip.len() {
        let mut entry = zip.by_index(idx).map_err(zip_error)?;
        if !entry.is_file() {
            continue;
        }

        let entry_name = entry.name().to_string();
        if should_skip_entry(&entry_name) || !entry_name.ends_with(".class") {
            continue;
        }

        let mut buffer = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buffer).map_err(io_error)?;
        entries.push(ClassEntry {
            name: entry_name,
            bytes: buffer,
        });
    }

    debug!(archive = name, classes = entries.len(), "read archive");
    Ok(entries)
}

fn is_archive_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".jar") || lower.ends_with(".zip") || lower.ends_with(".class")
}

fn should_skip_entry(name: &str) -> bool {
    if name.starts_with("META-INF/") {
        return true;
    }
    if let Some(stripped) = name.strip_prefix("classes/") {
        return should_skip_entry(stripped);
    }
    name == "module-info.class" || name.ends_with("/module-info.class")
}

/// Classes assumed present at runtime: anything under `java.` plus every
/// class of the configured bootstrap archives.
#[derive(Debug, Default)]
pub struct BootstrapClasspath {
    archives: Vec<PathBuf>,
    names: OnceLock<HashSet<String>>,
}

impl BootstrapClasspath {
    pub fn new(archives: Vec<PathBuf>) -> Self {
        Self {
            archives,
            names: OnceLock::new(),
        }
    }

    pub fn contains(&self, binary_name: &str) -> bool {
        if binary_name.starts_with("java.") {
            return true;
        }
        if self.archives.is_empty() {
            return false;
        }
        self.names
            .get_or_init(|| self.index())
            .contains(binary_name)
    }

    fn index(&self) -> HashSet<String> {
        let names: HashSet<String> = self
            .archives
            .par_iter()
            .flat_map_iter(|path| match list_class_names(path) {
                Ok(names) => names,
                Err(err) => {
                    warn!(
                        archive = %path.display(),
                        error = %err,
                        "failed to index bootstrap archive"
                    );
                    Vec::new()
                }
            })
            .collect();
        debug!(classes = names.len(), "indexed bootstrap classpath");
        names
    }
}

fn list_class_names(path: &Path) -> anyhow::Result<Vec<String>> {
    let file = File::open(path)?;
    let archive = ZipArchive::new(BufReader::new(file))?;
    let names = archive
        .file_names()
        .filter_map(|name| {
            let name = name.strip_prefix("classes/").unwrap_or(name);
            if should_skip_entry(name) {
                return None;
            }
            name.strip_suffix(".class").map(|stem| stem.replace('/', "."))
        })
        .collect();
    Ok(names)
}
