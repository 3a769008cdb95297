use anyhow::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::ClassFacts;
use crate::core::archive::ArchiveFingerprint;

const DEFAULT_MAX_MEMORY_ENTRIES: usize = 256;

/// Parsed facts of every class in one archive, tagged with the archive state they came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedArchive {
    pub fingerprint: ArchiveFingerprint,
    pub classes: Vec<ClassFacts>,
}

/// Thread-safe cache of parsed archives with memory and (best-effort) disk storage
pub struct FactsCache {
    memory_cache: DashMap<PathBuf, CachedArchive>,
    cache_dir: Option<PathBuf>,
    max_memory_entries: usize,
}

impl FactsCache {
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        let resolved_dir =
            cache_dir.unwrap_or_else(|| std::env::temp_dir().join("apisurface_cache"));
        let cache_dir = match fs::create_dir_all(&resolved_dir) {
            Ok(()) => Some(resolved_dir),
            Err(err) => {
                warn!(
                    dir = %resolved_dir.display(),
                    error = %err,
                    "failed to initialize disk cache, keeping facts in memory only"
                );
                None
            }
        };

        Self {
            memory_cache: DashMap::with_capacity(DEFAULT_MAX_MEMORY_ENTRIES),
            cache_dir,
            max_memory_entries: DEFAULT_MAX_MEMORY_ENTRIES,
        }
    }

    /// Build an in-memory-only cache without touching the filesystem
    pub fn in_memory_only() -> Self {
        Self {
            memory_cache: DashMap::with_capacity(DEFAULT_MAX_MEMORY_ENTRIES),
            cache_dir: None,
            max_memory_entries: DEFAULT_MAX_MEMORY_ENTRIES,
        }
    }

    /// Whether the archive changed (modification time or size) since it was cached
    pub fn needs_update(&self, fingerprint: &ArchiveFingerprint) -> bool {
        if let Some(entry) = self.memory_cache.get(&fingerprint.path) {
            return entry.fingerprint != *fingerprint;
        }

        if let Some(cache_path) = self.cache_path(&fingerprint.path) {
            if cache_path.exists() {
                if let Ok(entry) = self.load_from_disk(&cache_path) {
                    return entry.fingerprint != *fingerprint;
                }
            }
        }

        true
    }

    /// Cached facts for the archive, if they are still valid
    pub fn get(&self, fingerprint: &ArchiveFingerprint) -> Option<Vec<ClassFacts>> {
        if let Some(entry) = self.memory_cache.get(&fingerprint.path) {
            if entry.fingerprint == *fingerprint {
                return Some(entry.classes.clone());
            }
            return None;
        }

        let cache_path = self.cache_path(&fingerprint.path)?;
        let entry = self.load_from_disk(&cache_path).ok()?;
        if entry.fingerprint != *fingerprint {
            return None;
        }

        let classes = entry.classes.clone();
        if self.memory_cache.len() < self.max_memory_entries {
            self.memory_cache.insert(fingerprint.path.clone(), entry);
        }
        Some(classes)
    }

    pub fn store(&self, fingerprint: &ArchiveFingerprint, classes: &[ClassFacts]) -> Result<()> {
        let entry = CachedArchive {
            fingerprint: fingerprint.clone(),
            classes: classes.to_vec(),
        };

        if self.memory_cache.len() >= self.max_memory_entries {
            if let Some(entry) = self.memory_cache.iter().next() {
                let key = entry.key().clone();
                drop(entry);
                self.memory_cache.remove(&key);
            }
        }

        if let Some(cache_path) = self.cache_path(&fingerprint.path) {
            self.store_to_disk(&cache_path, &entry)?;
        }
        self.memory_cache.insert(fingerprint.path.clone(), entry);

        Ok(())
    }

    /// Clear all caches
    pub fn clear(&self) -> Result<()> {
        self.memory_cache.clear();
        if let Some(cache_dir) = &self.cache_dir {
            if cache_dir.exists() {
                fs::remove_dir_all(cache_dir)?;
                fs::create_dir_all(cache_dir)?;
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_entries: self.memory_cache.len(),
            disk_entries: self.disk_entries(),
        }
    }

    fn cache_path(&self, archive_path: &Path) -> Option<PathBuf> {
        let cache_dir = self.cache_dir.as_ref()?;

        let mut hasher = DefaultHasher::new();
        archive_path.hash(&mut hasher);
        let hash = hasher.finish();

        Some(cache_dir.join(format!("facts_{:x}.bincode", hash)))
    }

    fn load_from_disk(&self, cache_path: &Path) -> Result<CachedArchive> {
        let data = fs::read(cache_path)?;
        let entry: CachedArchive = bincode::deserialize(&data)?;
        Ok(entry)
    }

    fn store_to_disk(&self, cache_path: &Path, entry: &CachedArchive) -> Result<()> {
        let data = bincode::serialize(entry)?;
        fs::write(cache_path, data)?;
        Ok(())
    }

    fn disk_entries(&self) -> usize {
        self.cache_dir
            .as_ref()
            .and_then(|dir| fs::read_dir(dir).ok())
            .map(|entries| entries.filter_map(|e| e.ok()).count())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub disk_entries: usize,
}
