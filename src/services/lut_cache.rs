use lattice_lut::LatticeTable;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;

use crate::error::LutError;

/// File extensions offered as LUT files.
pub const LUT_EXTENSIONS: [&str; 3] = ["cube", "3dl", "lut"];

/// Whether `path` looks like a LUT file.
pub fn is_lut_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| LUT_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Read and parse a LUT file.
pub async fn load_lut(path: &Path) -> Result<LatticeTable, LutError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LutError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    LatticeTable::parse(&text).map_err(|source| LutError::Format {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Clone)]
struct CachedTable {
    modified: Option<SystemTime>,
    table: Arc<LatticeTable>,
}

/// Parsed LUTs keyed by path, reloaded when the file's mtime changes.
pub struct LutCache {
    cache: Arc<RwLock<HashMap<PathBuf, CachedTable>>>,
}

impl LutCache {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Return the parsed table for `path`, parsing it on first use or after
    /// the file changed on disk.
    pub async fn get_or_load(&self, path: &Path) -> Result<Arc<LatticeTable>, LutError> {
        let modified = tokio::fs::metadata(path)
            .await
            .map_err(|source| LutError::Read {
                path: path.to_path_buf(),
                source,
            })?
            .modified()
            .ok();

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(path) {
                if modified.is_some() && cached.modified == modified {
                    tracing::trace!(path = %path.display(), "LUT cache hit");
                    return Ok(cached.table.clone());
                }
            }
        }

        let table = Arc::new(load_lut(path).await?);
        tracing::debug!(path = %path.display(), size = table.size(), "Loaded LUT");

        let mut cache = self.cache.write().await;
        cache.insert(
            path.to_path_buf(),
            CachedTable {
                modified,
                table: table.clone(),
            },
        );
        Ok(table)
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn invalidate(&self, path: &Path) {
        self.cache.write().await.remove(path);
    }
}

impl Default for LutCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY_2: &str = "LUT_3D_SIZE 2\n\
        0 0 0\n1 0 0\n0 1 0\n1 1 0\n\
        0 0 1\n1 0 1\n0 1 1\n1 1 1\n";

    #[test]
    fn test_is_lut_file() {
        assert!(is_lut_file(Path::new("warm.cube")));
        assert!(is_lut_file(Path::new("/luts/FILM.CUBE")));
        assert!(is_lut_file(Path::new("a.3dl")));
        assert!(!is_lut_file(Path::new("photo.jpg")));
        assert!(!is_lut_file(Path::new("cube")));
    }

    #[tokio::test]
    async fn test_load_lut_parses_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.cube");
        std::fs::write(&path, IDENTITY_2).unwrap();

        let table = load_lut(&path).await.unwrap();
        assert_eq!(table.size(), 2);
    }

    #[tokio::test]
    async fn test_load_lut_missing_file() {
        let err = load_lut(Path::new("/nonexistent/x.cube")).await.unwrap_err();
        assert!(matches!(err, LutError::Read { .. }));
    }

    #[tokio::test]
    async fn test_load_lut_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.cube");
        std::fs::write(&path, "LUT_3D_SIZE 2\n0 0 0\n").unwrap();

        let err = load_lut(&path).await.unwrap_err();
        assert!(matches!(err, LutError::Format { .. }));
    }

    #[tokio::test]
    async fn test_cache_returns_same_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.cube");
        std::fs::write(&path, IDENTITY_2).unwrap();
        let cache = LutCache::new();

        let first = cache.get_or_load(&path).await.unwrap();
        let second = cache.get_or_load(&path).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_cache_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.cube");
        std::fs::write(&path, IDENTITY_2).unwrap();
        let cache = LutCache::new();

        let first = cache.get_or_load(&path).await.unwrap();
        cache.invalidate(&path).await;
        let second = cache.get_or_load(&path).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
    }
}
