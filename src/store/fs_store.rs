// cid-blockstore/src/store/fs_store.rs

use async_trait::async_trait;
use futures::stream;
use log::{trace, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

use crate::error::{BlockstoreError, Result};
use crate::key::Key;
use crate::platform::BoxStream;
use super::batch::{Batch, BatchOp};
use super::datastore::Datastore;
use super::query::{Entry, Query};

/// Extension of every value file.
pub const DATA_EXTENSION: &str = "data";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A flat-file `Datastore`: key `/a/b` is stored in `<root>/a/b.data`.
///
/// Writes go to a temporary file in the same directory and are renamed into place,
/// so readers never observe a half-written value.
#[derive(Debug, Clone)]
pub struct FsDatastore {
    root: PathBuf,
}

impl FsDatastore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &Key) -> Result<PathBuf> {
        if key.is_root() {
            return Err(BlockstoreError::InvalidKey("the root key has no value".to_string()));
        }
        let mut path = self.root.clone();
        for ns in key.namespaces() {
            // Dot names are reserved for in-flight temp files.
            if ns.starts_with('.') || ns.contains('\\') {
                return Err(BlockstoreError::InvalidKey(format!("{} is not a safe path", key)));
            }
            path.push(ns);
        }
        path.set_file_name(format!("{}.{}", key.name(), DATA_EXTENSION));
        Ok(path)
    }

    /// Writes `value` next to `path` under a unique temporary name.
    async fn write_temp(path: &Path, value: &[u8]) -> Result<PathBuf> {
        let parent = path
            .parent()
            .ok_or_else(|| BlockstoreError::StorageError(format!("{} has no parent", path.display())))?;
        fs::create_dir_all(parent).await?;
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp = parent.join(format!(".{}.{}.tmp", std::process::id(), n));
        fs::write(&temp, value).await?;
        Ok(temp)
    }

    async fn remove_if_present(path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn key_from_relative(relative: &Path) -> Option<Key> {
    let mut namespaces = Vec::new();
    for component in relative.components() {
        namespaces.push(component.as_os_str().to_str()?.to_string());
    }
    let last = namespaces.pop()?;
    let name = last.strip_suffix(&format!(".{}", DATA_EXTENSION))?.to_string();
    namespaces.push(name);
    Some(Key::with_namespaces(namespaces))
}

/// Depth-first listing state: directories still to visit and the one being read.
struct Walk {
    root: PathBuf,
    pending: Vec<PathBuf>,
    current: Option<fs::ReadDir>,
    with_values: bool,
}

impl Walk {
    fn new(root: PathBuf, with_values: bool) -> Self {
        Self { pending: vec![root.clone()], root, current: None, with_values }
    }

    /// The next entry under the root, or `None` once every directory has been read.
    async fn next(&mut self) -> Option<Result<Entry>> {
        loop {
            if self.current.is_none() {
                let dir = self.pending.pop()?;
                match fs::read_dir(&dir).await {
                    Ok(read_dir) => self.current = Some(read_dir),
                    // Removed since it was listed.
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => return Some(Err(e.into())),
                }
            }
            let next = match self.current.as_mut() {
                Some(read_dir) => read_dir.next_entry().await,
                None => continue,
            };
            match next {
                Ok(Some(entry)) => {
                    if let Some(item) = self.visit(entry).await.transpose() {
                        return Some(item);
                    }
                }
                Ok(None) => self.current = None,
                Err(e) => {
                    self.current = None;
                    return Some(Err(e.into()));
                }
            }
        }
    }

    async fn visit(&mut self, entry: fs::DirEntry) -> Result<Option<Entry>> {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            self.pending.push(path);
            return Ok(None);
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            return Ok(None); // in-flight temp file
        }
        let key = match path.strip_prefix(&self.root).ok().and_then(key_from_relative) {
            Some(key) => key,
            None => {
                warn!("FsDatastore: skipping non-data file {}", path.display());
                return Ok(None);
            }
        };
        let value = if self.with_values {
            match fs::read(&path).await {
                Ok(bytes) => Some(bytes),
                // Deleted between listing and reading.
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        } else {
            None
        };
        Ok(Some(Entry { key, value }))
    }
}

#[async_trait]
impl Datastore for FsDatastore {
    async fn get(&self, key: &Key) -> Result<Vec<u8>> {
        let path = self.key_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BlockstoreError::NotFound(key.clone())),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &Key, value: Vec<u8>) -> Result<()> {
        let path = self.key_path(key)?;
        let temp = Self::write_temp(&path, &value).await?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        trace!("FsDatastore: wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }

    async fn has(&self, key: &Key) -> Result<bool> {
        let path = self.key_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        let path = self.key_path(key)?;
        Self::remove_if_present(&path).await
    }

    fn query(&self, query: Query) -> BoxStream<'_, Result<Entry>> {
        let walk = Walk::new(self.root.clone(), query.needs_values());
        let entries = stream::unfold(walk, |mut walk| async move {
            let item = walk.next().await?;
            Some((item, walk))
        });
        query.apply_stream(Box::pin(entries))
    }

    async fn commit(&self, batch: Batch) -> Result<()> {
        // Stage every value first so a failed write leaves the visible state untouched.
        let mut staged: Vec<Option<(PathBuf, PathBuf)>> = Vec::with_capacity(batch.len());
        for op in batch.ops() {
            let result = match op {
                BatchOp::Put(key, value) => match self.key_path(key) {
                    Ok(path) => Self::write_temp(&path, value).await.map(|temp| Some((temp, path))),
                    Err(e) => Err(e),
                },
                BatchOp::Delete(key) => self.key_path(key).map(|_| None),
            };
            match result {
                Ok(entry) => staged.push(entry),
                Err(e) => {
                    for (temp, _) in staged.into_iter().flatten() {
                        let _ = fs::remove_file(&temp).await;
                    }
                    return Err(e);
                }
            }
        }

        for (op, staged) in batch.ops().iter().zip(staged) {
            match (op, staged) {
                (BatchOp::Put(..), Some((temp, path))) => fs::rename(&temp, &path).await?,
                (BatchOp::Delete(key), _) => Self::remove_if_present(&self.key_path(key)?).await?,
                (BatchOp::Put(key, _), None) => {
                    return Err(BlockstoreError::StorageError(format!("no staged value for {}", key)));
                }
            }
        }
        trace!("FsDatastore: committed batch of {} ops under {}", batch.len(), self.root.display());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        trace!("FsDatastore: closing {}", self.root.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn keys_map_to_data_files() {
        let temp = TempDir::new().unwrap();
        let store = FsDatastore::open(temp.path()).await.unwrap();
        store.put(&Key::new("/QA/CIQABC"), b"v".to_vec()).await.unwrap();

        assert!(temp.path().join("QA").join("CIQABC.data").is_file());
        assert_eq!(store.get(&Key::new("/QA/CIQABC")).await.unwrap(), b"v");
    }

    #[tokio::test]
    async fn unsafe_keys_are_rejected() {
        let temp = TempDir::new().unwrap();
        let store = FsDatastore::open(temp.path()).await.unwrap();

        let err = store.put(&Key::new("/../escape"), vec![]).await.unwrap_err();
        assert!(matches!(err, BlockstoreError::InvalidKey(_)));
        // Would be hidden from listings as a temp file.
        let err = store.put(&Key::new("/.x"), vec![]).await.unwrap_err();
        assert!(matches!(err, BlockstoreError::InvalidKey(_)));
        assert!(matches!(store.get(&Key::root()).await, Err(BlockstoreError::InvalidKey(_))));
    }

    #[test]
    fn relative_paths_become_keys() {
        assert_eq!(key_from_relative(Path::new("QA/CIQABC.data")), Some(Key::new("/QA/CIQABC")));
        assert_eq!(key_from_relative(Path::new("notes.txt")), None);
    }

    #[tokio::test]
    async fn walk_lists_nested_directories_and_skips_temp_files() {
        use futures::TryStreamExt;

        let temp = TempDir::new().unwrap();
        let store = FsDatastore::open(temp.path()).await.unwrap();
        store.put(&Key::new("/top"), vec![1]).await.unwrap();
        store.put(&Key::new("/a/b/deep"), vec![2]).await.unwrap();
        std::fs::write(temp.path().join("a").join(".123.0.tmp"), b"partial").unwrap();

        let mut keys: Vec<Key> = store
            .query(Query::keys_only())
            .map_ok(|e| e.key)
            .try_collect()
            .await
            .unwrap();
        keys.sort();
        assert_eq!(keys, vec![Key::new("/a/b/deep"), Key::new("/top")]);
    }
}
