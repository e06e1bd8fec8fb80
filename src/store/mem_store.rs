// cid-blockstore/src/store/mem_store.rs

use async_trait::async_trait;
use futures::{StreamExt, stream};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{BlockstoreError, Result};
use crate::key::Key;
use crate::platform::BoxStream;
use super::batch::{Batch, BatchOp};
use super::datastore::Datastore;
use super::query::{Entry, Query};

#[derive(Debug, Default)]
pub struct MemoryDatastoreInner {
    data: HashMap<Key, Vec<u8>>,
}

/// An in-memory `Datastore` implementation using `tokio::sync::RwLock`.
/// Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatastore {
    inner: Arc<RwLock<MemoryDatastoreInner>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.data.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn keys(&self) -> Vec<Key> {
        let guard = self.inner.read().await;
        let mut keys: Vec<Key> = guard.data.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Datastore for MemoryDatastore {
    async fn get(&self, key: &Key) -> Result<Vec<u8>> {
        let guard = self.inner.read().await;
        guard
            .data
            .get(key)
            .cloned()
            .ok_or_else(|| BlockstoreError::NotFound(key.clone()))
    }

    async fn put(&self, key: &Key, value: Vec<u8>) -> Result<()> {
        let mut guard = self.inner.write().await;
        guard.data.insert(key.clone(), value);
        Ok(())
    }

    async fn has(&self, key: &Key) -> Result<bool> {
        let guard = self.inner.read().await;
        Ok(guard.data.contains_key(key))
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        let mut guard = self.inner.write().await;
        guard.data.remove(key);
        Ok(())
    }

    fn query(&self, query: Query) -> BoxStream<'_, Result<Entry>> {
        let inner = Arc::clone(&self.inner);
        let with_values = query.needs_values();
        // Keys are snapshot on first poll; values are read as entries are pulled.
        let listing = async move {
            let keys: Vec<Key> = inner.read().await.data.keys().cloned().collect();
            stream::iter(keys).filter_map(move |key| {
                let inner = Arc::clone(&inner);
                async move {
                    let guard = inner.read().await;
                    // Deleted since the snapshot.
                    let value = guard.data.get(&key)?;
                    let value = with_values.then(|| value.clone());
                    Some(Ok(Entry { key, value }))
                }
            })
        };
        query.apply_stream(Box::pin(stream::once(listing).flatten()))
    }

    async fn commit(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        // A single write guard makes the whole batch visible at once.
        let mut guard = self.inner.write().await;
        for op in batch.into_ops() {
            match op {
                BatchOp::Put(key, value) => {
                    guard.data.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    guard.data.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn get_put_has_delete() {
        let store = MemoryDatastore::new();
        let key = Key::new("/hello");

        assert!(!store.has(&key).await.unwrap());
        assert!(store.get(&key).await.unwrap_err().is_not_found());

        store.put(&key, b"world".to_vec()).await.unwrap();
        assert!(store.has(&key).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap(), b"world");

        store.delete(&key).await.unwrap();
        assert!(!store.has(&key).await.unwrap());
        // Deleting again is fine.
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn batch_applies_in_order() {
        let store = MemoryDatastore::new();
        let mut batch = store.batch();
        batch.put(Key::new("/a"), vec![1]);
        batch.put(Key::new("/b"), vec![2]);
        batch.delete(Key::new("/a"));
        store.commit(batch).await.unwrap();

        assert_eq!(store.keys().await, vec![Key::new("/b")]);
    }

    #[tokio::test]
    async fn entries_deleted_mid_query_are_skipped() {
        let store = MemoryDatastore::new();
        store.put(&Key::new("/a"), vec![1]).await.unwrap();
        store.put(&Key::new("/b"), vec![2]).await.unwrap();

        let mut stream = store.query(Query::keys_only());
        let first = stream.try_next().await.unwrap().unwrap();
        let other = if first.key == Key::new("/a") { Key::new("/b") } else { Key::new("/a") };
        store.delete(&other).await.unwrap();

        assert_eq!(first.value, None);
        assert!(stream.try_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn query_is_lazy_and_filtered() {
        let store = MemoryDatastore::new();
        let stream = store.query(Query::with_prefix("/x"));
        // Written after the stream was created but before it was polled.
        store.put(&Key::new("/x/1"), vec![1]).await.unwrap();
        store.put(&Key::new("/y/1"), vec![2]).await.unwrap();

        let found: Vec<Entry> = stream.try_collect().await.unwrap();
        assert_eq!(found, vec![Entry::new(Key::new("/x/1"), vec![1])]);
    }
}
