// cid-blockstore/src/store/datastore.rs

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::key::Key;
use crate::platform::{BoxStream, MaybeSendSync};

use super::batch::Batch;
use super::query::{Entry, Query};

/// Trait for a generic key/value datastore.
/// Implementations store opaque byte values under path-like [`Key`]s.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Datastore: MaybeSendSync + std::fmt::Debug + 'static {
    /// Retrieves the value stored under `key`.
    /// Fails with `BlockstoreError::NotFound` if the key is absent.
    async fn get(&self, key: &Key) -> Result<Vec<u8>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn put(&self, key: &Key, value: Vec<u8>) -> Result<()>; // Takes ownership of value

    async fn has(&self, key: &Key) -> Result<bool>;

    /// Removes `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &Key) -> Result<()>;

    /// Lazily yields the entries matching `query`. The stream is single-pass.
    fn query(&self, query: Query) -> BoxStream<'_, Result<Entry>>;

    /// Starts an empty batch to be handed back to [`Datastore::commit`].
    fn batch(&self) -> Batch {
        Batch::new()
    }

    /// Applies every operation of `batch`, all or nothing as far as the store allows.
    async fn commit(&self, batch: Batch) -> Result<()>;

    /// Releases the store. The stores in this crate tolerate repeated calls.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl<T: Datastore> Datastore for Arc<T> {
    async fn get(&self, key: &Key) -> Result<Vec<u8>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &Key, value: Vec<u8>) -> Result<()> {
        (**self).put(key, value).await
    }

    async fn has(&self, key: &Key) -> Result<bool> {
        (**self).has(key).await
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        (**self).delete(key).await
    }

    fn query(&self, query: Query) -> BoxStream<'_, Result<Entry>> {
        (**self).query(query)
    }

    fn batch(&self) -> Batch {
        (**self).batch()
    }

    async fn commit(&self, batch: Batch) -> Result<()> {
        (**self).commit(batch).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}
