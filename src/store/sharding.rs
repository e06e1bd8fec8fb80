// cid-blockstore/src/store/sharding.rs

use async_trait::async_trait;
use futures::TryStreamExt;
use log::debug;

use crate::error::{BlockstoreError, Result};
use crate::key::Key;
use crate::platform::BoxStream;
use super::batch::Batch;
use super::datastore::Datastore;
use super::query::{Entry, Filter, Query};
use super::shard::ShardFunction;

/// Root-level key holding the shard function of a sharded store.
pub const SHARDING_KEY: &str = "/SHARDING";
/// Root-level key holding a note for humans browsing the store.
pub const README_KEY: &str = "/_README";

const README: &str = "This is a repository of IPLD objects. Each object is stored in a file \
named after its key, inside a directory chosen by the shard function recorded in SHARDING.\n";

/// Spreads the keys of an inner store over shard directories:
/// `/CIQABCDE` is stored as `/CD/CIQABCDE` under `next-to-last/2`.
#[derive(Debug)]
pub struct ShardingDatastore<S: Datastore> {
    inner: S,
    shard: ShardFunction,
}

impl<S: Datastore> ShardingDatastore<S> {
    /// Records `shard` in a fresh store, or checks it against an already sharded one.
    pub async fn create(inner: S, shard: ShardFunction) -> Result<Self> {
        let sharding_key = Key::new(SHARDING_KEY);
        if inner.has(&sharding_key).await? {
            let found = read_shard_function(&inner).await?;
            check_matches(shard, found)?;
        } else {
            inner.put(&sharding_key, format!("{}\n", shard).into_bytes()).await?;
            inner.put(&Key::new(README_KEY), README.as_bytes().to_vec()).await?;
            debug!("ShardingDatastore: initialised store with {}", shard);
        }
        Ok(Self { inner, shard })
    }

    /// Opens an already sharded store with the function recorded in it.
    /// Fails with `NotFound` when the store was never sharded.
    pub async fn open(inner: S) -> Result<Self> {
        let shard = read_shard_function(&inner).await?;
        Ok(Self { inner, shard })
    }

    pub async fn create_or_open(inner: S, shard: ShardFunction) -> Result<Self> {
        match read_shard_function(&inner).await {
            Ok(found) => {
                check_matches(shard, found)?;
                Ok(Self { inner, shard })
            }
            Err(e) if e.is_not_found() => Self::create(inner, shard).await,
            Err(e) => Err(e),
        }
    }

    pub fn shard_function(&self) -> ShardFunction {
        self.shard
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn convert_key(&self, key: &Key) -> Key {
        Key::new(self.shard.shard_dir(key.name())).child(key)
    }
}

fn invert_key(key: &Key) -> Key {
    Key::with_namespaces(key.namespaces().skip(1))
}

fn check_matches(expected: ShardFunction, found: ShardFunction) -> Result<()> {
    if expected != found {
        return Err(BlockstoreError::ShardingMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    Ok(())
}

async fn read_shard_function<S: Datastore>(store: &S) -> Result<ShardFunction> {
    let raw = store.get(&Key::new(SHARDING_KEY)).await?;
    let text = String::from_utf8(raw)
        .map_err(|e| BlockstoreError::InvalidShardFunction(e.to_string()))?;
    text.parse()
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl<S: Datastore> Datastore for ShardingDatastore<S> {
    async fn get(&self, key: &Key) -> Result<Vec<u8>> {
        match self.inner.get(&self.convert_key(key)).await {
            // Report the key the caller asked for, not the sharded one.
            Err(BlockstoreError::NotFound(_)) => Err(BlockstoreError::NotFound(key.clone())),
            other => other,
        }
    }

    async fn put(&self, key: &Key, value: Vec<u8>) -> Result<()> {
        self.inner.put(&self.convert_key(key), value).await
    }

    async fn has(&self, key: &Key) -> Result<bool> {
        self.inner.has(&self.convert_key(key)).await
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        self.inner.delete(&self.convert_key(key)).await
    }

    /// The caller's prefix, filters and paging refer to unsharded keys, so they run
    /// on the inverted stream.
    fn query(&self, query: Query) -> BoxStream<'_, Result<Entry>> {
        let inner_query = Query {
            filters: vec![
                Filter::KeyNotEqual(Key::new(SHARDING_KEY)),
                Filter::KeyNotEqual(Key::new(README_KEY)),
            ],
            keys_only: !query.needs_values(),
            ..Query::default()
        };
        let inverted = self
            .inner
            .query(inner_query)
            .map_ok(|entry| Entry { key: invert_key(&entry.key), value: entry.value });
        query.apply_stream(Box::pin(inverted))
    }

    async fn commit(&self, batch: Batch) -> Result<()> {
        self.inner.commit(batch.map_keys(|key| self.convert_key(key))).await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}
