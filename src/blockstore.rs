// cid-blockstore/src/blockstore.rs

use async_trait::async_trait;
use cid::Cid;
use futures::{Stream, StreamExt, stream};
use log::{debug, trace};
use std::pin::pin;

use crate::block::{Block, BlockRef};
use crate::codec::{cid_to_key, key_to_cid_key, multihash_to_key};
use crate::common::BlockstoreOptions;
use crate::error::Result;
use crate::key::Key;
use crate::platform::BoxStream;
use crate::store::{Batch, Datastore, Entry, Query, ShardingDatastore};

/// The datastore a [`Blockstore`] talks to: the injected one, or the injected one
/// behind a sharding layer.
#[derive(Debug)]
pub enum Backing<S: Datastore> {
    Plain(S),
    Sharded(ShardingDatastore<S>),
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl<S: Datastore> Datastore for Backing<S> {
    async fn get(&self, key: &Key) -> Result<Vec<u8>> {
        match self {
            Backing::Plain(s) => s.get(key).await,
            Backing::Sharded(s) => s.get(key).await,
        }
    }

    async fn put(&self, key: &Key, value: Vec<u8>) -> Result<()> {
        match self {
            Backing::Plain(s) => s.put(key, value).await,
            Backing::Sharded(s) => s.put(key, value).await,
        }
    }

    async fn has(&self, key: &Key) -> Result<bool> {
        match self {
            Backing::Plain(s) => s.has(key).await,
            Backing::Sharded(s) => s.has(key).await,
        }
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        match self {
            Backing::Plain(s) => s.delete(key).await,
            Backing::Sharded(s) => s.delete(key).await,
        }
    }

    fn query(&self, query: Query) -> BoxStream<'_, Result<Entry>> {
        match self {
            Backing::Plain(s) => s.query(query),
            Backing::Sharded(s) => s.query(query),
        }
    }

    async fn commit(&self, batch: Batch) -> Result<()> {
        match self {
            Backing::Plain(s) => s.commit(batch).await,
            Backing::Sharded(s) => s.commit(batch).await,
        }
    }

    async fn close(&self) -> Result<()> {
        match self {
            Backing::Plain(s) => s.close().await,
            Backing::Sharded(s) => s.close().await,
        }
    }
}

/// Stores blocks in a datastore, addressed by CID.
///
/// Keys are derived from the multihash alone (see [`crate::codec`]), so blocks whose
/// CIDs differ only in version or codec share one entry.
#[derive(Debug)]
pub struct Blockstore<S: Datastore> {
    store: Backing<S>,
}

impl<S: Datastore> Blockstore<S> {
    /// Wraps `store` without sharding.
    pub fn new(store: S) -> Self {
        Self { store: Backing::Plain(store) }
    }

    /// Wraps `store`, adding the sharding layer when `options.sharding` is set.
    /// A sharded store records its shard function on first use and must be reopened
    /// with the same one.
    pub async fn open(store: S, options: BlockstoreOptions) -> Result<Self> {
        let store = if options.sharding {
            let sharded = ShardingDatastore::create_or_open(store, options.shard_function).await?;
            debug!("Blockstore: opened with sharding {}", options.shard_function);
            Backing::Sharded(sharded)
        } else {
            debug!("Blockstore: opened without sharding");
            Backing::Plain(store)
        };
        Ok(Self { store })
    }

    pub fn is_sharded(&self) -> bool {
        matches!(self.store, Backing::Sharded(_))
    }

    pub fn datastore(&self) -> &Backing<S> {
        &self.store
    }

    /// Fetches the block for `cid`. The returned block carries `cid` itself, not a
    /// CID rebuilt from the store.
    pub async fn get(&self, cid: &Cid) -> Result<Block> {
        let key = cid_to_key(cid);
        trace!("Blockstore: get {} -> {}", cid, key);
        let data = self.store.get(&key).await?;
        Ok(Block::new(*cid, data))
    }

    /// Writes a block unless its key is already present.
    pub async fn put(&self, block: Block) -> Result<()> {
        let key = cid_to_key(block.cid());
        if self.store.has(&key).await? {
            trace!("Blockstore: {} already stored, skipping put", key);
            return Ok(());
        }
        let (_, data) = block.into_parts();
        self.store.put(&key, data).await
    }

    /// Writes every block not already present in a single batch.
    ///
    /// Presence is checked per block as the stream is consumed and the batch is
    /// committed once at the end. The checks are not atomic with the commit: two
    /// concurrent writers may both stage the same key, which is harmless because the
    /// content is the same.
    pub async fn put_many<St>(&self, blocks: St) -> Result<()>
    where
        St: Stream<Item = Block>,
    {
        let mut blocks = pin!(blocks);
        let mut batch = self.store.batch();
        let mut skipped = 0usize;
        while let Some(block) = blocks.next().await {
            let key = cid_to_key(block.cid());
            if self.store.has(&key).await? {
                skipped += 1;
                continue;
            }
            let (_, data) = block.into_parts();
            batch.put(key, data);
        }
        debug!("Blockstore: committing {} blocks ({} already present)", batch.len(), skipped);
        self.store.commit(batch).await
    }

    pub async fn put_many_iter<I>(&self, blocks: I) -> Result<()>
    where
        I: IntoIterator<Item = Block>,
    {
        self.put_many(stream::iter(blocks)).await
    }

    /// Checks for a block by CID or by bare multihash.
    pub async fn has<'a>(&self, target: impl Into<BlockRef<'a>>) -> Result<bool> {
        let key = multihash_to_key(&target.into().multihash_bytes());
        self.store.has(&key).await
    }

    /// Removes a block by CID or by bare multihash. Removing an absent block succeeds.
    pub async fn delete<'a>(&self, target: impl Into<BlockRef<'a>>) -> Result<()> {
        let key = multihash_to_key(&target.into().multihash_bytes());
        trace!("Blockstore: delete {}", key);
        self.store.delete(&key).await
    }

    /// Lazily lists stored entries.
    ///
    /// With `reconstruct_cids`, each key is replaced by the key of the CID rebuilt from
    /// it (version 1, `raw` codec). That CID need not match the one the block was put
    /// with.
    pub fn query(&self, query: Query, reconstruct_cids: bool) -> BoxStream<'_, Result<Entry>> {
        let entries = self.store.query(query);
        if !reconstruct_cids {
            return entries;
        }
        Box::pin(entries.map(|res: Result<Entry>| -> Result<Entry> {
            let mut entry = res?;
            entry.key = key_to_cid_key(&entry.key)?;
            Ok(entry)
        }))
    }

    pub async fn close(&self) -> Result<()> {
        debug!("Blockstore: closing");
        self.store.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlockstoreError;
    use crate::store::MemoryDatastore;
    use futures::TryStreamExt;

    async fn sharded() -> (MemoryDatastore, Blockstore<MemoryDatastore>) {
        let base = MemoryDatastore::new();
        let store = Blockstore::open(base.clone(), BlockstoreOptions::default()).await.unwrap();
        (base, store)
    }

    #[tokio::test]
    async fn put_then_get_returns_original_cid() {
        let (_, store) = sharded().await;
        let block = Block::from_raw_data(b"hello".to_vec()).unwrap();

        store.put(block.clone()).await.unwrap();
        let fetched = store.get(block.cid()).await.unwrap();
        assert_eq!(fetched, block);
    }

    #[tokio::test]
    async fn sharded_layout_in_base_store() {
        let (base, store) = sharded().await;
        assert!(store.is_sharded());
        let block = Block::from_raw_data(b"layout".to_vec()).unwrap();
        store.put(block.clone()).await.unwrap();

        let key = cid_to_key(block.cid());
        let name = key.name();
        let dir = &name[name.len() - 3..name.len() - 1];
        assert!(base.has(&Key::new(format!("/{}{}", dir, key))).await.unwrap());
        assert!(!base.has(&key).await.unwrap());
    }

    #[tokio::test]
    async fn unsharded_store_uses_bare_keys() {
        let base = MemoryDatastore::new();
        let store = Blockstore::open(base.clone(), BlockstoreOptions::unsharded()).await.unwrap();
        let block = Block::from_raw_data(b"flat".to_vec()).unwrap();
        store.put(block.clone()).await.unwrap();

        assert_eq!(base.keys().await, vec![cid_to_key(block.cid())]);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (_, store) = sharded().await;
        let block = Block::from_raw_data(b"never written".to_vec()).unwrap();
        let err = store.get(block.cid()).await.unwrap_err();
        assert!(matches!(err, BlockstoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn has_and_delete_accept_cid_or_multihash() {
        let (_, store) = sharded().await;
        let block = Block::from_raw_data(b"ref".to_vec()).unwrap();
        let mh = block.cid().hash().to_bytes();

        store.put(block.clone()).await.unwrap();
        assert!(store.has(block.cid()).await.unwrap());
        assert!(store.has(&mh).await.unwrap());

        store.delete(&mh).await.unwrap();
        assert!(!store.has(block.cid()).await.unwrap());
        store.delete(block.cid()).await.unwrap();
    }

    #[tokio::test]
    async fn arbitrary_bytes_are_looked_up_as_given() {
        let (_, store) = sharded().await;
        let junk: &[u8] = &[1, 2, 3];
        assert!(!store.has(junk).await.unwrap());
        store.delete(junk).await.unwrap();
    }

    #[tokio::test]
    async fn multihashes_longer_than_64_bytes_are_accepted() {
        let (_, store) = sharded().await;
        // identity multihash with a 100-byte digest
        let mut mh = vec![0x00, 100];
        mh.extend(std::iter::repeat_n(7u8, 100));

        assert!(!store.has(&mh).await.unwrap());
        store.datastore().put(&multihash_to_key(&mh), b"inline".to_vec()).await.unwrap();
        assert!(store.has(&mh).await.unwrap());
        store.delete(&mh).await.unwrap();
        assert!(!store.has(&mh).await.unwrap());
    }

    #[tokio::test]
    async fn put_many_skips_present_blocks() {
        let (_, store) = sharded().await;
        let a = Block::from_raw_data(b"a".to_vec()).unwrap();
        let b = Block::from_raw_data(b"b".to_vec()).unwrap();
        store.put(a.clone()).await.unwrap();

        store.put_many_iter(vec![a.clone(), b.clone()]).await.unwrap();

        assert!(store.has(a.cid()).await.unwrap());
        assert_eq!(store.get(b.cid()).await.unwrap(), b);
    }

    #[tokio::test]
    async fn query_can_reconstruct_cids() {
        let (_, store) = sharded().await;
        let block = Block::from_raw_data(b"q".to_vec()).unwrap();
        store.put(block.clone()).await.unwrap();

        let plain: Vec<Entry> = store.query(Query::default(), false).try_collect().await.unwrap();
        assert_eq!(plain.len(), 1);
        assert_eq!(plain[0].key, cid_to_key(block.cid()));

        let relabeled: Vec<Entry> = store.query(Query::keys_only(), true).try_collect().await.unwrap();
        assert_eq!(relabeled.len(), 1);
        assert_eq!(relabeled[0].value, None);
        assert_eq!(
            crate::codec::key_to_multihash(&relabeled[0].key).unwrap(),
            block.cid().to_bytes()
        );
    }
}
