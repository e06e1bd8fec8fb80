// cid-blockstore/src/common.rs

use serde::{Deserialize, Serialize};

use crate::store::ShardFunction;

/// Configuration for opening a [`crate::Blockstore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockstoreOptions {
    /// Wrap the datastore so blocks are spread over shard directories.
    pub sharding: bool,
    /// Only read when `sharding` is set. An already sharded store must have been
    /// created with the same function.
    pub shard_function: ShardFunction,
}

impl Default for BlockstoreOptions {
    fn default() -> Self {
        // Matches the layout of an IPFS repo's blocks directory.
        BlockstoreOptions {
            sharding: true,
            shard_function: ShardFunction::NextToLast(2),
        }
    }
}

impl BlockstoreOptions {
    pub fn unsharded() -> Self {
        BlockstoreOptions { sharding: false, ..Self::default() }
    }
}
