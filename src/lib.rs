// src/lib.rs

//! Content-addressed block storage over a generic key/value datastore.
//!
//! A [`Blockstore`] turns CIDs into datastore keys (see [`codec`]) and delegates
//! everything else to an injected [`store::Datastore`], optionally behind a
//! [`store::ShardingDatastore`] that spreads keys over shard directories.
//!
//! Keys only encode a block's multihash. Listing a store can therefore only
//! rebuild CIDv1 `raw` CIDs, which may differ from the CIDs blocks were put with.

pub mod block;
pub mod blockstore;
pub mod codec;
pub mod common;
pub mod error;
pub mod key;
pub mod platform;
pub mod store;

#[cfg(target_arch = "wasm32")]
pub mod wasm_bridge;

pub use block::{Block, BlockRef};
pub use blockstore::{Backing, Blockstore};
pub use common::BlockstoreOptions;
pub use error::{BlockstoreError, Result};
pub use key::Key;

pub use cid::Cid;
