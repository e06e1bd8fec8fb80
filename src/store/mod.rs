// cid-blockstore/src/store/mod.rs

pub mod batch;
pub mod datastore;
pub mod mem_store;
pub mod query;
pub mod shard;
pub mod sharding;

#[cfg(not(target_arch = "wasm32"))]
pub mod fs_store;

// Re-export key items for easier access from `crate::store::`
pub use batch::{Batch, BatchOp};
pub use datastore::Datastore;
pub use mem_store::MemoryDatastore;
pub use query::{Entry, Filter, Order, Query};
pub use shard::ShardFunction;
pub use sharding::ShardingDatastore;

#[cfg(not(target_arch = "wasm32"))]
pub use fs_store::FsDatastore;
