// cid-blockstore/src/store/batch.rs

use crate::key::Key;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(Key, Vec<u8>),
    Delete(Key),
}

impl BatchOp {
    pub fn key(&self) -> &Key {
        match self {
            BatchOp::Put(key, _) | BatchOp::Delete(key) => key,
        }
    }
}

/// Writes staged for a single `Datastore::commit`. Operations apply in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Key, value: Vec<u8>) {
        self.ops.push(BatchOp::Put(key, value));
    }

    pub fn delete(&mut self, key: Key) {
        self.ops.push(BatchOp::Delete(key));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    /// Rewrites every key, keeping order and values. Used by key-transforming stores.
    pub fn map_keys(self, mut f: impl FnMut(&Key) -> Key) -> Batch {
        let ops = self
            .ops
            .into_iter()
            .map(|op| match op {
                BatchOp::Put(key, value) => BatchOp::Put(f(&key), value),
                BatchOp::Delete(key) => BatchOp::Delete(f(&key)),
            })
            .collect();
        Batch { ops }
    }
}
