// cid-blockstore/src/wasm_bridge.rs

use std::sync::Arc;

use cid::Cid;
use futures::TryStreamExt;
use js_sys::{Array as JsArray, Object, Promise, Reflect, Uint8Array as JsUint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::block::{Block, BlockRef};
use crate::blockstore::Blockstore;
use crate::common::BlockstoreOptions;
use crate::error::BlockstoreError;
use crate::store::{Entry, MemoryDatastore, Query};

#[wasm_bindgen(typescript_custom_section)]
const TS_APPEND_CONTENT: &'static str = r#"
export interface BlockstoreConfigOptions {
  sharding?: boolean;
  shardFunction?: string;
}
export interface QueryOptions {
  prefix?: string;
  offset?: number;
  limit?: number;
  keysOnly?: boolean;
  orders?: ("keyAscending" | "keyDescending")[];
  filters?: { type: "keyPrefix" | "keyNotEqual" | "minValueSize"; value: string | number }[];
}
export interface BlockObject { cid: string; data: Uint8Array }
export interface EntryObject { key: string; value?: Uint8Array }
"#;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(typescript_type = "BlockstoreConfigOptions")]
    pub type BlockstoreConfigOptions;
    #[wasm_bindgen(typescript_type = "QueryOptions")]
    pub type QueryOptions;
}

/// Maps an error onto a JS `Error` carrying a stable `code` property.
fn blockstore_error_to_jsvalue(err: BlockstoreError) -> JsValue {
    let code = match &err {
        BlockstoreError::InvalidCid(_) => "ERR_INVALID_CID",
        BlockstoreError::InvalidBlock(_) => "ERR_INVALID_BLOCK",
        BlockstoreError::InvalidKey(_) => "ERR_INVALID_KEY",
        BlockstoreError::MalformedKey { .. } => "ERR_MALFORMED_KEY",
        BlockstoreError::NotFound(_) => "ERR_NOT_FOUND",
        BlockstoreError::ConfigError(_) => "ERR_INVALID_OPTIONS",
        _ => "ERR_STORAGE",
    };
    let js_err = js_sys::Error::new(&err.to_string());
    let _ = Reflect::set(&js_err, &"code".into(), &code.into());
    js_err.into()
}

fn cid_from_js(value: &JsValue) -> Result<Cid, BlockstoreError> {
    if let Some(text) = value.as_string() {
        return Cid::try_from(text.as_str()).map_err(|e| BlockstoreError::InvalidCid(e.to_string()));
    }
    match value.dyn_ref::<JsUint8Array>() {
        Some(bytes) => Cid::try_from(bytes.to_vec().as_slice()).map_err(|e| BlockstoreError::InvalidCid(e.to_string())),
        None => Err(BlockstoreError::InvalidCid("expected a CID string or Uint8Array".to_string())),
    }
}

fn block_from_js(cid: &JsValue, data: &JsValue) -> Result<Block, BlockstoreError> {
    let cid = cid_from_js(cid).map_err(|e| BlockstoreError::InvalidBlock(e.to_string()))?;
    let data = data
        .dyn_ref::<JsUint8Array>()
        .ok_or_else(|| BlockstoreError::InvalidBlock("block data must be a Uint8Array".to_string()))?;
    Ok(Block::new(cid, data.to_vec()))
}

/// A CID string is reduced to its multihash. Bytes are taken as a multihash as given.
fn multihash_from_js(value: &JsValue) -> Result<Vec<u8>, BlockstoreError> {
    if value.is_string() {
        let cid = cid_from_js(value).map_err(|e| BlockstoreError::InvalidKey(e.to_string()))?;
        return Ok(BlockRef::Cid(&cid).multihash_bytes());
    }
    value
        .dyn_ref::<JsUint8Array>()
        .map(|bytes| bytes.to_vec())
        .ok_or_else(|| BlockstoreError::InvalidKey("expected a CID string or multihash bytes".to_string()))
}

fn block_to_jsvalue(block: &Block) -> Result<JsValue, JsValue> {
    let obj = Object::new();
    Reflect::set(&obj, &"cid".into(), &block.cid().to_string().into())?;
    Reflect::set(&obj, &"data".into(), &JsUint8Array::from(block.data()).into())?;
    Ok(obj.into())
}

fn entry_to_jsvalue(entry: &Entry) -> Result<JsValue, JsValue> {
    let obj = Object::new();
    Reflect::set(&obj, &"key".into(), &entry.key.as_str().into())?;
    if let Some(ref value) = entry.value {
        Reflect::set(&obj, &"value".into(), &JsUint8Array::from(value.as_slice()).into())?;
    }
    Ok(obj.into())
}

#[wasm_bindgen(js_name = "Blockstore")]
#[derive(Clone)]
pub struct JsBlockstore {
    inner: Arc<Blockstore<MemoryDatastore>>,
}

#[wasm_bindgen(js_class = "Blockstore")]
impl JsBlockstore {
    /// An unsharded blockstore over a fresh in-memory datastore.
    #[wasm_bindgen(constructor)]
    pub fn new() -> JsBlockstore {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        JsBlockstore { inner: Arc::new(Blockstore::new(MemoryDatastore::new())) }
    }

    /// Resolves to a blockstore over a fresh in-memory datastore.
    #[wasm_bindgen]
    pub fn create(options: Option<BlockstoreConfigOptions>) -> Promise {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        let options: BlockstoreOptions = match options {
            Some(opts) => match serde_wasm_bindgen::from_value(opts.into()) {
                Ok(parsed) => parsed,
                Err(e) => {
                    return Promise::reject(&blockstore_error_to_jsvalue(BlockstoreError::ConfigError(format!(
                        "invalid blockstore options: {}",
                        e
                    ))));
                }
            },
            None => BlockstoreOptions::default(),
        };
        wasm_bindgen_futures::future_to_promise(async move {
            let store = Blockstore::open(MemoryDatastore::new(), options)
                .await
                .map_err(blockstore_error_to_jsvalue)?;
            Ok(JsBlockstore { inner: Arc::new(store) }.into())
        })
    }

    #[wasm_bindgen]
    pub fn get(&self, cid: JsValue) -> Promise {
        let inner = Arc::clone(&self.inner);
        wasm_bindgen_futures::future_to_promise(async move {
            let cid = cid_from_js(&cid).map_err(blockstore_error_to_jsvalue)?;
            let block = inner.get(&cid).await.map_err(blockstore_error_to_jsvalue)?;
            block_to_jsvalue(&block)
        })
    }

    #[wasm_bindgen]
    pub fn put(&self, cid: JsValue, data: JsValue) -> Promise {
        let inner = Arc::clone(&self.inner);
        wasm_bindgen_futures::future_to_promise(async move {
            let block = block_from_js(&cid, &data).map_err(blockstore_error_to_jsvalue)?;
            inner.put(block).await.map_err(blockstore_error_to_jsvalue)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Takes an array of `[cid, data]` pairs.
    #[wasm_bindgen(js_name = putMany)]
    pub fn put_many(&self, blocks: JsValue) -> Promise {
        let items: JsArray = match blocks.dyn_ref::<JsArray>() {
            Some(arr) => arr.clone(),
            None => return Promise::reject(&blockstore_error_to_jsvalue(BlockstoreError::InvalidBlock("putMany expects an array".to_string()))),
        };
        let inner = Arc::clone(&self.inner);
        wasm_bindgen_futures::future_to_promise(async move {
            let mut parsed = Vec::with_capacity(items.length() as usize);
            for i in 0..items.length() {
                let pair = items.get(i).dyn_into::<JsArray>().map_err(|_| {
                    blockstore_error_to_jsvalue(BlockstoreError::InvalidBlock(format!("item at index {} is not a [cid, data] pair", i)))
                })?;
                let block = block_from_js(&pair.get(0), &pair.get(1)).map_err(blockstore_error_to_jsvalue)?;
                parsed.push(block);
            }
            inner.put_many_iter(parsed).await.map_err(blockstore_error_to_jsvalue)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen]
    pub fn has(&self, target: JsValue) -> Promise {
        let inner = Arc::clone(&self.inner);
        wasm_bindgen_futures::future_to_promise(async move {
            let multihash = multihash_from_js(&target).map_err(blockstore_error_to_jsvalue)?;
            let found = inner.has(&multihash).await.map_err(blockstore_error_to_jsvalue)?;
            Ok(JsValue::from_bool(found))
        })
    }

    #[wasm_bindgen]
    pub fn delete(&self, target: JsValue) -> Promise {
        let inner = Arc::clone(&self.inner);
        wasm_bindgen_futures::future_to_promise(async move {
            let multihash = multihash_from_js(&target).map_err(blockstore_error_to_jsvalue)?;
            inner.delete(&multihash).await.map_err(blockstore_error_to_jsvalue)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Resolves to an array of `{ key, value? }` objects.
    #[wasm_bindgen]
    pub fn query(&self, options: Option<QueryOptions>, reconstruct_cids: Option<bool>) -> Promise {
        let query: Query = match options {
            Some(opts) => match serde_wasm_bindgen::from_value(opts.into()) {
                Ok(q) => q,
                Err(e) => {
                    return Promise::reject(&blockstore_error_to_jsvalue(BlockstoreError::ConfigError(format!(
                        "invalid query options: {}",
                        e
                    ))));
                }
            },
            None => Query::default(),
        };
        let inner = Arc::clone(&self.inner);
        wasm_bindgen_futures::future_to_promise(async move {
            let entries: Vec<Entry> = inner
                .query(query, reconstruct_cids.unwrap_or(false))
                .try_collect()
                .await
                .map_err(blockstore_error_to_jsvalue)?;
            let out = JsArray::new_with_length(entries.len() as u32);
            for (i, entry) in entries.iter().enumerate() {
                match entry_to_jsvalue(entry) {
                    Ok(obj) => out.set(i as u32, obj),
                    Err(_) => {
                        gloo_console::error!("Failed to convert query entry to JsValue");
                        out.set(i as u32, JsValue::NULL);
                    }
                }
            }
            Ok(out.into())
        })
    }

    #[wasm_bindgen]
    pub fn close(&self) -> Promise {
        let inner = Arc::clone(&self.inner);
        wasm_bindgen_futures::future_to_promise(async move {
            inner.close().await.map_err(blockstore_error_to_jsvalue)?;
            Ok(JsValue::UNDEFINED)
        })
    }
}
