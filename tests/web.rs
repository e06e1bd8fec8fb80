//! Browser tests for the JS bridge. Run with `wasm-pack test --headless --chrome`.

#![cfg(target_arch = "wasm32")]

use cid_blockstore::wasm_bridge::{BlockstoreConfigOptions, JsBlockstore, QueryOptions};
use cid_blockstore::Block;
use js_sys::{Array, Object, Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn new_store() -> JsBlockstore {
    JsBlockstore::new()
}

#[wasm_bindgen_test]
async fn create_resolves_with_defaults() {
    let created = JsFuture::from(JsBlockstore::create(None)).await.unwrap();
    assert!(created.is_object());
}

#[wasm_bindgen_test]
async fn put_get_has_delete() {
    let store = new_store();
    let block = Block::from_raw_data(b"hello".to_vec()).unwrap();
    let cid = JsValue::from_str(&block.cid().to_string());
    let data: JsValue = Uint8Array::from(&b"hello"[..]).into();

    JsFuture::from(store.put(cid.clone(), data)).await.unwrap();
    let got = JsFuture::from(store.get(cid.clone())).await.unwrap();
    let got_data: Uint8Array = Reflect::get(&got, &"data".into()).unwrap().unchecked_into();
    assert_eq!(got_data.to_vec(), b"hello");

    let mh: JsValue = Uint8Array::from(block.cid().hash().to_bytes().as_slice()).into();
    assert_eq!(JsFuture::from(store.has(mh.clone())).await.unwrap(), JsValue::TRUE);

    JsFuture::from(store.delete(cid.clone())).await.unwrap();
    assert_eq!(JsFuture::from(store.has(mh)).await.unwrap(), JsValue::FALSE);
}

#[wasm_bindgen_test]
async fn invalid_inputs_carry_error_codes() {
    let store = new_store();

    let err = JsFuture::from(store.get(JsValue::from_f64(1.0))).await.unwrap_err();
    assert_eq!(Reflect::get(&err, &"code".into()).unwrap(), JsValue::from_str("ERR_INVALID_CID"));

    let err = JsFuture::from(store.has(JsValue::from_f64(1.0))).await.unwrap_err();
    assert_eq!(Reflect::get(&err, &"code".into()).unwrap(), JsValue::from_str("ERR_INVALID_KEY"));

    let block = Block::from_raw_data(b"missing".to_vec()).unwrap();
    let err = JsFuture::from(store.get(JsValue::from_str(&block.cid().to_string()))).await.unwrap_err();
    assert_eq!(Reflect::get(&err, &"code".into()).unwrap(), JsValue::from_str("ERR_NOT_FOUND"));
}

#[wasm_bindgen_test]
async fn put_many_then_query() {
    let store = new_store();
    let pairs = Array::new();
    for i in 0..3u8 {
        let block = Block::from_raw_data(vec![i]).unwrap();
        let pair = Array::new();
        pair.push(&JsValue::from_str(&block.cid().to_string()));
        pair.push(&Uint8Array::from(block.data()).into());
        pairs.push(&pair);
    }
    JsFuture::from(store.put_many(pairs.into())).await.unwrap();

    let listed: Array = JsFuture::from(store.query(None, Some(true))).await.unwrap().unchecked_into();
    assert_eq!(listed.length(), 3);
}

#[wasm_bindgen_test]
async fn bad_query_options_are_rejected() {
    let store = new_store();
    let options: QueryOptions = JsValue::from_str("not an object").unchecked_into();
    let err = JsFuture::from(store.query(Some(options), None)).await.unwrap_err();
    assert_eq!(Reflect::get(&err, &"code".into()).unwrap(), JsValue::from_str("ERR_INVALID_OPTIONS"));
}

#[wasm_bindgen_test]
async fn unparseable_create_options_are_rejected() {
    let options = Object::new();
    Reflect::set(&options, &"sharding".into(), &JsValue::FALSE).unwrap();
    Reflect::set(&options, &"shardFunction".into(), &"bogus".into()).unwrap();
    let options: BlockstoreConfigOptions = JsValue::from(options).unchecked_into();

    let err = JsFuture::from(JsBlockstore::create(Some(options))).await.unwrap_err();
    assert_eq!(Reflect::get(&err, &"code".into()).unwrap(), JsValue::from_str("ERR_INVALID_OPTIONS"));
}

#[wasm_bindgen_test]
async fn arbitrary_bytes_are_a_missing_block() {
    let store = new_store();
    let junk: JsValue = Uint8Array::from(&[1u8, 2, 3][..]).into();

    assert_eq!(JsFuture::from(store.has(junk.clone())).await.unwrap(), JsValue::FALSE);
    assert_eq!(JsFuture::from(store.delete(junk)).await.unwrap(), JsValue::UNDEFINED);
}
