// cid-blockstore/src/codec.rs

//! Translation between multihashes and datastore keys.
//!
//! A block is stored under `/` + base32(multihash bytes). Only the multihash
//! is encoded, so CIDs that share a multihash but differ in version or codec
//! land on the same key.
//!
//! Going back from a key to a CID is lossy: the original version and codec are
//! gone, so [`key_to_cid`] always rebuilds a CIDv1 with the `raw` codec. A CID
//! read back from a query will in general differ from the CID the block was
//! stored with; only the multihash is guaranteed to match.

use cid::Cid;
use cid::multihash::Multihash;
use multibase::Base;

use crate::error::{BlockstoreError, Result};
use crate::key::Key;

/// Multicodec tag for raw binary content.
pub const RAW_CODEC: u64 = 0x55;

/// Case-normalized, path-safe alphabet (RFC 4648, upper case, no padding).
const KEY_BASE: Base = Base::Base32Upper;

pub fn multihash_to_key(multihash: &[u8]) -> Key {
    Key::new(format!("/{}", KEY_BASE.encode(multihash)))
}

pub fn cid_to_key(cid: &Cid) -> Key {
    multihash_to_key(&cid.hash().to_bytes())
}

/// Decodes a block key back into the multihash bytes it was built from.
pub fn key_to_multihash(key: &Key) -> Result<Vec<u8>> {
    // Block keys are of the form /<base32 text>; the first character is the separator.
    let encoded = key.as_str().get(1..).unwrap_or("");
    KEY_BASE
        .decode(encoded.to_ascii_uppercase())
        .map_err(|e| BlockstoreError::MalformedKey {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

/// Rebuilds a CID from a block key, assuming version 1 and the `raw` codec.
pub fn key_to_cid(key: &Key) -> Result<Cid> {
    let bytes = key_to_multihash(key)?;
    let multihash = Multihash::<64>::from_bytes(&bytes).map_err(|e| BlockstoreError::MalformedKey {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Cid::new_v1(RAW_CODEC, multihash))
}

/// Relabels a block key with the bytes of its reconstructed CID.
///
/// The result is for display and listing only; it is not a key blocks are stored under.
pub fn key_to_cid_key(key: &Key) -> Result<Key> {
    let cid = key_to_cid(key)?;
    Ok(Key::new(format!("/{}", KEY_BASE.encode(cid.to_bytes()))))
}
