// cid-blockstore/src/block.rs

use cid::Cid;
use cid::multihash::Multihash;

use crate::codec::RAW_CODEC;
use crate::error::{BlockstoreError, Result};

/// BLAKE3 multicodec identifier.
pub const BLAKE3_CODE: u64 = 0x1e;

/// A CID paired with the bytes it addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    cid: Cid,
    data: Vec<u8>,
}

impl Block {
    pub fn new(cid: Cid, data: Vec<u8>) -> Self {
        Self { cid, data }
    }

    /// Hashes `data` with BLAKE3 and addresses it with a CIDv1 using the `raw` codec.
    pub fn from_raw_data(data: Vec<u8>) -> Result<Self> {
        let digest = blake3::hash(&data);
        let multihash = Multihash::<64>::wrap(BLAKE3_CODE, digest.as_bytes())
            .map_err(|e| BlockstoreError::InvalidBlock(e.to_string()))?;
        Ok(Self::new(Cid::new_v1(RAW_CODEC, multihash), data))
    }

    /// Builds a block from a binary CID, failing when the bytes are not a CID.
    pub fn from_cid_bytes(cid: &[u8], data: Vec<u8>) -> Result<Self> {
        let cid = Cid::try_from(cid).map_err(|e| BlockstoreError::InvalidBlock(format!("bad cid: {}", e)))?;
        Ok(Self::new(cid, data))
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_parts(self) -> (Cid, Vec<u8>) {
        (self.cid, self.data)
    }
}

/// What `has` and `delete` accept: a CID, or the bytes of a bare multihash.
///
/// Bytes are not parsed. They are encoded into a key as given, so bytes that are
/// not a multihash simply never match a stored block.
#[derive(Debug, Clone, Copy)]
pub enum BlockRef<'a> {
    Cid(&'a Cid),
    Multihash(&'a [u8]),
}

impl BlockRef<'_> {
    /// The multihash bytes the store key is derived from.
    pub fn multihash_bytes(&self) -> Vec<u8> {
        match self {
            BlockRef::Cid(cid) => cid.hash().to_bytes(),
            BlockRef::Multihash(bytes) => bytes.to_vec(),
        }
    }
}

impl<'a> From<&'a Cid> for BlockRef<'a> {
    fn from(cid: &'a Cid) -> Self {
        BlockRef::Cid(cid)
    }
}

impl<'a> From<&'a [u8]> for BlockRef<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        BlockRef::Multihash(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for BlockRef<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        BlockRef::Multihash(bytes.as_slice())
    }
}

impl<'a> From<&'a Block> for BlockRef<'a> {
    fn from(block: &'a Block) -> Self {
        BlockRef::Cid(block.cid())
    }
}
