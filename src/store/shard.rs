// cid-blockstore/src/store/shard.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{BlockstoreError, Result};

/// Common prefix of every shard function's textual form.
pub const SHARD_V1_PREFIX: &str = "/repo/flatfs/shard/v1";

const PAD: char = '_';

/// How a key's name picks the directory it is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ShardFunction {
    /// The first `n` characters.
    Prefix(usize),
    /// The last `n` characters.
    Suffix(usize),
    /// The `n` characters before the last one.
    NextToLast(usize),
}

impl Default for ShardFunction {
    fn default() -> Self {
        ShardFunction::NextToLast(2)
    }
}

impl ShardFunction {
    pub fn name(&self) -> &'static str {
        match self {
            ShardFunction::Prefix(_) => "prefix",
            ShardFunction::Suffix(_) => "suffix",
            ShardFunction::NextToLast(_) => "next-to-last",
        }
    }

    pub fn param(&self) -> usize {
        match self {
            ShardFunction::Prefix(n) | ShardFunction::Suffix(n) | ShardFunction::NextToLast(n) => *n,
        }
    }

    /// The shard directory for a key name. Short names are padded with `_`.
    pub fn shard_dir(&self, name: &str) -> String {
        let chars: Vec<char> = name.chars().collect();
        match *self {
            ShardFunction::Prefix(n) => {
                let mut out: String = chars.iter().take(n).collect();
                while out.chars().count() < n {
                    out.push(PAD);
                }
                out
            }
            ShardFunction::Suffix(n) => {
                let padded = left_pad(&chars, n);
                padded[padded.len() - n..].iter().collect()
            }
            ShardFunction::NextToLast(n) => {
                let padded = left_pad(&chars, n + 1);
                let end = padded.len() - 1;
                padded[end - n..end].iter().collect()
            }
        }
    }
}

fn left_pad(chars: &[char], width: usize) -> Vec<char> {
    let missing = width.saturating_sub(chars.len());
    std::iter::repeat_n(PAD, missing).chain(chars.iter().copied()).collect()
}

impl fmt::Display for ShardFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", SHARD_V1_PREFIX, self.name(), self.param())
    }
}

impl FromStr for ShardFunction {
    type Err = BlockstoreError;

    fn from_str(raw: &str) -> Result<Self> {
        let invalid = || BlockstoreError::InvalidShardFunction(raw.trim().to_string());
        let rest = raw.trim().strip_prefix(SHARD_V1_PREFIX).ok_or_else(invalid)?;
        let parts: Vec<&str> = rest.split('/').filter(|p| !p.is_empty()).collect();
        let [name, param] = parts.as_slice() else {
            return Err(invalid());
        };
        let n: usize = param.parse().map_err(|_| invalid())?;
        if n == 0 {
            return Err(invalid());
        }
        match *name {
            "prefix" => Ok(ShardFunction::Prefix(n)),
            "suffix" => Ok(ShardFunction::Suffix(n)),
            "next-to-last" => Ok(ShardFunction::NextToLast(n)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for ShardFunction {
    type Error = BlockstoreError;

    fn try_from(raw: String) -> Result<Self> {
        raw.parse()
    }
}

impl From<ShardFunction> for String {
    fn from(shard: ShardFunction) -> Self {
        shard.to_string()
    }
}
