// cid-blockstore/src/store/query.rs

use futures::{StreamExt, TryFutureExt, TryStreamExt, future, stream};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::key::Key;
use crate::platform::BoxStream;

/// One result of a datastore query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    /// `None` when the query asked for keys only.
    pub value: Option<Vec<u8>>,
}

impl Entry {
    pub fn new(key: Key, value: Vec<u8>) -> Self {
        Self { key, value: Some(value) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum Filter {
    KeyPrefix(String),
    KeyNotEqual(Key),
    /// Keeps entries whose value is at least this many bytes. Keys-only entries never match.
    MinValueSize(usize),
}

impl Filter {
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Filter::KeyPrefix(prefix) => entry.key.as_str().starts_with(prefix.as_str()),
            Filter::KeyNotEqual(key) => &entry.key != key,
            Filter::MinValueSize(min) => entry.value.as_ref().is_some_and(|v| v.len() >= *min),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Order {
    KeyAscending,
    KeyDescending,
}

/// Filter and ordering options understood by every datastore in this crate.
///
/// Stages run in a fixed order: prefix, filters, orders, offset, limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Query {
    pub prefix: Option<String>,
    pub filters: Vec<Filter>,
    pub orders: Vec<Order>,
    pub offset: usize,
    pub limit: Option<usize>,
    pub keys_only: bool,
}

impl Query {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()), ..Self::default() }
    }

    pub fn keys_only() -> Self {
        Self { keys_only: true, ..Self::default() }
    }

    /// Whether a store has to read values to answer this query.
    pub fn needs_values(&self) -> bool {
        !self.keys_only || self.filters.iter().any(|f| matches!(f, Filter::MinValueSize(_)))
    }

    fn selects(&self, entry: &Entry) -> bool {
        self.prefix.as_ref().is_none_or(|p| entry.key.as_str().starts_with(p.as_str()))
            && self.filters.iter().all(|f| f.matches(entry))
    }

    /// Runs every stage of the query over an already materialized set of entries.
    pub fn apply(&self, entries: Vec<Entry>) -> Vec<Entry> {
        let mut selected: Vec<Entry> = entries.into_iter().filter(|e| self.selects(e)).collect();

        // Stable sorts applied last-to-first leave the first order as the primary one.
        for order in self.orders.iter().rev() {
            match order {
                Order::KeyAscending => selected.sort_by(|a, b| a.key.cmp(&b.key)),
                Order::KeyDescending => selected.sort_by(|a, b| b.key.cmp(&a.key)),
            }
        }

        let limit = self.limit.unwrap_or(usize::MAX);
        selected
            .into_iter()
            .skip(self.offset)
            .take(limit)
            .map(|mut e| {
                if self.keys_only {
                    e.value = None;
                }
                e
            })
            .collect()
    }

    /// Runs the query over a stream of entries.
    ///
    /// Without orders, entries pass through one at a time and the source is not
    /// polled past the limit. An ordering needs the whole set, so it is collected first.
    pub fn apply_stream<'a>(self, entries: BoxStream<'a, Result<Entry>>) -> BoxStream<'a, Result<Entry>> {
        if !self.orders.is_empty() {
            let sorted = entries
                .try_collect::<Vec<Entry>>()
                .map_ok(move |all| stream::iter(self.apply(all).into_iter().map(Ok)));
            return Box::pin(stream::once(sorted).try_flatten());
        }

        let keys_only = self.keys_only;
        let limit = self.limit.unwrap_or(usize::MAX);
        let mut to_skip = self.offset;
        let selected = entries.try_filter(move |entry| {
            let keep = self.selects(entry)
                && if to_skip > 0 {
                    to_skip -= 1;
                    false
                } else {
                    true
                };
            future::ready(keep)
        });
        Box::pin(selected.take(limit).map_ok(move |mut entry| {
            if keys_only {
                entry.value = None;
            }
            entry
        }))
    }
}
