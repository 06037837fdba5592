//! Shared identifiers and the item model moved by a transfer.

use std::fmt;

use chrono::{DateTime, Utc};

/// Unique identifier for an item in a transfer.
pub type ItemId = u64;

/// Unit of data moved from the source to the destination.
///
/// Items are never mutated after construction, so they can be handed between
/// threads without extra synchronization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    id: ItemId,
    data: String,
    timestamp: DateTime<Utc>,
}

impl Item {
    /// Construct a new item stamped with the current time.
    pub fn new(id: ItemId, data: impl Into<String>) -> Self {
        Self {
            id,
            data: data.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    /// Creation time of the item.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Item{{id={}, data='{}', timestamp={}}}",
            self.id,
            self.data,
            self.timestamp.to_rfc3339()
        )
    }
}

/// Build `count` items with ids `1..=count` and payload `payload-<id>`.
pub fn source_items(count: usize) -> Vec<Item> {
    (1..=count as ItemId)
        .map(|id| Item::new(id, format!("payload-{id}")))
        .collect()
}
