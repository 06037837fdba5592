//! Append-only item sink that observers may read while the consumer appends.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::{Item, ItemId};

/// Destination collection for a transfer.
#[derive(Debug, Default)]
pub struct Destination {
    items: Mutex<Vec<Item>>,
}

impl Destination {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Item>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `item` after everything received so far.
    pub fn push(&self, item: Item) {
        self.lock().push(item);
    }

    /// Number of items received so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Ids in arrival order.
    pub fn ids(&self) -> Vec<ItemId> {
        self.lock().iter().map(Item::id).collect()
    }

    /// Copy of the items received so far.
    pub fn snapshot(&self) -> Vec<Item> {
        self.lock().clone()
    }
}
