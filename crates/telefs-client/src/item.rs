//! Cached filesystem items.
//!
//! The host framework holds on to item objects between calls and compares
//! them by identity, so the cache must hand back the *same* `Arc<Item>` for
//! the same id for as long as the item stays cached. Attributes are interior
//! state behind a lock; refreshing them never replaces the `Arc`.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use telefs_proto::{ItemAttributes, ItemId, ItemType};

/// One cached filesystem node.
///
/// `id`, `kind` and `parent_id` are fixed for the life of the cache entry;
/// only the attribute snapshot (and, on rename, nothing — see
/// `VolumeAdapter::rename_item`) changes after insertion.
#[derive(Debug)]
pub struct Item {
    id: ItemId,
    name: String,
    kind: ItemType,
    parent_id: ItemId,
    attrs: RwLock<ItemAttributes>,
}

impl Item {
    pub fn new(id: ItemId, name: String, parent_id: ItemId, attrs: ItemAttributes) -> Self {
        Self {
            id,
            name,
            kind: attrs.item_type,
            parent_id,
            attrs: RwLock::new(attrs),
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Name as known at insertion time. Not rewritten on rename; a later
    /// lookup refreshes it.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ItemType {
        self.kind
    }

    pub fn parent_id(&self) -> ItemId {
        self.parent_id
    }

    /// Current attribute snapshot.
    pub fn attributes(&self) -> ItemAttributes {
        self.attrs.read().clone()
    }

    /// Replace the attribute snapshot in place.
    pub fn update_attributes(&self, attrs: ItemAttributes) {
        *self.attrs.write() = attrs;
    }
}

/// Id-keyed cache of live items.
///
/// Lookup hits reuse the cached `Arc` so the host sees a stable identity for
/// each id. Entries leave the cache only on remove, reclaim, or a full clear
/// (deactivate/unmount/disconnect).
#[derive(Debug, Default)]
pub struct ItemCache {
    items: DashMap<ItemId, Arc<Item>>,
}

impl ItemCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ItemId) -> Option<Arc<Item>> {
        self.items.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Insert `item`, replacing any existing entry for the same id.
    pub fn insert(&self, item: Arc<Item>) {
        self.items.insert(item.id(), item);
    }

    pub fn remove(&self, id: ItemId) -> Option<Arc<Item>> {
        self.items.remove(&id).map(|(_, item)| item)
    }

    pub fn clear(&self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Refresh the cached item for `attrs.item_id`, or insert a new one.
    ///
    /// On a hit the existing `Arc` is kept and only its attribute snapshot
    /// is replaced, preserving identity for the host.
    pub fn update_or_insert(
        &self,
        name: &str,
        parent_id: ItemId,
        attrs: ItemAttributes,
    ) -> Arc<Item> {
        let entry = self
            .items
            .entry(attrs.item_id)
            .and_modify(|existing| existing.update_attributes(attrs.clone()))
            .or_insert_with(|| {
                Arc::new(Item::new(attrs.item_id, name.to_owned(), parent_id, attrs))
            });
        Arc::clone(entry.value())
    }

    /// Fetch the cached item for `id`, inserting `make()` if absent.
    ///
    /// Unlike [`update_or_insert`](Self::update_or_insert) a hit leaves the
    /// cached attributes untouched. Directory enumeration uses this so that
    /// synthesized placeholder attributes never overwrite real ones.
    pub fn get_or_insert_with<F>(&self, id: ItemId, make: F) -> Arc<Item>
    where
        F: FnOnce() -> Item,
    {
        let entry = self.items.entry(id).or_insert_with(|| Arc::new(make()));
        Arc::clone(entry.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(id: ItemId, kind: ItemType, size: u64, mode: u32) -> ItemAttributes {
        ItemAttributes {
            item_id: id,
            item_type: kind,
            size,
            modified_time: 1_700_000_000,
            created_time: 1_700_000_000,
            mode,
        }
    }

    #[test]
    fn insert_then_get_returns_same_arc() {
        let cache = ItemCache::new();
        let item = Arc::new(Item::new(
            7,
            "report.txt".into(),
            1,
            attrs(7, ItemType::File, 10, 0o644),
        ));
        cache.insert(Arc::clone(&item));
        let hit = cache.get(7).unwrap();
        assert!(Arc::ptr_eq(&item, &hit));
    }

    #[test]
    fn update_or_insert_reuses_identity_and_refreshes_attrs() {
        let cache = ItemCache::new();
        let first = cache.update_or_insert("a.txt", 1, attrs(3, ItemType::File, 5, 0o644));
        let second = cache.update_or_insert("a.txt", 1, attrs(3, ItemType::File, 99, 0o755));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.attributes().size, 99);
        assert_eq!(first.attributes().mode, 0o755);
    }

    #[test]
    fn get_or_insert_with_does_not_clobber_existing_attrs() {
        let cache = ItemCache::new();
        cache.update_or_insert("bin", 1, attrs(4, ItemType::File, 12, 0o755));
        let hit = cache.get_or_insert_with(4, || {
            Item::new(4, "bin".into(), 1, attrs(4, ItemType::File, 0, 0o644))
        });
        assert_eq!(hit.attributes().mode, 0o755);
        assert_eq!(hit.attributes().size, 12);
    }

    #[test]
    fn remove_and_clear() {
        let cache = ItemCache::new();
        cache.update_or_insert("x", 1, attrs(2, ItemType::Directory, 0, 0o755));
        cache.update_or_insert("y", 1, attrs(3, ItemType::File, 1, 0o644));
        assert_eq!(cache.len(), 2);

        assert!(cache.remove(2).is_some());
        assert!(cache.get(2).is_none());
        assert!(cache.remove(2).is_none());

        cache.clear();
        assert!(cache.is_empty());
    }
}
