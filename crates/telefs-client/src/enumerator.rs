//! Paged directory enumeration.

use std::sync::Arc;

use telefs_proto::{DirEntry, ItemAttributes, ItemId, VfsClient, mode};
use tracing::trace;

use crate::error::{AdapterResult, ok_or_remote};
use crate::gateway::RequestGateway;
use crate::item::{Item, ItemCache};

/// Receiver for enumerated entries, typically backed by a fixed-size host
/// buffer.
pub trait DirSink {
    /// Offer one entry. Returning `false` means the entry was *not*
    /// consumed (the sink is full); enumeration stops and that entry is
    /// re-offered on the next page.
    fn push(&mut self, entry: &DirEntry, item: &Arc<Item>) -> bool;
}

/// Where the next enumeration call should resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    /// Cursor to pass to the next call. Meaningless when `complete`.
    pub next_cursor: u64,
    /// The listing has been fully delivered.
    pub complete: bool,
}

/// Streams one directory page at a time into a [`DirSink`], caching each
/// entry as it goes.
///
/// Listings carry only names, ids and kinds, so cache misses get placeholder
/// attributes synthesized from the kind; a later attributes fetch corrects
/// them. Cache hits keep their real attributes — a listing never downgrades
/// what a previous attributes call established.
pub struct DirectoryEnumerator<'a> {
    client: &'a VfsClient,
    cache: &'a ItemCache,
    gateway: &'a RequestGateway,
}

impl<'a> DirectoryEnumerator<'a> {
    pub fn new(client: &'a VfsClient, cache: &'a ItemCache, gateway: &'a RequestGateway) -> Self {
        Self {
            client,
            cache,
            gateway,
        }
    }

    /// Fetch the page of `dir_id` at `cursor` and feed it to `sink`.
    ///
    /// If the sink stops early, the returned cursor is the *input* cursor:
    /// the same page is fetched again on resume and the sink sees the
    /// already-delivered entries a second time before the one it rejected.
    pub async fn read_page(
        &self,
        dir_id: ItemId,
        cursor: u64,
        sink: &mut (dyn DirSink + Send),
    ) -> AdapterResult<PageCursor> {
        let page = self
            .gateway
            .invoke(self.client.read_dir(dir_id, cursor))
            .await?;
        ok_or_remote(page.error)?;
        trace!(
            dir_id,
            cursor,
            entries = page.entries.len(),
            next_cursor = page.next_cursor,
            "directory page"
        );

        for entry in &page.entries {
            let item = self.cache.get_or_insert_with(entry.item_id, || {
                Item::new(
                    entry.item_id,
                    entry.name.clone(),
                    dir_id,
                    placeholder_attributes(entry),
                )
            });
            if !sink.push(entry, &item) {
                return Ok(PageCursor {
                    next_cursor: cursor,
                    complete: false,
                });
            }
        }

        Ok(PageCursor {
            next_cursor: page.next_cursor,
            complete: page.next_cursor == 0,
        })
    }
}

/// Attributes assumed for an item known only from a directory listing.
fn placeholder_attributes(entry: &DirEntry) -> ItemAttributes {
    ItemAttributes {
        item_id: entry.item_id,
        item_type: entry.item_type,
        size: 0,
        modified_time: 0,
        created_time: 0,
        mode: mode::default_for(entry.item_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telefs_proto::ItemType;

    #[test]
    fn placeholders_follow_entry_kind() {
        let dir = DirEntry {
            name: "docs".into(),
            item_id: 9,
            item_type: ItemType::Directory,
        };
        let attrs = placeholder_attributes(&dir);
        assert_eq!(attrs.mode, 0o755);
        assert_eq!(attrs.size, 0);
        assert_eq!(attrs.item_type, ItemType::Directory);

        let file = DirEntry {
            name: "a.txt".into(),
            item_id: 10,
            item_type: ItemType::File,
        };
        assert_eq!(placeholder_attributes(&file).mode, 0o644);
    }
}
