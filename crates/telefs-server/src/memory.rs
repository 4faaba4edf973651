//! Heap-resident VFS tree.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::RwLock;
use telefs_proto::{
    CreateResult, DirEntry, GetAttributesResult, ItemAttributes, ItemId, ItemType, LookupResult,
    ReadDirResult, ReadResult, ROOT_ITEM_ID, SetAttributesParams, Vfs, VfsResult, WriteResult,
    errno, mode,
};
use tracing::debug;

/// Directory listings are served in pages of this many entries.
pub const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
struct Node {
    id: ItemId,
    parent_id: ItemId,
    name: String,
    item_type: ItemType,
    data: Vec<u8>,
    modified_time: u64,
    created_time: u64,
    mode: u32,
}

impl Node {
    fn attributes(&self) -> ItemAttributes {
        ItemAttributes {
            item_id: self.id,
            item_type: self.item_type,
            size: self.data.len() as u64,
            modified_time: self.modified_time,
            created_time: self.created_time,
            mode: self.mode,
        }
    }
}

struct Tree {
    nodes: HashMap<ItemId, Node>,
    next_id: ItemId,
}

impl Tree {
    /// Children of `parent_id` in stable (creation) order.
    fn children(&self, parent_id: ItemId) -> Vec<&Node> {
        let mut children: Vec<&Node> = self
            .nodes
            .values()
            .filter(|node| node.parent_id == parent_id && node.id != ROOT_ITEM_ID)
            .collect();
        children.sort_by_key(|node| node.id);
        children
    }
}

/// In-memory [`Vfs`] implementation.
///
/// A single lock guards the whole tree; operations are short and never hold
/// it across an await point.
pub struct MemoryVfs {
    tree: RwLock<Tree>,
}

impl MemoryVfs {
    /// An empty volume: just the root directory (id 1).
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_ITEM_ID,
            Node {
                id: ROOT_ITEM_ID,
                parent_id: ROOT_ITEM_ID,
                name: String::new(),
                item_type: ItemType::Directory,
                data: Vec::new(),
                modified_time: now(),
                created_time: now(),
                mode: mode::DIRECTORY,
            },
        );
        Self {
            tree: RwLock::new(Tree { nodes, next_id: 2 }),
        }
    }

    /// A volume pre-populated with a small fixture tree:
    ///
    /// ```text
    /// /hello.txt            regular file, 0o644
    /// /test.sh              executable file, 0o755
    /// /documents/           directory, 0o755
    /// /documents/readme.md  regular file, 0o644
    /// ```
    pub fn with_sample_tree() -> Self {
        let vfs = Self::new();
        {
            let mut tree = vfs.tree.write();
            let docs_id = insert_node(
                &mut tree,
                ROOT_ITEM_ID,
                "documents",
                ItemType::Directory,
                Vec::new(),
                mode::DIRECTORY,
            );
            insert_node(
                &mut tree,
                ROOT_ITEM_ID,
                "hello.txt",
                ItemType::File,
                b"Hello, World!\n".to_vec(),
                mode::FILE_REGULAR,
            );
            insert_node(
                &mut tree,
                ROOT_ITEM_ID,
                "test.sh",
                ItemType::File,
                b"#!/bin/sh\necho hi\n".to_vec(),
                mode::FILE_EXECUTABLE,
            );
            insert_node(
                &mut tree,
                docs_id,
                "readme.md",
                ItemType::File,
                b"# README\n".to_vec(),
                mode::FILE_REGULAR,
            );
        }
        vfs
    }
}

impl Default for MemoryVfs {
    fn default() -> Self {
        Self::new()
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn insert_node(
    tree: &mut Tree,
    parent_id: ItemId,
    name: &str,
    item_type: ItemType,
    data: Vec<u8>,
    node_mode: u32,
) -> ItemId {
    let id = tree.next_id;
    tree.next_id += 1;
    tree.nodes.insert(
        id,
        Node {
            id,
            parent_id,
            name: name.to_owned(),
            item_type,
            data,
            modified_time: now(),
            created_time: now(),
            mode: node_mode,
        },
    );
    id
}

#[async_trait]
impl Vfs for MemoryVfs {
    async fn lookup(&self, parent_id: ItemId, name: String) -> LookupResult {
        let tree = self.tree.read();
        for node in tree.nodes.values() {
            if node.parent_id == parent_id && node.name == name && node.id != ROOT_ITEM_ID {
                return LookupResult {
                    item_id: node.id,
                    item_type: node.item_type,
                    error: errno::OK,
                };
            }
        }
        debug!(parent_id, name, "lookup miss");
        LookupResult {
            item_id: 0,
            item_type: ItemType::File,
            error: errno::ENOENT,
        }
    }

    async fn get_attributes(&self, item_id: ItemId) -> GetAttributesResult {
        let tree = self.tree.read();
        match tree.nodes.get(&item_id) {
            Some(node) => GetAttributesResult {
                attrs: node.attributes(),
                error: errno::OK,
            },
            None => GetAttributesResult {
                attrs: ItemAttributes {
                    item_id: 0,
                    item_type: ItemType::File,
                    size: 0,
                    modified_time: 0,
                    created_time: 0,
                    mode: 0,
                },
                error: errno::ENOENT,
            },
        }
    }

    async fn set_attributes(&self, item_id: ItemId, params: SetAttributesParams) -> VfsResult {
        let mut tree = self.tree.write();
        match tree.nodes.get_mut(&item_id) {
            Some(node) => {
                if let Some(new_mode) = params.mode {
                    node.mode = new_mode;
                }
                if let Some(modified_time) = params.modified_time {
                    node.modified_time = modified_time;
                }
                VfsResult { error: errno::OK }
            }
            None => VfsResult {
                error: errno::ENOENT,
            },
        }
    }

    async fn read_dir(&self, item_id: ItemId, cursor: u64) -> ReadDirResult {
        let tree = self.tree.read();
        match tree.nodes.get(&item_id) {
            Some(node) if node.item_type == ItemType::Directory => {
                let children = tree.children(item_id);
                let entries: Vec<DirEntry> = children
                    .iter()
                    .skip(cursor as usize)
                    .take(PAGE_SIZE)
                    .map(|child| DirEntry {
                        name: child.name.clone(),
                        item_id: child.id,
                        item_type: child.item_type,
                    })
                    .collect();
                let consumed = cursor as usize + entries.len();
                let next_cursor = if consumed < children.len() {
                    consumed as u64
                } else {
                    0
                };
                ReadDirResult {
                    entries,
                    next_cursor,
                    error: errno::OK,
                }
            }
            Some(_) => ReadDirResult {
                entries: Vec::new(),
                next_cursor: 0,
                error: errno::ENOTDIR,
            },
            None => ReadDirResult {
                entries: Vec::new(),
                next_cursor: 0,
                error: errno::ENOENT,
            },
        }
    }

    async fn read(&self, item_id: ItemId, offset: u64, len: u64) -> ReadResult {
        let tree = self.tree.read();
        match tree.nodes.get(&item_id) {
            Some(node) if node.item_type == ItemType::File => {
                let start = usize::try_from(offset).unwrap_or(usize::MAX).min(node.data.len());
                let end = usize::try_from(offset.saturating_add(len))
                    .unwrap_or(usize::MAX)
                    .min(node.data.len());
                ReadResult {
                    data: node.data[start..end].to_vec(),
                    error: errno::OK,
                }
            }
            Some(_) => ReadResult {
                data: Vec::new(),
                error: errno::EISDIR,
            },
            None => ReadResult {
                data: Vec::new(),
                error: errno::ENOENT,
            },
        }
    }

    async fn write(&self, item_id: ItemId, offset: u64, data: Vec<u8>) -> WriteResult {
        let mut tree = self.tree.write();
        match tree.nodes.get_mut(&item_id) {
            Some(node) if node.item_type == ItemType::File => {
                let offset = usize::try_from(offset).unwrap_or(usize::MAX);
                let Some(end) = offset.checked_add(data.len()) else {
                    return WriteResult {
                        bytes_written: 0,
                        error: errno::EINVAL,
                    };
                };
                if end > node.data.len() {
                    node.data.resize(end, 0);
                }
                node.data[offset..end].copy_from_slice(&data);
                node.modified_time = now();
                WriteResult {
                    bytes_written: data.len() as u64,
                    error: errno::OK,
                }
            }
            Some(_) => WriteResult {
                bytes_written: 0,
                error: errno::EISDIR,
            },
            None => WriteResult {
                bytes_written: 0,
                error: errno::ENOENT,
            },
        }
    }

    async fn create(&self, parent_id: ItemId, name: String, item_type: ItemType) -> CreateResult {
        let mut tree = self.tree.write();
        match tree.nodes.get(&parent_id) {
            Some(parent) if parent.item_type != ItemType::Directory => {
                return CreateResult {
                    item_id: 0,
                    error: errno::ENOTDIR,
                };
            }
            None => {
                return CreateResult {
                    item_id: 0,
                    error: errno::ENOENT,
                };
            }
            _ => {}
        }
        let exists = tree
            .nodes
            .values()
            .any(|node| node.parent_id == parent_id && node.name == name && node.id != ROOT_ITEM_ID);
        if exists {
            return CreateResult {
                item_id: 0,
                error: errno::EEXIST,
            };
        }

        let node_mode = mode::default_for(item_type);
        let id = insert_node(&mut tree, parent_id, &name, item_type, Vec::new(), node_mode);
        debug!(parent_id, name, id, "created item");
        CreateResult {
            item_id: id,
            error: errno::OK,
        }
    }

    async fn delete(&self, item_id: ItemId) -> VfsResult {
        if item_id == ROOT_ITEM_ID {
            return VfsResult {
                error: errno::EACCES,
            };
        }
        let mut tree = self.tree.write();
        if let Some(node) = tree.nodes.get(&item_id)
            && node.item_type == ItemType::Directory
        {
            let has_children = tree.nodes.values().any(|n| n.parent_id == item_id);
            if has_children {
                return VfsResult {
                    error: errno::ENOTEMPTY,
                };
            }
        }
        match tree.nodes.remove(&item_id) {
            Some(_) => VfsResult { error: errno::OK },
            None => VfsResult {
                error: errno::ENOENT,
            },
        }
    }

    async fn rename(&self, item_id: ItemId, new_parent_id: ItemId, new_name: String) -> VfsResult {
        if item_id == ROOT_ITEM_ID {
            return VfsResult {
                error: errno::EACCES,
            };
        }
        let mut tree = self.tree.write();
        match tree.nodes.get(&new_parent_id) {
            Some(parent) if parent.item_type != ItemType::Directory => {
                return VfsResult {
                    error: errno::ENOTDIR,
                };
            }
            None => {
                return VfsResult {
                    error: errno::ENOENT,
                };
            }
            _ => {}
        }
        let collision = tree.nodes.values().any(|node| {
            node.parent_id == new_parent_id && node.name == new_name && node.id != item_id
        });
        if collision {
            return VfsResult {
                error: errno::EEXIST,
            };
        }
        match tree.nodes.get_mut(&item_id) {
            Some(node) => {
                node.parent_id = new_parent_id;
                node.name = new_name;
                node.modified_time = now();
                VfsResult { error: errno::OK }
            }
            None => VfsResult {
                error: errno::ENOENT,
            },
        }
    }

    async fn ping(&self) -> String {
        "pong".to_owned()
    }
}
