//! Maps kernel-visible inode numbers to the `Node` each one last resolved to. Inode numbers
//! are not freelist-recycled slots the way file handles are: each one is either a node's own
//! content-derived hint or `sum64(parent-path + "/" + name)`, so the same node keeps the
//! same inode across populate cycles without this table choosing anything itself.
//!
//! Nodes are stored behind `Arc` so a caller can clone the reference out from under the
//! table lock and do its (possibly remote-calling) work after releasing it; only the
//! lookup/forget bookkeeping itself happens while the lock is held.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::blobref::sum64_str;
use crate::node::Node;

pub const ROOT_INODE: u64 = 1;

struct Entry {
    node: Arc<Node>,
    parent: u64,
    name: String,
    lookups: u64,
}

pub struct NodeTable {
    entries: Mutex<HashMap<u64, Entry>>,
}

impl NodeTable {
    pub fn new(root: Node) -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            ROOT_INODE,
            Entry {
                node: Arc::new(root),
                parent: ROOT_INODE,
                name: String::new(),
                lookups: 1,
            },
        );
        NodeTable {
            entries: Mutex::new(entries),
        }
    }

    fn path_of(entries: &HashMap<u64, Entry>, ino: u64) -> String {
        if ino == ROOT_INODE {
            return String::new();
        }
        let Some(entry) = entries.get(&ino) else {
            return String::new();
        };
        format!("{}/{}", Self::path_of(entries, entry.parent), entry.name)
    }

    fn child_inode(entries: &HashMap<u64, Entry>, parent: u64, name: &str, inode_hint: u64) -> u64 {
        if inode_hint != 0 {
            return inode_hint;
        }
        let parent_path = Self::path_of(entries, parent);
        sum64_str(&format!("{parent_path}/{name}"))
    }

    /// Returns the inode a would-be Lookup/ReadDir child of `parent` named `name` would get,
    /// without registering anything. Used to fill in `DirEntry::inode` for ReadDir replies.
    pub fn peek_child_inode(&self, parent: u64, name: &str, inode_hint: u64) -> u64 {
        let entries = self.entries.lock();
        Self::child_inode(&entries, parent, name, inode_hint)
    }

    /// Registers (or revisits) a Lookup's result under `parent`/`name`, bumping the lookup
    /// refcount, and returns the inode the kernel should be told about plus the stored node.
    pub fn lookup(&self, parent: u64, name: &str, node: Node, inode_hint: u64) -> (u64, Arc<Node>) {
        let mut entries = self.entries.lock();
        let ino = Self::child_inode(&entries, parent, name, inode_hint);
        let arc = Arc::new(node);
        match entries.get_mut(&ino) {
            Some(entry) => {
                entry.node = arc.clone();
                entry.lookups += 1;
            }
            None => {
                entries.insert(
                    ino,
                    Entry {
                        node: arc.clone(),
                        parent,
                        name: name.to_string(),
                        lookups: 1,
                    },
                );
            }
        }
        (ino, arc)
    }

    /// Clones out the node behind `ino`, if it's still tracked. `None` means a stale inode
    /// the kernel is still holding past its Forget, or one it never looked up at all.
    pub fn get(&self, ino: u64) -> Option<Arc<Node>> {
        self.entries.lock().get(&ino).map(|e| e.node.clone())
    }

    /// Decrements `nlookup` references, clamped at zero rather than panicking on
    /// underflow (Forget racing a Lookup reply is tolerated, not treated as corruption),
    /// and removes the entry once it reaches zero. The root is never removed.
    pub fn forget(&self, ino: u64, nlookup: u64) {
        if ino == ROOT_INODE {
            return;
        }
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(&ino) else {
            log::warn!("forget for untracked inode {ino:#x}");
            return;
        };
        entry.lookups = entry.lookups.saturating_sub(nlookup);
        if entry.lookups == 0 {
            entries.remove(&ino);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::root::RootDir;

    #[test]
    fn root_is_preregistered_and_never_forgotten() {
        let table = NodeTable::new(Node::Root(RootDir));
        assert!(table.get(ROOT_INODE).is_some());
        table.forget(ROOT_INODE, u64::MAX);
        assert!(table.get(ROOT_INODE).is_some());
    }

    #[test]
    fn lookup_of_same_name_reuses_inode() {
        let table = NodeTable::new(Node::Root(RootDir));
        let (ino_a, _) = table.lookup(ROOT_INODE, "WELCOME.txt", Node::Root(RootDir), 0);
        let (ino_b, _) = table.lookup(ROOT_INODE, "WELCOME.txt", Node::Root(RootDir), 0);
        assert_eq!(ino_a, ino_b);
    }

    #[test]
    fn explicit_inode_hint_is_used_verbatim() {
        let table = NodeTable::new(Node::Root(RootDir));
        let (ino, _) = table.lookup(ROOT_INODE, "sha1-xxxx", Node::Root(RootDir), 42);
        assert_eq!(ino, 42);
    }

    #[test]
    fn forget_removes_entry_once_refcount_hits_zero() {
        let table = NodeTable::new(Node::Root(RootDir));
        let (ino, _) = table.lookup(ROOT_INODE, "tag", Node::Root(RootDir), 7);
        table.lookup(ROOT_INODE, "tag", Node::Root(RootDir), 7);
        assert!(table.get(ino).is_some());
        table.forget(ino, 1);
        assert!(table.get(ino).is_some(), "one lookup reference should remain");
        table.forget(ino, 5);
        assert!(table.get(ino).is_none(), "clamped decrement should still reach zero");
    }
}
