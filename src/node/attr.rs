//! Shared vocabulary between node variants and the FUSE service loop: the attribute view a
//! node reports, directory entries, and the outcome of a Lookup.

use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    RegularFile,
    Directory,
    Symlink,
}

/// A node's reported attributes, prior to inode substitution and timestamp defaulting
/// (both of which are the service loop's job, per the Lookup/Getattr contract).
#[derive(Debug, Clone)]
pub struct NodeAttr {
    pub kind: FileKind,
    pub size: u64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub mtime: Option<SystemTime>,
    pub atime: Option<SystemTime>,
    pub ctime: Option<SystemTime>,
    /// Zero means "derive from path hash", matching the Lookup-response contract.
    pub inode_hint: u64,
}

impl NodeAttr {
    pub fn read_only_dir() -> Self {
        NodeAttr {
            kind: FileKind::Directory,
            size: 0,
            mode: 0o500,
            uid: 0,
            gid: 0,
            mtime: None,
            atime: None,
            ctime: None,
            inode_hint: 0,
        }
    }

    pub fn read_write_dir() -> Self {
        NodeAttr {
            mode: 0o700,
            ..Self::read_only_dir()
        }
    }

    pub fn read_only_file(size: u64) -> Self {
        NodeAttr {
            kind: FileKind::RegularFile,
            size,
            mode: 0o400,
            uid: 0,
            gid: 0,
            mtime: None,
            atime: None,
            ctime: None,
            inode_hint: 0,
        }
    }

    pub fn read_write_file(size: u64) -> Self {
        NodeAttr {
            mode: 0o600,
            ..Self::read_only_file(size)
        }
    }

    pub fn symlink() -> Self {
        NodeAttr {
            kind: FileKind::Symlink,
            size: 0,
            mode: 0o400,
            uid: 0,
            gid: 0,
            mtime: None,
            atime: None,
            ctime: None,
            inode_hint: 0,
        }
    }

    pub fn with_inode_hint(mut self, inode: u64) -> Self {
        self.inode_hint = inode;
        self
    }

    pub fn with_mode_bits(mut self, extra: Option<u32>) -> Self {
        if let Some(extra) = extra {
            self.mode |= extra & 0o7777;
        }
        self
    }
}

/// One entry emitted by a directory's ReadDir. `inode` of zero tells the service loop to
/// substitute `hash(parent-path + "/" + name)`.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub kind: FileKind,
    pub inode: u64,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: FileKind) -> Self {
        DirEntry {
            name: name.into(),
            kind,
            inode: 0,
        }
    }

    pub fn with_inode(mut self, inode: u64) -> Self {
        self.inode = inode;
        self
    }
}

/// What a successful Lookup produces: the attributes for the found child, plus whatever
/// the node table needs to materialize or reuse a table slot for it. The actual `Node`
/// value is constructed by the caller (each node variant knows how to build its children,
/// but only the service loop owns the table), so this carries a constructor closure's
/// already-built `Node`.
pub struct LookupOutcome {
    pub node: super::Node,
    pub attr: NodeAttr,
}
