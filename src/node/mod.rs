//! The node tree: a single tagged-variant `Node` enum, one arm per kind of path the
//! filesystem exposes. Each arm wraps a type that owns the real logic; this module is only
//! the dispatch surface the service loop calls through.

pub mod at_dir;
pub mod attr;
pub mod mut_dir;
pub mod mut_file;
pub mod recent;
pub mod ro_versions;
pub mod root;
pub mod roots_dir;
pub mod static_content;

use crate::context::Context;
use crate::errors::{FuseResult, PosixError};
use crate::schema::FileReader;

use at_dir::AtDir;
use attr::{DirEntry, NodeAttr};
use mut_dir::MutDir;
use mut_file::MutFile;
use recent::RecentDir;
use ro_versions::{RoFileVersion, RoFileVersionsDir, RoVersionsDir};
use root::{RootDir, StaticTextFile, StatsDir, StubDir};
use roots_dir::RootsDir;
use static_content::StaticContentNode;

/// Every reachable path resolves to one of these. Variants hold the type that actually
/// implements the behavior; `Node`'s methods just route to it.
pub enum Node {
    Root(RootDir),
    StaticText(StaticTextFile),
    StubDir(StubDir),
    StatsDir(StatsDir),
    StaticContent(StaticContentNode),
    Recent(RecentDir),
    At(AtDir),
    Roots(RootsDir),
    MutDir(MutDir),
    MutFile(MutFile),
    RoVersions(RoVersionsDir),
    RoFileVersions(RoFileVersionsDir),
    RoFileVersion(RoFileVersion),
}

impl Node {
    pub fn attr(&self, ctx: &Context) -> FuseResult<NodeAttr> {
        match self {
            Node::Root(n) => Ok(n.attr()),
            Node::StaticText(n) => Ok(n.attr()),
            Node::StubDir(n) => Ok(n.attr()),
            Node::StatsDir(n) => Ok(n.attr()),
            Node::StaticContent(n) => n.attr(ctx),
            Node::Recent(n) => Ok(n.attr()),
            Node::At(n) => Ok(n.attr()),
            Node::Roots(n) => Ok(n.attr()),
            Node::MutDir(n) => Ok(n.attr()),
            Node::MutFile(n) => Ok(n.attr()),
            Node::RoVersions(n) => Ok(n.attr()),
            Node::RoFileVersions(n) => Ok(n.attr()),
            Node::RoFileVersion(n) => n.attr(ctx),
        }
    }

    pub fn readdir(&self, ctx: &Context) -> FuseResult<Vec<DirEntry>> {
        match self {
            Node::Root(n) => Ok(n.readdir()),
            Node::StubDir(n) => Ok(n.readdir()),
            Node::StatsDir(n) => Ok(n.readdir(ctx)),
            Node::StaticContent(n) => n.readdir(ctx),
            Node::Recent(n) => n.readdir(ctx),
            Node::At(n) => Ok(n.readdir()),
            Node::Roots(n) => n.readdir(ctx),
            Node::MutDir(n) => n.readdir(ctx),
            Node::RoVersions(n) => n.readdir(ctx),
            Node::RoFileVersions(n) => n.readdir(ctx),
            Node::StaticText(_) | Node::MutFile(_) | Node::RoFileVersion(_) => {
                Err(PosixError::new(libc::ENOTDIR, "not a directory"))
            }
        }
    }

    pub fn lookup(&self, ctx: &Context, name: &str) -> FuseResult<(Node, NodeAttr)> {
        match self {
            Node::Root(n) => n.lookup(ctx, name),
            Node::StubDir(n) => n.lookup(name),
            Node::StatsDir(n) => n.lookup(ctx, name),
            Node::StaticContent(n) => n.lookup(ctx, name),
            Node::Recent(n) => n.lookup(ctx, name),
            Node::At(n) => n.lookup(ctx, name),
            Node::Roots(n) => n.lookup(ctx, name),
            Node::MutDir(n) => n.lookup(name),
            Node::RoVersions(n) => n.lookup(ctx, name),
            Node::RoFileVersions(n) => n.lookup(ctx, name),
            Node::StaticText(_) | Node::MutFile(_) | Node::RoFileVersion(_) => {
                Err(PosixError::new(libc::ENOTDIR, "not a directory"))
            }
        }
    }

    pub fn readlink(&self, ctx: &Context) -> FuseResult<String> {
        match self {
            Node::StaticContent(n) => n.readlink(ctx),
            Node::MutFile(n) => n.readlink(),
            _ => Err(PosixError::invalid("readlink on a non-symlink node")),
        }
    }

    /// Produces a random-access reader for an Open/Read on a regular file node. `MutFile`
    /// without a committed `camliContent` yet reads as empty (the scratch-file write handle
    /// is what serves an in-progress write's bytes).
    pub fn open_reader(&self, ctx: &Context) -> FuseResult<FileReader> {
        match self {
            Node::StaticContent(n) => n.open_reader(ctx),
            Node::RoFileVersion(n) => n.open_reader(ctx),
            Node::MutFile(n) => match n.content_ref() {
                Some(content) => {
                    let bytes = crate::client::blobstore::fetch_to_vec(ctx.blobs.as_ref(), &content)?;
                    match crate::schema::decode_schema(&bytes)? {
                        crate::schema::SchemaBlob::File { size, parts, .. }
                        | crate::schema::SchemaBlob::Bytes { size, parts } => {
                            Ok(FileReader::new(ctx.blobs.clone(), size, parts))
                        }
                        _ => Err(PosixError::transport(
                            "opening a schema blob whose type is not file or bytes for content reading",
                        )),
                    }
                }
                None => Ok(FileReader::new(ctx.blobs.clone(), 0, Vec::new())),
            },
            Node::StaticText(_) => Err(PosixError::invalid(
                "StaticText nodes are read via read_static, not open_reader",
            )),
            _ => Err(PosixError::new(libc::EISDIR, "open on a directory node")),
        }
    }

    /// In-memory byte read for `StaticText` nodes (`WELCOME.txt`, stats counters), which have
    /// no backing blob store content to stream from.
    pub fn read_static(&self, offset: u64, size: u32) -> FuseResult<Vec<u8>> {
        match self {
            Node::StaticText(n) => Ok(n.read_at(offset, size)),
            _ => Err(PosixError::invalid("read_static on a non-static node")),
        }
    }

    pub fn mkdir(&self, ctx: &Context, name: &str) -> FuseResult<(Node, NodeAttr)> {
        match self {
            Node::Roots(n) => n.mkdir(ctx, name),
            Node::MutDir(n) => n.mkdir(ctx, name),
            _ => Err(PosixError::transport("mkdir unsupported on this node")),
        }
    }

    pub fn create(&self, ctx: &Context, name: &str) -> FuseResult<(Node, NodeAttr)> {
        match self {
            Node::MutDir(n) => n.create(ctx, name),
            _ => Err(PosixError::transport("create unsupported on this node")),
        }
    }

    pub fn mknod(&self, ctx: &Context, name: &str) -> FuseResult<(Node, NodeAttr)> {
        match self {
            Node::MutDir(n) => n.mknod(ctx, name),
            _ => Err(PosixError::transport("mknod unsupported on this node")),
        }
    }

    pub fn symlink(&self, ctx: &Context, name: &str, target: &str) -> FuseResult<(Node, NodeAttr)> {
        match self {
            Node::MutDir(n) => n.symlink(ctx, name, target),
            _ => Err(PosixError::transport("symlink unsupported on this node")),
        }
    }

    pub fn remove(&self, ctx: &Context, name: &str) -> FuseResult<()> {
        match self {
            Node::Roots(n) => n.remove(ctx, name),
            Node::MutDir(n) => n.remove(ctx, name),
            _ => Err(PosixError::transport("remove unsupported on this node")),
        }
    }

    /// Renames within a directory node; `dest` is the (possibly identical) target directory.
    pub fn rename(&self, ctx: &Context, name: &str, dest: &Node, new_name: &str) -> FuseResult<()> {
        match (self, dest) {
            (Node::Roots(n), Node::Roots(_)) => n.rename(ctx, name, new_name),
            (Node::MutDir(n), Node::MutDir(dest)) => n.rename(ctx, name, dest, new_name),
            _ => Err(PosixError::transport("rename unsupported between these nodes")),
        }
    }

    pub fn setattr(
        &self,
        size: Option<u64>,
        mtime: Option<std::time::SystemTime>,
        atime: Option<std::time::SystemTime>,
    ) -> FuseResult<NodeAttr> {
        match self {
            Node::MutFile(n) => n.setattr(size, mtime, atime),
            _ => Err(PosixError::permission_denied("setattr unsupported on this node")),
        }
    }

    pub fn getxattr(&self, _ctx: &Context, name: &str) -> FuseResult<Vec<u8>> {
        match self {
            Node::MutFile(n) => n.getxattr(name),
            _ => Err(PosixError::not_supported("xattr unsupported on this node")),
        }
    }

    pub fn listxattr(&self, max_size: usize) -> FuseResult<Vec<u8>> {
        match self {
            Node::MutFile(n) => n.listxattr(max_size),
            _ => Ok(Vec::new()),
        }
    }

    pub fn setxattr(&self, ctx: &Context, name: &str, value: &[u8]) -> FuseResult<()> {
        match self {
            Node::MutFile(n) => n.setxattr(ctx, name, value),
            _ => Err(PosixError::not_supported("xattr unsupported on this node")),
        }
    }

    pub fn removexattr(&self, ctx: &Context, name: &str) -> FuseResult<()> {
        match self {
            Node::MutFile(n) => n.removexattr(ctx, name),
            _ => Err(PosixError::not_supported("xattr unsupported on this node")),
        }
    }

    /// Called by the write handle's Flush: uploads a new `camliContent` claim for a
    /// `mutFile`. Any other node kind rejects a write outright.
    pub fn commit_content(&self, ctx: &Context, new_content: crate::blobref::BlobRef, new_size: u64) -> FuseResult<()> {
        match self {
            Node::MutFile(n) => n.commit_content(ctx, new_content, new_size),
            _ => Err(PosixError::permission_denied("write on a non-mutFile node")),
        }
    }
}
