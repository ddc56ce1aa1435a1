//! The root directory and the small synthetic nodes that live directly under it:
//! `WELCOME.txt`, the `tag`/`date` stub directories, and `.camli_fs_stats`.

use crate::context::Context;
use crate::errors::{FuseResult, PosixError};

use super::attr::{DirEntry, FileKind, NodeAttr};
use super::Node;

const WELCOME_TEXT: &[u8] =
    b"Welcome to camlifs.\n\nSee WELCOME.txt, recent/, roots/, at/<time>/, and .camli_fs_stats.\n";

/// Names that exist as real children but are deliberately left out of the root's listing.
pub const HIDDEN_FROM_LISTING: &[&str] = &[".camli_fs_stats", "versions"];

/// Names that must look entirely absent: Lookup returns ENOENT and they never appear in
/// ReadDir.
const BLOCKED_NAMES: &[&str] = &["mach_kernel", ".hidden", "._."];

const STUB_BLOB_REF: &str = "sha1-xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx";

#[derive(Debug, Default)]
pub struct RootDir;

impl RootDir {
    pub fn attr(&self) -> NodeAttr {
        NodeAttr::read_only_dir()
    }

    pub fn readdir(&self) -> Vec<DirEntry> {
        vec![
            DirEntry::new("WELCOME.txt", FileKind::RegularFile),
            DirEntry::new("at", FileKind::Directory),
            DirEntry::new("date", FileKind::Directory),
            DirEntry::new("recent", FileKind::Directory),
            DirEntry::new("roots", FileKind::Directory),
            DirEntry::new(STUB_BLOB_REF, FileKind::RegularFile),
            DirEntry::new("tag", FileKind::Directory),
        ]
    }

    pub fn lookup(&self, ctx: &Context, name: &str) -> FuseResult<(Node, NodeAttr)> {
        if name == ".quitquitquit" {
            log::warn!("received .quitquitquit lookup, terminating process");
            std::process::exit(0);
        }
        if BLOCKED_NAMES.contains(&name) {
            return Err(PosixError::not_found(format!("blocked name: {name}")));
        }
        match name {
            "WELCOME.txt" => Ok((
                Node::StaticText(StaticTextFile::new(WELCOME_TEXT.to_vec())),
                NodeAttr::read_only_file(WELCOME_TEXT.len() as u64),
            )),
            "tag" | "date" => Ok((Node::StubDir(StubDir), NodeAttr::read_only_dir())),
            ".camli_fs_stats" => Ok((Node::StatsDir(StatsDir), NodeAttr::read_only_dir())),
            "recent" => Ok((
                Node::Recent(super::recent::RecentDir::new(ctx)),
                NodeAttr::read_only_dir(),
            )),
            "roots" => Ok((
                Node::Roots(super::roots_dir::RootsDir::new(None)),
                NodeAttr::read_write_dir(),
            )),
            "at" => Ok((Node::At(super::at_dir::AtDir), NodeAttr::read_only_dir())),
            "versions" => Ok((
                Node::RoVersions(super::ro_versions::RoVersionsDir),
                NodeAttr::read_only_dir(),
            )),
            STUB_BLOB_REF => {
                let blob_ref: crate::blobref::BlobRef = STUB_BLOB_REF
                    .parse()
                    .expect("literal stub ref is well-formed");
                Ok((
                    Node::StaticContent(super::static_content::StaticContentNode::new(blob_ref)),
                    NodeAttr::read_only_file(0),
                ))
            }
            _ => {
                if let Ok(blob_ref) = name.parse::<crate::blobref::BlobRef>() {
                    Ok((
                        Node::StaticContent(super::static_content::StaticContentNode::new(blob_ref)),
                        NodeAttr::read_only_file(0),
                    ))
                } else {
                    Err(PosixError::not_found(format!("no such root entry: {name}")))
                }
            }
        }
    }
}

/// `tag` and `date` are listed at the root but the search-by-attribute feature behind them
/// is outside this core; they behave as permanently empty read-only directories.
#[derive(Debug, Default)]
pub struct StubDir;

impl StubDir {
    pub fn attr(&self) -> NodeAttr {
        NodeAttr::read_only_dir()
    }

    pub fn readdir(&self) -> Vec<DirEntry> {
        Vec::new()
    }

    pub fn lookup(&self, name: &str) -> FuseResult<(Node, NodeAttr)> {
        Err(PosixError::not_found(format!("empty directory, no {name}")))
    }
}

/// Small, immutable in-memory text content: `WELCOME.txt` and the `.camli_fs_stats` counter
/// files.
#[derive(Debug, Clone)]
pub struct StaticTextFile {
    pub contents: Vec<u8>,
}

impl StaticTextFile {
    pub fn new(contents: Vec<u8>) -> Self {
        StaticTextFile { contents }
    }

    pub fn attr(&self) -> NodeAttr {
        NodeAttr::read_only_file(self.contents.len() as u64)
    }

    pub fn read_at(&self, offset: u64, size: u32) -> Vec<u8> {
        let offset = offset as usize;
        if offset >= self.contents.len() {
            return Vec::new();
        }
        let end = (offset + size as usize).min(self.contents.len());
        self.contents[offset..end].to_vec()
    }
}

#[derive(Debug, Default)]
pub struct StatsDir;

impl StatsDir {
    pub fn attr(&self) -> NodeAttr {
        NodeAttr::read_only_dir()
    }

    pub fn readdir(&self, ctx: &Context) -> Vec<DirEntry> {
        ctx.stats
            .names()
            .into_iter()
            .map(|name| DirEntry::new(name, FileKind::RegularFile))
            .collect()
    }

    pub fn lookup(&self, ctx: &Context, name: &str) -> FuseResult<(Node, NodeAttr)> {
        let contents = ctx
            .stats
            .render(name)
            .ok_or_else(|| PosixError::not_found(format!("no such counter: {name}")))?;
        let size = contents.len() as u64;
        Ok((
            Node::StaticText(StaticTextFile::new(contents)),
            NodeAttr::read_only_file(size),
        ))
    }
}
