//! The read-only version-history twin of the mutable tree, reached as a child of `mutDir`
//! when it is itself a versions view: a regular-file child becomes a `roFileVersionsDir`
//! listing every `camliContent` claim ever recorded against it, one entry per claim, named
//! by the instant the claim took effect. Looking up one of those names (`roFileVersion`)
//! serves the content that claim set, regardless of what the permanode resolves to today.

use crate::blobref::BlobRef;
use crate::client::blobstore::fetch_to_vec;
use crate::client::describe::{ATTR_CONTENT, ATTR_ROOT};
use crate::context::Context;
use crate::errors::{FuseResult, PosixError};
use crate::schema::{self, FileReader, SchemaBlob};
use crate::time_parse::format_rfc3339_nano;

use super::attr::{DirEntry, FileKind, NodeAttr};
use super::mut_dir::MutDir;
use super::Node;

const LISTING_LIMIT: usize = 10_000;

/// The entry point into the version-history hierarchy: lists `camliRoot` permanodes exactly
/// like `roots`, but every descendant is permanently read-only and file children resolve to
/// `roFileVersionsDir` instead of `mutFile`.
#[derive(Debug, Clone, Default)]
pub struct RoVersionsDir;

impl RoVersionsDir {
    pub fn attr(&self) -> NodeAttr {
        NodeAttr::read_only_dir()
    }

    pub fn readdir(&self, ctx: &Context) -> FuseResult<Vec<DirEntry>> {
        let mut out = Vec::new();
        for candidate in ctx.describe.get_permanodes_with_attr(ATTR_ROOT, LISTING_LIMIT, None)? {
            let desc = ctx.describe.describe(&candidate)?;
            if let Some(name) = desc.root_name() {
                out.push(DirEntry::new(name, FileKind::Directory).with_inode(candidate.sum64()));
            }
        }
        Ok(out)
    }

    pub fn lookup(&self, ctx: &Context, name: &str) -> FuseResult<(Node, NodeAttr)> {
        for candidate in ctx.describe.get_permanodes_with_attr(ATTR_ROOT, LISTING_LIMIT, None)? {
            let desc = ctx.describe.describe(&candidate)?;
            if desc.root_name() == Some(name) {
                let node = MutDir::new_versions_view(candidate);
                let attr = node.attr();
                return Ok((Node::MutDir(node), attr));
            }
        }
        Err(PosixError::not_found(format!("no such root: {name}")))
    }
}

/// Lists every `camliContent` claim recorded against one file permanode, oldest claim last
/// isn't guaranteed; entries are named by claim timestamp and always resolve to the content
/// that claim set.
#[derive(Debug, Clone)]
pub struct RoFileVersionsDir {
    pub permanode: BlobRef,
}

impl RoFileVersionsDir {
    pub fn new(permanode: BlobRef) -> Self {
        RoFileVersionsDir { permanode }
    }

    pub fn attr(&self) -> NodeAttr {
        NodeAttr::read_only_dir().with_inode_hint(self.permanode.sum64())
    }

    fn claims(&self, ctx: &Context) -> FuseResult<Vec<(String, BlobRef)>> {
        let claims = ctx.describe.get_claims(&self.permanode, Some(ATTR_CONTENT))?;
        let mut out = Vec::with_capacity(claims.len());
        for claim in claims {
            if let Ok(content) = claim.value.parse::<BlobRef>() {
                out.push((format_rfc3339_nano(claim.date), content));
            }
        }
        Ok(out)
    }

    pub fn readdir(&self, ctx: &Context) -> FuseResult<Vec<DirEntry>> {
        let claims = self.claims(ctx)?;
        Ok(claims
            .into_iter()
            .map(|(name, content)| DirEntry::new(name, FileKind::RegularFile).with_inode(content.sum64()))
            .collect())
    }

    pub fn lookup(&self, ctx: &Context, name: &str) -> FuseResult<(Node, NodeAttr)> {
        let claims = self.claims(ctx)?;
        let (_, content) = claims
            .into_iter()
            .find(|(claim_name, _)| claim_name == name)
            .ok_or_else(|| PosixError::not_found(format!("no such version: {name}")))?;
        let node = RoFileVersion::new(content);
        let attr = node.attr(ctx)?;
        Ok((Node::RoFileVersion(node), attr))
    }
}

/// One historical content blob, served read-only regardless of what the owning permanode
/// resolves to today.
#[derive(Debug, Clone)]
pub struct RoFileVersion {
    pub content: BlobRef,
}

impl RoFileVersion {
    pub fn new(content: BlobRef) -> Self {
        RoFileVersion { content }
    }

    fn fetch_schema(&self, ctx: &Context) -> FuseResult<SchemaBlob> {
        if let Some(cached) = ctx.schema_cache.get(&self.content) {
            return Ok((*cached).clone());
        }
        let bytes = fetch_to_vec(ctx.blobs.as_ref(), &self.content)?;
        schema::decode_schema(&bytes)
    }

    pub fn attr(&self, ctx: &Context) -> FuseResult<NodeAttr> {
        let size = match self.fetch_schema(ctx)? {
            SchemaBlob::File { size, .. } | SchemaBlob::Bytes { size, .. } => size,
            _ => return Err(PosixError::transport("version content is not a file")),
        };
        Ok(NodeAttr::read_only_file(size).with_inode_hint(self.content.sum64()))
    }

    pub fn open_reader(&self, ctx: &Context) -> FuseResult<FileReader> {
        match self.fetch_schema(ctx)? {
            SchemaBlob::File { parts, size, .. } | SchemaBlob::Bytes { parts, size } => {
                Ok(FileReader::new(ctx.blobs.clone(), size, parts))
            }
            _ => Err(PosixError::transport("version content is not a file")),
        }
    }
}
