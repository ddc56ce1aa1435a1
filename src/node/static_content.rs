//! Read-only content addressed directly by hash: `StaticContentNode` fetches and decodes
//! whatever schema blob its `BlobRef` names, and behaves as a file, directory, or symlink
//! accordingly.

use std::sync::Arc;

use crate::blobref::BlobRef;
use crate::client::blobstore::fetch_to_vec;
use crate::context::Context;
use crate::errors::{FuseResult, PosixError};
use crate::schema::{self, FileReader, SchemaBlob};

use super::attr::{DirEntry, FileKind, NodeAttr};
use super::Node;

#[derive(Debug, Clone)]
pub struct StaticContentNode {
    pub blob_ref: BlobRef,
}

impl StaticContentNode {
    pub fn new(blob_ref: BlobRef) -> Self {
        StaticContentNode { blob_ref }
    }

    fn fetch_schema(&self, ctx: &Context) -> FuseResult<Arc<SchemaBlob>> {
        if let Some(cached) = ctx.schema_cache.get(&self.blob_ref) {
            return Ok(cached);
        }
        let bytes = fetch_to_vec(ctx.blobs.as_ref(), &self.blob_ref)?;
        let decoded = Arc::new(schema::decode_schema(&bytes)?);
        ctx.schema_cache.insert(self.blob_ref.clone(), decoded.clone());
        Ok(decoded)
    }

    pub fn attr(&self, ctx: &Context) -> FuseResult<NodeAttr> {
        let schema = self.fetch_schema(ctx)?;
        let inode = self.blob_ref.sum64();
        Ok(match schema.as_ref() {
            SchemaBlob::File { size, mode, .. } => {
                NodeAttr::read_only_file(*size).with_mode_bits(*mode).with_inode_hint(inode)
            }
            SchemaBlob::Bytes { size, .. } => {
                NodeAttr::read_only_file(*size).with_inode_hint(inode)
            }
            SchemaBlob::Directory { mode, .. } => {
                NodeAttr::read_only_dir().with_mode_bits(*mode).with_inode_hint(inode)
            }
            SchemaBlob::Symlink { .. } => NodeAttr::symlink().with_inode_hint(inode),
            SchemaBlob::StaticSet { .. } | SchemaBlob::Permanode => {
                return Err(PosixError::transport(
                    "static-set/permanode blob is not directly openable content",
                ))
            }
        })
    }

    pub fn readdir(&self, ctx: &Context) -> FuseResult<Vec<DirEntry>> {
        let schema = self.fetch_schema(ctx)?;
        let entries_ref = match schema.as_ref() {
            SchemaBlob::Directory { entries, .. } => entries.clone(),
            _ => return Err(PosixError::transport("not a directory")),
        };
        let set_bytes = fetch_to_vec(ctx.blobs.as_ref(), &entries_ref)?;
        let set = schema::decode_schema(&set_bytes)?;
        let members = match set {
            SchemaBlob::StaticSet { members } => members,
            _ => return Err(PosixError::transport("entries blob is not a static-set")),
        };

        // One fetch per member; order is preserved as in the static-set (spec requires no
        // more than "unlimited for now" bounded concurrency, so this fans out freely).
        let mut out = Vec::with_capacity(members.len());
        for member in members {
            let child_schema = match ctx.schema_cache.get(&member) {
                Some(s) => s,
                None => {
                    let bytes = match fetch_to_vec(ctx.blobs.as_ref(), &member) {
                        Ok(b) => b,
                        Err(e) => {
                            log::warn!("skipping unreadable directory member {member}: {e}");
                            continue;
                        }
                    };
                    match schema::decode_schema(&bytes) {
                        Ok(s) => {
                            let s = Arc::new(s);
                            ctx.schema_cache.insert(member.clone(), s.clone());
                            s
                        }
                        Err(e) => {
                            log::warn!("skipping undecodable directory member {member}: {e}");
                            continue;
                        }
                    }
                }
            };
            let (name, kind) = match child_schema.as_ref() {
                SchemaBlob::File { file_name, .. } => (
                    file_name.clone().unwrap_or_else(|| member.digest()[..10].to_string()),
                    FileKind::RegularFile,
                ),
                SchemaBlob::Directory { file_name, .. } => (
                    file_name.clone().unwrap_or_else(|| member.digest()[..10].to_string()),
                    FileKind::Directory,
                ),
                SchemaBlob::Symlink { file_name, .. } => (
                    file_name.clone().unwrap_or_else(|| member.digest()[..10].to_string()),
                    FileKind::Symlink,
                ),
                _ => continue,
            };
            out.push(DirEntry::new(name, kind).with_inode(member.sum64()));
        }
        Ok(out)
    }

    pub fn lookup(&self, ctx: &Context, name: &str) -> FuseResult<(Node, NodeAttr)> {
        let schema = self.fetch_schema(ctx)?;
        let entries_ref = match schema.as_ref() {
            SchemaBlob::Directory { entries, .. } => entries.clone(),
            _ => return Err(PosixError::transport("not a directory")),
        };
        let set_bytes = fetch_to_vec(ctx.blobs.as_ref(), &entries_ref)?;
        let members = match schema::decode_schema(&set_bytes)? {
            SchemaBlob::StaticSet { members } => members,
            _ => return Err(PosixError::transport("entries blob is not a static-set")),
        };
        for member in members {
            let bytes = fetch_to_vec(ctx.blobs.as_ref(), &member)?;
            let child_schema = schema::decode_schema(&bytes)?;
            let matches = match &child_schema {
                SchemaBlob::File { file_name, .. }
                | SchemaBlob::Directory { file_name, .. }
                | SchemaBlob::Symlink { file_name, .. } => {
                    file_name.as_deref() == Some(name) || member.digest().starts_with(name)
                }
                _ => false,
            };
            if matches {
                let node = StaticContentNode::new(member.clone());
                let attr = node.attr(ctx)?;
                return Ok((Node::StaticContent(node), attr));
            }
        }
        Err(PosixError::not_found(format!("no such entry: {name}")))
    }

    pub fn readlink(&self, ctx: &Context) -> FuseResult<String> {
        match self.fetch_schema(ctx)?.as_ref() {
            SchemaBlob::Symlink { target, .. } => Ok(target.clone()),
            _ => Err(PosixError::transport("not a symlink")),
        }
    }

    /// Produces a `FileReader` for Open on a file/bytes schema.
    pub fn open_reader(&self, ctx: &Context) -> FuseResult<FileReader> {
        match self.fetch_schema(ctx)?.as_ref() {
            SchemaBlob::File { size, parts, .. } | SchemaBlob::Bytes { size, parts } => {
                Ok(FileReader::new(ctx.blobs.clone(), *size, parts.clone()))
            }
            _ => Err(PosixError::transport(
                "opening a schema blob whose type is not file or bytes for content reading",
            )),
        }
    }
}

