//! The `recent` directory: the 100 most-recently-created permanodes whose content resolves
//! to a file or directory, refreshed at most once per recent-search-interval.

use std::time::Instant;

use parking_lot::Mutex;

use crate::blobref::BlobRef;
use crate::client::blobstore::fetch_to_vec;
use crate::context::Context;
use crate::errors::{FuseResult, PosixError};
use crate::schema::{self, SchemaBlob};

use super::attr::{DirEntry, FileKind, NodeAttr};
use super::static_content::StaticContentNode;
use super::Node;

const RECENT_LIMIT: usize = 100;

struct Entry {
    name: String,
    content: BlobRef,
    kind: FileKind,
}

struct Cached {
    entries: Vec<Entry>,
    fetched_at: Option<Instant>,
}

pub struct RecentDir {
    cache: Mutex<Cached>,
    interval: std::time::Duration,
}

impl RecentDir {
    pub fn new(ctx: &Context) -> Self {
        RecentDir {
            cache: Mutex::new(Cached {
                entries: Vec::new(),
                fetched_at: None,
            }),
            interval: ctx.config.recent_search_interval,
        }
    }

    pub fn attr(&self) -> NodeAttr {
        NodeAttr::read_only_dir()
    }

    fn refresh(&self, ctx: &Context) -> FuseResult<()> {
        let mut cache = self.cache.lock();
        if let Some(fetched_at) = cache.fetched_at {
            if fetched_at.elapsed() < self.interval {
                return Ok(());
            }
        }

        let recent = ctx.describe.get_recent_permanodes(RECENT_LIMIT)?;
        let mut entries = Vec::with_capacity(recent.len());
        let mut seen_names = std::collections::HashSet::new();

        for permanode in recent {
            let Some(content) = permanode.content else {
                continue;
            };
            let bytes = match fetch_to_vec(ctx.blobs.as_ref(), &content) {
                Ok(b) => b,
                Err(e) => {
                    log::warn!("recent: skipping {content}, fetch failed: {e}");
                    continue;
                }
            };
            let schema = match schema::decode_schema(&bytes) {
                Ok(s) => s,
                Err(e) => {
                    log::warn!("recent: skipping {content}, undecodable: {e}");
                    continue;
                }
            };
            let (kind, file_name, mime) = match &schema {
                SchemaBlob::File { file_name, .. } => (FileKind::RegularFile, file_name.clone(), permanode.mime_type.clone()),
                SchemaBlob::Directory { file_name, .. } => (FileKind::Directory, file_name.clone(), None),
                _ => continue,
            };

            let short = &content.digest()[..10];
            let mut name = file_name.unwrap_or_else(|| short.to_string());
            let collided = !seen_names.insert(name.clone());
            if collided || name.is_empty() {
                let ext = extension_for(&name, mime.as_deref());
                name = format!("{short}{ext}");
                seen_names.insert(name.clone());
            }
            entries.push(Entry { name, content, kind });
        }

        cache.entries = entries;
        cache.fetched_at = Some(Instant::now());
        Ok(())
    }

    pub fn readdir(&self, ctx: &Context) -> FuseResult<Vec<DirEntry>> {
        self.refresh(ctx)?;
        let cache = self.cache.lock();
        Ok(cache
            .entries
            .iter()
            .map(|e| DirEntry::new(e.name.clone(), e.kind).with_inode(e.content.sum64()))
            .collect())
    }

    pub fn lookup(&self, ctx: &Context, name: &str) -> FuseResult<(Node, NodeAttr)> {
        // Lookup before any ReadDir must still force a refresh.
        self.refresh(ctx)?;
        let cache = self.cache.lock();
        let entry = cache
            .entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| PosixError::not_found(format!("no such recent entry: {name}")))?;
        let node = StaticContentNode::new(entry.content.clone());
        drop(cache);
        let attr = node.attr(ctx)?;
        Ok((Node::StaticContent(node), attr))
    }
}

/// A `.jpg` extension is substituted when the recorded name has none and the content's MIME
/// type begins with `image/jpeg`; otherwise whatever extension the original name carried
/// (if any) is preserved, defaulting to none.
fn extension_for(original_name: &str, mime_type: Option<&str>) -> String {
    if let Some(dot) = original_name.rfind('.') {
        return original_name[dot..].to_string();
    }
    if mime_type.is_some_and(|m| m.starts_with("image/jpeg")) {
        return ".jpg".to_string();
    }
    String::new()
}
