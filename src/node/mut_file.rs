//! `mutFile`: the leaf of the mutable tree, either a regular file or a symlink. Size and
//! timestamp bookkeeping happens in memory; the authoritative content blob only changes
//! when a write handle's Flush uploads a new one (`commit_content`).

use std::collections::HashMap;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::blobref::BlobRef;
use crate::client::describe::ATTR_CONTENT;
use crate::client::signer::Claim;
use crate::context::Context;
use crate::errors::{FuseResult, PosixError};

use super::attr::NodeAttr;

struct MutableState {
    content: Option<BlobRef>,
    size: u64,
    mtime: Option<SystemTime>,
    atime: Option<SystemTime>,
    xattrs: HashMap<String, String>,
}

pub struct MutFile {
    pub permanode: BlobRef,
    symlink_target: Option<String>,
    as_of: Option<DateTime<Utc>>,
    state: Mutex<MutableState>,
}

impl MutFile {
    pub fn new_file(
        permanode: BlobRef,
        content: Option<BlobRef>,
        size: u64,
        xattrs: HashMap<String, String>,
        as_of: Option<DateTime<Utc>>,
    ) -> Self {
        MutFile {
            permanode,
            symlink_target: None,
            as_of,
            state: Mutex::new(MutableState {
                content,
                size,
                mtime: None,
                atime: None,
                xattrs,
            }),
        }
    }

    pub fn new_symlink(
        permanode: BlobRef,
        target: String,
        xattrs: HashMap<String, String>,
        as_of: Option<DateTime<Utc>>,
    ) -> Self {
        MutFile {
            permanode,
            symlink_target: Some(target),
            as_of,
            state: Mutex::new(MutableState {
                content: None,
                size: 0,
                mtime: None,
                atime: None,
                xattrs,
            }),
        }
    }

    pub fn read_only(&self) -> bool {
        self.as_of.is_some()
    }

    pub fn is_symlink(&self) -> bool {
        self.symlink_target.is_some()
    }

    pub fn attr(&self) -> NodeAttr {
        let state = self.state.lock();
        let base = if self.is_symlink() {
            NodeAttr::symlink()
        } else if self.read_only() {
            NodeAttr::read_only_file(state.size)
        } else {
            NodeAttr::read_write_file(state.size)
        };
        NodeAttr {
            mtime: state.mtime,
            atime: state.atime,
            ..base
        }
        .with_inode_hint(self.permanode.sum64())
    }

    pub fn readlink(&self) -> FuseResult<String> {
        self.symlink_target
            .clone()
            .ok_or_else(|| PosixError::transport("readlink on a non-symlink mutFile"))
    }

    pub fn content_ref(&self) -> Option<BlobRef> {
        self.state.lock().content.clone()
    }

    pub fn size(&self) -> u64 {
        self.state.lock().size
    }

    /// Raises the cached size if `at_least` exceeds it; used after a Write so the node's
    /// size reflects the scratch file without waiting for Flush.
    pub fn set_size_at_least(&self, at_least: u64) {
        let mut state = self.state.lock();
        if at_least > state.size {
            state.size = at_least;
        }
    }

    pub fn setattr(
        &self,
        size: Option<u64>,
        mtime: Option<SystemTime>,
        atime: Option<SystemTime>,
    ) -> FuseResult<NodeAttr> {
        if self.read_only() {
            return Err(PosixError::permission_denied("setattr on an at/<time> view"));
        }
        {
            let mut state = self.state.lock();
            if let Some(size) = size {
                state.size = size;
            }
            if let Some(mtime) = mtime {
                state.mtime = Some(mtime);
            }
            if let Some(atime) = atime {
                state.atime = Some(atime);
            }
        }
        Ok(self.attr())
    }

    /// Called by a write handle's Flush: uploads a `camliContent` claim and updates the
    /// in-memory content ref and size together so they're never observed out of sync.
    pub fn commit_content(&self, ctx: &Context, new_content: BlobRef, new_size: u64) -> FuseResult<()> {
        if self.read_only() {
            return Err(PosixError::permission_denied("write on an at/<time> view"));
        }
        ctx.signer
            .sign_and_upload(Claim::set_attribute(self.permanode.clone(), ATTR_CONTENT, new_content.as_str()))?;
        let mut state = self.state.lock();
        state.content = Some(new_content);
        state.size = new_size;
        Ok(())
    }

    pub fn getxattr(&self, name: &str) -> FuseResult<Vec<u8>> {
        let state = self.state.lock();
        let raw = state
            .xattrs
            .get(name)
            .ok_or_else(|| PosixError::no_xattr(format!("no such attribute: {name}")))?;
        crate::xattr::get(&single_attr_description(name, raw), name)
    }

    pub fn listxattr(&self, max_size: usize) -> FuseResult<Vec<u8>> {
        let state = self.state.lock();
        let mut out = Vec::new();
        let mut names: Vec<&String> = state.xattrs.keys().collect();
        names.sort();
        for name in names {
            out.extend_from_slice(name.as_bytes());
            out.push(0);
        }
        if max_size != 0 && out.len() > max_size {
            return Err(PosixError::range(format!(
                "xattr list is {} bytes, buffer is {max_size}",
                out.len()
            )));
        }
        Ok(out)
    }

    pub fn setxattr(&self, ctx: &Context, name: &str, value: &[u8]) -> FuseResult<()> {
        if self.read_only() {
            return Err(PosixError::permission_denied("setxattr on an at/<time> view"));
        }
        let encoded = crate::xattr::encode_value(value);
        ctx.signer.sign_and_upload(Claim::set_attribute(
            self.permanode.clone(),
            format!("xattr:{name}"),
            encoded.clone(),
        ))?;
        self.state.lock().xattrs.insert(name.to_string(), encoded);
        Ok(())
    }

    pub fn removexattr(&self, ctx: &Context, name: &str) -> FuseResult<()> {
        if self.read_only() {
            return Err(PosixError::permission_denied("removexattr on an at/<time> view"));
        }
        ctx.signer
            .sign_and_upload(Claim::del_attribute(self.permanode.clone(), format!("xattr:{name}")))?;
        self.state.lock().xattrs.remove(name);
        Ok(())
    }
}

/// Builds a throwaway one-attribute `PermanodeDescription` so `crate::xattr::get` (which
/// operates on a describe snapshot) can decode a single already-loaded value without a
/// second describe round trip.
fn single_attr_description(name: &str, base64_value: &str) -> crate::client::describe::PermanodeDescription {
    let mut desc = crate::client::describe::PermanodeDescription::new();
    desc.set_attr(&format!("xattr:{name}"), base64_value.to_string());
    desc
}
