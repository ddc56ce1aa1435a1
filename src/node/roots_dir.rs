//! The `roots` directory (and its read-only twin under `at/<time>`): permanodes tagged
//! `camliRoot`, plus importer roots tagged `camliImportRoot` shown as `importer-<name>`.

use chrono::{DateTime, Utc};

use crate::blobref::BlobRef;
use crate::client::describe::{ATTR_IMPORT_ROOT, ATTR_ROOT, ATTR_TITLE};
use crate::client::signer::Claim;
use crate::context::Context;
use crate::errors::{FuseResult, PosixError};

use super::attr::{DirEntry, FileKind, NodeAttr};
use super::mut_dir::MutDir;
use super::Node;

const IMPORTER_PREFIX: &str = "importer-";
const LISTING_LIMIT: usize = 10_000;

#[derive(Debug, Clone)]
pub struct RootsDir {
    as_of: Option<DateTime<Utc>>,
}

impl RootsDir {
    pub fn new(as_of: Option<DateTime<Utc>>) -> Self {
        RootsDir { as_of }
    }

    fn read_only(&self) -> bool {
        self.as_of.is_some()
    }

    pub fn attr(&self) -> NodeAttr {
        if self.read_only() {
            NodeAttr::read_only_dir()
        } else {
            NodeAttr::read_write_dir()
        }
    }

    fn find(&self, ctx: &Context, name: &str) -> FuseResult<BlobRef> {
        if let Some(root_name) = name.strip_prefix(IMPORTER_PREFIX) {
            for candidate in ctx.describe.get_permanodes_with_attr(ATTR_IMPORT_ROOT, LISTING_LIMIT, self.as_of)? {
                let desc = ctx.describe.describe_as_of(&candidate, self.as_of)?;
                if desc.import_root() == Some(root_name) {
                    return Ok(candidate);
                }
            }
        } else {
            for candidate in ctx.describe.get_permanodes_with_attr(ATTR_ROOT, LISTING_LIMIT, self.as_of)? {
                let desc = ctx.describe.describe_as_of(&candidate, self.as_of)?;
                if desc.root_name() == Some(name) {
                    return Ok(candidate);
                }
            }
        }
        Err(PosixError::not_found(format!("no such root: {name}")))
    }

    pub fn readdir(&self, ctx: &Context) -> FuseResult<Vec<DirEntry>> {
        let mut out = Vec::new();
        for candidate in ctx.describe.get_permanodes_with_attr(ATTR_ROOT, LISTING_LIMIT, self.as_of)? {
            let desc = ctx.describe.describe_as_of(&candidate, self.as_of)?;
            if let Some(name) = desc.root_name() {
                out.push(DirEntry::new(name, FileKind::Directory).with_inode(candidate.sum64()));
            }
        }
        for candidate in ctx.describe.get_permanodes_with_attr(ATTR_IMPORT_ROOT, LISTING_LIMIT, self.as_of)? {
            let desc = ctx.describe.describe_as_of(&candidate, self.as_of)?;
            if let Some(name) = desc.import_root() {
                out.push(DirEntry::new(format!("{IMPORTER_PREFIX}{name}"), FileKind::Directory).with_inode(candidate.sum64()));
            }
        }
        Ok(out)
    }

    pub fn lookup(&self, ctx: &Context, name: &str) -> FuseResult<(Node, NodeAttr)> {
        let permanode = self.find(ctx, name)?;
        let node = MutDir::new(permanode, self.as_of);
        let attr = node.attr();
        Ok((Node::MutDir(node), attr))
    }

    pub fn mkdir(&self, ctx: &Context, name: &str) -> FuseResult<(Node, NodeAttr)> {
        if self.read_only() {
            return Err(PosixError::permission_denied("cannot create a root under an at/<time> view"));
        }
        let permanode = ctx.signer.new_permanode()?;
        ctx.signer
            .sign_and_upload(Claim::set_attribute(permanode.clone(), ATTR_ROOT, name))?;
        ctx.signer
            .sign_and_upload(Claim::set_attribute(permanode.clone(), ATTR_TITLE, name))?;
        let node = MutDir::new(permanode, None);
        let attr = node.attr();
        Ok((Node::MutDir(node), attr))
    }

    pub fn remove(&self, ctx: &Context, name: &str) -> FuseResult<()> {
        if self.read_only() {
            return Err(PosixError::permission_denied("cannot remove a root under an at/<time> view"));
        }
        let permanode = self.find(ctx, name)?;
        ctx.signer.sign_and_upload(Claim::del_attribute(permanode, ATTR_ROOT))?;
        Ok(())
    }

    pub fn rename(&self, ctx: &Context, old_name: &str, new_name: &str) -> FuseResult<()> {
        if self.read_only() {
            return Err(PosixError::permission_denied("cannot rename a root under an at/<time> view"));
        }
        let permanode = self.find(ctx, old_name)?;
        if let Ok(existing) = self.find(ctx, new_name) {
            let desc = ctx.describe.describe(&existing)?;
            if !desc.paths.is_empty() {
                return Err(PosixError::invalid(format!(
                    "root {new_name:?} already has children; refusing to rename over it"
                )));
            }
        }
        ctx.signer
            .sign_and_upload(Claim::set_attribute(permanode.clone(), ATTR_ROOT, new_name))?;
        ctx.signer
            .sign_and_upload(Claim::set_attribute(permanode, ATTR_TITLE, new_name))?;
        Ok(())
    }
}
