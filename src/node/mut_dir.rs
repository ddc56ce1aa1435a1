//! `mutDir`: a permanode-backed mutable directory. Children are derived from the
//! permanode's `camliPath:<name>` attributes, re-populated from describe at most once per
//! populate-interval, with locally-created children staying visible until the
//! deletion-refresh window elapses (spec data-model invariant 4).

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::blobref::BlobRef;
use crate::client::blobstore::fetch_to_vec;
use crate::client::describe::{ATTR_NODE_TYPE, ATTR_SYMLINK_TARGET, ATTR_TITLE};
use crate::client::signer::Claim;
use crate::context::Context;
use crate::errors::{FuseResult, PosixError};
use crate::schema::{self, SchemaBlob};

use super::attr::{DirEntry, FileKind, NodeAttr};
use super::mut_file::MutFile;
use super::Node;

#[derive(Debug, Clone)]
struct ChildEntry {
    permanode: BlobRef,
    kind: FileKind,
    content: Option<BlobRef>,
    size: u64,
    symlink_target: Option<String>,
    xattrs: HashMap<String, String>,
}

struct PopulateState {
    children: HashMap<String, ChildEntry>,
    last_populate: Option<Instant>,
    /// name -> (entry, created_at); merged on top of `children` until the deletion-refresh
    /// window elapses, so a just-created child stays visible even if describe hasn't
    /// caught up yet.
    locally_created: HashMap<String, (ChildEntry, Instant)>,
}

pub struct MutDir {
    pub permanode: BlobRef,
    as_of: Option<DateTime<Utc>>,
    /// Set by the `roVersionsDir` family: browsing is otherwise identical to an ordinary
    /// mutDir, but a file child resolves to a `roFileVersionsDir` instead of a `mutFile`,
    /// and every mutation capability is unconditionally denied regardless of `as_of`.
    versions_view: bool,
    state: Mutex<PopulateState>,
}

impl MutDir {
    pub fn new(permanode: BlobRef, as_of: Option<DateTime<Utc>>) -> Self {
        MutDir {
            permanode,
            as_of,
            versions_view: false,
            state: Mutex::new(PopulateState {
                children: HashMap::new(),
                last_populate: None,
                locally_created: HashMap::new(),
            }),
        }
    }

    pub fn new_versions_view(permanode: BlobRef) -> Self {
        MutDir {
            permanode,
            as_of: None,
            versions_view: true,
            state: Mutex::new(PopulateState {
                children: HashMap::new(),
                last_populate: None,
                locally_created: HashMap::new(),
            }),
        }
    }

    fn read_only(&self) -> bool {
        self.as_of.is_some() || self.versions_view
    }

    pub fn attr(&self) -> NodeAttr {
        if self.read_only() {
            NodeAttr::read_only_dir().with_inode_hint(self.permanode.sum64())
        } else {
            NodeAttr::read_write_dir().with_inode_hint(self.permanode.sum64())
        }
    }

    /// Classifies one child permanode per the rule in spec: symlink target wins first,
    /// then an explicit directory marker (or the presence of any `camliPath:` child of its
    /// own), then a `camliContent` resolving to a `file` schema.
    fn classify_child(&self, ctx: &Context, child_permanode: &BlobRef) -> FuseResult<Option<ChildEntry>> {
        let desc = ctx.describe.describe_as_of(child_permanode, self.as_of)?;
        if let Some(target) = desc.symlink_target() {
            return Ok(Some(ChildEntry {
                permanode: child_permanode.clone(),
                kind: FileKind::Symlink,
                content: None,
                size: 0,
                symlink_target: Some(target.to_string()),
                xattrs: desc.xattrs.clone(),
            }));
        }
        if desc.node_type() == Some("directory") || !desc.paths.is_empty() {
            return Ok(Some(ChildEntry {
                permanode: child_permanode.clone(),
                kind: FileKind::Directory,
                content: None,
                size: 0,
                symlink_target: None,
                xattrs: HashMap::new(),
            }));
        }
        if let Some(content) = desc.camli_content() {
            let bytes = fetch_to_vec(ctx.blobs.as_ref(), &content)?;
            if let SchemaBlob::File { size, .. } = schema::decode_schema(&bytes)? {
                return Ok(Some(ChildEntry {
                    permanode: child_permanode.clone(),
                    kind: FileKind::RegularFile,
                    content: Some(content),
                    size,
                    symlink_target: None,
                    xattrs: desc.xattrs.clone(),
                }));
            }
        }
        Ok(None)
    }

    fn populate(&self, ctx: &Context) -> FuseResult<()> {
        {
            let state = self.state.lock();
            if let Some(last) = state.last_populate {
                if last.elapsed() < ctx.config.populate_interval {
                    return Ok(());
                }
            }
        }

        let desc = ctx.describe.describe_as_of(&self.permanode, self.as_of)?;
        let mut children = HashMap::with_capacity(desc.paths.len());
        for (name, child_permanode) in &desc.paths {
            match self.classify_child(ctx, child_permanode) {
                Ok(Some(entry)) => {
                    children.insert(name.clone(), entry);
                }
                Ok(None) => {}
                Err(e) => log::warn!("mutDir: skipping child {name:?}, describe failed: {e}"),
            }
        }

        let mut state = self.state.lock();
        state.locally_created.retain(|name, (_, created_at)| {
            created_at.elapsed() < ctx.config.deletion_refresh_window && !children.contains_key(name)
        });
        state.children = children;
        state.last_populate = Some(Instant::now());
        Ok(())
    }

    fn snapshot(&self, ctx: &Context) -> FuseResult<HashMap<String, ChildEntry>> {
        self.populate(ctx)?;
        let state = self.state.lock();
        let mut out = state.children.clone();
        for (name, (entry, _)) in &state.locally_created {
            out.entry(name.clone()).or_insert_with(|| entry.clone());
        }
        Ok(out)
    }

    pub fn readdir(&self, ctx: &Context) -> FuseResult<Vec<DirEntry>> {
        let children = self.snapshot(ctx)?;
        Ok(children
            .into_iter()
            .map(|(name, entry)| DirEntry::new(name, entry.kind).with_inode(entry.permanode.sum64()))
            .collect())
    }

    pub fn lookup(&self, name: &str) -> FuseResult<(Node, NodeAttr)> {
        let children = self.children_blocking();
        let entry = children
            .get(name)
            .ok_or_else(|| PosixError::not_found(format!("no such entry: {name}")))?;
        self.node_for(entry)
    }

    /// Looks up without forcing a fresh populate; callers that already populated via
    /// `readdir`/`snapshot` reuse it. Exposed because Lookup is far more frequent than
    /// ReadDir and re-populating on every Lookup would defeat the populate-interval.
    fn children_blocking(&self) -> HashMap<String, ChildEntry> {
        let state = self.state.lock();
        let mut out = state.children.clone();
        for (name, (entry, _)) in &state.locally_created {
            out.entry(name.clone()).or_insert_with(|| entry.clone());
        }
        out
    }

    fn node_for(&self, entry: &ChildEntry) -> FuseResult<(Node, NodeAttr)> {
        match entry.kind {
            FileKind::Directory => {
                let node = if self.versions_view {
                    MutDir::new_versions_view(entry.permanode.clone())
                } else {
                    MutDir::new(entry.permanode.clone(), self.as_of)
                };
                let attr = node.attr();
                Ok((Node::MutDir(node), attr))
            }
            FileKind::RegularFile if self.versions_view => {
                let node = super::ro_versions::RoFileVersionsDir::new(entry.permanode.clone());
                let attr = node.attr();
                Ok((Node::RoFileVersions(node), attr))
            }
            FileKind::RegularFile => {
                let node = MutFile::new_file(
                    entry.permanode.clone(),
                    entry.content.clone(),
                    entry.size,
                    entry.xattrs.clone(),
                    self.as_of,
                );
                let attr = node.attr();
                Ok((Node::MutFile(node), attr))
            }
            FileKind::Symlink => {
                // A symlink has no version history of its own (unlike a regular file, which
                // gets a `RoFileVersionsDir`); force it read-only in a versions view rather
                // than let it inherit `self.as_of`, which is `None` there and would otherwise
                // make it look mutable.
                let as_of = if self.versions_view { Some(Utc::now()) } else { self.as_of };
                let node = MutFile::new_symlink(
                    entry.permanode.clone(),
                    entry.symlink_target.clone().unwrap_or_default(),
                    entry.xattrs.clone(),
                    as_of,
                );
                let attr = node.attr();
                Ok((Node::MutFile(node), attr))
            }
        }
    }

    fn require_writable(&self) -> FuseResult<()> {
        if self.read_only() {
            return Err(PosixError::permission_denied("mutation under an at/<time> view"));
        }
        Ok(())
    }

    fn insert_local_child(&self, name: &str, entry: ChildEntry) {
        let mut state = self.state.lock();
        state.locally_created.insert(name.to_string(), (entry, Instant::now()));
    }

    fn path_attr_name(name: &str) -> String {
        format!("camliPath:{name}")
    }

    pub fn mkdir(&self, ctx: &Context, name: &str) -> FuseResult<(Node, NodeAttr)> {
        self.require_writable()?;
        let child_permanode = ctx.signer.new_permanode()?;
        ctx.signer
            .sign_and_upload(Claim::set_attribute(child_permanode.clone(), ATTR_NODE_TYPE, "directory"))?;
        ctx.signer.sign_and_upload(Claim::set_attribute(
            self.permanode.clone(),
            Self::path_attr_name(name),
            child_permanode.as_str(),
        ))?;
        if name == ".DS_Store" {
            ctx.signer
                .sign_and_upload(Claim::set_attribute(child_permanode.clone(), "camliDefVis", "hide"))?;
        }
        let entry = ChildEntry {
            permanode: child_permanode,
            kind: FileKind::Directory,
            content: None,
            size: 0,
            symlink_target: None,
            xattrs: HashMap::new(),
        };
        self.insert_local_child(name, entry.clone());
        self.node_for(&entry)
    }

    pub fn create(&self, ctx: &Context, name: &str) -> FuseResult<(Node, NodeAttr)> {
        self.require_writable()?;
        let child_permanode = ctx.signer.new_permanode()?;
        ctx.signer.sign_and_upload(Claim::set_attribute(
            self.permanode.clone(),
            Self::path_attr_name(name),
            child_permanode.as_str(),
        ))?;
        if name == ".DS_Store" {
            ctx.signer
                .sign_and_upload(Claim::set_attribute(child_permanode.clone(), "camliDefVis", "hide"))?;
        }
        let entry = ChildEntry {
            permanode: child_permanode,
            kind: FileKind::RegularFile,
            content: None,
            size: 0,
            symlink_target: None,
            xattrs: HashMap::new(),
        };
        self.insert_local_child(name, entry.clone());
        self.node_for(&entry)
    }

    /// Named-pipe creation is the only Mknod case the original callers rely on; it is
    /// handled identically to Create (an empty permanode-backed file), since this core has
    /// no real device-node semantics to offer beyond a placeholder entry.
    pub fn mknod(&self, ctx: &Context, name: &str) -> FuseResult<(Node, NodeAttr)> {
        self.create(ctx, name)
    }

    pub fn symlink(&self, ctx: &Context, name: &str, target: &str) -> FuseResult<(Node, NodeAttr)> {
        self.require_writable()?;
        let child_permanode = ctx.signer.new_permanode()?;
        ctx.signer
            .sign_and_upload(Claim::set_attribute(child_permanode.clone(), ATTR_SYMLINK_TARGET, target))?;
        ctx.signer.sign_and_upload(Claim::set_attribute(
            self.permanode.clone(),
            Self::path_attr_name(name),
            child_permanode.as_str(),
        ))?;
        let entry = ChildEntry {
            permanode: child_permanode,
            kind: FileKind::Symlink,
            content: None,
            size: 0,
            symlink_target: Some(target.to_string()),
            xattrs: HashMap::new(),
        };
        self.insert_local_child(name, entry.clone());
        self.node_for(&entry)
    }

    pub fn remove(&self, ctx: &Context, name: &str) -> FuseResult<()> {
        self.require_writable()?;
        ctx.signer
            .sign_and_upload(Claim::del_attribute(self.permanode.clone(), Self::path_attr_name(name)))?;
        let mut state = self.state.lock();
        state.children.remove(name);
        state.locally_created.remove(name);
        Ok(())
    }

    /// Renames a child, possibly to a different directory: two claims sharing one claim
    /// date (set on the destination, delete on the source) so replay at a coarser time
    /// resolution never observes one without the other.
    pub fn rename(&self, ctx: &Context, name: &str, dest: &MutDir, new_name: &str) -> FuseResult<()> {
        self.require_writable()?;
        dest.require_writable()?;
        let children = self.children_blocking();
        let entry = children
            .get(name)
            .ok_or_else(|| PosixError::not_found(format!("no such entry: {name}")))?
            .clone();

        let claim_date = Utc::now();
        let mut set_claim = Claim::set_attribute(dest.permanode.clone(), Self::path_attr_name(new_name), entry.permanode.as_str());
        set_claim.claim_date = claim_date;
        let mut del_claim = Claim::del_attribute(self.permanode.clone(), Self::path_attr_name(name));
        del_claim.claim_date = claim_date;

        ctx.signer.sign_and_upload(set_claim)?;
        ctx.signer.sign_and_upload(del_claim)?;

        if entry.kind == FileKind::Directory {
            ctx.signer
                .sign_and_upload(Claim::set_attribute(entry.permanode.clone(), ATTR_TITLE, new_name))?;
        }

        {
            let mut state = self.state.lock();
            state.children.remove(name);
            state.locally_created.remove(name);
        }
        dest.insert_local_child(new_name, entry);
        Ok(())
    }
}

