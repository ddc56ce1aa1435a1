//! The FUSE dispatch loop: one `fuser::Filesystem` impl that turns every kernel request into
//! a threadpool job against the node tree, then replies from whichever thread finishes it.
//! Every method here does the same three things: resolve an inode/handle, hand the real work
//! to a worker so the calling thread (which the kernel is blocked on) returns immediately,
//! and translate a `PosixError` into `reply.error(..)` if the job fails.

pub mod nodes;
pub mod request;
pub mod table;

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, ReplyXattr, Request, TimeOrNow,
};
use libc::c_int;
use threadpool::ThreadPool;

use crate::context::Context;
use crate::errors::PosixError;
use crate::handle::{DirHandle, ReadHandle, WriteHandle};
use crate::node::attr::{FileKind, NodeAttr};
use crate::node::root::RootDir;
use crate::node::Node;
use crate::stats;

use nodes::{NodeTable, ROOT_INODE};
use request::RequestRegistry;
use table::SlotTable;

/// What a kernel file handle (as opposed to a directory handle) refers to. Read and write
/// handles share one numeric space since the kernel always pairs a file handle with the
/// inode it was opened against; nothing ever confuses the two.
enum OpenFile {
    Read(ReadHandle),
    Write(WriteHandle),
}

pub struct CamliFs {
    ctx: Arc<Context>,
    nodes: Arc<NodeTable>,
    dir_handles: Arc<parking_lot::Mutex<SlotTable<Arc<DirHandle>>>>,
    file_handles: Arc<parking_lot::Mutex<SlotTable<Arc<OpenFile>>>>,
    requests: Arc<RequestRegistry>,
    pool: ThreadPool,
}

impl CamliFs {
    pub fn new(ctx: Arc<Context>, num_workers: usize) -> Self {
        CamliFs {
            ctx,
            nodes: Arc::new(NodeTable::new(Node::Root(RootDir))),
            dir_handles: Arc::new(parking_lot::Mutex::new(SlotTable::new())),
            file_handles: Arc::new(parking_lot::Mutex::new(SlotTable::new())),
            requests: Arc::new(RequestRegistry::new()),
            pool: ThreadPool::new(num_workers.max(1)),
        }
    }

    /// Hands `job` to the threadpool, unless `req`'s unique ID is already in flight (an
    /// OSXFUSE redelivery of a request whose first dispatch hasn't replied yet) — in which
    /// case the redelivery is dropped on the floor, since the original dispatch still owns
    /// the only `reply` the kernel is waiting on.
    fn dispatch(&self, req: &Request, job: impl FnOnce() + Send + 'static) {
        let unique = req.unique();
        if !self.requests.begin(unique) {
            log::debug!("dropping redelivered request {unique:#x}");
            return;
        }
        let requests = self.requests.clone();
        self.pool.execute(move || {
            job();
            requests.end(unique);
        });
    }
}

fn time_or_now(t: Option<TimeOrNow>) -> Option<SystemTime> {
    t.map(|t| match t {
        TimeOrNow::SpecificTime(st) => st,
        TimeOrNow::Now => SystemTime::now(),
    })
}

fn to_file_type(kind: FileKind) -> FileType {
    match kind {
        FileKind::RegularFile => FileType::RegularFile,
        FileKind::Directory => FileType::Directory,
        FileKind::Symlink => FileType::Symlink,
    }
}

fn to_file_attr(ino: u64, attr: &NodeAttr, ctx: &Context) -> FileAttr {
    let default_time = ctx.started_at;
    FileAttr {
        ino,
        size: attr.size,
        blocks: (attr.size + 511) / 512,
        atime: attr.atime.unwrap_or(default_time),
        mtime: attr.mtime.unwrap_or(default_time),
        ctime: attr.ctime.unwrap_or(default_time),
        crtime: default_time,
        kind: to_file_type(attr.kind),
        perm: (attr.mode & 0o7777) as u16,
        nlink: if attr.kind == FileKind::Directory { 2 } else { 1 },
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: 4096,
        flags: 0,
    }
}

fn os_str_to_name(name: &OsStr) -> Result<String, c_int> {
    name.to_str().map(str::to_string).ok_or(libc::EINVAL)
}

impl Filesystem for CamliFs {
    fn init(&mut self, _req: &Request, config: &mut KernelConfig) -> Result<(), c_int> {
        let _ = config.set_max_write(self.ctx.config.max_write);
        log::info!("filesystem ready (max_write={})", self.ctx.config.max_write);
        Ok(())
    }

    fn destroy(&mut self) {
        log::info!("filesystem unmounted");
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let name = match os_str_to_name(name) {
            Ok(n) => n,
            Err(code) => return reply.error(code),
        };
        let ctx = self.ctx.clone();
        let nodes = self.nodes.clone();
        self.dispatch(_req, move || {
            let Some(parent_node) = nodes.get(parent) else {
                return reply.error(libc::ESTALE);
            };
            match parent_node.lookup(&ctx, &name) {
                Ok((child, attr)) => {
                    let (ino, _) = nodes.lookup(parent, &name, child, attr.inode_hint);
                    reply.entry(&ctx.config.entry_ttl, &to_file_attr(ino, &attr, &ctx), 0);
                }
                Err(e) => reply.error(e.raw_error()),
            }
        });
    }

    fn forget(&mut self, _req: &Request, ino: u64, nlookup: u64) {
        self.nodes.forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let ctx = self.ctx.clone();
        let nodes = self.nodes.clone();
        self.dispatch(_req, move || {
            let Some(node) = nodes.get(ino) else {
                return reply.error(libc::ESTALE);
            };
            match node.attr(&ctx) {
                Ok(attr) => reply.attr(&ctx.config.entry_ttl, &to_file_attr(ino, &attr, &ctx)),
                Err(e) => reply.error(e.raw_error()),
            }
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        if self.ctx.config.read_only {
            return reply.error(libc::EROFS);
        }
        let ctx = self.ctx.clone();
        let nodes = self.nodes.clone();
        let file_handles = self.file_handles.clone();
        let mtime = time_or_now(mtime);
        let atime = time_or_now(atime);
        self.dispatch(_req, move || {
            let Some(node) = nodes.get(ino) else {
                return reply.error(libc::ESTALE);
            };
            if let (Some(new_size), Some(fh)) = (size, fh) {
                if let Some(open) = file_handles.lock().get(fh).cloned() {
                    if let OpenFile::Write(w) = open.as_ref() {
                        if let Err(e) = w.truncate(new_size) {
                            return reply.error(e.raw_error());
                        }
                    }
                }
            }
            match node.setattr(size, mtime, atime) {
                Ok(attr) => reply.attr(&ctx.config.entry_ttl, &to_file_attr(ino, &attr, &ctx)),
                Err(e) => reply.error(e.raw_error()),
            }
        });
    }

    fn readlink(&mut self, _req: &Request, ino: u64, reply: ReplyData) {
        let ctx = self.ctx.clone();
        let nodes = self.nodes.clone();
        self.dispatch(_req, move || {
            let Some(node) = nodes.get(ino) else {
                return reply.error(libc::ESTALE);
            };
            match node.readlink(&ctx) {
                Ok(target) => reply.data(target.as_bytes()),
                Err(e) => reply.error(e.raw_error()),
            }
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn mknod(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        if self.ctx.config.read_only {
            return reply.error(libc::EROFS);
        }
        let name = match os_str_to_name(name) {
            Ok(n) => n,
            Err(code) => return reply.error(code),
        };
        let ctx = self.ctx.clone();
        let nodes = self.nodes.clone();
        self.dispatch(_req, move || {
            let Some(parent_node) = nodes.get(parent) else {
                return reply.error(libc::ESTALE);
            };
            match parent_node.mknod(&ctx, &name) {
                Ok((child, attr)) => {
                    let (ino, _) = nodes.lookup(parent, &name, child, attr.inode_hint);
                    reply.entry(&ctx.config.entry_ttl, &to_file_attr(ino, &attr, &ctx), 0);
                }
                Err(e) => reply.error(e.raw_error()),
            }
        });
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        if self.ctx.config.read_only {
            return reply.error(libc::EROFS);
        }
        let name = match os_str_to_name(name) {
            Ok(n) => n,
            Err(code) => return reply.error(code),
        };
        let ctx = self.ctx.clone();
        let nodes = self.nodes.clone();
        self.dispatch(_req, move || {
            let Some(parent_node) = nodes.get(parent) else {
                return reply.error(libc::ESTALE);
            };
            match parent_node.mkdir(&ctx, &name) {
                Ok((child, attr)) => {
                    let (ino, _) = nodes.lookup(parent, &name, child, attr.inode_hint);
                    reply.entry(&ctx.config.entry_ttl, &to_file_attr(ino, &attr, &ctx), 0);
                }
                Err(e) => reply.error(e.raw_error()),
            }
        });
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        self.remove_common(_req, parent, name, reply);
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        self.remove_common(_req, parent, name, reply);
    }

    fn symlink(
        &mut self,
        _req: &Request,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        if self.ctx.config.read_only {
            return reply.error(libc::EROFS);
        }
        let name = match os_str_to_name(link_name) {
            Ok(n) => n,
            Err(code) => return reply.error(code),
        };
        let Some(target) = target.to_str().map(str::to_string) else {
            return reply.error(libc::EINVAL);
        };
        let ctx = self.ctx.clone();
        let nodes = self.nodes.clone();
        self.dispatch(_req, move || {
            let Some(parent_node) = nodes.get(parent) else {
                return reply.error(libc::ESTALE);
            };
            match parent_node.symlink(&ctx, &name, &target) {
                Ok((child, attr)) => {
                    let (ino, _) = nodes.lookup(parent, &name, child, attr.inode_hint);
                    reply.entry(&ctx.config.entry_ttl, &to_file_attr(ino, &attr, &ctx), 0);
                }
                Err(e) => reply.error(e.raw_error()),
            }
        });
    }

    fn rename(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        if self.ctx.config.read_only {
            return reply.error(libc::EROFS);
        }
        let name = match os_str_to_name(name) {
            Ok(n) => n,
            Err(code) => return reply.error(code),
        };
        let new_name = match os_str_to_name(newname) {
            Ok(n) => n,
            Err(code) => return reply.error(code),
        };
        let ctx = self.ctx.clone();
        let nodes = self.nodes.clone();
        self.dispatch(_req, move || {
            let (Some(src), Some(dst)) = (nodes.get(parent), nodes.get(newparent)) else {
                return reply.error(libc::ESTALE);
            };
            match src.rename(&ctx, &name, &dst, &new_name) {
                Ok(()) => reply.ok(),
                Err(e) => reply.error(e.raw_error()),
            }
        });
    }

    fn open(&mut self, _req: &Request, ino: u64, flags: i32, reply: ReplyOpen) {
        let ctx = self.ctx.clone();
        let nodes = self.nodes.clone();
        let file_handles = self.file_handles.clone();
        self.dispatch(_req, move || {
            let Some(node) = nodes.get(ino) else {
                return reply.error(libc::ESTALE);
            };
            if matches!(node.as_ref(), Node::StaticText(_)) {
                return reply.opened(0, fuser::consts::FOPEN_DIRECT_IO);
            }
            let access_mode = flags & libc::O_ACCMODE;
            let wants_write = access_mode != libc::O_RDONLY;
            let truncate = flags & libc::O_TRUNC != 0;
            let is_mut_file = matches!(node.as_ref(), Node::MutFile(_));
            if wants_write && !is_mut_file {
                return reply.error(libc::EACCES);
            }
            if is_mut_file {
                ctx.stats.incr(stats::MUTFILE_OPEN);
                ctx.stats.incr(if wants_write {
                    stats::MUTFILE_OPEN_RW
                } else {
                    stats::MUTFILE_OPEN_RO
                });
                if !wants_write {
                    ctx.stats.incr(stats::ROFILE_OPEN);
                }
                let opened = if wants_write {
                    WriteHandle::open(&ctx, node, truncate).map(OpenFile::Write)
                } else {
                    node.open_reader(&ctx).map(|r| OpenFile::Read(ReadHandle::new(r)))
                };
                match opened {
                    Ok(handle) => {
                        let fh = file_handles.lock().insert(Arc::new(handle));
                        reply.opened(fh, 0);
                    }
                    Err(e) => {
                        ctx.stats.incr(stats::MUTFILE_OPEN_ERROR);
                        if !wants_write {
                            ctx.stats.incr(stats::ROFILE_OPEN_ERROR);
                        }
                        reply.error(e.raw_error());
                    }
                }
                return;
            }
            ctx.stats.incr(stats::ROFILE_OPEN);
            match node.open_reader(&ctx) {
                Ok(reader) => {
                    let fh = file_handles.lock().insert(Arc::new(OpenFile::Read(ReadHandle::new(reader))));
                    reply.opened(fh, 0);
                }
                Err(e) => {
                    ctx.stats.incr(stats::ROFILE_OPEN_ERROR);
                    reply.error(e.raw_error());
                }
            }
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let nodes = self.nodes.clone();
        let file_handles = self.file_handles.clone();
        self.dispatch(_req, move || {
            let offset = offset.max(0) as u64;
            if fh == 0 {
                let Some(node) = nodes.get(ino) else {
                    return reply.error(libc::ESTALE);
                };
                return match node.read_static(offset, size) {
                    Ok(data) => reply.data(&data),
                    Err(e) => reply.error(e.raw_error()),
                };
            }
            let Some(handle) = file_handles.lock().get(fh).cloned() else {
                return reply.error(libc::EBADF);
            };
            let result = match handle.as_ref() {
                OpenFile::Read(r) => r.read_at(offset, size),
                OpenFile::Write(w) => w.read_at(offset, size),
            };
            match result {
                Ok(data) => reply.data(&data),
                Err(e) => reply.error(e.raw_error()),
            }
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &mut self,
        _req: &Request,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let data = data.to_vec();
        let file_handles = self.file_handles.clone();
        self.dispatch(_req, move || {
            let Some(handle) = file_handles.lock().get(fh).cloned() else {
                return reply.error(libc::EBADF);
            };
            match handle.as_ref() {
                OpenFile::Write(w) => match w.write_at(offset.max(0) as u64, &data) {
                    Ok(n) => reply.written(n),
                    Err(e) => reply.error(e.raw_error()),
                },
                OpenFile::Read(_) => reply.error(libc::EBADF),
            }
        });
    }

    fn flush(&mut self, _req: &Request, _ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        if fh == 0 {
            return reply.ok();
        }
        let ctx = self.ctx.clone();
        let file_handles = self.file_handles.clone();
        self.dispatch(_req, move || {
            let Some(handle) = file_handles.lock().get(fh).cloned() else {
                return reply.ok();
            };
            match handle.as_ref() {
                OpenFile::Write(w) => match w.flush(&ctx) {
                    Ok(()) => reply.ok(),
                    Err(e) => reply.error(e.raw_error()),
                },
                OpenFile::Read(_) => reply.ok(),
            }
        });
    }

    fn fsync(&mut self, _req: &Request, _ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
        // Content is already committed at Flush time; nothing further to push here.
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        self.file_handles.lock().remove(fh);
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        let nodes = self.nodes.clone();
        let dir_handles = self.dir_handles.clone();
        self.dispatch(_req, move || {
            let Some(node) = nodes.get(ino) else {
                return reply.error(libc::ESTALE);
            };
            let fh = dir_handles.lock().insert(Arc::new(DirHandle::new(node)));
            reply.opened(fh, 0);
        });
    }

    fn readdir(&mut self, _req: &Request, ino: u64, fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let ctx = self.ctx.clone();
        let nodes = self.nodes.clone();
        let dir_handles = self.dir_handles.clone();
        self.dispatch(_req, move || {
            let Some(handle) = dir_handles.lock().get(fh).cloned() else {
                return reply.error(libc::EBADF);
            };
            let entries = match handle.entries(&ctx) {
                Ok(e) => e,
                Err(e) => return reply.error(e.raw_error()),
            };
            let mut rows: Vec<(u64, FileType, String)> = Vec::with_capacity(entries.len() + 2);
            rows.push((ino, FileType::Directory, ".".to_string()));
            rows.push((ino, FileType::Directory, "..".to_string()));
            for entry in &entries {
                let child_ino = nodes.peek_child_inode(ino, &entry.name, entry.inode);
                rows.push((child_ino, to_file_type(entry.kind), entry.name.clone()));
            }
            for (i, (child_ino, kind, name)) in rows.iter().enumerate().skip(offset.max(0) as usize) {
                if reply.add(*child_ino, (i + 1) as i64, *kind, name) {
                    break;
                }
            }
            reply.ok();
        });
    }

    fn releasedir(&mut self, _req: &Request, _ino: u64, fh: u64, _flags: i32, reply: ReplyEmpty) {
        self.dir_handles.lock().remove(fh);
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
        reply.statfs(0, 0, 0, 0, 0, 4096, 255, 0);
    }

    fn setxattr(
        &mut self,
        _req: &Request,
        ino: u64,
        name: &OsStr,
        value: &[u8],
        _flags: i32,
        _position: u32,
        reply: ReplyEmpty,
    ) {
        if self.ctx.config.read_only {
            return reply.error(libc::EROFS);
        }
        let name = match os_str_to_name(name) {
            Ok(n) => n,
            Err(code) => return reply.error(code),
        };
        let value = value.to_vec();
        let ctx = self.ctx.clone();
        let nodes = self.nodes.clone();
        self.dispatch(_req, move || {
            let Some(node) = nodes.get(ino) else {
                return reply.error(libc::ESTALE);
            };
            match node.setxattr(&ctx, &name, &value) {
                Ok(()) => reply.ok(),
                Err(e) => reply.error(e.raw_error()),
            }
        });
    }

    fn getxattr(&mut self, _req: &Request, ino: u64, name: &OsStr, size: u32, reply: ReplyXattr) {
        let name = match os_str_to_name(name) {
            Ok(n) => n,
            Err(code) => return reply.error(code),
        };
        let ctx = self.ctx.clone();
        let nodes = self.nodes.clone();
        self.dispatch(_req, move || {
            let Some(node) = nodes.get(ino) else {
                return reply.error(libc::ESTALE);
            };
            match node.getxattr(&ctx, &name) {
                Ok(data) if size == 0 => reply.size(data.len() as u32),
                Ok(data) if data.len() as u32 > size => reply.error(libc::ERANGE),
                Ok(data) => reply.data(&data),
                Err(e) => reply.error(e.raw_error()),
            }
        });
    }

    fn listxattr(&mut self, _req: &Request, ino: u64, size: u32, reply: ReplyXattr) {
        let nodes = self.nodes.clone();
        self.dispatch(_req, move || {
            let Some(node) = nodes.get(ino) else {
                return reply.error(libc::ESTALE);
            };
            match node.listxattr(size as usize) {
                Ok(data) if size == 0 => reply.size(data.len() as u32),
                Ok(data) => reply.data(&data),
                Err(e) => reply.error(e.raw_error()),
            }
        });
    }

    fn removexattr(&mut self, _req: &Request, ino: u64, name: &OsStr, reply: ReplyEmpty) {
        if self.ctx.config.read_only {
            return reply.error(libc::EROFS);
        }
        let name = match os_str_to_name(name) {
            Ok(n) => n,
            Err(code) => return reply.error(code),
        };
        let ctx = self.ctx.clone();
        let nodes = self.nodes.clone();
        self.dispatch(_req, move || {
            let Some(node) = nodes.get(ino) else {
                return reply.error(libc::ESTALE);
            };
            match node.removexattr(&ctx, &name) {
                Ok(()) => reply.ok(),
                Err(e) => reply.error(e.raw_error()),
            }
        });
    }

    fn access(&mut self, _req: &Request, ino: u64, _mask: i32, reply: ReplyEmpty) {
        let nodes = self.nodes.clone();
        self.dispatch(_req, move || {
            if nodes.get(ino).is_some() {
                reply.ok();
            } else {
                reply.error(libc::ESTALE);
            }
        });
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        if self.ctx.config.read_only {
            return reply.error(libc::EROFS);
        }
        let name = match os_str_to_name(name) {
            Ok(n) => n,
            Err(code) => return reply.error(code),
        };
        let ctx = self.ctx.clone();
        let nodes = self.nodes.clone();
        let file_handles = self.file_handles.clone();
        self.dispatch(_req, move || {
            let Some(parent_node) = nodes.get(parent) else {
                return reply.error(libc::ESTALE);
            };
            let (child, attr) = match parent_node.create(&ctx, &name) {
                Ok(v) => v,
                Err(e) => return reply.error(e.raw_error()),
            };
            let (ino, child_arc) = nodes.lookup(parent, &name, child, attr.inode_hint);
            let truncate = flags & libc::O_TRUNC != 0;
            ctx.stats.incr(stats::MUTFILE_OPEN);
            ctx.stats.incr(stats::MUTFILE_OPEN_RW);
            match WriteHandle::open(&ctx, child_arc, truncate) {
                Ok(write_handle) => {
                    let fh = file_handles.lock().insert(Arc::new(OpenFile::Write(write_handle)));
                    reply.created(&ctx.config.entry_ttl, &to_file_attr(ino, &attr, &ctx), 0, fh, 0);
                }
                Err(e) => {
                    ctx.stats.incr(stats::MUTFILE_OPEN_ERROR);
                    reply.error(e.raw_error());
                }
            }
        });
    }
}

impl CamliFs {
    fn remove_common(&mut self, req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        if self.ctx.config.read_only {
            return reply.error(libc::EROFS);
        }
        let name = match os_str_to_name(name) {
            Ok(n) => n,
            Err(code) => return reply.error(code),
        };
        let ctx = self.ctx.clone();
        let nodes = self.nodes.clone();
        self.dispatch(req, move || {
            let Some(parent_node) = nodes.get(parent) else {
                return reply.error(libc::ESTALE);
            };
            match parent_node.remove(&ctx, &name) {
                Ok(()) => reply.ok(),
                Err(e) => reply.error(e.raw_error()),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_file_attr_rounds_blocks_up() {
        let ctx_config = crate::config::Config::default();
        let ctx = crate::context::Context::new(
            Arc::new(NoopBlobs),
            Arc::new(NoopDescribe),
            Arc::new(NoopSigner),
            ctx_config,
        );
        let attr = NodeAttr::read_only_file(513);
        let file_attr = to_file_attr(7, &attr, &ctx);
        assert_eq!(file_attr.ino, 7);
        assert_eq!(file_attr.blocks, 2);
        assert_eq!(file_attr.perm, 0o400);
    }

    struct NoopBlobs;
    impl crate::client::BlobStoreClient for NoopBlobs {
        fn fetch(&self, _blob_ref: &crate::blobref::BlobRef) -> crate::errors::FuseResult<crate::client::blobstore::BlobStream> {
            Err(PosixError::not_found("no blobs in this test"))
        }
        fn receive(&self, reader: &mut dyn std::io::Read) -> crate::errors::FuseResult<crate::blobref::SizedBlobRef> {
            let mut data = Vec::new();
            std::io::Read::read_to_end(reader, &mut data).map_err(PosixError::from)?;
            let blob_ref = crate::blobref::sha1_blob_ref(&data);
            let size = data.len() as u64;
            Ok(crate::blobref::SizedBlobRef { blob_ref, size })
        }
    }

    struct NoopDescribe;
    impl crate::client::DescribeClient for NoopDescribe {
        fn describe(&self, _blob_ref: &crate::blobref::BlobRef) -> crate::errors::FuseResult<crate::client::describe::PermanodeDescription> {
            Ok(crate::client::describe::PermanodeDescription::new())
        }
        fn get_recent_permanodes(&self, _n: usize) -> crate::errors::FuseResult<Vec<crate::client::describe::RecentPermanode>> {
            Ok(Vec::new())
        }
        fn get_permanodes_with_attr(
            &self,
            _attr: &str,
            _n: usize,
            _as_of: Option<chrono::DateTime<chrono::Utc>>,
        ) -> crate::errors::FuseResult<Vec<crate::blobref::BlobRef>> {
            Ok(Vec::new())
        }
        fn get_claims(
            &self,
            _permanode: &crate::blobref::BlobRef,
            _attr_filter: Option<&str>,
        ) -> crate::errors::FuseResult<Vec<crate::client::describe::ClaimRecord>> {
            Ok(Vec::new())
        }
    }

    struct NoopSigner;
    impl crate::client::SigningClient for NoopSigner {
        fn new_permanode(&self) -> crate::errors::FuseResult<crate::blobref::BlobRef> {
            Err(PosixError::not_supported("no signer in this test"))
        }
        fn sign_and_upload(&self, _claim: crate::client::signer::Claim) -> crate::errors::FuseResult<crate::blobref::BlobRef> {
            Err(PosixError::not_supported("no signer in this test"))
        }
    }
}
