//! Kernel-visible handles: what Opendir/Open hand back and ReadDir/Read/Write/Flush/Release
//! operate on afterward. Handles are the home for request-scoped state a node itself has no
//! business holding (a directory listing snapshot, a scratch file backing an in-progress
//! write) and are looked up from the file-handle table the service loop owns.

use std::fs::File;
use std::io::{Read as _, Seek, SeekFrom, Write as _};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::blobref::BlobRef;
use crate::context::Context;
use crate::errors::{FuseResult, PosixError};
use crate::node::attr::DirEntry;
use crate::node::Node;
use crate::schema::FileReader;

/// A directory handle. The first ReadDir call populates `entries` from the node and every
/// later call at a nonzero offset is served straight out of that cached snapshot, so a
/// directory that changes mid-listing still presents one consistent view to the kernel.
pub struct DirHandle {
    pub node: Arc<Node>,
    entries: Mutex<Option<Vec<DirEntry>>>,
}

impl DirHandle {
    pub fn new(node: Arc<Node>) -> Self {
        DirHandle {
            node,
            entries: Mutex::new(None),
        }
    }

    pub fn entries(&self, ctx: &Context) -> FuseResult<Vec<DirEntry>> {
        let mut cached = self.entries.lock();
        if cached.is_none() {
            *cached = Some(self.node.readdir(ctx)?);
        }
        Ok(cached.clone().unwrap_or_default())
    }
}

/// A read-only file handle: wraps a `FileReader` built once at Open time. Random-access,
/// with whatever caching the blob store client itself does.
pub struct ReadHandle {
    reader: FileReader,
}

impl ReadHandle {
    pub fn new(reader: FileReader) -> Self {
        ReadHandle { reader }
    }

    pub fn read_at(&self, offset: u64, size: u32) -> FuseResult<Vec<u8>> {
        let mut buf = vec![0u8; size as usize];
        let n = self.reader.read_at(offset, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }
}

/// A mutable-file write handle: Open seeds a private scratch file with the node's existing
/// content (unless the open truncates), Read/Write/Truncate operate on that scratch file
/// directly, and Flush streams its current contents back through the blob store and
/// uploads a new `camliContent` claim. Release only unlinks the scratch file after the
/// kernel's last close of this handle; `Fsync` has nothing further to do once Flush has run.
pub struct WriteHandle {
    pub node: Arc<Node>,
    scratch: Mutex<File>,
}

impl WriteHandle {
    pub fn open(ctx: &Context, node: Arc<Node>, truncate: bool) -> FuseResult<Self> {
        let mut scratch = tempfile::tempfile().map_err(PosixError::from)?;
        if !truncate {
            let reader = node.open_reader(ctx)?;
            let mut offset = 0u64;
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                let n = reader.read_at(offset, &mut buf)?;
                if n == 0 {
                    break;
                }
                scratch.write_all(&buf[..n]).map_err(PosixError::from)?;
                offset += n as u64;
            }
            scratch.seek(SeekFrom::Start(0)).map_err(PosixError::from)?;
        }
        Ok(WriteHandle {
            node,
            scratch: Mutex::new(scratch),
        })
    }

    pub fn read_at(&self, offset: u64, size: u32) -> FuseResult<Vec<u8>> {
        let mut scratch = self.scratch.lock();
        scratch.seek(SeekFrom::Start(offset)).map_err(PosixError::from)?;
        let mut buf = vec![0u8; size as usize];
        let n = scratch.read(&mut buf).map_err(PosixError::from)?;
        buf.truncate(n);
        Ok(buf)
    }

    pub fn write_at(&self, offset: u64, data: &[u8]) -> FuseResult<u32> {
        {
            let mut scratch = self.scratch.lock();
            scratch.seek(SeekFrom::Start(offset)).map_err(PosixError::from)?;
            scratch.write_all(data).map_err(PosixError::from)?;
        }
        if let Node::MutFile(mutfile) = self.node.as_ref() {
            mutfile.set_size_at_least(offset + data.len() as u64);
        }
        Ok(data.len() as u32)
    }

    pub fn truncate(&self, size: u64) -> FuseResult<()> {
        {
            let scratch = self.scratch.lock();
            scratch.set_len(size).map_err(PosixError::from)?;
        }
        self.node.setattr(Some(size), None, None)?;
        Ok(())
    }

    /// Safe to call more than once: each Flush re-reads the scratch file from the start and
    /// re-uploads it, so a Flush with no writes since the last one just re-commits the same
    /// content blob under the same hash.
    pub fn flush(&self, ctx: &Context) -> FuseResult<()> {
        let data = {
            let mut scratch = self.scratch.lock();
            scratch.seek(SeekFrom::Start(0)).map_err(PosixError::from)?;
            let mut data = Vec::new();
            scratch.read_to_end(&mut data).map_err(PosixError::from)?;
            data
        };
        let size = data.len() as u64;
        let file_ref = upload_file_schema(ctx, &data)?;
        self.node.commit_content(ctx, file_ref, size)
    }
}

/// Uploads `data` as a content blob (when non-empty), wraps it in a `file` schema blob, and
/// returns the schema blob's reference: the form `mutFile::content_ref` expects to decode.
fn upload_file_schema(ctx: &Context, data: &[u8]) -> FuseResult<BlobRef> {
    let parts = if data.is_empty() {
        Vec::new()
    } else {
        let part_ref = ctx.blobs.receive(&mut std::io::Cursor::new(data))?;
        vec![serde_json::json!({
            "blobRef": part_ref.blob_ref.as_str(),
            "size": part_ref.size,
        })]
    };
    let schema = serde_json::json!({
        "camliVersion": 1,
        "camliType": "file",
        "size": data.len() as u64,
        "parts": parts,
    });
    let bytes = serde_json::to_vec(&schema).map_err(|e| PosixError::invalid(format!("encoding file schema: {e}")))?;
    let sized = ctx.blobs.receive(&mut std::io::Cursor::new(&bytes))?;
    Ok(sized.blob_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::blobstore::{BlobStoreClient, BlobStream};
    use crate::blobref::{sha1_blob_ref, SizedBlobRef};
    use parking_lot::Mutex as PMutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeStore {
        blobs: PMutex<HashMap<String, Vec<u8>>>,
    }

    impl BlobStoreClient for FakeStore {
        fn fetch(&self, blob_ref: &BlobRef) -> FuseResult<BlobStream> {
            let data = self
                .blobs
                .lock()
                .get(&blob_ref.as_str())
                .cloned()
                .ok_or_else(|| PosixError::not_found("no such blob"))?;
            let size = data.len() as u64;
            Ok(BlobStream {
                reader: Box::new(std::io::Cursor::new(data)),
                size,
            })
        }

        fn receive(&self, reader: &mut dyn Read) -> FuseResult<SizedBlobRef> {
            let mut data = Vec::new();
            reader.read_to_end(&mut data).map_err(PosixError::from)?;
            let blob_ref = sha1_blob_ref(&data);
            let size = data.len() as u64;
            self.blobs.lock().insert(blob_ref.as_str(), data);
            Ok(SizedBlobRef { blob_ref, size })
        }
    }

    use std::io::Read;

    #[test]
    fn upload_file_schema_roundtrips_through_decode() {
        let store = FakeStore::default();
        let ctx_config = crate::config::Config::default();
        let ctx = crate::context::Context::new(
            Arc::new(store),
            Arc::new(NoopDescribe),
            Arc::new(NoopSigner),
            ctx_config,
        );
        let file_ref = upload_file_schema(&ctx, b"hello world").unwrap();
        let bytes = crate::client::blobstore::fetch_to_vec(ctx.blobs.as_ref(), &file_ref).unwrap();
        let schema = crate::schema::decode_schema(&bytes).unwrap();
        match schema {
            crate::schema::SchemaBlob::File { size, parts, .. } => {
                assert_eq!(size, 11);
                assert_eq!(parts.len(), 1);
            }
            other => panic!("expected a file schema, got {other:?}"),
        }
    }

    #[test]
    fn upload_file_schema_handles_empty_content() {
        let store = FakeStore::default();
        let ctx = crate::context::Context::new(
            Arc::new(store),
            Arc::new(NoopDescribe),
            Arc::new(NoopSigner),
            crate::config::Config::default(),
        );
        let file_ref = upload_file_schema(&ctx, b"").unwrap();
        let bytes = crate::client::blobstore::fetch_to_vec(ctx.blobs.as_ref(), &file_ref).unwrap();
        let schema = crate::schema::decode_schema(&bytes).unwrap();
        match schema {
            crate::schema::SchemaBlob::File { size, parts, .. } => {
                assert_eq!(size, 0);
                assert!(parts.is_empty());
            }
            other => panic!("expected a file schema, got {other:?}"),
        }
    }

    struct NoopDescribe;
    impl crate::client::DescribeClient for NoopDescribe {
        fn describe(&self, _blob_ref: &BlobRef) -> FuseResult<crate::client::describe::PermanodeDescription> {
            Ok(crate::client::describe::PermanodeDescription::new())
        }
        fn get_recent_permanodes(&self, _n: usize) -> FuseResult<Vec<crate::client::describe::RecentPermanode>> {
            Ok(Vec::new())
        }
        fn get_permanodes_with_attr(
            &self,
            _attr: &str,
            _n: usize,
            _as_of: Option<chrono::DateTime<chrono::Utc>>,
        ) -> FuseResult<Vec<BlobRef>> {
            Ok(Vec::new())
        }
        fn get_claims(
            &self,
            _permanode: &BlobRef,
            _attr_filter: Option<&str>,
        ) -> FuseResult<Vec<crate::client::describe::ClaimRecord>> {
            Ok(Vec::new())
        }
    }

    struct NoopSigner;
    impl crate::client::SigningClient for NoopSigner {
        fn new_permanode(&self) -> FuseResult<BlobRef> {
            Err(PosixError::not_supported("no signer in this test"))
        }
        fn sign_and_upload(&self, _claim: crate::client::signer::Claim) -> FuseResult<BlobRef> {
            Err(PosixError::not_supported("no signer in this test"))
        }
    }
}
