//! An in-memory blob store / describe / signing backend shared by the integration tests, so
//! each test can drive a real node/handle pair through create/write/rename/flush sequences
//! without a kernel or a network round trip.

use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use camlifs::blobref::{sha1_blob_ref, BlobRef, SizedBlobRef};
use camlifs::client::blobstore::{BlobStoreClient, BlobStream};
use camlifs::client::describe::{ClaimRecord, DescribeClient, PermanodeDescription, RecentPermanode};
use camlifs::client::signer::{Claim, ClaimKind, SigningClient};
use camlifs::config::Config;
use camlifs::context::Context;
use camlifs::errors::{FuseResult, PosixError};

pub struct FakeNetwork {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    permanodes: Mutex<HashMap<String, PermanodeDescription>>,
    next_permanode: AtomicU64,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeNetwork {
            blobs: Mutex::new(HashMap::new()),
            permanodes: Mutex::new(HashMap::new()),
            next_permanode: AtomicU64::new(0),
        })
    }

    /// Builds a `Context` wired against this network, handing out three clones of the same
    /// `Arc<FakeNetwork>` as the blob store, describe, and signing collaborators.
    pub fn context(self: &Arc<Self>, config: Config) -> Arc<Context> {
        Context::new(self.clone(), self.clone(), self.clone(), config)
    }

    pub fn apply_claim(&self, claim: &Claim) {
        let mut permanodes = self.permanodes.lock();
        let desc = permanodes
            .entry(claim.permanode.as_str())
            .or_insert_with(PermanodeDescription::new);
        match claim.kind {
            ClaimKind::SetAttribute | ClaimKind::AddAttribute => {
                desc.set_attr(&claim.attr, claim.value.clone());
            }
            ClaimKind::DelAttribute => {
                if let Some(path_name) = claim.attr.strip_prefix("camliPath:") {
                    desc.paths.remove(path_name);
                } else if let Some(xattr_name) = claim.attr.strip_prefix("xattr:") {
                    desc.xattrs.remove(xattr_name);
                }
            }
        }
    }
}

impl BlobStoreClient for FakeNetwork {
    fn fetch(&self, blob_ref: &BlobRef) -> FuseResult<BlobStream> {
        let data = self
            .blobs
            .lock()
            .get(&blob_ref.as_str())
            .cloned()
            .ok_or_else(|| PosixError::not_found(format!("no such blob: {blob_ref}")))?;
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

impl DescribeClient for FakeNetwork {
    fn describe(&self, blob_ref: &BlobRef) -> FuseResult<PermanodeDescription> {
        Ok(self
            .permanodes
            .lock()
            .get(&blob_ref.as_str())
            .cloned()
            .unwrap_or_default())
    }

    fn get_recent_permanodes(&self, _n: usize) -> FuseResult<Vec<RecentPermanode>> {
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

    fn get_claims(&self, _permanode: &BlobRef, _attr_filter: Option<&str>) -> FuseResult<Vec<ClaimRecord>> {
        Ok(Vec::new())
    }
}

impl SigningClient for FakeNetwork {
    fn new_permanode(&self) -> FuseResult<BlobRef> {
        let id = self.next_permanode.fetch_add(1, Ordering::Relaxed);
        let permanode = sha1_blob_ref(format!("fake-permanode-{id}").as_bytes());
        self.permanodes.lock().insert(permanode.as_str(), PermanodeDescription::new());
        Ok(permanode)
    }

    fn sign_and_upload(&self, claim: Claim) -> FuseResult<BlobRef> {
        self.apply_claim(&claim);
        let blob = format!("{}:{}:{}", claim.permanode.as_str(), claim.kind.as_str(), claim.attr);
        Ok(sha1_blob_ref(blob.as_bytes()))
    }
}
