//! The blob store boundary: fetch-by-hash and receive-blob are opaque, external operations;
//! this crate only needs the shape of the interface.

use std::io::Read;

use crate::blobref::{BlobRef, SizedBlobRef};
use crate::errors::FuseResult;

/// A stream of bytes plus its total length, as returned by `fetch`.
pub struct BlobStream {
    pub reader: Box<dyn Read + Send>,
    pub size: u64,
}

pub trait BlobStoreClient: Send + Sync {
    /// Fetches the full contents of a blob by reference.
    fn fetch(&self, blob_ref: &BlobRef) -> FuseResult<BlobStream>;

    /// Uploads `reader`'s contents as a new blob and returns its reference and size.
    fn receive(&self, reader: &mut dyn Read) -> FuseResult<SizedBlobRef>;

    /// Enumerates blobs whose string form starts with `prefix`, newest-visible first, up to
    /// `limit` entries. Only used if sync is enabled; the minimal core never calls it.
    fn enumerate(&self, prefix: &str, limit: usize, wait_seconds: u32) -> FuseResult<Vec<SizedBlobRef>> {
        let _ = (prefix, limit, wait_seconds);
        Ok(Vec::new())
    }
}

/// Reads the full contents of `blob_ref` into memory. A convenience built on `fetch`, used
/// by the schema decoder (schema blobs are always small JSON documents).
pub fn fetch_to_vec(client: &dyn BlobStoreClient, blob_ref: &BlobRef) -> FuseResult<Vec<u8>> {
    let mut stream = client.fetch(blob_ref)?;
    let mut buf = Vec::with_capacity(stream.size as usize);
    stream
        .reader
        .read_to_end(&mut buf)
        .map_err(crate::errors::PosixError::from)?;
    Ok(buf)
}
