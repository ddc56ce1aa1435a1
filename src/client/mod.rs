//! External service boundaries: blob storage, permanode description, and claim signing.
//!
//! None of these are implemented against a real network service here — wiring up HTTP,
//! auth, and discovery is deliberately out of scope. What matters to the node tree and the
//! service loop is the shape of the interface, so every consumer of these traits is written
//! against `Arc<dyn ...>` and can be driven by a fake in tests.

pub mod blobstore;
pub mod describe;
pub mod signer;

pub use blobstore::BlobStoreClient;
pub use describe::{DescribeClient, PermanodeDescription};
pub use signer::SigningClient;
