//! The set of shared collaborators every node and handle needs: the three external clients,
//! the two bounded caches, the stats registry, and process-wide config. Built once at
//! startup and handed around as an `Arc<Context>`.

use std::sync::Arc;

use crate::cache::{NameCache, SchemaCache};
use crate::client::{BlobStoreClient, DescribeClient, SigningClient};
use crate::config::Config;
use crate::stats::Stats;

pub struct Context {
    pub blobs: Arc<dyn BlobStoreClient>,
    pub describe: Arc<dyn DescribeClient>,
    pub signer: Arc<dyn SigningClient>,
    pub schema_cache: SchemaCache,
    pub name_cache: NameCache,
    pub stats: Stats,
    pub config: Config,
    pub started_at: std::time::SystemTime,
}

impl Context {
    pub fn new(
        blobs: Arc<dyn BlobStoreClient>,
        describe: Arc<dyn DescribeClient>,
        signer: Arc<dyn SigningClient>,
        config: Config,
    ) -> Arc<Self> {
        let stats = Stats::new(config.track_stats);
        Arc::new(Context {
            blobs,
            describe,
            signer,
            schema_cache: SchemaCache::default(),
            name_cache: NameCache::default(),
            stats,
            config,
            started_at: std::time::SystemTime::now(),
        })
    }
}
