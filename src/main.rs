//! `cammount`: parses mount arguments, wires up a `Context`, and hands a `CamliFs` to the
//! kernel mount syscall. Talking to a real blob store / describe / signing endpoint over
//! the network stays an external collaborator (see `client::UnconfiguredClient` below); this
//! binary only validates `--blob-server` and threads it through `Config`.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use fuser::MountOption;

use camlifs::client::describe::{ClaimRecord, PermanodeDescription, RecentPermanode};
use camlifs::client::signer::Claim;
use camlifs::client::{BlobStoreClient, DescribeClient, SigningClient};
use camlifs::config::Config;
use camlifs::context::Context;
use camlifs::errors::{FuseResult, PosixError};
use camlifs::service::CamliFs;

#[derive(Parser, Debug)]
#[command(author, version, about = "Mounts a content-addressed blob store as a FUSE filesystem")]
struct Args {
    /// Where to mount the filesystem. Not required when invoking the `unmount` subcommand.
    mountpoint: Option<PathBuf>,

    /// Base URL for the blob store / describe / signing endpoints.
    #[arg(long, env = "CAMLI_BLOBSERVER")]
    blob_server: Option<String>,

    /// Skip daemonizing: print a ready message once mounted and block in the foreground.
    #[arg(short, long)]
    foreground: bool,

    /// Refuse every mutating operation, as if permanently scoped under an `at/<time>` root.
    #[arg(long)]
    read_only: bool,

    /// Raise the log level to debug regardless of `RUST_LOG`.
    #[arg(long)]
    debug: bool,

    /// Number of worker threads handling kernel requests concurrently.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    #[command(subcommand)]
    unmount: Option<UnmountCommand>,
}

#[derive(Subcommand, Debug)]
enum UnmountCommand {
    /// Unmounts an already-mounted filesystem and exits.
    Unmount {
        /// The mount point to unmount.
        mountpoint: PathBuf,
    },
}

fn main() {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    if let Err(err) = run(args) {
        log::error!("{err}");
        eprintln!("cammount: {err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(UnmountCommand::Unmount { mountpoint }) = args.unmount {
        camlifs::unmount::unmount(&mountpoint)?;
        println!("unmounted {}", mountpoint.display());
        return Ok(());
    }

    let mountpoint = args
        .mountpoint
        .ok_or("a mountpoint is required unless --unmount is given")?;

    let mut config = Config::from_env();
    config.read_only = args.read_only;
    if args.blob_server.is_some() {
        config.blob_server = args.blob_server;
    }

    let client: Arc<UnconfiguredClient> = Arc::new(UnconfiguredClient::new(config.blob_server.clone()));
    let ctx = Context::new(client.clone(), client.clone(), client, config.clone());

    let filesystem = CamliFs::new(ctx, args.workers);

    let mut options = vec![MountOption::FSName("camlifs".to_string())];
    options.push(if config.read_only { MountOption::RO } else { MountOption::RW });

    if args.foreground {
        println!("mounting camlifs at {}", mountpoint.display());
    }
    log::info!("mounting at {} (read_only={})", mountpoint.display(), config.read_only);

    fuser::mount2(filesystem, &mountpoint, &options)?;

    if args.foreground {
        println!("unmounted {}", mountpoint.display());
    }
    Ok(())
}

/// A placeholder `BlobStoreClient`/`DescribeClient`/`SigningClient` that carries the
/// configured blob-server URL but never speaks to it: wiring up the HTTP protocol for blob
/// fetch/receive, permanode describe, and claim signing is out of scope here. Every
/// operation fails with a transport error, which the node tree already maps to `EIO`/`EROFS`
/// the same way it would a real network failure.
struct UnconfiguredClient {
    blob_server: Option<String>,
}

impl UnconfiguredClient {
    fn new(blob_server: Option<String>) -> Self {
        UnconfiguredClient { blob_server }
    }

    fn unwired<T>(&self, op: &str) -> FuseResult<T> {
        match &self.blob_server {
            Some(url) => Err(PosixError::transport(format!(
                "{op}: no blob-server client implementation is wired up (configured endpoint: {url})"
            ))),
            None => Err(PosixError::transport(format!(
                "{op}: no --blob-server was configured and no client implementation is wired up"
            ))),
        }
    }
}

impl BlobStoreClient for UnconfiguredClient {
    fn fetch(&self, _blob_ref: &camlifs::blobref::BlobRef) -> FuseResult<camlifs::client::blobstore::BlobStream> {
        self.unwired("fetch")
    }

    fn receive(&self, _reader: &mut dyn Read) -> FuseResult<camlifs::blobref::SizedBlobRef> {
        self.unwired("receive")
    }
}

impl DescribeClient for UnconfiguredClient {
    fn describe(&self, _blob_ref: &camlifs::blobref::BlobRef) -> FuseResult<PermanodeDescription> {
        self.unwired("describe")
    }

    fn get_recent_permanodes(&self, _n: usize) -> FuseResult<Vec<RecentPermanode>> {
        self.unwired("get_recent_permanodes")
    }

    fn get_permanodes_with_attr(
        &self,
        _attr: &str,
        _n: usize,
        _as_of: Option<chrono::DateTime<chrono::Utc>>,
    ) -> FuseResult<Vec<camlifs::blobref::BlobRef>> {
        self.unwired("get_permanodes_with_attr")
    }

    fn get_claims(
        &self,
        _permanode: &camlifs::blobref::BlobRef,
        _attr_filter: Option<&str>,
    ) -> FuseResult<Vec<ClaimRecord>> {
        self.unwired("get_claims")
    }
}

impl SigningClient for UnconfiguredClient {
    fn new_permanode(&self) -> FuseResult<camlifs::blobref::BlobRef> {
        self.unwired("new_permanode")
    }

    fn sign_and_upload(&self, _claim: Claim) -> FuseResult<camlifs::blobref::BlobRef> {
        self.unwired("sign_and_upload")
    }
}
