//! Drives a `mutDir`/`mutFile`/`WriteHandle` trio through a create → write → flush → reopen
//! sequence, the way a kernel Create/Write/Flush/Open/Read sequence would, without a kernel.

mod common;

use std::sync::Arc;

use camlifs::client::SigningClient;
use camlifs::config::Config;
use camlifs::handle::WriteHandle;
use camlifs::node::attr::FileKind;
use camlifs::node::mut_dir::MutDir;

use common::FakeNetwork;

#[test]
fn write_then_flush_then_reopen_sees_the_written_bytes() {
    let network = FakeNetwork::new();
    let ctx = network.context(Config::default());

    let root_permanode = network.new_permanode().expect("mint a root permanode");
    let dir = MutDir::new(root_permanode, None);

    let (node, attr) = dir.create(&ctx, "greeting.txt").expect("create should succeed");
    assert_eq!(attr.kind, FileKind::RegularFile);
    assert_eq!(attr.size, 0);
    let node = Arc::new(node);

    let write_handle = WriteHandle::open(&ctx, node.clone(), true).expect("open for write");
    let written = write_handle.write_at(0, b"hello, camlifs").expect("write");
    assert_eq!(written, 14);
    write_handle.flush(&ctx).expect("flush uploads a new camliContent claim");

    let reader = node.open_reader(&ctx).expect("reopen for read after flush");
    let mut buf = vec![0u8; 14];
    let n = reader.read_at(0, &mut buf).expect("read back");
    assert_eq!(&buf[..n], b"hello, camlifs");
}

#[test]
fn flush_with_no_writes_recommits_the_same_content_idempotently() {
    let network = FakeNetwork::new();
    let ctx = network.context(Config::default());
    let root_permanode = network.new_permanode().expect("mint a root permanode");
    let dir = MutDir::new(root_permanode, None);

    let (node, _) = dir.create(&ctx, "empty.txt").expect("create");
    let node = Arc::new(node);

    let write_handle = WriteHandle::open(&ctx, node.clone(), true).expect("open");
    write_handle.flush(&ctx).expect("first flush of empty content");
    write_handle.flush(&ctx).expect("second flush of the same empty content");

    let reader = node.open_reader(&ctx).expect("reopen");
    let mut buf = vec![0u8; 1];
    let n = reader.read_at(0, &mut buf).expect("read");
    assert_eq!(n, 0, "file should still read as empty");
}
