//! `DirHandle` snapshots its directory's listing on the first `entries()` call; a directory
//! that gains new children after that point must not change the handle's view until a fresh
//! Opendir hands out a new handle.

mod common;

use std::sync::Arc;

use camlifs::client::SigningClient;
use camlifs::config::Config;
use camlifs::handle::DirHandle;
use camlifs::node::mut_dir::MutDir;
use camlifs::node::Node;

use common::FakeNetwork;

#[test]
fn readdir_cache_is_stable_across_concurrent_mutation() {
    let network = FakeNetwork::new();
    let ctx = network.context(Config::default());
    let root_permanode = network.new_permanode().expect("mint a root permanode");
    let dir = Arc::new(MutDir::new(root_permanode, None));

    dir.create(&ctx, "first.txt").expect("create first entry");

    let node = Arc::new(Node::MutDir(MutDir::new(dir.permanode.clone(), None)));
    let handle = DirHandle::new(node);

    let first_snapshot = handle.entries(&ctx).expect("first entries() call populates the cache");
    assert_eq!(first_snapshot.len(), 1);

    dir.create(&ctx, "second.txt").expect("create second entry after the handle was opened");

    let second_snapshot = handle.entries(&ctx).expect("second entries() call reuses the cache");
    assert_eq!(
        second_snapshot.len(),
        1,
        "a directory handle's listing must not change after its first populate"
    );

    let fresh_handle = DirHandle::new(Arc::new(Node::MutDir(MutDir::new(dir.permanode.clone(), None))));
    let fresh_snapshot = fresh_handle.entries(&ctx).expect("a new handle sees current state");
    assert_eq!(fresh_snapshot.len(), 2, "a freshly opened handle must see both entries");
}
