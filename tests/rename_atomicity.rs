//! Exercises `mutDir::rename`, including across two different parent directories, and
//! confirms the moved entry disappears from the source and appears at the destination in
//! the same snapshot (no window where it's visible in neither, or in both).

mod common;

use camlifs::client::SigningClient;
use camlifs::config::Config;
use camlifs::node::attr::FileKind;
use camlifs::node::mut_dir::MutDir;

use common::FakeNetwork;

#[test]
fn rename_within_same_directory_renames_in_place() {
    let network = FakeNetwork::new();
    let ctx = network.context(Config::default());
    let root_permanode = network.new_permanode().expect("mint a root permanode");
    let dir = MutDir::new(root_permanode, None);

    dir.create(&ctx, "old_name.txt").expect("create");
    dir.rename(&ctx, "old_name.txt", &dir, "new_name.txt").expect("rename");

    let entries = dir.readdir(&ctx).expect("readdir after rename");
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert!(!names.contains(&"old_name.txt"), "source name must be gone: {names:?}");
    assert!(names.contains(&"new_name.txt"), "destination name must be present: {names:?}");
}

#[test]
fn rename_across_directories_moves_exactly_once() {
    let network = FakeNetwork::new();
    let ctx = network.context(Config::default());

    let source_permanode = network.new_permanode().expect("mint source dir permanode");
    let dest_permanode = network.new_permanode().expect("mint dest dir permanode");
    let source = MutDir::new(source_permanode, None);
    let dest = MutDir::new(dest_permanode, None);

    let (node, attr) = source.create(&ctx, "file.txt").expect("create in source");
    assert_eq!(attr.kind, FileKind::RegularFile);
    let _ = node;

    source.rename(&ctx, "file.txt", &dest, "file.txt").expect("cross-directory rename");

    let source_entries = source.readdir(&ctx).expect("readdir source");
    assert!(
        source_entries.iter().all(|e| e.name != "file.txt"),
        "file must no longer be listed under source: {:?}",
        source_entries.iter().map(|e| &e.name).collect::<Vec<_>>()
    );

    let dest_entries = dest.readdir(&ctx).expect("readdir dest");
    assert!(
        dest_entries.iter().any(|e| e.name == "file.txt"),
        "file must be listed under dest: {:?}",
        dest_entries.iter().map(|e| &e.name).collect::<Vec<_>>()
    );
}

#[test]
fn rename_of_unknown_name_fails_without_side_effects() {
    let network = FakeNetwork::new();
    let ctx = network.context(Config::default());
    let root_permanode = network.new_permanode().expect("mint a root permanode");
    let dir = MutDir::new(root_permanode, None);

    let result = dir.rename(&ctx, "does_not_exist.txt", &dir, "whatever.txt");
    assert!(result.is_err());
    assert!(dir.readdir(&ctx).expect("readdir").is_empty());
}
