//! Backend-agnostic contract checks.
//!
//! Every backend's test module calls these functions against a fresh
//! instance, so the error taxonomy and version semantics are verified once
//! and enforced everywhere.

use std::collections::BTreeMap;

use arx_types::StoragePath;

use crate::error::{StorageError, StorageErrorKind};
use crate::payload::ContentPayload;
use crate::resource::Resource;
use crate::traits::StorageService;

fn path(s: &str) -> StoragePath {
    StoragePath::parse(s).unwrap()
}

fn text(s: &str) -> ContentPayload {
    ContentPayload::from(s)
}

fn read(storage: &dyn StorageService, p: &str) -> String {
    storage
        .get_binary(&path(p))
        .unwrap()
        .content
        .read_to_string()
        .unwrap()
}

fn kind<T: std::fmt::Debug>(result: Result<T, StorageError>) -> StorageErrorKind {
    result.unwrap_err().kind()
}

/// Snapshot of a subtree: relative path to `None` for directories or the
/// binary content.
fn tree(storage: &dyn StorageService, root: &StoragePath) -> BTreeMap<String, Option<String>> {
    let listing = if root.is_container() {
        storage.list_resources_under_container(root, true)
    } else {
        storage.list_resources_under_directory(root, true)
    };
    listing
        .unwrap()
        .try_collect()
        .unwrap()
        .into_iter()
        .map(|r| {
            let relative = r.path().relative_to(root).unwrap().join("/");
            let content = match r {
                Resource::Binary(b) => Some(b.content.read_to_string().unwrap()),
                _ => None,
            };
            (relative, content)
        })
        .collect()
}

pub fn containers(storage: &dyn StorageService) {
    let aip = path("aip");
    storage.create_container(&aip).unwrap();
    assert_eq!(storage.get_container(&aip).unwrap().path, aip);
    assert_eq!(kind(storage.create_container(&aip)), StorageErrorKind::AlreadyExists);
    assert_eq!(kind(storage.get_container(&path("missing"))), StorageErrorKind::NotFound);
    assert_eq!(
        kind(storage.create_container(&path("aip/nested"))),
        StorageErrorKind::RequestNotValid
    );

    storage.create_container(&path("job")).unwrap();
    let mut names: Vec<_> = storage
        .list_containers()
        .unwrap()
        .try_collect()
        .unwrap()
        .into_iter()
        .map(|c| c.path.to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["aip", "job"]);

    storage.delete_container(&aip).unwrap();
    assert_eq!(kind(storage.get_container(&aip)), StorageErrorKind::NotFound);
    assert_eq!(kind(storage.delete_container(&aip)), StorageErrorKind::NotFound);
}

pub fn directories(storage: &dyn StorageService) {
    storage.create_container(&path("aip")).unwrap();
    let dir = path("aip/x/y");
    assert_eq!(storage.create_directory(&dir).unwrap().path, dir);
    assert_eq!(storage.get_directory(&dir).unwrap().path, dir);
    assert!(storage.get_directory(&path("aip/x")).is_ok());
    assert_eq!(kind(storage.create_directory(&dir)), StorageErrorKind::AlreadyExists);

    // Nested creation needs the container.
    assert_eq!(
        kind(storage.create_directory(&path("nope/x"))),
        StorageErrorKind::NotFound
    );

    let random = storage.create_random_directory(&path("aip")).unwrap();
    assert_eq!(random.path.parent().unwrap(), path("aip"));
    assert!(storage.exists(&random.path).unwrap());
    assert!(!storage.exists(&path("aip/unknown")).unwrap());
}

pub fn binaries(storage: &dyn StorageService) {
    storage.create_container(&path("aip")).unwrap();
    let p = path("aip/x/aip.json");

    let created = storage.create_binary(&p, &text("{\"a\":1}"), false).unwrap();
    assert_eq!(created.path, p);
    assert_eq!(created.size_in_bytes, 7);
    assert!(!created.is_reference);
    assert!(!created.is_directory());

    let fetched = storage.get_binary(&p).unwrap();
    assert_eq!(fetched.content.read_to_string().unwrap(), "{\"a\":1}");
    assert_eq!(fetched.content_digest, created.content_digest);
    assert!(fetched.verify_digests().unwrap());

    assert_eq!(
        kind(storage.create_binary(&p, &text("again"), false)),
        StorageErrorKind::AlreadyExists
    );

    // Update semantics.
    let absent = path("aip/x/other");
    assert_eq!(
        kind(storage.update_binary_content(&absent, &text("v"), false, false)),
        StorageErrorKind::NotFound
    );
    storage
        .update_binary_content(&absent, &text("made"), false, true)
        .unwrap();
    assert_eq!(read(storage, "aip/x/other"), "made");

    let updated = storage
        .update_binary_content(&p, &text("{}"), false, false)
        .unwrap();
    assert_eq!(updated.size_in_bytes, 2);
    assert_eq!(read(storage, "aip/x/aip.json"), "{}");

    storage.delete_resource(&p).unwrap();
    assert_eq!(kind(storage.get_binary(&p)), StorageErrorKind::NotFound);
    assert_eq!(kind(storage.delete_resource(&p)), StorageErrorKind::NotFound);

    // Empty content is legal.
    let empty = storage.create_binary(&path("aip/empty"), &text(""), false).unwrap();
    assert_eq!(empty.size_in_bytes, 0);
}

pub fn kind_checks(storage: &dyn StorageService) {
    storage.create_container(&path("aip")).unwrap();
    storage.create_directory(&path("aip/dir")).unwrap();
    storage
        .create_binary(&path("aip/bin"), &text("x"), false)
        .unwrap();

    assert_eq!(kind(storage.get_binary(&path("aip/dir"))), StorageErrorKind::RequestNotValid);
    assert_eq!(kind(storage.get_binary(&path("aip"))), StorageErrorKind::RequestNotValid);
    assert_eq!(kind(storage.get_directory(&path("aip/bin"))), StorageErrorKind::RequestNotValid);
    assert_eq!(kind(storage.get_directory(&path("aip"))), StorageErrorKind::RequestNotValid);
    assert_eq!(kind(storage.get_container(&path("aip/dir"))), StorageErrorKind::RequestNotValid);
    assert_eq!(kind(storage.get_binary(&path("aip/none"))), StorageErrorKind::NotFound);
    assert_eq!(kind(storage.get_directory(&path("aip/none"))), StorageErrorKind::NotFound);

    assert_eq!(
        kind(storage.list_resources_under_directory(&path("aip/bin"), false)),
        StorageErrorKind::RequestNotValid
    );
    assert_eq!(
        kind(storage.update_binary_content(&path("aip/dir"), &text("x"), false, true)),
        StorageErrorKind::RequestNotValid
    );
    assert_eq!(
        kind(storage.create_binary(&path("aip/bin/child"), &text("x"), false)),
        StorageErrorKind::RequestNotValid
    );
    assert_eq!(
        kind(storage.create_binary_version(&path("aip/dir"), None)),
        StorageErrorKind::RequestNotValid
    );

    assert!(storage.get_resource(&path("aip/dir")).unwrap().is_directory());
    assert!(!storage.get_resource(&path("aip/bin")).unwrap().is_directory());
}

pub fn listings(storage: &dyn StorageService) {
    storage.create_container(&path("aip")).unwrap();
    storage.create_binary(&path("aip/a/1"), &text("1"), false).unwrap();
    storage.create_binary(&path("aip/a/b/2"), &text("2"), false).unwrap();
    storage.create_binary(&path("aip/3"), &text("3"), false).unwrap();

    let shallow: Vec<_> = storage
        .list_resources_under_container(&path("aip"), false)
        .unwrap()
        .try_collect()
        .unwrap()
        .into_iter()
        .map(|r| r.path().to_string())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    assert_eq!(shallow, vec!["aip/3", "aip/a"]);

    let recursive = tree(storage, &path("aip"));
    let keys: Vec<_> = recursive.keys().cloned().collect();
    assert_eq!(keys, vec!["3", "a", "a/1", "a/b", "a/b/2"]);
    assert_eq!(recursive["a/b/2"].as_deref(), Some("2"));
    assert_eq!(recursive["a"], None);

    let under_a = storage
        .list_resources_under_directory(&path("aip/a"), false)
        .unwrap()
        .count();
    assert_eq!(under_a, 2);

    // Early close releases without error, and is repeatable.
    let mut listing = storage
        .list_resources_under_directory(&path("aip/a"), true)
        .unwrap();
    assert!(listing.next().is_some());
    listing.close();
    listing.close();
    assert!(listing.next().is_none());

    storage.create_directory(&path("aip/empty")).unwrap();
    assert_eq!(
        storage
            .list_resources_under_directory(&path("aip/empty"), true)
            .unwrap()
            .count(),
        0
    );
    assert_eq!(
        kind(storage.list_resources_under_directory(&path("aip/none"), false)),
        StorageErrorKind::NotFound
    );
}

pub fn recursive_delete(storage: &dyn StorageService) {
    storage.create_container(&path("aip")).unwrap();
    storage.create_binary(&path("aip/x/a/1"), &text("1"), false).unwrap();
    storage.create_binary(&path("aip/x/b"), &text("2"), false).unwrap();
    storage.create_binary(&path("aip/xy"), &text("sibling"), false).unwrap();
    storage.create_binary_version(&path("aip/x/b"), Some("v")).unwrap();

    storage.delete_resource(&path("aip/x")).unwrap();
    for gone in ["aip/x", "aip/x/a", "aip/x/a/1", "aip/x/b"] {
        assert_eq!(
            kind(storage.get_resource(&path(gone))),
            StorageErrorKind::NotFound,
            "{gone} should be gone"
        );
    }
    assert_eq!(read(storage, "aip/xy"), "sibling");

    // A recreated binary at the old path starts with a clean history.
    storage.create_binary(&path("aip/x/b"), &text("new"), false).unwrap();
    assert_eq!(storage.list_binary_versions(&path("aip/x/b")).unwrap().count(), 0);

    storage.delete_container(&path("aip")).unwrap();
    assert_eq!(kind(storage.get_resource(&path("aip/xy"))), StorageErrorKind::NotFound);
}

pub fn versions(storage: &dyn StorageService) {
    storage.create_container(&path("aip")).unwrap();
    let p = path("aip/dm.xml");
    storage.create_binary(&p, &text("one"), false).unwrap();
    assert_eq!(storage.list_binary_versions(&p).unwrap().count(), 0);

    let v1 = storage.create_binary_version(&p, Some("first")).unwrap();
    storage.update_binary_content(&p, &text("two"), false, false).unwrap();
    let v2 = storage.create_binary_version(&p, Some("same")).unwrap();
    storage.update_binary_content(&p, &text("three"), false, false).unwrap();
    let v3 = storage.create_binary_version(&p, Some("same")).unwrap();

    // Duplicate messages still produce distinct versions.
    assert_ne!(v2.id, v3.id);
    let history = storage.list_binary_versions(&p).unwrap().try_collect().unwrap();
    let ids: Vec<_> = history.iter().map(|v| v.id.clone()).collect();
    assert_eq!(ids, vec![v1.id.clone(), v2.id.clone(), v3.id.clone()]);
    assert!(history.windows(2).all(|w| w[0].created <= w[1].created));

    let fetched = storage.get_binary_version(&p, &v1.id).unwrap();
    assert_eq!(fetched.message.as_deref(), Some("first"));
    assert_eq!(fetched.binary.content.read_to_string().unwrap(), "one");
    assert_eq!(fetched.binary.path, p);

    // Revert restores content and leaves history alone.
    let reverted = storage.revert_binary_version(&p, &v1.id).unwrap();
    assert_eq!(reverted.content.read_to_string().unwrap(), "one");
    assert_eq!(read(storage, "aip/dm.xml"), "one");
    assert_eq!(storage.list_binary_versions(&p).unwrap().count(), 3);

    storage.delete_binary_version(&p, &v2.id).unwrap();
    assert_eq!(kind(storage.get_binary_version(&p, &v2.id)), StorageErrorKind::NotFound);
    assert_eq!(kind(storage.delete_binary_version(&p, &v2.id)), StorageErrorKind::NotFound);
    assert_eq!(kind(storage.revert_binary_version(&p, "unknown")), StorageErrorKind::NotFound);
    assert_eq!(storage.list_binary_versions(&p).unwrap().count(), 2);

    // Deleting the binary makes every version unreachable.
    storage.delete_resource(&p).unwrap();
    assert_eq!(kind(storage.get_binary_version(&p, &v1.id)), StorageErrorKind::NotFound);
    assert_eq!(kind(storage.list_binary_versions(&p)), StorageErrorKind::NotFound);
}

pub fn rename(storage: &dyn StorageService) {
    storage.create_container(&path("aip")).unwrap();
    storage.create_binary(&path("aip/src/a/f"), &text("f"), false).unwrap();
    storage.create_directory(&path("aip/taken")).unwrap();

    assert_eq!(
        kind(storage.rename(&path("aip/src"), &path("aip/taken"))),
        StorageErrorKind::AlreadyExists
    );
    assert_eq!(
        kind(storage.rename(&path("aip/src"), &path("aip/src/inner"))),
        StorageErrorKind::RequestNotValid
    );
    assert_eq!(
        kind(storage.rename(&path("aip/none"), &path("aip/dst"))),
        StorageErrorKind::NotFound
    );

    storage.rename(&path("aip/src"), &path("aip/moved/here")).unwrap();
    assert_eq!(read(storage, "aip/moved/here/a/f"), "f");
    assert_eq!(kind(storage.get_directory(&path("aip/src"))), StorageErrorKind::NotFound);
}

pub fn copy_and_move(source: &dyn StorageService, target: &dyn StorageService) {
    source.create_container(&path("aip")).unwrap();
    source.create_binary(&path("aip/x/aip.json"), &text("{}"), false).unwrap();
    source
        .create_binary(&path("aip/x/representations/r1/data/f.txt"), &text("data"), false)
        .unwrap();
    source.create_directory(&path("aip/x/empty")).unwrap();
    target.create_container(&path("aip")).unwrap();

    // Copy of a directory subtree.
    target.copy_from(source, &path("aip/x"), &path("aip/y")).unwrap();
    assert_eq!(tree(source, &path("aip/x")), tree(target, &path("aip/y")));
    let original = source.get_binary(&path("aip/x/aip.json")).unwrap();
    let copied = target.get_binary(&path("aip/y/aip.json")).unwrap();
    assert_eq!(original.content_digest, copied.content_digest);

    assert_eq!(
        kind(target.copy_from(source, &path("aip/x"), &path("aip/y"))),
        StorageErrorKind::AlreadyExists
    );
    assert_eq!(
        kind(target.copy_from(source, &path("aip/none"), &path("aip/z"))),
        StorageErrorKind::NotFound
    );

    // Copy of a single binary.
    target
        .copy_from(source, &path("aip/x/aip.json"), &path("aip/single.json"))
        .unwrap();
    assert_eq!(read(target, "aip/single.json"), "{}");

    // Copy of a whole container.
    target.copy_from(source, &path("aip"), &path("mirror")).unwrap();
    assert!(target.get_container(&path("mirror")).is_ok());
    assert_eq!(tree(source, &path("aip")), tree(target, &path("mirror")));

    // Move removes the source only after the copy.
    let before = tree(source, &path("aip/x"));
    target.move_from(source, &path("aip/x"), &path("aip/moved")).unwrap();
    assert_eq!(tree(target, &path("aip/moved")), before);
    assert_eq!(kind(source.get_directory(&path("aip/x"))), StorageErrorKind::NotFound);

    // A failed move leaves the source in place.
    source.create_binary(&path("aip/keep"), &text("k"), false).unwrap();
    assert_eq!(
        kind(target.move_from(source, &path("aip/keep"), &path("aip/moved"))),
        StorageErrorKind::AlreadyExists
    );
    assert_eq!(read(source, "aip/keep"), "k");
}
