//! Tests for selector resolution inside a served root

use std::fs;
use std::os::unix::fs::symlink;

use gopherd::confine::{Confinement, ServedRoot};
use gopherd::gopher::resolver::{INDEX_FILE, Resolution, resolve};
use gopherd::gopher::selector::parse_selector;

fn tree() -> (tempfile::TempDir, ServedRoot) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(INDEX_FILE), "1Docs\t/docs\tlocalhost\t70\n").unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();
    fs::write(
        dir.path().join("docs").join(INDEX_FILE),
        "0Intro\t/docs/intro.txt\tlocalhost\t70\n",
    )
    .unwrap();
    fs::write(dir.path().join("docs").join("intro.txt"), "hello\n").unwrap();
    fs::create_dir(dir.path().join("bare")).unwrap();

    let root = ServedRoot::establish(dir.path(), Confinement::Resolve).unwrap();
    (dir, root)
}

#[tokio::test]
async fn test_empty_selector_is_root_index() {
    let (_dir, root) = tree();
    let res = resolve(&root, &parse_selector(b"\r\n")).await;

    assert_eq!(res, Resolution::RootIndex);
    assert_eq!(res.target(&root).unwrap(), root.base().join(INDEX_FILE));
}

#[tokio::test]
async fn test_directory_selector() {
    let (_dir, root) = tree();
    let res = resolve(&root, &parse_selector(b"/docs\n")).await;

    assert_eq!(res, Resolution::DirectoryIndex(root.base().join("docs")));
    assert_eq!(res.target(&root).unwrap(), root.base().join("docs").join(INDEX_FILE));
}

#[tokio::test]
async fn test_directory_selector_with_trailing_slash() {
    let (_dir, root) = tree();
    let res = resolve(&root, &parse_selector(b"docs/\n")).await;

    assert_eq!(res, Resolution::DirectoryIndex(root.base().join("docs")));
}

#[tokio::test]
async fn test_directory_without_index_still_resolves() {
    let (_dir, root) = tree();
    let res = resolve(&root, &parse_selector(b"bare\n")).await;

    assert_eq!(res, Resolution::DirectoryIndex(root.base().join("bare")));
}

#[tokio::test]
async fn test_file_selector() {
    let (_dir, root) = tree();
    let res = resolve(&root, &parse_selector(b"/docs/intro.txt\r\n")).await;

    assert_eq!(res, Resolution::File(root.base().join("docs").join("intro.txt")));
}

#[tokio::test]
async fn test_missing_selector() {
    let (_dir, root) = tree();
    let res = resolve(&root, &parse_selector(b"nope.txt\n")).await;

    assert_eq!(res, Resolution::NotFound);
    assert!(res.target(&root).is_none());
}

#[tokio::test]
async fn test_escape_attempts_are_not_found() {
    let outer = tempfile::tempdir().unwrap();
    let served = outer.path().join("srv");
    fs::create_dir(&served).unwrap();
    fs::write(outer.path().join("secret.txt"), "top secret\n").unwrap();
    symlink(outer.path(), served.join("up")).unwrap();

    let root = ServedRoot::establish(&served, Confinement::Resolve).unwrap();

    for raw in [&b"../secret.txt\n"[..], b"/../secret.txt\n", b"up/secret.txt\n", b"up\n"] {
        assert_eq!(resolve(&root, &parse_selector(raw)).await, Resolution::NotFound);
    }
}

#[tokio::test]
async fn test_nul_byte_selector_is_not_found() {
    let (_dir, root) = tree();
    let res = resolve(&root, &parse_selector(b"docs\0intro\n")).await;

    assert_eq!(res, Resolution::NotFound);
}
