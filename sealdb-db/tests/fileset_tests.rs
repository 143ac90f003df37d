use pretty_assertions::assert_eq;
use sealdb_db::{FileSet, MEMBER_SUFFIXES, StdFileSystem};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn touch(path: &Path, contents: &[u8]) {
    std::fs::write(path, contents).unwrap();
}

fn name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

#[test]
fn suffix_applies_to_every_member() {
    let set = FileSet::new("/data/app.db").with_suffix(".pending");
    let names: Vec<String> = set.members().iter().map(|p| name(p)).collect();
    assert_eq!(
        names,
        vec![
            "app.db.pending",
            "app.db.pending-wal",
            "app.db.pending-shm",
            "app.db.pending-journal",
        ]
    );
    assert_eq!(MEMBER_SUFFIXES[0], "");
}

#[test]
fn exists_requires_main_file() {
    let dir = TempDir::new().unwrap();
    let set = FileSet::new(dir.path().join("app.db"));
    touch(&set.member("-wal"), b"wal");

    assert!(!set.exists(&StdFileSystem));
    assert!(set.any_exists(&StdFileSystem));

    touch(set.main(), b"main");
    assert!(set.exists(&StdFileSystem));
}

#[test]
fn rename_moves_present_members_only() {
    let dir = TempDir::new().unwrap();
    let main = FileSet::new(dir.path().join("app.db"));
    let backup = main.with_suffix(".backup");
    touch(main.main(), b"main");
    touch(&main.member("-wal"), b"wal");

    main.rename_to(&backup, &StdFileSystem).unwrap();

    assert!(!main.any_exists(&StdFileSystem));
    assert_eq!(std::fs::read(backup.main()).unwrap(), b"main");
    assert_eq!(std::fs::read(backup.member("-wal")).unwrap(), b"wal");
    assert!(!backup.member("-shm").exists());
}

#[test]
fn rename_leaves_unmatched_target_members() {
    let dir = TempDir::new().unwrap();
    let backup = FileSet::new(dir.path().join("app.db.backup"));
    let main = FileSet::new(dir.path().join("app.db"));
    touch(backup.main(), b"old main");
    touch(&main.member("-wal"), b"old wal");

    backup.rename_to(&main, &StdFileSystem).unwrap();

    assert_eq!(std::fs::read(main.main()).unwrap(), b"old main");
    assert_eq!(std::fs::read(main.member("-wal")).unwrap(), b"old wal");
}

#[test]
fn delete_removes_all_members() {
    let dir = TempDir::new().unwrap();
    let set = FileSet::new(dir.path().join("app.db.pending"));
    for member in set.members() {
        touch(&member, b"x");
    }
    set.delete(&StdFileSystem).unwrap();
    assert!(!set.any_exists(&StdFileSystem));
}

#[test]
fn delete_of_missing_set_is_ok() {
    let dir = TempDir::new().unwrap();
    let set = FileSet::new(dir.path().join("nothing.db"));
    set.delete(&StdFileSystem).unwrap();
}

#[test]
fn list_siblings_matches_name_prefix() {
    let dir = TempDir::new().unwrap();
    let main = FileSet::new(dir.path().join("app.db"));
    let pending = main.with_suffix(".pending");
    touch(main.main(), b"m");
    touch(pending.main(), b"p");
    touch(&dir.path().join("other.db"), b"o");

    let siblings: Vec<PathBuf> = pending.list_siblings(&StdFileSystem).unwrap();
    assert_eq!(siblings, vec![pending.main().to_path_buf()]);

    let all = main.list_siblings(&StdFileSystem).unwrap();
    assert_eq!(all.len(), 2);
}
