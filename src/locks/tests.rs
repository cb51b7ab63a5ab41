//! Tests for the lock-file protocol.

use super::*;
use crate::process;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

fn lock_path(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

/// Write a lock file by hand, bypassing the protocol.
fn craft_lock_file(path: &Path, host: &[u8], pid: Option<&[u8]>) {
    let mut file = fs::File::create(path).unwrap();
    file.write_all(host).unwrap();
    if let Some(pid) = pid {
        file.write_all(&[0]).unwrap();
        file.write_all(pid).unwrap();
    }
    file.sync_all().unwrap();
}

#[test]
fn single_lock_obtain_release() {
    let tmp = TempDir::new().unwrap();
    let mut lock = LockFile::new(lock_path(&tmp, "lock0"));

    assert!(!lock.is_locked());
    assert!(lock.lock().unwrap());
    assert!(lock.is_locked());

    // not recursive
    assert!(!lock.lock().unwrap());
    assert!(lock.is_locked());

    assert!(lock.unlock().unwrap());
    assert!(!lock.is_locked());

    // double release is a no-op failure
    assert!(!lock.unlock().unwrap());
}

#[test]
fn try_lock_on_free_lock() {
    let tmp = TempDir::new().unwrap();
    let mut lock = LockFile::new(lock_path(&tmp, "lock1"));

    assert!(lock.try_lock(Duration::from_millis(500)).unwrap());
    assert!(lock.is_locked());
    assert!(lock.unlock().unwrap());
    assert!(!lock.unlock().unwrap());
}

#[test]
fn different_names_do_not_contend() {
    let tmp = TempDir::new().unwrap();
    let mut lock0 = LockFile::new(lock_path(&tmp, "lock0"));
    let mut lock1 = LockFile::new(lock_path(&tmp, "lock1"));

    assert!(lock0.lock().unwrap());
    assert!(lock1.lock().unwrap());
    assert!(lock0.is_locked());
    assert!(lock1.is_locked());
    assert!(lock0.unlock().unwrap());
    assert!(lock1.unlock().unwrap());
}

#[test]
fn same_name_is_mutually_exclusive() {
    let tmp = TempDir::new().unwrap();
    let path = lock_path(&tmp, "lock");
    let mut lock0 = LockFile::new(&path);
    let mut lock1 = LockFile::new(&path);

    assert!(lock0.lock().unwrap());
    assert!(!lock1.lock().unwrap());
    assert!(!lock1.try_lock(Duration::from_millis(300)).unwrap());

    // the loser never held it, so its unlock is a no-op
    assert!(!lock1.unlock().unwrap());
    assert!(lock0.is_locked());

    assert!(lock0.unlock().unwrap());
    assert!(lock1.lock().unwrap());
    assert!(lock1.unlock().unwrap());
}

#[test]
fn unlock_removes_the_file() {
    let tmp = TempDir::new().unwrap();
    let path = lock_path(&tmp, "lock");
    let mut lock = LockFile::new(&path);

    assert!(lock.lock().unwrap());
    assert!(path.exists());
    assert!(lock.unlock().unwrap());
    assert!(!path.exists());
}

#[test]
fn dropping_the_handle_releases_the_lock() {
    let tmp = TempDir::new().unwrap();
    let path = lock_path(&tmp, "lock");

    {
        let mut lock = LockFile::new(&path);
        assert!(lock.lock().unwrap());
        assert!(path.exists());
    }

    assert!(!path.exists());
    let mut next = LockFile::new(&path);
    assert!(next.lock().unwrap());
    assert!(next.unlock().unwrap());
}

#[test]
fn verify_missing_file_is_unlocked() {
    let tmp = TempDir::new().unwrap();
    assert!(!verify_lock_file(&lock_path(&tmp, "absent")).unwrap());
}

#[test]
fn orphaned_lock_with_dead_pid_is_reclaimed() {
    let tmp = TempDir::new().unwrap();
    let path = lock_path(&tmp, "lock");
    let host = process::host_name().unwrap();

    // i32::MAX is above any real pid, so the recorded owner is dead.
    craft_lock_file(&path, host.as_bytes(), Some(i32::MAX.to_string().as_bytes()));
    assert!(!verify_lock_file(&path).unwrap());

    let mut lock = LockFile::new(&path);
    assert!(lock.lock().unwrap());
    assert!(lock.unlock().unwrap());
    assert!(!path.exists());
}

#[test]
fn orphaned_lock_with_garbage_pid_is_reclaimed() {
    let tmp = TempDir::new().unwrap();
    let path = lock_path(&tmp, "lock");
    let host = process::host_name().unwrap();

    craft_lock_file(&path, host.as_bytes(), Some(b"invalid_pid"));
    assert!(!verify_lock_file(&path).unwrap());

    let mut lock = LockFile::new(&path);
    assert!(lock.lock().unwrap());
    assert!(lock.unlock().unwrap());
    assert!(!path.exists());
}

#[test]
fn orphaned_empty_lock_file_is_reclaimed() {
    let tmp = TempDir::new().unwrap();
    let path = lock_path(&tmp, "lock");

    fs::File::create(&path).unwrap().sync_all().unwrap();
    assert!(!verify_lock_file(&path).unwrap());

    let mut lock = LockFile::new(&path);
    assert!(lock.lock().unwrap());
    assert!(lock.unlock().unwrap());
    assert!(!path.exists());
}

#[test]
fn orphaned_hostname_only_lock_file_is_reclaimed() {
    let tmp = TempDir::new().unwrap();
    let path = lock_path(&tmp, "lock");
    let host = process::host_name().unwrap();

    // Writer died before the NUL terminator: no pid segment at all.
    craft_lock_file(&path, host.as_bytes(), None);
    assert!(!verify_lock_file(&path).unwrap());

    let mut lock = LockFile::new(&path);
    assert!(lock.lock().unwrap());
    assert!(lock.unlock().unwrap());
}

#[test]
fn lock_held_by_live_process_on_this_host_is_honored() {
    let tmp = TempDir::new().unwrap();
    let path = lock_path(&tmp, "lock");
    let host = process::host_name().unwrap();

    craft_lock_file(
        &path,
        host.as_bytes(),
        Some(process::pid().to_string().as_bytes()),
    );
    assert!(verify_lock_file(&path).unwrap());

    let mut lock = LockFile::new(&path);
    assert!(!lock.lock().unwrap());
    assert!(path.exists());
}

#[test]
fn lock_held_by_another_host_is_honored() {
    let tmp = TempDir::new().unwrap();
    let path = lock_path(&tmp, "lock");

    craft_lock_file(
        &path,
        b"not_a_valid_hostname_//+&*(%$#@! }",
        Some(process::pid().to_string().as_bytes()),
    );
    assert!(verify_lock_file(&path).unwrap());

    let mut lock = LockFile::new(&path);
    assert!(!lock.lock().unwrap());
    assert!(path.exists());
}

#[test]
fn overlong_content_is_malformed_and_reclaimed() {
    let tmp = TempDir::new().unwrap();
    let path = lock_path(&tmp, "lock");

    // Exactly fills the 256-byte verification buffer.
    let blob = vec![b'x'; 256];
    fs::write(&path, &blob).unwrap();
    assert!(!verify_lock_file(&path).unwrap());

    let mut lock = LockFile::new(&path);
    assert!(lock.lock().unwrap());
    assert!(lock.unlock().unwrap());
}

#[test]
fn created_lock_file_records_host_and_pid() {
    let tmp = TempDir::new().unwrap();
    let path = lock_path(&tmp, "lock");
    let mut lock = LockFile::new(&path);

    assert!(lock.lock().unwrap());
    let content = fs::read(&path).unwrap();

    let nul = content.iter().position(|&b| b == 0).unwrap();
    assert_eq!(&content[..nul], process::host_name().unwrap().as_bytes());
    assert_eq!(
        &content[nul + 1..],
        process::pid().to_string().as_bytes(),
        "pid segment has no trailing terminator"
    );

    assert!(lock.unlock().unwrap());
}
