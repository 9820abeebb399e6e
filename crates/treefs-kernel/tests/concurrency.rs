//! Several threads mutating one tree through `SharedTree`.

use std::sync::Arc;
use std::thread;

use treefs_kernel::{FsOps, FsTree, Limits, ManualClock, Owner, SharedTree, TreeError, TreeResult};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("treefs_kernel=debug")
        .with_test_writer()
        .try_init();
}

fn shared(limits: Limits) -> SharedTree {
    init_tracing();
    SharedTree::new(FsTree::with_clock(
        limits,
        Owner::new(0, 0),
        Arc::new(ManualClock::new(0)),
    ))
}

#[test]
fn test_parallel_creates_respect_capacity() {
    let fs = shared(Limits {
        max_directories: 10,
        max_files: 20,
    });

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let fs = fs.clone();
            thread::spawn(move || fs.mkdir(&format!("/d{i}"), 0o755))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let created = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(TreeError::ResourceExhausted(_))))
        .count();
    assert_eq!(created, 9);
    assert_eq!(refused, 7);
    assert_eq!(fs.with(|t| t.directory_count()), 10);
    assert_eq!(fs.readdir("/").unwrap().len(), 9);
}

#[test]
fn test_parallel_appends_never_tear() {
    let fs = shared(Limits::default());
    fs.create("/log", 0o644).unwrap();

    let handles: Vec<_> = (0..4u8)
        .map(|i| {
            let fs = fs.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    let chunk = [b'a' + i; 5];
                    // Read the size and append under one lock.
                    fs.with(|t| -> TreeResult<usize> {
                        let size = t.get_attributes("/log")?.size as i64;
                        t.write_file("/log", size, &chunk)
                    })
                    .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let data = fs.read_all("/log").unwrap();
    assert_eq!(data.len(), 100);
    for chunk in data.chunks(5) {
        assert!(chunk.iter().all(|&b| b == chunk[0]));
    }
}

#[test]
fn test_readers_and_writers_interleave() {
    let fs = shared(Limits::default());
    fs.mkdir("/shared", 0o755).unwrap();

    let writer = {
        let fs = fs.clone();
        thread::spawn(move || {
            for i in 0..10 {
                let path = format!("/shared/f{i}");
                fs.write(&path, 0, b"x").unwrap();
                fs.unlink(&path).unwrap();
            }
        })
    };
    let reader = {
        let fs = fs.clone();
        thread::spawn(move || {
            for _ in 0..50 {
                let children = fs.readdir("/shared").unwrap();
                assert!(children.len() <= 1);
            }
        })
    };
    writer.join().unwrap();
    reader.join().unwrap();

    assert_eq!(fs.readdir("/shared").unwrap(), vec![]);
    assert_eq!(fs.with(|t| t.file_count()), 0);
}
