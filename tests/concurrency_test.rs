//! Many uncoordinated writers appending to one store

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use fsstore::fs::TxnOptions;
use fsstore::store::{EventStore, FsStore, StoreOptions};
use tempfile::TempDir;

const ACTORS: usize = 4;
const APPENDS: usize = 25;

fn options() -> StoreOptions {
    StoreOptions {
        txn: TxnOptions {
            sync_writes: false,
            ..TxnOptions::default()
        },
        ..StoreOptions::default()
    }
}

#[test]
fn test_concurrent_appends_are_gap_free() {
    let temp = TempDir::new().unwrap();
    let root: Arc<PathBuf> = Arc::new(temp.path().to_path_buf());
    FsStore::open_with(root.as_path(), options()).unwrap();

    let handles: Vec<_> = (0..ACTORS)
        .map(|actor| {
            let root = Arc::clone(&root);
            thread::spawn(move || {
                let store = FsStore::open_with(root.as_path(), options()).unwrap();
                (0..APPENDS)
                    .map(|i| {
                        let payload = format!("actor{actor}-{i}");
                        (store.append(&payload).unwrap(), payload)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let results: Vec<Vec<(u64, String)>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let store = FsStore::open_with(root.as_path(), options()).unwrap();
    let total = (ACTORS * APPENDS) as u64;
    assert_eq!(store.head().unwrap(), total);

    let mut seen = HashSet::new();
    for appended in &results {
        // Each actor sees its own appends in order
        assert!(appended.windows(2).all(|w| w[0].0 < w[1].0));
        for (position, payload) in appended {
            assert!(seen.insert(*position), "position {position} handed out twice");
            assert_eq!(store.get(*position).unwrap().as_ref(), Some(payload));
        }
    }
    assert_eq!(seen, (1..=total).collect::<HashSet<_>>());
}

#[test]
fn test_concurrent_appends_and_reads() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(FsStore::open_with(temp.path(), options()).unwrap());

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 1..=50 {
                store.append(&format!("e{i}")).unwrap();
            }
        })
    };
    let reader = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            let mut last_head = 0;
            while last_head < 50 {
                let head = store.head().unwrap();
                assert!(head >= last_head);
                if head > 0 {
                    assert_eq!(store.get(head).unwrap(), Some(format!("e{head}")));
                }
                last_head = head;
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
}
