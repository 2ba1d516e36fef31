//! End-to-end tests of the public store API against real SQLite files and
//! the system clock.
//!
//! Run with:
//! ```bash
//! cargo test --test store_tests
//! ```

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use kvlite::{
    DeleteOptions, ListOptions, Namespace, ReadOptions, Record, Store, StoreOptions, WriteOptions,
};
use serde_json::json;
use tempfile::TempDir;

fn store(tmp: &TempDir) -> Store {
    Store::open(StoreOptions::default().with_dir(tmp.path())).unwrap()
}

#[test]
fn test_lifecycle() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);

    let record = Record::new("foo", "bar")
        .with_metadata("owner", "alice")
        .with_metadata("version", 3);
    store.write(&record, WriteOptions::default()).unwrap();

    let read = store.read("foo", ReadOptions::default()).unwrap();
    assert_eq!(read, vec![record]);
    assert_eq!(store.list(ListOptions::default()).unwrap(), vec!["foo"]);

    assert!(store.delete("foo", DeleteOptions::default()).unwrap());
    assert!(
        store
            .read("foo", ReadOptions::default())
            .unwrap_err()
            .is_not_found()
    );
    assert!(store.list(ListOptions::default()).unwrap().is_empty());
}

#[test]
fn test_default_namespace_file_is_created_on_open() {
    let tmp = TempDir::new().unwrap();
    let _store = store(&tmp);

    assert!(tmp.path().join("kvlite.db").exists());
}

#[test]
fn test_records_survive_reopen() {
    let tmp = TempDir::new().unwrap();
    {
        let store = store(&tmp);
        let record = Record::new("persisted", vec![0u8, 159, 146, 150]);
        store
            .write(&record, WriteOptions::to_table("app", "blobs"))
            .unwrap();
    }

    let store = store(&tmp);
    let read = store
        .read("persisted", ReadOptions::from_table("app", "blobs"))
        .unwrap();
    assert_eq!(read[0].value, vec![0u8, 159, 146, 150]);
}

#[test]
fn test_ttl_expires_in_real_time() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);

    let record = Record::new("short", "lived").with_expiry(Duration::from_millis(200));
    store.write(&record, WriteOptions::default()).unwrap();
    assert!(store.read("short", ReadOptions::default()).is_ok());

    thread::sleep(Duration::from_millis(250));
    assert!(
        store
            .read("short", ReadOptions::default())
            .unwrap_err()
            .is_not_found()
    );
    assert!(store.list(ListOptions::default()).unwrap().is_empty());
}

#[test]
fn test_options_from_toml() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("kvlite.toml");
    std::fs::write(
        &path,
        format!(
            "database = \"cfg\"\ntable = \"items\"\ndir = {:?}\n",
            tmp.path().join("data")
        ),
    )
    .unwrap();

    let store = Store::open(StoreOptions::load_from(&path).unwrap()).unwrap();
    store
        .write(&Record::new("k", "v"), WriteOptions::default())
        .unwrap();

    assert!(tmp.path().join("data").join("cfg.db").exists());
    assert_eq!(
        store.registry().namespaces(),
        vec![Namespace::new("cfg", "items")]
    );
}

#[test]
fn test_serialized_record_shape() {
    let record = Record::new("k", "text")
        .with_metadata("n", 1)
        .with_expiry(Duration::from_secs(2));

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["key"], json!("k"));
    assert_eq!(value["value"], json!("text"));
    assert_eq!(value["metadata"], json!({"n": 1}));
}

#[test]
fn test_concurrent_writers_across_namespaces() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(store(&tmp));
    let threads = 8;
    let per_thread = 50;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // Two databases, four tables
                let db = format!("db{}", t % 2);
                let table = format!("t{}", t % 4);
                barrier.wait();
                for i in 0..per_thread {
                    let record = Record::new(format!("{t}:{i}"), "v");
                    store
                        .write(&record, WriteOptions::to_table(db.as_str(), table.as_str()))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut total = 0;
    for t in 0..threads {
        let options = ListOptions::from_table(format!("db{}", t % 2), format!("t{}", t % 4))
            .prefix(format!("{t}:"));
        total += store.list(options).unwrap().len();
    }
    assert_eq!(total, threads * per_thread);

    let reg = store.registry();
    let a = reg.get(&Namespace::new("db0", "t0")).unwrap();
    let b = reg.get(&Namespace::new("db0", "t2")).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_concurrent_readers_and_writer_on_one_key() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(store(&tmp));
    store
        .write(&Record::new("hot", "0"), WriteOptions::default())
        .unwrap();

    let deadline = Instant::now() + Duration::from_millis(300);
    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            let mut n = 0u64;
            while Instant::now() < deadline {
                n += 1;
                let record = Record::new("hot", n.to_string());
                store.write(&record, WriteOptions::default()).unwrap();
            }
            n
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                while Instant::now() < deadline {
                    let read = store.read("hot", ReadOptions::default()).unwrap();
                    assert_eq!(read.len(), 1);
                    let text = String::from_utf8(read[0].value.clone()).unwrap();
                    assert!(text.parse::<u64>().is_ok());
                }
            })
        })
        .collect();

    let last = writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    let read = store.read("hot", ReadOptions::default()).unwrap();
    assert_eq!(read[0].value, last.to_string().into_bytes());
}
