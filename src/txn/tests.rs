use tempfile::tempdir;

use super::Transaction;
use crate::store::Store;
use crate::TxnLabError;

fn test_store() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path().join("db")).unwrap();
    (tmp, store)
}

#[test]
fn read_your_writes_wins_over_store() {
    let (_tmp, store) = test_store();
    store.put("k1", "original");

    let mut txn = Transaction::new(1, "test", 0);
    txn.write("k1", "buffered").unwrap();

    let val = txn.read("k1", &store).unwrap();
    assert_eq!(val.as_deref(), Some("buffered"));
    assert_eq!(txn.read_set.get("k1").map(String::as_str), Some("buffered"));

    // The store is untouched until commit.
    assert_eq!(store.get("k1").as_deref(), Some("original"));
}

#[test]
fn read_records_stored_value() {
    let (_tmp, store) = test_store();
    store.put("k1", "from_store");

    let mut txn = Transaction::new(1, "test", 0);
    let val = txn.read("k1", &store).unwrap();
    assert_eq!(val.as_deref(), Some("from_store"));
    assert_eq!(
        txn.read_set.get("k1").map(String::as_str),
        Some("from_store")
    );
}

#[test]
fn read_of_absent_key_records_nothing() {
    let (_tmp, store) = test_store();

    let mut txn = Transaction::new(1, "test", 0);
    let val = txn.read("missing", &store).unwrap();
    assert!(val.is_none());
    assert!(txn.read_set.is_empty());
}

#[test]
fn writes_buffer_last_write_wins() {
    let (_tmp, store) = test_store();

    let mut txn = Transaction::new(1, "test", 0);
    txn.write("a", "1").unwrap();
    txn.write("b", "2").unwrap();
    txn.write("a", "3").unwrap();

    assert_eq!(txn.write_set.len(), 2);
    assert_eq!(txn.write_set.get("a").map(String::as_str), Some("3"));
    assert_eq!(txn.write_set.get("b").map(String::as_str), Some("2"));

    // Nothing reached the store.
    assert!(store.get("a").is_none());
    assert!(store.get("b").is_none());
}

#[test]
fn terminal_transaction_rejects_reads_and_writes() {
    let (_tmp, store) = test_store();

    let mut txn = Transaction::new(7, "test", 0);
    txn.status = super::TxnStatus::Aborted;

    let read_err = txn.read("k", &store).unwrap_err();
    assert!(matches!(read_err, TxnLabError::InvalidTransactionState(_)));
    let write_err = txn.write("k", "v").unwrap_err();
    assert!(matches!(write_err, TxnLabError::InvalidTransactionState(_)));
}
