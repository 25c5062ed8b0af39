//! File log crash scenarios
//!
//! Records must survive a reopen, and the debris of an interrupted write
//! (a leftover temp file) must never surface as an archive.

use proptest::prelude::*;
use std::fs;
use tandem_core::{
    DefaultXidFactory, RemoteDelegate, TransactionArchive, TransactionStatus, Vote,
    XaResourceArchive, XaResourceDescriptor, XidFactory,
};
use tandem_durability::file::{decode_record, encode_record};
use tandem_durability::{FileTransactionLog, TransactionLogger};
use tempfile::TempDir;

fn archive(status: TransactionStatus) -> TransactionArchive {
    let factory = DefaultXidFactory;
    let xid = factory.generate_global_xid();
    let mut archive = TransactionArchive::new(xid.clone(), false, status);
    archive.propagated_by = Some("node-a".to_string());
    archive.remote_resources.push(
        XaResourceArchive::new(
            XaResourceDescriptor::remote("inventory", RemoteDelegate::new("inventory", "h:7")),
            factory.create_branch_xid(&xid),
        )
        .with_vote(Vote::Commit),
    );
    archive
}

#[test]
fn test_records_survive_reopen() {
    let temp = TempDir::new().unwrap();
    let a = archive(TransactionStatus::Prepared);
    let b = archive(TransactionStatus::Active);

    {
        let log = FileTransactionLog::open(temp.path()).unwrap();
        log.create_transaction(&a).unwrap();
        log.create_transaction(&b).unwrap();
    }

    let log = FileTransactionLog::open(temp.path()).unwrap();
    let mut recovered: Vec<_> = log.archives().unwrap().collect();
    recovered.sort_by(|x, y| x.xid.cmp(&y.xid));
    let mut expected = vec![a, b];
    expected.sort_by(|x, y| x.xid.cmp(&y.xid));
    assert_eq!(recovered, expected);
}

#[test]
fn test_interrupted_write_leaves_previous_record() {
    let temp = TempDir::new().unwrap();
    let log = FileTransactionLog::open(temp.path()).unwrap();
    let a = archive(TransactionStatus::Prepared);
    log.create_transaction(&a).unwrap();

    // Simulate a crash between writing the temp file and the rename
    let temp_path = log.record_path(&a.xid).with_extension("txlog.tmp");
    fs::write(&temp_path, b"half written").unwrap();

    let recovered: Vec<_> = log.archives().unwrap().collect();
    assert_eq!(recovered, vec![a]);
}

#[test]
fn test_open_creates_missing_directory() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("nested").join("txlog");
    let log = FileTransactionLog::open(&dir).unwrap();
    assert!(dir.is_dir());
    assert_eq!(log.archives().unwrap().count(), 0);
}

proptest! {
    #[test]
    fn decode_never_panics_on_garbage(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_record(&bytes);
    }

    #[test]
    fn any_single_byte_flip_is_detected(position in any::<prop::sample::Index>(), mask in 1u8..=255) {
        let mut bytes = encode_record(&archive(TransactionStatus::Committing)).unwrap();
        let i = position.index(bytes.len());
        bytes[i] ^= mask;
        prop_assert!(decode_record(&bytes).is_err());
    }
}
