//! File-backed transaction log
//!
//! Every global transaction owns one record file named after its global
//! transaction id: `<gtrid-hex>.txlog`. Updates rewrite the whole record with
//! write-fsync-rename, so a crash leaves either the old or the new record.
//!
//! # Binary Format
//!
//! ```text
//! magic("TDTX", 4) + version(4) + payload_len(4) + payload(N) + crc32(4)
//! ```
//!
//! The payload is the MessagePack encoding of a [`TransactionArchive`]. The
//! CRC covers everything before it. Records that fail validation are skipped
//! during [`TransactionLogger::archives`] and reported at warn level, since a
//! torn or corrupt record must not stop recovery of the others.

use crate::log::{ArchiveIter, TransactionLogger};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tandem_core::{Error, Result, TransactionArchive, TransactionXid};
use thiserror::Error as ThisError;
use tracing::{debug, warn};

/// Magic bytes at the start of every record
pub const RECORD_MAGIC: &[u8; 4] = b"TDTX";

/// Current record format version
pub const RECORD_VERSION: u32 = 1;

/// File extension of record files
pub const RECORD_EXTENSION: &str = "txlog";

const HEADER_SIZE: usize = 12;
const CRC_SIZE: usize = 4;

/// Record validation errors
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum RecordError {
    /// Record shorter than header + checksum
    #[error("record too short: {0} bytes")]
    TooShort(usize),

    /// Magic bytes do not match
    #[error("invalid magic bytes")]
    InvalidMagic,

    /// Unknown format version
    #[error("unsupported record version {0}")]
    UnsupportedVersion(u32),

    /// Payload length disagrees with the file size
    #[error("payload length {declared} does not match available {available}")]
    LengthMismatch {
        /// Length stored in the header
        declared: usize,
        /// Bytes actually present
        available: usize,
    },

    /// Checksum mismatch
    #[error("crc mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Stored checksum
        expected: u32,
        /// Checksum of the bytes read
        computed: u32,
    },
}

impl From<RecordError> for Error {
    fn from(e: RecordError) -> Self {
        Error::Corruption(e.to_string())
    }
}

/// Encode an archive into a framed record
pub fn encode_record(archive: &TransactionArchive) -> Result<Vec<u8>> {
    let payload = rmp_serde::to_vec(archive)?;
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    buf.extend_from_slice(RECORD_MAGIC);
    buf.extend_from_slice(&RECORD_VERSION.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&payload);
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

/// Validate a framed record and decode its archive
pub fn decode_record(data: &[u8]) -> Result<TransactionArchive> {
    if data.len() < HEADER_SIZE + CRC_SIZE {
        return Err(RecordError::TooShort(data.len()).into());
    }
    if &data[0..4] != RECORD_MAGIC {
        return Err(RecordError::InvalidMagic.into());
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != RECORD_VERSION {
        return Err(RecordError::UnsupportedVersion(version).into());
    }
    let declared = u32::from_le_bytes([data[8], data[9], data[10], data[11]]) as usize;
    let available = data.len() - HEADER_SIZE - CRC_SIZE;
    if declared != available {
        return Err(RecordError::LengthMismatch {
            declared,
            available,
        }
        .into());
    }

    let crc_offset = HEADER_SIZE + declared;
    let expected = u32::from_le_bytes([
        data[crc_offset],
        data[crc_offset + 1],
        data[crc_offset + 2],
        data[crc_offset + 3],
    ]);
    let computed = crc32fast::hash(&data[..crc_offset]);
    if expected != computed {
        return Err(RecordError::ChecksumMismatch { expected, computed }.into());
    }

    Ok(rmp_serde::from_slice(&data[HEADER_SIZE..crc_offset])?)
}

/// [`TransactionLogger`] storing one record file per transaction
#[derive(Debug)]
pub struct FileTransactionLog {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTransactionLog {
    /// Open (creating if needed) a log directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Log directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for a transaction
    pub fn record_path(&self, xid: &TransactionXid) -> PathBuf {
        self.dir
            .join(format!("{}.{}", xid.global_hex(), RECORD_EXTENSION))
    }

    fn write_record(&self, archive: &TransactionArchive) -> Result<()> {
        let bytes = encode_record(archive)?;
        let final_path = self.record_path(&archive.xid);
        let temp_path = final_path.with_extension("txlog.tmp");

        let _guard = self.write_lock.lock();

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &final_path)?;

        let dir_fd = File::open(&self.dir)?;
        dir_fd.sync_all()?;

        debug!(target: "tandem::log", gtrid = %archive.xid.global_hex(), status = %archive.status, "Archive written");
        Ok(())
    }

    fn read_record(path: &Path) -> Option<TransactionArchive> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!(target: "tandem::log", path = %path.display(), error = %e, "Skipping unreadable record");
                return None;
            }
        };
        match decode_record(&data) {
            Ok(archive) => Some(archive),
            Err(e) => {
                warn!(target: "tandem::log", path = %path.display(), error = %e, "Skipping corrupt record");
                None
            }
        }
    }
}

impl TransactionLogger for FileTransactionLog {
    fn create_transaction(&self, archive: &TransactionArchive) -> Result<()> {
        self.write_record(archive)
    }

    fn update_transaction(&self, archive: &TransactionArchive) -> Result<()> {
        self.write_record(archive)
    }

    fn delete_transaction(&self, archive: &TransactionArchive) -> Result<()> {
        let path = self.record_path(&archive.xid);
        let _guard = self.write_lock.lock();
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(target: "tandem::log", gtrid = %archive.xid.global_hex(), "Archive deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn archives(&self) -> Result<ArchiveIter<'_>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION) {
                        paths.push(path);
                    }
                }
                Err(e) => {
                    warn!(target: "tandem::log", error = %e, "Skipping unreadable directory entry");
                }
            }
        }
        // record names are the hex global id, so this is global id order
        paths.sort();
        Ok(Box::new(
            paths.into_iter().filter_map(|path| Self::read_record(&path)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::{
        DefaultXidFactory, TransactionStatus, XaResourceArchive, XaResourceDescriptor, XidFactory,
    };
    use tempfile::TempDir;

    fn sample_archive() -> TransactionArchive {
        let factory = DefaultXidFactory;
        let xid = factory.generate_global_xid();
        let mut archive = TransactionArchive::new(xid.clone(), true, TransactionStatus::Prepared);
        archive.native_resources.push(XaResourceArchive::new(
            XaResourceDescriptor::native("db"),
            factory.create_branch_xid(&xid),
        ));
        archive
    }

    #[test]
    fn test_record_roundtrip() {
        let archive = sample_archive();
        let bytes = encode_record(&archive).unwrap();
        assert_eq!(&bytes[0..4], RECORD_MAGIC);
        assert_eq!(decode_record(&bytes).unwrap(), archive);
    }

    #[test]
    fn test_decode_detects_bit_flip() {
        let mut bytes = encode_record(&sample_archive()).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        let err = decode_record(&bytes).unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));
    }

    #[test]
    fn test_decode_rejects_short_and_bad_magic() {
        assert!(decode_record(&[0u8; 4]).is_err());

        let mut bytes = encode_record(&sample_archive()).unwrap();
        bytes[0] = b'X';
        let err = decode_record(&bytes).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let bytes = encode_record(&sample_archive()).unwrap();
        let err = decode_record(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(err.to_string().contains("payload length"));
    }

    #[test]
    fn test_write_then_stream() {
        let temp = TempDir::new().unwrap();
        let log = FileTransactionLog::open(temp.path()).unwrap();

        let mut a = sample_archive();
        log.create_transaction(&a).unwrap();
        a.status = TransactionStatus::Committing;
        log.update_transaction(&a).unwrap();

        let archives: Vec<_> = log.archives().unwrap().collect();
        assert_eq!(archives, vec![a]);
    }

    #[test]
    fn test_archives_stream_in_global_id_order() {
        let temp = TempDir::new().unwrap();
        let log = FileTransactionLog::open(temp.path()).unwrap();

        let mut written: Vec<TransactionArchive> = (0..6).map(|_| sample_archive()).collect();
        for archive in &written {
            log.create_transaction(archive).unwrap();
        }

        written.sort_by_key(|a| a.xid.global_hex());
        let archives: Vec<_> = log.archives().unwrap().collect();
        assert_eq!(archives, written);
    }

    #[test]
    fn test_delete_removes_record() {
        let temp = TempDir::new().unwrap();
        let log = FileTransactionLog::open(temp.path()).unwrap();
        let a = sample_archive();
        log.create_transaction(&a).unwrap();
        assert!(log.record_path(&a.xid).exists());

        log.delete_transaction(&a).unwrap();
        assert!(!log.record_path(&a.xid).exists());
        // missing record is not an error
        log.delete_transaction(&a).unwrap();
    }

    #[test]
    fn test_corrupt_record_is_skipped() {
        let temp = TempDir::new().unwrap();
        let log = FileTransactionLog::open(temp.path()).unwrap();
        let good = sample_archive();
        let bad = sample_archive();
        log.create_transaction(&good).unwrap();
        log.create_transaction(&bad).unwrap();

        fs::write(log.record_path(&bad.xid), b"TDTX garbage").unwrap();
        fs::write(temp.path().join("notes.txt"), b"ignored").unwrap();

        let archives: Vec<_> = log.archives().unwrap().collect();
        assert_eq!(archives, vec![good]);
    }
}
