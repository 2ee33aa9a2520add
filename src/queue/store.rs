//! Durable action log
//!
//! Append-only log backing the offline queue, framed the same way as a
//! write-ahead log: every append is fsynced before the enqueue is
//! acknowledged, so an acknowledged action survives process restart.
//!
//! Record layout:
//! - Payload length (u32 LE)
//! - Record type (u8): ENQUEUE / COMPLETE / CANCEL
//! - Payload (JSON)
//! - Checksum (u32 LE, CRC32 over type + payload)
//!
//! Boot replay folds completions and cancellations into the enqueue
//! stream to reconstruct the pending FIFO. A checksum mismatch on a
//! fully framed record is corruption; an incomplete trailing record is
//! a torn tail and ends replay cleanly. Whenever replay observed
//! removals or a torn tail, the log is compacted down to the pending
//! records before the store accepts new appends.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use uuid::Uuid;

use crate::observability::{Event, Logger};

use super::action::QueuedAction;
use super::errors::{QueueError, QueueResult};

/// Store record types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum StoreRecordType {
    /// Action appended to the queue
    Enqueue = 0,
    /// Action confirmed by its executor
    Complete = 1,
    /// Action removed by the caller
    Cancel = 2,
}

impl StoreRecordType {
    /// Convert from u8, returns None for invalid values
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(StoreRecordType::Enqueue),
            1 => Some(StoreRecordType::Complete),
            2 => Some(StoreRecordType::Cancel),
            _ => None,
        }
    }
}

/// Computes the checksum stored with each record
fn compute_checksum(record_type: u8, payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[record_type]);
    hasher.update(payload);
    hasher.finalize()
}

/// Builds one framed record
fn encode_record(record_type: StoreRecordType, payload: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(4 + 1 + payload.len() + 4);
    record.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    record.push(record_type as u8);
    record.extend_from_slice(payload);
    record.extend_from_slice(&compute_checksum(record_type as u8, payload).to_le_bytes());
    record
}

/// Durable queue store with fsync enforcement
///
/// Opened with exclusive append access; one store per session.
#[derive(Debug)]
pub struct QueueStore {
    log_path: PathBuf,
    file: File,
}

impl QueueStore {
    /// Opens the store under `<data_dir>/queue/actions.log` and replays
    /// it, returning the pending actions in enqueue order
    ///
    /// Creates the directory and an empty log if none exist.
    pub fn open(data_dir: &Path) -> QueueResult<(Self, Vec<QueuedAction>)> {
        let queue_dir = data_dir.join("queue");
        let log_path = queue_dir.join("actions.log");

        if !queue_dir.exists() {
            fs::create_dir_all(&queue_dir).map_err(QueueError::StoreRead)?;
        }

        let (pending, needs_compact) = Self::replay(&log_path)?;

        if needs_compact {
            Self::rewrite(&log_path, &pending).map_err(QueueError::StoreAppend)?;
            let count = pending.len().to_string();
            Logger::event(Event::StoreCompacted, &[("pending", &count)]);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(QueueError::StoreRead)?;

        let count = pending.len().to_string();
        Logger::event(Event::StoreReplayed, &[("pending", &count)]);

        Ok((Self { log_path, file }, pending))
    }

    /// Returns the path to the log file
    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Reconstructs the pending FIFO from the log
    ///
    /// Returns the pending actions and whether the log needs compaction
    /// (removals folded in, or a torn tail discarded).
    fn replay(log_path: &Path) -> QueueResult<(Vec<QueuedAction>, bool)> {
        let bytes = match fs::read(log_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), false)),
            Err(e) => return Err(QueueError::StoreRead(e)),
        };

        let mut pending: Vec<QueuedAction> = Vec::new();
        let mut saw_removal = false;
        let mut torn_tail = false;
        let mut offset: usize = 0;

        while offset < bytes.len() {
            let record_start = offset;

            if bytes.len() - offset < 4 {
                torn_tail = true;
                break;
            }
            let payload_len =
                u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
                    as usize;
            offset += 4;

            if bytes.len() - offset < 1 + payload_len + 4 {
                torn_tail = true;
                break;
            }

            let type_byte = bytes[offset];
            offset += 1;
            let payload = &bytes[offset..offset + payload_len];
            offset += payload_len;
            let stored_crc = u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]);
            offset += 4;

            if compute_checksum(type_byte, payload) != stored_crc {
                Logger::event(Event::StoreCorruption, &[]);
                return Err(QueueError::Corruption {
                    offset: record_start as u64,
                });
            }

            let record_type = StoreRecordType::from_u8(type_byte).ok_or_else(|| {
                QueueError::MalformedRecord {
                    offset: record_start as u64,
                    reason: format!("unknown record type {}", type_byte),
                }
            })?;

            match record_type {
                StoreRecordType::Enqueue => {
                    let action: QueuedAction = serde_json::from_slice(payload).map_err(|e| {
                        QueueError::MalformedRecord {
                            offset: record_start as u64,
                            reason: e.to_string(),
                        }
                    })?;
                    pending.push(action);
                }
                StoreRecordType::Complete | StoreRecordType::Cancel => {
                    let id: Uuid = serde_json::from_slice(payload).map_err(|e| {
                        QueueError::MalformedRecord {
                            offset: record_start as u64,
                            reason: e.to_string(),
                        }
                    })?;
                    pending.retain(|action| action.id != id);
                    saw_removal = true;
                }
            }
        }

        if torn_tail {
            Logger::event(Event::StoreTornTail, &[]);
        }

        Ok((pending, saw_removal || torn_tail))
    }

    /// Rewrites the log to contain only the pending enqueue records
    ///
    /// Writes a temp file, fsyncs it, then renames over the log.
    fn rewrite(log_path: &Path, pending: &[QueuedAction]) -> io::Result<()> {
        let tmp_path = log_path.with_extension("log.tmp");

        {
            let mut tmp = File::create(&tmp_path)?;
            for action in pending {
                let payload = serde_json::to_vec(action)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                tmp.write_all(&encode_record(StoreRecordType::Enqueue, &payload))?;
            }
            tmp.flush()?;
            tmp.sync_all()?;
        }

        fs::rename(&tmp_path, log_path)
    }

    /// Appends an enqueue record with fsync enforcement
    ///
    /// Only after fsync may the enqueue be acknowledged.
    pub fn append_enqueue(&mut self, action: &QueuedAction) -> QueueResult<()> {
        let payload = serde_json::to_vec(action)
            .map_err(|e| QueueError::StoreAppend(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        self.append_record(StoreRecordType::Enqueue, &payload)
    }

    /// Appends a completion record with fsync enforcement
    pub fn append_complete(&mut self, id: Uuid) -> QueueResult<()> {
        let payload = serde_json::to_vec(&id)
            .map_err(|e| QueueError::StoreAppend(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        self.append_record(StoreRecordType::Complete, &payload)
    }

    /// Appends a cancellation record with fsync enforcement
    pub fn append_cancel(&mut self, id: Uuid) -> QueueResult<()> {
        let payload = serde_json::to_vec(&id)
            .map_err(|e| QueueError::StoreAppend(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        self.append_record(StoreRecordType::Cancel, &payload)
    }

    fn append_record(&mut self, record_type: StoreRecordType, payload: &[u8]) -> QueueResult<()> {
        let record = encode_record(record_type, payload);

        self.file
            .write_all(&record)
            .map_err(QueueError::StoreAppend)?;
        self.file.flush().map_err(QueueError::StoreAppend)?;
        self.file.sync_all().map_err(QueueError::StoreAppend)?;

        Ok(())
    }
}
