use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use trellis_types::ClosureEdge;

use crate::error::{StoreError, StoreResult};
use crate::record::NodeRow;

/// One committed insert transaction.
///
/// On-disk format:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized JournalRecord)]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalRecord {
    Nodes(Vec<NodeRow>),
    Closures(Vec<ClosureEdge>),
}

/// Flush/sync strategy for the journal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// `fsync` after every transaction.
    EveryWrite,
    /// Rely on OS page-cache buffering.
    #[default]
    OsDefault,
}

#[derive(Clone, Debug, Default)]
pub struct JournalConfig {
    pub sync_mode: SyncMode,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

struct JournalWriter {
    file: File,
    /// End of the last fully written frame.
    offset: u64,
    /// Set when a failed append could not be rolled back.
    broken: bool,
}

impl JournalWriter {
    /// Write one whole frame at `offset`, discarding anything past it first.
    fn write_frame(&mut self, frame: &[u8], sync: bool) -> io::Result<()> {
        if self.file.metadata()?.len() != self.offset {
            warn!(offset = self.offset, "discarding bytes past the last complete frame");
            self.file.set_len(self.offset)?;
        }
        self.file.write_all(frame)?;
        if sync {
            self.file.sync_all()?;
        }
        Ok(())
    }
}

/// Append-only transaction journal backing the in-memory store.
///
/// Each insert transaction is appended as one framed record before it is
/// applied in memory, so a record is either entirely replayed or entirely
/// absent after a crash.
pub struct Journal {
    path: PathBuf,
    writer: Mutex<JournalWriter>,
    config: JournalConfig,
}

impl Journal {
    /// Open (or create) the journal at `path` and read back every committed
    /// record.
    ///
    /// Records failing the CRC check are skipped. A torn tail (incomplete
    /// final record) is cut off so later appends start on a clean boundary.
    pub fn open(path: &Path, config: JournalConfig) -> StoreResult<(Self, Vec<JournalRecord>)> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let file_len = file.metadata()?.len();

        let (records, valid_len) = Self::read_records(path, file_len)?;
        if valid_len < file_len {
            warn!(
                path = %path.display(),
                valid_len,
                file_len,
                "dropping torn journal tail"
            );
            file.set_len(valid_len)?;
        }

        debug!(path = %path.display(), recovered = records.len(), "journal opened");
        Ok((
            Self {
                path: path.to_path_buf(),
                writer: Mutex::new(JournalWriter {
                    file,
                    offset: valid_len,
                    broken: false,
                }),
                config,
            },
            records,
        ))
    }

    /// Append one record. Returns its byte offset.
    ///
    /// A failed append leaves the file ending at the previous frame, so the
    /// same record can be appended again. If that cut itself fails, every
    /// later append is refused.
    pub fn append(&self, record: &JournalRecord) -> StoreResult<u64> {
        let payload =
            bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .map_err(|_| StoreError::Serialization("journal record exceeds 4 GiB".into()))?;
        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);

        let mut w = self.writer.lock().expect("journal mutex poisoned");
        if w.broken {
            return Err(StoreError::Backend(format!(
                "journal {} holds an unrecoverable partial write",
                self.path.display()
            )));
        }
        let record_offset = w.offset;

        if let Err(e) = w.write_frame(&frame, self.config.sync_mode == SyncMode::EveryWrite) {
            if let Err(cut) = w.file.set_len(record_offset) {
                warn!(offset = record_offset, error = %cut, "journal rollback failed");
                w.broken = true;
            }
            return Err(e.into());
        }
        w.offset += frame.len() as u64;

        debug!(offset = record_offset, len = payload.len(), "journal append");
        Ok(record_offset)
    }

    /// Current write offset.
    pub fn offset(&self) -> u64 {
        self.writer.lock().expect("journal mutex poisoned").offset
    }

    /// Path to the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read records front to back. Returns the records and the length of the
    /// prefix made of complete frames.
    fn read_records(path: &Path, file_len: u64) -> StoreResult<(Vec<JournalRecord>, u64)> {
        let mut file = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        let mut offset: u64 = 0;

        while offset + HEADER_SIZE as u64 <= file_len {
            let mut header = [0u8; HEADER_SIZE];
            match file.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            if length == 0 || offset + HEADER_SIZE as u64 + length as u64 > file_len {
                warn!(offset, length, file_len, "invalid journal record length; stopping replay");
                break;
            }

            let mut payload = vec![0u8; length as usize];
            match file.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn!(offset, "truncated journal record; stopping replay");
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let next = offset + HEADER_SIZE as u64 + length as u64;
            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                warn!(
                    offset,
                    expected = expected_crc,
                    actual = actual_crc,
                    "CRC mismatch; skipping journal record"
                );
                offset = next;
                continue;
            }

            match bincode::deserialize::<JournalRecord>(&payload) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(offset, error = %e, "undecodable journal record; skipping");
                }
            }
            offset = next;
        }

        Ok((records, offset))
    }
}
