//! Append-only log store backed by a single file
//!
//! File format:
//! ```text
//! [HEADER: 64 bytes]
//!   - magic: 8 bytes ("CTREE_KV")
//!   - version: 4 bytes (u32 LE)
//!   - reserved: 52 bytes
//!
//! [FRAMES: variable, one per write batch]
//!   - payload_len: 4 bytes (u32 LE)
//!   - checksum: 32 bytes (BLAKE3 of payload)
//!   - payload: repeated (key_len u32 LE, key, value_len u32 LE, value)
//! ```
//!
//! A frame is the unit of atomicity. On open, frames are replayed in order
//! and the first torn or checksum-failing frame ends the log; everything
//! from there on is truncated. A crash mid-write therefore loses exactly
//! the batch that was being written.

use super::{KvStore, WriteBatch, WriteOptions};
use crate::{Error, Result, MAGIC, VERSION};
use bytes::Bytes;
use memmap2::Mmap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const HEADER_SIZE: u64 = 64;
const FRAME_HEADER_SIZE: usize = 4 + 32;

/// Name of the log file inside the store directory
pub const LOG_FILE_NAME: &str = "nodes.log";

/// Location of a value inside the log
#[derive(Clone, Copy, Debug)]
struct IndexEntry {
    offset: u64,
    len: u32,
}

type Index = BTreeMap<Vec<u8>, IndexEntry>;

/// A key-value store backed by one append-only file
pub struct FileStore {
    /// Path to the log file
    path: PathBuf,
    /// The file handle
    file: RwLock<File>,
    /// Key -> value location, ordered by key bytes
    index: RwLock<Index>,
    /// Current append position
    write_offset: RwLock<u64>,
}

impl FileStore {
    /// Open the store in `dir`, creating the directory and log if needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(LOG_FILE_NAME);
        if path.exists() {
            Self::open_existing(path)
        } else {
            Self::create(path)
        }
    }

    fn create(path: PathBuf) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;

        let mut header = [0u8; HEADER_SIZE as usize];
        header[0..8].copy_from_slice(MAGIC);
        header[8..12].copy_from_slice(&VERSION.to_le_bytes());
        file.write_all(&header)?;
        file.sync_all()?;

        tracing::debug!(path = %path.display(), "created node log");

        Ok(FileStore {
            path,
            file: RwLock::new(file),
            index: RwLock::new(Index::new()),
            write_offset: RwLock::new(HEADER_SIZE),
        })
    }

    fn open_existing(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let file_len = file.metadata()?.len();
        if file_len < HEADER_SIZE {
            return Err(Error::InvalidFile("Truncated header".into()));
        }

        // SAFETY: the map is only read during replay and dropped before any
        // write goes through `file`.
        let mmap = unsafe { Mmap::map(&file)? };

        if &mmap[0..8] != MAGIC {
            return Err(Error::InvalidFile("Invalid magic bytes".into()));
        }
        let version = read_u32(&mmap, 8)
            .ok_or_else(|| Error::InvalidFile("Truncated header".into()))?;
        if version != VERSION {
            return Err(Error::VersionMismatch {
                expected: VERSION,
                found: version,
            });
        }

        let (index, frames, end) = replay(&mmap);
        drop(mmap);

        if end < file_len {
            tracing::warn!(
                path = %path.display(),
                valid = end,
                discarded = file_len - end,
                "discarding torn tail of node log"
            );
            file.set_len(end)?;
            file.sync_all()?;
        }

        tracing::debug!(
            path = %path.display(),
            frames,
            keys = index.len(),
            "opened node log"
        );

        Ok(FileStore {
            path,
            file: RwLock::new(file),
            index: RwLock::new(index),
            write_offset: RwLock::new(end),
        })
    }

    /// Get the log file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes of log written so far, header included
    pub fn log_size(&self) -> u64 {
        *self.write_offset.read()
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        let entry = {
            let index = self.index.read();
            index.get(key).copied()
        };

        let Some(entry) = entry else {
            return Ok(None);
        };

        let mut data = vec![0u8; entry.len as usize];
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(entry.offset))?;
        file.read_exact(&mut data)?;

        Ok(Some(Bytes::from(data)))
    }

    fn write_batch(&self, batch: WriteBatch, opts: &WriteOptions) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut payload = Vec::with_capacity(batch.size_bytes() + batch.len() * 8);
        let mut placed = Vec::with_capacity(batch.len());
        for (key, value) in batch.into_entries() {
            payload.extend_from_slice(&encode_len(key.len())?);
            payload.extend_from_slice(&key);
            payload.extend_from_slice(&encode_len(value.len())?);
            let relative = payload.len() as u64;
            payload.extend_from_slice(&value);
            placed.push((key, relative, value.len() as u32));
        }

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&encode_len(payload.len())?);
        frame.extend_from_slice(blake3::hash(&payload).as_bytes());
        frame.extend_from_slice(&payload);

        let mut write_offset = self.write_offset.write();
        let offset = *write_offset;
        {
            let mut file = self.file.write();
            let written = file
                .seek(SeekFrom::Start(offset))
                .and_then(|_| file.write_all(&frame))
                .and_then(|_| if opts.sync { file.sync_data() } else { Ok(()) });
            if let Err(err) = written {
                // Drop whatever part of the frame reached the file.
                if let Err(truncate_err) = file.set_len(offset) {
                    tracing::warn!(
                        path = %self.path.display(),
                        offset,
                        error = %truncate_err,
                        "could not roll back partial frame; it will be discarded on next open"
                    );
                }
                return Err(err.into());
            }
        }
        *write_offset = offset + frame.len() as u64;

        let payload_start = offset + FRAME_HEADER_SIZE as u64;
        let mut index = self.index.write();
        for (key, relative, len) in placed {
            index.insert(
                key,
                IndexEntry {
                    offset: payload_start + relative,
                    len,
                },
            );
        }

        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.file.write().sync_all()?;
        Ok(())
    }

    fn len(&self) -> usize {
        self.index.read().len()
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = KvStore::sync(&*self);
    }
}

fn encode_len(len: usize) -> Result<[u8; 4]> {
    u32::try_from(len)
        .map(u32::to_le_bytes)
        .map_err(|_| Error::Serialization(format!("Record of {} bytes exceeds frame limit", len)))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

/// Replay every intact frame. Returns the index, the frame count and the
/// offset just past the last intact frame.
fn replay(data: &[u8]) -> (Index, usize, u64) {
    let mut index = Index::new();
    let mut offset = HEADER_SIZE as usize;
    let mut frames = 0;

    while let Some(len) = read_u32(data, offset) {
        let start = offset + FRAME_HEADER_SIZE;
        let Some(end) = start.checked_add(len as usize) else {
            break;
        };
        if end > data.len() {
            break;
        }

        let checksum = &data[offset + 4..start];
        let payload = &data[start..end];
        if blake3::hash(payload).as_bytes() != checksum {
            break;
        }

        let Some(entries) = decode_payload(payload, start as u64) else {
            break;
        };
        index.extend(entries);

        frames += 1;
        offset = end;
    }

    (index, frames, offset as u64)
}

fn decode_payload(payload: &[u8], base: u64) -> Option<Vec<(Vec<u8>, IndexEntry)>> {
    let mut entries = Vec::new();
    let mut at = 0usize;

    while at < payload.len() {
        let key_len = read_u32(payload, at)? as usize;
        at += 4;
        let key = payload.get(at..at.checked_add(key_len)?)?.to_vec();
        at += key_len;

        let value_len = read_u32(payload, at)?;
        at += 4;
        let value_end = at.checked_add(value_len as usize)?;
        if value_end > payload.len() {
            return None;
        }

        entries.push((
            key,
            IndexEntry {
                offset: base + at as u64,
                len: value_len,
            },
        ));
        at = value_end;
    }

    Some(entries)
}
