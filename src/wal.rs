use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Encode a single event to [len][bincode][crc32] format.
fn encode_event(event: &Event) -> io::Result<Vec<u8>> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut frame = Vec::with_capacity(payload.len() + 8);
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    Ok(frame)
}

/// What a replay recovered from disk.
#[derive(Debug)]
pub struct Replayed {
    pub events: Vec<Event>,
    /// Byte offset just past the last intact entry.
    pub valid_len: u64,
}

/// Append-only request log.
///
/// Format per entry: `[u32: len][bincode: Event][u32: crc32]`
/// - `len` is the byte length of the bincode payload (not including the CRC).
/// - A torn or corrupt tail is cut off at open, so new entries always follow
///   the last intact one.
///
/// Entries are never rewritten. A batch that fails to reach disk is rolled
/// back to the last synced offset.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    synced_len: u64,
    pending_len: u64,
    pending_entries: u64,
    appends: u64,
}

impl Wal {
    /// Open (or create) the log at `path`, cutting the file back to `valid_len`.
    /// Pass the offset returned by [`Wal::replay`] for the same file.
    fn open(path: &Path, valid_len: u64) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let on_disk = file.metadata()?.len();
        if on_disk > valid_len {
            tracing::warn!(
                "request log {}: truncating {} trailing bytes",
                path.display(),
                on_disk - valid_len
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            synced_len: valid_len.min(on_disk),
            pending_len: 0,
            pending_entries: 0,
            appends: 0,
        })
    }

    /// Replay `path` and open it for appending after the last intact entry.
    pub fn recover(path: &Path) -> io::Result<(Self, Vec<Event>)> {
        let Replayed { events, valid_len } = Self::replay(path)?;
        let wal = Self::open(path, valid_len)?;
        Ok((wal, events))
    }

    /// Append a single event and fsync. Used by tests only;
    /// production code uses `append_buffered` + `flush_sync` for group commit.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Append a single event to the BufWriter without flushing or syncing.
    /// Call `flush_sync()` after the batch to durably commit all buffered events.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        let frame = encode_event(event)?;
        self.pending_len += frame.len() as u64;
        self.pending_entries += 1;
        self.writer.write_all(&frame)
    }

    /// Flush the BufWriter and fsync the underlying file.
    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.synced_len += self.pending_len;
        self.appends += self.pending_entries;
        self.pending_len = 0;
        self.pending_entries = 0;
        Ok(())
    }

    /// Drop everything appended since the last successful `flush_sync`,
    /// both from the buffer and from the file.
    pub fn rollback(&mut self) -> io::Result<()> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        file.set_len(self.synced_len)?;
        file.sync_all()?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        let _ = stale.into_parts();
        self.pending_len = 0;
        self.pending_entries = 0;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Events durably appended through this handle since it was opened.
    pub fn appends(&self) -> u64 {
        self.appends
    }

    /// Byte length of the log up to the last synced entry.
    pub fn synced_len(&self) -> u64 {
        self.synced_len
    }

    /// Replay the log from disk, returning all valid events and the offset
    /// where they end. Truncated/corrupt trailing entries are discarded.
    pub fn replay(path: &Path) -> io::Result<Replayed> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Replayed {
                    events: Vec::new(),
                    valid_len: 0,
                });
            }
            Err(e) => return Err(e),
        };
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        let mut valid_len = 0u64;

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            if valid_len + 8 + len as u64 > file_len {
                break; // truncated
            }

            let mut payload = vec![0u8; len];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
                Err(e) => return Err(e),
            }

            let mut crc_buf = [0u8; 4];
            match reader.read_exact(&mut crc_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
                Err(e) => return Err(e),
            }
            let stored_crc = u32::from_le_bytes(crc_buf);
            if stored_crc != crc32fast::hash(&payload) {
                tracing::warn!("request log {}: checksum mismatch, dropping tail", path.display());
                break;
            }

            match bincode::deserialize::<Event>(&payload) {
                Ok(event) => events.push(event),
                Err(_) => break, // corrupt payload
            }
            valid_len += 8 + len as u64;
        }

        Ok(Replayed { events, valid_len })
    }
}
