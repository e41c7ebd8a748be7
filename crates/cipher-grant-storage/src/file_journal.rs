//! File-backed journal: one JSON entry per line, appended in place.

use crate::journal::{Journal, JournalEntry};
use crate::StorageError;
use cipher_grant_types::Timestamp;
use fs2::FileExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::path::{Component, Path, PathBuf};

struct FileState {
    file: File,
    next_seq: u64,
    byte_len: u64,
}

/// Journal persisted as JSON lines.
///
/// A torn final line (left behind by a crash mid-append) is truncated on open;
/// any other unreadable line is reported as corruption.
///
/// An exclusive advisory lock on the file is held for the lifetime of the
/// journal, so a second process cannot append under the same sequence numbers.
pub struct FileJournal<E> {
    path: PathBuf,
    sync: bool,
    state: Mutex<FileState>,
    _event: PhantomData<fn(E) -> E>,
}

impl<E> FileJournal<E>
where
    E: Serialize + DeserializeOwned,
{
    /// Open or create the journal at `path`. With `sync`, every append is
    /// flushed to disk before it is acknowledged.
    pub fn open(path: &Path, sync: bool) -> Result<Self, StorageError> {
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(StorageError::InvalidPath(format!(
                "{}: directory traversal detected",
                path.display()
            )));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        file.try_lock_exclusive().map_err(|e| {
            tracing::warn!("Journal {:?} is already open elsewhere: {}", path, e);
            StorageError::Locked(path.display().to_string())
        })?;

        let mut content = String::new();
        file.read_to_string(&mut content)?;

        let complete_len = match content.rfind('\n') {
            Some(idx) => idx + 1,
            None => 0,
        };
        if complete_len < content.len() {
            tracing::warn!(
                "Truncating torn journal tail of {} bytes in {:?}",
                content.len() - complete_len,
                path
            );
        }

        let next_seq = validate_lines::<serde_json::Value>(&content[..complete_len])?.len() as u64;
        file.set_len(complete_len as u64)?;

        tracing::debug!("Opened journal {:?} with {} entries", path, next_seq);

        Ok(Self {
            path: path.to_path_buf(),
            sync,
            state: Mutex::new(FileState {
                file,
                next_seq,
                byte_len: complete_len as u64,
            }),
            _event: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_line(file: &mut File, bytes: &[u8], sync: bool) -> std::io::Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    if sync {
        file.sync_data()?;
    }
    Ok(())
}

/// Parse every line, checking the sequence numbers run 0, 1, 2, ...
fn validate_lines<T: DeserializeOwned>(content: &str) -> Result<Vec<JournalEntry<T>>, StorageError> {
    let mut entries = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: JournalEntry<T> =
            serde_json::from_str(line).map_err(|e| StorageError::CorruptEntry {
                line: idx + 1,
                reason: e.to_string(),
            })?;
        let expected = entries.len() as u64;
        if entry.seq != expected {
            return Err(StorageError::SequenceGap {
                line: idx + 1,
                expected,
                actual: entry.seq,
            });
        }
        entries.push(entry);
    }
    Ok(entries)
}

impl<E> Journal<E> for FileJournal<E>
where
    E: Serialize + DeserializeOwned,
{
    fn append(&self, event: &E) -> Result<u64, StorageError> {
        let mut state = self.state.lock();
        let seq = state.next_seq;

        let entry = JournalEntry {
            seq,
            recorded_at: Timestamp::now(),
            event,
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        if let Err(e) = write_line(&mut state.file, line.as_bytes(), self.sync) {
            // Drop whatever part of the line reached the file.
            let restore = state.byte_len;
            if let Err(trunc) = state.file.set_len(restore) {
                tracing::error!("Failed to roll back partial journal append: {}", trunc);
            }
            return Err(StorageError::Io(e.to_string()));
        }

        state.byte_len += line.len() as u64;
        state.next_seq += 1;
        Ok(seq)
    }

    fn entries(&self) -> Result<Vec<JournalEntry<E>>, StorageError> {
        let _state = self.state.lock();
        let content = fs::read_to_string(&self.path)?;
        validate_lines(&content)
    }

    fn len(&self) -> u64 {
        self.state.lock().next_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Event {
        Submitted { id: u64 },
        Finalized { id: u64, funded: bool },
    }

    #[test]
    fn test_append_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.jsonl");

        {
            let journal = FileJournal::<Event>::open(&path, true).unwrap();
            journal.append(&Event::Submitted { id: 1 }).unwrap();
            journal.append(&Event::Finalized { id: 1, funded: true }).unwrap();
        }

        let journal = FileJournal::<Event>::open(&path, true).unwrap();
        assert_eq!(journal.len(), 2);
        let entries = journal.entries().unwrap();
        assert_eq!(entries[1].event, Event::Finalized { id: 1, funded: true });

        // Appends continue the sequence.
        assert_eq!(journal.append(&Event::Submitted { id: 2 }).unwrap(), 2);
    }

    #[test]
    fn test_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("ledger.jsonl");
        let journal = FileJournal::<Event>::open(&path, false).unwrap();
        assert!(journal.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn test_torn_tail_is_truncated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.jsonl");
        {
            let journal = FileJournal::<Event>::open(&path, false).unwrap();
            journal.append(&Event::Submitted { id: 1 }).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"seq\":1,\"recorded_at\":").unwrap();
        drop(file);

        let journal = FileJournal::<Event>::open(&path, false).unwrap();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal.append(&Event::Submitted { id: 2 }).unwrap(), 1);
        assert_eq!(journal.entries().unwrap().len(), 2);
    }

    #[test]
    fn test_corrupt_line_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.jsonl");
        fs::write(&path, "not json\n").unwrap();

        let result = FileJournal::<Event>::open(&path, false);
        assert!(matches!(result, Err(StorageError::CorruptEntry { line: 1, .. })));
    }

    #[test]
    fn test_sequence_gap_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.jsonl");
        fs::write(
            &path,
            "{\"seq\":0,\"recorded_at\":1,\"event\":{\"Submitted\":{\"id\":1}}}\n\
             {\"seq\":5,\"recorded_at\":2,\"event\":{\"Submitted\":{\"id\":2}}}\n",
        )
        .unwrap();

        let result = FileJournal::<Event>::open(&path, false);
        assert!(matches!(
            result,
            Err(StorageError::SequenceGap { line: 2, expected: 1, actual: 5 })
        ));
    }

    #[test]
    fn test_second_open_is_refused_while_held() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.jsonl");

        let journal = FileJournal::<Event>::open(&path, false).unwrap();
        journal.append(&Event::Submitted { id: 1 }).unwrap();
        assert!(matches!(
            FileJournal::<Event>::open(&path, false),
            Err(StorageError::Locked(_))
        ));

        // The refused open must not have disturbed the file.
        journal.append(&Event::Submitted { id: 2 }).unwrap();
        drop(journal);

        let reopened = FileJournal::<Event>::open(&path, false).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.append(&Event::Finalized { id: 1, funded: true }).unwrap(), 2);
    }

    #[test]
    fn test_rejects_parent_dir_components() {
        let result = FileJournal::<Event>::open(Path::new("data/../../etc/ledger.jsonl"), false);
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));
    }
}
