//! Journal abstraction and the in-memory backend.

use crate::StorageError;
use cipher_grant_types::Timestamp;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// One appended event with its position in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry<E> {
    /// Position in the journal, starting at 0 and gap-free.
    pub seq: u64,
    /// When the entry was appended.
    pub recorded_at: Timestamp,
    /// The event itself
    pub event: E,
}

/// Append-only event log.
///
/// `append` either durably records the event and returns its sequence number,
/// or fails and records nothing. Appends are serialized by the backend.
pub trait Journal<E>: Send + Sync
where
    E: Serialize + DeserializeOwned,
{
    /// Append one event.
    fn append(&self, event: &E) -> Result<u64, StorageError>;

    /// All entries in append order.
    fn entries(&self) -> Result<Vec<JournalEntry<E>>, StorageError>;

    /// Number of entries appended so far.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Journal kept in memory. Events are stored as JSON so that anything
/// appended here would also survive the file backend.
pub struct MemoryJournal {
    entries: Mutex<Vec<JournalEntry<serde_json::Value>>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl Default for MemoryJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Journal<E> for MemoryJournal
where
    E: Serialize + DeserializeOwned,
{
    fn append(&self, event: &E) -> Result<u64, StorageError> {
        let value = serde_json::to_value(event)?;
        let mut entries = self.entries.lock();
        let seq = entries.len() as u64;
        entries.push(JournalEntry {
            seq,
            recorded_at: Timestamp::now(),
            event: value,
        });
        Ok(seq)
    }

    fn entries(&self) -> Result<Vec<JournalEntry<E>>, StorageError> {
        let entries = self.entries.lock();
        entries
            .iter()
            .enumerate()
            .map(|(line, entry)| {
                let event = serde_json::from_value(entry.event.clone()).map_err(|e| {
                    StorageError::CorruptEntry {
                        line: line + 1,
                        reason: e.to_string(),
                    }
                })?;
                Ok(JournalEntry {
                    seq: entry.seq,
                    recorded_at: entry.recorded_at,
                    event,
                })
            })
            .collect()
    }

    fn len(&self) -> u64 {
        self.entries.lock().len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Event {
        Joined(String),
        Voted { who: String, yes: bool },
    }

    #[test]
    fn test_append_assigns_sequence() {
        let journal = MemoryJournal::new();
        assert!(Journal::<Event>::is_empty(&journal));

        let a = journal.append(&Event::Joined("a".into())).unwrap();
        let b = journal
            .append(&Event::Voted { who: "a".into(), yes: true })
            .unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(Journal::<Event>::len(&journal), 2);
    }

    #[test]
    fn test_entries_in_append_order() {
        let journal = MemoryJournal::new();
        journal.append(&Event::Joined("a".into())).unwrap();
        journal
            .append(&Event::Voted { who: "a".into(), yes: false })
            .unwrap();

        let entries: Vec<JournalEntry<Event>> = journal.entries().unwrap();
        assert_eq!(entries[0].event, Event::Joined("a".into()));
        assert_eq!(entries[1].event, Event::Voted { who: "a".into(), yes: false });
        assert_eq!(entries[1].seq, 1);
    }

    #[test]
    fn test_entries_of_wrong_type_are_corrupt() {
        let journal = MemoryJournal::new();
        journal.append(&"just a string".to_string()).unwrap();
        let result: Result<Vec<JournalEntry<Event>>, _> = journal.entries();
        assert!(matches!(result, Err(StorageError::CorruptEntry { line: 1, .. })));
    }
}
