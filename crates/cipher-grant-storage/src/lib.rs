//! Cipher Grant Storage - Append-only journal backing the grant ledger.
//!
//! Every accepted lifecycle event is appended here before it is applied in
//! memory; replaying the journal rebuilds the ledger. Two backends:
//! - `MemoryJournal` for tests and ephemeral runs
//! - `FileJournal`, one JSON document per line

pub mod journal;
pub mod file_journal;
pub mod error;

pub use journal::{Journal, JournalEntry, MemoryJournal};
pub use file_journal::FileJournal;
pub use error::StorageError;
