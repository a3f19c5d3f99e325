//! Durable record of already-emitted subtask identifiers.

mod error;
mod store;

pub use error::LedgerError;
pub use store::{Ledger, LEDGER_FILE_NAME};
