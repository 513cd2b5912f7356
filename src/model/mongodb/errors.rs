//! For some reason, the mongodb crate doesn't provide error code constants.
//! This module fills in the gaps.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR};

pub const DUPLICATE_KEY: i32 = 11000;

/// Return true if the given error is a duplicate key violation, whether it was
/// reported as a write error or (inside a transaction) as a command error.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(ref e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Return true if the server asked for the whole transaction to be re-run.
pub fn is_transient_transaction_error(err: &DbError) -> bool {
    err.contains_label(TRANSIENT_TRANSACTION_ERROR)
}
