//! Types shared between the DB and API representations.

pub mod election;
pub mod rights;
