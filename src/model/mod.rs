//! Data types, split by where they appear.
//!
//! - [`db`] types are stored in the database.
//! - [`api`] types are sent and received over HTTP.
//! - [`common`] types are shared between the two.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
