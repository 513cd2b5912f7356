use crate::model::common::rights::Rights;

/// A restriction on which rights a request guard accepts.
pub trait Role: Send + Sync + 'static {
    /// The rights required, or `None` for any authenticated user.
    const RIGHTS: Option<Rights>;
}

/// Only voters.
pub struct Voter;

/// Only admins, backed by a live admin account.
pub struct Admin;

/// Anyone holding a valid token.
pub struct AnyRole;

impl Role for Voter {
    const RIGHTS: Option<Rights> = Some(Rights::Voter);
}

impl Role for Admin {
    const RIGHTS: Option<Rights> = Some(Rights::Admin);
}

impl Role for AnyRole {
    const RIGHTS: Option<Rights> = None;
}
