mod role;
mod token;

pub use role::{Admin, AnyRole, Role, Voter};
pub use token::{AuthRejection, AuthToken, AUTH_TOKEN_COOKIE};
