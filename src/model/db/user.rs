use std::collections::HashSet;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{common::rights::Rights, mongodb::Id};

/// Core user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub name: String,
    /// Unique across all users.
    pub email: String,
    pub role: Rights,
    /// Elections this user has voted in. Only ever appended to by vote
    /// admission, and each election appears at most once.
    #[serde(default)]
    pub voted_elections: HashSet<Id>,
}

impl UserCore {
    /// Create a user who has not voted in anything yet.
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Rights) -> Self {
        Self {
            name: name.into(),
            email: email.into().trim().to_lowercase(),
            role,
            voted_elections: HashSet::new(),
        }
    }

    pub fn has_voted_in(&self, election_id: Id) -> bool {
        self.voted_elections.contains(&election_id)
    }
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl UserCore {
        pub fn voter_example() -> Self {
            Self::new("Ada Voter", "ada@example.com", Rights::Voter)
        }

        pub fn voter_example2() -> Self {
            Self::new("Brian Voter", "brian@example.com", Rights::Voter)
        }

        pub fn admin_example() -> Self {
            Self::new("Returning Officer", "officer@example.com", Rights::Admin)
        }

        /// A distinct voter per index, for tests that need a crowd.
        pub fn numbered_voter(n: usize) -> Self {
            Self::new(
                format!("Voter {n}"),
                format!("voter{n}@example.com"),
                Rights::Voter,
            )
        }
    }
}
