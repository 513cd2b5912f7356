use mongodb::{
    bson::{doc, DateTime as BsonDateTime, Document},
    error::{Error as DbError, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument, SessionOptions},
    results::InsertOneResult,
    Client, ClientSession, Database,
};
use rocket::{
    futures::TryStreamExt,
    tokio::time::{sleep, Duration, Instant},
};

use crate::error::{Error, Result};
use crate::model::{
    db::{
        candidate::{Candidate, CandidateEdit, NewCandidate},
        election::{Election, ElectionEdit, NewElection},
        participation::Participation,
        user::{NewUser, User},
    },
    mongodb::{
        ensure_indexes_exist, is_duplicate_key_error, is_transient_transaction_error, Coll, Id,
    },
};
use crate::voting::Vote;

use super::{in_election_order, CandidateRemoval, Commit, Store};

/// How long a vote transaction keeps being re-run after write conflicts
/// before the failure is reported to the caller.
const COMMIT_RETRY_BUDGET: Duration = Duration::from_secs(10);

/// Longest pause between two runs of a conflicting vote transaction.
const MAX_COMMIT_BACKOFF: Duration = Duration::from_millis(50);

/// How many times a commit with an unknown outcome is re-sent.
const MAX_COMMIT_RETRIES: u32 = 3;

/// The production storage backend.
///
/// Multi-document writes run in transactions, so the server must be a replica
/// set or sharded cluster.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connect to the database and make sure its indexes exist.
    pub async fn connect(uri: &str, db_name: &str) -> std::result::Result<Self, DbError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        Ok(Self { client, db })
    }

    /// The database this store lives in.
    #[cfg(test)]
    pub(crate) fn database(&self) -> Database {
        self.db.clone()
    }

    fn users(&self) -> Coll<User> {
        Coll::from_db(&self.db)
    }

    fn elections(&self) -> Coll<Election> {
        Coll::from_db(&self.db)
    }

    fn candidates(&self) -> Coll<Candidate> {
        Coll::from_db(&self.db)
    }

    fn participations(&self) -> Coll<Participation> {
        Coll::from_db(&self.db)
    }

    async fn transaction(&self) -> Result<ClientSession> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        Ok(session)
    }

    /// One attempt at the vote transaction.
    async fn try_commit_vote(&self, vote: &Vote) -> Result<Commit> {
        let mut session = self.transaction().await?;

        // The unique index turns a second vote for the same pair into a
        // duplicate key error, even across concurrent transactions.
        let participation = Participation::new(vote.voter_id, vote.election_id);
        if let Err(e) = self
            .participations()
            .insert_one_with_session(&participation, None, &mut session)
            .await
        {
            session.abort_transaction().await?;
            return if is_duplicate_key_error(&e) {
                Ok(Commit::AlreadyVoted)
            } else {
                Err(e.into())
            };
        }

        if let outcome @ (Commit::AlreadyVoted | Commit::VoterMissing) =
            self.record_vote(vote, &mut session).await?
        {
            session.abort_transaction().await?;
            return Ok(outcome);
        }

        if !self.increment_votes(vote, &mut session).await? {
            session.abort_transaction().await?;
            return Ok(Commit::CandidateMismatch);
        }

        commit_with_retry(&mut session).await?;
        Ok(Commit::Committed)
    }

    /// Append the election to the voter's voted set, unless it is already there.
    async fn record_vote(&self, vote: &Vote, session: &mut ClientSession) -> Result<Commit> {
        let filter = doc! {
            "_id": vote.voter_id,
            "voted_elections": { "$ne": vote.election_id },
        };
        let update = doc! {
            "$addToSet": { "voted_elections": vote.election_id },
        };
        let result = self
            .users()
            .update_one_with_session(filter, update, None, session)
            .await?;
        if result.modified_count == 1 {
            return Ok(Commit::Committed);
        }

        // Work out which guard failed.
        let voter = self
            .users()
            .find_one_with_session(vote.voter_id.as_doc(), None, session)
            .await?;
        Ok(if voter.is_some() {
            Commit::AlreadyVoted
        } else {
            Commit::VoterMissing
        })
    }

    /// Add one to the candidate's tally, provided it still belongs to the election.
    async fn increment_votes(&self, vote: &Vote, session: &mut ClientSession) -> Result<bool> {
        let filter = doc! {
            "_id": vote.candidate_id,
            "election_id": vote.election_id,
        };
        let update = doc! {
            "$inc": { "votes": 1_i64 },
        };
        let result = self
            .candidates()
            .update_one_with_session(filter, update, None, session)
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn find_all<T>(&self, coll: Coll<T>, filter: Document) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned + Unpin + Send + Sync,
    {
        let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
        let found = coll.find(filter, options).await?.try_collect().await?;
        Ok(found)
    }
}

/// Commit a transaction, re-sending the commit while its outcome is unknown.
async fn commit_with_retry(session: &mut ClientSession) -> Result<()> {
    let mut retries = 0;
    loop {
        match session.commit_transaction().await {
            Err(e) if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                && retries < MAX_COMMIT_RETRIES =>
            {
                retries += 1;
                debug!("Transaction commit result unknown, retrying ({retries})");
            }
            result => return Ok(result?),
        }
    }
}

/// Extract the ID the database assigned to an inserted document.
fn inserted_id(result: InsertOneResult) -> Result<Id> {
    result
        .inserted_id
        .as_object_id()
        .map(Id::from)
        .ok_or_else(|| Error::Internal("Database returned a non-ObjectId ID".to_string()))
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let result = Coll::<NewUser>::from_db(&self.db)
            .insert_one(&user, None)
            .await;
        let id = match result {
            Ok(result) => inserted_id(result)?,
            Err(e) if is_duplicate_key_error(&e) => {
                return Err(Error::BadRequest(format!(
                    "Email address already in use: {}",
                    user.email
                )))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(User { id, user })
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>> {
        Ok(self.users().find_one(id.as_doc(), None).await?)
    }

    async fn has_voted(&self, voter_id: Id, election_id: Id) -> Result<bool> {
        let filter = doc! {
            "voter_id": voter_id,
            "election_id": election_id,
        };
        let count = self.participations().count_documents(filter, None).await?;
        Ok(count > 0)
    }

    async fn list_elections(&self) -> Result<Vec<Election>> {
        self.find_all(self.elections(), doc! {}).await
    }

    async fn get_election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.elections().find_one(id.as_doc(), None).await?)
    }

    async fn insert_election(&self, election: NewElection) -> Result<Election> {
        let result = Coll::<NewElection>::from_db(&self.db)
            .insert_one(&election, None)
            .await?;
        Ok(Election {
            id: inserted_id(result)?,
            election,
        })
    }

    async fn update_election(&self, id: Id, edit: ElectionEdit) -> Result<Option<Election>> {
        let update = doc! {
            "$set": {
                "title": edit.title,
                "description": edit.description,
                "start_time": BsonDateTime::from_chrono(edit.start_time),
                "end_time": BsonDateTime::from_chrono(edit.end_time),
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .elections()
            .find_one_and_update(id.as_doc(), update, options)
            .await?)
    }

    async fn delete_election(&self, id: Id) -> Result<bool> {
        // Atomically delete the election and all associated data.
        let mut session = self.transaction().await?;

        let result = self
            .elections()
            .delete_one_with_session(id.as_doc(), None, &mut session)
            .await?;
        if result.deleted_count == 0 {
            session.abort_transaction().await?;
            return Ok(false);
        }

        let filter = doc! {
            "election_id": id,
        };
        self.candidates()
            .delete_many_with_session(filter.clone(), None, &mut session)
            .await?;
        self.participations()
            .delete_many_with_session(filter, None, &mut session)
            .await?;

        // Remove the election from every voter's voted set.
        let update = doc! {
            "$pull": { "voted_elections": id },
        };
        self.users()
            .update_many_with_session(doc! {}, update, None, &mut session)
            .await?;

        commit_with_retry(&mut session).await?;
        Ok(true)
    }

    async fn list_candidates(&self) -> Result<Vec<Candidate>> {
        self.find_all(self.candidates(), doc! {}).await
    }

    async fn election_candidates(&self, election_id: Id) -> Result<Option<Vec<Candidate>>> {
        let election = match self.get_election(election_id).await? {
            Some(election) => election,
            None => return Ok(None),
        };
        let candidates = self
            .find_all(self.candidates(), doc! {"election_id": election_id})
            .await?;
        Ok(Some(in_election_order(&election.candidates, candidates)))
    }

    async fn get_candidate(&self, id: Id) -> Result<Option<Candidate>> {
        Ok(self.candidates().find_one(id.as_doc(), None).await?)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Option<Candidate>> {
        let mut session = self.transaction().await?;

        let election = self
            .elections()
            .find_one_with_session(candidate.election_id.as_doc(), None, &mut session)
            .await?;
        if election.is_none() {
            session.abort_transaction().await?;
            return Ok(None);
        }

        let result = Coll::<NewCandidate>::from_db(&self.db)
            .insert_one_with_session(&candidate, None, &mut session)
            .await?;
        let id = inserted_id(result)?;

        let update = doc! {
            "$push": { "candidates": id },
        };
        self.elections()
            .update_one_with_session(candidate.election_id.as_doc(), update, None, &mut session)
            .await?;

        commit_with_retry(&mut session).await?;
        Ok(Some(Candidate { id, candidate }))
    }

    async fn update_candidate(&self, id: Id, edit: CandidateEdit) -> Result<Option<Candidate>> {
        let update = doc! {
            "$set": {
                "name": edit.name,
                "bio": edit.bio,
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .candidates()
            .find_one_and_update(id.as_doc(), update, options)
            .await?)
    }

    async fn delete_candidate(&self, id: Id) -> Result<CandidateRemoval> {
        let mut session = self.transaction().await?;

        let candidate = match self
            .candidates()
            .find_one_with_session(id.as_doc(), None, &mut session)
            .await?
        {
            Some(candidate) => candidate,
            None => {
                session.abort_transaction().await?;
                return Ok(CandidateRemoval::NotFound);
            }
        };

        // Only delete while the tally is still zero; a vote committed since
        // the read above makes this match nothing.
        let filter = doc! {
            "_id": id,
            "votes": 0_i64,
        };
        let result = self
            .candidates()
            .delete_one_with_session(filter, None, &mut session)
            .await?;
        if result.deleted_count == 0 {
            session.abort_transaction().await?;
            return Ok(CandidateRemoval::HasVotes(candidate.votes.max(1)));
        }

        let update = doc! {
            "$pull": { "candidates": id },
        };
        self.elections()
            .update_one_with_session(candidate.election_id.as_doc(), update, None, &mut session)
            .await?;

        commit_with_retry(&mut session).await?;
        Ok(CandidateRemoval::Removed)
    }

    async fn commit_vote(&self, vote: &Vote) -> Result<Commit> {
        let started = Instant::now();
        let mut attempt: u32 = 1;
        loop {
            let conflict = match self.try_commit_vote(vote).await {
                Err(Error::Db(e)) if is_transient_transaction_error(&e) => e,
                result => return result,
            };
            if started.elapsed() >= COMMIT_RETRY_BUDGET {
                // Losing every run to a commit for the same pair still makes
                // this vote a duplicate.
                if self.has_voted(vote.voter_id, vote.election_id).await? {
                    return Ok(Commit::AlreadyVoted);
                }
                return Err(Error::Db(conflict));
            }
            debug!(
                "Vote transaction for voter {} in election {} conflicted, \
re-running (attempt {attempt})",
                vote.voter_id, vote.election_id
            );
            let backoff = Duration::from_millis(5 * u64::from(attempt));
            sleep(backoff.min(MAX_COMMIT_BACKOFF)).await;
            attempt += 1;
        }
    }

    async fn results_snapshot(
        &self,
        election_id: Id,
    ) -> Result<Option<(Election, Vec<Candidate>)>> {
        // Ensure we read a consistent snapshot of the election data.
        let session_options = SessionOptions::builder().snapshot(true).build();
        let mut session = self.client.start_session(Some(session_options)).await?;

        let election = match self
            .elections()
            .find_one_with_session(election_id.as_doc(), None, &mut session)
            .await?
        {
            Some(election) => election,
            None => return Ok(None),
        };

        let filter = doc! {
            "election_id": election_id,
        };
        let mut cursor = self
            .candidates()
            .find_with_session(filter, None, &mut session)
            .await?;
        let mut candidates = Vec::new();
        while let Some(candidate) = cursor.next(&mut session).await {
            candidates.push(candidate?);
        }

        let candidates = in_election_order(&election.candidates, candidates);
        Ok(Some((election, candidates)))
    }
}
