// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded user database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: id → serialized [`User`] (JSON bytes)
//! - `user_identity_index`: `provider|identity_id` → id
//! - `user_email_index`: lowercased email → id
//! - `directory_meta`: key → u64 (`next_user_id`)

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};

use super::{email_key, DirectoryError, IdentityProvider, NewUser, User, UserDirectory};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: id → serialized User (JSON bytes).
const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

/// Index: `provider|identity_id` → id.
const USER_IDENTITY_INDEX: TableDefinition<&str, u64> = TableDefinition::new("user_identity_index");

/// Index: lowercased email → id.
const USER_EMAIL_INDEX: TableDefinition<&str, u64> = TableDefinition::new("user_email_index");

/// Counters.
const DIRECTORY_META: TableDefinition<&str, u64> = TableDefinition::new("directory_meta");

const NEXT_USER_ID: &str = "next_user_id";

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UserDbError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("failed to create data directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists: {0}")]
    Conflict(String),

    #[error("index points at missing user {0}")]
    DanglingIndex(u64),
}

pub type UserDbResult<T> = Result<T, UserDbError>;

impl From<UserDbError> for DirectoryError {
    fn from(err: UserDbError) -> Self {
        match err {
            UserDbError::NotFound => DirectoryError::NotFound,
            UserDbError::Conflict(what) => DirectoryError::AlreadyExists(what),
            other => DirectoryError::Storage(other.to_string()),
        }
    }
}

fn identity_key(provider: IdentityProvider, identity_id: &str) -> String {
    format!("{}|{}", provider.as_str(), identity_id)
}

// =============================================================================
// UserDb
// =============================================================================

/// Synchronous redb-backed user store.
pub struct UserDb {
    db: Database,
}

impl UserDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> UserDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_IDENTITY_INDEX)?;
            let _ = write_txn.open_table(USER_EMAIL_INDEX)?;
            let _ = write_txn.open_table(DIRECTORY_META)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub fn find_by_identity(
        &self,
        identity_id: &str,
        provider: IdentityProvider,
    ) -> UserDbResult<User> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(USER_IDENTITY_INDEX)?;
        let id = match index.get(identity_key(provider, identity_id).as_str())? {
            Some(id) => id.value(),
            None => return Err(UserDbError::NotFound),
        };

        let users = read_txn.open_table(USERS)?;
        let bytes = users.get(id)?.ok_or(UserDbError::DanglingIndex(id))?;
        Ok(serde_json::from_slice(bytes.value())?)
    }

    /// Insert a user and its index entries in one write transaction.
    pub fn create_user(&self, new_user: NewUser) -> UserDbResult<User> {
        let identity = identity_key(new_user.identity_provider, &new_user.identity_id);
        let email = email_key(&new_user.email);

        let write_txn = self.db.begin_write()?;
        let user = {
            let mut identity_index = write_txn.open_table(USER_IDENTITY_INDEX)?;
            if identity_index.get(identity.as_str())?.is_some() {
                return Err(UserDbError::Conflict(format!(
                    "identity {}",
                    new_user.identity_id
                )));
            }

            let mut email_index = write_txn.open_table(USER_EMAIL_INDEX)?;
            if email_index.get(email.as_str())?.is_some() {
                return Err(UserDbError::Conflict(format!("email {}", new_user.email)));
            }

            let mut meta = write_txn.open_table(DIRECTORY_META)?;
            let id = meta.get(NEXT_USER_ID)?.map(|v| v.value()).unwrap_or(1);
            meta.insert(NEXT_USER_ID, id + 1)?;

            let user = User {
                id,
                full_name: new_user.full_name,
                email: new_user.email,
                identity_id: new_user.identity_id,
                identity_provider: new_user.identity_provider,
                created_at: Utc::now(),
            };
            let json = serde_json::to_vec(&user)?;

            let mut users = write_txn.open_table(USERS)?;
            users.insert(id, json.as_slice())?;
            identity_index.insert(identity.as_str(), id)?;
            email_index.insert(email.as_str(), id)?;
            user
        };
        write_txn.commit()?;
        Ok(user)
    }

    pub fn count(&self) -> UserDbResult<u64> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        Ok(users.len()?)
    }
}

// =============================================================================
// Async adapter
// =============================================================================

/// [`UserDirectory`] over [`UserDb`]; blocking calls run on the blocking pool.
#[derive(Clone)]
pub struct RedbUserDirectory {
    db: Arc<UserDb>,
}

impl RedbUserDirectory {
    pub fn open(path: &Path) -> UserDbResult<Self> {
        Ok(Self {
            db: Arc::new(UserDb::open(path)?),
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T, DirectoryError>
    where
        T: Send + 'static,
        F: FnOnce(&UserDb) -> UserDbResult<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(db.as_ref()))
            .await
            .map_err(|e| DirectoryError::Storage(format!("user db task failed: {e}")))?
            .map_err(DirectoryError::from)
    }
}

#[async_trait]
impl UserDirectory for RedbUserDirectory {
    async fn find_by_identity(
        &self,
        identity_id: &str,
        provider: IdentityProvider,
    ) -> Result<User, DirectoryError> {
        let identity_id = identity_id.to_string();
        self.run(move |db| db.find_by_identity(&identity_id, provider))
            .await
    }

    async fn create_user(&self, user: NewUser) -> Result<User, DirectoryError> {
        self.run(move |db| db.create_user(user)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> (UserDb, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = UserDb::open(&dir.path().join("users.redb")).unwrap();
        (db, dir)
    }

    fn new_user(identity_id: &str, email: &str) -> NewUser {
        NewUser {
            full_name: "Jane Doe".to_string(),
            email: email.to_string(),
            identity_id: identity_id.to_string(),
            identity_provider: IdentityProvider::Keycloak,
        }
    }

    #[test]
    fn create_and_find_user() {
        let (db, _dir) = temp_db();
        let created = db.create_user(new_user("kc-sub-1", "jane@example.com")).unwrap();
        assert_eq!(created.id, 1);

        let found = db.find_by_identity("kc-sub-1", IdentityProvider::Keycloak).unwrap();
        assert_eq!(found, created);
    }

    #[test]
    fn unknown_identity_is_not_found() {
        let (db, _dir) = temp_db();
        let err = db.find_by_identity("nobody", IdentityProvider::Keycloak).unwrap_err();
        assert!(matches!(err, UserDbError::NotFound));
        assert_eq!(DirectoryError::from(err), DirectoryError::NotFound);
    }

    #[test]
    fn conflicts_leave_no_partial_writes() {
        let (db, _dir) = temp_db();
        db.create_user(new_user("a", "a@example.com")).unwrap();

        let err = db.create_user(new_user("b", "A@EXAMPLE.COM")).unwrap_err();
        assert!(matches!(err, UserDbError::Conflict(_)));
        let err = db.create_user(new_user("a", "other@example.com")).unwrap_err();
        assert!(matches!(
            DirectoryError::from(err),
            DirectoryError::AlreadyExists(_)
        ));

        assert_eq!(db.count().unwrap(), 1);
        assert!(db.find_by_identity("b", IdentityProvider::Keycloak).is_err());

        let next = db.create_user(new_user("c", "c@example.com")).unwrap();
        assert_eq!(next.id, 2);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("users.redb");
        {
            let db = UserDb::open(&path).unwrap();
            db.create_user(new_user("a", "a@example.com")).unwrap();
            db.create_user(new_user("b", "b@example.com")).unwrap();
        }

        let db = UserDb::open(&path).unwrap();
        assert_eq!(db.count().unwrap(), 2);
        assert_eq!(
            db.find_by_identity("b", IdentityProvider::Keycloak).unwrap().id,
            2
        );
        assert_eq!(db.create_user(new_user("c", "c@example.com")).unwrap().id, 3);
    }

    #[tokio::test]
    async fn async_directory_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let directory = RedbUserDirectory::open(&dir.path().join("users.redb")).unwrap();

        let created = directory
            .create_user(new_user("kc-sub-9", "nine@example.com"))
            .await
            .unwrap();
        let found = directory
            .find_by_identity("kc-sub-9", IdentityProvider::Keycloak)
            .await
            .unwrap();
        assert_eq!(found, created);

        let missing = directory
            .find_by_identity("kc-sub-0", IdentityProvider::Keycloak)
            .await
            .unwrap_err();
        assert_eq!(missing, DirectoryError::NotFound);
    }
}
