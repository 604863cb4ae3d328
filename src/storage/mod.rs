//! Persistence boundary. Handlers only ever talk to [`GuestbookStore`];
//! Postgres backs it in production and [`memory::InMemoryStore`] backs it in
//! tests and throwaway local runs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::guestbook::repo_types::{Entry, EntryListItem, EntryWithUser, NewEntry};
use crate::users::repo_types::{NewUser, User, UserChanges, UserDetail, UserSummary};

pub mod memory;
pub mod postgres;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Entry,
}

impl EntityKind {
    /// Message returned to clients when a resource of this kind is missing.
    pub fn not_found_message(self) -> &'static str {
        match self {
            EntityKind::User => "User does not exists",
            EntityKind::Entry => "Entry not found",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0:?} not found")]
    NotFound(EntityKind),
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("owning user {0} does not exist")]
    MissingOwner(Uuid),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::Conflict(db.constraint().unwrap_or("unique").to_string());
            }
        }
        StoreError::Backend(anyhow::Error::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait GuestbookStore: Send + Sync {
    async fn exists(&self, kind: EntityKind, id: Uuid) -> StoreResult<bool>;

    /// Users with their entry counts, most entries first.
    async fn list_users(&self) -> StoreResult<Vec<UserSummary>>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<UserDetail>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User>;
    /// Removes the user and every entry it owns.
    async fn delete_user(&self, id: Uuid) -> StoreResult<()>;

    /// Entries with their authors, newest first.
    async fn list_entries(&self) -> StoreResult<Vec<EntryListItem>>;
    async fn find_entry(&self, id: Uuid) -> StoreResult<Option<EntryWithUser>>;
    async fn create_entry(&self, entry: NewEntry) -> StoreResult<Entry>;
    async fn update_entry(&self, id: Uuid, content: String) -> StoreResult<Entry>;
    async fn delete_entry(&self, id: Uuid) -> StoreResult<()>;
}
