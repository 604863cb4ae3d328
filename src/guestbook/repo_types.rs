use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::User;

/// Guestbook entry record in the database.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: Uuid,
    pub content: String,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Joined entry/user row; user columns carry a `user_` prefix.
#[derive(Debug, FromRow)]
pub struct EntryUserRow {
    pub id: Uuid,
    pub content: String,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub user_email: String,
    pub user_full_name: String,
    pub user_thumbnail_url: Option<String>,
    pub user_created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryWithUser {
    #[serde(flatten)]
    pub entry: Entry,
    pub user: User,
}

/// Lean projection used by the guestbook listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryListItem {
    pub id: Uuid,
    pub user: User,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct NewEntry {
    pub id: Uuid,
    pub content: String,
    pub user_id: Uuid,
}

impl From<EntryUserRow> for EntryWithUser {
    fn from(r: EntryUserRow) -> Self {
        Self {
            user: User {
                id: r.user_id,
                email: r.user_email,
                full_name: r.user_full_name,
                thumbnail_url: r.user_thumbnail_url,
                created_at: r.user_created_at,
            },
            entry: Entry {
                id: r.id,
                content: r.content,
                user_id: r.user_id,
                created_at: r.created_at,
            },
        }
    }
}

impl From<EntryWithUser> for EntryListItem {
    fn from(e: EntryWithUser) -> Self {
        Self {
            id: e.entry.id,
            user: e.user,
            content: e.entry.content,
        }
    }
}
