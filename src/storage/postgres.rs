use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use super::{EntityKind, GuestbookStore, StoreError, StoreResult};
use crate::guestbook::repo_types::{Entry, EntryListItem, EntryWithUser, NewEntry};
use crate::users::repo_types::{NewUser, User, UserChanges, UserDetail, UserSummary};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            warn!(error = %e, "migration failed; continuing");
        } else {
            info!("migrations applied");
        }

        Ok(Self { db })
    }
}

fn missing(kind: EntityKind, rows: u64) -> StoreResult<()> {
    if rows == 0 {
        Err(StoreError::NotFound(kind))
    } else {
        Ok(())
    }
}

#[async_trait]
impl GuestbookStore for PgStore {
    async fn exists(&self, kind: EntityKind, id: Uuid) -> StoreResult<bool> {
        let found = match kind {
            EntityKind::User => User::find_by_id(&self.db, id).await?.is_some(),
            EntityKind::Entry => Entry::exists(&self.db, id).await?,
        };
        Ok(found)
    }

    async fn list_users(&self) -> StoreResult<Vec<UserSummary>> {
        Ok(User::list_with_counts(&self.db).await?)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<UserDetail>> {
        let Some(user) = User::find_by_id(&self.db, id).await? else {
            return Ok(None);
        };
        let entries = User::entries(&self.db, id).await?;
        Ok(Some(UserDetail { user, entries }))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.db, email).await?)
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        Ok(User::create(&self.db, &user).await?)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        User::update(&self.db, id, &changes)
            .await?
            .ok_or(StoreError::NotFound(EntityKind::User))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        missing(EntityKind::User, User::delete(&self.db, id).await?)
    }

    async fn list_entries(&self) -> StoreResult<Vec<EntryListItem>> {
        let rows = Entry::list_with_users(&self.db).await?;
        Ok(rows.into_iter().map(EntryListItem::from).collect())
    }

    async fn find_entry(&self, id: Uuid) -> StoreResult<Option<EntryWithUser>> {
        Ok(Entry::find_with_user(&self.db, id).await?)
    }

    async fn create_entry(&self, entry: NewEntry) -> StoreResult<Entry> {
        Entry::create(&self.db, &entry).await.map_err(|e| {
            let orphan = matches!(&e, sqlx::Error::Database(db) if db.is_foreign_key_violation());
            if orphan {
                StoreError::MissingOwner(entry.user_id)
            } else {
                StoreError::from(e)
            }
        })
    }

    async fn update_entry(&self, id: Uuid, content: String) -> StoreResult<Entry> {
        Entry::update_content(&self.db, id, &content)
            .await?
            .ok_or(StoreError::NotFound(EntityKind::Entry))
    }

    async fn delete_entry(&self, id: Uuid) -> StoreResult<()> {
        missing(EntityKind::Entry, Entry::delete(&self.db, id).await?)
    }
}
