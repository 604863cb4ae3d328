use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EntityKind, GuestbookStore, StoreError, StoreResult};
use crate::guestbook::repo_types::{Entry, EntryListItem, EntryWithUser, NewEntry};
use crate::users::repo_types::{NewUser, User, UserChanges, UserDetail, UserSummary};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    entries: Vec<Entry>,
    last_ts: Option<OffsetDateTime>,
}

impl Tables {
    // Strictly increasing so "newest first" is well defined even within one tick.
    fn next_timestamp(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let ts = match self.last_ts {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_ts = Some(ts);
        ts
    }

    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn with_user(&self, entry: &Entry) -> Option<EntryWithUser> {
        self.user(entry.user_id).map(|user| EntryWithUser {
            entry: entry.clone(),
            user: user.clone(),
        })
    }
}

/// Process-local store with the same constraints as the Postgres schema.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of storage operations served so far.
    #[cfg(test)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GuestbookStore for InMemoryStore {
    async fn exists(&self, kind: EntityKind, id: Uuid) -> StoreResult<bool> {
        self.tick();
        let t = self.tables.read().await;
        Ok(match kind {
            EntityKind::User => t.user(id).is_some(),
            EntityKind::Entry => t.entries.iter().any(|e| e.id == id),
        })
    }

    async fn list_users(&self) -> StoreResult<Vec<UserSummary>> {
        self.tick();
        let t = self.tables.read().await;
        let mut out: Vec<UserSummary> = t
            .users
            .iter()
            .map(|u| UserSummary {
                id: u.id,
                created_at: u.created_at,
                email: u.email.clone(),
                full_name: u.full_name.clone(),
                entries: t.entries.iter().filter(|e| e.user_id == u.id).count() as i64,
                thumbnail_url: u.thumbnail_url.clone(),
            })
            .collect();
        out.sort_by(|a, b| {
            b.entries
                .cmp(&a.entries)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(out)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<UserDetail>> {
        self.tick();
        let t = self.tables.read().await;
        Ok(t.user(id).map(|user| {
            let mut entries: Vec<Entry> = t
                .entries
                .iter()
                .filter(|e| e.user_id == id)
                .cloned()
                .collect();
            entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            UserDetail {
                user: user.clone(),
                entries,
            }
        }))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.tick();
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        self.tick();
        let mut t = self.tables.write().await;
        if t.users.iter().any(|u| u.email == new.email) {
            return Err(StoreError::Conflict("users_email_key".into()));
        }
        if t.user(new.id).is_some() {
            return Err(StoreError::Conflict("users_pkey".into()));
        }
        let user = User {
            id: new.id,
            email: new.email,
            full_name: new.full_name,
            thumbnail_url: new.thumbnail_url,
            created_at: t.next_timestamp(),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        self.tick();
        let mut t = self.tables.write().await;
        let user = t
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound(EntityKind::User))?;
        user.full_name = changes.full_name;
        user.thumbnail_url = changes.thumbnail_url;
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        self.tick();
        let mut t = self.tables.write().await;
        let before = t.users.len();
        t.users.retain(|u| u.id != id);
        if t.users.len() == before {
            return Err(StoreError::NotFound(EntityKind::User));
        }
        t.entries.retain(|e| e.user_id != id);
        Ok(())
    }

    async fn list_entries(&self) -> StoreResult<Vec<EntryListItem>> {
        self.tick();
        let t = self.tables.read().await;
        let mut joined: Vec<EntryWithUser> =
            t.entries.iter().filter_map(|e| t.with_user(e)).collect();
        joined.sort_by(|a, b| b.entry.created_at.cmp(&a.entry.created_at));
        Ok(joined.into_iter().map(EntryListItem::from).collect())
    }

    async fn find_entry(&self, id: Uuid) -> StoreResult<Option<EntryWithUser>> {
        self.tick();
        let t = self.tables.read().await;
        Ok(t
            .entries
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| t.with_user(e)))
    }

    async fn create_entry(&self, new: NewEntry) -> StoreResult<Entry> {
        self.tick();
        let mut t = self.tables.write().await;
        if t.user(new.user_id).is_none() {
            return Err(StoreError::MissingOwner(new.user_id));
        }
        let entry = Entry {
            id: new.id,
            content: new.content,
            user_id: new.user_id,
            created_at: t.next_timestamp(),
        };
        t.entries.push(entry.clone());
        Ok(entry)
    }

    async fn update_entry(&self, id: Uuid, content: String) -> StoreResult<Entry> {
        self.tick();
        let mut t = self.tables.write().await;
        let entry = t
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::NotFound(EntityKind::Entry))?;
        entry.content = content;
        Ok(entry.clone())
    }

    async fn delete_entry(&self, id: Uuid) -> StoreResult<()> {
        self.tick();
        let mut t = self.tables.write().await;
        let before = t.entries.len();
        t.entries.retain(|e| e.id != id);
        if t.entries.len() == before {
            return Err(StoreError::NotFound(EntityKind::Entry));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            email: email.into(),
            full_name: "Someone".into(),
            thumbnail_url: None,
        }
    }

    #[tokio::test]
    async fn email_is_unique() {
        let store = InMemoryStore::new();
        store.create_user(new_user("a@example.com")).await.unwrap();
        let err = store.create_user(new_user("a@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn entries_need_an_owner() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let err = store
            .create_entry(NewEntry {
                id: Uuid::new_v4(),
                content: "hi".into(),
                user_id: owner,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingOwner(id) if id == owner));
    }

    #[tokio::test]
    async fn deleting_a_user_cascades_to_entries() {
        let store = InMemoryStore::new();
        let user = store.create_user(new_user("b@example.com")).await.unwrap();
        let entry = store
            .create_entry(NewEntry {
                id: Uuid::new_v4(),
                content: "hello".into(),
                user_id: user.id,
            })
            .await
            .unwrap();

        store.delete_user(user.id).await.unwrap();

        assert!(store.find_entry(entry.id).await.unwrap().is_none());
        assert!(!store.exists(EntityKind::Entry, entry.id).await.unwrap());
        assert!(store.list_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        let err = store
            .update_user(
                id,
                UserChanges {
                    full_name: "x".into(),
                    thumbnail_url: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(EntityKind::User)));
        assert!(matches!(
            store.delete_entry(id).await.unwrap_err(),
            StoreError::NotFound(EntityKind::Entry)
        ));
    }

    #[tokio::test]
    async fn timestamps_strictly_increase() {
        let store = InMemoryStore::new();
        let a = store.create_user(new_user("c@example.com")).await.unwrap();
        let b = store.create_user(new_user("d@example.com")).await.unwrap();
        assert!(b.created_at > a.created_at);
        assert_eq!(store.calls(), 2);
    }
}
