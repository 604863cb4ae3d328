use sqlx::PgPool;
use uuid::Uuid;

use crate::guestbook::repo_types::Entry;
use crate::users::repo_types::{NewUser, User, UserChanges, UserSummary};

impl User {
    /// Every user with the number of entries they own, most active first.
    pub async fn list_with_counts(db: &PgPool) -> Result<Vec<UserSummary>, sqlx::Error> {
        sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.created_at, u.email, u.full_name, u.thumbnail_url,
                   COUNT(e.id) AS entries
              FROM users u
              LEFT JOIN guestbook_entries e ON e.user_id = u.id
             GROUP BY u.id
             ORDER BY entries DESC, u.created_at DESC
            "#,
        )
        .fetch_all(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, full_name, thumbnail_url, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, full_name, thumbnail_url, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn entries(db: &PgPool, user_id: Uuid) -> Result<Vec<Entry>, sqlx::Error> {
        sqlx::query_as::<_, Entry>(
            r#"
            SELECT id, content, user_id, created_at
            FROM guestbook_entries
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await
    }

    pub async fn create(db: &PgPool, new: &NewUser) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, full_name, thumbnail_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, full_name, thumbnail_url, created_at
            "#,
        )
        .bind(new.id)
        .bind(&new.email)
        .bind(&new.full_name)
        .bind(&new.thumbnail_url)
        .fetch_one(db)
        .await
    }

    /// Returns `None` when no user has this id.
    pub async fn update(
        db: &PgPool,
        id: Uuid,
        changes: &UserChanges,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET full_name = $2, thumbnail_url = $3
             WHERE id = $1
            RETURNING id, email, full_name, thumbnail_url, created_at
            "#,
        )
        .bind(id)
        .bind(&changes.full_name)
        .bind(&changes.thumbnail_url)
        .fetch_optional(db)
        .await
    }

    /// Number of deleted rows; owned entries go with the user (ON DELETE CASCADE).
    pub async fn delete(db: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected())
    }
}
