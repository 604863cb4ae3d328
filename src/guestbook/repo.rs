use sqlx::PgPool;
use uuid::Uuid;

use crate::guestbook::repo_types::{Entry, EntryUserRow, EntryWithUser, NewEntry};

const ENTRY_WITH_USER: &str = r#"
    SELECT e.id, e.content, e.user_id, e.created_at,
           u.email AS user_email, u.full_name AS user_full_name,
           u.thumbnail_url AS user_thumbnail_url, u.created_at AS user_created_at
      FROM guestbook_entries e
      JOIN users u ON u.id = e.user_id
"#;

impl Entry {
    /// All entries joined with their authors, newest first.
    pub async fn list_with_users(db: &PgPool) -> Result<Vec<EntryWithUser>, sqlx::Error> {
        let sql = format!("{ENTRY_WITH_USER} ORDER BY e.created_at DESC");
        let rows = sqlx::query_as::<_, EntryUserRow>(&sql).fetch_all(db).await?;
        Ok(rows.into_iter().map(EntryWithUser::from).collect())
    }

    pub async fn find_with_user(
        db: &PgPool,
        id: Uuid,
    ) -> Result<Option<EntryWithUser>, sqlx::Error> {
        let sql = format!("{ENTRY_WITH_USER} WHERE e.id = $1");
        let row = sqlx::query_as::<_, EntryUserRow>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row.map(EntryWithUser::from))
    }

    pub async fn exists(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let found: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM guestbook_entries WHERE id = $1")
                .bind(id)
                .fetch_optional(db)
                .await?;
        Ok(found.is_some())
    }

    pub async fn create(db: &PgPool, new: &NewEntry) -> Result<Entry, sqlx::Error> {
        sqlx::query_as::<_, Entry>(
            r#"
            INSERT INTO guestbook_entries (id, content, user_id)
            VALUES ($1, $2, $3)
            RETURNING id, content, user_id, created_at
            "#,
        )
        .bind(new.id)
        .bind(&new.content)
        .bind(new.user_id)
        .fetch_one(db)
        .await
    }

    /// Returns `None` when no entry has this id.
    pub async fn update_content(
        db: &PgPool,
        id: Uuid,
        content: &str,
    ) -> Result<Option<Entry>, sqlx::Error> {
        sqlx::query_as::<_, Entry>(
            r#"
            UPDATE guestbook_entries
               SET content = $2
             WHERE id = $1
            RETURNING id, content, user_id, created_at
            "#,
        )
        .bind(id)
        .bind(content)
        .fetch_optional(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
        let res = sqlx::query("DELETE FROM guestbook_entries WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected())
    }
}
