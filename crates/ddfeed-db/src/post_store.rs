//! Post and comment persistence.
//!
//! [`PostStore`] is the `PostgreSQL` implementation of
//! [`EntityStore`]. Every method is one round trip; nothing here reads or
//! writes the cache.

use async_trait::async_trait;
use ddfeed_core::{EntityStore, PageCursor, PostRecord, StoreError};
use ddfeed_types::{Comment, ExternalId, IdentityScheme, InternalKey};
use sqlx::PgPool;

use crate::error::store_error;
use crate::postgres::PostgresPool;

/// Columns the service reads and writes, per table.
const REQUIRED_COLUMNS: [(&str, &[&str]); 2] = [
    ("post", &["id", "external_id", "body", "created_at", "updated_at"]),
    (
        "comment",
        &["id", "external_id", "body", "post_id", "created_at", "updated_at"],
    ),
];

/// Operations on the `post` and `comment` tables.
#[derive(Clone)]
pub struct PostStore {
    pool: PgPool,
    scheme: IdentityScheme,
}

impl PostStore {
    /// Create a store over a connection pool, assigning identifiers with
    /// `scheme`.
    pub fn new(pool: &PostgresPool, scheme: IdentityScheme) -> Self {
        Self {
            pool: pool.pool().clone(),
            scheme,
        }
    }

    /// Verify both tables carry every column the service uses.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] naming the missing columns, or the
    /// mapped error if the catalog query fails.
    pub async fn check_schema(&self) -> Result<(), StoreError> {
        let present = sqlx::query_as::<_, (String, String)>(
            r"SELECT table_name::TEXT, column_name::TEXT
              FROM information_schema.columns
              WHERE table_schema = current_schema()
                AND table_name IN ('post', 'comment')",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let missing = missing_columns(&present);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Query(format!(
                "schema is missing columns: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Return `table.column` for every required column absent from `present`.
fn missing_columns(present: &[(String, String)]) -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .flat_map(|(table, columns)| {
            columns
                .iter()
                .filter(move |column| {
                    !present
                        .iter()
                        .any(|(t, c)| t.as_str() == *table && c.as_str() == **column)
                })
                .map(move |column| format!("{table}.{column}"))
        })
        .collect()
}

#[async_trait]
impl EntityStore for PostStore {
    fn identity_scheme(&self) -> IdentityScheme {
        self.scheme
    }

    async fn insert_post(&self, body: &str) -> Result<PostRecord, StoreError> {
        let minted = self.scheme.mint().map(ExternalId::into_inner);
        let row = sqlx::query_as::<_, PostRow>(
            r"WITH next AS (SELECT nextval(pg_get_serial_sequence('post', 'id')) AS id)
              INSERT INTO post (id, external_id, body)
              SELECT next.id, COALESCE($1::TEXT, next.id::TEXT), $2
              FROM next
              RETURNING id, external_id, body",
        )
        .bind(minted)
        .bind(body)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.into())
    }

    async fn list_posts(
        &self,
        limit: u32,
        before: Option<&PageCursor>,
    ) -> Result<Vec<PostRecord>, StoreError> {
        let limit = i64::from(limit);
        let rows = match before {
            None => {
                sqlx::query_as::<_, PostRow>(
                    r"SELECT id, external_id, body
                      FROM post
                      ORDER BY id DESC
                      LIMIT $1",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            Some(PageCursor::Key(key)) => {
                sqlx::query_as::<_, PostRow>(
                    r"SELECT id, external_id, body
                      FROM post
                      WHERE id < $1
                      ORDER BY id DESC
                      LIMIT $2",
                )
                .bind(key.into_inner())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            // An unknown identifier makes the subquery NULL, and no row
            // compares less than NULL.
            Some(PageCursor::External(id)) => {
                sqlx::query_as::<_, PostRow>(
                    r"SELECT id, external_id, body
                      FROM post
                      WHERE id < (SELECT id FROM post WHERE external_id = $1)
                      ORDER BY id DESC
                      LIMIT $2",
                )
                .bind(id.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(store_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn get_post(&self, id: &ExternalId) -> Result<Option<PostRecord>, StoreError> {
        let row = sqlx::query_as::<_, PostRow>(
            r"SELECT id, external_id, body
              FROM post
              WHERE external_id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn delete_post(&self, id: &ExternalId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM post WHERE external_id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        tracing::debug!(post_id = %id, rows = result.rows_affected(), "Deleted post row");
        Ok(result.rows_affected())
    }

    async fn count_posts(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM post")
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn count_comments(&self, post_id: &ExternalId) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>(
            r"SELECT COUNT(*)
              FROM comment c
              JOIN post p ON p.id = c.post_id
              WHERE p.external_id = $1",
        )
        .bind(post_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)
    }

    async fn insert_comment(
        &self,
        body: &str,
        post_key: InternalKey,
    ) -> Result<ExternalId, StoreError> {
        let minted = self.scheme.mint().map(ExternalId::into_inner);
        let id = sqlx::query_scalar::<_, String>(
            r"WITH next AS (SELECT nextval(pg_get_serial_sequence('comment', 'id')) AS id)
              INSERT INTO comment (id, external_id, body, post_id)
              SELECT next.id, COALESCE($1::TEXT, next.id::TEXT), $2, $3
              FROM next
              RETURNING external_id",
        )
        .bind(minted)
        .bind(body)
        .bind(post_key.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(ExternalId::new(id))
    }

    async fn list_comments(&self, post_id: &ExternalId) -> Result<Vec<Comment>, StoreError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r"SELECT c.external_id, c.body, p.external_id AS post_external_id
              FROM comment c
              JOIN post p ON p.id = c.post_id
              WHERE p.external_id = $1
              ORDER BY c.id",
        )
        .bind(post_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn resolve_internal_key(
        &self,
        id: &ExternalId,
    ) -> Result<Option<InternalKey>, StoreError> {
        let key = sqlx::query_scalar::<_, i64>("SELECT id FROM post WHERE external_id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(key.map(InternalKey))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        self.check_schema().await
    }
}

// =============================================================================
// Row types
// =============================================================================

/// A row from the `post` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PostRow {
    id: i64,
    external_id: String,
    body: String,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            key: InternalKey(row.id),
            id: ExternalId::new(row.external_id),
            body: row.body,
        }
    }
}

/// A comment joined to its post's external identifier.
#[derive(Debug, Clone, sqlx::FromRow)]
struct CommentRow {
    external_id: String,
    body: String,
    post_external_id: String,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: ExternalId::new(row.external_id),
            body: row.body,
            post_id: ExternalId::new(row.post_external_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(table: &str, names: &[&str]) -> Vec<(String, String)> {
        names
            .iter()
            .map(|name| (table.to_owned(), (*name).to_owned()))
            .collect()
    }

    #[test]
    fn complete_schema_has_nothing_missing() {
        let mut present = columns(
            "post",
            &["id", "external_id", "body", "created_at", "updated_at"],
        );
        present.extend(columns(
            "comment",
            &["id", "external_id", "body", "post_id", "created_at", "updated_at"],
        ));
        assert!(missing_columns(&present).is_empty());
    }

    #[test]
    fn missing_columns_are_named_by_table() {
        let mut present = columns("post", &["id", "external_id", "body", "created_at"]);
        present.extend(columns("comment", &["id", "body", "post_id"]));
        assert_eq!(
            missing_columns(&present),
            [
                "post.updated_at",
                "comment.external_id",
                "comment.created_at",
                "comment.updated_at",
            ]
        );
    }

    #[test]
    fn a_column_on_the_wrong_table_does_not_count() {
        let present = columns(
            "comment",
            &["id", "external_id", "body", "post_id", "created_at", "updated_at"],
        );
        assert_eq!(missing_columns(&present).len(), 5);
    }
}
