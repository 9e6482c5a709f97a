//! Document store
//!
//! Firestore-style persistence: UUID-keyed JSON documents grouped into named
//! collections, all backed by one `documents` table. Every function takes a
//! `&mut SqliteConnection` so callers control the transaction boundary —
//! multi-document mutations (reference mirroring, bulk import, recursive
//! delete) run inside a single transaction and never commit partially.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::models::Document;
use crate::{Error, Result};

/// Filter for `list` / `count`
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Substring match against the body `title` field
    pub title: Option<String>,
    /// Restrict to archived / non-archived rows
    pub archived: Option<bool>,
    /// LIMIT for the page (0 = no limit)
    pub limit: i64,
    /// OFFSET for the page
    pub offset: i64,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Bad stored timestamp '{}': {}", s, e)))
}

type DocumentRow = (String, String, i64, String, String);

fn decode_row(collection: &str, row: DocumentRow) -> Result<Document> {
    let (guid, body, is_archived, created, modified) = row;
    let uuid = Uuid::parse_str(&guid)
        .map_err(|e| Error::Internal(format!("Bad stored guid '{}': {}", guid, e)))?;
    let body = serde_json::from_str(&body)?;

    Ok(Document {
        uuid,
        collection: collection.to_string(),
        body,
        is_archived: is_archived != 0,
        created_time: parse_time(&created)?,
        last_modified_time: parse_time(&modified)?,
    })
}

/// Insert a new document; Conflict if the (collection, uuid) key exists
pub async fn insert(
    conn: &mut SqliteConnection,
    collection: &str,
    uuid: Uuid,
    body: &serde_json::Value,
) -> Result<Document> {
    let now = now_rfc3339();
    let result = sqlx::query(
        r#"
        INSERT INTO documents (collection, guid, body, is_archived, created_time, last_modified_time)
        VALUES (?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(collection)
    .bind(uuid.to_string())
    .bind(body.to_string())
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => fetch(conn, collection, uuid).await,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(Error::Conflict(format!(
            "Document {} already exists in {}",
            uuid, collection
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Fetch a document; NotFound when missing
pub async fn fetch(conn: &mut SqliteConnection, collection: &str, uuid: Uuid) -> Result<Document> {
    try_fetch(conn, collection, uuid)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{}/{}", collection, uuid)))
}

/// Fetch a document if it exists
pub async fn try_fetch(
    conn: &mut SqliteConnection,
    collection: &str,
    uuid: Uuid,
) -> Result<Option<Document>> {
    let row: Option<DocumentRow> = sqlx::query_as(
        r#"
        SELECT guid, body, is_archived, created_time, last_modified_time
        FROM documents WHERE collection = ? AND guid = ?
        "#,
    )
    .bind(collection)
    .bind(uuid.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|r| decode_row(collection, r)).transpose()
}

/// Replace a document body, bumping last_modified_time
pub async fn update_body(
    conn: &mut SqliteConnection,
    collection: &str,
    uuid: Uuid,
    body: &serde_json::Value,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE documents SET body = ?, last_modified_time = ? WHERE collection = ? AND guid = ?",
    )
    .bind(body.to_string())
    .bind(now_rfc3339())
    .bind(collection)
    .bind(uuid.to_string())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("{}/{}", collection, uuid)));
    }

    Ok(())
}

/// Set or clear the archive flag
pub async fn set_archived(
    conn: &mut SqliteConnection,
    collection: &str,
    uuid: Uuid,
    archived: bool,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE documents SET is_archived = ?, last_modified_time = ? WHERE collection = ? AND guid = ?",
    )
    .bind(archived as i64)
    .bind(now_rfc3339())
    .bind(collection)
    .bind(uuid.to_string())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("{}/{}", collection, uuid)));
    }

    Ok(())
}

/// Delete a document row; NotFound when missing
pub async fn delete(conn: &mut SqliteConnection, collection: &str, uuid: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND guid = ?")
        .bind(collection)
        .bind(uuid.to_string())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("{}/{}", collection, uuid)));
    }

    Ok(())
}

/// List documents in a collection with optional filters, ordered by
/// creation time then guid for a stable page sequence
pub async fn list(
    conn: &mut SqliteConnection,
    collection: &str,
    filter: &ListFilter,
) -> Result<Vec<Document>> {
    let mut sql = String::from(
        "SELECT guid, body, is_archived, created_time, last_modified_time \
         FROM documents WHERE collection = ?",
    );
    push_filter_sql(&mut sql, filter);
    sql.push_str(" ORDER BY created_time, guid");
    if filter.limit > 0 {
        sql.push_str(&format!(" LIMIT {} OFFSET {}", filter.limit, filter.offset));
    }

    let mut query = sqlx::query_as::<_, DocumentRow>(&sql).bind(collection);
    if let Some(title) = &filter.title {
        query = query.bind(format!("%{}%", title));
    }

    let rows = query.fetch_all(&mut *conn).await?;
    rows.into_iter().map(|r| decode_row(collection, r)).collect()
}

/// Count documents matching the filter (ignores limit/offset)
pub async fn count(
    conn: &mut SqliteConnection,
    collection: &str,
    filter: &ListFilter,
) -> Result<i64> {
    let mut sql = String::from("SELECT COUNT(*) FROM documents WHERE collection = ?");
    push_filter_sql(&mut sql, filter);

    let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(collection);
    if let Some(title) = &filter.title {
        query = query.bind(format!("%{}%", title));
    }

    Ok(query.fetch_one(&mut *conn).await?)
}

/// List an entire collection (no paging) — used for in-memory filters such
/// as parent-reference lookups and version lineage scans
pub async fn list_all(conn: &mut SqliteConnection, collection: &str) -> Result<Vec<Document>> {
    list(conn, collection, &ListFilter::default()).await
}

fn push_filter_sql(sql: &mut String, filter: &ListFilter) {
    if filter.title.is_some() {
        // json_extract is available in the bundled SQLite
        sql.push_str(" AND json_extract(body, '$.title') LIKE ?");
    }
    match filter.archived {
        Some(true) => sql.push_str(" AND is_archived = 1"),
        Some(false) => sql.push_str(" AND is_archived = 0"),
        None => {}
    }
}
