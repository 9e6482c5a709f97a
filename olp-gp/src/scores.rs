//! Score submission and result retrieval

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use uuid::Uuid;

use olp_common::api::pagination::{calculate_pagination, PAGE_SIZE};
use olp_common::api::ApiError;
use olp_common::{store, uuid_utils, Error};

use crate::models::{scale_score, LineItem, ResultRecord, LINE_ITEMS, RESULTS};
use crate::{passback, AppState};

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub user_id: String,
    pub score_given: f64,
    pub score_maximum: f64,
    #[serde(default = "default_progress")]
    pub activity_progress: String,
    #[serde(default = "default_progress")]
    pub grading_progress: String,
}

fn default_progress() -> String {
    "Completed".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ResultListQuery {
    pub user_id: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ResultListResponse {
    pub results: Vec<ResultRecord>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

async fn find_result(
    conn: &mut SqliteConnection,
    line_item_uuid: Uuid,
    user_id: &str,
) -> Result<Option<ResultRecord>, Error> {
    for doc in store::list_all(conn, RESULTS).await? {
        let result: ResultRecord = doc.decode()?;
        if result.line_item_uuid == line_item_uuid && result.user_id == user_id {
            return Ok(Some(result));
        }
    }
    Ok(None)
}

/// Upsert the (line item, user) result inside the caller's transaction
pub async fn record_score(
    conn: &mut SqliteConnection,
    item: &LineItem,
    req: ScoreRequest,
) -> Result<ResultRecord, Error> {
    if req.user_id.trim().is_empty() {
        return Err(Error::Validation("user_id must not be empty".to_string()));
    }
    let result_score = scale_score(req.score_given, req.score_maximum, item.score_maximum)?;

    let existing = find_result(conn, item.uuid, &req.user_id).await?;
    let result = ResultRecord {
        uuid: existing.as_ref().map(|r| r.uuid).unwrap_or_else(uuid_utils::generate),
        line_item_uuid: item.uuid,
        user_id: req.user_id,
        score_given: req.score_given,
        score_maximum: req.score_maximum,
        result_score,
        activity_progress: req.activity_progress,
        grading_progress: req.grading_progress,
    };

    let body = serde_json::to_value(&result)?;
    if existing.is_some() {
        store::update_body(conn, RESULTS, result.uuid, &body).await?;
    } else {
        store::insert(conn, RESULTS, result.uuid, &body).await?;
    }

    Ok(result)
}

/// POST /api/line-items/:uuid/scores
pub async fn submit_score(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<ResultRecord>, ApiError> {
    let mut tx = state.db.begin().await?;
    let item: LineItem = store::fetch(&mut *tx, LINE_ITEMS, uuid).await?.decode()?;

    let result = record_score(&mut *tx, &item, req).await?;
    tx.commit().await?;

    passback::deliver(&state, &result);

    Ok(Json(result))
}

/// GET /api/line-items/:uuid/results?user_id=&page=
pub async fn list_results(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    Query(query): Query<ResultListQuery>,
) -> Result<Json<ResultListResponse>, ApiError> {
    let mut conn = state.db.acquire().await?;
    store::fetch(&mut *conn, LINE_ITEMS, uuid).await?;

    let mut results = Vec::new();
    for doc in store::list_all(&mut *conn, RESULTS).await? {
        let result: ResultRecord = doc.decode()?;
        if result.line_item_uuid != uuid {
            continue;
        }
        if let Some(user_id) = &query.user_id {
            if &result.user_id != user_id {
                continue;
            }
        }
        results.push(result);
    }

    let total = results.len() as i64;
    let p = calculate_pagination(total, query.page.unwrap_or(1));
    let page: Vec<ResultRecord> = results
        .into_iter()
        .skip(p.offset as usize)
        .take(PAGE_SIZE as usize)
        .collect();

    Ok(Json(ResultListResponse {
        results: page,
        total,
        page: p.page,
        total_pages: p.total_pages,
    }))
}
