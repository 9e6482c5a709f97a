//! Line item endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use uuid::Uuid;

use olp_common::api::pagination::{calculate_pagination, PAGE_SIZE};
use olp_common::api::ApiError;
use olp_common::{store, uuid_utils, Error};

use crate::models::{validate_score_maximum, LineItem, ResultRecord, LINE_ITEMS, RESULTS};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateLineItemRequest {
    pub context_id: String,
    pub resource_link_id: String,
    pub label: String,
    pub score_maximum: f64,
    pub start_date_time: Option<DateTime<Utc>>,
    pub end_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLineItemRequest {
    pub label: Option<String>,
    pub score_maximum: Option<f64>,
    pub start_date_time: Option<DateTime<Utc>>,
    pub end_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct LineItemListQuery {
    pub context_id: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LineItemListResponse {
    pub line_items: Vec<LineItem>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

/// One line item per (context, resource link, label)
async fn triple_in_use(
    conn: &mut SqliteConnection,
    context_id: &str,
    resource_link_id: &str,
    label: &str,
    exclude: Option<Uuid>,
) -> Result<bool, Error> {
    for doc in store::list_all(conn, LINE_ITEMS).await? {
        if exclude == Some(doc.uuid) {
            continue;
        }
        let item: LineItem = doc.decode()?;
        if item.context_id == context_id
            && item.resource_link_id == resource_link_id
            && item.label == label
        {
            return Ok(true);
        }
    }
    Ok(false)
}

/// POST /api/line-items
pub async fn create_line_item(
    State(state): State<AppState>,
    Json(req): Json<CreateLineItemRequest>,
) -> Result<Json<LineItem>, ApiError> {
    if req.context_id.trim().is_empty()
        || req.resource_link_id.trim().is_empty()
        || req.label.trim().is_empty()
    {
        return Err(Error::Validation(
            "context_id, resource_link_id and label must not be empty".to_string(),
        )
        .into());
    }
    validate_score_maximum(req.score_maximum)?;

    let mut tx = state.db.begin().await?;
    if triple_in_use(&mut *tx, &req.context_id, &req.resource_link_id, &req.label, None).await? {
        return Err(Error::Conflict(format!(
            "Line item '{}' already exists for this resource link",
            req.label
        ))
        .into());
    }

    let item = LineItem {
        uuid: uuid_utils::generate(),
        context_id: req.context_id,
        resource_link_id: req.resource_link_id,
        label: req.label,
        score_maximum: req.score_maximum,
        start_date_time: req.start_date_time,
        end_date_time: req.end_date_time,
    };
    store::insert(&mut *tx, LINE_ITEMS, item.uuid, &serde_json::to_value(&item)?).await?;
    tx.commit().await?;

    Ok(Json(item))
}

/// GET /api/line-items/:uuid
pub async fn get_line_item(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<LineItem>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let doc = store::fetch(&mut *conn, LINE_ITEMS, uuid).await?;
    Ok(Json(doc.decode()?))
}

/// GET /api/line-items?context_id=&page=
pub async fn list_line_items(
    State(state): State<AppState>,
    Query(query): Query<LineItemListQuery>,
) -> Result<Json<LineItemListResponse>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let mut items = Vec::new();
    for doc in store::list_all(&mut *conn, LINE_ITEMS).await? {
        let item: LineItem = doc.decode()?;
        if let Some(context_id) = &query.context_id {
            if &item.context_id != context_id {
                continue;
            }
        }
        items.push(item);
    }

    let total = items.len() as i64;
    let p = calculate_pagination(total, query.page.unwrap_or(1));
    let page: Vec<LineItem> = items
        .into_iter()
        .skip(p.offset as usize)
        .take(PAGE_SIZE as usize)
        .collect();

    Ok(Json(LineItemListResponse {
        line_items: page,
        total,
        page: p.page,
        total_pages: p.total_pages,
    }))
}

/// PUT /api/line-items/:uuid
pub async fn update_line_item(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    Json(req): Json<UpdateLineItemRequest>,
) -> Result<Json<LineItem>, ApiError> {
    let mut tx = state.db.begin().await?;
    let doc = store::fetch(&mut *tx, LINE_ITEMS, uuid).await?;
    let mut item: LineItem = doc.decode()?;

    if let Some(label) = req.label {
        if label.trim().is_empty() {
            return Err(Error::Validation("label must not be empty".to_string()).into());
        }
        if label != item.label
            && triple_in_use(&mut *tx, &item.context_id, &item.resource_link_id, &label, Some(uuid))
                .await?
        {
            return Err(Error::Conflict(format!(
                "Line item '{}' already exists for this resource link",
                label
            ))
            .into());
        }
        item.label = label;
    }
    if let Some(score_maximum) = req.score_maximum {
        validate_score_maximum(score_maximum)?;
        item.score_maximum = score_maximum;
    }
    if let Some(start) = req.start_date_time {
        item.start_date_time = Some(start);
    }
    if let Some(end) = req.end_date_time {
        item.end_date_time = Some(end);
    }

    store::update_body(&mut *tx, LINE_ITEMS, uuid, &serde_json::to_value(&item)?).await?;
    tx.commit().await?;

    Ok(Json(item))
}

/// DELETE /api/line-items/:uuid
///
/// Results for the item go with it.
pub async fn delete_line_item(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut tx = state.db.begin().await?;
    store::fetch(&mut *tx, LINE_ITEMS, uuid).await?;

    let mut deleted_results = 0;
    for doc in store::list_all(&mut *tx, RESULTS).await? {
        let result: ResultRecord = doc.decode()?;
        if result.line_item_uuid == uuid {
            store::delete(&mut *tx, RESULTS, doc.uuid).await?;
            deleted_results += 1;
        }
    }

    store::delete(&mut *tx, LINE_ITEMS, uuid).await?;
    tx.commit().await?;

    Ok(Json(serde_json::json!({
        "deleted": uuid,
        "deleted_results": deleted_results,
    })))
}
