//! User endpoints

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

use crate::models::{
    self, validate_email, validate_status, User, STATUS_ACTIVE, STATUS_INACTIVE, USERS,
    USER_GROUPS,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub user_type: String,
    /// Defaults to "active"
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub user_type: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    pub email: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

async fn email_in_use(
    conn: &mut SqliteConnection,
    email: &str,
    exclude: Option<Uuid>,
) -> Result<bool, Error> {
    let needle = email.to_lowercase();
    for doc in store::list_all(conn, USERS).await? {
        if exclude == Some(doc.uuid) {
            continue;
        }
        let user: User = doc.decode()?;
        if user.email.to_lowercase() == needle {
            return Ok(true);
        }
    }
    Ok(false)
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<User>, ApiError> {
    validate_email(&req.email)?;
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(Error::Validation("Name fields must not be empty".to_string()).into());
    }
    if req.user_type.trim().is_empty() {
        return Err(Error::Validation("user_type must not be empty".to_string()).into());
    }
    let status = req.status.unwrap_or_else(|| STATUS_ACTIVE.to_string());
    validate_status(&status)?;

    let mut tx = state.db.begin().await?;
    if email_in_use(&mut *tx, &req.email, None).await? {
        return Err(Error::Conflict(format!("Email '{}' already registered", req.email)).into());
    }

    let user = User {
        uuid: uuid_utils::generate(),
        first_name: req.first_name,
        last_name: req.last_name,
        email: req.email,
        user_type: req.user_type,
        status,
        user_groups: Vec::new(),
    };
    store::insert(&mut *tx, USERS, user.uuid, &serde_json::to_value(&user)?).await?;
    tx.commit().await?;

    Ok(Json(user))
}

/// GET /api/users/:uuid
pub async fn get_user(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let doc = store::fetch(&mut *conn, USERS, uuid).await?;
    Ok(Json(doc.decode()?))
}

/// PUT /api/users/:uuid
pub async fn update_user(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let mut tx = state.db.begin().await?;
    let doc = store::fetch(&mut *tx, USERS, uuid).await?;
    let mut user: User = doc.decode()?;

    if let Some(email) = req.email {
        validate_email(&email)?;
        if email_in_use(&mut *tx, &email, Some(uuid)).await? {
            return Err(Error::Conflict(format!("Email '{}' already registered", email)).into());
        }
        user.email = email;
    }
    if let Some(first_name) = req.first_name {
        if first_name.trim().is_empty() {
            return Err(Error::Validation("first_name must not be empty".to_string()).into());
        }
        user.first_name = first_name;
    }
    if let Some(last_name) = req.last_name {
        if last_name.trim().is_empty() {
            return Err(Error::Validation("last_name must not be empty".to_string()).into());
        }
        user.last_name = last_name;
    }
    if let Some(user_type) = req.user_type {
        if user_type.trim().is_empty() {
            return Err(Error::Validation("user_type must not be empty".to_string()).into());
        }
        user.user_type = user_type;
    }
    if let Some(status) = req.status {
        validate_status(&status)?;
        user.status = status;
    }

    store::update_body(&mut *tx, USERS, uuid, &serde_json::to_value(&user)?).await?;
    tx.commit().await?;

    Ok(Json(user))
}

/// DELETE /api/users/:uuid
///
/// Removes the user from every group it belongs to before deleting the row,
/// so the membership mirrors never dangle.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut tx = state.db.begin().await?;
    let doc = store::fetch(&mut *tx, USERS, uuid).await?;
    let user: User = doc.decode()?;

    for group_uuid in &user.user_groups {
        if let Some(group_doc) = store::try_fetch(&mut *tx, USER_GROUPS, *group_uuid).await? {
            let mut group: models::UserGroup = group_doc.decode()?;
            group.users.retain(|u| *u != uuid);
            store::update_body(&mut *tx, USER_GROUPS, *group_uuid, &serde_json::to_value(&group)?)
                .await?;
        }
    }

    store::delete(&mut *tx, USERS, uuid).await?;
    tx.commit().await?;

    Ok(Json(serde_json::json!({ "deleted": uuid })))
}

/// GET /api/users?email=&status=&page=
pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<UserSearchQuery>,
) -> Result<Json<UserListResponse>, ApiError> {
    if let Some(status) = &query.status {
        validate_status(status)?;
    }

    let mut conn = state.db.acquire().await?;
    let mut users = Vec::new();
    for doc in store::list_all(&mut *conn, USERS).await? {
        let user: User = doc.decode()?;
        if let Some(email) = &query.email {
            if user.email.to_lowercase() != email.to_lowercase() {
                continue;
            }
        }
        if let Some(status) = &query.status {
            if &user.status != status {
                continue;
            }
        }
        users.push(user);
    }

    let total = users.len() as i64;
    let p = calculate_pagination(total, query.page.unwrap_or(1));
    let page: Vec<User> = users
        .into_iter()
        .skip(p.offset as usize)
        .take(PAGE_SIZE as usize)
        .collect();

    Ok(Json(UserListResponse {
        users: page,
        total,
        page: p.page,
        total_pages: p.total_pages,
    }))
}

/// POST /api/users/:uuid/activate
pub async fn activate_user(
    state: State<AppState>,
    path: Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    set_status(state, path, STATUS_ACTIVE).await
}

/// POST /api/users/:uuid/deactivate
pub async fn deactivate_user(
    state: State<AppState>,
    path: Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    set_status(state, path, STATUS_INACTIVE).await
}

async fn set_status(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    status: &str,
) -> Result<Json<User>, ApiError> {
    let mut tx = state.db.begin().await?;
    let doc = store::fetch(&mut *tx, USERS, uuid).await?;
    let mut user: User = doc.decode()?;
    user.status = status.to_string();
    store::update_body(&mut *tx, USERS, uuid, &serde_json::to_value(&user)?).await?;
    tx.commit().await?;

    Ok(Json(user))
}
