//! Group endpoints
//!
//! Membership is mirrored: a group's `users` list and each member's
//! `user_groups` list always agree. Both sides change inside one
//! transaction, so a failed batch applies nothing.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use uuid::Uuid;

use olp_common::api::ApiError;
use olp_common::{store, uuid_utils, Error};

use crate::models::{User, UserGroup, USERS, USER_GROUPS};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MembershipRequest {
    pub user_uuids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct GroupListResponse {
    pub groups: Vec<UserGroup>,
    pub total: i64,
}

async fn save_group(conn: &mut SqliteConnection, group: &UserGroup) -> Result<(), Error> {
    store::update_body(conn, USER_GROUPS, group.uuid, &serde_json::to_value(group)?).await
}

async fn save_user(conn: &mut SqliteConnection, user: &User) -> Result<(), Error> {
    store::update_body(conn, USERS, user.uuid, &serde_json::to_value(user)?).await
}

/// POST /api/groups
pub async fn create_group(
    State(state): State<AppState>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<Json<UserGroup>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(Error::Validation("Group name must not be empty".to_string()).into());
    }

    let group = UserGroup {
        uuid: uuid_utils::generate(),
        name: req.name,
        description: req.description,
        users: Vec::new(),
    };

    let mut tx = state.db.begin().await?;
    store::insert(&mut *tx, USER_GROUPS, group.uuid, &serde_json::to_value(&group)?).await?;
    tx.commit().await?;

    Ok(Json(group))
}

/// GET /api/groups
pub async fn list_groups(
    State(state): State<AppState>,
) -> Result<Json<GroupListResponse>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let mut groups = Vec::new();
    for doc in store::list_all(&mut *conn, USER_GROUPS).await? {
        groups.push(doc.decode()?);
    }
    let total = groups.len() as i64;

    Ok(Json(GroupListResponse { groups, total }))
}

/// GET /api/groups/:uuid
pub async fn get_group(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<UserGroup>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let doc = store::fetch(&mut *conn, USER_GROUPS, uuid).await?;
    Ok(Json(doc.decode()?))
}

/// PUT /api/groups/:uuid
pub async fn update_group(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    Json(req): Json<UpdateGroupRequest>,
) -> Result<Json<UserGroup>, ApiError> {
    let mut tx = state.db.begin().await?;
    let doc = store::fetch(&mut *tx, USER_GROUPS, uuid).await?;
    let mut group: UserGroup = doc.decode()?;

    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(Error::Validation("Group name must not be empty".to_string()).into());
        }
        group.name = name;
    }
    if let Some(description) = req.description {
        group.description = description;
    }

    save_group(&mut *tx, &group).await?;
    tx.commit().await?;

    Ok(Json(group))
}

/// DELETE /api/groups/:uuid
///
/// Drops the group from every member's `user_groups` list first.
pub async fn delete_group(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut tx = state.db.begin().await?;
    let doc = store::fetch(&mut *tx, USER_GROUPS, uuid).await?;
    let group: UserGroup = doc.decode()?;

    for user_uuid in &group.users {
        if let Some(user_doc) = store::try_fetch(&mut *tx, USERS, *user_uuid).await? {
            let mut user: User = user_doc.decode()?;
            user.user_groups.retain(|g| *g != uuid);
            save_user(&mut *tx, &user).await?;
        }
    }

    store::delete(&mut *tx, USER_GROUPS, uuid).await?;
    tx.commit().await?;

    Ok(Json(serde_json::json!({ "deleted": uuid })))
}

/// POST /api/groups/:uuid/add-users
///
/// Idempotent: users already in the group are left alone. An unknown user
/// aborts the whole batch with 404 and nothing is applied.
pub async fn add_users(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    Json(req): Json<MembershipRequest>,
) -> Result<Json<UserGroup>, ApiError> {
    let mut tx = state.db.begin().await?;
    let doc = store::fetch(&mut *tx, USER_GROUPS, uuid).await?;
    let mut group: UserGroup = doc.decode()?;

    for user_uuid in &req.user_uuids {
        let user_doc = store::fetch(&mut *tx, USERS, *user_uuid).await?;
        let mut user: User = user_doc.decode()?;

        if !group.users.contains(user_uuid) {
            group.users.push(*user_uuid);
        }
        if !user.user_groups.contains(&uuid) {
            user.user_groups.push(uuid);
            save_user(&mut *tx, &user).await?;
        }
    }

    save_group(&mut *tx, &group).await?;
    tx.commit().await?;

    Ok(Json(group))
}

/// POST /api/groups/:uuid/remove-users
///
/// Idempotent: users not in the group are left alone, but every referenced
/// user must exist.
pub async fn remove_users(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    Json(req): Json<MembershipRequest>,
) -> Result<Json<UserGroup>, ApiError> {
    let mut tx = state.db.begin().await?;
    let doc = store::fetch(&mut *tx, USER_GROUPS, uuid).await?;
    let mut group: UserGroup = doc.decode()?;

    for user_uuid in &req.user_uuids {
        let user_doc = store::fetch(&mut *tx, USERS, *user_uuid).await?;
        let mut user: User = user_doc.decode()?;

        group.users.retain(|u| u != user_uuid);
        if user.user_groups.contains(&uuid) {
            user.user_groups.retain(|g| *g != uuid);
            save_user(&mut *tx, &user).await?;
        }
    }

    save_group(&mut *tx, &group).await?;
    tx.commit().await?;

    Ok(Json(group))
}
