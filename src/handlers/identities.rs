//! Administrator management of accounts. All routes sit behind the
//! admin-only allow-list.

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::{self, ListQuery, Pagination};
use crate::auth::Role;
use crate::database::manager::DatabaseManager;
use crate::database::models::identity::{Identity, STATUS_ACTIVE, STATUS_DISABLED};
use crate::error::ApiError;
use crate::files::{UploadKind, UploadStore};
use crate::middleware::AuthIdentity;

use super::utils;

#[derive(Debug, Deserialize)]
pub struct CreateIdentityRequest {
    pub username: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub phone: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateIdentityRequest {
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

/// GET /api/v1/identities
pub async fn list(Query(query): Query<ListQuery>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM identities")
        .fetch_one(&pool)
        .await?;

    let rows = sqlx::query_as::<_, Identity>(
        "SELECT * FROM identities ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(query.limit())
    .bind(query.offset())
    .fetch_all(&pool)
    .await?;

    Ok(api::ok(json!({
        "data": rows,
        "pagination": Pagination::new(&query, total),
    })))
}

/// GET /api/v1/identities/:id
pub async fn get(Path(id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let identity = sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Account not found"))?;

    Ok(api::ok(identity))
}

/// POST /api/v1/identities
pub async fn create(
    Extension(_caller): Extension<AuthIdentity>,
    Json(payload): Json<CreateIdentityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim().to_string();
    if username.is_empty() || payload.password.is_empty() || payload.name.trim().is_empty() {
        return Err(ApiError::validation(
            "Username, password and name are required",
        ));
    }

    let role: Role = payload
        .role
        .parse()
        .map_err(|e: String| ApiError::validation(e))?;

    let pool = DatabaseManager::pool().await?;

    let taken: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM identities WHERE username = $1")
            .bind(&username)
            .fetch_optional(&pool)
            .await?;
    if taken.is_some() {
        return Err(ApiError::conflict("Username is already in use"));
    }

    let password_hash = utils::hash_password(&payload.password)?;

    let identity = sqlx::query_as::<_, Identity>(
        r#"
        INSERT INTO identities (username, password_hash, name, nickname, phone, role, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(&username)
    .bind(&password_hash)
    .bind(payload.name.trim())
    .bind(payload.nickname.trim())
    .bind(payload.phone.trim())
    .bind(role.as_str())
    .bind(STATUS_ACTIVE)
    .fetch_one(&pool)
    .await?;

    Ok(api::created(identity))
}

/// PATCH /api/v1/identities/:id - administrator update of any field
pub async fn update(
    Extension(_caller): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateIdentityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let existing = sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Account not found"))?;

    let role = match &payload.role {
        Some(r) => {
            let parsed: Role = r.parse().map_err(|e: String| ApiError::validation(e))?;
            parsed.as_str().to_string()
        }
        None => existing.role.clone(),
    };

    let status = match &payload.status {
        Some(s) if s == STATUS_ACTIVE || s == STATUS_DISABLED => s.clone(),
        Some(other) => {
            return Err(ApiError::validation(format!("unknown status: {other}")));
        }
        None => existing.status.clone(),
    };

    let password_hash = match payload.password.as_deref().filter(|p| !p.is_empty()) {
        Some(plain) => utils::hash_password(plain)?,
        None => existing.password_hash.clone(),
    };

    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(&existing.name);
    let nickname = payload
        .nickname
        .as_deref()
        .map(str::trim)
        .unwrap_or(&existing.nickname);
    let phone = payload
        .phone
        .as_deref()
        .map(str::trim)
        .unwrap_or(&existing.phone);

    let identity = sqlx::query_as::<_, Identity>(
        r#"
        UPDATE identities
        SET name = $1, nickname = $2, phone = $3, password_hash = $4,
            role = $5, status = $6, updated_at = now()
        WHERE id = $7
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(nickname)
    .bind(phone)
    .bind(&password_hash)
    .bind(&role)
    .bind(&status)
    .bind(id)
    .fetch_one(&pool)
    .await?;

    Ok(api::ok(identity))
}

/// DELETE /api/v1/identities/:id - an account cannot delete itself
pub async fn destroy(
    Extension(caller): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if caller.id == id {
        return Err(ApiError::forbidden("An account cannot delete itself"));
    }

    let pool = DatabaseManager::pool().await?;

    let existing = sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Account not found"))?;

    if let Some(avatar) = &existing.avatar {
        UploadStore::from_config()
            .remove_quietly(UploadKind::Avatar, avatar)
            .await;
    }

    sqlx::query("DELETE FROM identities WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    tracing::info!("identity deleted: {} by {}", existing.username, caller.username);

    Ok(api::message("Account deleted"))
}
