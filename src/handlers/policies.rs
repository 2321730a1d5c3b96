//! Policy documents (shipping, returns, privacy, ...). Unique titles.

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::{self, ListQuery, Pagination};
use crate::database::manager::DatabaseManager;
use crate::database::models::policy::Policy;
use crate::error::ApiError;
use crate::middleware::AuthIdentity;

#[derive(Debug, Deserialize)]
pub struct PolicyPayload {
    pub title: Option<String>,
    pub body: Option<String>,
}

/// GET /api/v1/policies
pub async fn list(Query(query): Query<ListQuery>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM policies")
        .fetch_one(&pool)
        .await?;

    let rows =
        sqlx::query_as::<_, Policy>("SELECT * FROM policies ORDER BY title LIMIT $1 OFFSET $2")
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&pool)
            .await?;

    Ok(api::ok(json!({
        "data": rows,
        "pagination": Pagination::new(&query, total),
    })))
}

/// POST /api/v1/policies
pub async fn create(
    Extension(caller): Extension<AuthIdentity>,
    Json(payload): Json<PolicyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let title = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation("Policy title is required"))?
        .to_string();
    let body = payload
        .body
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation("Policy body is required"))?
        .to_string();

    let pool = DatabaseManager::pool().await?;

    ensure_title_free(&pool, &title, None).await?;

    let policy = sqlx::query_as::<_, Policy>(
        r#"
        INSERT INTO policies (title, body, created_by, updated_by)
        VALUES ($1, $2, $3, $3)
        RETURNING *
        "#,
    )
    .bind(&title)
    .bind(&body)
    .bind(caller.id)
    .fetch_one(&pool)
    .await?;

    Ok(api::created(policy))
}

/// PATCH /api/v1/policies/:id
pub async fn update(
    Extension(caller): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PolicyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let existing = sqlx::query_as::<_, Policy>("SELECT * FROM policies WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Policy not found"))?;

    let title = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| existing.title.clone());
    let body = payload
        .body
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| existing.body.clone());

    if !title.eq_ignore_ascii_case(&existing.title) {
        ensure_title_free(&pool, &title, Some(id)).await?;
    }

    let policy = sqlx::query_as::<_, Policy>(
        r#"
        UPDATE policies
        SET title = $1, body = $2, updated_by = $3, updated_at = now()
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(&title)
    .bind(&body)
    .bind(caller.id)
    .bind(id)
    .fetch_one(&pool)
    .await?;

    Ok(api::ok(policy))
}

/// DELETE /api/v1/policies/:id
pub async fn destroy(
    Extension(_caller): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let deleted = sqlx::query("DELETE FROM policies WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Policy not found"));
    }

    Ok(api::message("Policy deleted"))
}

async fn ensure_title_free(
    pool: &sqlx::PgPool,
    title: &str,
    exclude: Option<Uuid>,
) -> Result<(), ApiError> {
    let existing: Option<Uuid> = match exclude {
        Some(id) => {
            sqlx::query_scalar("SELECT id FROM policies WHERE lower(title) = lower($1) AND id <> $2")
                .bind(title)
                .bind(id)
                .fetch_optional(pool)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT id FROM policies WHERE lower(title) = lower($1)")
                .bind(title)
                .fetch_optional(pool)
                .await?
        }
    };

    if existing.is_some() {
        return Err(ApiError::conflict("A policy with this title already exists"));
    }
    Ok(())
}
