//! Catalog (category) management. No image slot; JSON payloads with a
//! unique-name constraint.

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
use crate::database::models::catalog::Catalog;
use crate::error::ApiError;
use crate::middleware::AuthIdentity;

#[derive(Debug, Deserialize)]
pub struct CatalogPayload {
    pub name: Option<String>,
    pub summary: Option<String>,
}

/// GET /api/v1/catalogs
pub async fn list(Query(query): Query<ListQuery>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM catalogs")
        .fetch_one(&pool)
        .await?;

    let rows =
        sqlx::query_as::<_, Catalog>("SELECT * FROM catalogs ORDER BY name LIMIT $1 OFFSET $2")
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&pool)
            .await?;

    Ok(api::ok(json!({
        "data": rows,
        "pagination": Pagination::new(&query, total),
    })))
}

/// POST /api/v1/catalogs
pub async fn create(
    Extension(caller): Extension<AuthIdentity>,
    Json(payload): Json<CatalogPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation("Catalog name is required"))?
        .to_string();
    let summary = payload
        .summary
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let pool = DatabaseManager::pool().await?;

    ensure_name_free(&pool, &name, None).await?;

    let catalog = sqlx::query_as::<_, Catalog>(
        r#"
        INSERT INTO catalogs (name, summary, created_by, updated_by)
        VALUES ($1, $2, $3, $3)
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(&summary)
    .bind(caller.id)
    .fetch_one(&pool)
    .await?;

    Ok(api::created(catalog))
}

/// PATCH /api/v1/catalogs/:id
pub async fn update(
    Extension(caller): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CatalogPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let existing = sqlx::query_as::<_, Catalog>("SELECT * FROM catalogs WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Catalog not found"))?;

    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| existing.name.clone());
    let summary = payload
        .summary
        .as_deref()
        .map(str::trim)
        .map(str::to_string)
        .unwrap_or_else(|| existing.summary.clone());

    if !name.eq_ignore_ascii_case(&existing.name) {
        ensure_name_free(&pool, &name, Some(id)).await?;
    }

    let catalog = sqlx::query_as::<_, Catalog>(
        r#"
        UPDATE catalogs
        SET name = $1, summary = $2, updated_by = $3, updated_at = now()
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(&summary)
    .bind(caller.id)
    .bind(id)
    .fetch_one(&pool)
    .await?;

    Ok(api::ok(catalog))
}

/// DELETE /api/v1/catalogs/:id
pub async fn destroy(
    Extension(_caller): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let deleted = sqlx::query("DELETE FROM catalogs WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Catalog not found"));
    }

    Ok(api::message("Catalog deleted"))
}

/// Natural-key check: no other catalog may carry this name.
async fn ensure_name_free(
    pool: &sqlx::PgPool,
    name: &str,
    exclude: Option<Uuid>,
) -> Result<(), ApiError> {
    let existing: Option<Uuid> = match exclude {
        Some(id) => {
            sqlx::query_scalar("SELECT id FROM catalogs WHERE lower(name) = lower($1) AND id <> $2")
                .bind(name)
                .bind(id)
                .fetch_optional(pool)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT id FROM catalogs WHERE lower(name) = lower($1)")
                .bind(name)
                .fetch_optional(pool)
                .await?
        }
    };

    if existing.is_some() {
        return Err(ApiError::conflict("A catalog with this name already exists"));
    }
    Ok(())
}
