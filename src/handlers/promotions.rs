use axum::{
    extract::{Multipart, Path, Query},
    response::IntoResponse,
    Extension,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::api::{self, ListQuery, Pagination};
use crate::database::manager::DatabaseManager;
use crate::database::models::promotion::Promotion;
use crate::error::ApiError;
use crate::files::{FormData, UploadKind, UploadStore};
use crate::middleware::AuthIdentity;

use super::utils;

/// GET /api/v1/promotions
pub async fn list(Query(query): Query<ListQuery>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM promotions")
        .fetch_one(&pool)
        .await?;

    let rows = sqlx::query_as::<_, Promotion>(
        "SELECT * FROM promotions ORDER BY created_at DESC LIMIT $1 OFFSET $2",
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

fn parse_window_field(
    form: &FormData,
    name: &str,
) -> Result<Option<Option<DateTime<Utc>>>, ApiError> {
    match form.text(name) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(Some(None)),
        Some(v) => DateTime::parse_from_rfc3339(v.trim())
            .map(|dt| Some(Some(dt.with_timezone(&Utc))))
            .map_err(|_| {
                ApiError::validation(format!("Field '{name}' must be an RFC 3339 timestamp"))
            }),
    }
}

/// POST /api/v1/promotions
pub async fn create(
    Extension(caller): Extension<AuthIdentity>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let store = UploadStore::from_config();
    let mut form = FormData::from_multipart(&store, UploadKind::Promotion, multipart).await?;

    if let Err(e) = utils::require_fields(&form, &["title"]) {
        form.discard_uploads().await;
        return Err(e);
    }
    let title = form.text("title").unwrap_or_default().trim().to_string();
    let summary = form.text("summary").unwrap_or_default().trim().to_string();

    let parsed = utils::parse_bool_field(&form, "active")
        .and_then(|active| {
            let starts_at = parse_window_field(&form, "starts_at")?;
            let ends_at = parse_window_field(&form, "ends_at")?;
            Ok((active, starts_at, ends_at))
        });
    let (active, starts_at, ends_at) = match parsed {
        Ok((a, s, e)) => (a.unwrap_or(true), s.flatten(), e.flatten()),
        Err(e) => {
            form.discard_uploads().await;
            return Err(e);
        }
    };

    let pool = match DatabaseManager::pool().await {
        Ok(pool) => pool,
        Err(e) => {
            form.discard_uploads().await;
            return Err(e.into());
        }
    };

    let banner = form.take_upload("banner");
    let banner_name = banner.as_ref().map(|s| s.filename.clone());

    let inserted = sqlx::query_as::<_, Promotion>(
        r#"
        INSERT INTO promotions (title, summary, banner, active, starts_at, ends_at, created_by, updated_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        RETURNING *
        "#,
    )
    .bind(&title)
    .bind(&summary)
    .bind(&banner_name)
    .bind(active)
    .bind(starts_at)
    .bind(ends_at)
    .bind(caller.id)
    .fetch_one(&pool)
    .await;

    match inserted {
        Ok(promotion) => {
            if let Some(staged) = banner {
                staged.keep();
            }
            form.discard_uploads().await;
            Ok(api::created(promotion))
        }
        Err(e) => {
            if let Some(staged) = banner {
                staged.discard().await;
            }
            form.discard_uploads().await;
            Err(e.into())
        }
    }
}

/// PATCH /api/v1/promotions/:id
pub async fn update(
    Extension(caller): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let store = UploadStore::from_config();
    let mut form = FormData::from_multipart(&store, UploadKind::Promotion, multipart).await?;

    let pool = match DatabaseManager::pool().await {
        Ok(pool) => pool,
        Err(e) => {
            form.discard_uploads().await;
            return Err(e.into());
        }
    };

    let existing = match sqlx::query_as::<_, Promotion>("SELECT * FROM promotions WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await
    {
        Ok(Some(row)) => row,
        Ok(None) => {
            form.discard_uploads().await;
            return Err(ApiError::not_found("Promotion not found"));
        }
        Err(e) => {
            form.discard_uploads().await;
            return Err(e.into());
        }
    };

    let title = form
        .text("title")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| existing.title.clone());
    let summary = form
        .text("summary")
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| existing.summary.clone());

    let parsed = utils::parse_bool_field(&form, "active")
        .and_then(|active| {
            let starts_at = parse_window_field(&form, "starts_at")?;
            let ends_at = parse_window_field(&form, "ends_at")?;
            Ok((active, starts_at, ends_at))
        });
    let (active, starts_at, ends_at) = match parsed {
        Ok((a, s, e)) => (
            a.unwrap_or(existing.active),
            s.unwrap_or(existing.starts_at),
            e.unwrap_or(existing.ends_at),
        ),
        Err(e) => {
            form.discard_uploads().await;
            return Err(e);
        }
    };

    let new_banner = form.take_upload("banner");
    let remove_banner = form.text("banner").is_some_and(|v| v.is_empty());
    let banner = if let Some(staged) = &new_banner {
        Some(staged.filename.clone())
    } else if remove_banner {
        None
    } else {
        existing.banner.clone()
    };

    let updated = sqlx::query_as::<_, Promotion>(
        r#"
        UPDATE promotions
        SET title = $1, summary = $2, banner = $3, active = $4,
            starts_at = $5, ends_at = $6, updated_by = $7, updated_at = now()
        WHERE id = $8
        RETURNING *
        "#,
    )
    .bind(&title)
    .bind(&summary)
    .bind(&banner)
    .bind(active)
    .bind(starts_at)
    .bind(ends_at)
    .bind(caller.id)
    .bind(id)
    .fetch_one(&pool)
    .await;

    match updated {
        Ok(promotion) => {
            if let Some(staged) = new_banner {
                staged.keep();
                if let Some(old) = &existing.banner {
                    store.remove_quietly(UploadKind::Promotion, old).await;
                }
            } else if remove_banner {
                if let Some(old) = &existing.banner {
                    store.remove_quietly(UploadKind::Promotion, old).await;
                }
            }
            form.discard_uploads().await;
            Ok(api::ok(promotion))
        }
        Err(e) => {
            if let Some(staged) = new_banner {
                staged.discard().await;
            }
            form.discard_uploads().await;
            Err(e.into())
        }
    }
}

/// DELETE /api/v1/promotions/:id
pub async fn destroy(
    Extension(_caller): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let existing = sqlx::query_as::<_, Promotion>("SELECT * FROM promotions WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Promotion not found"))?;

    if let Some(banner) = &existing.banner {
        UploadStore::from_config()
            .remove_quietly(UploadKind::Promotion, banner)
            .await;
    }

    sqlx::query("DELETE FROM promotions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(api::message("Promotion deleted"))
}
