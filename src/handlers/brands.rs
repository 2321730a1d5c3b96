//! Brand management. The create/update/delete flow here is the contract
//! every image-bearing resource follows: stage the upload, write the row,
//! then reconcile the filesystem with whatever the database says.

use axum::{
    extract::{Multipart, Path, Query},
    response::IntoResponse,
    Extension,
};
use serde_json::json;
use uuid::Uuid;

use crate::api::{self, ListQuery, Pagination};
use crate::database::manager::DatabaseManager;
use crate::database::models::brand::Brand;
use crate::error::ApiError;
use crate::files::{FormData, UploadKind, UploadStore};
use crate::middleware::AuthIdentity;

use super::utils;

/// GET /api/v1/brands
pub async fn list(Query(query): Query<ListQuery>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM brands")
        .fetch_one(&pool)
        .await?;

    let rows =
        sqlx::query_as::<_, Brand>("SELECT * FROM brands ORDER BY name LIMIT $1 OFFSET $2")
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&pool)
            .await?;

    Ok(api::ok(json!({
        "data": rows,
        "pagination": Pagination::new(&query, total),
    })))
}

/// POST /api/v1/brands
pub async fn create(
    Extension(caller): Extension<AuthIdentity>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let store = UploadStore::from_config();
    let mut form = FormData::from_multipart(&store, UploadKind::Brand, multipart).await?;

    if let Err(e) = utils::require_fields(&form, &["name"]) {
        form.discard_uploads().await;
        return Err(e);
    }
    let name = form.text("name").unwrap_or_default().trim().to_string();
    let summary = form.text("summary").unwrap_or_default().trim().to_string();

    let pool = match DatabaseManager::pool().await {
        Ok(pool) => pool,
        Err(e) => {
            form.discard_uploads().await;
            return Err(e.into());
        }
    };

    match sqlx::query_scalar::<_, Uuid>("SELECT id FROM brands WHERE lower(name) = lower($1)")
        .bind(&name)
        .fetch_optional(&pool)
        .await
    {
        Ok(Some(_)) => {
            form.discard_uploads().await;
            return Err(ApiError::conflict("A brand with this name already exists"));
        }
        Ok(None) => {}
        Err(e) => {
            form.discard_uploads().await;
            return Err(e.into());
        }
    }

    let logo = form.take_upload("logo");
    let logo_name = logo.as_ref().map(|s| s.filename.clone());

    let inserted = sqlx::query_as::<_, Brand>(
        r#"
        INSERT INTO brands (name, summary, logo, created_by, updated_by)
        VALUES ($1, $2, $3, $4, $4)
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(&summary)
    .bind(&logo_name)
    .bind(caller.id)
    .fetch_one(&pool)
    .await;

    match inserted {
        Ok(brand) => {
            if let Some(staged) = logo {
                staged.keep();
            }
            form.discard_uploads().await;
            Ok(api::created(brand))
        }
        Err(e) => {
            // Compensating delete: the row never existed, the file must not
            if let Some(staged) = logo {
                staged.discard().await;
            }
            form.discard_uploads().await;
            Err(e.into())
        }
    }
}

/// PATCH /api/v1/brands/:id
pub async fn update(
    Extension(caller): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let store = UploadStore::from_config();
    let mut form = FormData::from_multipart(&store, UploadKind::Brand, multipart).await?;

    let pool = match DatabaseManager::pool().await {
        Ok(pool) => pool,
        Err(e) => {
            form.discard_uploads().await;
            return Err(e.into());
        }
    };

    let existing = match sqlx::query_as::<_, Brand>("SELECT * FROM brands WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await
    {
        Ok(Some(row)) => row,
        Ok(None) => {
            // A freshly uploaded file must not be orphaned by a 404
            form.discard_uploads().await;
            return Err(ApiError::not_found("Brand not found"));
        }
        Err(e) => {
            form.discard_uploads().await;
            return Err(e.into());
        }
    };

    let name = form
        .text("name")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| existing.name.clone());
    let summary = form
        .text("summary")
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| existing.summary.clone());

    if !name.eq_ignore_ascii_case(&existing.name) {
        match sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM brands WHERE lower(name) = lower($1) AND id <> $2",
        )
        .bind(&name)
        .bind(id)
        .fetch_optional(&pool)
        .await
        {
            Ok(Some(_)) => {
                form.discard_uploads().await;
                return Err(ApiError::conflict("A brand with this name already exists"));
            }
            Ok(None) => {}
            Err(e) => {
                form.discard_uploads().await;
                return Err(e.into());
            }
        }
    }

    let new_logo = form.take_upload("logo");
    let remove_logo = form.text("logo").is_some_and(|v| v.is_empty());
    let logo = if let Some(staged) = &new_logo {
        Some(staged.filename.clone())
    } else if remove_logo {
        None
    } else {
        existing.logo.clone()
    };

    let updated = sqlx::query_as::<_, Brand>(
        r#"
        UPDATE brands
        SET name = $1, summary = $2, logo = $3, updated_by = $4, updated_at = now()
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(&summary)
    .bind(&logo)
    .bind(caller.id)
    .bind(id)
    .fetch_one(&pool)
    .await;

    match updated {
        Ok(brand) => {
            // Old file goes only after the new reference is persisted
            if let Some(staged) = new_logo {
                staged.keep();
                if let Some(old) = &existing.logo {
                    store.remove_quietly(UploadKind::Brand, old).await;
                }
            } else if remove_logo {
                if let Some(old) = &existing.logo {
                    store.remove_quietly(UploadKind::Brand, old).await;
                }
            }
            form.discard_uploads().await;
            Ok(api::ok(brand))
        }
        Err(e) => {
            if let Some(staged) = new_logo {
                staged.discard().await;
            }
            form.discard_uploads().await;
            Err(e.into())
        }
    }
}

/// DELETE /api/v1/brands/:id
pub async fn destroy(
    Extension(_caller): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let existing = sqlx::query_as::<_, Brand>("SELECT * FROM brands WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Brand not found"))?;

    // Best-effort: a missing file never blocks the row delete
    if let Some(logo) = &existing.logo {
        UploadStore::from_config()
            .remove_quietly(UploadKind::Brand, logo)
            .await;
    }

    sqlx::query("DELETE FROM brands WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(api::message("Brand deleted"))
}
