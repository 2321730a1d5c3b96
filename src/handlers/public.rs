//! Public, unauthenticated read-only endpoints for the storefront.
//!
//! Lists return a plain JSON array. The one exception is the brand product
//! listing, which wraps results as `{data, pagination, brandInfo}` for the
//! storefront's brand page.

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::api::{ListQuery, Pagination};
use crate::database::manager::DatabaseManager;
use crate::database::models::{
    brand::Brand, catalog::Catalog, faq::Faq, policy::Policy, product::Product,
    product::ProductImage, promotion::Promotion, team_member::TeamMember,
};
use crate::error::ApiError;

/// GET /api/products
pub async fn products(Query(query): Query<ListQuery>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let rows = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE status = 'active' ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(query.limit())
    .bind(query.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}

/// GET /api/products/:id
pub async fn product(Path(id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let product = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE id = $1 AND status = 'active'",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Product not found"))?;

    let images = sqlx::query_as::<_, ProductImage>(
        "SELECT * FROM product_images WHERE product_id = $1 ORDER BY position",
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    let mut value = serde_json::to_value(&product)
        .map_err(|e| ApiError::internal(format!("serialization failed: {e}")))?;
    value["images"] = json!(images);

    Ok(Json(value))
}

/// GET /api/brands
pub async fn brands(Query(query): Query<ListQuery>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let rows = sqlx::query_as::<_, Brand>("SELECT * FROM brands ORDER BY name LIMIT $1 OFFSET $2")
        .bind(query.limit())
        .bind(query.offset())
        .fetch_all(&pool)
        .await?;

    Ok(Json(rows))
}

/// GET /api/brands/:id/products - `{data, pagination, brandInfo}` envelope
pub async fn brand_products(
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let brand = sqlx::query_as::<_, Brand>("SELECT * FROM brands WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Brand not found"))?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM products WHERE brand_id = $1 AND status = 'active'",
    )
    .bind(id)
    .fetch_one(&pool)
    .await?;

    let rows = sqlx::query_as::<_, Product>(
        r#"
        SELECT * FROM products
        WHERE brand_id = $1 AND status = 'active'
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(id)
    .bind(query.limit())
    .bind(query.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({
        "data": rows,
        "pagination": Pagination::new(&query, total),
        "brandInfo": brand,
    })))
}

/// GET /api/catalogs
pub async fn catalogs(Query(query): Query<ListQuery>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let rows =
        sqlx::query_as::<_, Catalog>("SELECT * FROM catalogs ORDER BY name LIMIT $1 OFFSET $2")
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&pool)
            .await?;

    Ok(Json(rows))
}

/// GET /api/policies
pub async fn policies(Query(query): Query<ListQuery>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let rows =
        sqlx::query_as::<_, Policy>("SELECT * FROM policies ORDER BY title LIMIT $1 OFFSET $2")
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&pool)
            .await?;

    Ok(Json(rows))
}

/// GET /api/policies/:id
pub async fn policy(Path(id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let policy = sqlx::query_as::<_, Policy>("SELECT * FROM policies WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Policy not found"))?;

    Ok(Json(policy))
}

/// GET /api/faqs
pub async fn faqs(Query(query): Query<ListQuery>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let rows = sqlx::query_as::<_, Faq>(
        "SELECT * FROM faqs ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(query.limit())
    .bind(query.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}

/// GET /api/promotions - only currently running promotions
pub async fn promotions(Query(query): Query<ListQuery>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let rows = sqlx::query_as::<_, Promotion>(
        r#"
        SELECT * FROM promotions
        WHERE active
          AND (starts_at IS NULL OR starts_at <= now())
          AND (ends_at IS NULL OR ends_at >= now())
        ORDER BY created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(query.limit())
    .bind(query.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}

/// GET /api/team-members - in display order
pub async fn team_members(Query(query): Query<ListQuery>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let rows = sqlx::query_as::<_, TeamMember>(
        "SELECT * FROM team_members ORDER BY order_step LIMIT $1 OFFSET $2",
    )
    .bind(query.limit())
    .bind(query.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}
