//! Product management. Products are the one composite resource: a cover
//! image on the row itself plus gallery child rows that each own a file.
//! Creation writes the product and its gallery rows in a single
//! transaction so a partial insert never strands files or rows.

use axum::{
    extract::{Multipart, Path, Query},
    response::IntoResponse,
    Extension,
};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::api::{self, ListQuery, Pagination};
use crate::database::manager::DatabaseManager;
use crate::database::models::product::{Product, ProductImage};
use crate::error::ApiError;
use crate::files::{FormData, StagedUpload, UploadKind, UploadStore};
use crate::middleware::AuthIdentity;

use super::utils;

/// GET /api/v1/products
pub async fn list(Query(query): Query<ListQuery>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(&pool)
        .await?;

    let rows = sqlx::query_as::<_, Product>(
        "SELECT * FROM products ORDER BY created_at DESC LIMIT $1 OFFSET $2",
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

/// GET /api/v1/products/:id - product with its gallery
pub async fn get(Path(id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
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

    Ok(api::ok(value))
}

struct ProductFields {
    name: String,
    summary: String,
    description: String,
    price: Decimal,
    status: String,
    brand_id: Option<Uuid>,
    catalog_id: Option<Uuid>,
}

fn collect_fields(form: &FormData, existing: Option<&Product>) -> Result<ProductFields, ApiError> {
    let text_or = |name: &str, fallback: &str| -> String {
        form.text(name)
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| fallback.to_string())
    };

    let name = match existing {
        Some(row) => form
            .text("name")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| row.name.clone()),
        None => form
            .text("name")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::validation("Product name is required"))?,
    };

    let price = match utils::parse_decimal_field(form, "price")? {
        Some(price) => price,
        None => match existing {
            Some(row) => row.price,
            None => return Err(ApiError::validation("Product price is required")),
        },
    };
    if price < Decimal::ZERO {
        return Err(ApiError::validation("Product price cannot be negative"));
    }

    let brand_id = match utils::parse_uuid_field(form, "brand_id")? {
        Some(value) => value,
        None => existing.and_then(|row| row.brand_id),
    };
    let catalog_id = match utils::parse_uuid_field(form, "catalog_id")? {
        Some(value) => value,
        None => existing.and_then(|row| row.catalog_id),
    };

    Ok(ProductFields {
        name,
        summary: text_or("summary", existing.map(|r| r.summary.as_str()).unwrap_or("")),
        description: text_or(
            "description",
            existing.map(|r| r.description.as_str()).unwrap_or(""),
        ),
        price,
        status: {
            let status = text_or("status", existing.map(|r| r.status.as_str()).unwrap_or("active"));
            if status.is_empty() {
                "active".to_string()
            } else {
                status
            }
        },
        brand_id,
        catalog_id,
    })
}

/// POST /api/v1/products
pub async fn create(
    Extension(caller): Extension<AuthIdentity>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let store = UploadStore::from_config();
    let mut form = FormData::from_multipart(&store, UploadKind::Product, multipart).await?;

    let fields = match collect_fields(&form, None) {
        Ok(fields) => fields,
        Err(e) => {
            form.discard_uploads().await;
            return Err(e);
        }
    };

    let cover = form.take_upload("image");
    let gallery = form.take_uploads("gallery");

    let result = insert_product(&caller, &fields, cover.as_ref(), &gallery).await;

    match result {
        Ok(value) => {
            if let Some(staged) = cover {
                staged.keep();
            }
            for staged in gallery {
                staged.keep();
            }
            form.discard_uploads().await;
            Ok(api::created(value))
        }
        Err(e) => {
            if let Some(staged) = cover {
                staged.discard().await;
            }
            for staged in gallery {
                staged.discard().await;
            }
            form.discard_uploads().await;
            Err(e)
        }
    }
}

/// Transactional insert: the product row and every gallery row land
/// together or not at all.
async fn insert_product(
    caller: &AuthIdentity,
    fields: &ProductFields,
    cover: Option<&StagedUpload>,
    gallery: &[StagedUpload],
) -> Result<serde_json::Value, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let mut tx = pool.begin().await?;

    let product = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products
            (name, summary, description, price, status, brand_id, catalog_id, image, created_by, updated_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
        RETURNING *
        "#,
    )
    .bind(&fields.name)
    .bind(&fields.summary)
    .bind(&fields.description)
    .bind(fields.price)
    .bind(&fields.status)
    .bind(fields.brand_id)
    .bind(fields.catalog_id)
    .bind(cover.map(|s| s.filename.clone()))
    .bind(caller.id)
    .fetch_one(&mut *tx)
    .await?;

    let mut images = Vec::with_capacity(gallery.len());
    for (position, staged) in gallery.iter().enumerate() {
        let image = sqlx::query_as::<_, ProductImage>(
            r#"
            INSERT INTO product_images (product_id, image, position)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(product.id)
        .bind(&staged.filename)
        .bind(position as i32)
        .fetch_one(&mut *tx)
        .await?;
        images.push(image);
    }

    tx.commit().await?;

    let mut value = serde_json::to_value(&product)
        .map_err(|e| ApiError::internal(format!("serialization failed: {e}")))?;
    value["images"] = json!(images);
    Ok(value)
}

/// PATCH /api/v1/products/:id
pub async fn update(
    Extension(caller): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let store = UploadStore::from_config();
    let mut form = FormData::from_multipart(&store, UploadKind::Product, multipart).await?;

    let pool = match DatabaseManager::pool().await {
        Ok(pool) => pool,
        Err(e) => {
            form.discard_uploads().await;
            return Err(e.into());
        }
    };

    let existing = match sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await
    {
        Ok(Some(row)) => row,
        Ok(None) => {
            form.discard_uploads().await;
            return Err(ApiError::not_found("Product not found"));
        }
        Err(e) => {
            form.discard_uploads().await;
            return Err(e.into());
        }
    };

    let fields = match collect_fields(&form, Some(&existing)) {
        Ok(fields) => fields,
        Err(e) => {
            form.discard_uploads().await;
            return Err(e);
        }
    };

    let new_cover = form.take_upload("image");
    let remove_cover = form.text("image").is_some_and(|v| v.is_empty());
    let cover = if let Some(staged) = &new_cover {
        Some(staged.filename.clone())
    } else if remove_cover {
        None
    } else {
        existing.image.clone()
    };
    let gallery = form.take_uploads("gallery");

    let result = apply_update(&caller, id, &fields, &cover, &gallery).await;

    match result {
        Ok(value) => {
            if let Some(staged) = new_cover {
                staged.keep();
                if let Some(old) = &existing.image {
                    store.remove_quietly(UploadKind::Product, old).await;
                }
            } else if remove_cover {
                if let Some(old) = &existing.image {
                    store.remove_quietly(UploadKind::Product, old).await;
                }
            }
            for staged in gallery {
                staged.keep();
            }
            form.discard_uploads().await;
            Ok(api::ok(value))
        }
        Err(e) => {
            if let Some(staged) = new_cover {
                staged.discard().await;
            }
            for staged in gallery {
                staged.discard().await;
            }
            form.discard_uploads().await;
            Err(e)
        }
    }
}

async fn apply_update(
    caller: &AuthIdentity,
    id: Uuid,
    fields: &ProductFields,
    cover: &Option<String>,
    gallery: &[StagedUpload],
) -> Result<serde_json::Value, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let mut tx = pool.begin().await?;

    let product = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products
        SET name = $1, summary = $2, description = $3, price = $4, status = $5,
            brand_id = $6, catalog_id = $7, image = $8, updated_by = $9, updated_at = now()
        WHERE id = $10
        RETURNING *
        "#,
    )
    .bind(&fields.name)
    .bind(&fields.summary)
    .bind(&fields.description)
    .bind(fields.price)
    .bind(&fields.status)
    .bind(fields.brand_id)
    .bind(fields.catalog_id)
    .bind(cover)
    .bind(caller.id)
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    // New gallery uploads append after the current highest position
    let next_position: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM product_images WHERE product_id = $1",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    for (offset, staged) in gallery.iter().enumerate() {
        sqlx::query("INSERT INTO product_images (product_id, image, position) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(&staged.filename)
            .bind(next_position + offset as i32)
            .execute(&mut *tx)
            .await?;
    }

    let images = sqlx::query_as::<_, ProductImage>(
        "SELECT * FROM product_images WHERE product_id = $1 ORDER BY position",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    let mut value = serde_json::to_value(&product)
        .map_err(|e| ApiError::internal(format!("serialization failed: {e}")))?;
    value["images"] = json!(images);
    Ok(value)
}

/// DELETE /api/v1/products/:id - removes the product, its gallery rows and
/// every owned file
pub async fn destroy(
    Extension(_caller): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let existing = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    let images = sqlx::query_as::<_, ProductImage>(
        "SELECT * FROM product_images WHERE product_id = $1",
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    let store = UploadStore::from_config();
    if let Some(cover) = &existing.image {
        store.remove_quietly(UploadKind::Product, cover).await;
    }
    for image in &images {
        store.remove_quietly(UploadKind::Product, &image.image).await;
    }

    // Child rows go with the parent (ON DELETE CASCADE)
    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(api::message("Product deleted"))
}

/// DELETE /api/v1/products/:id/images/:image_id - remove one gallery image
pub async fn destroy_image(
    Extension(_caller): Extension<AuthIdentity>,
    Path((id, image_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let image = sqlx::query_as::<_, ProductImage>(
        "SELECT * FROM product_images WHERE id = $1 AND product_id = $2",
    )
    .bind(image_id)
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Product image not found"))?;

    UploadStore::from_config()
        .remove_quietly(UploadKind::Product, &image.image)
        .await;

    sqlx::query("DELETE FROM product_images WHERE id = $1")
        .bind(image_id)
        .execute(&pool)
        .await?;

    Ok(api::message("Product image deleted"))
}
