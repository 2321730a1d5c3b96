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
use crate::database::models::faq::Faq;
use crate::error::ApiError;
use crate::middleware::AuthIdentity;

#[derive(Debug, Deserialize)]
pub struct FaqPayload {
    pub question: Option<String>,
    pub answer: Option<String>,
}

/// GET /api/v1/faqs
pub async fn list(Query(query): Query<ListQuery>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM faqs")
        .fetch_one(&pool)
        .await?;

    let rows = sqlx::query_as::<_, Faq>(
        "SELECT * FROM faqs ORDER BY created_at DESC LIMIT $1 OFFSET $2",
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

/// POST /api/v1/faqs
pub async fn create(
    Extension(caller): Extension<AuthIdentity>,
    Json(payload): Json<FaqPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let question = payload
        .question
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation("Question is required"))?
        .to_string();
    let answer = payload
        .answer
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation("Answer is required"))?
        .to_string();

    let pool = DatabaseManager::pool().await?;

    let faq = sqlx::query_as::<_, Faq>(
        r#"
        INSERT INTO faqs (question, answer, created_by, updated_by)
        VALUES ($1, $2, $3, $3)
        RETURNING *
        "#,
    )
    .bind(&question)
    .bind(&answer)
    .bind(caller.id)
    .fetch_one(&pool)
    .await?;

    Ok(api::created(faq))
}

/// PATCH /api/v1/faqs/:id
pub async fn update(
    Extension(caller): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FaqPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let existing = sqlx::query_as::<_, Faq>("SELECT * FROM faqs WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("FAQ not found"))?;

    let question = payload
        .question
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| existing.question.clone());
    let answer = payload
        .answer
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| existing.answer.clone());

    let faq = sqlx::query_as::<_, Faq>(
        r#"
        UPDATE faqs
        SET question = $1, answer = $2, updated_by = $3, updated_at = now()
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(&question)
    .bind(&answer)
    .bind(caller.id)
    .bind(id)
    .fetch_one(&pool)
    .await?;

    Ok(api::ok(faq))
}

/// DELETE /api/v1/faqs/:id
pub async fn destroy(
    Extension(_caller): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let deleted = sqlx::query("DELETE FROM faqs WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("FAQ not found"));
    }

    Ok(api::message("FAQ deleted"))
}
