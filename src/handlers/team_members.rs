//! Team member management. The collection is ordered by `order_step`;
//! positions are rewritten only through the atomic reorder endpoint.

use axum::{
    extract::{Multipart, Path, Query},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::{self, ListQuery, Pagination};
use crate::database::manager::DatabaseManager;
use crate::database::models::team_member::TeamMember;
use crate::error::ApiError;
use crate::files::{FormData, UploadKind, UploadStore};
use crate::middleware::AuthIdentity;

use super::utils;

#[derive(Debug, Deserialize)]
pub struct ReorderEntry {
    pub id: Uuid,
    pub order_step: i32,
}

/// GET /api/v1/team-members
pub async fn list(Query(query): Query<ListQuery>) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM team_members")
        .fetch_one(&pool)
        .await?;

    let rows = sqlx::query_as::<_, TeamMember>(
        "SELECT * FROM team_members ORDER BY order_step LIMIT $1 OFFSET $2",
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

/// POST /api/v1/team-members - new members append at the end of the ranking
pub async fn create(
    Extension(caller): Extension<AuthIdentity>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let store = UploadStore::from_config();
    let mut form = FormData::from_multipart(&store, UploadKind::TeamMember, multipart).await?;

    if let Err(e) = utils::require_fields(&form, &["name"]) {
        form.discard_uploads().await;
        return Err(e);
    }
    let name = form.text("name").unwrap_or_default().trim().to_string();
    let title = form.text("title").unwrap_or_default().trim().to_string();
    let bio = form.text("bio").unwrap_or_default().trim().to_string();

    let pool = match DatabaseManager::pool().await {
        Ok(pool) => pool,
        Err(e) => {
            form.discard_uploads().await;
            return Err(e.into());
        }
    };

    let photo = form.take_upload("photo");
    let photo_name = photo.as_ref().map(|s| s.filename.clone());

    let inserted = sqlx::query_as::<_, TeamMember>(
        r#"
        INSERT INTO team_members (name, title, bio, photo, order_step, created_by, updated_by)
        VALUES ($1, $2, $3, $4,
                (SELECT COALESCE(MAX(order_step), 0) + 1 FROM team_members),
                $5, $5)
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(&title)
    .bind(&bio)
    .bind(&photo_name)
    .bind(caller.id)
    .fetch_one(&pool)
    .await;

    match inserted {
        Ok(member) => {
            if let Some(staged) = photo {
                staged.keep();
            }
            form.discard_uploads().await;
            Ok(api::created(member))
        }
        Err(e) => {
            if let Some(staged) = photo {
                staged.discard().await;
            }
            form.discard_uploads().await;
            Err(e.into())
        }
    }
}

/// PATCH /api/v1/team-members/:id
pub async fn update(
    Extension(caller): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let store = UploadStore::from_config();
    let mut form = FormData::from_multipart(&store, UploadKind::TeamMember, multipart).await?;

    let pool = match DatabaseManager::pool().await {
        Ok(pool) => pool,
        Err(e) => {
            form.discard_uploads().await;
            return Err(e.into());
        }
    };

    let existing = match sqlx::query_as::<_, TeamMember>("SELECT * FROM team_members WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await
    {
        Ok(Some(row)) => row,
        Ok(None) => {
            form.discard_uploads().await;
            return Err(ApiError::not_found("Team member not found"));
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
    let title = form
        .text("title")
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| existing.title.clone());
    let bio = form
        .text("bio")
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| existing.bio.clone());

    let new_photo = form.take_upload("photo");
    let remove_photo = form.text("photo").is_some_and(|v| v.is_empty());
    let photo = if let Some(staged) = &new_photo {
        Some(staged.filename.clone())
    } else if remove_photo {
        None
    } else {
        existing.photo.clone()
    };

    let updated = sqlx::query_as::<_, TeamMember>(
        r#"
        UPDATE team_members
        SET name = $1, title = $2, bio = $3, photo = $4, updated_by = $5, updated_at = now()
        WHERE id = $6
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(&title)
    .bind(&bio)
    .bind(&photo)
    .bind(caller.id)
    .bind(id)
    .fetch_one(&pool)
    .await;

    match updated {
        Ok(member) => {
            if let Some(staged) = new_photo {
                staged.keep();
                if let Some(old) = &existing.photo {
                    store.remove_quietly(UploadKind::TeamMember, old).await;
                }
            } else if remove_photo {
                if let Some(old) = &existing.photo {
                    store.remove_quietly(UploadKind::TeamMember, old).await;
                }
            }
            form.discard_uploads().await;
            Ok(api::ok(member))
        }
        Err(e) => {
            if let Some(staged) = new_photo {
                staged.discard().await;
            }
            form.discard_uploads().await;
            Err(e.into())
        }
    }
}

/// DELETE /api/v1/team-members/:id
pub async fn destroy(
    Extension(_caller): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let existing = sqlx::query_as::<_, TeamMember>("SELECT * FROM team_members WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Team member not found"))?;

    if let Some(photo) = &existing.photo {
        UploadStore::from_config()
            .remove_quietly(UploadKind::TeamMember, photo)
            .await;
    }

    sqlx::query("DELETE FROM team_members WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(api::message("Team member deleted"))
}

/// POST /api/v1/team-members/reorder - atomic bulk position update.
///
/// All rows receive their new order_step or none do. The proposed steps
/// must be a permutation of the affected rows' current steps; anything
/// else would corrupt the dense ranking and is rejected before any write.
pub async fn reorder(
    Extension(caller): Extension<AuthIdentity>,
    Json(entries): Json<Vec<ReorderEntry>>,
) -> Result<impl IntoResponse, ApiError> {
    if entries.is_empty() {
        return Err(ApiError::validation("Reorder payload is empty"));
    }

    let ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
    {
        let mut seen = ids.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != ids.len() {
            return Err(ApiError::validation("Reorder payload repeats an id"));
        }
    }

    let pool = DatabaseManager::pool().await?;
    let mut tx = pool.begin().await?;

    let current: Vec<(Uuid, i32)> = sqlx::query_as(
        "SELECT id, order_step FROM team_members WHERE id = ANY($1) FOR UPDATE",
    )
    .bind(&ids)
    .fetch_all(&mut *tx)
    .await?;

    if current.len() != entries.len() {
        return Err(ApiError::not_found("Reorder payload references unknown rows"));
    }

    let current_steps: Vec<i32> = current.iter().map(|(_, step)| *step).collect();
    let proposed_steps: Vec<i32> = entries.iter().map(|e| e.order_step).collect();
    if !is_permutation(&current_steps, &proposed_steps) {
        return Err(ApiError::validation(
            "Proposed order is not a permutation of the current order",
        ));
    }

    for entry in &entries {
        let result = sqlx::query(
            "UPDATE team_members SET order_step = $1, updated_by = $2, updated_at = now() WHERE id = $3",
        )
        .bind(entry.order_step)
        .bind(caller.id)
        .bind(entry.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            // Row vanished between the lock and the update; the transaction
            // rolls back on drop
            return Err(ApiError::not_found("Reorder payload references unknown rows"));
        }
    }

    tx.commit().await?;

    Ok(api::message("Order updated"))
}

/// Multiset equality: the reorder may only redistribute existing steps.
fn is_permutation(current: &[i32], proposed: &[i32]) -> bool {
    if current.len() != proposed.len() {
        return false;
    }
    let mut a = current.to_vec();
    let mut b = proposed.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

#[cfg(test)]
mod tests {
    use super::is_permutation;

    #[test]
    fn permutation_check() {
        assert!(is_permutation(&[1, 2, 3], &[3, 1, 2]));
        assert!(is_permutation(&[2, 2, 3], &[3, 2, 2]));
        assert!(!is_permutation(&[1, 2, 3], &[1, 2, 4]));
        assert!(!is_permutation(&[1, 2, 3], &[1, 2]));
        assert!(!is_permutation(&[1, 2, 2], &[1, 1, 2]));
        assert!(is_permutation(&[], &[]));
    }
}
