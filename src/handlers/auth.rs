//! Session endpoints: login, token refresh, whoami, and self-service
//! profile updates.

use axum::{
    extract::Multipart,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::api;
use crate::auth::{self, TokenKind};
use crate::database::manager::DatabaseManager;
use crate::database::models::identity::Identity;
use crate::error::ApiError;
use crate::files::{FormData, UploadKind, UploadStore};
use crate::middleware::AuthIdentity;

use super::utils;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /api/auth/login - Exchange credentials for an access/refresh token pair
pub async fn login(Json(payload): Json<LoginRequest>) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim();
    if username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::validation("Username and password are required"));
    }

    let pool = DatabaseManager::pool().await?;
    let identity = sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE username = $1")
        .bind(username)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::authentication_failed("Invalid username or password"))?;

    if !utils::verify_password(&payload.password, &identity.password_hash) {
        return Err(ApiError::authentication_failed("Invalid username or password"));
    }

    if !identity.is_active() {
        return Err(ApiError::forbidden("Account is disabled"));
    }

    let access_token = auth::issue(&identity, TokenKind::Access)?;
    let refresh_token = auth::issue(&identity, TokenKind::Refresh)?;

    tracing::info!("login: {}", identity.username);

    Ok(api::ok(json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "user": identity,
    })))
}

/// POST /api/auth/refresh - Exchange a refresh token for a new token pair.
///
/// The refresh token is verified against the refresh secret only; an access
/// token presented here fails. The identity is re-read so a disabled account
/// stops minting tokens, and so role changes land here - the one place a
/// stale authorization snapshot gets replaced.
pub async fn refresh(Json(payload): Json<RefreshRequest>) -> Result<impl IntoResponse, ApiError> {
    let claims = auth::verify(&payload.refresh_token, TokenKind::Refresh)
        .map_err(|e| match e {
            auth::TokenError::Invalid(msg) => ApiError::authentication_failed(msg),
            other => other.into(),
        })?;

    let pool = DatabaseManager::pool().await?;
    let identity = sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::authentication_failed("Account no longer exists"))?;

    if !identity.is_active() {
        return Err(ApiError::forbidden("Account is disabled"));
    }

    let access_token = auth::issue(&identity, TokenKind::Access)?;
    let refresh_token = auth::issue(&identity, TokenKind::Refresh)?;

    Ok(api::ok(json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
    })))
}

/// GET /api/v1/auth/whoami - Current identity as decoded from the token
pub async fn whoami(
    Extension(identity): Extension<AuthIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(api::ok(json!({
        "id": identity.id,
        "username": identity.username,
        "name": identity.name,
        "nickname": identity.nickname,
        "phone": identity.phone,
        "avatar": identity.avatar,
        "role": identity.role,
    })))
}

/// PATCH /api/v1/profile - Self-service update of the caller's own account.
/// Only display fields, password and avatar; role and status are admin-only
/// (see the identities handlers).
pub async fn update_profile(
    Extension(caller): Extension<AuthIdentity>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let store = UploadStore::from_config();
    let mut form = FormData::from_multipart(&store, UploadKind::Avatar, multipart).await?;

    let pool = match DatabaseManager::pool().await {
        Ok(pool) => pool,
        Err(e) => {
            form.discard_uploads().await;
            return Err(e.into());
        }
    };

    let existing = match sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE id = $1")
        .bind(caller.id)
        .fetch_optional(&pool)
        .await
    {
        Ok(Some(row)) => row,
        Ok(None) => {
            form.discard_uploads().await;
            return Err(ApiError::not_found("Account not found"));
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
    let nickname = form
        .text("nickname")
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| existing.nickname.clone());
    let phone = form
        .text("phone")
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| existing.phone.clone());

    let password_hash = match form.text("password").filter(|v| !v.is_empty()) {
        Some(plain) => match utils::hash_password(plain) {
            Ok(hash) => hash,
            Err(e) => {
                form.discard_uploads().await;
                return Err(e);
            }
        },
        None => existing.password_hash.clone(),
    };

    let new_avatar = form.take_upload("avatar");
    let remove_avatar = form.text("avatar").is_some_and(|v| v.is_empty());
    let avatar = if let Some(staged) = &new_avatar {
        Some(staged.filename.clone())
    } else if remove_avatar {
        None
    } else {
        existing.avatar.clone()
    };

    let updated = sqlx::query_as::<_, Identity>(
        r#"
        UPDATE identities
        SET name = $1, nickname = $2, phone = $3, password_hash = $4,
            avatar = $5, updated_at = now()
        WHERE id = $6
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(&nickname)
    .bind(&phone)
    .bind(&password_hash)
    .bind(&avatar)
    .bind(caller.id)
    .fetch_one(&pool)
    .await;

    match updated {
        Ok(identity) => {
            if let Some(staged) = new_avatar {
                staged.keep();
                if let Some(old) = &existing.avatar {
                    store.remove_quietly(UploadKind::Avatar, old).await;
                }
            } else if remove_avatar {
                if let Some(old) = &existing.avatar {
                    store.remove_quietly(UploadKind::Avatar, old).await;
                }
            }
            form.discard_uploads().await;
            Ok(api::ok(identity))
        }
        Err(e) => {
            if let Some(staged) = new_avatar {
                staged.discard().await;
            }
            form.discard_uploads().await;
            Err(e.into())
        }
    }
}
