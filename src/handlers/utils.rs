//! Validation and parsing helpers shared by the resource handlers.

use std::collections::HashMap;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::ApiError;
use crate::files::FormData;

/// Check that every named form field is present and non-empty. Returns a
/// 400 with per-field errors otherwise; callers discard staged uploads
/// before surfacing it.
pub fn require_fields(form: &FormData, required: &[&str]) -> Result<(), ApiError> {
    let mut missing = HashMap::new();
    for field in required {
        match form.text(field) {
            Some(v) if !v.trim().is_empty() => {}
            _ => {
                missing.insert((*field).to_string(), "This field is required".to_string());
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation_fields("Missing required fields", missing))
    }
}

/// Parse an optional UUID field; an empty string clears the reference.
pub fn parse_uuid_field(form: &FormData, name: &str) -> Result<Option<Option<Uuid>>, ApiError> {
    match form.text(name) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(Some(None)),
        Some(v) => v
            .trim()
            .parse::<Uuid>()
            .map(|u| Some(Some(u)))
            .map_err(|_| ApiError::validation(format!("Field '{name}' must be a valid id"))),
    }
}

pub fn parse_decimal_field(form: &FormData, name: &str) -> Result<Option<Decimal>, ApiError> {
    match form.text(name) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(|_| ApiError::validation(format!("Field '{name}' must be a number"))),
    }
}

pub fn parse_bool_field(form: &FormData, name: &str) -> Result<Option<bool>, ApiError> {
    match form.text(name) {
        None => Ok(None),
        Some(v) => match v.trim() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            _ => Err(ApiError::validation(format!(
                "Field '{name}' must be true or false"
            ))),
        },
    }
}

pub fn hash_password(plain: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!("password hashing failed: {}", e);
            ApiError::internal("Failed to process credentials")
        })
}

pub fn verify_password(plain: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_fields_flags_missing_and_blank() {
        let form = FormData::from_field_pairs(&[("question", ""), ("answer", "x")]);
        let err = require_fields(&form, &["question", "answer"]).unwrap_err();
        match err {
            ApiError::Validation { field_errors, .. } => {
                let errors = field_errors.unwrap();
                assert!(errors.contains_key("question"));
                assert!(!errors.contains_key("answer"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let form = FormData::from_field_pairs(&[("question", "Q1"), ("answer", "A1")]);
        assert!(require_fields(&form, &["question", "answer"]).is_ok());
    }

    #[test]
    fn uuid_field_empty_string_clears() {
        let form = FormData::from_field_pairs(&[("brand_id", "")]);
        assert_eq!(parse_uuid_field(&form, "brand_id").unwrap(), Some(None));

        let form = FormData::from_field_pairs(&[("brand_id", "not-a-uuid")]);
        assert!(parse_uuid_field(&form, "brand_id").is_err());

        let form = FormData::from_field_pairs(&[]);
        assert_eq!(parse_uuid_field(&form, "brand_id").unwrap(), None);
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("s3cret").unwrap();
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret", "not-a-hash"));
    }
}
