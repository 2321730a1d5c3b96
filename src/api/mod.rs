//! Response envelopes and list-query plumbing shared by all handlers.

use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// 200 envelope: `{"success": true, "data": ...}`
pub fn ok<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

/// 201 envelope for newly created resources
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Value>) {
    (
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": data })),
    )
}

/// 200 envelope with no data payload
pub fn message(msg: impl Into<String>) -> Json<Value> {
    Json(json!({ "success": true, "message": msg.into() }))
}

/// `?page=<n>&limit=<n>` query on list endpoints; defaults page 1 / limit 20.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ListQuery {
    pub fn page(&self) -> i64 {
        self.page.filter(|p| *p >= 1).unwrap_or(DEFAULT_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .filter(|l| *l >= 1)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

/// Pagination block for the few endpoints that return an envelope instead
/// of a plain array.
#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

impl Pagination {
    pub fn new(query: &ListQuery, total: i64) -> Self {
        Self {
            page: query.page(),
            limit: query.limit(),
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_defaults_and_caps() {
        let q = ListQuery::default();
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), 20);
        assert_eq!(q.offset(), 0);

        let q = ListQuery {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(q.offset(), 20);

        let q = ListQuery {
            page: Some(0),
            limit: Some(10_000),
        };
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), MAX_LIMIT);
    }
}
