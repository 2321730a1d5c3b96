use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub summary: String,
    pub description: String,
    pub price: Decimal,
    pub status: String,
    pub brand_id: Option<Uuid>,
    pub catalog_id: Option<Uuid>,
    /// Cover image filename within the product upload directory
    pub image: Option<String>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Gallery image owned by a product. Each row owns exactly one file on
/// disk; deleting the product must remove these rows and their files.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: Uuid,
    pub image: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}
