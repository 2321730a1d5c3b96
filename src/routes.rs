//! Router assembly: public storefront routes under `/api`, authenticated
//! and role-gated admin routes under `/api/v1`, and static serving of the
//! upload directory.

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{delete, get, patch, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config;
use crate::database::manager::DatabaseManager;
use crate::handlers::{
    auth, brands, catalogs, faqs, identities, policies, products, promotions, public,
    team_members,
};
use crate::middleware::{auth::require_auth, role};

pub fn app() -> Router {
    let config = config::config();

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        .merge(admin_routes())
        .nest_service(
            "/static/uploads",
            ServeDir::new(&config.uploads.root_dir),
        )
        .layer(DefaultBodyLimit::max(config.server.max_request_size_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Public storefront surface: token acquisition plus read-only content.
fn public_routes() -> Router {
    Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/products", get(public::products))
        .route("/api/products/:id", get(public::product))
        .route("/api/brands", get(public::brands))
        .route("/api/brands/:id/products", get(public::brand_products))
        .route("/api/catalogs", get(public::catalogs))
        .route("/api/policies", get(public::policies))
        .route("/api/policies/:id", get(public::policy))
        .route("/api/faqs", get(public::faqs))
        .route("/api/promotions", get(public::promotions))
        .route("/api/team-members", get(public::team_members))
}

/// Admin surface. The authentication gate wraps every route; each route
/// group then carries its allow-list gate.
fn admin_routes() -> Router {
    admin_only_routes()
        .merge(staff_routes())
        .layer(from_fn(require_auth))
}

/// Account management is restricted to administrators.
fn admin_only_routes() -> Router {
    Router::new()
        .route(
            "/api/v1/identities",
            get(identities::list).post(identities::create),
        )
        .route(
            "/api/v1/identities/:id",
            get(identities::get)
                .patch(identities::update)
                .delete(identities::destroy),
        )
        .route_layer(from_fn(role::admin_only))
}

/// Content management is open to any signed-in staff member.
fn staff_routes() -> Router {
    Router::new()
        .route("/api/v1/auth/whoami", get(auth::whoami))
        .route("/api/v1/profile", patch(auth::update_profile))
        .route("/api/v1/brands", get(brands::list).post(brands::create))
        .route(
            "/api/v1/brands/:id",
            patch(brands::update).delete(brands::destroy),
        )
        .route(
            "/api/v1/catalogs",
            get(catalogs::list).post(catalogs::create),
        )
        .route(
            "/api/v1/catalogs/:id",
            patch(catalogs::update).delete(catalogs::destroy),
        )
        .route(
            "/api/v1/products",
            get(products::list).post(products::create),
        )
        .route(
            "/api/v1/products/:id",
            get(products::get)
                .patch(products::update)
                .delete(products::destroy),
        )
        .route(
            "/api/v1/products/:id/images/:image_id",
            delete(products::destroy_image),
        )
        .route(
            "/api/v1/policies",
            get(policies::list).post(policies::create),
        )
        .route(
            "/api/v1/policies/:id",
            patch(policies::update).delete(policies::destroy),
        )
        .route("/api/v1/faqs", get(faqs::list).post(faqs::create))
        .route(
            "/api/v1/faqs/:id",
            patch(faqs::update).delete(faqs::destroy),
        )
        .route(
            "/api/v1/promotions",
            get(promotions::list).post(promotions::create),
        )
        .route(
            "/api/v1/promotions/:id",
            patch(promotions::update).delete(promotions::destroy),
        )
        .route(
            "/api/v1/team-members",
            get(team_members::list).post(team_members::create),
        )
        .route("/api/v1/team-members/reorder", post(team_members::reorder))
        .route(
            "/api/v1/team-members/:id",
            patch(team_members::update).delete(team_members::destroy),
        )
        .route_layer(from_fn(role::any_staff))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Catalog API",
            "version": version,
            "description": "Content-management and e-commerce catalog backend (Axum)",
            "endpoints": {
                "home": "/ (public)",
                "auth": "/api/auth/login, /api/auth/refresh (public - token acquisition)",
                "storefront": "/api/products, /api/brands, /api/catalogs, /api/policies, /api/faqs, /api/promotions, /api/team-members (public, read-only)",
                "admin": "/api/v1/* (protected - bearer token + role)",
                "uploads": "/static/uploads/* (public, static)",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
