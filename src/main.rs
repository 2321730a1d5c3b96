use catalog_api::{config, routes};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, secrets, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    tracing::info!("Starting Catalog API in {:?} mode", config.environment);

    let app = routes::app();

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Catalog API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}
