use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    /// Secret for short-lived access tokens
    pub access_token_secret: String,
    /// Secret for long-lived refresh tokens; intentionally distinct from the
    /// access secret so one kind never verifies as the other
    pub refresh_token_secret: String,
    pub access_token_ttl_hours: i64,
    pub refresh_token_ttl_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Root directory for uploaded files; one subdirectory per resource kind
    pub root_dir: String,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("CATALOG_API_PORT").or_else(|_| env::var("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("SERVER_MAX_REQUEST_SIZE_BYTES") {
            self.server.max_request_size_bytes =
                v.parse().unwrap_or(self.server.max_request_size_bytes);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout =
                v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("ACCESS_TOKEN_SECRET") {
            self.security.access_token_secret = v;
        }
        if let Ok(v) = env::var("REFRESH_TOKEN_SECRET") {
            self.security.refresh_token_secret = v;
        }
        if let Ok(v) = env::var("ACCESS_TOKEN_TTL_HOURS") {
            self.security.access_token_ttl_hours =
                v.parse().unwrap_or(self.security.access_token_ttl_hours);
        }
        if let Ok(v) = env::var("REFRESH_TOKEN_TTL_DAYS") {
            self.security.refresh_token_ttl_days =
                v.parse().unwrap_or(self.security.refresh_token_ttl_days);
        }

        // Upload overrides
        if let Ok(v) = env::var("UPLOAD_DIR") {
            self.uploads.root_dir = v;
        }
        if let Ok(v) = env::var("UPLOAD_MAX_BYTES") {
            self.uploads.max_upload_bytes = v.parse().unwrap_or(self.uploads.max_upload_bytes);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
                // Development-only fallbacks; production requires the env vars
                access_token_secret: "dev-access-secret".to_string(),
                refresh_token_secret: "dev-refresh-secret".to_string(),
                access_token_ttl_hours: 3,
                refresh_token_ttl_days: 7,
            },
            uploads: UploadConfig {
                root_dir: "uploads".to_string(),
                max_upload_bytes: 8 * 1024 * 1024, // 8MB
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                max_request_size_bytes: 10 * 1024 * 1024,
            },
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging-admin.example.com".to_string()],
                access_token_secret: String::new(),
                refresh_token_secret: String::new(),
                access_token_ttl_hours: 3,
                refresh_token_ttl_days: 7,
            },
            uploads: UploadConfig {
                root_dir: "/var/lib/catalog-api/uploads".to_string(),
                max_upload_bytes: 8 * 1024 * 1024,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                max_request_size_bytes: 10 * 1024 * 1024,
            },
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://admin.example.com".to_string()],
                // Must come from ACCESS_TOKEN_SECRET / REFRESH_TOKEN_SECRET
                access_token_secret: String::new(),
                refresh_token_secret: String::new(),
                access_token_ttl_hours: 3,
                refresh_token_ttl_days: 7,
            },
            uploads: UploadConfig {
                root_dir: "/var/lib/catalog-api/uploads".to_string(),
                max_upload_bytes: 8 * 1024 * 1024,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.security.access_token_ttl_hours, 3);
        assert_eq!(config.security.refresh_token_ttl_days, 7);
        assert!(!config.security.access_token_secret.is_empty());
        assert_ne!(
            config.security.access_token_secret,
            config.security.refresh_token_secret
        );
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        // Production refuses to ship baked-in secrets
        assert!(config.security.access_token_secret.is_empty());
        assert!(config.security.refresh_token_secret.is_empty());
        assert_eq!(config.database.max_connections, 50);
    }
}
