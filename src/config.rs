use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Auth
    pub jwt_secret: String,

    // Site access
    pub access_window_minutes: i64,
    pub geofence_tolerance_meters: f64,

    // Uploads / object storage
    pub max_upload_bytes: usize,
    pub s3_bucket: String,
    pub s3_endpoint_url: Option<String>,
    pub s3_public_base_url: String,

    // Delivery-note recognition service
    pub recognition_service_url: String,
    pub recognition_service_token: String,
    pub recognition_timeout_seconds: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        // Database
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Auth
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

        // Site access
        let access_window_minutes = env::var("ACCESS_WINDOW_MINUTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(480); // one work shift
        let geofence_tolerance_meters = env::var("GEOFENCE_TOLERANCE_METERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(200.0);

        // Uploads / object storage
        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10 * 1024 * 1024);
        let s3_bucket = env::var("S3_BUCKET").context("S3_BUCKET must be set")?;
        let s3_endpoint_url = env::var("S3_ENDPOINT_URL").ok().filter(|s| !s.is_empty());
        let s3_public_base_url = env::var("S3_PUBLIC_BASE_URL")
            .context("S3_PUBLIC_BASE_URL must be set")?
            .trim_end_matches('/')
            .to_string();

        // Recognition service
        let recognition_service_url = env::var("RECOGNITION_SERVICE_URL")
            .unwrap_or_else(|_| "http://recognition:8000".to_string());
        let recognition_service_token =
            env::var("RECOGNITION_SERVICE_TOKEN").unwrap_or_default();
        let recognition_timeout_seconds = env::var("RECOGNITION_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(120); // LLM extraction is slow

        Ok(Settings {
            env,
            server_addr,
            database_url,
            database_max_connections,
            cors_allow_origins,
            jwt_secret,
            access_window_minutes,
            geofence_tolerance_meters,
            max_upload_bytes,
            s3_bucket,
            s3_endpoint_url,
            s3_public_base_url,
            recognition_service_url,
            recognition_service_token,
            recognition_timeout_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parses_aliases() {
        assert_eq!(Environment::from_str("production"), Environment::Prod);
        assert_eq!(Environment::from_str("PROD"), Environment::Prod);
        assert_eq!(Environment::from_str("staging"), Environment::Staging);
        assert_eq!(Environment::from_str("anything-else"), Environment::Dev);
    }
}
