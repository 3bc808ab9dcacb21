//! Environment configuration for the inbox server.

use anyhow::Context;

/// Default listen port.
const DEFAULT_PORT: u16 = 8080;

/// Default ingress body ceiling: 1 MiB.
const DEFAULT_MAX_BODY_BYTES: usize = 1_048_576;

/// Runtime configuration, loaded once at startup.
///
/// Required variables fail startup when absent; the blob store and cipher
/// additionally validate their own inputs during construction.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub app_port: u16,
    pub max_body_bytes: usize,
    pub payload_enc_key_b64: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_bucket: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let payload_enc_key_b64 =
            std::env::var("PAYLOAD_ENC_KEY_B64").context("PAYLOAD_ENC_KEY_B64 not set")?;

        let app_port = match std::env::var("APP_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("APP_PORT is not a valid port: {raw}"))?,
            Err(_) => DEFAULT_PORT,
        };

        // Only a positive value overrides the default.
        let max_body_bytes = std::env::var("MAX_BODY_BYTES")
            .ok()
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|n| *n > 0)
            .map_or(DEFAULT_MAX_BODY_BYTES, |n| n as usize);

        Ok(Self {
            database_url,
            app_port,
            max_body_bytes,
            payload_enc_key_b64,
            s3_endpoint: std::env::var("S3_ENDPOINT").unwrap_or_default(),
            s3_region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            s3_bucket: std::env::var("S3_BUCKET").unwrap_or_default(),
            s3_access_key: std::env::var("S3_ACCESS_KEY").unwrap_or_default(),
            s3_secret_key: std::env::var("S3_SECRET_KEY").unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment access is process-global, so everything lives in one test.
    #[test]
    fn test_from_env() {
        std::env::remove_var("DATABASE_URL");
        assert!(Config::from_env().is_err(), "DATABASE_URL is required");

        std::env::set_var("DATABASE_URL", "postgres://localhost/inbox");
        std::env::set_var("PAYLOAD_ENC_KEY_B64", "a2V5");
        std::env::remove_var("APP_PORT");
        std::env::remove_var("MAX_BODY_BYTES");

        let config = Config::from_env().expect("config loads");
        assert_eq!(config.app_port, 8080);
        assert_eq!(config.max_body_bytes, 1_048_576);
        assert_eq!(config.s3_region, "us-east-1");

        std::env::set_var("APP_PORT", "9090");
        std::env::set_var("MAX_BODY_BYTES", "10");
        let config = Config::from_env().expect("config loads");
        assert_eq!(config.app_port, 9090);
        assert_eq!(config.max_body_bytes, 10);

        // Non-positive override falls back to the default.
        std::env::set_var("MAX_BODY_BYTES", "-5");
        let config = Config::from_env().expect("config loads");
        assert_eq!(config.max_body_bytes, 1_048_576);

        std::env::set_var("APP_PORT", "not-a-port");
        assert!(Config::from_env().is_err());
    }
}
