use std::path::PathBuf;

use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    /// Prefix used to build public URLs for stored files.
    pub public_file_base_url: String,
    pub upload_tmp_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub admin: AdminConfig,
    pub smtp: Option<SmtpConfig>,
    pub twilio: Option<TwilioConfig>,
    pub app_base_url: String,
    pub port: u16,
    pub rust_log: String,
}

/// The single admin identity. The password is stored as an argon2 PHC hash.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub user: String,
    pub pass: String,
    pub from_email: String,
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub api_key: String,
    pub api_secret: String,
    pub from_number: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let s3_endpoint = require_env("S3_ENDPOINT")?;
        let s3_bucket = require_env("S3_BUCKET")?;
        let public_file_base_url = optional_env("PUBLIC_FILE_BASE_URL")
            .unwrap_or_else(|| format!("{}/{}", s3_endpoint.trim_end_matches('/'), s3_bucket));

        let jwt_secret = require_env("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            bail!("JWT_SECRET must be at least 32 characters");
        }

        let smtp = optional_env("SMTP_SERVER")
            .map(|server| -> Result<SmtpConfig> {
                Ok(SmtpConfig {
                    server,
                    user: require_env("SMTP_USER")?,
                    pass: require_env("SMTP_PASS")?,
                    from_email: require_env("FROM_EMAIL")?,
                })
            })
            .transpose()?;

        let twilio = optional_env("TWILIO_ACCOUNT_SID")
            .map(|account_sid| -> Result<TwilioConfig> {
                Ok(TwilioConfig {
                    account_sid,
                    api_key: require_env("TWILIO_API_KEY")?,
                    api_secret: require_env("TWILIO_API_SECRET")?,
                    from_number: require_env("TWILIO_FROM_NUMBER")?,
                })
            })
            .transpose()?;

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket,
            s3_endpoint,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            public_file_base_url,
            upload_tmp_dir: optional_env("UPLOAD_TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("jobboard-uploads")),
            jwt_secret,
            token_ttl_secs: optional_env("TOKEN_TTL_SECS")
                .unwrap_or_else(|| "86400".to_string())
                .parse::<u64>()
                .context("TOKEN_TTL_SECS must be a number of seconds")?,
            admin: AdminConfig {
                email: require_env("ADMIN_EMAIL")?.to_lowercase(),
                password_hash: require_env("ADMIN_PASSWORD_HASH")?,
            },
            smtp,
            twilio,
            app_base_url: optional_env("APP_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
