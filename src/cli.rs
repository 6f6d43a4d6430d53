//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::cache::MemoryCache;
use crate::db::Database;
use crate::password::PasswordHasher;
use crate::service::AuthTtls;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_PASSWORD_SALT_LENGTH: usize = 8;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "bookshelf",
    about = "Book catalogue with verified sign-up and rotating refresh sessions"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "bookshelf.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Path to file containing the password hashing salt. Prefer using PASSWORD_SALT env var instead
    #[arg(long)]
    pub password_salt_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL", default_value = "900")]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "REFRESH_TOKEN_TTL", default_value = "1209600")]
    pub refresh_token_ttl: u64,

    /// Verification code lifetime in seconds
    #[arg(long, env = "CODE_TTL", default_value = "600")]
    pub code_ttl: u64,

    /// Maximum time in seconds a request may spend on backend calls
    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "10")]
    pub request_timeout: u64,

    /// Sustained sign-up/sign-in/verify requests per second per IP
    #[arg(long, default_value = "10")]
    pub rate_limit_rps: u32,

    /// Burst size for sign-up/sign-in/verify requests per IP
    #[arg(long, default_value = "2")]
    pub rate_limit_burst: u32,

    /// Set the Secure flag on cookies (enable when served over HTTPS)
    #[arg(long)]
    pub secure_cookies: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Read a secret from an environment variable (clearing it) or a file.
/// Returns None and logs an error if the secret is missing or shorter than `min_len`.
fn load_secret(env_var: &str, file: Option<&str>, flag: &str, min_len: usize) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read {} file", env_var);
                return None;
            }
        }
    } else {
        error!(
            "{} is required. Set the {} environment variable (recommended) or use {}",
            env_var, env_var, flag
        );
        return None;
    };

    if secret.len() < min_len {
        error!(
            "{} is shorter than {} characters. Use a longer value",
            env_var, min_len
        );
        return None;
    }

    Some(secret)
}

/// Load JWT secret from environment variable or file.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    load_secret(
        "JWT_SECRET",
        jwt_secret_file,
        "--jwt-secret-file",
        MIN_JWT_SECRET_LENGTH,
    )
}

/// Load the password hashing salt from environment variable or file.
pub fn load_password_salt(password_salt_file: Option<&str>) -> Option<String> {
    load_secret(
        "PASSWORD_SALT",
        password_salt_file,
        "--password-salt-file",
        MIN_PASSWORD_SALT_LENGTH,
    )
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    jwt_secret: String,
    password_hasher: PasswordHasher,
) -> ServerConfig {
    let mut config = ServerConfig::new(
        db,
        jwt_secret.into_bytes(),
        password_hasher,
        Arc::new(MemoryCache::new()),
    );

    config.ttls = AuthTtls {
        access: Duration::from_secs(args.access_token_ttl),
        refresh: Duration::from_secs(args.refresh_token_ttl),
        code: Duration::from_secs(args.code_ttl),
    };
    config.request_timeout = Duration::from_secs(args.request_timeout);
    config.secure_cookies = args.secure_cookies;
    config.rate_limit_per_second = args.rate_limit_rps;
    config.rate_limit_burst = args.rate_limit_burst;

    config
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
