pub mod api;
pub mod audit;
pub mod auth;
pub mod cache;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod deadline;
pub mod jwt;
pub mod otp;
pub mod password;
pub mod rate_limit;
pub mod service;

use api::create_api_router;
use audit::AuditSink;
use axum::Router;
use cache::Cache;
use db::Database;
use jwt::TokenManager;
use otp::{NumericOtp, OtpGenerator};
use password::PasswordHasher;
use rate_limit::RateLimitConfig;
use service::{AuthService, AuthTtls, BookService};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing access tokens
    pub jwt_secret: Vec<u8>,
    /// Hasher with the deployment's fixed salt
    pub password_hasher: PasswordHasher,
    /// Verification code store
    pub cache: Arc<dyn Cache>,
    /// Where audit events are delivered
    pub audit: Arc<dyn AuditSink>,
    /// Source of verification codes
    pub otp: Arc<dyn OtpGenerator>,
    pub ttls: AuthTtls,
    /// Upper bound on a single request's backend work
    pub request_timeout: Duration,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Sustained auth requests per second per IP
    pub rate_limit_per_second: u32,
    /// Auth request burst size per IP
    pub rate_limit_burst: u32,
}

impl ServerConfig {
    /// Config with default lifetimes, a tracing audit sink and numeric codes.
    pub fn new(
        db: Database,
        jwt_secret: Vec<u8>,
        password_hasher: PasswordHasher,
        cache: Arc<dyn Cache>,
    ) -> Self {
        Self {
            db,
            jwt_secret,
            password_hasher,
            cache,
            audit: Arc::new(audit::TracingAuditSink),
            otp: Arc::new(NumericOtp),
            ttls: AuthTtls::default(),
            request_timeout: Duration::from_secs(10),
            secure_cookies: false,
            rate_limit_per_second: 10,
            rate_limit_burst: 2,
        }
    }
}

impl ServerConfig {
    /// Build the per-IP limiter described by this config.
    pub fn rate_limiter(&self) -> Arc<RateLimitConfig> {
        Arc::new(RateLimitConfig::new(
            self.rate_limit_per_second,
            self.rate_limit_burst,
        ))
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    create_app_with_limiter(config, config.rate_limiter())
}

/// Create the application router around an existing rate limiter.
pub fn create_app_with_limiter(config: &ServerConfig, rate_limit: Arc<RateLimitConfig>) -> Router {
    let tokens = Arc::new(TokenManager::new(&config.jwt_secret));

    let auth = Arc::new(AuthService::new(
        Arc::new(config.db.users()),
        Arc::new(config.db.sessions()),
        config.cache.clone(),
        config.password_hasher.clone(),
        config.otp.clone(),
        tokens,
        config.audit.clone(),
        config.ttls,
    ));

    let books = Arc::new(BookService::new(
        Arc::new(config.db.books()),
        config.audit.clone(),
    ));

    let api_router = create_api_router(
        auth,
        books,
        config.request_timeout,
        config.secure_cookies,
        rate_limit,
    );

    Router::new().nest("/api", api_router)
}

/// Run cleanup tasks once and spawn the background scheduler.
pub async fn init_cleanup(db: &Database, cache: &Arc<dyn Cache>, rate_limit: &Arc<RateLimitConfig>) {
    cleanup::run_cleanup(db, cache.as_ref(), rate_limit).await;
    cleanup::spawn_cleanup_scheduler(db.clone(), cache.clone(), rate_limit.clone());
}

/// Resolve once the process receives Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Run the server on the given listener until Ctrl+C. In-flight requests are
/// allowed to finish.
/// Cleanup runs once on startup and then on a schedule.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let rate_limit = config.rate_limiter();
    init_cleanup(&config.db, &config.cache, &rate_limit).await;

    let app = create_app_with_limiter(&config, rate_limit);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
