use bookshelf::cli::{
    Args, build_config, init_logging, load_jwt_secret, load_password_salt, open_database,
};
use bookshelf::password::PasswordHasher;
use bookshelf::run_server;
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(salt) = load_password_salt(args.password_salt_file.as_deref()) else {
        std::process::exit(1);
    };

    let password_hasher = match PasswordHasher::new(salt.as_bytes()) {
        Ok(hasher) => hasher,
        Err(e) => {
            error!(error = %e, "Invalid password hashing configuration");
            std::process::exit(1);
        }
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let config = build_config(&args, db, jwt_secret, password_hasher);

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(_) => info!(address = %addr, "Listening"),
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
