//! Merit API server binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "merit_server", about = "Merit API server")]
struct Args {
    /// Port to listen on (0 = ephemeral).
    #[arg(long, default_value_t = 3200)]
    port: u16,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/merit"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Directory for daily audit log files.
    #[arg(long, env = "AUDIT_LOG_DIR", default_value = "logs")]
    audit_log_dir: PathBuf,
}

/// How often expired cache entries and stale rate-limit windows are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Rate-limit keys idle for this long are dropped by the sweeper.
const WINDOW_RETENTION: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,merit_api=debug,merit_core=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    info!(port = args.port, "starting merit_server");

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    info!("running database migrations");
    merit_api::migrate(&pool).await?;

    let config = merit_api::config::ApiConfig {
        bind_addr: format!("127.0.0.1:{}", args.port),
        pg_connection_url: args.database_url,
        jwt_secret: merit_core::auth::jwt::resolve_jwt_secret(),
        audit_log_dir: args.audit_log_dir,
    };

    let state = merit_api::AppState::new(pool, config.clone());

    // Periodic maintenance: evict expired permission cache entries and
    // forget rate-limit keys that have gone quiet.
    tokio::spawn({
        let permissions = state.permissions.clone();
        let limiter = state.limiter.clone();
        async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                permissions.sweep();
                limiter.sweep(WINDOW_RETENTION);
            }
        }
    });

    let app = merit_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
