//! olp-lc (Learning Content) - learning hierarchy CRUD service

use anyhow::Result;
use clap::Parser;
use tracing::info;

use olp_common::api::auth::load_auth_config;
use olp_common::{config, db};
use olp_lc::{app_state, build_router, DEFAULT_PORT, MODULE};

#[derive(Parser, Debug)]
#[command(name = "olp-lc", about = "OLPS Learning Content service")]
struct Args {
    /// Root folder containing olp.db (overrides OLP_ROOT_FOLDER)
    #[arg(long)]
    root_folder: Option<String>,

    /// Port to bind (overrides the lc_port setting)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting OLPS Learning Content (olp-lc) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref());
    let db_path = config::ensure_root_folder(&root_folder)?;
    info!("Database path: {}", db_path.display());

    let pool = db::init_database(&db_path).await?;
    let auth = load_auth_config(&pool).await?;
    let port = config::resolve_port(&pool, "lc", args.port, DEFAULT_PORT).await?;

    let state = app_state(pool, auth);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("{} listening on http://127.0.0.1:{}", MODULE, port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
