// main.rs — Portfolio server entry point.
use std::{path::PathBuf, sync::Arc};

use tracing::info;

use portfolio_server::{api, config::Config, state::AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let base_dir = if let Ok(manifest) = std::env::var("CARGO_MANIFEST_DIR") {
        PathBuf::from(manifest)
    } else {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    };
    info!("📂 base_dir = {}", base_dir.display());

    let env_path = base_dir.join(".env");
    if env_path.exists() {
        dotenvy::from_path(&env_path).ok();
    } else {
        dotenvy::dotenv().ok();
    }

    let cfg = Arc::new(Config::load(&base_dir));
    cfg.print_summary();

    let state = AppState::new(Arc::clone(&cfg), base_dir);
    for dir in [state.static_dir(), state.uploads_dir()] {
        std::fs::create_dir_all(&dir).ok();
    }

    let router = api::router(state);

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {addr}: {e}"));
    info!("🌐 HTTP server listening on http://{addr}");

    axum::serve(listener, router).await.expect("axum server error");
}
