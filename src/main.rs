use anyhow::{Context, Result};
use std::path::Path;
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;
use upload_intake::{AppState, build_app, config, services::storage_service::DiskStore};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting upload-intake with config: {:?}", cfg);

    // --- Ensure directories exist ---
    ensure_dir(&cfg.uploads_dir, "uploads").await?;
    if !cfg.public_dir.is_dir() {
        tracing::warn!(
            "Public directory {} not found; static requests will return 404",
            cfg.public_dir.display()
        );
    }

    // --- Build router ---
    let state = AppState::new(DiskStore::new(cfg.uploads_dir.clone()));
    let app = build_app(state, &cfg.public_dir);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ensure_dir(path: &Path, label: &str) -> Result<()> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        fs::create_dir_all(path)
            .await
            .with_context(|| format!("creating {} directory {}", label, path.display()))?;
        tracing::info!("Created {} directory at {}", label, path.display());
    }
    Ok(())
}
