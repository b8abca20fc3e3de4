use std::sync::Arc;

use aef_backends::{Backend, FileBackend, SqlBackend, SqlBackendConfig, resolve_output_path};
use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let backend: Arc<dyn Backend> = match std::env::var("AEF_DATABASE_URL") {
        Ok(database_url) => {
            let backend = SqlBackend::new(SqlBackendConfig::new(database_url))?;
            backend.connect().await?;
            Arc::new(backend)
        }
        Err(_) => {
            let path = resolve_output_path(None);
            tracing::info!(path = %path.display(), "no database configured, appending to file");
            Arc::new(FileBackend::new(path))
        }
    };

    let addr = std::env::var("AEF_LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    aef_ingest::serve(listener, backend).await?;
    Ok(())
}
