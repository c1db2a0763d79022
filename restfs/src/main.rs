use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use restfs::api;
use restfs::config::Config;
use restfs::utils::cli::Args;
use restfs::utils::state::AppState;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("restfs=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let config = validate_config(&args).await?;
    let state = Arc::new(AppState::new(config)?);
    tracing::info!("serving {}", state.config.root_dir.display());

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", args.host, args.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down...");
}

async fn validate_config(args: &Args) -> anyhow::Result<Config> {
    let mut validation_errors = Vec::new();

    let root_dir = Path::new(&args.root);
    match tokio::fs::metadata(root_dir).await {
        Ok(meta) => {
            if !meta.is_dir() {
                validation_errors.push(format!(
                    "RESTFS_ROOTDIR `{}` exists but is not a directory",
                    args.root,
                ));
            }
        }
        Err(_) => validation_errors.push(format!("RESTFS_ROOTDIR `{}` does not exist.", args.root)),
    }

    if !args.url.starts_with("http://") && !args.url.starts_with("https://") {
        validation_errors.push(format!(
            "RESTFS_PUBLIC_URL `{}` must start with http:// or https://",
            args.url,
        ));
    }

    if !validation_errors.is_empty() {
        anyhow::bail!(validation_errors.join("\n"));
    }

    Ok(Config {
        host: args.host.clone(),
        port: args.port,
        root_dir: tokio::fs::canonicalize(root_dir).await?,
        public_url: args.url.trim_end_matches('/').to_string(),
    })
}
