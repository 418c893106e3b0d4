use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context as _;
use axum::response::Html;
use clap::Parser;
use tower_http::services::{ServeDir, ServeFile};

use besselchu::app::AppState;
use besselchu::config::Config;
use besselchu::services::Services;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Directory holding the daily bestseller cache.
    #[arg(long, default_value = ".besselchu")]
    cache_dir: PathBuf,

    /// Background image jobs allowed to run at once.
    #[arg(long, default_value_t = 2)]
    max_concurrency: usize,

    /// Static web assets directory (serve if exists).
    #[arg(long, default_value = "web/dist")]
    web_dir: PathBuf,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    besselchu::logging::init("info")?;

    let args = AppArgs::parse();
    tracing::info!(?args, "starting besselchu-app");

    let config = Config::from_env().context("load config")?;
    if config.openai.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; content generation will fail");
    }
    if config.gemini.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; images will not be generated");
    }
    let services = Services::from_config(&config, &args.cache_dir)?;
    let state = AppState::new(services, args.max_concurrency);

    let mut app = besselchu::app::router(state);

    let web_index = args.web_dir.join("index.html");
    if web_index.exists() {
        let static_files = ServeDir::new(args.web_dir).not_found_service(ServeFile::new(web_index));
        app = app.fallback_service(static_files);
    } else {
        app = app.fallback(|| async {
            Html(
                r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>besselchu-app</title></head>
  <body>
    <h1>besselchu-app</h1>
    <p>web assets not found. The JSON API lives under <code>/api</code>.</p>
  </body>
</html>
"#,
            )
        });
    }

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("install ctrl-c handler: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
