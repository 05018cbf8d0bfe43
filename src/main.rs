//! Action server binary.
//!
//! Loads configuration, installs logging and serves a demo `exec` action
//! behind the logging and recovery middlewares.
//!
//! ```text
//! curl 'http://localhost:8080/?Action=exec&test=1'
//! curl -d '{"Action":"exec","test":1}' http://localhost:8080/
//! ```

use std::path::PathBuf;

use action_server::{
    config::{load_config, resolve_bind_address, ServerConfig},
    middleware::{recovery, request_logger, response_logger},
    observability::logging,
    ActionServer, Context, HttpServer, Shutdown,
};
use axum::http::StatusCode;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "action-server")]
#[command(about = "Single-endpoint HTTP server dispatching on the Action parameter", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding PORT and the configuration file.
    #[arg(short, long)]
    bind: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ExecRequest {
    #[serde(default, alias = "Action")]
    action: String,
    #[serde(default)]
    test: i64,
}

async fn exec(ctx: &mut Context) -> action_server::Result<()> {
    let request: ExecRequest = ctx.bind().await?;
    ctx.jsonp(
        StatusCode::OK,
        &json!({
            "code": 0,
            "message": "succeed",
            "data": request,
        }),
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    logging::init(&config.logging)?;

    let port = std::env::var("PORT").ok();
    let bind_address = resolve_bind_address(cli.bind.as_deref(), port.as_deref(), &config);

    tracing::info!(
        bind_address = %bind_address,
        max_body_bytes = config.listener.max_body_bytes,
        pool_capacity = config.pool.capacity,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let mut server = ActionServer::with_config(config);
    server.use_middleware([request_logger(), response_logger(), recovery(None)]);
    server.register("exec", |ctx| Box::pin(exec(ctx)));

    let listener = TcpListener::bind(&bind_address).await?;
    let shutdown = Shutdown::new();
    HttpServer::new(server).run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
