//! workflow-bridge server - main entry point.
//!
//! Starts the admin surface plus one tool transport:
//! - stdio: newline-delimited JSON (plain or JSON-RPC) on stdin/stdout
//! - http: `/tools`, `/call`, `/health`, `/sse`
//!
//! `--check` runs the operator self-check instead and exits.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use workflow_bridge::rate_limiter::RateLimiter;
use workflow_bridge::tools::ToolRegistry;
use workflow_bridge::transport::{admin, http, StdioServer};
use workflow_bridge::types::ServerMode;
use workflow_bridge::{selfcheck, Config, Dispatcher, Error, RemoteApiClient, WorkflowApi};

#[derive(Parser, Debug)]
#[command(name = "workflow-bridge")]
#[command(version, about = "Schema-validated tool facade over a workflow-automation platform")]
struct Args {
    /// Tool transport; overrides MCP_SERVER_MODE.
    #[arg(long, value_parser = parse_mode)]
    mode: Option<ServerMode>,

    /// Environment file loaded before reading configuration.
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// Run the connectivity self-check and exit.
    #[arg(long)]
    check: bool,
}

fn parse_mode(raw: &str) -> Result<ServerMode, String> {
    raw.parse().map_err(|e: Error| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // A missing env file is normal in containers.
    let _ = dotenvy::from_path(&args.env_file);

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("workflow-bridge: {err}");
            return ExitCode::from(2);
        }
    };
    if let Some(mode) = args.mode {
        config.server.mode = mode;
    }

    workflow_bridge::observability::init_tracing(&config.observability);

    match run(args, config).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "workflow-bridge stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, config: Config) -> Result<ExitCode, Error> {
    let config = Arc::new(config);
    let api: Arc<dyn WorkflowApi> = Arc::new(RemoteApiClient::new(&config.remote)?);
    let registry = Arc::new(ToolRegistry::with_all_operations());

    if args.check {
        let report = selfcheck::run(&config, api.as_ref(), &registry).await;
        println!("{report}");
        return Ok(if report.passed() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
    let dispatcher = Dispatcher::new(registry.clone(), api.clone(), limiter);

    tracing::info!(
        mode = ?config.server.mode,
        tools = registry.len(),
        remote = %config.remote.base_url,
        rate_limited = config.rate_limit.enabled,
        "workflow-bridge starting"
    );

    match api.health_check().await {
        Ok(_) => tracing::info!("remote platform reachable"),
        Err(err) => tracing::warn!(error = %err, "remote platform not reachable at startup"),
    }

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
            }
            shutdown.cancel();
        }
    });

    let admin_listener = TcpListener::bind(config.server.admin_addr()).await?;
    let admin_task = tokio::spawn(admin::serve(
        admin_listener,
        api.clone(),
        config.clone(),
        shutdown.clone(),
    ));

    let transport_result = match config.server.mode {
        ServerMode::Stdio => {
            StdioServer::new(dispatcher, shutdown.clone(), config.server.max_request_bytes)
                .run()
                .await
        }
        ServerMode::Http => {
            let listener = TcpListener::bind(config.server.tool_addr()).await?;
            http::serve(
                listener,
                dispatcher,
                shutdown.clone(),
                config.server.max_request_bytes,
            )
            .await
        }
    };

    // Stdin EOF ends the stdio transport; take the admin surface down with it.
    shutdown.cancel();
    transport_result?;

    admin_task
        .await
        .map_err(|e| Error::internal(format!("admin task failed: {e}")))??;

    tracing::info!("workflow-bridge stopped");
    Ok(ExitCode::SUCCESS)
}
