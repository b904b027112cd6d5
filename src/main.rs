//! Multi-Database MCP Server - Main entry point.
//!
//! This server provides MCP (Model Context Protocol) tools for AI assistants
//! to query one MySQL, PostgreSQL, SQLite, SQL Server or Oracle database.

use multi_db_mcp::audit::{AuditEntry, AuditSink, JsonlAuditSink, SYSTEM_TOOL};
use multi_db_mcp::config::{Config, TransportMode};
use multi_db_mcp::db::{AdapterOptions, create_adapter_with};
use multi_db_mcp::gateway::Gateway;
use multi_db_mcp::models::SUPPORTED_SCHEMES;
use multi_db_mcp::transport::{HttpTransport, StdioTransport, Transport};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout carries the stdio protocol.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Record a fatal startup error and terminate.
fn fail_startup(sink: &dyn AuditSink, message: &str) -> ! {
    error!(error = %message, "Startup failed");
    sink.record(&AuditEntry::failure(SYSTEM_TOOL, 0, message));
    eprintln!("Error: {message}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();

    init_tracing(&config);

    let sink: Arc<dyn AuditSink> = Arc::new(JsonlAuditSink::new(config.audit_dir()));
    sink.record(
        &AuditEntry::success(SYSTEM_TOOL, 0).with_summary(json!({"event": "Server starting"})),
    );

    info!(
        transport = %config.transport,
        read_only = config.read_only,
        audit_dir = %config.audit_dir().display(),
        "Starting Multi-Database MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let Some(url) = config.database_url() else {
        fail_startup(
            sink.as_ref(),
            &format!("DATABASE_URL is not set. Supported schemes: {SUPPORTED_SCHEMES}"),
        );
    };

    let options = AdapterOptions::default().with_max_connections(config.max_connections);
    let adapter = match create_adapter_with(url, options) {
        Ok(adapter) => adapter,
        Err(e) => fail_startup(sink.as_ref(), &e.to_string()),
    };

    let gateway = Arc::new(Gateway::new(adapter, sink));
    info!(dialect = %gateway.db_type(), "Database adapter created");

    // Protocol initialisation must not wait on an unreachable database
    let connecting = Gateway::spawn_connect(&gateway);

    let result = match config.transport {
        TransportMode::Stdio => {
            info!("Using stdio transport");
            StdioTransport::new(gateway.clone(), config.read_only)
                .run()
                .await
        }
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            HttpTransport::new(
                gateway.clone(),
                config.read_only,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            )
            .run()
            .await
        }
    };

    gateway.shutdown(connecting).await;

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
