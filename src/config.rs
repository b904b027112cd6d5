//! Configuration handling for the multi-database MCP server.
//!
//! This module provides configuration management via CLI arguments and environment
//! variables. A `.env` file in the working directory is loaded before parsing.

use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";
pub const DEFAULT_LOG_PATH: &str = "./logs";
pub const DEFAULT_MAX_CONNECTIONS: u32 = crate::db::DEFAULT_MAX_CONNECTIONS;

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP (for web clients)
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Configuration for the multi-database MCP server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "multi-db-mcp",
    about = "MCP server exposing MySQL, PostgreSQL, SQLite, SQL Server and Oracle through one tool set",
    version,
    author
)]
pub struct Config {
    /// Database connection URL. The scheme selects the dialect:
    /// mysql://, postgres://, mssql://, oracle://, sqlite:// or a .db/.sqlite path.
    #[arg(long = "database-url", value_name = "URL", env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Withhold write_query from the tool list
    #[arg(long, env = "MCP_DB_READ_ONLY")]
    pub read_only: bool,

    /// Directory for audit logs. A path ending in .jsonl or .log selects its parent directory.
    #[arg(long, default_value = DEFAULT_LOG_PATH, env = "MCP_LOG_PATH")]
    pub log_path: PathBuf,

    /// Pool size for MySQL and PostgreSQL
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_CONNECTIONS,
        env = "MCP_DB_MAX_CONNECTIONS"
    )]
    pub max_connections: u32,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "MCP_HTTP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "MCP_HTTP_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "MCP_ENDPOINT"
    )]
    pub mcp_endpoint: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Load `.env`, then parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        // A missing .env file is not an error
        let _ = dotenvy::dotenv();
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            database_url: None,
            read_only: false,
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// The configured URL, if present and non-blank.
    pub fn database_url(&self) -> Option<&str> {
        self.database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Directory the audit sink writes into.
    pub fn audit_dir(&self) -> PathBuf {
        resolve_log_dir(&self.log_path)
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Treat a path naming a log file as its containing directory.
pub fn resolve_log_dir(path: &Path) -> PathBuf {
    let is_file = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl") || ext.eq_ignore_ascii_case("log"));

    if is_file {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transport, TransportMode::Stdio);
        assert_eq!(config.http_host, DEFAULT_HTTP_HOST);
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.max_connections, 10);
        assert!(!config.read_only);
        assert!(config.database_url().is_none());
    }

    #[test]
    fn test_http_bind_addr() {
        let config = Config {
            http_host: "0.0.0.0".to_string(),
            http_port: 3000,
            ..Config::default()
        };
        assert_eq!(config.http_bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_blank_url_is_missing() {
        let config = Config {
            database_url: Some("   ".to_string()),
            ..Config::default()
        };
        assert!(config.database_url().is_none());
    }

    #[test]
    fn test_parse_cli_flags() {
        let config = Config::try_parse_from([
            "multi-db-mcp",
            "--database-url",
            "sqlite://data.db",
            "--read-only",
            "--max-connections",
            "4",
            "--transport",
            "http",
            "--log-path",
            "/var/log/mcp/audit.jsonl",
        ])
        .unwrap();

        assert_eq!(config.database_url(), Some("sqlite://data.db"));
        assert!(config.read_only);
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.transport, TransportMode::Http);
        assert_eq!(config.audit_dir(), PathBuf::from("/var/log/mcp"));
    }

    #[test]
    fn test_resolve_log_dir() {
        assert_eq!(resolve_log_dir(Path::new("./logs")), PathBuf::from("./logs"));
        assert_eq!(
            resolve_log_dir(Path::new("/tmp/audit/app.log")),
            PathBuf::from("/tmp/audit")
        );
        assert_eq!(resolve_log_dir(Path::new("audit.jsonl")), PathBuf::from("."));
    }
}
