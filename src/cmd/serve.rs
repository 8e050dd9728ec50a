/*!
`serve.rs`

Implements the `serve` subcommand: resolve the startup configuration (the
`MAYHEM_TOKEN` credential is mandatory), then run the MCP server on stdio until
the client disconnects.

Nothing in this path may print to stdout; it carries the JSON-RPC stream.
*/

use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{
    Coordinate, DEFAULT_MAX_CONCURRENT, DEFAULT_PROJECT, DEFAULT_TARGET, ServerConfig, Settings,
};
use crate::mcp::MapiServer;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// The user's Mayhem workspace
    #[arg(short = 'w', long)]
    pub workspace: String,

    /// The user's Mayhem project
    #[arg(short = 'p', long, default_value = DEFAULT_PROJECT)]
    pub project: String,

    /// The user's Mayhem target
    #[arg(short = 't', long, default_value = DEFAULT_TARGET)]
    pub target: String,

    /// Kill a scanner process still running after SECS seconds (no limit by default)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum number of scanner processes running at once
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_CONCURRENT)]
    pub max_concurrent: usize,
}

impl ServeArgs {
    fn settings(&self) -> Settings {
        Settings {
            coordinate: Coordinate::new(&self.workspace, &self.project, &self.target),
            timeout: self.timeout.map(Duration::from_secs),
            max_concurrent: self.max_concurrent,
        }
    }
}

pub fn execute_serve(args: ServeArgs) -> Result<()> {
    let config = ServerConfig::from_env(args.settings())?;

    if !config.mapi_bin.exists() {
        tracing::warn!(
            mapi_bin = %config.mapi_bin.display(),
            "mapi binary not found; tool calls will fail until it is installed (set MAPI_BIN to override)"
        );
    }
    tracing::info!(
        coordinate = %config.coordinate,
        mapi_bin = %config.mapi_bin.display(),
        "Starting MAPI Server on stdio..."
    );

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    rt.block_on(serve_stdio(Arc::new(config)))
}

async fn serve_stdio(config: Arc<ServerConfig>) -> Result<()> {
    use rmcp::{ServiceExt, transport::stdio};

    let service = MapiServer::new(config)
        .serve(stdio())
        .await
        .context("Failed to initialize MCP session on stdio")?;
    let reason = service
        .waiting()
        .await
        .context("MCP session terminated abnormally")?;
    tracing::info!(?reason, "MCP session closed");
    Ok(())
}
