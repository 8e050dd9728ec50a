use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;
mod mapi;
mod mcp;
mod utils;

use cmd::ServeArgs;

/// MCP server for the mapi API security scanner.
///
/// Exposes three tools over stdio (JSON-RPC):
///   run          fuzz a live API from its OpenAPI specification
///   defect_list  list the defects found by a run
///   discover     find API specifications on a host/port
///
/// Environment:
///   MAYHEM_TOKEN  required by `serve`; the server refuses to start without it
///   MAPI_BIN      scanner binary (default /usr/local/bin/mapi)
///   RUST_LOG      overrides the log level chosen with -v / -q
///
/// Logs always go to stderr; stdout belongs to the protocol.
///
/// Examples:
///   mcp-server-mapi serve -w my-workspace
///   mcp-server-mapi -vv serve -w my-workspace -p shop -t api --timeout 3600
///   mcp-server-mapi version
#[derive(Parser, Debug)]
#[command(
    name = "mcp-server-mapi",
    version,
    about = "MAPI Server - mapi functionality for MCP",
    propagate_version = true,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the mapi tools over stdio
    Serve(ServeArgs),

    /// Print server and mapi versions
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    match cli.command {
        Commands::Serve(args) => cmd::execute_serve(args),
        Commands::Version => cmd::execute_version(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn global_verbosity_after_subcommand() {
        let cli = Cli::try_parse_from(["mcp-server-mapi", "serve", "-w", "acme", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Serve(_)));
    }

    #[test]
    fn version_subcommand() {
        let cli = Cli::try_parse_from(["mcp-server-mapi", "-q", "version"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Version));
    }
}
