/*!
Subcommand modules.

  serve.rs    (ServeArgs + execute_serve)    run the MCP server on stdio
  version.rs  (execute_version)              print server / scanner versions

Conventions:
  - Each subcommand module exposes one public `execute_*` function returning
    `anyhow::Result<()>`.
  - `main` stays synchronous; a subcommand that needs async work builds its own
    Tokio runtime.
*/

pub mod serve;
pub mod version;

pub use serve::{ServeArgs, execute_serve};
pub use version::execute_version;
