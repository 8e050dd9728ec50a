/*!
`version.rs`

Implements the `version` subcommand: report the server name, the scanner binary
in use and what that binary says about its own version. A broken or missing
binary is reported inline, never as a failure of the command itself.
*/

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use crate::config;
use crate::mapi::{ProcessRunner, command};

const SERVER_NAME: &str = "MAPI Server";
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

pub fn execute_version() -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let line = rt.block_on(version_line(&config::mapi_bin()));
    println!("{line}");
    Ok(())
}

/// `server=...; mapi_bin=...; mapi_version=...`
pub async fn version_line(mapi_bin: &Path) -> String {
    let runner = ProcessRunner::new(Some(VERSION_TIMEOUT), 1);
    let reported = match runner.execute(&command::version(mapi_bin)).await {
        Ok(outcome) if outcome.success => outcome.output.trim().to_string(),
        Ok(outcome) => format!(
            "(error retrieving version) exit code {}: {}",
            outcome
                .exit_code
                .map_or_else(|| "none".to_string(), |c| c.to_string()),
            outcome.output.trim()
        ),
        Err(e) => format!("(error retrieving version) {e}"),
    };
    format!(
        "server={SERVER_NAME}; mapi_bin={}; mapi_version={reported}",
        mapi_bin.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn fake_mapi(name: &str, body: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mcp_server_mapi_version_{}_{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mapi");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn reports_binary_version() {
        let bin = fake_mapi("ok", "echo 'mapi 2.10.4'");
        let line = version_line(&bin).await;
        assert_eq!(
            line,
            format!(
                "server=MAPI Server; mapi_bin={}; mapi_version=mapi 2.10.4",
                bin.display()
            )
        );
    }

    #[tokio::test]
    async fn missing_binary_reported_inline() {
        let line = version_line(Path::new("/nonexistent/mapi")).await;
        assert!(line.starts_with("server=MAPI Server; mapi_bin=/nonexistent/mapi;"));
        assert!(line.contains("mapi_version=(error retrieving version)"), "{line}");
    }

    #[tokio::test]
    async fn failing_binary_reported_inline() {
        let bin = fake_mapi("fail", "echo 'license expired'\nexit 4");
        let line = version_line(&bin).await;
        assert!(
            line.ends_with("mapi_version=(error retrieving version) exit code 4: license expired"),
            "{line}"
        );
    }
}
