/*!
Startup configuration.

`ServerConfig` is resolved once from CLI settings plus the environment and then
shared read-only (`Arc`) by every tool call.
*/

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the scanner binary path.
pub const MAPI_BIN_ENV: &str = "MAPI_BIN";
pub const DEFAULT_MAPI_BIN: &str = "/usr/local/bin/mapi";
/// Credential the scanner needs; required before serving.
pub const TOKEN_ENV: &str = "MAYHEM_TOKEN";
/// Subdirectory of the working directory that `discover` writes into.
pub const DISCOVER_DIR_NAME: &str = "discovered-specs";

pub const DEFAULT_PROJECT: &str = "mcp-mapi-project";
pub const DEFAULT_TARGET: &str = "mcp-mapi-target";
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} not set; cannot start MAPI server")]
    MissingToken(&'static str),

    #[error("{0} must not be empty")]
    EmptyCoordinate(&'static str),

    #[error("max concurrent scans must be at least 1")]
    ZeroConcurrency,

    #[error("cannot determine working directory: {0}")]
    WorkingDir(#[source] std::io::Error),
}

/// Workspace / project / target triple identifying where scans run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinate {
    pub workspace: String,
    pub project: String,
    pub target: String,
}

impl Coordinate {
    pub fn new(
        workspace: impl Into<String>,
        project: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            workspace: workspace.into(),
            project: project.into(),
            target: target.into(),
        }
    }

    /// `<workspace>/<project>/<target>/<run_id>`
    pub fn run_path(&self, run_id: i64) -> String {
        format!("{self}/{run_id}")
    }

    fn check(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("workspace", &self.workspace),
            ("project", &self.project),
            ("target", &self.target),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyCoordinate(name));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.workspace, self.project, self.target)
    }
}

/// Settings that come from the command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub coordinate: Coordinate,
    pub timeout: Option<Duration>,
    pub max_concurrent: usize,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub mapi_bin: PathBuf,
    pub coordinate: Coordinate,
    pub discover_dir: PathBuf,
    pub timeout: Option<Duration>,
    pub max_concurrent: usize,
}

impl ServerConfig {
    /// Resolve against the process environment and working directory.
    pub fn from_env(settings: Settings) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(ConfigError::WorkingDir)?;
        Self::resolve(settings, &cwd, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup. Empty values count as unset.
    pub fn resolve(
        settings: Settings,
        cwd: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if env(TOKEN_ENV).is_none() {
            return Err(ConfigError::MissingToken(TOKEN_ENV));
        }
        settings.coordinate.check()?;
        if settings.max_concurrent == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        Ok(Self {
            mapi_bin: mapi_bin_with(env),
            coordinate: settings.coordinate,
            discover_dir: cwd.join(DISCOVER_DIR_NAME),
            timeout: settings.timeout,
            max_concurrent: settings.max_concurrent,
        })
    }
}

/// Scanner binary from `MAPI_BIN`, falling back to the default install path.
pub fn mapi_bin() -> PathBuf {
    mapi_bin_with(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
}

fn mapi_bin_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    env(MAPI_BIN_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MAPI_BIN))
}
