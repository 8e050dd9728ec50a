/*!
Tool dispatch: maps a tool name and its untyped payload to a scanner run.

`ToolKind` is the closed catalog (name, description, input schema).
`ToolDispatcher::dispatch` decodes and validates the payload, renders
the command line, runs it and wraps the labeled output as the tool result.
Invalid payloads and unknown names are rejected before anything is spawned.
*/

use std::io;
use std::path::Path;
use std::sync::Arc;

use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use rmcp::schemars::{self, JsonSchema};
use serde::Serialize;

use crate::config::ServerConfig;
use crate::mapi::request::decode;
use crate::mapi::{
    CommandBuilder, DefectListRequest, DiscoverRequest, Invocation, ProcessRunner, RunRequest,
    RunnerError, ValidationError,
};

const DISCOVERY_NOTE: &str = "These API specifications were found by mapi discover. \
They need no further prioritization: pass any of them to the run tool as `specification`.";

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode tool result: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("input schema of {0} is not a JSON object")]
    Schema(&'static str),
}

/// Prefixes put in front of captured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Labels {
    pub success: &'static str,
    pub failure: &'static str,
}

const RUN_LABELS: Labels = Labels {
    success: "mapi run output:",
    failure: "mapi run failed:",
};

const DEFECT_LIST_LABELS: Labels = Labels {
    success: "mapi defect list output:",
    failure: "mapi defect list failed:",
};

/// A successful discover answers with a `DiscoveryReport`; only failures are labeled.
const DISCOVER_FAILED: &str = "mapi discover failed:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Run,
    DefectList,
    Discover,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::Run, ToolKind::DefectList, ToolKind::Discover];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Run => "run",
            ToolKind::DefectList => "defect_list",
            ToolKind::Discover => "discover",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::Run => {
                "Run a mapi API fuzzing scan against a live API described by an OpenAPI specification. \
                 Returns the last 50 lines of scanner output."
            }
            ToolKind::DefectList => "List the defects mapi found in a previous run, by run number.",
            ToolKind::Discover => {
                "Probe a host and port for API specifications. Returns the paths of the \
                 specifications found, ready to be scanned with the run tool."
            }
        }
    }

    /// JSON schema derived from the request type.
    pub fn input_schema(self) -> Result<JsonObject, ToolError> {
        match self {
            ToolKind::Run => schema_of::<RunRequest>(self.name()),
            ToolKind::DefectList => schema_of::<DefectListRequest>(self.name()),
            ToolKind::Discover => schema_of::<DiscoverRequest>(self.name()),
        }
    }

    pub fn descriptor(self) -> Result<Tool, ToolError> {
        Ok(Tool::new(self.name(), self.description(), self.input_schema()?))
    }
}

fn schema_of<T: JsonSchema>(tool: &'static str) -> Result<JsonObject, ToolError> {
    match serde_json::to_value(schemars::schema_for!(T))? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(ToolError::Schema(tool)),
    }
}

#[derive(Debug, Serialize)]
struct DiscoveryReport {
    note: &'static str,
    specifications: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    config: Arc<ServerConfig>,
    runner: ProcessRunner,
}

impl ToolDispatcher {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        let runner = ProcessRunner::new(config.timeout, config.max_concurrent);
        Self { config, runner }
    }

    pub fn list_tools(&self) -> Result<Vec<Tool>, ToolError> {
        ToolKind::ALL.into_iter().map(ToolKind::descriptor).collect()
    }

    pub async fn dispatch(
        &self,
        name: &str,
        payload: Option<JsonObject>,
    ) -> Result<CallToolResult, ToolError> {
        let kind =
            ToolKind::from_name(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tracing::debug!(tool = kind.name(), "dispatching tool call");

        match kind {
            ToolKind::Run => {
                let req: RunRequest = decode(payload)?;
                let invocation = self.builder().run(&req);
                self.run_labeled(kind, RUN_LABELS, &invocation).await
            }
            ToolKind::DefectList => {
                let req: DefectListRequest = decode(payload)?;
                let invocation = self.builder().defect_list(&req);
                self.run_labeled(kind, DEFECT_LIST_LABELS, &invocation).await
            }
            ToolKind::Discover => {
                let req: DiscoverRequest = decode(payload)?;
                self.discover(&req).await
            }
        }
    }

    fn builder(&self) -> CommandBuilder<'_> {
        CommandBuilder::new(&self.config.mapi_bin, &self.config.coordinate)
    }

    async fn run_labeled(
        &self,
        kind: ToolKind,
        labels: Labels,
        invocation: &Invocation,
    ) -> Result<CallToolResult, ToolError> {
        let outcome = self.runner.execute(invocation).await?;
        if outcome.dropped_lines > 0 {
            tracing::debug!(tool = kind.name(), dropped = outcome.dropped_lines, "output truncated");
        }
        Ok(CallToolResult::success(vec![Content::text(
            outcome.labeled(labels.success, labels.failure),
        )]))
    }

    async fn discover(&self, req: &DiscoverRequest) -> Result<CallToolResult, ToolError> {
        let dir = &self.config.discover_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| ToolError::Io {
                context: format!("cannot create {}", dir.display()),
                source,
            })?;

        let invocation = self.builder().discover(req, dir);
        let outcome = self.runner.execute(&invocation).await?;
        if !outcome.success {
            return Ok(CallToolResult::success(vec![Content::text(
                outcome.prefixed(DISCOVER_FAILED),
            )]));
        }

        let report = DiscoveryReport {
            note: DISCOVERY_NOTE,
            specifications: list_entries(dir).await?,
        };
        tracing::info!(found = report.specifications.len(), "discovery finished");
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&report)?,
        )]))
    }
}

/// Paths of all entries in `dir`, sorted.
async fn list_entries(dir: &Path) -> Result<Vec<String>, ToolError> {
    let io_err = |source: io::Error| ToolError::Io {
        context: format!("cannot list {}", dir.display()),
        source,
    };
    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        paths.push(entry.path().display().to_string());
    }
    paths.sort();
    Ok(paths)
}

/* ---- Tests ---- */
