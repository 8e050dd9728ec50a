//! End-to-end: spawn the server binary and talk MCP to it over stdio with the
//! rmcp client. `/bin/echo` stands in for the scanner so results are predictable.

use anyhow::Result;
use rmcp::model::CallToolRequestParam;
use rmcp::service::RunningService;
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use tokio::process::Command;

const SERVER: &str = env!("CARGO_BIN_EXE_mcp-server-mapi");

async fn connect(mapi_bin: &str) -> Result<RunningService<RoleClient, ()>> {
    let service = ()
        .serve(TokioChildProcess::new(Command::new(SERVER).configure(
            |c| {
                c.args(["serve", "-w", "w", "-p", "p", "-t", "t"]);
                c.env("MAYHEM_TOKEN", "test-token");
                c.env("MAPI_BIN", mapi_bin);
                c.current_dir(std::env::temp_dir());
                c.stderr(std::process::Stdio::null());
            },
        ))?)
        .await?;
    Ok(service)
}

fn args(value: serde_json::Value) -> Option<serde_json::Map<String, serde_json::Value>> {
    value.as_object().cloned()
}

#[tokio::test]
async fn lists_tool_catalog() -> Result<()> {
    let service = connect("/bin/echo").await?;
    let tools = service.list_tools(Default::default()).await?;
    let val = serde_json::to_value(&tools)?;
    let mut names: Vec<String> = val["tools"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|t| t["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    assert_eq!(names, ["defect_list", "discover", "run"]);
    let _ = service.cancel().await;
    Ok(())
}

#[tokio::test]
async fn defect_list_runs_scanner() -> Result<()> {
    let service = connect("/bin/echo").await?;
    let result = service
        .call_tool(CallToolRequestParam {
            name: "defect_list".into(),
            arguments: args(serde_json::json!({ "run_id": 42 })),
        })
        .await?;
    let val = serde_json::to_value(&result)?;
    assert_eq!(
        val["content"][0]["text"],
        serde_json::json!("mapi defect list output:\ndefect list w/p/t/42")
    );
    let _ = service.cancel().await;
    Ok(())
}

#[tokio::test]
async fn rejects_unknown_tool_and_bad_payload() -> Result<()> {
    let service = connect("/bin/echo").await?;

    let unknown = service
        .call_tool(CallToolRequestParam {
            name: "format_disk".into(),
            arguments: None,
        })
        .await;
    assert!(unknown.is_err());

    let missing_spec = service
        .call_tool(CallToolRequestParam {
            name: "run".into(),
            arguments: args(serde_json::json!({
                "duration": "auto",
                "options": { "url": "https://api.example.com" }
            })),
        })
        .await;
    assert!(missing_spec.is_err());

    let _ = service.cancel().await;
    Ok(())
}

#[test]
fn refuses_to_start_without_token() {
    let output = std::process::Command::new(SERVER)
        .args(["serve", "-w", "w"])
        .env_remove("MAYHEM_TOKEN")
        .stdin(std::process::Stdio::null())
        .output()
        .expect("spawn server");
    assert!(!output.status.success());
    assert!(output.stdout.is_empty(), "nothing may reach stdout");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("MAYHEM_TOKEN not set").count(), 1, "{stderr}");
}
