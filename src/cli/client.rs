//! Thin MCP client for a running TCP server.
use anyhow::{anyhow, Context, Result};
use rmcp::{
    model::{CallToolRequestParam, CallToolResult, ClientInfo, JsonObject, Tool},
    serve_client,
    service::{RoleClient, RunningService},
};
use serde_json::{json, Value};
use tokio::net::TcpStream;

use super::ClientCommand;

pub type ClientSession = RunningService<RoleClient, ClientInfo>;

/// Open an MCP session over TCP.
pub async fn connect(addr: &str) -> Result<ClientSession> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to gis-mcp at {addr}"))?;
    let session = serve_client(ClientInfo::default(), stream)
        .await
        .with_context(|| format!("MCP handshake with {addr} failed"))?;
    tracing::debug!(target: "gis_mcp::client", addr, "connected to server");
    Ok(session)
}

/// Parse `--args` into a JSON object.
pub fn parse_arguments(raw: &str) -> Result<JsonObject> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(JsonObject::new());
    }
    match serde_json::from_str::<Value>(trimmed).context("--args is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("--args must be a JSON object, got {other}")),
    }
}

/// Structured content when present, otherwise the text blocks.
pub fn result_value(result: &CallToolResult) -> Value {
    if let Some(structured) = &result.structured_content {
        return structured.clone();
    }
    let texts: Vec<String> = result
        .content
        .iter()
        .filter_map(|content| content.as_text().map(|text| text.text.clone()))
        .collect();
    match texts.as_slice() {
        [single] => serde_json::from_str(single).unwrap_or_else(|_| Value::String(single.clone())),
        _ => json!(texts),
    }
}

pub fn tool_summaries(tools: &[Tool]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                })
            })
            .collect(),
    )
}

pub async fn call(session: &ClientSession, tool: &str, arguments: JsonObject) -> Result<Value> {
    let result = session
        .call_tool(CallToolRequestParam {
            name: tool.to_string().into(),
            arguments: Some(arguments),
        })
        .await
        .with_context(|| format!("tool `{tool}` failed"))?;
    Ok(result_value(&result))
}

/// Run a `client` subcommand and return pretty JSON for stdout.
pub async fn execute(command: ClientCommand) -> Result<String> {
    let (addr, output) = match command {
        ClientCommand::ListTools { addr } => {
            let session = connect(&addr).await?;
            let tools = session.list_all_tools().await.context("tools/list failed")?;
            let output = tool_summaries(&tools);
            session.cancel().await.context("failed to close the session")?;
            (addr, output)
        }
        ClientCommand::Call { tool, args, addr } => {
            let arguments = parse_arguments(&args)?;
            let session = connect(&addr).await?;
            let output = call(&session, &tool, arguments).await;
            session.cancel().await.context("failed to close the session")?;
            (addr, output?)
        }
    };
    tracing::debug!(target: "gis_mcp::client", addr = %addr, "client command finished");
    Ok(serde_json::to_string_pretty(&output)?)
}

#[cfg(test)]
mod tests {
    use rmcp::model::Content;

    use super::*;

    #[test]
    fn arguments_must_be_an_object() {
        assert!(parse_arguments("").expect("empty").is_empty());
        let args = parse_arguments(r#"{"distance": 2}"#).expect("object");
        assert_eq!(args["distance"], 2);
        assert!(parse_arguments("[1, 2]").is_err());
        assert!(parse_arguments("{oops").is_err());
    }

    #[test]
    fn text_results_are_decoded_as_json() {
        let result = CallToolResult::success(vec![Content::text(r#"{"area": 4.0}"#)]);
        assert_eq!(result_value(&result), json!({"area": 4.0}));

        let plain = CallToolResult::success(vec![Content::text("done")]);
        assert_eq!(result_value(&plain), json!("done"));
    }
}
