use std::{process::Stdio, time::Duration};

use anyhow::Result;
use gis_mcp::server::runtime::{http_router, GisServer, HTTP_PATH};
use rmcp::{model::ClientInfo, serve_client, transport::StreamableHttpClientTransport, ServiceExt};
use tempfile::tempdir;
use tokio::{net::TcpListener, process::Command, time::timeout};

use crate::common::{spawn_server_process, test_config, BINARY_PATH};

#[tokio::test]
async fn stdio_spawn_lists_tools() -> Result<()> {
    let storage = tempdir()?;
    let (mut child, transport, stderr_task) = spawn_server_process(storage.path()).await?;

    let client = serve_client(ClientInfo::default(), transport).await?;
    let list = client.list_tools(None).await?;
    for expected in ["buffer", "transform_coordinates", "morans_i", "save_results"] {
        assert!(
            list.tools.iter().any(|tool| tool.name.as_ref() == expected),
            "list_tools should include {expected}: {:?}",
            list.tools.iter().map(|tool| tool.name.as_ref()).collect::<Vec<_>>()
        );
    }

    client.cancel().await?;
    let status = timeout(Duration::from_secs(5), child.wait()).await??;
    assert!(
        status.success(),
        "server should exit cleanly but exit status was {status:?}"
    );
    if let Some(handle) = stderr_task {
        let _ = handle.await;
    }
    Ok(())
}

#[tokio::test]
async fn explicit_missing_config_fails_fast() -> Result<()> {
    let dir = tempdir()?;
    let missing = dir.path().join("absent.toml");
    let output = timeout(
        Duration::from_secs(10),
        Command::new(BINARY_PATH)
            .arg("--config")
            .arg(&missing)
            .env_remove("GIS_MCP_CONFIG_PATH")
            .stdin(Stdio::null())
            .output(),
    )
    .await??;
    assert!(
        !output.status.success(),
        "a missing --config file must not start the server"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("absent.toml"),
        "stderr should name the missing file: {stderr}"
    );
    Ok(())
}

#[tokio::test]
async fn streamable_http_serves_tool_calls() -> Result<()> {
    let storage = tempdir()?;
    let server = GisServer::new(test_config(storage.path()), "gis-mcp-http".into());
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let http_task = tokio::spawn(async move { axum::serve(listener, http_router(server)).await });

    let transport = StreamableHttpClientTransport::from_uri(format!("http://{addr}{HTTP_PATH}"));
    let client = ClientInfo::default().serve(transport).await?;
    let tools = client.list_all_tools().await?;
    assert!(tools.iter().any(|tool| tool.name.as_ref() == "buffer"));

    let _ = client.cancel().await;
    http_task.abort();
    Ok(())
}
