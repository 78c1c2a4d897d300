use std::{
    fs, io,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{anyhow, Context, Result};
use rmcp::{
    model::{CallToolRequestParam, ClientInfo, ErrorData},
    serve_client,
    service::{RoleClient, RunningService, ServiceError},
    ServiceExt,
};
use serde_json::{json, Value};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf},
    process::{Child, ChildStdin, ChildStdout, Command},
    task::JoinHandle,
};

use gis_mcp::server::{config::ServerConfig, runtime::GisServer};

pub const BINARY_PATH: &str = env!("CARGO_BIN_EXE_gis-mcp");

pub type Client = RunningService<RoleClient, ClientInfo>;

pub fn fixture(relative: &str) -> String {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    root.join(relative).display().to_string()
}

/// Seeded statistics so permutation results are reproducible.
pub fn test_config(storage_root: &Path) -> ServerConfig {
    let mut config = ServerConfig::with_storage_root(storage_root);
    config.statistics.permutations = 99;
    config.statistics.seed = Some(7);
    config
}

/// Serve `config` in-process over a duplex pipe and connect a client to it.
pub async fn connect(config: ServerConfig) -> Result<(Client, JoinHandle<Result<()>>)> {
    let server = GisServer::new(config, "gis-mcp-integration".into());
    let (server_transport, client_transport) = tokio::io::duplex(64 * 1024);
    let server_task = tokio::spawn(async move {
        server.serve(server_transport).await?.waiting().await?;
        Result::<_, anyhow::Error>::Ok(())
    });
    let client = serve_client(ClientInfo::default(), client_transport).await?;
    Ok((client, server_task))
}

pub async fn shutdown(client: Client, server_task: JoinHandle<Result<()>>) {
    let _ = client.cancel().await;
    let _ = server_task.await;
}

/// Call a tool and return its structured content or the MCP error.
pub async fn call(client: &Client, tool: &str, args: Value) -> Result<Result<Value, ErrorData>> {
    let arguments = args
        .as_object()
        .cloned()
        .ok_or_else(|| anyhow!("tool arguments must be an object"))?;
    let outcome = client
        .call_tool(CallToolRequestParam {
            name: tool.to_string().into(),
            arguments: Some(arguments),
        })
        .await;
    match outcome {
        Ok(result) => Ok(Ok(result
            .structured_content
            .context("structured_content expected")?)),
        Err(ServiceError::McpError(error)) => Ok(Err(error)),
        Err(other) => Err(anyhow!("unexpected transport error: {other:?}")),
    }
}

pub fn error_code(error: &ErrorData) -> Option<String> {
    error
        .data
        .as_ref()
        .and_then(|data| data.get("code"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn square(x: f64, y: f64) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[[x, y], [x + 1.0, y], [x + 1.0, y + 1.0], [x, y + 1.0], [x, y]]]
    })
}

/// A `size`×`size` grid of unit squares in EPSG:4326 with per-cell attributes from `props`.
pub fn write_grid(
    dir: &Path,
    name: &str,
    size: usize,
    props: impl Fn(usize, usize) -> Value,
) -> Result<String> {
    let mut features = Vec::new();
    for row in 0..size {
        for col in 0..size {
            features.push(json!({
                "type": "Feature",
                "geometry": square(col as f64, row as f64),
                "properties": props(col, row),
            }));
        }
    }
    let path = dir.join(name);
    let document = json!({ "type": "FeatureCollection", "features": features });
    fs::write(&path, serde_json::to_string(&document)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path.display().to_string())
}

/// Spawn the server binary on stdio with an isolated storage root.
pub async fn spawn_server_process(
    storage_root: &Path,
) -> Result<(Child, ChildIoBridge, Option<JoinHandle<()>>)> {
    let mut command = Command::new(BINARY_PATH);
    command
        .env("GIS_MCP_CONFIG_PATH", fixture("tests/fixtures/config_valid.toml"))
        .env("GIS_MCP_STORAGE_PATH", storage_root)
        .env_remove("GIS_MCP_TRANSPORT")
        .stdout(Stdio::piped())
        .stdin(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = command.spawn().context("failed to spawn server process")?;
    let stdout = child.stdout.take().context("child stdout")?;
    let stdin = child.stdin.take().context("child stdin")?;
    let bridge = ChildIoBridge::new(stdout, stdin);
    let stderr_handle = child.stderr.take().map(|mut stderr| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
        })
    });
    Ok((child, bridge, stderr_handle))
}

pub struct ChildIoBridge {
    stdout: ChildStdout,
    stdin: ChildStdin,
}

impl ChildIoBridge {
    pub fn new(stdout: ChildStdout, stdin: ChildStdin) -> Self {
        Self { stdout, stdin }
    }
}

impl AsyncRead for ChildIoBridge {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::pin::Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

impl AsyncWrite for ChildIoBridge {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        data: &[u8],
    ) -> std::task::Poll<io::Result<usize>> {
        std::pin::Pin::new(&mut self.stdin).poll_write(cx, data)
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::pin::Pin::new(&mut self.stdin).poll_flush(cx)
    }

    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::pin::Pin::new(&mut self.stdin).poll_shutdown(cx)
    }
}
