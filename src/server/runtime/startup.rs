use std::{future::Future, io, net::SocketAddr, process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context, Error};
use rmcp::{
    transport::{
        sse_server::{SseServer, SseServerConfig},
        streamable_http_server::{session::local::LocalSessionManager, StreamableHttpService},
    },
    ServiceExt,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::{
    cli::{LaunchProfile, TransportMode},
    lib::telemetry::{emit_runtime_mode, RuntimeModeTelemetry},
    server::{
        config::ServerConfig,
        runtime::{build_instructions, GisServer},
    },
};

pub const HTTP_PATH: &str = "/mcp";
pub const SSE_PATH: &str = "/sse";
pub const SSE_POST_PATH: &str = "/message";
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Bundles a runtime error message with an exit code.
#[derive(Debug)]
pub struct RuntimeExit {
    message: String,
    exit_code: ExitCode,
}

impl RuntimeExit {
    pub fn from_error(err: impl Into<Error>) -> Self {
        let err = err.into();
        Self {
            message: format!("{err:?}"),
            exit_code: ExitCode::FAILURE,
        }
    }

    pub fn report(self) -> ExitCode {
        eprintln!("{}", self.message);
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Start the MCP server on the transport chosen by the launch profile.
pub async fn run_server(profile: LaunchProfile, config: ServerConfig) -> Result<(), RuntimeExit> {
    let instructions = build_instructions(&profile, &config);
    let server = GisServer::new(config.clone(), instructions);

    let (host, port) = if profile.transport.is_network() {
        (Some(config.server.host.as_str()), Some(config.server.port))
    } else {
        (None, None)
    };
    emit_runtime_mode(&RuntimeModeTelemetry {
        transport: profile.transport.as_str(),
        host,
        port,
        config_path: config.source_path.to_string_lossy().as_ref(),
        storage_root: config.storage.root.to_string_lossy().as_ref(),
        tool_count: server.tool_count(),
        launch_args: &profile.launch_args,
    });

    match profile.transport {
        TransportMode::Stdio => run_stdio(server).await,
        TransportMode::Tcp => run_tcp(server, &config).await,
        TransportMode::Http => run_http(server, &config).await,
        TransportMode::Sse => run_sse(server, &config).await,
    }
}

async fn run_stdio(server: GisServer) -> Result<(), RuntimeExit> {
    let running = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(RuntimeExit::from_error)?;
    running.waiting().await.map_err(RuntimeExit::from_error)?;
    Ok(())
}

async fn bind(
    config: &ServerConfig,
    transport: &str,
) -> Result<(TcpListener, String), RuntimeExit> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {transport} port {addr}"))
        .map_err(RuntimeExit::from_error)?;
    Ok((listener, addr))
}

/// Source of inbound MCP connections.
pub(crate) trait Incoming {
    /// `None` once the source is exhausted.
    fn next_connection(
        &mut self,
    ) -> impl Future<Output = Option<io::Result<(TcpStream, SocketAddr)>>> + Send;
}

impl Incoming for TcpListener {
    async fn next_connection(&mut self) -> Option<io::Result<(TcpStream, SocketAddr)>> {
        Some(self.accept().await)
    }
}

async fn run_tcp(server: GisServer, config: &ServerConfig) -> Result<(), RuntimeExit> {
    let (listener, addr) = bind(config, "TCP").await?;
    tracing::info!(
        target: "gis_mcp::runtime",
        transport = "tcp",
        bind_addr = %addr,
        "Started listening in TCP mode"
    );
    serve_connections(listener, server).await;
    Ok(())
}

/// Serve every accepted connection on its own task. A failed accept is
/// logged and the loop keeps listening.
pub(crate) async fn serve_connections(mut incoming: impl Incoming + Send, server: GisServer) {
    while let Some(accepted) = incoming.next_connection().await {
        let (stream, peer) = match accepted {
            Ok(connection) => connection,
            Err(err) => {
                tracing::warn!(
                    target: "gis_mcp::runtime",
                    error = %err,
                    "Failed to accept TCP connection"
                );
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        tracing::info!(
            target: "gis_mcp::runtime",
            peer = %peer,
            "Accepted connection from MCP client"
        );
        let session = server.clone();
        tokio::spawn(async move {
            let outcome = match session.serve(stream).await {
                Ok(running) => running.waiting().await.map(|_| ()).map_err(Error::from),
                Err(err) => Err(Error::from(err)),
            };
            match outcome {
                Ok(()) => tracing::info!(
                    target: "gis_mcp::runtime",
                    peer = %peer,
                    "MCP client disconnected"
                ),
                Err(err) => tracing::warn!(
                    target: "gis_mcp::runtime",
                    peer = %peer,
                    error = %err,
                    "MCP session ended with an error"
                ),
            }
        });
    }
}

/// Streamable HTTP router with one MCP session per client.
pub fn http_router(server: GisServer) -> axum::Router {
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        Arc::new(LocalSessionManager::default()),
        Default::default(),
    );
    axum::Router::new().nest_service(HTTP_PATH, service)
}

async fn run_http(server: GisServer, config: &ServerConfig) -> Result<(), RuntimeExit> {
    let (listener, addr) = bind(config, "HTTP").await?;
    tracing::info!(
        target: "gis_mcp::runtime",
        transport = "http",
        bind_addr = %addr,
        path = HTTP_PATH,
        "Started listening in streamable HTTP mode"
    );
    axum::serve(listener, http_router(server))
        .await
        .context("HTTP server stopped")
        .map_err(RuntimeExit::from_error)
}

async fn run_sse(server: GisServer, config: &ServerConfig) -> Result<(), RuntimeExit> {
    let (listener, addr) = bind(config, "SSE").await?;
    let bound = listener
        .local_addr()
        .context("failed to read the SSE listener address")
        .map_err(RuntimeExit::from_error)?;
    let (sse_server, router) = SseServer::new(SseServerConfig {
        bind: bound,
        sse_path: SSE_PATH.to_string(),
        post_path: SSE_POST_PATH.to_string(),
        ct: CancellationToken::new(),
        sse_keep_alive: None,
    });
    tracing::info!(
        target: "gis_mcp::runtime",
        transport = "sse",
        bind_addr = %addr,
        path = SSE_PATH,
        "Started listening in SSE mode"
    );
    let sessions = sse_server.with_service(move || server.clone());
    let outcome = axum::serve(listener, router)
        .await
        .context("SSE server stopped")
        .map_err(RuntimeExit::from_error);
    sessions.cancel();
    outcome
}

#[cfg(test)]
mod tests {
    use rmcp::{model::ClientInfo, serve_client};
    use tempfile::tempdir;

    use super::*;

    /// Fails the first `failures` accepts before handing out real connections.
    struct FlakyListener {
        listener: TcpListener,
        failures: usize,
    }

    impl Incoming for FlakyListener {
        async fn next_connection(&mut self) -> Option<io::Result<(TcpStream, SocketAddr)>> {
            if self.failures > 0 {
                self.failures -= 1;
                return Some(Err(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "connection reset before accept",
                )));
            }
            Some(self.listener.accept().await)
        }
    }

    #[tokio::test]
    async fn failed_accepts_do_not_stop_the_listener() {
        let storage = tempdir().expect("can create temporary directory");
        let server = GisServer::new(
            ServerConfig::with_storage_root(storage.path()),
            "gis-mcp-test".into(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("binds");
        let addr = listener.local_addr().expect("local addr");
        let accept_loop = tokio::spawn(serve_connections(
            FlakyListener {
                listener,
                failures: 3,
            },
            server,
        ));

        let stream = TcpStream::connect(addr).await.expect("connects");
        let client = serve_client(ClientInfo::default(), stream)
            .await
            .expect("initialises");
        let tools = client.list_all_tools().await.expect("lists tools");
        assert!(tools.iter().any(|tool| tool.name == "buffer"));

        let _ = client.cancel().await;
        accept_loop.abort();
    }
}
