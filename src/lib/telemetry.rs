//! Telemetry initialization and per-tool span helpers.

use std::time::Instant;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, info_span, warn, Span};
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize `tracing` and format developer logs.
///
/// `RUST_LOG` wins when set; otherwise `debug` selects the default level.
pub fn init_tracing(debug: bool) -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let default_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialize tracing: {err}"))
}

/// Span helper to record start and finish of a tool invocation.
pub struct ToolSpan {
    span: Span,
    started_at: Instant,
    tool: &'static str,
}

impl ToolSpan {
    /// Start a tool span.
    pub fn start(tool: &'static str) -> Self {
        let span = info_span!(target: "gis_mcp::tools", "gis_tool", tool);
        Self {
            span,
            started_at: Instant::now(),
            tool,
        }
    }

    /// Close the span after a successful call.
    pub fn finish(self) {
        let elapsed_ms = self.started_at.elapsed().as_millis();
        let _entered = self.span.enter();
        info!(
            target: "gis_mcp::tools",
            tool = self.tool,
            status = "success",
            elapsed_ms = elapsed_ms,
            "Completed tool call"
        );
    }

    /// Close the span after a failed call.
    pub fn fail(self, reason: &str) {
        let elapsed_ms = self.started_at.elapsed().as_millis();
        let _entered = self.span.enter();
        warn!(
            target: "gis_mcp::tools",
            tool = self.tool,
            status = "error",
            elapsed_ms = elapsed_ms,
            reason = reason,
            "Tool call failed"
        );
    }
}

/// Payload for logging MCP runtime state as structured telemetry.
#[derive(Debug, Serialize)]
pub struct RuntimeModeTelemetry<'a> {
    pub transport: &'a str,
    pub host: Option<&'a str>,
    pub port: Option<u16>,
    pub config_path: &'a str,
    pub storage_root: &'a str,
    pub tool_count: usize,
    pub launch_args: &'a [String],
}

/// Emit runtime mode to `tracing`.
pub fn emit_runtime_mode(telemetry: &RuntimeModeTelemetry<'_>) {
    info!(
        target: "gis_mcp::runtime",
        transport = telemetry.transport,
        host = telemetry.host.unwrap_or(""),
        port = telemetry.port.unwrap_or_default(),
        config_path = telemetry.config_path,
        storage_root = telemetry.storage_root,
        tool_count = telemetry.tool_count,
        launch_args = ?telemetry.launch_args,
        "Started MCP server"
    );
}
