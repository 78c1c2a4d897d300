use crate::{cli::LaunchProfile, server::config::ServerConfig};

/// Build the `ServerInfo.instructions` string shown to MCP clients.
pub fn build_instructions(profile: &LaunchProfile, config: &ServerConfig) -> String {
    format!(
        "GIS tools for geometry, projections, vector layers, rasters and spatial statistics. \
         Serving over {transport} (host={host}, port={port}). \
         Relative output paths are written under {root}. \
         Read gis://operations/* resources to discover operations by family.",
        transport = profile.transport.as_str(),
        host = config.server.host,
        port = config.server.port,
        root = config.storage.root.display()
    )
}
