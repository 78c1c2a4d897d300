use std::{path::PathBuf, sync::Arc};

use rmcp::{
    handler::server::ServerHandler,
    model::{
        ErrorData, ListResourcesResult, PaginatedRequestParam, ReadResourceRequestParam,
        ReadResourceResult, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool_handler, RoleServer,
};

use crate::{
    server::config::ServerConfig,
    tools::{
        self, crs, geometry, raster, resources, stats, storage, vector, visualize, ServerToolRouter,
    },
};

/// MCP server exposing every GIS tool family over one router.
#[derive(Clone)]
pub struct GisServer {
    config: Arc<ServerConfig>,
    instructions: Arc<String>,
    tool_router: ServerToolRouter<Self>,
}

impl GisServer {
    pub fn new(config: ServerConfig, instructions: String) -> Self {
        let router = tools::build_router(Self::combined_router);
        Self {
            config: Arc::new(config),
            instructions: Arc::new(instructions),
            tool_router: router,
        }
    }

    fn combined_router() -> ServerToolRouter<Self> {
        geometry::router()
            + crs::router()
            + vector::router()
            + raster::router()
            + stats::router()
            + storage::router()
            + visualize::router()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Directory that relative output paths resolve under.
    pub fn storage_root(&self) -> PathBuf {
        self.config.storage.root.clone()
    }

    pub fn tool_count(&self) -> usize {
        self.tool_router.list_all().len()
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for GisServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            instructions: Some((*self.instructions).clone()),
            ..ServerInfo::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        Ok(ListResourcesResult::with_all_items(resources::list()))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        resources::read(&request.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_family_is_routed() {
        let server = GisServer::new(
            ServerConfig::with_storage_root(std::env::temp_dir()),
            "test".into(),
        );
        let names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        for expected in [
            "buffer",
            "transform_coordinates",
            "read_file_gpd",
            "metadata_raster",
            "morans_i",
            "gm_lag",
            "save_results",
            "create_map",
        ] {
            assert!(names.iter().any(|name| name == expected), "{expected} missing");
        }
        assert_eq!(server.tool_count(), names.len());
    }

    #[test]
    fn every_listed_operation_is_a_tool() {
        let server = GisServer::new(
            ServerConfig::with_storage_root(std::env::temp_dir()),
            "test".into(),
        );
        let names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        for resource in resources::list() {
            let listed = resources::operations(&resource.raw.uri).expect("listed uri");
            for operation in listed {
                assert!(names.iter().any(|name| name == operation), "{operation} not routed");
            }
        }
    }
}
