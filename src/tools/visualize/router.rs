use rmcp::{handler::server::wrapper::Parameters, model::ErrorData, tool, tool_router, Json};

use crate::{
    server::runtime::GisServer,
    tools::{self, ServerToolRouter},
};

use super::request::*;

pub(crate) fn router() -> ServerToolRouter<GisServer> {
    GisServer::visualize_router()
}

#[tool_router(router = visualize_router)]
impl GisServer {
    #[tool(
        name = "create_map",
        description = "Draw vector files, rasters, WKT or coordinate lists into one static map \
            image (png, jpg, bmp or svg) with optional title, grid and legend"
    )]
    async fn create_map(
        &self,
        Parameters(request): Parameters<CreateMapRequest>,
    ) -> Result<Json<MapResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("create_map", move || super::create_map(request, &root)).await
    }

    #[tool(
        name = "create_web_map",
        description = "Write an interactive Leaflet HTML map with vector layers reprojected \
            to WGS 84, a basemap, layer control, legend and optional minimap"
    )]
    async fn create_web_map(
        &self,
        Parameters(request): Parameters<CreateWebMapRequest>,
    ) -> Result<Json<MapResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("create_web_map", move || super::create_web_map(request, &root)).await
    }
}
