use rmcp::{handler::server::wrapper::Parameters, model::ErrorData, tool, tool_router, Json};

use crate::{
    server::runtime::GisServer,
    tools::{self, ServerToolRouter},
};

use super::request::*;

pub(crate) fn router() -> ServerToolRouter<GisServer> {
    GisServer::vector_router()
}

#[tool_router(router = vector_router)]
impl GisServer {
    #[tool(
        name = "read_file_gpd",
        description = "Read a shapefile or GeoJSON file and report columns, types, CRS, bounds and \
            a preview"
    )]
    async fn read_file_gpd(
        &self,
        Parameters(request): Parameters<ReadFileRequest>,
    ) -> Result<Json<ReadFileResponse>, ErrorData> {
        tools::run_blocking("read_file_gpd", move || super::read_file(request)).await
    }

    #[tool(
        name = "append_gpd",
        description = "Concatenate two layers (second reprojected to the first CRS) and save the \
            result"
    )]
    async fn append_gpd(
        &self,
        Parameters(request): Parameters<CombineFilesRequest>,
    ) -> Result<Json<CombineFilesResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("append_gpd", move || super::append_files(request, &root)).await
    }

    #[tool(
        name = "merge_gpd",
        description = "Inner attribute join of two layers on their shared columns; left geometry \
            is kept"
    )]
    async fn merge_gpd(
        &self,
        Parameters(request): Parameters<CombineFilesRequest>,
    ) -> Result<Json<CombineFilesResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("merge_gpd", move || super::merge_files(request, &root)).await
    }

    #[tool(
        name = "overlay_gpd",
        description = "Overlay two layers: intersection, union, identity, symmetric_difference or \
            difference"
    )]
    async fn overlay_gpd(
        &self,
        Parameters(request): Parameters<OverlayLayersRequest>,
    ) -> Result<Json<LayerResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("overlay_gpd", move || super::overlay_layers(request, &root)).await
    }

    #[tool(
        name = "dissolve_gpd",
        description = "Union geometries per value of a column, or all together"
    )]
    async fn dissolve_gpd(
        &self,
        Parameters(request): Parameters<DissolveRequest>,
    ) -> Result<Json<LayerResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("dissolve_gpd", move || super::dissolve(request, &root)).await
    }

    #[tool(name = "explode_gpd", description = "Split multi-part geometries into single parts")]
    async fn explode_gpd(
        &self,
        Parameters(request): Parameters<ExplodeRequest>,
    ) -> Result<Json<LayerResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("explode_gpd", move || super::explode(request, &root)).await
    }

    #[tool(name = "clip_vector", description = "Clip a layer to the union of a mask layer")]
    async fn clip_vector(
        &self,
        Parameters(request): Parameters<ClipVectorRequest>,
    ) -> Result<Json<LayerResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("clip_vector", move || super::clip_vector(request, &root)).await
    }

    #[tool(
        name = "sjoin_gpd",
        description = "Spatial join with a predicate (intersects, within, contains, touches, \
            crosses, overlaps, covers, covered_by)"
    )]
    async fn sjoin_gpd(
        &self,
        Parameters(request): Parameters<SpatialJoinRequest>,
    ) -> Result<Json<LayerResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("sjoin_gpd", move || super::spatial_join(request, &root)).await
    }

    #[tool(
        name = "sjoin_nearest_gpd",
        description = "Join each feature to its nearest neighbour in another layer, adding a \
            distance column"
    )]
    async fn sjoin_nearest_gpd(
        &self,
        Parameters(request): Parameters<NearestJoinRequest>,
    ) -> Result<Json<LayerResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("sjoin_nearest_gpd", move || super::nearest_join(request, &root)).await
    }

    #[tool(
        name = "point_in_polygon",
        description = "Left spatial join of points within polygons"
    )]
    async fn point_in_polygon(
        &self,
        Parameters(request): Parameters<PointInPolygonRequest>,
    ) -> Result<Json<LayerResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("point_in_polygon", move || {
            super::point_in_polygon(request, &root)
        })
        .await
    }

    #[tool(
        name = "write_file_gpd",
        description = "Export a layer as ESRI Shapefile or GeoJSON"
    )]
    async fn write_file_gpd(
        &self,
        Parameters(request): Parameters<WriteFileRequest>,
    ) -> Result<Json<WriteFileResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("write_file_gpd", move || super::write_file(request, &root)).await
    }
}
