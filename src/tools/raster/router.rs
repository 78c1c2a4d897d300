use rmcp::{handler::server::wrapper::Parameters, model::ErrorData, tool, tool_router, Json};

use crate::{
    server::runtime::GisServer,
    tools::{self, ServerToolRouter},
};

use super::request::*;

pub(crate) fn router() -> ServerToolRouter<GisServer> {
    GisServer::raster_router()
}

#[tool_router(router = raster_router)]
impl GisServer {
    #[tool(
        name = "metadata_raster",
        description = "Open a raster (local path or http(s) URL) and report size, bands, types, \
            nodata, CRS, bounds and transform"
    )]
    async fn metadata_raster(
        &self,
        Parameters(request): Parameters<RasterPathRequest>,
    ) -> Result<Json<MetadataResponse>, ErrorData> {
        tools::run_blocking("metadata_raster", move || super::metadata(request)).await
    }

    #[tool(
        name = "get_raster_crs",
        description = "Return the CRS of a raster as WKT and PROJ.4 parameters"
    )]
    async fn get_raster_crs(
        &self,
        Parameters(request): Parameters<RasterPathRequest>,
    ) -> Result<Json<RasterCrsResponse>, ErrorData> {
        tools::run_blocking("get_raster_crs", move || super::raster_crs(request)).await
    }

    #[tool(
        name = "extract_band",
        description = "Save one band (1-based index) of a raster as a single-band GeoTIFF"
    )]
    async fn extract_band(
        &self,
        Parameters(request): Parameters<ExtractBandRequest>,
    ) -> Result<Json<DestinationResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("extract_band", move || super::extract_band(request, &root)).await
    }

    #[tool(
        name = "raster_band_statistics",
        description = "Min, max, mean and standard deviation of every band, ignoring nodata"
    )]
    async fn raster_band_statistics(
        &self,
        Parameters(request): Parameters<RasterSourceRequest>,
    ) -> Result<Json<BandStatisticsResponse>, ErrorData> {
        tools::run_blocking("raster_band_statistics", move || {
            super::band_statistics(request)
        })
        .await
    }

    #[tool(
        name = "raster_histogram",
        description = "Histogram of pixel values for every band"
    )]
    async fn raster_histogram(
        &self,
        Parameters(request): Parameters<HistogramRequest>,
    ) -> Result<Json<HistogramResponse>, ErrorData> {
        tools::run_blocking("raster_histogram", move || super::histogram(request)).await
    }

    #[tool(
        name = "tile_raster",
        description = "Split a raster into square tiles named tile_{row}_{col}.tif"
    )]
    async fn tile_raster(
        &self,
        Parameters(request): Parameters<TileRasterRequest>,
    ) -> Result<Json<TileRasterResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("tile_raster", move || super::tile(request, &root)).await
    }

    #[tool(
        name = "compute_ndvi",
        description = "Normalized difference vegetation index from red and near-infrared bands"
    )]
    async fn compute_ndvi(
        &self,
        Parameters(request): Parameters<NdviRequest>,
    ) -> Result<Json<DestinationResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("compute_ndvi", move || super::ndvi(request, &root)).await
    }

    #[tool(
        name = "raster_algebra",
        description = "Add or subtract one band of two rasters, aligning the second onto the first \
            grid"
    )]
    async fn raster_algebra(
        &self,
        Parameters(request): Parameters<RasterAlgebraRequest>,
    ) -> Result<Json<DestinationResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("raster_algebra", move || super::algebra(request, &root)).await
    }

    #[tool(
        name = "concat_bands",
        description = "Stack the single-band .tif files of a folder into one multi-band raster"
    )]
    async fn concat_bands(
        &self,
        Parameters(request): Parameters<ConcatBandsRequest>,
    ) -> Result<Json<DestinationResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("concat_bands", move || super::concat_bands(request, &root)).await
    }

    #[tool(
        name = "weighted_band_sum",
        description = "Weighted sum of all bands; one weight per band, weights summing to 1"
    )]
    async fn weighted_band_sum(
        &self,
        Parameters(request): Parameters<WeightedBandSumRequest>,
    ) -> Result<Json<DestinationResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("weighted_band_sum", move || {
            super::weighted_band_sum(request, &root)
        })
        .await
    }

    #[tool(
        name = "resample_raster",
        description = "Resize a raster by a scale factor with nearest or bilinear resampling"
    )]
    async fn resample_raster(
        &self,
        Parameters(request): Parameters<ResampleRasterRequest>,
    ) -> Result<Json<DestinationResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("resample_raster", move || super::resample(request, &root)).await
    }

    #[tool(name = "reproject_raster", description = "Reproject a raster to another CRS")]
    async fn reproject_raster(
        &self,
        Parameters(request): Parameters<ReprojectRasterRequest>,
    ) -> Result<Json<DestinationResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("reproject_raster", move || super::reproject(request, &root)).await
    }

    #[tool(
        name = "clip_raster_with_shapefile",
        description = "Mask a raster with the polygons of a vector layer and crop it to their \
            extent"
    )]
    async fn clip_raster_with_shapefile(
        &self,
        Parameters(request): Parameters<ClipRasterRequest>,
    ) -> Result<Json<DestinationResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("clip_raster_with_shapefile", move || {
            super::clip_with_shapes(request, &root)
        })
        .await
    }

    #[tool(
        name = "zonal_statistics",
        description = "Statistics of the first band inside each feature of a vector layer"
    )]
    async fn zonal_statistics(
        &self,
        Parameters(request): Parameters<ZonalStatisticsRequest>,
    ) -> Result<Json<ZonalStatisticsResponse>, ErrorData> {
        tools::run_blocking("zonal_statistics", move || super::zonal_statistics(request)).await
    }

    #[tool(
        name = "reclassify_raster",
        description = "Replace raster values using an old-to-new value mapping"
    )]
    async fn reclassify_raster(
        &self,
        Parameters(request): Parameters<ReclassifyRasterRequest>,
    ) -> Result<Json<RasterOutputResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("reclassify_raster", move || super::reclassify(request, &root)).await
    }

    #[tool(
        name = "focal_statistics",
        description = "Moving-window mean, min, max, std or median of the first band"
    )]
    async fn focal_statistics(
        &self,
        Parameters(request): Parameters<FocalStatisticsRequest>,
    ) -> Result<Json<RasterOutputResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("focal_statistics", move || {
            super::focal_statistics(request, &root)
        })
        .await
    }

    #[tool(name = "hillshade", description = "Shaded relief of a DEM as an 8-bit raster")]
    async fn hillshade(
        &self,
        Parameters(request): Parameters<HillshadeRequest>,
    ) -> Result<Json<RasterOutputResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("hillshade", move || super::hillshade(request, &root)).await
    }

    #[tool(
        name = "write_raster",
        description = "Write a 2D or 3D array to GeoTIFF using the grid and CRS of a reference \
            raster"
    )]
    async fn write_raster(
        &self,
        Parameters(request): Parameters<WriteRasterRequest>,
    ) -> Result<Json<RasterOutputResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("write_raster", move || super::write_array(request, &root)).await
    }
}
