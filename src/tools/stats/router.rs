use rmcp::{handler::server::wrapper::Parameters, model::ErrorData, tool, tool_router, Json};

use crate::{
    server::runtime::GisServer,
    tools::{self, ServerToolRouter},
};

use super::request::*;

pub(crate) fn router() -> ServerToolRouter<GisServer> {
    GisServer::stats_router()
}

#[tool_router(router = stats_router)]
impl GisServer {
    #[tool(
        name = "getis_ord_g",
        description = "Global Getis-Ord G over inverse-distance weights (threshold in metres, \
            converted to degrees for EPSG:4326)"
    )]
    async fn getis_ord_g(
        &self,
        Parameters(request): Parameters<EsdaRequest>,
    ) -> Result<Json<StatsResponse>, ErrorData> {
        let section = self.config().statistics.clone();
        tools::run_blocking("getis_ord_g", move || super::getis_ord_g(request, &section)).await
    }

    #[tool(
        name = "morans_i",
        description = "Global Moran's I with permutation inference over inverse-distance weights"
    )]
    async fn morans_i(
        &self,
        Parameters(request): Parameters<EsdaRequest>,
    ) -> Result<Json<StatsResponse>, ErrorData> {
        let section = self.config().statistics.clone();
        tools::run_blocking("morans_i", move || super::morans_i(request, &section)).await
    }

    #[tool(
        name = "gearys_c",
        description = "Global Geary's C with permutation inference over inverse-distance weights"
    )]
    async fn gearys_c(
        &self,
        Parameters(request): Parameters<EsdaRequest>,
    ) -> Result<Json<StatsResponse>, ErrorData> {
        let section = self.config().statistics.clone();
        tools::run_blocking("gearys_c", move || super::gearys_c(request, &section)).await
    }

    #[tool(
        name = "gamma_statistic",
        description = "Gamma index of spatial autocorrelation (cross-product similarity)"
    )]
    async fn gamma_statistic(
        &self,
        Parameters(request): Parameters<EsdaRequest>,
    ) -> Result<Json<StatsResponse>, ErrorData> {
        let section = self.config().statistics.clone();
        tools::run_blocking("gamma_statistic", move || {
            super::gamma_statistic(request, &section)
        })
        .await
    }

    #[tool(
        name = "moran_local",
        description = "Local Moran's I per feature with pseudo p-values and scatterplot quadrants"
    )]
    async fn moran_local(
        &self,
        Parameters(request): Parameters<EsdaRequest>,
    ) -> Result<Json<StatsResponse>, ErrorData> {
        let section = self.config().statistics.clone();
        tools::run_blocking("moran_local", move || super::moran_local(request, &section)).await
    }

    #[tool(
        name = "getis_ord_g_local",
        description = "Local Getis-Ord G per feature with pseudo p-values"
    )]
    async fn getis_ord_g_local(
        &self,
        Parameters(request): Parameters<EsdaRequest>,
    ) -> Result<Json<StatsResponse>, ErrorData> {
        let section = self.config().statistics.clone();
        tools::run_blocking("getis_ord_g_local", move || {
            super::getis_ord_g_local(request, &section)
        })
        .await
    }

    #[tool(
        name = "join_counts",
        description = "Global join counts (BB, BW, WW) for a binary variable"
    )]
    async fn join_counts(
        &self,
        Parameters(request): Parameters<EsdaRequest>,
    ) -> Result<Json<StatsResponse>, ErrorData> {
        let section = self.config().statistics.clone();
        tools::run_blocking("join_counts", move || super::join_counts(request, &section)).await
    }

    #[tool(
        name = "join_counts_local",
        description = "Local BB join counts per feature for a binary variable"
    )]
    async fn join_counts_local(
        &self,
        Parameters(request): Parameters<EsdaRequest>,
    ) -> Result<Json<StatsResponse>, ErrorData> {
        let section = self.config().statistics.clone();
        tools::run_blocking("join_counts_local", move || {
            super::join_counts_local(request, &section)
        })
        .await
    }

    #[tool(
        name = "adbscan",
        description = "Density-based clustering of feature centroids (eps in layer units after \
            reprojection)"
    )]
    async fn adbscan(
        &self,
        Parameters(request): Parameters<AdbscanRequest>,
    ) -> Result<Json<StatsResponse>, ErrorData> {
        tools::run_blocking("adbscan", move || super::adbscan(request)).await
    }

    #[tool(
        name = "weights_from_shapefile",
        description = "Queen or rook contiguity weights from a polygon layer"
    )]
    async fn weights_from_shapefile(
        &self,
        Parameters(request): Parameters<ContiguityWeightsRequest>,
    ) -> Result<Json<WeightsResponse>, ErrorData> {
        tools::run_blocking("weights_from_shapefile", move || {
            super::weights_from_shapefile(request)
        })
        .await
    }

    #[tool(
        name = "distance_band_weights",
        description = "Distance-band weights between feature centroids, binary or inverse distance"
    )]
    async fn distance_band_weights(
        &self,
        Parameters(request): Parameters<DistanceBandWeightsRequest>,
    ) -> Result<Json<WeightsResponse>, ErrorData> {
        tools::run_blocking("distance_band_weights", move || {
            super::distance_band_weights(request)
        })
        .await
    }

    #[tool(
        name = "knn_weights",
        description = "k-nearest-neighbour weights between feature centroids"
    )]
    async fn knn_weights(
        &self,
        Parameters(request): Parameters<KnnWeightsRequest>,
    ) -> Result<Json<WeightsResponse>, ErrorData> {
        tools::run_blocking("knn_weights", move || super::knn_weights(request)).await
    }

    #[tool(
        name = "build_and_transform_weights",
        description = "Build queen, rook, distance_band or knn weights and apply a transform (r, \
            v, b, o, d)"
    )]
    async fn build_and_transform_weights(
        &self,
        Parameters(request): Parameters<BuildWeightsRequest>,
    ) -> Result<Json<WeightsResponse>, ErrorData> {
        tools::run_blocking("build_and_transform_weights", move || {
            super::build_and_transform_weights(request)
        })
        .await
    }

    #[tool(
        name = "build_transform_and_save_weights",
        description = "Build and transform weights, then save them as a GAL or GWT file"
    )]
    async fn build_transform_and_save_weights(
        &self,
        Parameters(request): Parameters<SaveWeightsRequest>,
    ) -> Result<Json<StatsResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("build_transform_and_save_weights", move || {
            super::build_transform_and_save_weights(request, &root)
        })
        .await
    }

    #[tool(
        name = "ols_with_spatial_diagnostics_safe",
        description = "OLS regression with Moran's I of residuals and LM lag/error diagnostics"
    )]
    async fn ols_with_spatial_diagnostics_safe(
        &self,
        Parameters(request): Parameters<OlsRequest>,
    ) -> Result<Json<RegressionResponse>, ErrorData> {
        tools::run_blocking("ols_with_spatial_diagnostics_safe", move || {
            super::ols_with_spatial_diagnostics(request)
        })
        .await
    }

    #[tool(
        name = "spatial_markov",
        description = "Spatial Markov transition matrices for a wide panel of time-ordered columns"
    )]
    async fn spatial_markov(
        &self,
        Parameters(request): Parameters<SpatialMarkovRequest>,
    ) -> Result<Json<StatsResponse>, ErrorData> {
        let section = self.config().statistics.clone();
        tools::run_blocking("spatial_markov", move || {
            super::spatial_markov(request, &section)
        })
        .await
    }

    #[tool(
        name = "dynamic_lisa",
        description = "Directional rose analysis of LISA movement between two periods"
    )]
    async fn dynamic_lisa(
        &self,
        Parameters(request): Parameters<DynamicLisaRequest>,
    ) -> Result<Json<StatsResponse>, ErrorData> {
        let section = self.config().statistics.clone();
        tools::run_blocking("dynamic_lisa", move || super::dynamic_lisa(request, &section)).await
    }

    #[tool(
        name = "gm_lag",
        description = "Spatial lag model estimated by two-stage least squares with spatial \
            instruments"
    )]
    async fn gm_lag(
        &self,
        Parameters(request): Parameters<GmLagRequest>,
    ) -> Result<Json<StatsResponse>, ErrorData> {
        let section = self.config().statistics.clone();
        tools::run_blocking("gm_lag", move || super::gm_lag(request, &section)).await
    }
}
