use rmcp::{handler::server::wrapper::Parameters, model::ErrorData, tool, tool_router, Json};

use crate::{
    server::runtime::GisServer,
    tools::{self, ServerToolRouter},
};

use super::request::*;

pub(crate) fn router() -> ServerToolRouter<GisServer> {
    GisServer::crs_router()
}

#[tool_router(router = crs_router)]
impl GisServer {
    #[tool(
        name = "transform_coordinates",
        description = "Transform an [x, y] pair between CRSs (x/y, i.e. lon/lat, axis order)"
    )]
    async fn transform_coordinates(
        &self,
        Parameters(request): Parameters<TransformCoordinatesRequest>,
    ) -> Result<Json<TransformCoordinatesResponse>, ErrorData> {
        tools::run_blocking("transform_coordinates", move || {
            super::transform_coordinates(request)
        })
        .await
    }

    #[tool(
        name = "project_geometry",
        description = "Reproject a WKT geometry from source_crs to target_crs"
    )]
    async fn project_geometry(
        &self,
        Parameters(request): Parameters<ProjectGeometryRequest>,
    ) -> Result<Json<ProjectGeometryResponse>, ErrorData> {
        tools::run_blocking("project_geometry", move || super::project_geometry(request)).await
    }

    #[tool(
        name = "get_crs_info",
        description = "Name, type, axes, datum, ellipsoid and area of use of a CRS"
    )]
    async fn get_crs_info(
        &self,
        Parameters(request): Parameters<CrsRequest>,
    ) -> Result<Json<CrsInfoResponse>, ErrorData> {
        tools::run_blocking("get_crs_info", move || super::crs_info(request)).await
    }

    #[tool(name = "get_available_crs", description = "List well-known CRS codes")]
    async fn get_available_crs(&self) -> Result<Json<AvailableCrsResponse>, ErrorData> {
        tools::run_blocking("get_available_crs", super::available_crs).await
    }

    #[tool(
        name = "get_geod_info",
        description = "Parameters (a, b, f, es, e) of a named or custom ellipsoid"
    )]
    async fn get_geod_info(
        &self,
        Parameters(request): Parameters<GeodInfoRequest>,
    ) -> Result<Json<GeodInfoResponse>, ErrorData> {
        tools::run_blocking("get_geod_info", move || super::geod_info(request)).await
    }

    #[tool(
        name = "calculate_geodetic_distance",
        description = "Ellipsoidal distance and azimuths between two [lon, lat] points"
    )]
    async fn calculate_geodetic_distance(
        &self,
        Parameters(request): Parameters<GeodeticDistanceRequest>,
    ) -> Result<Json<GeodeticDistanceResponse>, ErrorData> {
        tools::run_blocking("calculate_geodetic_distance", move || {
            super::geodetic_distance(request)
        })
        .await
    }

    #[tool(
        name = "calculate_geodetic_point",
        description = "Destination point from a start [lon, lat], azimuth and distance in metres"
    )]
    async fn calculate_geodetic_point(
        &self,
        Parameters(request): Parameters<GeodeticPointRequest>,
    ) -> Result<Json<GeodeticPointResponse>, ErrorData> {
        tools::run_blocking("calculate_geodetic_point", move || {
            super::geodetic_point(request)
        })
        .await
    }

    #[tool(
        name = "calculate_geodetic_area",
        description = "Ellipsoidal area in square metres of a lon/lat polygon"
    )]
    async fn calculate_geodetic_area(
        &self,
        Parameters(request): Parameters<GeodeticAreaRequest>,
    ) -> Result<Json<GeodeticAreaResponse>, ErrorData> {
        tools::run_blocking("calculate_geodetic_area", move || {
            super::geodetic_area(request)
        })
        .await
    }

    #[tool(name = "get_utm_zone", description = "UTM zone number for a [lon, lat] point")]
    async fn get_utm_zone(
        &self,
        Parameters(request): Parameters<LonLatRequest>,
    ) -> Result<Json<UtmZoneResponse>, ErrorData> {
        tools::run_blocking("get_utm_zone", move || super::utm_zone(request)).await
    }

    #[tool(name = "get_utm_crs", description = "WGS 84 / UTM CRS code for a [lon, lat] point")]
    async fn get_utm_crs(
        &self,
        Parameters(request): Parameters<LonLatRequest>,
    ) -> Result<Json<CrsCodeResponse>, ErrorData> {
        tools::run_blocking("get_utm_crs", move || super::utm_crs(request)).await
    }

    #[tool(name = "get_geocentric_crs", description = "Geocentric CRS code for a location")]
    async fn get_geocentric_crs(
        &self,
        Parameters(request): Parameters<LonLatRequest>,
    ) -> Result<Json<CrsCodeResponse>, ErrorData> {
        tools::run_blocking("get_geocentric_crs", move || super::geocentric_crs(request)).await
    }
}
