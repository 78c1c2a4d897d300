use rmcp::{handler::server::wrapper::Parameters, model::ErrorData, tool, tool_router, Json};

use crate::{
    server::runtime::GisServer,
    tools::{self, ServerToolRouter},
};

use super::{ops::Overlay, *};

pub(crate) fn router() -> ServerToolRouter<GisServer> {
    GisServer::geometry_router()
}

#[tool_router(router = geometry_router)]
impl GisServer {
    #[tool(
        name = "buffer",
        description = "Buffer a WKT geometry by a distance (join_style 1 round, 2 mitre, 3 bevel)"
    )]
    async fn buffer(
        &self,
        Parameters(request): Parameters<BufferRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("buffer", move || super::buffer(request)).await
    }

    #[tool(name = "intersection", description = "Intersection of two WKT geometries")]
    async fn intersection(
        &self,
        Parameters(request): Parameters<GeometryPairRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("intersection", move || {
            super::overlay(request, Overlay::Intersection)
        })
        .await
    }

    #[tool(name = "union", description = "Union of two WKT geometries")]
    async fn union(
        &self,
        Parameters(request): Parameters<GeometryPairRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("union", move || super::overlay(request, Overlay::Union)).await
    }

    #[tool(
        name = "difference",
        description = "Part of geometry1 not covered by geometry2"
    )]
    async fn difference(
        &self,
        Parameters(request): Parameters<GeometryPairRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("difference", move || {
            super::overlay(request, Overlay::Difference)
        })
        .await
    }

    #[tool(
        name = "symmetric_difference",
        description = "Parts of two WKT geometries that do not overlap"
    )]
    async fn symmetric_difference(
        &self,
        Parameters(request): Parameters<GeometryPairRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("symmetric_difference", move || {
            super::overlay(request, Overlay::SymmetricDifference)
        })
        .await
    }

    #[tool(name = "convex_hull", description = "Convex hull of a WKT geometry")]
    async fn convex_hull(
        &self,
        Parameters(request): Parameters<GeometryRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("convex_hull", move || super::convex_hull(request)).await
    }

    #[tool(name = "envelope", description = "Axis-aligned bounding box of a WKT geometry")]
    async fn envelope(
        &self,
        Parameters(request): Parameters<GeometryRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("envelope", move || super::envelope(request)).await
    }

    #[tool(
        name = "minimum_rotated_rectangle",
        description = "Smallest rotated rectangle enclosing a WKT geometry"
    )]
    async fn minimum_rotated_rectangle(
        &self,
        Parameters(request): Parameters<GeometryRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("minimum_rotated_rectangle", move || {
            super::minimum_rotated_rectangle(request)
        })
        .await
    }

    #[tool(name = "get_centroid", description = "Centroid of a WKT geometry")]
    async fn get_centroid(
        &self,
        Parameters(request): Parameters<GeometryRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("get_centroid", move || super::centroid(request)).await
    }

    #[tool(
        name = "get_bounds",
        description = "Bounds [minx, miny, maxx, maxy] of a WKT geometry"
    )]
    async fn get_bounds(
        &self,
        Parameters(request): Parameters<GeometryRequest>,
    ) -> Result<Json<BoundsResponse>, ErrorData> {
        tools::run_blocking("get_bounds", move || super::bounds(request)).await
    }

    #[tool(name = "get_coordinates", description = "Vertex coordinates of a WKT geometry")]
    async fn get_coordinates(
        &self,
        Parameters(request): Parameters<GeometryRequest>,
    ) -> Result<Json<CoordinatesResponse>, ErrorData> {
        tools::run_blocking("get_coordinates", move || super::coordinates(request)).await
    }

    #[tool(name = "get_geometry_type", description = "Simple-features type of a WKT geometry")]
    async fn get_geometry_type(
        &self,
        Parameters(request): Parameters<GeometryRequest>,
    ) -> Result<Json<GeometryTypeResponse>, ErrorData> {
        tools::run_blocking("get_geometry_type", move || super::geometry_type(request)).await
    }

    #[tool(
        name = "rotate_geometry",
        description = "Rotate a WKT geometry counter-clockwise about center, centroid or x,y"
    )]
    async fn rotate_geometry(
        &self,
        Parameters(request): Parameters<RotateRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("rotate_geometry", move || super::rotate(request)).await
    }

    #[tool(name = "scale_geometry", description = "Scale a WKT geometry by x and y factors")]
    async fn scale_geometry(
        &self,
        Parameters(request): Parameters<ScaleRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("scale_geometry", move || super::scale(request)).await
    }

    #[tool(name = "translate_geometry", description = "Shift a WKT geometry by x and y offsets")]
    async fn translate_geometry(
        &self,
        Parameters(request): Parameters<TranslateRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("translate_geometry", move || super::translate(request)).await
    }

    #[tool(
        name = "triangulate_geometry",
        description = "Delaunay triangles of a geometry's vertices"
    )]
    async fn triangulate_geometry(
        &self,
        Parameters(request): Parameters<GeometryRequest>,
    ) -> Result<Json<GeometriesResponse>, ErrorData> {
        tools::run_blocking("triangulate_geometry", move || super::triangulate(request)).await
    }

    #[tool(name = "voronoi", description = "Voronoi diagram of a geometry's vertices")]
    async fn voronoi(
        &self,
        Parameters(request): Parameters<GeometryRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("voronoi", move || super::voronoi(request)).await
    }

    #[tool(
        name = "unary_union_geometries",
        description = "Merge a list of WKT geometries into one"
    )]
    async fn unary_union_geometries(
        &self,
        Parameters(request): Parameters<UnaryUnionRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("unary_union_geometries", move || super::unary_union(request)).await
    }

    #[tool(name = "get_length", description = "Planar length or perimeter of a WKT geometry")]
    async fn get_length(
        &self,
        Parameters(request): Parameters<GeometryRequest>,
    ) -> Result<Json<LengthResponse>, ErrorData> {
        tools::run_blocking("get_length", move || super::length(request)).await
    }

    #[tool(name = "get_area", description = "Planar area of a WKT geometry")]
    async fn get_area(
        &self,
        Parameters(request): Parameters<GeometryRequest>,
    ) -> Result<Json<AreaResponse>, ErrorData> {
        tools::run_blocking("get_area", move || super::area(request)).await
    }

    #[tool(name = "is_valid", description = "Check validity of a WKT geometry with a reason")]
    async fn is_valid(
        &self,
        Parameters(request): Parameters<GeometryRequest>,
    ) -> Result<Json<ValidityResponse>, ErrorData> {
        tools::run_blocking("is_valid", move || super::is_valid(request)).await
    }

    #[tool(name = "make_valid", description = "Repair an invalid polygonal WKT geometry")]
    async fn make_valid(
        &self,
        Parameters(request): Parameters<GeometryRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("make_valid", move || super::make_valid(request)).await
    }

    #[tool(
        name = "simplify",
        description = "Douglas-Peucker simplification, optionally keeping the input when topology \
            breaks"
    )]
    async fn simplify(
        &self,
        Parameters(request): Parameters<SimplifyRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("simplify", move || super::simplify(request)).await
    }

    #[tool(
        name = "snap_geometry",
        description = "Snap vertices of geometry1 to geometry2 within a tolerance"
    )]
    async fn snap_geometry(
        &self,
        Parameters(request): Parameters<SnapRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("snap_geometry", move || super::snap(request)).await
    }

    #[tool(
        name = "nearest_point_on_geometry",
        description = "Point on geometry2 nearest to geometry1"
    )]
    async fn nearest_point_on_geometry(
        &self,
        Parameters(request): Parameters<GeometryPairRequest>,
    ) -> Result<Json<NearestPointResponse>, ErrorData> {
        tools::run_blocking("nearest_point_on_geometry", move || {
            super::nearest_point(request)
        })
        .await
    }

    #[tool(
        name = "normalize_geometry",
        description = "Canonical vertex order and ring orientation for a WKT geometry"
    )]
    async fn normalize_geometry(
        &self,
        Parameters(request): Parameters<GeometryRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("normalize_geometry", move || super::normalize(request)).await
    }

    #[tool(name = "geometry_to_geojson", description = "Convert WKT to a GeoJSON geometry")]
    async fn geometry_to_geojson(
        &self,
        Parameters(request): Parameters<GeometryRequest>,
    ) -> Result<Json<GeoJsonResponse>, ErrorData> {
        tools::run_blocking("geometry_to_geojson", move || {
            super::geometry_to_geojson(request)
        })
        .await
    }

    #[tool(name = "geojson_to_geometry", description = "Convert a GeoJSON geometry to WKT")]
    async fn geojson_to_geometry(
        &self,
        Parameters(request): Parameters<GeoJsonRequest>,
    ) -> Result<Json<GeometryResponse>, ErrorData> {
        tools::run_blocking("geojson_to_geometry", move || {
            super::geojson_to_geometry(request)
        })
        .await
    }
}
