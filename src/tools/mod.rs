//! MCP tools registered on the server and helper functions for the router.

pub mod crs;
pub mod errors;
pub mod geometry;
pub mod raster;
pub mod resources;
pub mod stats;
pub mod storage;
pub mod vector;
pub mod visualize;

use rmcp::{handler::server::router::tool::ToolRouter, model::ErrorData, Json};

use crate::lib::{errors::GisError, telemetry::ToolSpan};

pub use errors::gis_error_to_error_data;

pub type ServerToolRouter<S> = ToolRouter<S>;

/// Value of the `status` field on every successful response.
pub const SUCCESS: &str = "success";

/// Helper for building a tool router.
pub fn build_router<S>(builder: impl FnOnce() -> ServerToolRouter<S>) -> ServerToolRouter<S>
where
    S: Send + Sync + 'static,
{
    builder()
}

/// Run library work off the async runtime, recording a tool span and mapping failures.
pub async fn run_blocking<T, F>(tool: &'static str, work: F) -> Result<Json<T>, ErrorData>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, GisError> + Send + 'static,
{
    let span = ToolSpan::start(tool);
    let outcome = match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(join_error) => Err(GisError::Internal {
            message: join_error.to_string(),
        }),
    };

    match outcome {
        Ok(value) => {
            span.finish();
            Ok(Json(value))
        }
        Err(err) => {
            span.fail(&err.to_string());
            Err(gis_error_to_error_data(tool, err))
        }
    }
}
