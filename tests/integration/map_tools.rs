use anyhow::Result;
use serde_json::json;
use tempfile::tempdir;

use crate::common::{call, connect, error_code, shutdown, test_config};

#[tokio::test]
async fn create_map_writes_an_image_under_the_storage_root() -> Result<()> {
    let storage = tempdir()?;
    let (client, server_task) = connect(test_config(storage.path())).await?;

    let response = call(
        &client,
        "create_map",
        json!({
            "layers": [
                {
                    "data": "POLYGON ((0 0, 4 0, 4 3, 0 3, 0 0))",
                    "style": {"label": "lot", "color": "lightgreen"}
                },
                {"data": [[1.0, 1.0], [3.0, 2.0]], "style": {"label": "path"}}
            ],
            "filename": "site",
            "filetype": "svg",
            "title": "Site plan"
        }),
    )
    .await?
    .expect("map drawn");
    assert_eq!(response["status"], "success");
    assert_eq!(response["layer_count"], 2);
    let path = response["output_path"].as_str().expect("output path");
    assert!(path.ends_with("outputs/site.svg"), "{path}");
    let svg = std::fs::read_to_string(path)?;
    assert!(svg.contains("Site plan"));

    let error = call(
        &client,
        "create_map",
        json!({"layers": [{"data": "POINT (0 0)"}], "filetype": "tiff"}),
    )
    .await?
    .expect_err("unsupported image type");
    assert_eq!(error_code(&error).as_deref(), Some("unsupported_format"));

    shutdown(client, server_task).await;
    Ok(())
}

#[tokio::test]
async fn create_web_map_writes_a_leaflet_page() -> Result<()> {
    let storage = tempdir()?;
    let (client, server_task) = connect(test_config(storage.path())).await?;

    let response = call(
        &client,
        "create_web_map",
        json!({
            "layers": [{"data": "POINT (13.4 52.5)", "style": {"label": "Berlin"}}],
            "filename": "capital",
            "basemap": "OpenTopoMap",
            "add_minimap": false
        }),
    )
    .await?
    .expect("page written");
    let path = response["output_path"].as_str().expect("output path");
    assert!(path.ends_with("outputs/capital.html"), "{path}");
    let page = std::fs::read_to_string(path)?;
    assert!(page.contains("L.geoJSON"));
    assert!(page.contains("opentopomap"));
    assert!(page.contains("Berlin"));
    assert!(page.contains("<title>My Map</title>"));

    let error = call(
        &client,
        "create_web_map",
        json!({"layers": [{"data": "POINT (0 0)"}], "basemap": "Nowhere"}),
    )
    .await?
    .expect_err("unknown basemap");
    assert_eq!(error_code(&error).as_deref(), Some("invalid_input"));

    shutdown(client, server_task).await;
    Ok(())
}
