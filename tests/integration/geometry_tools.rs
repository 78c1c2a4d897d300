use anyhow::Result;
use serde_json::json;
use tempfile::tempdir;

use crate::common::{call, connect, error_code, shutdown, test_config};

#[tokio::test]
async fn buffer_then_measure_area() -> Result<()> {
    let storage = tempdir()?;
    let (client, server_task) = connect(test_config(storage.path())).await?;

    let buffered = call(
        &client,
        "buffer",
        json!({"geometry": "POINT (0 0)", "distance": 1.0, "resolution": 32}),
    )
    .await?
    .expect("buffer succeeds");
    assert_eq!(buffered["status"], "success");
    let wkt = buffered["geometry"].as_str().expect("wkt").to_string();
    assert!(wkt.starts_with("POLYGON"), "unexpected buffer output: {wkt}");

    let area = call(&client, "get_area", json!({"geometry": wkt}))
        .await?
        .expect("area succeeds");
    let value = area["area"].as_f64().expect("numeric area");
    assert!((value - std::f64::consts::PI).abs() < 0.01, "area {value}");

    shutdown(client, server_task).await;
    Ok(())
}

#[tokio::test]
async fn malformed_wkt_reports_invalid_geometry() -> Result<()> {
    let storage = tempdir()?;
    let (client, server_task) = connect(test_config(storage.path())).await?;

    let error = call(&client, "get_area", json!({"geometry": "POLYGON ((0 0, 1"}))
        .await?
        .expect_err("malformed wkt");
    assert_eq!(error_code(&error).as_deref(), Some("invalid_geometry"));
    let data = error.data.as_ref().expect("error data");
    assert_eq!(data["tool"], "get_area");
    assert_eq!(data["retryable"], false);

    shutdown(client, server_task).await;
    Ok(())
}
