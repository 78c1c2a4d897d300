use anyhow::Result;
use serde_json::{json, Value};
use tempfile::tempdir;

use crate::common::{call, connect, error_code, shutdown, test_config};

#[tokio::test]
async fn save_results_writes_requested_formats() -> Result<()> {
    let storage = tempdir()?;
    let (client, server_task) = connect(test_config(storage.path())).await?;

    let response = call(
        &client,
        "save_results",
        json!({
            "data": {"area": 2.5, "geometry": "POINT (1 2)"},
            "filename": "run",
            "formats": ["json", "geojson"],
            "folder": "reports",
        }),
    )
    .await?
    .expect("save succeeds");
    assert_eq!(response["status"], "success");
    let saved = response["saved_files"].as_object().expect("saved_files");
    let json_path = saved["json"].as_str().expect("json path");
    assert!(json_path.ends_with("reports/run.json"), "{json_path}");
    let written: Value = serde_json::from_str(&std::fs::read_to_string(json_path)?)?;
    assert_eq!(written["area"], 2.5);
    assert!(std::path::Path::new(saved["geojson"].as_str().expect("geojson path")).exists());

    let error = call(
        &client,
        "save_results",
        json!({"data": {"a": 1}, "formats": ["xlsx"]}),
    )
    .await?
    .expect_err("unknown format");
    assert_eq!(error_code(&error).as_deref(), Some("unsupported_format"));

    shutdown(client, server_task).await;
    Ok(())
}
