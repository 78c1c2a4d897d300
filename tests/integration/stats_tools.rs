use anyhow::Result;
use serde_json::json;
use tempfile::tempdir;

use crate::common::{call, connect, error_code, shutdown, test_config, write_grid};

/// Small deterministic offset so regressions are not exact fits.
fn jitter(col: usize, row: usize) -> f64 {
    (((col * 7 + row * 3) % 5) as f64 - 2.0) * 0.05
}

#[tokio::test]
async fn morans_i_detects_a_gradient() -> Result<()> {
    let storage = tempdir()?;
    let layer = write_grid(storage.path(), "gradient.geojson", 4, |col, row| {
        json!({"value": (col + row) as f64})
    })?;
    let (client, server_task) = connect(test_config(storage.path())).await?;

    let response = call(
        &client,
        "morans_i",
        json!({
            "shapefile_path": layer,
            "dependent_var": "value",
            "distance_threshold": 150000.0,
        }),
    )
    .await?
    .expect("morans_i succeeds");
    assert_eq!(response["status"], "success");
    let result = &response["result"];
    let i = result["I"].as_f64().expect("I");
    assert!(i > 0.3, "gradient should be positively autocorrelated: {i}");
    let expected = result["expected"].as_f64().expect("expected");
    assert!((expected + 1.0 / 15.0).abs() < 1e-9);
    assert!(result["data_preview"].as_array().expect("preview").len() <= 5);

    shutdown(client, server_task).await;
    Ok(())
}

#[tokio::test]
async fn join_counts_reports_the_total_number_of_joins() -> Result<()> {
    let storage = tempdir()?;
    let layer = write_grid(storage.path(), "checker.geojson", 4, |col, row| {
        json!({"LAND_USE": ((col + row) % 2) as f64})
    })?;
    let (client, server_task) = connect(test_config(storage.path())).await?;

    let response = call(
        &client,
        "join_counts",
        json!({
            "shapefile_path": layer,
            "dependent_var": "LAND_USE",
            "distance_threshold": 150000.0,
        }),
    )
    .await?
    .expect("join_counts succeeds");
    let result = &response["result"];
    // A 4x4 rook grid has 24 joins, all black-white on a checkerboard.
    assert_eq!(result["join_counts"].as_f64(), Some(24.0));
    assert_eq!(result["J"].as_f64(), Some(24.0));
    assert_eq!(result["bb"].as_f64(), Some(0.0));
    assert_eq!(result["bw"].as_f64(), Some(24.0));

    shutdown(client, server_task).await;
    Ok(())
}

#[tokio::test]
async fn unknown_dependent_variable_is_invalid_input() -> Result<()> {
    let storage = tempdir()?;
    let layer = write_grid(storage.path(), "grid.geojson", 3, |col, _| json!({"value": col}))?;
    let (client, server_task) = connect(test_config(storage.path())).await?;

    let error = call(
        &client,
        "gearys_c",
        json!({"shapefile_path": layer, "dependent_var": "missing"}),
    )
    .await?
    .expect_err("missing column");
    assert_eq!(error_code(&error).as_deref(), Some("invalid_input"));
    let reason = error.data.as_ref().expect("error data")["details"]["reason"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    assert!(reason.contains("'missing'"), "{reason}");

    shutdown(client, server_task).await;
    Ok(())
}

#[tokio::test]
async fn saved_weights_are_not_overwritten_silently() -> Result<()> {
    let storage = tempdir()?;
    let layer = write_grid(storage.path(), "grid.geojson", 3, |col, row| {
        json!({"value": col * 3 + row})
    })?;
    let (client, server_task) = connect(test_config(storage.path())).await?;
    let args = json!({
        "data_path": layer,
        "method": "rook",
        "transform_type": "r",
        "output_path": "grid_w",
    });

    let saved = call(&client, "build_transform_and_save_weights", args.clone())
        .await?
        .expect("first save succeeds");
    let path = saved["result"]["path"].as_str().expect("path").to_string();
    assert!(path.ends_with("grid_w.gal"), "{path}");
    assert!(std::path::Path::new(&path).exists());
    assert_eq!(saved["result"]["n"], 9);

    let error = call(&client, "build_transform_and_save_weights", args.clone())
        .await?
        .expect_err("second save collides");
    assert_eq!(error_code(&error).as_deref(), Some("output_exists"));

    let mut forced = args;
    forced["overwrite"] = json!(true);
    call(&client, "build_transform_and_save_weights", forced)
        .await?
        .expect("overwrite succeeds");

    shutdown(client, server_task).await;
    Ok(())
}

#[tokio::test]
async fn ols_recovers_linear_coefficients() -> Result<()> {
    let storage = tempdir()?;
    let layer = write_grid(storage.path(), "ols.geojson", 4, |col, row| {
        let x = (col * 4 + row) as f64;
        json!({"x": x, "y": 2.0 + 3.0 * x + jitter(col, row)})
    })?;
    let (client, server_task) = connect(test_config(storage.path())).await?;

    let response = call(
        &client,
        "ols_with_spatial_diagnostics_safe",
        json!({"data_path": layer, "y_field": "y", "x_fields": ["x"]}),
    )
    .await?
    .expect("ols succeeds");
    let result = &response["regression_results"];
    assert_eq!(result, &response["result"]);
    assert_eq!(result["n_obs"], 16);
    let slope = result["betas"]["x"].as_f64().expect("slope");
    let intercept = result["betas"]["const"].as_f64().expect("intercept");
    assert!((slope - 3.0).abs() < 0.05, "slope {slope}");
    assert!((intercept - 2.0).abs() < 0.3, "intercept {intercept}");
    assert!(result["r2"].as_f64().expect("r2") > 0.99);

    shutdown(client, server_task).await;
    Ok(())
}

#[tokio::test]
async fn spatial_markov_shapes_follow_the_class_counts() -> Result<()> {
    let storage = tempdir()?;
    let layer = write_grid(storage.path(), "panel.geojson", 4, |col, row| {
        let base = (col * 4 + row) as f64 + 1.0;
        let drift = ((col * 3 + row * 5) % 7) as f64;
        json!({"t1": base, "t2": base + drift, "t3": base + 2.0 * drift})
    })?;
    let (client, server_task) = connect(test_config(storage.path())).await?;

    let response = call(
        &client,
        "spatial_markov",
        json!({
            "shapefile_path": layer,
            "value_columns": "t1,t2,t3",
            "k": 2,
            "m": 2,
        }),
    )
    .await?
    .expect("spatial_markov succeeds");
    let result = &response["result"];
    assert_eq!(result["n_regions"], 16);
    assert_eq!(result["n_periods"], 3);
    let p = result["global_transition_prob_p"].as_array().expect("p");
    assert_eq!(p.len(), 2);
    assert!(p.iter().all(|row| row.as_array().map(Vec::len) == Some(2)));
    let conditional = result["conditional_transition_prob_P"].as_array().expect("P");
    assert_eq!(conditional.len(), 2);

    let error = call(
        &client,
        "spatial_markov",
        json!({"shapefile_path": layer, "value_columns": ["t1"]}),
    )
    .await?
    .expect_err("one period");
    assert_eq!(error_code(&error).as_deref(), Some("invalid_input"));

    shutdown(client, server_task).await;
    Ok(())
}
