use anyhow::Result;
use rmcp::model::{ErrorCode, ReadResourceRequestParam, ResourceContents};
use serde_json::Value;
use tempfile::tempdir;

use crate::common::{connect, shutdown, test_config};

#[tokio::test]
async fn every_tool_family_is_listed() -> Result<()> {
    let storage = tempdir()?;
    let (client, server_task) = connect(test_config(storage.path())).await?;

    let tools = client.list_all_tools().await?;
    let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_ref()).collect();
    for expected in [
        "buffer",
        "get_area",
        "get_crs_info",
        "read_file_gpd",
        "zonal_statistics",
        "getis_ord_g",
        "spatial_markov",
        "build_transform_and_save_weights",
        "save_results",
        "create_map",
        "create_web_map",
    ] {
        assert!(names.contains(&expected), "missing tool {expected}: {names:?}");
    }
    assert!(tools.iter().all(|tool| tool.description.is_some()));

    shutdown(client, server_task).await;
    Ok(())
}

#[tokio::test]
async fn resources_list_and_read() -> Result<()> {
    let storage = tempdir()?;
    let (client, server_task) = connect(test_config(storage.path())).await?;

    let resources = client.list_all_resources().await?;
    assert!(resources
        .iter()
        .any(|resource| resource.raw.uri == "gis://operations/basic"));

    let read = client
        .read_resource(ReadResourceRequestParam {
            uri: "gis://operations/basic".into(),
        })
        .await?;
    let text = match &read.contents[0] {
        ResourceContents::TextResourceContents { text, .. } => text.clone(),
        other => panic!("expected text contents, got {other:?}"),
    };
    let body: Value = serde_json::from_str(&text)?;
    let operations = body["operations"].as_array().expect("operations array");
    assert!(operations.iter().any(|op| op == "buffer"));

    let missing = client
        .read_resource(ReadResourceRequestParam {
            uri: "gis://operations/unknown".into(),
        })
        .await
        .expect_err("unknown uri");
    match missing {
        rmcp::service::ServiceError::McpError(error) => {
            assert_eq!(error.code, ErrorCode::RESOURCE_NOT_FOUND)
        }
        other => panic!("expected an MCP error, got {other:?}"),
    }

    shutdown(client, server_task).await;
    Ok(())
}
