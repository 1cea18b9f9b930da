use anyhow::Result;
use delimit_qa::config::toml_config::ReferenceConfig;
use delimit_qa::core::reference::{clear_store, update_reference_layers};
use delimit_qa::domain::model::Layer;
use delimit_qa::domain::ports::LayerStore;
use delimit_qa::utils::validation::Validate;
use delimit_qa::{HttpReferenceSource, QaConfig, SqliteStore};
use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn collection(line_id: i64) -> serde_json::Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [10.0, 0.0]]},
            "properties": {"id_linia": line_id, "id_sessio_": "S1"}
        }]
    })
}

/// Refresh the reference layers from a TOML configured service, then clear the store.
#[tokio::test]
async fn test_update_then_clear_working_store() -> Result<()> {
    let server = MockServer::start();
    let fita_mock = server.mock(|when, then| {
        when.method(GET).path("/sidm3.v_fita_mem");
        then.status(200).json_body(json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
                "properties": {"id_linia": 7, "id_u_fita": "70010"}
            }]
        }));
    });
    let tram_mock = server.mock(|when, then| {
        when.method(GET).path("/sidm3.v_tram_linia_mem");
        then.status(200).json_body(collection(7));
    });

    let temp_dir = TempDir::new()?;
    let temp_path = temp_dir.path().to_string_lossy().replace('\\', "/");
    let config_content = format!(
        r#"
[paths]
work_store = "{}/store/work.sqlite"

[reference]
base_url = "{}"
"#,
        temp_path,
        server.url("")
    );
    let config_path = temp_dir.path().join("delimit-qa.toml");
    tokio::fs::write(&config_path, config_content).await?;
    let config = QaConfig::from_file(&config_path)?;
    config.validate()?;

    let store = SqliteStore::open(&config.paths.work_store)?;
    store.write_layer(&Layer::new("Punt", vec![]))?;
    let source = HttpReferenceSource::new(&config.reference)?;

    let updated = update_reference_layers(&source, &store, &config.reference.layers).await?;
    fita_mock.assert();
    tram_mock.assert();
    assert_eq!(updated, vec!["fita_mem", "tram_linia_mem"]);

    // a second store handle sees the refreshed layers
    let reopened = SqliteStore::open(&config.paths.work_store)?;
    let trams = reopened.read_layer("tram_linia_mem")?.expect("tram layer");
    assert_eq!(trams.len(), 1);
    assert_eq!(trams.features[0].int("id_linia"), Some(7));

    let dropped = clear_store(&reopened, &config.entities.persistent_layers)?;
    assert_eq!(dropped, vec!["Punt"]);
    assert!(reopened.read_layer("fita_mem")?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_failed_fetch_stops_the_update() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/remote_a");
        then.status(200).json_body(collection(3));
    });
    server.mock(|when, then| {
        when.method(GET).path("/remote_b");
        then.status(503);
    });

    let mut config = ReferenceConfig {
        base_url: server.url(""),
        ..ReferenceConfig::default()
    };
    config.layers.clear();
    config.layers.insert("remote_a".to_string(), "layer_a".to_string());
    config.layers.insert("remote_b".to_string(), "layer_b".to_string());

    let store = SqliteStore::open_in_memory().unwrap();
    let source = HttpReferenceSource::new(&config).unwrap();
    let result = update_reference_layers(&source, &store, &config.layers).await;

    assert!(result.is_err());
    assert!(store.read_layer("layer_a").unwrap().is_some());
    assert!(store.read_layer("layer_b").unwrap().is_none());
}
