use crate::domain::ports::{LayerStore, ReferenceSource};
use crate::utils::error::Result;
use std::collections::BTreeMap;

/// Replace the reference layers of the working store with fresh copies.
///
/// `layers` maps remote table names to local layer names. Returns the local
/// names written, in map order. The first failing fetch aborts the update and
/// leaves the layers already written in place.
pub async fn update_reference_layers<R, T>(
    source: &R,
    store: &T,
    layers: &BTreeMap<String, String>,
) -> Result<Vec<String>>
where
    R: ReferenceSource,
    T: LayerStore,
{
    let mut updated = Vec::with_capacity(layers.len());
    for (remote, local) in layers {
        tracing::info!("Updating reference layer {} from {}", local, remote);
        let layer = source.fetch_layer(remote, local).await?;
        store.write_layer(&layer)?;
        tracing::info!("Layer {} updated with {} features", local, layer.len());
        updated.push(local.clone());
    }
    Ok(updated)
}

/// Drop every layer that is not persistent. Returns the dropped names.
pub fn clear_store<T: LayerStore>(store: &T, persistent: &[String]) -> Result<Vec<String>> {
    let dropped = store.clear_except(persistent)?;
    for name in &dropped {
        tracing::info!("Layer {} dropped", name);
    }
    Ok(dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{HttpReferenceSource, SqliteStore};
    use crate::config::toml_config::ReferenceConfig;
    use crate::domain::model::Layer;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_update_reference_layers() {
        let server = MockServer::start();
        let fita_mock = server.mock(|when, then| {
            when.method(GET).path("/sidm3.v_fita_mem");
            then.status(200).json_body(json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
                    "properties": {"id_linia": 7}
                }]
            }));
        });
        let tram_mock = server.mock(|when, then| {
            when.method(GET).path("/sidm3.v_tram_linia_mem");
            then.status(200).json_body(json!({"type": "FeatureCollection", "features": []}));
        });

        let config = ReferenceConfig {
            base_url: server.url(""),
            ..ReferenceConfig::default()
        };
        let source = HttpReferenceSource::new(&config).unwrap();
        let store = SqliteStore::open_in_memory().unwrap();

        let updated = update_reference_layers(&source, &store, &config.layers)
            .await
            .unwrap();

        fita_mock.assert();
        tram_mock.assert();
        assert_eq!(updated, vec!["fita_mem", "tram_linia_mem"]);
        assert_eq!(store.read_layer("fita_mem").unwrap().unwrap().len(), 1);
        assert!(store.read_layer("tram_linia_mem").unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_clear_store_keeps_persistent_layers() {
        let store = SqliteStore::open_in_memory().unwrap();
        for name in ["fita_mem", "Punt", "Lin_Tram"] {
            store.write_layer(&Layer::new(name, vec![])).unwrap();
        }

        let mut dropped = clear_store(&store, &["fita_mem".to_string()]).unwrap();
        dropped.sort();
        assert_eq!(dropped, vec!["Lin_Tram", "Punt"]);
        assert_eq!(store.layer_names().unwrap(), vec!["fita_mem"]);
    }
}
