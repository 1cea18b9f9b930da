use crate::config::toml_config::ReferenceConfig;
use crate::domain::model::{Feature, Geometry, Layer};
use crate::domain::ports::ReferenceSource;
use crate::utils::error::{QaError, Result};
use async_trait::async_trait;
use geo::{LineString, MultiLineString};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Fetches reference layers as GeoJSON feature collections from
/// `<base_url>/<remote table>`.
pub struct HttpReferenceSource {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpReferenceSource {
    pub fn new(config: &ReferenceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn layer_url(&self, remote_name: &str) -> String {
        format!("{}/{}", self.base_url, remote_name)
    }
}

#[async_trait]
impl ReferenceSource for HttpReferenceSource {
    async fn fetch_layer(&self, remote_name: &str, local_name: &str) -> Result<Layer> {
        let url = self.layer_url(remote_name);
        tracing::debug!("Fetching reference layer from: {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        tracing::debug!("Reference service status: {}", response.status());
        if !response.status().is_success() {
            return Err(QaError::layer(
                local_name,
                format!(
                    "reference service answered {} for {}",
                    response.status(),
                    remote_name
                ),
            ));
        }

        let body: Value = response.json().await?;
        parse_feature_collection(local_name, &body)
    }
}

/// GeoJSON feature collection as served by the reference service.
#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<GeoJsonFeature>,
}

#[derive(Debug, Deserialize)]
struct GeoJsonFeature {
    #[serde(default)]
    geometry: Option<GeoJsonGeometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

/// Geometry kinds the reference layers use. Anything else fails to parse.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum GeoJsonGeometry {
    Point(Vec<f64>),
    LineString(Vec<Vec<f64>>),
    MultiLineString(Vec<Vec<Vec<f64>>>),
}

impl GeoJsonGeometry {
    fn into_geometry(self, layer: &str) -> Result<Geometry> {
        match self {
            GeoJsonGeometry::Point(position) => {
                let (x, y, z) = split_position(layer, &position)?;
                Ok(Geometry::Point { x, y, z })
            }
            GeoJsonGeometry::LineString(positions) => Ok(Geometry::Lines {
                lines: MultiLineString::new(vec![line_string(layer, &positions)?]),
            }),
            GeoJsonGeometry::MultiLineString(parts) => {
                let parts = parts
                    .iter()
                    .map(|part| line_string(layer, part))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Geometry::Lines {
                    lines: MultiLineString::new(parts),
                })
            }
        }
    }
}

/// Build a layer from a GeoJSON feature collection. Field order follows the
/// first appearance of each property.
pub fn parse_feature_collection(name: &str, body: &Value) -> Result<Layer> {
    let collection = FeatureCollection::deserialize(body).map_err(|e| {
        QaError::layer(name, format!("response is not a GeoJSON feature collection: {}", e))
    })?;

    let mut layer = Layer::new(name, Vec::new());
    for item in collection.features {
        let geometry = item
            .geometry
            .map(|g| g.into_geometry(name))
            .transpose()?;
        let mut feature = Feature::new(geometry);
        for (key, value) in item.properties.unwrap_or_default() {
            if !layer.has_field(&key) {
                layer.fields.push(key.clone());
            }
            feature.attributes.insert(key, value);
        }
        layer.push(feature);
    }

    Ok(layer)
}

fn line_string(layer: &str, positions: &[Vec<f64>]) -> Result<LineString<f64>> {
    let coords = positions
        .iter()
        .map(|p| split_position(layer, p).map(|(x, y, _)| (x, y)))
        .collect::<Result<Vec<_>>>()?;
    Ok(LineString::from(coords))
}

fn split_position(layer: &str, position: &[f64]) -> Result<(f64, f64, Option<f64>)> {
    match position {
        [x, y] => Ok((*x, *y, None)),
        [x, y, z, ..] => Ok((*x, *y, Some(*z))),
        _ => Err(QaError::layer(layer, format!("invalid position {:?}", position))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn reference_body() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [10.0, 0.0]]},
                    "properties": {"id_linia": 7, "id_sessio_": "S1"}
                },
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [10.0, 0.0, 120.5]},
                    "properties": {"id_linia": 7, "id_u_fita": "70001"}
                },
                {
                    "type": "Feature",
                    "geometry": null,
                    "properties": {"id_linia": 8}
                }
            ]
        })
    }

    #[test]
    fn test_parse_feature_collection() {
        let layer = parse_feature_collection("tram_linia_mem", &reference_body()).unwrap();
        assert_eq!(layer.len(), 3);
        assert_eq!(layer.fields, vec!["id_linia", "id_sessio_", "id_u_fita"]);
        assert_eq!(layer.features[0].geometry.as_ref().unwrap().coords().len(), 2);
        assert_eq!(
            layer.features[1].geometry,
            Some(Geometry::point_z(10.0, 0.0, 120.5))
        );
        assert!(layer.features[2].geometry.is_none());
    }

    #[test]
    fn test_parse_rejects_unsupported_payloads() {
        assert!(parse_feature_collection("fita_mem", &json!({"rows": []})).is_err());
        let polygon = json!({"features": [{"geometry": {"type": "Polygon", "coordinates": []}}]});
        assert!(parse_feature_collection("fita_mem", &polygon).is_err());
        let bad_position = json!({"features": [{"geometry": {"type": "Point", "coordinates": [1.0]}}]});
        assert!(parse_feature_collection("fita_mem", &bad_position).is_err());
    }

    #[test]
    fn test_parse_ignores_foreign_members() {
        let body = json!({
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "EPSG:25831"}},
            "features": [{
                "type": "Feature",
                "id": 12,
                "bbox": [0.0, 0.0, 4.0, 4.0],
                "geometry": {
                    "type": "MultiLineString",
                    "bbox": [0.0, 0.0, 4.0, 4.0],
                    "coordinates": [[[0.0, 0.0], [4.0, 0.0]], [[4.0, 0.0], [4.0, 4.0, 9.0]]]
                }
            }]
        });
        let layer = parse_feature_collection("tram_linia_mem", &body).unwrap();
        let geometry = layer.features[0].geometry.as_ref().unwrap();
        assert_eq!(geometry.part_count(), 2);
        assert_eq!(geometry.coords().len(), 4);
        assert!(layer.fields.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_layer_sends_token() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/collections/sidm3.v_tram_linia_mem")
                .header("Authorization", "Bearer secret");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(reference_body());
        });

        let config = ReferenceConfig {
            base_url: server.url("/collections/"),
            token: Some("secret".to_string()),
            ..ReferenceConfig::default()
        };
        let source = HttpReferenceSource::new(&config).unwrap();
        let layer = source
            .fetch_layer("sidm3.v_tram_linia_mem", "tram_linia_mem")
            .await
            .unwrap();

        api_mock.assert();
        assert_eq!(layer.name, "tram_linia_mem");
        assert_eq!(layer.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_layer_failure_status() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/sidm3.v_fita_mem");
            then.status(503);
        });

        let config = ReferenceConfig {
            base_url: server.url(""),
            ..ReferenceConfig::default()
        };
        let source = HttpReferenceSource::new(&config).unwrap();
        let result = source.fetch_layer("sidm3.v_fita_mem", "fita_mem").await;

        api_mock.assert();
        assert!(matches!(result, Err(QaError::LayerError { .. })));
    }
}
