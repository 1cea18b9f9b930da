use crate::domain::model::{Feature, Geometry, Layer};
use crate::domain::ports::LayerSource;
use crate::utils::error::{QaError, Result};
use serde_json::{Number, Value};
use shapefile::dbase::{self, FieldValue};
use shapefile::Shape;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Reads ESRI shapefiles and DBF tables from disk.
#[derive(Debug, Clone, Default)]
pub struct ShapefileSource;

impl ShapefileSource {
    pub fn new() -> Self {
        Self
    }
}

impl LayerSource for ShapefileSource {
    fn read_shapes(&self, path: &Path) -> Result<Layer> {
        let name = layer_name(path)?;
        let fields = dbf_field_names(&path.with_extension("dbf"))?;
        let rows = shapefile::read(path)?;

        let mut layer = Layer::new(name, fields);
        for (shape, record) in rows {
            let geometry =
                convert_shape(shape).map_err(|reason| QaError::layer(&layer.name, reason))?;
            layer.push(Feature {
                geometry,
                attributes: convert_record(record),
            });
        }

        tracing::debug!("Read {} features from {}", layer.len(), path.display());
        Ok(layer)
    }

    fn read_table(&self, path: &Path) -> Result<Layer> {
        let name = layer_name(path)?;
        let mut reader = dbase::Reader::from_path(path)?;
        let fields = reader
            .fields()
            .iter()
            .map(|field| field.name().to_string())
            .filter(|name| !name.starts_with("DeletionFlag"))
            .collect();
        let records = reader.read()?;

        let mut layer = Layer::new(name, fields);
        for record in records {
            layer.push(Feature {
                geometry: None,
                attributes: convert_record(record),
            });
        }

        tracing::debug!("Read {} records from {}", layer.len(), path.display());
        Ok(layer)
    }
}

fn layer_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| QaError::processing(format!("Invalid layer path: {}", path.display())))
}

fn dbf_field_names(path: &Path) -> Result<Vec<String>> {
    let reader = dbase::Reader::from_path(path)?;
    Ok(reader
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .filter(|name| !name.starts_with("DeletionFlag"))
        .collect())
}

fn convert_shape(shape: Shape) -> std::result::Result<Option<Geometry>, String> {
    fn parts<P>(parts: &[Vec<P>], xy: impl Fn(&P) -> (f64, f64)) -> Geometry {
        Geometry::multi_line(
            parts
                .iter()
                .map(|part| part.iter().map(&xy).collect())
                .collect(),
        )
    }

    let geometry = match shape {
        Shape::NullShape => None,
        Shape::Point(p) => Some(Geometry::point(p.x, p.y)),
        Shape::PointM(p) => Some(Geometry::point(p.x, p.y)),
        Shape::PointZ(p) => Some(Geometry::point_z(p.x, p.y, p.z)),
        Shape::Polyline(line) => Some(parts(line.parts(), |p| (p.x, p.y))),
        Shape::PolylineM(line) => Some(parts(line.parts(), |p| (p.x, p.y))),
        Shape::PolylineZ(line) => Some(parts(line.parts(), |p| (p.x, p.y))),
        Shape::Polygon(_) | Shape::PolygonM(_) | Shape::PolygonZ(_) => {
            return Err("polygon geometries are not supported".to_string())
        }
        Shape::Multipoint(_) | Shape::MultipointM(_) | Shape::MultipointZ(_) => {
            return Err("multipoint geometries are not supported".to_string())
        }
        _ => return Err("unsupported geometry type".to_string()),
    };
    Ok(geometry)
}

fn convert_record(record: dbase::Record) -> BTreeMap<String, Value> {
    let map: HashMap<String, FieldValue> = record.into();
    map.into_iter()
        .map(|(name, value)| (name, convert_value(value)))
        .collect()
}

fn number(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        Value::from(value as i64)
    } else {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

/// DBF value as JSON. Blank character fields become null.
fn convert_value(value: FieldValue) -> Value {
    match value {
        FieldValue::Character(Some(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else {
                Value::String(trimmed.to_string())
            }
        }
        FieldValue::Numeric(Some(n)) => number(n),
        FieldValue::Float(Some(f)) => number(f64::from(f)),
        FieldValue::Integer(i) => Value::from(i),
        FieldValue::Double(d) => number(d),
        FieldValue::Currency(c) => number(c),
        FieldValue::Logical(Some(b)) => Value::Bool(b),
        FieldValue::Date(Some(d)) => {
            Value::String(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()))
        }
        FieldValue::Memo(s) if !s.trim().is_empty() => Value::String(s),
        _ => Value::Null,
    }
}
