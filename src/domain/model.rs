use crate::utils::error::QaError;
use geo::{Coord, LineString, MultiLineString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of boundary line being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum LineType {
    /// Official delimitation line (MTT).
    Mtt,
    /// Non-official re-staking line (REP).
    Rep,
}

const MTT_TRAM_FIELDS: &[&str] = &[
    "ID_LINIA", "ID", "DATA", "COMENTARI", "P1", "P2", "P3", "P4", "PF", "ID_FITA1", "ID_FITA2",
];

const REP_TRAM_FIELDS: &[&str] = &[
    "ID", "ID_LINIA", "ID_SECTOR", "ID_TRAM", "OBSERVACIO", "CORR_DIF", "ID_FITA1", "ID_FITA2",
];

impl LineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineType::Mtt => "mtt",
            LineType::Rep => "rep",
        }
    }

    pub fn is_official(&self) -> bool {
        matches!(self, LineType::Mtt)
    }

    pub fn description(&self) -> &'static str {
        match self {
            LineType::Mtt => "MTT official delimitation",
            LineType::Rep => "REP re-staking",
        }
    }

    /// Layer holding the delivered trams.
    pub fn tram_layer(&self) -> &'static str {
        match self {
            LineType::Mtt => "Lin_TramPpta",
            LineType::Rep => "Lin_Tram",
        }
    }

    pub fn tram_label(&self) -> &'static str {
        match self {
            LineType::Mtt => "Lin Tram Proposta",
            LineType::Rep => "Lin Tram",
        }
    }

    pub fn reference_suffix(&self) -> &'static str {
        match self {
            LineType::Mtt => "mem",
            LineType::Rep => "rep",
        }
    }

    pub fn reference_tram_layer(&self) -> String {
        format!("tram_linia_{}", self.reference_suffix())
    }

    pub fn reference_point_layer(&self) -> String {
        format!("fita_{}", self.reference_suffix())
    }

    pub fn required_tram_fields(&self) -> &'static [&'static str] {
        match self {
            LineType::Mtt => MTT_TRAM_FIELDS,
            LineType::Rep => REP_TRAM_FIELDS,
        }
    }
}

impl fmt::Display for LineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LineType {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mtt" => Ok(LineType::Mtt),
            "rep" => Ok(LineType::Rep),
            other => Err(QaError::ValidationError {
                message: format!("Unknown line type '{}', expected 'mtt' or 'rep'", other),
            }),
        }
    }
}

/// Line id in its four digit text form, e.g. `7 -> "0007"`.
pub fn line_id_text(line_id: u32) -> String {
    format!("{:04}", line_id)
}

/// Last dash separated token of an identifier, as shown in reports.
pub fn short_id(id: &str) -> &str {
    id.rsplit('-').next().unwrap_or(id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    Point {
        x: f64,
        y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        z: Option<f64>,
    },
    Lines { lines: MultiLineString<f64> },
}

impl Geometry {
    pub fn point(x: f64, y: f64) -> Self {
        Geometry::Point { x, y, z: None }
    }

    pub fn point_z(x: f64, y: f64, z: f64) -> Self {
        Geometry::Point { x, y, z: Some(z) }
    }

    pub fn line(coords: Vec<(f64, f64)>) -> Self {
        Geometry::Lines {
            lines: MultiLineString::new(vec![LineString::from(coords)]),
        }
    }

    pub fn multi_line(parts: Vec<Vec<(f64, f64)>>) -> Self {
        Geometry::Lines {
            lines: MultiLineString::new(parts.into_iter().map(LineString::from).collect()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point { .. } => false,
            Geometry::Lines { lines } => lines.iter().all(|part| part.0.is_empty()),
        }
    }

    pub fn as_lines(&self) -> Option<&MultiLineString<f64>> {
        match self {
            Geometry::Lines { lines } => Some(lines),
            Geometry::Point { .. } => None,
        }
    }

    pub fn part_count(&self) -> usize {
        match self {
            Geometry::Point { .. } => 1,
            Geometry::Lines { lines } => lines.0.len(),
        }
    }

    pub fn coords(&self) -> Vec<Coord<f64>> {
        match self {
            Geometry::Point { x, y, .. } => vec![Coord { x: *x, y: *y }],
            Geometry::Lines { lines } => lines.iter().flat_map(|part| part.0.iter().copied()).collect(),
        }
    }

    pub fn first_coord(&self) -> Option<Coord<f64>> {
        match self {
            Geometry::Point { x, y, .. } => Some(Coord { x: *x, y: *y }),
            Geometry::Lines { lines } => lines.iter().find_map(|part| part.0.first().copied()),
        }
    }

    pub fn last_coord(&self) -> Option<Coord<f64>> {
        match self {
            Geometry::Point { x, y, .. } => Some(Coord { x: *x, y: *y }),
            Geometry::Lines { lines } => lines.0.iter().rev().find_map(|part| part.0.last().copied()),
        }
    }

    pub fn to_wkt(&self) -> String {
        fn coord_list(part: &LineString<f64>) -> String {
            part.0
                .iter()
                .map(|c| format!("{} {}", c.x, c.y))
                .collect::<Vec<_>>()
                .join(", ")
        }

        match self {
            Geometry::Point { x, y, z: Some(z) } => format!("POINT Z ({} {} {})", x, y, z),
            Geometry::Point { x, y, z: None } => format!("POINT ({} {})", x, y),
            Geometry::Lines { lines } if lines.0.len() == 1 => {
                format!("LINESTRING ({})", coord_list(&lines.0[0]))
            }
            Geometry::Lines { lines } => {
                let parts: Vec<String> = lines
                    .iter()
                    .map(|part| format!("({})", coord_list(part)))
                    .collect();
                format!("MULTILINESTRING ({})", parts.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub geometry: Option<Geometry>,
    pub attributes: BTreeMap<String, Value>,
}

impl Feature {
    pub fn new(geometry: Option<Geometry>) -> Self {
        Self {
            geometry,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(field.to_string(), value.into());
        self
    }

    /// Attribute value, treating JSON null as absent.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field).filter(|v| !v.is_null())
    }

    /// Attribute rendered as text. Whole numbers print without decimals and
    /// blank strings count as absent.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(n) => Some(match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => i.to_string(),
                (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
                _ => n.to_string(),
            }),
            Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            other => Some(other.to_string()),
        }
    }

    pub fn int(&self, field: &str) -> Option<i64> {
        match self.get(field)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| f as i64)
                })
            }
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// True when the attribute holds a non-blank value.
    pub fn is_set(&self, field: &str) -> bool {
        self.text(field).is_some()
    }

    /// True when the attribute reads as `1`, whatever its storage type.
    pub fn flag(&self, field: &str) -> bool {
        self.text(field).as_deref() == Some("1")
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.as_ref().map_or(true, Geometry::is_empty)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub fields: Vec<String>,
    pub features: Vec<Feature>,
}

impl Layer {
    pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            fields,
            features: Vec::new(),
        }
    }

    pub fn with_features(mut self, features: Vec<Feature>) -> Self {
        self.features = features;
        self
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Text values of a field, skipping features where it is blank.
    pub fn texts(&self, field: &str) -> Vec<String> {
        self.features.iter().filter_map(|f| f.text(field)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReportLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl ReportLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportLevel::Info => "INFO",
            ReportLevel::Warning => "WARNING",
            ReportLevel::Error => "ERROR",
            ReportLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for ReportLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub level: String,
    pub report_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaResponse {
    pub result: String,
    pub message: String,
    pub reports: Vec<ReportEntry>,
}

impl QaResponse {
    pub fn ok(message: impl Into<String>, reports: Vec<ReportEntry>) -> Self {
        Self {
            result: "OK".to_string(),
            message: message.into(),
            reports,
        }
    }

    pub fn error(message: impl Into<String>, reports: Vec<ReportEntry>) -> Self {
        Self {
            result: "error".to_string(),
            message: message.into(),
            reports,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result == "OK"
    }
}
