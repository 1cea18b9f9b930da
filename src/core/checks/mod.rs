//! Quality checks over the layers of one delivered line.
//!
//! Each check reads the [`QaContext`] and appends its findings to the
//! [`ReportLog`]. Only the tram field structure can stop the run; every other
//! check reports and lets the next one continue.

pub mod attributes;
pub mod geometry;
pub mod points;
pub mod proposta;
pub mod topology;

use crate::core::predicates::{coord_key, CoordKey};
use crate::core::report::ReportLog;
use crate::domain::model::{Feature, Geometry, Layer, LineType};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

/// Layers of a line as loaded from the working store.
#[derive(Debug, Clone)]
pub struct LineData {
    pub line_id: u32,
    pub line_type: LineType,
    /// `Lin_TramPpta` (MTT) or `Lin_Tram` (REP).
    pub trams: Layer,
    /// `Punt`
    pub points: Layer,
    /// `PUNT_FIT`
    pub punt_fit: Layer,
    /// `P_Proposta`, optional for REP lines.
    pub p_proposta: Option<Layer>,
    pub db_trams: Layer,
    pub db_points: Layer,
    pub photo_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundPoint {
    /// `ID_FITA`, suffixed with `-aux` for auxiliary points.
    pub label: String,
    pub point_id: String,
}

/// Line data plus the lookup lists every check shares.
#[derive(Debug, Clone)]
pub struct QaContext {
    pub data: LineData,
    pub ppf: BTreeSet<String>,
    pub fites: BTreeSet<String>,
    pub found: Vec<FoundPoint>,
    pub point_coords: Vec<(String, CoordKey)>,
    pub line_coords: HashSet<CoordKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Completed,
    /// The run cannot continue; the message goes to the response.
    Stopped(String),
}

impl QaContext {
    pub fn build(data: LineData, log: &mut ReportLog) -> Self {
        let official = data.line_type.is_official();

        let ppf: BTreeSet<String> = match (&data.p_proposta, official) {
            (Some(p_proposta), true) => p_proposta
                .features
                .iter()
                .filter(|f| f.int("PFF") == Some(1))
                .filter_map(|f| f.text("ID_PUNT"))
                .collect(),
            _ => BTreeSet::new(),
        };

        let fites: BTreeSet<String> = data.punt_fit.texts("ID_PUNT").into_iter().collect();

        let found = data
            .punt_fit
            .features
            .iter()
            .filter(|f| f.flag("TROBADA"))
            .filter_map(|f| {
                let point_id = f.text("ID_PUNT")?;
                if official && !ppf.contains(&point_id) {
                    return None;
                }
                let fita = f.text("ID_FITA").unwrap_or_default();
                let label = if f.flag("AUX") {
                    format!("{}-aux", fita)
                } else {
                    fita
                };
                Some(FoundPoint { label, point_id })
            })
            .collect();

        let point_coords = data
            .points
            .features
            .iter()
            .filter_map(|f| {
                let id = f.text("ID_PUNT")?;
                match f.geometry {
                    Some(Geometry::Point { x, y, .. }) => {
                        Some((id, coord_key(geo::Coord { x, y }, official)))
                    }
                    _ => None,
                }
            })
            .collect();

        let mut line_coords = HashSet::new();
        for tram in &data.trams.features {
            match &tram.geometry {
                Some(geometry) if !geometry.is_empty() => {
                    line_coords.extend(geometry.coords().into_iter().map(|c| coord_key(c, official)));
                }
                _ => log.error("   There is a tram without coordinates. Please remove it"),
            }
        }

        Self {
            data,
            ppf,
            fites,
            found,
            point_coords,
            line_coords,
        }
    }

    pub fn is_official(&self) -> bool {
        self.data.line_type.is_official()
    }

    /// Official lines only look at PPF points; re-staking lines at all of them.
    pub fn in_scope(&self, point_id: &str) -> bool {
        !self.is_official() || self.ppf.contains(point_id)
    }

    pub fn is_found(&self, point_id: &str) -> bool {
        self.found.iter().any(|p| p.point_id == point_id)
    }

    pub fn tram_label(&self) -> &'static str {
        self.data.line_type.tram_label()
    }
}

pub(crate) fn tram_id(feature: &Feature) -> String {
    feature.text("ID").unwrap_or_else(|| "?".to_string())
}

/// Run every check in order.
pub fn run_checks(ctx: &QaContext, log: &mut ReportLog) -> CheckOutcome {
    attributes::check_line_id_exists(ctx, log);

    log.info("Validating the field structure and content of the tram layer...");
    if !attributes::check_tram_fields(ctx, log) {
        return CheckOutcome::Stopped(format!(
            "The field structure of the {} layer is not correct and the process cannot continue, \
             a field is missing from the layer. Please review it.",
            ctx.tram_label()
        ));
    }
    if ctx.is_official() {
        attributes::check_tram_content(ctx, log);
    }

    geometry::check_layers_geometry(ctx, log);
    attributes::check_tram_points(ctx, log);
    geometry::info_vertices(ctx, log);

    if !ctx.found.is_empty() {
        points::check_found_points(ctx, log);
    }
    points::check_three_terms(ctx, log);

    if ctx.is_official() {
        points::check_decimals(ctx, log);
        proposta::info_p_proposta(ctx, log);
    }
    proposta::check_tables_relation(ctx, log);
    topology::check_topology(ctx, log);

    CheckOutcome::Completed
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn tram(id: i64, id_linia: i64, fita1: &str, fita2: &str, coords: Vec<(f64, f64)>) -> Feature {
        Feature::new(Some(Geometry::line(coords)))
            .with("ID", id)
            .with("ID_TRAM", id)
            .with("ID_LINIA", id_linia)
            .with("ID_FITA1", fita1)
            .with("ID_FITA2", fita2)
    }

    pub fn punt(id: &str, etiqueta: &str, x: f64, y: f64, z: f64) -> Feature {
        Feature::new(Some(Geometry::point_z(x, y, z)))
            .with("ID_PUNT", id)
            .with("ETIQUETA", etiqueta)
    }

    pub fn punt_fit(id: &str, fita: &str, found: bool, aux: bool) -> Feature {
        Feature::new(None)
            .with("ID_PUNT", id)
            .with("ID_FITA", fita)
            .with("TROBADA", if found { "1" } else { "0" })
            .with("AUX", if aux { "1" } else { "0" })
    }

    pub fn proposta(id: &str, pff: i64, esfita: i64, ordpf: Option<i64>) -> Feature {
        let feature = Feature::new(None)
            .with("ID_PUNT", id)
            .with("PFF", pff)
            .with("ESFITA", esfita);
        match ordpf {
            Some(order) => feature.with("ORDPF", order),
            None => feature.with("ORDPF", serde_json::Value::Null),
        }
    }

    fn fields(line_type: LineType) -> Vec<String> {
        line_type
            .required_tram_fields()
            .iter()
            .map(|f| f.to_string())
            .collect()
    }

    /// A clean MTT line: two trams between three PPF fites, all found.
    pub fn mtt_line() -> LineData {
        let trams = Layer::new("Lin_TramPpta", fields(LineType::Mtt)).with_features(vec![
            tram(1, 7, "0007-1", "0007-2", vec![(0.0, 0.0), (50.0, 0.0), (100.0, 0.0)]),
            tram(2, 7, "0007-2", "0007-3", vec![(100.0, 0.0), (100.0, 100.0)]),
        ]);
        let points = Layer::new("Punt", vec![]).with_features(vec![
            punt("0007-1", "F-1", 0.0, 0.0, 120.0).with("CONTACTE", "3T").with("FOTOS", "f1.jpg"),
            punt("0007-2", "F-2", 100.0, 0.0, 130.0).with("FOTOS", "f2.jpg"),
            punt("0007-3", "F-3", 100.0, 100.0, 140.0).with("CONTACTE", "3T").with("FOTOS", "f3.jpg"),
        ]);
        let punt_fit = Layer::new("PUNT_FIT", vec![]).with_features(vec![
            punt_fit("0007-1", "1", true, false),
            punt_fit("0007-2", "2", true, false),
            punt_fit("0007-3", "3", true, false),
        ]);
        let p_proposta = Layer::new("P_Proposta", vec![]).with_features(vec![
            proposta("0007-1", 1, 1, Some(1)),
            proposta("0007-2", 1, 1, Some(2)),
            proposta("0007-3", 1, 1, Some(3)),
        ]);

        LineData {
            line_id: 7,
            line_type: LineType::Mtt,
            trams,
            points,
            punt_fit,
            p_proposta: Some(p_proposta),
            db_trams: Layer::new("tram_linia_mem", vec!["id_linia".to_string()]),
            db_points: Layer::new("fita_mem", vec!["id_linia".to_string()]),
            photo_dir: PathBuf::from("/nonexistent"),
        }
    }

    pub fn context(data: LineData) -> QaContext {
        QaContext::build(data, &mut ReportLog::in_memory())
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::domain::model::ReportLevel;

    #[test]
    fn test_context_lists() {
        let mut data = mtt_line();
        data.punt_fit.push(punt_fit("0007-9", "9", true, true));
        let ctx = context(data);

        assert_eq!(ctx.ppf.len(), 3);
        assert_eq!(ctx.fites.len(), 4);
        // 0007-9 is found but not PPF, so an official line ignores it
        assert_eq!(ctx.found.len(), 3);
        assert!(ctx.line_coords.contains(&(1000, 0)));
        assert_eq!(ctx.point_coords[1], ("0007-2".to_string(), (1000, 0)));
    }

    #[test]
    fn test_restaking_found_points_use_aux_label() {
        let mut data = mtt_line();
        data.line_type = LineType::Rep;
        data.punt_fit.push(punt_fit("0007-9", "9", true, true));
        let ctx = context(data);

        assert!(ctx.ppf.is_empty());
        assert_eq!(ctx.found.len(), 4);
        assert_eq!(ctx.found[3].label, "9-aux");
        assert!(ctx.in_scope("0007-9"));
    }

    #[test]
    fn test_tram_without_coordinates_is_reported() {
        let mut data = mtt_line();
        data.trams.push(Feature::new(None).with("ID", 3));
        let mut log = ReportLog::in_memory();
        QaContext::build(data, &mut log);
        assert_eq!(log.count(ReportLevel::Error), 1);
    }

    #[test]
    fn test_clean_line_has_no_errors() {
        let ctx = context(mtt_line());
        let mut log = ReportLog::in_memory();
        assert_eq!(run_checks(&ctx, &mut log), CheckOutcome::Completed);

        let errors: Vec<_> = log
            .entries()
            .iter()
            .filter(|(level, _)| *level >= ReportLevel::Error)
            .map(|(_, message)| message.clone())
            .collect();
        // the photo folder of the fixture does not exist
        assert!(errors.iter().all(|m| m.contains("is not in the Fotografies folder")), "{:?}", errors);
    }

    #[test]
    fn test_missing_tram_field_stops_the_run() {
        let mut data = mtt_line();
        data.trams.fields.retain(|f| f != "ID_FITA2");
        let ctx = context(data);
        let mut log = ReportLog::in_memory();

        match run_checks(&ctx, &mut log) {
            CheckOutcome::Stopped(message) => assert!(message.contains("Lin Tram Proposta")),
            CheckOutcome::Completed => panic!("run should stop"),
        }
        assert_eq!(log.count(ReportLevel::Critical), 1);
    }
}
