use super::{tram_id, QaContext};
use crate::core::predicates::is_ring;
use crate::core::report::ReportLog;
use crate::domain::model::Geometry;

pub fn check_layers_geometry(ctx: &QaContext, log: &mut ReportLog) {
    log.info("Validating geometries...");
    log.info(format!("   {}:", ctx.tram_label()));
    check_tram_geometry(ctx, log);
    log.info("   Punt:");
    check_point_geometry(ctx, log);
}

fn check_tram_geometry(ctx: &QaContext, log: &mut ReportLog) {
    let mut valid = true;

    for tram in &ctx.data.trams.features {
        let id = tram_id(tram);
        let Some(geometry) = tram.geometry.as_ref().filter(|g| !g.is_empty()) else {
            valid = false;
            log.error(format!("      The tram {} is empty", id));
            continue;
        };

        if geometry.as_lines().is_some_and(|lines| lines.iter().any(is_ring)) {
            valid = false;
            log.error(format!("      The tram {} has an interior ring", id));
        }
        let parts = geometry.part_count();
        if parts > 1 {
            valid = false;
            log.error(format!(
                "      The tram {} is multi-part and has {} parts",
                id, parts
            ));
        }
    }

    if valid {
        log.info(format!(
            "      No geometry errors detected in {}",
            ctx.tram_label()
        ));
    }
}

fn check_point_geometry(ctx: &QaContext, log: &mut ReportLog) {
    let mut valid = true;

    for point in &ctx.data.points.features {
        let id = point.text("ID_PUNT").unwrap_or_else(|| "?".to_string());
        match &point.geometry {
            None => {
                valid = false;
                log.error(format!("      The point {} is empty", id));
            }
            Some(Geometry::Point { x, y, z }) if x.is_finite() && y.is_finite() && z.map_or(true, f64::is_finite) => {}
            Some(_) => {
                valid = false;
                log.error(format!("      The point {} does not have a valid geometry", id));
            }
        }
    }

    if valid {
        log.info("      No geometry errors detected in the Punt layer");
    }
}

/// Vertex count of every tram, ordered by tram id.
pub fn info_vertices(ctx: &QaContext, log: &mut ReportLog) {
    log.info("Getting the vertices of each tram of the line...");

    let mut trams: Vec<_> = ctx.data.trams.features.iter().collect();
    trams.sort_by_key(|t| (t.int("ID"), tram_id(t)));

    for tram in trams {
        let vertices = tram.geometry.as_ref().map_or(0, |g| g.coords().len());
        log.info(format!("   Tram ID: {}   Vertices: {}", tram_id(tram), vertices));
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::domain::model::{Feature, ReportLevel};

    #[test]
    fn test_tram_geometry_errors() {
        let mut data = mtt_line();
        data.trams.push(
            tram(3, 7, "0007-1", "0007-3", vec![(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (0.0, 0.0)]),
        );
        data.trams.push(
            Feature::new(Some(Geometry::multi_line(vec![
                vec![(0.0, 0.0), (1.0, 1.0)],
                vec![(2.0, 2.0), (3.0, 3.0)],
            ])))
            .with("ID", 4),
        );
        data.trams.push(Feature::new(None).with("ID", 5));
        let ctx = context(data);
        let mut log = ReportLog::in_memory();
        check_layers_geometry(&ctx, &mut log);

        assert!(log.contains("The tram 3 has an interior ring"));
        assert!(log.contains("The tram 4 is multi-part and has 2 parts"));
        assert!(log.contains("The tram 5 is empty"));
        assert!(log.contains("No geometry errors detected in the Punt layer"));
    }

    #[test]
    fn test_point_geometry_errors() {
        let mut data = mtt_line();
        data.points.push(Feature::new(None).with("ID_PUNT", "0007-8"));
        data.points.push(
            Feature::new(Some(Geometry::line(vec![(0.0, 0.0), (1.0, 0.0)]))).with("ID_PUNT", "0007-9"),
        );
        let ctx = context(data);
        let mut log = ReportLog::in_memory();
        check_layers_geometry(&ctx, &mut log);

        assert!(log.contains("The point 0007-8 is empty"));
        assert!(log.contains("The point 0007-9 does not have a valid geometry"));
        assert_eq!(log.count(ReportLevel::Error), 2);
    }

    #[test]
    fn test_info_vertices_sorted_by_tram_id() {
        let mut data = mtt_line();
        data.trams.features.reverse();
        data.trams.push(tram(10, 7, "0007-3", "0007-1", vec![(0.0, 0.0), (0.0, 1.0)]));
        let ctx = context(data);
        let mut log = ReportLog::in_memory();
        info_vertices(&ctx, &mut log);

        let lines: Vec<&str> = log.entries()[1..].iter().map(|(_, m)| m.as_str()).collect();
        assert_eq!(
            lines,
            vec![
                "   Tram ID: 1   Vertices: 3",
                "   Tram ID: 2   Vertices: 2",
                "   Tram ID: 10   Vertices: 2",
            ]
        );
    }
}
