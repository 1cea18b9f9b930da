use super::{tram_id, QaContext};
use crate::core::predicates::{coord_key, crosses, is_simple, overlaps};
use crate::core::report::ReportLog;
use crate::domain::model::{short_id, Feature};
use geo::MultiLineString;
use std::collections::HashSet;

pub fn check_topology(ctx: &QaContext, log: &mut ReportLog) {
    log.info("Starting topology checks...");
    let trams: Vec<(&Feature, &MultiLineString<f64>)> = ctx
        .data
        .trams
        .features
        .iter()
        .filter_map(|t| Some((t, t.geometry.as_ref()?.as_lines()?)))
        .collect();
    let db_trams: Vec<&MultiLineString<f64>> = ctx
        .data
        .db_trams
        .features
        .iter()
        .filter_map(|t| t.geometry.as_ref()?.as_lines())
        .collect();

    check_line_crosses_itself(&trams, log);
    check_line_crosses_db(&trams, &db_trams, log);
    check_line_overlaps_db(&trams, &db_trams, log);
    check_endpoints_on_points(ctx, &trams, log);
    if ctx.is_official() {
        check_auxiliary_points(ctx, log);
    }
}

fn check_line_crosses_itself(trams: &[(&Feature, &MultiLineString<f64>)], log: &mut ReportLog) {
    let mut valid = true;

    for (tram, lines) in trams {
        if !lines.iter().all(is_simple) {
            valid = false;
            log.error(format!(
                "   The tram {} of the line intersects or touches itself",
                tram_id(tram)
            ));
        }
    }

    for (i, (tram, lines)) in trams.iter().enumerate() {
        for (other, other_lines) in &trams[i + 1..] {
            if crosses(lines, other_lines) {
                valid = false;
                log.error(format!(
                    "   The tram {} of the line crosses the tram {} of the same line",
                    tram_id(tram),
                    tram_id(other)
                ));
            }
        }
    }

    if valid {
        log.info("   The trams of the line do not intersect or touch themselves");
    }
}

fn check_line_crosses_db(
    trams: &[(&Feature, &MultiLineString<f64>)],
    db_trams: &[&MultiLineString<f64>],
    log: &mut ReportLog,
) {
    let mut valid = true;
    for (tram, lines) in trams {
        if db_trams.iter().any(|db| crosses(lines, db)) {
            valid = false;
            log.error(format!(
                "   The tram {} of the line crosses some tram of the database",
                tram_id(tram)
            ));
        }
    }
    if valid {
        log.info("   The trams of the line do not cross any tram of the database");
    }
}

fn check_line_overlaps_db(
    trams: &[(&Feature, &MultiLineString<f64>)],
    db_trams: &[&MultiLineString<f64>],
    log: &mut ReportLog,
) {
    let mut valid = true;
    for (tram, lines) in trams {
        if db_trams.iter().any(|db| overlaps(lines, db)) {
            valid = false;
            log.error(format!(
                "   The tram {} of the line overlaps some tram of the database",
                tram_id(tram)
            ));
        }
    }
    if valid {
        log.info("   The trams of the line do not overlap any tram of the database");
    }
}

/// Both ends of every tram sit on a fita of the Punt layer.
fn check_endpoints_on_points(
    ctx: &QaContext,
    trams: &[(&Feature, &MultiLineString<f64>)],
    log: &mut ReportLog,
) {
    let official = ctx.is_official();
    let point_keys: HashSet<_> = ctx.point_coords.iter().map(|(_, key)| *key).collect();

    let mut valid = true;
    for (tram, _) in trams {
        let ends = tram
            .geometry
            .as_ref()
            .map(|g| [g.first_coord(), g.last_coord()])
            .unwrap_or_default();
        let covered = ends
            .iter()
            .all(|end| end.is_some_and(|c| point_keys.contains(&coord_key(c, official))));

        if !covered {
            valid = false;
            let id = tram.text("ID_TRAM").unwrap_or_else(|| tram_id(tram));
            log.error(format!(
                "   Some endpoint of tram {} does not match a fita of the Punt layer",
                id
            ));
        }
    }

    if valid {
        log.info("   Every endpoint of the line's trams matches a fita of the Punt layer");
    }
}

/// Official lines: a PPF fita off the line must be auxiliary.
fn check_auxiliary_points(ctx: &QaContext, log: &mut ReportLog) {
    for (point_id, key) in &ctx.point_coords {
        if ctx.line_coords.contains(key) || !ctx.ppf.contains(point_id) {
            continue;
        }
        let Some(record) = ctx
            .data
            .punt_fit
            .features
            .iter()
            .find(|f| f.text("ID_PUNT").as_deref() == Some(point_id.as_str()))
        else {
            continue;
        };

        let fita = record.text("ID_FITA").unwrap_or_default();
        if record.flag("AUX") {
            log.info(format!(
                "   The fita F {} with ID PUNT {} is not on the line but is auxiliary",
                fita,
                short_id(point_id)
            ));
        } else {
            log.error(format!(
                "   The fita F {} with ID PUNT {} is not on the line and is NOT auxiliary",
                fita,
                short_id(point_id)
            ));
        }
    }
}
