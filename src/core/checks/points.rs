use super::QaContext;
use crate::core::report::ReportLog;
use crate::domain::model::{short_id, Feature, Geometry};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Largest distance, in metres, between a PPF coordinate and its decimetre rounding.
const DECIMETRE_TOLERANCE: f64 = 0.01;

fn point_id(point: &Feature) -> String {
    point.text("ID_PUNT").unwrap_or_default()
}

fn etiqueta(point: &Feature) -> String {
    point.text("ETIQUETA").unwrap_or_default()
}

pub fn check_found_points(ctx: &QaContext, log: &mut ReportLog) {
    log.info("Validating the content of the fites layer...");
    check_photo_indicated(ctx, log);
    check_photo_files(ctx, log);
    check_z_coordinate(ctx, log);
}

/// Points whose photo is worth looking at: PPF on official lines, all otherwise.
fn points_with_photo<'a>(ctx: &'a QaContext) -> impl Iterator<Item = &'a Feature> + 'a {
    ctx.data
        .points
        .features
        .iter()
        .filter(|p| p.is_set("FOTOS"))
        .filter(move |p| ctx.in_scope(&point_id(p)))
}

fn check_photo_indicated(ctx: &QaContext, log: &mut ReportLog) {
    let with_photo: BTreeSet<String> = points_with_photo(ctx).map(point_id).collect();

    let mut valid = true;
    for found in ctx.found.iter().filter(|f| !with_photo.contains(&f.point_id)) {
        valid = false;
        log.error(format!(
            "   The fita {} with ID PUNT {} is found but has no photo set",
            short_id(&found.label),
            short_id(&found.point_id)
        ));
    }

    if valid {
        log.info("   Every found fita has a photo");
    }
}

fn photo_folder_files(folder: &Path) -> BTreeSet<String> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Could not list the photo folder {}: {}", folder.display(), e);
            return BTreeSet::new();
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".jpg") || name.ends_with(".JPG"))
        .collect()
}

fn check_photo_files(ctx: &QaContext, log: &mut ReportLog) {
    let folder_photos = photo_folder_files(&ctx.data.photo_dir);

    let mut valid = true;
    for photo in points_with_photo(ctx).filter_map(|p| p.text("FOTOS")) {
        if !folder_photos.contains(&photo) {
            valid = false;
            log.error(format!(
                "   The photo {} is not in the Fotografies folder",
                photo
            ));
        }
    }

    if valid {
        log.info("   Every photo set in the Punt layer is in the Fotografies folder");
    }
}

/// A found fita needs a height; a fita with height must be found.
fn check_z_coordinate(ctx: &QaContext, log: &mut ReportLog) {
    let mut valid = true;

    for point in &ctx.data.points.features {
        let id = point_id(point);
        if !ctx.in_scope(&id) {
            continue;
        }
        let z = match point.geometry {
            Some(Geometry::Point { z, .. }) => z.filter(|z| *z > 0.0),
            _ => None,
        };
        let label = etiqueta(point);

        match (ctx.is_found(&id), z) {
            (true, None) => {
                valid = false;
                log.error(format!(
                    "   The F {} with ID PUNT {} is found but has no Z coordinate",
                    short_id(&label),
                    short_id(&id)
                ));
            }
            (false, Some(_)) => {
                valid = false;
                log.error(format!(
                    "   The F {} with ID PUNT {} has a Z coordinate but is not a found fita",
                    short_id(&label),
                    short_id(&id)
                ));
            }
            _ => {}
        }
    }

    if valid {
        log.info("   Every fita with a Z coordinate is found");
    }
}

/// The first and last fites of the line, by label number, touch a third municipality.
pub fn check_three_terms(ctx: &QaContext, log: &mut ReportLog) {
    log.info("   Validating the contact of the three-term fites...");

    let number = match Regex::new(r"\d+") {
        Ok(re) => re,
        Err(e) => {
            tracing::error!("Invalid label pattern: {}", e);
            return;
        }
    };
    let label_number = |point: &Feature| -> Option<u64> {
        number
            .find(&etiqueta(point))
            .and_then(|m| m.as_str().parse().ok())
    };

    let mut sorted: Vec<&Feature> = ctx
        .data
        .points
        .features
        .iter()
        .filter(|p| ctx.in_scope(&point_id(p)))
        .collect();
    sorted.sort_by_key(|p| {
        let n = label_number(p);
        (n.is_none(), n)
    });

    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        if ctx.is_official() {
            log.error("   There are no points set as Proposal.");
        } else {
            log.error("   There are no points in the Punt layer.");
        }
        return;
    };

    if first.is_set("CONTACTE") && last.is_set("CONTACTE") {
        log.info("      The three-term fites have the CONTACTE field set");
    } else {
        log.error("      There are three-term fites without the CONTACTE field set");
    }

    let with_contact = ctx
        .data
        .points
        .features
        .iter()
        .filter(|p| p.is_set("CONTACTE"))
        .count();
    log.info(format!(
        "      There are {} fites with the CONTACTE field set",
        with_contact
    ));
}

fn off_decimetre(value: f64) -> bool {
    (value - (value * 10.0).round() / 10.0).abs() > DECIMETRE_TOLERANCE
}

/// Official lines: PPF coordinates are rounded to one decimal.
pub fn check_decimals(ctx: &QaContext, log: &mut ReportLog) {
    let mut valid = true;

    for point in &ctx.data.points.features {
        let id = point_id(point);
        if !ctx.ppf.contains(&id) {
            continue;
        }
        if let Some(Geometry::Point { x, y, .. }) = point.geometry {
            if off_decimetre(x) || off_decimetre(y) {
                valid = false;
                log.error(format!(
                    "   The fita {} with ID_PUNT {} is not rounded to decimetres",
                    short_id(&etiqueta(point)),
                    short_id(&id)
                ));
            }
        }
    }

    if valid {
        log.info("   The fites are correctly rounded to decimetres");
    }
}
