use super::{tram_id, QaContext};
use crate::core::report::ReportLog;
use crate::domain::model::{short_id, Feature};
use std::collections::BTreeSet;

/// Warn when the line id is already present in the reference layers.
pub fn check_line_id_exists(ctx: &QaContext, log: &mut ReportLog) {
    log.info("Checking whether the line already exists in the database...");
    let line_id = i64::from(ctx.data.line_id);
    let suffix = ctx.data.line_type.reference_suffix();

    let in_layer = |features: &[Feature]| {
        features.iter().any(|f| f.int("id_linia") == Some(line_id))
    };
    let in_trams = in_layer(&ctx.data.db_trams.features);
    let in_fites = in_layer(&ctx.data.db_points.features);

    match (in_fites, in_trams) {
        (true, true) => log.error(format!(
            "   The line ID is already in fita_{0} and tram_linia_{0}",
            suffix
        )),
        (true, false) => log.error(format!(
            "   The line ID is in fita_{0} but not in tram_linia_{0}",
            suffix
        )),
        (false, true) => log.error(format!(
            "   The line ID is not in fita_{0} but is in tram_linia_{0}",
            suffix
        )),
        (false, false) => log.info(format!(
            "   The line ID is not repeated in fita_{0} or tram_linia_{0}",
            suffix
        )),
    }
}

/// Every required field must be present; extra fields are accepted.
pub fn check_tram_fields(ctx: &QaContext, log: &mut ReportLog) -> bool {
    let trams = &ctx.data.trams;
    let missing: Vec<&str> = ctx
        .data
        .line_type
        .required_tram_fields()
        .iter()
        .copied()
        .filter(|field| !trams.has_field(field))
        .collect();

    if missing.is_empty() {
        log.info(format!(
            "   The field structure of {} is correct",
            ctx.tram_label()
        ));
        true
    } else {
        log.critical(format!(
            "   The field structure of {} is NOT correct, missing: {}",
            ctx.tram_label(),
            missing.join(", ")
        ));
        false
    }
}

/// Official lines: every tram belongs to this line and has usable fita ids.
pub fn check_tram_content(ctx: &QaContext, log: &mut ReportLog) {
    let line_id = i64::from(ctx.data.line_id);
    let trams = &ctx.data.trams.features;

    let foreign_line = trams.iter().any(|t| t.int("ID_LINIA") != Some(line_id));
    if foreign_line {
        log.error("   There are trams with the ID of another line");
    }

    let bad_fita = trams.iter().any(|t| {
        t.text("ID_FITA1").as_deref() == Some("1") || t.text("ID_FITA2").as_deref() == Some("1")
    });
    if bad_fita {
        log.error("   The ID FITA field of some tram of the line is not valid");
    }

    if !foreign_line && !bad_fita {
        log.info(format!(
            "   The fields of {} are correctly filled",
            ctx.tram_label()
        ));
    }
}

/// The fites named as tram endpoints must be known points.
pub fn check_tram_points(ctx: &QaContext, log: &mut ReportLog) {
    let trams = &ctx.data.trams.features;
    let mut endpoints = BTreeSet::new();
    let mut unset = Vec::new();

    for tram in trams {
        for field in ["ID_FITA1", "ID_FITA2"] {
            match tram.text(field) {
                Some(point_id) => {
                    endpoints.insert(point_id);
                }
                None => unset.push(tram_id(tram)),
            }
        }
    }

    if !unset.is_empty() {
        tracing::debug!("Trams with an unset endpoint fita: {:?}", unset);
        log.error(
            "   Warning: some trams have an endpoint fita missing. Check whether it is an error or a tram that reaches the sea",
        );
    }

    if ctx.is_official() {
        for point_id in endpoints.iter().filter(|p| !ctx.ppf.contains(*p)) {
            log.error(format!(
                "   The fita with ID PUNT: {} is set as the start or end fita of a tram but is not a Final Proposal Point",
                short_id(point_id)
            ));
        }
    }

    for point_id in endpoints.iter().filter(|p| !ctx.fites.contains(*p)) {
        log.error(format!(
            "   The fita with ID PUNT: {} is set as the start or end fita of a tram but is not a fita",
            short_id(point_id)
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::domain::model::ReportLevel;

    #[test]
    fn test_line_id_in_reference_layers() {
        let mut data = mtt_line();
        data.db_points.push(Feature::new(None).with("id_linia", 7));
        let ctx = context(data);
        let mut log = ReportLog::in_memory();
        check_line_id_exists(&ctx, &mut log);
        assert!(log.contains("is in fita_mem but not in tram_linia_mem"));

        let mut data = mtt_line();
        data.db_points.push(Feature::new(None).with("id_linia", 8));
        let ctx = context(data);
        let mut log = ReportLog::in_memory();
        check_line_id_exists(&ctx, &mut log);
        assert!(log.contains("is not repeated"));
        assert_eq!(log.count(ReportLevel::Error), 0);
    }

    #[test]
    fn test_extra_tram_fields_are_accepted() {
        let mut data = mtt_line();
        data.trams.fields.push("EXTRA".to_string());
        let ctx = context(data);
        let mut log = ReportLog::in_memory();
        assert!(check_tram_fields(&ctx, &mut log));
    }

    #[test]
    fn test_tram_content() {
        let mut data = mtt_line();
        data.trams.push(tram(3, 8, "1", "0007-3", vec![(0.0, 0.0), (0.0, 5.0)]));
        let ctx = context(data);
        let mut log = ReportLog::in_memory();
        check_tram_content(&ctx, &mut log);
        assert!(log.contains("ID of another line"));
        assert!(log.contains("ID FITA field"));
    }

    #[test]
    fn test_tram_points() {
        let mut data = mtt_line();
        data.trams.push(tram(3, 7, "0007-3", "0007-44", vec![(100.0, 100.0), (0.0, 100.0)]));
        data.trams.push(Feature::new(None).with("ID", 4).with("ID_FITA1", "0007-1"));
        let ctx = context(data);
        let mut log = ReportLog::in_memory();
        check_tram_points(&ctx, &mut log);

        assert!(log.contains("reaches the sea"));
        assert!(log.contains("ID PUNT: 44 is set as the start or end fita of a tram but is not a Final Proposal Point"));
        assert!(log.contains("ID PUNT: 44 is set as the start or end fita of a tram but is not a fita"));
        assert_eq!(log.count(ReportLevel::Error), 3);
    }
}
