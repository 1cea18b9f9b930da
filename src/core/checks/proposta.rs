use super::QaContext;
use crate::core::report::ReportLog;
use crate::domain::model::{short_id, Feature, Layer};
use std::collections::HashSet;

/// Official lines: summary and sanity of the `P_Proposta` table.
pub fn info_p_proposta(ctx: &QaContext, log: &mut ReportLog) {
    log.info("Getting information about the proposal fites...");
    let Some(p_proposta) = &ctx.data.p_proposta else {
        log.error("   The P_Proposta table is not available");
        return;
    };

    count_points(p_proposta, log);
    let ordpf_valid = check_ordpf(p_proposta, log);
    let real_valid = check_real_points(p_proposta, log);
    if ordpf_valid && real_valid {
        log.info("   Every record of the P_Proposta table is valid");
    }
}

fn count_points(p_proposta: &Layer, log: &mut ReportLog) {
    let count = |pff: i64, esfita: Option<i64>| {
        p_proposta
            .features
            .iter()
            .filter(|f| f.int("PFF") == Some(pff))
            .filter(|f| esfita.map_or(true, |e| f.int("ESFITA") == Some(e)))
            .count()
    };

    log.info(format!("   Real PPF fites: {}", count(1, Some(1))));
    log.info(format!("   Auxiliary PPF fites: {}", count(1, Some(0))));
    log.info(format!("   Not final fites: {}", count(0, None)));
}

fn record_id(record: &Feature) -> String {
    record.text("ID_PUNT").unwrap_or_default()
}

fn check_ordpf(p_proposta: &Layer, log: &mut ReportLog) -> bool {
    let mut valid = true;
    for record in p_proposta.features.iter().filter(|f| f.get("ORDPF").is_none()) {
        valid = false;
        log.error(format!(
            "   The ORDPF field of point {} in the P_PROPOSTA table is null",
            short_id(&record_id(record))
        ));
    }
    valid
}

/// `PFF = 1` and `ORDPF = 0` mark an auxiliary fita, so `ESFITA` must be 0.
fn check_real_points(p_proposta: &Layer, log: &mut ReportLog) -> bool {
    let mut valid = true;
    let misflagged = p_proposta.features.iter().filter(|f| {
        f.int("PFF") == Some(1) && f.int("ORDPF") == Some(0) && f.int("ESFITA") != Some(0)
    });

    for record in misflagged {
        valid = false;
        log.error(format!(
            "   The point with ID PUNT : {} is wrongly set in P_Proposta: it looks like an auxiliary fita set as a real fita.",
            short_id(&record_id(record))
        ));
    }
    valid
}

/// Every point referenced by the tables must exist in the Punt layer.
pub fn check_tables_relation(ctx: &QaContext, log: &mut ReportLog) {
    log.info("Validating the correspondence between the tables and the Punt layer...");
    let point_ids: HashSet<String> = ctx.data.points.texts("ID_PUNT").into_iter().collect();

    let check_table = |table: &Layer, label: &str, log: &mut ReportLog| {
        let mut valid = true;
        for record in &table.features {
            let id = record_id(record);
            if !point_ids.contains(&id) {
                valid = false;
                log.error(format!(
                    "   The record with ID PUNT {} of the {} table is not in the Punt layer",
                    short_id(&id),
                    label
                ));
            }
        }
        if valid {
            log.info(format!("   Correspondence OK between the points of {} and Punt", label));
        }
    };

    if ctx.is_official() {
        if let Some(p_proposta) = &ctx.data.p_proposta {
            check_table(p_proposta, "P_PROPOSTA", log);
        }
    }
    check_table(&ctx.data.punt_fit, "PUNT_FIT", log);
}
