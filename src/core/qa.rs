use crate::config::QaConfig;
use crate::core::checks::{run_checks, CheckOutcome, LineData, QaContext};
use crate::core::report::ReportLog;
use crate::core::workspace::{LineDirs, Workspace};
use crate::domain::model::{line_id_text, Layer, LineType, QaResponse, ReportEntry};
use crate::domain::ports::{LayerSource, LayerStore};
use crate::utils::error::{QaError, Result};
use std::path::{Path, PathBuf};

/// Runs the quality check of one delivered line.
///
/// The line folder is copied out of the upload area, its layers are loaded
/// into the working store next to the reference layers, and every check
/// writes into a report log kept with the line. The response carries the
/// parsed report whether the run completes or stops early.
pub struct QaEngine<'a, S: LayerSource, T: LayerStore> {
    config: &'a QaConfig,
    source: S,
    store: T,
}

impl<'a, S: LayerSource, T: LayerStore> QaEngine<'a, S, T> {
    pub fn new(config: &'a QaConfig, source: S, store: T) -> Self {
        Self {
            config,
            source,
            store,
        }
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    pub fn run(&self, line_id: u32, line_type: LineType) -> QaResponse {
        tracing::info!("Starting quality check of line {} ({})", line_id, line_type);
        let workspace = Workspace::new(self.config);

        let line_folder = match workspace.stage_line(line_id) {
            Ok(Some(folder)) => folder,
            Ok(None) => {
                return QaResponse::error(
                    format!(
                        "Line folder {} does not exist in the upload directory",
                        line_id
                    ),
                    Vec::new(),
                )
            }
            Err(e) => {
                tracing::error!("Could not stage line {}: {}", line_id, e);
                return QaResponse::error(
                    format!("Could not copy line folder {} => {}", line_id, e),
                    Vec::new(),
                );
            }
        };

        let response = self.check_staged(&workspace, &line_folder, line_id, line_type);

        if let Err(e) = workspace.remove_working_copy(&line_folder) {
            tracing::warn!(
                "Could not remove the working copy {}: {}",
                line_folder.display(),
                e
            );
        }
        tracing::info!("Quality check of line {} finished: {}", line_id, response.result);
        response
    }

    /// `<lines>/<id>/<QA dir>/QA_log-<nnnn>-<YYYYmmdd-HHMM>.txt`
    pub fn log_path(&self, line_id: u32, line_type: LineType) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M");
        self.config
            .qa_log_dir(line_id, line_type)
            .join(format!("QA_log-{}-{}.txt", line_id_text(line_id), stamp))
    }

    fn check_staged(
        &self,
        workspace: &Workspace<'_>,
        line_folder: &Path,
        line_id: u32,
        line_type: LineType,
    ) -> QaResponse {
        let log_path = self.log_path(line_id, line_type);
        let mut log = match ReportLog::create(&log_path) {
            Ok(log) => log,
            Err(e) => {
                return QaResponse::error(
                    format!("Could not create the QA log {} => {}", log_path.display(), e),
                    Vec::new(),
                )
            }
        };
        log.header(&header_lines(line_id, line_type));
        log.info("Validating and preparing the working environment...");

        let data = match self.prepare(workspace, line_folder, line_id, line_type, &mut log) {
            Ok(data) => data,
            Err(message) => return respond_error(log, message),
        };

        let ctx = QaContext::build(data, &mut log);
        match run_checks(&ctx, &mut log) {
            CheckOutcome::Completed => {
                QaResponse::ok(format!("Line {} validated", line_id), finish_log(log))
            }
            CheckOutcome::Stopped(message) => respond_error(log, message),
        }
    }

    /// Working environment steps; an `Err` carries the response message.
    fn prepare(
        &self,
        workspace: &Workspace<'_>,
        line_folder: &Path,
        line_id: u32,
        line_type: LineType,
        log: &mut ReportLog,
    ) -> std::result::Result<LineData, String> {
        let dirs = workspace.check_directories(line_folder, log).ok_or_else(|| {
            "The directory structure of the line folder is not valid. Please check that the \
             DocDelim folder and all its sub-directories exist."
                .to_string()
        })?;

        self.store
            .drop_layers(&self.config.entities.temp_layers)
            .map_err(|e| format!("Error removing temporary layers => {}", e))?;
        log.info("   Temporary layers removed");

        if !workspace.check_entities(&dirs, line_type, log) {
            return Err(
                "Layers or tables needed by the quality check are missing. Please check that \
                 every layer and table is in the 'Cartografia' and 'Taules' folders."
                    .to_string(),
            );
        }

        if !self.copy_layers(&dirs, line_id, line_type, log) {
            return Err("Could not copy layers or tables. See the log for more information.".to_string());
        }

        self.load_line(line_id, line_type, &dirs).map_err(|e| {
            log.critical(format!("   {}", e));
            format!("Could not load the layers of the line => {}", e)
        })
    }

    fn copy_layers(&self, dirs: &LineDirs, line_id: u32, line_type: LineType, log: &mut ReportLog) -> bool {
        let entities = &self.config.entities;

        for shape in entities.shapes_for(line_type) {
            let path = dirs.carto_dir.join(shape);
            let copied = self
                .source
                .read_shapes(&path)
                .and_then(|layer| self.store.write_layer(&named(layer, &path)));
            if let Err(e) = copied {
                log.critical(format!("   Could not copy the layer {} => {}", stem(&path), e));
                return false;
            }
        }

        for table in &entities.tables {
            let path = dirs.tables_dir.join(table);
            let copied = self.source.read_table(&path).and_then(|layer| {
                let layer = named(layer, &path);
                // a re-staking delivery may ship an empty P_Proposta
                if !line_type.is_official() && layer.name == "P_Proposta" && layer.is_empty() {
                    return Ok(());
                }
                self.store.write_layer(&layer)
            });
            if let Err(e) = copied {
                log.error(format!("   Could not copy the table {} => {}", stem(&path), e));
                return false;
            }
        }

        log.info(format!(
            "   Layers and tables of line {} copied to the working store",
            line_id
        ));
        true
    }

    fn required(&self, name: &str) -> Result<Layer> {
        self.store
            .read_layer(name)?
            .ok_or_else(|| QaError::layer(name, "not found in the working store"))
    }

    fn load_line(&self, line_id: u32, line_type: LineType, dirs: &LineDirs) -> Result<LineData> {
        let p_proposta = if line_type.is_official() {
            Some(self.required("P_Proposta")?)
        } else {
            self.store.read_layer("P_Proposta")?
        };

        Ok(LineData {
            line_id,
            line_type,
            trams: self.required(line_type.tram_layer())?,
            points: self.required("Punt")?,
            punt_fit: self.required("PUNT_FIT")?,
            p_proposta,
            db_trams: self.required(&line_type.reference_tram_layer())?,
            db_points: self.required(&line_type.reference_point_layer())?,
            photo_dir: dirs.photo_dir.clone(),
        })
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Store layers under the file stem whatever the source called them.
fn named(mut layer: Layer, path: &Path) -> Layer {
    layer.name = stem(path);
    layer
}

fn header_lines(line_id: u32, line_type: LineType) -> Vec<String> {
    vec![
        "\tProcess: Line quality check".to_string(),
        format!("\tDate: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")),
        format!("\tLine ID: {}", line_id),
        format!("\tLine type: {}", line_type.description()),
        String::new(),
    ]
}

fn finish_log(log: ReportLog) -> Vec<ReportEntry> {
    let recorded = log.reports();
    log.finish().unwrap_or_else(|e| {
        tracing::warn!("Could not read the report log back: {}", e);
        recorded
    })
}

fn respond_error(mut log: ReportLog, message: String) -> QaResponse {
    log.error(message.as_str());
    QaResponse::error(message, finish_log(log))
}
