//! Municipal extract packages.
//!
//! For every line listed in the input CSV, the features of one survey session
//! are selected from the reference layers and packed into a zip file that can
//! be sent to the municipalities on both sides of the line.

use crate::config::QaConfig;
use crate::core::report::ReportLog;
use crate::domain::model::{line_id_text, Layer};
use crate::domain::ports::LayerStore;
use crate::utils::error::{QaError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::{FileOptions, ZipWriter};

pub const FITA_TEMP_LAYER: &str = "Fita_mem_municat_temp";
pub const TRAM_TEMP_LAYER: &str = "Line_tram_mem_municat_temp";

const SESSION_FIELD: &str = "id_sessio_";

/// One row of the input CSV: `line_id, session_id, mtt_date, mtt_num`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractRequest {
    pub line_id: u32,
    pub session_id: String,
    pub mtt_date: String,
    pub mtt_num: String,
}

impl ExtractRequest {
    pub fn package_name(&self) -> String {
        format!(
            "MTT_{}_{}_{}.zip",
            line_id_text(self.line_id),
            self.mtt_date,
            self.mtt_num
        )
    }
}

#[derive(Debug, Serialize)]
struct PackageMetadata<'a> {
    line_id: u32,
    session_id: &'a str,
    mtt_date: &'a str,
    mtt_num: &'a str,
    fites: usize,
    trams: usize,
    generated_at: String,
}

pub fn read_requests(path: &Path) -> Result<Vec<ExtractRequest>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut requests = Vec::new();
    for row in reader.deserialize() {
        requests.push(row?);
    }
    Ok(requests)
}

pub struct MunicatGenerator<'a, T: LayerStore> {
    config: &'a QaConfig,
    store: T,
}

impl<'a, T: LayerStore> MunicatGenerator<'a, T> {
    pub fn new(config: &'a QaConfig, store: T) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    fn log_path(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M");
        self.config
            .paths
            .log_dir
            .join(format!("Municat_{}.txt", stamp))
    }

    /// Build one package per input row, stopping at the first failing row.
    pub fn run(&self) -> Result<Vec<PathBuf>> {
        let mut log = ReportLog::create(self.log_path())?;
        log.info(format!(
            "Municipal extract process - {}",
            chrono::Local::now().format("%Y%m%d-%H%M")
        ));

        let outcome = self.extract_all(&mut log);
        if let Err(e) = &outcome {
            log.error(e.to_string());
        }
        log.finish()?;
        outcome
    }

    fn extract_all(&self, log: &mut ReportLog) -> Result<Vec<PathBuf>> {
        let input = &self.config.municat.input_csv;
        if !input.is_file() {
            return Err(QaError::processing(format!(
                "The input file {} does not exist",
                input.display()
            )));
        }
        let requests = read_requests(input)?;
        tracing::info!("{} lines to extract from {}", requests.len(), input.display());

        let trams = self.reference("tram_linia_mem")?;
        let fites = self.reference("fita_mem")?;

        let mut packages = Vec::with_capacity(requests.len());
        for request in &requests {
            self.store
                .drop_layers(&self.config.municat.temp_layers)
                .map_err(|e| QaError::processing(format!("Error removing temporary layers => {}", e)))?;
            log.info("Temporary layers removed");

            let package = self.extract(request, &fites, &trams)?;
            log.info(format!(
                "Line {} exported to {}",
                request.line_id,
                package.display()
            ));
            packages.push(package);
        }
        Ok(packages)
    }

    fn reference(&self, name: &str) -> Result<Layer> {
        self.store
            .read_layer(name)?
            .ok_or_else(|| QaError::layer(name, "not found in the working store"))
    }

    /// Select, store and package the features of one session.
    pub fn extract(&self, request: &ExtractRequest, fites: &Layer, trams: &Layer) -> Result<PathBuf> {
        if !has_session(fites, &request.session_id) || !has_session(trams, &request.session_id) {
            return Err(QaError::ValidationError {
                message: format!(
                    "The session ID {} does not exist in the database",
                    request.session_id
                ),
            });
        }

        let mut fita_temp = select_session(fites, request, FITA_TEMP_LAYER);
        fita_temp.features.retain(|f| {
            !f.text("id_u_fita")
                .is_some_and(|id| id.ends_with('1'))
        });
        let tram_temp = select_session(trams, request, TRAM_TEMP_LAYER);

        self.store.write_layer(&fita_temp)?;
        self.store.write_layer(&tram_temp)?;

        let output_dir = &self.config.municat.output_dir;
        fs::create_dir_all(output_dir)?;
        let path = output_dir.join(request.package_name());
        fs::write(&path, build_package(request, &fita_temp, &tram_temp)?)?;

        tracing::debug!(
            "Package {} holds {} fites and {} trams",
            path.display(),
            fita_temp.len(),
            tram_temp.len()
        );
        Ok(path)
    }
}

fn has_session(layer: &Layer, session_id: &str) -> bool {
    layer
        .features
        .iter()
        .any(|f| f.text(SESSION_FIELD).as_deref() == Some(session_id))
}

fn select_session(layer: &Layer, request: &ExtractRequest, name: &str) -> Layer {
    let line_id = i64::from(request.line_id);
    let features = layer
        .features
        .iter()
        .filter(|f| f.text(SESSION_FIELD).as_deref() == Some(request.session_id.as_str()))
        .filter(|f| f.int("id_linia") == Some(line_id))
        .cloned()
        .collect();
    Layer::new(name, layer.fields.clone()).with_features(features)
}

/// Attributes in field order plus a trailing WKT `geometry` column.
pub fn layer_to_csv(layer: &Layer) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = layer.fields.iter().map(String::as_str).collect();
    header.push("geometry");
    writer.write_record(&header)?;

    for feature in &layer.features {
        let mut row: Vec<String> = layer
            .fields
            .iter()
            .map(|field| feature.text(field).unwrap_or_default())
            .collect();
        row.push(
            feature
                .geometry
                .as_ref()
                .map(|g| g.to_wkt())
                .unwrap_or_default(),
        );
        writer.write_record(&row)?;
    }

    writer.into_inner().map_err(|e| e.into_error().into())
}

fn build_package(request: &ExtractRequest, fites: &Layer, trams: &Layer) -> Result<Vec<u8>> {
    let id = line_id_text(request.line_id);
    let metadata = PackageMetadata {
        line_id: request.line_id,
        session_id: &request.session_id,
        mtt_date: &request.mtt_date,
        mtt_num: &request.mtt_num,
        fites: fites.len(),
        trams: trams.len(),
        generated_at: chrono::Utc::now().to_rfc3339(),
    };

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    zip.start_file::<_, ()>(format!("Fita_mem_{}.csv", id), FileOptions::default())?;
    zip.write_all(&layer_to_csv(fites)?)?;

    zip.start_file::<_, ()>(format!("Line_tram_mem_{}.csv", id), FileOptions::default())?;
    zip.write_all(&layer_to_csv(trams)?)?;

    zip.start_file::<_, ()>("metadata.json", FileOptions::default())?;
    zip.write_all(serde_json::to_string_pretty(&metadata)?.as_bytes())?;

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}
