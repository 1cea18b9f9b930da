use crate::config::QaConfig;
use crate::core::report::ReportLog;
use crate::domain::model::LineType;
use crate::utils::error::Result;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Resolved folders of a staged line.
#[derive(Debug, Clone)]
pub struct LineDirs {
    pub line_folder: PathBuf,
    pub doc_dir: PathBuf,
    pub carto_dir: PathBuf,
    pub tables_dir: PathBuf,
    pub photo_dir: PathBuf,
}

pub struct Workspace<'a> {
    config: &'a QaConfig,
}

impl<'a> Workspace<'a> {
    pub fn new(config: &'a QaConfig) -> Self {
        Self { config }
    }

    /// Copy `<upload>/<id>` to `<work>/<id>`, replacing a previous copy.
    /// Returns `None` when the line was never uploaded.
    pub fn stage_line(&self, line_id: u32) -> Result<Option<PathBuf>> {
        let upload_folder = self.config.paths.upload_dir.join(line_id.to_string());
        if !upload_folder.is_dir() {
            return Ok(None);
        }

        let local_folder = self.config.paths.work_dir.join(line_id.to_string());
        if local_folder.exists() {
            fs::remove_dir_all(&local_folder)?;
        }
        copy_dir_recursive(&upload_folder, &local_folder)?;

        tracing::debug!(
            "Staged {} into {}",
            upload_folder.display(),
            local_folder.display()
        );
        Ok(Some(local_folder))
    }

    /// Check the DocDelim tree of a staged line.
    pub fn check_directories(&self, line_folder: &Path, log: &mut ReportLog) -> Option<LineDirs> {
        let layout = &self.config.layout;
        let doc_dir = self.config.doc_dir(line_folder);
        if !doc_dir.is_dir() {
            log.critical(format!(
                "   {} does not exist in the line directory",
                layout.doc_dir
            ));
            return None;
        }

        let mut tree_valid = true;
        for sub_dir in layout.sub_dirs() {
            if !doc_dir.join(sub_dir).is_dir() {
                tree_valid = false;
                log.critical(format!("   The sub-directory {} does not exist", sub_dir));
            }
        }
        if !tree_valid {
            return None;
        }

        log.info("   Directory structure OK");
        Some(LineDirs {
            line_folder: line_folder.to_path_buf(),
            carto_dir: doc_dir.join(&layout.carto_dir),
            tables_dir: doc_dir.join(&layout.tables_dir),
            photo_dir: doc_dir.join(&layout.photo_dir),
            doc_dir,
        })
    }

    /// Every shape file and table needed for the line type must be present.
    pub fn check_entities(&self, dirs: &LineDirs, line_type: LineType, log: &mut ReportLog) -> bool {
        let entities = &self.config.entities;
        let missing_shapes: Vec<&str> = entities
            .shapes_for(line_type)
            .iter()
            .filter(|shape| !dirs.carto_dir.join(shape).is_file())
            .map(String::as_str)
            .collect();
        let missing_tables: Vec<&str> = entities
            .tables
            .iter()
            .filter(|table| !dirs.tables_dir.join(table).is_file())
            .map(String::as_str)
            .collect();

        let layout = &self.config.layout;
        match (missing_shapes.is_empty(), missing_tables.is_empty()) {
            (true, true) => true,
            (false, false) => {
                log.critical(format!(
                    "   Required layers and tables are missing from {} and {}: {}",
                    layout.carto_dir,
                    layout.tables_dir,
                    [missing_shapes, missing_tables].concat().join(", ")
                ));
                false
            }
            (false, true) => {
                log.critical(format!(
                    "   Required layers are missing from {}: {}",
                    layout.carto_dir,
                    missing_shapes.join(", ")
                ));
                false
            }
            (true, false) => {
                log.critical(format!(
                    "   Required tables are missing from {}: {}",
                    layout.tables_dir,
                    missing_tables.join(", ")
                ));
                false
            }
        }
    }

    pub fn remove_working_copy(&self, line_folder: &Path) -> Result<()> {
        if line_folder.exists() {
            fs::remove_dir_all(line_folder)?;
        }
        Ok(())
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> QaConfig {
        let mut config = QaConfig::default();
        config.paths.upload_dir = dir.path().join("upload");
        config.paths.work_dir = dir.path().join("work");
        config
    }

    fn make_tree(config: &QaConfig, line_id: u32) -> PathBuf {
        let doc = config.paths.upload_dir.join(line_id.to_string()).join("DocDelim");
        for sub in config.layout.sub_dirs() {
            fs::create_dir_all(doc.join(sub)).unwrap();
        }
        fs::write(doc.join("Cartografia").join("Punt.shp"), b"").unwrap();
        doc
    }

    #[test]
    fn test_stage_line_copies_and_replaces() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let workspace = Workspace::new(&config);

        assert!(workspace.stage_line(7).unwrap().is_none());

        make_tree(&config, 7);
        let stale = config.paths.work_dir.join("7").join("stale.txt");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, b"old").unwrap();

        let staged = workspace.stage_line(7).unwrap().unwrap();
        assert!(staged.join("DocDelim").join("Cartografia").join("Punt.shp").is_file());
        assert!(!stale.exists());

        workspace.remove_working_copy(&staged).unwrap();
        assert!(!staged.exists());
    }

    #[test]
    fn test_stage_line_copies_nested_files() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let doc = make_tree(&config, 4);
        let nested = doc.join("Fotografies").join("2019").join("F-1.jpg");
        fs::create_dir_all(nested.parent().unwrap()).unwrap();
        fs::write(&nested, b"jpeg").unwrap();
        fs::write(doc.join("Taules").join("PUNT_FIT.dbf"), b"dbf").unwrap();

        let staged = Workspace::new(&config).stage_line(4).unwrap().unwrap();

        let doc = staged.join("DocDelim");
        assert_eq!(fs::read(doc.join("Fotografies/2019/F-1.jpg")).unwrap(), b"jpeg");
        assert_eq!(fs::read(doc.join("Taules/PUNT_FIT.dbf")).unwrap(), b"dbf");
        assert!(doc.join("Cartografia").is_dir());
    }

    #[test]
    fn test_check_directories() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let workspace = Workspace::new(&config);
        let line_folder = config.paths.upload_dir.join("3");
        fs::create_dir_all(&line_folder).unwrap();

        let mut log = ReportLog::in_memory();
        assert!(workspace.check_directories(&line_folder, &mut log).is_none());
        assert!(log.contains("DocDelim does not exist"));

        fs::create_dir_all(line_folder.join("DocDelim").join("Cartografia")).unwrap();
        let mut log = ReportLog::in_memory();
        assert!(workspace.check_directories(&line_folder, &mut log).is_none());
        assert!(log.contains("Taules does not exist"));
        assert!(log.contains("Fotografies does not exist"));

        make_tree(&config, 3);
        let mut log = ReportLog::in_memory();
        let dirs = workspace.check_directories(&line_folder, &mut log).unwrap();
        assert!(dirs.photo_dir.ends_with("DocDelim/Fotografies"));
        assert!(log.contains("Directory structure OK"));
    }

    #[test]
    fn test_check_entities_reports_what_is_missing() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let workspace = Workspace::new(&config);
        make_tree(&config, 5);
        let mut log = ReportLog::in_memory();
        let dirs = workspace
            .check_directories(&config.paths.upload_dir.join("5"), &mut log)
            .unwrap();

        let mut log = ReportLog::in_memory();
        assert!(!workspace.check_entities(&dirs, LineType::Mtt, &mut log));
        assert!(log.contains("Required layers and tables are missing"));
        assert!(log.contains("Lin_TramPpta.shp"));

        for table in ["P_Proposta.dbf", "PUNT_FIT.dbf"] {
            fs::write(dirs.tables_dir.join(table), b"").unwrap();
        }
        let mut log = ReportLog::in_memory();
        assert!(!workspace.check_entities(&dirs, LineType::Rep, &mut log));
        assert!(log.contains("Required layers are missing from Cartografia: Lin_Tram.shp"));

        fs::write(dirs.carto_dir.join("Lin_Tram.shp"), b"").unwrap();
        let mut log = ReportLog::in_memory();
        assert!(workspace.check_entities(&dirs, LineType::Rep, &mut log));
    }
}
