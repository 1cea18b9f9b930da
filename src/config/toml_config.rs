use crate::domain::model::LineType;
use crate::utils::error::{QaError, Result};
use crate::utils::validation::{
    validate_file_extensions, validate_non_empty_list, validate_non_empty_string, validate_path,
    validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    pub paths: PathsConfig,
    pub layout: LayoutConfig,
    pub entities: EntitiesConfig,
    pub reference: ReferenceConfig,
    pub municat: MunicatConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub upload_dir: PathBuf,
    pub work_dir: PathBuf,
    pub lines_dir: PathBuf,
    pub work_store: PathBuf,
    pub log_dir: PathBuf,
    pub official_log_dir: String,
    pub restaking_log_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./data/upload"),
            work_dir: PathBuf::from("./data/work"),
            lines_dir: PathBuf::from("./data/lines"),
            work_store: PathBuf::from("./data/work_store.sqlite"),
            log_dir: PathBuf::from("./data/logs"),
            official_log_dir: "QA_MTT".to_string(),
            restaking_log_dir: "QA_REP".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub doc_dir: String,
    pub carto_dir: String,
    pub tables_dir: String,
    pub photo_dir: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            doc_dir: "DocDelim".to_string(),
            carto_dir: "Cartografia".to_string(),
            tables_dir: "Taules".to_string(),
            photo_dir: "Fotografies".to_string(),
        }
    }
}

impl LayoutConfig {
    pub fn sub_dirs(&self) -> [&str; 3] {
        [&self.carto_dir, &self.tables_dir, &self.photo_dir]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitiesConfig {
    pub official_shapes: Vec<String>,
    pub restaking_shapes: Vec<String>,
    pub tables: Vec<String>,
    pub temp_layers: Vec<String>,
    pub persistent_layers: Vec<String>,
}

impl Default for EntitiesConfig {
    fn default() -> Self {
        let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            official_shapes: list(&["Lin_TramPpta.shp", "Punt.shp"]),
            restaking_shapes: list(&["Lin_Tram.shp", "Punt.shp"]),
            tables: list(&["P_Proposta.dbf", "PUNT_FIT.dbf"]),
            temp_layers: list(&["Lin_TramPpta", "Lin_Tram", "Punt", "P_Proposta", "PUNT_FIT"]),
            persistent_layers: list(&[
                "fita_mem",
                "tram_linia_mem",
                "fita_rep",
                "tram_linia_rep",
                "id_linia_muni",
            ]),
        }
    }
}

impl EntitiesConfig {
    pub fn shapes_for(&self, line_type: LineType) -> &[String] {
        match line_type {
            LineType::Mtt => &self.official_shapes,
            LineType::Rep => &self.restaking_shapes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_seconds: u64,
    /// Remote table name -> local layer name.
    pub layers: BTreeMap<String, String>,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        let mut layers = BTreeMap::new();
        layers.insert("sidm3.v_fita_mem".to_string(), "fita_mem".to_string());
        layers.insert("sidm3.v_tram_linia_mem".to_string(), "tram_linia_mem".to_string());
        Self {
            base_url: "http://localhost:8080/collections".to_string(),
            token: None,
            timeout_seconds: 60,
            layers,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MunicatConfig {
    pub input_csv: PathBuf,
    pub output_dir: PathBuf,
    pub temp_layers: Vec<String>,
}

impl Default for MunicatConfig {
    fn default() -> Self {
        Self {
            input_csv: PathBuf::from("./data/municat/MTT.csv"),
            output_dir: PathBuf::from("./data/municat/output"),
            temp_layers: vec![
                "Fita_mem_municat_temp".to_string(),
                "Line_tram_mem_municat_temp".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub docs_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            docs_url: "http://localhost:8001/".to_string(),
        }
    }
}

impl QaConfig {
    /// Load the configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(QaError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Load from the given file when it exists, defaults otherwise.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(
                "Configuration file {} not found, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| QaError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replace `${VAR}` with the environment value, leaving unknown variables untouched.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| QaError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn doc_dir(&self, line_folder: &Path) -> PathBuf {
        line_folder.join(&self.layout.doc_dir)
    }

    /// Directory receiving the QA log of a line.
    pub fn qa_log_dir(&self, line_id: u32, line_type: LineType) -> PathBuf {
        let sub_dir = match line_type {
            LineType::Mtt => &self.paths.official_log_dir,
            LineType::Rep => &self.paths.restaking_log_dir,
        };
        self.paths.lines_dir.join(line_id.to_string()).join(sub_dir)
    }
}

impl Validate for QaConfig {
    fn validate(&self) -> Result<()> {
        let path_fields = [
            ("paths.upload_dir", &self.paths.upload_dir),
            ("paths.work_dir", &self.paths.work_dir),
            ("paths.lines_dir", &self.paths.lines_dir),
            ("paths.work_store", &self.paths.work_store),
            ("paths.log_dir", &self.paths.log_dir),
        ];
        for (field, path) in path_fields {
            validate_path(field, &path.to_string_lossy())?;
        }

        if self.paths.upload_dir == self.paths.work_dir {
            return Err(QaError::ConfigValidationError {
                field: "paths.work_dir".to_string(),
                message: "The working directory must differ from the upload directory".to_string(),
            });
        }

        validate_non_empty_string("paths.official_log_dir", &self.paths.official_log_dir)?;
        validate_non_empty_string("paths.restaking_log_dir", &self.paths.restaking_log_dir)?;
        validate_non_empty_string("layout.doc_dir", &self.layout.doc_dir)?;
        for sub_dir in self.layout.sub_dirs() {
            validate_non_empty_string("layout", sub_dir)?;
        }

        validate_non_empty_list("entities.official_shapes", &self.entities.official_shapes)?;
        validate_non_empty_list("entities.restaking_shapes", &self.entities.restaking_shapes)?;
        validate_file_extensions("entities.official_shapes", &self.entities.official_shapes, &["shp"])?;
        validate_file_extensions("entities.restaking_shapes", &self.entities.restaking_shapes, &["shp"])?;
        validate_file_extensions("entities.tables", &self.entities.tables, &["dbf"])?;

        validate_url("reference.base_url", &self.reference.base_url)?;
        if self.reference.timeout_seconds == 0 {
            return Err(QaError::InvalidConfigValueError {
                field: "reference.timeout_seconds".to_string(),
                value: "0".to_string(),
                reason: "Value must be at least 1".to_string(),
            });
        }

        validate_non_empty_string("server.bind_addr", &self.server.bind_addr)?;
        validate_url("server.docs_url", &self.server.docs_url)?;

        Ok(())
    }
}
