use crate::domain::model::{Feature, Geometry, Layer};
use crate::domain::ports::LayerStore;
use crate::utils::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS layers (
    name        TEXT PRIMARY KEY,
    fields      TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS features (
    layer       TEXT NOT NULL,
    fid         INTEGER NOT NULL,
    geometry    TEXT,
    attributes  TEXT NOT NULL,
    PRIMARY KEY (layer, fid)
);
";

/// Working geodata store backed by a single SQLite file.
///
/// Geometries and attributes are stored as JSON documents, one row per
/// feature, so any layer delivered with a line can be copied in without a
/// schema change.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

impl LayerStore for SqliteStore {
    fn write_layer(&self, layer: &Layer) -> Result<()> {
        let fields = serde_json::to_string(&layer.fields)?;
        let now = chrono::Utc::now().to_rfc3339();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM features WHERE layer = ?1", params![layer.name])?;
        tx.execute(
            "INSERT INTO layers (name, fields, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET fields = excluded.fields, updated_at = excluded.updated_at",
            params![layer.name, fields, now],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO features (layer, fid, geometry, attributes) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (fid, feature) in layer.features.iter().enumerate() {
                let geometry = feature
                    .geometry
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                let attributes = serde_json::to_string(&feature.attributes)?;
                stmt.execute(params![layer.name, fid as i64, geometry, attributes])?;
            }
        }
        tx.commit()?;

        tracing::debug!("Stored layer {} ({} features)", layer.name, layer.len());
        Ok(())
    }

    fn read_layer(&self, name: &str) -> Result<Option<Layer>> {
        let fields: Option<String> = self
            .conn
            .query_row(
                "SELECT fields FROM layers WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        let Some(fields) = fields else {
            return Ok(None);
        };

        let mut layer = Layer::new(name, serde_json::from_str(&fields)?);
        let mut stmt = self
            .conn
            .prepare("SELECT geometry, attributes FROM features WHERE layer = ?1 ORDER BY fid")?;
        let rows = stmt.query_map(params![name], |row| {
            Ok((row.get::<_, Option<String>>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (geometry, attributes) = row?;
            let geometry = geometry
                .map(|g| serde_json::from_str::<Geometry>(&g))
                .transpose()?;
            layer.push(Feature {
                geometry,
                attributes: serde_json::from_str(&attributes)?,
            });
        }

        Ok(Some(layer))
    }

    fn layer_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM layers ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn drop_layer(&self, name: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM features WHERE layer = ?1", params![name])?;
        let removed = tx.execute("DELETE FROM layers WHERE name = ?1", params![name])?;
        tx.commit()?;
        Ok(removed > 0)
    }
}
